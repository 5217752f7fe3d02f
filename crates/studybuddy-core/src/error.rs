use std::fmt::Display;
use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the RAG core.
///
/// An empty ingest and a single unreadable file are not errors; see
/// `IndexOutcome::NothingToIndex` and `loader::FileFailure`.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("Error: Source directory '{}' not found.", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Knowledge base not initialized. Please index a directory first using the 'index' command.")]
    IndexNotReady,

    #[error("Provider call failed: {0}")]
    Provider(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Routing failed: {0}")]
    Routing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub fn provider(err: impl Display) -> Self {
        Self::Provider(err.to_string())
    }

    pub fn store(err: impl Display) -> Self {
        Self::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

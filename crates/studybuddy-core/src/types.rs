//! Domain types shared by the loader, chunker, vector store and router.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

pub type SourceId = String;

/// Supported on-disk document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentKind {
    Text,
    Pdf,
}

impl DocumentKind {
    pub const ALL: [Self; 2] = [Self::Text, Self::Pdf];

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("txt") {
            Some(Self::Text)
        } else if ext.eq_ignore_ascii_case("pdf") {
            Some(Self::Pdf)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}

/// A whole file read from disk. `source_id` is the path the loader walked,
/// kept verbatim because it is what users see when a source is cited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source_id: SourceId,
    pub kind: DocumentKind,
    pub text: String,
}

/// A bounded window of a document's text.
///
/// - `source_id`: copied unchanged from the parent `Document`
/// - `sequence_position`: 0-based position among the chunks of that document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_id: SourceId,
    pub sequence_position: usize,
}

impl Chunk {
    pub fn id(&self) -> String {
        format!("{}:{}", self.source_id, self.sequence_position)
    }
}

/// Answer text plus the distinct sources of the chunks it was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub source_files: BTreeSet<String>,
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.answer.trim_end())?;
        if !self.source_files.is_empty() {
            let sources: Vec<&str> = self.source_files.iter().map(String::as_str).collect();
            write!(f, "\n\nSources Used: {}", sources.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intent {
    Index,
    Query,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Index => "INDEX",
            Self::Query => "QUERY",
        })
    }
}

/// What the router decided to do with one incoming request.
///
/// `payload` is a directory path for `Intent::Index` and the question for
/// `Intent::Query`. `force_recreate` is only meaningful for indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub intent: Intent,
    pub payload: String,
    #[serde(default)]
    pub force_recreate: bool,
}

impl RouteDecision {
    pub fn index(path: impl Into<String>, force_recreate: bool) -> Self {
        Self { intent: Intent::Index, payload: path.into(), force_recreate }
    }

    pub fn query(question: impl Into<String>) -> Self {
        Self { intent: Intent::Query, payload: question.into(), force_recreate: false }
    }
}

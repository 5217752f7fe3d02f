//! Directory walking and text extraction for `.txt` and `.pdf` files.

use rayon::prelude::*;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{RagError, Result};
use crate::types::{Document, DocumentKind};

/// A file that matched a supported extension but could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub failures: Vec<FileFailure>,
}

impl LoadReport {
    pub fn count_of(&self, kind: DocumentKind) -> usize {
        self.documents.iter().filter(|d| d.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Load every supported document under `dir`, recursing into subdirectories.
///
/// Unreadable files are logged and reported in `LoadReport::failures`; they
/// never abort the whole load. A directory with no supported files yields
/// an empty report.
pub fn load_documents(dir: &Path) -> Result<LoadReport> {
    if !dir.is_dir() {
        return Err(RagError::SourceNotFound(dir.to_path_buf()));
    }
    let (files, walk_failures) = list_supported_files(dir);
    debug!(dir = %dir.display(), files = files.len(), "discovered supported files");

    let results: Vec<(PathBuf, DocumentKind, std::result::Result<String, String>)> = files
        .into_par_iter()
        .map(|(path, kind)| {
            let text = read_document(&path, kind);
            (path, kind, text)
        })
        .collect();

    let mut report = LoadReport::default();
    for failure in walk_failures {
        warn!(path = %failure.path.display(), reason = %failure.reason, "skipping unreadable entry");
        report.failures.push(failure);
    }
    for (path, kind, text) in results {
        match text {
            Ok(text) => report.documents.push(Document { source_id: path.to_string_lossy().into_owned(), kind, text }),
            Err(reason) => {
                warn!(path = %path.display(), %reason, "skipping unreadable file");
                report.failures.push(FileFailure { path, reason });
            }
        }
    }
    Ok(report)
}

/// Like `load_documents`, but a missing directory is just an empty report.
pub fn load_documents_if_present(dir: &Path) -> Result<LoadReport> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "directory absent, nothing to load");
        return Ok(LoadReport::default());
    }
    load_documents(dir)
}

/// Supported files under `root`, plus entries the walk could not read.
fn list_supported_files(root: &Path) -> (Vec<(PathBuf, DocumentKind)>, Vec<FileFailure>) {
    let mut files = Vec::new();
    let mut failures = Vec::new();
    for entry in walkdir::WalkDir::new(root) {
        match entry {
            Ok(e) if e.file_type().is_file() => {
                if let Some(kind) = DocumentKind::from_path(e.path()) {
                    files.push((e.into_path(), kind));
                }
            }
            Ok(_) => {}
            Err(err) => failures.push(FileFailure {
                path: err.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf),
                reason: err.to_string(),
            }),
        }
    }
    files.sort();
    (files, failures)
}

fn read_document(path: &Path, kind: DocumentKind) -> std::result::Result<String, String> {
    match kind {
        DocumentKind::Text => read_text(path).map_err(|e| e.to_string()),
        DocumentKind::Pdf => read_pdf(path),
    }
}

fn read_text(path: &Path) -> std::io::Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).into_owned()),
    }
}

fn read_pdf(path: &Path) -> std::result::Result<String, String> {
    // pdf-extract panics on some malformed inputs.
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text(path))) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("PDF parser panicked".to_string()),
    }
}

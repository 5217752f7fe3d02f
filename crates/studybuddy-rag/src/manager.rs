//! Owner of the one live vector store handle for a persistence directory.
//!
//! Single writer: callers must not run two `build_or_update_index` calls
//! against the same directory at once.

use std::collections::BTreeMap;
use std::fmt;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use studybuddy_core::chunker::Chunker;
use studybuddy_core::config::Settings;
use studybuddy_core::error::{RagError, Result};
use studybuddy_core::loader::load_documents;
use studybuddy_core::traits::{Embedder, LanguageModel};
use studybuddy_core::types::{Chunk, DocumentKind, QueryResult};
use studybuddy_vector::{StoreStats, VectorStore};

use crate::retriever::Retriever;
use crate::synthesizer::synthesize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Created,
    Updated,
    NothingToIndex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub outcome: IndexOutcome,
    pub documents_by_type: BTreeMap<DocumentKind, usize>,
    pub chunks: usize,
    pub skipped_files: usize,
}

impl IndexReport {
    pub fn documents(&self) -> usize {
        self.documents_by_type.values().sum()
    }
}

impl fmt::Display for IndexReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let by_type: Vec<String> = DocumentKind::ALL
            .iter()
            .map(|k| format!("{} {}", self.documents_by_type.get(k).copied().unwrap_or(0), k))
            .collect();
        match self.outcome {
            IndexOutcome::Created => write!(
                f,
                "Successfully created new index with {} chunks from {} documents ({}).",
                self.chunks,
                self.documents(),
                by_type.join(", ")
            )?,
            IndexOutcome::Updated => write!(
                f,
                "Successfully added {} new chunks from {} documents to the index ({}).",
                self.chunks,
                self.documents(),
                by_type.join(", ")
            )?,
            IndexOutcome::NothingToIndex => f.write_str("No new documents found to index.")?,
        }
        if self.skipped_files > 0 {
            write!(f, " Skipped {} unreadable file(s).", self.skipped_files)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct IndexStatus {
    pub persist_dir: PathBuf,
    pub embedder_id: String,
    pub stats: Option<StoreStats>,
}

impl IndexStatus {
    /// Inspect the index under `persist_dir` without constructing any provider.
    pub fn load(persist_dir: &Path, embedder_id: impl Into<String>) -> Result<Self> {
        let store = VectorStore::open(persist_dir).map_err(RagError::store)?;
        Self::from_store(persist_dir, embedder_id.into(), store.as_ref())
    }

    fn from_store(persist_dir: &Path, embedder_id: String, store: Option<&VectorStore>) -> Result<Self> {
        let stats = store.map(|s| s.stats().map_err(RagError::store)).transpose()?;
        Ok(Self { persist_dir: persist_dir.to_path_buf(), embedder_id, stats })
    }

    pub fn is_ready(&self) -> bool { self.stats.is_some() }
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(stats) = &self.stats else {
            return write!(f, "No index at {}. {}", self.persist_dir.display(), RagError::IndexNotReady);
        };
        writeln!(f, "Index: {}", self.persist_dir.display())?;
        writeln!(f, "Embedder: {}", self.embedder_id)?;
        write!(
            f,
            "Chunks: {} from {} sources ({} duplicated)",
            stats.total_chunks, stats.distinct_sources, stats.duplicate_chunks
        )?;
        for (source, n) in &stats.chunks_per_source {
            write!(f, "\n  {source}: {n}")?;
        }
        Ok(())
    }
}

pub struct IndexManager {
    persist_dir: PathBuf,
    batch_size: usize,
    chunker: Chunker,
    retriever: Retriever,
    embedder: Box<dyn Embedder>,
    llm: Box<dyn LanguageModel>,
    store: Option<VectorStore>,
}

impl IndexManager {
    /// Opens the index persisted under `paths.persist_dir` when there is one.
    pub fn new(settings: &Settings, embedder: Box<dyn Embedder>, llm: Box<dyn LanguageModel>) -> Result<Self> {
        settings.validate()?;
        let persist_dir = settings.persist_dir();
        let store = VectorStore::open(&persist_dir).map_err(RagError::store)?;
        if let Some(s) = &store {
            info!(path = %persist_dir.display(), "loaded existing vector store");
            if s.dim() != embedder.dim() {
                warn!(store_dim = s.dim(), embedder_dim = embedder.dim(), "embedder does not match stored vectors");
            }
        }
        Ok(Self {
            persist_dir,
            batch_size: settings.embedding.batch_size,
            chunker: Chunker::new(&settings.chunking)?,
            retriever: Retriever::new(&settings.retrieval),
            embedder,
            llm,
            store,
        })
    }

    pub fn is_ready(&self) -> bool { self.store.is_some() }

    pub fn persist_dir(&self) -> &Path { &self.persist_dir }

    /// Index every supported document under `source_dir`.
    ///
    /// Without `force_recreate` new chunks are appended to the existing index
    /// even if identical chunks are already stored.
    pub fn build_or_update_index(&mut self, source_dir: &Path, force_recreate: bool) -> Result<IndexReport> {
        // Checked before anything destructive happens to the existing index.
        if !source_dir.is_dir() {
            return Err(RagError::SourceNotFound(source_dir.to_path_buf()));
        }
        if force_recreate {
            if let Some(store) = self.store.take() {
                warn!(path = %self.persist_dir.display(), "force recreating index");
                store.destroy().map_err(RagError::store)?;
            }
        }

        info!(dir = %source_dir.display(), "loading documents");
        let loaded = load_documents(source_dir)?;
        let skipped_files = loaded.failures.len();
        let mut documents_by_type = BTreeMap::new();
        for kind in DocumentKind::ALL {
            documents_by_type.insert(kind, loaded.count_of(kind));
        }
        let chunks = self.chunker.split_documents(&loaded.documents);
        if chunks.is_empty() {
            return Ok(IndexReport { outcome: IndexOutcome::NothingToIndex, documents_by_type, chunks: 0, skipped_files });
        }

        let embeddings = self.embed_chunks(&chunks)?;
        let outcome = match &self.store {
            None => {
                info!(chunks = chunks.len(), "creating new vector store");
                let store = VectorStore::create(&self.persist_dir, &chunks, &embeddings, self.embedder.dim()).map_err(RagError::store)?;
                self.store = Some(store);
                IndexOutcome::Created
            }
            Some(store) => {
                self.check_dim(store)?;
                info!(chunks = chunks.len(), "adding chunks to existing vector store");
                store.append(&chunks, &embeddings).map_err(RagError::store)?;
                IndexOutcome::Updated
            }
        };
        Ok(IndexReport { outcome, documents_by_type, chunks: chunks.len(), skipped_files })
    }

    /// Answer `question` from the indexed documents.
    pub fn query(&self, question: &str) -> Result<QueryResult> {
        let store = self.store.as_ref().ok_or(RagError::IndexNotReady)?;
        self.check_dim(store)?;
        let query_vec = self.embedder.embed(question).map_err(RagError::provider)?;
        let selected = self.retriever.retrieve(store, &query_vec).map_err(RagError::store)?;
        info!(selected = selected.len(), "retrieved context");
        synthesize(self.llm.as_ref(), question, &selected)
    }

    pub fn status(&self) -> Result<IndexStatus> {
        IndexStatus::from_store(&self.persist_dir, self.embedder.embedder_id().to_string(), self.store.as_ref())
    }

    fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let pb = embed_progress(chunks.len());
        let mut out = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = match self.embedder.embed_batch(&texts) {
                Ok(v) => v,
                Err(e) => {
                    pb.abandon_with_message("embedding failed");
                    return Err(RagError::provider(e));
                }
            };
            if vectors.len() != texts.len() {
                pb.abandon_with_message("embedding failed");
                return Err(RagError::Provider(format!("embedder returned {} vectors for {} texts", vectors.len(), texts.len())));
            }
            pb.inc(batch.len() as u64);
            out.extend(vectors);
        }
        pb.finish_with_message("embedded");
        Ok(out)
    }

    fn check_dim(&self, store: &VectorStore) -> Result<()> {
        if store.dim() == self.embedder.dim() {
            return Ok(());
        }
        Err(RagError::InvalidConfig(format!(
            "index at {} holds {}-dimensional vectors but embedder {} produces {}; re-index with --force",
            self.persist_dir.display(),
            store.dim(),
            self.embedder.embedder_id(),
            self.embedder.dim()
        )))
    }
}

fn embed_progress(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} embedded ({percent}%) {msg}") {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

//! Persistent chunk store backed by a single LanceDB table.
//!
//! The RAG core is synchronous, so `VectorStore` owns a tokio runtime and
//! blocks on LanceDB's async API. One store maps to one directory on disk.

use anyhow::{Result, anyhow};
use lancedb::{Connection, Table};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{info, warn};

use studybuddy_core::types::Chunk;

pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use search::ScoredChunk;
pub use table::StoreStats;

use schema::{vector_dim, CHUNKS_TABLE};

pub struct VectorStore {
    rt: Runtime,
    // Kept so the table's connection outlives every query issued through it.
    _db: Connection,
    table: Table,
    path: PathBuf,
    dim: usize,
}

impl VectorStore {
    /// Open the store persisted at `path`. A missing directory or a directory
    /// without the chunks table is `Ok(None)`.
    pub fn open(path: &Path) -> Result<Option<Self>> {
        if !path.is_dir() {
            return Ok(None);
        }
        let rt = Runtime::new()?;
        let uri = path.to_string_lossy().to_string();
        let opened = rt.block_on(async {
            let db = table::open_db(&uri).await?;
            if !table::table_exists(&db, CHUNKS_TABLE).await? {
                return Ok::<_, anyhow::Error>(None);
            }
            let t = db.open_table(CHUNKS_TABLE).execute().await?;
            let schema = t.schema().await?;
            Ok(Some((db, t, schema)))
        })?;
        let Some((db, table, schema)) = opened else {
            warn!(path = %path.display(), "directory exists but holds no chunk table");
            return Ok(None);
        };
        let dim = vector_dim(&schema).ok_or_else(|| anyhow!("chunk table at {} has no vector column", path.display()))?;
        info!(path = %path.display(), dim, "opened vector store");
        Ok(Some(Self { rt, _db: db, table, path: path.to_path_buf(), dim }))
    }

    /// Create a new store at `path` seeded with `chunks`.
    pub fn create(path: &Path, chunks: &[Chunk], embeddings: &[Vec<f32>], dim: usize) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let rt = Runtime::new()?;
        let uri = path.to_string_lossy().to_string();
        let (db, table) = rt.block_on(async {
            let db = table::open_db(&uri).await?;
            let t = writer::create_table(&db, CHUNKS_TABLE, chunks, embeddings, dim).await?;
            Ok::<_, anyhow::Error>((db, t))
        })?;
        info!(path = %path.display(), rows = chunks.len(), dim, "created vector store");
        Ok(Self { rt, _db: db, table, path: path.to_path_buf(), dim })
    }

    /// Append rows. Existing rows are never compared or replaced.
    pub fn append(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        self.rt.block_on(writer::append_rows(&self.table, chunks, embeddings, self.dim))
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.rt.block_on(self.table.count_rows(None))?)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.rt.block_on(table::collect_stats(&self.table))
    }

    /// Top `fetch_k` chunks by cosine similarity, best first.
    pub fn similarity_search(&self, query: &[f32], fetch_k: usize) -> Result<Vec<ScoredChunk>> {
        if query.len() != self.dim {
            return Err(anyhow!("query vector has dimension {}, store expects {}", query.len(), self.dim));
        }
        self.rt.block_on(search::nearest(&self.table, query, fetch_k))
    }

    pub fn dim(&self) -> usize { self.dim }

    /// Close the store and delete its directory. Irreversible.
    pub fn destroy(self) -> Result<()> {
        let path = self.path.clone();
        drop(self);
        std::fs::remove_dir_all(&path)?;
        warn!(path = %path.display(), "deleted vector store");
        Ok(())
    }
}

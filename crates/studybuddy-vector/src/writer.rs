//! Chunk + embedding rows into Arrow batches and LanceDB tables.
use anyhow::{Result, anyhow};
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::{Connection, Table};
use std::sync::Arc;
use tracing::info;

use studybuddy_core::types::Chunk;

use crate::schema::build_chunk_schema;

const WRITE_BATCH: usize = 1000;

pub fn content_hash(text: &str) -> String { blake3::hash(text.as_bytes()).to_hex().to_string() }

pub fn chunks_to_record_batch(chunks: &[Chunk], embeddings: &[Vec<f32>], dim: usize) -> Result<RecordBatch> {
	if chunks.len() != embeddings.len() {
		return Err(anyhow!("{} chunks but {} embeddings", chunks.len(), embeddings.len()));
	}
	if let Some(bad) = embeddings.iter().find(|v| v.len() != dim) {
		return Err(anyhow!("embedding has dimension {}, store expects {}", bad.len(), dim));
	}
	let dim_i32 = i32::try_from(dim)?;
	let now = Utc::now().timestamp_millis();
	let mut ids = Vec::with_capacity(chunks.len()); let mut sources = Vec::with_capacity(chunks.len()); let mut texts = Vec::with_capacity(chunks.len());
	let mut positions = Vec::with_capacity(chunks.len()); let mut hashes = Vec::with_capacity(chunks.len());
	for c in chunks {
		ids.push(c.id()); sources.push(c.source_id.clone()); texts.push(c.text.clone());
		positions.push(i32::try_from(c.sequence_position)?); hashes.push(content_hash(&c.text));
	}
	let vectors = embeddings.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
	let record_batch = RecordBatch::try_new(build_chunk_schema(dim_i32), vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(StringArray::from(sources)),
		Arc::new(StringArray::from(texts)),
		Arc::new(Int32Array::from(positions)),
		Arc::new(StringArray::from(hashes)),
		Arc::new(TimestampMillisecondArray::from(vec![now; chunks.len()])),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim_i32)),
	])?;
	Ok(record_batch)
}

fn progress(total: usize) -> Result<ProgressBar> {
	let pb = ProgressBar::new(total as u64);
	pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?.progress_chars("#>-"));
	Ok(pb)
}

/// Create `name` seeded with the given rows. The first write batch creates the
/// table; later batches append to it.
pub async fn create_table(conn: &Connection, name: &str, chunks: &[Chunk], embeddings: &[Vec<f32>], dim: usize) -> Result<Table> {
	let first = WRITE_BATCH.min(chunks.len());
	let batch = chunks_to_record_batch(&chunks[..first], &embeddings[..first], dim)?;
	let schema = batch.schema();
	let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
	let table = conn.create_table(name, reader).execute().await?;
	append_rows(&table, &chunks[first..], &embeddings[first..], dim).await?;
	Ok(table)
}

pub async fn append_rows(table: &Table, chunks: &[Chunk], embeddings: &[Vec<f32>], dim: usize) -> Result<()> {
	if chunks.is_empty() { return Ok(()); }
	let pb = progress(chunks.len())?;
	let mut written = 0usize;
	for (cs, es) in chunks.chunks(WRITE_BATCH).zip(embeddings.chunks(WRITE_BATCH)) {
		let batch = chunks_to_record_batch(cs, es, dim)?;
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		table.add(reader).execute().await?;
		written += cs.len();
		pb.set_position(written as u64);
	}
	pb.finish_and_clear();
	info!(rows = written, table = table.name(), "appended chunks");
	Ok(())
}

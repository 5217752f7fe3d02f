//! LanceDB connection and housekeeping helpers.
use anyhow::{Result, anyhow};
use arrow_array::{Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, Connection, Table};
use std::collections::{HashMap, HashSet};

use crate::schema::{COL_HASH, COL_SOURCE};

pub async fn open_db(uri: &str) -> Result<Connection> {
	Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
	Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

pub(crate) fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| anyhow!("{name} column missing"))
}

/// Row counts for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
	pub total_chunks: usize,
	pub distinct_sources: usize,
	/// Rows whose content hash already appeared earlier for the same source.
	pub duplicate_chunks: usize,
	pub chunks_per_source: Vec<(String, usize)>,
}

pub async fn collect_stats(table: &Table) -> Result<StoreStats> {
	let mut stream = table.query().select(Select::columns(&[COL_SOURCE, COL_HASH])).execute().await?;
	let mut seen: HashSet<(String, String)> = HashSet::new();
	let mut per_source: HashMap<String, usize> = HashMap::new();
	let mut stats = StoreStats::default();
	while let Some(batch) = stream.try_next().await? {
		let sources = string_column(&batch, COL_SOURCE)?;
		let hashes = string_column(&batch, COL_HASH)?;
		for i in 0..batch.num_rows() {
			if sources.is_null(i) { continue; }
			let source = sources.value(i).to_string();
			stats.total_chunks += 1;
			*per_source.entry(source.clone()).or_default() += 1;
			if !seen.insert((source, hashes.value(i).to_string())) {
				stats.duplicate_chunks += 1;
			}
		}
	}
	stats.distinct_sources = per_source.len();
	let mut chunks_per_source: Vec<(String, usize)> = per_source.into_iter().collect();
	chunks_per_source.sort();
	stats.chunks_per_source = chunks_per_source;
	Ok(stats)
}

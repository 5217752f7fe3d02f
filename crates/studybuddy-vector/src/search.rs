use anyhow::{Result, anyhow};
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int32Array};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};

use studybuddy_core::types::Chunk;

use crate::schema::{COL_POSITION, COL_SOURCE, COL_TEXT, COL_VECTOR};
use crate::table::string_column;

/// A stored chunk with its cosine similarity to the query and its own vector.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
	pub chunk: Chunk,
	pub score: f32,
	pub vector: Vec<f32>,
}

/// Nearest `limit` rows by cosine distance, best first. Rows whose score is
/// not finite (e.g. a zero query vector) are dropped.
pub async fn nearest(table: &Table, query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
	let mut stream = table
		.vector_search(query.to_vec())?
		.distance_type(DistanceType::Cosine)
		.limit(limit)
		.execute()
		.await?;
	let mut hits = Vec::new();
	while let Some(batch) = stream.try_next().await? {
		let sources = string_column(&batch, COL_SOURCE)?;
		let texts = string_column(&batch, COL_TEXT)?;
		let positions = batch.column_by_name(COL_POSITION).and_then(|c| c.as_any().downcast_ref::<Int32Array>()).ok_or_else(|| anyhow!("{COL_POSITION} column missing"))?;
		let vectors = batch.column_by_name(COL_VECTOR).and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>()).ok_or_else(|| anyhow!("{COL_VECTOR} column missing"))?;
		let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>()).ok_or_else(|| anyhow!("_distance column missing"))?;
		for i in 0..batch.num_rows() {
			let score = 1.0 - distances.value(i);
			if distances.is_null(i) || !score.is_finite() { continue; }
			let values = vectors.value(i);
			let vector = values.as_any().downcast_ref::<Float32Array>().map(|a| a.values().to_vec()).unwrap_or_default();
			let chunk = Chunk {
				text: texts.value(i).to_string(),
				source_id: sources.value(i).to_string(),
				sequence_position: usize::try_from(positions.value(i)).unwrap_or_default(),
			};
			hits.push(ScoredChunk { chunk, score, vector });
		}
	}
	hits.sort_by(|a, b| b.score.total_cmp(&a.score));
	hits.truncate(limit);
	Ok(hits)
}

use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const CHUNKS_TABLE: &str = "chunks";

pub const COL_ID: &str = "id";
pub const COL_SOURCE: &str = "source_id";
pub const COL_TEXT: &str = "text";
pub const COL_POSITION: &str = "sequence_position";
pub const COL_HASH: &str = "content_hash";
pub const COL_INDEXED_AT: &str = "indexed_at";
pub const COL_VECTOR: &str = "vector";

pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(COL_ID, DataType::Utf8, false),
		Field::new(COL_SOURCE, DataType::Utf8, false),
		Field::new(COL_TEXT, DataType::Utf8, false),
		Field::new(COL_POSITION, DataType::Int32, false),
		Field::new(COL_HASH, DataType::Utf8, false),
		Field::new(COL_INDEXED_AT, DataType::Timestamp(TimeUnit::Millisecond, None), false),
		Field::new(COL_VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

/// Vector width recorded in an existing table's schema.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
	match schema.field_with_name(COL_VECTOR).ok()?.data_type() {
		DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
		_ => None,
	}
}

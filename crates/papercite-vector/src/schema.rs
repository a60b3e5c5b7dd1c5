use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Arrow layout of the chunk table; `dim` is the embedder's dimensionality.
pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("chunk_id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("source_file", DataType::Utf8, false),
        Field::new("source_path", DataType::Utf8, false),
        Field::new("page_number", DataType::Int32, false),
        Field::new("section_name", DataType::Utf8, false),
        Field::new("chunk_index", DataType::Int32, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
            true,
        ),
    ]))
}

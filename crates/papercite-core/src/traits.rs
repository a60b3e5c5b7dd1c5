//! Seams to the external collaborators: embedding, vector search and text
//! generation. The core only ever talks to these traits.

use crate::types::Chunk;

pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hash:xxh64:d384`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Nearest-neighbour search over indexed chunks.
///
/// Distances are non-negative and smaller means more similar.
pub trait VectorStore: Send + Sync {
    /// Insert chunks, returning how many rows were written.
    fn add(&self, chunks: &[Chunk]) -> anyhow::Result<usize>;

    /// Plain top-`k` search in relevance order.
    fn similarity_search_with_distance(&self, query: &str, k: usize) -> anyhow::Result<Vec<(Chunk, f32)>>;

    /// Diversity-aware top-`k` selection drawn from the `fetch_k` nearest
    /// candidates. `lambda` of 1.0 is pure relevance, 0.0 pure diversity.
    fn max_marginal_relevance_search(
        &self,
        query: &str,
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> anyhow::Result<Vec<Chunk>>;
}

pub trait LanguageModel: Send + Sync {
    /// Single prompt in, single completion out.
    fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

//! `Embedder` implementations: an offline hashing embedder and an
//! OpenAI-compatible HTTP client.

use anyhow::Result;
use std::sync::Arc;

use papercite_core::config::{EmbeddingProvider, EmbeddingsConfig};
use papercite_core::traits::Embedder;

pub mod hash;
pub mod openai;

pub use hash::HashEmbedder;
pub use openai::OpenAiEmbedder;

/// Build the embedder selected by `models.embeddings.provider`.
pub fn embedder_from_config(config: &EmbeddingsConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Hash => {
            tracing::info!(dim = config.dim, "using hashing embedder");
            Ok(Arc::new(HashEmbedder::new(config.dim)))
        }
        EmbeddingProvider::Openai => {
            tracing::info!(model = %config.model, dim = config.dim, "using OpenAI-compatible embedder");
            Ok(Arc::new(OpenAiEmbedder::from_config(config)?))
        }
    }
}

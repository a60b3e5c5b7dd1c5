//! `VectorStore` implementations and the MMR selection they share.

use anyhow::Result;
use std::sync::Arc;

use papercite_core::config::{StoreBackend, StoreConfig};
use papercite_core::traits::{Embedder, VectorStore};

pub mod lance;
pub mod memory;
pub mod mmr;
pub mod schema;

pub use lance::LanceStore;
pub use memory::InMemoryStore;

/// Open the store selected by `store.backend`. `index_dir` is only used by
/// the LanceDB backend.
pub fn store_from_config(
    config: &StoreConfig,
    index_dir: &std::path::Path,
    embedder: Arc<dyn Embedder>,
    show_progress: bool,
) -> Result<Arc<dyn VectorStore>> {
    match config.backend {
        StoreBackend::Lance => {
            Ok(Arc::new(LanceStore::open(index_dir, &config.table, embedder)?.with_progress(show_progress)))
        }
        StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new(embedder))),
    }
}

//! Retrieval over a `VectorStore` with similarity normalization, optional
//! MMR diversification and the evidence-floor abstention check.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

use papercite_core::config::RetrievalConfig;
use papercite_core::traits::VectorStore;
use papercite_core::types::RetrievedItem;

/// Bounded, monotonically decreasing proxy for a store distance.
///
/// Only ordering and thresholding rely on it; it is not cosine similarity.
pub fn distance_to_similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Ranked evidence for `query`.
///
/// With `use_diversity`, the `fetch_k` nearest candidates are scored first,
/// then the store's MMR selection picks `k` of them and each pick gets its
/// candidate similarity back by `chunk_id`. A pick outside the candidate pool
/// gets 0.0.
pub fn retrieve(
    store: &dyn VectorStore,
    query: &str,
    k: usize,
    use_diversity: bool,
    fetch_k: usize,
    diversity_lambda: f32,
) -> Result<Vec<RetrievedItem>> {
    if !use_diversity {
        let pairs = store.similarity_search_with_distance(query, k)?;
        return Ok(pairs
            .into_iter()
            .map(|(chunk, distance)| RetrievedItem::from_chunk(chunk, distance_to_similarity(distance)))
            .collect());
    }

    let candidates = store.similarity_search_with_distance(query, fetch_k)?;
    let mut similarity_by_id: HashMap<String, f32> = HashMap::with_capacity(candidates.len());
    for (chunk, distance) in candidates {
        similarity_by_id.entry(chunk.chunk_id).or_insert_with(|| distance_to_similarity(distance));
    }

    let selected = store.max_marginal_relevance_search(query, k, fetch_k, diversity_lambda)?;
    Ok(selected
        .into_iter()
        .map(|chunk| {
            let similarity = match similarity_by_id.get(&chunk.chunk_id) {
                Some(&s) => s,
                None => {
                    tracing::warn!(
                        chunk_id = %chunk.chunk_id,
                        fetch_k,
                        "MMR pick missing from candidate pool; similarity set to 0.0"
                    );
                    0.0
                }
            };
            RetrievedItem::from_chunk(chunk, similarity)
        })
        .collect())
}

/// True when there is no evidence or the best similarity is below the floor.
pub fn should_abstain(retrieved: &[RetrievedItem], min_similarity: f32) -> bool {
    retrieved
        .iter()
        .map(|r| r.similarity)
        .reduce(f32::max)
        .map_or(true, |best| best < min_similarity)
}

/// `retrieve` and `should_abstain` bound to a store and `RetrievalConfig`.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, config: RetrievalConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn retrieve(&self, query: &str) -> Result<Vec<RetrievedItem>> {
        let c = &self.config;
        let items = retrieve(self.store.as_ref(), query, c.k, c.use_mmr, c.fetch_k, c.lambda_mult)?;
        tracing::debug!(k = c.k, use_mmr = c.use_mmr, found = items.len(), "retrieved");
        Ok(items)
    }

    pub fn should_abstain(&self, retrieved: &[RetrievedItem]) -> bool {
        should_abstain(retrieved, self.config.min_similarity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_is_bounded_and_decreasing() {
        assert_eq!(distance_to_similarity(0.0), 1.0);
        assert_eq!(distance_to_similarity(1.0), 0.5);
        assert_eq!(distance_to_similarity(-3.0), 1.0, "negative distances clamp to zero");
        let mut last = 1.0;
        for d in [0.1f32, 0.5, 2.0, 10.0, 1000.0] {
            let s = distance_to_similarity(d);
            assert!(s > 0.0 && s < last);
            last = s;
        }
    }
}

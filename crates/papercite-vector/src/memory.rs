//! Exact in-process store for tests and small corpora.

use anyhow::{anyhow, Result};
use std::sync::{Arc, RwLock};

use papercite_core::traits::{Embedder, VectorStore};
use papercite_core::types::Chunk;

use crate::mmr;

/// Brute-force nearest neighbours over every inserted chunk.
///
/// Inserts append: adding the same chunk twice stores it twice. Equal
/// distances keep insertion order.
pub struct InMemoryStore {
    embedder: Arc<dyn Embedder>,
    rows: RwLock<Vec<(Chunk, Vec<f32>)>>,
}

impl InMemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder, rows: RwLock::new(Vec::new()) }
    }

    pub fn len(&self) -> usize {
        self.rows.read().map_or(0, |rows| rows.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embedder
            .embed_batch(&[query.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector for the query"))
    }

    /// Nearest `k` rows as (chunk, vector, distance), closest first.
    fn nearest(&self, query_vec: &[f32], k: usize) -> Result<Vec<(Chunk, Vec<f32>, f32)>> {
        let rows = self.rows.read().map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        let mut scored: Vec<(usize, f32)> =
            rows.iter().enumerate().map(|(i, (_, v))| (i, mmr::squared_l2(query_vec, v))).collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, d)| (rows[i].0.clone(), rows[i].1.clone(), d))
            .collect())
    }
}

impl VectorStore for InMemoryStore {
    fn add(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        if vectors.len() != chunks.len() {
            return Err(anyhow!("embedder returned {} vectors for {} chunks", vectors.len(), chunks.len()));
        }
        let mut rows = self.rows.write().map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        rows.extend(chunks.iter().cloned().zip(vectors));
        tracing::debug!(added = chunks.len(), total = rows.len(), "in-memory store insert");
        Ok(chunks.len())
    }

    fn similarity_search_with_distance(&self, query: &str, k: usize) -> Result<Vec<(Chunk, f32)>> {
        let q = self.embed_query(query)?;
        Ok(self.nearest(&q, k)?.into_iter().map(|(c, _, d)| (c, d)).collect())
    }

    fn max_marginal_relevance_search(&self, query: &str, k: usize, fetch_k: usize, lambda: f32) -> Result<Vec<Chunk>> {
        let q = self.embed_query(query)?;
        let pool = self.nearest(&q, fetch_k.max(k))?;
        let vectors: Vec<Vec<f32>> = pool.iter().map(|(_, v, _)| v.clone()).collect();
        let picks = mmr::select(&q, &vectors, k, lambda);
        Ok(picks.into_iter().map(|i| pool[i].0.clone()).collect())
    }
}

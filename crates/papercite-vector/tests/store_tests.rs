use std::collections::HashSet;
use std::sync::Arc;

use papercite_core::traits::{Embedder, VectorStore};
use papercite_core::types::Chunk;
use papercite_embed::HashEmbedder;
use papercite_vector::{InMemoryStore, LanceStore};

fn embedder() -> Arc<dyn Embedder> {
    Arc::new(HashEmbedder::new(1024))
}

fn chunk(id: &str, page: u32, text: &str) -> Chunk {
    Chunk {
        chunk_id: id.to_string(),
        text: text.to_string(),
        source_file: "paper.pdf".to_string(),
        source_path: "/corpus/paper.pdf".to_string(),
        page_number: page,
        section_name: "Methods".to_string(),
        chunk_index: page as usize,
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk("aaaaaaaaaaaa", 1, "sparse attention reduces transformer memory"),
        chunk("bbbbbbbbbbbb", 2, "sparse attention reduces transformer memory usage"),
        chunk("cccccccccccc", 3, "soil moisture sensors guide irrigation schedules"),
        chunk("dddddddddddd", 4, "we evaluate attention on long documents"),
    ]
}

#[test]
fn memory_search_orders_by_distance() -> anyhow::Result<()> {
    let store = InMemoryStore::new(embedder());
    assert_eq!(store.add(&corpus())?, 4);

    let hits = store.similarity_search_with_distance("sparse attention transformer memory", 3)?;
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].0.chunk_id, "aaaaaaaaaaaa");
    assert!(hits.windows(2).all(|w| w[0].1 <= w[1].1), "closest first");
    assert!(hits.iter().all(|(_, d)| *d >= 0.0));
    Ok(())
}

#[test]
fn memory_ties_keep_insertion_order() -> anyhow::Result<()> {
    let store = InMemoryStore::new(embedder());
    store.add(&[chunk("111111111111", 1, "same words"), chunk("222222222222", 2, "same words")])?;
    let hits = store.similarity_search_with_distance("same words", 2)?;
    assert_eq!(hits[0].0.chunk_id, "111111111111");
    assert_eq!(hits[1].0.chunk_id, "222222222222");
    Ok(())
}

#[test]
fn memory_inserts_append_duplicates() -> anyhow::Result<()> {
    let store = InMemoryStore::new(embedder());
    store.add(&corpus())?;
    store.add(&corpus())?;
    assert_eq!(store.len(), 8);
    assert_eq!(store.add(&[])?, 0);
    Ok(())
}

#[test]
fn memory_mmr_draws_from_pool_and_diversifies() -> anyhow::Result<()> {
    let store = InMemoryStore::new(embedder());
    store.add(&corpus())?;

    let diverse = store.max_marginal_relevance_search("sparse attention transformer memory", 2, 4, 0.0)?;
    assert_eq!(diverse.len(), 2);
    assert_eq!(diverse[0].chunk_id, "aaaaaaaaaaaa");
    assert_ne!(diverse[1].chunk_id, "bbbbbbbbbbbb", "near-duplicate is skipped");

    let relevant = store.max_marginal_relevance_search("sparse attention transformer memory", 2, 4, 1.0)?;
    assert_eq!(relevant[1].chunk_id, "bbbbbbbbbbbb");
    Ok(())
}

/// Hashing embedder that yields NaN components for texts mentioning "corrupt".
struct NanEmbedder(HashEmbedder);

impl Embedder for NanEmbedder {
    fn embedder_id(&self) -> &str {
        "nan-test"
    }

    fn dim(&self) -> usize {
        self.0.dim()
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| if t.contains("corrupt") { vec![f32::NAN; self.dim()] } else { self.0.embed_text(t) })
            .collect())
    }
}

#[test]
fn memory_search_survives_nan_distances() -> anyhow::Result<()> {
    let store = InMemoryStore::new(Arc::new(NanEmbedder(HashEmbedder::new(1024))));
    let mut chunks = corpus();
    chunks.insert(1, chunk("eeeeeeeeeeee", 5, "corrupt row"));
    store.add(&chunks)?;

    let hits = store.similarity_search_with_distance("sparse attention transformer memory", 5)?;
    assert_eq!(hits.len(), 5);
    let finite: Vec<&(Chunk, f32)> = hits.iter().filter(|(_, d)| !d.is_nan()).collect();
    assert_eq!(finite.len(), 4);
    assert_eq!(finite[0].0.chunk_id, "aaaaaaaaaaaa");
    assert!(finite.windows(2).all(|w| w[0].1 <= w[1].1), "finite distances stay ordered");
    Ok(())
}

#[test]
fn empty_memory_store_returns_nothing() -> anyhow::Result<()> {
    let store = InMemoryStore::new(embedder());
    assert!(store.similarity_search_with_distance("anything", 5)?.is_empty());
    assert!(store.max_marginal_relevance_search("anything", 2, 8, 0.5)?.is_empty());
    Ok(())
}

#[test]
fn lance_store_round_trips_chunks() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = LanceStore::open(&tmp.path().join("index"), "papers", embedder())?;
    assert!(!store.table_exists()?);
    assert!(store.similarity_search_with_distance("attention", 3)?.is_empty());

    store.add(&corpus())?;
    assert_eq!(store.count_rows()?, 4);

    let hits = store.similarity_search_with_distance("sparse attention transformer memory", 2)?;
    assert_eq!(hits.len(), 2);
    let (top, distance) = &hits[0];
    assert_eq!(top.chunk_id, "aaaaaaaaaaaa");
    assert_eq!(top.page_number, 1);
    assert_eq!(top.section_name, "Methods");
    assert_eq!(top.source_path, "/corpus/paper.pdf");
    assert!(*distance >= 0.0);

    let picked = store.max_marginal_relevance_search("attention", 3, 4, 0.5)?;
    let ids: HashSet<&str> = picked.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    Ok(())
}

#[test]
fn lance_reinsert_appends() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = LanceStore::open(tmp.path(), "papers", embedder())?;
    store.add(&corpus())?;
    store.add(&corpus())?;
    assert_eq!(store.count_rows()?, 8);
    Ok(())
}

//! LanceDB-backed chunk store.
//!
//! LanceDB is async; this store owns a tokio runtime and blocks on it so it
//! can sit behind the synchronous `VectorStore` trait.

use anyhow::{anyhow, Context, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;

use papercite_core::traits::{Embedder, VectorStore};
use papercite_core::types::Chunk;

use crate::mmr;
use crate::schema::build_arrow_schema;

const INSERT_BATCH: usize = 256;

/// A search hit with the stored embedding, needed for MMR.
struct Hit {
    chunk: Chunk,
    vector: Vec<f32>,
    distance: f32,
}

pub struct LanceStore {
    rt: Runtime,
    db: Connection,
    table_name: String,
    embedder: Arc<dyn Embedder>,
    show_progress: bool,
}

impl LanceStore {
    pub fn open(db_path: &Path, table_name: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        std::fs::create_dir_all(db_path).with_context(|| format!("creating {}", db_path.display()))?;
        let rt = Runtime::new()?;
        let uri = db_path.to_string_lossy().to_string();
        let db = rt.block_on(async { connect(&uri).execute().await })?;
        tracing::debug!(uri = %uri, table = table_name, "opened LanceDB");
        Ok(Self { rt, db, table_name: table_name.to_string(), embedder, show_progress: false })
    }

    /// Draw a progress bar on stderr while inserting.
    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn table_exists(&self) -> Result<bool> {
        let names = self.rt.block_on(async { self.db.table_names().execute().await })?;
        Ok(names.contains(&self.table_name))
    }

    pub fn count_rows(&self) -> Result<usize> {
        if !self.table_exists()? {
            return Ok(0);
        }
        self.rt.block_on(async {
            let table = self.db.open_table(&self.table_name).execute().await?;
            Ok::<_, anyhow::Error>(table.count_rows(None).await?)
        })
    }

    async fn insert_batch(&self, batch: RecordBatch) -> Result<()> {
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        if self.db.table_names().execute().await?.contains(&self.table_name) {
            self.db.open_table(&self.table_name).execute().await?.add(reader).execute().await?;
        } else {
            self.db.create_table(&self.table_name, reader).execute().await?;
        }
        Ok(())
    }

    fn to_record_batch(&self, chunks: &[Chunk], vectors: Vec<Vec<f32>>) -> Result<RecordBatch> {
        let dim = self.embedder.dim();
        if vectors.len() != chunks.len() {
            return Err(anyhow!("embedder returned {} vectors for {} chunks", vectors.len(), chunks.len()));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(anyhow!("expected {dim}-dim embeddings, got {}", bad.len()));
        }
        let mut page_numbers = Vec::with_capacity(chunks.len());
        let mut chunk_indices = Vec::with_capacity(chunks.len());
        for c in chunks {
            page_numbers.push(i32::try_from(c.page_number).context("page_number exceeds i32")?);
            chunk_indices.push(i32::try_from(c.chunk_index).context("chunk_index exceeds i32")?);
        }
        let vectors: Vec<Option<Vec<Option<f32>>>> =
            vectors.into_iter().map(|v| Some(v.into_iter().map(Some).collect())).collect();
        let dim = i32::try_from(dim).context("embedding dim exceeds i32")?;
        let batch = RecordBatch::try_new(
            build_arrow_schema(dim),
            vec![
                Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.chunk_id.as_str()))),
                Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.text.as_str()))),
                Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.source_file.as_str()))),
                Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.source_path.as_str()))),
                Arc::new(Int32Array::from(page_numbers)),
                Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.section_name.as_str()))),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
            ],
        )?;
        Ok(batch)
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embedder
            .embed_batch(&[query.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector for the query"))
    }

    /// Nearest `limit` rows, closest first. A missing table has no rows.
    fn search(&self, query_vec: Vec<f32>, limit: usize) -> Result<Vec<Hit>> {
        if limit == 0 || !self.table_exists()? {
            return Ok(Vec::new());
        }
        self.rt.block_on(async {
            let table = self.db.open_table(&self.table_name).execute().await?;
            let mut stream = table.vector_search(query_vec)?.limit(limit).execute().await?;
            let mut hits = Vec::new();
            while let Some(batch) = stream.try_next().await? {
                hits.extend(hits_from_batch(&batch)?);
            }
            Ok::<_, anyhow::Error>(hits)
        })
    }
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| anyhow!("LanceDB result is missing column '{name}'"))
}

fn hits_from_batch(batch: &RecordBatch) -> Result<Vec<Hit>> {
    let ids = column::<StringArray>(batch, "chunk_id")?;
    let texts = column::<StringArray>(batch, "text")?;
    let files = column::<StringArray>(batch, "source_file")?;
    let paths = column::<StringArray>(batch, "source_path")?;
    let pages = column::<Int32Array>(batch, "page_number")?;
    let sections = column::<StringArray>(batch, "section_name")?;
    let indices = column::<Int32Array>(batch, "chunk_index")?;
    let vectors = column::<FixedSizeListArray>(batch, "vector")?;
    let distances = column::<Float32Array>(batch, "_distance")?;

    (0..batch.num_rows())
        .map(|i| {
            let chunk = Chunk {
                chunk_id: ids.value(i).to_string(),
                text: texts.value(i).to_string(),
                source_file: files.value(i).to_string(),
                source_path: paths.value(i).to_string(),
                page_number: u32::try_from(pages.value(i)).context("negative page_number")?,
                section_name: sections.value(i).to_string(),
                chunk_index: usize::try_from(indices.value(i)).context("negative chunk_index")?,
            };
            let vector = vectors.value(i).as_primitive::<Float32Type>().values().to_vec();
            Ok(Hit { chunk, vector, distance: distances.value(i).max(0.0) })
        })
        .collect()
}

impl VectorStore for LanceStore {
    fn add(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let pb = if self.show_progress { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}",
                )?
                .progress_chars("#>-"),
        );
        for batch in chunks.chunks(INSERT_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;
            let record_batch = self.to_record_batch(batch, vectors)?;
            self.rt.block_on(self.insert_batch(record_batch))?;
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("indexed");
        tracing::info!(
            table = %self.table_name,
            rows = chunks.len(),
            embedder = self.embedder.embedder_id(),
            "inserted chunks"
        );
        Ok(chunks.len())
    }

    fn similarity_search_with_distance(&self, query: &str, k: usize) -> Result<Vec<(Chunk, f32)>> {
        let q = self.embed_query(query)?;
        Ok(self.search(q, k)?.into_iter().map(|h| (h.chunk, h.distance)).collect())
    }

    fn max_marginal_relevance_search(&self, query: &str, k: usize, fetch_k: usize, lambda: f32) -> Result<Vec<Chunk>> {
        let q = self.embed_query(query)?;
        let pool = self.search(q.clone(), fetch_k.max(k))?;
        let vectors: Vec<Vec<f32>> = pool.iter().map(|h| h.vector.clone()).collect();
        let picks = mmr::select(&q, &vectors, k, lambda);
        Ok(picks.into_iter().map(|i| pool[i].chunk.clone()).collect())
    }
}

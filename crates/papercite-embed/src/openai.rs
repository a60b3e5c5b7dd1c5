//! OpenAI-compatible `/embeddings` client (blocking).
//!
//! Works against any server speaking the same JSON shape; `base_url` comes
//! from `models.embeddings.base_url`.

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use papercite_core::config::{EmbeddingsConfig, OPENAI_API_KEY_ENV};
use papercite_core::traits::Embedder;

const MAX_BATCH: usize = 128;
const MAX_RETRIES: u32 = 2;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    dim: usize,
    id: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, config: &EmbeddingsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            dim: config.dim,
            id: format!("openai:{}:d{}", config.model, config.dim),
        })
    }

    /// Reads the API key from `OPENAI_API_KEY`.
    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        let api_key = std::env::var(OPENAI_API_KEY_ENV)
            .map_err(|_| anyhow!("{OPENAI_API_KEY_ENV} is not set"))?;
        Self::new(api_key, config)
    }

    fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_err = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                std::thread::sleep(Duration::from_millis(200 * 2u64.pow(attempt - 1)));
                tracing::debug!(attempt, "retrying embedding request");
            }
            match self.send(texts) {
                Ok(vectors) => return Ok(vectors),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "embedding request failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("embedding request failed")))
    }

    fn send(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbedRequest { model: &self.model, input: texts })
            .send()?
            .error_for_status()?;
        let body: EmbedResponse = response.json()?;
        decode_embeddings(body, texts.len(), self.dim)
    }
}

/// Vectors in input order. The server may return them in any order, so they
/// are sorted by `index`; count and dimension must match the request.
fn decode_embeddings(mut body: EmbedResponse, inputs: usize, dim: usize) -> Result<Vec<Vec<f32>>> {
    if body.data.len() != inputs {
        bail!("embedding response has {} vectors for {} inputs", body.data.len(), inputs);
    }
    body.data.sort_by_key(|d| d.index);
    body.data
        .into_iter()
        .map(|d| {
            if d.embedding.len() == dim {
                Ok(d.embedding)
            } else {
                Err(anyhow!("expected {dim}-dim embedding, got {}", d.embedding.len()))
            }
        })
        .collect()
}

impl Embedder for OpenAiEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            out.extend(self.request(batch)?);
        }
        Ok(out)
    }
}

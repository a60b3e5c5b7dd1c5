//! Subword tokenizers used to size chunk windows.
//!
//! The tokenizer is part of a chunk's identity: changing it changes window
//! boundaries and therefore every downstream `chunk_id`. Each codec reports a
//! stable `name` so indexing runs can record which one produced the ids.

use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;
use tokenizers::Tokenizer;

pub const CL100K_BASE: &str = "cl100k_base";

pub trait TokenCodec: Send + Sync {
    fn name(&self) -> &str;
    fn encode(&self, text: &str) -> Result<Vec<u32>>;
    fn decode(&self, ids: &[u32]) -> Result<String>;
}

/// OpenAI `cl100k_base` BPE, bundled with `tiktoken-rs` (no download).
pub struct Cl100kCodec {
    bpe: CoreBPE,
}

impl Cl100kCodec {
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| anyhow!("Failed to load {CL100K_BASE}: {e}"))?;
        Ok(Self { bpe })
    }
}

impl TokenCodec for Cl100kCodec {
    fn name(&self) -> &str {
        CL100K_BASE
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(self.bpe.encode_ordinary(text).into_iter().map(|t| t as u32).collect())
    }

    /// A window may start or end inside a multi-byte character; those bytes
    /// decode to U+FFFD instead of failing.
    fn decode(&self, ids: &[u32]) -> Result<String> {
        let ranks: Vec<usize> = ids.iter().map(|&t| t as usize).collect();
        let bytes = self.bpe._decode_native(&ranks);
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Hugging Face tokenizer loaded from a local `tokenizer.json`.
pub struct HfTokenizerCodec {
    tokenizer: Tokenizer,
    name: String,
}

impl HfTokenizerCodec {
    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))?;
        Ok(Self { tokenizer, name: format!("hf:{}", path.display()) })
    }
}

impl TokenCodec for HfTokenizerCodec {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let enc = self.tokenizer.encode(text, false).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        Ok(enc.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.tokenizer.decode(ids, false).map_err(|e| anyhow!("Detokenization failed: {}", e))
    }
}

/// Resolve the `chunking.tokenizer` setting: `cl100k_base` or `hf:<path>`.
pub fn codec_from_name(name: &str) -> Result<Arc<dyn TokenCodec>> {
    let name = name.trim();
    if name == CL100K_BASE {
        return Ok(Arc::new(Cl100kCodec::new()?));
    }
    if let Some(path) = name.strip_prefix("hf:") {
        return Ok(Arc::new(HfTokenizerCodec::from_file(Path::new(path))?));
    }
    Err(anyhow!("Unknown tokenizer '{name}' (expected '{CL100K_BASE}' or 'hf:<path>')"))
}

//! Configuration loader and the typed settings tree.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (nested keys split on `__`, e.g. `APP_RETRIEVAL__K`).
//! Loading validates the result, so malformed chunking parameters or missing
//! credentials stop the process at startup.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Loaded and validated application configuration.
///
/// Components never read this directly; the binaries hand each one the
/// sub-section it needs.
pub struct Config {
    figment: Figment,
    settings: Settings,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment_for_env(&current_env()))
    }

    /// Merged settings without validation, for commands that never reach a
    /// remote collaborator (and so need no credentials).
    pub fn load_unchecked() -> Result<Settings> {
        Ok(Self::figment_for_env(&current_env()).extract()?)
    }

    pub fn figment_for_env(env_name: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment.merge(Env::prefixed("APP_").split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Settings = figment.extract()?;
        settings.validate()?;
        Ok(Self { figment, settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        Ok(self.figment.extract_inner(key)?)
    }
}

fn current_env() -> String {
    env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathsConfig,
    pub chunking: ChunkingConfig,
    pub ingestion: IngestionConfig,
    pub retrieval: RetrievalConfig,
    pub prompts: PromptConfig,
    pub models: ModelsConfig,
    pub store: StoreConfig,
}

impl Settings {
    /// Structural checks plus credential presence in the process environment.
    pub fn validate(&self) -> Result<()> {
        self.validate_with(|name| env::var(name).ok())
    }

    pub fn validate_with<F>(&self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        self.prompts.validate()?;
        if self.models.embeddings.dim == 0 {
            return Err(Error::InvalidConfig("models.embeddings.dim must be >= 1".into()));
        }
        let needs_openai = self.models.embeddings.provider == EmbeddingProvider::Openai
            || self.models.llm.provider == LlmProvider::Openai;
        if needs_openai && lookup(OPENAI_API_KEY_ENV).map_or(true, |v| v.trim().is_empty()) {
            return Err(Error::MissingCredential(OPENAI_API_KEY_ENV.into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub papers_dir: String,
    pub index_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self { papers_dir: "data/papers".into(), index_dir: "data/index".into() }
    }
}

impl PathsConfig {
    pub fn papers_dir(&self) -> PathBuf {
        expand_path(&self.papers_dir)
    }

    pub fn index_dir(&self) -> PathBuf {
        expand_path(&self.index_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_tokens: usize,
    pub chunk_overlap_tokens: usize,
    pub min_chunk_tokens: usize,
    /// `cl100k_base`, or `hf:<path to tokenizer.json>`.
    pub tokenizer: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_tokens: 350, chunk_overlap_tokens: 60, min_chunk_tokens: 120, tokenizer: "cl100k_base".into() }
    }
}

impl ChunkingConfig {
    /// The sliding window only terminates when the overlap is smaller than
    /// the window, so that is rejected here rather than inside the loop.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_tokens == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_tokens must be >= 1".into()));
        }
        if self.chunk_overlap_tokens >= self.chunk_tokens {
            return Err(Error::InvalidConfig(format!(
                "chunking.chunk_overlap_tokens ({}) must be smaller than chunking.chunk_tokens ({})",
                self.chunk_overlap_tokens, self.chunk_tokens
            )));
        }
        if self.tokenizer.trim().is_empty() {
            return Err(Error::InvalidConfig("chunking.tokenizer must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub heading: HeadingRules,
}

/// Bounds for the heading-candidate heuristic applied to each page line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingRules {
    pub min_len: usize,
    pub max_len: usize,
    pub max_words: usize,
    pub require_no_period: bool,
}

impl Default for HeadingRules {
    fn default() -> Self {
        Self { min_len: 3, max_len: 80, max_words: 12, require_no_period: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub k: usize,
    pub use_mmr: bool,
    pub fetch_k: usize,
    pub lambda_mult: f32,
    pub min_similarity: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: 6, use_mmr: true, fetch_k: 24, lambda_mult: 0.5, min_similarity: 0.25 }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::InvalidConfig("retrieval.k must be >= 1".into()));
        }
        if self.fetch_k < self.k {
            return Err(Error::InvalidConfig(format!(
                "retrieval.fetch_k ({}) must be >= retrieval.k ({})",
                self.fetch_k, self.k
            )));
        }
        if !(0.0..=1.0).contains(&self.lambda_mult) {
            return Err(Error::InvalidConfig("retrieval.lambda_mult must be within [0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(Error::InvalidConfig("retrieval.min_similarity must be within [0, 1]".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub max_context_chunks: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self { max_context_chunks: 6 }
    }
}

impl PromptConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_context_chunks == 0 {
            return Err(Error::InvalidConfig("prompts.max_context_chunks must be >= 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub embeddings: EmbeddingsConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// Deterministic feature hashing; offline, no credentials.
    Hash,
    Openai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dim: usize,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Openai,
            model: "text-embedding-3-small".into(),
            dim: 1536,
            base_url: "https://api.openai.com/v1".into(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Openai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub temperature: f32,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Openai,
            model: "gpt-4o-mini".into(),
            temperature: 0.0,
            base_url: "https://api.openai.com/v1".into(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Lance,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { backend: StoreBackend::Lance, table: "papers".into() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

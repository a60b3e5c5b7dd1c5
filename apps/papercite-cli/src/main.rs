use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use papercite_core::config::{Config, Settings, StoreBackend};
use papercite_core::traits::VectorStore;
use papercite_core::types::Chunk;
use papercite_embed::embedder_from_config;
use papercite_ingest::{codec_from_name, discover_documents, load_pages, Chunker};
use papercite_rag::{language_model_from_config, AnswerPipeline, Retriever};
use papercite_vector::store_from_config;

#[derive(Parser)]
#[command(name = "papercite")]
#[command(about = "Citation-grounded question answering over scientific papers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and store every extracted paper under the papers directory
    Index {
        /// Overrides `paths.papers_dir`
        #[arg(long)]
        papers_dir: Option<PathBuf>,
        /// Delete the existing index before writing
        #[arg(long)]
        rebuild: bool,
    },
    /// Answer a question and print the result as JSON
    Ask {
        question: String,
        /// Overrides `retrieval.k`
        #[arg(short, long)]
        k: Option<usize>,
        /// Plain top-k retrieval instead of MMR
        #[arg(long)]
        no_mmr: bool,
    },
    /// Print the answer mode a question would use
    Route { question: String },
    /// Print the chunks produced for one extracted text file, one JSON object per line
    Chunk { file: PathBuf },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Route { question } => {
            println!("{}", papercite_core::route(&question).mode);
            Ok(())
        }
        Commands::Chunk { file } => {
            let settings = Config::load_unchecked()?;
            let chunks = chunk_file(&settings, &file)?;
            for chunk in &chunks {
                println!("{}", serde_json::to_string(chunk)?);
            }
            Ok(())
        }
        Commands::Index { papers_dir, rebuild } => {
            let config = Config::load().context("loading configuration")?;
            let settings = config.settings();
            let papers_dir = papers_dir.unwrap_or_else(|| settings.paths.papers_dir());
            let store = open_store(settings, rebuild)?;
            let added = index_dir(settings, &papers_dir, store.as_ref())?;
            tracing::info!(chunks = added, papers_dir = %papers_dir.display(), "indexing complete");
            Ok(())
        }
        Commands::Ask { question, k, no_mmr } => {
            let config = Config::load().context("loading configuration")?;
            let mut settings = config.settings().clone();
            if let Some(k) = k {
                settings.retrieval.k = k;
                settings.retrieval.fetch_k = settings.retrieval.fetch_k.max(k);
            }
            if no_mmr {
                settings.retrieval.use_mmr = false;
            }
            settings.retrieval.validate()?;

            let store = open_store(&settings, false)?;
            if settings.store.backend == StoreBackend::Memory {
                // Nothing persists between runs, so index in-process first.
                index_dir(&settings, &settings.paths.papers_dir(), store.as_ref())?;
            }
            let llm = language_model_from_config(&settings.models.llm)?;
            let pipeline =
                AnswerPipeline::new(Retriever::new(store, settings.retrieval.clone()), llm, &settings.prompts);
            let result = pipeline.answer(&question)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}

fn open_store(settings: &Settings, rebuild: bool) -> Result<Arc<dyn VectorStore>> {
    let index_dir = settings.paths.index_dir();
    if rebuild && settings.store.backend == StoreBackend::Lance && index_dir.exists() {
        tracing::info!(index_dir = %index_dir.display(), "removing existing index");
        fs::remove_dir_all(&index_dir).with_context(|| format!("removing {}", index_dir.display()))?;
    }
    let embedder = embedder_from_config(&settings.models.embeddings)?;
    store_from_config(&settings.store, &index_dir, embedder, true)
}

fn chunker(settings: &Settings) -> Result<Chunker> {
    let codec = codec_from_name(&settings.chunking.tokenizer)?;
    Chunker::new(codec, settings.chunking.clone())
}

fn chunk_file(settings: &Settings, file: &Path) -> Result<Vec<Chunk>> {
    let pages = load_pages(file, &settings.ingestion.heading)?;
    chunker(settings)?.chunk_pages(&pages)
}

fn index_dir(settings: &Settings, papers_dir: &Path, store: &dyn VectorStore) -> Result<usize> {
    let documents = discover_documents(papers_dir);
    if documents.is_empty() {
        tracing::warn!(papers_dir = %papers_dir.display(), "no .txt documents found");
        return Ok(0);
    }
    let chunker = chunker(settings)?;
    let mut chunks = Vec::new();
    for path in &documents {
        let pages = load_pages(path, &settings.ingestion.heading)?;
        let doc_chunks = chunker.chunk_pages(&pages)?;
        tracing::info!(document = %path.display(), pages = pages.len(), chunks = doc_chunks.len(), "chunked");
        chunks.extend(doc_chunks);
    }
    tracing::info!(
        documents = documents.len(),
        chunks = chunks.len(),
        tokenizer = chunker.codec_name(),
        "embedding and storing"
    );
    store.add(&chunks)
}

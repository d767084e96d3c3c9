//! Configuration parsing and validation.
//!
//! Reads a TOML file into [`Config`]. Every section and field has a default,
//! so an empty file (or no file at all) yields a working offline setup: the
//! hash embedder, a cosine collection named `repo_docs` under `./data/index`,
//! and an Ollama generator.
//!
//! # Example
//!
//! ```toml
//! [index]
//! persist_dir = "./data/index"
//! collection = "repo_docs"
//! metric = "cosine"
//!
//! [chunking]
//! chunk_size = 800
//! chunk_overlap = 100
//!
//! [retrieval]
//! top_k = 4
//!
//! [embedding]
//! provider = "ollama"
//! model = "all-minilm"
//! dims = 384
//!
//! [generation]
//! provider = "ollama"
//! model = "phi3:mini"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use repo_rag_core::chunk::{ChunkParams, SplitStrategy};
use repo_rag_core::store::DistanceMetric;

/// File name of the SQLite database inside `index.persist_dir`.
pub const INDEX_FILE: &str = "index.sqlite";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub metric: DistanceMetric,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            persist_dir: default_persist_dir(),
            collection: default_collection(),
            metric: DistanceMetric::default(),
        }
    }
}

fn default_persist_dir() -> PathBuf {
    PathBuf::from("./data/index")
}
fn default_collection() -> String {
    "repo_docs".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default)]
    pub strategy: SplitStrategy,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            strategy: SplitStrategy::default(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IndexingConfig {
    /// Skip files whose content hash matches what the index already holds.
    #[serde(default)]
    pub skip_unchanged: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for server-backed providers.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_embedding_retries(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_retries() -> u32 {
    5
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            url: None,
            max_retries: default_generation_retries(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_generation_provider() -> String {
    "ollama".to_string()
}
fn default_generation_model() -> String {
    "phi3:mini".to_string()
}
fn default_generation_retries() -> u32 {
    2
}
fn default_generation_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Path of the SQLite file backing the collection.
    pub fn db_path(&self) -> PathBuf {
        self.index.persist_dir.join(INDEX_FILE)
    }

    pub fn chunk_params(&self) -> Result<ChunkParams> {
        Ok(ChunkParams::new(
            self.chunking.chunk_size,
            self.chunking.chunk_overlap,
        )?)
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        self.chunk_params()
            .context("invalid [chunking] section")?;

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }

        if self.index.collection.trim().is_empty() {
            bail!("index.collection must not be empty");
        }

        match self.embedding.provider.as_str() {
            "hash" | "local" => {}
            "ollama" | "openai" => {
                if self.embedding.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
                if self.embedding.dims.unwrap_or(0) == 0 {
                    bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be hash, ollama, openai, or local.",
                other
            ),
        }
        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        match self.generation.provider.as_str() {
            "ollama" | "openai" | "disabled" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be ollama, openai, or disabled.",
                other
            ),
        }

        Ok(())
    }
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Load `path` if given, otherwise fall back to defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => Ok(Config::default()),
    }
}

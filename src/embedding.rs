//! Embedding provider implementations.
//!
//! All providers implement [`EmbeddingProvider`] from `repo-rag-core`:
//! - **[`HashEmbedder`]**: deterministic feature hashing, fully offline. The default.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`OpenAIEmbedder`]**: calls the OpenAI embeddings API with batching and retry.
//! - **`LocalEmbedder`**: runs ONNX models in-process via fastembed
//!   (feature `local-embeddings-fastembed`).
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the provider named in config:
//!
//! ```rust
//! # use repo_rag::config::EmbeddingConfig;
//! # use repo_rag::embedding::create_embedder;
//! let config = EmbeddingConfig::default(); // provider = "hash"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.dims(), 384);
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

use repo_rag_core::embedding::{normalize, EmbeddingProvider};
use repo_rag_core::RagError;

use crate::config::EmbeddingConfig;
use crate::http;

const DEFAULT_HASH_DIMS: usize = 384;
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

// ============ Hash Embedder ============

/// Offline embedder based on the hashing trick.
///
/// Text is lowercased and split into alphanumeric tokens. Each token's
/// SHA-256 digest picks a bucket and a sign; the bucket counts are then
/// L2-normalized. Texts that share vocabulary get similar vectors, which is
/// enough for keyword-level retrieval without a model download.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vec[bucket] += sign;
        }
        normalize(&mut vec);
        vec
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "feature-hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> repo_rag_core::Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }
}

// ============ Ollama Embedder ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST {url}/api/embed` (default `http://localhost:11434`).
/// Requires Ollama to be running with an embedding model pulled
/// (e.g. `ollama pull all-minilm`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    model: String,
    dims: usize,
    url: String,
    batch_size: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            model,
            dims,
            url,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> repo_rag_core::Result<Vec<f32>> {
        first_vector(self.embed_batch(&[text.to_string()]).await?)
    }

    async fn embed_batch(&self, texts: &[String]) -> repo_rag_core::Result<Vec<Vec<f32>>> {
        let url = http::endpoint(&self.url, "/api/embed");
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json =
                http::post_json(&self.client, &url, None, &body, self.max_retries, "Ollama").await?;
            let parsed = parse_ollama_response(&json)?;
            expect_count(&parsed, batch.len(), "Ollama")?;
            vectors.extend(parsed);
        }
        Ok(vectors)
    }
}

fn parse_ollama_response(json: &Value) -> repo_rag_core::Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| RagError::provider("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            let values = embedding.as_array().ok_or_else(|| {
                RagError::provider("Invalid Ollama response: embedding is not an array")
            })?;
            json_floats(values, "Ollama")
        })
        .collect()
}

// ============ OpenAI Embedder ============

/// Embedding provider using the OpenAI API (or any compatible server).
///
/// Calls `POST {url}/v1/embeddings`. Requires `OPENAI_API_KEY`.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    model: String,
    dims: usize,
    url: String,
    api_key: String,
    batch_size: usize,
    max_retries: u32,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            model,
            dims,
            url,
            api_key,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> repo_rag_core::Result<Vec<f32>> {
        first_vector(self.embed_batch(&[text.to_string()]).await?)
    }

    async fn embed_batch(&self, texts: &[String]) -> repo_rag_core::Result<Vec<Vec<f32>>> {
        let url = http::endpoint(&self.url, "/v1/embeddings");
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json = http::post_json(
                &self.client,
                &url,
                Some(&self.api_key),
                &body,
                self.max_retries,
                "OpenAI",
            )
            .await?;
            let parsed = parse_openai_response(&json)?;
            expect_count(&parsed, batch.len(), "OpenAI")?;
            vectors.extend(parsed);
        }
        Ok(vectors)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &Value) -> repo_rag_core::Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| RagError::provider("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| RagError::provider("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, json_floats(embedding, "OpenAI")?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

// ============ Local Embedder (fastembed) ============

/// In-process embeddings via fastembed. The model is downloaded from
/// Hugging Face on first use and cached; afterwards no network is needed.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: std::sync::Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        // Fail early on unknown names.
        config_to_fastembed_model(&model_name)?;
        let dims = config.dims.unwrap_or_else(|| default_local_dims(&model_name));

        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size.max(1),
            model: std::sync::Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> repo_rag_core::Result<Vec<f32>> {
        first_vector(self.embed_batch(&[text.to_string()]).await?)
    }

    async fn embed_batch(&self, texts: &[String]) -> repo_rag_core::Result<Vec<Vec<f32>>> {
        let slot = self.model.clone();
        let model_name = self.model_name.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = slot
                .lock()
                .map_err(|_| RagError::provider("local embedding model lock poisoned"))?;
            if guard.is_none() {
                let model = config_to_fastembed_model(&model_name).map_err(RagError::provider)?;
                let loaded = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(model).with_show_download_progress(false),
                )
                .map_err(|e| {
                    RagError::Provider(format!("Failed to initialize local embedding model: {}", e))
                })?;
                *guard = Some(loaded);
            }
            match guard.as_mut() {
                Some(model) => model
                    .embed(texts, Some(batch_size))
                    .map_err(|e| RagError::Provider(format!("Local embedding failed: {}", e))),
                None => Err(RagError::provider("local embedding model not loaded")),
            }
        })
        .await
        .map_err(RagError::provider)?
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn default_local_dims(model_name: &str) -> usize {
    match model_name {
        "bge-base-en-v1.5" | "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        _ => 384,
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5",
            other
        ),
    }
}

// ============ Helpers ============

fn json_floats(values: &[Value], service: &str) -> repo_rag_core::Result<Vec<f32>> {
    values
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                RagError::Provider(format!(
                    "Invalid {} response: embedding component {} is not a number",
                    service, v
                ))
            })
        })
        .collect()
}

fn expect_count(vectors: &[Vec<f32>], expected: usize, service: &str) -> repo_rag_core::Result<()> {
    if vectors.len() != expected {
        return Err(RagError::Provider(format!(
            "{} returned {} embeddings for {} inputs",
            service,
            vectors.len(),
            expected
        )));
    }
    Ok(())
}

fn first_vector(vectors: Vec<Vec<f32>>) -> repo_rag_core::Result<Vec<f32>> {
    vectors
        .into_iter()
        .next()
        .ok_or_else(|| RagError::provider("Empty embedding response"))
}

/// Create the [`EmbeddingProvider`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"hash"` | [`HashEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"local"` | `LocalEmbedder` (feature `local-embeddings-fastembed`) |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hash" => Ok(Box::new(HashEmbedder::new(
            config.dims.unwrap_or(DEFAULT_HASH_DIMS),
        ))),
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Box::new(OpenAIEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Box::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

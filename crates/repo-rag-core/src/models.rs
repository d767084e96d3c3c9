//! Core data models used throughout repo-rag.
//!
//! These types represent the documents, chunks, vector entries, and
//! pipeline results that flow from file paths to grounded answers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A source file read from disk. Re-read on every indexing pass.
#[derive(Debug, Clone)]
pub struct DocumentRef {
    pub source_path: String,
    pub content: String,
}

/// A position-ordered segment of a source document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub source_path: String,
    pub chunk_index: usize,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// The chunk's primary key in the vector index.
    pub fn id(&self) -> String {
        chunk_id(&self.source_path, self.chunk_index)
    }

    /// Metadata carried alongside the chunk's vector.
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source: self.source_path.clone(),
            chunk_index: self.chunk_index,
            ingested_at: format_ts(self.created_at),
        }
    }
}

/// Build the identity key for `(source_path, chunk_index)`.
pub fn chunk_id(source_path: &str, chunk_index: usize) -> String {
    format!("{}::chunk::{}", source_path, chunk_index)
}

/// Format a timestamp as ISO 8601 UTC with second precision.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Attribution data stored with every vector entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the file the chunk came from.
    pub source: String,
    pub chunk_index: usize,
    /// Time the chunk was written to the index (ISO 8601).
    pub ingested_at: String,
}

/// A row in the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// SHA-256 of the whole source file at ingest time, used to skip
    /// unchanged files when incremental indexing is enabled.
    pub content_hash: Option<String>,
}

impl VectorEntry {
    /// Pair a chunk with its embedding.
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>, content_hash: Option<String>) -> Self {
        Self {
            id: chunk.id(),
            embedding,
            text: chunk.text.clone(),
            metadata: chunk.metadata(),
            content_hash,
        }
    }
}

/// A ranked search result.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub entry: VectorEntry,
    /// Cosine similarity (higher is better) or L2 distance (lower is
    /// better), depending on the collection metric.
    pub score: f32,
}

/// A file-level problem recorded during indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexError {
    pub path: String,
    pub error: String,
}

/// Outcome of one indexing run. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub added_chunks: usize,
    pub skipped_files: usize,
    /// Files skipped because their content hash matched the index.
    #[serde(default)]
    pub unchanged_files: usize,
    pub errors: Vec<IndexError>,
}

impl IndexStats {
    pub fn record_error(&mut self, path: impl Into<String>, error: impl Into<String>) {
        self.errors.push(IndexError {
            path: path.into(),
            error: error.into(),
        });
    }
}

/// Chunk texts and metadata in rank order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Retrieved {
    pub documents: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
}

impl Retrieved {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// End-to-end answer with attribution and the index run that preceded it.
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<ChunkMetadata>,
    pub chunks: Vec<String>,
    pub index_stats: IndexStats,
}

/// One short description per file, independent of the vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileBrief {
    pub path: String,
    pub extension: String,
    pub brief: String,
}

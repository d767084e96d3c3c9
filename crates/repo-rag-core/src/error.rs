//! Error taxonomy for the chunking and retrieval engine.
//!
//! File-level problems ([`RagError::NotFound`], [`RagError::Read`], and
//! per-file [`RagError::Storage`]) are collected by the indexing pipeline
//! as data. Everything else terminates the current operation.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur while chunking, indexing, or retrieving.
#[derive(Error, Debug)]
pub enum RagError {
    /// Invalid parameters (chunk size/overlap, `top_k`, unknown provider).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A source file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A source file exists but could not be read as text.
    #[error("could not read {path}: {reason}")]
    Read { path: String, reason: String },

    /// Embedding dimensionality disagrees with the collection.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector index read or write failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedding or generation provider failure.
    #[error("Provider error: {0}")]
    Provider(String),
}

impl RagError {
    /// Construct a [`RagError::Config`] from anything displayable.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Construct a [`RagError::Storage`] from anything displayable.
    pub fn storage(msg: impl std::fmt::Display) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Construct a [`RagError::Provider`] from anything displayable.
    pub fn provider(msg: impl std::fmt::Display) -> Self {
        Self::Provider(msg.to_string())
    }

    /// Whether the indexing pipeline records this error per file instead of
    /// aborting the run.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Read { .. } | Self::Storage(_)
        )
    }
}

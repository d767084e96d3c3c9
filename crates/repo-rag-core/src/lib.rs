//! # repo-rag core
//!
//! I/O-free logic for repo-rag: data models, the error taxonomy, the
//! overlapping text chunker, the vector store abstraction with an in-memory
//! collection, similarity ranking, the retrieval pipeline, and the
//! embedding/generation capability traits.
//!
//! This crate contains no tokio, sqlx, filesystem, or network code.
//! Persistence and concrete providers live in the `repo-rag` app crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod store;

pub use error::{RagError, Result};
pub use retrieve::retrieve;

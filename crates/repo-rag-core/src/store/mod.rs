//! Vector store abstraction for repo-rag.
//!
//! A [`VectorStore`] is a handle to one named collection: a set of
//! [`VectorEntry`]s that share a dimensionality and a [`DistanceMetric`].
//! Backends: [`memory::InMemoryCollection`] here, and the SQLite-backed
//! collection in the app crate.
//!
//! # Contract
//!
//! | Method | Guarantee |
//! |--------|-----------|
//! | [`upsert`](VectorStore::upsert) | Inserts or overwrites by id; the whole batch applies or none of it does |
//! | [`query`](VectorStore::query) | At most `top_k` hits, best first, ties by insertion order |
//! | [`persist`](VectorStore::persist) | Flushes to durable storage; repeatable; failures are reported |
//!
//! Implementations must be `Send + Sync`. Writes to one collection are
//! serialized by the implementation; queries see a committed snapshot.

pub mod memory;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;

use crate::embedding::{cosine_similarity, l2_distance};
use crate::error::{RagError, Result};
use crate::models::{QueryHit, VectorEntry};

/// Similarity metric of a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity; higher scores rank first.
    #[default]
    Cosine,
    /// Euclidean distance; lower scores rank first.
    L2,
}

impl DistanceMetric {
    /// Score `candidate` against `query` under this metric.
    pub fn score(&self, query: &[f32], candidate: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(query, candidate),
            Self::L2 => l2_distance(query, candidate),
        }
    }

    /// Order two scores so that the better one comes first.
    pub fn compare(&self, a: f32, b: f32) -> Ordering {
        match self {
            Self::Cosine => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
            Self::L2 => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "l2" | "euclidean" => Ok(Self::L2),
            other => Err(RagError::Config(format!(
                "Unknown distance metric: '{}'. Use cosine or l2.",
                other
            ))),
        }
    }
}

/// Fixed properties of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub dims: usize,
    pub metric: DistanceMetric,
}

/// A stored entry together with its insertion sequence number.
///
/// `seq` is assigned on first insert and kept across overwrites, so it
/// orders entries by when their id first entered the collection.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub seq: u64,
    pub entry: VectorEntry,
}

/// Handle to one persistent or in-memory collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Name, dimensionality, and metric of the collection.
    fn info(&self) -> &CollectionInfo;

    /// Insert or overwrite entries by id, atomically per call.
    ///
    /// Fails with [`RagError::DimensionMismatch`] (applying nothing) if any
    /// vector's length differs from the collection's dims.
    async fn upsert(&self, entries: &[VectorEntry]) -> Result<()>;

    /// Return at most `top_k` entries ranked by similarity to `vector`.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryHit>>;

    /// Flush buffered state to durable storage.
    async fn persist(&self) -> Result<()>;

    /// Number of entries in the collection.
    async fn count(&self) -> Result<usize>;

    /// Fetch one entry by id.
    async fn get(&self, id: &str) -> Result<Option<VectorEntry>>;

    /// Content hash recorded for a source file, if any of its chunks exist.
    async fn source_hash(&self, source: &str) -> Result<Option<String>>;

    /// Delete chunks of `source` whose index is `>= keep`. Returns how many
    /// entries were removed.
    async fn remove_stale(&self, source: &str, keep: usize) -> Result<usize>;

    /// Write the full chunk list of `source` and drop its chunks with an
    /// index `>= entries.len()`, as one atomic step. Returns how many stale
    /// entries were removed.
    ///
    /// Readers never see the new chunks alongside stale ones, and a failure
    /// leaves the previous version of the source untouched.
    async fn replace_source(&self, source: &str, entries: &[VectorEntry]) -> Result<usize>;
}

/// Check every vector in a batch before anything is written.
pub fn validate_batch(info: &CollectionInfo, entries: &[VectorEntry]) -> Result<()> {
    for entry in entries {
        if entry.embedding.len() != info.dims {
            return Err(RagError::DimensionMismatch {
                expected: info.dims,
                actual: entry.embedding.len(),
            });
        }
        if entry.embedding.iter().any(|v| !v.is_finite()) {
            return Err(RagError::Storage(format!(
                "entry '{}' has a non-finite component",
                entry.id
            )));
        }
    }
    Ok(())
}

/// Validate a query before it reaches a backend.
pub fn validate_query(info: &CollectionInfo, vector: &[f32], top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(RagError::config("top_k must be >= 1"));
    }
    if vector.len() != info.dims {
        return Err(RagError::DimensionMismatch {
            expected: info.dims,
            actual: vector.len(),
        });
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(RagError::config("query vector has a non-finite component"));
    }
    Ok(())
}

/// Score, sort, and truncate candidates.
///
/// Sort order: better score first under `metric`, then lower `seq`
/// (earlier-inserted first).
pub fn rank_hits<I>(metric: DistanceMetric, query: &[f32], candidates: I, top_k: usize) -> Vec<QueryHit>
where
    I: IntoIterator<Item = StoredEntry>,
{
    let mut scored: Vec<(u64, QueryHit)> = candidates
        .into_iter()
        .map(|stored| {
            let score = metric.score(query, &stored.entry.embedding);
            (
                stored.seq,
                QueryHit {
                    entry: stored.entry,
                    score,
                },
            )
        })
        .collect();

    scored.sort_by(|(seq_a, a), (seq_b, b)| {
        metric
            .compare(a.score, b.score)
            .then_with(|| seq_a.cmp(seq_b))
    });
    scored.truncate(top_k);
    scored.into_iter().map(|(_, hit)| hit).collect()
}

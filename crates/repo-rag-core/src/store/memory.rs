//! In-memory [`VectorStore`] implementation for tests and ephemeral runs.
//!
//! Entries live in a `HashMap` behind `std::sync::RwLock`. Queries are a
//! brute-force scan over every stored vector. `persist` is a no-op.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::models::{QueryHit, VectorEntry};

use super::{
    rank_hits, validate_batch, validate_query, CollectionInfo, DistanceMetric, StoredEntry,
    VectorStore,
};

#[derive(Default)]
struct State {
    entries: HashMap<String, StoredEntry>,
    next_seq: u64,
}

impl State {
    fn insert(&mut self, entries: &[VectorEntry]) {
        for entry in entries {
            let seq = match self.entries.get(&entry.id) {
                Some(existing) => existing.seq,
                None => {
                    self.next_seq += 1;
                    self.next_seq
                }
            };
            self.entries.insert(
                entry.id.clone(),
                StoredEntry {
                    seq,
                    entry: entry.clone(),
                },
            );
        }
    }

    fn remove_stale(&mut self, source: &str, keep: usize) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, s| {
            s.entry.metadata.source != source || s.entry.metadata.chunk_index < keep
        });
        before - self.entries.len()
    }
}

/// A collection that never touches disk.
pub struct InMemoryCollection {
    info: CollectionInfo,
    state: RwLock<State>,
}

impl InMemoryCollection {
    pub fn new(name: impl Into<String>, dims: usize, metric: DistanceMetric) -> Result<Self> {
        if dims == 0 {
            return Err(RagError::config("collection dims must be >= 1"));
        }
        Ok(Self {
            info: CollectionInfo {
                name: name.into(),
                dims,
                metric,
            },
            state: RwLock::new(State::default()),
        })
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| RagError::storage("collection lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| RagError::storage("collection lock poisoned"))
    }
}

#[async_trait]
impl VectorStore for InMemoryCollection {
    fn info(&self) -> &CollectionInfo {
        &self.info
    }

    async fn upsert(&self, entries: &[VectorEntry]) -> Result<()> {
        validate_batch(&self.info, entries)?;
        self.write()?.insert(entries);
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryHit>> {
        validate_query(&self.info, vector, top_k)?;
        let state = self.read()?;
        Ok(rank_hits(
            self.info.metric,
            vector,
            state.entries.values().cloned(),
            top_k,
        ))
    }

    async fn persist(&self) -> Result<()> {
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.entries.len())
    }

    async fn get(&self, id: &str) -> Result<Option<VectorEntry>> {
        Ok(self.read()?.entries.get(id).map(|s| s.entry.clone()))
    }

    async fn source_hash(&self, source: &str) -> Result<Option<String>> {
        let state = self.read()?;
        let hash = state
            .entries
            .values()
            .filter(|s| s.entry.metadata.source == source)
            .min_by_key(|s| s.entry.metadata.chunk_index)
            .and_then(|s| s.entry.content_hash.clone());
        Ok(hash)
    }

    async fn remove_stale(&self, source: &str, keep: usize) -> Result<usize> {
        Ok(self.write()?.remove_stale(source, keep))
    }

    async fn replace_source(&self, source: &str, entries: &[VectorEntry]) -> Result<usize> {
        validate_batch(&self.info, entries)?;
        let mut state = self.write()?;
        state.insert(entries);
        Ok(state.remove_stale(source, entries.len()))
    }
}

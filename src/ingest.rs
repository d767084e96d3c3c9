//! Indexing pipeline: file paths → chunks → embeddings → vector index.
//!
//! Every call re-reads and re-embeds each supported file unless
//! [`IndexOptions::skip_unchanged`] is set. File-level problems are
//! collected in [`IndexStats::errors`]; the run continues with the next
//! path. Provider failures, dimension mismatches, and configuration errors
//! abort the run.

use std::io::ErrorKind;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};

use repo_rag_core::chunk::{chunk_document, content_hash, is_supported, ChunkParams, SplitStrategy};
use repo_rag_core::embedding::EmbeddingProvider;
use repo_rag_core::models::{DocumentRef, IndexStats, VectorEntry};
use repo_rag_core::store::VectorStore;
use repo_rag_core::{RagError, Result};

use crate::config::Config;

/// Error text recorded for a path that does not exist.
pub const NOT_FOUND: &str = "not found";
/// Error text recorded for a path that exists but yields no text.
pub const COULD_NOT_READ: &str = "could not read";

/// Knobs for one indexing run.
#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    pub params: ChunkParams,
    pub strategy: SplitStrategy,
    pub skip_unchanged: bool,
}

impl IndexOptions {
    pub fn new(params: ChunkParams) -> Self {
        Self {
            params,
            strategy: SplitStrategy::default(),
            skip_unchanged: false,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            params: config.chunk_params()?,
            strategy: config.chunking.strategy,
            skip_unchanged: config.indexing.skip_unchanged,
        })
    }
}

/// Outcome of reading one path.
enum FileRead {
    Unsupported,
    Failed(&'static str),
    Text(String),
}

/// Decode file bytes as UTF-8, dropping invalid sequences.
pub fn decode_text(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

async fn read_source(path: &str) -> FileRead {
    if !is_supported(path) {
        return FileRead::Unsupported;
    }
    match tokio::fs::read(Path::new(path)).await {
        Ok(bytes) => match decode_text(&bytes) {
            text if text.is_empty() => FileRead::Failed(COULD_NOT_READ),
            text => FileRead::Text(text),
        },
        Err(e) if e.kind() == ErrorKind::NotFound => FileRead::Failed(NOT_FOUND),
        Err(e) => {
            debug!(path, error = %e, "read failed");
            FileRead::Failed(COULD_NOT_READ)
        }
    }
}

/// Index `paths` into `collection`.
///
/// For each path, in order: unsupported extensions are counted in
/// `skipped_files`; missing or unreadable files are recorded as errors;
/// everything else is chunked, embedded in one batch, and upserted under ids
/// `"{path}::chunk::{i}"`. Chunks left over from a longer previous version
/// of the file are removed. The collection is persisted once at the end.
pub async fn index_files<S, E>(
    paths: &[String],
    collection: &S,
    embedder: &E,
    options: &IndexOptions,
) -> Result<IndexStats>
where
    S: VectorStore + ?Sized,
    E: EmbeddingProvider + ?Sized,
{
    let mut stats = IndexStats::default();
    info!(
        files = paths.len(),
        collection = %collection.info().name,
        model = embedder.model_name(),
        "indexing started"
    );

    for path in paths {
        let content = match read_source(path).await {
            FileRead::Unsupported => {
                debug!(path = %path, "skipping unsupported file");
                stats.skipped_files += 1;
                continue;
            }
            FileRead::Failed(reason) => {
                warn!(path = %path, reason, "file not indexed");
                stats.record_error(path.as_str(), reason);
                continue;
            }
            FileRead::Text(content) => content,
        };

        let hash = content_hash(&content);
        if options.skip_unchanged {
            match collection.source_hash(path).await {
                Ok(Some(stored)) if stored == hash => {
                    debug!(path = %path, "unchanged, skipping");
                    stats.unchanged_files += 1;
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    record_or_abort(&mut stats, path, e)?;
                    continue;
                }
            }
        }

        let doc = DocumentRef {
            source_path: path.clone(),
            content,
        };
        let chunks = chunk_document(&doc, &options.params, options.strategy, Utc::now());
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        let vectors = embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::Provider(format!(
                "embedder returned {} vectors for {} chunks of {}",
                vectors.len(),
                chunks.len(),
                path
            )));
        }

        let entries: Vec<VectorEntry> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorEntry::from_chunk(chunk, vector, Some(hash.clone())))
            .collect();

        match collection.replace_source(path, &entries).await {
            Ok(0) => {}
            Ok(removed) => debug!(path = %path, removed, "dropped stale chunks"),
            Err(e) => {
                record_or_abort(&mut stats, path, e)?;
                continue;
            }
        }
        stats.added_chunks += entries.len();

        debug!(path = %path, chunks = entries.len(), "indexed");
    }

    if let Err(e) = collection.persist().await {
        warn!(error = %e, "persist failed");
        stats.record_error(collection.info().name.as_str(), e.to_string());
    }

    info!(
        added_chunks = stats.added_chunks,
        skipped_files = stats.skipped_files,
        unchanged_files = stats.unchanged_files,
        errors = stats.errors.len(),
        "indexing finished"
    );
    Ok(stats)
}

/// Record a per-file error, or return it if it must abort the run.
fn record_or_abort(stats: &mut IndexStats, path: &str, err: RagError) -> Result<()> {
    if err.is_per_file() {
        warn!(path, error = %err, "file not indexed");
        stats.record_error(path, err.to_string());
        Ok(())
    } else {
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use repo_rag_core::models::QueryHit;
    use repo_rag_core::store::memory::InMemoryCollection;
    use repo_rag_core::store::{CollectionInfo, DistanceMetric};
    use tempfile::TempDir;

    use crate::embedding::HashEmbedder;

    fn options() -> IndexOptions {
        IndexOptions::new(ChunkParams::new(800, 100).unwrap())
    }

    #[tokio::test]
    async fn test_unsupported_and_missing_files() {
        let tmp = TempDir::new().unwrap();
        let image = tmp.path().join("logo.png");
        std::fs::write(&image, [0u8, 1, 2]).unwrap();
        let missing = tmp.path().join("missing.py").display().to_string();

        let collection = InMemoryCollection::new("repo_docs", 32, DistanceMetric::Cosine).unwrap();
        let stats = index_files(
            &[image.display().to_string(), missing.clone()],
            &collection,
            &HashEmbedder::new(32),
            &options(),
        )
        .await
        .unwrap();

        assert_eq!(stats.added_chunks, 0);
        assert_eq!(stats.skipped_files, 1);
        assert_eq!(stats.errors.len(), 1);
        assert_eq!(stats.errors[0].path, missing);
        assert_eq!(stats.errors[0].error, NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_file_could_not_read() {
        let tmp = TempDir::new().unwrap();
        let empty = tmp.path().join("empty.md");
        std::fs::write(&empty, "").unwrap();

        let collection = InMemoryCollection::new("repo_docs", 32, DistanceMetric::Cosine).unwrap();
        let stats = index_files(
            &[empty.display().to_string()],
            &collection,
            &HashEmbedder::new(32),
            &options(),
        )
        .await
        .unwrap();
        assert_eq!(stats.errors[0].error, COULD_NOT_READ);
        assert_eq!(collection.count().await.unwrap(), 0);
    }

    #[test]
    fn test_decode_text_drops_invalid_bytes() {
        assert_eq!(decode_text(b"ok\xff\xfe notes"), "ok notes");
        assert_eq!(decode_text("caf\u{e9}".as_bytes()), "caf\u{e9}");
        assert_eq!(decode_text(&[0xff, 0xfe, 0xfd]), "");
    }

    #[tokio::test]
    async fn test_only_invalid_bytes_could_not_read() {
        let tmp = TempDir::new().unwrap();
        let garbage = tmp.path().join("garbage.txt");
        std::fs::write(&garbage, [0xffu8, 0xfe, 0xc0]).unwrap();

        let collection = InMemoryCollection::new("repo_docs", 32, DistanceMetric::Cosine).unwrap();
        let stats = index_files(
            &[garbage.display().to_string()],
            &collection,
            &HashEmbedder::new(32),
            &options(),
        )
        .await
        .unwrap();
        assert_eq!(stats.errors[0].error, COULD_NOT_READ);
        assert_eq!(collection.count().await.unwrap(), 0);
    }

    /// Delegates reads, fails every source write.
    struct ReadOnlyCollection(InMemoryCollection);

    #[async_trait]
    impl VectorStore for ReadOnlyCollection {
        fn info(&self) -> &CollectionInfo {
            self.0.info()
        }
        async fn upsert(&self, _entries: &[VectorEntry]) -> Result<()> {
            Err(RagError::storage("database is read-only"))
        }
        async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryHit>> {
            self.0.query(vector, top_k).await
        }
        async fn persist(&self) -> Result<()> {
            Ok(())
        }
        async fn count(&self) -> Result<usize> {
            self.0.count().await
        }
        async fn get(&self, id: &str) -> Result<Option<VectorEntry>> {
            self.0.get(id).await
        }
        async fn source_hash(&self, source: &str) -> Result<Option<String>> {
            self.0.source_hash(source).await
        }
        async fn remove_stale(&self, _source: &str, _keep: usize) -> Result<usize> {
            Err(RagError::storage("database is read-only"))
        }
        async fn replace_source(&self, _source: &str, _entries: &[VectorEntry]) -> Result<usize> {
            Err(RagError::storage("database is read-only"))
        }
    }

    #[tokio::test]
    async fn test_failed_write_is_not_counted_as_added() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.py");
        std::fs::write(&file, "print('hello')").unwrap();
        let path = file.display().to_string();

        let collection = ReadOnlyCollection(
            InMemoryCollection::new("repo_docs", 32, DistanceMetric::Cosine).unwrap(),
        );
        let stats = index_files(
            &[path.clone()],
            &collection,
            &HashEmbedder::new(32),
            &options(),
        )
        .await
        .unwrap();

        assert_eq!(stats.added_chunks, 0);
        assert_eq!(stats.errors.len(), 1);
        assert_eq!(stats.errors[0].path, path);
        assert!(stats.errors[0].error.contains("read-only"));
    }

    #[tokio::test]
    async fn test_wrong_embedder_dims_abort() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.py");
        std::fs::write(&file, "print('hello')").unwrap();

        let collection = InMemoryCollection::new("repo_docs", 16, DistanceMetric::Cosine).unwrap();
        let err = index_files(
            &[file.display().to_string()],
            &collection,
            &HashEmbedder::new(32),
            &options(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 16,
                actual: 32
            }
        ));
    }
}

//! SQLite-backed [`VectorStore`] implementation.
//!
//! All collections in a persist directory share one `index.sqlite` file.
//! Each collection's dimensionality and metric are recorded in the
//! `collections` table on first open and checked on every later open.
//!
//! Entries are durable as soon as [`upsert`](VectorStore::upsert) returns:
//! every batch is one committed transaction. [`persist`](VectorStore::persist)
//! additionally checkpoints the WAL into the main database file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use repo_rag_core::embedding::{blob_to_vec, vec_to_blob};
use repo_rag_core::models::{ChunkMetadata, QueryHit, VectorEntry};
use repo_rag_core::store::{
    rank_hits, validate_batch, validate_query, CollectionInfo, DistanceMetric, StoredEntry,
    VectorStore,
};
use repo_rag_core::{RagError, Result};

use crate::config::INDEX_FILE;
use crate::{db, migrate};

/// A named collection persisted in SQLite.
pub struct SqliteCollection {
    pool: SqlitePool,
    info: CollectionInfo,
    db_path: PathBuf,
}

impl SqliteCollection {
    /// Open the collection `name` under `persist_dir`, creating the
    /// database, schema, and collection record if absent.
    ///
    /// Reopening with different `dims` fails with
    /// [`RagError::DimensionMismatch`]; a different metric fails with
    /// [`RagError::Config`].
    pub async fn open_or_create(
        persist_dir: &Path,
        name: &str,
        dims: usize,
        metric: DistanceMetric,
    ) -> Result<Self> {
        if dims == 0 {
            return Err(RagError::config("collection dims must be >= 1"));
        }
        let pool = Self::connect(persist_dir).await?;

        sqlx::query(
            r#"
            INSERT INTO collections (name, dims, metric, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(dims as i64)
        .bind(metric.as_str())
        .bind(chrono::Utc::now().timestamp())
        .execute(&pool)
        .await
        .map_err(RagError::storage)?;

        let stored = load_info(&pool, name)
            .await?
            .ok_or_else(|| RagError::storage(format!("collection '{}' missing after create", name)))?;

        if stored.dims != dims {
            return Err(RagError::DimensionMismatch {
                expected: stored.dims,
                actual: dims,
            });
        }
        if stored.metric != metric {
            return Err(RagError::Config(format!(
                "collection '{}' uses metric {}, not {}",
                name, stored.metric, metric
            )));
        }

        debug!(collection = name, dims, %metric, "opened collection");
        Ok(Self {
            pool,
            info: stored,
            db_path: persist_dir.join(INDEX_FILE),
        })
    }

    /// Open an existing collection without knowing its dims. Returns
    /// `None` if the collection has never been created.
    pub async fn open_existing(persist_dir: &Path, name: &str) -> Result<Option<Self>> {
        if !persist_dir.join(INDEX_FILE).exists() {
            return Ok(None);
        }
        let pool = Self::connect(persist_dir).await?;
        Ok(load_info(&pool, name).await?.map(|info| Self {
            pool,
            info,
            db_path: persist_dir.join(INDEX_FILE),
        }))
    }

    async fn connect(persist_dir: &Path) -> Result<SqlitePool> {
        let pool = db::connect(persist_dir)
            .await
            .map_err(|e| RagError::Storage(format!("{:#}", e)))?;
        migrate::run_migrations(&pool)
            .await
            .map_err(|e| RagError::Storage(format!("{:#}", e)))?;
        Ok(pool)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Number of distinct source files with at least one entry.
    pub async fn source_count(&self) -> Result<usize> {
        let n: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT source) FROM entries WHERE collection = ?")
                .bind(&self.info.name)
                .fetch_one(&self.pool)
                .await
                .map_err(RagError::storage)?;
        Ok(n as usize)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn load_info(pool: &SqlitePool, name: &str) -> Result<Option<CollectionInfo>> {
    let row = sqlx::query("SELECT dims, metric FROM collections WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(RagError::storage)?;

    match row {
        Some(row) => {
            let dims: i64 = row.get("dims");
            let metric: String = row.get("metric");
            Ok(Some(CollectionInfo {
                name: name.to_string(),
                dims: dims as usize,
                metric: metric.parse()?,
            }))
        }
        None => Ok(None),
    }
}

fn row_to_stored(row: &SqliteRow) -> StoredEntry {
    let seq: i64 = row.get("seq");
    let chunk_index: i64 = row.get("chunk_index");
    let blob: Vec<u8> = row.get("embedding");
    StoredEntry {
        seq: seq as u64,
        entry: VectorEntry {
            id: row.get("id"),
            embedding: blob_to_vec(&blob),
            text: row.get("text"),
            metadata: ChunkMetadata {
                source: row.get("source"),
                chunk_index: chunk_index as usize,
                ingested_at: row.get("ingested_at"),
            },
            content_hash: row.get("content_hash"),
        },
    }
}

#[async_trait]
impl VectorStore for SqliteCollection {
    fn info(&self) -> &CollectionInfo {
        &self.info
    }

    async fn upsert(&self, entries: &[VectorEntry]) -> Result<()> {
        validate_batch(&self.info, entries)?;
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(RagError::storage)?;
        insert_entries(&mut tx, &self.info.name, entries).await?;
        tx.commit().await.map_err(RagError::storage)?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryHit>> {
        validate_query(&self.info, vector, top_k)?;

        let rows = sqlx::query(
            r#"
            SELECT id, seq, source, chunk_index, text, embedding, ingested_at, content_hash
            FROM entries
            WHERE collection = ?
            "#,
        )
        .bind(&self.info.name)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::storage)?;

        Ok(rank_hits(
            self.info.metric,
            vector,
            rows.iter().map(row_to_stored),
            top_k,
        ))
    }

    async fn persist(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(PASSIVE)")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                RagError::Storage(format!(
                    "failed to persist {}: {}",
                    self.db_path.display(),
                    e
                ))
            })?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection = ?")
            .bind(&self.info.name)
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::storage)?;
        Ok(n as usize)
    }

    async fn get(&self, id: &str) -> Result<Option<VectorEntry>> {
        let row = sqlx::query(
            r#"
            SELECT id, seq, source, chunk_index, text, embedding, ingested_at, content_hash
            FROM entries
            WHERE collection = ? AND id = ?
            "#,
        )
        .bind(&self.info.name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RagError::storage)?;

        Ok(row.map(|r| row_to_stored(&r).entry))
    }

    async fn source_hash(&self, source: &str) -> Result<Option<String>> {
        let hash: Option<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT content_hash FROM entries
            WHERE collection = ? AND source = ?
            ORDER BY chunk_index ASC
            LIMIT 1
            "#,
        )
        .bind(&self.info.name)
        .bind(source)
        .fetch_optional(&self.pool)
        .await
        .map_err(RagError::storage)?;

        Ok(hash.flatten())
    }

    async fn remove_stale(&self, source: &str, keep: usize) -> Result<usize> {
        let mut conn = self.pool.acquire().await.map_err(RagError::storage)?;
        delete_stale(&mut conn, &self.info.name, source, keep).await
    }

    async fn replace_source(&self, source: &str, entries: &[VectorEntry]) -> Result<usize> {
        validate_batch(&self.info, entries)?;

        let mut tx = self.pool.begin().await.map_err(RagError::storage)?;
        insert_entries(&mut tx, &self.info.name, entries).await?;
        let removed = delete_stale(&mut tx, &self.info.name, source, entries.len()).await?;
        tx.commit().await.map_err(RagError::storage)?;
        Ok(removed)
    }
}

async fn insert_entries(
    conn: &mut SqliteConnection,
    collection: &str,
    entries: &[VectorEntry],
) -> Result<()> {
    // seq is only assigned on first insert; overwrites keep their place.
    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO entries (collection, id, seq, source, chunk_index, text,
                                 embedding, ingested_at, content_hash)
            VALUES (?, ?,
                    (SELECT COALESCE(MAX(seq), 0) + 1 FROM entries WHERE collection = ?),
                    ?, ?, ?, ?, ?, ?)
            ON CONFLICT(collection, id) DO UPDATE SET
                source = excluded.source,
                chunk_index = excluded.chunk_index,
                text = excluded.text,
                embedding = excluded.embedding,
                ingested_at = excluded.ingested_at,
                content_hash = excluded.content_hash
            "#,
        )
        .bind(collection)
        .bind(&entry.id)
        .bind(collection)
        .bind(&entry.metadata.source)
        .bind(entry.metadata.chunk_index as i64)
        .bind(&entry.text)
        .bind(vec_to_blob(&entry.embedding))
        .bind(&entry.metadata.ingested_at)
        .bind(&entry.content_hash)
        .execute(&mut *conn)
        .await
        .map_err(RagError::storage)?;
    }
    Ok(())
}

async fn delete_stale(
    conn: &mut SqliteConnection,
    collection: &str,
    source: &str,
    keep: usize,
) -> Result<usize> {
    let result = sqlx::query(
        "DELETE FROM entries WHERE collection = ? AND source = ? AND chunk_index >= ?",
    )
    .bind(collection)
    .bind(source)
    .bind(keep as i64)
    .execute(&mut *conn)
    .await
    .map_err(RagError::storage)?;

    Ok(result.rows_affected() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(source: &str, idx: usize, text: &str, embedding: Vec<f32>) -> VectorEntry {
        VectorEntry {
            id: repo_rag_core::models::chunk_id(source, idx),
            embedding,
            text: text.to_string(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                chunk_index: idx,
                ingested_at: "2024-01-01T00:00:00Z".to_string(),
            },
            content_hash: Some("abc".to_string()),
        }
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let c = SqliteCollection::open_or_create(tmp.path(), "repo_docs", 2, DistanceMetric::Cosine)
                .await
                .unwrap();
            c.upsert(&[
                entry("a.py", 0, "alpha", vec![1.0, 0.0]),
                entry("b.md", 0, "beta", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
            c.persist().await.unwrap();
            c.persist().await.unwrap();
            c.close().await;
        }

        let c = SqliteCollection::open_or_create(tmp.path(), "repo_docs", 2, DistanceMetric::Cosine)
            .await
            .unwrap();
        assert_eq!(c.count().await.unwrap(), 2);
        let hits = c.query(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].entry.text, "beta");
        assert_eq!(hits[0].entry.metadata.source, "b.md");
        assert_eq!(hits[0].entry.embedding, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_reopen_with_other_dims_fails() {
        let tmp = TempDir::new().unwrap();
        SqliteCollection::open_or_create(tmp.path(), "repo_docs", 3, DistanceMetric::Cosine)
            .await
            .unwrap()
            .close()
            .await;

        let err = SqliteCollection::open_or_create(tmp.path(), "repo_docs", 4, DistanceMetric::Cosine)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 3,
                actual: 4
            }
        ));

        let err = SqliteCollection::open_or_create(tmp.path(), "repo_docs", 3, DistanceMetric::L2)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_row_and_order() {
        let tmp = TempDir::new().unwrap();
        let c = SqliteCollection::open_or_create(tmp.path(), "repo_docs", 2, DistanceMetric::Cosine)
            .await
            .unwrap();
        c.upsert(&[
            entry("first.md", 0, "first", vec![1.0, 0.0]),
            entry("second.md", 0, "second", vec![1.0, 0.0]),
        ])
        .await
        .unwrap();
        c.upsert(&[entry("first.md", 0, "first v2", vec![1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(c.count().await.unwrap(), 2);
        let hits = c.query(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].entry.text, "first v2");
        assert_eq!(hits[1].entry.text, "second");
    }

    #[tokio::test]
    async fn test_bad_batch_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let c = SqliteCollection::open_or_create(tmp.path(), "repo_docs", 2, DistanceMetric::Cosine)
            .await
            .unwrap();
        let err = c
            .upsert(&[
                entry("a.py", 0, "ok", vec![1.0, 0.0]),
                entry("a.py", 1, "bad", vec![1.0]),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { .. }));
        assert_eq!(c.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let a = SqliteCollection::open_or_create(tmp.path(), "a", 2, DistanceMetric::Cosine)
            .await
            .unwrap();
        let b = SqliteCollection::open_or_create(tmp.path(), "b", 3, DistanceMetric::L2)
            .await
            .unwrap();
        a.upsert(&[entry("x.md", 0, "x", vec![1.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(a.count().await.unwrap(), 1);
        assert_eq!(b.count().await.unwrap(), 0);
        assert!(b.query(&[0.0, 0.0, 0.0], 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_stale_and_hash() {
        let tmp = TempDir::new().unwrap();
        let c = SqliteCollection::open_or_create(tmp.path(), "repo_docs", 2, DistanceMetric::Cosine)
            .await
            .unwrap();
        c.upsert(&[
            entry("a.py", 0, "zero", vec![1.0, 0.0]),
            entry("a.py", 1, "one", vec![1.0, 0.0]),
            entry("a.py", 2, "two", vec![1.0, 0.0]),
        ])
        .await
        .unwrap();

        assert_eq!(c.remove_stale("a.py", 1).await.unwrap(), 2);
        assert_eq!(c.count().await.unwrap(), 1);
        assert_eq!(c.source_count().await.unwrap(), 1);
        assert_eq!(c.source_hash("a.py").await.unwrap().as_deref(), Some("abc"));
        assert_eq!(c.source_hash("nope.py").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_replace_source_drops_stale_in_same_write() {
        let tmp = TempDir::new().unwrap();
        let c = SqliteCollection::open_or_create(tmp.path(), "repo_docs", 2, DistanceMetric::Cosine)
            .await
            .unwrap();
        c.upsert(&[
            entry("a.py", 0, "zero", vec![1.0, 0.0]),
            entry("a.py", 1, "one", vec![1.0, 0.0]),
            entry("a.py", 2, "two", vec![1.0, 0.0]),
            entry("b.py", 0, "other", vec![0.0, 1.0]),
        ])
        .await
        .unwrap();

        let removed = c
            .replace_source(
                "a.py",
                &[
                    entry("a.py", 0, "zero v2", vec![1.0, 0.0]),
                    entry("a.py", 1, "one v2", vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(c.count().await.unwrap(), 3);
        assert!(c.get("a.py::chunk::2").await.unwrap().is_none());
        assert_eq!(c.get("a.py::chunk::1").await.unwrap().unwrap().text, "one v2");

        let err = c
            .replace_source("a.py", &[entry("a.py", 0, "bad", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { .. }));
        assert_eq!(c.count().await.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_serialize() {
        let tmp = TempDir::new().unwrap();
        let c = std::sync::Arc::new(
            SqliteCollection::open_or_create(tmp.path(), "repo_docs", 2, DistanceMetric::Cosine)
                .await
                .unwrap(),
        );

        let mut handles = Vec::new();
        for task in 0..16 {
            let c = c.clone();
            handles.push(tokio::spawn(async move {
                let batch: Vec<VectorEntry> = (0..200)
                    .map(|i| entry("shared.md", i, &format!("task {task} chunk {i}"), vec![1.0, 0.0]))
                    .collect();
                c.upsert(&batch).await
            }));
        }

        let mut errors = Vec::new();
        for handle in handles {
            if let Err(e) = handle.await.unwrap() {
                errors.push(e.to_string());
            }
        }
        assert!(errors.is_empty(), "errors: {:?}", errors);
        assert_eq!(c.count().await.unwrap(), 200);
        assert_eq!(c.source_count().await.unwrap(), 1);
        assert_eq!(c.query(&[1.0, 0.0], 500).await.unwrap().len(), 200);
    }

    #[tokio::test]
    async fn test_open_existing_missing() {
        let tmp = TempDir::new().unwrap();
        assert!(SqliteCollection::open_existing(tmp.path(), "repo_docs")
            .await
            .unwrap()
            .is_none());
    }
}

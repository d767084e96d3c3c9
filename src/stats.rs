//! Index statistics and health overview.
//!
//! Summarizes what the configured collection holds: entry and source
//! counts, dimensionality, metric, and the on-disk size of the database.
//! Used by `repo-rag stats`.

use anyhow::Result;
use serde::Serialize;

use repo_rag_core::store::VectorStore;

use crate::config::Config;
use crate::sqlite_store::SqliteCollection;

/// Snapshot of one collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub collection: String,
    pub metric: String,
    pub dims: usize,
    pub entries: usize,
    pub sources: usize,
    pub db_bytes: u64,
}

/// Gather stats for the configured collection, or `None` if it has not
/// been created yet.
pub async fn collect_stats(config: &Config) -> Result<Option<CollectionStats>> {
    let collection =
        match SqliteCollection::open_existing(&config.index.persist_dir, &config.index.collection)
            .await?
        {
            Some(c) => c,
            None => return Ok(None),
        };

    let info = collection.info().clone();
    let stats = CollectionStats {
        collection: info.name,
        metric: info.metric.to_string(),
        dims: info.dims,
        entries: collection.count().await?,
        sources: collection.source_count().await?,
        db_bytes: std::fs::metadata(collection.db_path())
            .map(|m| m.len())
            .unwrap_or(0),
    };
    collection.close().await;
    Ok(Some(stats))
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let db_path = config.db_path();

    println!("repo-rag: index stats");
    println!("=====================");
    println!();
    println!("  Database:    {}", db_path.display());

    let stats = match collect_stats(config).await? {
        Some(stats) => stats,
        None => {
            println!(
                "  Collection '{}' does not exist yet. Run `repo-rag index` first.",
                config.index.collection
            );
            println!();
            return Ok(());
        }
    };

    println!("  Size:        {}", format_bytes(stats.db_bytes));
    println!();
    println!("  Collection:  {}", stats.collection);
    println!("  Metric:      {}", stats.metric);
    println!("  Dimensions:  {}", stats.dims);
    println!("  Entries:     {}", stats.entries);
    println!("  Sources:     {}", stats.sources);
    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repo_rag_core::models::{ChunkMetadata, VectorEntry};
    use repo_rag_core::store::DistanceMetric;
    use tempfile::TempDir;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[tokio::test]
    async fn test_collect_stats() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.index.persist_dir = tmp.path().to_path_buf();
        assert!(collect_stats(&config).await.unwrap().is_none());

        let c = SqliteCollection::open_or_create(tmp.path(), "repo_docs", 2, DistanceMetric::L2)
            .await
            .unwrap();
        let entry = |source: &str, idx: usize| VectorEntry {
            id: repo_rag_core::models::chunk_id(source, idx),
            embedding: vec![0.5, 0.5],
            text: "t".to_string(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                chunk_index: idx,
                ingested_at: "2024-01-01T00:00:00Z".to_string(),
            },
            content_hash: None,
        };
        c.upsert(&[entry("a.md", 0), entry("a.md", 1), entry("b.md", 0)])
            .await
            .unwrap();
        c.close().await;

        let stats = collect_stats(&config).await.unwrap().unwrap();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.sources, 2);
        assert_eq!(stats.dims, 2);
        assert_eq!(stats.metric, "l2");
    }
}

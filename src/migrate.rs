use anyhow::Result;
use sqlx::SqlitePool;

/// Create the index schema if it does not exist yet. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // One row per named collection; dims and metric are fixed at creation.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            dims INTEGER NOT NULL,
            metric TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            source TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            ingested_at TEXT NOT NULL,
            content_hash TEXT,
            PRIMARY KEY (collection, id),
            FOREIGN KEY (collection) REFERENCES collections(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_entries_source ON entries(collection, source, chunk_index)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_seq ON entries(collection, seq)")
        .execute(pool)
        .await?;

    Ok(())
}

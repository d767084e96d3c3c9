//! SQLite connection management for the vector index.
//!
//! The database file lives at `{persist_dir}/index.sqlite`. WAL mode lets
//! readers see committed snapshots while a single writer upserts.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::config::INDEX_FILE;

/// Open (creating if missing) the index database under `persist_dir`.
pub async fn connect(persist_dir: &Path) -> Result<SqlitePool> {
    std::fs::create_dir_all(persist_dir)?;
    let db_path = persist_dir.join(INDEX_FILE);

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        // Concurrent writers wait for the lock instead of failing with SQLITE_BUSY.
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

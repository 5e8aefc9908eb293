use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::storage::SqliteStorage;

/// Creates the database file and schema described by `[db] path`.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let store = SqliteStorage::open(config).await?;
    store.close().await;
    Ok(())
}

/// Idempotent; safe to call on every open.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

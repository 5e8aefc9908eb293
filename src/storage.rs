//! Key-value persistence for settings and comparison history.
//!
//! The [`KeyValueStore`] trait is the only thing the settings and
//! recent-records stores know about persistence, so the same service code
//! runs against SQLite in the CLI and against memory in tests.
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`MemoryStorage`] | tests, throwaway sessions |
//! | [`SqliteStorage`] | the `dcmp` CLI (`kv` table in `[db] path`) |
//!
//! There is no cross-process locking: two processes writing the same key
//! race, and the last writer wins.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::migrate;

/// String-keyed, string-valued store. Values are JSON documents.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns `None` when the key has never been set or was removed.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Inserts or overwrites a value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes the key entirely. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow::anyhow!("memory storage lock poisoned")
}

#[async_trait]
impl KeyValueStore for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// SQLite-backed store using a single `kv` table.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to `[db] path`, creating the file and its directory if
    /// needed, and makes sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = connect_pool(&config.db.path).await?;
        migrate::ensure_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// One CLI command at a time; two connections cover the WAL reader.
async fn connect_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))
}

#[async_trait]
impl KeyValueStore for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("a").await.unwrap(), None);
        store.set("a", "1").await.unwrap();
        store.set("a", "2").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("2"));
        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        // removing again is fine
        store.remove("a").await.unwrap();
    }

    #[tokio::test]
    async fn memory_storage_get_set_remove() {
        let store = MemoryStorage::new();
        exercise(&store).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn sqlite_storage_get_set_remove() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::minimal();
        config.db.path = tmp.path().join("nested").join("dcmp.sqlite");

        let store = SqliteStorage::open(&config).await.unwrap();
        exercise(&store).await;
        store.set("kept", "value").await.unwrap();
        store.close().await;

        // reopening sees the persisted row
        let store = SqliteStorage::open(&config).await.unwrap();
        assert_eq!(store.get("kept").await.unwrap().as_deref(), Some("value"));
        store.close().await;
    }
}

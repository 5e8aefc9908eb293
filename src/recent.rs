//! Bounded history of recent comparisons, one list per [`RecordMode`].
//!
//! Newest records sit at the head; the list never holds more than
//! [`MAX_RECORDS`] entries and evicts from the tail. Every mutating call
//! persists before it returns, so storage always mirrors memory.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::models::{NewRecord, RecentRecord};
use crate::storage::KeyValueStore;

pub const MAX_RECORDS: usize = 10;

/// Which history list a store operates on. Lists are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    FileCompare,
    PropertyCheck,
}

impl RecordMode {
    pub fn storage_key(self) -> &'static str {
        match self {
            RecordMode::FileCompare => "fileCompareRecentRecords",
            RecordMode::PropertyCheck => "propertyCheckRecentRecords",
        }
    }
}

pub struct RecentRecords {
    storage: Arc<dyn KeyValueStore>,
    mode: RecordMode,
    records: Vec<RecentRecord>,
    visible: bool,
}

impl RecentRecords {
    pub fn new(storage: Arc<dyn KeyValueStore>, mode: RecordMode) -> Self {
        Self {
            storage,
            mode,
            records: Vec::new(),
            visible: false,
        }
    }

    pub fn mode(&self) -> RecordMode {
        self.mode
    }

    /// Most recent first.
    pub fn records(&self) -> &[RecentRecord] {
        &self.records
    }

    /// Whether the history panel should be shown.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Reads the persisted list. Malformed data empties the list and hides
    /// the panel instead of failing.
    pub async fn load(&mut self) {
        let raw = match self.storage.get(self.mode.storage_key()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(key = self.mode.storage_key(), error = %e, "failed to read recent records");
                self.records.clear();
                self.visible = false;
                return;
            }
        };
        match serde_json::from_str::<Vec<RecentRecord>>(&raw) {
            Ok(parsed) => {
                self.visible = !parsed.is_empty();
                self.records = parsed;
            }
            Err(e) => {
                tracing::warn!(key = self.mode.storage_key(), error = %e, "failed to load recent records");
                self.records.clear();
                self.visible = false;
            }
        }
    }

    /// Adds a record at the head and returns its id. Memory is left
    /// untouched when the write fails.
    pub async fn add(&mut self, record: NewRecord) -> Result<u64> {
        let id = self.records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let mut next = Vec::with_capacity(MAX_RECORDS);
        next.push(record.with_id(id));
        next.extend(self.records.iter().take(MAX_RECORDS - 1).cloned());
        self.commit(next).await?;
        Ok(id)
    }

    /// Removes the first record with `id`. Returns `false` when none matched.
    pub async fn delete(&mut self, id: u64) -> Result<bool> {
        let Some(index) = self.records.iter().position(|r| r.id == id) else {
            return Ok(false);
        };
        let mut next = self.records.clone();
        next.remove(index);
        self.commit(next).await?;
        Ok(true)
    }

    /// Empties the list and removes the storage key entirely.
    pub async fn clear_all(&mut self) -> Result<()> {
        self.records.clear();
        self.visible = false;
        self.storage
            .remove(self.mode.storage_key())
            .await
            .context("failed to clear recent records")
    }

    /// Writes `next` and only then makes it the in-memory list.
    async fn commit(&mut self, next: Vec<RecentRecord>) -> Result<()> {
        let json = serde_json::to_string(&next)?;
        self.storage
            .set(self.mode.storage_key(), &json)
            .await
            .context("failed to save recent records")?;
        self.visible = !next.is_empty();
        self.records = next;
        Ok(())
    }
}

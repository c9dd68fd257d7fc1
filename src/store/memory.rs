//! In-memory entry store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EntryStore, StorageResult};
use crate::auth::Identity;
use crate::entry::{NewEntry, TimeEntry};

/// Entries kept in insertion order for the lifetime of the process
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<Vec<TimeEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored entries, all users
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Insert an entry with a caller-chosen timestamp
    pub async fn insert_at(&self, entry: NewEntry, timestamp: DateTime<Utc>) -> TimeEntry {
        let stored = entry.into_entry(Uuid::new_v4().to_string(), timestamp);
        self.entries.write().await.push(stored.clone());
        stored
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(&self, _auth: &Identity, entry: NewEntry) -> StorageResult<TimeEntry> {
        // The clock is read under the write lock so insertion order and
        // timestamp order agree.
        let mut entries = self.entries.write().await;
        let stored = entry.into_entry(Uuid::new_v4().to_string(), Utc::now());
        entries.push(stored.clone());
        Ok(stored)
    }

    async fn entries_since(
        &self,
        _auth: &Identity,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<TimeEntry>> {
        let entries = self.entries.read().await;

        // Newest insert first, then a stable sort keeps that order for ties.
        let mut matching: Vec<TimeEntry> = entries
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id && e.timestamp >= since)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(matching)
    }
}

//! Time entry store
//!
//! The document store is an external collaborator. `EntryStore` is the seam:
//! a single-document insert and one query shape (equality on the user, range
//! on the timestamp, newest first).
//!
//! - **memory**: in-process vector, for development and tests
//! - **sqlite**: local file via `rusqlite`
//! - **firestore**: Firestore REST adapter
//! - **error**: error types

mod error;
mod firestore;
mod memory;
mod sqlite;

pub use error::{StorageError, StorageResult};
pub use firestore::{FirestoreConfig, FirestoreStore};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::Identity;
use crate::entry::{NewEntry, TimeEntry};

/// Keep a decoded entry; log and drop one that does not decode
///
/// A single foreign or damaged document must not hide the rest of the day.
pub(crate) fn keep_decoded(decoded: StorageResult<TimeEntry>) -> Option<TimeEntry> {
    match decoded {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping undecodable time entry");
            None
        }
    }
}

/// Operations the application consumes from the document store
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Insert one entry. The store assigns the id and the timestamp.
    async fn append(&self, auth: &Identity, entry: NewEntry) -> StorageResult<TimeEntry>;

    /// Entries of `user_id` with `timestamp >= since`, newest first
    async fn entries_since(
        &self,
        auth: &Identity,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<TimeEntry>>;
}

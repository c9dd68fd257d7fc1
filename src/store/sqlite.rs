//! SQLite entry store
//!
//! One table, timestamps in milliseconds since the epoch. `seq` is the
//! rowid and breaks ties between entries written in the same millisecond.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

use super::{keep_decoded, EntryStore, StorageError, StorageResult};
use crate::auth::Identity;
use crate::entry::{CompanyId, EntryType, NewEntry, TimeEntry};

/// Entry store backed by a local SQLite file
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Create or open the database at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Database that lives only as long as the store
    pub fn in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> StorageResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS time_entries (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                entry_type TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                company_id TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_user_timestamp ON time_entries(user_id, timestamp)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Location of the database file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StorageResult<T>) -> StorageResult<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::Decode("sqlite connection lock poisoned".to_string()))?;
        f(&conn)
    }
}

#[async_trait]
impl EntryStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, _auth: &Identity, entry: NewEntry) -> StorageResult<TimeEntry> {
        self.with_conn(|conn| {
            let stored = entry.into_entry(Uuid::new_v4().to_string(), Utc::now());
            conn.execute(
                "INSERT INTO time_entries (id, entry_type, timestamp, user_id, company_id)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    stored.id,
                    stored.entry_type.as_str(),
                    stored.timestamp.timestamp_millis(),
                    stored.user_id,
                    stored.company_id.as_str(),
                ],
            )?;
            Ok(stored)
        })
    }

    async fn entries_since(
        &self,
        _auth: &Identity,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<TimeEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, entry_type, timestamp, user_id, company_id FROM time_entries
                 WHERE user_id = ? AND timestamp >= ?
                 ORDER BY timestamp DESC, seq DESC",
            )?;

            let rows = stmt.query_map(params![user_id, since.timestamp_millis()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (id, entry_type, millis, user_id, company_id) = row?;
                entries.extend(keep_decoded(decode_row(
                    id,
                    &entry_type,
                    millis,
                    user_id,
                    company_id,
                )));
            }
            Ok(entries)
        })
    }
}

fn decode_row(
    id: String,
    entry_type: &str,
    millis: i64,
    user_id: String,
    company_id: String,
) -> StorageResult<TimeEntry> {
    let entry_type: EntryType = entry_type
        .parse()
        .map_err(|e| StorageError::Decode(format!("entry {}: {}", id, e)))?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::Decode(format!("entry {}: bad timestamp {}", id, millis)))?;
    let company_id = CompanyId::new(company_id)
        .ok_or_else(|| StorageError::Decode(format!("entry {}: empty company id", id)))?;

    Ok(TimeEntry {
        id,
        entry_type,
        timestamp,
        user_id,
        company_id,
    })
}

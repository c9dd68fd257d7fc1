//! Entry store error types

use thiserror::Error;

/// Errors that can occur when reading or writing entries
#[derive(Error, Debug)]
pub enum StorageError {
    /// Local database failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Transport failure talking to a remote store
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Remote store rejected the call
    #[error("Store API error {status}: {message}")]
    Api { status: u16, message: String },

    /// A stored document could not be turned into an entry
    #[error("Decode error: {0}")]
    Decode(String),

    /// The store needs a credential the identity does not carry
    #[error("Missing credentials for store access")]
    Unauthenticated,

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Decode(err.to_string())
    }
}

impl StorageError {
    /// The remote store refused the caller's ID token
    pub fn is_token_rejected(&self) -> bool {
        matches!(self, StorageError::Api { status: 401, .. })
    }
}

/// Result type alias for store operations
pub type StorageResult<T> = Result<T, StorageError>;

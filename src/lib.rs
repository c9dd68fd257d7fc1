//! # Time Tracker
//!
//! Employee time tracking. Workers sign in, then record clock-in,
//! clock-out, breaks and leave days against a document store. The
//! current status is derived from the most recent entry of the day.
//!
//! ## Modules
//!
//! - [`entry`]: Entry types, status derivation and the action buttons
//! - [`auth`]: Identity backends, Google sign-in and the session provider
//! - [`store`]: Append-only entry stores (memory, SQLite, Firestore)
//! - [`recorder`]: Recording entries and today's view of them
//! - [`validation`]: Sign-in and registration form rules
//! - [`web`]: Server-rendered screens with Axum
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use timetracker::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(LocalAuth::new());
//!     let identity = backend.sign_up("worker@example.com", "hunter22").await?;
//!
//!     let company = CompanyId::new("acme").ok_or("company id required")?;
//!     let recorder = TimeEntryRecorder::new(Arc::new(MemoryStore::new()), company);
//!
//!     let entries = recorder.record_entry(&identity, EntryType::ClockIn).await?;
//!     println!("{}", derive_status(entries.first()).label());
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod entry;
pub mod recorder;
pub mod store;
pub mod validation;
pub mod web;

pub use entry::{
    break_toggle, derive_status, Action, CompanyId, EntryType, NewEntry, Status, TimeEntry,
};

pub use auth::{
    AuthError, AuthResult, FirebaseAuth, GoogleOAuth, Identity, IdentityBackend, LocalAuth,
    SessionProvider, SessionState,
};

pub use store::{
    EntryStore, FirestoreConfig, FirestoreStore, MemoryStore, SqliteStore, StorageError,
    StorageResult,
};

pub use recorder::{TimeEntryRecorder, TodayView, TrackerScreen};

pub use validation::{LoginForm, RegisterForm, ValidationErrors};

pub use web::{build_router, serve, AppState, WebConfig, WebError};

pub use config::{Config, ConfigError};

//! Time entries
//!
//! - **types**: `EntryType`, `TimeEntry`, `NewEntry`, `CompanyId`
//! - **status**: status derivation, break toggle and screen actions

pub mod status;
pub mod types;

pub use status::{break_toggle, derive_status, Action, Status};
pub use types::{CompanyId, EntryType, NewEntry, TimeEntry, UnknownEntryType};

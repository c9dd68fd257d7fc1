//! Core data types for time entries
//!
//! - `EntryType`: The six work-status events a user can record
//! - `TimeEntry`: A stored, immutable event
//! - `NewEntry`: A write request (the store assigns id and timestamp)
//! - `CompanyId`: Organization identifier carried by every entry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of work-status event
///
/// Serialized exactly as the stored names (`CLOCK_IN`, `BREAK_START`, ...).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    ClockIn,
    ClockOut,
    BreakStart,
    BreakEnd,
    Vacation,
    SickLeave,
}

impl EntryType {
    /// All entry types, in display order
    pub fn all() -> &'static [EntryType] {
        &[
            EntryType::ClockIn,
            EntryType::ClockOut,
            EntryType::BreakStart,
            EntryType::BreakEnd,
            EntryType::Vacation,
            EntryType::SickLeave,
        ]
    }

    /// Stored name of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::ClockIn => "CLOCK_IN",
            EntryType::ClockOut => "CLOCK_OUT",
            EntryType::BreakStart => "BREAK_START",
            EntryType::BreakEnd => "BREAK_END",
            EntryType::Vacation => "VACATION",
            EntryType::SickLeave => "SICK_LEAVE",
        }
    }

    /// Lowercase words for activity lists ("clock in", "sick leave")
    pub fn activity_label(&self) -> String {
        self.as_str().replace('_', " ").to_lowercase()
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored type name is not one of the six known types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entry type: {0}")]
pub struct UnknownEntryType(pub String);

impl FromStr for EntryType {
    type Err = UnknownEntryType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntryType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEntryType(s.to_string()))
    }
}

/// Organization identifier
///
/// Required on every write. Comes from `tenant.company_id` in the config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CompanyId(String);

impl CompanyId {
    /// Create a company id, rejecting blank values
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A recorded work-status event
///
/// Entries are append-only. Nothing in this crate mutates or deletes one
/// after the store has returned it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeEntry {
    /// Store-assigned document id
    pub id: String,
    /// What happened
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// When the store accepted the write
    pub timestamp: DateTime<Utc>,
    /// Authenticated actor
    pub user_id: String,
    /// Actor's organization
    pub company_id: CompanyId,
}

/// Request to append an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub entry_type: EntryType,
    pub user_id: String,
    pub company_id: CompanyId,
}

impl NewEntry {
    pub fn new(entry_type: EntryType, user_id: impl Into<String>, company_id: CompanyId) -> Self {
        Self {
            entry_type,
            user_id: user_id.into(),
            company_id,
        }
    }

    /// Turn the request into a stored entry once the store has picked id and time
    pub fn into_entry(self, id: impl Into<String>, timestamp: DateTime<Utc>) -> TimeEntry {
        TimeEntry {
            id: id.into(),
            entry_type: self.entry_type,
            timestamp,
            user_id: self.user_id,
            company_id: self.company_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_names_round_trip() {
        for t in EntryType::all() {
            assert_eq!(t.as_str().parse::<EntryType>().unwrap(), *t);
        }
        assert_eq!(
            "LUNCH".parse::<EntryType>(),
            Err(UnknownEntryType("LUNCH".to_string()))
        );
    }

    #[test]
    fn test_entry_type_serde_uses_stored_names() {
        let json = serde_json::to_string(&EntryType::SickLeave).unwrap();
        assert_eq!(json, "\"SICK_LEAVE\"");
        let parsed: EntryType = serde_json::from_str("\"BREAK_START\"").unwrap();
        assert_eq!(parsed, EntryType::BreakStart);
    }

    #[test]
    fn test_activity_label() {
        assert_eq!(EntryType::ClockIn.activity_label(), "clock in");
        assert_eq!(EntryType::SickLeave.activity_label(), "sick leave");
        assert_eq!(EntryType::Vacation.activity_label(), "vacation");
    }

    #[test]
    fn test_company_id_rejects_blank() {
        assert!(CompanyId::new("").is_none());
        assert!(CompanyId::new("   ").is_none());
        assert_eq!(CompanyId::new("acme").unwrap().as_str(), "acme");
    }
}

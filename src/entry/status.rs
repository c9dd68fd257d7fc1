//! Status derivation
//!
//! A user's current status is the type of their most recent entry.
//! Nothing else is persisted: "on break" is inferred from the last entry,
//! and any sequence of entries is accepted.

use super::types::{EntryType, TimeEntry};

/// Human-readable work status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NotClockedIn,
    Working,
    OnBreak,
    ClockedOut,
    OnVacation,
    OnSickLeave,
    /// Last entry has no label of its own (`BREAK_END`)
    Unknown,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::NotClockedIn => "Not clocked in",
            Status::Working => "Currently working",
            Status::OnBreak => "On break",
            Status::ClockedOut => "Clocked out",
            Status::OnVacation => "On vacation",
            Status::OnSickLeave => "On sick leave",
            Status::Unknown => "Unknown status",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Map the most recent entry to a status
pub fn derive_status(last: Option<&TimeEntry>) -> Status {
    match last.map(|e| e.entry_type) {
        None => Status::NotClockedIn,
        Some(EntryType::ClockIn) => Status::Working,
        Some(EntryType::BreakStart) => Status::OnBreak,
        Some(EntryType::ClockOut) => Status::ClockedOut,
        Some(EntryType::Vacation) => Status::OnVacation,
        Some(EntryType::SickLeave) => Status::OnSickLeave,
        Some(EntryType::BreakEnd) => Status::Unknown,
    }
}

/// Type recorded by the break button: ends a break in progress, else starts one
pub fn break_toggle(last: Option<&TimeEntry>) -> EntryType {
    match last.map(|e| e.entry_type) {
        Some(EntryType::BreakStart) => EntryType::BreakEnd,
        _ => EntryType::BreakStart,
    }
}

/// A button on the time-entry screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ClockIn,
    ClockOut,
    ToggleBreak,
    Vacation,
    SickLeave,
}

impl Action {
    pub fn all() -> &'static [Action] {
        &[
            Action::ClockIn,
            Action::ClockOut,
            Action::ToggleBreak,
            Action::Vacation,
            Action::SickLeave,
        ]
    }

    /// Form value posted by the button
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ClockIn => "clock_in",
            Action::ClockOut => "clock_out",
            Action::ToggleBreak => "break",
            Action::Vacation => "vacation",
            Action::SickLeave => "sick_leave",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Action::all().iter().copied().find(|a| a.as_str() == s)
    }

    /// Entry type this action records, given the last entry
    pub fn target(&self, last: Option<&TimeEntry>) -> EntryType {
        match self {
            Action::ClockIn => EntryType::ClockIn,
            Action::ClockOut => EntryType::ClockOut,
            Action::ToggleBreak => break_toggle(last),
            Action::Vacation => EntryType::Vacation,
            Action::SickLeave => EntryType::SickLeave,
        }
    }

    /// Clock in/out are disabled when the last entry already has that type.
    /// The break toggle and leave actions are always available.
    pub fn is_enabled(&self, last: Option<&TimeEntry>) -> bool {
        let last_type = last.map(|e| e.entry_type);
        match self {
            Action::ClockIn => last_type != Some(EntryType::ClockIn),
            Action::ClockOut => last_type != Some(EntryType::ClockOut),
            Action::ToggleBreak | Action::Vacation | Action::SickLeave => true,
        }
    }

    /// Button caption
    pub fn label(&self, last: Option<&TimeEntry>) -> &'static str {
        match self {
            Action::ClockIn => "Clock In",
            Action::ClockOut => "Clock Out",
            Action::ToggleBreak => match break_toggle(last) {
                EntryType::BreakEnd => "End Break",
                _ => "Start Break",
            },
            Action::Vacation => "Vacation",
            Action::SickLeave => "Sick Leave",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::CompanyId;
    use chrono::{Duration, Utc};

    fn entry(entry_type: EntryType) -> TimeEntry {
        TimeEntry {
            id: "e1".to_string(),
            entry_type,
            timestamp: Utc::now(),
            user_id: "u1".to_string(),
            company_id: CompanyId::new("acme").unwrap(),
        }
    }

    #[test]
    fn test_status_labels() {
        let cases = [
            (EntryType::ClockIn, "Currently working"),
            (EntryType::BreakStart, "On break"),
            (EntryType::ClockOut, "Clocked out"),
            (EntryType::Vacation, "On vacation"),
            (EntryType::SickLeave, "On sick leave"),
            (EntryType::BreakEnd, "Unknown status"),
        ];
        for (t, label) in cases {
            assert_eq!(derive_status(Some(&entry(t))).label(), label);
        }
        assert_eq!(derive_status(None).label(), "Not clocked in");
    }

    #[test]
    fn test_status_uses_most_recent_of_descending_sequence() {
        let now = Utc::now();
        let mut newest = entry(EntryType::BreakStart);
        newest.timestamp = now;
        let mut older = entry(EntryType::ClockIn);
        older.timestamp = now - Duration::minutes(30);

        let sequence = vec![newest, older];
        assert_eq!(derive_status(sequence.first()), Status::OnBreak);
    }

    #[test]
    fn test_break_toggle() {
        assert_eq!(break_toggle(None), EntryType::BreakStart);
        assert_eq!(break_toggle(Some(&entry(EntryType::ClockIn))), EntryType::BreakStart);
        assert_eq!(break_toggle(Some(&entry(EntryType::BreakStart))), EntryType::BreakEnd);
        assert_eq!(break_toggle(Some(&entry(EntryType::BreakEnd))), EntryType::BreakStart);
    }

    #[test]
    fn test_clock_buttons_disabled_on_same_type() {
        let clocked_in = entry(EntryType::ClockIn);
        assert!(!Action::ClockIn.is_enabled(Some(&clocked_in)));
        assert!(Action::ClockOut.is_enabled(Some(&clocked_in)));

        let clocked_out = entry(EntryType::ClockOut);
        assert!(Action::ClockIn.is_enabled(Some(&clocked_out)));
        assert!(!Action::ClockOut.is_enabled(Some(&clocked_out)));

        assert!(Action::ClockIn.is_enabled(None));
        assert!(Action::ClockOut.is_enabled(None));
    }

    #[test]
    fn test_break_and_leave_never_disabled() {
        for t in EntryType::all() {
            let last = entry(*t);
            assert!(Action::ToggleBreak.is_enabled(Some(&last)));
            assert!(Action::Vacation.is_enabled(Some(&last)));
            assert!(Action::SickLeave.is_enabled(Some(&last)));
        }
    }

    #[test]
    fn test_action_parse_and_labels() {
        for a in Action::all() {
            assert_eq!(Action::parse(a.as_str()), Some(*a));
        }
        assert_eq!(Action::parse("lunch"), None);
        assert_eq!(Action::ToggleBreak.label(None), "Start Break");
        assert_eq!(
            Action::ToggleBreak.label(Some(&entry(EntryType::BreakStart))),
            "End Break"
        );
    }
}

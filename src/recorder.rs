//! Time-entry recorder
//!
//! `TimeEntryRecorder` is the shared service: it loads the signed-in user's
//! entries for the current local day and appends new ones. `TrackerScreen`
//! is the per-session screen state on top of it: the last good entry list
//! and an advisory busy flag. Screen calls go through the session so an
//! expired ID token is renewed and the call retried once.

use chrono::{DateTime, Duration, Local, Offset, TimeZone, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::auth::{Identity, SessionProvider};
use crate::entry::{derive_status, Action, CompanyId, EntryType, NewEntry, Status, TimeEntry};
use crate::store::{EntryStore, StorageError, StorageResult};

/// Loads and records entries for one organization
pub struct TimeEntryRecorder {
    store: Arc<dyn EntryStore>,
    company: CompanyId,
}

impl TimeEntryRecorder {
    pub fn new(store: Arc<dyn EntryStore>, company: CompanyId) -> Self {
        Self { store, company }
    }

    pub fn company(&self) -> &CompanyId {
        &self.company
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Entries since local midnight, newest first
    pub async fn load_today_entries(&self, identity: &Identity) -> StorageResult<Vec<TimeEntry>> {
        let since = start_of_day(Local::now());
        self.store
            .entries_since(identity, &identity.user_id, since)
            .await
    }

    /// Append an entry, then reload the day
    ///
    /// The returned list comes from the store, so it reflects the
    /// store-assigned timestamp of the new entry.
    pub async fn record_entry(
        &self,
        identity: &Identity,
        entry_type: EntryType,
    ) -> StorageResult<Vec<TimeEntry>> {
        self.append_entry(identity, entry_type).await?;
        self.load_today_entries(identity).await
    }

    /// Append one entry for the user and this organization
    pub async fn append_entry(
        &self,
        identity: &Identity,
        entry_type: EntryType,
    ) -> StorageResult<TimeEntry> {
        let entry = NewEntry::new(entry_type, identity.user_id.clone(), self.company.clone());
        let stored = self.store.append(identity, entry).await?;

        tracing::info!(
            user_id = %identity.user_id,
            entry_type = %entry_type,
            entry_id = %stored.id,
            "Time entry recorded"
        );
        Ok(stored)
    }
}

/// Run a store call as the session's user
///
/// When the store rejects the ID token, the token is renewed and the call
/// made once more.
async fn as_session_user<T, F, Fut>(auth: &SessionProvider, call: F) -> StorageResult<T>
where
    F: Fn(Identity) -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let identity = auth.authorized().await.ok_or(StorageError::Unauthenticated)?;
    match call(identity).await {
        Err(e) if e.is_token_rejected() => {
            tracing::info!(error = %e, "Store rejected the ID token, renewing");
            let identity = auth.renew().await.map_err(|renew_err| {
                tracing::warn!(error = %renew_err, "ID token renewal failed");
                e
            })?;
            call(identity).await
        }
        result => result,
    }
}

/// Midnight of `now`'s calendar day in its own zone, as UTC
///
/// When local midnight does not exist (a DST gap) the day starts at
/// midnight shifted by `now`'s offset.
pub fn start_of_day<Tz: TimeZone>(now: DateTime<Tz>) -> DateTime<Utc> {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_else(|| now.naive_local());

    match now.timezone().from_local_datetime(&midnight).earliest() {
        Some(start) => start.with_timezone(&Utc),
        None => {
            let offset = now.offset().fix().local_minus_utc();
            Utc.from_utc_datetime(&(midnight - Duration::seconds(i64::from(offset))))
        }
    }
}

/// What happened to a submitted action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The entry was written
    Recorded(EntryType),
    /// The action is disabled for the current last entry
    Disabled,
    /// Another submission is still in flight
    Busy,
    /// The store call failed; the previous list is kept
    Failed,
}

/// Per-session state of the time-entry screen
#[derive(Default)]
pub struct TrackerScreen {
    /// `None` until a list has been loaded for the current user
    entries: Mutex<Option<Vec<TimeEntry>>>,
    loading: AtomicBool,
}

/// Clears the busy flag when a submission ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TrackerScreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last successfully loaded entries, newest first
    pub fn entries(&self) -> Vec<TimeEntry> {
        self.cached().unwrap_or_default()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Whether a list has been loaded since the last `clear`
    pub fn is_loaded(&self) -> bool {
        self.cached().is_some()
    }

    /// Reload today's entries. On failure the cached list stays.
    pub async fn refresh(&self, recorder: &TimeEntryRecorder, auth: &SessionProvider) {
        if let Err(e) = self.load(recorder, auth).await {
            let user_id = user_of(auth);
            tracing::error!(user_id = %user_id, error = %e, "Failed to load today's entries");
        }
    }

    /// Run a button action against the last entry
    ///
    /// The last entry comes from the cached list, loaded first when this
    /// session has none yet.
    pub async fn submit(
        &self,
        recorder: &TimeEntryRecorder,
        auth: &SessionProvider,
        action: Action,
    ) -> SubmitOutcome {
        let user_id = user_of(auth);
        if self
            .loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(
                user_id = %user_id,
                action = action.as_str(),
                "Submission dropped while busy"
            );
            return SubmitOutcome::Busy;
        }
        let _busy = BusyGuard(&self.loading);

        if !self.is_loaded() {
            if let Err(e) = self.load(recorder, auth).await {
                tracing::error!(user_id = %user_id, error = %e, "Failed to load today's entries");
                return SubmitOutcome::Failed;
            }
        }

        let last = self.entries().into_iter().next();
        if !action.is_enabled(last.as_ref()) {
            tracing::debug!(
                user_id = %user_id,
                action = action.as_str(),
                "Ignoring disabled action"
            );
            return SubmitOutcome::Disabled;
        }

        let entry_type = action.target(last.as_ref());
        let stored = as_session_user(auth, |identity| async move {
            recorder.append_entry(&identity, entry_type).await
        })
        .await;

        match stored {
            Ok(stored) => {
                if let Err(e) = self.load(recorder, auth).await {
                    tracing::error!(
                        user_id = %user_id,
                        error = %e,
                        "Failed to reload entries after recording"
                    );
                    self.prepend(stored);
                }
                SubmitOutcome::Recorded(entry_type)
            }
            Err(e) => {
                tracing::error!(
                    user_id = %user_id,
                    entry_type = %entry_type,
                    error = %e,
                    "Error recording time entry"
                );
                SubmitOutcome::Failed
            }
        }
    }

    /// View model of the cached state
    pub fn view(&self) -> TodayView {
        TodayView::new(self.entries(), self.is_loading())
    }

    /// Forget the cached list, e.g. when the signed-in user changes
    pub fn clear(&self) {
        self.set(None);
    }

    async fn load(
        &self,
        recorder: &TimeEntryRecorder,
        auth: &SessionProvider,
    ) -> StorageResult<()> {
        let entries = as_session_user(auth, |identity| async move {
            recorder.load_today_entries(&identity).await
        })
        .await?;
        self.set(Some(entries));
        Ok(())
    }

    /// Put an entry known to be stored in front of the cached list
    fn prepend(&self, entry: TimeEntry) {
        if let Ok(mut cached) = self.entries.lock() {
            cached.get_or_insert_with(Vec::new).insert(0, entry);
        }
    }

    fn cached(&self) -> Option<Vec<TimeEntry>> {
        self.entries.lock().ok().and_then(|e| e.clone())
    }

    fn set(&self, entries: Option<Vec<TimeEntry>>) {
        if let Ok(mut cached) = self.entries.lock() {
            *cached = entries;
        }
    }
}

fn user_of(auth: &SessionProvider) -> String {
    auth.current().identity.map(|i| i.user_id).unwrap_or_default()
}

/// One button on the screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub action: Action,
    pub label: &'static str,
    pub enabled: bool,
}

/// Everything the time-entry screen renders
#[derive(Debug, Clone)]
pub struct TodayView {
    pub entries: Vec<TimeEntry>,
    pub status: Status,
    pub buttons: Vec<ActionButton>,
}

impl TodayView {
    pub fn new(entries: Vec<TimeEntry>, loading: bool) -> Self {
        let last = entries.first();
        let status = derive_status(last);
        let buttons = Action::all()
            .iter()
            .map(|&action| ActionButton {
                action,
                label: action.label(last),
                enabled: !loading && action.is_enabled(last),
            })
            .collect();

        Self {
            entries,
            status,
            buttons,
        }
    }

    pub fn last_entry(&self) -> Option<&TimeEntry> {
        self.entries.first()
    }

    /// Caption of the break toggle
    pub fn break_label(&self) -> &'static str {
        Action::ToggleBreak.label(self.last_entry())
    }

    /// Activity rows: type words and local `HH:MM:SS`
    pub fn rows<Tz: TimeZone>(&self, tz: &Tz) -> Vec<(String, String)>
    where
        Tz::Offset: std::fmt::Display,
    {
        self.entries
            .iter()
            .map(|e| {
                (
                    e.entry_type.activity_label(),
                    e.timestamp.with_timezone(tz).format("%H:%M:%S").to_string(),
                )
            })
            .collect()
    }
}

/// Header date, e.g. "Tuesday, March 4, 2025"
pub fn format_day<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%A, %B %-d, %Y").to_string()
}

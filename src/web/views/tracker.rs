//! Time-entry screen

use chrono::{DateTime, TimeZone};
use leptos::*;

use super::{render, AuthenticatedLayout};
use crate::auth::Identity;
use crate::entry::Action;
use crate::recorder::{format_day, ActionButton, TodayView};

#[component]
fn ActionButtons(base: String, buttons: Vec<ActionButton>) -> impl IntoView {
    view! {
        <form
            method="post"
            action={format!("{}/dashboard/entries", base)}
            style="display:grid;grid-template-columns:repeat(3,1fr);gap:1rem"
        >
            {buttons
                .into_iter()
                .map(|b| {
                    let class = match b.action {
                        Action::ClockIn => "btn btn-primary",
                        _ => "btn",
                    };
                    view! {
                        <button
                            class=class
                            type="submit"
                            name="action"
                            value={b.action.as_str()}
                            disabled={!b.enabled}
                        >
                            {b.label}
                        </button>
                    }
                })
                .collect_view()}
        </form>
    }
}

/// Today's entries, newest first
#[component]
fn ActivityList(rows: Vec<(String, String)>) -> impl IntoView {
    view! {
        <ul style="list-style:none;padding:0">
            {rows
                .into_iter()
                .map(|(label, time)| view! {
                    <li style="display:flex;justify-content:space-between;padding:.5rem 0;border-bottom:1px solid #e5e7eb">
                        <span>{label}</span>
                        <span>{time}</span>
                    </li>
                })
                .collect_view()}
        </ul>
    }
}

pub fn tracker_page<Tz: TimeZone>(
    base: &str,
    identity: &Identity,
    view: &TodayView,
    now: &DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let base = base.to_string();
    let identity = identity.clone();
    let date = format_day(now);
    let status = view.status.label();
    let buttons = view.buttons.clone();
    let rows = view.rows(&now.timezone());

    render(move || {
        view! {
            <AuthenticatedLayout base={base.clone()} identity=identity title="Time Tracker">
                <div class="card">
                    <div style="display:flex;justify-content:space-between;align-items:center">
                        <h2>"Time Tracker"</h2>
                        <div>{date}</div>
                    </div>
                    <p class="status" style="font-size:1.125rem">{status}</p>
                    <ActionButtons base=base buttons=buttons/>
                    <h3 style="margin-top:2rem">"Today's Activity"</h3>
                    <ActivityList rows=rows/>
                </div>
            </AuthenticatedLayout>
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{CompanyId, EntryType, TimeEntry};
    use chrono::Utc;

    /// Opening tag of the button submitting `action`
    fn button_tag<'a>(html: &'a str, action: &str) -> &'a str {
        let value = format!("value=\"{}\"", action);
        let at = html.find(&value).unwrap();
        let start = html[..at].rfind("<button").unwrap();
        let end = at + html[at..].find('>').unwrap();
        &html[start..end]
    }

    #[test]
    fn test_tracker_page() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap();
        let entry = TimeEntry {
            id: "e1".to_string(),
            entry_type: EntryType::ClockIn,
            timestamp: Utc.with_ymd_and_hms(2025, 3, 4, 8, 30, 0).unwrap(),
            user_id: "u1".to_string(),
            company_id: CompanyId::new("acme").unwrap(),
        };
        let view = TodayView::new(vec![entry], false);
        let identity = Identity::new("u1", Some("a@b.com".to_string()));

        let html = tracker_page("/time-tracker", &identity, &view, &now);
        assert!(html.contains("Tuesday, March 4, 2025"));
        assert!(html.contains("Currently working"));
        assert!(html.contains("clock in"));
        assert!(html.contains("08:30:00"));
        assert!(button_tag(&html, "clock_in").contains("disabled"));
        assert!(button_tag(&html, "clock_in").contains("btn-primary"));
        assert!(!button_tag(&html, "clock_out").contains("disabled"));
        assert!(html.contains("Clock Out"));
        assert!(html.contains("Start Break"));
        assert!(html.contains("a@b.com"));
        assert!(html.contains("action=\"/time-tracker/dashboard/entries\""));
    }

    #[test]
    fn test_loading_view_disables_every_button() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap();
        let view = TodayView::new(Vec::new(), true);
        let identity = Identity::new("u1", None);

        let html = tracker_page("/time-tracker", &identity, &view, &now);
        for action in Action::all() {
            assert!(button_tag(&html, action.as_str()).contains("disabled"));
        }
        assert!(html.contains("u1"));
    }
}

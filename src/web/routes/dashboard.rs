//! Time-entry screen
//!
//! - GET /dashboard - today's status, actions and activity
//! - POST /dashboard/entries - record an action, then back to the screen

use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use chrono::Local;
use serde::Deserialize;
use std::sync::Arc;

use crate::entry::Action;
use crate::recorder::SubmitOutcome;
use crate::web::error::{WebError, WebResult};
use crate::web::guard::{guard, GuardDecision};
use crate::web::session::BrowserSession;
use crate::web::state::AppState;
use crate::web::views::{loading_page, tracker::tracker_page};

/// Submitted button
#[derive(Debug, Deserialize)]
pub struct EntryForm {
    pub action: String,
}

/// GET /dashboard
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<BrowserSession>>,
) -> Response {
    match guard(&session.auth.current()) {
        GuardDecision::Loading => Html(loading_page()).into_response(),
        GuardDecision::RedirectToLogin => Redirect::to(&state.path("/login")).into_response(),
        GuardDecision::Render(identity) => {
            session.tracker.refresh(&state.recorder, &session.auth).await;
            let view = session.tracker.view();
            Html(tracker_page(
                &state.settings.base_path,
                &identity,
                &view,
                &Local::now(),
            ))
            .into_response()
        }
    }
}

/// POST /dashboard/entries
///
/// Failures are logged by the tracker; the screen then shows the last
/// list that loaded.
pub async fn record(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<BrowserSession>>,
    Form(form): Form<EntryForm>,
) -> WebResult<Response> {
    let identity = match guard(&session.auth.current()) {
        GuardDecision::Render(identity) => identity,
        GuardDecision::Loading => {
            return Ok(Redirect::to(&state.path("/dashboard")).into_response());
        }
        GuardDecision::RedirectToLogin => {
            return Ok(Redirect::to(&state.path("/login")).into_response());
        }
    };

    let action = Action::parse(&form.action)
        .ok_or_else(|| WebError::BadRequest(format!("unknown action {:?}", form.action)))?;

    let outcome = session
        .tracker
        .submit(&state.recorder, &session.auth, action)
        .await;
    if let SubmitOutcome::Recorded(entry_type) = outcome {
        tracing::debug!(user_id = %identity.user_id, entry_type = %entry_type, "Action recorded");
    }

    Ok(Redirect::to(&state.path("/dashboard")).into_response())
}

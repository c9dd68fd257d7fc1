//! Route guard
//!
//! Pure decisions from a session snapshot. The handlers turn them into a
//! spinner, a redirect or the protected screen.

use crate::auth::{Identity, SessionState};

/// Outcome for a protected screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Initial session check still running
    Loading,
    RedirectToLogin,
    Render(Identity),
}

/// Outcome for the root path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeDecision {
    Landing,
    RedirectToDashboard,
}

pub fn guard(state: &SessionState) -> GuardDecision {
    if state.loading {
        return GuardDecision::Loading;
    }
    match &state.identity {
        Some(identity) => GuardDecision::Render(identity.clone()),
        None => GuardDecision::RedirectToLogin,
    }
}

/// Signed-in visitors go straight to the dashboard; everyone else,
/// including a session still loading, sees the landing page.
pub fn home(state: &SessionState) -> HomeDecision {
    if state.identity.is_some() {
        HomeDecision::RedirectToDashboard
    } else {
        HomeDecision::Landing
    }
}

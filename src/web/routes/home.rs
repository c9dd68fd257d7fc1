//! GET / - landing page or dashboard redirect

use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    Extension,
};
use std::sync::Arc;

use crate::web::guard::{home as decide, HomeDecision};
use crate::web::session::BrowserSession;
use crate::web::state::AppState;
use crate::web::views::landing::landing_page;

pub async fn home(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<BrowserSession>>,
) -> Response {
    match decide(&session.auth.current()) {
        HomeDecision::RedirectToDashboard => {
            Redirect::to(&state.path("/dashboard")).into_response()
        }
        HomeDecision::Landing => Html(landing_page(&state.settings.base_path)).into_response(),
    }
}

//! Sign-in, registration and sign-out
//!
//! - GET/POST /login
//! - GET /login/google, GET /login/google/callback
//! - GET/POST /register
//! - POST /logout
//!
//! Schema failures re-render the form with 422 and never reach the
//! backend. Backend failures show one generic message with 401.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use std::sync::Arc;

use crate::auth::{check_callback, AuthError, CallbackParams, GoogleOAuth};
use crate::validation::{LoginForm, RegisterForm};
use crate::web::error::{WebError, WebResult};
use crate::web::session::{append_cookie, session_cookie, BrowserSession};
use crate::web::state::AppState;
use crate::web::views::forms::{login_page, register_page, FormView};

pub const LOGIN_FAILED: &str = "Failed to sign in. Please check your credentials.";
pub const REGISTER_FAILED: &str = "Failed to create an account.";
pub const GOOGLE_FAILED: &str = "Failed to sign in with Google.";

fn render_login(state: &AppState, status: StatusCode, view: FormView<'_>) -> Response {
    let view = FormView {
        google: state.google.is_some(),
        ..view
    };
    (status, Html(login_page(&state.settings.base_path, &view))).into_response()
}

fn render_register(state: &AppState, status: StatusCode, view: FormView<'_>) -> Response {
    (status, Html(register_page(&state.settings.base_path, &view))).into_response()
}

/// GET /login
pub async fn login_form(State(state): State<Arc<AppState>>) -> Response {
    render_login(&state, StatusCode::OK, FormView::default())
}

/// POST /login
pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<BrowserSession>>,
    Form(form): Form<LoginForm>,
) -> Response {
    if let Err(errors) = form.validate() {
        tracing::debug!(errors = %errors, "Login form rejected");
        let view = FormView {
            email: &form.email,
            errors: Some(&errors),
            ..Default::default()
        };
        return render_login(&state, StatusCode::UNPROCESSABLE_ENTITY, view);
    }

    match session.auth.login(&form.email, &form.password).await {
        Ok(()) => {
            session.tracker.clear();
            Redirect::to(&state.path("/dashboard")).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Sign-in failed");
            let view = FormView {
                email: &form.email,
                banner: LOGIN_FAILED,
                ..Default::default()
            };
            render_login(&state, StatusCode::UNAUTHORIZED, view)
        }
    }
}

/// GET /register
pub async fn register_form(State(state): State<Arc<AppState>>) -> Response {
    render_register(&state, StatusCode::OK, FormView::default())
}

/// POST /register
pub async fn register_submit(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<BrowserSession>>,
    Form(form): Form<RegisterForm>,
) -> Response {
    if let Err(errors) = form.validate() {
        tracing::debug!(errors = %errors, "Registration form rejected");
        let view = FormView {
            email: &form.email,
            errors: Some(&errors),
            ..Default::default()
        };
        return render_register(&state, StatusCode::UNPROCESSABLE_ENTITY, view);
    }

    match session.auth.register(&form.email, &form.password).await {
        Ok(()) => {
            session.tracker.clear();
            Redirect::to(&state.path("/dashboard")).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Registration failed");
            let view = FormView {
                email: &form.email,
                banner: REGISTER_FAILED,
                ..Default::default()
            };
            render_register(&state, StatusCode::UNAUTHORIZED, view)
        }
    }
}

/// POST /logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<BrowserSession>>,
) -> Response {
    if let Err(e) = session.auth.logout().await {
        tracing::error!(error = %e, "Failed to log out");
    }
    session.tracker.clear();
    state.sessions.remove(&session.id).await;

    let mut response = Redirect::to(&state.path("/login")).into_response();
    append_cookie(
        &mut response,
        session_cookie(&state.settings.base_path, &session.id, false),
    );
    response
}

fn google(state: &AppState) -> WebResult<&GoogleOAuth> {
    state
        .google
        .as_ref()
        .ok_or_else(|| WebError::NotFound("Google sign-in is not configured".to_string()))
}

/// GET /login/google
pub async fn google_start(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<BrowserSession>>,
) -> WebResult<Response> {
    let google = google(&state)?;
    let csrf = GoogleOAuth::new_state();
    let url = google.authorize_url(&csrf);
    session.set_oauth_state(csrf);

    Ok(Redirect::to(&url).into_response())
}

/// GET /login/google/callback
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<BrowserSession>>,
    Query(params): Query<CallbackParams>,
) -> WebResult<Response> {
    let google = google(&state)?;

    let result = async {
        let code = check_callback(&params, session.take_oauth_state().as_deref())?;
        let credential = google.exchange_code(&code).await?;
        session.auth.federated_login(credential).await
    }
    .await;

    Ok(match result {
        Ok(()) => {
            session.tracker.clear();
            Redirect::to(&state.path("/dashboard")).into_response()
        }
        Err(e) => {
            match e {
                AuthError::FederatedCancelled => tracing::info!("Google sign-in cancelled"),
                e => tracing::warn!(error = %e, "Google sign-in failed"),
            }
            let view = FormView {
                banner: GOOGLE_FAILED,
                ..Default::default()
            };
            render_login(&state, StatusCode::UNAUTHORIZED, view)
        }
    })
}

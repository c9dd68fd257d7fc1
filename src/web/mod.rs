//! Time tracker web application
//!
//! Server-rendered screens built with Axum. Every screen lives under the
//! configured base path (default `/time-tracker`).
//!
//! # Screens
//!
//! - `GET /` - Landing page, or redirect to the dashboard when signed in
//! - `GET /login`, `POST /login` - Email/password sign-in
//! - `GET /login/google` - Start Google sign-in
//! - `GET /login/google/callback` - Finish Google sign-in
//! - `GET /register`, `POST /register` - Create an account
//! - `POST /logout` - Sign out
//! - `GET /dashboard` - Time-entry screen (guarded)
//! - `POST /dashboard/entries` - Record an action (guarded)
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status

pub mod error;
pub mod guard;
pub mod routes;
pub mod session;
pub mod state;
pub mod views;

pub use error::{WebError, WebResult};
pub use session::{BrowserSession, SessionRegistry};
pub use state::{AppState, WebConfig};

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// How often idle browser sessions are swept
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Build the router with all screens and middleware
pub fn build_router(state: AppState) -> Router {
    router(Arc::new(state))
}

fn router(shared_state: Arc<AppState>) -> Router {
    let base_path = shared_state.settings.base_path.clone();

    let screens = Router::new()
        .route("/", get(routes::home::home))
        .route(
            "/login",
            get(routes::auth::login_form).post(routes::auth::login_submit),
        )
        .route("/login/google", get(routes::auth::google_start))
        .route("/login/google/callback", get(routes::auth::google_callback))
        .route(
            "/register",
            get(routes::auth::register_form).post(routes::auth::register_submit),
        )
        .route("/logout", post(routes::auth::logout))
        .route("/dashboard", get(routes::dashboard::dashboard))
        .route("/dashboard/entries", post(routes::dashboard::record))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&shared_state),
            session::attach_session,
        ));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    Router::new()
        .nest(&base_path, screens)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&shared_state.settings.cors_origins))
        .with_state(shared_state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(true)
}

/// Start the server
pub async fn serve(state: AppState) -> Result<(), WebError> {
    let addr = state.settings.addr();
    let base_path = state.settings.base_path.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let shared_state = Arc::new(state);
    let sweeper = tokio::spawn(sweep_sessions(Arc::clone(&shared_state)));
    let router = router(shared_state);

    tracing::info!("Time tracker listening on http://{}{}", addr, base_path);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| WebError::Internal(format!("Server error: {}", e)))?;

    sweeper.abort();
    tracing::info!("Time tracker shut down gracefully");
    Ok(())
}

/// Periodically drop browser sessions that sat idle too long
async fn sweep_sessions(state: Arc<AppState>) {
    let idle = state.settings.session_idle_timeout;
    let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL.min(idle));
    loop {
        ticker.tick().await;
        let removed = state.sessions.sweep(idle).await;
        if removed > 0 {
            let remaining = state.sessions.len().await;
            tracing::info!(removed, remaining, "Idle sessions dropped");
        }
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        AuthError, AuthResult, FederatedCredential, GoogleOAuth, GoogleOAuthConfig, Identity,
        IdentityBackend, LocalAuth,
    };
    use crate::entry::CompanyId;
    use crate::recorder::TimeEntryRecorder;
    use crate::store::MemoryStore;
    use crate::web::routes::auth::{GOOGLE_FAILED, LOGIN_FAILED, REGISTER_FAILED};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::util::ServiceExt;

    /// Local accounts, counting sign-in calls
    #[derive(Default)]
    struct CountingAuth {
        inner: LocalAuth,
        sign_ins: AtomicUsize,
    }

    #[async_trait]
    impl IdentityBackend for CountingAuth {
        fn name(&self) -> &str {
            "counting"
        }

        async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity> {
            self.sign_ins.fetch_add(1, Ordering::SeqCst);
            self.inner.sign_in(email, password).await
        }

        async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Identity> {
            self.inner.sign_up(email, password).await
        }

        async fn sign_in_federated(&self, credential: FederatedCredential) -> AuthResult<Identity> {
            self.inner.sign_in_federated(credential).await
        }

        async fn sign_out(&self, identity: &Identity) -> AuthResult<()> {
            self.inner.sign_out(identity).await
        }

        async fn resume(&self, refresh_token: &str) -> AuthResult<Identity> {
            self.inner.resume(refresh_token).await
        }
    }

    /// Backend whose session check never finishes in time
    struct StalledAuth;

    #[async_trait]
    impl IdentityBackend for StalledAuth {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn sign_in(&self, _email: &str, _password: &str) -> AuthResult<Identity> {
            Err(AuthError::InvalidCredentials)
        }

        async fn sign_up(&self, _email: &str, _password: &str) -> AuthResult<Identity> {
            Err(AuthError::EmailInUse)
        }

        async fn sign_in_federated(
            &self,
            _credential: FederatedCredential,
        ) -> AuthResult<Identity> {
            Err(AuthError::FederatedUnavailable)
        }

        async fn sign_out(&self, _identity: &Identity) -> AuthResult<()> {
            Ok(())
        }

        async fn resume(&self, _refresh_token: &str) -> AuthResult<Identity> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(AuthError::SessionExpired)
        }
    }

    fn state_with(backend: Arc<dyn IdentityBackend>, timeout: Duration) -> AppState {
        let recorder = Arc::new(TimeEntryRecorder::new(
            Arc::new(MemoryStore::new()),
            CompanyId::new("acme").unwrap(),
        ));
        let settings = WebConfig {
            session_check_timeout: timeout,
            ..Default::default()
        };
        AppState::new(backend, recorder, settings)
    }

    fn create_test_app() -> (Router, Arc<CountingAuth>) {
        let (app, backend, _) = create_test_app_with_state();
        (app, backend)
    }

    fn create_test_app_with_state() -> (Router, Arc<CountingAuth>, Arc<AppState>) {
        let backend = Arc::new(CountingAuth::default());
        let state = Arc::new(state_with(backend.clone(), Duration::from_secs(2)));
        (router(Arc::clone(&state)), backend, state)
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    /// Cookie header a browser would send back after `response`
    fn cookie_jar(response: &Response) -> String {
        set_cookies(response)
            .iter()
            .filter_map(|c| c.split(';').next())
            .filter(|pair| !pair.ends_with('='))
            .collect::<Vec<_>>()
            .join("; ")
    }

    async fn register(app: &Router) -> String {
        let response = send(
            app,
            post_form(
                "/time-tracker/register",
                None,
                "email=a%40b.com&password=abcdef&confirm_password=abcdef",
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/time-tracker/dashboard");
        cookie_jar(&response)
    }

    #[tokio::test]
    async fn test_health_live() {
        let (app, _) = create_test_app();
        let response = send(&app, get("/health/live", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let (app, _) = create_test_app();
        let response = send(&app, get("/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["identity_backend"], "counting");
        assert_eq!(body["entry_store"], "memory");
    }

    #[tokio::test]
    async fn test_landing_page_for_visitors() {
        let (app, _) = create_test_app();
        let response = send(&app, get("/time-tracker", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookies(&response).is_empty());
        assert!(body_text(response).await.contains("Time Tracking Made Simple"));
    }

    #[tokio::test]
    async fn test_anonymous_requests_keep_no_sessions() {
        let (app, _, state) = create_test_app_with_state();
        for _ in 0..500 {
            let response = send(&app, get("/time-tracker", None)).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = send(&app, get("/time-tracker/login", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.sessions.is_empty().await);

        register(&app).await;
        assert_eq!(state.sessions.len().await, 1);
    }

    #[tokio::test]
    async fn test_session_cookie_set_on_sign_in() {
        let (app, _) = create_test_app();
        let response = send(
            &app,
            post_form(
                "/time-tracker/register",
                None,
                "email=a%40b.com&password=abcdef&confirm_password=abcdef",
            ),
        )
        .await;
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("tt_session=") && c.contains("Path=/time-tracker")));
    }

    #[tokio::test]
    async fn test_dashboard_redirects_to_login_without_session() {
        let (app, _) = create_test_app();
        let response = send(&app, get("/time-tracker/dashboard", None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/time-tracker/login");
    }

    #[tokio::test]
    async fn test_record_requires_login() {
        let (app, _) = create_test_app();
        let response = send(
            &app,
            post_form("/time-tracker/dashboard/entries", None, "action=clock_in"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/time-tracker/login");
    }

    #[tokio::test]
    async fn test_invalid_login_never_reaches_backend() {
        let (app, backend) = create_test_app();
        let response = send(
            &app,
            post_form("/time-tracker/login", None, "email=not-an-email&password=abc"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_text(response).await;
        assert!(body.contains("Invalid email address"));
        assert!(body.contains("Password must be at least 6 characters"));
        assert!(body.contains("value=\"not-an-email\""));
        assert_eq!(backend.sign_ins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_invokes_backend_once() {
        let (app, backend) = create_test_app();
        backend.inner.sign_up("a@b.com", "abcdef").await.unwrap();

        let response = send(
            &app,
            post_form("/time-tracker/login", None, "email=a%40b.com&password=abcdef"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/time-tracker/dashboard");
        assert_eq!(backend.sign_ins.load(Ordering::SeqCst), 1);
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("tt_refresh=") && c.contains("HttpOnly")));
    }

    #[tokio::test]
    async fn test_login_failure_shows_generic_banner() {
        let (app, backend) = create_test_app();
        backend.inner.sign_up("a@b.com", "abcdef").await.unwrap();

        let response = send(
            &app,
            post_form("/time-tracker/login", None, "email=a%40b.com&password=wrongpw"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_text(response).await;
        assert!(body.contains(LOGIN_FAILED));
        assert!(body.contains("value=\"a@b.com\""));
        assert!(!body.contains("wrongpw"));
    }

    #[tokio::test]
    async fn test_register_mismatch() {
        let (app, _) = create_test_app();
        let response = send(
            &app,
            post_form(
                "/time-tracker/register",
                None,
                "email=a%40b.com&password=abc123&confirm_password=abc124",
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_text(response).await;
        assert!(body.contains("t match"));
        assert!(!body.contains("Invalid email address"));
    }

    #[tokio::test]
    async fn test_register_existing_email() {
        let (app, backend) = create_test_app();
        backend.inner.sign_up("a@b.com", "abcdef").await.unwrap();

        let response = send(
            &app,
            post_form(
                "/time-tracker/register",
                None,
                "email=a%40b.com&password=abcdef&confirm_password=abcdef",
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains(REGISTER_FAILED));
    }

    #[tokio::test]
    async fn test_signed_in_flow() {
        let (app, _) = create_test_app();
        let cookies = register(&app).await;

        let response = send(&app, get("/time-tracker", Some(&cookies))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/time-tracker/dashboard");

        let response = send(&app, get("/time-tracker/dashboard", Some(&cookies))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Not clocked in"));
        assert!(body.contains("a@b.com"));

        let response = send(
            &app,
            post_form("/time-tracker/dashboard/entries", Some(&cookies), "action=clock_in"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/time-tracker/dashboard");

        let response = send(&app, get("/time-tracker/dashboard", Some(&cookies))).await;
        let body = body_text(response).await;
        assert!(body.contains("Currently working"));
        assert!(body.contains("clock in"));
        let at = body.find("value=\"clock_in\"").unwrap();
        let start = body[..at].rfind("<button").unwrap();
        let end = at + body[at..].find('>').unwrap();
        assert!(body[start..end].contains("disabled"));

        let response = send(
            &app,
            post_form("/time-tracker/dashboard/entries", Some(&cookies), "action=lunch"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_then_record_without_visiting_dashboard() {
        let (app, backend) = create_test_app();
        backend.inner.sign_up("a@b.com", "abcdef").await.unwrap();

        let response = send(
            &app,
            post_form("/time-tracker/login", None, "email=a%40b.com&password=abcdef"),
        )
        .await;
        let cookies = cookie_jar(&response);

        // Clock out is disabled while not clocked in, even on a cold cache
        let response = send(
            &app,
            post_form("/time-tracker/dashboard/entries", Some(&cookies), "action=clock_out"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = send(&app, get("/time-tracker/dashboard", Some(&cookies))).await;
        let body = body_text(response).await;
        assert!(body.contains("Not clocked in"));
        assert!(!body.contains("clock out"));
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let (app, _, state) = create_test_app_with_state();
        let cookies = register(&app).await;
        assert_eq!(state.sessions.len().await, 1);

        let response = send(&app, post_form("/time-tracker/logout", Some(&cookies), "")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/time-tracker/login");
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("tt_refresh=;") && c.contains("Max-Age=0")));
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("tt_session=;") && c.contains("Max-Age=0")));
        assert!(state.sessions.is_empty().await);

        let session_only: String = cookies
            .split("; ")
            .filter(|c| c.starts_with("tt_session="))
            .collect();
        let response = send(&app, get("/time-tracker/dashboard", Some(&session_only))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/time-tracker/login");
    }

    #[tokio::test]
    async fn test_refresh_cookie_resumes_identity() {
        let (app, _) = create_test_app();
        let cookies = register(&app).await;

        let refresh_only: String = cookies
            .split("; ")
            .filter(|c| c.starts_with("tt_refresh="))
            .collect();
        assert!(!refresh_only.is_empty());

        let response = send(&app, get("/time-tracker/dashboard", Some(&refresh_only))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Not clocked in"));
    }

    #[tokio::test]
    async fn test_pending_session_check_renders_loading_view() {
        let state = state_with(Arc::new(StalledAuth), Duration::from_millis(20));
        let app = build_router(state);

        let response = send(&app, get("/time-tracker/dashboard", Some("tt_refresh=tok"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("http-equiv=\"refresh\""));
    }

    #[tokio::test]
    async fn test_google_not_configured() {
        let (app, _) = create_test_app();
        let response = send(&app, get("/time-tracker/login/google", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, get("/time-tracker/login", None)).await;
        assert!(!body_text(response).await.contains("Sign in with Google"));
    }

    fn google_app() -> Router {
        let state = state_with(Arc::new(CountingAuth::default()), Duration::from_secs(2))
            .with_google(GoogleOAuth::new(GoogleOAuthConfig::new(
                "cid",
                "secret",
                "http://localhost:8080/time-tracker/login/google/callback",
            ))
            .unwrap());
        build_router(state)
    }

    #[tokio::test]
    async fn test_google_start_redirects_to_provider() {
        let app = google_app();

        let response = send(&app, get("/time-tracker/login", None)).await;
        assert!(body_text(response).await.contains("Sign in with Google"));

        let response = send(&app, get("/time-tracker/login/google", None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let url = location(&response);
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("state="));
    }

    #[tokio::test]
    async fn test_google_callback_rejects_forged_state() {
        let app = google_app();

        let response = send(&app, get("/time-tracker/login/google", None)).await;
        let cookies = cookie_jar(&response);

        let response = send(
            &app,
            get(
                "/time-tracker/login/google/callback?code=abc&state=forged",
                Some(&cookies),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains(GOOGLE_FAILED));
    }

    #[tokio::test]
    async fn test_google_callback_cancelled() {
        let app = google_app();
        let response = send(
            &app,
            get("/time-tracker/login/google/callback?error=access_denied", None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains(GOOGLE_FAILED));
    }
}

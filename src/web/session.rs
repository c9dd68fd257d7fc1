//! Browser sessions
//!
//! Each browser gets a `BrowserSession` holding its own `SessionProvider`
//! and `TrackerScreen`, addressed by the `tt_session` cookie. A second
//! cookie, `tt_refresh`, carries the backend refresh token so a browser
//! can resume its identity after the registry has forgotten it.
//!
//! A visitor with neither cookie gets a throwaway session. It is only
//! registered once it holds an identity or a pending Google sign-in, so
//! anonymous traffic never grows the registry. Registered sessions leave
//! on logout or after sitting idle past the configured timeout.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::state::AppState;
use crate::auth::{IdentityBackend, SessionProvider};
use crate::recorder::TrackerScreen;

pub const SESSION_COOKIE: &str = "tt_session";
pub const REFRESH_COOKIE: &str = "tt_refresh";

/// Lifetime of the refresh cookie
const REFRESH_MAX_AGE_SECS: u64 = 30 * 24 * 3600;

/// Server-side state of one browser
pub struct BrowserSession {
    pub id: String,
    pub auth: SessionProvider,
    pub tracker: TrackerScreen,
    /// Pending anti-forgery value of a Google sign-in
    oauth_state: Mutex<Option<String>>,
    last_seen: Mutex<Instant>,
}

impl BrowserSession {
    fn new(id: String, auth: SessionProvider) -> Self {
        Self {
            id,
            auth,
            tracker: TrackerScreen::new(),
            oauth_state: Mutex::new(None),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    /// Mark the session as used now
    pub fn touch(&self) {
        if let Ok(mut seen) = self.last_seen.lock() {
            *seen = Instant::now();
        }
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        self.last_seen
            .lock()
            .map(|seen| now.saturating_duration_since(*seen))
            .unwrap_or_default()
    }

    fn has_oauth_state(&self) -> bool {
        self.oauth_state.lock().is_ok_and(|s| s.is_some())
    }

    /// Whether the session carries anything worth keeping between requests
    fn worth_keeping(&self) -> bool {
        let current = self.auth.current();
        current.loading || current.identity.is_some() || self.has_oauth_state()
    }

    pub fn set_oauth_state(&self, state: String) {
        if let Ok(mut pending) = self.oauth_state.lock() {
            *pending = Some(state);
        }
    }

    /// Consume the pending value; a callback can use it once
    pub fn take_oauth_state(&self) -> Option<String> {
        self.oauth_state.lock().ok().and_then(|mut s| s.take())
    }
}

/// All live browser sessions
pub struct SessionRegistry {
    backend: Arc<dyn IdentityBackend>,
    sessions: RwLock<HashMap<String, Arc<BrowserSession>>>,
}

impl SessionRegistry {
    pub fn new(backend: Arc<dyn IdentityBackend>) -> Self {
        Self {
            backend,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn get(&self, id: &str) -> Option<Arc<BrowserSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Open a session for a browser the registry does not know
    ///
    /// With a resume token the session is registered at once and its check
    /// runs in the background, so later requests can wait on it. Without
    /// one it starts signed out and stays unregistered until [`Self::keep`].
    pub async fn open(&self, resume_token: Option<String>) -> Arc<BrowserSession> {
        let id = Uuid::new_v4().simple().to_string();
        let session = Arc::new(BrowserSession::new(
            id,
            SessionProvider::new(Arc::clone(&self.backend)),
        ));

        match resume_token {
            Some(token) => {
                self.keep(&session).await;
                let init = Arc::clone(&session);
                tokio::spawn(async move {
                    init.auth.initialize(Some(&token)).await;
                });
            }
            None => session.auth.initialize(None).await,
        }
        session
    }

    /// Register a session so its cookie finds it again
    pub async fn keep(&self, session: &Arc<BrowserSession>) {
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(&session.id) {
            sessions.insert(session.id.clone(), Arc::clone(session));
            tracing::debug!(session_id = %session.id, "Browser session created");
        }
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<BrowserSession>> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            tracing::debug!(session_id = %id, "Browser session removed");
        }
        removed
    }

    /// Drop sessions unused for longer than `idle`, returning how many went
    pub async fn sweep(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.idle_for(now) <= idle);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Middleware: attach the browser session to the request
///
/// Handlers receive it as `Extension<Arc<BrowserSession>>`. A new session
/// is registered and gets its cookie only if it is worth keeping after the
/// handler ran. The response also gets a refreshed or cleared `tt_refresh`
/// cookie when the identity changed.
pub async fn attach_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookies = parse_cookies(request.headers());
    let refresh_cookie = cookies
        .get(REFRESH_COOKIE)
        .filter(|v| !v.is_empty())
        .and_then(|v| urlencoding::decode(v).ok())
        .map(|v| v.into_owned());

    let existing = match cookies.get(SESSION_COOKIE) {
        Some(id) => state.sessions.get(id).await,
        None => None,
    };
    let (session, created) = match existing {
        Some(session) => {
            session.touch();
            (session, false)
        }
        None => (state.sessions.open(refresh_cookie.clone()).await, true),
    };

    session
        .auth
        .wait_ready(state.settings.session_check_timeout)
        .await;

    request.extensions_mut().insert(Arc::clone(&session));
    let mut response = next.run(request).await;

    let base = &state.settings.base_path;
    if created {
        if session.worth_keeping() {
            state.sessions.keep(&session).await;
            append_cookie(&mut response, session_cookie(base, &session.id, true));
        } else {
            state.sessions.remove(&session.id).await;
        }
    }

    let current = session.auth.current();
    if !current.loading {
        let token = current.identity.as_ref().and_then(|i| i.refresh_token());
        match (token, refresh_cookie.as_deref()) {
            (Some(token), cookie) if cookie != Some(token) => {
                append_cookie(&mut response, refresh_cookie_value(base, Some(token)));
            }
            (None, Some(_)) => {
                append_cookie(&mut response, refresh_cookie_value(base, None));
            }
            _ => {}
        }
    }

    response
}

/// Name/value pairs from every `Cookie` header
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Set the session cookie, or expire it when `live` is false
pub fn session_cookie(base: &str, id: &str, live: bool) -> String {
    match live {
        true => format!(
            "{}={}; Path={}; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, id, base
        ),
        false => format!(
            "{}=; Path={}; HttpOnly; SameSite=Lax; Max-Age=0",
            SESSION_COOKIE, base
        ),
    }
}

/// Set the refresh cookie, or expire it when `token` is `None`
fn refresh_cookie_value(base: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => format!(
            "{}={}; Path={}; HttpOnly; SameSite=Lax; Max-Age={}",
            REFRESH_COOKIE,
            urlencoding::encode(token),
            base,
            REFRESH_MAX_AGE_SECS
        ),
        None => format!(
            "{}=; Path={}; HttpOnly; SameSite=Lax; Max-Age=0",
            REFRESH_COOKIE, base
        ),
    }
}

pub fn append_cookie(response: &mut Response, cookie: String) {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(error = %e, "Dropping unencodable cookie"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LocalAuth;
    use std::time::Duration;

    #[test]
    fn test_parse_cookies() {
        let mut headers = HeaderMap::new();
        headers.append(
            header::COOKIE,
            HeaderValue::from_static("tt_session=abc; theme=dark"),
        );
        headers.append(header::COOKIE, HeaderValue::from_static("tt_refresh=r%2F1"));

        let cookies = parse_cookies(&headers);
        assert_eq!(cookies.get(SESSION_COOKIE).map(String::as_str), Some("abc"));
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
        assert_eq!(cookies.get(REFRESH_COOKIE).map(String::as_str), Some("r%2F1"));
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie("/time-tracker", "abc", true);
        assert_eq!(
            cookie,
            "tt_session=abc; Path=/time-tracker; HttpOnly; SameSite=Lax"
        );
        assert!(session_cookie("/time-tracker", "abc", false).starts_with("tt_session=;"));
        assert!(refresh_cookie_value("/time-tracker", None).contains("Max-Age=0"));
        assert!(refresh_cookie_value("/time-tracker", Some("a/b"))
            .starts_with("tt_refresh=a%2Fb;"));
    }

    #[tokio::test]
    async fn test_anonymous_session_is_not_registered() {
        let registry = SessionRegistry::new(Arc::new(LocalAuth::new()));

        let session = registry.open(None).await;
        let state = session.auth.current();
        assert!(!state.loading);
        assert!(state.identity.is_none());
        assert!(!session.worth_keeping());
        assert!(registry.is_empty().await);

        session.set_oauth_state("xyz".to_string());
        assert!(session.worth_keeping());
        registry.keep(&session).await;
        registry.keep(&session).await;

        let found = registry.get(&session.id).await.unwrap();
        assert!(Arc::ptr_eq(&found, &session));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_resuming_session_is_registered_and_initialized() {
        let backend = Arc::new(LocalAuth::new());
        let identity = backend.sign_up("a@b.com", "abcdef").await.unwrap();
        let registry = SessionRegistry::new(backend);

        let session = registry.open(identity.refresh_token().map(str::to_string)).await;
        assert_eq!(registry.len().await, 1);

        let state = session.auth.wait_ready(Duration::from_secs(2)).await;
        assert_eq!(state.identity.unwrap().email.as_deref(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn test_remove_and_sweep() {
        let registry = SessionRegistry::new(Arc::new(LocalAuth::new()));
        let first = registry.open(None).await;
        let second = registry.open(None).await;
        registry.keep(&first).await;
        registry.keep(&second).await;

        assert!(registry.remove(&first.id).await.is_some());
        assert!(registry.remove(&first.id).await.is_none());
        assert_eq!(registry.len().await, 1);

        assert_eq!(registry.sweep(Duration::from_secs(60)).await, 0);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(registry.sweep(Duration::from_millis(10)).await, 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_touch_resets_idle_time() {
        let session = BrowserSession::new(
            "s1".to_string(),
            SessionProvider::new(Arc::new(LocalAuth::new())),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(session.idle_for(Instant::now()) >= Duration::from_millis(30));

        session.touch();
        assert!(session.idle_for(Instant::now()) < Duration::from_millis(30));
    }

    #[test]
    fn test_oauth_state_is_single_use() {
        let session = BrowserSession::new(
            "s1".to_string(),
            SessionProvider::new(Arc::new(LocalAuth::new())),
        );
        assert_eq!(session.take_oauth_state(), None);
        session.set_oauth_state("xyz".to_string());
        assert_eq!(session.take_oauth_state().as_deref(), Some("xyz"));
        assert_eq!(session.take_oauth_state(), None);
    }
}

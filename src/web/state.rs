//! Application State
//!
//! Shared state accessible by all handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::session::SessionRegistry;
use crate::auth::{GoogleOAuth, IdentityBackend};
use crate::config::Config;
use crate::recorder::TimeEntryRecorder;

/// Shared application state for all handlers
pub struct AppState {
    /// Browser sessions by cookie id
    pub sessions: SessionRegistry,
    /// Entry loading and recording
    pub recorder: Arc<TimeEntryRecorder>,
    /// Google sign-in, when configured
    pub google: Option<GoogleOAuth>,
    pub settings: WebConfig,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        recorder: Arc<TimeEntryRecorder>,
        settings: WebConfig,
    ) -> Self {
        Self {
            sessions: SessionRegistry::new(backend),
            recorder,
            google: None,
            settings,
            start_time: Instant::now(),
        }
    }

    /// Enable "Sign in with Google"
    pub fn with_google(mut self, google: GoogleOAuth) -> Self {
        self.google = Some(google);
        self
    }

    /// Absolute path of a screen under the base path
    pub fn path(&self, route: &str) -> String {
        format!("{}{}", self.settings.base_path, route)
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// HTTP-facing settings
#[derive(Debug, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Prefix of every screen, e.g. "/time-tracker"
    pub base_path: String,
    pub cors_origins: Vec<String>,
    /// How long a request waits for a new session's initial check
    pub session_check_timeout: Duration,
    /// Idle time after which a browser session is dropped
    pub session_idle_timeout: Duration,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            base_path: "/time-tracker".to_string(),
            cors_origins: Vec::new(),
            session_check_timeout: Duration::from_millis(2000),
            session_idle_timeout: Duration::from_secs(8 * 3600),
        }
    }
}

impl WebConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            base_path: config.server.base_path.clone(),
            cors_origins: config.server.cors_origins.clone(),
            session_check_timeout: Duration::from_millis(config.auth.session_check_timeout_ms),
            session_idle_timeout: Duration::from_secs(config.auth.session_idle_secs),
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

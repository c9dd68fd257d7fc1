//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::auth::{FirebaseAuthConfig, GoogleOAuthConfig};
use crate::entry::CompanyId;
use crate::store::FirestoreConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub tenant: TenantConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub firebase: FirebaseConfig,

    #[serde(default)]
    pub google: Option<GoogleConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Prefix every screen is served under
    #[serde(default = "default_base_path")]
    pub base_path: String,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_base_path() -> String {
    "/time-tracker".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_path: default_base_path(),
            cors_origins: Vec::new(),
        }
    }
}

/// Organization the recorded entries belong to
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantConfig {
    #[serde(default)]
    pub company_id: String,
}

/// Which identity backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthBackend {
    #[default]
    Local,
    Firebase,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub backend: AuthBackend,

    /// How long a request waits for a new session's initial check (ms)
    #[serde(default = "default_session_check_timeout")]
    pub session_check_timeout_ms: u64,

    /// Browser sessions unused for this long are dropped (seconds)
    #[serde(default = "default_session_idle")]
    pub session_idle_secs: u64,
}

fn default_session_check_timeout() -> u64 {
    2000
}

fn default_session_idle() -> u64 {
    8 * 3600
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            backend: AuthBackend::default(),
            session_check_timeout_ms: default_session_check_timeout(),
            session_idle_secs: default_session_idle(),
        }
    }
}

/// Which entry store to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
    Firestore,
}

/// Entry store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

fn default_sqlite_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("timetracker").join("entries.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "./timetracker_data/entries.db".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

/// Firebase project configuration
///
/// Endpoint overrides point the adapters at the Firebase emulators.
#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub project_id: String,

    #[serde(default = "default_database_id")]
    pub database_id: String,

    pub identity_url: Option<String>,

    pub token_url: Option<String>,

    pub firestore_url: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_database_id() -> String {
    "(default)".to_string()
}

fn default_request_timeout() -> u64 {
    10_000
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            project_id: String::new(),
            database_id: default_database_id(),
            identity_url: None,
            token_url: None,
            firestore_url: None,
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl FirebaseConfig {
    pub fn auth_config(&self, request_uri: &str) -> FirebaseAuthConfig {
        let defaults = FirebaseAuthConfig::default();
        FirebaseAuthConfig {
            api_key: self.api_key.clone(),
            identity_url: self.identity_url.clone().unwrap_or(defaults.identity_url),
            token_url: self.token_url.clone().unwrap_or(defaults.token_url),
            request_uri: request_uri.to_string(),
            request_timeout_ms: self.request_timeout_ms,
        }
    }

    pub fn firestore_config(&self) -> FirestoreConfig {
        let defaults = FirestoreConfig::default();
        FirestoreConfig {
            project_id: self.project_id.clone(),
            database_id: self.database_id.clone(),
            base_url: self.firestore_url.clone().unwrap_or(defaults.base_url),
            request_timeout_ms: self.request_timeout_ms,
        }
    }
}

/// Google sign-in configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,

    pub client_secret: String,

    #[serde(default = "default_google_redirect")]
    pub redirect_uri: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_google_redirect() -> String {
    "http://localhost:8080/time-tracker/login/google/callback".to_string()
}

impl GoogleConfig {
    pub fn oauth_config(&self) -> GoogleOAuthConfig {
        GoogleOAuthConfig {
            request_timeout_ms: self.request_timeout_ms,
            ..GoogleOAuthConfig::new(&self.client_id, &self.client_secret, &self.redirect_uri)
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("timetracker").join("config.toml")),
            Some(PathBuf::from("/etc/timetracker/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(host) = var("TIMETRACKER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("TIMETRACKER_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Some(base_path) = var("TIMETRACKER_BASE_PATH") {
            self.server.base_path = base_path;
        }

        if let Some(company_id) = var("TIMETRACKER_COMPANY_ID") {
            self.tenant.company_id = company_id;
        }

        // Firebase overrides
        if let Some(api_key) = var("TIMETRACKER_FIREBASE_API_KEY") {
            self.firebase.api_key = api_key;
        }
        if let Some(project_id) = var("TIMETRACKER_FIREBASE_PROJECT_ID") {
            self.firebase.project_id = project_id;
        }

        // Google overrides, only when both halves of the client are known
        let client_id = var("TIMETRACKER_GOOGLE_CLIENT_ID");
        let client_secret = var("TIMETRACKER_GOOGLE_CLIENT_SECRET");
        match (&mut self.google, client_id, client_secret) {
            (Some(google), id, secret) => {
                if let Some(id) = id {
                    google.client_id = id;
                }
                if let Some(secret) = secret {
                    google.client_secret = secret;
                }
            }
            (None, Some(client_id), Some(client_secret)) => {
                self.google = Some(GoogleConfig {
                    client_id,
                    client_secret,
                    redirect_uri: default_google_redirect(),
                    request_timeout_ms: default_request_timeout(),
                });
            }
            _ => {}
        }

        // Logging overrides
        if let Some(level) = var("TIMETRACKER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("TIMETRACKER_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Check the settings the application cannot start without
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.company_id()?;

        let base = &self.server.base_path;
        if !base.starts_with('/') || base.ends_with('/') {
            return Err(ConfigError::Invalid(format!(
                "server.base_path must start with '/' and not end with '/': {:?}",
                base
            )));
        }

        if self.auth.session_idle_secs == 0 {
            return Err(ConfigError::Invalid(
                "auth.session_idle_secs must be positive".to_string(),
            ));
        }

        let needs_firebase = self.auth.backend == AuthBackend::Firebase
            || self.storage.backend == StorageBackend::Firestore;
        if needs_firebase && self.firebase.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("firebase.api_key is required".to_string()));
        }
        if self.storage.backend == StorageBackend::Firestore {
            if self.firebase.project_id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "firebase.project_id is required for the firestore store".to_string(),
                ));
            }
            // Firestore only accepts ID tokens issued by Firebase Authentication
            if self.auth.backend != AuthBackend::Firebase {
                return Err(ConfigError::Invalid(
                    "the firestore store requires auth.backend = \"firebase\"".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Organization id entries are written with
    pub fn company_id(&self) -> Result<CompanyId, ConfigError> {
        CompanyId::new(self.tenant.company_id.trim())
            .ok_or_else(|| ConfigError::Invalid("tenant.company_id is required".to_string()))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Time Tracker Configuration
#
# Environment variables override these settings:
# - TIMETRACKER_HOST
# - TIMETRACKER_PORT
# - TIMETRACKER_BASE_PATH
# - TIMETRACKER_COMPANY_ID
# - TIMETRACKER_FIREBASE_API_KEY
# - TIMETRACKER_FIREBASE_PROJECT_ID
# - TIMETRACKER_GOOGLE_CLIENT_ID
# - TIMETRACKER_GOOGLE_CLIENT_SECRET
# - TIMETRACKER_LOG_LEVEL
# - TIMETRACKER_LOG_FORMAT

[server]
# HTTP server host
host = "0.0.0.0"

# HTTP server port
port = 8080

# Path prefix of every screen
base_path = "/time-tracker"

# Allowed CORS origins
cors_origins = []

[tenant]
# Organization recorded on every entry (required)
company_id = "default-company"

[auth]
# Identity backend: local (in-process accounts) or firebase
backend = "local"

# How long a request waits for a new session's initial check (ms)
session_check_timeout_ms = 2000

# Browser sessions unused for this long are dropped (seconds)
session_idle_secs = 28800

[storage]
# Entry store: memory, sqlite or firestore
backend = "memory"

# Database file for the sqlite store
sqlite_path = "~/.local/share/timetracker/entries.db"

[firebase]
# Web API key and project of the Firebase app
api_key = ""
project_id = ""
database_id = "(default)"

# Emulator endpoints
# identity_url = "http://localhost:9099/identitytoolkit.googleapis.com/v1"
# token_url = "http://localhost:9099/securetoken.googleapis.com/v1"
# firestore_url = "http://localhost:8081/v1"

# Request timeout (ms)
request_timeout_ms = 10000

# Google sign-in (OAuth client from the Google Cloud console)
# [google]
# client_id = ""
# client_secret = ""
# redirect_uri = "http://localhost:8080/time-tracker/login/google/callback"
# request_timeout_ms = 10000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

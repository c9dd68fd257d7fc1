//! Authentication
//!
//! The identity backend is an external service. This module defines the
//! seam to it and the session object the rest of the application talks to.
//!
//! ## Architecture
//!
//! - **IdentityBackend**: sign-in, sign-up, federated sign-in, sign-out, resume
//! - **LocalAuth**: in-process accounts for development and tests
//! - **FirebaseAuth**: Identity Toolkit / Secure Token REST adapter
//! - **GoogleOAuth**: authorization-code flow producing a federated credential
//! - **SessionProvider**: current identity + loading flag behind a watch channel
//!
//! ## Data Flow
//!
//! 1. A browser session owns one `SessionProvider`
//! 2. `initialize` runs the initial session check and clears `loading`
//! 3. `login` / `register` / `federated_login` / `logout` call the backend
//! 4. Identity changes reach subscribers through the watch channel

mod federated;
mod firebase;
mod local;
mod session;

pub use federated::{check_callback, CallbackParams, GoogleOAuth, GoogleOAuthConfig};
pub use firebase::{FirebaseAuth, FirebaseAuthConfig};
pub use local::LocalAuth;
pub use session::{SessionProvider, SessionState};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use thiserror::Error;

/// Authenticated actor
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    /// Backend user id (Firebase `localId`)
    pub user_id: String,
    pub email: Option<String>,
    /// Credentials for calls made on the user's behalf
    pub tokens: Option<Tokens>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email,
            tokens: None,
        }
    }

    pub fn with_tokens(mut self, tokens: Tokens) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Bearer token for the document store, if the backend issued one
    pub fn id_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.id_token.as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.refresh_token.as_str())
    }

    /// Whether the ID token should be renewed before it is used at `now`
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        let margin = Duration::seconds(EXPIRY_MARGIN_SECS);
        self.tokens
            .as_ref()
            .is_some_and(|t| t.expires_within(now, margin))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("tokens", &self.tokens.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// ID tokens are renewed this many seconds before they expire
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Backend-issued credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Tokens {
    pub id_token: String,
    pub refresh_token: String,
    /// When the ID token stops being accepted; `None` if it does not expire
    pub expires_at: Option<DateTime<Utc>>,
}

impl Tokens {
    pub fn new(id_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            id_token: id_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: None,
        }
    }

    /// Set the expiry from a lifetime in seconds, as reported by the backend
    pub fn expiring_in(mut self, seconds: i64) -> Self {
        self.expires_at = Some(Utc::now() + Duration::seconds(seconds));
        self
    }

    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at.is_some_and(|at| at - margin <= now)
    }
}

impl fmt::Debug for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Tokens(<redacted>)")
    }
}

/// Proof of identity from a third-party provider
#[derive(Clone, PartialEq, Eq)]
pub enum FederatedCredential {
    /// OpenID Connect ID token, e.g. from Google
    IdToken {
        provider_id: String,
        id_token: String,
    },
}

impl fmt::Debug for FederatedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FederatedCredential::IdToken { provider_id, .. } => f
                .debug_struct("IdToken")
                .field("provider_id", provider_id)
                .finish_non_exhaustive(),
        }
    }
}

/// Operations the application consumes from the identity backend
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Email/password sign-in
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity>;

    /// Create an account and sign it in
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Identity>;

    /// Sign in with a credential from a third-party provider
    async fn sign_in_federated(&self, credential: FederatedCredential) -> AuthResult<Identity>;

    /// End the session on the backend side
    async fn sign_out(&self, identity: &Identity) -> AuthResult<()>;

    /// Restore a session from a refresh token
    async fn resume(&self, refresh_token: &str) -> AuthResult<Identity>;
}

/// Errors from the identity backend or the federated flow
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already in use")]
    EmailInUse,

    #[error("Weak password: {0}")]
    WeakPassword(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Federated sign-in cancelled")]
    FederatedCancelled,

    #[error("Federated sign-in failed: {0}")]
    Federated(String),

    #[error("Federated sign-in is not available with this backend")]
    FederatedUnavailable,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Identity API error {status}: {message}")]
    Api { status: u16, message: String },
}

/// Result type alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

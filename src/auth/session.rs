//! Session provider
//!
//! Holds the current identity of one browser session and publishes every
//! change on a `tokio::sync::watch` channel. Operations report only success
//! or failure; the new identity arrives through the subscription, the same
//! way the first `initialize` result does.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::{AuthError, AuthResult, FederatedCredential, Identity, IdentityBackend};

/// Snapshot published to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub identity: Option<Identity>,
    /// True until the initial session check has completed
    pub loading: bool,
}

impl SessionState {
    pub fn loading() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            identity: None,
            loading: false,
        }
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            loading: false,
        }
    }
}

/// Current identity plus the authentication operations
pub struct SessionProvider {
    backend: Arc<dyn IdentityBackend>,
    state: watch::Sender<SessionState>,
}

impl SessionProvider {
    /// Create a provider in the loading state
    pub fn new(backend: Arc<dyn IdentityBackend>) -> Self {
        let (state, _) = watch::channel(SessionState::loading());
        Self { backend, state }
    }

    /// Receive every identity change, starting with the current state
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Run the initial session check
    ///
    /// With a resume token the backend is asked to restore the session.
    /// Either way the first non-loading state is published.
    pub async fn initialize(&self, resume_token: Option<&str>) {
        let identity = match resume_token {
            Some(token) => match self.backend.resume(token).await {
                Ok(identity) => {
                    tracing::debug!(user_id = %identity.user_id, "Session resumed");
                    Some(identity)
                }
                Err(e) => {
                    tracing::warn!(
                        backend = self.backend.name(),
                        error = %e,
                        "Session resume failed"
                    );
                    None
                }
            },
            None => None,
        };

        self.publish(identity);
    }

    /// Email/password sign-in
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<()> {
        let identity = self.backend.sign_in(email, password).await?;
        tracing::info!(user_id = %identity.user_id, "Signed in");
        self.publish(Some(identity));
        Ok(())
    }

    /// Create an account and sign in
    pub async fn register(&self, email: &str, password: &str) -> AuthResult<()> {
        let identity = self.backend.sign_up(email, password).await?;
        tracing::info!(user_id = %identity.user_id, "Account registered");
        self.publish(Some(identity));
        Ok(())
    }

    /// Sign in with a third-party credential
    pub async fn federated_login(&self, credential: FederatedCredential) -> AuthResult<()> {
        let identity = self.backend.sign_in_federated(credential).await?;
        tracing::info!(user_id = %identity.user_id, "Signed in with federated provider");
        self.publish(Some(identity));
        Ok(())
    }

    /// End the session
    ///
    /// The local identity is cleared even if the backend call fails.
    pub async fn logout(&self) -> AuthResult<()> {
        let current = self.current().identity;
        let result = match &current {
            Some(identity) => self.backend.sign_out(identity).await,
            None => Ok(()),
        };

        if let Some(identity) = current {
            tracing::info!(user_id = %identity.user_id, "Signed out");
        }
        self.publish(None);
        result
    }

    /// Wait until the initial check has completed, at most `timeout`
    ///
    /// Returns the state at that point, which is still loading on timeout.
    pub async fn wait_ready(&self, timeout: Duration) -> SessionState {
        let mut rx = self.subscribe();
        let ready = match tokio::time::timeout(timeout, rx.wait_for(|s| !s.loading)).await {
            Ok(Ok(state)) => Some(state.clone()),
            _ => None,
        };
        ready.unwrap_or_else(|| self.current())
    }

    /// Current identity with a usable ID token
    ///
    /// Renews the token first when it is about to expire. If renewal fails
    /// for a transient reason the old identity is returned as is.
    pub async fn authorized(&self) -> Option<Identity> {
        let identity = self.current().identity?;
        if !identity.needs_refresh(Utc::now()) {
            return Some(identity);
        }

        match self.renew().await {
            Ok(renewed) => Some(renewed),
            Err(e) => {
                tracing::warn!(user_id = %identity.user_id, error = %e, "ID token renewal failed");
                self.current().identity
            }
        }
    }

    /// Exchange the refresh token for a new ID token and publish it
    ///
    /// A refresh token the backend no longer accepts ends the session. A
    /// sign-out or new sign-in that happened meanwhile is left untouched.
    pub async fn renew(&self) -> AuthResult<Identity> {
        let refresh_token = self
            .current()
            .identity
            .and_then(|i| i.refresh_token().map(str::to_string))
            .ok_or(AuthError::SessionExpired)?;

        let renewed = match self.backend.resume(&refresh_token).await {
            Ok(identity) => Some(identity),
            Err(AuthError::SessionExpired) => None,
            Err(e) => return Err(e),
        };

        let applied = self.state.send_if_modified(|state| {
            let unchanged = state
                .identity
                .as_ref()
                .is_some_and(|i| i.refresh_token() == Some(refresh_token.as_str()));
            if unchanged {
                state.identity = renewed.clone();
            }
            unchanged
        });

        match renewed {
            Some(identity) => {
                if applied {
                    tracing::debug!(user_id = %identity.user_id, "ID token renewed");
                }
                Ok(identity)
            }
            None => {
                if applied {
                    tracing::info!("Session expired, signed out");
                }
                Err(AuthError::SessionExpired)
            }
        }
    }

    fn publish(&self, identity: Option<Identity>) {
        self.state.send_replace(SessionState {
            identity,
            loading: false,
        });
    }
}

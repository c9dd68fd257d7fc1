//! Google sign-in
//!
//! OAuth 2.0 authorization-code flow. The browser is redirected to Google,
//! comes back to the callback with a `code`, and the code is exchanged for
//! an OpenID Connect ID token that the identity backend accepts as a
//! federated credential.

use reqwest::Client;
use serde::Deserialize;

use super::{AuthError, AuthResult, FederatedCredential};

/// Provider id the identity backend expects for Google credentials
pub const GOOGLE_PROVIDER_ID: &str = "google.com";

/// Configuration for the Google OAuth client
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Absolute URL of the callback route
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    /// Timeout of the code exchange in milliseconds
    pub request_timeout_ms: u64,
}

impl GoogleOAuthConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

/// Query parameters Google appends to the callback URL
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Google OAuth client
pub struct GoogleOAuth {
    client: Client,
    config: GoogleOAuthConfig,
}

impl GoogleOAuth {
    pub fn new(config: GoogleOAuthConfig) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GoogleOAuthConfig {
        &self.config
    }

    /// Fresh anti-forgery value for the `state` parameter
    pub fn new_state() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// URL the browser is sent to
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&\
             client_id={}&\
             redirect_uri={}&\
             scope=openid%20email%20profile&\
             prompt=select_account&\
             state={}",
            self.config.authorize_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for an ID token credential
    pub async fn exchange_code(&self, code: &str) -> AuthResult<FederatedCredential> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::Federated(format!(
                "token exchange failed ({}): {}",
                status, text
            )));
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            id_token: Option<String>,
        }

        let token: TokenResponse = response.json().await?;
        let id_token = token
            .id_token
            .ok_or_else(|| AuthError::Federated("token response had no id_token".into()))?;

        Ok(FederatedCredential::IdToken {
            provider_id: GOOGLE_PROVIDER_ID.to_string(),
            id_token,
        })
    }
}

/// Validate the callback and return the authorization code
///
/// `expected_state` is the value issued when the flow started; a missing or
/// different state means the callback was not initiated by this session.
pub fn check_callback(params: &CallbackParams, expected_state: Option<&str>) -> AuthResult<String> {
    if let Some(error) = params.error.as_deref() {
        return Err(match error {
            "access_denied" => AuthError::FederatedCancelled,
            other => AuthError::Federated(other.to_string()),
        });
    }

    match (params.state.as_deref(), expected_state) {
        (Some(got), Some(expected)) if got == expected => {}
        _ => return Err(AuthError::Federated("state mismatch".into())),
    }

    params
        .code
        .clone()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::Federated("callback had no code".into()))
}

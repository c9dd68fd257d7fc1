//! Firebase Authentication REST adapter
//!
//! Talks to the Identity Toolkit and Secure Token REST APIs. Endpoints are
//! configurable so the Firebase emulator can stand in for the hosted service.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AuthError, AuthResult, FederatedCredential, Identity, IdentityBackend, Tokens};

/// Lifetime assumed when a response omits `expiresIn`
const DEFAULT_ID_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Configuration for the Firebase identity adapter
#[derive(Debug, Clone)]
pub struct FirebaseAuthConfig {
    /// Web API key of the Firebase project
    pub api_key: String,
    /// Identity Toolkit base, e.g. "https://identitytoolkit.googleapis.com/v1"
    pub identity_url: String,
    /// Secure Token base, e.g. "https://securetoken.googleapis.com/v1"
    pub token_url: String,
    /// Request URI reported to `accounts:signInWithIdp`
    pub request_uri: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for FirebaseAuthConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            identity_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
            token_url: "https://securetoken.googleapis.com/v1".to_string(),
            request_uri: "http://localhost".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

/// Identity backend backed by Firebase Authentication
pub struct FirebaseAuth {
    client: Client,
    config: FirebaseAuthConfig,
}

impl FirebaseAuth {
    pub fn new(config: FirebaseAuthConfig) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FirebaseAuthConfig {
        &self.config
    }

    fn accounts_url(&self, method: &str) -> String {
        format!(
            "{}/accounts:{}?key={}",
            self.config.identity_url.trim_end_matches('/'),
            method,
            urlencoding::encode(&self.config.api_key)
        )
    }

    fn refresh_url(&self) -> String {
        format!(
            "{}/token?key={}",
            self.config.token_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.api_key)
        )
    }

    async fn post_accounts<B: Serialize>(
        &self,
        method: &str,
        body: &B,
    ) -> AuthResult<SignInResponse> {
        let response = self
            .client
            .post(self.accounts_url(method))
            .json(body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            Err(map_api_error(status, &text))
        }
    }

    async fn lookup_email(&self, id_token: &str) -> AuthResult<Option<String>> {
        let response = self
            .client
            .post(self.accounts_url("lookup"))
            .json(&LookupRequest { id_token })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &text));
        }

        let lookup: LookupResponse = response.json().await?;
        Ok(lookup.users.into_iter().next().and_then(|u| u.email))
    }
}

#[async_trait]
impl IdentityBackend for FirebaseAuth {
    fn name(&self) -> &str {
        "firebase"
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        Ok(self.post_accounts("signInWithPassword", &body).await?.into_identity())
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        Ok(self.post_accounts("signUp", &body).await?.into_identity())
    }

    async fn sign_in_federated(&self, credential: FederatedCredential) -> AuthResult<Identity> {
        let FederatedCredential::IdToken {
            provider_id,
            id_token,
        } = credential;

        let post_body = format!(
            "id_token={}&providerId={}",
            urlencoding::encode(&id_token),
            urlencoding::encode(&provider_id)
        );
        let body = IdpRequest {
            post_body: &post_body,
            request_uri: &self.config.request_uri,
            return_secure_token: true,
            return_idp_credential: true,
        };

        self.post_accounts("signInWithIdp", &body)
            .await
            .map(SignInResponse::into_identity)
            .map_err(|e| match e {
                AuthError::Api { message, .. } => AuthError::Federated(message),
                other => other,
            })
    }

    async fn sign_out(&self, identity: &Identity) -> AuthResult<()> {
        // Firebase sessions end client-side; dropping the tokens is enough.
        tracing::debug!(user_id = %identity.user_id, "Firebase session dropped");
        Ok(())
    }

    async fn resume(&self, refresh_token: &str) -> AuthResult<Identity> {
        let response = self
            .client
            .post(self.refresh_url())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(match map_api_error(status, &text) {
                AuthError::Api { .. } | AuthError::InvalidCredentials => AuthError::SessionExpired,
                other => other,
            });
        }

        let refreshed: RefreshResponse = response.json().await?;
        let email = self.lookup_email(&refreshed.id_token).await?;

        let tokens = Tokens::new(refreshed.id_token, refreshed.refresh_token)
            .expiring_in(parse_lifetime(&refreshed.expires_in));
        Ok(Identity::new(refreshed.user_id, email).with_tokens(tokens))
    }
}

/// Translate a Firebase error body into an `AuthError`
///
/// Firebase reports `{"error": {"code": 400, "message": "EMAIL_EXISTS"}}`;
/// some messages carry a suffix (`"WEAK_PASSWORD : Password should be ..."`).
fn map_api_error(status: u16, body: &str) -> AuthError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    let (code, detail) = match message.split_once(" : ") {
        Some((code, detail)) => (code.trim(), detail.trim()),
        None => (message.trim(), ""),
    };

    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "USER_DISABLED"
        | "INVALID_EMAIL" => AuthError::InvalidCredentials,
        "EMAIL_EXISTS" => AuthError::EmailInUse,
        "WEAK_PASSWORD" => AuthError::WeakPassword(detail.to_string()),
        "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" => AuthError::SessionExpired,
        _ => AuthError::Api {
            status,
            message: message.clone(),
        },
    }
}

/// ID token lifetime in seconds; Firebase sends it as a string
fn parse_lifetime(expires_in: &str) -> i64 {
    expires_in
        .trim()
        .parse()
        .unwrap_or(DEFAULT_ID_TOKEN_LIFETIME_SECS)
}

// ============================================
// Request/Response DTOs
// ============================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest<'a> {
    post_body: &'a str,
    request_uri: &'a str,
    return_secure_token: bool,
    return_idp_credential: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: String,
}

impl SignInResponse {
    fn into_identity(self) -> Identity {
        let tokens = Tokens::new(self.id_token, self.refresh_token)
            .expiring_in(parse_lifetime(&self.expires_in));
        Identity::new(self.local_id, self.email.filter(|e| !e.is_empty())).with_tokens(tokens)
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
    #[serde(default)]
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
struct LookupUser {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

//! In-process identity backend
//!
//! Accounts live in memory for the lifetime of the process. Passwords are
//! stored as salted SHA-256 digests. Used for local development and tests.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuthError, AuthResult, FederatedCredential, Identity, IdentityBackend, Tokens};

const MIN_PASSWORD_LEN: usize = 6;

/// Lifetime of issued ID tokens, matching Firebase
const ID_TOKEN_LIFETIME_SECS: i64 = 3600;

struct Account {
    user_id: String,
    email: String,
    salt: String,
    digest: String,
}

/// Identity backend holding accounts in memory
#[derive(Default)]
pub struct LocalAuth {
    /// Lowercased email → account
    accounts: RwLock<HashMap<String, Account>>,
    /// Refresh token → user id
    refresh_tokens: RwLock<HashMap<String, String>>,
}

impl LocalAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered accounts
    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }

    async fn issue(&self, user_id: &str, email: &str) -> Identity {
        let tokens = Tokens::new(Uuid::new_v4().to_string(), Uuid::new_v4().to_string())
            .expiring_in(ID_TOKEN_LIFETIME_SECS);
        self.refresh_tokens
            .write()
            .await
            .insert(tokens.refresh_token.clone(), user_id.to_string());

        Identity::new(user_id, Some(email.to_string())).with_tokens(tokens)
    }
}

/// Salted SHA-256 of a password
///
/// A single fast hash is only fit for this development backend; it offers
/// little resistance to offline guessing if the account map ever leaks.
fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl IdentityBackend for LocalAuth {
    fn name(&self) -> &str {
        "local"
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let (user_id, email) = {
            let accounts = self.accounts.read().await;
            let account = accounts
                .get(&email.to_lowercase())
                .ok_or(AuthError::InvalidCredentials)?;

            if digest(&account.salt, password) != account.digest {
                return Err(AuthError::InvalidCredentials);
            }
            (account.user_id.clone(), account.email.clone())
        };

        Ok(self.issue(&user_id, &email).await)
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Identity> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let key = email.to_lowercase();
        let user_id = {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(&key) {
                return Err(AuthError::EmailInUse);
            }

            let salt = Uuid::new_v4().to_string();
            let account = Account {
                user_id: Uuid::new_v4().simple().to_string(),
                email: email.to_string(),
                digest: digest(&salt, password),
                salt,
            };
            let user_id = account.user_id.clone();
            accounts.insert(key, account);
            user_id
        };

        tracing::debug!(user_id = %user_id, "Local account created");
        Ok(self.issue(&user_id, email).await)
    }

    async fn sign_in_federated(&self, _credential: FederatedCredential) -> AuthResult<Identity> {
        Err(AuthError::FederatedUnavailable)
    }

    async fn sign_out(&self, identity: &Identity) -> AuthResult<()> {
        if let Some(token) = identity.refresh_token() {
            self.refresh_tokens.write().await.remove(token);
        }
        Ok(())
    }

    async fn resume(&self, refresh_token: &str) -> AuthResult<Identity> {
        let user_id = self
            .refresh_tokens
            .read()
            .await
            .get(refresh_token)
            .cloned()
            .ok_or(AuthError::SessionExpired)?;

        let email = self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.user_id == user_id)
            .map(|a| a.email.clone());

        let tokens = Tokens::new(Uuid::new_v4().to_string(), refresh_token)
            .expiring_in(ID_TOKEN_LIFETIME_SECS);
        Ok(Identity::new(user_id, email).with_tokens(tokens))
    }
}

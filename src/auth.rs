//! Credential exchange — trades the fixed client id/secret pair for a
//! short-lived bearer token.
//!
//! One POST, no automatic retry: a failed exchange aborts the current
//! bootstrap attempt and the caller decides whether to retry the whole
//! bootstrap.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::AuthError;

/// A short-lived bearer token.
///
/// Created per bootstrap attempt, held only in memory for the duration of
/// session establishment, never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token string. Empty tokens are rejected upstream.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Tokens are short-lived but still credentials; keep them out of logs.
        f.write_str("AccessToken(…)")
    }
}

/// Anything that can produce a bearer token for a bootstrap attempt.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn exchange(&self) -> Result<AccessToken, AuthError>;
}

/// Token client bound to the process credentials.
pub struct AuthClient {
    http: reqwest::Client,
    auth_url: String,
    client_id: String,
    client_secret: SecretString,
}

impl AuthClient {
    pub fn new(
        http: reqwest::Client,
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Self {
        Self {
            http,
            auth_url: auth_url.into(),
            client_id: client_id.into(),
            client_secret,
        }
    }
}

#[async_trait]
impl TokenSource for AuthClient {
    async fn exchange(&self) -> Result<AccessToken, AuthError> {
        if self.client_id.trim().is_empty() || self.client_secret.expose_secret().trim().is_empty()
        {
            return Err(AuthError::EmptyCredentials);
        }

        let body = serde_json::json!({
            "clientId": self.client_id,
            "clientSecret": self.client_secret.expose_secret(),
        });

        let resp = self
            .http
            .post(&self.auth_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::RequestFailed {
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::BadStatus { status, body });
        }

        let data: Value = resp.json().await.map_err(|e| AuthError::RequestFailed {
            reason: format!("unreadable auth response: {e}"),
        })?;

        match extract_token(&data) {
            Some(token) => {
                tracing::debug!("Token exchange succeeded");
                Ok(AccessToken::new(token))
            }
            None => Err(AuthError::TokenMissing {
                body: data.to_string(),
            }),
        }
    }
}

/// Pull the token out of an auth response.
///
/// The endpoint has been observed to return it both at the top level and
/// nested under `data`; check both before giving up.
fn extract_token(body: &Value) -> Option<String> {
    body.get("token")
        .and_then(Value::as_str)
        .or_else(|| {
            body.get("data")
                .and_then(|d| d.get("token"))
                .and_then(Value::as_str)
        })
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

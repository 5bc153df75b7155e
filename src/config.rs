//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::session::{AvatarQuality, VoiceEmotion};

/// Default base URL of the service's open API.
const DEFAULT_API_BASE: &str = "https://openapi.akool.com/api/open/v4";

/// Default token-exchange endpoint (v3 — the v4 API still issues tokens here).
const DEFAULT_AUTH_URL: &str = "https://openapi.akool.com/api/open/v3/getToken";

/// Client configuration, loaded once at startup and fixed for the process
/// lifetime. The client secret is held behind [`SecretString`] and is never
/// logged.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API client id issued by the service.
    pub client_id: String,
    /// API client secret issued by the service.
    pub client_secret: SecretString,
    /// Token-exchange endpoint URL.
    pub auth_url: String,
    /// Base URL for authenticated API calls (knowledge, sessions).
    pub api_base: String,
    /// Avatar to present.
    pub avatar_id: String,
    /// Voice the avatar speaks with.
    pub voice_id: String,
    /// Stream quality requested at session start.
    pub quality: AvatarQuality,
    /// Voice emotion requested at session start.
    pub emotion: VoiceEmotion,
    /// When true, a knowledge-resolution failure aborts the bootstrap
    /// instead of degrading to a plain conversation.
    pub strict_knowledge: bool,
    /// Bound applied to every remote call.
    pub request_timeout: Duration,
    /// Directory holding the durable knowledge-id cache.
    pub data_dir: PathBuf,
}

impl ClientConfig {
    /// Load configuration from the environment.
    ///
    /// `AVATAR_CLIENT_ID`, `AVATAR_CLIENT_SECRET`, `AVATAR_ID` and
    /// `AVATAR_VOICE_ID` are required; everything else falls back to a
    /// sensible default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_id = require_env("AVATAR_CLIENT_ID", "Set it to your API client id")?;
        let client_secret = require_env("AVATAR_CLIENT_SECRET", "Set it to your API client secret")?;
        let avatar_id = require_env("AVATAR_ID", "Set it to the avatar to present")?;
        let voice_id = require_env("AVATAR_VOICE_ID", "Set it to the voice the avatar speaks with")?;

        let auth_url =
            std::env::var("AVATAR_AUTH_URL").unwrap_or_else(|_| DEFAULT_AUTH_URL.to_string());
        let api_base =
            std::env::var("AVATAR_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let strict_knowledge = std::env::var("AVATAR_STRICT_KB")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let timeout_secs: u64 = std::env::var("AVATAR_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let data_dir = std::env::var("AVATAR_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        Ok(Self {
            client_id,
            client_secret: SecretString::from(client_secret),
            auth_url,
            api_base,
            avatar_id,
            voice_id,
            quality: AvatarQuality::High,
            emotion: VoiceEmotion::Happy,
            strict_knowledge,
            request_timeout: Duration::from_secs(timeout_secs),
            data_dir,
        })
    }

    /// Build the shared HTTP client with the configured request bound.
    pub fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    }
}

fn require_env(key: &str, hint: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingRequired {
            key: key.to_string(),
            hint: hint.to_string(),
        }),
    }
}

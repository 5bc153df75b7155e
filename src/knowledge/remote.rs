//! Knowledge-base creation against the service's REST endpoint.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::auth::AccessToken;
use crate::error::KnowledgeError;

/// Application-level code the service returns on success.
const SUCCESS_CODE: i64 = 1000;

/// A source document attached to a knowledge base. The URL must be publicly
/// fetchable by the service.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeDoc {
    pub name: String,
    pub url: String,
    /// Approximate size in bytes.
    pub size: u64,
}

/// Content template for a knowledge base to create: persona, opening line,
/// and source material. The final `name` is derived fresh per creation
/// attempt because the service rejects duplicate names.
#[derive(Debug, Clone)]
pub struct KnowledgeProfile {
    /// Human-readable prefix for generated knowledge-base names.
    pub name_prefix: String,
    /// Opening line the avatar greets with.
    pub prologue: String,
    /// Persona instruction block.
    pub prompt: String,
    /// Source documents.
    pub docs: Vec<KnowledgeDoc>,
    /// Additional source URLs.
    pub urls: Vec<String>,
}

impl Default for KnowledgeProfile {
    fn default() -> Self {
        Self {
            name_prefix: "avatar-assist-kb".to_string(),
            prologue: "Hello! Ask me anything.".to_string(),
            prompt: "You are a friendly presenter. Answer from the attached documents \
                     when possible, and say so when you cannot."
                .to_string(),
            docs: Vec::new(),
            urls: Vec::new(),
        }
    }
}

/// Seam for the knowledge-creation call so resolution logic can be tested
/// against counting fakes.
#[async_trait]
pub trait KnowledgeCreator: Send + Sync {
    /// Create a knowledge base and return its generated id.
    async fn create(
        &self,
        token: &AccessToken,
        profile: &KnowledgeProfile,
    ) -> Result<String, KnowledgeError>;
}

/// HTTP client for the knowledge-creation endpoint.
pub struct KnowledgeClient {
    http: reqwest::Client,
    endpoint: String,
}

impl KnowledgeClient {
    pub fn new(http: reqwest::Client, api_base: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/knowledge/create", api_base.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl KnowledgeCreator for KnowledgeClient {
    async fn create(
        &self,
        token: &AccessToken,
        profile: &KnowledgeProfile,
    ) -> Result<String, KnowledgeError> {
        let name = fresh_name(&profile.name_prefix);
        let body = serde_json::json!({
            "name": name,
            "prologue": profile.prologue,
            "prompt": profile.prompt,
            "docs": profile.docs,
            "urls": profile.urls,
        });

        tracing::info!(%name, docs = profile.docs.len(), "Creating knowledge base");

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| KnowledgeError::RequestFailed {
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(KnowledgeError::BadStatus { status, body });
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| KnowledgeError::RequestFailed {
                reason: format!("unreadable creation response: {e}"),
            })?;

        let id = parse_create_response(&data)?;
        tracing::info!(knowledge_id = %id, "Knowledge base created");
        Ok(id)
    }
}

/// Generate a knowledge-base name the service has not seen before:
/// prefix, UTC timestamp, and a random tail for same-second collisions.
fn fresh_name(prefix: &str) -> String {
    format!(
        "{}-{}-{:04x}",
        prefix,
        Utc::now().format("%Y%m%d%H%M%S"),
        rand::random::<u16>()
    )
}

/// Extract the generated id from a creation response.
///
/// Success is a `code` equal to the service's success sentinel plus a
/// non-empty `data._id`; anything else is a rejection or a malformed body.
fn parse_create_response(body: &Value) -> Result<String, KnowledgeError> {
    let code = body.get("code").and_then(Value::as_i64).unwrap_or(-1);
    if code != SUCCESS_CODE {
        let message = body
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("no message")
            .to_string();
        return Err(KnowledgeError::Rejected { code, message });
    }

    body.get("data")
        .and_then(|d| d.get("_id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| KnowledgeError::IdMissing {
            body: body.to_string(),
        })
}

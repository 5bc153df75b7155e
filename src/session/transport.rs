//! Transport seam to the remote streaming service.
//!
//! The service itself is an external collaborator; the client only depends
//! on this trait, so tests run against in-memory fakes and the production
//! path runs against [`super::http::HttpTransport`].

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::auth::AccessToken;
use crate::error::SessionError;

/// Stream quality accepted by the session-create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarQuality {
    Low,
    Medium,
    High,
}

impl AvatarQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Voice emotion accepted by the session-create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceEmotion {
    Neutral,
    Happy,
    Serious,
}

impl VoiceEmotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Happy => "happy",
            Self::Serious => "serious",
        }
    }
}

/// Interactive (two-way chat) session mode selector.
const MODE_TYPE_INTERACTIVE: u8 = 2;

/// Parameters for opening a streaming session.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub avatar_id: String,
    pub voice_id: String,
    pub quality: AvatarQuality,
    pub emotion: VoiceEmotion,
    /// Resolved knowledge-base id, if any.
    pub knowledge_id: Option<String>,
}

impl StartRequest {
    /// Wire body for the session-create call.
    ///
    /// The knowledge id rides under both field names the service has
    /// accepted across API revisions, and `chat_mode` is present only when
    /// an id is attached.
    pub fn to_body(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "avatar_id": self.avatar_id,
            "voice_id": self.voice_id,
            "quality": self.quality.as_str(),
            "voice_emotion": self.emotion.as_str(),
            "mode_type": MODE_TYPE_INTERACTIVE,
        });
        if let Some(kb) = &self.knowledge_id {
            body["knowledge_id"] = serde_json::Value::String(kb.clone());
            body["knowledge_base_id"] = serde_json::Value::String(kb.clone());
            body["chat_mode"] = serde_json::Value::String("knowledge_base".to_string());
        }
        body
    }
}

/// Asynchronous notifications from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The media stream is up; carries the playback URL.
    StreamReady { url: String },
    /// The remote side dropped the session.
    Disconnected,
    /// A transport-level error. The service may keep recovering internally,
    /// so this does not necessarily end the session.
    Error { message: String },
}

/// Stream of transport events for one session.
pub type EventStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

/// One streaming session's transport.
#[async_trait]
pub trait AvatarTransport: Send + Sync {
    /// Open the session. Events for its whole lifetime arrive on the
    /// returned stream.
    async fn open(&self, req: &StartRequest) -> Result<EventStream, SessionError>;

    /// Request graceful shutdown.
    async fn stop(&self) -> Result<(), SessionError>;

    /// Forward a user chat line to the avatar.
    async fn send_message(&self, text: &str) -> Result<(), SessionError>;
}

/// Builds a transport bound to the bearer token of one bootstrap attempt.
pub trait TransportFactory: Send + Sync {
    fn for_token(&self, token: AccessToken) -> Arc<dyn AvatarTransport>;
}

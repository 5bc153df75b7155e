//! Chat messages exchanged during a streaming session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of the session chat. Append-only; the log is owned by the
/// session and cleared when it ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub text: String,
    /// True for user-typed lines, false for avatar replies.
    pub from_user: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            from_user: true,
            timestamp: Utc::now(),
        }
    }

    pub fn avatar(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            from_user: false,
            timestamp: Utc::now(),
        }
    }
}

//! ChatGPT web backend request/response types.
//!
//! These are the wire structures of `chat.openai.com`'s private API, not the
//! public OpenAI API. Only the fields tgbridge reads are modelled; unknown
//! fields are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response of `GET /api/auth/session`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
    pub expires: Option<DateTime<Utc>>,
}

/// Body of `POST /backend-api/conversation`.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationRequest {
    pub action: String,
    pub messages: Vec<RequestMessage>,
    pub model: String,
    pub parent_message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestMessage {
    pub id: String,
    pub role: String,
    pub content: RequestContent,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestContent {
    pub content_type: String,
    pub parts: Vec<String>,
}

/// One `data:` payload of the answer event stream.
///
/// Every payload carries the full answer text so far, not an increment.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationEvent {
    pub message: Option<EventMessage>,
    pub conversation_id: Option<String>,
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub content: EventContent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventContent {
    #[serde(default)]
    pub parts: Vec<String>,
}

impl ConversationEvent {
    /// Full text of the answer so far.
    pub fn text(&self) -> Option<String> {
        self.message.as_ref().map(|m| m.content.parts.concat())
    }
}

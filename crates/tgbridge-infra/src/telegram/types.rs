//! Telegram Bot API wire types.
//!
//! Only the subset tgbridge uses. Every response arrives wrapped in an
//! [`ApiEnvelope`]; failures carry `error_code`, `description` and
//! optionally `parameters.retry_after`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tgbridge_types::chat::{
    ChatId, ChatKind, CommandInvocation, InboundUpdate, MessageId, UserId,
};
use tgbridge_types::error::PlatformError;

/// Standard response wrapper of every Bot API method.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<u16>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseParameters {
    pub retry_after: Option<u64>,
}

impl<T> ApiEnvelope<T> {
    /// Classify a failed envelope.
    pub fn into_error(self, http_status: u16) -> PlatformError {
        let code = self.error_code.unwrap_or(http_status);
        let description = self.description.unwrap_or_else(|| format!("HTTP {http_status}"));
        classify_error(code, description, self.parameters.and_then(|p| p.retry_after))
    }
}

/// Map an API failure to a [`PlatformError`].
pub fn classify_error(code: u16, description: String, retry_after: Option<u64>) -> PlatformError {
    if code == 429 {
        return PlatformError::RateLimited {
            retry_after: retry_after.map(Duration::from_secs),
        };
    }
    if description.contains("message is not modified") {
        return PlatformError::NotModified;
    }
    if code >= 500 {
        return PlatformError::Server(format!("{code}: {description}"));
    }
    PlatformError::Api { code, description }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

impl Message {
    /// Whether the text starts with a `bot_command` entity.
    pub fn is_command(&self) -> bool {
        self.entities
            .iter()
            .any(|e| e.kind == "bot_command" && e.offset == 0)
    }

    /// Normalize into an [`InboundUpdate`]. Returns `None` for messages
    /// without text or sender, and for chat types the bot does not know.
    pub fn into_inbound(self) -> Option<InboundUpdate> {
        let command = if self.is_command() {
            self.text.as_deref().and_then(CommandInvocation::parse)
        } else {
            None
        };
        let from = self.from?;
        let text = self.text?;
        let chat_kind: ChatKind = match self.chat.kind.parse() {
            Ok(kind) => kind,
            Err(error) => {
                tracing::debug!(chat_id = self.chat.id, error = %error, "dropping message");
                return None;
            }
        };

        Some(InboundUpdate {
            chat_id: ChatId(self.chat.id),
            message_id: MessageId(self.message_id),
            user_id: UserId(from.id),
            text,
            command,
            chat_kind,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
    pub allow_sending_without_reply: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditMessageTextRequest<'a> {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteMessageRequest {
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendChatActionRequest {
    pub chat_id: i64,
    pub action: &'static str,
}

/// The subset of a sent `Message` we read back.
#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

//! TelegramClient -- [`ChatPlatform`] over the Telegram Bot API.
//!
//! The bot token is part of every request URL. It is wrapped in
//! [`SecretString`] and transport errors are stripped of their URL before
//! they are logged or returned.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;

use tgbridge_core::platform::ChatPlatform;
use tgbridge_types::chat::{ChatId, MessageId};
use tgbridge_types::config::TELEGRAM_MAX_MESSAGE_LEN;
use tgbridge_types::error::PlatformError;

use super::types::{
    ApiEnvelope, DeleteMessageRequest, EditMessageTextRequest, GetUpdatesRequest,
    SendChatActionRequest, SendMessageRequest, SentMessage, Update, User,
};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Per-request timeout for everything except long polling.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time granted to a long poll on top of its server-side timeout.
const POLL_SLACK: Duration = Duration::from_secs(10);

/// Telegram Bot API client.
pub struct TelegramClient {
    client: reqwest::Client,
    token: SecretString,
    api_url: String,
}

// No Debug derive: keeps the bot token out of debug output.

impl TelegramClient {
    pub fn new(token: SecretString) -> Result<Self, PlatformError> {
        Self::with_api_url(token, DEFAULT_API_URL)
    }

    pub fn with_api_url(token: SecretString, api_url: &str) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PlatformError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token.expose_secret(), method)
    }

    /// Call a Bot API method and unwrap its envelope.
    async fn call<Req, Res>(
        &self,
        method: &'static str,
        body: &Req,
        timeout: Duration,
    ) -> Result<Res, PlatformError>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("{method}: {}", e.without_url())))?;

        let status = response.status();
        let envelope: ApiEnvelope<Res> = match response.json().await {
            Ok(envelope) => envelope,
            Err(_) if status.is_server_error() => {
                return Err(PlatformError::Server(format!("{method}: HTTP {status}")));
            }
            Err(e) if status.is_success() => {
                return Err(PlatformError::Network(format!("{method}: {}", e.without_url())));
            }
            Err(_) => {
                return Err(PlatformError::Api {
                    code: status.as_u16(),
                    description: format!("{method}: unreadable error response"),
                });
            }
        };

        if !envelope.ok {
            let error = envelope.into_error(status.as_u16());
            tracing::debug!(method, error = %error, "bot API call failed");
            return Err(error);
        }
        envelope.result.ok_or_else(|| PlatformError::Api {
            code: status.as_u16(),
            description: format!("{method}: response without result"),
        })
    }

    /// Identity of the bot (startup check and username for mentions).
    pub async fn get_me(&self) -> Result<User, PlatformError> {
        self.call("getMe", &serde_json::json!({}), REQUEST_TIMEOUT).await
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, PlatformError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: vec!["message".to_string()],
        };
        self.call("getUpdates", &request, timeout + POLL_SLACK).await
    }
}

impl ChatPlatform for TelegramClient {
    fn max_message_len(&self) -> usize {
        TELEGRAM_MAX_MESSAGE_LEN
    }

    async fn send_message(
        &self,
        chat_id: ChatId,
        reply_to: Option<MessageId>,
        text: &str,
    ) -> Result<MessageId, PlatformError> {
        let request = SendMessageRequest {
            chat_id: chat_id.0,
            text,
            reply_to_message_id: reply_to.map(|id| id.0),
            allow_sending_without_reply: true,
        };
        let sent: SentMessage = self.call("sendMessage", &request, REQUEST_TIMEOUT).await?;
        Ok(MessageId(sent.message_id))
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), PlatformError> {
        let request = EditMessageTextRequest {
            chat_id: chat_id.0,
            message_id: message_id.0,
            text,
        };
        // The result is the edited Message (or `true` for inline messages).
        let _: serde_json::Value = self
            .call("editMessageText", &request, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), PlatformError> {
        let request = DeleteMessageRequest {
            chat_id: chat_id.0,
            message_id: message_id.0,
        };
        let _: bool = self.call("deleteMessage", &request, REQUEST_TIMEOUT).await?;
        Ok(())
    }

    async fn send_typing(&self, chat_id: ChatId) -> Result<(), PlatformError> {
        let request = SendChatActionRequest {
            chat_id: chat_id.0,
            action: "typing",
        };
        let _: bool = self.call("sendChatAction", &request, REQUEST_TIMEOUT).await?;
        Ok(())
    }
}

//! ChatGptBackend -- [`ConversationBackend`] over the ChatGPT web backend.
//!
//! Each exchange first resolves an access token from the session token
//! (cached between exchanges), then posts the user's turn and decodes the
//! streamed answer. Nothing is retried: a resent turn would appear twice in
//! the conversation.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use uuid::Uuid;

use tgbridge_core::backend::{ConversationBackend, ExchangeRequest, FragmentStream};
use tgbridge_types::chat::Continuation;
use tgbridge_types::stream::BackendError;

use super::auth::AccessTokenCache;
use super::streaming::create_conversation_stream;
use super::types::{ConversationRequest, RequestContent, RequestMessage};

pub const DEFAULT_BASE_URL: &str = "https://chat.openai.com";
pub const DEFAULT_MODEL: &str = "text-davinci-002-render";

const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 ",
    "(KHTML, like Gecko) Chrome/120.0 Safari/537.36"
);

/// Streaming client for the ChatGPT web backend.
///
/// Credentials are never stored here; each request carries its own session
/// token and only the derived access token is cached.
pub struct ChatGptBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    auth: Arc<AccessTokenCache>,
}

impl ChatGptBackend {
    pub fn new(base_url: &str, model: &str) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BackendError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            auth: Arc::new(AccessTokenCache::new()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn conversation_url(&self) -> String {
        format!("{}/backend-api/conversation", self.base_url)
    }
}

/// Build the request body for one user turn.
///
/// A fresh conversation gets a random parent id; otherwise the previous
/// answer's id links the turn into the existing thread.
pub fn build_request(
    model: &str,
    prompt: &str,
    continuation: &Continuation,
) -> ConversationRequest {
    let parent_message_id = continuation
        .last_message_id
        .clone()
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    ConversationRequest {
        action: "next".to_string(),
        messages: vec![RequestMessage {
            id: Uuid::now_v7().to_string(),
            role: "user".to_string(),
            content: RequestContent {
                content_type: "text".to_string(),
                parts: vec![prompt.to_string()],
            },
        }],
        model: model.to_string(),
        parent_message_id,
        conversation_id: continuation.conversation_id.clone(),
    }
}

impl ConversationBackend for ChatGptBackend {
    fn name(&self) -> &str {
        "chatgpt"
    }

    fn send(&self, request: ExchangeRequest) -> FragmentStream {
        let body = build_request(&self.model, &request.prompt, &request.continuation);
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let url = self.conversation_url();
        let auth = Arc::clone(&self.auth);

        tracing::debug!(
            chat_id = %request.chat_id,
            url = %url,
            model = %self.model,
            fresh = request.continuation.is_fresh(),
            "opening conversation stream"
        );

        Box::pin(async_stream::try_stream! {
            let access_token = match auth
                .access_token(&client, &base_url, &request.credential)
                .await
            {
                Ok(token) => token,
                Err(err) => {
                    auth.invalidate();
                    Err(err)?;
                    unreachable!()
                }
            };

            let on_rejected = {
                let auth = Arc::clone(&auth);
                move || auth.invalidate()
            };
            let mut fragments =
                create_conversation_stream(&client, &url, body, access_token, on_rejected);
            while let Some(fragment) = fragments.next().await {
                yield fragment?;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_request_gets_random_parent_and_no_conversation() {
        let req = build_request(DEFAULT_MODEL, "Hello", &Continuation::default());
        assert!(req.conversation_id.is_none());
        assert!(Uuid::parse_str(&req.parent_message_id).is_ok());
        assert_eq!(req.messages[0].content.parts, vec!["Hello".to_string()]);
        assert_eq!(req.messages[0].role, "user");
        assert_ne!(req.messages[0].id, req.parent_message_id);
    }

    #[test]
    fn continued_request_links_previous_answer() {
        let continuation = Continuation {
            conversation_id: Some("conv-1".to_string()),
            last_message_id: Some("msg-7".to_string()),
        };
        let req = build_request("gpt-4", "and then?", &continuation);
        assert_eq!(req.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(req.parent_message_id, "msg-7");
        assert_eq!(req.model, "gpt-4");
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let backend = ChatGptBackend::new("https://chat.example.com/", DEFAULT_MODEL).unwrap();
        assert_eq!(backend.base_url(), "https://chat.example.com");
        assert_eq!(
            backend.conversation_url(),
            "https://chat.example.com/backend-api/conversation"
        );
    }
}

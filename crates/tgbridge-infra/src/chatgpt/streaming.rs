//! Answer event stream of the ChatGPT web backend.
//!
//! The backend answers `POST /backend-api/conversation` with a server-sent
//! event stream. Each `data:` line holds a JSON payload with the *full*
//! answer text so far, and the stream ends with `data: [DONE]`:
//!
//! ```text
//! data: {"message":{"id":"m1","content":{"parts":["Hel"]}},"conversation_id":"c1"}
//! data: {"message":{"id":"m1","content":{"parts":["Hello"]}},"conversation_id":"c1"}
//! data: [DONE]
//! ```
//!
//! Snapshots are turned into [`StreamFragment::Delta`]s by prefix
//! difference. A snapshot that does not extend the previous one becomes a
//! [`StreamFragment::Rewrite`]. Exactly one [`StreamFragment::Complete`]
//! follows the last snapshot.

use std::fmt::Display;

use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};

use tgbridge_core::backend::FragmentStream;
use tgbridge_types::stream::{BackendError, CompletedAnswer, StreamFragment};

use super::status::status_error;
use super::types::{ConversationEvent, ConversationRequest};

/// Terminal payload of the event stream.
const DONE_MARKER: &str = "[DONE]";

/// Decode an SSE body into answer fragments.
///
/// Generic over the byte stream so it can be driven by a `reqwest` body or
/// an in-memory stream in tests.
pub fn decode_answer_stream<S, B, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::try_stream! {
        let mut events = Box::pin(body.eventsource());
        let mut previous = String::new();
        let mut conversation_id: Option<String> = None;
        let mut message_id: Option<String> = None;
        let mut snapshots = 0usize;

        while let Some(event) = events.next().await {
            let event = event.map_err(map_event_error)?;
            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == DONE_MARKER {
                break;
            }

            let payload: ConversationEvent = serde_json::from_str(data)
                .map_err(|e| BackendError::Backend(format!("malformed answer payload: {e}")))?;

            if let Some(error) = payload.error.as_ref() {
                Err(BackendError::Backend(format!("backend reported an error: {error}")))?;
            }
            if let Some(id) = payload.conversation_id.as_ref() {
                conversation_id = Some(id.clone());
            }
            let Some(text) = payload.text() else {
                continue;
            };
            if let Some(message) = payload.message.as_ref() {
                message_id = Some(message.id.clone());
            }
            snapshots += 1;

            match text.strip_prefix(previous.as_str()) {
                Some("") => {}
                Some(suffix) => yield StreamFragment::delta(suffix),
                None => yield StreamFragment::Rewrite { text: text.clone() },
            }
            previous = text;
        }

        if snapshots == 0 {
            Err(BackendError::Backend("answer stream carried no message".to_string()))?;
        }

        match (conversation_id, message_id) {
            (Some(conversation_id), Some(message_id)) => {
                tracing::debug!(
                    snapshots,
                    chars = previous.chars().count(),
                    "answer stream complete"
                );
                yield StreamFragment::Complete(CompletedAnswer {
                    text: previous,
                    conversation_id,
                    message_id,
                });
            }
            _ => {
                Err(BackendError::Backend(
                    "answer stream ended without conversation identifiers".to_string(),
                ))?;
            }
        }
    })
}

fn map_event_error<E: Display>(error: EventStreamError<E>) -> BackendError {
    match error {
        EventStreamError::Transport(e) => BackendError::Network(format!("response body read: {e}")),
        other => BackendError::Backend(format!("invalid event stream: {other}")),
    }
}

/// Open the conversation request and decode its answer stream.
///
/// A rejected access token is reported as [`BackendError::AuthExpired`];
/// `on_auth_rejected` runs first so the caller can drop cached credentials.
pub fn create_conversation_stream<F>(
    client: &reqwest::Client,
    url: &str,
    body: ConversationRequest,
    access_token: SecretString,
    on_auth_rejected: F,
) -> FragmentStream
where
    F: FnOnce() + Send + 'static,
{
    let client = client.clone();
    let url = url.to_string();

    Box::pin(async_stream::try_stream! {
        let response = client
            .post(&url)
            .bearer_auth(access_token.expose_secret())
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Network(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let response = if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %error_body, "conversation request rejected");
            let err = status_error(status, &error_body);
            if err.is_auth_expired() {
                on_auth_rejected();
            }
            Err(err)?;
            unreachable!()
        } else {
            response
        };

        let mut fragments = decode_answer_stream(response.bytes_stream());
        while let Some(fragment) = fragments.next().await {
            yield fragment?;
        }
    })
}

//! ChatPlatform trait definition.
//!
//! The platform has no native partial-message streaming, so live output is
//! built from one send followed by edits. Pages that a shorter rewrite no
//! longer needs are deleted.

use std::future::Future;

use tgbridge_types::chat::{ChatId, MessageId};
use tgbridge_types::error::PlatformError;

/// Outbound side of a messaging platform.
pub trait ChatPlatform: Send + Sync {
    /// Maximum characters accepted in one text message.
    fn max_message_len(&self) -> usize;

    /// Send a text message, optionally as a reply. Returns the new message id.
    fn send_message(
        &self,
        chat_id: ChatId,
        reply_to: Option<MessageId>,
        text: &str,
    ) -> impl Future<Output = Result<MessageId, PlatformError>> + Send;

    /// Replace the text of a previously sent message.
    fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Remove a previously sent message.
    fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Show a "typing" indicator in the chat.
    fn send_typing(
        &self,
        chat_id: ChatId,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;
}

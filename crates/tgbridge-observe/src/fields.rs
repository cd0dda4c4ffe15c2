//! Span names and field keys shared across tgbridge.
//!
//! Field keys can be passed to `Span::record` for fields declared as
//! `tracing::field::Empty` when the span was created.

/// Span wrapping the handling of one inbound update.
pub const UPDATE_SPAN: &str = "tgbridge.update";

/// Platform chat id.
pub const CHAT_ID: &str = "chat_id";

/// Platform user id of the sender.
pub const USER_ID: &str = "user_id";

/// Platform message id of the inbound message.
pub const MESSAGE_ID: &str = "message_id";

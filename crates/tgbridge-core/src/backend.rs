//! ConversationBackend trait definition.
//!
//! The AI backend is consumed as a finite, single-use stream of
//! [`StreamFragment`]s. The stream is boxed so that the trait stays
//! object-safe and the stream can be moved into whichever task drains it.

use std::pin::Pin;

use futures_util::Stream;
use secrecy::SecretString;

use tgbridge_types::chat::{ChatId, Continuation};
use tgbridge_types::stream::{BackendError, StreamFragment};

/// A lazily produced answer. Owned by exactly one consumer.
pub type FragmentStream =
    Pin<Box<dyn Stream<Item = Result<StreamFragment, BackendError>> + Send + 'static>>;

/// One outbound turn of a conversation.
#[derive(Debug)]
pub struct ExchangeRequest {
    pub chat_id: ChatId,
    pub prompt: String,
    /// Opaque session credential for the backend.
    pub credential: SecretString,
    /// Identifiers of the previous turn; fresh for a new conversation.
    pub continuation: Continuation,
}

/// Trait for the streaming AI backend.
///
/// Implementations must emit fragments in the order the backend produced
/// them and end a successful stream with exactly one
/// [`StreamFragment::Complete`]. Failures are yielded as the last item;
/// fragments already yielded are never retracted. No retries happen here:
/// resending could duplicate the user's turn.
pub trait ConversationBackend: Send + Sync {
    /// Human-readable backend name (for logs).
    fn name(&self) -> &str;

    /// Open a request and return the stream of answer fragments.
    fn send(&self, request: ExchangeRequest) -> FragmentStream;
}

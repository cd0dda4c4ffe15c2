//! Streamed answer types for tgbridge.
//!
//! The AI backend produces its answer incrementally. These types model the
//! ordered fragments of that answer and the errors a stream can end with.

use serde::{Deserialize, Serialize};

/// The final state of an answer once the backend has finished generating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedAnswer {
    /// Complete answer text.
    pub text: String,
    /// Backend conversation handle to continue this thread.
    pub conversation_id: String,
    /// Identifier of the answer turn, used as the parent of the next turn.
    pub message_id: String,
}

/// An incremental unit of a streamed answer.
///
/// Fragments must be applied in emission order. A well-formed stream ends
/// with exactly one [`StreamFragment::Complete`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFragment {
    /// Text appended to the answer so far.
    Delta { text: String },

    /// The backend revised earlier output; replaces the answer so far.
    Rewrite { text: String },

    /// Terminal marker with the complete answer and new continuation ids.
    Complete(CompletedAnswer),
}

impl StreamFragment {
    pub fn delta(text: impl Into<String>) -> Self {
        StreamFragment::Delta { text: text.into() }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, StreamFragment::Complete(_))
    }

    /// Apply this fragment to an accumulated answer buffer.
    pub fn apply_to(&self, accumulated: &mut String) {
        match self {
            StreamFragment::Delta { text } => accumulated.push_str(text),
            StreamFragment::Rewrite { text } => {
                accumulated.clear();
                accumulated.push_str(text);
            }
            StreamFragment::Complete(answer) => {
                accumulated.clear();
                accumulated.push_str(&answer.text);
            }
        }
    }
}

/// Errors from the AI backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend rejected the credential. A new session token is needed.
    #[error("session expired or invalid: {0}")]
    AuthExpired(String),

    /// The connection failed or was reset.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with an error or an unreadable stream.
    #[error("backend error: {0}")]
    Backend(String),
}

impl BackendError {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, BackendError::AuthExpired(_))
    }
}

//! In-memory conversation store keyed by chat.
//!
//! Each chat owns one `ChatSession` behind its own async mutex. Holding a
//! chat's [`ChatGuard`] for the duration of an exchange serializes requests
//! from the same chat, while different chats never contend with each other.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use tgbridge_types::chat::{ChatId, ChatSession, Continuation};
use tgbridge_types::stream::CompletedAnswer;

/// Process-scoped store of per-chat conversation state.
#[derive(Debug, Default)]
pub struct ConversationStore {
    sessions: DashMap<ChatId, Arc<Mutex<ChatSession>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Fetch (or lazily create) the shared slot for a chat.
    ///
    /// The DashMap shard lock is released before this returns, so callers
    /// may await the inner mutex without blocking other chats.
    fn slot(&self, chat_id: ChatId) -> Arc<Mutex<ChatSession>> {
        self.sessions
            .entry(chat_id)
            .or_insert_with(|| {
                debug!(%chat_id, "creating conversation session");
                Arc::new(Mutex::new(ChatSession::new(chat_id)))
            })
            .clone()
    }

    /// Return a snapshot of the chat's session, creating an empty one if needed.
    pub async fn get_or_create(&self, chat_id: ChatId) -> ChatSession {
        self.slot(chat_id).lock().await.clone()
    }

    /// Clear the chat's continuation identifiers. Idempotent.
    ///
    /// Waits for an in-flight exchange of the same chat to finish first.
    pub async fn reset(&self, chat_id: ChatId) {
        self.slot(chat_id).lock().await.clear();
        debug!(%chat_id, "conversation reset");
    }

    /// Acquire exclusive access to a chat's session for one exchange.
    pub async fn lock(&self, chat_id: ChatId) -> ChatGuard {
        ChatGuard {
            session: self.slot(chat_id).lock_owned().await,
        }
    }

    /// Number of chats seen so far.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Exclusive handle on one chat's session.
///
/// Dropping the guard without calling [`ChatGuard::commit`] leaves the
/// session exactly as it was.
pub struct ChatGuard {
    session: OwnedMutexGuard<ChatSession>,
}

impl ChatGuard {
    pub fn chat_id(&self) -> ChatId {
        self.session.chat_id()
    }

    /// Continuation snapshot to send with the next request.
    pub fn continuation(&self) -> Continuation {
        self.session.continuation()
    }

    /// Write back the identifiers of a successfully completed exchange.
    pub fn commit(&mut self, answer: &CompletedAnswer) {
        self.session.apply(answer);
    }
}

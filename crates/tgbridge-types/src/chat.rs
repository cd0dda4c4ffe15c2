//! Chat-side domain types for tgbridge.
//!
//! These types model the messaging platform side of the bridge: chat and
//! message identifiers, the per-chat conversation continuation state, the
//! live message being edited, and normalized inbound updates.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::stream::CompletedAnswer;

/// Platform chat identifier (stable per private chat or group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform message identifier, unique within a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of chat an update arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    /// Whether this is a multi-user group chat.
    pub fn is_group(&self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

impl fmt::Display for ChatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatKind::Private => write!(f, "private"),
            ChatKind::Group => write!(f, "group"),
            ChatKind::Supergroup => write!(f, "supergroup"),
            ChatKind::Channel => write!(f, "channel"),
        }
    }
}

impl FromStr for ChatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(ChatKind::Private),
            "group" => Ok(ChatKind::Group),
            "supergroup" => Ok(ChatKind::Supergroup),
            "channel" => Ok(ChatKind::Channel),
            other => Err(format!("invalid chat kind: '{other}'")),
        }
    }
}

/// Backend continuation identifiers for a multi-turn conversation.
///
/// Both fields are absent for a fresh conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continuation {
    /// Opaque handle of the backend conversation thread.
    pub conversation_id: Option<String>,
    /// Opaque pointer to the prior turn.
    pub last_message_id: Option<String>,
}

impl Continuation {
    /// Whether this continuation starts a brand-new conversation.
    pub fn is_fresh(&self) -> bool {
        self.conversation_id.is_none() && self.last_message_id.is_none()
    }
}

/// Conversation state for a single chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    chat_id: ChatId,
    pub conversation_id: Option<String>,
    pub last_message_id: Option<String>,
}

impl ChatSession {
    /// Create an empty session for a chat.
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            conversation_id: None,
            last_message_id: None,
        }
    }

    /// The chat this session belongs to. Immutable once created.
    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// Snapshot of the continuation identifiers for the next exchange.
    pub fn continuation(&self) -> Continuation {
        Continuation {
            conversation_id: self.conversation_id.clone(),
            last_message_id: self.last_message_id.clone(),
        }
    }

    /// Record the identifiers returned by a completed exchange.
    pub fn apply(&mut self, answer: &CompletedAnswer) {
        self.conversation_id = Some(answer.conversation_id.clone());
        self.last_message_id = Some(answer.message_id.clone());
    }

    /// Clear both continuation identifiers.
    pub fn clear(&mut self) {
        self.conversation_id = None;
        self.last_message_id = None;
    }
}

/// A platform message that is progressively edited to show streamed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    /// The last text actually delivered to the platform for this message.
    pub last_sent: String,
}

/// A bot command found at the start of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Command name without the leading slash (e.g. "setToken").
    pub name: String,
    /// Everything after the command, trimmed.
    pub args: String,
    /// Bot username from a `/cmd@username` form, if present.
    pub addressee: Option<String>,
}

impl CommandInvocation {
    /// Parse a `/command[@bot] args` string. Returns `None` for non-commands.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim_start();
        let rest = trimmed.strip_prefix('/')?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        if head.is_empty() {
            return None;
        }
        let (name, addressee) = match head.split_once('@') {
            Some((name, bot)) => (name, Some(bot.to_string())),
            None => (head, None),
        };
        Some(Self {
            name: name.to_string(),
            args: args.to_string(),
            addressee,
        })
    }
}

/// A normalized inbound text message from the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub user_id: UserId,
    pub text: String,
    pub command: Option<CommandInvocation>,
    pub chat_kind: ChatKind,
}

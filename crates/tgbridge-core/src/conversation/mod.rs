//! Per-chat conversation continuation state.

pub mod store;

pub use store::{ChatGuard, ConversationStore};

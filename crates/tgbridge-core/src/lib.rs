//! Conversation state, live output and dispatch logic for tgbridge.
//!
//! This crate defines the ports (`ChatPlatform`, `ConversationBackend`,
//! `SessionProvider`) that the infrastructure layer implements. It depends
//! only on `tgbridge-types`, never on `tgbridge-infra` or any network crate.

pub mod backend;
pub mod conversation;
pub mod dispatch;
pub mod platform;
pub mod projector;
pub mod retry;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

//! Shared domain types for tgbridge.
//!
//! This crate contains the types used across the bridge: chat and message
//! identifiers, per-chat conversation state, streamed answer fragments,
//! configuration records, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde and thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod stream;

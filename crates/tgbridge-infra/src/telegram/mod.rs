//! Telegram Bot API adapter.

pub mod client;
pub mod polling;
pub mod types;

pub use client::TelegramClient;
pub use polling::{UpdateSource, poll_updates};

//! Infrastructure layer for tgbridge.
//!
//! Contains implementations of the ports defined in `tgbridge-core`: the
//! ChatGPT web backend client, the Telegram Bot API adapter and the
//! file-backed session store.

pub mod chatgpt;
pub mod config;
pub mod session;
pub mod telegram;

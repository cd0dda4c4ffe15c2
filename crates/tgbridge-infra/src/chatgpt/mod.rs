//! ChatGPT web backend adapter.

pub mod auth;
pub mod client;
pub mod status;
pub mod streaming;
pub mod types;

pub use client::{ChatGptBackend, DEFAULT_BASE_URL, DEFAULT_MODEL};

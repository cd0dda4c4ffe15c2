//! Session token providers.

pub mod file;

pub use file::{FileSessionProvider, SESSION_TOKEN_ENV};

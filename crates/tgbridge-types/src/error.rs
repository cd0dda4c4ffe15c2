use std::time::Duration;

use thiserror::Error;

/// Errors from messaging platform calls (send, edit, typing).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// The platform asked us to slow down.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// The request never reached the platform or the connection dropped.
    #[error("network error: {0}")]
    Network(String),

    /// The platform failed on its side (5xx).
    #[error("platform server error: {0}")]
    Server(String),

    /// An edit carried the same text the message already has.
    #[error("message is not modified")]
    NotModified,

    /// The platform rejected the request.
    #[error("platform API error {code}: {description}")]
    Api { code: u16, description: String },
}

impl PlatformError {
    /// Whether repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlatformError::RateLimited { .. } | PlatformError::Network(_) | PlatformError::Server(_)
        )
    }
}

/// Errors related to the backend session credential.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session token available: {0}")]
    Unavailable(String),

    #[error("session token must not be empty")]
    EmptyToken,

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Errors from validating startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

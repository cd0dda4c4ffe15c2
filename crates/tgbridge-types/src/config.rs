//! Configuration types for tgbridge.
//!
//! `BridgeConfig` is the read-only record the dispatcher and projector are
//! built from. `PersistentConfig` is the small on-disk file that keeps the
//! backend session token across restarts.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chat::UserId;
use crate::error::ConfigError;

/// Maximum length of a single Telegram text message, in characters.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// Runtime configuration for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Users allowed to talk to the bot. Empty allows everyone.
    pub allowed_user_ids: HashSet<UserId>,
    /// Minimum spacing between two edits of the same live message.
    pub edit_rate_limit: Duration,
    /// When true the session token is only ever set through `/setToken`.
    pub manual_auth: bool,
    /// Bounded retry for platform send/edit calls.
    pub retry: RetryConfig,
    /// How long shutdown waits for in-flight exchanges.
    pub shutdown_grace: Duration,
}

impl BridgeConfig {
    /// Whether `user` passes the allow-list.
    pub fn is_allowed(&self, user: UserId) -> bool {
        self.allowed_user_ids.is_empty() || self.allowed_user_ids.contains(&user)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            allowed_user_ids: HashSet::new(),
            edit_rate_limit: Duration::from_secs(1),
            manual_auth: false,
            retry: RetryConfig::default(),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

/// Retry settings for a single platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each further attempt.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay, including platform `retry_after`.
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// Reject settings that would never attempt a call or never wait.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "RETRY_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigError::Invalid {
                field: "RETRY_MAX_DELAY_MS",
                reason: format!("must not be below the base delay ({} ms)", self.base_delay_ms),
            });
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

/// Convert an edit interval given in (possibly fractional) seconds.
pub fn edit_interval_from_secs(secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() {
        return Err(ConfigError::Invalid {
            field: "EDIT_WAIT_SECONDS",
            reason: "must be a finite number".to_string(),
        });
    }
    if secs < 0.0 {
        return Err(ConfigError::Invalid {
            field: "EDIT_WAIT_SECONDS",
            reason: "must not be negative".to_string(),
        });
    }
    Ok(Duration::from_secs_f64(secs))
}

/// On-disk state kept between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentConfig {
    /// Backend session token, set by acquisition or `/setToken`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

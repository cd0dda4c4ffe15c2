//! Command-line and environment configuration for the `tgbridge` binary.
//!
//! Every option can also be given through the environment (a `.env` file in
//! the working directory is loaded first), matching the variable names the
//! bridge has always used: `TELEGRAM_TOKEN`, `TELEGRAM_ID`,
//! `EDIT_WAIT_SECONDS`, `MANUAL_AUTH`.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use tgbridge_infra::chatgpt::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use tgbridge_types::chat::UserId;
use tgbridge_types::config::{BridgeConfig, RetryConfig, edit_interval_from_secs};
use tgbridge_types::error::ConfigError;

/// Bridge ChatGPT conversations into Telegram chats.
#[derive(Parser)]
#[command(name = "tgbridge", version, about, long_about = None)]
pub struct Cli {
    /// Telegram bot token from @BotFather.
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: String,

    /// Comma-separated Telegram user ids allowed to use the bot (empty allows everyone).
    #[arg(long, env = "TELEGRAM_ID", default_value = "")]
    pub telegram_id: String,

    /// Minimum seconds between two edits of a live message.
    #[arg(long, env = "EDIT_WAIT_SECONDS", default_value_t = 1.0)]
    pub edit_wait_seconds: f64,

    /// Only accept session tokens through /setToken; never acquire one automatically.
    #[arg(long, env = "MANUAL_AUTH")]
    pub manual_auth: bool,

    /// Base URL of the ChatGPT web backend.
    #[arg(long, env = "CHATGPT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub chatgpt_base_url: String,

    /// Model requested from the backend.
    #[arg(long, env = "CHATGPT_MODEL", default_value = DEFAULT_MODEL)]
    pub chatgpt_model: String,

    /// Directory holding session.toml (defaults to the platform config dir).
    #[arg(long, env = "TGBRIDGE_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Attempts per Telegram send/edit call, including the first one.
    #[arg(long, env = "RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// Delay before the first retry, doubled for each further one.
    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value_t = 500)]
    pub retry_base_delay_ms: u64,

    /// Upper bound for any retry delay, including Telegram's retry_after.
    #[arg(long, env = "RETRY_MAX_DELAY_MS", default_value_t = 10_000)]
    pub retry_max_delay_ms: u64,

    /// Seconds to wait for in-flight answers on shutdown.
    #[arg(long, env = "SHUTDOWN_GRACE_SECONDS", default_value_t = 30)]
    pub shutdown_grace_seconds: u64,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long)]
    pub otel: bool,

    /// Log one JSON object per line.
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Validate the options into the runtime configuration.
    pub fn bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
        if self.telegram_token.trim().is_empty() {
            return Err(ConfigError::Missing("TELEGRAM_TOKEN"));
        }
        let retry = RetryConfig {
            max_attempts: self.retry_attempts,
            base_delay_ms: self.retry_base_delay_ms,
            max_delay_ms: self.retry_max_delay_ms,
        };
        retry.validate()?;

        Ok(BridgeConfig {
            allowed_user_ids: parse_allowed_users(&self.telegram_id)?,
            edit_rate_limit: edit_interval_from_secs(self.edit_wait_seconds)?,
            manual_auth: self.manual_auth,
            retry,
            shutdown_grace: Duration::from_secs(self.shutdown_grace_seconds),
        })
    }
}

/// Parse a comma-separated list of user ids. Blank entries are skipped.
pub fn parse_allowed_users(raw: &str) -> Result<HashSet<UserId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse::<i64>().map(UserId).map_err(|e| ConfigError::Invalid {
                field: "TELEGRAM_ID",
                reason: format!("'{entry}' is not a user id: {e}"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["tgbridge", "--telegram-token", "123:abc"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn allowed_users_list() {
        let users = parse_allowed_users(" 1, 22 ,,333").unwrap();
        assert_eq!(users, HashSet::from([UserId(1), UserId(22), UserId(333)]));
        assert!(parse_allowed_users("").unwrap().is_empty());
    }

    #[test]
    fn allowed_users_rejects_garbage() {
        let err = parse_allowed_users("1,abc").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "TELEGRAM_ID", .. }));
    }

    #[test]
    fn defaults_build_config() {
        let cli = parse(&[]);
        assert_eq!(cli.chatgpt_base_url, DEFAULT_BASE_URL);
        assert_eq!(cli.chatgpt_model, DEFAULT_MODEL);

        let config = cli.bridge_config().unwrap();
        assert!(config.allowed_user_ids.is_empty());
        assert_eq!(config.edit_rate_limit, Duration::from_secs(1));
        assert!(!config.manual_auth);
        assert_eq!(config.shutdown_grace, Duration::from_secs(30));
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn retry_settings_from_flags() {
        let config = parse(&["--retry-attempts", "5", "--retry-base-delay-ms", "100"])
            .bridge_config()
            .unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 100);
        assert_eq!(config.retry.max_delay_ms, 10_000);

        let zero = parse(&["--retry-attempts", "0"]);
        assert!(zero.bridge_config().is_err());
    }

    #[test]
    fn fractional_edit_interval() {
        let config = parse(&["--edit-wait-seconds", "0.5", "--manual-auth"])
            .bridge_config()
            .unwrap();
        assert_eq!(config.edit_rate_limit, Duration::from_millis(500));
        assert!(config.manual_auth);
    }

    #[test]
    fn negative_edit_interval_rejected() {
        let cli = parse(&["--edit-wait-seconds=-2"]);
        assert!(cli.bridge_config().is_err());
    }

    #[test]
    fn blank_token_rejected() {
        let cli = Cli::try_parse_from(["tgbridge", "--telegram-token", " "]).unwrap();
        assert!(matches!(cli.bridge_config(), Err(ConfigError::Missing("TELEGRAM_TOKEN"))));
    }

    #[test]
    fn missing_token_is_an_error() {
        // Only meaningful when the variable is not set in the test environment.
        if std::env::var_os("TELEGRAM_TOKEN").is_none() {
            assert!(Cli::try_parse_from(["tgbridge"]).is_err());
        }
    }
}

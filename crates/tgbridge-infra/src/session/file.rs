//! File-backed session provider.
//!
//! The active token is cached in memory and mirrored to
//! `{config_dir}/session.toml`. New sessions are acquired from the
//! `OPENAI_SESSION_TOKEN` environment variable, which is where an external
//! login helper is expected to leave a fresh cookie value.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use secrecy::SecretString;

use tgbridge_core::session::SessionProvider;
use tgbridge_types::config::PersistentConfig;
use tgbridge_types::error::SessionError;

use crate::config::{load_persistent_config, save_persistent_config};

/// Environment variable read by [`FileSessionProvider::acquire_session`].
pub const SESSION_TOKEN_ENV: &str = "OPENAI_SESSION_TOKEN";

/// Session provider persisting the token in the tgbridge config directory.
pub struct FileSessionProvider {
    config_dir: PathBuf,
    token: RwLock<Option<SecretString>>,
    /// Serializes writers so the file always matches the cache.
    write_lock: tokio::sync::Mutex<()>,
}

impl FileSessionProvider {
    /// Open the provider, loading any previously stored token.
    pub async fn open(config_dir: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let config_dir = config_dir.into();
        let stored = load_persistent_config(&config_dir).await?;
        let token = stored
            .session_token
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);

        tracing::debug!(
            config_dir = %config_dir.display(),
            has_token = token.is_some(),
            "session store opened"
        );

        Ok(Self {
            config_dir,
            token: RwLock::new(token),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn has_token(&self) -> bool {
        self.current_token().is_some()
    }
}

impl SessionProvider for FileSessionProvider {
    async fn acquire_session(&self) -> Result<SecretString, SessionError> {
        match std::env::var(SESSION_TOKEN_ENV) {
            Ok(value) if !value.trim().is_empty() => {
                Ok(SecretString::from(value.trim().to_string()))
            }
            Ok(_) | Err(std::env::VarError::NotPresent) => Err(SessionError::Unavailable(format!(
                "{SESSION_TOKEN_ENV} is not set; \
                 log in and export the session cookie, or use /setToken"
            ))),
            Err(std::env::VarError::NotUnicode(_)) => Err(SessionError::Unavailable(format!(
                "{SESSION_TOKEN_ENV} is not valid unicode"
            ))),
        }
    }

    async fn persist_token(&self, token: &str) -> Result<(), SessionError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SessionError::EmptyToken);
        }

        let _writer = self.write_lock.lock().await;
        let config = PersistentConfig {
            session_token: Some(token.to_string()),
        };
        save_persistent_config(&self.config_dir, &config).await?;

        let mut cached = self
            .token
            .write()
            .map_err(|_| SessionError::StorageError("session cache poisoned".to_string()))?;
        *cached = Some(SecretString::from(token.to_string()));
        tracing::info!(config_dir = %self.config_dir.display(), "session token stored");
        Ok(())
    }

    fn current_token(&self) -> Option<SecretString> {
        self.token.read().ok().and_then(|t| t.clone())
    }
}

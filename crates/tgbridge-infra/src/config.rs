//! Persistent configuration file for tgbridge.
//!
//! Reads `session.toml` from the config directory
//! (`~/.config/tgbridge/` on Linux) and deserializes it into
//! [`PersistentConfig`]. A missing file yields the default; a malformed one
//! is reported so a corrupt token is never silently replaced.

use std::path::{Path, PathBuf};

use tgbridge_types::config::PersistentConfig;
use tgbridge_types::error::SessionError;

/// File name of the persistent config inside the config directory.
pub const SESSION_FILE: &str = "session.toml";

/// Default config directory: `{platform config dir}/tgbridge`.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tgbridge"))
}

/// Load `{config_dir}/session.toml`.
pub async fn load_persistent_config(config_dir: &Path) -> Result<PersistentConfig, SessionError> {
    let path = config_dir.join(SESSION_FILE);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no persistent config, using defaults");
            return Ok(PersistentConfig::default());
        }
        Err(err) => {
            return Err(SessionError::StorageError(format!(
                "failed to read {}: {err}",
                path.display()
            )));
        }
    };

    toml::from_str(&content).map_err(|err| {
        SessionError::StorageError(format!("failed to parse {}: {err}", path.display()))
    })
}

/// Write `{config_dir}/session.toml`, replacing it atomically.
pub async fn save_persistent_config(
    config_dir: &Path,
    config: &PersistentConfig,
) -> Result<(), SessionError> {
    let path = config_dir.join(SESSION_FILE);
    let tmp = config_dir.join(format!("{SESSION_FILE}.tmp"));

    let content = toml::to_string_pretty(config)
        .map_err(|err| SessionError::StorageError(format!("failed to serialize config: {err}")))?;

    let io = |err: std::io::Error| {
        SessionError::StorageError(format!("failed to write {}: {err}", path.display()))
    };
    tokio::fs::create_dir_all(config_dir).await.map_err(io)?;
    tokio::fs::write(&tmp, content).await.map_err(io)?;
    tokio::fs::rename(&tmp, &path).await.map_err(io)?;
    Ok(())
}

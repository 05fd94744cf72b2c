//! Engine configuration.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Directory name under the platform config and data directories.
pub const APP_DIR: &str = "mailfold";

const fn default_page_size() -> NonZeroU32 {
    match NonZeroU32::new(50) {
        Some(size) => size,
        None => NonZeroU32::MIN,
    }
}

const fn default_connect_timeout_secs() -> u64 {
    15
}

const fn default_connect_attempts() -> u32 {
    1
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

const fn default_fetch_attempts() -> u32 {
    3
}

const fn default_cache_capacity() -> usize {
    500
}

const fn default_progress_grace_ms() -> u64 {
    500
}

fn default_mailbox() -> String {
    "INBOX".to_string()
}

/// Sync engine settings. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Messages per page.
    #[serde(default = "default_page_size")]
    pub page_size: NonZeroU32,
    /// Bound on each connect attempt, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Connect attempts per account and round.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Pause between attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Attempts for downloading one raw message.
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,
    /// Messages kept in the cache snapshot.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Delay before progress returns to idle, in milliseconds.
    #[serde(default = "default_progress_grace_ms")]
    pub progress_grace_ms: u64,
    /// Mailbox selected on every session.
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
            connect_attempts: default_connect_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            fetch_attempts: default_fetch_attempts(),
            cache_capacity: default_cache_capacity(),
            progress_grace_ms: default_progress_grace_ms(),
            mailbox: default_mailbox(),
        }
    }
}

impl SyncConfig {
    /// Connect timeout as a duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Retry delay as a duration.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Progress grace period as a duration.
    #[must_use]
    pub const fn progress_grace(&self) -> Duration {
        Duration::from_millis(self.progress_grace_ms)
    }

    /// Default location: `<config_dir>/mailfold/config.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Loads settings from `path`. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}

/// Default database location: `<data_dir>/mailfold/mailfold.db`.
#[must_use]
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("mailfold.db")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.page_size.get(), 50);
        assert_eq!(config.connect_timeout(), Duration::from_secs(15));
        assert_eq!(config.cache_capacity, 500);
        assert_eq!(config.mailbox, "INBOX");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{"page_size": 20}"#).unwrap();
        assert_eq!(config.page_size.get(), 20);
        assert_eq!(config.fetch_attempts, 3);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        assert!(serde_json::from_str::<SyncConfig>(r#"{"page_size": 0}"#).is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let path = std::env::temp_dir().join("mailfold-missing-config-test.json");
        let config = SyncConfig::load(&path).await.unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[tokio::test]
    async fn test_load_invalid_file() {
        let path = std::env::temp_dir().join(format!("mailfold-bad-config-{}.json", std::process::id()));
        tokio::fs::write(&path, "{not json").await.unwrap();
        let err = SyncConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        tokio::fs::remove_file(&path).await.unwrap();
    }
}

//! Configuration file parser for ~/.config/kbrowse/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning for each one
//! since they are usually typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::knowledge::CONTENT_BATCH_LIMIT;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Acting user for likes, favorites, comments and the archive check.
    pub user_id: i64,

    /// Quiet period after the last search keystroke before filtering.
    pub search_debounce_ms: u64,

    /// How long an article must stay selected before its view is counted.
    pub view_settle_ms: u64,

    /// Bodies fetched per content-search pass. Clamped to 1..=200.
    pub content_batch_limit: usize,

    /// Lifetime of status bar messages.
    pub status_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: 1,
            search_debounce_ms: 300,
            view_settle_ms: 1000,
            content_batch_limit: CONTENT_BATCH_LIMIT,
            status_timeout_secs: 3,
        }
    }
}

impl Config {
    /// SEC: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 5] = [
        "user_id",
        "search_debounce_ms",
        "view_settle_ms",
        "content_batch_limit",
        "status_timeout_secs",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let mut config: Config = toml::from_str(&content)?;
        let clamped = config.content_batch_limit.clamp(1, CONTENT_BATCH_LIMIT);
        if clamped != config.content_batch_limit {
            tracing::warn!(
                requested = config.content_batch_limit,
                clamped,
                "content_batch_limit out of range"
            );
            config.content_batch_limit = clamped;
        }
        tracing::info!(path = %path.display(), user_id = config.user_id, "Loaded configuration");
        Ok(config)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn view_settle(&self) -> Duration {
        Duration::from_millis(self.view_settle_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("kbrowse_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.user_id, 1);
        assert_eq!(config.search_debounce(), Duration::from_millis(300));
        assert_eq!(config.view_settle(), Duration::from_secs(1));
        assert_eq!(config.content_batch_limit, 200);
        assert_eq!(config.status_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/kbrowse_test_nonexistent_config.toml");
        assert_eq!(Config::load(path).unwrap(), Config::default());
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n  ");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config("partial", "user_id = 7\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.user_id, 7);
        assert_eq!(config.search_debounce_ms, 300);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_batch_limit_clamped() {
        let (dir, path) = write_config("clamp_high", "content_batch_limit = 5000\n");
        assert_eq!(Config::load(&path).unwrap().content_batch_limit, 200);
        std::fs::remove_dir_all(&dir).ok();

        let (dir, path) = write_config("clamp_low", "content_batch_limit = 0\n");
        assert_eq!(Config::load(&path).unwrap().content_batch_limit, 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("wrongtype", "user_id = \"admin\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config("unknown", "user_id = 2\ntheme = \"dark\"\n");
        assert_eq!(Config::load(&path).unwrap().user_id, 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        std::fs::remove_dir_all(&dir).ok();
    }
}

//! Configuration management for kith.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::db::{Database, DatabaseOptions, FileSnapshotStore, Platform, SeedProfile};
use crate::error::Error;

/// Global kith configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub profile: ProfileConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the database is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// SQLite file opened directly.
    #[default]
    Native,
    /// In-memory SQLite flushed to a snapshot file after writes.
    Bridged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file (native) or snapshot file (bridged).
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub mode: StorageMode,

    /// Pause before reconnecting after a transient failure.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Pause after save-and-close.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            mode: StorageMode::default(),
            retry_delay_ms: default_retry_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,

    #[serde(default = "default_name")]
    pub default_name: String,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            default_name: default_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_db_path() -> PathBuf {
    Config::global_dir().join("kith.db")
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_settle_delay_ms() -> u64 {
    100
}

fn default_user_id() -> String {
    crate::db::LOCAL_USER_ID.to_string()
}

fn default_name() -> String {
    crate::db::DEFAULT_USER_NAME.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load config from ~/.kith/config.toml
    pub fn load() -> Result<Self, Error> {
        Self::load_from(&Self::path())
    }

    /// Load config from an explicit file, falling back to defaults when absent.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to ~/.kith/config.toml
    pub fn save(&self) -> Result<(), Error> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path to global kith directory (~/.kith/)
    pub fn global_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".kith")
    }

    /// Path to config file
    pub fn path() -> PathBuf {
        Self::global_dir().join("config.toml")
    }

    /// Build a database handle for the configured storage.
    pub fn database(&self) -> Database {
        let platform = match self.storage.mode {
            StorageMode::Native => Platform::Native {
                path: self.storage.path.clone(),
            },
            StorageMode::Bridged => Platform::Bridged {
                store: Arc::new(FileSnapshotStore::new(self.storage.path.clone())),
            },
        };
        Database::new(
            platform,
            DatabaseOptions {
                retry_delay: Duration::from_millis(self.storage.retry_delay_ms),
                settle_delay: Duration::from_millis(self.storage.settle_delay_ms),
            },
        )
    }

    /// Seed row values for the schema bootstrap.
    pub fn seed_profile(&self) -> SeedProfile {
        SeedProfile {
            user_id: self.profile.user_id.clone(),
            name: self.profile.default_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.mode, StorageMode::Native);
        assert_eq!(config.storage.retry_delay_ms, 100);
        assert_eq!(config.profile.user_id, "u_local");
        assert_eq!(config.profile.default_name, "Me");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            mode = "bridged"
            path = "/tmp/kith-snapshot.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.mode, StorageMode::Bridged);
        assert_eq!(config.storage.settle_delay_ms, 100);
        assert_eq!(config.profile.user_id, "u_local");
        assert_eq!(config.database().platform().name(), "bridged");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.profile.default_name = "Sam".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.profile.default_name, "Sam");
        assert_eq!(loaded.storage.path, config.storage.path);
    }

    #[test]
    fn test_paths_live_under_global_dir() {
        let dir = Config::global_dir();
        assert!(dir.ends_with(".kith"));
        assert_eq!(Config::path(), dir.join("config.toml"));
        assert_eq!(Config::default().storage.path, dir.join("kith.db"));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.storage.mode, StorageMode::Native);
    }
}

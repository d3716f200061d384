//! Application configuration structures.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::storage::BackendKind;
use crate::storage::db::PoolSettings;

use super::validation::{ConfigError, expand_env_vars, is_valid_table_prefix};

// =============================================================================
// Constants
// =============================================================================

/// Default cache flush period (30 seconds).
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Minimum cache flush period (1 second).
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Default directory of the YAML data files.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default maximum pool size.
pub const DEFAULT_MAX_SIZE: u32 = 5;

/// Default pool acquisition timeout (30 seconds).
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_flush_interval() -> Duration {
    DEFAULT_FLUSH_INTERVAL
}

fn default_max_size() -> u32 {
    DEFAULT_MAX_SIZE
}

fn default_acquire_timeout() -> Duration {
    DEFAULT_ACQUIRE_TIMEOUT
}

// =============================================================================
// File Store Configuration
// =============================================================================

/// File-backed cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStoreConfig {
    /// Directory holding the data files (default: "data").
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Period of the dirty-only background flush (default: 30s, minimum: 1s).
    #[serde(default = "default_flush_interval", with = "humantime_serde")]
    pub flush_interval: Duration,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

// =============================================================================
// Database Configuration
// =============================================================================

/// Relational backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL; `${VAR}` references are expanded on load.
    #[serde(default)]
    pub url: String,

    /// Prefix applied to every table name.
    #[serde(default)]
    pub table_prefix: String,

    /// Connections kept open while idle (default: 0).
    #[serde(default)]
    pub min_idle: u32,

    /// Maximum live connections (default: 5).
    #[serde(default = "default_max_size")]
    pub max_size: u32,

    /// How long `acquire` waits for a free connection (default: 30s).
    #[serde(default = "default_acquire_timeout", with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            table_prefix: String::new(),
            min_idle: 0,
            max_size: DEFAULT_MAX_SIZE,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

impl DatabaseConfig {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            min_idle: self.min_idle,
            max_size: self.max_size,
            acquire_timeout: self.acquire_timeout,
        }
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

/// Backend selection plus per-backend settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `file` or `sql` (default: file).
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    pub file: FileStoreConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

impl StorageConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file.flush_interval < MIN_FLUSH_INTERVAL {
            return Err(ConfigError::ValidationError(format!(
                "file flush_interval must be at least {}",
                humantime::format_duration(MIN_FLUSH_INTERVAL)
            )));
        }

        let db = &self.database;
        if db.max_size == 0 {
            return Err(ConfigError::ValidationError(
                "database max_size must be positive".to_string(),
            ));
        }

        if db.min_idle > db.max_size {
            return Err(ConfigError::ValidationError(format!(
                "database min_idle ({}) exceeds max_size ({})",
                db.min_idle, db.max_size
            )));
        }

        if db.acquire_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "database acquire_timeout must be positive".to_string(),
            ));
        }

        if !is_valid_table_prefix(&db.table_prefix) {
            return Err(ConfigError::ValidationError(format!(
                "invalid database table_prefix: '{}'",
                db.table_prefix
            )));
        }

        if self.backend == BackendKind::Sql && db.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database url is required for the sql backend".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.storage.database.url = expand_env_vars(&config.storage.database.url);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()
    }
}

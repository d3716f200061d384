//! Configuration for the lobbystats storage layer.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Backend selection (`file` or `sql`)
//! - File store settings (data directory, flush interval)
//! - Database settings (URL, table prefix, pool sizing)

mod app;
mod validation;

pub use app::{AppConfig, DatabaseConfig, FileStoreConfig, StorageConfig};
pub use validation::{ConfigError, expand_env_vars, is_valid_table_prefix, parse_duration};

// Re-export constants
pub use app::{
    DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_DATA_DIR, DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_SIZE,
    MIN_FLUSH_INTERVAL,
};

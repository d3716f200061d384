//! Storage builder.
//!
//! Turns a [`StorageConfig`] into a ready-to-use backend behind the
//! [`StatsStore`] contract.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::StorageConfig;
use crate::storage::StorageError;
use crate::storage::cache_store::CacheStore;
use crate::storage::db::PoolSettings;
use crate::storage::sql_store::SqlStore;
use crate::storage::store::StatsStore;
use crate::storage::types::BackendKind;

/// Builder for constructing a statistics backend.
#[derive(Debug, Clone)]
pub struct StorageBuilder {
    backend: BackendKind,
    data_dir: PathBuf,
    flush_interval: Duration,
    database_url: String,
    table_prefix: String,
    pool: PoolSettings,
}

impl StorageBuilder {
    /// Start from a validated configuration.
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            backend: config.backend,
            data_dir: config.file.data_dir.clone(),
            flush_interval: config.file.flush_interval,
            database_url: config.database.url.clone(),
            table_prefix: config.database.table_prefix.clone(),
            pool: config.database.pool_settings(),
        }
    }

    /// File backend over `dir` with default settings.
    pub fn file(dir: impl AsRef<Path>) -> Self {
        Self::new(&StorageConfig::default()).data_dir(dir)
    }

    /// SQL backend on `url` with default settings.
    pub fn sql(url: impl Into<String>) -> Self {
        Self::new(&StorageConfig::default())
            .backend(BackendKind::Sql)
            .database_url(url)
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the period of the file backend's background flush.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn pool_settings(mut self, settings: PoolSettings) -> Self {
        self.pool = settings;
        self
    }

    /// Build and initialize the selected backend.
    pub async fn build(self) -> Result<Box<dyn StatsStore>, StorageError> {
        let store: Box<dyn StatsStore> = match self.backend {
            BackendKind::File => Box::new(CacheStore::with_flush_interval(
                &self.data_dir,
                self.flush_interval,
            )),
            BackendKind::Sql => Box::new(
                SqlStore::connect(&self.database_url, &self.pool, &self.table_prefix).await?,
            ),
        };

        store.initialize().await?;
        tracing::info!(backend = %store.backend(), "Storage ready");
        Ok(store)
    }
}

//! Storage-specific error types.
//!
//! All fallible storage operations return [`StorageError`], which can be
//! matched to determine the underlying cause (database, pool, file, actor).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database operation failed (sqlx error).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No pooled connection became available before the acquire timeout.
    #[error("connection pool exhausted: no connection available within {0:?}")]
    PoolExhausted(Duration),

    /// The connection pool has been closed.
    #[error("connection pool is closed")]
    PoolClosed,

    /// Table prefix contains characters outside `[A-Za-z0-9_]`.
    #[error("invalid table prefix: '{0}'")]
    InvalidTablePrefix(String),

    /// Reading or writing a data file failed.
    #[error("io error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A data file is not valid YAML.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Failed to send a command to the cache actor.
    #[error("failed to send command to cache actor")]
    ChannelSend,

    /// The cache actor went away before replying.
    #[error("cache actor dropped the reply channel")]
    ChannelRecv,

    /// An operation ran before `initialize()`.
    #[error("storage backend is not initialized")]
    NotInitialized,

    /// `initialize()` ran twice.
    #[error("storage backend is already initialized")]
    AlreadyInitialized,

    /// An operation ran after `shutdown()`.
    #[error("storage backend has been shut down")]
    ShutDown,

    /// Internal error (e.g., task join failure).
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

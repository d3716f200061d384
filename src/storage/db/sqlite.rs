//! SQLite connection pool using sqlx.

use sqlx::Sqlite;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool as SqlxPool, SqlitePoolOptions,
    SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;

use crate::storage::StorageError;

/// Default minimum idle connections.
pub const DEFAULT_MIN_IDLE: u32 = 0;

/// Default maximum connections in the pool.
pub const DEFAULT_MAX_SIZE: u32 = 5;

/// Default acquisition timeout.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// A connection borrowed from the pool.
pub type PooledConnection = PoolConnection<Sqlite>;

/// Pool sizing and timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub min_idle: u32,
    pub max_size: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_idle: DEFAULT_MIN_IDLE,
            max_size: DEFAULT_MAX_SIZE,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

/// Bounded SQLite connection pool.
///
/// Wraps sqlx's pool with WAL mode. At most `max_size` connections are
/// live; `acquire` waits up to `acquire_timeout` for one to free up.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: SqlxPool,
    settings: PoolSettings,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ConnectionPool {
    /// Connect to a SQLite database.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL, e.g., `sqlite:data/stats.db`
    ///
    /// # Configuration
    ///
    /// - WAL journal mode for concurrent readers
    /// - Normal synchronous mode
    /// - Create database if not exists
    pub async fn connect(url: &str, settings: &PoolSettings) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(settings.min_idle)
            .max_connections(settings.max_size)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await?;

        tracing::info!(
            max_size = settings.max_size,
            min_idle = settings.min_idle,
            acquire_timeout = ?settings.acquire_timeout,
            "Connection pool opened"
        );

        Ok(Self {
            inner: pool,
            settings: *settings,
        })
    }

    /// Borrow a connection, waiting up to the acquisition timeout.
    pub async fn acquire(&self) -> Result<PooledConnection, StorageError> {
        self.inner.acquire().await.map_err(|e| match e {
            sqlx::Error::PoolTimedOut => StorageError::PoolExhausted(self.settings.acquire_timeout),
            sqlx::Error::PoolClosed => StorageError::PoolClosed,
            other => StorageError::Database(other),
        })
    }

    /// Return a healthy connection to the pool.
    pub fn release(&self, conn: PooledConnection) {
        drop(conn);
    }

    /// Close a connection instead of recycling it.
    pub fn discard(&self, mut conn: PooledConnection) {
        conn.close_on_drop();
        drop(conn);
    }

    /// Give `conn` back according to the outcome of the statement run on it.
    ///
    /// Connection-level faults discard the connection; query errors such as
    /// constraint violations leave it reusable.
    pub fn finish<T>(
        &self,
        conn: PooledConnection,
        result: Result<T, sqlx::Error>,
    ) -> Result<T, StorageError> {
        match result {
            Ok(value) => {
                self.release(conn);
                Ok(value)
            }
            Err(e) => {
                if is_connection_fault(&e) {
                    tracing::warn!(error = %e, "Discarding broken connection");
                    self.discard(conn);
                } else {
                    self.release(conn);
                }
                Err(StorageError::Database(e))
            }
        }
    }

    /// Close every connection.
    ///
    /// Idle connections close immediately. Borrowed ones close as they come
    /// back; if they have not all returned within the acquisition timeout the
    /// wait is abandoned and the pool stays closed to new borrowers.
    pub async fn close_all(&self) {
        if tokio::time::timeout(self.settings.acquire_timeout, self.inner.close())
            .await
            .is_err()
        {
            tracing::warn!(
                in_use = self.in_use(),
                "Timed out waiting for borrowed connections to close"
            );
        } else {
            tracing::info!("Connection pool closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Live connections, idle or borrowed.
    pub fn size(&self) -> u32 {
        self.inner.size()
    }

    pub fn num_idle(&self) -> usize {
        self.inner.num_idle()
    }

    fn in_use(&self) -> usize {
        (self.size() as usize).saturating_sub(self.num_idle())
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }
}

fn is_connection_fault(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed
    )
}

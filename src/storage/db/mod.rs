//! Relational backend plumbing.
//!
//! - [`ConnectionPool`]: bounded pool of SQLite connections with
//!   acquire/release discipline
//! - [`PoolSettings`]: sizing and timeout knobs, passed in at construction
//!
//! # Example
//!
//! ```ignore
//! let pool = ConnectionPool::connect("sqlite:data/stats.db", &PoolSettings::default()).await?;
//! let conn = pool.acquire().await?;
//! pool.release(conn);
//! ```

mod sqlite;

pub use sqlite::{ConnectionPool, PoolSettings, PooledConnection};

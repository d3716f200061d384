//! Storage Layer
//!
//! Per-player statistics behind one contract with two interchangeable
//! backends:
//! - **File**: in-memory cache owned by an actor thread, flushed to YAML
//!   files every 30 seconds (dirty groups only) and in full at shutdown
//! - **SQL**: pooled SQLite connections with single-statement upserts
//!
//! # Components
//!
//! - [`StatsStore`]: The storage contract callers depend on
//! - [`CacheStore`]: File-backed engine
//! - [`SqlStore`]: Relational engine over a [`ConnectionPool`]
//! - [`Leaderboard`]: Ranked highscores and their wire format
//! - [`StorageBuilder`]: Backend selection and initialization

mod actor;
mod builder;
mod cache_store;
pub mod db;
mod error;
mod files;
mod leaderboard;
mod name_index;
mod schema;
mod sql_store;
mod store;
mod types;

pub use actor::{DEFAULT_FLUSH_INTERVAL, DirtyFlags, SaveReport};
pub use builder::StorageBuilder;
pub use cache_store::CacheStore;
pub use db::{ConnectionPool, PoolSettings};
pub use error::StorageError;
pub use files::{DataFiles, FileGroup};
pub use leaderboard::{LEADERBOARD_SIZE, Leaderboard, LeaderboardEntry, LeaderboardParseError};
pub use name_index::NameIndex;
pub use schema::Tables;
pub use sql_store::SqlStore;
pub use store::StatsStore;
pub use types::{BackendKind, GameRecord, GameStat, PlayerId};

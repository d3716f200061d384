//! Lobbystats - Per-Player Game Statistics Storage
//!
//! This crate persists small per-player statistics (a highscore and
//! tic-tac-toe wins/losses/ties) behind a single async contract. It can be
//! used as a library by a game server, or run as the `lobbystats` binary to
//! inspect and edit a store from the command line.
//!
//! # Architecture
//!
//! - **Storage**: [`StatsStore`] contract with a file-backed cache and a
//!   pooled SQL backend
//! - **Config**: YAML configuration selecting and tuning the backend
//!
//! # Example
//!
//! ```rust,ignore
//! use lobbystats::{PlayerId, StatsStore, StorageBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = StorageBuilder::file("data").build().await?;
//!
//!     let id = PlayerId::random();
//!     store.update_highscore(id, "Steve", 2048).await?;
//!     println!("{}", store.leaderboard().await);
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod storage;

pub use config::{AppConfig, ConfigError};
pub use storage::{
    BackendKind, GameStat, Leaderboard, PlayerId, StatsStore, StorageBuilder, StorageError,
};

//! The storage contract shared by every backend.

use async_trait::async_trait;

use crate::storage::StorageError;
use crate::storage::leaderboard::Leaderboard;
use crate::storage::types::{BackendKind, GameStat, PlayerId};

/// Per-player statistics storage.
///
/// Callers depend only on this trait; the file-backed [`CacheStore`] and the
/// pooled [`SqlStore`] are interchangeable behind it.
///
/// # Semantics
///
/// - Updates overwrite the stored value and (re)index `name` for `id`.
/// - Reads never fail: a missing player, an unresolvable name and a backend
///   failure all read as `0`. A recorded `0` is indistinguishable from no
///   record.
/// - Name lookups resolve through the name index; when several players share
///   a name only one of them is reachable by it.
/// - [`leaderboard`](Self::leaderboard) ranking is backend specific; see
///   [`Leaderboard`].
///
/// [`CacheStore`]: crate::storage::CacheStore
/// [`SqlStore`]: crate::storage::SqlStore
#[async_trait]
pub trait StatsStore: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// Prepare the backend (load files or create tables). Call once before
    /// any other operation.
    async fn initialize(&self) -> Result<(), StorageError>;

    async fn update_highscore(
        &self,
        id: PlayerId,
        name: &str,
        score: i64,
    ) -> Result<(), StorageError>;

    async fn highscore(&self, id: PlayerId) -> i64;

    async fn highscore_by_name(&self, name: &str) -> i64;

    /// Overwrite one tic-tac-toe counter; the other counters are untouched.
    async fn update_game_stat(
        &self,
        stat: GameStat,
        id: PlayerId,
        name: &str,
        value: i64,
    ) -> Result<(), StorageError>;

    async fn game_stat(&self, stat: GameStat, id: PlayerId) -> i64;

    async fn game_stat_by_name(&self, stat: GameStat, name: &str) -> i64;

    /// Top highscores; empty when the backend cannot be read.
    async fn leaderboard(&self) -> Leaderboard;

    /// Whether any player has been indexed under `name`.
    async fn registered_name(&self, name: &str) -> bool;

    /// Release backend resources. The cache backend flushes everything first.
    ///
    /// Safe to call more than once; later calls are no-ops.
    async fn shutdown(&self) -> Result<(), StorageError>;

    // =========================================================================
    // Per-counter conveniences
    // =========================================================================

    async fn update_wins(&self, id: PlayerId, name: &str, wins: i64) -> Result<(), StorageError> {
        self.update_game_stat(GameStat::Wins, id, name, wins).await
    }

    async fn update_losses(
        &self,
        id: PlayerId,
        name: &str,
        losses: i64,
    ) -> Result<(), StorageError> {
        self.update_game_stat(GameStat::Losses, id, name, losses)
            .await
    }

    async fn update_ties(&self, id: PlayerId, name: &str, ties: i64) -> Result<(), StorageError> {
        self.update_game_stat(GameStat::Ties, id, name, ties).await
    }

    async fn wins(&self, id: PlayerId) -> i64 {
        self.game_stat(GameStat::Wins, id).await
    }

    async fn losses(&self, id: PlayerId) -> i64 {
        self.game_stat(GameStat::Losses, id).await
    }

    async fn ties(&self, id: PlayerId) -> i64 {
        self.game_stat(GameStat::Ties, id).await
    }

    async fn wins_by_name(&self, name: &str) -> i64 {
        self.game_stat_by_name(GameStat::Wins, name).await
    }

    async fn losses_by_name(&self, name: &str) -> i64 {
        self.game_stat_by_name(GameStat::Losses, name).await
    }

    async fn ties_by_name(&self, name: &str) -> i64 {
        self.game_stat_by_name(GameStat::Ties, name).await
    }
}

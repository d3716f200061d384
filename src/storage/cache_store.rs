//! File-backed statistics store.
//!
//! All state lives in a [`CacheActor`] thread; this type is the async facade
//! that sends it commands. Writes are acknowledged once queued; reads and
//! saves wait for the actor's reply. Because both travel the same FIFO
//! channel, a read always observes every write queued before it.
//!
//! Shutdown swaps the sender out under the same lock writers send under, so a
//! write either lands ahead of the final flush or fails with
//! [`StorageError::ShutDown`].

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::{Mutex as StdMutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::RuntimeFlavor;
use tokio::sync::{Mutex, oneshot};

use crate::storage::StorageError;
use crate::storage::actor::{
    CacheActor, Command, DEFAULT_FLUSH_INTERVAL, DirtyFlags, Lookup, SaveReport,
};
use crate::storage::files::DataFiles;
use crate::storage::leaderboard::Leaderboard;
use crate::storage::store::StatsStore;
use crate::storage::types::{BackendKind, GameStat, PlayerId};

/// Statistics cached in memory and persisted to YAML files.
pub struct CacheStore {
    files: DataFiles,
    flush_interval: Duration,
    lifecycle: StdMutex<Lifecycle>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Channel state of the actor as seen by the facade.
#[derive(Debug)]
enum Lifecycle {
    Idle,
    Running(Sender<Command>),
    Stopped,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("dir", &self.files.dir())
            .field("flush_interval", &self.flush_interval)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Create a store over `dir` with the default 30s flush period.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_flush_interval(dir, DEFAULT_FLUSH_INTERVAL)
    }

    pub fn with_flush_interval(dir: impl AsRef<Path>, flush_interval: Duration) -> Self {
        Self {
            files: DataFiles::new(dir),
            flush_interval,
            lifecycle: StdMutex::new(Lifecycle::Idle),
            handle: Mutex::new(None),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.files.dir().to_path_buf()
    }

    /// Flush to disk now. With `only_if_dirty`, unchanged groups are skipped.
    pub async fn save(&self, only_if_dirty: bool) -> Result<SaveReport, StorageError> {
        self.request(|reply| Command::Save {
            only_if_dirty,
            reply,
        })
        .await?
    }

    /// Groups with changes not yet on disk.
    pub async fn dirty_groups(&self) -> Result<DirtyFlags, StorageError> {
        self.request(|reply| Command::DirtyGroups { reply }).await
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, cmd: Command) -> Result<(), StorageError> {
        match &*self.lifecycle() {
            Lifecycle::Running(tx) => tx.send(cmd).map_err(|_| StorageError::ChannelSend),
            Lifecycle::Idle => Err(StorageError::NotInitialized),
            Lifecycle::Stopped => Err(StorageError::ShutDown),
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, StorageError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply))?;
        rx.await.map_err(|_| StorageError::ChannelRecv)
    }

    /// Read through the actor, degrading to the default value on failure.
    async fn read<T: Default>(
        &self,
        op: &'static str,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> T {
        self.request(make).await.unwrap_or_else(|e| {
            tracing::warn!(op, error = %e, "Cache read failed");
            T::default()
        })
    }
}

#[async_trait]
impl StatsStore for CacheStore {
    fn backend(&self) -> BackendKind {
        BackendKind::File
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        let mut handle = self.handle.lock().await;
        if !matches!(*self.lifecycle(), Lifecycle::Idle) {
            return Err(StorageError::AlreadyInitialized);
        }

        let files = self.files.clone();
        let flush_interval = self.flush_interval;
        let (actor, tx) =
            tokio::task::spawn_blocking(move || CacheActor::spawn(files, flush_interval))
                .await
                .map_err(|e| StorageError::Internal(format!("cache loader panicked: {e}")))??;

        *self.lifecycle() = Lifecycle::Running(tx);
        *handle = Some(actor);

        tracing::info!(dir = %self.files.dir().display(), "Cache store initialized");
        Ok(())
    }

    async fn update_highscore(
        &self,
        id: PlayerId,
        name: &str,
        score: i64,
    ) -> Result<(), StorageError> {
        self.send(Command::SetHighscore {
            id,
            name: name.to_string(),
            score,
        })
    }

    async fn highscore(&self, id: PlayerId) -> i64 {
        self.read("highscore", |reply| Command::Highscore {
            lookup: Lookup::Id(id),
            reply,
        })
        .await
    }

    async fn highscore_by_name(&self, name: &str) -> i64 {
        self.read("highscore_by_name", |reply| Command::Highscore {
            lookup: Lookup::Name(name.to_string()),
            reply,
        })
        .await
    }

    async fn update_game_stat(
        &self,
        stat: GameStat,
        id: PlayerId,
        name: &str,
        value: i64,
    ) -> Result<(), StorageError> {
        self.send(Command::SetGameStat {
            stat,
            id,
            name: name.to_string(),
            value,
        })
    }

    async fn game_stat(&self, stat: GameStat, id: PlayerId) -> i64 {
        self.read("game_stat", |reply| Command::GameStat {
            stat,
            lookup: Lookup::Id(id),
            reply,
        })
        .await
    }

    async fn game_stat_by_name(&self, stat: GameStat, name: &str) -> i64 {
        self.read("game_stat_by_name", |reply| Command::GameStat {
            stat,
            lookup: Lookup::Name(name.to_string()),
            reply,
        })
        .await
    }

    async fn leaderboard(&self) -> Leaderboard {
        self.read("leaderboard", |reply| Command::Leaderboard { reply })
            .await
    }

    async fn registered_name(&self, name: &str) -> bool {
        self.read("registered_name", |reply| Command::RegisteredName {
            name: name.to_string(),
            reply,
        })
        .await
    }

    async fn shutdown(&self) -> Result<(), StorageError> {
        let mut guard = self.handle.lock().await;
        let Some(handle) = guard.take() else {
            return Ok(());
        };

        let (reply, rx) = oneshot::channel();
        let previous = std::mem::replace(&mut *self.lifecycle(), Lifecycle::Stopped);
        let sent = match previous {
            Lifecycle::Running(tx) => tx
                .send(Command::Shutdown { reply })
                .map_err(|_| StorageError::ChannelSend),
            _ => Err(StorageError::NotInitialized),
        };
        let flushed = match sent {
            Ok(()) => rx.await.map_err(|_| StorageError::ChannelRecv).and_then(|r| r),
            Err(e) => Err(e),
        };

        tokio::task::spawn_blocking(move || handle.join())
            .await
            .map_err(|e| StorageError::Internal(format!("join task failed: {e}")))?
            .map_err(|_| StorageError::Internal("Failed to join cache actor".to_string()))?;

        let report = flushed?;
        tracing::info!(groups = ?report.written, "Cache store shut down");
        Ok(())
    }
}

/// Flushes if [`StatsStore::shutdown`] was never called.
///
/// Waiting for the final flush blocks the dropping thread. On a multi-thread
/// runtime the wait runs under [`tokio::task::block_in_place`]; elsewhere it
/// blocks plainly, so async callers should prefer `shutdown().await`.
impl Drop for CacheStore {
    fn drop(&mut self) {
        let Some(handle) = self.handle.get_mut().take() else {
            return;
        };
        let lifecycle = self
            .lifecycle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        // Dropping the sender disconnects the channel; the actor flushes on exit
        *lifecycle = Lifecycle::Stopped;

        let join = move || {
            if handle.join().is_err() {
                tracing::error!("Cache actor panicked before the final flush");
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(rt) if rt.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(join)
            }
            _ => join(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::files::FileGroup;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_operations_before_initialize() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        let id = PlayerId::random();
        assert!(matches!(
            store.update_highscore(id, "Ann", 1).await,
            Err(StorageError::NotInitialized)
        ));
        assert_eq!(store.highscore(id).await, 0);
        assert!(store.leaderboard().await.is_empty());
        assert!(!store.registered_name("Ann").await);

        // Shutdown without initialize is a no-op.
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_double_initialize_rejected() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store.initialize().await.unwrap();
        assert!(matches!(
            store.initialize().await,
            Err(StorageError::AlreadyInitialized)
        ));
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_initialize_creates_files() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("stats");
        let store = CacheStore::new(&data);
        store.initialize().await.unwrap();

        for group in FileGroup::ALL {
            assert!(data.join(group.file_name()).exists());
        }
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_flushes_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let id = PlayerId::random();

        let store = CacheStore::new(dir.path());
        store.initialize().await.unwrap();
        store.update_highscore(id, "Ann", 300).await.unwrap();
        store.update_ties(id, "Ann", 2).await.unwrap();
        store.shutdown().await.unwrap();
        store.shutdown().await.unwrap();

        // Writes after shutdown are rejected, reads degrade to zero.
        assert!(matches!(
            store.update_highscore(id, "Ann", 1).await,
            Err(StorageError::ShutDown)
        ));
        assert!(matches!(
            store.initialize().await,
            Err(StorageError::AlreadyInitialized)
        ));
        assert_eq!(store.highscore(id).await, 0);

        let reopened = CacheStore::new(dir.path());
        reopened.initialize().await.unwrap();
        assert_eq!(reopened.highscore(id).await, 300);
        assert_eq!(reopened.ties_by_name("Ann").await, 2);
        reopened.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_flushes() {
        let dir = tempdir().unwrap();
        let id = PlayerId::random();
        {
            let store = CacheStore::new(dir.path());
            store.initialize().await.unwrap();
            store.update_wins(id, "Dee", 4).await.unwrap();
        }

        let files = DataFiles::new(dir.path());
        assert_eq!(files.load_tictactoe().unwrap()[&id].wins, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drop_on_worker_thread_flushes() {
        let dir = tempdir().unwrap();
        let id = PlayerId::random();

        let store = CacheStore::new(dir.path());
        store.initialize().await.unwrap();
        store.update_ties(id, "Flo", 6).await.unwrap();
        tokio::spawn(async move { drop(store) }).await.unwrap();

        let files = DataFiles::new(dir.path());
        assert_eq!(files.load_tictactoe().unwrap()[&id].ties, 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_write_racing_shutdown_is_flushed_or_rejected() {
        for round in 0..50 {
            let dir = tempdir().unwrap();
            let id = PlayerId::random();
            let store = std::sync::Arc::new(CacheStore::new(dir.path()));
            store.initialize().await.unwrap();

            let writer = {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    store.update_highscore(id, "Late", 555).await
                })
            };
            store.shutdown().await.unwrap();
            let written = writer.await.unwrap();

            let persisted = DataFiles::new(dir.path()).load_highscores().unwrap();
            match written {
                Ok(()) => assert_eq!(persisted.get(&id), Some(&555), "round {round}"),
                Err(e) => {
                    assert!(matches!(e, StorageError::ShutDown), "round {round}: {e}");
                    assert!(persisted.get(&id).is_none());
                }
            }
        }
    }

    #[tokio::test]
    async fn test_dirty_groups_and_save() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store.initialize().await.unwrap();
        assert!(store.dirty_groups().await.unwrap().is_clean());

        store
            .update_losses(PlayerId::random(), "Bob", 1)
            .await
            .unwrap();
        let dirty = store.dirty_groups().await.unwrap();
        assert!(dirty.tictactoe && dirty.uuids && !dirty.highscores);

        let report = store.save(true).await.unwrap();
        assert_eq!(report.written, vec![FileGroup::Uuids, FileGroup::TicTacToe]);
        assert!(store.dirty_groups().await.unwrap().is_clean());

        let report = store.save(false).await.unwrap();
        assert_eq!(report.written, FileGroup::ALL.to_vec());

        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_initialize() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("uuids.yml"), "[not, a, mapping]\n").unwrap();

        let store = CacheStore::new(dir.path());
        assert!(matches!(
            store.initialize().await,
            Err(StorageError::Yaml(_))
        ));
    }
}

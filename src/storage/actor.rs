//! Cache actor owning all file-backend state.
//!
//! Single-owner pattern: one thread owns the in-memory mappings, the name
//! index and the dirty flags, and processes commands from an MPSC channel.
//! Foreground calls and the periodic flush are serialized through the same
//! loop, so no lock guards the cache.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::storage::StorageError;
use crate::storage::files::{DataFiles, FileGroup};
use crate::storage::leaderboard::Leaderboard;
use crate::storage::name_index::NameIndex;
use crate::storage::types::{GameRecord, GameStat, PlayerId};

// =============================================================================
// Constants
// =============================================================================

/// Default period of the background flush.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Deadline used when `now + interval` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

// =============================================================================
// Commands
// =============================================================================

/// How a read addresses a player.
#[derive(Debug, Clone)]
pub enum Lookup {
    Id(PlayerId),
    Name(String),
}

/// Commands sent to the cache actor.
#[derive(Debug)]
pub enum Command {
    /// Overwrite a highscore and index the name.
    SetHighscore {
        id: PlayerId,
        name: String,
        score: i64,
    },
    /// Overwrite one tic-tac-toe counter and index the name.
    SetGameStat {
        stat: GameStat,
        id: PlayerId,
        name: String,
        value: i64,
    },
    Highscore {
        lookup: Lookup,
        reply: oneshot::Sender<i64>,
    },
    GameStat {
        stat: GameStat,
        lookup: Lookup,
        reply: oneshot::Sender<i64>,
    },
    Leaderboard {
        reply: oneshot::Sender<Leaderboard>,
    },
    RegisteredName {
        name: String,
        reply: oneshot::Sender<bool>,
    },
    DirtyGroups {
        reply: oneshot::Sender<DirtyFlags>,
    },
    /// Flush groups to disk; all of them when `only_if_dirty` is false.
    Save {
        only_if_dirty: bool,
        reply: oneshot::Sender<Result<SaveReport, StorageError>>,
    },
    /// Stop the periodic flush, flush everything, and exit.
    Shutdown {
        reply: oneshot::Sender<Result<SaveReport, StorageError>>,
    },
}

// =============================================================================
// State
// =============================================================================

/// Per-group markers of unflushed changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyFlags {
    pub uuids: bool,
    pub highscores: bool,
    pub tictactoe: bool,
}

impl DirtyFlags {
    pub fn get(&self, group: FileGroup) -> bool {
        match group {
            FileGroup::Uuids => self.uuids,
            FileGroup::Highscores => self.highscores,
            FileGroup::TicTacToe => self.tictactoe,
        }
    }

    fn set(&mut self, group: FileGroup, dirty: bool) {
        match group {
            FileGroup::Uuids => self.uuids = dirty,
            FileGroup::Highscores => self.highscores = dirty,
            FileGroup::TicTacToe => self.tictactoe = dirty,
        }
    }

    pub fn is_clean(&self) -> bool {
        !(self.uuids || self.highscores || self.tictactoe)
    }
}

/// Groups written by one flush, in flush order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub written: Vec<FileGroup>,
}

/// In-memory statistics plus their dirty flags.
#[derive(Debug, Default)]
pub(crate) struct CacheState {
    highscores: HashMap<PlayerId, i64>,
    games: HashMap<PlayerId, GameRecord>,
    names: NameIndex,
    dirty: DirtyFlags,
}

impl CacheState {
    /// Load every group from disk.
    pub(crate) fn load(files: &DataFiles) -> Result<Self, StorageError> {
        let state = Self {
            highscores: files.load_highscores()?,
            games: files.load_tictactoe()?,
            names: files.load_names()?,
            dirty: DirtyFlags::default(),
        };
        tracing::info!(
            highscores = state.highscores.len(),
            tictactoe = state.games.len(),
            names = state.names.len(),
            "Cache loaded"
        );
        Ok(state)
    }

    fn set_highscore(&mut self, id: PlayerId, name: &str, score: i64) {
        self.highscores.insert(id, score);
        self.names.insert(id, name);
        self.dirty.highscores = true;
        self.dirty.uuids = true;
    }

    fn set_game_stat(&mut self, stat: GameStat, id: PlayerId, name: &str, value: i64) {
        self.games.entry(id).or_default().set(stat, value);
        self.names.insert(id, name);
        self.dirty.tictactoe = true;
        self.dirty.uuids = true;
    }

    fn resolve(&self, lookup: &Lookup) -> Option<PlayerId> {
        match lookup {
            Lookup::Id(id) => Some(*id),
            Lookup::Name(name) => self.names.resolve(name),
        }
    }

    fn highscore(&self, lookup: &Lookup) -> i64 {
        self.resolve(lookup)
            .and_then(|id| self.highscores.get(&id).copied())
            .unwrap_or(0)
    }

    fn game_stat(&self, stat: GameStat, lookup: &Lookup) -> i64 {
        self.resolve(lookup)
            .and_then(|id| self.games.get(&id))
            .map(|record| record.get(stat))
            .unwrap_or(0)
    }

    fn leaderboard(&self) -> Leaderboard {
        Leaderboard::tie_grouped(&self.highscores, &self.names)
    }

    /// Flush groups in [`FileGroup::ALL`] order.
    ///
    /// Stops at the first failing group; groups already written are marked
    /// clean, the failing and later groups stay dirty. Memory is never
    /// touched, so a failed flush only delays persistence.
    pub(crate) fn save(
        &mut self,
        files: &DataFiles,
        only_if_dirty: bool,
    ) -> Result<SaveReport, StorageError> {
        let mut report = SaveReport::default();

        for group in FileGroup::ALL {
            if only_if_dirty && !self.dirty.get(group) {
                continue;
            }

            let result = match group {
                FileGroup::Uuids => files.write_names(&self.names),
                FileGroup::Highscores => files.write_highscores(&self.highscores),
                FileGroup::TicTacToe => files.write_tictactoe(&self.games),
            };

            if let Err(e) = result {
                tracing::error!(group = %group, error = %e, "Flush aborted");
                return Err(e);
            }

            self.dirty.set(group, false);
            report.written.push(group);
        }

        Ok(report)
    }
}

// =============================================================================
// Actor
// =============================================================================

/// Cache actor with a periodic dirty-only flush.
pub struct CacheActor {
    files: DataFiles,
    state: CacheState,
    rx: Receiver<Command>,
    flush_interval: Duration,
}

impl CacheActor {
    /// Create missing files, load them, and spawn the actor thread.
    ///
    /// Returns the thread handle and the command sender. Load errors are
    /// returned here, before any thread exists.
    pub fn spawn(
        files: DataFiles,
        flush_interval: Duration,
    ) -> Result<(JoinHandle<()>, Sender<Command>), StorageError> {
        files.ensure_exists()?;
        let state = CacheState::load(&files)?;

        let (tx, rx) = mpsc::channel();
        let mut actor = CacheActor {
            files,
            state,
            rx,
            flush_interval,
        };
        let handle = thread::Builder::new()
            .name("lobbystats-cache".to_string())
            .spawn(move || actor.run())
            .map_err(|e| StorageError::Internal(format!("failed to spawn cache actor: {e}")))?;

        Ok((handle, tx))
    }

    fn run(&mut self) {
        tracing::info!(flush_interval = ?self.flush_interval, "CacheActor started");
        let mut next_flush = flush_deadline(self.flush_interval);

        loop {
            let timeout = next_flush.saturating_duration_since(Instant::now());

            match self.rx.recv_timeout(timeout) {
                Ok(Command::Shutdown { reply }) => {
                    tracing::info!("CacheActor shutting down");
                    self.drain_queued();
                    let _ = reply.send(self.state.save(&self.files, false));
                    break;
                }
                Ok(cmd) => self.handle_command(cmd),
                Err(RecvTimeoutError::Timeout) => {
                    // Timeout: periodic flush overdue
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("Channel disconnected, shutting down");
                    if let Err(e) = self.state.save(&self.files, false) {
                        tracing::error!(error = %e, "Final flush failed");
                    }
                    break;
                }
            }

            if Instant::now() >= next_flush {
                match self.state.save(&self.files, true) {
                    Ok(report) if !report.written.is_empty() => {
                        tracing::debug!(groups = ?report.written, "Periodic flush completed")
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "Periodic flush failed"),
                }
                next_flush = flush_deadline(self.flush_interval);
            }
        }

        tracing::info!("CacheActor stopped");
    }

    /// Apply commands already queued behind a shutdown so that no write
    /// accepted by the channel is left out of the final flush.
    fn drain_queued(&mut self) {
        let queued: Vec<Command> = self.rx.try_iter().collect();
        if !queued.is_empty() {
            tracing::debug!(count = queued.len(), "Applying commands queued behind shutdown");
        }
        for cmd in queued {
            match cmd {
                // Repeated shutdown: the reply is dropped, the caller sees ChannelRecv
                Command::Shutdown { .. } => {}
                cmd => self.handle_command(cmd),
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SetHighscore { id, name, score } => {
                self.state.set_highscore(id, &name, score);
            }
            Command::SetGameStat {
                stat,
                id,
                name,
                value,
            } => {
                self.state.set_game_stat(stat, id, &name, value);
            }
            Command::Highscore { lookup, reply } => {
                let _ = reply.send(self.state.highscore(&lookup));
            }
            Command::GameStat {
                stat,
                lookup,
                reply,
            } => {
                let _ = reply.send(self.state.game_stat(stat, &lookup));
            }
            Command::Leaderboard { reply } => {
                let _ = reply.send(self.state.leaderboard());
            }
            Command::RegisteredName { name, reply } => {
                let _ = reply.send(self.state.names.contains_name(&name));
            }
            Command::DirtyGroups { reply } => {
                let _ = reply.send(self.state.dirty);
            }
            Command::Save {
                only_if_dirty,
                reply,
            } => {
                let _ = reply.send(self.state.save(&self.files, only_if_dirty));
            }
            Command::Shutdown { .. } => {
                tracing::warn!("Shutdown reached the command handler, ignored");
            }
        }
    }
}

/// Next flush deadline, saturating to [`FAR_FUTURE`] for huge intervals.
fn flush_deadline(interval: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(interval)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

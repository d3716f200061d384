//! YAML data files behind the cache store.
//!
//! One file per group, each a flat mapping keyed by the player's UUID string:
//! - `highscores.yml`: UUID -> integer score
//! - `uuids.yml`: UUID -> display name
//! - `tictactoe.yml`: UUID -> `"<wins>-<losses>"` (or `"<wins>-<losses>-<ties>"`)
//!
//! Malformed entries are logged and skipped; a file that is not a YAML
//! mapping at all fails the load.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use strum_macros::{AsRefStr, Display};

use crate::storage::StorageError;
use crate::storage::name_index::NameIndex;
use crate::storage::types::{GameRecord, PlayerId};

/// A persisted group of cache state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum FileGroup {
    Uuids,
    Highscores,
    TicTacToe,
}

impl FileGroup {
    /// Flush order.
    pub const ALL: [FileGroup; 3] = [Self::Uuids, Self::Highscores, Self::TicTacToe];

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Uuids => "uuids.yml",
            Self::Highscores => "highscores.yml",
            Self::TicTacToe => "tictactoe.yml",
        }
    }
}

/// Location of the three data files.
#[derive(Debug, Clone)]
pub struct DataFiles {
    dir: PathBuf,
}

impl DataFiles {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, group: FileGroup) -> PathBuf {
        self.dir.join(group.file_name())
    }

    /// Create the data directory and any missing file (empty).
    pub fn ensure_exists(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;

        for group in FileGroup::ALL {
            let path = self.path(group);
            if !path.exists() {
                fs::File::create(&path).map_err(|e| StorageError::io(&path, e))?;
                tracing::info!(file = %path.display(), "Created empty data file");
            }
        }
        Ok(())
    }

    // =========================================================================
    // Load
    // =========================================================================

    pub fn load_highscores(&self) -> Result<HashMap<PlayerId, i64>, StorageError> {
        let mut scores = HashMap::new();
        for (id, key, value) in self.read_entries(FileGroup::Highscores)? {
            match value.as_i64() {
                Some(score) => {
                    scores.insert(id, score);
                }
                None => tracing::warn!(key = %key, "Skipping non-integer highscore"),
            }
        }
        Ok(scores)
    }

    pub fn load_names(&self) -> Result<NameIndex, StorageError> {
        let mut names = NameIndex::new();
        for (id, key, value) in self.read_entries(FileGroup::Uuids)? {
            match value {
                Value::String(name) => names.insert(id, &name),
                _ => tracing::warn!(key = %key, "Skipping non-string player name"),
            }
        }
        Ok(names)
    }

    pub fn load_tictactoe(&self) -> Result<HashMap<PlayerId, GameRecord>, StorageError> {
        let mut games = HashMap::new();
        for (id, key, value) in self.read_entries(FileGroup::TicTacToe)? {
            match value.as_str().and_then(parse_game_record) {
                Some(record) => {
                    games.insert(id, record);
                }
                None => tracing::warn!(key = %key, value = ?value, "Skipping malformed tic-tac-toe record"),
            }
        }
        Ok(games)
    }

    /// Parse one file into `(id, raw key, value)` triples, skipping bad keys.
    fn read_entries(&self, group: FileGroup) -> Result<Vec<(PlayerId, String, Value)>, StorageError> {
        let path = self.path(group);
        let content = fs::read_to_string(&path).map_err(|e| StorageError::io(&path, e))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let raw: BTreeMap<String, Value> = match serde_yaml::from_str::<Option<_>>(&content)? {
            Some(raw) => raw,
            None => return Ok(Vec::new()),
        };

        let mut entries = Vec::with_capacity(raw.len());
        for (key, value) in raw {
            match key.parse::<PlayerId>() {
                Ok(id) => entries.push((id, key, value)),
                Err(e) => {
                    tracing::warn!(file = %group.file_name(), key = %key, error = %e, "Skipping unparseable UUID")
                }
            }
        }

        tracing::debug!(file = %group.file_name(), count = entries.len(), "Data file loaded");
        Ok(entries)
    }

    // =========================================================================
    // Save
    // =========================================================================

    pub fn write_highscores(&self, scores: &HashMap<PlayerId, i64>) -> Result<(), StorageError> {
        let doc: BTreeMap<String, i64> = scores
            .iter()
            .map(|(id, score)| (id.to_string(), *score))
            .collect();
        self.write_group(FileGroup::Highscores, &doc)
    }

    pub fn write_names(&self, names: &NameIndex) -> Result<(), StorageError> {
        let doc: BTreeMap<String, &str> = names
            .iter()
            .map(|(id, name)| (id.to_string(), name))
            .collect();
        self.write_group(FileGroup::Uuids, &doc)
    }

    pub fn write_tictactoe(&self, games: &HashMap<PlayerId, GameRecord>) -> Result<(), StorageError> {
        let doc: BTreeMap<String, String> = games
            .iter()
            .map(|(id, record)| (id.to_string(), format_game_record(record)))
            .collect();
        self.write_group(FileGroup::TicTacToe, &doc)
    }

    /// Serialize and atomically replace one file. An empty mapping is written
    /// as an empty file.
    fn write_group<V: serde::Serialize>(
        &self,
        group: FileGroup,
        doc: &BTreeMap<String, V>,
    ) -> Result<(), StorageError> {
        let content = if doc.is_empty() {
            String::new()
        } else {
            serde_yaml::to_string(doc)?
        };

        let path = self.path(group);
        let tmp = path.with_extension("yml.tmp");
        fs::write(&tmp, content).map_err(|e| StorageError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StorageError::io(&path, e))?;

        tracing::debug!(file = %group.file_name(), count = doc.len(), "Data file written");
        Ok(())
    }
}

/// Parse `"<wins>-<losses>"` or `"<wins>-<losses>-<ties>"`.
pub(crate) fn parse_game_record(raw: &str) -> Option<GameRecord> {
    let fields: Vec<i64> = raw
        .split('-')
        .map(|field| field.trim().parse().ok())
        .collect::<Option<_>>()?;

    match fields.as_slice() {
        [wins, losses] => Some(GameRecord {
            wins: *wins,
            losses: *losses,
            ties: 0,
        }),
        [wins, losses, ties] => Some(GameRecord {
            wins: *wins,
            losses: *losses,
            ties: *ties,
        }),
        _ => None,
    }
}

pub(crate) fn format_game_record(record: &GameRecord) -> String {
    if record.ties == 0 {
        format!("{}-{}", record.wins, record.losses)
    } else {
        format!("{}-{}-{}", record.wins, record.losses, record.ties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_exists_creates_empty_files() {
        let dir = tempdir().unwrap();
        let files = DataFiles::new(dir.path().join("nested"));
        files.ensure_exists().unwrap();

        for group in FileGroup::ALL {
            let content = fs::read_to_string(files.path(group)).unwrap();
            assert!(content.is_empty(), "{group} should start empty");
        }
        assert!(files.load_highscores().unwrap().is_empty());
        assert!(files.load_names().unwrap().is_empty());
        assert!(files.load_tictactoe().unwrap().is_empty());
    }

    #[test]
    fn test_ensure_exists_keeps_existing_content() {
        let dir = tempdir().unwrap();
        let files = DataFiles::new(dir.path());
        let id = PlayerId::random();
        fs::write(files.path(FileGroup::Highscores), format!("{id}: 42\n")).unwrap();

        files.ensure_exists().unwrap();
        assert_eq!(files.load_highscores().unwrap().get(&id), Some(&42));
    }

    #[test]
    fn test_malformed_tictactoe_entry_is_skipped() {
        let dir = tempdir().unwrap();
        let files = DataFiles::new(dir.path());
        files.ensure_exists().unwrap();

        let good = PlayerId::random();
        let bad = PlayerId::random();
        let worse = PlayerId::random();
        let content = format!("{good}: 3-1\n{bad}: '5'\n{worse}: a-b\n");
        fs::write(files.path(FileGroup::TicTacToe), content).unwrap();

        let games = files.load_tictactoe().unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(
            games.get(&good),
            Some(&GameRecord {
                wins: 3,
                losses: 1,
                ties: 0
            })
        );
    }

    #[test]
    fn test_bad_keys_and_values_are_skipped() {
        let dir = tempdir().unwrap();
        let files = DataFiles::new(dir.path());
        files.ensure_exists().unwrap();

        let id = PlayerId::random();
        let other = PlayerId::random();
        fs::write(
            files.path(FileGroup::Highscores),
            format!("not-a-uuid: 10\n{id}: 12\n{other}: twelve\n"),
        )
        .unwrap();
        fs::write(
            files.path(FileGroup::Uuids),
            format!("{id}: Alice\n{other}: [1, 2]\n"),
        )
        .unwrap();

        let scores = files.load_highscores().unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores.get(&id), Some(&12));

        let names = files.load_names().unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names.resolve("Alice"), Some(id));
    }

    #[test]
    fn test_non_mapping_file_fails_load() {
        let dir = tempdir().unwrap();
        let files = DataFiles::new(dir.path());
        files.ensure_exists().unwrap();
        fs::write(files.path(FileGroup::Highscores), "- just\n- a list\n").unwrap();

        assert!(matches!(
            files.load_highscores(),
            Err(StorageError::Yaml(_))
        ));
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempdir().unwrap();
        let files = DataFiles::new(dir.path());
        files.ensure_exists().unwrap();

        let id = PlayerId::random();
        let mut names = NameIndex::new();
        names.insert(id, "Bob");
        let games = HashMap::from([(
            id,
            GameRecord {
                wins: 5,
                losses: 2,
                ties: 1,
            },
        )]);

        files.write_names(&names).unwrap();
        files.write_tictactoe(&games).unwrap();
        files.write_highscores(&HashMap::from([(id, 2048)])).unwrap();

        assert_eq!(files.load_names().unwrap().resolve("Bob"), Some(id));
        assert_eq!(files.load_tictactoe().unwrap(), games);
        assert_eq!(files.load_highscores().unwrap().get(&id), Some(&2048));

        let raw = fs::read_to_string(files.path(FileGroup::TicTacToe)).unwrap();
        assert!(raw.contains("5-2-1"));
        assert!(!dir.path().join("tictactoe.yml.tmp").exists());
    }

    #[test]
    fn test_game_record_format() {
        let plain = GameRecord {
            wins: 4,
            losses: 9,
            ties: 0,
        };
        assert_eq!(format_game_record(&plain), "4-9");
        assert_eq!(parse_game_record("4-9"), Some(plain));
        assert_eq!(parse_game_record(" 1 - 2 - 3 "), Some(GameRecord { wins: 1, losses: 2, ties: 3 }));
        assert_eq!(parse_game_record("5"), None);
        assert_eq!(parse_game_record("1-2-3-4"), None);
        assert_eq!(parse_game_record("-1"), None);
    }
}

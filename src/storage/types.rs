//! Core data types for the storage layer.
//!
//! - [`PlayerId`]: Immutable primary key of every statistic
//! - [`GameStat`]: One of the independently updatable tic-tac-toe counters
//! - [`GameRecord`]: Wins, losses and ties of a single player
//! - [`BackendKind`]: Which storage engine is behind the contract

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// A player's 128-bit universally unique identifier.
///
/// Serialized as the hyphenated lowercase UUID string, which is also the
/// key format of the data files and the `uuid` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a random (v4) id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for PlayerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Tic-tac-toe counter selector.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum GameStat {
    Wins,
    Losses,
    Ties,
}

impl GameStat {
    /// Column holding this counter in the `tictactoe` table.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Wins => "games_won",
            Self::Losses => "games_lost",
            Self::Ties => "games_tied",
        }
    }
}

/// Tic-tac-toe statistics of one player. Absent players read as all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameRecord {
    pub wins: i64,
    pub losses: i64,
    pub ties: i64,
}

impl GameRecord {
    pub fn get(&self, stat: GameStat) -> i64 {
        match stat {
            GameStat::Wins => self.wins,
            GameStat::Losses => self.losses,
            GameStat::Ties => self.ties,
        }
    }

    /// Overwrite one counter, leaving the others untouched.
    pub fn set(&mut self, stat: GameStat, value: i64) {
        match stat {
            GameStat::Wins => self.wins = value,
            GameStat::Losses => self.losses = value,
            GameStat::Ties => self.ties = value,
        }
    }
}

/// Storage engine selection.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendKind {
    /// In-memory cache persisted to YAML files.
    #[default]
    File,
    /// Pooled relational database.
    Sql,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_display_roundtrip() {
        let id = PlayerId::random();
        let parsed: PlayerId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(id.to_string().len(), 36);
    }

    #[test]
    fn test_player_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<PlayerId>().is_err());
    }

    #[test]
    fn test_game_record_set_is_independent() {
        let mut record = GameRecord::default();
        record.set(GameStat::Wins, 5);
        record.set(GameStat::Ties, 2);
        record.set(GameStat::Wins, 7);

        assert_eq!(record.get(GameStat::Wins), 7);
        assert_eq!(record.get(GameStat::Losses), 0);
        assert_eq!(record.get(GameStat::Ties), 2);
    }

    #[test]
    fn test_game_stat_from_str() {
        assert_eq!(GameStat::from_str("WINS").unwrap(), GameStat::Wins);
        assert_eq!(GameStat::Losses.as_ref(), "losses");
        assert_eq!(GameStat::Ties.column(), "games_tied");
        assert!(GameStat::from_str("draws").is_err());
    }

    #[test]
    fn test_backend_kind_default_and_parse() {
        assert_eq!(BackendKind::default(), BackendKind::File);
        assert_eq!(BackendKind::from_str("SQL").unwrap(), BackendKind::Sql);
        assert_eq!(BackendKind::File.to_string(), "file");
    }
}

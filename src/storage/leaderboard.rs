//! Highscore leaderboard ranking and its wire format.
//!
//! The wire format is a single string: entries separated by `>`, each entry
//! `name,score`. Tied players may share one entry as `name1 & name2,score`.
//!
//! Two rankings exist and are intentionally different:
//! - [`Leaderboard::tie_grouped`] (file backend): the top scores with every
//!   tie compressed into one entry, so fewer than ten lines can come back.
//! - [`Leaderboard::from_rows`] (SQL backend): up to ten rows as returned by
//!   the query, one entry per player.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::storage::name_index::NameIndex;
use crate::storage::types::PlayerId;

/// Number of scores considered for a leaderboard.
pub const LEADERBOARD_SIZE: usize = 10;

const ENTRY_SEPARATOR: char = '>';
const SCORE_SEPARATOR: char = ',';
const NAME_SEPARATOR: &str = " & ";

/// Error parsing a leaderboard wire string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LeaderboardParseError {
    #[error("entry '{0}' has no ',' separator")]
    MissingScore(String),

    #[error("entry '{0}' has a non-numeric score")]
    InvalidScore(String),
}

/// One leaderboard line: one or more tied players and their score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub names: Vec<String>,
    pub score: i64,
}

impl LeaderboardEntry {
    pub fn new(names: Vec<String>, score: i64) -> Self {
        Self { names, score }
    }

    /// Names joined with `" & "`.
    pub fn label(&self) -> String {
        self.names.join(NAME_SEPARATOR)
    }
}

/// Ranked highscores, best first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    /// Rank a full highscore mapping, grouping ties.
    ///
    /// Scores are sorted descending and truncated to [`LEADERBOARD_SIZE`];
    /// each distinct score in that window becomes one entry naming every
    /// player holding it. Players without an indexed name are shown by id.
    pub fn tie_grouped(scores: &HashMap<PlayerId, i64>, names: &NameIndex) -> Self {
        let mut top: Vec<i64> = scores.values().copied().collect();
        top.sort_unstable_by(|a, b| b.cmp(a));
        top.truncate(LEADERBOARD_SIZE);
        top.dedup();

        let entries = top
            .into_iter()
            .map(|score| {
                let mut holders: Vec<(String, PlayerId)> = scores
                    .iter()
                    .filter(|(_, s)| **s == score)
                    .map(|(id, _)| {
                        let name = names
                            .name_of(id)
                            .map(str::to_owned)
                            .unwrap_or_else(|| id.to_string());
                        (name, *id)
                    })
                    .collect();
                holders.sort();
                LeaderboardEntry::new(holders.into_iter().map(|(name, _)| name).collect(), score)
            })
            .collect();

        Self { entries }
    }

    /// Build from pre-ranked `(name, score)` rows, one entry per row.
    pub fn from_rows(rows: impl IntoIterator<Item = (String, i64)>) -> Self {
        let entries = rows
            .into_iter()
            .take(LEADERBOARD_SIZE)
            .map(|(name, score)| LeaderboardEntry::new(vec![name], score))
            .collect();
        Self { entries }
    }

    /// Parse the wire format. An empty string is an empty leaderboard.
    pub fn parse(s: &str) -> Result<Self, LeaderboardParseError> {
        if s.is_empty() {
            return Ok(Self::default());
        }

        let entries = s
            .split(ENTRY_SEPARATOR)
            .map(|raw| {
                let (label, score) = raw
                    .rsplit_once(SCORE_SEPARATOR)
                    .ok_or_else(|| LeaderboardParseError::MissingScore(raw.to_string()))?;
                let score = score
                    .trim()
                    .parse()
                    .map_err(|_| LeaderboardParseError::InvalidScore(raw.to_string()))?;
                let names = label.split(NAME_SEPARATOR).map(str::to_owned).collect();
                Ok(LeaderboardEntry::new(names, score))
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Leaderboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, "{ENTRY_SEPARATOR}")?;
            }
            write!(f, "{}{SCORE_SEPARATOR}{}", entry.label(), entry.score)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(players: &[(&str, i64)]) -> (HashMap<PlayerId, i64>, NameIndex) {
        let mut scores = HashMap::new();
        let mut names = NameIndex::new();
        for (name, score) in players {
            let id = PlayerId::random();
            scores.insert(id, *score);
            names.insert(id, name);
        }
        (scores, names)
    }

    #[test]
    fn test_tie_grouped_example() {
        let (scores, names) = fixture(&[("A", 100), ("B", 100), ("C", 90)]);
        let board = Leaderboard::tie_grouped(&scores, &names);

        assert_eq!(board.len(), 2);
        assert_eq!(board.to_string(), "A & B,100>C,90");
    }

    #[test]
    fn test_tie_grouped_empty() {
        let board = Leaderboard::tie_grouped(&HashMap::new(), &NameIndex::new());
        assert!(board.is_empty());
        assert_eq!(board.to_string(), "");
    }

    #[test]
    fn test_tie_grouped_truncates_to_ten_scores() {
        let players: Vec<(String, i64)> = (0..15).map(|i| (format!("p{i:02}"), i)).collect();
        let refs: Vec<(&str, i64)> = players.iter().map(|(n, s)| (n.as_str(), *s)).collect();
        let (scores, names) = fixture(&refs);

        let board = Leaderboard::tie_grouped(&scores, &names);
        assert_eq!(board.len(), LEADERBOARD_SIZE);
        assert_eq!(board.entries()[0].score, 14);
        assert_eq!(board.entries()[9].score, 5);
        assert!(
            board
                .entries()
                .windows(2)
                .all(|pair| pair[0].score > pair[1].score)
        );
    }

    #[test]
    fn test_tie_grouped_never_repeats_a_player() {
        let (scores, names) = fixture(&[("A", 50), ("B", 50), ("C", 50), ("D", 40)]);
        let board = Leaderboard::tie_grouped(&scores, &names);

        assert_eq!(board.len(), 2);
        assert_eq!(board.entries()[0].names, vec!["A", "B", "C"]);
        assert_eq!(board.entries()[1].names, vec!["D"]);
    }

    #[test]
    fn test_tie_grouped_keeps_tied_players_cut_by_truncation() {
        // Nine players above, three tied at the tenth score.
        let mut players: Vec<(String, i64)> =
            (0..9).map(|i| (format!("top{i}"), 100 + i)).collect();
        players.extend((0..3).map(|i| (format!("tied{i}"), 10)));
        let refs: Vec<(&str, i64)> = players.iter().map(|(n, s)| (n.as_str(), *s)).collect();
        let (scores, names) = fixture(&refs);

        let board = Leaderboard::tie_grouped(&scores, &names);
        let last = board.entries().last().unwrap();
        assert_eq!(last.score, 10);
        assert_eq!(last.names, vec!["tied0", "tied1", "tied2"]);
    }

    #[test]
    fn test_tie_grouped_falls_back_to_id_without_name() {
        let id = PlayerId::random();
        let scores = HashMap::from([(id, 7)]);
        let board = Leaderboard::tie_grouped(&scores, &NameIndex::new());
        assert_eq!(board.to_string(), format!("{id},7"));
    }

    #[test]
    fn test_from_rows_keeps_ties_separate() {
        let board = Leaderboard::from_rows(vec![
            ("A".to_string(), 100),
            ("B".to_string(), 100),
            ("C".to_string(), 90),
        ]);
        assert_eq!(board.len(), 3);
        assert_eq!(board.to_string(), "A,100>B,100>C,90");
    }

    #[test]
    fn test_from_rows_caps_at_ten() {
        let rows = (0..12).rev().map(|i| (format!("p{i}"), i));
        assert_eq!(Leaderboard::from_rows(rows).len(), LEADERBOARD_SIZE);
    }

    #[test]
    fn test_parse_wire_format() {
        let board = Leaderboard::parse("A & B,100>C,90").unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board.entries()[0].names, vec!["A", "B"]);
        assert_eq!(board.entries()[0].score, 100);
        assert_eq!(board.entries()[1], LeaderboardEntry::new(vec!["C".into()], 90));
        assert_eq!(board.to_string(), "A & B,100>C,90");
    }

    #[test]
    fn test_parse_errors() {
        assert!(Leaderboard::parse("").unwrap().is_empty());
        assert_eq!(
            Leaderboard::parse("A,1>B"),
            Err(LeaderboardParseError::MissingScore("B".to_string()))
        );
        assert_eq!(
            Leaderboard::parse("A,x"),
            Err(LeaderboardParseError::InvalidScore("A,x".to_string()))
        );
    }
}

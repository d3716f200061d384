//! Database schema definitions.

use sqlx::SqliteConnection;

use crate::config::is_valid_table_prefix;
use crate::storage::StorageError;

/// Base name of the highscore table.
pub const HIGHSCORES_TABLE: &str = "highscores";

/// Base name of the tic-tac-toe table.
pub const TICTACTOE_TABLE: &str = "tictactoe";

/// Table names after applying the configured prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub highscores: String,
    pub tictactoe: String,
}

impl Tables {
    /// Prefix both tables. The prefix is spliced into SQL identifiers, so
    /// only `[A-Za-z0-9_]` is accepted.
    pub fn with_prefix(prefix: &str) -> Result<Self, StorageError> {
        if !is_valid_table_prefix(prefix) {
            return Err(StorageError::InvalidTablePrefix(prefix.to_string()));
        }
        Ok(Self {
            highscores: format!("{prefix}{HIGHSCORES_TABLE}"),
            tictactoe: format!("{prefix}{TICTACTOE_TABLE}"),
        })
    }

    /// DDL for the highscore table, keyed by the player's UUID string.
    pub fn highscores_ddl(&self) -> String {
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {table} (
    uuid      VARCHAR(50) PRIMARY KEY,
    player    VARCHAR(50) NOT NULL,
    highscore INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_{table}_player ON {table} (player);
"#,
            table = self.highscores
        )
    }

    /// DDL for the tic-tac-toe table; each counter defaults to zero so a
    /// first write of one counter leaves the others at 0.
    pub fn tictactoe_ddl(&self) -> String {
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {table} (
    uuid       VARCHAR(50) PRIMARY KEY,
    player     VARCHAR(50) NOT NULL,
    games_won  INTEGER NOT NULL DEFAULT 0,
    games_lost INTEGER NOT NULL DEFAULT 0,
    games_tied INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_{table}_player ON {table} (player);
"#,
            table = self.tictactoe
        )
    }
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            highscores: HIGHSCORES_TABLE.to_string(),
            tictactoe: TICTACTOE_TABLE.to_string(),
        }
    }
}

/// Initialize the database schema.
///
/// Creates both tables and their indexes if they don't exist.
pub async fn init_schema(conn: &mut SqliteConnection, tables: &Tables) -> Result<(), StorageError> {
    let highscores = tables.highscores_ddl();
    let tictactoe = tables.tictactoe_ddl();
    sqlx::query(&highscores).execute(&mut *conn).await?;
    sqlx::query(&tictactoe).execute(&mut *conn).await?;

    tracing::info!(
        highscores = %tables.highscores,
        tictactoe = %tables.tictactoe,
        "Database schema initialized"
    );
    Ok(())
}

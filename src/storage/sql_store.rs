//! Pooled relational statistics store.
//!
//! Every operation borrows one connection, runs one statement, and gives the
//! connection back before returning. Updates are single-statement upserts
//! (`INSERT ... ON CONFLICT DO UPDATE`), so concurrent writers to the same
//! player never race between an existence check and the write.

use async_trait::async_trait;

use crate::storage::StorageError;
use crate::storage::db::{ConnectionPool, PoolSettings};
use crate::storage::leaderboard::{LEADERBOARD_SIZE, Leaderboard};
use crate::storage::schema::{Tables, init_schema};
use crate::storage::store::StatsStore;
use crate::storage::types::{BackendKind, GameStat, PlayerId};

/// SQL text, rendered once for the configured table names.
#[derive(Debug, Clone)]
struct Queries {
    upsert_highscore: String,
    upsert_wins: String,
    upsert_losses: String,
    upsert_ties: String,
    highscore_by_id: String,
    highscore_by_name: String,
    leaderboard: String,
    registered_name: String,
    tables: Tables,
}

impl Queries {
    fn new(tables: Tables) -> Self {
        let hs = &tables.highscores;
        let game_upsert = |stat: GameStat| {
            let col = stat.column();
            format!(
                "INSERT INTO {t} (uuid, player, {col}) VALUES (?, ?, ?) \
                 ON CONFLICT(uuid) DO UPDATE SET player = excluded.player, {col} = excluded.{col}",
                t = tables.tictactoe
            )
        };

        Self {
            upsert_highscore: format!(
                "INSERT INTO {hs} (uuid, player, highscore) VALUES (?, ?, ?) \
                 ON CONFLICT(uuid) DO UPDATE SET player = excluded.player, highscore = excluded.highscore"
            ),
            upsert_wins: game_upsert(GameStat::Wins),
            upsert_losses: game_upsert(GameStat::Losses),
            upsert_ties: game_upsert(GameStat::Ties),
            highscore_by_id: format!("SELECT highscore FROM {hs} WHERE uuid = ?"),
            highscore_by_name: format!("SELECT highscore FROM {hs} WHERE player = ? LIMIT 1"),
            leaderboard: format!(
                "SELECT player, highscore FROM {hs} \
                 ORDER BY highscore DESC, player ASC LIMIT {LEADERBOARD_SIZE}"
            ),
            registered_name: format!(
                "SELECT EXISTS(SELECT 1 FROM {hs} WHERE player = ?1) \
                 OR EXISTS(SELECT 1 FROM {t} WHERE player = ?1)",
                t = tables.tictactoe
            ),
            tables,
        }
    }

    fn upsert_game(&self, stat: GameStat) -> &str {
        match stat {
            GameStat::Wins => &self.upsert_wins,
            GameStat::Losses => &self.upsert_losses,
            GameStat::Ties => &self.upsert_ties,
        }
    }

    fn game_stat(&self, stat: GameStat, key: &str) -> String {
        format!(
            "SELECT {col} FROM {t} WHERE {key} = ?{limit}",
            col = stat.column(),
            t = self.tables.tictactoe,
            limit = if key == "player" { " LIMIT 1" } else { "" }
        )
    }
}

/// Statistics stored in a pooled SQLite database.
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: ConnectionPool,
    queries: Queries,
}

impl SqlStore {
    pub fn new(pool: ConnectionPool, tables: Tables) -> Self {
        Self {
            pool,
            queries: Queries::new(tables),
        }
    }

    /// Open a pool on `url` and prefix every table with `table_prefix`.
    pub async fn connect(
        url: &str,
        settings: &PoolSettings,
        table_prefix: &str,
    ) -> Result<Self, StorageError> {
        let tables = Tables::with_prefix(table_prefix)?;
        let pool = ConnectionPool::connect(url, settings).await?;
        Ok(Self::new(pool, tables))
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn tables(&self) -> &Tables {
        &self.queries.tables
    }

    async fn execute_upsert(
        &self,
        sql: &str,
        id: PlayerId,
        name: &str,
        value: i64,
    ) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(sql)
            .bind(id.to_string())
            .bind(name)
            .bind(value)
            .execute(&mut *conn)
            .await;
        self.pool.finish(conn, result).map(|_| ())
    }

    async fn fetch_value(&self, sql: &str, key: &str) -> Result<Option<i64>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query_scalar::<_, i64>(sql)
            .bind(key)
            .fetch_optional(&mut *conn)
            .await;
        self.pool.finish(conn, result)
    }

    /// Single-value read, absent or failed reads become 0.
    async fn read_value(&self, op: &'static str, sql: &str, key: &str) -> i64 {
        match self.fetch_value(sql, key).await {
            Ok(value) => value.unwrap_or(0),
            Err(e) => {
                tracing::warn!(op, key, error = %e, "SQL read failed");
                0
            }
        }
    }

    async fn fetch_leaderboard(&self) -> Result<Leaderboard, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query_as::<_, (String, i64)>(&self.queries.leaderboard)
            .fetch_all(&mut *conn)
            .await;
        self.pool.finish(conn, result).map(Leaderboard::from_rows)
    }

    async fn fetch_registered(&self, name: &str) -> Result<bool, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query_scalar::<_, bool>(&self.queries.registered_name)
            .bind(name)
            .fetch_one(&mut *conn)
            .await;
        self.pool.finish(conn, result)
    }
}

#[async_trait]
impl StatsStore for SqlStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Sql
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        let result = init_schema(&mut *conn, &self.queries.tables).await;
        self.pool.release(conn);
        result
    }

    async fn update_highscore(
        &self,
        id: PlayerId,
        name: &str,
        score: i64,
    ) -> Result<(), StorageError> {
        self.execute_upsert(&self.queries.upsert_highscore, id, name, score)
            .await
            .inspect_err(|e| tracing::error!(player = %id, error = %e, "Highscore update failed"))
    }

    async fn highscore(&self, id: PlayerId) -> i64 {
        self.read_value("highscore", &self.queries.highscore_by_id, &id.to_string())
            .await
    }

    async fn highscore_by_name(&self, name: &str) -> i64 {
        self.read_value("highscore_by_name", &self.queries.highscore_by_name, name)
            .await
    }

    async fn update_game_stat(
        &self,
        stat: GameStat,
        id: PlayerId,
        name: &str,
        value: i64,
    ) -> Result<(), StorageError> {
        self.execute_upsert(self.queries.upsert_game(stat), id, name, value)
            .await
            .inspect_err(|e| {
                tracing::error!(player = %id, stat = %stat, error = %e, "Game stat update failed")
            })
    }

    async fn game_stat(&self, stat: GameStat, id: PlayerId) -> i64 {
        let sql = self.queries.game_stat(stat, "uuid");
        self.read_value("game_stat", &sql, &id.to_string()).await
    }

    async fn game_stat_by_name(&self, stat: GameStat, name: &str) -> i64 {
        let sql = self.queries.game_stat(stat, "player");
        self.read_value("game_stat_by_name", &sql, name).await
    }

    async fn leaderboard(&self) -> Leaderboard {
        self.fetch_leaderboard().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Leaderboard query failed");
            Leaderboard::default()
        })
    }

    async fn registered_name(&self, name: &str) -> bool {
        self.fetch_registered(name).await.unwrap_or_else(|e| {
            tracing::warn!(name, error = %e, "Name lookup failed");
            false
        })
    }

    async fn shutdown(&self) -> Result<(), StorageError> {
        if !self.pool.is_closed() {
            self.pool.close_all().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    async fn open(prefix: &str) -> (TempDir, SqlStore) {
        let dir = tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("stats.db").display());
        let store = SqlStore::connect(&url, &PoolSettings::default(), prefix)
            .await
            .unwrap();
        store.initialize().await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_upsert_overwrites_single_column() {
        let (_dir, store) = open("").await;
        let id = PlayerId::random();

        store.update_wins(id, "Bob", 5).await.unwrap();
        store.update_losses(id, "Bob", 2).await.unwrap();
        store.update_wins(id, "Bob", 6).await.unwrap();

        assert_eq!(store.wins(id).await, 6);
        assert_eq!(store.losses(id).await, 2);
        assert_eq!(store.ties(id).await, 0);

        let mut conn = store.pool().acquire().await.unwrap();
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tictactoe")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        store.pool().release(conn);
        assert_eq!(rows, 1);

        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_updates_name() {
        let (_dir, store) = open("").await;
        let id = PlayerId::random();

        store.update_highscore(id, "Old", 10).await.unwrap();
        store.update_highscore(id, "New", 20).await.unwrap();

        assert_eq!(store.highscore_by_name("New").await, 20);
        assert_eq!(store.highscore_by_name("Old").await, 0);
        assert!(!store.registered_name("Old").await);
        assert!(store.registered_name("New").await);

        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_leaderboard_rows_not_grouped() {
        let (_dir, store) = open("").await;
        for (name, score) in [("C", 90), ("B", 100), ("A", 100)] {
            store
                .update_highscore(PlayerId::random(), name, score)
                .await
                .unwrap();
        }

        assert_eq!(store.leaderboard().await.to_string(), "A,100>B,100>C,90");
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_leaderboard_limit() {
        let (_dir, store) = open("").await;
        for i in 0..15 {
            store
                .update_highscore(PlayerId::random(), &format!("p{i:02}"), i)
                .await
                .unwrap();
        }

        let board = store.leaderboard().await;
        assert_eq!(board.len(), LEADERBOARD_SIZE);
        assert_eq!(board.entries()[0].score, 14);
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_prefixed_store() {
        let (_dir, store) = open("lobby_").await;
        let id = PlayerId::random();
        store.update_ties(id, "Tia", 3).await.unwrap();
        assert_eq!(store.ties_by_name("Tia").await, 3);
        assert_eq!(store.tables().tictactoe, "lobby_tictactoe");
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_pool_degrades() {
        let (_dir, store) = open("").await;
        let id = PlayerId::random();
        store.update_highscore(id, "Ann", 5).await.unwrap();

        store.shutdown().await.unwrap();
        store.shutdown().await.unwrap();

        assert!(matches!(
            store.update_highscore(id, "Ann", 6).await,
            Err(StorageError::PoolClosed)
        ));
        assert_eq!(store.highscore(id).await, 0);
        assert!(store.leaderboard().await.is_empty());
        assert!(!store.registered_name("Ann").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_same_player() {
        const WRITERS: i64 = 50;

        let (_dir, store) = open("").await;
        let id = PlayerId::random();

        let tasks: Vec<_> = (0..WRITERS)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.update_wins(id, "Racer", i).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut conn = store.pool().acquire().await.unwrap();
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tictactoe WHERE uuid = ?")
            .bind(id.to_string())
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        store.pool().release(conn);
        assert_eq!(rows, 1);
        assert!((0..WRITERS).contains(&store.wins(id).await));

        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_rejects_unsafe_prefix() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("stats.db").display());
        let result = SqlStore::connect(&url, &PoolSettings::default(), "x (a); --").await;
        assert!(matches!(result, Err(StorageError::InvalidTablePrefix(_))));
    }
}

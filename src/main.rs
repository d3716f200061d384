//! Lobbystats Binary Entry Point
//!
//! Command-line access to a statistics store: inspect the leaderboard, read
//! and write individual players. Core functionality is provided by the
//! `lobbystats` library crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use lobbystats::{
    BackendKind, GameStat, PlayerId, StatsStore, StorageBuilder,
    config::{AppConfig, parse_duration},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Lobbystats - per-player game statistics
#[derive(Parser, Debug)]
#[command(name = "lobbystats", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml", env = "LOBBYSTATS_CONFIG")]
    config: PathBuf,

    /// Storage backend (overrides config file)
    #[arg(long, env = "LOBBYSTATS_BACKEND")]
    backend: Option<BackendKind>,

    /// Data directory of the file backend (overrides config file)
    #[arg(long, env = "LOBBYSTATS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Database URL (overrides config file)
    #[arg(long, env = "LOBBYSTATS_DB_URL")]
    db_url: Option<String>,

    /// Flush interval of the file backend, e.g. `30s` (overrides config file)
    #[arg(long, value_parser = parse_duration)]
    flush_interval: Option<Duration>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the highscore leaderboard
    Leaderboard,

    /// Print a player's highscore
    Highscore {
        /// Player UUID or name
        player: String,
    },

    /// Overwrite a player's highscore
    SetHighscore {
        id: PlayerId,
        name: String,
        score: i64,
    },

    /// Overwrite one tic-tac-toe counter (wins, losses or ties)
    Record {
        id: PlayerId,
        name: String,
        stat: GameStat,
        value: i64,
    },

    /// Print a player's tic-tac-toe record
    Stats {
        /// Player UUID or name
        player: String,
    },

    /// Check whether a name has been recorded
    Registered { name: String },
}

/// A player addressed on the command line.
enum Player<'a> {
    Id(PlayerId),
    Name(&'a str),
}

impl<'a> Player<'a> {
    fn parse(raw: &'a str) -> Self {
        match raw.parse() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Name(raw),
        }
    }

    async fn highscore(&self, store: &dyn StatsStore) -> i64 {
        match self {
            Self::Id(id) => store.highscore(*id).await,
            Self::Name(name) => store.highscore_by_name(name).await,
        }
    }

    async fn game_stat(&self, store: &dyn StatsStore, stat: GameStat) -> i64 {
        match self {
            Self::Id(id) => store.game_stat(stat, *id).await,
            Self::Name(name) => store.game_stat_by_name(stat, name).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lobbystats=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    let storage = &mut config.storage;
    if let Some(backend) = cli.backend {
        storage.backend = backend;
    }
    if let Some(dir) = cli.data_dir {
        storage.file.data_dir = dir;
    }
    if let Some(url) = cli.db_url {
        storage.database.url = url;
    }
    if let Some(interval) = cli.flush_interval {
        storage.file.flush_interval = interval;
    }
    config.validate()?;

    tracing::info!(backend = %config.storage.backend, "Opening storage");
    let store = StorageBuilder::new(&config.storage).build().await?;

    let outcome = run(cli.command, store.as_ref()).await;

    // Always flush and release the backend, even if the command failed
    if let Err(e) = store.shutdown().await {
        tracing::error!(error = %e, "Failed to shutdown storage");
    }

    outcome
}

fn load_config(path: &Path) -> Result<AppConfig, Box<dyn std::error::Error>> {
    if path.exists() {
        tracing::info!(path = %path.display(), "Loading configuration");
        Ok(AppConfig::load(path)?)
    } else {
        tracing::info!(path = %path.display(), "Config file not found, using defaults");
        Ok(AppConfig::default())
    }
}

async fn run(command: Command, store: &dyn StatsStore) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Leaderboard => {
            let board = store.leaderboard().await;
            if board.is_empty() {
                println!("No highscores recorded");
            }
            for entry in board.entries() {
                println!("{} - {}", entry.label(), entry.score);
            }
        }
        Command::Highscore { player } => {
            println!("{}", Player::parse(&player).highscore(store).await);
        }
        Command::SetHighscore { id, name, score } => {
            store.update_highscore(id, &name, score).await?;
            tracing::info!(player = %id, name = %name, score, "Highscore updated");
        }
        Command::Record {
            id,
            name,
            stat,
            value,
        } => {
            store.update_game_stat(stat, id, &name, value).await?;
            tracing::info!(player = %id, name = %name, stat = %stat, value, "Game stat updated");
        }
        Command::Stats { player } => {
            let player = Player::parse(&player);
            let wins = player.game_stat(store, GameStat::Wins).await;
            let losses = player.game_stat(store, GameStat::Losses).await;
            let ties = player.game_stat(store, GameStat::Ties).await;
            println!("wins: {wins}, losses: {losses}, ties: {ties}");
        }
        Command::Registered { name } => {
            println!("{}", store.registered_name(&name).await);
        }
    }
    Ok(())
}

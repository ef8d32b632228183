//! hunt-admin - administrative command line for the hunt store
//!
//! Opens (or creates) `<root>/hunt.db`, then publishes batches, replaces the
//! question bank, inspects teams, or repairs the progress-record roster.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hunt_common::config::{database_path, resolve_root_folder, HuntConfig, ROOT_FOLDER_ENV};
use hunt_common::db::init_database_with_timeout;
use hunt_coord::feed::read_batch_file;
use hunt_coord::{Coordinator, DirectoryFeed};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "hunt-admin", version, about = "Team hunt administration")]
struct Cli {
    /// Root folder holding hunt.db and hunt.toml
    #[arg(long)]
    root_folder: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database and schema if missing
    Init,
    /// Publish a single question batch from a JSON file
    Publish { file: PathBuf },
    /// Replace every question group with the batches in the feed directory
    Republish {
        #[arg(long)]
        feed_dir: Option<PathBuf>,
    },
    /// Show a team and its members
    Team { code: String },
    /// Report progress-record consistency, optionally filling gaps
    Roster {
        #[arg(long)]
        repair: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting hunt-admin v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cli = Cli::parse();

    let root_folder = resolve_root_folder(cli.root_folder.as_deref(), ROOT_FOLDER_ENV);
    info!("Root folder: {}", root_folder.display());

    let config = HuntConfig::load(&root_folder).context("loading hunt.toml")?;
    let db_path = database_path(&root_folder);
    let pool = init_database_with_timeout(&db_path, config.max_lock_wait_ms)
        .await
        .with_context(|| format!("opening database {}", db_path.display()))?;

    let coordinator = Coordinator::new(pool, config);
    let outcome = run(&coordinator, cli.command, &root_folder).await;
    coordinator.close().await;
    outcome
}

async fn run(coordinator: &Coordinator, command: Command, root_folder: &std::path::Path) -> Result<()> {
    match command {
        Command::Init => {
            info!("Database ready");
        }
        Command::Publish { file } => {
            let batch = read_batch_file(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let group = coordinator.publish(&batch).await?;
            println!("{}", serde_json::to_string_pretty(&group)?);
        }
        Command::Republish { feed_dir } => {
            let dir = feed_dir.unwrap_or_else(|| coordinator.config().feed_dir(root_folder));
            let feed = DirectoryFeed::new(dir);
            info!("Republishing from {}", feed.dir().display());
            let summary = coordinator.republish_all(&feed).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Team { code } => {
            let team = coordinator.find_team_by_code(&code).await?;
            println!("{}", serde_json::to_string_pretty(&team)?);
        }
        Command::Roster { repair } => {
            if repair {
                let inserted = coordinator.resync_roster().await?;
                info!("Inserted {} missing progress records", inserted);
            }
            let audit = coordinator.audit_roster().await?;
            println!("{}", serde_json::to_string_pretty(&audit)?);
        }
    }
    Ok(())
}

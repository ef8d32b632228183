//! Database initialization
//!
//! Opens (creating if needed) the SQLite store and applies the schema. Every
//! statement is idempotent, so this runs on each process start.

use crate::config::DEFAULT_LOCK_WAIT_MS;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    init_database_with_timeout(db_path, DEFAULT_LOCK_WAIT_MS).await
}

/// [`init_database`] with an explicit SQLite busy timeout
///
/// Callers pass `HuntConfig::max_lock_wait_ms` so one blocked statement never
/// waits longer than the retry budget of the transaction around it.
pub async fn init_database_with_timeout(db_path: &Path, busy_timeout_ms: u64) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas go on the connect options so every pooled connection gets them,
    // not just the one that happens to run a PRAGMA statement.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_users_table(pool).await?;
    create_teams_table(pool).await?;
    create_question_groups_table(pool).await?;
    create_questions_table(pool).await?;
    create_progress_records_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the users table
///
/// `team_join_seq` orders members by attachment so leader succession is
/// deterministic. It is only meaningful while `team_id` is set.
async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            picture TEXT NOT NULL DEFAULT '',
            team_id TEXT REFERENCES teams(id) ON DELETE SET NULL,
            team_join_seq INTEGER,
            team_joined_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_team ON users(team_id, team_join_seq)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_teams_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            leader_id TEXT NOT NULL REFERENCES users(id),
            points INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_question_groups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS question_groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            is_sequence INTEGER NOT NULL DEFAULT 0,
            number_of_questions INTEGER NOT NULL,
            phase INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (number_of_questions > 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the questions table
///
/// Only the salted answer hash is stored.
async fn create_questions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL REFERENCES question_groups(id) ON DELETE CASCADE,
            sequence_index INTEGER NOT NULL,
            prompt TEXT NOT NULL,
            answer_hash TEXT NOT NULL,
            hint TEXT,
            hint_cost INTEGER,
            UNIQUE (group_id, sequence_index),
            CHECK (sequence_index > 0),
            CHECK (hint_cost IS NULL OR hint_cost >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the progress_records table
///
/// The composite primary key is what makes roster synchronization idempotent.
async fn create_progress_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS progress_records (
            team_id TEXT NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            question_group_id TEXT NOT NULL REFERENCES question_groups(id) ON DELETE CASCADE,
            completed_count INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (team_id, question_group_id),
            CHECK (completed_count >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_progress_question_group ON progress_records(question_group_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

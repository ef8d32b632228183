//! Roster synchronization
//!
//! Keeps `progress_records` equal to the cross product of teams and question
//! groups. Each trigger is a single set-based insert that skips pairs already
//! present via the `(team_id, question_group_id)` key, so concurrent or
//! repeated calls never duplicate rows and never need a read-then-write check.

use hunt_common::Result;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

/// Create a zeroed progress record for `team_id` against every question group
///
/// Returns the number of records actually inserted.
pub async fn sync_team(conn: &mut SqliteConnection, team_id: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO progress_records (team_id, question_group_id, completed_count)
        SELECT ?, id, 0 FROM question_groups WHERE true
        ON CONFLICT (team_id, question_group_id) DO NOTHING
        "#,
    )
    .bind(team_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Create a zeroed progress record for every team against `question_group_id`
pub async fn sync_question_group(conn: &mut SqliteConnection, question_group_id: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO progress_records (team_id, question_group_id, completed_count)
        SELECT id, ?, 0 FROM teams WHERE true
        ON CONFLICT (team_id, question_group_id) DO NOTHING
        "#,
    )
    .bind(question_group_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Fill in any missing pair across the whole store
pub async fn sync_all(conn: &mut SqliteConnection) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO progress_records (team_id, question_group_id, completed_count)
        SELECT t.id, g.id, 0 FROM teams t CROSS JOIN question_groups g WHERE true
        ON CONFLICT (team_id, question_group_id) DO NOTHING
        "#,
    )
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Counts describing how far the store is from the full cross product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RosterAudit {
    pub teams: i64,
    pub question_groups: i64,
    pub progress_records: i64,
    pub missing_pairs: i64,
}

impl RosterAudit {
    pub fn is_consistent(&self) -> bool {
        self.missing_pairs == 0 && self.progress_records == self.teams * self.question_groups
    }
}

pub async fn audit(pool: &SqlitePool) -> Result<RosterAudit> {
    let mut tx = pool.begin().await?;

    let teams: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teams")
        .fetch_one(&mut *tx)
        .await?;
    let question_groups: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM question_groups")
        .fetch_one(&mut *tx)
        .await?;
    let progress_records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM progress_records")
        .fetch_one(&mut *tx)
        .await?;
    let missing_pairs: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM teams t CROSS JOIN question_groups g
        WHERE NOT EXISTS (
            SELECT 1 FROM progress_records p
            WHERE p.team_id = t.id AND p.question_group_id = g.id
        )
        "#,
    )
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(RosterAudit {
        teams,
        question_groups,
        progress_records,
        missing_pairs,
    })
}

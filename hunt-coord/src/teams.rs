//! Team lifecycle: create, join, leave, lookup
//!
//! Every operation is one transaction, retried whole on lock contention.
//! Membership lives on `users.team_id`; `users.team_join_seq` orders members
//! so leader succession always picks the longest-standing remaining member.

use crate::code_gen::{generate_code, normalize_code};
use crate::roster;
use crate::utils::retry_on_lock;
use hunt_common::config::HuntConfig;
use hunt_common::db::{Team, TeamWithMembers, User};
use hunt_common::{Conflict, Error, Result};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, picture, team_id, team_join_seq";
const TEAM_COLUMNS: &str = "id, code, name, leader_id, points";

/// What happened to the team when a member left
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LeaveOutcome {
    /// Member removed, leadership unchanged
    Detached { team_id: String },
    /// Leader removed, next-oldest member promoted
    LeadershipTransferred { team_id: String, new_leader_id: String },
    /// Last member removed, team and its progress records deleted
    TeamDissolved { team_id: String, code: String },
}

/// Create a team led by `leader_id` and give it a progress record per question group
pub async fn create_team(
    pool: &SqlitePool,
    config: &HuntConfig,
    team_name: &str,
    leader_id: &str,
) -> Result<Team> {
    let team_name = team_name.trim();
    if team_name.is_empty() {
        return Err(Error::InvalidInput("team name must not be empty".to_string()));
    }

    retry_on_lock("create_team", config.max_lock_wait_ms, || {
        create_team_once(pool, config, team_name, leader_id)
    })
    .await
}

async fn create_team_once(
    pool: &SqlitePool,
    config: &HuntConfig,
    team_name: &str,
    leader_id: &str,
) -> Result<Team> {
    let mut tx = pool.begin().await?;

    let user = fetch_user(&mut tx, leader_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("user {}", leader_id)))?;
    if user.team_id.is_some() {
        return Err(Conflict::AlreadyInTeam.into());
    }

    let team_id = Uuid::new_v4().to_string();
    let code = insert_team_with_fresh_code(
        &mut tx,
        &team_id,
        team_name,
        leader_id,
        config.max_code_attempts,
        || generate_code(config.code_length),
    )
    .await?;

    if !attach_user(&mut tx, &team_id, leader_id, config.max_participants).await? {
        return Err(Conflict::AlreadyInTeam.into());
    }

    let synced = roster::sync_team(&mut tx, &team_id).await?;

    tx.commit().await?;

    info!(
        team_id = %team_id,
        code = %code,
        leader = %leader_id,
        progress_records = synced,
        "Team created"
    );

    Ok(Team {
        id: team_id,
        code,
        name: team_name.to_string(),
        leader_id: leader_id.to_string(),
        points: 0,
    })
}

/// Insert the team row, regenerating the code on a uniqueness clash
///
/// A failed INSERT in SQLite leaves the surrounding transaction usable, so
/// the retry happens in place.
async fn insert_team_with_fresh_code<G>(
    conn: &mut SqliteConnection,
    team_id: &str,
    team_name: &str,
    leader_id: &str,
    max_attempts: u32,
    mut next_code: G,
) -> Result<String>
where
    G: FnMut() -> String,
{
    for attempt in 1..=max_attempts {
        let code = next_code();
        match try_insert_team(conn, team_id, &code, team_name, leader_id).await {
            Ok(()) => return Ok(code),
            Err(Error::Conflict(Conflict::CodeCollision)) => {
                debug!(attempt, "Team code collision, regenerating");
            }
            Err(e) => return Err(e),
        }
    }

    Err(Error::Internal(format!(
        "could not allocate a unique team code after {} attempts",
        max_attempts
    )))
}

async fn try_insert_team(
    conn: &mut SqliteConnection,
    team_id: &str,
    code: &str,
    team_name: &str,
    leader_id: &str,
) -> Result<()> {
    let result = sqlx::query("INSERT INTO teams (id, code, name, leader_id) VALUES (?, ?, ?, ?)")
        .bind(team_id)
        .bind(code)
        .bind(team_name)
        .bind(leader_id)
        .execute(&mut *conn)
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err))
            if db_err.is_unique_violation() && db_err.message().contains("teams.code") =>
        {
            Err(Conflict::CodeCollision.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Attach `user_id` to the team identified by `team_code`
///
/// Checks run in a fixed order so the caller gets the most useful error:
/// unknown code, then the caller's own membership, then capacity.
pub async fn join_team(
    pool: &SqlitePool,
    config: &HuntConfig,
    team_code: &str,
    user_id: &str,
) -> Result<User> {
    let code = normalize_code(team_code);

    retry_on_lock("join_team", config.max_lock_wait_ms, || {
        join_team_once(pool, config, &code, user_id)
    })
    .await
}

async fn join_team_once(
    pool: &SqlitePool,
    config: &HuntConfig,
    code: &str,
    user_id: &str,
) -> Result<User> {
    let capacity = config.max_participants;
    let mut tx = pool.begin().await?;

    let team = fetch_team_by_code(&mut tx, code)
        .await?
        .ok_or_else(|| Error::TeamNotFound(code.to_string()))?;

    let user = fetch_user(&mut tx, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;
    if user.team_id.is_some() {
        return Err(Conflict::AlreadyInTeam.into());
    }

    if member_count(&mut tx, &team.id).await? >= i64::from(capacity) {
        return Err(Conflict::TeamFull { capacity }.into());
    }

    // The UPDATE re-checks both conditions itself, so the reads above are
    // only for error reporting and cannot let a stale count through.
    if !attach_user(&mut tx, &team.id, user_id, capacity).await? {
        let current = fetch_user(&mut tx, user_id).await?;
        return Err(match current.and_then(|u| u.team_id) {
            Some(_) => Conflict::AlreadyInTeam.into(),
            None => Conflict::TeamFull { capacity }.into(),
        });
    }

    let joined = fetch_user(&mut tx, user_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("user {} vanished during join", user_id)))?;

    tx.commit().await?;

    info!(team_id = %team.id, code = %team.code, user = %user_id, "User joined team");

    Ok(joined)
}

/// Remove `user_id` from their team, promoting or dissolving as needed
pub async fn leave_team(pool: &SqlitePool, config: &HuntConfig, user_id: &str) -> Result<LeaveOutcome> {
    retry_on_lock("leave_team", config.max_lock_wait_ms, || {
        leave_team_once(pool, user_id)
    })
    .await
}

async fn leave_team_once(pool: &SqlitePool, user_id: &str) -> Result<LeaveOutcome> {
    let mut tx = pool.begin().await?;

    let user = fetch_user(&mut tx, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;
    let team_id = user.team_id.ok_or(Conflict::NotInTeam)?;

    let team = fetch_team_by_id(&mut tx, &team_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("user {} references missing team {}", user_id, team_id)))?;
    let members = fetch_members(&mut tx, &team_id).await?;
    let successor = members.iter().find(|m| m.id != user_id).map(|m| m.id.clone());

    detach_user(&mut tx, user_id).await?;

    let outcome = match successor {
        None => {
            sqlx::query("DELETE FROM teams WHERE id = ?")
                .bind(&team_id)
                .execute(&mut *tx)
                .await?;
            LeaveOutcome::TeamDissolved {
                team_id,
                code: team.code.clone(),
            }
        }
        Some(new_leader_id) if team.is_leader(user_id) => {
            sqlx::query("UPDATE teams SET leader_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
                .bind(&new_leader_id)
                .bind(&team_id)
                .execute(&mut *tx)
                .await?;
            LeaveOutcome::LeadershipTransferred {
                team_id,
                new_leader_id,
            }
        }
        Some(_) => LeaveOutcome::Detached { team_id },
    };

    tx.commit().await?;

    match &outcome {
        LeaveOutcome::Detached { team_id } => {
            info!(team_id = %team_id, user = %user_id, "User left team");
        }
        LeaveOutcome::LeadershipTransferred { team_id, new_leader_id } => {
            info!(
                team_id = %team_id,
                user = %user_id,
                new_leader = %new_leader_id,
                "Leader left team, leadership transferred"
            );
        }
        LeaveOutcome::TeamDissolved { team_id, code } => {
            info!(team_id = %team_id, code = %code, user = %user_id, "Last member left, team dissolved");
        }
    }

    Ok(outcome)
}

/// Look up a team and its members (oldest membership first)
pub async fn find_team_by_code(pool: &SqlitePool, team_code: &str) -> Result<TeamWithMembers> {
    let code = normalize_code(team_code);
    let mut tx = pool.begin().await?;

    let team = fetch_team_by_code(&mut tx, &code)
        .await?
        .ok_or_else(|| Error::TeamNotFound(code.clone()))?;
    let members = fetch_members(&mut tx, &team.id).await?;

    tx.commit().await?;

    Ok(TeamWithMembers { team, members })
}

/// Conditionally attach a teamless user to a team that still has room
///
/// Returns false when either condition no longer holds. The join sequence is
/// one past the newest current member, which keeps relative order stable.
async fn attach_user(
    conn: &mut SqliteConnection,
    team_id: &str,
    user_id: &str,
    capacity: u32,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET team_id = ?,
            team_join_seq = (SELECT COALESCE(MAX(team_join_seq), 0) + 1 FROM users WHERE team_id = ?),
            team_joined_at = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
          AND team_id IS NULL
          AND (SELECT COUNT(*) FROM users WHERE team_id = ?) < ?
        "#,
    )
    .bind(team_id)
    .bind(team_id)
    .bind(chrono::Utc::now())
    .bind(user_id)
    .bind(team_id)
    .bind(i64::from(capacity))
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

async fn detach_user(conn: &mut SqliteConnection, user_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET team_id = NULL, team_join_seq = NULL, team_joined_at = NULL, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn fetch_user(conn: &mut SqliteConnection, user_id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(user)
}

async fn fetch_team_by_code(conn: &mut SqliteConnection, code: &str) -> Result<Option<Team>> {
    let team = sqlx::query_as::<_, Team>(&format!("SELECT {} FROM teams WHERE code = ?", TEAM_COLUMNS))
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(team)
}

async fn fetch_team_by_id(conn: &mut SqliteConnection, team_id: &str) -> Result<Option<Team>> {
    let team = sqlx::query_as::<_, Team>(&format!("SELECT {} FROM teams WHERE id = ?", TEAM_COLUMNS))
        .bind(team_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(team)
}

async fn fetch_members(conn: &mut SqliteConnection, team_id: &str) -> Result<Vec<User>> {
    let members = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE team_id = ? ORDER BY team_join_seq ASC, team_joined_at ASC",
        USER_COLUMNS
    ))
    .bind(team_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(members)
}

async fn member_count(conn: &mut SqliteConnection, team_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE team_id = ?")
        .bind(team_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

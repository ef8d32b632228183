//! Shared fixtures for hunt-coord integration tests

#![allow(dead_code)]

use hunt_common::config::HuntConfig;
use hunt_common::db::{init_database_with_timeout, QuestionGroupInput, QuestionInput};
use hunt_coord::identity::{provision_user, VerifiedIdentity};
use hunt_coord::Coordinator;
use tempfile::TempDir;

/// A coordinator over a fresh file-backed database
///
/// Keep the `TempDir` alive for the duration of the test.
pub async fn setup() -> (TempDir, Coordinator) {
    setup_with_config(HuntConfig::default()).await
}

pub async fn setup_with_config(config: HuntConfig) -> (TempDir, Coordinator) {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database_with_timeout(&temp_dir.path().join("hunt.db"), config.max_lock_wait_ms)
        .await
        .unwrap();
    (temp_dir, Coordinator::new(pool, config))
}

pub fn identity(id: &str) -> VerifiedIdentity {
    VerifiedIdentity {
        subject_id: id.to_string(),
        email: format!("{}@example.com", id),
        display_name: id.to_string(),
        picture_url: format!("https://example.com/{}.png", id),
    }
}

/// Create users as if they had authenticated once
pub async fn add_users(coordinator: &Coordinator, ids: &[&str]) {
    for id in ids {
        provision_user(coordinator.pool(), &identity(id)).await.unwrap();
    }
}

pub fn batch(name: &str, answers: &[&str]) -> QuestionGroupInput {
    QuestionGroupInput {
        name: name.to_string(),
        description: format!("{} description", name),
        is_sequence: true,
        number_of_questions: answers.len() as u32,
        phase: 1,
        questions: answers
            .iter()
            .enumerate()
            .map(|(i, answer)| QuestionInput {
                prompt: format!("{} question {}", name, i + 1),
                answer: answer.to_string(),
                hint: Some("think harder".to_string()),
                hint_cost: Some(50),
            })
            .collect(),
    }
}

pub async fn count(coordinator: &Coordinator, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(coordinator.pool())
        .await
        .unwrap()
}

pub async fn progress_for_team(coordinator: &Coordinator, team_id: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM progress_records WHERE team_id = ?")
        .bind(team_id)
        .fetch_one(coordinator.pool())
        .await
        .unwrap()
}

/// Assert every membership and roster invariant over the whole store
pub async fn assert_invariants(coordinator: &Coordinator) {
    let capacity = i64::from(coordinator.config().max_participants);
    let pool = coordinator.pool();

    let bad_sizes: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM teams t
        WHERE (SELECT COUNT(*) FROM users u WHERE u.team_id = t.id) NOT BETWEEN 1 AND ?
        "#,
    )
    .bind(capacity)
    .fetch_one(pool)
    .await
    .unwrap();
    assert_eq!(bad_sizes, 0, "every team must have between 1 and {} members", capacity);

    let leaders_outside: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM teams t
        WHERE NOT EXISTS (SELECT 1 FROM users u WHERE u.id = t.leader_id AND u.team_id = t.id)
        "#,
    )
    .fetch_one(pool)
    .await
    .unwrap();
    assert_eq!(leaders_outside, 0, "every leader must be a member of their team");

    let dangling_users: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM users u
        WHERE u.team_id IS NOT NULL AND NOT EXISTS (SELECT 1 FROM teams t WHERE t.id = u.team_id)
        "#,
    )
    .fetch_one(pool)
    .await
    .unwrap();
    assert_eq!(dangling_users, 0, "users must only reference existing teams");

    let audit = coordinator.audit_roster().await.unwrap();
    assert!(audit.is_consistent(), "roster out of sync: {:?}", audit);
}

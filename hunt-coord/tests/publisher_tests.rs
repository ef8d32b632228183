//! Integration tests for question publication, roster fan-out and republish

mod helpers;

use helpers::*;
use hunt_common::answer::verify_answer;
use hunt_common::config::HuntConfig;
use hunt_common::{AnswerPolicy, Error};
use hunt_coord::roster;
use hunt_coord::StaticFeed;

async fn stored_hashes(coordinator: &hunt_coord::Coordinator) -> Vec<String> {
    sqlx::query_scalar("SELECT answer_hash FROM questions ORDER BY sequence_index")
        .fetch_all(coordinator.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_publish_fans_out_to_existing_teams() {
    let (_dir, coordinator) = setup().await;
    add_users(&coordinator, &["l1", "l2", "l3"]).await;
    for leader in ["l1", "l2", "l3"] {
        coordinator.create_team(&format!("Team {}", leader), leader).await.unwrap();
    }

    let group = coordinator.publish(&batch("Round 1", &["a", "b", "c"])).await.unwrap();

    assert_eq!(group.number_of_questions, 3);
    assert!(group.is_sequence);
    let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM progress_records WHERE question_group_id = ?")
        .bind(&group.id)
        .fetch_one(coordinator.pool())
        .await
        .unwrap();
    assert_eq!(records, 3);
    assert_eq!(count(&coordinator, "questions").await, 3);
    assert_invariants(&coordinator).await;
}

#[tokio::test]
async fn test_invalid_batch_publishes_nothing() {
    let (_dir, coordinator) = setup().await;
    let mut bad = batch("Broken", &["a", "b"]);
    bad.number_of_questions = 5;

    let result = coordinator.publish(&bad).await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert_eq!(count(&coordinator, "question_groups").await, 0);
    assert_eq!(count(&coordinator, "questions").await, 0);
}

#[tokio::test]
async fn test_answers_stored_only_as_hashes_case_insensitive_policy() {
    let (_dir, coordinator) = setup().await;
    coordinator.publish(&batch("Capitals", &["PARIS"])).await.unwrap();

    let hashes = stored_hashes(&coordinator).await;
    assert_eq!(hashes.len(), 1);
    assert!(!hashes[0].to_lowercase().contains("paris"), "plaintext leaked into storage");
    assert!(
        hashes[0].starts_with("$argon2id$"),
        "answers must use a slow password hash: {}",
        hashes[0]
    );

    let policy = coordinator.config().answer_policy;
    assert_eq!(policy, AnswerPolicy::CaseInsensitive);
    assert!(verify_answer(&hashes[0], "paris", policy));
    assert!(verify_answer(&hashes[0], "PARIS", policy));
    assert!(!verify_answer(&hashes[0], "london", policy));
}

#[tokio::test]
async fn test_exact_policy_does_not_match_other_case() {
    let config = HuntConfig {
        answer_policy: AnswerPolicy::Exact,
        ..HuntConfig::default()
    };
    let (_dir, coordinator) = setup_with_config(config).await;
    coordinator.publish(&batch("Capitals", &["PARIS"])).await.unwrap();

    let hashes = stored_hashes(&coordinator).await;
    assert!(verify_answer(&hashes[0], "PARIS", AnswerPolicy::Exact));
    assert!(!verify_answer(&hashes[0], "paris", AnswerPolicy::Exact));
}

#[tokio::test]
async fn test_roster_sync_is_idempotent() {
    let (_dir, coordinator) = setup().await;
    add_users(&coordinator, &["l1", "l2"]).await;
    let team = coordinator.create_team("One", "l1").await.unwrap();
    coordinator.create_team("Two", "l2").await.unwrap();
    let group = coordinator.publish(&batch("Round 1", &["a"])).await.unwrap();
    let before = count(&coordinator, "progress_records").await;

    let mut tx = coordinator.pool().begin().await.unwrap();
    assert_eq!(roster::sync_team(&mut tx, &team.id).await.unwrap(), 0);
    assert_eq!(roster::sync_question_group(&mut tx, &group.id).await.unwrap(), 0);
    tx.commit().await.unwrap();

    assert_eq!(count(&coordinator, "progress_records").await, before);
    assert_eq!(coordinator.resync_roster().await.unwrap(), 0);
    assert_invariants(&coordinator).await;
}

#[tokio::test]
async fn test_resync_fills_missing_pairs() {
    let (_dir, coordinator) = setup().await;
    add_users(&coordinator, &["l1"]).await;
    coordinator.create_team("One", "l1").await.unwrap();
    coordinator.publish(&batch("Round 1", &["a"])).await.unwrap();
    coordinator.publish(&batch("Round 2", &["b"])).await.unwrap();

    sqlx::query("DELETE FROM progress_records")
        .execute(coordinator.pool())
        .await
        .unwrap();
    assert_eq!(coordinator.audit_roster().await.unwrap().missing_pairs, 2);

    assert_eq!(coordinator.resync_roster().await.unwrap(), 2);
    assert_invariants(&coordinator).await;
}

#[tokio::test]
async fn test_republish_replaces_bank_and_resets_points() {
    let (_dir, coordinator) = setup().await;
    add_users(&coordinator, &["l1", "l2"]).await;
    let team = coordinator.create_team("One", "l1").await.unwrap();
    coordinator.create_team("Two", "l2").await.unwrap();
    coordinator.publish(&batch("Old 1", &["a", "b"])).await.unwrap();
    coordinator.publish(&batch("Old 2", &["c"])).await.unwrap();

    sqlx::query("UPDATE teams SET points = 120")
        .execute(coordinator.pool())
        .await
        .unwrap();
    sqlx::query("UPDATE progress_records SET completed_count = 1 WHERE team_id = ?")
        .bind(&team.id)
        .execute(coordinator.pool())
        .await
        .unwrap();

    let feed = StaticFeed::new(vec![
        batch("New 1", &["x"]),
        batch("New 2", &["y", "z"]),
        batch("New 3", &["p", "q", "r"]),
    ]);
    let summary = coordinator.republish_all(&feed).await.unwrap();

    assert_eq!(summary.question_groups, 3);
    assert_eq!(summary.questions, 6);
    assert_eq!(summary.progress_records, 6);
    assert_eq!(summary.teams_reset, 2);
    assert_eq!(count(&coordinator, "question_groups").await, 3);
    assert_eq!(count(&coordinator, "questions").await, 6);
    assert_eq!(count(&coordinator, "progress_records").await, 6);

    let points: Vec<i64> = sqlx::query_scalar("SELECT points FROM teams")
        .fetch_all(coordinator.pool())
        .await
        .unwrap();
    assert!(points.iter().all(|p| *p == 0), "points not reset: {:?}", points);

    let progressed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM progress_records WHERE completed_count <> 0")
        .fetch_one(coordinator.pool())
        .await
        .unwrap();
    assert_eq!(progressed, 0);
    assert_invariants(&coordinator).await;
}

#[tokio::test]
async fn test_republish_with_bad_batch_keeps_previous_bank() {
    let (_dir, coordinator) = setup().await;
    add_users(&coordinator, &["l1"]).await;
    coordinator.create_team("One", "l1").await.unwrap();
    let old = coordinator.publish(&batch("Old", &["a"])).await.unwrap();

    let mut broken = batch("Broken", &["x"]);
    broken.questions[0].answer = String::new();
    let feed = StaticFeed::new(vec![batch("Fine", &["y"]), broken]);

    let result = coordinator.republish_all(&feed).await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM question_groups")
        .fetch_all(coordinator.pool())
        .await
        .unwrap();
    assert_eq!(ids, vec![old.id]);
    assert_invariants(&coordinator).await;
}

#[tokio::test]
async fn test_republish_from_empty_feed_clears_bank() {
    let (_dir, coordinator) = setup().await;
    add_users(&coordinator, &["l1"]).await;
    coordinator.create_team("One", "l1").await.unwrap();
    coordinator.publish(&batch("Old", &["a"])).await.unwrap();

    let summary = coordinator.republish_all(&StaticFeed::default()).await.unwrap();

    assert_eq!(summary.question_groups, 0);
    assert_eq!(summary.progress_records, 0);
    assert_eq!(count(&coordinator, "teams").await, 1);
    assert_invariants(&coordinator).await;
}

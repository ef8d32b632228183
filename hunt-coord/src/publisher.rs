//! Question bank publication
//!
//! A batch becomes visible together with its questions and its progress
//! records, or not at all. Answers are hashed before any database work so a
//! retried transaction reuses the same hashes.

use crate::feed::QuestionFeed;
use crate::roster;
use crate::utils::retry_on_lock;
use hunt_common::answer::hash_answer;
use hunt_common::config::HuntConfig;
use hunt_common::db::{QuestionGroup, QuestionGroupInput};
use hunt_common::{AnswerPolicy, Error, Result};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

/// A question ready for storage
struct HashedQuestion {
    sequence_index: i64,
    prompt: String,
    answer_hash: String,
    hint: Option<String>,
    hint_cost: Option<i64>,
}

/// Counts after a full republish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepublishSummary {
    pub question_groups: i64,
    pub questions: i64,
    pub progress_records: i64,
    pub teams_reset: u64,
}

/// Publish one batch and fan out progress records to every existing team
pub async fn publish(pool: &SqlitePool, config: &HuntConfig, input: &QuestionGroupInput) -> Result<QuestionGroup> {
    validate_batch(input)?;
    let hashed = hash_questions(input, config.answer_policy).await?;
    let hashed = &hashed;

    retry_on_lock("publish", config.max_lock_wait_ms, || async move {
        let mut tx = pool.begin().await?;
        let group = insert_batch(&mut tx, input, hashed).await?;
        tx.commit().await?;
        Ok(group)
    })
    .await
}

/// Replace the whole question bank with the contents of `feed`
///
/// Clears questions, question groups and progress records, zeroes every
/// team's points, then publishes each batch in feed order. The feed is read
/// and validated up front and the replacement runs as one transaction, so a
/// bad batch leaves the previous bank untouched. Callers must hold the
/// maintenance gate exclusively.
pub async fn republish_all(
    pool: &SqlitePool,
    config: &HuntConfig,
    feed: &dyn QuestionFeed,
) -> Result<RepublishSummary> {
    let batches = feed.fetch_batches().await?;
    info!(feed = feed.name(), batches = batches.len(), "Fetched question feed");

    for batch in &batches {
        validate_batch(batch)?;
    }
    let mut prepared = Vec::with_capacity(batches.len());
    for batch in &batches {
        prepared.push((batch, hash_questions(batch, config.answer_policy).await?));
    }
    let prepared = &prepared;

    let summary = retry_on_lock("republish_all", config.max_lock_wait_ms, || async move {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM questions").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM progress_records").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM question_groups").execute(&mut *tx).await?;
        let teams_reset = sqlx::query("UPDATE teams SET points = 0, updated_at = CURRENT_TIMESTAMP")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for (batch, hashed) in prepared {
            insert_batch(&mut tx, batch, hashed).await?;
        }

        let question_groups: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM question_groups")
            .fetch_one(&mut *tx)
            .await?;
        let questions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(&mut *tx)
            .await?;
        let progress_records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM progress_records")
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(RepublishSummary {
            question_groups,
            questions,
            progress_records,
            teams_reset,
        })
    })
    .await?;

    info!(
        question_groups = summary.question_groups,
        questions = summary.questions,
        progress_records = summary.progress_records,
        teams_reset = summary.teams_reset,
        "Question bank republished"
    );

    Ok(summary)
}

async fn insert_batch(
    conn: &mut SqliteConnection,
    input: &QuestionGroupInput,
    hashed: &[HashedQuestion],
) -> Result<QuestionGroup> {
    let group = QuestionGroup {
        id: Uuid::new_v4().to_string(),
        name: input.name.trim().to_string(),
        description: input.description.clone(),
        is_sequence: input.is_sequence,
        number_of_questions: i64::from(input.number_of_questions),
        phase: i64::from(input.phase),
    };

    sqlx::query(
        r#"
        INSERT INTO question_groups (id, name, description, is_sequence, number_of_questions, phase)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&group.id)
    .bind(&group.name)
    .bind(&group.description)
    .bind(group.is_sequence)
    .bind(group.number_of_questions)
    .bind(group.phase)
    .execute(&mut *conn)
    .await?;

    for question in hashed {
        sqlx::query(
            r#"
            INSERT INTO questions (id, group_id, sequence_index, prompt, answer_hash, hint, hint_cost)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&group.id)
        .bind(question.sequence_index)
        .bind(&question.prompt)
        .bind(&question.answer_hash)
        .bind(&question.hint)
        .bind(question.hint_cost)
        .execute(&mut *conn)
        .await?;
    }

    let synced = roster::sync_question_group(conn, &group.id).await?;

    info!(
        question_group = %group.id,
        name = %group.name,
        questions = hashed.len(),
        progress_records = synced,
        "Question group published"
    );

    Ok(group)
}

/// Hash every answer in the batch on the blocking pool
async fn hash_questions(input: &QuestionGroupInput, policy: AnswerPolicy) -> Result<Vec<HashedQuestion>> {
    let questions = input.questions.clone();

    tokio::task::spawn_blocking(move || {
        questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| {
                Ok(HashedQuestion {
                    sequence_index: i as i64 + 1,
                    prompt: q.prompt.trim().to_string(),
                    answer_hash: hash_answer(&q.answer, policy)?,
                    hint: q.hint,
                    hint_cost: q.hint_cost.map(i64::from),
                })
            })
            .collect::<Result<Vec<_>>>()
    })
    .await
    .map_err(|e| Error::Internal(format!("answer hashing task failed: {}", e)))?
}

fn validate_batch(input: &QuestionGroupInput) -> Result<()> {
    if input.name.trim().is_empty() {
        return Err(Error::InvalidInput("question group name must not be empty".to_string()));
    }
    if input.questions.is_empty() {
        return Err(Error::InvalidInput(format!(
            "question group '{}' has no questions",
            input.name
        )));
    }
    if input.number_of_questions as usize != input.questions.len() {
        return Err(Error::InvalidInput(format!(
            "question group '{}' declares {} questions but supplies {}",
            input.name,
            input.number_of_questions,
            input.questions.len()
        )));
    }
    for (i, q) in input.questions.iter().enumerate() {
        if q.prompt.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "question {} of '{}' has an empty prompt",
                i + 1,
                input.name
            )));
        }
        if q.answer.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "question {} of '{}' has an empty answer",
                i + 1,
                input.name
            )));
        }
    }
    Ok(())
}

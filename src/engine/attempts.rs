// src/engine/attempts.rs

//! Attempt lifecycle: none -> started -> completed, one row per
//! (quiz, participant). Idempotency rests on the unique constraints of
//! `daily_quiz_attempts` and `daily_quiz_answers`.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sqlx::{PgConnection, PgPool};

use crate::{
    engine::{
        leaderboard::rank_in_week,
        scoring::{Classification, percentage},
    },
    error::AppError,
    models::attempt::{AnswerResult, Attempt, CompletionResult},
};

const ATTEMPT_COLUMNS: &str = "id, quiz_id, participant_id, display_name, email, started_at, \
     completed_at, score, percentage, classification, elapsed_seconds, completion_rank";

/// Who is starting an attempt.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
}

/// Answer submission for one question position.
#[derive(Debug, Clone, Copy)]
pub struct AnswerSubmission {
    pub question_index: i32,
    pub selected_index: Option<i32>,
    pub time_spent: i32,
}

#[derive(sqlx::FromRow)]
struct PositionKey {
    question_id: i64,
    correct_index: i32,
    option_count: i32,
}

/// Starts an attempt, or returns the in-progress one.
///
/// Returns `(attempt, resumed)`. Fails with `AlreadyCompleted` when the
/// participant already finished this quiz.
pub async fn start_attempt(
    pool: &PgPool,
    quiz_id: i64,
    participant: &Participant,
    now: DateTime<Utc>,
) -> Result<(Attempt, bool), AppError> {
    let mut tx = pool.begin().await?;

    // Shared lock: curation holds this row exclusively while it checks for attempts.
    sqlx::query("SELECT id FROM daily_quizzes WHERE id = $1 FOR SHARE")
        .bind(quiz_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    let inserted = sqlx::query_as::<_, Attempt>(&format!(
        r#"
        INSERT INTO daily_quiz_attempts (quiz_id, participant_id, display_name, email, started_at, score)
        VALUES ($1, $2, $3, $4, $5, 0)
        ON CONFLICT (quiz_id, participant_id) DO NOTHING
        RETURNING {ATTEMPT_COLUMNS}
        "#
    ))
    .bind(quiz_id)
    .bind(&participant.id)
    .bind(&participant.display_name)
    .bind(&participant.email)
    .bind(now)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to insert attempt: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if let Some(attempt) = inserted {
        tx.commit().await?;
        tracing::info!(quiz_id, participant = %participant.id, attempt_id = attempt.id, "Attempt started");
        return Ok((attempt, false));
    }

    let existing = fetch_attempt(&mut tx, quiz_id, &participant.id, false)
        .await?
        .ok_or(AppError::InternalServerError(
            "Attempt conflict without existing row".to_string(),
        ))?;
    tx.commit().await?;

    if existing.is_completed() {
        return Err(AppError::AlreadyCompleted);
    }
    Ok((existing, true))
}

/// Records the answer to the question at `submission.question_index`.
///
/// A second answer for the same question fails with `DuplicateAnswer` and
/// leaves the first one in place.
pub async fn submit_answer(
    pool: &PgPool,
    quiz_id: i64,
    participant_id: &str,
    submission: AnswerSubmission,
) -> Result<AnswerResult, AppError> {
    let mut tx = pool.begin().await?;

    let attempt = fetch_attempt(&mut tx, quiz_id, participant_id, true)
        .await?
        .ok_or(AppError::NotStarted)?;
    if attempt.is_completed() {
        return Err(AppError::AlreadyCompleted);
    }

    let key = sqlx::query_as::<_, PositionKey>(
        r#"
        SELECT
            q.id AS question_id,
            q.correct_index,
            jsonb_array_length(q.options)::INTEGER AS option_count
        FROM daily_quiz_questions dqq
        JOIN questions q ON q.id = dqq.question_id
        WHERE dqq.quiz_id = $1 AND dqq.position = $2
        "#,
    )
    .bind(quiz_id)
    .bind(submission.question_index)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| {
        AppError::BadRequest(format!("No question at index {}", submission.question_index))
    })?;

    if let Some(selected) = submission.selected_index {
        if selected < 0 || selected >= key.option_count {
            return Err(AppError::BadRequest(format!(
                "selected_index {} is out of bounds",
                selected
            )));
        }
    }

    let correct = submission.selected_index == Some(key.correct_index);

    let inserted = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO daily_quiz_answers (attempt_id, question_id, selected_index, is_correct, time_spent_seconds)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (attempt_id, question_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(attempt.id)
    .bind(key.question_id)
    .bind(submission.selected_index)
    .bind(correct)
    .bind(submission.time_spent.max(0))
    .fetch_optional(&mut *tx)
    .await?;

    if inserted.is_none() {
        return Err(AppError::DuplicateAnswer {
            question_index: submission.question_index,
        });
    }

    // Display-only running score; completion recomputes from the answers.
    let current_score = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE daily_quiz_attempts
        SET score = (
            SELECT COUNT(*) FROM daily_quiz_answers WHERE attempt_id = $1 AND is_correct
        )::INTEGER
        WHERE id = $1
        RETURNING score
        "#,
    )
    .bind(attempt.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(AnswerResult {
        correct,
        correct_index: key.correct_index,
        current_score,
    })
}

/// Completes an attempt. Returns the result, the stored attempt, and whether
/// this call is the one that completed it.
///
/// The score is recomputed from the stored answers and the weekly rank is
/// taken inside the same transaction. Completing twice returns the stored
/// result unchanged, rank included.
pub async fn complete_attempt(
    pool: &PgPool,
    quiz_id: i64,
    participant_id: &str,
    now: DateTime<Utc>,
    timezone: Tz,
) -> Result<(CompletionResult, Attempt, bool), AppError> {
    let mut tx = pool.begin().await?;

    let attempt = fetch_attempt(&mut tx, quiz_id, participant_id, true)
        .await?
        .ok_or(AppError::NotStarted)?;

    let total_questions = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM daily_quiz_questions WHERE quiz_id = $1",
    )
    .bind(quiz_id)
    .fetch_one(&mut *tx)
    .await?;

    if attempt.is_completed() {
        tx.commit().await?;
        let result = stored_result(&attempt, total_questions)?;
        return Ok((result, attempt, false));
    }

    let correct = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM daily_quiz_answers WHERE attempt_id = $1 AND is_correct",
    )
    .bind(attempt.id)
    .fetch_one(&mut *tx)
    .await?;

    let pct = percentage(correct, total_questions);
    let classification = Classification::from_correct_count(correct);
    let elapsed = elapsed_seconds(attempt.started_at, now);

    let completed = sqlx::query_as::<_, Attempt>(&format!(
        r#"
        UPDATE daily_quiz_attempts
        SET completed_at = $2,
            score = $3,
            percentage = $4,
            classification = $5,
            elapsed_seconds = $6
        WHERE id = $1
        RETURNING {ATTEMPT_COLUMNS}
        "#
    ))
    .bind(attempt.id)
    .bind(now)
    .bind(correct as i32)
    .bind(pct as i32)
    .bind(classification.as_str())
    .bind(elapsed)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to complete attempt: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let rank = rank_in_week(&mut tx, now, timezone, participant_id).await?;
    let completed = sqlx::query_as::<_, Attempt>(&format!(
        "UPDATE daily_quiz_attempts SET completion_rank = $2 WHERE id = $1 RETURNING {ATTEMPT_COLUMNS}"
    ))
    .bind(completed.id)
    .bind(rank)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(
        quiz_id,
        participant = %participant_id,
        score = correct,
        level = %classification,
        rank = ?rank,
        "Attempt completed"
    );

    let result = stored_result(&completed, total_questions)?;
    Ok((result, completed, true))
}

async fn fetch_attempt(
    conn: &mut PgConnection,
    quiz_id: i64,
    participant_id: &str,
    for_update: bool,
) -> Result<Option<Attempt>, AppError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM daily_quiz_attempts \
         WHERE quiz_id = $1 AND participant_id = $2{lock}"
    ))
    .bind(quiz_id)
    .bind(participant_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(attempt)
}

fn stored_result(attempt: &Attempt, total_questions: i64) -> Result<CompletionResult, AppError> {
    let completed_at = attempt
        .completed_at
        .ok_or(AppError::InternalServerError("Attempt is not completed".to_string()))?;
    let level = attempt
        .classification
        .as_deref()
        .and_then(Classification::parse)
        .unwrap_or_else(|| Classification::from_correct_count(attempt.score as i64));

    Ok(CompletionResult {
        attempt_id: attempt.id,
        score: attempt.score,
        total_questions,
        percentage: attempt.percentage,
        level,
        elapsed_seconds: attempt.elapsed_seconds,
        completed_at,
        rank: attempt.completion_rank,
    })
}

/// Whole seconds between start and completion, never negative.
pub fn elapsed_seconds(started_at: DateTime<Utc>, now: DateTime<Utc>) -> i32 {
    let secs = (now - started_at).num_seconds().max(0);
    i32::try_from(secs).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_elapsed_seconds() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 20, 0, 0).unwrap();
        assert_eq!(elapsed_seconds(start, start + Duration::seconds(185)), 185);
        assert_eq!(elapsed_seconds(start, start - Duration::seconds(5)), 0);
    }

    #[test]
    fn test_stored_result_uses_persisted_values() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 20, 0, 0).unwrap();
        let attempt = Attempt {
            id: 7,
            quiz_id: 1,
            participant_id: "u1".to_string(),
            display_name: "Awa".to_string(),
            email: None,
            started_at: start,
            completed_at: Some(start + Duration::seconds(120)),
            score: 12,
            percentage: 60,
            classification: Some("advanced".to_string()),
            elapsed_seconds: 120,
            completion_rank: Some(4),
        };
        let result = stored_result(&attempt, 20).unwrap();
        assert_eq!(result.score, 12);
        assert_eq!(result.percentage, 60);
        assert_eq!(result.level, Classification::Advanced);
        assert_eq!(result.total_questions, 20);
        assert_eq!(result.rank, Some(4));
    }

    #[test]
    fn test_stored_result_requires_completion() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 20, 0, 0).unwrap();
        let attempt = Attempt {
            id: 7,
            quiz_id: 1,
            participant_id: "u1".to_string(),
            display_name: "Awa".to_string(),
            email: None,
            started_at: start,
            completed_at: None,
            score: 0,
            percentage: 0,
            classification: None,
            elapsed_seconds: 0,
            completion_rank: None,
        };
        assert!(stored_result(&attempt, 20).is_err());
    }
}

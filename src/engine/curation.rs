// src/engine/curation.rs

//! Admin edits to a daily quiz. Every operation refuses once any attempt
//! exists for the quiz.

use std::collections::HashSet;

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use crate::{
    engine::provisioner::{
        CandidateFilter, claim_usage, draw_candidates, load_members, lock_question_draws,
        place_members, provision_in_tx,
    },
    error::AppError,
    models::daily_quiz::{ProvisionedQuiz, QuizLevel, RegenerateFilters},
};

#[derive(sqlx::FromRow)]
struct ReplacementCandidate {
    is_active: bool,
    status: Option<String>,
}

/// Loads (provisioning if needed) the quiz and fails with `QuizLocked` when
/// any participant already started it.
///
/// The provisioning upsert holds the quiz row exclusively until commit, and
/// `start_attempt` takes it in share mode, so no attempt can appear between
/// this check and the edit.
async fn lock_for_curation(
    conn: &mut PgConnection,
    date: NaiveDate,
    level: QuizLevel,
    count: i64,
) -> Result<ProvisionedQuiz, AppError> {
    let quiz = provision_in_tx(&mut *conn, date, level, count).await?;

    let attempts = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM daily_quiz_attempts WHERE quiz_id = $1",
    )
    .bind(quiz.quiz_id)
    .fetch_one(&mut *conn)
    .await?;

    if attempts > 0 {
        tracing::warn!(quiz_id = quiz.quiz_id, attempts, "Curation refused on started quiz");
        return Err(AppError::QuizLocked);
    }
    Ok(quiz)
}

/// `order` must contain each current member id exactly once.
pub fn validate_permutation(current: &[i64], order: &[i64]) -> Result<(), AppError> {
    if order.len() != current.len() {
        return Err(AppError::BadRequest(format!(
            "Order must list all {} questions, got {}",
            current.len(),
            order.len()
        )));
    }
    let expected: HashSet<i64> = current.iter().copied().collect();
    let mut seen = HashSet::with_capacity(order.len());
    for id in order {
        if !expected.contains(id) {
            return Err(AppError::BadRequest(format!(
                "Question {} is not part of this quiz",
                id
            )));
        }
        if !seen.insert(*id) {
            return Err(AppError::BadRequest(format!("Question {} listed twice", id)));
        }
    }
    Ok(())
}

/// Rewrites member positions to follow `order`.
pub async fn reorder(
    pool: &PgPool,
    date: NaiveDate,
    level: QuizLevel,
    count: i64,
    order: &[i64],
) -> Result<ProvisionedQuiz, AppError> {
    let mut tx = pool.begin().await?;
    let quiz = lock_for_curation(&mut tx, date, level, count).await?;

    let current: Vec<i64> = quiz.questions.iter().map(|m| m.question_id).collect();
    validate_permutation(&current, order)?;

    sqlx::query("DELETE FROM daily_quiz_questions WHERE quiz_id = $1")
        .bind(quiz.quiz_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO daily_quiz_questions (quiz_id, question_id, position)
        SELECT $1, picked.id, (picked.ord - 1)::INTEGER
        FROM UNNEST($2::BIGINT[]) WITH ORDINALITY AS picked(id, ord)
        "#,
    )
    .bind(quiz.quiz_id)
    .bind(order)
    .execute(&mut *tx)
    .await?;

    let questions = load_members(&mut tx, quiz.quiz_id).await?;
    tx.commit().await?;
    tracing::info!(quiz_id = quiz.quiz_id, %date, level = %level, "Daily quiz reordered");

    Ok(ProvisionedQuiz { questions, ..quiz })
}

/// Swaps the question at `position` for `question_id`.
///
/// The replacement must be active, validated and not already in the quiz,
/// and neither it nor any question with the same normalized text may have
/// been used before. Any difficulty is accepted, as with a regenerate
/// override. The removed question stays in the usage ledger.
pub async fn replace(
    pool: &PgPool,
    date: NaiveDate,
    level: QuizLevel,
    count: i64,
    position: i32,
    question_id: i64,
) -> Result<ProvisionedQuiz, AppError> {
    let mut tx = pool.begin().await?;
    let quiz = lock_for_curation(&mut tx, date, level, count).await?;

    if position < 0 || position as usize >= quiz.questions.len() {
        return Err(AppError::BadRequest(format!(
            "Position {} is out of range (0..{})",
            position,
            quiz.questions.len()
        )));
    }
    if quiz.questions.iter().any(|m| m.question_id == question_id) {
        return Err(AppError::Conflict(format!(
            "Question {} is already part of this quiz",
            question_id
        )));
    }

    let candidate = sqlx::query_as::<_, ReplacementCandidate>(
        "SELECT is_active, status FROM questions WHERE id = $1",
    )
    .bind(question_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound(format!("Question {} not found", question_id)))?;

    if !candidate.is_active {
        return Err(AppError::BadRequest("Replacement question is inactive".to_string()));
    }
    if candidate.status.as_deref().is_some_and(|s| s != "validated") {
        return Err(AppError::BadRequest(
            "Replacement question is not validated".to_string(),
        ));
    }
    lock_question_draws(&mut tx).await?;

    let already_used = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM question_usage u
            JOIN questions used ON used.id = u.question_id
            JOIN questions q ON q.id = $1
            WHERE used.id = q.id OR used.normalized_text = q.normalized_text
        )
        "#,
    )
    .bind(question_id)
    .fetch_one(&mut *tx)
    .await?;

    if already_used {
        return Err(AppError::Conflict(format!(
            "Question {} (or an identical one) was already used",
            question_id
        )));
    }

    sqlx::query(
        "UPDATE daily_quiz_questions SET question_id = $3 WHERE quiz_id = $1 AND position = $2",
    )
    .bind(quiz.quiz_id)
    .bind(position)
    .bind(question_id)
    .execute(&mut *tx)
    .await?;
    claim_usage(&mut tx, &[question_id], date).await?;

    let questions = load_members(&mut tx, quiz.quiz_id).await?;
    tx.commit().await?;
    tracing::info!(quiz_id = quiz.quiz_id, position, question_id, "Daily quiz question replaced");

    Ok(ProvisionedQuiz { questions, ..quiz })
}

/// Replaces the whole member set with a fresh draw.
///
/// Discarded questions stay in the usage ledger. If the pool cannot supply
/// `count` questions the transaction rolls back and the quiz keeps its
/// current members.
pub async fn regenerate(
    pool: &PgPool,
    date: NaiveDate,
    level: QuizLevel,
    count: i64,
    filters: &RegenerateFilters,
) -> Result<ProvisionedQuiz, AppError> {
    let mut tx = pool.begin().await?;
    let quiz = lock_for_curation(&mut tx, date, level, count).await?;

    sqlx::query("DELETE FROM daily_quiz_questions WHERE quiz_id = $1")
        .bind(quiz.quiz_id)
        .execute(&mut *tx)
        .await?;

    let filter = CandidateFilter {
        difficulty: filters.difficulty.or(level.difficulty()),
        keyword: filters.keyword.clone(),
    };
    let drawn = draw_candidates(&mut tx, &filter, count).await?;
    if (drawn.len() as i64) < count {
        return Err(AppError::InsufficientPool {
            needed: count,
            available: drawn.len() as i64,
        });
    }

    place_members(&mut tx, quiz.quiz_id, date, &drawn).await?;
    let questions = load_members(&mut tx, quiz.quiz_id).await?;
    tx.commit().await?;
    tracing::info!(quiz_id = quiz.quiz_id, %date, level = %level, "Daily quiz regenerated");

    Ok(ProvisionedQuiz { questions, ..quiz })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permutation_accepts_reordering() {
        assert!(validate_permutation(&[1, 2, 3], &[3, 1, 2]).is_ok());
        assert!(validate_permutation(&[], &[]).is_ok());
    }

    #[test]
    fn test_permutation_rejects_wrong_length() {
        assert!(validate_permutation(&[1, 2, 3], &[1, 2]).is_err());
        assert!(validate_permutation(&[1, 2], &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_permutation_rejects_foreign_or_repeated_ids() {
        assert!(validate_permutation(&[1, 2, 3], &[1, 2, 4]).is_err());
        assert!(validate_permutation(&[1, 2, 3], &[1, 1, 2]).is_err());
    }
}

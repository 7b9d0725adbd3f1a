// src/engine/provisioner.rs

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use crate::{
    error::AppError,
    models::{
        daily_quiz::{ProvisionedQuiz, QuizLevel, QuizMember},
        question::Difficulty,
    },
};

/// Advisory lock key taken for the duration of any transaction that draws or
/// claims questions, so two draws never pick the same unused question.
const QUESTION_DRAW_LOCK: i64 = 0x5155_495A_4452_4157;

/// Eligibility filters on top of the fixed rules (active, validated, unused,
/// not a duplicate of anything used).
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    pub difficulty: Option<Difficulty>,
    pub keyword: Option<String>,
}

impl CandidateFilter {
    pub fn for_level(level: QuizLevel) -> Self {
        Self {
            difficulty: level.difficulty(),
            keyword: None,
        }
    }
}

/// Returns the quiz for `(date, level)`, creating and filling it on first call.
///
/// Repeated calls return the stored question list unchanged.
pub async fn get_or_create_daily_quiz(
    pool: &PgPool,
    date: NaiveDate,
    level: QuizLevel,
    count: i64,
) -> Result<ProvisionedQuiz, AppError> {
    if let Some(quiz_id) = find_daily_quiz(pool, date, level).await? {
        let mut conn = pool.acquire().await?;
        let questions = load_members(&mut conn, quiz_id).await?;
        if !questions.is_empty() {
            return Ok(ProvisionedQuiz {
                quiz_id,
                date,
                level,
                questions,
            });
        }
    }

    let mut tx = pool.begin().await?;
    let quiz = provision_in_tx(&mut tx, date, level, count).await?;
    tx.commit().await?;
    Ok(quiz)
}

/// Looks up an existing quiz without creating it.
pub async fn find_daily_quiz(
    pool: &PgPool,
    date: NaiveDate,
    level: QuizLevel,
) -> Result<Option<i64>, AppError> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM daily_quizzes WHERE quiz_date = $1 AND quiz_level = $2",
    )
    .bind(date)
    .bind(level.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Provisioning body, run inside the caller's transaction.
///
/// The quiz row upsert uses `DO UPDATE` so it always returns the id and holds
/// the row lock until commit: a concurrent first caller blocks here and then
/// sees the winner's members.
pub(crate) async fn provision_in_tx(
    conn: &mut PgConnection,
    date: NaiveDate,
    level: QuizLevel,
    count: i64,
) -> Result<ProvisionedQuiz, AppError> {
    let quiz_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO daily_quizzes (quiz_date, quiz_level)
        VALUES ($1, $2)
        ON CONFLICT (quiz_date, quiz_level) DO UPDATE SET quiz_level = EXCLUDED.quiz_level
        RETURNING id
        "#,
    )
    .bind(date)
    .bind(level.as_str())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to upsert daily quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let members = load_members(&mut *conn, quiz_id).await?;
    if !members.is_empty() {
        return Ok(ProvisionedQuiz {
            quiz_id,
            date,
            level,
            questions: members,
        });
    }

    let drawn = draw_candidates(&mut *conn, &CandidateFilter::for_level(level), count).await?;
    if (drawn.len() as i64) < count {
        return Err(AppError::InsufficientPool {
            needed: count,
            available: drawn.len() as i64,
        });
    }

    place_members(&mut *conn, quiz_id, date, &drawn).await?;
    tracing::info!(%date, level = %level, count = drawn.len(), quiz_id, "Daily quiz provisioned");

    let questions = load_members(&mut *conn, quiz_id).await?;
    Ok(ProvisionedQuiz {
        quiz_id,
        date,
        level,
        questions,
    })
}

/// Ordered members of a quiz with their question content.
pub(crate) async fn load_members(
    conn: &mut PgConnection,
    quiz_id: i64,
) -> Result<Vec<QuizMember>, AppError> {
    let members = sqlx::query_as::<_, QuizMember>(
        r#"
        SELECT
            dqq.position,
            q.id AS question_id,
            q.question_text,
            q.options,
            q.correct_index,
            q.difficulty
        FROM daily_quiz_questions dqq
        JOIN questions q ON q.id = dqq.question_id
        WHERE dqq.quiz_id = $1
        ORDER BY dqq.position
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(members)
}

/// Serializes question draws across all levels for the rest of the transaction.
pub(crate) async fn lock_question_draws(conn: &mut PgConnection) -> Result<(), AppError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(QUESTION_DRAW_LOCK)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Picks up to `count` eligible question ids in random order.
///
/// Eligible: active, validated (or legacy NULL status), matching the filter,
/// never recorded in the usage ledger, and whose normalized text matches no
/// used question. Only one question per normalized text is kept.
pub(crate) async fn draw_candidates(
    conn: &mut PgConnection,
    filter: &CandidateFilter,
    count: i64,
) -> Result<Vec<i64>, AppError> {
    lock_question_draws(&mut *conn).await?;

    let keyword = filter
        .keyword
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(escape_like);

    let ids = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT pick.id
        FROM (
            SELECT DISTINCT ON (q.normalized_text) q.id
            FROM questions q
            WHERE q.is_active = TRUE
              AND (q.status IS NULL OR q.status = 'validated')
              AND ($1::TEXT IS NULL OR q.difficulty = $1)
              AND ($2::TEXT IS NULL OR q.question_text ILIKE '%' || $2 || '%')
              AND NOT EXISTS (
                  SELECT 1 FROM question_usage u WHERE u.question_id = q.id
              )
              AND NOT EXISTS (
                  SELECT 1
                  FROM question_usage u
                  JOIN questions used ON used.id = u.question_id
                  WHERE used.normalized_text = q.normalized_text
              )
            ORDER BY q.normalized_text, RANDOM()
        ) pick
        ORDER BY RANDOM()
        LIMIT $3
        "#,
    )
    .bind(filter.difficulty.map(|d| d.as_str()))
    .bind(keyword)
    .bind(count)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to draw quiz candidates: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(ids)
}

/// Inserts `ids` as the quiz members at positions 0..n and claims them in the
/// usage ledger.
pub(crate) async fn place_members(
    conn: &mut PgConnection,
    quiz_id: i64,
    date: NaiveDate,
    ids: &[i64],
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO daily_quiz_questions (quiz_id, question_id, position)
        SELECT $1, picked.id, (picked.ord - 1)::INTEGER
        FROM UNNEST($2::BIGINT[]) WITH ORDINALITY AS picked(id, ord)
        "#,
    )
    .bind(quiz_id)
    .bind(ids)
    .execute(&mut *conn)
    .await?;

    claim_usage(&mut *conn, ids, date).await
}

/// Records questions as used. Existing ledger rows are left untouched.
pub(crate) async fn claim_usage(
    conn: &mut PgConnection,
    ids: &[i64],
    date: NaiveDate,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO question_usage (question_id, quiz_date)
        SELECT UNNEST($1::BIGINT[]), $2
        ON CONFLICT (question_id) DO NOTHING
        "#,
    )
    .bind(ids)
    .bind(date)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Escapes LIKE metacharacters so a keyword matches literally.
fn escape_like(keyword: &str) -> String {
    let mut out = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("coran"), "coran");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }

    #[test]
    fn test_filter_for_level() {
        assert_eq!(
            CandidateFilter::for_level(QuizLevel::Medium).difficulty,
            Some(Difficulty::Medium)
        );
        assert_eq!(CandidateFilter::for_level(QuizLevel::Random).difficulty, None);
    }
}

// src/engine/leaderboard.rs

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use sqlx::{PgConnection, PgPool};

use crate::{
    error::AppError,
    models::{
        attempt::HistoryEntry,
        leaderboard::{
            CompletedAttemptRow, DailySummary, LeaderboardEntry, LevelParticipation,
            SummaryTotals, WeeklyLeaderboard, WeeklyRank,
        },
    },
};

pub const MAX_LEADERBOARD_LIMIT: i64 = 100;

const SUMMARY_TOP: usize = 5;

/// ISO week containing `now` in `timezone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    /// Local Monday.
    pub week_start: NaiveDate,
    /// Inclusive.
    pub start: DateTime<Utc>,
    /// Exclusive: next Monday's local midnight.
    pub end: DateTime<Utc>,
}

impl WeekWindow {
    pub fn containing(now: DateTime<Utc>, timezone: Tz) -> Self {
        let today = now.with_timezone(&timezone).date_naive();
        let week_start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        let next_week = week_start + Duration::days(7);

        Self {
            week_start,
            start: local_midnight(timezone, week_start),
            end: local_midnight(timezone, next_week),
        }
    }
}

/// Start of `date` in `timezone`, as UTC. Falls back to UTC midnight if local
/// midnight does not exist (DST gap).
pub fn local_midnight(timezone: Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    timezone
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Ranks completed attempts.
///
/// Keeps each participant's first completion (by completion time, then id),
/// orders by score descending then elapsed time ascending, and assigns ranks
/// 1..K with no gaps or shared ranks. Remaining ties fall back to completion
/// order so the result is deterministic.
pub fn rank_attempts(mut rows: Vec<CompletedAttemptRow>) -> Vec<LeaderboardEntry> {
    rows.sort_by(|a, b| {
        a.completed_at
            .cmp(&b.completed_at)
            .then(a.attempt_id.cmp(&b.attempt_id))
    });

    let mut seen = HashSet::new();
    let mut firsts: Vec<CompletedAttemptRow> = rows
        .into_iter()
        .filter(|row| seen.insert(row.participant_id.clone()))
        .collect();

    firsts.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.elapsed_seconds.cmp(&b.elapsed_seconds))
            .then(a.completed_at.cmp(&b.completed_at))
            .then(a.attempt_id.cmp(&b.attempt_id))
    });

    firsts
        .into_iter()
        .enumerate()
        .map(|(i, row)| LeaderboardEntry {
            rank: i as i64 + 1,
            participant_id: row.participant_id,
            name: row.display_name,
            score: row.score,
            percentage: row.percentage,
            level: row.classification.unwrap_or_default(),
            quiz_level: row.quiz_level,
            elapsed_seconds: row.elapsed_seconds,
        })
        .collect()
}

async fn completed_between(
    conn: &mut PgConnection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<CompletedAttemptRow>, AppError> {
    let rows = sqlx::query_as::<_, CompletedAttemptRow>(
        r#"
        SELECT
            a.id AS attempt_id,
            a.participant_id,
            a.display_name,
            a.score,
            a.percentage,
            a.classification,
            a.elapsed_seconds,
            a.completed_at,
            dq.quiz_level
        FROM daily_quiz_attempts a
        JOIN daily_quizzes dq ON dq.id = a.quiz_id
        WHERE a.completed_at >= $1 AND a.completed_at < $2
        ORDER BY a.completed_at, a.id
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch completed attempts: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(rows)
}

/// Standings of the current ISO week, computed on every call.
pub async fn weekly_leaderboard(
    pool: &PgPool,
    now: DateTime<Utc>,
    timezone: Tz,
    limit: i64,
) -> Result<WeeklyLeaderboard, AppError> {
    let window = WeekWindow::containing(now, timezone);
    let limit = limit.clamp(1, MAX_LEADERBOARD_LIMIT) as usize;

    let mut conn = pool.acquire().await?;
    let mut entries = rank_attempts(completed_between(&mut conn, window.start, window.end).await?);
    entries.truncate(limit);

    Ok(WeeklyLeaderboard {
        week_start: window.week_start,
        entries,
    })
}

/// The participant's rank this week, `None` if they have no completion in it.
pub async fn weekly_rank(
    pool: &PgPool,
    now: DateTime<Utc>,
    timezone: Tz,
    participant_id: &str,
) -> Result<WeeklyRank, AppError> {
    let mut conn = pool.acquire().await?;
    let rank = rank_in_week(&mut conn, now, timezone, participant_id).await?;

    Ok(WeeklyRank {
        participant_id: participant_id.to_string(),
        week_start: WeekWindow::containing(now, timezone).week_start,
        rank,
    })
}

/// Rank of `participant_id` in the week containing `now`, as seen by `conn`.
///
/// Same ordering as [`rank_attempts`], evaluated in the database so only the
/// one rank comes back.
pub(crate) async fn rank_in_week(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
    timezone: Tz,
    participant_id: &str,
) -> Result<Option<i64>, AppError> {
    let window = WeekWindow::containing(now, timezone);

    let rank = sqlx::query_scalar::<_, i64>(
        r#"
        WITH firsts AS (
            SELECT DISTINCT ON (a.participant_id)
                a.id, a.participant_id, a.score, a.elapsed_seconds, a.completed_at
            FROM daily_quiz_attempts a
            WHERE a.completed_at >= $1 AND a.completed_at < $2
            ORDER BY a.participant_id, a.completed_at, a.id
        ),
        ranked AS (
            SELECT
                participant_id,
                ROW_NUMBER() OVER (
                    ORDER BY score DESC, elapsed_seconds ASC, completed_at, id
                ) AS rank
            FROM firsts
        )
        SELECT rank FROM ranked WHERE participant_id = $3
        "#,
    )
    .bind(window.start)
    .bind(window.end)
    .bind(participant_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to rank participant: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(rank)
}

/// Operator digest for the quizzes of `date`.
pub async fn daily_summary(pool: &PgPool, date: NaiveDate) -> Result<DailySummary, AppError> {
    let summary = sqlx::query_as::<_, SummaryTotals>(
        r#"
        SELECT
            COUNT(*) AS attempts,
            COUNT(DISTINCT a.participant_id) AS participants,
            COALESCE(AVG(a.score), 0)::FLOAT8 AS avg_score,
            COALESCE(AVG(a.percentage), 0)::FLOAT8 AS avg_percentage,
            COALESCE(MAX(a.score), 0)::INTEGER AS best_score
        FROM daily_quiz_attempts a
        JOIN daily_quizzes dq ON dq.id = a.quiz_id
        WHERE dq.quiz_date = $1 AND a.completed_at IS NOT NULL
        "#,
    )
    .bind(date)
    .fetch_one(pool)
    .await?;

    let levels = sqlx::query_as::<_, LevelParticipation>(
        r#"
        SELECT
            dq.quiz_level AS level,
            COUNT(*) AS attempts,
            COUNT(DISTINCT a.participant_id) AS participants
        FROM daily_quiz_attempts a
        JOIN daily_quizzes dq ON dq.id = a.quiz_id
        WHERE dq.quiz_date = $1 AND a.completed_at IS NOT NULL
        GROUP BY dq.quiz_level
        ORDER BY dq.quiz_level
        "#,
    )
    .bind(date)
    .fetch_all(pool)
    .await?;

    let rows = sqlx::query_as::<_, CompletedAttemptRow>(
        r#"
        SELECT
            a.id AS attempt_id,
            a.participant_id,
            a.display_name,
            a.score,
            a.percentage,
            a.classification,
            a.elapsed_seconds,
            a.completed_at,
            dq.quiz_level
        FROM daily_quiz_attempts a
        JOIN daily_quizzes dq ON dq.id = a.quiz_id
        WHERE dq.quiz_date = $1 AND a.completed_at IS NOT NULL
        "#,
    )
    .bind(date)
    .fetch_all(pool)
    .await?;

    let mut top = rank_attempts(rows);
    top.truncate(SUMMARY_TOP);

    Ok(DailySummary {
        date,
        summary,
        levels,
        top,
    })
}

/// Completed attempts of a participant, most recent first.
pub async fn participant_history(
    pool: &PgPool,
    participant_id: &str,
) -> Result<Vec<HistoryEntry>, AppError> {
    let entries = sqlx::query_as::<_, HistoryEntry>(
        r#"
        SELECT
            a.id AS attempt_id,
            dq.quiz_date,
            dq.quiz_level,
            a.score,
            (SELECT COUNT(*) FROM daily_quiz_questions dqq WHERE dqq.quiz_id = dq.id) AS total_questions,
            a.percentage,
            a.classification AS level,
            a.elapsed_seconds,
            a.completed_at
        FROM daily_quiz_attempts a
        JOIN daily_quizzes dq ON dq.id = a.quiz_id
        WHERE a.participant_id = $1 AND a.completed_at IS NOT NULL
        ORDER BY a.completed_at DESC, a.id DESC
        "#,
    )
    .bind(participant_id)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::{Africa::Abidjan, Europe::Paris};

    fn row(id: i64, who: &str, score: i32, elapsed: i32, minute: u32) -> CompletedAttemptRow {
        CompletedAttemptRow {
            attempt_id: id,
            participant_id: who.to_string(),
            display_name: who.to_uppercase(),
            score,
            percentage: score * 5,
            classification: Some("advanced".to_string()),
            elapsed_seconds: elapsed,
            completed_at: Utc.with_ymd_and_hms(2026, 2, 2, 20, minute, 0).unwrap(),
            quiz_level: "medium".to_string(),
        }
    }

    #[test]
    fn test_ranks_are_contiguous_even_with_equal_scores() {
        let entries = rank_attempts(vec![
            row(1, "a", 15, 200, 10),
            row(2, "b", 15, 150, 11),
            row(3, "c", 12, 100, 12),
            row(4, "d", 15, 150, 13),
        ]);
        let ranks: Vec<i64> = entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);

        let order: Vec<&str> = entries.iter().map(|e| e.participant_id.as_str()).collect();
        // b and d tie on score and time; b completed first.
        assert_eq!(order, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_one_row_per_participant_first_completion_wins() {
        let entries = rank_attempts(vec![
            row(5, "a", 20, 50, 30), // later, better: ignored
            row(1, "a", 8, 300, 5),
            row(2, "b", 10, 300, 6),
        ]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].participant_id, "b");
        assert_eq!(entries[1].participant_id, "a");
        assert_eq!(entries[1].score, 8);
    }

    #[test]
    fn test_empty() {
        assert!(rank_attempts(vec![]).is_empty());
    }

    #[test]
    fn test_week_window_monday_to_monday() {
        // Wednesday 2026-02-04 21:00 UTC.
        let now = Utc.with_ymd_and_hms(2026, 2, 4, 21, 0, 0).unwrap();
        let w = WeekWindow::containing(now, Abidjan);
        assert_eq!(w.week_start, NaiveDate::from_ymd_opt(2026, 2, 2).unwrap());
        assert_eq!(w.start, Utc.with_ymd_and_hms(2026, 2, 2, 0, 0, 0).unwrap());
        assert_eq!(w.end, Utc.with_ymd_and_hms(2026, 2, 9, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_week_window_is_local_to_timezone() {
        // Sunday 23:30 UTC is already Monday in Paris (UTC+1 in winter).
        let now = Utc.with_ymd_and_hms(2026, 2, 8, 23, 30, 0).unwrap();
        let w = WeekWindow::containing(now, Paris);
        assert_eq!(w.week_start, NaiveDate::from_ymd_opt(2026, 2, 9).unwrap());
        assert_eq!(w.start, Utc.with_ymd_and_hms(2026, 2, 8, 23, 0, 0).unwrap());
        assert!(w.start <= now && now < w.end);
    }

    #[test]
    fn test_monday_belongs_to_its_own_week() {
        let now = Utc.with_ymd_and_hms(2026, 2, 9, 0, 0, 0).unwrap();
        let w = WeekWindow::containing(now, Abidjan);
        assert_eq!(w.week_start, NaiveDate::from_ymd_opt(2026, 2, 9).unwrap());
        assert_eq!(w.start, now);
    }
}

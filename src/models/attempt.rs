// src/models/attempt.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{engine::scoring::Classification, models::daily_quiz::QuizLevel};

/// Represents the 'daily_quiz_attempts' table.
/// One row per (quiz, participant); `completed_at` is NULL while in progress.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Attempt {
    pub id: i64,
    pub quiz_id: i64,
    pub participant_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Running count of correct answers. Display only until completion.
    pub score: i32,
    pub percentage: i32,
    pub classification: Option<String>,
    pub elapsed_seconds: i32,
    pub completion_rank: Option<i64>,
}

impl Attempt {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartAttemptRequest {
    #[validate(length(min = 1, max = 128))]
    pub participant_id: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    pub level: QuizLevel,
}

#[derive(Debug, Serialize)]
pub struct StartAttemptResponse {
    pub attempt_id: i64,
    pub quiz_id: i64,
    pub started_at: DateTime<Utc>,
    /// True when an in-progress attempt was returned instead of a new one.
    pub resumed: bool,
    pub current_score: i32,
    pub total_questions: usize,
    pub time_per_question: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1, max = 128))]
    pub participant_id: String,
    #[validate(range(min = 0))]
    pub question_index: i32,
    /// Absent when the timer ran out.
    #[validate(range(min = 0))]
    pub selected_index: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0, max = 3600))]
    pub time_spent: i32,
    #[serde(default)]
    pub level: QuizLevel,
}

#[derive(Debug, Serialize)]
pub struct AnswerResult {
    pub correct: bool,
    pub correct_index: i32,
    pub current_score: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteAttemptRequest {
    #[validate(length(min = 1, max = 128))]
    pub participant_id: String,
    #[serde(default)]
    pub level: QuizLevel,
}

/// Final outcome of an attempt, as stored at completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionResult {
    pub attempt_id: i64,
    pub score: i32,
    pub total_questions: i64,
    pub percentage: i32,
    pub level: Classification,
    pub elapsed_seconds: i32,
    pub completed_at: DateTime<Utc>,
    /// Weekly leaderboard rank at completion time.
    pub rank: Option<i64>,
}

/// A completed attempt in a participant's history.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HistoryEntry {
    pub attempt_id: i64,
    pub quiz_date: NaiveDate,
    pub quiz_level: String,
    pub score: i32,
    pub total_questions: i64,
    pub percentage: i32,
    pub level: Option<String>,
    pub elapsed_seconds: i32,
    pub completed_at: DateTime<Utc>,
}

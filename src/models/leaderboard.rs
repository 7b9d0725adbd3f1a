// src/models/leaderboard.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A completed attempt inside the ranking window.
#[derive(Debug, Clone, FromRow)]
pub struct CompletedAttemptRow {
    pub attempt_id: i64,
    pub participant_id: String,
    pub display_name: String,
    pub score: i32,
    pub percentage: i32,
    pub classification: Option<String>,
    pub elapsed_seconds: i32,
    pub completed_at: DateTime<Utc>,
    pub quiz_level: String,
}

/// One line of a leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: i64,
    #[serde(skip_serializing)]
    pub participant_id: String,
    pub name: String,
    pub score: i32,
    pub percentage: i32,
    /// Classification label of the attempt.
    pub level: String,
    pub quiz_level: String,
    pub elapsed_seconds: i32,
}

#[derive(Debug, Serialize)]
pub struct WeeklyLeaderboard {
    pub week_start: NaiveDate,
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Serialize)]
pub struct WeeklyRank {
    pub participant_id: String,
    pub week_start: NaiveDate,
    pub rank: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardParams {
    pub limit: Option<i64>,
}

/// Payload pushed to live subscribers after each completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardUpdate {
    pub rank: Option<i64>,
    pub name: String,
    pub score: i32,
    pub percentage: i32,
    pub level: String,
}

#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct SummaryTotals {
    pub attempts: i64,
    pub participants: i64,
    pub avg_score: f64,
    pub avg_percentage: f64,
    pub best_score: i32,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LevelParticipation {
    pub level: String,
    pub attempts: i64,
    pub participants: i64,
}

/// End-of-day digest for operators.
#[derive(Debug, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub summary: SummaryTotals,
    pub levels: Vec<LevelParticipation>,
    pub top: Vec<LeaderboardEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryParams {
    pub date: Option<NaiveDate>,
}

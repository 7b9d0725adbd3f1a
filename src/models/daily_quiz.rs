// src/models/daily_quiz.rs

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

use crate::{
    error::AppError,
    models::question::{Difficulty, PublicQuestion},
};

/// Difficulty level a daily quiz is provisioned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizLevel {
    Easy,
    Medium,
    Hard,
    #[default]
    Random,
}

impl QuizLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizLevel::Easy => "easy",
            QuizLevel::Medium => "medium",
            QuizLevel::Hard => "hard",
            QuizLevel::Random => "random",
        }
    }

    /// Question difficulty the level draws from; `None` draws from all.
    pub fn difficulty(&self) -> Option<Difficulty> {
        match self {
            QuizLevel::Easy => Some(Difficulty::Easy),
            QuizLevel::Medium => Some(Difficulty::Medium),
            QuizLevel::Hard => Some(Difficulty::Hard),
            QuizLevel::Random => None,
        }
    }
}

impl FromStr for QuizLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(QuizLevel::Easy),
            "medium" => Ok(QuizLevel::Medium),
            "hard" => Ok(QuizLevel::Hard),
            "random" => Ok(QuizLevel::Random),
            other => Err(AppError::BadRequest(format!("Unknown quiz level '{}'", other))),
        }
    }
}

impl fmt::Display for QuizLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A question placed in a daily quiz, joined with its content.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizMember {
    pub position: i32,
    pub question_id: i64,
    pub question_text: String,
    pub options: Json<Vec<String>>,
    pub correct_index: i32,
    pub difficulty: String,
}

impl QuizMember {
    pub fn to_public(&self) -> PublicQuestion {
        PublicQuestion {
            position: self.position,
            id: self.question_id,
            question_text: self.question_text.clone(),
            options: self.options.0.clone(),
            difficulty: self.difficulty.clone(),
        }
    }
}

/// Result of provisioning: the quiz row and its ordered members.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedQuiz {
    pub quiz_id: i64,
    pub date: NaiveDate,
    pub level: QuizLevel,
    pub questions: Vec<QuizMember>,
}

/// What participants receive from `GET /api/quiz/daily`.
#[derive(Debug, Serialize)]
pub struct DailyQuizResponse {
    pub date: NaiveDate,
    pub level: QuizLevel,
    pub total_questions: usize,
    pub time_per_question: i64,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LevelQuery {
    #[serde(default)]
    pub level: QuizLevel,
}

/// Admin target: a level on a date (today when omitted).
#[derive(Debug, Default, Deserialize)]
pub struct QuizTarget {
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub level: QuizLevel,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub level: QuizLevel,
    /// Every current question id, in the new order.
    pub order: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceRequest {
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub level: QuizLevel,
    pub position: i32,
    pub question_id: i64,
}

/// Extra filters applied when regenerating a quiz.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegenerateFilters {
    /// Case-insensitive substring of the question text.
    pub keyword: Option<String>,
    /// Draw from this difficulty regardless of the quiz level.
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateRequest {
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub level: QuizLevel,
    #[serde(flatten)]
    pub filters: RegenerateFilters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_difficulty_mapping() {
        assert_eq!(QuizLevel::Easy.difficulty(), Some(Difficulty::Easy));
        assert_eq!(QuizLevel::Hard.difficulty(), Some(Difficulty::Hard));
        assert_eq!(QuizLevel::Random.difficulty(), None);
    }

    #[test]
    fn test_level_query_defaults_to_random() {
        let q: LevelQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.level, QuizLevel::Random);
        let q: LevelQuery = serde_json::from_str(r#"{"level":"medium"}"#).unwrap();
        assert_eq!(q.level, QuizLevel::Medium);
    }

    #[test]
    fn test_regenerate_request_flattens_filters() {
        let req: RegenerateRequest = serde_json::from_str(
            r#"{"level":"random","keyword":"coran","difficulty":"hard"}"#,
        )
        .unwrap();
        assert_eq!(req.filters.keyword.as_deref(), Some("coran"));
        assert_eq!(req.filters.difficulty, Some(Difficulty::Hard));
    }
}

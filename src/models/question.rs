// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::error::AppError;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 6;

/// Difficulty tier of a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(AppError::BadRequest(format!("Unknown difficulty '{}'", other))),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editorial lifecycle of a question. Only `validated` (or legacy rows with no
/// status) can be drawn into a daily quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Draft,
    Review,
    Validated,
    Archived,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Draft => "draft",
            QuestionStatus::Review => "review",
            QuestionStatus::Validated => "validated",
            QuestionStatus::Archived => "archived",
        }
    }

    /// Allowed lifecycle moves.
    ///
    /// draft -> review -> validated -> archived; review can go back to draft,
    /// validated back to review, and archived questions are revived as drafts.
    /// Anything may be archived. Legacy rows (`None`) may move anywhere.
    pub fn can_transition(from: Option<QuestionStatus>, to: QuestionStatus) -> bool {
        use QuestionStatus::*;
        match (from, to) {
            (None, _) => true,
            (Some(f), t) if f == t => false,
            (Some(_), Archived) => true,
            (Some(Draft), Review)
            | (Some(Review), Draft)
            | (Some(Review), Validated)
            | (Some(Validated), Review)
            | (Some(Archived), Draft) => true,
            _ => false,
        }
    }
}

impl FromStr for QuestionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(QuestionStatus::Draft),
            "review" => Ok(QuestionStatus::Review),
            "validated" => Ok(QuestionStatus::Validated),
            "archived" => Ok(QuestionStatus::Archived),
            other => Err(AppError::BadRequest(format!("Unknown status '{}'", other))),
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub question_text: String,

    /// De-duplication key, see `engine::normalize`.
    #[serde(skip_serializing)]
    pub normalized_text: String,

    /// Answer options in display order, stored as a JSON array.
    pub options: Json<Vec<String>>,

    /// Index into `options`.
    pub correct_index: i32,

    pub difficulty: String,

    /// NULL for legacy rows imported before the review workflow existed.
    pub status: Option<String>,

    pub source: Option<String>,

    pub tags: Json<Vec<String>>,

    pub is_active: bool,

    pub created_by: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Question as shown to participants (no correct index).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub position: i32,
    pub id: i64,
    pub question_text: String,
    pub options: Vec<String>,
    pub difficulty: String,
}

/// One entry of the append-only edit history.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuestionVersion {
    pub id: i64,
    pub question_id: i64,
    pub version: i32,
    /// Content of the question before the edit.
    pub snapshot: serde_json::Value,
    pub edited_by: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub question_text: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(range(min = 0))]
    pub correct_index: i32,
    pub difficulty: Difficulty,
    pub status: Option<QuestionStatus>,
    #[validate(length(max = 500))]
    pub source: Option<String>,
    #[serde(default)]
    #[validate(custom(function = validate_tags))]
    pub tags: Vec<String>,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub question_text: Option<String>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<String>>,
    #[validate(range(min = 0))]
    pub correct_index: Option<i32>,
    pub difficulty: Option<Difficulty>,
    #[validate(length(max = 500))]
    pub source: Option<String>,
    #[validate(custom(function = validate_tags))]
    pub tags: Option<Vec<String>>,
}

impl UpdateQuestionRequest {
    pub fn is_empty(&self) -> bool {
        self.question_text.is_none()
            && self.options.is_none()
            && self.correct_index.is_none()
            && self.difficulty.is_none()
            && self.source.is_none()
            && self.tags.is_none()
    }
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: QuestionStatus,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Query parameters for the admin question list.
#[derive(Debug, Default, Deserialize)]
pub struct QuestionListParams {
    pub status: Option<QuestionStatus>,
    pub difficulty: Option<Difficulty>,
    /// `true` keeps only questions already consumed by a daily quiz.
    pub used: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A row of a bulk import. Fields are loose so bad rows can be counted and skipped.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportQuestionRow {
    pub question_text: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_index: Option<i64>,
    pub difficulty: Option<String>,
    pub status: Option<QuestionStatus>,
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImportQuestionsRequest {
    pub questions: Vec<ImportQuestionRow>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < MIN_OPTIONS {
        return Err(validator::ValidationError::new("not_enough_options"));
    }
    if options.len() > MAX_OPTIONS {
        return Err(validator::ValidationError::new("too_many_options"));
    }
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), validator::ValidationError> {
    if tags.len() > 20 {
        return Err(validator::ValidationError::new("too_many_tags"));
    }
    if tags.iter().any(|t| t.trim().is_empty() || t.len() > 50) {
        return Err(validator::ValidationError::new("invalid_tag"));
    }
    Ok(())
}

/// The correct-option index must point inside the option list.
pub fn ensure_correct_index(options: &[String], correct_index: i64) -> Result<(), AppError> {
    if correct_index < 0 || correct_index as usize >= options.len() {
        return Err(AppError::BadRequest(format!(
            "correct_index {} is out of bounds for {} options",
            correct_index,
            options.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Option {}", i)).collect()
    }

    #[test]
    fn test_correct_index_bounds() {
        assert!(ensure_correct_index(&opts(4), 0).is_ok());
        assert!(ensure_correct_index(&opts(4), 3).is_ok());
        assert!(ensure_correct_index(&opts(4), 4).is_err());
        assert!(ensure_correct_index(&opts(4), -1).is_err());
    }

    #[test]
    fn test_create_request_requires_two_options() {
        let req = CreateQuestionRequest {
            question_text: "Combien de piliers?".to_string(),
            options: opts(1),
            correct_index: 0,
            difficulty: Difficulty::Easy,
            status: None,
            source: None,
            tags: vec![],
        };
        assert!(req.validate().is_err());

        let req = CreateQuestionRequest { options: opts(2), ..req };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_status_transitions() {
        use QuestionStatus::*;
        assert!(QuestionStatus::can_transition(Some(Draft), Review));
        assert!(QuestionStatus::can_transition(Some(Review), Validated));
        assert!(QuestionStatus::can_transition(Some(Validated), Archived));
        assert!(QuestionStatus::can_transition(Some(Archived), Draft));
        assert!(QuestionStatus::can_transition(None, Validated));

        assert!(!QuestionStatus::can_transition(Some(Draft), Validated));
        assert!(!QuestionStatus::can_transition(Some(Archived), Validated));
        assert!(!QuestionStatus::can_transition(Some(Review), Review));
    }

    #[test]
    fn test_difficulty_parsing() {
        assert_eq!("Medium".parse::<Difficulty>().unwrap(), Difficulty::Medium);
        assert!("expert".parse::<Difficulty>().is_err());
    }
}

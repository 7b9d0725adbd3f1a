// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    /// Participation attempted outside the nightly window.
    GateClosed {
        open_time: String,
        close_time: String,
        timezone: String,
    },

    /// The participant already finished today's quiz for this level.
    AlreadyCompleted,

    /// Answer or complete without a prior start.
    NotStarted,

    /// The question was already answered in this attempt; the first answer stands.
    DuplicateAnswer { question_index: i32 },

    /// Not enough eligible questions to provision a quiz.
    InsufficientPool { needed: i64, available: i64 },

    /// Curation refused because attempts already exist.
    QuizLocked,
}

impl AppError {
    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InternalServerError(_) => "internal_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::AuthError(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::GateClosed { .. } => "quiz_closed",
            AppError::AlreadyCompleted => "already_completed",
            AppError::NotStarted => "quiz_not_started",
            AppError::DuplicateAnswer { .. } => "already_answered",
            AppError::InsufficientPool { .. } => "insufficient_question_pool",
            AppError::QuizLocked => "quiz_already_started",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::GateClosed { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_)
            | AppError::AlreadyCompleted
            | AppError::NotStarted
            | AppError::DuplicateAnswer { .. } => StatusCode::CONFLICT,
            AppError::InsufficientPool { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::QuizLocked => StatusCode::LOCKED,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InternalServerError(msg)
            | AppError::BadRequest(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => f.write_str(msg),
            AppError::GateClosed {
                open_time,
                close_time,
                timezone,
            } => write!(
                f,
                "The quiz is only open between {} and {} ({})",
                open_time, close_time, timezone
            ),
            AppError::AlreadyCompleted => f.write_str("You already completed today's quiz"),
            AppError::NotStarted => f.write_str("Quiz not started"),
            AppError::DuplicateAnswer { question_index } => {
                write!(f, "Question {} was already answered", question_index)
            }
            AppError::InsufficientPool { needed, available } => write!(
                f,
                "Insufficient question pool: {} eligible questions, {} needed",
                available, needed
            ),
            AppError::QuizLocked => {
                f.write_str("Quiz already started: its questions can no longer be changed")
            }
        }
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match &self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                json!({ "error": "Internal Server Error", "code": code })
            }
            AppError::GateClosed {
                open_time,
                close_time,
                timezone,
            } => json!({
                "error": self.to_string(),
                "code": code,
                "open_time": open_time,
                "close_time": close_time,
                "timezone": timezone,
            }),
            AppError::DuplicateAnswer { question_index } => json!({
                "error": self.to_string(),
                "code": code,
                "question_index": question_index,
            }),
            AppError::InsufficientPool { needed, available } => {
                tracing::warn!(needed, available, "Question pool exhausted");
                json!({
                    "error": self.to_string(),
                    "code": code,
                    "needed": needed,
                    "available": available,
                })
            }
            _ => json!({ "error": self.to_string(), "code": code }),
        };

        (status, Json(body)).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_status_codes() {
        assert_eq!(AppError::AlreadyCompleted.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::NotStarted.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::QuizLocked.status(), StatusCode::LOCKED);
        assert_eq!(
            AppError::InsufficientPool { needed: 20, available: 3 }.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::GateClosed {
                open_time: "20:00".into(),
                close_time: "23:59".into(),
                timezone: "UTC".into(),
            }
            .status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_codes_are_distinct_for_domain_errors() {
        let codes = [
            AppError::AlreadyCompleted.code(),
            AppError::NotStarted.code(),
            AppError::DuplicateAnswer { question_index: 0 }.code(),
            AppError::InsufficientPool { needed: 1, available: 0 }.code(),
            AppError::QuizLocked.code(),
            AppError::Conflict(String::new()).code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}

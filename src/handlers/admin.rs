// src/handlers/admin.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    engine::{curation, leaderboard, provisioner::get_or_create_daily_quiz, questions},
    error::AppError,
    models::{
        daily_quiz::{QuizTarget, RegenerateRequest, ReorderRequest, ReplaceRequest},
        leaderboard::SummaryParams,
        question::{
            CreateQuestionRequest, ImportQuestionsRequest, QuestionListParams, SetActiveRequest,
            SetStatusRequest, UpdateQuestionRequest,
        },
    },
    state::AppState,
    utils::jwt::Claims,
};

fn target_date(state: &AppState, date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| state.clock.today(state.config.quiz.timezone))
}

/// The quiz for a date and level with correct answers. Not gated; provisions
/// on demand.
pub async fn preview_quiz(
    State(state): State<AppState>,
    Query(target): Query<QuizTarget>,
) -> Result<impl IntoResponse, AppError> {
    let date = target_date(&state, target.date);
    let quiz = get_or_create_daily_quiz(
        &state.pool,
        date,
        target.level,
        state.config.quiz.question_count,
    )
    .await?;

    Ok(Json(quiz))
}

pub async fn reorder_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ReorderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let date = target_date(&state, payload.date);
    tracing::info!(by = %claims.sub, %date, level = %payload.level, "Reorder requested");

    let quiz = curation::reorder(
        &state.pool,
        date,
        payload.level,
        state.config.quiz.question_count,
        &payload.order,
    )
    .await?;

    Ok(Json(quiz))
}

pub async fn replace_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ReplaceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let date = target_date(&state, payload.date);
    tracing::info!(
        by = %claims.sub,
        %date,
        level = %payload.level,
        position = payload.position,
        question_id = payload.question_id,
        "Replace requested"
    );

    let quiz = curation::replace(
        &state.pool,
        date,
        payload.level,
        state.config.quiz.question_count,
        payload.position,
        payload.question_id,
    )
    .await?;

    Ok(Json(quiz))
}

pub async fn regenerate_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RegenerateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let date = target_date(&state, payload.date);
    tracing::info!(by = %claims.sub, %date, level = %payload.level, "Regenerate requested");

    let quiz = curation::regenerate(
        &state.pool,
        date,
        payload.level,
        state.config.quiz.question_count,
        &payload.filters,
    )
    .await?;

    Ok(Json(quiz))
}

pub async fn daily_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> Result<impl IntoResponse, AppError> {
    let date = target_date(&state, params.date);
    let summary = leaderboard::daily_summary(&state.pool, date).await?;
    Ok(Json(summary))
}

pub async fn list_questions(
    State(pool): State<PgPool>,
    Query(params): Query<QuestionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let list = questions::list_questions(&pool, &params).await?;
    Ok(Json(list))
}

pub async fn create_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let question = questions::create_question(&pool, payload, &claims.sub).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn import_questions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ImportQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.questions.is_empty() {
        return Err(AppError::BadRequest("Nothing to import".to_string()));
    }
    let summary = questions::import_questions(&pool, &payload.questions, &claims.sub).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn update_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let question = questions::update_question(&pool, id, payload, &claims.sub).await?;
    Ok(Json(question))
}

pub async fn set_question_status(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SetStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = questions::set_status(&pool, id, payload.status, &claims.sub).await?;
    Ok(Json(question))
}

pub async fn set_question_active(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = questions::set_active(&pool, id, payload.is_active, &claims.sub).await?;
    Ok(Json(question))
}

pub async fn list_question_versions(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let versions = questions::list_versions(&pool, id).await?;
    Ok(Json(versions))
}

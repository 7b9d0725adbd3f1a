// src/handlers/quiz.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    engine::{
        attempts::{self, AnswerSubmission, Participant},
        gate::ensure_open,
        leaderboard,
        notify::{CompletionNotice, dispatch_completion},
        provisioner::{find_daily_quiz, get_or_create_daily_quiz},
    },
    error::AppError,
    models::{
        attempt::{
            CompleteAttemptRequest, StartAttemptRequest, StartAttemptResponse, SubmitAnswerRequest,
        },
        daily_quiz::{DailyQuizResponse, LevelQuery},
        leaderboard::LeaderboardParams,
    },
    state::AppState,
};

/// Today's quiz for a level, without correct answers.
///
/// Provisions the quiz on the first call of the day.
pub async fn get_daily_quiz(
    State(state): State<AppState>,
    Query(params): Query<LevelQuery>,
) -> Result<impl IntoResponse, AppError> {
    let settings = &state.config.quiz;
    let now = state.clock.now();
    ensure_open(now, settings)?;

    let today = state.clock.today(settings.timezone);
    let quiz =
        get_or_create_daily_quiz(&state.pool, today, params.level, settings.question_count).await?;

    Ok(Json(DailyQuizResponse {
        date: quiz.date,
        level: quiz.level,
        total_questions: quiz.questions.len(),
        time_per_question: settings.time_per_question,
        questions: quiz.questions.iter().map(|m| m.to_public()).collect(),
    }))
}

/// Starts (or resumes) the caller's attempt on today's quiz.
pub async fn start_attempt(
    State(state): State<AppState>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let settings = &state.config.quiz;
    let now = state.clock.now();
    ensure_open(now, settings)?;

    let today = state.clock.today(settings.timezone);
    let quiz =
        get_or_create_daily_quiz(&state.pool, today, payload.level, settings.question_count)
            .await?;

    let participant = Participant {
        id: payload.participant_id,
        display_name: payload.display_name.trim().to_string(),
        email: payload.email,
    };
    let (attempt, resumed) =
        attempts::start_attempt(&state.pool, quiz.quiz_id, &participant, now).await?;

    Ok(Json(StartAttemptResponse {
        attempt_id: attempt.id,
        quiz_id: quiz.quiz_id,
        started_at: attempt.started_at,
        resumed,
        current_score: attempt.score,
        total_questions: quiz.questions.len(),
        time_per_question: settings.time_per_question,
    }))
}

pub async fn submit_answer(
    State(state): State<AppState>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let settings = &state.config.quiz;
    ensure_open(state.clock.now(), settings)?;

    let today = state.clock.today(settings.timezone);
    let quiz_id = find_daily_quiz(&state.pool, today, payload.level)
        .await?
        .ok_or(AppError::NotStarted)?;

    let result = attempts::submit_answer(
        &state.pool,
        quiz_id,
        &payload.participant_id,
        AnswerSubmission {
            question_index: payload.question_index,
            selected_index: payload.selected_index,
            time_spent: payload.time_spent,
        },
    )
    .await?;

    Ok(Json(result))
}

/// Finalizes the caller's attempt. Side effects (notification, live
/// leaderboard) fire only for the call that actually completed it.
pub async fn complete_attempt(
    State(state): State<AppState>,
    Json(payload): Json<CompleteAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let settings = &state.config.quiz;
    let now = state.clock.now();
    ensure_open(now, settings)?;

    let today = state.clock.today(settings.timezone);
    let quiz_id = find_daily_quiz(&state.pool, today, payload.level)
        .await?
        .ok_or(AppError::NotStarted)?;

    let (result, attempt, newly_completed) = attempts::complete_attempt(
        &state.pool,
        quiz_id,
        &payload.participant_id,
        now,
        settings.timezone,
    )
    .await?;

    if newly_completed {
        let notice = CompletionNotice::new(
            &attempt.participant_id,
            &attempt.display_name,
            attempt.email.as_deref(),
            &result,
        );
        dispatch_completion(state.notifier.clone(), &state.broadcaster, notice);
    }

    Ok(Json(result))
}

pub async fn weekly_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, AppError> {
    let settings = &state.config.quiz;
    let limit = params.limit.unwrap_or(settings.leaderboard_limit);

    let board =
        leaderboard::weekly_leaderboard(&state.pool, state.clock.now(), settings.timezone, limit)
            .await?;

    Ok(Json(board))
}

pub async fn weekly_rank(
    State(state): State<AppState>,
    Path(participant_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let rank = leaderboard::weekly_rank(
        &state.pool,
        state.clock.now(),
        state.config.quiz.timezone,
        &participant_id,
    )
    .await?;

    Ok(Json(rank))
}

pub async fn quiz_history(
    State(state): State<AppState>,
    Path(participant_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let history = leaderboard::participant_history(&state.pool, &participant_id).await?;
    Ok(Json(history))
}

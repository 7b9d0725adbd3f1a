// src/routes.rs

use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, quiz},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the application router.
///
/// * `/api/quiz`: participation, open to any caller, gated by the nightly window.
/// * `/api/admin/quiz`: curation and question bank, admin JWT required.
pub fn create_router(state: AppState) -> Router {
    let cors = match state.config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new().allow_origin(origin),
        Err(_) => {
            tracing::warn!(origin = %state.config.cors_origin, "Invalid CORS_ORIGIN, CORS disabled");
            CorsLayer::new()
        }
    }
    .allow_methods([Method::GET, Method::POST, Method::PUT])
    .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let quiz_routes = Router::new()
        .route("/daily", get(quiz::get_daily_quiz))
        .route("/daily/start", post(quiz::start_attempt))
        .route("/daily/answer", post(quiz::submit_answer))
        .route("/daily/complete", post(quiz::complete_attempt))
        .route("/leaderboard/weekly", get(quiz::weekly_leaderboard))
        .route("/leaderboard/weekly/{participant_id}", get(quiz::weekly_rank))
        .route("/history/{participant_id}", get(quiz::quiz_history));

    let admin_routes = Router::new()
        .route("/daily", get(admin::preview_quiz))
        .route("/daily/order", put(admin::reorder_quiz))
        .route("/daily/replace", put(admin::replace_question))
        .route("/daily/regenerate", post(admin::regenerate_quiz))
        .route("/summary", get(admin::daily_summary))
        .route(
            "/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route("/questions/import", post(admin::import_questions))
        .route("/questions/{id}", put(admin::update_question))
        .route("/questions/{id}/status", put(admin::set_question_status))
        .route("/questions/{id}/active", put(admin::set_question_active))
        .route("/questions/{id}/versions", get(admin::list_question_versions))
        // Auth runs first, then the role check.
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .nest("/api/quiz", quiz_routes)
        .nest("/api/admin/quiz", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

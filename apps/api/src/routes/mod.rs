pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::engine::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Daily recommendation
        .route(
            "/api/v1/recommendations/daily",
            get(handlers::handle_get_daily),
        )
        .route(
            "/api/v1/recommendations/daily/complete",
            post(handlers::handle_complete_daily),
        )
        .route(
            "/api/v1/recommendations/daily/skip",
            post(handlers::handle_skip_daily),
        )
        .route(
            "/api/v1/recommendations/daily/feedback",
            post(handlers::handle_daily_feedback),
        )
        // Attempts & derived state
        .route("/api/v1/attempts", post(handlers::handle_record_attempt))
        .route("/api/v1/mastery", get(handlers::handle_get_mastery))
        .route("/api/v1/streak", get(handlers::handle_get_streak))
        // Scheduler-facing batch sweeps
        .route(
            "/api/v1/admin/recommendations/generate",
            post(handlers::handle_generate_all),
        )
        .route(
            "/api/v1/admin/mastery/recompute",
            post(handlers::handle_recompute_all),
        )
        .with_state(state)
}

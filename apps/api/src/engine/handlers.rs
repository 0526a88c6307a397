use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::orchestrator::{self, BatchOutcome};
use crate::engine::streak;
use crate::errors::AppError;
use crate::models::mastery::TopicMasteryRow;
use crate::models::progress::{NewAttempt, ProgressRow};
use crate::models::recommendation::{DailyRecommendationRow, RecommendationFeedback};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

/// GET /api/v1/recommendations/daily
pub async fn handle_get_daily(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<DailyRecommendationRow>, AppError> {
    let row =
        orchestrator::get_or_create_daily(&state.db, params.user_id, state.clock.today()).await?;
    Ok(Json(row))
}

#[derive(Deserialize)]
pub struct DailyActionRequest {
    pub user_id: Uuid,
}

/// POST /api/v1/recommendations/daily/complete
pub async fn handle_complete_daily(
    State(state): State<AppState>,
    Json(req): Json<DailyActionRequest>,
) -> Result<Json<DailyRecommendationRow>, AppError> {
    let row = orchestrator::complete_daily(&state.db, req.user_id, state.clock.today()).await?;
    Ok(Json(row))
}

/// POST /api/v1/recommendations/daily/skip
pub async fn handle_skip_daily(
    State(state): State<AppState>,
    Json(req): Json<DailyActionRequest>,
) -> Result<Json<DailyRecommendationRow>, AppError> {
    let row = orchestrator::skip_daily(&state.db, req.user_id, state.clock.today()).await?;
    Ok(Json(row))
}

#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub user_id: Uuid,
    pub feedback: RecommendationFeedback,
}

/// POST /api/v1/recommendations/daily/feedback
pub async fn handle_daily_feedback(
    State(state): State<AppState>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<DailyRecommendationRow>, AppError> {
    let row = orchestrator::submit_feedback(
        &state.db,
        req.user_id,
        state.clock.today(),
        req.feedback,
    )
    .await?;
    Ok(Json(row))
}

#[derive(Deserialize)]
pub struct RecordAttemptRequest {
    pub user_id: Uuid,
    pub problem_id: Uuid,
    pub attempt: NewAttempt,
}

/// POST /api/v1/attempts
pub async fn handle_record_attempt(
    State(state): State<AppState>,
    Json(req): Json<RecordAttemptRequest>,
) -> Result<Json<ProgressRow>, AppError> {
    let row =
        orchestrator::record_attempt(&state.db, req.user_id, req.problem_id, req.attempt).await?;
    Ok(Json(row))
}

/// GET /api/v1/mastery
pub async fn handle_get_mastery(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<TopicMasteryRow>>, AppError> {
    let rows: Vec<TopicMasteryRow> =
        sqlx::query_as("SELECT * FROM topic_mastery WHERE user_id = $1 ORDER BY topic")
            .bind(params.user_id)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(rows))
}

#[derive(Serialize)]
pub struct StreakResponse {
    pub current_streak: u32,
    pub longest_streak: i32,
}

/// GET /api/v1/streak
pub async fn handle_get_streak(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<StreakResponse>, AppError> {
    let current =
        streak::current_streak_for_user(&state.db, params.user_id, state.clock.today()).await?;
    let longest: i32 = sqlx::query_scalar("SELECT longest_streak FROM users WHERE id = $1")
        .bind(params.user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", params.user_id)))?;

    Ok(Json(StreakResponse {
        current_streak: current,
        longest_streak: longest,
    }))
}

/// POST /api/v1/admin/recommendations/generate
/// Scheduler entry point: the daily sweep over all active users.
pub async fn handle_generate_all(
    State(state): State<AppState>,
) -> Result<Json<BatchOutcome>, AppError> {
    let outcome =
        orchestrator::generate_for_all_active(&state.db, state.clock.today()).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/admin/mastery/recompute
/// Scheduler entry point: rescore every (user, topic) pair with progress.
pub async fn handle_recompute_all(
    State(state): State<AppState>,
) -> Result<Json<BatchOutcome>, AppError> {
    let outcome = orchestrator::recompute_all_mastery(&state.db).await?;
    Ok(Json(outcome))
}

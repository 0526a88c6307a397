use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::problem::{Difficulty, Topic};

/// Why a candidate was put in front of the user. Fixed tag set; part of
/// the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationReason {
    DailyRecommendation,
    WeakTopic,
    NewTopic,
    StreakKeeper,
}

/// One entry in a recommendation's candidate list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProblem {
    pub problem_id: Uuid,
    pub topic: Topic,
    pub difficulty: Difficulty,
    pub reason: RecommendationReason,
    pub priority: i32,
    pub score: i32,
}

/// Optional user feedback on a day's recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationFeedback {
    /// 1 (too easy) to 5 (too hard).
    pub difficulty_rating: i32,
    pub helpful: bool,
    pub comment: Option<String>,
}

/// One document per (user, UTC day), enforced by a unique constraint.
/// Once created for a date it is never replaced; repeated reads for the
/// same day return this row unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyRecommendationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub for_date: NaiveDate,
    pub candidates: Json<Vec<CandidateProblem>>,
    pub selected_problem_id: Uuid,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub skipped: bool,
    pub feedback: Option<Json<RecommendationFeedback>>,
    pub created_at: DateTime<Utc>,
}

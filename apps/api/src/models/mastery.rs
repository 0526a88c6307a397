use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::problem::{Difficulty, Topic};

/// Per-difficulty-tier counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBreakdown {
    pub easy: i32,
    pub medium: i32,
    pub hard: i32,
}

impl TierBreakdown {
    pub fn bump(&mut self, tier: Difficulty) {
        match tier {
            Difficulty::Easy => self.easy += 1,
            Difficulty::Medium => self.medium += 1,
            Difficulty::Hard => self.hard += 1,
        }
    }

    pub fn total(&self) -> i32 {
        self.easy + self.medium + self.hard
    }
}

/// Success rates as percentages in [0, 100].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SuccessRates {
    pub easy: f64,
    pub medium: f64,
    pub hard: f64,
    pub overall: f64,
}

/// Mean attempts per solved-or-not progress record, per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierAverages {
    pub easy: f64,
    pub medium: f64,
    pub hard: f64,
}

/// One document per (user, topic) pair, enforced by a unique constraint.
/// Always overwritten wholesale from the current progress records — never
/// patched incrementally, so stored counters cannot drift from the truth.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TopicMasteryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic: Topic,
    pub attempted: Json<TierBreakdown>,
    pub solved: Json<TierBreakdown>,
    pub success_rates: Json<SuccessRates>,
    pub average_attempts: Json<TierAverages>,
    pub mastery_level: i32,
    pub recommended_difficulty: Difficulty,
    pub updated_at: DateTime<Utc>,
}

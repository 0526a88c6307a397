use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "skill_level", rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub skill_level: SkillLevel,
    /// Lifetime solved-problem count; bumped exactly once per problem,
    /// on the first transition into `solved`.
    pub total_solved: i32,
    /// Monotone: only ever raised to a larger current streak.
    pub longest_streak: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

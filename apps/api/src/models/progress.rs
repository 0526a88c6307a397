use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::problem::{Difficulty, Topic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "progress_status", rename_all = "kebab-case")]
pub enum ProgressStatus {
    NotAttempted,
    Attempted,
    Solved,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptResult {
    Pass,
    Fail,
    Partial,
    Timeout,
    Error,
}

/// One submission event. Immutable once appended to a progress record's
/// attempt sequence; insertion order is chronological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// Opaque code payload; the engine never inspects it.
    pub code: String,
    pub language: String,
    pub result: AttemptResult,
    pub time_taken_secs: i32,
    pub test_cases_passed: i32,
    pub test_cases_total: i32,
    pub submitted_at: DateTime<Utc>,
}

impl Attempt {
    /// Pass == every test case passed. This is the only signal that can
    /// move a progress record to `solved`.
    pub fn passed(&self) -> bool {
        self.test_cases_passed == self.test_cases_total
    }
}

/// Attempt payload as submitted by the caller, before it is stamped with
/// a timestamp and appended.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAttempt {
    pub code: String,
    pub language: String,
    pub result: AttemptResult,
    pub time_taken_secs: i32,
    pub test_cases_passed: i32,
    pub test_cases_total: i32,
}

/// One document per (user, problem) pair, enforced by a unique constraint.
/// `difficulty`/`topic` are copied from the problem at creation time; a
/// later problem edit never changes them here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgressRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub problem_id: Uuid,
    pub attempts: Json<Vec<Attempt>>,
    pub status: ProgressStatus,
    pub difficulty: Difficulty,
    pub topic: Topic,
    pub first_attempt_at: Option<DateTime<Utc>>,
    pub solved_at: Option<DateTime<Utc>>,
    pub total_attempts: i32,
    pub best_time_secs: Option<i32>,
    pub hints_used: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Postgres, Type, TypeInfo};

    #[test]
    fn test_progress_status_declares_migration_enum_type() {
        assert_eq!(
            <ProgressStatus as Type<Postgres>>::type_info().name(),
            "progress_status"
        );
    }

    #[test]
    fn test_status_wire_strings_are_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ProgressStatus::NotAttempted).unwrap(),
            "\"not-attempted\""
        );
    }
}

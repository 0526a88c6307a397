//! Composes policy, selector, mastery, and streak into the user-facing
//! operations: today's recommendation, attempt recording, and the batch
//! sweeps the scheduler drives.
//!
//! Uniqueness is enforced by the store, not by in-process locks: a unique
//! violation on insert means another request won the race, and the loser
//! re-reads the winner's row.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::mastery;
use crate::engine::policy::{self, NextFocus, PolicySnapshot};
use crate::engine::selector;
use crate::engine::streak;
use crate::errors::{is_unique_violation, AppError};
use crate::models::mastery::TopicMasteryRow;
use crate::models::problem::{Difficulty, ProblemRow, Topic};
use crate::models::progress::{Attempt, NewAttempt, ProgressRow, ProgressStatus};
use crate::models::recommendation::{
    CandidateProblem, DailyRecommendationRow, RecommendationFeedback, RecommendationReason,
};
use crate::models::user::UserRow;

/// Per-item tallies for a batch sweep. Failures are isolated and counted,
/// never allowed to abort the rest of the batch.
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub succeeded: u32,
    pub skipped: u32,
    pub failed: u32,
}

// ────────────────────────────────────────────────────────────────────────────
// Daily recommendation
// ────────────────────────────────────────────────────────────────────────────

/// Idempotent get-or-create for the user's recommendation on `date`.
///
/// An existing row is returned unchanged with no side effects — this is
/// what keeps the day's recommendation stable across page reloads. A new
/// row carries one candidate tagged `daily_recommendation`.
pub async fn get_or_create_daily(
    pool: &PgPool,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<DailyRecommendationRow, AppError> {
    if let Some(existing) = find_daily(pool, user_id, date).await? {
        return Ok(existing);
    }

    let user: UserRow = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

    // Personalization failures must not take the daily recommendation
    // down; degrade to the unconditional default instead.
    let focus = match build_focus(pool, &user).await {
        Ok(focus) => focus,
        Err(e) => {
            warn!("Topic progression failed for user {user_id}, using default focus: {e}");
            NextFocus {
                topic: Some(Topic::Arrays),
                difficulty: Difficulty::Easy,
            }
        }
    };

    let problem = selector::pick_problem(pool, focus.topic, focus.difficulty).await?;
    let candidate = CandidateProblem {
        problem_id: problem.id,
        topic: problem.topic,
        difficulty: problem.difficulty,
        reason: RecommendationReason::DailyRecommendation,
        priority: 1,
        score: 100,
    };

    let inserted = sqlx::query_as::<_, DailyRecommendationRow>(
        r#"
        INSERT INTO daily_recommendations
            (id, user_id, for_date, candidates, selected_problem_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(date)
    .bind(Json(vec![candidate]))
    .bind(problem.id)
    .fetch_one(pool)
    .await;

    match resolve_insert_race(inserted)? {
        Some(row) => {
            info!(
                "Created daily recommendation for user {user_id} on {date}: problem {}",
                problem.id
            );
            Ok(row)
        }
        // Lost the insert race for (user, date): re-read the winner's row.
        None => find_daily(pool, user_id, date).await?.ok_or_else(|| {
            AppError::Conflict(format!(
                "Recommendation for user {user_id} on {date} exists but could not be re-read"
            ))
        }),
    }
}

/// Interprets an insert result against a unique constraint: `Ok(None)`
/// means another request won the race and the caller must re-read the
/// winner's row; any other database error propagates.
fn resolve_insert_race<T>(inserted: Result<T, sqlx::Error>) -> Result<Option<T>, AppError> {
    match inserted {
        Ok(row) => Ok(Some(row)),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn find_daily(
    pool: &PgPool,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<Option<DailyRecommendationRow>, AppError> {
    Ok(sqlx::query_as(
        "SELECT * FROM daily_recommendations WHERE user_id = $1 AND for_date = $2",
    )
    .bind(user_id)
    .bind(date)
    .fetch_optional(pool)
    .await?)
}

/// Loads the policy inputs and runs the progression rules. Mastery rows
/// come back oldest-first so the rule-2 tie-break is stable.
async fn build_focus(pool: &PgPool, user: &UserRow) -> Result<NextFocus, AppError> {
    let has_any_progress: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM progress WHERE user_id = $1)")
            .bind(user.id)
            .fetch_one(pool)
            .await?;

    let masteries: Vec<TopicMasteryRow> =
        sqlx::query_as("SELECT * FROM topic_mastery WHERE user_id = $1 ORDER BY updated_at ASC")
            .bind(user.id)
            .fetch_all(pool)
            .await?;

    let attempted: Vec<Topic> =
        sqlx::query_scalar("SELECT DISTINCT topic FROM progress WHERE user_id = $1")
            .bind(user.id)
            .fetch_all(pool)
            .await?;

    Ok(policy::next_focus(&PolicySnapshot {
        has_any_progress,
        skill_level: user.skill_level,
        masteries,
        attempted_topics: attempted.into_iter().collect(),
    }))
}

/// Marks the day's recommendation completed (timestamp set once) and
/// raises the user's longest streak if the current one now exceeds it.
pub async fn complete_daily(
    pool: &PgPool,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<DailyRecommendationRow, AppError> {
    let row = sqlx::query_as::<_, DailyRecommendationRow>(
        r#"
        UPDATE daily_recommendations
        SET completed = TRUE, completed_at = COALESCE(completed_at, now())
        WHERE user_id = $1 AND for_date = $2
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("No recommendation for user {user_id} on {date}")))?;

    let current = streak::current_streak_for_user(pool, user_id, date).await?;
    sqlx::query("UPDATE users SET longest_streak = GREATEST(longest_streak, $1) WHERE id = $2")
        .bind(current as i32)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(row)
}

pub async fn skip_daily(
    pool: &PgPool,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<DailyRecommendationRow, AppError> {
    sqlx::query_as::<_, DailyRecommendationRow>(
        r#"
        UPDATE daily_recommendations
        SET skipped = TRUE
        WHERE user_id = $1 AND for_date = $2
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("No recommendation for user {user_id} on {date}")))
}

pub async fn submit_feedback(
    pool: &PgPool,
    user_id: Uuid,
    date: NaiveDate,
    feedback: RecommendationFeedback,
) -> Result<DailyRecommendationRow, AppError> {
    if !(1..=5).contains(&feedback.difficulty_rating) {
        return Err(AppError::Validation(
            "difficulty_rating must be between 1 and 5".to_string(),
        ));
    }

    sqlx::query_as::<_, DailyRecommendationRow>(
        r#"
        UPDATE daily_recommendations
        SET feedback = $3
        WHERE user_id = $1 AND for_date = $2
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(Json(feedback))
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("No recommendation for user {user_id} on {date}")))
}

// ────────────────────────────────────────────────────────────────────────────
// Attempt recording
// ────────────────────────────────────────────────────────────────────────────

/// Appends an attempt to the user's progress for the problem, creating
/// the progress record on first contact, then synchronously rescores the
/// topic's mastery.
pub async fn record_attempt(
    pool: &PgPool,
    user_id: Uuid,
    problem_id: Uuid,
    new_attempt: NewAttempt,
) -> Result<ProgressRow, AppError> {
    validate_attempt(&new_attempt)?;

    let problem: ProblemRow =
        sqlx::query_as("SELECT * FROM problems WHERE id = $1 AND is_active = TRUE")
            .bind(problem_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Problem {problem_id} not found")))?;

    let mut progress = get_or_create_progress(pool, user_id, &problem).await?;

    let attempt = Attempt {
        code: new_attempt.code,
        language: new_attempt.language,
        result: new_attempt.result,
        time_taken_secs: new_attempt.time_taken_secs,
        test_cases_passed: new_attempt.test_cases_passed,
        test_cases_total: new_attempt.test_cases_total,
        submitted_at: Utc::now(),
    };
    let outcome = apply_attempt(&mut progress, attempt);

    sqlx::query(
        r#"
        UPDATE progress
        SET attempts = $1, status = $2, first_attempt_at = $3, solved_at = $4,
            total_attempts = $5, best_time_secs = $6
        WHERE id = $7
        "#,
    )
    .bind(&progress.attempts)
    .bind(progress.status)
    .bind(progress.first_attempt_at)
    .bind(progress.solved_at)
    .bind(progress.total_attempts)
    .bind(progress.best_time_secs)
    .bind(progress.id)
    .execute(pool)
    .await?;

    if outcome.newly_solved {
        sqlx::query("UPDATE users SET total_solved = total_solved + 1 WHERE id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        info!("User {user_id} solved problem {problem_id}");
    }

    mastery::recompute_mastery(pool, user_id, progress.topic).await?;

    Ok(progress)
}

pub struct AttemptOutcome {
    /// True only on the first transition into `solved` — the lifetime
    /// solved counter must be bumped exactly once per problem.
    pub newly_solved: bool,
}

/// Pure progress mutation. Solved is sticky: once a record is solved,
/// later attempts never move `solved_at` or revert the status.
pub fn apply_attempt(progress: &mut ProgressRow, attempt: Attempt) -> AttemptOutcome {
    let now = attempt.submitted_at;
    if progress.first_attempt_at.is_none() {
        progress.first_attempt_at = Some(now);
    }

    let passed = attempt.passed();
    let mut newly_solved = false;
    if progress.status != ProgressStatus::Solved {
        if passed {
            progress.status = ProgressStatus::Solved;
            progress.solved_at = Some(now);
            newly_solved = true;
        } else {
            progress.status = ProgressStatus::Attempted;
        }
    }

    if passed {
        progress.best_time_secs = Some(match progress.best_time_secs {
            Some(best) => best.min(attempt.time_taken_secs),
            None => attempt.time_taken_secs,
        });
    }

    progress.attempts.0.push(attempt);
    progress.total_attempts = progress.attempts.0.len() as i32;

    AttemptOutcome { newly_solved }
}

fn validate_attempt(attempt: &NewAttempt) -> Result<(), AppError> {
    if attempt.code.trim().is_empty() {
        return Err(AppError::Validation("code must not be empty".to_string()));
    }
    if attempt.language.trim().is_empty() {
        return Err(AppError::Validation("language must not be empty".to_string()));
    }
    if attempt.time_taken_secs < 0 {
        return Err(AppError::Validation(
            "time_taken_secs must not be negative".to_string(),
        ));
    }
    if attempt.test_cases_total < 1 {
        return Err(AppError::Validation(
            "test_cases_total must be at least 1".to_string(),
        ));
    }
    if !(0..=attempt.test_cases_total).contains(&attempt.test_cases_passed) {
        return Err(AppError::Validation(
            "test_cases_passed must be between 0 and test_cases_total".to_string(),
        ));
    }
    Ok(())
}

/// Difficulty and topic are copied from the problem here, at creation
/// time; a later problem edit never changes an existing record.
async fn get_or_create_progress(
    pool: &PgPool,
    user_id: Uuid,
    problem: &ProblemRow,
) -> Result<ProgressRow, AppError> {
    if let Some(existing) = find_progress(pool, user_id, problem.id).await? {
        return Ok(existing);
    }

    let inserted = sqlx::query_as::<_, ProgressRow>(
        r#"
        INSERT INTO progress (id, user_id, problem_id, difficulty, topic)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(problem.id)
    .bind(problem.difficulty)
    .bind(problem.topic)
    .fetch_one(pool)
    .await;

    match resolve_insert_race(inserted)? {
        Some(row) => Ok(row),
        // Lost the insert race for (user, problem): re-read the winner's row.
        None => find_progress(pool, user_id, problem.id)
            .await?
            .ok_or_else(|| {
                AppError::Conflict(format!(
                    "Progress for user {user_id} problem {} exists but could not be re-read",
                    problem.id
                ))
            }),
    }
}

async fn find_progress(
    pool: &PgPool,
    user_id: Uuid,
    problem_id: Uuid,
) -> Result<Option<ProgressRow>, AppError> {
    Ok(
        sqlx::query_as("SELECT * FROM progress WHERE user_id = $1 AND problem_id = $2")
            .bind(user_id)
            .bind(problem_id)
            .fetch_optional(pool)
            .await?,
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Batch sweeps (scheduler-facing)
// ────────────────────────────────────────────────────────────────────────────

/// Generates the day's recommendation for every active user. Users who
/// already have a row for `date` are skipped before generation; one
/// user's failure never aborts the rest.
pub async fn generate_for_all_active(
    pool: &PgPool,
    date: NaiveDate,
) -> Result<BatchOutcome, AppError> {
    let user_ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE is_active = TRUE")
        .fetch_all(pool)
        .await?;

    let mut outcome = BatchOutcome::default();
    for user_id in user_ids {
        match find_daily(pool, user_id, date).await {
            Ok(Some(_)) => outcome.skipped += 1,
            Ok(None) => match get_or_create_daily(pool, user_id, date).await {
                Ok(_) => outcome.succeeded += 1,
                Err(e) => {
                    error!("Daily generation failed for user {user_id}: {e}");
                    outcome.failed += 1;
                }
            },
            Err(e) => {
                error!("Daily lookup failed for user {user_id}: {e}");
                outcome.failed += 1;
            }
        }
    }

    info!(
        "Daily generation sweep for {date}: {} generated, {} skipped, {} failed",
        outcome.succeeded, outcome.skipped, outcome.failed
    );
    Ok(outcome)
}

/// Rescores every (user, topic) pair that has progress records.
pub async fn recompute_all_mastery(pool: &PgPool) -> Result<BatchOutcome, AppError> {
    let pairs: Vec<(Uuid, Topic)> =
        sqlx::query_as("SELECT DISTINCT user_id, topic FROM progress")
            .fetch_all(pool)
            .await?;

    let mut outcome = BatchOutcome::default();
    for (user_id, topic) in pairs {
        match mastery::recompute_mastery(pool, user_id, topic).await {
            Ok(_) => outcome.succeeded += 1,
            Err(e) => {
                error!("Mastery recompute failed for user {user_id} topic {topic:?}: {e}");
                outcome.failed += 1;
            }
        }
    }

    info!(
        "Mastery sweep: {} recomputed, {} failed",
        outcome.succeeded, outcome.failed
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::progress::AttemptResult;
    use chrono::Duration;

    fn empty_progress() -> ProgressRow {
        ProgressRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            problem_id: Uuid::new_v4(),
            attempts: Json(vec![]),
            status: ProgressStatus::NotAttempted,
            difficulty: Difficulty::Easy,
            topic: Topic::Arrays,
            first_attempt_at: None,
            solved_at: None,
            total_attempts: 0,
            best_time_secs: None,
            hints_used: 0,
        }
    }

    fn attempt(passed: i32, total: i32, time_secs: i32) -> Attempt {
        Attempt {
            code: "fn main() {}".to_string(),
            language: "rust".to_string(),
            result: if passed == total {
                AttemptResult::Pass
            } else {
                AttemptResult::Fail
            },
            time_taken_secs: time_secs,
            test_cases_passed: passed,
            test_cases_total: total,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_total_attempts_tracks_sequence_length() {
        let mut progress = empty_progress();
        for n in 1..=5 {
            apply_attempt(&mut progress, attempt(0, 3, 60));
            assert_eq!(progress.total_attempts, n);
            assert_eq!(progress.attempts.0.len() as i32, n);
        }
    }

    #[test]
    fn test_full_pass_solves() {
        let mut progress = empty_progress();
        let outcome = apply_attempt(&mut progress, attempt(3, 3, 120));
        assert!(outcome.newly_solved);
        assert_eq!(progress.status, ProgressStatus::Solved);
        assert!(progress.solved_at.is_some());
    }

    #[test]
    fn test_partial_pass_is_attempted() {
        let mut progress = empty_progress();
        let outcome = apply_attempt(&mut progress, attempt(2, 3, 120));
        assert!(!outcome.newly_solved);
        assert_eq!(progress.status, ProgressStatus::Attempted);
        assert!(progress.solved_at.is_none());
    }

    #[test]
    fn test_solved_is_sticky() {
        let mut progress = empty_progress();
        apply_attempt(&mut progress, attempt(3, 3, 120));
        let solved_at = progress.solved_at;

        // A later failing attempt must not revert status or move solved_at.
        let outcome = apply_attempt(&mut progress, attempt(0, 3, 60));
        assert!(!outcome.newly_solved);
        assert_eq!(progress.status, ProgressStatus::Solved);
        assert_eq!(progress.solved_at, solved_at);
        assert_eq!(progress.total_attempts, 2);
    }

    #[test]
    fn test_newly_solved_fires_once() {
        let mut progress = empty_progress();
        assert!(apply_attempt(&mut progress, attempt(3, 3, 120)).newly_solved);
        assert!(!apply_attempt(&mut progress, attempt(3, 3, 90)).newly_solved);
    }

    #[test]
    fn test_first_attempt_at_set_once() {
        let mut progress = empty_progress();
        let mut early = attempt(0, 3, 10);
        early.submitted_at = Utc::now() - Duration::hours(2);
        apply_attempt(&mut progress, early);
        let first = progress.first_attempt_at;
        assert!(first.is_some());

        apply_attempt(&mut progress, attempt(0, 3, 10));
        assert_eq!(progress.first_attempt_at, first);
    }

    #[test]
    fn test_best_time_tracks_fastest_pass() {
        let mut progress = empty_progress();
        apply_attempt(&mut progress, attempt(1, 3, 30)); // fail: no best time
        assert_eq!(progress.best_time_secs, None);
        apply_attempt(&mut progress, attempt(3, 3, 200));
        assert_eq!(progress.best_time_secs, Some(200));
        apply_attempt(&mut progress, attempt(3, 3, 90));
        assert_eq!(progress.best_time_secs, Some(90));
        apply_attempt(&mut progress, attempt(3, 3, 150));
        assert_eq!(progress.best_time_secs, Some(90));
    }

    fn valid_attempt() -> NewAttempt {
        NewAttempt {
            code: "fn main() {}".to_string(),
            language: "rust".to_string(),
            result: AttemptResult::Pass,
            time_taken_secs: 60,
            test_cases_passed: 3,
            test_cases_total: 3,
        }
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        assert!(validate_attempt(&valid_attempt()).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_code() {
        let mut a = valid_attempt();
        a.code = "   ".to_string();
        assert!(matches!(
            validate_attempt(&a),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_negative_time() {
        let mut a = valid_attempt();
        a.time_taken_secs = -1;
        assert!(matches!(
            validate_attempt(&a),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_passed_above_total() {
        let mut a = valid_attempt();
        a.test_cases_passed = 5;
        a.test_cases_total = 3;
        assert!(matches!(
            validate_attempt(&a),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_test_cases() {
        let mut a = valid_attempt();
        a.test_cases_passed = 0;
        a.test_cases_total = 0;
        assert!(matches!(
            validate_attempt(&a),
            Err(AppError::Validation(_))
        ));
    }

    // Stands in for Postgres rejecting an insert on a UNIQUE constraint.
    #[derive(Debug)]
    struct DuplicateKey;

    impl std::fmt::Display for DuplicateKey {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("duplicate key value violates unique constraint")
        }
    }

    impl std::error::Error for DuplicateKey {}

    impl sqlx::error::DatabaseError for DuplicateKey {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn test_won_insert_race_returns_row() {
        let resolved = resolve_insert_race(Ok(7)).unwrap();
        assert_eq!(resolved, Some(7));
    }

    #[test]
    fn test_lost_insert_race_resolves_to_re_read() {
        // A second creation attempt for the same (user, day) must read as
        // "recommendation already exists", never as a fatal error.
        let lost: Result<i32, sqlx::Error> =
            Err(sqlx::Error::Database(Box::new(DuplicateKey)));
        let resolved = resolve_insert_race(lost).unwrap();
        assert_eq!(resolved, None);
    }

    #[test]
    fn test_other_database_errors_still_propagate() {
        let failed: Result<i32, sqlx::Error> = Err(sqlx::Error::PoolClosed);
        assert!(matches!(
            resolve_insert_race(failed),
            Err(AppError::Database(_))
        ));
    }
}

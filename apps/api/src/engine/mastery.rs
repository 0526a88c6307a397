//! Topic mastery scoring.
//!
//! Mastery is always recomputed wholesale from the user's current progress
//! records for the topic — never patched incrementally — so the stored
//! counters cannot drift from ground truth. `compute_topic_mastery` is a
//! pure function of those records; `recompute_mastery` is the store-facing
//! wrapper that loads them and overwrites the `topic_mastery` row.

use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::mastery::{SuccessRates, TierAverages, TierBreakdown, TopicMasteryRow};
use crate::models::problem::{Difficulty, Topic};
use crate::models::progress::{ProgressRow, ProgressStatus};

/// The full derived state of one (user, topic) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasteryStats {
    pub attempted: TierBreakdown,
    pub solved: TierBreakdown,
    pub success_rates: SuccessRates,
    pub average_attempts: TierAverages,
    pub mastery_level: i32,
    pub recommended_difficulty: Difficulty,
}

/// Scores one topic from the user's progress records for it.
///
/// Score = 0.6 × overall success rate
///       + difficulty bonus (medium/hard solves weighted 1.5/2.5, ×25)
///       + consistency bonus (attempt volume, capped at 10 records, ×15),
/// clamped to [0, 100]. With zero attempted records the level stays at
/// `prior_level` (default 0 for a new pair) and everything else is 0.
pub fn compute_topic_mastery(prior_level: i32, records: &[ProgressRow]) -> MasteryStats {
    let mut attempted = TierBreakdown::default();
    let mut solved = TierBreakdown::default();
    for record in records {
        attempted.bump(record.difficulty);
        if record.status == ProgressStatus::Solved {
            solved.bump(record.difficulty);
        }
    }

    let total_attempted = attempted.total();
    let total_solved = solved.total();

    if total_attempted == 0 {
        let level = prior_level.clamp(0, 100);
        return MasteryStats {
            attempted,
            solved,
            success_rates: SuccessRates::default(),
            average_attempts: TierAverages::default(),
            mastery_level: level,
            recommended_difficulty: recommended_difficulty(level),
        };
    }

    let overall_rate = total_solved as f64 / total_attempted as f64 * 100.0;
    let base = overall_rate * 0.6;

    // Rewards solving harder problems over easy ones at equal solve count.
    let difficulty_bonus = (solved.medium as f64 * 1.5 + solved.hard as f64 * 2.5)
        / total_solved.max(1) as f64
        * 25.0;

    // Caps out once the user has attempted >= 10 problems in the topic.
    let consistency_bonus = (total_attempted as f64 / 10.0).min(1.0) * 15.0;

    let mastery_level = ((base + difficulty_bonus + consistency_bonus).min(100.0).round() as i32)
        .clamp(0, 100);

    let success_rates = SuccessRates {
        easy: tier_rate(solved.easy, attempted.easy),
        medium: tier_rate(solved.medium, attempted.medium),
        hard: tier_rate(solved.hard, attempted.hard),
        overall: overall_rate,
    };

    let average_attempts = TierAverages {
        easy: tier_average(records, Difficulty::Easy, attempted.easy),
        medium: tier_average(records, Difficulty::Medium, attempted.medium),
        hard: tier_average(records, Difficulty::Hard, attempted.hard),
    };

    MasteryStats {
        attempted,
        solved,
        success_rates,
        average_attempts,
        mastery_level,
        recommended_difficulty: recommended_difficulty(mastery_level),
    }
}

/// Lower-inclusive boundaries: <40 easy, 40–69 medium, >=70 hard.
pub fn recommended_difficulty(mastery_level: i32) -> Difficulty {
    if mastery_level < 40 {
        Difficulty::Easy
    } else if mastery_level < 70 {
        Difficulty::Medium
    } else {
        Difficulty::Hard
    }
}

fn tier_rate(solved: i32, attempted: i32) -> f64 {
    if attempted > 0 {
        solved as f64 / attempted as f64 * 100.0
    } else {
        0.0
    }
}

fn tier_average(records: &[ProgressRow], tier: Difficulty, attempted: i32) -> f64 {
    if attempted == 0 {
        return 0.0;
    }
    records
        .iter()
        .filter(|r| r.difficulty == tier)
        .map(|r| r.total_attempts as f64)
        .sum::<f64>()
        / attempted as f64
}

/// Reloads every progress record for (user, topic), rescores, and
/// overwrites the mastery row. Safe to call redundantly; two concurrent
/// calls for the same pair race harmlessly to the same derived value.
pub async fn recompute_mastery(
    pool: &PgPool,
    user_id: Uuid,
    topic: Topic,
) -> Result<TopicMasteryRow, AppError> {
    let records: Vec<ProgressRow> =
        sqlx::query_as("SELECT * FROM progress WHERE user_id = $1 AND topic = $2")
            .bind(user_id)
            .bind(topic)
            .fetch_all(pool)
            .await?;

    let prior_level: Option<i32> =
        sqlx::query_scalar("SELECT mastery_level FROM topic_mastery WHERE user_id = $1 AND topic = $2")
            .bind(user_id)
            .bind(topic)
            .fetch_optional(pool)
            .await?;

    let stats = compute_topic_mastery(prior_level.unwrap_or(0), &records);

    let row = sqlx::query_as::<_, TopicMasteryRow>(
        r#"
        INSERT INTO topic_mastery
            (id, user_id, topic, attempted, solved, success_rates,
             average_attempts, mastery_level, recommended_difficulty, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
        ON CONFLICT (user_id, topic) DO UPDATE SET
            attempted = EXCLUDED.attempted,
            solved = EXCLUDED.solved,
            success_rates = EXCLUDED.success_rates,
            average_attempts = EXCLUDED.average_attempts,
            mastery_level = EXCLUDED.mastery_level,
            recommended_difficulty = EXCLUDED.recommended_difficulty,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(topic)
    .bind(Json(stats.attempted))
    .bind(Json(stats.solved))
    .bind(Json(stats.success_rates))
    .bind(Json(stats.average_attempts))
    .bind(stats.mastery_level)
    .bind(stats.recommended_difficulty)
    .fetch_one(pool)
    .await?;

    debug!(
        "Recomputed mastery for user {user_id} topic {topic:?}: level {}",
        row.mastery_level
    );

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(difficulty: Difficulty, status: ProgressStatus, total_attempts: i32) -> ProgressRow {
        ProgressRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            problem_id: Uuid::new_v4(),
            attempts: Json(vec![]),
            status,
            difficulty,
            topic: Topic::Arrays,
            first_attempt_at: None,
            solved_at: None,
            total_attempts,
            best_time_secs: None,
            hints_used: 0,
        }
    }

    #[test]
    fn test_zero_records_keeps_prior_level() {
        let stats = compute_topic_mastery(42, &[]);
        assert_eq!(stats.mastery_level, 42);
        assert_eq!(stats.success_rates.overall, 0.0);
        assert_eq!(stats.average_attempts.easy, 0.0);
        assert_eq!(stats.recommended_difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_new_pair_defaults_to_zero() {
        let stats = compute_topic_mastery(0, &[]);
        assert_eq!(stats.mastery_level, 0);
        assert_eq!(stats.recommended_difficulty, Difficulty::Easy);
    }

    #[test]
    fn test_formula_mixed_tiers() {
        // 3 easy (2 solved), 1 medium (solved): success rate 75 -> base 45;
        // difficulty bonus (1 * 1.5) / 3 * 25 = 12.5; consistency 4/10 * 15 = 6;
        // total 63.5 -> rounds to 64.
        let records = vec![
            record(Difficulty::Easy, ProgressStatus::Solved, 1),
            record(Difficulty::Easy, ProgressStatus::Solved, 3),
            record(Difficulty::Easy, ProgressStatus::Attempted, 2),
            record(Difficulty::Medium, ProgressStatus::Solved, 4),
        ];
        let stats = compute_topic_mastery(0, &records);
        assert_eq!(stats.mastery_level, 64);
        assert_eq!(stats.recommended_difficulty, Difficulty::Medium);
        assert_eq!(stats.attempted.easy, 3);
        assert_eq!(stats.solved.easy, 2);
        assert!((stats.success_rates.overall - 75.0).abs() < 1e-9);
        assert!((stats.success_rates.easy - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.success_rates.medium, 100.0);
        assert_eq!(stats.success_rates.hard, 0.0);
        assert!((stats.average_attempts.easy - 2.0).abs() < 1e-9);
        assert!((stats.average_attempts.medium - 4.0).abs() < 1e-9);
        assert_eq!(stats.average_attempts.hard, 0.0);
    }

    #[test]
    fn test_level_clamped_to_100() {
        // 10 hard solves: 60 + 62.5 + 15 = 137.5, clamped.
        let records: Vec<_> = (0..10)
            .map(|_| record(Difficulty::Hard, ProgressStatus::Solved, 1))
            .collect();
        let stats = compute_topic_mastery(0, &records);
        assert_eq!(stats.mastery_level, 100);
        assert_eq!(stats.recommended_difficulty, Difficulty::Hard);
    }

    #[test]
    fn test_no_solves_no_divide_by_zero() {
        let records = vec![
            record(Difficulty::Easy, ProgressStatus::Attempted, 2),
            record(Difficulty::Medium, ProgressStatus::Attempted, 1),
        ];
        let stats = compute_topic_mastery(0, &records);
        // base 0, difficulty bonus 0, consistency 2/10 * 15 = 3.
        assert_eq!(stats.mastery_level, 3);
        assert_eq!(stats.solved.total(), 0);
    }

    #[test]
    fn test_recomputation_is_idempotent() {
        let records = vec![
            record(Difficulty::Easy, ProgressStatus::Solved, 2),
            record(Difficulty::Hard, ProgressStatus::Attempted, 5),
        ];
        let first = compute_topic_mastery(0, &records);
        let second = compute_topic_mastery(first.mastery_level, &records);
        assert_eq!(first, second);
    }

    #[test]
    fn test_consistency_bonus_caps_at_ten_attempts() {
        let ten: Vec<_> = (0..10)
            .map(|_| record(Difficulty::Easy, ProgressStatus::Attempted, 1))
            .collect();
        let twenty: Vec<_> = (0..20)
            .map(|_| record(Difficulty::Easy, ProgressStatus::Attempted, 1))
            .collect();
        assert_eq!(
            compute_topic_mastery(0, &ten).mastery_level,
            compute_topic_mastery(0, &twenty).mastery_level
        );
    }

    #[test]
    fn test_recommended_difficulty_boundaries() {
        assert_eq!(recommended_difficulty(0), Difficulty::Easy);
        assert_eq!(recommended_difficulty(39), Difficulty::Easy);
        assert_eq!(recommended_difficulty(40), Difficulty::Medium);
        assert_eq!(recommended_difficulty(69), Difficulty::Medium);
        assert_eq!(recommended_difficulty(70), Difficulty::Hard);
        assert_eq!(recommended_difficulty(100), Difficulty::Hard);
    }

    #[test]
    fn test_harder_solves_score_higher_at_equal_count() {
        let easy = vec![record(Difficulty::Easy, ProgressStatus::Solved, 1)];
        let hard = vec![record(Difficulty::Hard, ProgressStatus::Solved, 1)];
        assert!(
            compute_topic_mastery(0, &hard).mastery_level
                > compute_topic_mastery(0, &easy).mastery_level
        );
    }
}

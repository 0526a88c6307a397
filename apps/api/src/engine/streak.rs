//! Consecutive-day completion streaks, derived from recommendation history.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;

/// The walk never looks further back than this many days.
pub const LOOKBACK_DAYS: u32 = 30;

/// Walks backward day by day from `as_of` (inclusive), counting
/// consecutive days with a completed recommendation. Stops at the first
/// missing day; capped at [`LOOKBACK_DAYS`].
pub fn current_streak(completed_days: &HashSet<NaiveDate>, as_of: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut day = as_of;
    while streak < LOOKBACK_DAYS && completed_days.contains(&day) {
        streak += 1;
        day = day - Duration::days(1);
    }
    streak
}

/// Loads the user's completed recommendation days inside the lookback
/// window and walks them.
pub async fn current_streak_for_user(
    pool: &PgPool,
    user_id: Uuid,
    as_of: NaiveDate,
) -> Result<u32, AppError> {
    let window_start = as_of - Duration::days(i64::from(LOOKBACK_DAYS) - 1);
    let days: Vec<NaiveDate> = sqlx::query_scalar(
        r#"
        SELECT for_date FROM daily_recommendations
        WHERE user_id = $1 AND completed AND for_date BETWEEN $2 AND $3
        "#,
    )
    .bind(user_id)
    .bind(window_start)
    .bind(as_of)
    .fetch_all(pool)
    .await?;

    Ok(current_streak(&days.into_iter().collect(), as_of))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap() - Duration::days(n)
    }

    #[test]
    fn test_three_consecutive_days() {
        let completed: HashSet<_> = [day(0), day(1), day(2)].into_iter().collect();
        assert_eq!(current_streak(&completed, day(0)), 3);
    }

    #[test]
    fn test_gap_stops_the_walk() {
        // day(3) missing: only 0..=2 count even though day(4) is completed.
        let completed: HashSet<_> = [day(0), day(1), day(2), day(4)].into_iter().collect();
        assert_eq!(current_streak(&completed, day(0)), 3);
    }

    #[test]
    fn test_as_of_day_missing_means_zero() {
        let completed: HashSet<_> = [day(1), day(2)].into_iter().collect();
        assert_eq!(current_streak(&completed, day(0)), 0);
    }

    #[test]
    fn test_capped_at_thirty_days() {
        let completed: HashSet<_> = (0..45).map(day).collect();
        assert_eq!(current_streak(&completed, day(0)), LOOKBACK_DAYS);
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(current_streak(&HashSet::new(), day(0)), 0);
    }
}

//! Uniform problem selection.
//!
//! Selection draws a uniformly random index over the filtered, active-only
//! candidate set — never "first match", which would bias toward insertion
//! order. An empty filtered set falls back to any active problem; an empty
//! active catalog is the caller's NotFound.

use rand::Rng;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::problem::{Difficulty, ProblemRow, Topic};

/// Picks one active problem matching the filters, uniformly at random.
/// `topic = None` means any topic. Falls back to the whole active catalog
/// when nothing matches the filters.
pub fn select_from_catalog<'a, R: Rng>(
    catalog: &'a [ProblemRow],
    topic: Option<Topic>,
    difficulty: Difficulty,
    rng: &mut R,
) -> Option<&'a ProblemRow> {
    let matching: Vec<&ProblemRow> = catalog
        .iter()
        .filter(|p| {
            p.is_active
                && p.difficulty == difficulty
                && topic.map_or(true, |t| p.topic == t)
        })
        .collect();
    if let Some(problem) = choose_uniform(&matching, rng) {
        return Some(problem);
    }

    let any_active: Vec<&ProblemRow> = catalog.iter().filter(|p| p.is_active).collect();
    choose_uniform(&any_active, rng)
}

fn choose_uniform<'a, R: Rng>(candidates: &[&'a ProblemRow], rng: &mut R) -> Option<&'a ProblemRow> {
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[rng.gen_range(0..candidates.len())])
}

/// Store-facing wrapper: loads the active catalog and draws from it.
pub async fn pick_problem(
    pool: &PgPool,
    topic: Option<Topic>,
    difficulty: Difficulty,
) -> Result<ProblemRow, AppError> {
    let catalog: Vec<ProblemRow> =
        sqlx::query_as("SELECT * FROM problems WHERE is_active = TRUE")
            .fetch_all(pool)
            .await?;

    select_from_catalog(&catalog, topic, difficulty, &mut rand::thread_rng())
        .cloned()
        .ok_or_else(|| AppError::NotFound("No active problems in the catalog".to_string()))
}

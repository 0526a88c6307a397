use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// The closed topic set. Serde/sqlx round-trip the exact wire strings;
/// anything outside the set is rejected at deserialization, never coerced.
/// `type_name` must match the Postgres enum type created in the migration,
/// or binds fail at runtime resolving the type against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "topic", rename_all = "kebab-case")]
pub enum Topic {
    Stack,
    Queue,
    LinkedList,
    Trees,
    Graphs,
    DynamicProgramming,
    Arrays,
    Strings,
    Sorting,
    Searching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "difficulty", rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    /// Hidden cases are withheld from clients until the problem is solved.
    pub hidden: bool,
}

/// Big-O annotations for the reference solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complexity {
    pub time: String,
    pub space: String,
}

/// Catalog row. Read-only to the engine; rows with `is_active = false`
/// are invisible to every selection and lookup path.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProblemRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub topic: Topic,
    pub tags: Vec<String>,
    pub test_cases: Json<Vec<TestCase>>,
    pub solution: Option<String>,
    pub hints: Json<Vec<String>>,
    pub complexity: Option<Json<Complexity>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

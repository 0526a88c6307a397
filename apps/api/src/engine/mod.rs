// Recommendation & mastery engine.
// Pure decision logic (mastery scoring, topic progression, uniform problem
// selection, streak walk) lives in plain functions with colocated tests;
// the orchestrator owns the store reads/writes that compose them.

pub mod handlers;
pub mod mastery;
pub mod orchestrator;
pub mod policy;
pub mod selector;
pub mod streak;

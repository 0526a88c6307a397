pub mod mastery;
pub mod problem;
pub mod progress;
pub mod recommendation;
pub mod user;

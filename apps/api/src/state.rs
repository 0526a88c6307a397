use std::sync::Arc;

use sqlx::PgPool;

use crate::clock::DayClock;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Injectable day source — UTC in production, pinned in tests.
    pub clock: Arc<dyn DayClock>,
}

//! Shared application state for Axum routers.

use arena_engine::{ArenaScheduler, ChallengePool, TournamentDriver};
use arena_events::EventBus;
use arena_storage::Repository;
use std::sync::Arc;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub scheduler: Arc<ArenaScheduler>,
    pub pool: Arc<dyn ChallengePool>,
    pub tournament: Arc<TournamentDriver>,
    pub bus: EventBus,
    pub admin_api_key: String,
}

//! Component wiring
//!
//! Builds the engine stack behind `AppState`. Concrete gateway and
//! repository implementations are chosen here at startup and never
//! re-wired at runtime.

use crate::config::ApiConfig;
use crate::state::AppState;
use arena_engine::{
    ArenaScheduler, ChallengePool, EloPairing, JudgePanel, MatchRunner, Pairing, RankingEngine,
    TournamentDriver, WeightedChallengePool,
};
use arena_events::EventBus;
use arena_llm::{providers::OpenRouterGateway, ModelGateway};
use arena_storage::{InMemoryRepository, Repository};
use std::sync::Arc;

/// Assemble the full component stack from configuration.
pub fn build_state(config: &ApiConfig) -> AppState {
    let gateway: Arc<dyn ModelGateway> = Arc::new(OpenRouterGateway::new(
        config.model_gateway_url.clone(),
        config.model_gateway_key.clone(),
        config.arena.gateway.clone(),
    ));
    build_state_with(config, Arc::new(InMemoryRepository::new()), gateway)
}

/// Assemble the stack over explicit repository and gateway implementations.
/// Tests inject mocks through this seam.
pub fn build_state_with(
    config: &ApiConfig,
    repo: Arc<dyn Repository>,
    gateway: Arc<dyn ModelGateway>,
) -> AppState {
    let arena = config.arena.clone();
    let bus = EventBus::new();

    let pairing: Arc<dyn Pairing> =
        Arc::new(EloPairing::new(Arc::clone(&repo), arena.pairing.clone()));
    let pool: Arc<dyn ChallengePool> = Arc::new(WeightedChallengePool::new(
        Arc::clone(&repo),
        arena.pool.clone(),
    ));
    let panel = Arc::new(JudgePanel::new(
        Arc::clone(&gateway),
        Arc::clone(&repo),
        arena.judging.clone(),
    ));
    let ranking = Arc::new(RankingEngine::new(Arc::clone(&repo), arena.clone()));
    let runner = MatchRunner::new(
        Arc::clone(&repo),
        Arc::clone(&gateway),
        panel,
        Arc::clone(&ranking),
        bus.clone(),
        arena.clone(),
    );
    let scheduler = Arc::new(ArenaScheduler::new(
        Arc::clone(&repo),
        pairing,
        Arc::clone(&pool),
        ranking,
        runner,
        bus.clone(),
        arena,
    ));
    let tournament = Arc::new(TournamentDriver::new(
        Arc::clone(&scheduler),
        Arc::clone(&repo),
    ));

    AppState {
        repo,
        scheduler,
        pool,
        tournament,
        bus,
        admin_api_key: config.admin_api_key.clone(),
    }
}

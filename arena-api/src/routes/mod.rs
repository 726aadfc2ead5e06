//! REST API routes
//!
//! Read endpoints are public; admin mutations (agent registration, direct
//! tournament start) sit behind the `X-API-Key` middleware. SSE endpoints
//! are registered here but implemented in `crate::sse`.

pub mod agent;
pub mod challenge;
pub mod health;
pub mod matches;
pub mod tournament;

use crate::middleware::admin_auth;
use crate::openapi::ApiDoc;
use crate::sse;
use crate::state::AppState;
use axum::{
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

/// Handler for /openapi.json.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Build the full application router.
pub fn create_api_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/agents", post(agent::register_agent))
        .route("/tournament/start", post(tournament::start_tournament))
        .route_layer(from_fn_with_state(state.clone(), admin_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/agents", get(agent::list_agents))
        .route("/agents/{id}", get(agent::get_agent))
        .route("/challenges", get(challenge::list_challenges))
        .route("/challenges/contribute", post(challenge::contribute_challenge))
        .route("/matches", get(matches::list_matches))
        .route("/matches/live", get(matches::live_matches))
        .route("/matches/stream", get(sse::arena_stream))
        .route("/matches/quick", post(matches::quick_match))
        .route("/matches/king-challenge", post(matches::king_challenge))
        .route("/matches/{id}", get(matches::get_match))
        .route("/matches/{id}/stream", get(sse::match_stream))
        .route("/tournament/status", get(tournament::tournament_status))
        .route("/health", get(health::health))
        .route("/openapi.json", get(openapi_json))
        .merge(admin)
        .layer(cors)
        .with_state(state)
}

//! Arena API - REST/SSE layer
//!
//! Exposes the match engine over HTTP: REST endpoints for agents,
//! challenges, matches, and tournaments, plus SSE streams fanning live
//! match state out to spectators.

pub mod config;
pub mod error;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod sse;
pub mod state;
pub mod types;
mod wiring;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
pub use wiring::{build_state, build_state_with};

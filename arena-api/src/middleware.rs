//! Axum middleware
//!
//! Admin mutations are protected by a shared secret in the `X-API-Key`
//! header. Per-IP start rate limiting lives in the scheduler, not here.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Header carrying the admin secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests whose `X-API-Key` does not match the configured admin
/// secret.
pub async fn admin_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match presented {
        Some(key) if key == state.admin_api_key => Ok(next.run(request).await),
        Some(_) => Err(ApiError::unauthorized("Invalid API key")),
        None => Err(ApiError::unauthorized("Missing X-API-Key header")),
    }
}

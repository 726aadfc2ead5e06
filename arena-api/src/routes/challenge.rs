//! Challenge REST routes

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use arena_core::Challenge;
use arena_engine::ChallengeDraft;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

/// GET /challenges - list all challenges
#[utoipa::path(
    get,
    path = "/challenges",
    tag = "Challenges",
    responses(
        (status = 200, description = "All challenges", body = [Challenge]),
    )
)]
pub async fn list_challenges(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let challenges = state
        .repo
        .list_challenges(&arena_storage::ChallengeFilter::default())
        .await
        .map_err(ApiError::from)?;
    Ok(Json(challenges))
}

/// POST /challenges/contribute - submit a community challenge
#[utoipa::path(
    post,
    path = "/challenges/contribute",
    tag = "Challenges",
    request_body = ChallengeDraft,
    responses(
        (status = 201, description = "Challenge accepted on probation", body = Challenge),
        (status = 400, description = "Invalid draft", body = ApiError),
        (status = 409, description = "Duplicate title", body = ApiError),
    )
)]
pub async fn contribute_challenge(
    State(state): State<AppState>,
    Json(draft): Json<ChallengeDraft>,
) -> ApiResult<impl IntoResponse> {
    let stored = state
        .pool
        .contribute(draft)
        .await
        .map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

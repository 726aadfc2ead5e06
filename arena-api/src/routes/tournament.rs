//! Tournament REST routes

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::TournamentStartQuery;
use arena_engine::TournamentStatus;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

/// POST /tournament/start - run a tournament in the background (admin)
#[utoipa::path(
    post,
    path = "/tournament/start",
    tag = "Tournament",
    params(("numRounds" = Option<u32>, Query, description = "Rounds to play, default 1")),
    responses(
        (status = 202, description = "Tournament accepted"),
        (status = 401, description = "Missing or wrong admin key", body = ApiError),
        (status = 409, description = "A tournament is already running", body = ApiError),
    ),
    security(("api_key" = []))
)]
pub async fn start_tournament(
    State(state): State<AppState>,
    Query(query): Query<TournamentStartQuery>,
) -> ApiResult<impl IntoResponse> {
    let num_rounds = query.num_rounds.unwrap_or(1).max(1);
    state
        .tournament
        .start(num_rounds)
        .map_err(ApiError::from)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "message": format!("Tournament started with {} rounds", num_rounds) })),
    ))
}

/// GET /tournament/status - standings and progress
#[utoipa::path(
    get,
    path = "/tournament/status",
    tag = "Tournament",
    responses(
        (status = 200, description = "Current status", body = TournamentStatus),
    )
)]
pub async fn tournament_status(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let status = state
        .tournament
        .status()
        .await
        .map_err(ApiError::from)?;
    Ok(Json(status))
}

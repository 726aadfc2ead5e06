//! Match REST routes

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{ListMatchesQuery, QuickMatchRequest, TooManyMatchesBody};
use arena_core::{
    ArenaError, Match, MatchId, MatchType, SchedulerError,
};
use arena_engine::StartRequest;
use arena_storage::MatchFilter;
use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::net::SocketAddr;

/// Recent matches returned by the plain listing.
const RECENT_LIMIT: usize = 50;

/// GET /matches - recent matches, optionally filtered by status
#[utoipa::path(
    get,
    path = "/matches",
    tag = "Matches",
    params(("status" = Option<String>, Query, description = "Filter by status")),
    responses(
        (status = 200, description = "Matches, newest first", body = [Match]),
    )
)]
pub async fn list_matches(
    State(state): State<AppState>,
    Query(query): Query<ListMatchesQuery>,
) -> ApiResult<impl IntoResponse> {
    let matches = state
        .repo
        .list_matches(&MatchFilter {
            status: query.status,
            agent_id: None,
            limit: Some(RECENT_LIMIT),
        })
        .await
        .map_err(ApiError::from)?;
    Ok(Json(matches))
}

/// GET /matches/live - matches currently counted against the cap
#[utoipa::path(
    get,
    path = "/matches/live",
    tag = "Matches",
    responses(
        (status = 200, description = "Live matches", body = [Match]),
    )
)]
pub async fn live_matches(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let mut matches = Vec::new();
    for summary in state.scheduler.snapshot() {
        if let Some(m) = state
            .repo
            .get_match(summary.match_id)
            .await
            .map_err(ApiError::from)?
        {
            matches.push(m);
        }
    }
    Ok(Json(matches))
}

/// GET /matches/{id} - one match
#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "Matches",
    params(("id" = String, Path, description = "Match id")),
    responses(
        (status = 200, description = "The match", body = Match),
        (status = 404, description = "No such match", body = ApiError),
    )
)]
pub async fn get_match(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
) -> ApiResult<impl IntoResponse> {
    let m = state
        .repo
        .get_match(match_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Match", match_id))?;
    Ok(Json(m))
}

/// Convert a start failure, keeping the pinned 429 body for the live cap.
fn start_error_response(error: ArenaError) -> Response {
    if let ArenaError::Scheduler(SchedulerError::TooMany { live, max }) = &error {
        let body = TooManyMatchesBody {
            error: "too_many_matches".to_string(),
            message: format!("The arena is at capacity ({} of {} live matches)", live, max),
            live_match_count: *live,
            max_live_matches: *max,
        };
        return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    }
    ApiError::from(error).into_response()
}

/// POST /matches/quick - start a match now
#[utoipa::path(
    post,
    path = "/matches/quick",
    tag = "Matches",
    request_body = QuickMatchRequest,
    responses(
        (status = 201, description = "Match admitted", body = Match),
        (status = 400, description = "No opponent or bad input", body = ApiError),
        (status = 429, description = "Live-match cap reached", body = TooManyMatchesBody),
    )
)]
pub async fn quick_match(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<QuickMatchRequest>,
) -> Response {
    let start = StartRequest {
        division: request.division,
        match_type: None,
        agent1_id: request.agent1_id,
        agent2_id: request.agent2_id,
        challenge_type: None,
        requester: Some(addr.ip()),
    };
    match state.scheduler.start(start).await {
        Ok(m) => (StatusCode::CREATED, Json(m)).into_response(),
        Err(error) => start_error_response(error),
    }
}

/// POST /matches/king-challenge - the best eligible Master challenges the King
#[utoipa::path(
    post,
    path = "/matches/king-challenge",
    tag = "Matches",
    responses(
        (status = 201, description = "Challenge admitted", body = Match),
        (status = 409, description = "No eligible challenger or no King", body = ApiError),
        (status = 429, description = "Live-match cap reached", body = TooManyMatchesBody),
    )
)]
pub async fn king_challenge(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let start = StartRequest {
        division: arena_core::Division::King,
        match_type: Some(MatchType::KingChallenge),
        agent1_id: None,
        agent2_id: None,
        challenge_type: None,
        requester: Some(addr.ip()),
    };
    match state.scheduler.start(start).await {
        Ok(m) => (StatusCode::CREATED, Json(m)).into_response(),
        Err(error) => start_error_response(error),
    }
}

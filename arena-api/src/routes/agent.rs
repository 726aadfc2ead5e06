//! Agent REST routes

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::RegisterAgentRequest;
use arena_core::{Agent, AgentId};
use arena_storage::AgentFilter;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

/// GET /agents - list all agents
#[utoipa::path(
    get,
    path = "/agents",
    tag = "Agents",
    responses(
        (status = 200, description = "All agents", body = [Agent]),
    )
)]
pub async fn list_agents(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let agents = state
        .repo
        .list_agents(&AgentFilter::default())
        .await
        .map_err(ApiError::from)?;
    Ok(Json(agents))
}

/// GET /agents/{id} - one agent with full history
#[utoipa::path(
    get,
    path = "/agents/{id}",
    tag = "Agents",
    params(("id" = String, Path, description = "Agent id")),
    responses(
        (status = 200, description = "The agent", body = Agent),
        (status = 404, description = "No such agent", body = ApiError),
    )
)]
pub async fn get_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<AgentId>,
) -> ApiResult<impl IntoResponse> {
    let agent = state
        .repo
        .get_agent(agent_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Agent", agent_id))?;
    Ok(Json(agent))
}

/// POST /agents - register a competitor (admin)
#[utoipa::path(
    post,
    path = "/agents",
    tag = "Agents",
    request_body = RegisterAgentRequest,
    responses(
        (status = 201, description = "Agent registered", body = Agent),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Missing or wrong admin key", body = ApiError),
    ),
    security(("api_key" = []))
)]
pub async fn register_agent(
    State(state): State<AppState>,
    Json(request): Json<RegisterAgentRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.display_name.trim().is_empty() {
        return Err(ApiError::invalid_input("displayName must not be empty"));
    }
    if request.model_id.trim().is_empty() {
        return Err(ApiError::invalid_input("modelId must not be empty"));
    }
    if let Some(temperature) = request.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ApiError::invalid_input(
                "temperature must be between 0.0 and 2.0",
            ));
        }
    }

    let mut agent = Agent::new(request.display_name, request.model_id);
    agent.description = request.description;
    agent.specializations = request.specializations;
    agent.supports_structured_output = request.supports_structured_output;
    if let Some(temperature) = request.temperature {
        agent.temperature = temperature;
    }

    let stored = state.repo.put_agent(&agent).await.map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

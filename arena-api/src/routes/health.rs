//! Health check route

use axum::{response::IntoResponse, Json};

/// GET /health - liveness probe
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

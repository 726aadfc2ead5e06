//! Error types for the arena API
//!
//! Maps engine errors onto structured JSON responses with appropriate HTTP
//! status codes. Every error body is `{ code, message, details? }` except
//! the live-cap rejection, which keeps its dedicated wire shape (see
//! `routes::matches`).

use arena_core::{
    ArenaError, ChallengeError, JudgeError, PairingError, RankingError, SchedulerError,
    StorageError,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request lacks the admin API key
    Unauthorized,

    /// Request contains invalid input data
    InvalidInput,

    /// Requested entity does not exist
    EntityNotFound,

    /// Entity with the same identity already exists
    AlreadyExists,

    /// Concurrent modification detected (optimistic locking failure)
    ConcurrentModification,

    /// Operation conflicts with current state
    StateConflict,

    /// Request rate limit exceeded
    TooManyRequests,

    /// Internal server error
    InternalError,

    /// Upstream model provider failed
    UpstreamError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::EntityNotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyExists
            | ErrorCode::ConcurrentModification
            | ErrorCode::StateConflict => StatusCode::CONFLICT,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ------------------------------------------------------------------
    // Convenience constructors
    // ------------------------------------------------------------------

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn not_found(entity: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("{} {} not found", entity, id),
        )
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StateConflict, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

impl From<ArenaError> for ApiError {
    fn from(error: ArenaError) -> Self {
        match error {
            ArenaError::Pairing(PairingError::NoOpponent { division, reason }) => {
                Self::invalid_input(format!("No opponent in {} division: {}", division, reason))
            }
            ArenaError::Pairing(PairingError::IneligibleAgent { agent_id, reason }) => {
                Self::invalid_input(format!("Agent {} not eligible: {}", agent_id, reason))
            }
            ArenaError::Challenge(ChallengeError::Duplicate { title }) => Self::new(
                ErrorCode::AlreadyExists,
                format!("A challenge titled '{}' already exists", title),
            ),
            ArenaError::Challenge(ChallengeError::InvalidDraft { reason }) => {
                Self::invalid_input(reason)
            }
            ArenaError::Challenge(ChallengeError::NoChallenge { division }) => {
                Self::invalid_input(format!("No challenge available for {} division", division))
            }
            ArenaError::Challenge(ChallengeError::NotFound { challenge_id }) => {
                Self::not_found("Challenge", challenge_id)
            }
            ArenaError::Storage(StorageError::NotFound { entity, id }) => {
                Self::not_found(entity, id)
            }
            ArenaError::Storage(StorageError::Stale { .. }) => Self::new(
                ErrorCode::ConcurrentModification,
                "Concurrent modification detected, retry the request",
            ),
            ArenaError::Scheduler(SchedulerError::RateLimited { retry_after_secs }) => Self::new(
                ErrorCode::TooManyRequests,
                format!("Rate limit exceeded, retry after {}s", retry_after_secs),
            ),
            ArenaError::Scheduler(SchedulerError::TooMany { live, max }) => Self::new(
                ErrorCode::TooManyRequests,
                format!("Too many live matches: {} of {}", live, max),
            ),
            ArenaError::Scheduler(SchedulerError::NotEligible { reason }) => {
                Self::conflict(reason)
            }
            ArenaError::Scheduler(SchedulerError::TournamentRunning) => {
                Self::conflict("A tournament is already running")
            }
            ArenaError::Scheduler(SchedulerError::MatchNotFound { match_id }) => {
                Self::not_found("Match", match_id)
            }
            ArenaError::Scheduler(SchedulerError::AlreadyTerminal { match_id }) => {
                Self::conflict(format!("Match {} is already terminal", match_id))
            }
            ArenaError::Scheduler(SchedulerError::ShuttingDown) => {
                Self::new(ErrorCode::InternalError, "Server is shutting down")
            }
            ArenaError::Judge(JudgeError::InsufficientJudges { .. })
            | ArenaError::Judge(JudgeError::NoEligibleJudges { .. }) => {
                Self::conflict(error.to_string())
            }
            ArenaError::Ranking(RankingError::AlreadyApplied { match_id }) => {
                Self::conflict(format!("Match {} was already applied", match_id))
            }
            ArenaError::Gateway(gateway_error) => {
                Self::new(ErrorCode::UpstreamError, gateway_error.to_string())
            }
            other => Self::internal_error(other.to_string()),
        }
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::Division;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ErrorCode::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ErrorCode::TooManyRequests.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ErrorCode::AlreadyExists.status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_arena_error_mapping() {
        let err: ApiError = ArenaError::Pairing(PairingError::NoOpponent {
            division: Division::Novice,
            reason: "everyone is resting".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        let err: ApiError = ArenaError::Scheduler(SchedulerError::TooMany { live: 2, max: 2 }).into();
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let err: ApiError = ArenaError::Storage(StorageError::NotFound {
            entity: "agent",
            id: "xyz".to_string(),
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_serialization_skips_empty_details() {
        let err = ApiError::invalid_input("bad division");
        let json = serde_json::to_string(&err).unwrap();
        assert!(!json.contains("details"));
        assert!(json.contains("INVALID_INPUT"));
    }
}

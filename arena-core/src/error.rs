//! Error types for arena operations

use crate::{AgentId, ChallengeId, Division, MatchId};
use thiserror::Error;

/// Model gateway errors.
///
/// Only `Timeout` and `RateLimited` are retriable; everything else fails the
/// invocation immediately.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Model call timed out")]
    Timeout,

    #[error("Rate limited by provider")]
    RateLimited { retry_after_ms: Option<i64> },

    #[error("Provider {provider} failed with status {status}: {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Content filtered by provider")]
    ContentFiltered,

    #[error("Invalid model output: {reason}")]
    Invalid { reason: String },
}

impl GatewayError {
    /// Whether the retry loop may re-attempt after this error.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            GatewayError::Timeout | GatewayError::RateLimited { .. }
        )
    }
}

/// Repository errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Stale write for {entity} {id}: expected version {expected}, found {found}")]
    Stale {
        entity: &'static str,
        id: String,
        expected: u64,
        found: u64,
    },

    #[error("Storage backend error: {reason}")]
    Backend { reason: String },
}

/// Pairing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PairingError {
    #[error("No eligible opponent in {division} division: {reason}")]
    NoOpponent { division: Division, reason: String },

    #[error("Agent not eligible for pairing: {agent_id} ({reason})")]
    IneligibleAgent { agent_id: AgentId, reason: String },
}

/// Challenge pool errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("No challenge available for {division} division")]
    NoChallenge { division: Division },

    #[error("Duplicate challenge title: {title}")]
    Duplicate { title: String },

    #[error("Invalid challenge draft: {reason}")]
    InvalidDraft { reason: String },

    #[error("Challenge not found: {challenge_id}")]
    NotFound { challenge_id: ChallengeId },
}

/// Judge panel errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JudgeError {
    #[error("Insufficient judges: {succeeded} of {selected} panels returned, need {needed}")]
    InsufficientJudges {
        selected: usize,
        succeeded: usize,
        needed: usize,
    },

    #[error("No eligible judges for match {match_id}")]
    NoEligibleJudges { match_id: MatchId },
}

/// Scheduler admission errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Too many live matches: {live} of {max}")]
    TooMany { live: usize, max: usize },

    #[error("Rate limit exceeded for requester, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Match not found: {match_id}")]
    MatchNotFound { match_id: MatchId },

    #[error("Match {match_id} is already terminal")]
    AlreadyTerminal { match_id: MatchId },

    #[error("King challenge requires a reigning King and an eligible Master: {reason}")]
    NotEligible { reason: String },

    #[error("A tournament is already running")]
    TournamentRunning,

    #[error("Scheduler is shutting down")]
    ShuttingDown,
}

/// Ranking engine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RankingError {
    #[error("Match {match_id} outcome was already applied")]
    AlreadyApplied { match_id: MatchId },

    #[error("Match {match_id} is not in a finalizable state: {reason}")]
    NotFinalizable { match_id: MatchId, reason: String },
}

/// Configuration errors. Invalid values fail fast at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all arena operations.
#[derive(Debug, Clone, Error)]
pub enum ArenaError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Pairing error: {0}")]
    Pairing(#[from] PairingError),

    #[error("Challenge error: {0}")]
    Challenge(#[from] ChallengeError),

    #[error("Judge error: {0}")]
    Judge(#[from] JudgeError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Ranking error: {0}")]
    Ranking(#[from] RankingError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cancelled")]
    Cancelled,
}

/// Result type alias for arena operations.
pub type ArenaResult<T> = Result<T, ArenaError>;

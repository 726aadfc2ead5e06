//! API configuration
//!
//! Loaded from environment variables with sensible development defaults.
//! Unknown variables are ignored; invalid values fail fast at startup.

use arena_core::{ArenaConfig, ConfigError};
use std::net::SocketAddr;
use std::time::Duration;

/// Server-level configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// OpenRouter-compatible base URL for the model gateway.
    pub model_gateway_url: String,
    /// API key for the model gateway.
    pub model_gateway_key: String,
    /// External repository endpoint; the in-process store is used when
    /// unset.
    pub repository_url: Option<String>,
    /// Credential for the external repository.
    pub repository_key: Option<String>,
    /// Admin secret required by mutating endpoints.
    pub admin_api_key: String,
    /// Socket address to bind.
    pub bind_addr: SocketAddr,
    /// Engine configuration with env overrides applied.
    pub arena: ArenaConfig,
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: name.to_string(),
                value,
                reason: "failed to parse".to_string(),
            }),
        Err(_) => Ok(None),
    }
}

impl ApiConfig {
    /// Environment variables:
    /// - `MODEL_GATEWAY_URL`: gateway base URL (default: OpenRouter)
    /// - `MODEL_GATEWAY_KEY`: gateway API key (required)
    /// - `REPOSITORY_URL` / `REPOSITORY_KEY`: external store (optional)
    /// - `ADMIN_API_KEY`: admin secret (required)
    /// - `MAX_LIVE_MATCHES`: live match cap (default: 2)
    /// - `STARTS_PER_MINUTE`: per-IP start budget (default: 5)
    /// - `MATCH_TIMEOUT_SECONDS`: per-match wall clock (default: 600)
    /// - `MIN_JUDGES` / `MAX_JUDGES`: panel bounds (default: 3/5)
    /// - `ARENA_BIND`: bind address (default: 0.0.0.0:3000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let model_gateway_url = std::env::var("MODEL_GATEWAY_URL")
            .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string());
        let model_gateway_key =
            std::env::var("MODEL_GATEWAY_KEY").map_err(|_| ConfigError::MissingRequired {
                field: "MODEL_GATEWAY_KEY".to_string(),
            })?;
        let repository_url = std::env::var("REPOSITORY_URL").ok();
        let repository_key = std::env::var("REPOSITORY_KEY").ok();
        let admin_api_key =
            std::env::var("ADMIN_API_KEY").map_err(|_| ConfigError::MissingRequired {
                field: "ADMIN_API_KEY".to_string(),
            })?;

        let mut arena = ArenaConfig::default();
        if let Some(max_live) = parse_var::<usize>("MAX_LIVE_MATCHES")? {
            if max_live == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "MAX_LIVE_MATCHES".to_string(),
                    value: "0".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            arena.scheduler.max_live_matches = max_live;
        }
        if let Some(starts) = parse_var::<u32>("STARTS_PER_MINUTE")? {
            arena.scheduler.starts_per_minute = starts;
        }
        if let Some(timeout) = parse_var::<u64>("MATCH_TIMEOUT_SECONDS")? {
            arena.scheduler.match_timeout = Duration::from_secs(timeout);
        }
        if let Some(min_judges) = parse_var::<usize>("MIN_JUDGES")? {
            arena.judging.min_judges = min_judges;
        }
        if let Some(max_judges) = parse_var::<usize>("MAX_JUDGES")? {
            arena.judging.max_judges = max_judges;
        }
        if arena.judging.min_judges == 0 || arena.judging.min_judges > arena.judging.max_judges {
            return Err(ConfigError::InvalidValue {
                field: "MIN_JUDGES".to_string(),
                value: arena.judging.min_judges.to_string(),
                reason: "must be between 1 and MAX_JUDGES".to_string(),
            });
        }

        let bind_addr = parse_var::<SocketAddr>("ARENA_BIND")?
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        Ok(Self {
            model_gateway_url,
            model_gateway_key,
            repository_url,
            repository_key,
            admin_api_key,
            bind_addr,
            arena,
        })
    }
}

//! Engine configuration types
//!
//! Pure configuration structs with defaults matching the arena rules.
//! Environment loading lives in the API crate; the engine only ever sees
//! these structs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Model gateway behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Maximum retries for retriable errors (Timeout, RateLimited).
    pub max_retries: u32,
    /// First backoff delay; doubled per retry.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
    /// Hard wall-clock deadline per call unless the caller overrides it.
    pub default_deadline: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            default_deadline: Duration::from_secs(120),
        }
    }
}

/// Pairing rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Minimum rest between an agent's matches.
    pub cooldown: Duration,
    /// Probability of picking a uniformly random eligible opponent instead
    /// of the nearest-ELO one.
    pub exploration_epsilon: f64,
    /// An agent may face the same opponent at most this many times...
    pub max_repeat_pairings: u32,
    /// ...within this many of its most recent matches.
    pub repeat_window: usize,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(10),
            exploration_epsilon: 0.1,
            max_repeat_pairings: 3,
            repeat_window: 20,
        }
    }
}

/// Challenge pool rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengePoolConfig {
    /// Challenges below this quality score are retired from selection.
    pub retirement_floor: f64,
    /// Exclude challenges used in this many recent matches of either
    /// competitor.
    pub recent_window: usize,
}

impl Default for ChallengePoolConfig {
    fn default() -> Self {
        Self {
            retirement_floor: 0.2,
            recent_window: 10,
        }
    }
}

/// Judge panel rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgingConfig {
    pub min_judges: usize,
    pub max_judges: usize,
    /// Judges below this reliability are not selected.
    pub reliability_floor: f64,
    /// Learning rate for reliability nudges after each verdict.
    pub reliability_alpha: f64,
    /// Weighted score difference below which the panel may declare a draw.
    pub draw_epsilon: f64,
    /// Per-judge invocation timeout.
    pub judge_timeout: Duration,
}

impl Default for JudgingConfig {
    fn default() -> Self {
        Self {
            min_judges: 3,
            max_judges: 5,
            reliability_floor: 0.4,
            reliability_alpha: 0.05,
            draw_epsilon: 0.25,
            judge_timeout: Duration::from_secs(90),
        }
    }
}

/// Promotion, demotion, and King succession thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Novice -> Expert: minimum division matches.
    pub novice_promotion_matches: u32,
    /// Novice -> Expert: win rate OR streak gate.
    pub novice_promotion_win_rate: f64,
    pub novice_promotion_streak: i32,

    /// Expert -> Master: all three gates must hold.
    pub expert_promotion_matches: u32,
    pub expert_promotion_win_rate: f64,
    pub expert_promotion_elo: f64,

    /// Master -> Expert demotion.
    pub master_demotion_matches: u32,
    pub master_demotion_win_rate: f64,

    /// Expert -> Novice demotion: win-rate gate (with min matches) OR
    /// losing-streak gate.
    pub expert_demotion_matches: u32,
    pub expert_demotion_win_rate: f64,
    pub expert_demotion_streak: i32,

    /// King challenger eligibility: division win rate OR streak.
    pub challenger_win_rate: f64,
    pub challenger_streak: i32,

    /// Automatic succession: accumulated King-challenge defense losses.
    pub king_max_defense_losses: u32,
    /// Automatic succession: consecutive title defenses without a win. An
    /// outright loss dethrones on the spot, so the King's losing streak is
    /// measured over failed defenses.
    pub king_max_defense_streak: u32,

    /// Quality delta applied to a challenge after a unanimous/split verdict.
    pub challenge_quality_step: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            novice_promotion_matches: 5,
            novice_promotion_win_rate: 0.60,
            novice_promotion_streak: 3,

            expert_promotion_matches: 10,
            expert_promotion_win_rate: 0.65,
            expert_promotion_elo: 1250.0,

            master_demotion_matches: 10,
            master_demotion_win_rate: 0.35,

            expert_demotion_matches: 10,
            expert_demotion_win_rate: 0.30,
            expert_demotion_streak: -5,

            challenger_win_rate: 0.75,
            challenger_streak: 5,

            king_max_defense_losses: 5,
            king_max_defense_streak: 3,

            challenge_quality_step: 0.02,
        }
    }
}

/// Scheduler admission control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Hard cap on concurrently running matches.
    pub max_live_matches: usize,
    /// Token-bucket refill rate per requester IP.
    pub starts_per_minute: u32,
    /// Wall-clock budget per match before it fails.
    pub match_timeout: Duration,
    /// Turns per side in a debate.
    pub debate_max_turns: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_live_matches: 2,
            starts_per_minute: 5,
            match_timeout: Duration::from_secs(600),
            debate_max_turns: 6,
        }
    }
}

/// Top-level configuration for the arena engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ArenaConfig {
    pub gateway: GatewayConfig,
    pub pairing: PairingConfig,
    pub pool: ChallengePoolConfig,
    pub judging: JudgingConfig,
    pub ranking: RankingConfig,
    pub scheduler: SchedulerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_arena_rules() {
        let config = ArenaConfig::default();
        assert_eq!(config.scheduler.max_live_matches, 2);
        assert_eq!(config.scheduler.starts_per_minute, 5);
        assert_eq!(config.judging.min_judges, 3);
        assert_eq!(config.judging.max_judges, 5);
        assert_eq!(config.gateway.max_retries, 5);
        assert_eq!(config.gateway.initial_backoff, Duration::from_secs(1));
        assert_eq!(config.gateway.max_backoff, Duration::from_secs(30));
        assert_eq!(config.pairing.cooldown, Duration::from_secs(10));
        assert_eq!(config.ranking.novice_promotion_matches, 5);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = ArenaConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ArenaConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}

//! Arena Storage - Repository Abstraction
//!
//! Async trait for the durable store behind the arena, plus the in-memory
//! implementation used in tests and single-node deployments. Writes use
//! optimistic concurrency: the caller supplies the `version` it read, and a
//! mismatch returns `StorageError::Stale` so the caller can re-read and
//! retry.

use arena_core::{
    Agent, AgentId, ArenaResult, Challenge, ChallengeId, ChallengeType, Division, DivisionChange,
    JudgeEvaluation, Match, MatchId, MatchStatus,
};
use async_trait::async_trait;

mod memory;

pub use memory::InMemoryRepository;

// ============================================================================
// FILTERS
// ============================================================================

/// Filter for listing agents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentFilter {
    pub division: Option<Division>,
    pub active_only: bool,
}

impl AgentFilter {
    pub fn active_in(division: Division) -> Self {
        Self {
            division: Some(division),
            active_only: true,
        }
    }

    pub fn matches(&self, agent: &Agent) -> bool {
        if self.active_only && !agent.active {
            return false;
        }
        if let Some(division) = self.division {
            if agent.division != division {
                return false;
            }
        }
        true
    }
}

/// Filter for listing challenges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeFilter {
    pub challenge_type: Option<ChallengeType>,
    pub active_only: bool,
}

impl ChallengeFilter {
    pub fn matches(&self, challenge: &Challenge) -> bool {
        if self.active_only && !challenge.active {
            return false;
        }
        if let Some(t) = self.challenge_type {
            if challenge.challenge_type != t {
                return false;
            }
        }
        true
    }
}

/// Filter for listing matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchFilter {
    pub status: Option<MatchStatus>,
    pub agent_id: Option<AgentId>,
    /// Newest-first limit; `None` returns everything.
    pub limit: Option<usize>,
}

impl MatchFilter {
    pub fn with_status(status: MatchStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, m: &Match) -> bool {
        if let Some(status) = self.status {
            if m.status != status {
                return false;
            }
        }
        if let Some(agent_id) = self.agent_id {
            if m.agent1_id != agent_id && m.agent2_id != agent_id {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// REPOSITORY TRAIT
// ============================================================================

/// Durable store for agents, challenges, matches, evaluations, and division
/// change history.
///
/// All operations are idempotent on `id`. Reads may be eventually
/// consistent; writes are at-least-once with optimistic versioning on
/// agents and matches.
#[async_trait]
pub trait Repository: Send + Sync {
    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    /// Insert or update an agent. Fails with `Stale` when the stored
    /// version differs from `agent.version`.
    async fn put_agent(&self, agent: &Agent) -> ArenaResult<Agent>;

    async fn get_agent(&self, id: AgentId) -> ArenaResult<Option<Agent>>;

    async fn list_agents(&self, filter: &AgentFilter) -> ArenaResult<Vec<Agent>>;

    /// Append a division change record to an agent's history.
    async fn append_division_change(
        &self,
        agent_id: AgentId,
        change: DivisionChange,
    ) -> ArenaResult<()>;

    // ------------------------------------------------------------------
    // Challenges
    // ------------------------------------------------------------------

    async fn put_challenge(&self, challenge: &Challenge) -> ArenaResult<Challenge>;

    async fn get_challenge(&self, id: ChallengeId) -> ArenaResult<Option<Challenge>>;

    async fn list_challenges(&self, filter: &ChallengeFilter) -> ArenaResult<Vec<Challenge>>;

    // ------------------------------------------------------------------
    // Matches
    // ------------------------------------------------------------------

    async fn put_match(&self, m: &Match) -> ArenaResult<Match>;

    async fn get_match(&self, id: MatchId) -> ArenaResult<Option<Match>>;

    async fn list_matches(&self, filter: &MatchFilter) -> ArenaResult<Vec<Match>>;

    /// Append a judge evaluation to a match.
    async fn append_evaluation(
        &self,
        match_id: MatchId,
        evaluation: JudgeEvaluation,
    ) -> ArenaResult<()>;
}

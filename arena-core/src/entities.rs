//! Core entity structures

use crate::{
    identity::EntityIdType, AgentId, ChallengeDifficulty, ChallengeId, ChallengeSource,
    ChallengeType, DebateStance, Division, DivisionChangeKind, EvaluationCriterion, EvaluationId,
    MatchId, MatchResult, MatchStatus, MatchType, PanelWinner, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// AGENT
// ============================================================================

/// Win/loss accounting, kept twice per agent: once for the whole career
/// (`global_stats`) and once scoped to the current division
/// (`division_stats`, reset on every division change).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MatchStats {
    pub matches: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    /// Signed streak: positive counts consecutive wins, negative consecutive
    /// losses, zero after a draw.
    pub current_streak: i32,
    /// Maximum of `|current_streak|` over time.
    pub best_streak: u32,
}

impl MatchStats {
    /// Win rate as a fraction in [0, 1]. Zero when no matches played.
    pub fn win_rate(&self) -> f64 {
        if self.matches == 0 {
            return 0.0;
        }
        f64::from(self.wins) / f64::from(self.matches)
    }
}

/// How well an agent performs when sitting on a judge panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct JudgeStats {
    /// Fraction of judgements aligned with the panel majority over the
    /// recent window.
    pub accuracy: f64,
    /// Reliability weight in [0, 1] used for panel selection and score
    /// weighting.
    pub reliability: f64,
    /// Ratings given, for the accuracy window.
    pub ratings_given: u32,
    /// Ratings aligned with the panel majority.
    pub ratings_aligned: u32,
}

impl Default for JudgeStats {
    fn default() -> Self {
        Self {
            accuracy: 0.0,
            reliability: 0.5,
            ratings_given: 0,
            ratings_aligned: 0,
        }
    }
}

/// One entry in an agent's ELO history, appended per finalized match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EloHistoryEntry {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
    /// Rating after the update.
    pub rating: f64,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub match_id: MatchId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub opponent_id: AgentId,
    /// Opponent's rating before the match.
    pub opponent_rating: f64,
    pub result: MatchResult,
    /// Signed rating delta applied by this match.
    pub delta: f64,
}

/// One entry in an agent's division change history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DivisionChange {
    pub from: Division,
    pub to: Division,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
    pub reason: String,
    pub kind: DivisionChangeKind,
}

/// A competitor and potential judge.
///
/// Created by the admin; mutated only by the ranking engine; never deleted
/// (`active` is a soft flag).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Agent {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    pub display_name: String,
    pub description: String,
    pub specializations: Vec<String>,
    /// Model identifier passed to the gateway (e.g. "openai/gpt-4o-mini").
    pub model_id: String,
    pub temperature: f64,
    pub supports_structured_output: bool,
    pub division: Division,
    pub elo_rating: f64,
    pub global_stats: MatchStats,
    pub division_stats: MatchStats,
    pub judge_stats: JudgeStats,
    pub elo_history: Vec<EloHistoryEntry>,
    pub division_change_history: Vec<DivisionChange>,
    /// Opponents from the most recent matches, newest last, capped by the
    /// pairing fairness window.
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub recent_opponents: Vec<AgentId>,
    /// Challenges from the most recent matches, newest last, capped by the
    /// pool rotation window.
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub recent_challenges: Vec<ChallengeId>,
    /// King-challenge defenses lost while holding the throne. Reset when the
    /// agent leaves the King division.
    pub king_defense_losses: u32,
    /// Consecutive title defenses without a win. A successful defense resets
    /// it; reset when the agent leaves the King division.
    pub king_defense_streak: u32,
    /// Times a streaming response failed mid-flight.
    pub streaming_failures: u32,
    /// Total streaming responses attempted.
    pub streaming_attempts: u32,
    #[cfg_attr(
        feature = "openapi",
        schema(value_type = Option<String>, format = "date-time")
    )]
    pub last_match_at: Option<Timestamp>,
    pub active: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    /// Optimistic concurrency version, incremented on every write.
    pub version: u64,
}

impl Agent {
    /// Initial ELO rating for newly registered agents.
    pub const STARTING_ELO: f64 = 1000.0;

    /// Create a fresh agent in the Novice division.
    pub fn new(display_name: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            agent_id: AgentId::now_v7(),
            display_name: display_name.into(),
            description: String::new(),
            specializations: Vec::new(),
            model_id: model_id.into(),
            temperature: 0.5,
            supports_structured_output: false,
            division: Division::Novice,
            elo_rating: Self::STARTING_ELO,
            global_stats: MatchStats::default(),
            division_stats: MatchStats::default(),
            judge_stats: JudgeStats::default(),
            elo_history: Vec::new(),
            division_change_history: Vec::new(),
            recent_opponents: Vec::new(),
            recent_challenges: Vec::new(),
            king_defense_losses: 0,
            king_defense_streak: 0,
            streaming_failures: 0,
            streaming_attempts: 0,
            last_match_at: None,
            active: true,
            created_at: chrono::Utc::now(),
            version: 0,
        }
    }
}

// ============================================================================
// CHALLENGE
// ============================================================================

/// A structured prompt with difficulty and type metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Challenge {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub challenge_id: ChallengeId,
    pub title: String,
    pub description: String,
    pub challenge_type: ChallengeType,
    pub difficulty: ChallengeDifficulty,
    /// Reference answer handed to judges when present.
    pub answer: Option<String>,
    pub tags: Vec<String>,
    pub source: ChallengeSource,
    /// Criteria judges are asked to weigh for this specific challenge.
    pub evaluation_criteria: Vec<String>,
    /// Concepts a strong response is expected to touch.
    pub expected_concepts: Vec<String>,
    /// Smoothed EMA over historic discrimination; drives selection weight
    /// and retirement.
    pub quality_score: f64,
    pub uses: u32,
    /// Community challenges stay on probation until they have been used in
    /// one completed match with a non-null result.
    pub probation: bool,
    pub active: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    /// Optimistic concurrency version, incremented on every write.
    pub version: u64,
}

impl Challenge {
    /// Initial quality score for a new challenge.
    pub const STARTING_QUALITY: f64 = 0.5;

    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        challenge_type: ChallengeType,
        difficulty: ChallengeDifficulty,
    ) -> Self {
        Self {
            challenge_id: ChallengeId::now_v7(),
            title: title.into(),
            description: description.into(),
            challenge_type,
            difficulty,
            answer: None,
            tags: Vec::new(),
            source: ChallengeSource::Seed,
            evaluation_criteria: Vec::new(),
            expected_concepts: Vec::new(),
            quality_score: Self::STARTING_QUALITY,
            uses: 0,
            probation: false,
            active: true,
            created_at: chrono::Utc::now(),
            version: 0,
        }
    }
}

// ============================================================================
// MATCH
// ============================================================================

/// An agent's response to a challenge, filled in token by token while
/// `is_streaming` is true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentResponse {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    pub text: String,
    /// Wall-clock seconds taken to produce the response.
    pub response_time: f64,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
    pub score: Option<f64>,
    pub is_streaming: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub structured_data: Option<serde_json::Value>,
}

impl AgentResponse {
    /// An empty in-flight response, created when a stream opens.
    pub fn streaming(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            text: String::new(),
            response_time: 0.0,
            timestamp: chrono::Utc::now(),
            score: None,
            is_streaming: true,
            structured_data: None,
        }
    }
}

/// A single judge's score for one criterion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CriterionScore {
    pub criterion: EvaluationCriterion,
    /// Score in [0, 10].
    pub score: f64,
}

/// A judge's full evaluation of a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct JudgeEvaluation {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub evaluation_id: EvaluationId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub match_id: MatchId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub judge_id: AgentId,
    pub agent1_scores: Vec<CriterionScore>,
    pub agent2_scores: Vec<CriterionScore>,
    pub agent1_total_score: f64,
    pub agent2_total_score: f64,
    /// `None` means the judge recommends a draw.
    pub recommended_winner: Option<PanelWinner>,
    pub overall_reasoning: String,
    pub comparative_analysis: Option<String>,
    pub key_differentiators: Vec<String>,
    /// Judge's self-reported confidence, clamped to [0, 1].
    pub evaluation_quality: f64,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

/// A contest of two agents over one challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Match {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub match_id: MatchId,
    pub match_type: MatchType,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub challenge_id: ChallengeId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent1_id: AgentId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent2_id: AgentId,
    pub division: Division,
    pub status: MatchStatus,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(
        feature = "openapi",
        schema(value_type = Option<String>, format = "date-time")
    )]
    pub started_at: Option<Timestamp>,
    #[cfg_attr(
        feature = "openapi",
        schema(value_type = Option<String>, format = "date-time")
    )]
    pub completed_at: Option<Timestamp>,
    /// Duel responses; unused for debates.
    pub agent1_response: Option<AgentResponse>,
    pub agent2_response: Option<AgentResponse>,
    /// Debate transcript in turn order (agent1, agent2, agent1, ...).
    pub transcript: Vec<AgentResponse>,
    /// Stance agent1 argues in a debate; agent2 takes the opposite.
    pub agent1_stance: Option<DebateStance>,
    pub evaluations: Vec<JudgeEvaluation>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub winner_id: Option<AgentId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub final_scores: HashMap<AgentId, f64>,
    /// Result from agent1's perspective; set on completion.
    pub result: Option<MatchResult>,
    /// Populated when the match reaches Failed or Cancelled.
    pub failure_reason: Option<String>,
    /// Optimistic concurrency version, incremented on every write.
    pub version: u64,
}

impl Match {
    /// Create a pending match.
    pub fn new(
        match_type: MatchType,
        challenge_id: ChallengeId,
        agent1_id: AgentId,
        agent2_id: AgentId,
        division: Division,
    ) -> Self {
        Self {
            match_id: MatchId::now_v7(),
            match_type,
            challenge_id,
            agent1_id,
            agent2_id,
            division,
            status: MatchStatus::Pending,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            agent1_response: None,
            agent2_response: None,
            transcript: Vec::new(),
            agent1_stance: None,
            evaluations: Vec::new(),
            winner_id: None,
            final_scores: HashMap::new(),
            result: None,
            failure_reason: None,
            version: 0,
        }
    }

    /// The other participant.
    pub fn opponent_of(&self, agent_id: AgentId) -> Option<AgentId> {
        if agent_id == self.agent1_id {
            Some(self.agent2_id)
        } else if agent_id == self.agent2_id {
            Some(self.agent1_id)
        } else {
            None
        }
    }

    /// Map a participant to their panel-side label.
    pub fn side_of(&self, agent_id: AgentId) -> Option<PanelWinner> {
        if agent_id == self.agent1_id {
            Some(PanelWinner::Agent1)
        } else if agent_id == self.agent2_id {
            Some(PanelWinner::Agent2)
        } else {
            None
        }
    }

    /// Map a panel-side label back to the participant id.
    pub fn agent_on(&self, side: PanelWinner) -> AgentId {
        match side {
            PanelWinner::Agent1 => self.agent1_id,
            PanelWinner::Agent2 => self.agent2_id,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

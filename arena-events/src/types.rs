//! Event and topic types

use arena_core::{
    AgentId, AgentResponse, ChallengeId, Division, JudgeEvaluation, Match, MatchId, MatchResult,
    MatchStatus, MatchType, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// TOPICS
// ============================================================================

/// Address of an event stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Coarse state transitions of all matches.
    ArenaMatches,
    /// Fine-grained events of a single match, including token deltas.
    Match(MatchId),
}

impl Topic {
    pub fn match_events(match_id: MatchId) -> Self {
        Topic::Match(match_id)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::ArenaMatches => write!(f, "arena/matches"),
            Topic::Match(id) => write!(f, "match/{}", id),
        }
    }
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// `status` event body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub status: MatchStatus,
}

/// `responseDelta` event body. Deltas are discrete increments; the consumer
/// concatenates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDeltaPayload {
    pub agent_id: AgentId,
    pub text_delta: String,
    pub is_streaming: bool,
}

/// `responseComplete` event body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseCompletePayload {
    pub agent_id: AgentId,
    pub response: AgentResponse,
}

/// `debateTurn` event body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateTurnPayload {
    pub turn_index: usize,
    pub response: AgentResponse,
}

/// `evaluation` event body, one per judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationPayload {
    pub evaluation: JudgeEvaluation,
}

/// `final` event body. Every terminal state emits one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalPayload {
    pub winner_id: Option<AgentId>,
    pub final_scores: HashMap<AgentId, f64>,
    pub result: Option<MatchResult>,
}

/// `lagged` event body: the subscriber's channel overflowed and `dropped`
/// events were discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaggedPayload {
    pub dropped: u64,
}

/// Summarized match carried on the `arena/matches` topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub match_id: MatchId,
    pub match_type: MatchType,
    pub challenge_id: ChallengeId,
    pub agent1_id: AgentId,
    pub agent2_id: AgentId,
    pub division: Division,
    pub status: MatchStatus,
    pub winner_id: Option<AgentId>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl From<&Match> for MatchSummary {
    fn from(m: &Match) -> Self {
        Self {
            match_id: m.match_id,
            match_type: m.match_type,
            challenge_id: m.challenge_id,
            agent1_id: m.agent1_id,
            agent2_id: m.agent2_id,
            division: m.division,
            status: m.status,
            winner_id: m.winner_id,
            created_at: m.created_at,
            completed_at: m.completed_at,
        }
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Every event the arena publishes.
///
/// The SSE adapter writes `event_type()` as the SSE event name and
/// `data_json()` as the data line, so wire shapes stay pinned regardless of
/// how this enum serializes internally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ArenaEvent {
    /// Full match object, sent once when a subscriber attaches.
    Snapshot { snapshot: Box<Match> },

    /// State machine transition.
    Status { payload: StatusPayload },

    /// One streamed text increment.
    ResponseDelta { payload: ResponseDeltaPayload },

    /// An agent's response finished streaming.
    ResponseComplete { payload: ResponseCompletePayload },

    /// A debate turn was appended to the transcript.
    DebateTurn { payload: DebateTurnPayload },

    /// One judge's evaluation landed.
    Evaluation { payload: EvaluationPayload },

    /// Terminal result. Emitted exactly once per match.
    Final { payload: FinalPayload },

    /// The subscriber fell behind and events were dropped.
    Lagged { payload: LaggedPayload },

    /// A match was admitted and persisted.
    MatchCreated { summary: MatchSummary },

    /// A live match changed state.
    MatchUpdated { summary: MatchSummary },

    /// A match reached a terminal status.
    MatchCompleted { summary: MatchSummary },
}

impl ArenaEvent {
    /// SSE event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            ArenaEvent::Snapshot { .. } => "snapshot",
            ArenaEvent::Status { .. } => "status",
            ArenaEvent::ResponseDelta { .. } => "responseDelta",
            ArenaEvent::ResponseComplete { .. } => "responseComplete",
            ArenaEvent::DebateTurn { .. } => "debateTurn",
            ArenaEvent::Evaluation { .. } => "evaluation",
            ArenaEvent::Final { .. } => "final",
            ArenaEvent::Lagged { .. } => "lagged",
            ArenaEvent::MatchCreated { .. } => "matchCreated",
            ArenaEvent::MatchUpdated { .. } => "matchUpdated",
            ArenaEvent::MatchCompleted { .. } => "matchCompleted",
        }
    }

    /// SSE data body: the payload alone, without the event tag.
    pub fn data_json(&self) -> serde_json::Value {
        let result = match self {
            ArenaEvent::Snapshot { snapshot } => serde_json::to_value(snapshot),
            ArenaEvent::Status { payload } => serde_json::to_value(payload),
            ArenaEvent::ResponseDelta { payload } => serde_json::to_value(payload),
            ArenaEvent::ResponseComplete { payload } => serde_json::to_value(payload),
            ArenaEvent::DebateTurn { payload } => serde_json::to_value(payload),
            ArenaEvent::Evaluation { payload } => serde_json::to_value(payload),
            ArenaEvent::Final { payload } => serde_json::to_value(payload),
            ArenaEvent::Lagged { payload } => serde_json::to_value(payload),
            ArenaEvent::MatchCreated { summary }
            | ArenaEvent::MatchUpdated { summary }
            | ArenaEvent::MatchCompleted { summary } => serde_json::to_value(summary),
        };
        result.unwrap_or(serde_json::Value::Null)
    }

    /// Whether this event ends its per-match stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ArenaEvent::Final { .. })
    }
}

//! OpenAPI document aggregation

use crate::error::{ApiError, ErrorCode};
use crate::types::{QuickMatchRequest, RegisterAgentRequest, TooManyMatchesBody};
use arena_core::{
    Agent, AgentResponse, Challenge, ChallengeDifficulty, ChallengeSource, ChallengeType,
    CriterionScore, DebateStance, Division, DivisionChange, DivisionChangeKind, EloHistoryEntry,
    EvaluationCriterion, JudgeEvaluation, JudgeStats, Match, MatchResult, MatchStats, MatchStatus,
    MatchType, PanelWinner,
};
use arena_engine::{ChallengeDraft, TournamentStatus};
use utoipa::OpenApi;

/// OpenAPI documentation for the arena API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Arena API",
        description = "Autonomous LLM competition arena: matches, rankings, live streams."
    ),
    paths(
        crate::routes::agent::list_agents,
        crate::routes::agent::get_agent,
        crate::routes::agent::register_agent,
        crate::routes::challenge::list_challenges,
        crate::routes::challenge::contribute_challenge,
        crate::routes::matches::list_matches,
        crate::routes::matches::live_matches,
        crate::routes::matches::get_match,
        crate::routes::matches::quick_match,
        crate::routes::matches::king_challenge,
        crate::routes::tournament::start_tournament,
        crate::routes::tournament::tournament_status,
        crate::routes::health::health,
    ),
    components(schemas(
        Agent,
        AgentResponse,
        ApiError,
        Challenge,
        ChallengeDifficulty,
        ChallengeDraft,
        ChallengeSource,
        ChallengeType,
        CriterionScore,
        DebateStance,
        Division,
        DivisionChange,
        DivisionChangeKind,
        EloHistoryEntry,
        ErrorCode,
        EvaluationCriterion,
        JudgeEvaluation,
        JudgeStats,
        Match,
        MatchResult,
        MatchStats,
        MatchStatus,
        MatchType,
        PanelWinner,
        QuickMatchRequest,
        RegisterAgentRequest,
        TooManyMatchesBody,
        TournamentStatus,
    )),
    tags(
        (name = "Agents", description = "Competitors and judges"),
        (name = "Challenges", description = "The challenge pool"),
        (name = "Matches", description = "Match life-cycle and live streams"),
        (name = "Tournament", description = "Tournament rounds and standings"),
        (name = "Health", description = "Probes"),
    )
)]
pub struct ApiDoc;

//! Enum types for arena entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// DIVISIONS
// ============================================================================

/// Rank bucket an agent competes in. Ordered from lowest to highest so that
/// `Division::Master > Division::Novice` holds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Division {
    #[default]
    Novice,
    Expert,
    Master,
    King,
}

impl Division {
    /// All divisions, lowest first.
    pub const ALL: [Division; 4] = [
        Division::Novice,
        Division::Expert,
        Division::Master,
        Division::King,
    ];

    /// ELO K-factor applied to matches in this division.
    pub fn k_factor(&self) -> f64 {
        match self {
            Division::Novice => 32.0,
            Division::Expert => 24.0,
            Division::Master => 16.0,
            Division::King => 12.0,
        }
    }

    /// The challenge difficulty band served to this division.
    pub fn difficulty_band(&self) -> [ChallengeDifficulty; 2] {
        match self {
            Division::Novice => [
                ChallengeDifficulty::Beginner,
                ChallengeDifficulty::Intermediate,
            ],
            Division::Expert => [
                ChallengeDifficulty::Intermediate,
                ChallengeDifficulty::Advanced,
            ],
            Division::Master => [ChallengeDifficulty::Advanced, ChallengeDifficulty::Expert],
            Division::King => [ChallengeDifficulty::Expert, ChallengeDifficulty::Master],
        }
    }

    /// The division directly above, if any.
    pub fn promoted(&self) -> Option<Division> {
        match self {
            Division::Novice => Some(Division::Expert),
            Division::Expert => Some(Division::Master),
            // Master -> King only via a KingChallenge, never by threshold
            Division::Master => None,
            Division::King => None,
        }
    }

    /// The division directly below, if any.
    pub fn demoted(&self) -> Option<Division> {
        match self {
            Division::Novice => None,
            Division::Expert => Some(Division::Novice),
            Division::Master => Some(Division::Expert),
            Division::King => None,
        }
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Division::Novice => "novice",
            Division::Expert => "expert",
            Division::Master => "master",
            Division::King => "king",
        };
        write!(f, "{}", s)
    }
}

/// Error type for parsing a division from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionParseError(pub String);

impl fmt::Display for DivisionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown division: {}", self.0)
    }
}

impl std::error::Error for DivisionParseError {}

impl FromStr for Division {
    type Err = DivisionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "novice" => Ok(Division::Novice),
            "expert" => Ok(Division::Expert),
            "master" => Ok(Division::Master),
            "king" => Ok(Division::King),
            _ => Err(DivisionParseError(s.to_string())),
        }
    }
}

// ============================================================================
// CHALLENGES
// ============================================================================

/// Category of intellectual challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    LogicalReasoning,
    Debate,
    CreativeProblemSolving,
    Mathematical,
    AbstractThinking,
}

/// Difficulty level of a challenge, lowest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ChallengeDifficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
    Master,
}

impl ChallengeDifficulty {
    /// Numeric level 1..=5.
    pub fn level(&self) -> u8 {
        match self {
            ChallengeDifficulty::Beginner => 1,
            ChallengeDifficulty::Intermediate => 2,
            ChallengeDifficulty::Advanced => 3,
            ChallengeDifficulty::Expert => 4,
            ChallengeDifficulty::Master => 5,
        }
    }
}

/// Where a challenge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ChallengeSource {
    #[default]
    Seed,
    Generated,
    Community,
}

// ============================================================================
// MATCHES
// ============================================================================

/// Type of match being played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    RegularDuel,
    Debate,
    KingChallenge,
}

/// Status of a match. `Completed`, `Cancelled` and `Failed` are terminal;
/// a match is never mutated after reaching one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl MatchStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MatchStatus::Completed | MatchStatus::Cancelled | MatchStatus::Failed
        )
    }
}

/// Result of a match from agent1's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    Win,
    Loss,
    Draw,
}

impl MatchResult {
    /// The same result seen from the other side of the table.
    pub fn inverted(&self) -> MatchResult {
        match self {
            MatchResult::Win => MatchResult::Loss,
            MatchResult::Loss => MatchResult::Win,
            MatchResult::Draw => MatchResult::Draw,
        }
    }

    /// Actual score for the ELO update: 1 / 0.5 / 0.
    pub fn actual_score(&self) -> f64 {
        match self {
            MatchResult::Win => 1.0,
            MatchResult::Draw => 0.5,
            MatchResult::Loss => 0.0,
        }
    }
}

/// Which side of a debate an agent argues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DebateStance {
    For,
    Against,
}

impl DebateStance {
    pub fn opposite(&self) -> DebateStance {
        match self {
            DebateStance::For => DebateStance::Against,
            DebateStance::Against => DebateStance::For,
        }
    }
}

impl fmt::Display for DebateStance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebateStance::For => write!(f, "for"),
            DebateStance::Against => write!(f, "against"),
        }
    }
}

// ============================================================================
// RANKING
// ============================================================================

/// Direction of a division change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DivisionChangeKind {
    Promotion,
    Demotion,
}

// ============================================================================
// JUDGING
// ============================================================================

/// A judge's recommended winner. `None` at the evaluation level means the
/// judge recommends a draw; the panel verdict is computed separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PanelWinner {
    Agent1,
    Agent2,
}

impl PanelWinner {
    pub fn other(&self) -> PanelWinner {
        match self {
            PanelWinner::Agent1 => PanelWinner::Agent2,
            PanelWinner::Agent2 => PanelWinner::Agent1,
        }
    }
}

/// Criterion a judge scores each response on, 0-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EvaluationCriterion {
    Correctness,
    Completeness,
    LogicalConsistency,
    Clarity,
    Creativity,
    Depth,
}

impl EvaluationCriterion {
    /// All criteria, in prompt order.
    pub const ALL: [EvaluationCriterion; 6] = [
        EvaluationCriterion::Correctness,
        EvaluationCriterion::Completeness,
        EvaluationCriterion::LogicalConsistency,
        EvaluationCriterion::Clarity,
        EvaluationCriterion::Creativity,
        EvaluationCriterion::Depth,
    ];

    /// Snake-case name used in judge prompts and structured output.
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationCriterion::Correctness => "correctness",
            EvaluationCriterion::Completeness => "completeness",
            EvaluationCriterion::LogicalConsistency => "logical_consistency",
            EvaluationCriterion::Clarity => "clarity",
            EvaluationCriterion::Creativity => "creativity",
            EvaluationCriterion::Depth => "depth",
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Arena Engine - Match Execution and Ranking
//!
//! Composes the gateway, repository, and event bus into the full match
//! life-cycle: admission, pairing, challenge selection, concurrent response
//! generation with token streaming, multi-judge evaluation, ELO and
//! division updates, persistence, and real-time fan-out.
//!
//! Dependency order is strict: the scheduler drives runners, runners drive
//! the gateway and judge panel, finalization goes through the ranking
//! engine. Nothing calls back up the stack.

mod challenge_pool;
mod judge;
mod pairing;
mod ranking;
mod runner;
mod scheduler;
mod tournament;

pub use challenge_pool::{ChallengeDraft, ChallengePool, WeightedChallengePool};
pub use judge::{JudgePanel, PanelOutcome};
pub use pairing::{EloPairing, Pairing, PairingOverride};
pub use ranking::RankingEngine;
pub use runner::MatchRunner;
pub use scheduler::{ArenaScheduler, StartRequest};
pub use tournament::{TournamentDriver, TournamentStatus};

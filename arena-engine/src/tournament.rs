//! Tournament driver
//!
//! Admin-triggered multi-round sweep: each round pairs off every division
//! and runs the matches through the normal scheduler path, waiting out the
//! live-match cap instead of bypassing it. Division changes fall out of
//! per-match finalization.

use crate::scheduler::{ArenaScheduler, StartRequest};
use arena_core::{AgentId, ArenaError, ArenaResult, Division, MatchId, SchedulerError};
use arena_storage::{AgentFilter, Repository};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// How long to wait before retrying a start rejected by the live cap.
const CAP_BACKOFF: Duration = Duration::from_millis(500);

/// Poll interval while waiting for a match to reach a terminal state.
const COMPLETION_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, Default)]
struct TournamentState {
    running: bool,
    current_round: u32,
    total_rounds: u32,
}

/// Snapshot returned by `GET /tournament/status`.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TournamentStatus {
    pub running: bool,
    pub current_round: u32,
    pub total_rounds: u32,
    pub total_agents: usize,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub divisions: HashMap<Division, usize>,
    pub total_matches: u64,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub current_king: Option<AgentId>,
}

/// Runs tournaments over the scheduler.
pub struct TournamentDriver {
    scheduler: Arc<ArenaScheduler>,
    repo: Arc<dyn Repository>,
    state: Arc<Mutex<TournamentState>>,
}

impl TournamentDriver {
    pub fn new(scheduler: Arc<ArenaScheduler>, repo: Arc<dyn Repository>) -> Self {
        Self {
            scheduler,
            repo,
            state: Arc::new(Mutex::new(TournamentState::default())),
        }
    }

    /// Kick off a tournament in the background. Fails when one is already
    /// running.
    pub fn start(&self, num_rounds: u32) -> ArenaResult<()> {
        {
            let mut state = self.state.lock().expect("tournament state poisoned");
            if state.running {
                return Err(SchedulerError::TournamentRunning.into());
            }
            *state = TournamentState {
                running: true,
                current_round: 0,
                total_rounds: num_rounds,
            };
        }

        let scheduler = Arc::clone(&self.scheduler);
        let repo = Arc::clone(&self.repo);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            info!(num_rounds, "Tournament started");
            for round in 1..=num_rounds {
                state
                    .lock()
                    .expect("tournament state poisoned")
                    .current_round = round;
                if let Err(error) = run_round(&scheduler, &repo).await {
                    warn!(round, %error, "Tournament round aborted");
                    break;
                }
                info!(round, "Tournament round completed");
            }
            state.lock().expect("tournament state poisoned").running = false;
            info!("Tournament finished");
        });
        Ok(())
    }

    /// Current standings and progress.
    pub async fn status(&self) -> ArenaResult<TournamentStatus> {
        let state = *self.state.lock().expect("tournament state poisoned");
        let agents = self.repo.list_agents(&AgentFilter::default()).await?;

        let mut divisions: HashMap<Division, usize> = HashMap::new();
        for division in Division::ALL {
            divisions.insert(division, 0);
        }
        for agent in agents.iter().filter(|a| a.active) {
            *divisions.entry(agent.division).or_insert(0) += 1;
        }

        let total_matches = agents
            .iter()
            .map(|a| u64::from(a.global_stats.matches))
            .sum::<u64>()
            / 2;
        let current_king = agents
            .iter()
            .find(|a| a.active && a.division == Division::King)
            .map(|a| a.agent_id);

        Ok(TournamentStatus {
            running: state.running,
            current_round: state.current_round,
            total_rounds: state.total_rounds,
            total_agents: agents.iter().filter(|a| a.active).count(),
            divisions,
            total_matches,
            current_king,
        })
    }
}

/// Pair off every division and run the matches to completion.
async fn run_round(
    scheduler: &Arc<ArenaScheduler>,
    repo: &Arc<dyn Repository>,
) -> ArenaResult<()> {
    for division in [Division::Novice, Division::Expert, Division::Master] {
        let mut agents = repo.list_agents(&AgentFilter::active_in(division)).await?;
        if agents.len() < 2 {
            continue;
        }
        agents.shuffle(&mut rand::thread_rng());

        for pair in agents.chunks(2) {
            let [a, b] = pair else {
                // Odd agent out sits this round
                continue;
            };
            let mut request = StartRequest::quick(division);
            request.agent1_id = Some(a.agent_id);
            request.agent2_id = Some(b.agent_id);

            match start_with_backoff(scheduler, request).await {
                Ok(match_id) => wait_terminal(repo, match_id).await,
                Err(error) => {
                    // A cooling-down or exhausted pairing skips, it does
                    // not abort the round
                    warn!(division = %division, %error, "Tournament pairing skipped");
                }
            }
        }
    }
    Ok(())
}

/// Start a match, waiting out the live-match cap.
async fn start_with_backoff(
    scheduler: &Arc<ArenaScheduler>,
    request: StartRequest,
) -> ArenaResult<MatchId> {
    loop {
        match scheduler.start(request.clone()).await {
            Ok(m) => return Ok(m.match_id),
            Err(ArenaError::Scheduler(SchedulerError::TooMany { .. })) => {
                tokio::time::sleep(CAP_BACKOFF).await;
            }
            Err(other) => return Err(other),
        }
    }
}

async fn wait_terminal(repo: &Arc<dyn Repository>, match_id: MatchId) {
    loop {
        match repo.get_match(match_id).await {
            Ok(Some(m)) if m.status.is_terminal() => return,
            Ok(Some(_)) | Ok(None) => {}
            Err(error) => {
                warn!(%match_id, %error, "Tournament lost track of a match");
                return;
            }
        }
        tokio::time::sleep(COMPLETION_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge_pool::WeightedChallengePool;
    use crate::judge::JudgePanel;
    use crate::pairing::EloPairing;
    use crate::ranking::RankingEngine;
    use crate::runner::MatchRunner;
    use arena_core::{
        Agent, ArenaConfig, Challenge, ChallengeDifficulty, ChallengeType, MatchStatus,
    };
    use arena_events::EventBus;
    use arena_llm::{MockGateway, ModelGateway};
    use arena_storage::{InMemoryRepository, MatchFilter};
    use serde_json::json;

    fn verdict() -> serde_json::Value {
        let scores = |v: f64| {
            json!({
                "correctness": v, "completeness": v, "logical_consistency": v,
                "clarity": v, "creativity": v, "depth": v
            })
        };
        json!({
            "agent1_scores": scores(8.0),
            "agent2_scores": scores(4.0),
            "recommended_winner": "agent1",
            "overall_reasoning": "first was stronger",
            "confidence": 0.9
        })
    }

    async fn build_driver() -> (Arc<TournamentDriver>, Arc<InMemoryRepository>) {
        let mut config = ArenaConfig::default();
        // No cooldown so consecutive tournament matches pair freely
        config.pairing.cooldown = Duration::from_secs(0);
        let repo = Arc::new(InMemoryRepository::new());
        let gateway: Arc<dyn ModelGateway> =
            Arc::new(MockGateway::new().with_default_structured(verdict()));
        let bus = EventBus::new();

        let pairing = Arc::new(EloPairing::new(
            Arc::clone(&repo) as Arc<dyn Repository>,
            config.pairing.clone(),
        ));
        let pool = Arc::new(WeightedChallengePool::new(
            Arc::clone(&repo) as Arc<dyn Repository>,
            config.pool.clone(),
        ));
        let panel = Arc::new(JudgePanel::new(
            Arc::clone(&gateway),
            Arc::clone(&repo) as Arc<dyn Repository>,
            config.judging.clone(),
        ));
        let ranking = Arc::new(RankingEngine::new(
            Arc::clone(&repo) as Arc<dyn Repository>,
            config.clone(),
        ));
        let runner = MatchRunner::new(
            Arc::clone(&repo) as Arc<dyn Repository>,
            Arc::clone(&gateway),
            panel,
            ranking.clone(),
            bus.clone(),
            config.clone(),
        );
        let scheduler = Arc::new(ArenaScheduler::new(
            Arc::clone(&repo) as Arc<dyn Repository>,
            pairing,
            pool,
            ranking,
            runner,
            bus,
            config,
        ));
        let driver = Arc::new(TournamentDriver::new(
            scheduler,
            Arc::clone(&repo) as Arc<dyn Repository>,
        ));
        (driver, repo)
    }

    async fn seed(repo: &InMemoryRepository) {
        for i in 0..4 {
            let mut agent = Agent::new(format!("novice-{}", i), format!("model/{}", i));
            agent.division = Division::Novice;
            repo.put_agent(&agent).await.unwrap();
        }
        for i in 0..3 {
            let mut judge = Agent::new(format!("judge-{}", i), format!("judge/{}", i));
            judge.division = Division::Master;
            judge.supports_structured_output = true;
            judge.judge_stats.reliability = 0.8;
            repo.put_agent(&judge).await.unwrap();
        }
        repo.put_challenge(&Challenge::new(
            "riddle",
            "what walks on four legs",
            ChallengeType::LogicalReasoning,
            ChallengeDifficulty::Beginner,
        ))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_tournament_runs_a_round() {
        let (driver, repo) = build_driver().await;
        seed(&repo).await;

        driver.start(1).unwrap();

        // Only one tournament at a time
        assert!(matches!(
            driver.start(1),
            Err(ArenaError::Scheduler(SchedulerError::TournamentRunning))
        ));

        for _ in 0..500 {
            if !driver.status().await.unwrap().running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let status = driver.status().await.unwrap();
        assert!(!status.running);
        assert_eq!(status.total_rounds, 1);

        // Four novices produce two completed matches
        let completed = repo
            .list_matches(&MatchFilter::with_status(MatchStatus::Completed))
            .await
            .unwrap();
        assert_eq!(completed.len(), 2);
        assert_eq!(status.total_matches, 2);

        // A second tournament can start afterwards
        assert!(driver.start(1).is_ok());
    }

    #[tokio::test]
    async fn test_status_reports_divisions_and_king() {
        let (driver, repo) = build_driver().await;
        let mut king = Agent::new("reigning", "model/king");
        king.division = Division::King;
        repo.put_agent(&king).await.unwrap();
        let mut novice = Agent::new("fresh", "model/fresh");
        novice.division = Division::Novice;
        repo.put_agent(&novice).await.unwrap();

        let status = driver.status().await.unwrap();
        assert_eq!(status.total_agents, 2);
        assert_eq!(status.divisions[&Division::King], 1);
        assert_eq!(status.divisions[&Division::Novice], 1);
        assert_eq!(status.divisions[&Division::Expert], 0);
        assert_eq!(status.current_king, Some(king.agent_id));
        assert!(!status.running);
    }
}

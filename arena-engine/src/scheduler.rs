//! Arena scheduler
//!
//! Global admission control for match starts: the live-match cap, per-IP
//! token buckets, and cancellation. The scheduler is the single writer of
//! the live-match table; admission decisions are linearizable because the
//! slot is reserved under the table lock before any asynchronous work
//! begins.

use crate::challenge_pool::ChallengePool;
use crate::pairing::{Pairing, PairingOverride};
use crate::ranking::RankingEngine;
use crate::runner::MatchRunner;
use arena_core::{
    AgentId, ArenaConfig, ArenaResult, ChallengeType, Division, EntityIdType, Match, MatchId,
    MatchStatus, MatchType, SchedulerError,
};
use arena_events::{ArenaEvent, EventBus, MatchSummary, Topic};
use arena_storage::{AgentFilter, Repository};
use dashmap::DashMap;
use futures_util::FutureExt;
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::HashMap;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// A request to start a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub division: Division,
    /// Forced match type; `None` follows the picked challenge (a debate
    /// challenge produces a Debate, anything else a RegularDuel).
    pub match_type: Option<MatchType>,
    pub agent1_id: Option<AgentId>,
    pub agent2_id: Option<AgentId>,
    pub challenge_type: Option<ChallengeType>,
    /// Requester address for rate limiting; `None` marks internal starts.
    pub requester: Option<IpAddr>,
}

impl StartRequest {
    pub fn quick(division: Division) -> Self {
        Self {
            division,
            match_type: None,
            agent1_id: None,
            agent2_id: None,
            challenge_type: None,
            requester: None,
        }
    }
}

struct LiveEntry {
    summary: Option<MatchSummary>,
    cancel: watch::Sender<bool>,
}

/// Globally bounded executor for matches.
pub struct ArenaScheduler {
    repo: Arc<dyn Repository>,
    pairing: Arc<dyn Pairing>,
    pool: Arc<dyn ChallengePool>,
    ranking: Arc<RankingEngine>,
    runner: MatchRunner,
    bus: EventBus,
    config: ArenaConfig,
    /// Shared with detached runner tasks so they can release their slot.
    live: Arc<Mutex<HashMap<MatchId, LiveEntry>>>,
    limiters: DashMap<IpAddr, Arc<DefaultDirectRateLimiter>>,
    shutting_down: AtomicBool,
}

impl ArenaScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<dyn Repository>,
        pairing: Arc<dyn Pairing>,
        pool: Arc<dyn ChallengePool>,
        ranking: Arc<RankingEngine>,
        runner: MatchRunner,
        bus: EventBus,
        config: ArenaConfig,
    ) -> Self {
        Self {
            repo,
            pairing,
            pool,
            ranking,
            runner,
            bus,
            config,
            live: Arc::new(Mutex::new(HashMap::new())),
            limiters: DashMap::new(),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Start a match. Fails immediately with `TooMany` at the live cap --
    /// callers are expected to retry.
    pub async fn start(&self, request: StartRequest) -> ArenaResult<Match> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(SchedulerError::ShuttingDown.into());
        }
        if let Some(requester) = request.requester {
            self.check_rate_limit(requester)?;
        }

        // Reserve the slot under the table lock; the reservation counts
        // against the cap until the runner publishes its terminal event
        let match_id = MatchId::now_v7();
        {
            let mut live = self.live.lock().expect("live table poisoned");
            if live.len() >= self.config.scheduler.max_live_matches {
                return Err(SchedulerError::TooMany {
                    live: live.len(),
                    max: self.config.scheduler.max_live_matches,
                }
                .into());
            }
            let (cancel, _) = watch::channel(false);
            live.insert(
                match_id,
                LiveEntry {
                    summary: None,
                    cancel,
                },
            );
        }

        match self.prepare(match_id, &request).await {
            Ok(m) => {
                self.spawn_runner(&m);
                Ok(m)
            }
            Err(error) => {
                self.live
                    .lock()
                    .expect("live table poisoned")
                    .remove(&match_id);
                Err(error)
            }
        }
    }

    /// Pair, pick a challenge, persist Pending, announce.
    async fn prepare(&self, match_id: MatchId, request: &StartRequest) -> ArenaResult<Match> {
        let (agent1, agent2, match_type, division) = match request.match_type {
            Some(MatchType::KingChallenge) => {
                let (king, challenger) = self.king_challenge_pair(request).await?;
                (king, challenger, MatchType::KingChallenge, Division::King)
            }
            _ => {
                let requested = match (request.agent1_id, request.agent2_id) {
                    (Some(agent1_id), Some(agent2_id)) => Some(PairingOverride {
                        agent1_id,
                        agent2_id,
                    }),
                    _ => None,
                };
                let (a, b) = self.pairing.pick(request.division, requested).await?;
                (a, b, MatchType::RegularDuel, request.division)
            }
        };

        let challenge_type = match (request.match_type, request.challenge_type) {
            (Some(MatchType::Debate), _) => Some(ChallengeType::Debate),
            (_, explicit) => explicit,
        };
        let challenge = self
            .pool
            .pick(division, challenge_type, (&agent1, &agent2))
            .await?;

        // The challenge drives the format unless the caller forced one
        let match_type = match request.match_type {
            Some(forced) => forced,
            None if challenge.challenge_type == ChallengeType::Debate => MatchType::Debate,
            None => match_type,
        };

        let mut m = Match::new(
            match_type,
            challenge.challenge_id,
            agent1.agent_id,
            agent2.agent_id,
            division,
        );
        m.match_id = match_id;
        let stored = self.repo.put_match(&m).await?;

        {
            let mut live = self.live.lock().expect("live table poisoned");
            if let Some(entry) = live.get_mut(&match_id) {
                entry.summary = Some(MatchSummary::from(&stored));
            }
        }
        self.bus
            .publish(
                Topic::ArenaMatches,
                ArenaEvent::MatchCreated {
                    summary: MatchSummary::from(&stored),
                },
            )
            .await;
        info!(%match_id, ?match_type, %division, "Match admitted");
        Ok(stored)
    }

    /// Resolve the reigning King and an eligible challenger.
    async fn king_challenge_pair(
        &self,
        request: &StartRequest,
    ) -> ArenaResult<(arena_core::Agent, arena_core::Agent)> {
        let kings = self
            .repo
            .list_agents(&AgentFilter::active_in(Division::King))
            .await?;
        let king = kings
            .into_iter()
            .next()
            .ok_or_else(|| SchedulerError::NotEligible {
                reason: "no reigning King".to_string(),
            })?;

        let masters = self
            .repo
            .list_agents(&AgentFilter::active_in(Division::Master))
            .await?;
        let challenger = match request.agent2_id {
            Some(challenger_id) => masters
                .into_iter()
                .find(|a| a.agent_id == challenger_id)
                .filter(|a| self.ranking.is_eligible_challenger(a))
                .ok_or_else(|| SchedulerError::NotEligible {
                    reason: "requested challenger is not an eligible Master".to_string(),
                })?,
            None => masters
                .into_iter()
                .filter(|a| self.ranking.is_eligible_challenger(a))
                .max_by(|a, b| {
                    a.elo_rating
                        .partial_cmp(&b.elo_rating)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .ok_or_else(|| SchedulerError::NotEligible {
                    reason: "no Master meets the challenger bar".to_string(),
                })?,
        };
        Ok((king, challenger))
    }

    fn spawn_runner(&self, m: &Match) {
        let cancel_rx = {
            let live = self.live.lock().expect("live table poisoned");
            live.get(&m.match_id)
                .map(|entry| entry.cancel.subscribe())
                .unwrap_or_else(|| watch::channel(false).1)
        };

        let runner = self.runner.clone();
        let repo = Arc::clone(&self.repo);
        let bus = self.bus.clone();
        let live = Arc::clone(&self.live);
        let m = m.clone();
        tokio::spawn(async move {
            let match_id = m.match_id;
            let run = AssertUnwindSafe(runner.run(m, cancel_rx)).catch_unwind();
            match run.await {
                Ok(_terminal) => {}
                Err(panic) => {
                    // A panicking runner still produces a terminal state
                    error!(%match_id, ?panic, "Match runner panicked");
                    mark_failed_after_panic(&repo, &bus, match_id).await;
                }
            }
            live.lock().expect("live table poisoned").remove(&match_id);

            // Retire the per-match topic once the terminal event has left
            // the staging queue
            for _ in 0..100 {
                if bus.staged_len() == 0 {
                    break;
                }
                tokio::task::yield_now().await;
            }
            bus.retire_topic(&Topic::match_events(match_id));
        });
    }

    /// Cancel a live match.
    pub async fn cancel(&self, match_id: MatchId) -> ArenaResult<()> {
        {
            let live = self.live.lock().expect("live table poisoned");
            if let Some(entry) = live.get(&match_id) {
                let _ = entry.cancel.send(true);
                info!(%match_id, "Cancellation requested");
                return Ok(());
            }
        }
        match self.repo.get_match(match_id).await? {
            Some(m) if m.status.is_terminal() => {
                Err(SchedulerError::AlreadyTerminal { match_id }.into())
            }
            Some(_) | None => Err(SchedulerError::MatchNotFound { match_id }.into()),
        }
    }

    /// Summaries of every live match.
    pub fn snapshot(&self) -> Vec<MatchSummary> {
        self.live
            .lock()
            .expect("live table poisoned")
            .values()
            .filter_map(|entry| entry.summary.clone())
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().expect("live table poisoned").len()
    }

    pub fn max_live_matches(&self) -> usize {
        self.config.scheduler.max_live_matches
    }

    /// Stop admitting and cancel everything live. Live matches transition
    /// to Cancelled and their partial state is persisted by their runners.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        let live = self.live.lock().expect("live table poisoned");
        for entry in live.values() {
            let _ = entry.cancel.send(true);
        }
        info!(live = live.len(), "Scheduler shutting down");
    }

    fn check_rate_limit(&self, requester: IpAddr) -> Result<(), SchedulerError> {
        let limiter = self
            .limiters
            .entry(requester)
            .or_insert_with(|| {
                let per_minute = NonZeroU32::new(self.config.scheduler.starts_per_minute)
                    .unwrap_or(NonZeroU32::MIN);
                Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))
            })
            .clone();

        limiter.check().map_err(|not_until| {
            let retry_after_secs = not_until
                .wait_time_from(DefaultClock::default().now())
                .as_secs()
                .max(1);
            SchedulerError::RateLimited { retry_after_secs }
        })
    }
}

async fn mark_failed_after_panic(repo: &Arc<dyn Repository>, bus: &EventBus, match_id: MatchId) {
    let loaded = match repo.get_match(match_id).await {
        Ok(Some(m)) => m,
        Ok(None) => return,
        Err(error) => {
            warn!(%match_id, %error, "Could not load match after panic");
            return;
        }
    };
    if loaded.status.is_terminal() {
        return;
    }
    let mut m = loaded;
    m.status = MatchStatus::Failed;
    m.failure_reason = Some("runner panicked".to_string());
    m.completed_at = Some(chrono::Utc::now());
    m.winner_id = None;
    m.result = None;
    if let Err(error) = repo.put_match(&m).await {
        warn!(%match_id, %error, "Could not persist Failed after panic");
    }
    bus.publish(
        Topic::match_events(match_id),
        ArenaEvent::Final {
            payload: arena_events::FinalPayload {
                winner_id: None,
                final_scores: HashMap::new(),
                result: None,
            },
        },
    )
    .await;
    bus.publish(
        Topic::ArenaMatches,
        ArenaEvent::MatchCompleted {
            summary: MatchSummary::from(&m),
        },
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge_pool::WeightedChallengePool;
    use crate::judge::JudgePanel;
    use crate::pairing::EloPairing;
    use arena_core::{Agent, ArenaError, Challenge, ChallengeDifficulty};
    use arena_llm::{MockGateway, ModelGateway};
    use arena_storage::{InMemoryRepository, MatchFilter};
    use serde_json::json;
    use std::time::Duration;

    fn verdict(winner: &str) -> serde_json::Value {
        let scores = |v: f64| {
            json!({
                "correctness": v, "completeness": v, "logical_consistency": v,
                "clarity": v, "creativity": v, "depth": v
            })
        };
        json!({
            "agent1_scores": scores(7.0),
            "agent2_scores": scores(4.0),
            "recommended_winner": winner,
            "overall_reasoning": "clear",
            "confidence": 0.9
        })
    }

    async fn build_scheduler(
        gateway: MockGateway,
        config: ArenaConfig,
    ) -> (Arc<ArenaScheduler>, Arc<InMemoryRepository>, EventBus) {
        let repo = Arc::new(InMemoryRepository::new());
        let gateway: Arc<dyn ModelGateway> = Arc::new(gateway);
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
            Arc::clone(&panel),
            Arc::clone(&ranking),
            bus.clone(),
            config.clone(),
        );
        let scheduler = Arc::new(ArenaScheduler::new(
            Arc::clone(&repo) as Arc<dyn Repository>,
            pairing,
            pool,
            ranking,
            runner,
            bus.clone(),
            config,
        ));
        (scheduler, repo, bus)
    }

    async fn seed_division(repo: &InMemoryRepository, division: Division, count: usize) {
        for i in 0..count {
            let mut agent = Agent::new(format!("{}-{}", division, i), format!("model/{}", i));
            agent.division = division;
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
            "warmup",
            "solve",
            ChallengeType::LogicalReasoning,
            ChallengeDifficulty::Beginner,
        ))
        .await
        .unwrap();
    }

    async fn wait_terminal(repo: &InMemoryRepository, match_id: MatchId) -> Match {
        for _ in 0..500 {
            if let Some(m) = repo.get_match(match_id).await.unwrap() {
                if m.status.is_terminal() {
                    return m;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("match never reached a terminal state");
    }

    #[tokio::test]
    async fn test_admission_cap_enforced() {
        let mut config = ArenaConfig::default();
        config.scheduler.max_live_matches = 1;
        // Keep the first match live long enough to observe the cap
        let gateway = MockGateway::new()
            .with_default_structured(verdict("agent1"))
            .with_latency(Duration::from_millis(300));
        let (scheduler, repo, _bus) = build_scheduler(gateway, config).await;
        seed_division(&repo, Division::Novice, 4).await;

        let first = scheduler.start(StartRequest::quick(Division::Novice)).await;
        let first = first.unwrap();
        assert_eq!(scheduler.live_count(), 1);

        let second = scheduler.start(StartRequest::quick(Division::Novice)).await;
        match second {
            Err(ArenaError::Scheduler(SchedulerError::TooMany { live, max })) => {
                assert_eq!(live, 1);
                assert_eq!(max, 1);
            }
            other => panic!("expected TooMany, got {:?}", other.map(|m| m.match_id)),
        }

        // Once the first match drains the slot frees up
        wait_terminal(&repo, first.match_id).await;
        for _ in 0..500 {
            if scheduler.live_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(scheduler.live_count(), 0);
        assert!(scheduler
            .start(StartRequest::quick(Division::Novice))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_rate_limit_per_requester() {
        let mut config = ArenaConfig::default();
        config.scheduler.starts_per_minute = 1;
        config.scheduler.max_live_matches = 10;
        let gateway = MockGateway::new().with_default_structured(verdict("agent1"));
        let (scheduler, repo, _bus) = build_scheduler(gateway, config).await;
        seed_division(&repo, Division::Novice, 6).await;

        let requester: IpAddr = "203.0.113.7".parse().unwrap();
        let mut request = StartRequest::quick(Division::Novice);
        request.requester = Some(requester);

        assert!(scheduler.start(request.clone()).await.is_ok());
        let second = scheduler.start(request).await;
        assert!(matches!(
            second,
            Err(ArenaError::Scheduler(SchedulerError::RateLimited { .. }))
        ));

        // A different requester is not affected
        let mut other = StartRequest::quick(Division::Novice);
        other.requester = Some("203.0.113.8".parse().unwrap());
        assert!(scheduler.start(other).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_pairing_releases_slot() {
        let config = ArenaConfig::default();
        let gateway = MockGateway::new();
        let (scheduler, _repo, _bus) = build_scheduler(gateway, config).await;
        // Empty division: pairing fails
        let result = scheduler.start(StartRequest::quick(Division::Expert)).await;
        assert!(result.is_err());
        assert_eq!(scheduler.live_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_live_match() {
        let config = ArenaConfig::default();
        let gateway = MockGateway::new()
            .with_default_structured(verdict("agent1"))
            .with_latency(Duration::from_secs(3600));
        let (scheduler, repo, _bus) = build_scheduler(gateway, config).await;
        seed_division(&repo, Division::Novice, 2).await;

        let m = scheduler
            .start(StartRequest::quick(Division::Novice))
            .await
            .unwrap();
        scheduler.cancel(m.match_id).await.unwrap();

        let stored = wait_terminal(&repo, m.match_id).await;
        assert_eq!(stored.status, MatchStatus::Cancelled);

        // Cancelling again: the match is already terminal
        for _ in 0..500 {
            if scheduler.live_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(matches!(
            scheduler.cancel(m.match_id).await,
            Err(ArenaError::Scheduler(SchedulerError::AlreadyTerminal { .. }))
        ));
        assert!(matches!(
            scheduler.cancel(MatchId::now_v7()).await,
            Err(ArenaError::Scheduler(SchedulerError::MatchNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_lists_live_matches() {
        let config = ArenaConfig::default();
        let gateway = MockGateway::new()
            .with_default_structured(verdict("agent1"))
            .with_latency(Duration::from_secs(3600));
        let (scheduler, repo, _bus) = build_scheduler(gateway, config).await;
        seed_division(&repo, Division::Novice, 4).await;

        let m = scheduler
            .start(StartRequest::quick(Division::Novice))
            .await
            .unwrap();
        let snapshot = scheduler.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].match_id, m.match_id);

        scheduler.shutdown();
        assert!(matches!(
            scheduler.start(StartRequest::quick(Division::Novice)).await,
            Err(ArenaError::Scheduler(SchedulerError::ShuttingDown))
        ));
    }

    #[tokio::test]
    async fn test_king_challenge_requires_eligible_master() {
        let config = ArenaConfig::default();
        let gateway = MockGateway::new().with_default_structured(verdict("agent2"));
        let (scheduler, repo, _bus) = build_scheduler(gateway, config).await;

        // No King at all
        let mut request = StartRequest::quick(Division::King);
        request.match_type = Some(MatchType::KingChallenge);
        assert!(matches!(
            scheduler.start(request.clone()).await,
            Err(ArenaError::Scheduler(SchedulerError::NotEligible { .. }))
        ));

        let mut king = Agent::new("king", "model/king");
        king.division = Division::King;
        repo.put_agent(&king).await.unwrap();
        // A Master without the record is not eligible
        let mut weak = Agent::new("weak", "model/weak");
        weak.division = Division::Master;
        repo.put_agent(&weak).await.unwrap();
        assert!(matches!(
            scheduler.start(request.clone()).await,
            Err(ArenaError::Scheduler(SchedulerError::NotEligible { .. }))
        ));

        // An eligible challenger and a King-band challenge make it start
        let mut strong = Agent::new("strong", "model/strong");
        strong.division = Division::Master;
        strong.division_stats.matches = 10;
        strong.division_stats.wins = 8;
        strong.division_stats.losses = 2;
        strong.division_stats.current_streak = 5;
        strong.division_stats.best_streak = 5;
        repo.put_agent(&strong).await.unwrap();
        for i in 0..3 {
            let mut judge = Agent::new(format!("judge-{}", i), format!("judge/{}", i));
            judge.division = Division::Master;
            judge.supports_structured_output = true;
            judge.judge_stats.reliability = 0.8;
            repo.put_agent(&judge).await.unwrap();
        }
        repo.put_challenge(&Challenge::new(
            "endgame",
            "the final question",
            ChallengeType::AbstractThinking,
            ChallengeDifficulty::Master,
        ))
        .await
        .unwrap();

        let m = scheduler.start(request).await.unwrap();
        assert_eq!(m.match_type, MatchType::KingChallenge);
        assert_eq!(m.agent1_id, king.agent_id);
        assert_eq!(m.agent2_id, strong.agent_id);
        assert_eq!(m.division, Division::King);

        let terminal = wait_terminal(&repo, m.match_id).await;
        assert_eq!(terminal.status, MatchStatus::Completed);
        // Challenger won: thrones swapped
        let new_king = repo.get_agent(strong.agent_id).await.unwrap().unwrap();
        assert_eq!(new_king.division, Division::King);

        let completed = repo
            .list_matches(&MatchFilter::with_status(MatchStatus::Completed))
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
    }
}

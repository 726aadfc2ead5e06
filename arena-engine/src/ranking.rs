//! Ranking engine
//!
//! Applies a completed match to ELO ratings, division-scoped stats,
//! promotion/demotion rules, King succession, judge reliability, and
//! challenge quality. All agent writes go through a per-agent lock so there
//! is exactly one writer per agent record at any moment, and outcomes are
//! idempotent by match id.

use arena_core::{
    Agent, AgentId, ArenaConfig, ArenaError, ArenaResult, Challenge, ChallengeId, Division,
    DivisionChange, DivisionChangeKind, EloHistoryEntry, Match, MatchResult, MatchStats,
    MatchStatus, MatchType, PanelWinner, RankingError, StorageError,
};
use arena_storage::{AgentFilter, Repository};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

/// How many times a versioned write is retried after a `Stale` conflict.
const STALE_RETRIES: usize = 3;

/// Applies match outcomes to ratings and divisions.
pub struct RankingEngine {
    repo: Arc<dyn Repository>,
    config: ArenaConfig,
    locks: Mutex<HashMap<AgentId, Arc<tokio::sync::Mutex<()>>>>,
}

/// Standard ELO expectation for `a` against `b`.
fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((rating_b - rating_a) / 400.0))
}

/// Record a result on one stats block.
fn record_result(stats: &mut MatchStats, result: MatchResult) {
    stats.matches += 1;
    match result {
        MatchResult::Win => {
            stats.wins += 1;
            stats.current_streak = (stats.current_streak + 1).max(1);
        }
        MatchResult::Loss => {
            stats.losses += 1;
            stats.current_streak = (stats.current_streak - 1).min(-1);
        }
        MatchResult::Draw => {
            stats.draws += 1;
            stats.current_streak = 0;
        }
    }
    stats.best_streak = stats.best_streak.max(stats.current_streak.unsigned_abs());
}

/// Push onto a rolling window, oldest first.
fn push_capped<T>(window: &mut Vec<T>, item: T, cap: usize) {
    window.push(item);
    if window.len() > cap {
        let excess = window.len() - cap;
        window.drain(..excess);
    }
}

impl RankingEngine {
    pub fn new(repo: Arc<dyn Repository>, config: ArenaConfig) -> Self {
        Self {
            repo,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, agent_id: AgentId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock table poisoned");
        Arc::clone(locks.entry(agent_id).or_default())
    }

    /// Read-mutate-write with bounded retries on `Stale`.
    async fn update_agent<F>(&self, agent_id: AgentId, mutate: F) -> ArenaResult<Agent>
    where
        F: Fn(&mut Agent) -> ArenaResult<()>,
    {
        for attempt in 0..STALE_RETRIES {
            let mut agent =
                self.repo
                    .get_agent(agent_id)
                    .await?
                    .ok_or(StorageError::NotFound {
                        entity: "agent",
                        id: agent_id.to_string(),
                    })?;
            mutate(&mut agent)?;
            match self.repo.put_agent(&agent).await {
                Ok(stored) => return Ok(stored),
                Err(ArenaError::Storage(StorageError::Stale { .. }))
                    if attempt + 1 < STALE_RETRIES => {}
                Err(other) => return Err(other),
            }
        }
        Err(StorageError::Backend {
            reason: format!("agent {} write kept conflicting", agent_id),
        }
        .into())
    }

    async fn update_challenge<F>(&self, challenge_id: ChallengeId, mutate: F) -> ArenaResult<()>
    where
        F: Fn(&mut Challenge),
    {
        for attempt in 0..STALE_RETRIES {
            let Some(mut challenge) = self.repo.get_challenge(challenge_id).await? else {
                // The seed corpus can change under us; not fatal
                return Ok(());
            };
            mutate(&mut challenge);
            match self.repo.put_challenge(&challenge).await {
                Ok(_) => return Ok(()),
                Err(ArenaError::Storage(StorageError::Stale { .. }))
                    if attempt + 1 < STALE_RETRIES => {}
                Err(other) => return Err(other),
            }
        }
        Err(StorageError::Backend {
            reason: format!("challenge {} write kept conflicting", challenge_id),
        }
        .into())
    }

    /// Apply a completed match: ELO, stats, divisions, judges, challenge.
    ///
    /// Idempotent by match id: a second application is rejected.
    #[instrument(skip(self, m), fields(match_id = %m.match_id))]
    pub async fn finalize(&self, m: &Match) -> ArenaResult<()> {
        if m.status != MatchStatus::Completed {
            return Err(RankingError::NotFinalizable {
                match_id: m.match_id,
                reason: format!("status is {:?}", m.status),
            }
            .into());
        }
        let result1 = m.result.ok_or(RankingError::NotFinalizable {
            match_id: m.match_id,
            reason: "no result recorded".to_string(),
        })?;

        // One writer per agent: take both locks in id order
        let (first, second) = if m.agent1_id <= m.agent2_id {
            (m.agent1_id, m.agent2_id)
        } else {
            (m.agent2_id, m.agent1_id)
        };
        let lock_a = self.lock_for(first);
        let lock_b = self.lock_for(second);
        let _guard_a = lock_a.lock().await;
        let _guard_b = lock_b.lock().await;

        let agent1 = self.require_agent(m.agent1_id).await?;
        let agent2 = self.require_agent(m.agent2_id).await?;

        // Idempotency by match id in the ratings log
        if agent1.elo_history.iter().any(|e| e.match_id == m.match_id) {
            return Err(RankingError::AlreadyApplied {
                match_id: m.match_id,
            }
            .into());
        }

        let k = m.division.k_factor();
        let (rating1, rating2) = (agent1.elo_rating, agent2.elo_rating);
        let delta1 = k * (result1.actual_score() - expected_score(rating1, rating2));
        let delta2 = k * (result1.inverted().actual_score() - expected_score(rating2, rating1));

        let updated1 = self
            .apply_to_agent(m, &agent1, result1, delta1, rating2)
            .await?;
        let updated2 = self
            .apply_to_agent(m, &agent2, result1.inverted(), delta2, rating1)
            .await?;

        info!(
            agent1 = %updated1.agent_id,
            agent2 = %updated2.agent_id,
            elo1 = updated1.elo_rating,
            elo2 = updated2.elo_rating,
            "Ratings applied"
        );

        if m.match_type == MatchType::KingChallenge {
            self.apply_succession(&updated1, &updated2, result1)
                .await?;
        } else {
            if result1 != MatchResult::Draw {
                let (winner, loser) = if result1 == MatchResult::Win {
                    (&updated1, &updated2)
                } else {
                    (&updated2, &updated1)
                };
                self.check_promotion(winner).await?;
                self.check_demotion(loser).await?;
            }
        }

        drop(_guard_a);
        drop(_guard_b);

        self.update_judges(m).await?;
        self.update_challenge_quality(m).await?;
        Ok(())
    }

    async fn require_agent(&self, agent_id: AgentId) -> ArenaResult<Agent> {
        self.repo
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| {
                StorageError::NotFound {
                    entity: "agent",
                    id: agent_id.to_string(),
                }
                .into()
            })
    }

    async fn apply_to_agent(
        &self,
        m: &Match,
        agent: &Agent,
        result: MatchResult,
        delta: f64,
        opponent_rating: f64,
    ) -> ArenaResult<Agent> {
        let opponent_id = m
            .opponent_of(agent.agent_id)
            .expect("agent participates in its own match");
        let match_id = m.match_id;
        let challenge_id = m.challenge_id;
        let opponent_window = self.config.pairing.repeat_window;
        let challenge_window = self.config.pool.recent_window;

        self.update_agent(agent.agent_id, move |a| {
            record_result(&mut a.global_stats, result);
            record_result(&mut a.division_stats, result);

            let new_rating = (a.elo_rating + delta).max(0.0);
            a.elo_history.push(EloHistoryEntry {
                timestamp: chrono::Utc::now(),
                rating: new_rating,
                match_id,
                opponent_id,
                opponent_rating,
                result,
                delta,
            });
            a.elo_rating = new_rating;

            push_capped(&mut a.recent_opponents, opponent_id, opponent_window);
            push_capped(&mut a.recent_challenges, challenge_id, challenge_window);
            a.last_match_at = Some(chrono::Utc::now());
            Ok(())
        })
        .await
    }

    // ------------------------------------------------------------------
    // Division changes
    // ------------------------------------------------------------------

    /// Move an agent between divisions: reset division stats, append the
    /// history record, all in one agent write.
    async fn change_division(
        &self,
        agent_id: AgentId,
        to: Division,
        kind: DivisionChangeKind,
        reason: String,
    ) -> ArenaResult<Agent> {
        let stored = self
            .update_agent(agent_id, move |a| {
                let from = a.division;
                a.division = to;
                a.division_stats = MatchStats::default();
                if from == Division::King || to == Division::King {
                    a.king_defense_losses = 0;
                    a.king_defense_streak = 0;
                }
                a.division_change_history.push(DivisionChange {
                    from,
                    to,
                    timestamp: chrono::Utc::now(),
                    reason: reason.clone(),
                    kind,
                });
                Ok(())
            })
            .await?;
        info!(agent_id = %agent_id, division = %to, ?kind, "Division change");
        Ok(stored)
    }

    async fn check_promotion(&self, agent: &Agent) -> ArenaResult<()> {
        let rules = &self.config.ranking;
        let stats = &agent.division_stats;
        let promote = match agent.division {
            Division::Novice => {
                stats.matches >= rules.novice_promotion_matches
                    && (stats.win_rate() >= rules.novice_promotion_win_rate
                        || stats.current_streak >= rules.novice_promotion_streak)
            }
            Division::Expert => {
                stats.matches >= rules.expert_promotion_matches
                    && stats.win_rate() >= rules.expert_promotion_win_rate
                    && agent.elo_rating >= rules.expert_promotion_elo
            }
            // Master -> King only via a won KingChallenge
            Division::Master | Division::King => false,
        };

        if promote {
            let to = agent
                .division
                .promoted()
                .expect("promotable divisions have a successor");
            let reason = format!(
                "{} matches at {:.0}% win rate, streak {}",
                stats.matches,
                stats.win_rate() * 100.0,
                stats.current_streak
            );
            self.change_division(agent.agent_id, to, DivisionChangeKind::Promotion, reason)
                .await?;
        }
        Ok(())
    }

    async fn check_demotion(&self, agent: &Agent) -> ArenaResult<()> {
        let rules = &self.config.ranking;
        let stats = &agent.division_stats;
        let demote = match agent.division {
            Division::Master => {
                stats.matches >= rules.master_demotion_matches
                    && stats.win_rate() < rules.master_demotion_win_rate
            }
            Division::Expert => {
                (stats.matches >= rules.expert_demotion_matches
                    && stats.win_rate() < rules.expert_demotion_win_rate)
                    || stats.current_streak <= rules.expert_demotion_streak
            }
            // The King is never demoted by a regular loss; Novice is the floor
            Division::Novice | Division::King => false,
        };

        if demote {
            let to = agent
                .division
                .demoted()
                .expect("demotable divisions have a predecessor");
            let reason = format!(
                "{} matches at {:.0}% win rate, streak {}",
                stats.matches,
                stats.win_rate() * 100.0,
                stats.current_streak
            );
            self.change_division(agent.agent_id, to, DivisionChangeKind::Demotion, reason)
                .await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // King succession
    // ------------------------------------------------------------------

    /// A KingChallenge has agent1 = reigning King, agent2 = challenger.
    async fn apply_succession(
        &self,
        king: &Agent,
        challenger: &Agent,
        result_for_king: MatchResult,
    ) -> ArenaResult<()> {
        match result_for_king {
            MatchResult::Loss => {
                // The challenger takes the throne
                self.change_division(
                    challenger.agent_id,
                    Division::King,
                    DivisionChangeKind::Promotion,
                    "crowning".to_string(),
                )
                .await?;
                self.change_division(
                    king.agent_id,
                    Division::Master,
                    DivisionChangeKind::Demotion,
                    "dethroned".to_string(),
                )
                .await?;
                return Ok(());
            }
            MatchResult::Win => {
                // Successful defense; the reign continues
                self.update_agent(king.agent_id, |a| {
                    a.king_defense_streak = 0;
                    Ok(())
                })
                .await?;
            }
            MatchResult::Draw => {
                // A held-to-a-draw defense counts against the King
                self.update_agent(king.agent_id, |a| {
                    a.king_defense_losses += 1;
                    a.king_defense_streak += 1;
                    Ok(())
                })
                .await?;
            }
        }

        // Automatic succession when the reign has decayed
        let king = self.require_agent(king.agent_id).await?;
        let rules = &self.config.ranking;
        if king.division == Division::King
            && (king.king_defense_losses >= rules.king_max_defense_losses
                || king.king_defense_streak >= rules.king_max_defense_streak)
        {
            let masters = self
                .repo
                .list_agents(&AgentFilter::active_in(Division::Master))
                .await?;
            let heir = masters.into_iter().max_by(|a, b| {
                a.elo_rating
                    .partial_cmp(&b.elo_rating)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            if let Some(heir) = heir {
                info!(king = %king.agent_id, heir = %heir.agent_id, "Automatic succession");
                self.change_division(
                    heir.agent_id,
                    Division::King,
                    DivisionChangeKind::Promotion,
                    "automatic succession".to_string(),
                )
                .await?;
                self.change_division(
                    king.agent_id,
                    Division::Master,
                    DivisionChangeKind::Demotion,
                    "automatic succession".to_string(),
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Count a streaming attempt against an agent's record. Failures here
    /// never fail the surrounding match handling.
    pub async fn record_streaming(&self, agent_id: AgentId, failed: bool) {
        let lock = self.lock_for(agent_id);
        let _guard = lock.lock().await;
        let result = self
            .update_agent(agent_id, move |a| {
                a.streaming_attempts += 1;
                if failed {
                    a.streaming_failures += 1;
                }
                Ok(())
            })
            .await;
        if let Err(error) = result {
            tracing::warn!(agent_id = %agent_id, %error, "Streaming stats not recorded");
        }
    }

    /// A Master may challenge the King when their division record is strong
    /// enough.
    pub fn is_eligible_challenger(&self, agent: &Agent) -> bool {
        let rules = &self.config.ranking;
        agent.division == Division::Master
            && agent.active
            && (agent.division_stats.win_rate() >= rules.challenger_win_rate
                || agent.division_stats.current_streak >= rules.challenger_streak)
    }

    // ------------------------------------------------------------------
    // Judges and challenge quality
    // ------------------------------------------------------------------

    async fn update_judges(&self, m: &Match) -> ArenaResult<()> {
        let panel_winner: Option<PanelWinner> = m.winner_id.and_then(|id| m.side_of(id));
        let alpha = self.config.judging.reliability_alpha;

        for evaluation in &m.evaluations {
            let aligned = evaluation.recommended_winner == panel_winner;
            let judge_id = evaluation.judge_id;
            let lock = self.lock_for(judge_id);
            let _guard = lock.lock().await;
            self.update_agent(judge_id, move |judge| {
                let stats = &mut judge.judge_stats;
                if aligned {
                    stats.reliability += (1.0 - stats.reliability) * alpha;
                    stats.ratings_aligned += 1;
                } else {
                    stats.reliability -= stats.reliability * alpha;
                }
                stats.ratings_given += 1;
                stats.accuracy = f64::from(stats.ratings_aligned) / f64::from(stats.ratings_given);
                Ok(())
            })
            .await?;
        }
        Ok(())
    }

    async fn update_challenge_quality(&self, m: &Match) -> ArenaResult<()> {
        let unanimous = !m.evaluations.is_empty()
            && m.evaluations.iter().all(|e| {
                e.recommended_winner.is_some()
                    && e.recommended_winner == m.evaluations[0].recommended_winner
            });
        let step = self.config.ranking.challenge_quality_step;
        let floor = self.config.pool.retirement_floor;

        self.update_challenge(m.challenge_id, move |challenge| {
            challenge.uses += 1;
            if unanimous {
                challenge.quality_score += (1.0 - challenge.quality_score) * step;
            } else {
                challenge.quality_score -= challenge.quality_score * step;
            }
            // First completed match clears community probation
            challenge.probation = false;
            if challenge.quality_score < floor {
                challenge.active = false;
            }
        })
        .await
    }
}

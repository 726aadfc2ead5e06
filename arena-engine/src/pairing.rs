//! Opponent pairing
//!
//! Picks two eligible agents within a division: nearest-ELO by default,
//! with epsilon-greedy exploration to break stagnation, a per-agent
//! cooldown, and a fairness rule bounding repeat pairings.

use arena_core::{Agent, AgentId, ArenaResult, Division, PairingConfig, PairingError};
use arena_storage::{AgentFilter, Repository};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// Caller-requested explicit pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingOverride {
    pub agent1_id: AgentId,
    pub agent2_id: AgentId,
}

/// Capability interface for opponent selection.
#[async_trait]
pub trait Pairing: Send + Sync {
    /// Pick two eligible agents in `division`, or honor an explicit
    /// override when both agents exist, are active, and are in `division`.
    async fn pick(
        &self,
        division: Division,
        requested: Option<PairingOverride>,
    ) -> ArenaResult<(Agent, Agent)>;
}

/// Repository-backed nearest-ELO pairing.
pub struct EloPairing {
    repo: Arc<dyn Repository>,
    config: PairingConfig,
}

impl EloPairing {
    pub fn new(repo: Arc<dyn Repository>, config: PairingConfig) -> Self {
        Self { repo, config }
    }

    fn off_cooldown(&self, agent: &Agent) -> bool {
        match agent.last_match_at {
            Some(last) => {
                let elapsed = chrono::Utc::now() - last;
                elapsed
                    >= chrono::Duration::from_std(self.config.cooldown)
                        .unwrap_or_else(|_| chrono::Duration::seconds(10))
            }
            None => true,
        }
    }

    /// Fairness: `a` may not face `b` more than the configured count within
    /// its recent-opponent window. Checked in both directions.
    fn repeat_allowed(&self, a: &Agent, b: &Agent) -> bool {
        let over = |agent: &Agent, opponent: AgentId| {
            let repeats = agent
                .recent_opponents
                .iter()
                .rev()
                .take(self.config.repeat_window)
                .filter(|id| **id == opponent)
                .count() as u32;
            repeats >= self.config.max_repeat_pairings
        };
        !over(a, b.agent_id) && !over(b, a.agent_id)
    }

    async fn pick_override(
        &self,
        division: Division,
        requested: PairingOverride,
    ) -> ArenaResult<(Agent, Agent)> {
        if requested.agent1_id == requested.agent2_id {
            return Err(PairingError::IneligibleAgent {
                agent_id: requested.agent1_id,
                reason: "an agent cannot face itself".to_string(),
            }
            .into());
        }
        let mut picked = Vec::with_capacity(2);
        for agent_id in [requested.agent1_id, requested.agent2_id] {
            let agent =
                self.repo
                    .get_agent(agent_id)
                    .await?
                    .ok_or(PairingError::IneligibleAgent {
                        agent_id,
                        reason: "agent does not exist".to_string(),
                    })?;
            if !agent.active {
                return Err(PairingError::IneligibleAgent {
                    agent_id,
                    reason: "agent is inactive".to_string(),
                }
                .into());
            }
            if agent.division != division {
                return Err(PairingError::IneligibleAgent {
                    agent_id,
                    reason: format!("agent is in {} division", agent.division),
                }
                .into());
            }
            picked.push(agent);
        }
        let b = picked.pop().expect("two agents pushed");
        let a = picked.pop().expect("two agents pushed");
        Ok((a, b))
    }
}

#[async_trait]
impl Pairing for EloPairing {
    async fn pick(
        &self,
        division: Division,
        requested: Option<PairingOverride>,
    ) -> ArenaResult<(Agent, Agent)> {
        if let Some(requested) = requested {
            return self.pick_override(division, requested).await;
        }

        let candidates: Vec<Agent> = self
            .repo
            .list_agents(&AgentFilter::active_in(division))
            .await?
            .into_iter()
            .filter(|a| self.off_cooldown(a))
            .collect();

        if candidates.len() < 2 {
            return Err(PairingError::NoOpponent {
                division,
                reason: format!(
                    "{} eligible agents after cooldown filter",
                    candidates.len()
                ),
            }
            .into());
        }

        // Enumerate fair pairs once; the division population is small
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for i in 0..candidates.len() {
            for j in (i + 1)..candidates.len() {
                if self.repeat_allowed(&candidates[i], &candidates[j]) {
                    pairs.push((i, j));
                }
            }
        }

        if pairs.is_empty() {
            return Err(PairingError::NoOpponent {
                division,
                reason: "all pairings exhausted by the repeat-fairness rule".to_string(),
            }
            .into());
        }

        let mut rng = rand::thread_rng();
        let (i, j) = if rng.gen::<f64>() < self.config.exploration_epsilon {
            *pairs.choose(&mut rng).expect("pairs is non-empty")
        } else {
            *pairs
                .iter()
                .min_by(|(a1, b1), (a2, b2)| {
                    let d1 = (candidates[*a1].elo_rating - candidates[*b1].elo_rating).abs();
                    let d2 = (candidates[*a2].elo_rating - candidates[*b2].elo_rating).abs();
                    d1.partial_cmp(&d2).unwrap_or(std::cmp::Ordering::Equal)
                })
                .expect("pairs is non-empty")
        };

        Ok((candidates[i].clone(), candidates[j].clone()))
    }
}

//! In-memory repository
//!
//! Backs tests and single-node deployments. Every map is guarded by its own
//! RwLock; versioned writes compare-and-bump under the write guard so
//! conflicting writers observe `Stale` rather than losing updates.

use crate::{AgentFilter, ChallengeFilter, MatchFilter, Repository};
use arena_core::{
    Agent, AgentId, ArenaResult, Challenge, ChallengeId, DivisionChange, JudgeEvaluation, Match,
    MatchId, StorageError,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory implementation of [`Repository`].
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    agents: RwLock<HashMap<AgentId, Agent>>,
    challenges: RwLock<HashMap<ChallengeId, Challenge>>,
    matches: RwLock<HashMap<MatchId, Match>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compare the stored version against the incoming one and return the
/// version the stored copy should carry after the write.
fn bump_version(
    entity: &'static str,
    id: String,
    stored: Option<u64>,
    incoming: u64,
) -> Result<u64, StorageError> {
    match stored {
        Some(found) if found != incoming => Err(StorageError::Stale {
            entity,
            id,
            expected: incoming,
            found,
        }),
        _ => Ok(incoming + 1),
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    async fn put_agent(&self, agent: &Agent) -> ArenaResult<Agent> {
        let mut agents = self.agents.write().await;
        let stored_version = agents.get(&agent.agent_id).map(|a| a.version);
        let version = bump_version(
            "agent",
            agent.agent_id.to_string(),
            stored_version,
            agent.version,
        )?;

        let mut stored = agent.clone();
        stored.version = version;
        agents.insert(stored.agent_id, stored.clone());
        Ok(stored)
    }

    async fn get_agent(&self, id: AgentId) -> ArenaResult<Option<Agent>> {
        Ok(self.agents.read().await.get(&id).cloned())
    }

    async fn list_agents(&self, filter: &AgentFilter) -> ArenaResult<Vec<Agent>> {
        let agents = self.agents.read().await;
        let mut result: Vec<Agent> = agents.values().filter(|a| filter.matches(a)).cloned().collect();
        result.sort_by_key(|a| a.agent_id);
        Ok(result)
    }

    async fn append_division_change(
        &self,
        agent_id: AgentId,
        change: DivisionChange,
    ) -> ArenaResult<()> {
        let mut agents = self.agents.write().await;
        let agent = agents.get_mut(&agent_id).ok_or(StorageError::NotFound {
            entity: "agent",
            id: agent_id.to_string(),
        })?;
        agent.division_change_history.push(change);
        agent.version += 1;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Challenges
    // ------------------------------------------------------------------

    async fn put_challenge(&self, challenge: &Challenge) -> ArenaResult<Challenge> {
        let mut challenges = self.challenges.write().await;
        let stored_version = challenges.get(&challenge.challenge_id).map(|c| c.version);
        let version = bump_version(
            "challenge",
            challenge.challenge_id.to_string(),
            stored_version,
            challenge.version,
        )?;

        let mut stored = challenge.clone();
        stored.version = version;
        challenges.insert(stored.challenge_id, stored.clone());
        Ok(stored)
    }

    async fn get_challenge(&self, id: ChallengeId) -> ArenaResult<Option<Challenge>> {
        Ok(self.challenges.read().await.get(&id).cloned())
    }

    async fn list_challenges(&self, filter: &ChallengeFilter) -> ArenaResult<Vec<Challenge>> {
        let challenges = self.challenges.read().await;
        let mut result: Vec<Challenge> = challenges
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        result.sort_by_key(|c| c.challenge_id);
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Matches
    // ------------------------------------------------------------------

    async fn put_match(&self, m: &Match) -> ArenaResult<Match> {
        let mut matches = self.matches.write().await;
        let stored_version = matches.get(&m.match_id).map(|m| m.version);
        let version = bump_version("match", m.match_id.to_string(), stored_version, m.version)?;

        let mut stored = m.clone();
        stored.version = version;
        matches.insert(stored.match_id, stored.clone());
        Ok(stored)
    }

    async fn get_match(&self, id: MatchId) -> ArenaResult<Option<Match>> {
        Ok(self.matches.read().await.get(&id).cloned())
    }

    async fn list_matches(&self, filter: &MatchFilter) -> ArenaResult<Vec<Match>> {
        let matches = self.matches.read().await;
        let mut result: Vec<Match> = matches.values().filter(|m| filter.matches(m)).cloned().collect();
        // Newest first; v7 match ids sort by creation time
        result.sort_by(|a, b| b.match_id.cmp(&a.match_id));
        if let Some(limit) = filter.limit {
            result.truncate(limit);
        }
        Ok(result)
    }

    async fn append_evaluation(
        &self,
        match_id: MatchId,
        evaluation: JudgeEvaluation,
    ) -> ArenaResult<()> {
        let mut matches = self.matches.write().await;
        let m = matches.get_mut(&match_id).ok_or(StorageError::NotFound {
            entity: "match",
            id: match_id.to_string(),
        })?;
        // Idempotent on evaluation id for at-least-once appends
        if !m
            .evaluations
            .iter()
            .any(|e| e.evaluation_id == evaluation.evaluation_id)
        {
            m.evaluations.push(evaluation);
            m.version += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::{
        ChallengeDifficulty, ChallengeType, Division, DivisionChangeKind, EntityIdType,
        EvaluationId, MatchStatus, MatchType, PanelWinner,
    };

    fn sample_evaluation(match_id: MatchId) -> JudgeEvaluation {
        JudgeEvaluation {
            evaluation_id: EvaluationId::now_v7(),
            match_id,
            judge_id: AgentId::now_v7(),
            agent1_scores: Vec::new(),
            agent2_scores: Vec::new(),
            agent1_total_score: 7.0,
            agent2_total_score: 5.0,
            recommended_winner: Some(PanelWinner::Agent1),
            overall_reasoning: "clearer".to_string(),
            comparative_analysis: None,
            key_differentiators: Vec::new(),
            evaluation_quality: 0.9,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let repo = InMemoryRepository::new();
        let agent = Agent::new("Hypatia", "openai/gpt-4o-mini");

        let stored = repo.put_agent(&agent).await.unwrap();
        assert_eq!(stored.version, 1);

        let fetched = repo.get_agent(agent.agent_id).await.unwrap().unwrap();
        assert_eq!(fetched.display_name, "Hypatia");
        assert_eq!(fetched.version, 1);
    }

    #[tokio::test]
    async fn test_stale_write_rejected() {
        let repo = InMemoryRepository::new();
        let agent = Agent::new("Kant", "openai/gpt-4o-mini");

        let stored = repo.put_agent(&agent).await.unwrap();

        // A write from the stale original version conflicts
        let result = repo.put_agent(&agent).await;
        assert!(matches!(
            result,
            Err(arena_core::ArenaError::Storage(StorageError::Stale { .. }))
        ));

        // A write from the fresh copy succeeds
        let mut fresh = stored;
        fresh.description = "categorical".to_string();
        let stored = repo.put_agent(&fresh).await.unwrap();
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_list_agents_filtered() {
        let repo = InMemoryRepository::new();
        let mut novice = Agent::new("n", "m");
        novice.division = Division::Novice;
        let mut master = Agent::new("m", "m");
        master.division = Division::Master;
        let mut inactive = Agent::new("i", "m");
        inactive.division = Division::Novice;
        inactive.active = false;

        for agent in [&novice, &master, &inactive] {
            repo.put_agent(agent).await.unwrap();
        }

        let novices = repo
            .list_agents(&AgentFilter::active_in(Division::Novice))
            .await
            .unwrap();
        assert_eq!(novices.len(), 1);
        assert_eq!(novices[0].agent_id, novice.agent_id);

        let all = repo.list_agents(&AgentFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_division_change_append() {
        let repo = InMemoryRepository::new();
        let agent = Agent::new("p", "m");
        repo.put_agent(&agent).await.unwrap();

        repo.append_division_change(
            agent.agent_id,
            DivisionChange {
                from: Division::Novice,
                to: Division::Expert,
                timestamp: chrono::Utc::now(),
                reason: "won five straight".to_string(),
                kind: DivisionChangeKind::Promotion,
            },
        )
        .await
        .unwrap();

        let fetched = repo.get_agent(agent.agent_id).await.unwrap().unwrap();
        assert_eq!(fetched.division_change_history.len(), 1);
        assert_eq!(fetched.division_change_history[0].to, Division::Expert);

        let missing = repo
            .append_division_change(
                AgentId::now_v7(),
                DivisionChange {
                    from: Division::Novice,
                    to: Division::Expert,
                    timestamp: chrono::Utc::now(),
                    reason: String::new(),
                    kind: DivisionChangeKind::Promotion,
                },
            )
            .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_match_listing_newest_first_with_limit() {
        let repo = InMemoryRepository::new();
        let challenge = Challenge::new(
            "t",
            "d",
            ChallengeType::LogicalReasoning,
            ChallengeDifficulty::Beginner,
        );
        let (a, b) = (AgentId::now_v7(), AgentId::now_v7());

        let mut ids = Vec::new();
        for _ in 0..3 {
            let m = Match::new(
                MatchType::RegularDuel,
                challenge.challenge_id,
                a,
                b,
                Division::Novice,
            );
            ids.push(m.match_id);
            repo.put_match(&m).await.unwrap();
        }

        let listed = repo
            .list_matches(&MatchFilter {
                limit: Some(2),
                ..MatchFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].match_id, ids[2]);
        assert_eq!(listed[1].match_id, ids[1]);
    }

    #[tokio::test]
    async fn test_evaluation_append_is_idempotent() {
        let repo = InMemoryRepository::new();
        let m = Match::new(
            MatchType::RegularDuel,
            ChallengeId::now_v7(),
            AgentId::now_v7(),
            AgentId::now_v7(),
            Division::Expert,
        );
        repo.put_match(&m).await.unwrap();

        let evaluation = sample_evaluation(m.match_id);
        repo.append_evaluation(m.match_id, evaluation.clone())
            .await
            .unwrap();
        // At-least-once delivery may append the same evaluation twice
        repo.append_evaluation(m.match_id, evaluation).await.unwrap();

        let stored = repo.get_match(m.match_id).await.unwrap().unwrap();
        assert_eq!(stored.evaluations.len(), 1);
    }

    #[tokio::test]
    async fn test_status_filter() {
        let repo = InMemoryRepository::new();
        let mut live = Match::new(
            MatchType::RegularDuel,
            ChallengeId::now_v7(),
            AgentId::now_v7(),
            AgentId::now_v7(),
            Division::Novice,
        );
        live.status = MatchStatus::InProgress;
        repo.put_match(&live).await.unwrap();

        let done = repo
            .list_matches(&MatchFilter::with_status(MatchStatus::Completed))
            .await
            .unwrap();
        assert!(done.is_empty());

        let in_progress = repo
            .list_matches(&MatchFilter::with_status(MatchStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(in_progress.len(), 1);
    }
}

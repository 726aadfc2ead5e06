//! Challenge selection and contribution
//!
//! Serves a challenge matching a division's difficulty band, rotating
//! through the pool with a quality-weighted draw, and accepts community
//! contributions after validation and dedup.

use arena_core::{
    normalized_title_hash, Agent, ArenaResult, Challenge, ChallengeDifficulty, ChallengeError,
    ChallengePoolConfig, ChallengeSource, ChallengeType, Division,
};
use arena_storage::{ChallengeFilter, Repository};
use async_trait::async_trait;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A community-submitted challenge before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChallengeDraft {
    pub title: String,
    pub description: String,
    pub challenge_type: ChallengeType,
    pub difficulty: ChallengeDifficulty,
    pub answer: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub evaluation_criteria: Vec<String>,
    #[serde(default)]
    pub expected_concepts: Vec<String>,
}

/// Capability interface for challenge selection.
#[async_trait]
pub trait ChallengePool: Send + Sync {
    /// Pick a challenge whose difficulty band matches `division` and, when
    /// given, whose type matches. Challenges either competitor saw recently
    /// are excluded.
    async fn pick(
        &self,
        division: Division,
        challenge_type: Option<ChallengeType>,
        competitors: (&Agent, &Agent),
    ) -> ArenaResult<Challenge>;

    /// Validate and store a contributed challenge. The stored challenge is
    /// on probation until its first completed match with a non-null result.
    async fn contribute(&self, draft: ChallengeDraft) -> ArenaResult<Challenge>;
}

/// Repository-backed pool with quality-weighted sampling.
pub struct WeightedChallengePool {
    repo: Arc<dyn Repository>,
    config: ChallengePoolConfig,
}

impl WeightedChallengePool {
    pub fn new(repo: Arc<dyn Repository>, config: ChallengePoolConfig) -> Self {
        Self { repo, config }
    }

    /// Selection weight: high-quality, under-used challenges dominate while
    /// rotation is preserved.
    fn weight(challenge: &Challenge) -> f64 {
        challenge.quality_score * (1.0 + 1.0 / (1.0 + f64::from(challenge.uses)))
    }
}

#[async_trait]
impl ChallengePool for WeightedChallengePool {
    async fn pick(
        &self,
        division: Division,
        challenge_type: Option<ChallengeType>,
        competitors: (&Agent, &Agent),
    ) -> ArenaResult<Challenge> {
        let all = self
            .repo
            .list_challenges(&ChallengeFilter {
                challenge_type,
                active_only: true,
            })
            .await?;

        let band = division.difficulty_band();
        let window = self.config.recent_window;
        let recently_seen = |challenge: &Challenge| {
            let (a, b) = competitors;
            let seen = |agent: &Agent| {
                agent
                    .recent_challenges
                    .iter()
                    .rev()
                    .take(window)
                    .any(|id| *id == challenge.challenge_id)
            };
            seen(a) || seen(b)
        };

        let candidates: Vec<Challenge> = all
            .into_iter()
            .filter(|c| band.contains(&c.difficulty))
            .filter(|c| c.quality_score >= self.config.retirement_floor)
            .filter(|c| !recently_seen(c))
            .collect();

        if candidates.is_empty() {
            return Err(ChallengeError::NoChallenge { division }.into());
        }

        let weights: Vec<f64> = candidates.iter().map(Self::weight).collect();
        let picked = match WeightedIndex::new(&weights) {
            Ok(index) => {
                let mut rng = rand::thread_rng();
                &candidates[index.sample(&mut rng)]
            }
            // All weights zero; fall back to the first candidate
            Err(_) => &candidates[0],
        };

        Ok(picked.clone())
    }

    async fn contribute(&self, draft: ChallengeDraft) -> ArenaResult<Challenge> {
        if draft.title.trim().is_empty() {
            return Err(ChallengeError::InvalidDraft {
                reason: "title must not be empty".to_string(),
            }
            .into());
        }
        if draft.description.trim().is_empty() {
            return Err(ChallengeError::InvalidDraft {
                reason: "description must not be empty".to_string(),
            }
            .into());
        }

        let hash = normalized_title_hash(&draft.title);
        let existing = self
            .repo
            .list_challenges(&ChallengeFilter::default())
            .await?;
        if existing
            .iter()
            .any(|c| normalized_title_hash(&c.title) == hash)
        {
            return Err(ChallengeError::Duplicate { title: draft.title }.into());
        }

        let mut challenge = Challenge::new(
            draft.title,
            draft.description,
            draft.challenge_type,
            draft.difficulty,
        );
        challenge.answer = draft.answer;
        challenge.tags = draft.tags;
        challenge.evaluation_criteria = draft.evaluation_criteria;
        challenge.expected_concepts = draft.expected_concepts;
        challenge.source = ChallengeSource::Community;
        challenge.probation = true;

        let stored = self.repo.put_challenge(&challenge).await?;
        tracing::info!(challenge_id = %stored.challenge_id, "Community challenge accepted");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::ArenaError;
    use arena_storage::InMemoryRepository;

    fn agent() -> Agent {
        Agent::new("tester", "openai/gpt-4o-mini")
    }

    async fn seeded_pool(difficulties: &[ChallengeDifficulty]) -> (WeightedChallengePool, Vec<Challenge>) {
        let repo = Arc::new(InMemoryRepository::new());
        let mut stored = Vec::new();
        for (i, d) in difficulties.iter().enumerate() {
            let challenge = Challenge::new(
                format!("challenge {}", i),
                "solve it",
                ChallengeType::LogicalReasoning,
                *d,
            );
            stored.push(repo.put_challenge(&challenge).await.unwrap());
        }
        (
            WeightedChallengePool::new(repo, ChallengePoolConfig::default()),
            stored,
        )
    }

    #[tokio::test]
    async fn test_pick_respects_difficulty_band() {
        let (pool, _) = seeded_pool(&[
            ChallengeDifficulty::Beginner,
            ChallengeDifficulty::Master,
        ])
        .await;
        let (a, b) = (agent(), agent());

        let novice_pick = pool.pick(Division::Novice, None, (&a, &b)).await.unwrap();
        assert_eq!(novice_pick.difficulty, ChallengeDifficulty::Beginner);

        let king_pick = pool.pick(Division::King, None, (&a, &b)).await.unwrap();
        assert_eq!(king_pick.difficulty, ChallengeDifficulty::Master);
    }

    #[tokio::test]
    async fn test_pick_fails_when_band_is_empty() {
        let (pool, _) = seeded_pool(&[ChallengeDifficulty::Master]).await;
        let (a, b) = (agent(), agent());
        let result = pool.pick(Division::Novice, None, (&a, &b)).await;
        assert!(matches!(
            result,
            Err(ArenaError::Challenge(ChallengeError::NoChallenge { .. }))
        ));
    }

    #[tokio::test]
    async fn test_pick_excludes_recently_seen() {
        let (pool, stored) = seeded_pool(&[
            ChallengeDifficulty::Beginner,
            ChallengeDifficulty::Beginner,
        ])
        .await;
        let mut a = agent();
        a.recent_challenges.push(stored[0].challenge_id);
        let b = agent();

        for _ in 0..10 {
            let picked = pool.pick(Division::Novice, None, (&a, &b)).await.unwrap();
            assert_eq!(picked.challenge_id, stored[1].challenge_id);
        }
    }

    #[tokio::test]
    async fn test_pick_excludes_retired_quality() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut low = Challenge::new(
            "worn out",
            "d",
            ChallengeType::Mathematical,
            ChallengeDifficulty::Beginner,
        );
        low.quality_score = 0.05;
        repo.put_challenge(&low).await.unwrap();

        let pool = WeightedChallengePool::new(repo, ChallengePoolConfig::default());
        let (a, b) = (agent(), agent());
        assert!(pool.pick(Division::Novice, None, (&a, &b)).await.is_err());
    }

    #[tokio::test]
    async fn test_pick_filters_type() {
        let repo = Arc::new(InMemoryRepository::new());
        for (title, t) in [
            ("logic", ChallengeType::LogicalReasoning),
            ("debate", ChallengeType::Debate),
        ] {
            repo.put_challenge(&Challenge::new(
                title,
                "d",
                t,
                ChallengeDifficulty::Beginner,
            ))
            .await
            .unwrap();
        }
        let pool = WeightedChallengePool::new(repo, ChallengePoolConfig::default());
        let (a, b) = (agent(), agent());

        let picked = pool
            .pick(Division::Novice, Some(ChallengeType::Debate), (&a, &b))
            .await
            .unwrap();
        assert_eq!(picked.challenge_type, ChallengeType::Debate);
    }

    #[tokio::test]
    async fn test_contribute_validates_and_dedups() {
        let repo = Arc::new(InMemoryRepository::new());
        let pool = WeightedChallengePool::new(repo, ChallengePoolConfig::default());

        let draft = ChallengeDraft {
            title: "The Ship of Theseus".to_string(),
            description: "If every part is replaced...".to_string(),
            challenge_type: ChallengeType::AbstractThinking,
            difficulty: ChallengeDifficulty::Intermediate,
            answer: None,
            tags: vec!["philosophy".to_string()],
            evaluation_criteria: Vec::new(),
            expected_concepts: Vec::new(),
        };

        let stored = pool.contribute(draft.clone()).await.unwrap();
        assert!(stored.probation);
        assert_eq!(stored.source, ChallengeSource::Community);

        // Same title with different casing and spacing is a duplicate
        let mut dup = draft.clone();
        dup.title = "the  ship of theseus".to_string();
        assert!(matches!(
            pool.contribute(dup).await,
            Err(ArenaError::Challenge(ChallengeError::Duplicate { .. }))
        ));

        let mut empty = draft;
        empty.title = "another title".to_string();
        empty.description = "   ".to_string();
        assert!(matches!(
            pool.contribute(empty).await,
            Err(ArenaError::Challenge(ChallengeError::InvalidDraft { .. }))
        ));
    }
}

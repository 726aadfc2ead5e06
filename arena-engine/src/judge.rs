//! Judge panel
//!
//! Selects 3-5 judge agents, invokes them in parallel through the gateway
//! with a structured-output schema, and aggregates their scores into a
//! verdict. Individual judge failures are tolerated up to just under half
//! the panel.

use arena_core::{
    Agent, AgentId, ArenaError, ArenaResult, Challenge, CriterionScore, EntityIdType,
    EvaluationCriterion, EvaluationId, JudgeError, JudgeEvaluation, JudgingConfig, Match,
    MatchType, PanelWinner,
};
use arena_llm::{CallOptions, CompletionRequest, ModelGateway};
use arena_storage::{AgentFilter, Repository};
use rand::distributions::{Distribution, WeightedIndex};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Aggregated verdict of a judge panel.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelOutcome {
    /// `None` means the panel declared a draw.
    pub winner: Option<PanelWinner>,
    /// Weighted 0-10 score per competitor.
    pub scores: HashMap<AgentId, f64>,
    pub evaluations: Vec<JudgeEvaluation>,
    /// Every surviving judge recommended the same non-null winner.
    pub unanimous: bool,
}

/// Panel of LLM judges for one match at a time.
pub struct JudgePanel {
    gateway: Arc<dyn ModelGateway>,
    repo: Arc<dyn Repository>,
    config: JudgingConfig,
}

// ============================================================================
// STRUCTURED VERDICT WIRE FORMAT
// ============================================================================

/// Per-criterion scores a judge returns for one agent, each 0-10.
#[derive(Debug, Clone, Deserialize)]
struct WireScores {
    correctness: f64,
    completeness: f64,
    logical_consistency: f64,
    clarity: f64,
    creativity: f64,
    depth: f64,
}

impl WireScores {
    fn clamped(&self) -> Vec<CriterionScore> {
        let pairs = [
            (EvaluationCriterion::Correctness, self.correctness),
            (EvaluationCriterion::Completeness, self.completeness),
            (EvaluationCriterion::LogicalConsistency, self.logical_consistency),
            (EvaluationCriterion::Clarity, self.clarity),
            (EvaluationCriterion::Creativity, self.creativity),
            (EvaluationCriterion::Depth, self.depth),
        ];
        pairs
            .into_iter()
            .map(|(criterion, score)| CriterionScore {
                criterion,
                score: score.clamp(0.0, 10.0),
            })
            .collect()
    }
}

/// Full structured verdict a judge must return.
#[derive(Debug, Clone, Deserialize)]
struct WireVerdict {
    agent1_scores: WireScores,
    agent2_scores: WireScores,
    /// "agent1", "agent2", or "draw".
    recommended_winner: String,
    overall_reasoning: String,
    #[serde(default)]
    comparative_analysis: Option<String>,
    #[serde(default)]
    key_differentiators: Vec<String>,
    /// Self-reported confidence, clamped to [0, 1].
    confidence: f64,
}

/// JSON schema handed to the gateway for structured judge output.
fn verdict_schema() -> serde_json::Value {
    let scores = serde_json::json!({
        "type": "object",
        "required": [
            "correctness", "completeness", "logical_consistency",
            "clarity", "creativity", "depth"
        ],
        "properties": {
            "correctness": { "type": "number" },
            "completeness": { "type": "number" },
            "logical_consistency": { "type": "number" },
            "clarity": { "type": "number" },
            "creativity": { "type": "number" },
            "depth": { "type": "number" }
        }
    });
    serde_json::json!({
        "type": "object",
        "required": [
            "agent1_scores", "agent2_scores", "recommended_winner",
            "overall_reasoning", "confidence"
        ],
        "properties": {
            "agent1_scores": scores.clone(),
            "agent2_scores": scores,
            "recommended_winner": { "type": "string" },
            "overall_reasoning": { "type": "string" },
            "comparative_analysis": { "type": "string" },
            "key_differentiators": { "type": "array", "items": { "type": "string" } },
            "confidence": { "type": "number" }
        }
    })
}

fn mean_score(scores: &[CriterionScore]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64
}

impl JudgePanel {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        repo: Arc<dyn Repository>,
        config: JudgingConfig,
    ) -> Self {
        Self {
            gateway,
            repo,
            config,
        }
    }

    /// Run the full panel: select, invoke in parallel, aggregate.
    pub async fn judge(&self, m: &Match, challenge: &Challenge) -> ArenaResult<PanelOutcome> {
        let judges = self.select_judges(m).await?;
        let selected = judges.len();
        let prompt = self.evaluation_prompt(m, challenge);

        let invocations = judges.iter().map(|judge| {
            let prompt = prompt.clone();
            async move {
                let result = tokio::time::timeout(
                    self.config.judge_timeout,
                    self.invoke_judge(judge, m, prompt),
                )
                .await;
                match result {
                    Ok(Ok(evaluation)) => Ok(evaluation),
                    Ok(Err(error)) => Err((judge.agent_id, error)),
                    Err(_) => Err((judge.agent_id, ArenaError::Gateway(
                        arena_core::GatewayError::Timeout,
                    ))),
                }
            }
        });

        let results = futures_util::future::join_all(invocations).await;

        let mut evaluations = Vec::new();
        let mut failures = 0usize;
        for result in results {
            match result {
                Ok(evaluation) => evaluations.push(evaluation),
                Err((judge_id, error)) => {
                    warn!(match_id = %m.match_id, judge_id = %judge_id, %error, "Judge failed");
                    failures += 1;
                }
            }
        }

        let allowed_failures = (selected - 1) / 2;
        if failures > allowed_failures {
            return Err(JudgeError::InsufficientJudges {
                selected,
                succeeded: evaluations.len(),
                needed: selected - allowed_failures,
            }
            .into());
        }

        let reliability: HashMap<AgentId, f64> = judges
            .iter()
            .map(|j| (j.agent_id, j.judge_stats.reliability))
            .collect();
        Ok(self.aggregate(m, evaluations, &reliability))
    }

    /// Pick `min_judges..=max_judges` agents weighted by
    /// `elo x judge_reliability`, sampled without replacement. Judges at or
    /// above the match's division are preferred; when there are not enough,
    /// the pool widens to every eligible agent.
    async fn select_judges(&self, m: &Match) -> ArenaResult<Vec<Agent>> {
        let eligible: Vec<Agent> = self
            .repo
            .list_agents(&AgentFilter {
                division: None,
                active_only: true,
            })
            .await?
            .into_iter()
            .filter(|a| a.agent_id != m.agent1_id && a.agent_id != m.agent2_id)
            .filter(|a| a.judge_stats.reliability >= self.config.reliability_floor)
            .filter(|a| a.supports_structured_output)
            .collect();

        let preferred: Vec<Agent> = eligible
            .iter()
            .filter(|a| a.division >= m.division)
            .cloned()
            .collect();

        let mut pool = if preferred.len() >= self.config.min_judges {
            preferred
        } else {
            eligible
        };

        if pool.len() < self.config.min_judges {
            return Err(JudgeError::NoEligibleJudges {
                match_id: m.match_id,
            }
            .into());
        }

        let k = pool.len().min(self.config.max_judges);
        let mut selected = Vec::with_capacity(k);
        let mut rng = rand::thread_rng();
        for _ in 0..k {
            let weights: Vec<f64> = pool
                .iter()
                .map(|a| (a.elo_rating * a.judge_stats.reliability).max(1e-6))
                .collect();
            let index = match WeightedIndex::new(&weights) {
                Ok(dist) => dist.sample(&mut rng),
                Err(_) => 0,
            };
            selected.push(pool.swap_remove(index));
        }

        debug!(match_id = %m.match_id, judges = selected.len(), "Panel selected");
        Ok(selected)
    }

    async fn invoke_judge(
        &self,
        judge: &Agent,
        m: &Match,
        prompt: String,
    ) -> ArenaResult<JudgeEvaluation> {
        let request = CompletionRequest::new(judge.model_id.clone(), prompt).with_options(
            CallOptions {
                temperature: judge.temperature,
                max_tokens: Some(2000),
                deadline: Some(self.config.judge_timeout),
                structured: Some(verdict_schema()),
            },
        );

        let completion = self.gateway.invoke(request).await?;
        let value = completion
            .structured_data
            .ok_or_else(|| arena_core::GatewayError::Invalid {
                reason: "judge returned no structured data".to_string(),
            })?;
        let wire: WireVerdict =
            serde_json::from_value(value).map_err(|e| arena_core::GatewayError::Invalid {
                reason: format!("judge verdict did not match schema: {}", e),
            })?;

        let recommended_winner = match wire.recommended_winner.as_str() {
            "agent1" => Some(PanelWinner::Agent1),
            "agent2" => Some(PanelWinner::Agent2),
            _ => None,
        };

        let agent1_scores = wire.agent1_scores.clamped();
        let agent2_scores = wire.agent2_scores.clamped();
        let agent1_total_score = mean_score(&agent1_scores);
        let agent2_total_score = mean_score(&agent2_scores);

        Ok(JudgeEvaluation {
            evaluation_id: EvaluationId::now_v7(),
            match_id: m.match_id,
            judge_id: judge.agent_id,
            agent1_scores,
            agent2_scores,
            agent1_total_score,
            agent2_total_score,
            recommended_winner,
            overall_reasoning: wire.overall_reasoning,
            comparative_analysis: wire.comparative_analysis,
            key_differentiators: wire.key_differentiators,
            evaluation_quality: wire.confidence.clamp(0.0, 1.0),
            created_at: chrono::Utc::now(),
        })
    }

    /// Weighted aggregation of surviving evaluations.
    fn aggregate(
        &self,
        m: &Match,
        evaluations: Vec<JudgeEvaluation>,
        reliability: &HashMap<AgentId, f64>,
    ) -> PanelOutcome {
        let mut weighted1 = 0.0;
        let mut weighted2 = 0.0;
        let mut weight_sum = 0.0;
        for evaluation in &evaluations {
            let judge_reliability = reliability
                .get(&evaluation.judge_id)
                .copied()
                .unwrap_or(0.5);
            let weight = (judge_reliability * evaluation.evaluation_quality).max(0.05);
            weighted1 += weight * evaluation.agent1_total_score;
            weighted2 += weight * evaluation.agent2_total_score;
            weight_sum += weight;
        }
        let score1 = if weight_sum > 0.0 { weighted1 / weight_sum } else { 0.0 };
        let score2 = if weight_sum > 0.0 { weighted2 / weight_sum } else { 0.0 };

        let majority = Self::majority(&evaluations);
        let diff = (score1 - score2).abs();

        let winner = if diff < self.config.draw_epsilon {
            // Close on points: the majority recommendation decides, a null
            // or tied majority is a draw
            majority
        } else if score1 > score2 {
            Some(PanelWinner::Agent1)
        } else {
            Some(PanelWinner::Agent2)
        };

        let unanimous = !evaluations.is_empty()
            && evaluations
                .iter()
                .all(|e| e.recommended_winner.is_some() && e.recommended_winner == evaluations[0].recommended_winner);

        let mut scores = HashMap::new();
        scores.insert(m.agent1_id, score1);
        scores.insert(m.agent2_id, score2);

        PanelOutcome {
            winner,
            scores,
            evaluations,
            unanimous,
        }
    }

    /// Plurality of judge recommendations; a tie between the two agents is
    /// treated as null.
    fn majority(evaluations: &[JudgeEvaluation]) -> Option<PanelWinner> {
        let mut agent1 = 0usize;
        let mut agent2 = 0usize;
        let mut draws = 0usize;
        for evaluation in evaluations {
            match evaluation.recommended_winner {
                Some(PanelWinner::Agent1) => agent1 += 1,
                Some(PanelWinner::Agent2) => agent2 += 1,
                None => draws += 1,
            }
        }
        if agent1 > agent2 && agent1 >= draws {
            Some(PanelWinner::Agent1)
        } else if agent2 > agent1 && agent2 >= draws {
            Some(PanelWinner::Agent2)
        } else {
            None
        }
    }

    // ------------------------------------------------------------------
    // Prompts
    // ------------------------------------------------------------------

    fn evaluation_prompt(&self, m: &Match, challenge: &Challenge) -> String {
        match m.match_type {
            MatchType::Debate => self.debate_prompt(m, challenge),
            _ => self.duel_prompt(m, challenge),
        }
    }

    fn prompt_header(&self, challenge: &Challenge) -> String {
        let mut prompt = format!(
            "You are an expert judge in an AI competition arena. Evaluate fairly and objectively.\n\n\
             **CHALLENGE:**\nTitle: {}\nType: {:?}\nDifficulty: {:?} (level {}/5)\n\nDescription:\n{}\n",
            challenge.title,
            challenge.challenge_type,
            challenge.difficulty,
            challenge.difficulty.level(),
            challenge.description,
        );
        if !challenge.evaluation_criteria.is_empty() {
            prompt.push_str("\n**EVALUATION CRITERIA:**\n");
            for criterion in &challenge.evaluation_criteria {
                prompt.push_str(&format!("- {}\n", criterion));
            }
        }
        if !challenge.expected_concepts.is_empty() {
            prompt.push_str("\n**EXPECTED CONCEPTS:**\n");
            for concept in &challenge.expected_concepts {
                prompt.push_str(&format!("- {}\n", concept));
            }
        }
        if let Some(answer) = &challenge.answer {
            prompt.push_str(&format!("\n**REFERENCE ANSWER:**\n{}\n", answer));
            prompt.push_str("Prioritize correctness against the reference answer.\n");
        }
        prompt
    }

    fn scoring_instructions(&self) -> &'static str {
        "\n**INSTRUCTIONS:**\n\
         Score each agent 0-10 on: correctness, completeness, logical_consistency, clarity, creativity, depth.\n\
         Recommend a winner: 'agent1', 'agent2', or 'draw' when very close.\n\
         Rate your confidence in this evaluation from 0.0 to 1.0.\n\
         Respond with a single JSON object containing agent1_scores, agent2_scores, \
         recommended_winner, overall_reasoning, comparative_analysis, key_differentiators, confidence.\n"
    }

    fn duel_prompt(&self, m: &Match, challenge: &Challenge) -> String {
        let empty = String::new();
        let response1 = m.agent1_response.as_ref().map(|r| &r.text).unwrap_or(&empty);
        let response2 = m.agent2_response.as_ref().map(|r| &r.text).unwrap_or(&empty);
        format!(
            "{}\n**AGENT 1 RESPONSE:**\n{}\n\n**AGENT 2 RESPONSE:**\n{}\n{}",
            self.prompt_header(challenge),
            response1,
            response2,
            self.scoring_instructions(),
        )
    }

    fn debate_prompt(&self, m: &Match, challenge: &Challenge) -> String {
        let mut transcript = String::new();
        for (i, turn) in m.transcript.iter().enumerate() {
            let side = if turn.agent_id == m.agent1_id { 1 } else { 2 };
            transcript.push_str(&format!("Agent {} (turn {}): {}\n", side, i + 1, turn.text));
        }
        format!(
            "{}\n**DEBATE TRANSCRIPT:**\n{}\n\
             Evaluate the entire debate on argument quality, rebuttals, and persuasiveness.\n{}",
            self.prompt_header(challenge),
            transcript,
            self.scoring_instructions(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::{ChallengeDifficulty, ChallengeType, Division, GatewayError};
    use arena_llm::{MockGateway, ScriptedCall};
    use arena_storage::InMemoryRepository;
    use serde_json::json;

    fn verdict_json(winner: &str, s1: f64, s2: f64, confidence: f64) -> serde_json::Value {
        let scores = |v: f64| {
            json!({
                "correctness": v, "completeness": v, "logical_consistency": v,
                "clarity": v, "creativity": v, "depth": v
            })
        };
        json!({
            "agent1_scores": scores(s1),
            "agent2_scores": scores(s2),
            "recommended_winner": winner,
            "overall_reasoning": "reasoned",
            "confidence": confidence
        })
    }

    async fn seed_judge(repo: &InMemoryRepository, name: &str, division: Division) -> Agent {
        let mut judge = Agent::new(name, format!("judge/{}", name));
        judge.division = division;
        judge.supports_structured_output = true;
        judge.judge_stats.reliability = 0.8;
        repo.put_agent(&judge).await.unwrap()
    }

    async fn arena_fixture() -> (Arc<InMemoryRepository>, Match, Challenge) {
        let repo = Arc::new(InMemoryRepository::new());
        let a = Agent::new("a", "model/a");
        let b = Agent::new("b", "model/b");
        repo.put_agent(&a).await.unwrap();
        repo.put_agent(&b).await.unwrap();

        let challenge = Challenge::new(
            "Bridge crossing",
            "Four people must cross at night...",
            ChallengeType::LogicalReasoning,
            ChallengeDifficulty::Beginner,
        );
        let mut m = Match::new(
            arena_core::MatchType::RegularDuel,
            challenge.challenge_id,
            a.agent_id,
            b.agent_id,
            Division::Novice,
        );
        m.agent1_response = Some(arena_core::AgentResponse {
            agent_id: a.agent_id,
            text: "17 minutes".to_string(),
            response_time: 1.0,
            timestamp: chrono::Utc::now(),
            score: None,
            is_streaming: false,
            structured_data: None,
        });
        m.agent2_response = Some(arena_core::AgentResponse {
            agent_id: b.agent_id,
            text: "19 minutes".to_string(),
            response_time: 1.2,
            timestamp: chrono::Utc::now(),
            score: None,
            is_streaming: false,
            structured_data: None,
        });
        (repo, m, challenge)
    }

    #[tokio::test]
    async fn test_panel_produces_winner() {
        let (repo, m, challenge) = arena_fixture().await;
        for name in ["j1", "j2", "j3"] {
            seed_judge(&repo, name, Division::Master).await;
        }
        let gateway = Arc::new(
            MockGateway::new().with_default_structured(verdict_json("agent1", 8.0, 5.0, 0.9)),
        );

        let panel = JudgePanel::new(gateway, repo, JudgingConfig::default());
        let outcome = panel.judge(&m, &challenge).await.unwrap();

        assert_eq!(outcome.winner, Some(PanelWinner::Agent1));
        assert!(outcome.unanimous);
        assert_eq!(outcome.evaluations.len(), 3);
        assert!(outcome.scores[&m.agent1_id] > outcome.scores[&m.agent2_id]);
    }

    #[tokio::test]
    async fn test_close_scores_with_draw_majority_is_draw() {
        let (repo, m, challenge) = arena_fixture().await;
        for name in ["j1", "j2", "j3"] {
            seed_judge(&repo, name, Division::Master).await;
        }
        let gateway = Arc::new(
            MockGateway::new().with_default_structured(verdict_json("draw", 7.0, 7.1, 0.9)),
        );

        let panel = JudgePanel::new(gateway, repo, JudgingConfig::default());
        let outcome = panel.judge(&m, &challenge).await.unwrap();
        assert_eq!(outcome.winner, None);
        assert!(!outcome.unanimous);
    }

    #[tokio::test]
    async fn test_failure_tolerance_boundary() {
        // 2 of 5 judges failing still completes; 3 of 5 fails the panel
        for failing in [2usize, 3usize] {
            let (repo, m, challenge) = arena_fixture().await;
            let mut judges = Vec::new();
            for i in 0..5 {
                judges.push(seed_judge(&repo, &format!("j{}", i), Division::Master).await);
            }
            let gateway = Arc::new(
                MockGateway::new()
                    .with_default_structured(verdict_json("agent2", 4.0, 8.0, 0.8)),
            );
            for judge in judges.iter().take(failing) {
                gateway.push(
                    judge.model_id.clone(),
                    ScriptedCall::Fail(GatewayError::Provider {
                        provider: "openrouter".into(),
                        status: 500,
                        message: "boom".into(),
                    }),
                );
            }

            let panel = JudgePanel::new(gateway, repo, JudgingConfig::default());
            let result = panel.judge(&m, &challenge).await;
            if failing == 2 {
                let outcome = result.unwrap();
                assert_eq!(outcome.winner, Some(PanelWinner::Agent2));
                assert_eq!(outcome.evaluations.len(), 3);
            } else {
                assert!(matches!(
                    result,
                    Err(ArenaError::Judge(JudgeError::InsufficientJudges { .. }))
                ));
            }
        }
    }

    #[tokio::test]
    async fn test_no_eligible_judges() {
        let (repo, m, challenge) = arena_fixture().await;
        // Only the two competitors exist
        let gateway = Arc::new(MockGateway::new());
        let panel = JudgePanel::new(gateway, repo, JudgingConfig::default());
        assert!(matches!(
            panel.judge(&m, &challenge).await,
            Err(ArenaError::Judge(JudgeError::NoEligibleJudges { .. }))
        ));
    }

    #[tokio::test]
    async fn test_low_reliability_judges_excluded() {
        let (repo, m, challenge) = arena_fixture().await;
        for name in ["j1", "j2"] {
            seed_judge(&repo, name, Division::Master).await;
        }
        let mut unreliable = Agent::new("flaky", "judge/flaky");
        unreliable.supports_structured_output = true;
        unreliable.judge_stats.reliability = 0.1;
        repo.put_agent(&unreliable).await.unwrap();

        let gateway = Arc::new(
            MockGateway::new().with_default_structured(verdict_json("agent1", 9.0, 3.0, 1.0)),
        );
        let panel = JudgePanel::new(gateway, repo, JudgingConfig::default());
        // Two reliable judges is below min_judges
        assert!(panel.judge(&m, &challenge).await.is_err());
    }

    #[tokio::test]
    async fn test_scores_clamped_to_range() {
        let (repo, m, challenge) = arena_fixture().await;
        for name in ["j1", "j2", "j3"] {
            seed_judge(&repo, name, Division::Master).await;
        }
        let gateway = Arc::new(
            MockGateway::new().with_default_structured(verdict_json("agent1", 14.0, -3.0, 2.5)),
        );
        let panel = JudgePanel::new(gateway, repo, JudgingConfig::default());
        let outcome = panel.judge(&m, &challenge).await.unwrap();

        for evaluation in &outcome.evaluations {
            assert!(evaluation.agent1_scores.iter().all(|s| s.score <= 10.0));
            assert!(evaluation.agent2_scores.iter().all(|s| s.score >= 0.0));
            assert!(evaluation.evaluation_quality <= 1.0);
        }
    }

    #[test]
    fn test_majority_plurality_rules() {
        let make = |winner: Option<PanelWinner>| JudgeEvaluation {
            evaluation_id: EvaluationId::now_v7(),
            match_id: arena_core::MatchId::now_v7(),
            judge_id: AgentId::now_v7(),
            agent1_scores: Vec::new(),
            agent2_scores: Vec::new(),
            agent1_total_score: 5.0,
            agent2_total_score: 5.0,
            recommended_winner: winner,
            overall_reasoning: String::new(),
            comparative_analysis: None,
            key_differentiators: Vec::new(),
            evaluation_quality: 0.8,
            created_at: chrono::Utc::now(),
        };

        let evals = vec![
            make(Some(PanelWinner::Agent1)),
            make(Some(PanelWinner::Agent1)),
            make(Some(PanelWinner::Agent2)),
        ];
        assert_eq!(JudgePanel::majority(&evals), Some(PanelWinner::Agent1));

        let tied = vec![
            make(Some(PanelWinner::Agent1)),
            make(Some(PanelWinner::Agent2)),
        ];
        assert_eq!(JudgePanel::majority(&tied), None);

        let draws = vec![make(None), make(None), make(Some(PanelWinner::Agent2))];
        assert_eq!(JudgePanel::majority(&draws), None);
    }

    #[test]
    fn test_verdict_schema_accepts_valid_payload() {
        let schema = verdict_schema();
        let payload = verdict_json("agent1", 7.0, 6.0, 0.9).to_string();
        assert!(arena_llm::validate_structured(&payload, &schema).is_ok());
    }

    #[tokio::test]
    async fn test_debate_prompt_contains_transcript() {
        let (repo, mut m, challenge) = arena_fixture().await;
        m.match_type = arena_core::MatchType::Debate;
        m.transcript = vec![arena_core::AgentResponse {
            agent_id: m.agent1_id,
            text: "Opening statement".to_string(),
            response_time: 1.0,
            timestamp: chrono::Utc::now(),
            score: None,
            is_streaming: false,
            structured_data: None,
        }];
        let panel = JudgePanel::new(
            Arc::new(MockGateway::new()),
            repo,
            JudgingConfig::default(),
        );
        let prompt = panel.evaluation_prompt(&m, &challenge);
        assert!(prompt.contains("DEBATE TRANSCRIPT"));
        assert!(prompt.contains("Opening statement"));
        assert!(prompt.contains("Agent 1 (turn 1)"));
    }
}

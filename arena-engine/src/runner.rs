//! Match runner
//!
//! Per-match state machine: opens token streams, drives turns for duels and
//! debates, invokes the judge panel, finalizes through the ranking engine,
//! and publishes every state mutation to the event bus. Consumers of the
//! per-match topic observe a linearizable sequence because every publish
//! goes through this runner.

use crate::judge::JudgePanel;
use crate::ranking::RankingEngine;
use arena_core::{
    Agent, AgentResponse, ArenaConfig, ArenaError, ArenaResult, Challenge, DebateStance,
    GatewayError, Match, MatchResult, MatchStatus, MatchType, PanelWinner, StorageError,
};
use arena_events::{
    ArenaEvent, DebateTurnPayload, EvaluationPayload, EventBus, FinalPayload, MatchSummary,
    ResponseCompletePayload, ResponseDeltaPayload, StatusPayload, Topic,
};
use arena_llm::{CallOptions, CompletionRequest, ModelGateway};
use arena_storage::Repository;
use futures_util::stream::{self, StreamExt};
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// Sentinel a debater may emit to concede the floor early.
const END_SENTINEL: &str = "<END>";

/// Drives one match from Pending to a terminal state.
#[derive(Clone)]
pub struct MatchRunner {
    repo: Arc<dyn Repository>,
    gateway: Arc<dyn ModelGateway>,
    panel: Arc<JudgePanel>,
    ranking: Arc<RankingEngine>,
    bus: EventBus,
    config: ArenaConfig,
}

/// One item of the merged duel stream: a delta, or a side finishing.
type DuelItem = (PanelWinner, Option<Result<arena_llm::StreamDelta, GatewayError>>);

impl MatchRunner {
    pub fn new(
        repo: Arc<dyn Repository>,
        gateway: Arc<dyn ModelGateway>,
        panel: Arc<JudgePanel>,
        ranking: Arc<RankingEngine>,
        bus: EventBus,
        config: ArenaConfig,
    ) -> Self {
        Self {
            repo,
            gateway,
            panel,
            ranking,
            bus,
            config,
        }
    }

    /// Run the match to a terminal state and return the final record.
    ///
    /// Cancellation via `cancel` aborts outstanding gateway calls,
    /// transitions to Cancelled, persists the partial transcript, and still
    /// emits a terminal `final` event.
    #[instrument(skip_all, fields(match_id = %m.match_id))]
    pub async fn run(&self, mut m: Match, mut cancel: watch::Receiver<bool>) -> Match {
        let outcome = tokio::select! {
            driven = tokio::time::timeout(self.config.scheduler.match_timeout, self.drive(&mut m)) => {
                match driven {
                    Ok(result) => result,
                    Err(_) => Err(GatewayError::Timeout.into()),
                }
            }
            _ = wait_cancelled(&mut cancel) => Err(ArenaError::Cancelled),
        };

        match outcome {
            Ok(()) => m,
            Err(error) => self.terminate(m, error).await,
        }
    }

    /// Happy path: InProgress -> responses -> judging -> finalizing ->
    /// Completed, with the terminal `final` event published at the end.
    async fn drive(&self, m: &mut Match) -> ArenaResult<()> {
        let challenge = self
            .repo
            .get_challenge(m.challenge_id)
            .await?
            .ok_or(StorageError::NotFound {
                entity: "challenge",
                id: m.challenge_id.to_string(),
            })?;
        let agent1 = self.require_agent(m, PanelWinner::Agent1).await?;
        let agent2 = self.require_agent(m, PanelWinner::Agent2).await?;

        m.status = MatchStatus::InProgress;
        m.started_at = Some(chrono::Utc::now());
        self.persist(m).await?;
        self.publish_status(m).await;

        match m.match_type {
            MatchType::RegularDuel | MatchType::KingChallenge => {
                self.run_duel(m, &challenge, &agent1, &agent2).await?;
            }
            MatchType::Debate => {
                self.run_debate(m, &challenge, &agent1, &agent2).await?;
            }
        }

        // Judging
        let verdict = self.panel.judge(m, &challenge).await?;
        for evaluation in &verdict.evaluations {
            self.repo
                .append_evaluation(m.match_id, evaluation.clone())
                .await?;
            self.bus
                .publish(
                    Topic::match_events(m.match_id),
                    ArenaEvent::Evaluation {
                        payload: EvaluationPayload {
                            evaluation: evaluation.clone(),
                        },
                    },
                )
                .await;
        }
        m.evaluations = verdict.evaluations.clone();
        self.refresh_version(m).await?;

        // Finalizing: stats are written before the record goes terminal
        m.winner_id = verdict.winner.map(|side| m.agent_on(side));
        m.final_scores = verdict.scores.clone();
        m.result = Some(match verdict.winner {
            None => MatchResult::Draw,
            Some(PanelWinner::Agent1) => MatchResult::Win,
            Some(PanelWinner::Agent2) => MatchResult::Loss,
        });
        m.status = MatchStatus::Completed;
        m.completed_at = Some(chrono::Utc::now());

        self.ranking.finalize(m).await?;
        self.persist(m).await?;

        info!(winner = ?m.winner_id, "Match completed");
        self.publish_final(m).await;
        Ok(())
    }

    /// Convert any failure into the right terminal state, persist partial
    /// state, and emit the terminal event. A match is never silently
    /// dropped.
    async fn terminate(&self, mut m: Match, error: ArenaError) -> Match {
        let (status, reason) = match &error {
            ArenaError::Cancelled => (MatchStatus::Cancelled, "cancelled".to_string()),
            other => (MatchStatus::Failed, other.to_string()),
        };
        warn!(%error, ?status, "Match terminated");

        m.status = status;
        m.failure_reason = Some(reason);
        m.completed_at = Some(chrono::Utc::now());
        m.winner_id = None;
        m.result = None;

        // Partial transcripts survive for post-mortem
        if let Err(persist_error) = self.persist(&mut m).await {
            warn!(%persist_error, "Failed to persist terminal match state");
        }
        self.publish_status(&m).await;
        self.publish_final(&m).await;
        m
    }

    // ------------------------------------------------------------------
    // Duels
    // ------------------------------------------------------------------

    /// Stream both competitors in parallel, publishing a delta event per
    /// token. If either stream fails unrecoverably the whole match fails.
    async fn run_duel(
        &self,
        m: &mut Match,
        challenge: &Challenge,
        agent1: &Agent,
        agent2: &Agent,
    ) -> ArenaResult<()> {
        let prompt = challenge.description.clone();
        let started = Instant::now();

        let stream1 = self.open_stream(agent1, &prompt).await;
        let stream2 = self.open_stream(agent2, &prompt).await;
        let (stream1, stream2) = match (stream1, stream2) {
            (Ok(s1), Ok(s2)) => (s1, s2),
            (Err(e), _) => {
                self.ranking.record_streaming(agent1.agent_id, true).await;
                return Err(e);
            }
            (_, Err(e)) => {
                self.ranking.record_streaming(agent2.agent_id, true).await;
                return Err(e);
            }
        };

        m.agent1_response = Some(AgentResponse::streaming(agent1.agent_id));
        m.agent2_response = Some(AgentResponse::streaming(agent2.agent_id));

        let tagged1 = stream1
            .map(|item| (PanelWinner::Agent1, Some(item)))
            .chain(stream::once(async { (PanelWinner::Agent1, None) }));
        let tagged2 = stream2
            .map(|item| (PanelWinner::Agent2, Some(item)))
            .chain(stream::once(async { (PanelWinner::Agent2, None) }));
        let merged = stream::select(tagged1, tagged2);
        tokio::pin!(merged);

        while let Some(item) = merged.next().await {
            let (side, item): DuelItem = item;
            let agent_id = m.agent_on(side);
            match item {
                Some(Ok(delta)) => {
                    let response = match side {
                        PanelWinner::Agent1 => m.agent1_response.as_mut(),
                        PanelWinner::Agent2 => m.agent2_response.as_mut(),
                    }
                    .expect("responses initialized before streaming");
                    response.text.push_str(&delta.text);
                    self.bus
                        .publish(
                            Topic::match_events(m.match_id),
                            ArenaEvent::ResponseDelta {
                                payload: ResponseDeltaPayload {
                                    agent_id,
                                    text_delta: delta.text,
                                    is_streaming: true,
                                },
                            },
                        )
                        .await;
                }
                Some(Err(error)) => {
                    self.ranking.record_streaming(agent_id, true).await;
                    return Err(error.into());
                }
                None => {
                    let response = match side {
                        PanelWinner::Agent1 => m.agent1_response.as_mut(),
                        PanelWinner::Agent2 => m.agent2_response.as_mut(),
                    }
                    .expect("responses initialized before streaming");
                    response.is_streaming = false;
                    response.response_time = started.elapsed().as_secs_f64();
                    let completed = response.clone();
                    self.ranking.record_streaming(agent_id, false).await;
                    self.persist(m).await?;
                    self.bus
                        .publish(
                            Topic::match_events(m.match_id),
                            ArenaEvent::ResponseComplete {
                                payload: ResponseCompletePayload {
                                    agent_id,
                                    response: completed,
                                },
                            },
                        )
                        .await;
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Debates
    // ------------------------------------------------------------------

    /// Alternating turns, each streamed. A model failing after the opening
    /// exchange truncates the debate and sends what exists to the judges; a
    /// failure before any completed turn fails the match.
    async fn run_debate(
        &self,
        m: &mut Match,
        challenge: &Challenge,
        agent1: &Agent,
        agent2: &Agent,
    ) -> ArenaResult<()> {
        let agent1_stance = if rand::thread_rng().gen::<bool>() {
            DebateStance::For
        } else {
            DebateStance::Against
        };
        m.agent1_stance = Some(agent1_stance);
        self.persist(m).await?;

        let total_turns = self.config.scheduler.debate_max_turns * 2;
        for turn_index in 0..total_turns {
            let side = if turn_index % 2 == 0 {
                PanelWinner::Agent1
            } else {
                PanelWinner::Agent2
            };
            let speaker = match side {
                PanelWinner::Agent1 => agent1,
                PanelWinner::Agent2 => agent2,
            };
            let stance = match side {
                PanelWinner::Agent1 => agent1_stance,
                PanelWinner::Agent2 => agent1_stance.opposite(),
            };

            let prompt = debate_prompt(challenge, stance, &m.transcript, m, agent1, agent2);
            match self.run_turn(m, speaker, &prompt, turn_index).await {
                Ok(ended) => {
                    if ended {
                        break;
                    }
                }
                Err(error) => {
                    if m.transcript.is_empty() {
                        return Err(error);
                    }
                    // Truncated debate: judge what was said
                    warn!(%error, turn_index, "Debate truncated by model failure");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Stream one debate turn. Returns true when the speaker emitted the
    /// end sentinel.
    async fn run_turn(
        &self,
        m: &mut Match,
        speaker: &Agent,
        prompt: &str,
        turn_index: usize,
    ) -> ArenaResult<bool> {
        // Timestamp is the instant the turn begins
        let mut response = AgentResponse::streaming(speaker.agent_id);
        let turn_started = Instant::now();

        let mut stream = match self.open_stream(speaker, prompt).await {
            Ok(stream) => stream,
            Err(error) => {
                self.ranking.record_streaming(speaker.agent_id, true).await;
                return Err(error);
            }
        };

        while let Some(item) = stream.next().await {
            match item {
                Ok(delta) => {
                    response.text.push_str(&delta.text);
                    self.bus
                        .publish(
                            Topic::match_events(m.match_id),
                            ArenaEvent::ResponseDelta {
                                payload: ResponseDeltaPayload {
                                    agent_id: speaker.agent_id,
                                    text_delta: delta.text,
                                    is_streaming: true,
                                },
                            },
                        )
                        .await;
                }
                Err(error) => {
                    self.ranking.record_streaming(speaker.agent_id, true).await;
                    return Err(error.into());
                }
            }
        }

        let ended = response.text.contains(END_SENTINEL);
        if ended {
            response.text = response.text.replace(END_SENTINEL, "").trim_end().to_string();
        }
        response.is_streaming = false;
        response.response_time = turn_started.elapsed().as_secs_f64();
        self.ranking
            .record_streaming(speaker.agent_id, false)
            .await;

        m.transcript.push(response.clone());
        self.persist(m).await?;
        self.bus
            .publish(
                Topic::match_events(m.match_id),
                ArenaEvent::DebateTurn {
                    payload: DebateTurnPayload {
                        turn_index,
                        response,
                    },
                },
            )
            .await;
        Ok(ended)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn open_stream(
        &self,
        agent: &Agent,
        prompt: &str,
    ) -> ArenaResult<arena_llm::TokenStream> {
        let request = CompletionRequest::new(agent.model_id.clone(), prompt).with_options(
            CallOptions {
                temperature: agent.temperature,
                max_tokens: Some(1500),
                deadline: Some(self.config.gateway.default_deadline),
                structured: None,
            },
        );
        self.gateway.stream(request).await
    }

    async fn require_agent(&self, m: &Match, side: PanelWinner) -> ArenaResult<Agent> {
        let agent_id = m.agent_on(side);
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

    async fn persist(&self, m: &mut Match) -> ArenaResult<()> {
        let stored = self.repo.put_match(m).await?;
        m.version = stored.version;
        Ok(())
    }

    /// Resync the local version counter after out-of-band appends.
    async fn refresh_version(&self, m: &mut Match) -> ArenaResult<()> {
        if let Some(stored) = self.repo.get_match(m.match_id).await? {
            m.version = stored.version;
        }
        Ok(())
    }

    async fn publish_status(&self, m: &Match) {
        self.bus
            .publish(
                Topic::match_events(m.match_id),
                ArenaEvent::Status {
                    payload: StatusPayload { status: m.status },
                },
            )
            .await;
        self.bus
            .publish(
                Topic::ArenaMatches,
                ArenaEvent::MatchUpdated {
                    summary: MatchSummary::from(m),
                },
            )
            .await;
    }

    /// Every terminal state emits a `final` event and a completion summary.
    async fn publish_final(&self, m: &Match) {
        self.bus
            .publish(
                Topic::match_events(m.match_id),
                ArenaEvent::Final {
                    payload: FinalPayload {
                        winner_id: m.winner_id,
                        final_scores: m.final_scores.clone(),
                        result: m.result,
                    },
                },
            )
            .await;
        self.bus
            .publish(
                Topic::ArenaMatches,
                ArenaEvent::MatchCompleted {
                    summary: MatchSummary::from(m),
                },
            )
            .await;
    }
}

async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender dropped without cancelling; wait forever
            std::future::pending::<()>().await;
        }
    }
}

/// Prompt for the next debate turn, fed the concatenated transcript.
fn debate_prompt(
    challenge: &Challenge,
    stance: DebateStance,
    transcript: &[AgentResponse],
    m: &Match,
    agent1: &Agent,
    agent2: &Agent,
) -> String {
    let mut prompt = format!(
        "Debate Topic: {}\n\nYou are arguing the '{}' position. Your opponent is arguing the '{}' position.\n",
        challenge.description,
        stance,
        stance.opposite(),
    );
    if transcript.is_empty() {
        prompt.push_str("Provide your opening statement.\n");
    } else {
        prompt.push_str("\n--- Debate History ---\n");
        for turn in transcript {
            let name = if turn.agent_id == m.agent1_id {
                &agent1.display_name
            } else {
                &agent2.display_name
            };
            prompt.push_str(&format!("{}: {}\n", name, turn.text));
        }
        prompt.push_str("\n--- Your Turn ---\nProvide your rebuttal or next argument.\n");
    }
    prompt.push_str(&format!(
        "End with {} if you have nothing further to add.\n",
        END_SENTINEL
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::{ChallengeDifficulty, ChallengeType, Division};
    use arena_llm::{MockGateway, ScriptedCall};
    use arena_storage::InMemoryRepository;
    use serde_json::json;

    struct Fixture {
        repo: Arc<InMemoryRepository>,
        bus: EventBus,
        runner: MatchRunner,
        agent1: Agent,
        agent2: Agent,
        challenge: Challenge,
    }

    fn verdict(winner: &str, s1: f64, s2: f64) -> serde_json::Value {
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
            "overall_reasoning": "because",
            "confidence": 0.9
        })
    }

    async fn fixture(gateway: MockGateway, challenge_type: ChallengeType) -> Fixture {
        let repo = Arc::new(InMemoryRepository::new());
        let gateway = Arc::new(gateway);
        let bus = EventBus::new();
        let config = ArenaConfig::default();

        let mut agent1 = Agent::new("first", "model/first");
        agent1.division = Division::Novice;
        let agent1 = repo.put_agent(&agent1).await.unwrap();
        let mut agent2 = Agent::new("second", "model/second");
        agent2.division = Division::Novice;
        let agent2 = repo.put_agent(&agent2).await.unwrap();

        for i in 0..3 {
            let mut judge = Agent::new(format!("judge{}", i), format!("judge/{}", i));
            judge.division = Division::Master;
            judge.supports_structured_output = true;
            judge.judge_stats.reliability = 0.8;
            repo.put_agent(&judge).await.unwrap();
        }

        let challenge = Challenge::new(
            "The tournament",
            "Who should win and why?",
            challenge_type,
            ChallengeDifficulty::Beginner,
        );
        let challenge = repo.put_challenge(&challenge).await.unwrap();

        let panel = Arc::new(JudgePanel::new(
            Arc::clone(&gateway) as Arc<dyn ModelGateway>,
            Arc::clone(&repo) as Arc<dyn Repository>,
            config.judging.clone(),
        ));
        let ranking = Arc::new(RankingEngine::new(
            Arc::clone(&repo) as Arc<dyn Repository>,
            config.clone(),
        ));
        let runner = MatchRunner::new(
            Arc::clone(&repo) as Arc<dyn Repository>,
            Arc::clone(&gateway) as Arc<dyn ModelGateway>,
            panel,
            ranking,
            bus.clone(),
            config,
        );

        Fixture {
            repo,
            bus,
            runner,
            agent1,
            agent2,
            challenge,
        }
    }

    fn pending_match(f: &Fixture, match_type: MatchType) -> Match {
        Match::new(
            match_type,
            f.challenge.challenge_id,
            f.agent1.agent_id,
            f.agent2.agent_id,
            Division::Novice,
        )
    }

    fn no_cancel() -> watch::Receiver<bool> {
        // Dropping the sender never signals cancellation
        watch::channel(false).1
    }

    async fn drain(mut sub: arena_events::Subscription) -> Vec<&'static str> {
        let mut names = Vec::new();
        while let Some(event) = sub.try_next() {
            names.push(event.event_type());
        }
        names
    }

    #[tokio::test]
    async fn test_duel_completes_with_winner() {
        let gateway = MockGateway::new().with_default_structured(verdict("agent1", 8.0, 5.0));
        gateway.push("model/first", ScriptedCall::Text("alpha wins because".into()));
        gateway.push("model/second", ScriptedCall::Text("beta loses since".into()));
        let f = fixture(gateway, ChallengeType::LogicalReasoning).await;

        let m = pending_match(&f, MatchType::RegularDuel);
        let sub = f.bus.subscribe(&Topic::match_events(m.match_id));

        let done = f.runner.run(m, no_cancel()).await;
        assert_eq!(done.status, MatchStatus::Completed);
        assert_eq!(done.winner_id, Some(f.agent1.agent_id));
        assert_eq!(done.result, Some(MatchResult::Win));
        assert_eq!(done.evaluations.len(), 3);
        assert!(done.completed_at.is_some());

        // Stats were applied
        let agent1 = f.repo.get_agent(f.agent1.agent_id).await.unwrap().unwrap();
        assert_eq!(agent1.global_stats.wins, 1);
        assert!(agent1.elo_rating > Agent::STARTING_ELO);

        // The stored record matches the returned one
        let stored = f.repo.get_match(done.match_id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Completed);
        assert_eq!(stored.evaluations.len(), 3);

        // Event sequence: status first, deltas, completions, evaluations, final
        while f.bus.staged_len() > 0 {
            tokio::task::yield_now().await;
        }
        let names = drain(sub).await;
        assert_eq!(names.first(), Some(&"status"));
        assert_eq!(names.last(), Some(&"final"));
        let delta_count = names.iter().filter(|n| **n == "responseDelta").count();
        assert!(delta_count >= 2);
        let eval_count = names.iter().filter(|n| **n == "evaluation").count();
        assert_eq!(eval_count, 3);
        let final_pos = names.iter().position(|n| *n == "final").unwrap();
        let eval_pos = names.iter().position(|n| *n == "evaluation").unwrap();
        let complete_pos = names.iter().position(|n| *n == "responseComplete").unwrap();
        assert!(complete_pos < eval_pos && eval_pos < final_pos);
    }

    #[tokio::test]
    async fn test_duel_stream_failure_fails_match() {
        let gateway = MockGateway::new().with_default_structured(verdict("agent1", 8.0, 5.0));
        gateway.push("model/first", ScriptedCall::Text("fine response".into()));
        gateway.push(
            "model/second",
            ScriptedCall::FailMidStream {
                prefix: "partial".into(),
                error: GatewayError::Provider {
                    provider: "openrouter".into(),
                    status: 500,
                    message: "upstream died".into(),
                },
            },
        );
        let f = fixture(gateway, ChallengeType::LogicalReasoning).await;

        let m = pending_match(&f, MatchType::RegularDuel);
        let done = f.runner.run(m, no_cancel()).await;

        assert_eq!(done.status, MatchStatus::Failed);
        assert!(done.winner_id.is_none());
        assert!(done.failure_reason.is_some());

        // Streaming failure was counted against the failing agent
        let agent2 = f.repo.get_agent(f.agent2.agent_id).await.unwrap().unwrap();
        assert_eq!(agent2.streaming_failures, 1);

        // No ratings were applied
        let agent1 = f.repo.get_agent(f.agent1.agent_id).await.unwrap().unwrap();
        assert_eq!(agent1.global_stats.matches, 0);
    }

    #[tokio::test]
    async fn test_debate_runs_turns_and_completes() {
        let gateway = MockGateway::new().with_default_structured(verdict("agent2", 5.0, 8.0));
        // Both close the debate quickly via the sentinel
        gateway.push("model/first", ScriptedCall::Text("opening statement".into()));
        gateway.push("model/second", ScriptedCall::Text("rebuttal <END>".into()));
        let f = fixture(gateway, ChallengeType::Debate).await;

        let m = pending_match(&f, MatchType::Debate);
        let done = f.runner.run(m, no_cancel()).await;

        assert_eq!(done.status, MatchStatus::Completed);
        assert_eq!(done.transcript.len(), 2);
        assert!(done.agent1_stance.is_some());
        // Sentinel stripped from the stored turn
        assert_eq!(done.transcript[1].text, "rebuttal");
        assert_eq!(done.winner_id, Some(f.agent2.agent_id));
        assert_eq!(done.result, Some(MatchResult::Loss));
    }

    #[tokio::test]
    async fn test_debate_truncated_after_failure_still_judged() {
        let gateway = MockGateway::new().with_default_structured(verdict("agent1", 8.0, 1.0));
        gateway.push("model/first", ScriptedCall::Text("only one speaks".into()));
        gateway.push("model/second", ScriptedCall::Fail(GatewayError::Timeout));
        let f = fixture(gateway, ChallengeType::Debate).await;

        let m = pending_match(&f, MatchType::Debate);
        let done = f.runner.run(m, no_cancel()).await;

        assert_eq!(done.status, MatchStatus::Completed);
        assert_eq!(done.transcript.len(), 1);
        assert_eq!(done.winner_id, Some(f.agent1.agent_id));
    }

    #[tokio::test]
    async fn test_debate_failure_before_any_turn_fails() {
        let gateway = MockGateway::new().with_default_structured(verdict("agent1", 8.0, 1.0));
        gateway.push("model/first", ScriptedCall::Fail(GatewayError::Timeout));
        let f = fixture(gateway, ChallengeType::Debate).await;

        let m = pending_match(&f, MatchType::Debate);
        let done = f.runner.run(m, no_cancel()).await;
        assert_eq!(done.status, MatchStatus::Failed);
    }

    #[tokio::test]
    async fn test_cancellation_persists_partial_state() {
        let gateway = MockGateway::new()
            .with_default_structured(verdict("agent1", 8.0, 5.0))
            .with_latency(std::time::Duration::from_secs(3600));
        let f = fixture(gateway, ChallengeType::LogicalReasoning).await;

        let m = pending_match(&f, MatchType::RegularDuel);
        let match_id = m.match_id;
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let runner = f.runner.clone();
        let handle = tokio::spawn(async move { runner.run(m, cancel_rx).await });

        // Let the runner get into the gateway call, then cancel
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel_tx.send(true).unwrap();
        let done = handle.await.unwrap();

        assert_eq!(done.status, MatchStatus::Cancelled);
        let stored = f.repo.get_match(match_id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Cancelled);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_insufficient_judges_fails_match() {
        let gateway = MockGateway::new();
        gateway.push("model/first", ScriptedCall::Text("a".into()));
        gateway.push("model/second", ScriptedCall::Text("b".into()));
        // All judge calls fail (no structured default configured)
        let f = fixture(gateway, ChallengeType::LogicalReasoning).await;

        let m = pending_match(&f, MatchType::RegularDuel);
        let done = f.runner.run(m, no_cancel()).await;
        assert_eq!(done.status, MatchStatus::Failed);
        assert!(done
            .failure_reason
            .as_deref()
            .unwrap()
            .to_lowercase()
            .contains("judge"));
    }
}

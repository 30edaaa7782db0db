/// Assessment engine and per-session run.
///
/// `AssessmentEngine` holds the shared services built from configuration.
/// `AssessmentRun` drives one session through its game: it produces prompts,
/// judges responses with documented fallbacks, runs reactive exchanges,
/// records turns through the session manager, and resolves the archetype.
/// A run is the only writer of its session.
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{AssessmentError, AssessmentResult, JudgmentError};
use crate::domain::models::{
    Archetype, BucketTable, Config, GameDefinition, GameKind, IntentLabel, JudgmentSource, Sender, Session,
    TraitName, TurnJudgment, TurnResponse, TurnSpec,
};
use crate::domain::ports::{
    AssessmentObserver, CompletionReport, GenerationContext, JudgmentCapability, ScenarioContext, SnapshotStore,
    TurnPrompt,
};
use crate::services::classification::{weight_sum, ClassificationAggregator};
use crate::services::exchange::{ExchangeHandle, ExchangeScope, ExchangeSettings, ExchangeState};
use crate::services::rubric_resolver::RubricResolver;
use crate::services::session_manager::SessionManager;
use crate::services::snapshot_service::SnapshotService;

/// Shared services for running assessments.
#[derive(Clone)]
pub struct AssessmentEngine {
    sessions: SessionManager,
    classifier: Arc<ClassificationAggregator>,
    rubric: Arc<RubricResolver>,
    judge: Arc<dyn JudgmentCapability>,
    exchange: ExchangeSettings,
    fallback_label: IntentLabel,
    path_length: usize,
}

impl AssessmentEngine {
    /// Builds the engine from configuration.
    ///
    /// # Errors
    /// Returns `Validation` if the bucket bounds, exchange settings or snapshot horizon are invalid.
    pub fn new(
        config: &Config,
        judge: Arc<dyn JudgmentCapability>,
        store: Arc<dyn SnapshotStore>,
    ) -> AssessmentResult<Self> {
        let timeout = config.judge.timeout();
        let table = BucketTable::from_upper_bounds(config.scoring.path_length, &config.scoring.bucket_upper_bounds)
            .map_err(|e| AssessmentError::Validation(e.to_string()))?;
        let exchange = ExchangeSettings::from_config(&config.exchange, timeout)?;
        let snapshots = SnapshotService::new(store, config.snapshot.horizon_hours)?;

        Ok(Self {
            sessions: SessionManager::new(snapshots),
            classifier: Arc::new(ClassificationAggregator::new(Arc::clone(&judge), table, timeout)),
            rubric: Arc::new(RubricResolver::new(Arc::clone(&judge), timeout)),
            judge,
            exchange,
            fallback_label: config.scoring.fallback_label,
            path_length: config.scoring.path_length,
        })
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    fn judge_timeout(&self) -> Duration {
        self.exchange.judge_timeout
    }

    /// Starts a new session for `game` and announces its first turn.
    ///
    /// # Errors
    /// Returns error if the game is invalid or the session cannot be persisted.
    #[instrument(skip(self, game, observer), fields(game_id = %game.id), err)]
    pub async fn start(
        &self,
        game: GameDefinition,
        participant_id: Option<String>,
        observer: Arc<dyn AssessmentObserver>,
    ) -> AssessmentResult<AssessmentRun> {
        game.validate(self.path_length)?;
        let session = self
            .sessions
            .start_session(&game.id, game.total_turns(), participant_id)
            .await?;

        let mut run = AssessmentRun::new(self.clone(), game, session, observer);
        run.announce_next().await;
        Ok(run)
    }

    /// Resumes a session from its snapshot.
    ///
    /// Returns `None` when there is no usable snapshot. A session that had
    /// recorded every turn but never completed is finalized on the spot.
    ///
    /// # Errors
    /// Returns error if the snapshot belongs to another game or the store fails.
    #[instrument(skip(self, game, observer), fields(game_id = %game.id), err)]
    pub async fn resume(
        &self,
        session_id: Uuid,
        game: GameDefinition,
        observer: Arc<dyn AssessmentObserver>,
    ) -> AssessmentResult<Option<AssessmentRun>> {
        let Some(session) = self.sessions.resume(session_id).await? else {
            return Ok(None);
        };
        if session.game_id != game.id || session.total_turns != game.total_turns() {
            return Err(AssessmentError::Validation(format!(
                "session {session_id} was recorded for game '{}'",
                session.game_id
            )));
        }

        let mut run = AssessmentRun::new(self.clone(), game, session, observer);
        if run.session.completed {
            return Ok(Some(run));
        }
        if run.session.all_turns_recorded() {
            if let Err(err) = run.finalize().await {
                warn!(error = %err, "finalize on resume failed; retry or continue offline");
            }
        } else {
            run.announce_next().await;
        }
        Ok(Some(run))
    }
}

/// One participant's pass through a game.
pub struct AssessmentRun {
    engine: AssessmentEngine,
    game: GameDefinition,
    session: Session,
    observer: Arc<dyn AssessmentObserver>,
    prompt: Option<TurnPrompt>,
    pending_turn: Option<TurnResponse>,
    pending_completion: Option<(Archetype, String)>,
    offline: bool,
    exchange: Option<ExchangeHandle>,
}

impl AssessmentRun {
    fn new(
        engine: AssessmentEngine,
        game: GameDefinition,
        session: Session,
        observer: Arc<dyn AssessmentObserver>,
    ) -> Self {
        Self {
            engine,
            game,
            session,
            observer,
            prompt: None,
            pending_turn: None,
            pending_completion: None,
            offline: false,
            exchange: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_id(&self) -> Uuid {
        self.session.id
    }

    pub fn game(&self) -> &GameDefinition {
        &self.game
    }

    pub fn is_finished(&self) -> bool {
        self.session.completed
    }

    /// True while a failed write is waiting for [`AssessmentRun::retry`].
    pub fn has_pending_write(&self) -> bool {
        self.pending_turn.is_some() || self.pending_completion.is_some()
    }

    /// True once the run has stopped persisting its session.
    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Prompt for the next step, generating it on first request.
    pub async fn current_turn(&mut self) -> Option<TurnPrompt> {
        if self.session.completed || self.session.all_turns_recorded() {
            return None;
        }
        if self.prompt.is_none() {
            self.prompt = self.build_prompt().await;
        }
        self.prompt.clone()
    }

    /// Result of a completed session, recomputed from committed turns.
    pub fn report(&self) -> Option<CompletionReport> {
        let archetype = self.session.result.clone()?;
        Some(CompletionReport {
            session_id: self.session.id,
            archetype,
            rationale: self.rationale(),
            history: self.session.steps.clone(),
        })
    }

    /// Answers the current fixed-choice or free-text turn.
    ///
    /// Returns the completion report when this was the last turn.
    ///
    /// # Errors
    /// Returns error if:
    /// - The session is complete, or a failed write awaits retry
    /// - The turn is reactive, or the answer is not one of the offered choices (`Validation`)
    /// - The store did not confirm the write (`Recoverable`, retry with [`AssessmentRun::retry`]
    ///   or carry on with [`AssessmentRun::continue_offline`])
    #[instrument(skip(self, answer), fields(session_id = %self.session.id), err)]
    pub async fn submit(&mut self, answer: &str, response_time_ms: u64) -> AssessmentResult<Option<CompletionReport>> {
        self.ensure_accepting()?;
        let Some(prompt) = self.current_turn().await else {
            return Err(self.notify(AssessmentError::SessionComplete(self.session.id)));
        };
        if prompt.reactive {
            return Err(self.notify(AssessmentError::Validation(format!(
                "turn {} is reactive; use begin_exchange",
                prompt.step_number
            ))));
        }
        if let Some(choices) = &prompt.choices {
            if !choices.iter().any(|c| c == answer) {
                return Err(self.notify(AssessmentError::Validation(format!(
                    "'{answer}' is not one of the offered choices"
                ))));
            }
        }

        let spec = self.spec(prompt.step_number)?;
        let context = self.scenario_context(&prompt, &spec);
        let judgment = self.judge_response(&spec, answer, &context).await?;

        let mut response = TurnResponse::new(prompt.step_number, prompt.question.clone(), answer)
            .with_response_time(response_time_ms)
            .with_judgment(judgment);
        if let Some(choices) = prompt.choices {
            response = response.with_choices(choices);
        }
        self.commit(response).await
    }

    /// Starts the reactive exchange for the current turn.
    ///
    /// # Errors
    /// Returns `Validation` if the current turn is not reactive or an exchange is already running.
    #[instrument(skip(self), fields(session_id = %self.session.id), err)]
    pub async fn begin_exchange(&mut self) -> AssessmentResult<&ExchangeHandle> {
        self.ensure_accepting()?;
        if self.exchange.is_some() {
            return Err(self.notify(AssessmentError::Validation(
                "an exchange is already running".to_string(),
            )));
        }
        let Some(prompt) = self.current_turn().await else {
            return Err(self.notify(AssessmentError::SessionComplete(self.session.id)));
        };
        if !prompt.reactive {
            return Err(self.notify(AssessmentError::Validation(format!(
                "turn {} is not reactive",
                prompt.step_number
            ))));
        }
        let spec = self.spec(prompt.step_number)?;

        let scope = ExchangeScope {
            game_id: self.game.id.clone(),
            step_number: prompt.step_number,
            question: prompt.question.clone(),
            scenario: spec.scenario.clone(),
            opening: prompt.opening.clone(),
        };
        let state = ExchangeState::new(self.engine.exchange.clone(), scope);
        let handle = ExchangeHandle::spawn(state, Arc::clone(&self.engine.judge), self.engine.judge_timeout());
        info!(step = prompt.step_number, "exchange started");
        Ok(self.exchange.insert(handle))
    }

    /// The running exchange, if any.
    pub fn exchange(&self) -> Option<&ExchangeHandle> {
        self.exchange.as_ref()
    }

    /// Waits for the running exchange to complete and commits its outcome.
    ///
    /// # Errors
    /// Returns error if no exchange is running, it was disposed, or the write fails.
    #[instrument(skip(self), fields(session_id = %self.session.id), err)]
    pub async fn finish_exchange(&mut self) -> AssessmentResult<Option<CompletionReport>> {
        let Some(mut handle) = self.exchange.take() else {
            return Err(self.notify(AssessmentError::Validation("no exchange is running".to_string())));
        };
        let Some(outcome) = handle.outcome().await else {
            return Err(self.notify(AssessmentError::Validation(
                "exchange ended without an outcome".to_string(),
            )));
        };
        drop(handle);

        let Some(prompt) = self.current_turn().await else {
            return Err(self.notify(AssessmentError::SessionComplete(self.session.id)));
        };
        let spec = self.spec(prompt.step_number)?;
        let transcript: String = outcome
            .messages
            .iter()
            .filter(|m| m.sender == Sender::Participant)
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let judgment = match self.game.kind {
            GameKind::TraitRubric => {
                let name = Self::trait_of(&spec)?;
                TurnJudgment::Trait {
                    name,
                    score: outcome.score,
                    source: outcome.source,
                    rationale: outcome.rationale.clone(),
                }
            }
            GameKind::PathClassification => {
                let context = self.scenario_context(&prompt, &spec);
                self.judge_response(&spec, &transcript, &context).await?
            }
        };

        let response = TurnResponse::new(prompt.step_number, prompt.question, transcript)
            .with_judgment(judgment)
            .with_messages(outcome.messages);
        self.commit(response).await
    }

    /// Retries the write that last failed with `Recoverable`.
    ///
    /// # Errors
    /// Returns `Validation` if nothing is pending, or the write error if it fails again.
    #[instrument(skip(self), fields(session_id = %self.session.id), err)]
    pub async fn retry(&mut self) -> AssessmentResult<Option<CompletionReport>> {
        if let Some(response) = self.pending_turn.take() {
            return self.commit(response).await;
        }
        if let Some((archetype, rationale)) = self.pending_completion.take() {
            return self.complete(archetype, rationale).await.map(Some);
        }
        Err(AssessmentError::Validation("no write is pending".to_string()))
    }

    /// Gives up on the store and applies the pending write in memory.
    ///
    /// Every later turn and the completion stay in memory as well, so the
    /// session can only be resumed up to its last persisted step.
    ///
    /// # Errors
    /// Returns `Validation` if nothing is pending.
    #[instrument(skip(self), fields(session_id = %self.session.id), err)]
    pub async fn continue_offline(&mut self) -> AssessmentResult<Option<CompletionReport>> {
        if let Some(response) = self.pending_turn.take() {
            self.go_offline();
            return self.commit(response).await;
        }
        if self.pending_completion.is_some() {
            return self.complete_offline().map(Some);
        }
        Err(AssessmentError::Validation("no write is pending".to_string()))
    }

    /// Completes the session in memory when the store keeps refusing the
    /// completion write.
    ///
    /// # Errors
    /// Returns `Validation` if no completion is pending.
    pub fn complete_offline(&mut self) -> AssessmentResult<CompletionReport> {
        let Some((archetype, rationale)) = self.pending_completion.take() else {
            return Err(AssessmentError::Validation("no completion is pending".to_string()));
        };
        self.go_offline();
        self.session = SessionManager::complete_unpersisted(&self.session, archetype.clone())?;
        Ok(self.deliver(archetype, rationale))
    }

    /// Resolves and records the archetype once every turn is recorded.
    ///
    /// # Errors
    /// Returns error if turns are outstanding, judgments are missing, or the write fails.
    pub async fn finalize(&mut self) -> AssessmentResult<CompletionReport> {
        let archetype = self.resolve().map_err(|e| self.notify(e))?;
        let rationale = self.rationale();
        self.complete(archetype, rationale).await
    }

    /// Tears down the running exchange without committing it.
    pub async fn dispose(&mut self) {
        if let Some(handle) = self.exchange.take() {
            handle.dispose().await;
        }
        self.prompt = None;
    }

    fn go_offline(&mut self) {
        if !self.offline {
            warn!(
                session_id = %self.session.id,
                persisted_steps = self.session.steps.len(),
                "continuing in memory; resume is limited to persisted steps"
            );
            self.offline = true;
        }
    }

    async fn commit(&mut self, response: TurnResponse) -> AssessmentResult<Option<CompletionReport>> {
        let recorded = if self.offline {
            SessionManager::record_turn_unpersisted(&self.session, response.clone())
        } else {
            self.engine.sessions.record_turn(&self.session, response.clone()).await
        };
        match recorded {
            Ok(next) => {
                self.session = next;
                self.prompt = None;
            }
            Err(err) => {
                if err.is_recoverable() {
                    self.pending_turn = Some(response);
                }
                return Err(self.notify(err));
            }
        }

        if self.session.all_turns_recorded() {
            return self.finalize().await.map(Some);
        }
        self.announce_next().await;
        Ok(None)
    }

    async fn complete(&mut self, archetype: Archetype, rationale: String) -> AssessmentResult<CompletionReport> {
        let completed = if self.offline {
            SessionManager::complete_unpersisted(&self.session, archetype.clone())
        } else {
            self.engine.sessions.complete(&self.session, archetype.clone()).await
        };
        match completed {
            Ok(next) => {
                self.session = next;
                Ok(self.deliver(archetype, rationale))
            }
            Err(err) => {
                if err.is_recoverable() {
                    self.pending_completion = Some((archetype, rationale));
                }
                Err(self.notify(err))
            }
        }
    }

    fn deliver(&self, archetype: Archetype, rationale: String) -> CompletionReport {
        let report = CompletionReport {
            session_id: self.session.id,
            archetype,
            rationale,
            history: self.session.steps.clone(),
        };
        info!(archetype = %report.archetype, "assessment complete");
        self.observer.on_complete(&report);
        report
    }

    fn resolve(&self) -> AssessmentResult<Archetype> {
        if !self.session.all_turns_recorded() {
            return Err(AssessmentError::SessionIncomplete(self.session.id));
        }
        match self.game.kind {
            GameKind::PathClassification => self.engine.classifier.resolve_archetype(&self.session.intent_path()),
            GameKind::TraitRubric => {
                RubricResolver::resolve_with_fallback(self.session.result.as_ref(), &self.session.trait_scores())
                    .ok_or_else(|| AssessmentError::Validation("trait scores are incomplete".to_string()))
            }
        }
    }

    fn rationale(&self) -> String {
        match self.game.kind {
            GameKind::PathClassification => {
                let path = self.session.intent_path();
                let weights: Vec<u32> = path.iter().map(|l| l.weight()).collect();
                format!("path weights {weights:?} sum to {}", weight_sum(&path))
            }
            GameKind::TraitRubric => {
                let scores = self.session.trait_scores();
                let Some(complete) = scores.complete() else {
                    return format!("{} of {} traits scored", scores.len(), TraitName::ALL.len());
                };
                let mut text = String::from("trait scores");
                for name in TraitName::ALL {
                    let _ = write!(text, " {name}={}", complete.get(name));
                }
                let _ = write!(text, " round to {}", RubricResolver::aggregate(&complete));
                text
            }
        }
    }

    async fn judge_response(
        &self,
        spec: &TurnSpec,
        text: &str,
        context: &ScenarioContext,
    ) -> AssessmentResult<TurnJudgment> {
        match self.game.kind {
            GameKind::PathClassification => match self.engine.classifier.classify_turn(text, context).await {
                Ok(label) => Ok(TurnJudgment::Intent {
                    label,
                    source: JudgmentSource::Capability,
                    rationale: None,
                }),
                Err(err) => {
                    warn!(error = %err, fallback = %self.engine.fallback_label, "using fallback label");
                    self.observer.on_error(err.kind());
                    Ok(TurnJudgment::Intent {
                        label: self.engine.fallback_label,
                        source: JudgmentSource::Fallback,
                        rationale: Some(err.to_string()),
                    })
                }
            },
            GameKind::TraitRubric => {
                let name = Self::trait_of(spec)?;
                match self.engine.rubric.score_trait(name, text, context).await {
                    Ok(score) => Ok(TurnJudgment::Trait {
                        name,
                        score,
                        source: JudgmentSource::Capability,
                        rationale: None,
                    }),
                    Err(err) => {
                        let score = self.engine.exchange.fallback_score;
                        warn!(error = %err, fallback = %score, "using fallback score");
                        self.observer.on_error(err.kind());
                        Ok(TurnJudgment::Trait {
                            name,
                            score,
                            source: JudgmentSource::Fallback,
                            rationale: Some(err.to_string()),
                        })
                    }
                }
            }
        }
    }

    async fn build_prompt(&self) -> Option<TurnPrompt> {
        let step_number = self.session.next_step();
        let spec = self.game.turn(step_number)?;

        let mut prompt = TurnPrompt {
            step_number,
            total_turns: self.session.total_turns,
            question: spec.question.clone(),
            choices: spec.choices.clone(),
            narrative: None,
            opening: spec.opening().to_vec(),
            reactive: spec.is_reactive(),
            generated: false,
        };
        if !spec.generated {
            return Some(prompt);
        }

        let context = GenerationContext {
            game_id: self.game.id.clone(),
            step_number,
            total_turns: self.session.total_turns,
            scenario: spec.scenario.clone(),
            seed_question: spec.question.clone(),
            previous: self
                .session
                .steps
                .iter()
                .map(|s| (s.question.clone(), s.user_response.clone()))
                .collect(),
        };
        let timeout = self.engine.judge_timeout();
        let generated = match tokio::time::timeout(timeout, self.engine.judge.generate_turn(&context)).await {
            Ok(Ok(turn)) => turn.validate().map(|()| turn),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(JudgmentError::Timeout(
                u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        };

        match generated {
            Ok(turn) => {
                prompt.question = turn.question;
                // reactive turns take no choices
                if !prompt.reactive {
                    prompt.choices = turn.choices;
                }
                prompt.narrative = Some(turn.text).filter(|t| !t.trim().is_empty());
                prompt.generated = true;
            }
            Err(err) => warn!(step = step_number, error = %err, "turn generation failed; using static prompt"),
        }
        Some(prompt)
    }

    async fn announce_next(&mut self) {
        if let Some(prompt) = self.current_turn().await {
            self.observer.on_turn_advance(&prompt);
        }
    }

    fn ensure_accepting(&self) -> AssessmentResult<()> {
        if self.session.completed {
            return Err(self.notify(AssessmentError::SessionComplete(self.session.id)));
        }
        if self.has_pending_write() {
            return Err(self.notify(AssessmentError::Validation(
                "a failed write is awaiting retry".to_string(),
            )));
        }
        Ok(())
    }

    fn spec(&self, step_number: u32) -> AssessmentResult<TurnSpec> {
        self.game.turn(step_number).cloned().ok_or_else(|| {
            self.notify(AssessmentError::Sequence {
                expected: self.session.next_step(),
                got: step_number,
            })
        })
    }

    fn trait_of(spec: &TurnSpec) -> AssessmentResult<TraitName> {
        spec.trait_name
            .ok_or_else(|| AssessmentError::InvalidGame("rubric turn has no trait".to_string()))
    }

    fn scenario_context(&self, prompt: &TurnPrompt, spec: &TurnSpec) -> ScenarioContext {
        ScenarioContext {
            game_id: self.game.id.clone(),
            step_number: prompt.step_number,
            question: prompt.question.clone(),
            scenario: spec.scenario.clone(),
            choices: prompt.choices.clone(),
        }
    }

    fn notify(&self, err: AssessmentError) -> AssessmentError {
        self.observer.on_error(err.kind());
        err
    }
}

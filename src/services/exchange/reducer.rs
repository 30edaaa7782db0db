//! Pure state machine for one reactive exchange.
//!
//! `ExchangeState::apply` is the only place exchange state changes. Timers and
//! judgment results never touch state directly: the runner turns them into
//! events, and the reducer answers with effects for the runner to perform.
//!
//! Phases: `Revealing -> AwaitingInput -> {Typing <-> Idle} -> Invoking ->
//! (AwaitingInput | Complete) -> Finalized`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::errors::{AssessmentError, AssessmentResult, JudgmentError};
use crate::domain::models::{ConversationMessage, ExchangeConfig, JudgmentSource, Sender, TraitScore, Transcript};
use crate::domain::ports::{ExchangeContext, ExchangeJudgment};

/// Which of the two timer slots an event or effect refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerSlot {
    Idle,
    AutoAdvance,
}

/// What the idle slot is currently counting down to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdleStage {
    /// Post-submit pause; arming resumes when it ends
    Settle,
    /// Idle countdown; a judgment call follows when it ends
    Countdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangePhase {
    Revealing,
    AwaitingInput,
    Typing,
    Idle,
    Invoking,
    Complete,
    Finalized,
}

/// Input to the reducer.
#[derive(Debug, Clone)]
pub enum ExchangeEvent {
    /// Composer changed; `has_content` is whether it holds any text
    Activity { has_content: bool },
    /// Participant explicitly sent a message
    Submit { text: String },
    TimerFired { slot: TimerSlot, token: u64 },
    JudgmentResolved {
        invocation: u64,
        result: Result<ExchangeJudgment, JudgmentError>,
    },
    Dispose,
}

/// Work the runner must perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start a timer, replacing whatever occupies the slot
    ArmTimer { slot: TimerSlot, token: u64, delay: Duration },
    CancelTimer { slot: TimerSlot },
    InvokeJudgment { invocation: u64, context: ExchangeContext },
    /// Deliver the outcome to the completion callback
    Finalize(ExchangeOutcome),
}

/// Final result of an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeOutcome {
    pub score: TraitScore,
    pub source: JudgmentSource,
    pub rationale: Option<String>,
    pub messages: Vec<ConversationMessage>,
    pub sent_count: u32,
    pub invocations: u32,
}

/// Validated timing and bounds for an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSettings {
    pub idle_delay: Duration,
    pub settle_delay: Duration,
    pub auto_advance_delay: Duration,
    pub judge_timeout: Duration,
    pub max_sent: u32,
    pub initial_reveal_messages: usize,
    pub max_invocations: u32,
    pub fallback_score: TraitScore,
}

impl ExchangeSettings {
    /// # Errors
    /// Returns `Validation` if the fallback score is outside `[1, 9]` or a bound is zero.
    pub fn from_config(config: &ExchangeConfig, judge_timeout: Duration) -> AssessmentResult<Self> {
        if config.max_sent == 0 || config.max_invocations == 0 {
            return Err(AssessmentError::Validation(
                "exchange bounds must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            idle_delay: config.idle_delay(),
            settle_delay: config.settle_delay(),
            auto_advance_delay: config.auto_advance_delay(),
            judge_timeout,
            max_sent: config.max_sent,
            initial_reveal_messages: config.initial_reveal_messages,
            max_invocations: config.max_invocations,
            fallback_score: TraitScore::new(config.fallback_score)?,
        })
    }
}

/// Fixed context of the turn the exchange belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeScope {
    pub game_id: String,
    pub step_number: u32,
    pub question: String,
    pub scenario: String,
    pub opening: Vec<String>,
}

/// Read-only view published after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeView {
    pub phase: ExchangePhase,
    pub messages: Vec<ConversationMessage>,
    pub sent_count: u32,
    pub input_closed: bool,
    pub invocations: u32,
}

#[derive(Debug, Clone)]
pub struct ExchangeState {
    settings: ExchangeSettings,
    scope: ExchangeScope,
    transcript: Transcript,
    phase: ExchangePhase,
    sent_count: u32,
    has_content: bool,
    arming_enabled: bool,
    input_closed: bool,
    idle: Option<(u64, IdleStage)>,
    auto_advance: Option<u64>,
    next_token: u64,
    in_flight: Option<u64>,
    invocations: u32,
    final_requested: bool,
    latest_score: Option<TraitScore>,
    latest_rationale: Option<String>,
    outcome: Option<ExchangeOutcome>,
    disposed: bool,
}

impl ExchangeState {
    pub fn new(settings: ExchangeSettings, scope: ExchangeScope) -> Self {
        Self {
            settings,
            scope,
            transcript: Transcript::new(),
            phase: ExchangePhase::Revealing,
            sent_count: 0,
            has_content: false,
            arming_enabled: true,
            input_closed: false,
            idle: None,
            auto_advance: None,
            next_token: 0,
            in_flight: None,
            invocations: 0,
            final_requested: false,
            latest_score: None,
            latest_rationale: None,
            outcome: None,
            disposed: false,
        }
    }

    pub const fn phase(&self) -> ExchangePhase {
        self.phase
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        self.transcript.messages()
    }

    pub const fn sent_count(&self) -> u32 {
        self.sent_count
    }

    pub const fn invocations(&self) -> u32 {
        self.invocations
    }

    pub const fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// True once nothing further can happen.
    pub const fn is_terminal(&self) -> bool {
        self.disposed || matches!(self.phase, ExchangePhase::Finalized)
    }

    pub fn view(&self) -> ExchangeView {
        ExchangeView {
            phase: self.phase,
            messages: self.transcript.messages().to_vec(),
            sent_count: self.sent_count,
            input_closed: self.input_closed,
            invocations: self.invocations,
        }
    }

    /// Reveals the opening messages and settles into `AwaitingInput`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        if self.phase != ExchangePhase::Revealing {
            return Vec::new();
        }
        for text in &self.scope.opening {
            self.transcript.push(Sender::Counterpart, text.clone(), now);
        }
        self.phase = ExchangePhase::AwaitingInput;

        let mut effects = Vec::new();
        if !self.has_content {
            self.arm_countdown(&mut effects);
        }
        effects
    }

    pub fn apply(&mut self, event: ExchangeEvent, now: DateTime<Utc>) -> Vec<Effect> {
        if self.is_terminal() {
            debug!(?event, "event after teardown ignored");
            return Vec::new();
        }

        let mut effects = Vec::new();
        match event {
            ExchangeEvent::Activity { has_content } => self.on_activity(has_content, &mut effects),
            ExchangeEvent::Submit { text } => self.on_submit(text, now, &mut effects),
            ExchangeEvent::TimerFired { slot, token } => self.on_timer(slot, token, &mut effects),
            ExchangeEvent::JudgmentResolved { invocation, result } => {
                self.on_judgment(invocation, result, now, &mut effects);
            }
            ExchangeEvent::Dispose => self.on_dispose(&mut effects),
        }
        effects
    }

    fn is_complete(&self) -> bool {
        matches!(self.phase, ExchangePhase::Complete | ExchangePhase::Finalized)
    }

    fn on_activity(&mut self, has_content: bool, effects: &mut Vec<Effect>) {
        if self.is_complete() || self.input_closed || self.phase == ExchangePhase::Revealing {
            return;
        }
        self.has_content = has_content;

        if has_content {
            if matches!(self.idle, Some((_, IdleStage::Countdown))) {
                self.idle = None;
                effects.push(Effect::CancelTimer { slot: TimerSlot::Idle });
            }
            if self.in_flight.is_none() {
                self.phase = ExchangePhase::Typing;
            }
        } else {
            if self.in_flight.is_none() {
                self.phase = ExchangePhase::AwaitingInput;
            }
            self.arm_countdown(effects);
        }
    }

    fn on_submit(&mut self, text: String, now: DateTime<Utc>, effects: &mut Vec<Effect>) {
        if self.is_complete() || self.input_closed || self.phase == ExchangePhase::Revealing {
            return;
        }
        if text.trim().is_empty() {
            return;
        }

        if self.idle.take().is_some() {
            effects.push(Effect::CancelTimer { slot: TimerSlot::Idle });
        }
        self.transcript.push(Sender::Participant, text, now);
        self.sent_count += 1;
        self.has_content = false;
        debug!(sent = self.sent_count, max = self.settings.max_sent, "participant message sent");

        if self.sent_count >= self.settings.max_sent {
            self.input_closed = true;
            if self.in_flight.is_some() {
                self.final_requested = true;
            } else {
                self.invoke(true, effects);
            }
            return;
        }

        self.arming_enabled = false;
        let token = self.issue_token();
        self.idle = Some((token, IdleStage::Settle));
        effects.push(Effect::ArmTimer {
            slot: TimerSlot::Idle,
            token,
            delay: self.settings.settle_delay,
        });
        if self.in_flight.is_none() {
            self.phase = ExchangePhase::AwaitingInput;
        }
    }

    fn on_timer(&mut self, slot: TimerSlot, token: u64, effects: &mut Vec<Effect>) {
        match slot {
            TimerSlot::Idle => {
                let Some((current, stage)) = self.idle else {
                    debug!(token, "idle timer fired after cancel");
                    return;
                };
                if current != token {
                    debug!(token, current, "stale idle timer ignored");
                    return;
                }
                self.idle = None;

                match stage {
                    IdleStage::Settle => {
                        self.arming_enabled = true;
                        if !self.has_content {
                            self.arm_countdown(effects);
                        }
                    }
                    IdleStage::Countdown => {
                        if self.in_flight.is_some() || self.is_complete() {
                            return;
                        }
                        if self.invocations >= self.settings.max_invocations {
                            self.complete_with_latest(effects);
                        } else {
                            self.invoke(false, effects);
                        }
                    }
                }
            }
            TimerSlot::AutoAdvance => {
                if self.auto_advance != Some(token) {
                    debug!(token, "stale auto-advance timer ignored");
                    return;
                }
                self.auto_advance = None;
                if let Some(outcome) = self.outcome.clone() {
                    self.phase = ExchangePhase::Finalized;
                    info!(score = %outcome.score, source = ?outcome.source, "exchange finalized");
                    effects.push(Effect::Finalize(outcome));
                }
            }
        }
    }

    fn on_judgment(
        &mut self,
        invocation: u64,
        result: Result<ExchangeJudgment, JudgmentError>,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) {
        if self.in_flight != Some(invocation) || self.is_complete() {
            debug!(invocation, "late judgment ignored");
            return;
        }
        self.in_flight = None;

        let judgment = match result {
            Ok(judgment) => judgment,
            Err(err) => {
                warn!(invocation, error = %err, "exchange judgment failed");
                self.complete_with_fallback(err.to_string(), effects);
                return;
            }
        };

        if let Some(reply) = judgment.reply.filter(|r| !r.trim().is_empty()) {
            self.transcript.push(Sender::Counterpart, reply, now);
        }
        if let Some(rationale) = judgment.rationale {
            self.latest_rationale = Some(rationale);
        }
        if let Some(raw) = judgment.score {
            match TraitScore::from_raw(raw) {
                Ok(score) => self.latest_score = Some(score),
                Err(err) => {
                    warn!(invocation, raw, "unusable exchange score");
                    self.complete_with_fallback(err.to_string(), effects);
                    return;
                }
            }
        }

        if judgment.complete {
            self.complete_with_latest(effects);
        } else if self.final_requested {
            self.final_requested = false;
            if self.invocations < self.settings.max_invocations {
                self.invoke(true, effects);
            } else {
                self.complete_with_latest(effects);
            }
        } else if self.input_closed || self.invocations >= self.settings.max_invocations {
            self.complete_with_latest(effects);
        } else {
            self.phase = if self.has_content {
                ExchangePhase::Typing
            } else {
                ExchangePhase::AwaitingInput
            };
            if !self.has_content {
                self.arm_countdown(effects);
            }
        }
    }

    fn on_dispose(&mut self, effects: &mut Vec<Effect>) {
        if self.idle.take().is_some() {
            effects.push(Effect::CancelTimer { slot: TimerSlot::Idle });
        }
        if self.auto_advance.take().is_some() {
            effects.push(Effect::CancelTimer {
                slot: TimerSlot::AutoAdvance,
            });
        }
        self.in_flight = None;
        self.disposed = true;
        self.phase = ExchangePhase::Finalized;
        debug!("exchange disposed");
    }

    fn can_arm_countdown(&self) -> bool {
        !self.is_complete()
            && !self.input_closed
            && self.arming_enabled
            && self.in_flight.is_none()
            && self.transcript.len() > self.settings.initial_reveal_messages
            && !matches!(self.idle, Some((_, IdleStage::Settle)))
    }

    fn arm_countdown(&mut self, effects: &mut Vec<Effect>) {
        if !self.can_arm_countdown() {
            return;
        }
        let token = self.issue_token();
        self.idle = Some((token, IdleStage::Countdown));
        self.phase = ExchangePhase::Idle;
        effects.push(Effect::ArmTimer {
            slot: TimerSlot::Idle,
            token,
            delay: self.settings.idle_delay,
        });
    }

    fn invoke(&mut self, closing: bool, effects: &mut Vec<Effect>) {
        if self.idle.take().is_some() {
            effects.push(Effect::CancelTimer { slot: TimerSlot::Idle });
        }
        let invocation = self.issue_token();
        self.in_flight = Some(invocation);
        self.invocations += 1;
        self.phase = ExchangePhase::Invoking;
        debug!(invocation, closing, count = self.invocations, "invoking judgment");

        effects.push(Effect::InvokeJudgment {
            invocation,
            context: ExchangeContext {
                game_id: self.scope.game_id.clone(),
                step_number: self.scope.step_number,
                question: self.scope.question.clone(),
                scenario: self.scope.scenario.clone(),
                history: self.transcript.messages().to_vec(),
                sent_count: self.sent_count,
                closing,
            },
        });
    }

    fn complete_with_latest(&mut self, effects: &mut Vec<Effect>) {
        match self.latest_score {
            Some(score) => {
                let rationale = self.latest_rationale.clone();
                self.complete(score, JudgmentSource::Capability, rationale, effects);
            }
            None => self.complete_with_fallback("no score was returned".to_string(), effects),
        }
    }

    fn complete_with_fallback(&mut self, reason: String, effects: &mut Vec<Effect>) {
        let score = self.settings.fallback_score;
        self.complete(score, JudgmentSource::Fallback, Some(reason), effects);
    }

    fn complete(
        &mut self,
        score: TraitScore,
        source: JudgmentSource,
        rationale: Option<String>,
        effects: &mut Vec<Effect>,
    ) {
        if self.idle.take().is_some() {
            effects.push(Effect::CancelTimer { slot: TimerSlot::Idle });
        }
        if self.auto_advance.take().is_some() {
            effects.push(Effect::CancelTimer {
                slot: TimerSlot::AutoAdvance,
            });
        }

        self.phase = ExchangePhase::Complete;
        self.input_closed = true;
        self.final_requested = false;
        self.outcome = Some(ExchangeOutcome {
            score,
            source,
            rationale,
            messages: self.transcript.messages().to_vec(),
            sent_count: self.sent_count,
            invocations: self.invocations,
        });

        let token = self.issue_token();
        self.auto_advance = Some(token);
        effects.push(Effect::ArmTimer {
            slot: TimerSlot::AutoAdvance,
            token,
            delay: self.settings.auto_advance_delay,
        });
        info!(%score, ?source, sent = self.sent_count, invocations = self.invocations, "exchange complete");
    }

    fn issue_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ExchangeSettings {
        ExchangeSettings::from_config(&ExchangeConfig::default(), Duration::from_secs(30)).unwrap()
    }

    fn state_with_opening(opening: &[&str]) -> ExchangeState {
        let scope = ExchangeScope {
            game_id: "standoff".to_string(),
            step_number: 1,
            question: "Your neighbour blocks the driveway again.".to_string(),
            scenario: String::new(),
            opening: opening.iter().map(|s| (*s).to_string()).collect(),
        };
        ExchangeState::new(settings(), scope)
    }

    fn armed(effects: &[Effect], slot: TimerSlot) -> Option<u64> {
        effects.iter().find_map(|e| match e {
            Effect::ArmTimer { slot: s, token, .. } if *s == slot => Some(*token),
            _ => None,
        })
    }

    fn invocation(effects: &[Effect]) -> Option<u64> {
        effects.iter().find_map(|e| match e {
            Effect::InvokeJudgment { invocation, .. } => Some(*invocation),
            _ => None,
        })
    }

    fn reply(score: f64) -> ExchangeJudgment {
        ExchangeJudgment {
            reply: Some("Fine, I'll move it.".to_string()),
            score: Some(score),
            rationale: Some("firm but polite".to_string()),
            complete: false,
        }
    }

    #[test]
    fn test_start_arms_idle_when_past_reveal_threshold() {
        let mut state = state_with_opening(&["Hey.", "We need to talk."]);
        let effects = state.start(Utc::now());
        assert!(armed(&effects, TimerSlot::Idle).is_some());
        assert_eq!(state.phase(), ExchangePhase::Idle);
    }

    #[test]
    fn test_no_arming_within_reveal_threshold() {
        let mut state = state_with_opening(&["Hey."]);
        assert!(state.start(Utc::now()).is_empty());
        let effects = state.apply(ExchangeEvent::Activity { has_content: false }, Utc::now());
        assert!(effects.is_empty());
        assert_eq!(state.phase(), ExchangePhase::AwaitingInput);
    }

    #[test]
    fn test_typing_cancels_countdown_and_stale_fire_is_ignored() {
        let mut state = state_with_opening(&["Hey.", "You there?"]);
        let token = armed(&state.start(Utc::now()), TimerSlot::Idle).unwrap();

        let effects = state.apply(ExchangeEvent::Activity { has_content: true }, Utc::now());
        assert_eq!(effects, vec![Effect::CancelTimer { slot: TimerSlot::Idle }]);
        assert_eq!(state.phase(), ExchangePhase::Typing);

        let effects = state.apply(
            ExchangeEvent::TimerFired {
                slot: TimerSlot::Idle,
                token,
            },
            Utc::now(),
        );
        assert!(effects.is_empty());
        assert_eq!(state.invocations(), 0);
    }

    #[test]
    fn test_rearm_replaces_token() {
        let mut state = state_with_opening(&["a", "b"]);
        let first = armed(&state.start(Utc::now()), TimerSlot::Idle).unwrap();
        let second = armed(
            &state.apply(ExchangeEvent::Activity { has_content: false }, Utc::now()),
            TimerSlot::Idle,
        )
        .unwrap();
        assert_ne!(first, second);

        let stale = state.apply(
            ExchangeEvent::TimerFired {
                slot: TimerSlot::Idle,
                token: first,
            },
            Utc::now(),
        );
        assert!(stale.is_empty());

        let fired = state.apply(
            ExchangeEvent::TimerFired {
                slot: TimerSlot::Idle,
                token: second,
            },
            Utc::now(),
        );
        assert!(invocation(&fired).is_some());
        assert!(state.is_in_flight());
    }

    #[test]
    fn test_single_flight_blocks_rearm() {
        let mut state = state_with_opening(&["a", "b"]);
        let token = armed(&state.start(Utc::now()), TimerSlot::Idle).unwrap();
        state.apply(
            ExchangeEvent::TimerFired {
                slot: TimerSlot::Idle,
                token,
            },
            Utc::now(),
        );
        let effects = state.apply(ExchangeEvent::Activity { has_content: false }, Utc::now());
        assert!(armed(&effects, TimerSlot::Idle).is_none());
        assert_eq!(state.invocations(), 1);
    }

    #[test]
    fn test_submit_settles_before_arming() {
        let mut state = state_with_opening(&["a", "b"]);
        state.start(Utc::now());
        let effects = state.apply(
            ExchangeEvent::Submit {
                text: "I'd rather not.".to_string(),
            },
            Utc::now(),
        );
        assert_eq!(effects[0], Effect::CancelTimer { slot: TimerSlot::Idle });
        let settle = armed(&effects, TimerSlot::Idle).unwrap();
        assert_eq!(state.sent_count(), 1);

        // arming is suspended while settling
        let effects = state.apply(ExchangeEvent::Activity { has_content: false }, Utc::now());
        assert!(effects.is_empty());

        let effects = state.apply(
            ExchangeEvent::TimerFired {
                slot: TimerSlot::Idle,
                token: settle,
            },
            Utc::now(),
        );
        assert!(matches!(
            effects.as_slice(),
            [Effect::ArmTimer { slot: TimerSlot::Idle, delay, .. }] if *delay == Duration::from_millis(8_000)
        ));
    }

    #[test]
    fn test_max_sent_requests_closing_judgment() {
        let mut state = state_with_opening(&["a", "b"]);
        state.start(Utc::now());
        for text in ["one", "two"] {
            state.apply(ExchangeEvent::Submit { text: text.to_string() }, Utc::now());
        }
        let effects = state.apply(ExchangeEvent::Submit { text: "three".to_string() }, Utc::now());
        let closing = effects.iter().any(|e| matches!(e, Effect::InvokeJudgment { context, .. } if context.closing));
        assert!(closing);

        // input is closed now
        let effects = state.apply(ExchangeEvent::Submit { text: "four".to_string() }, Utc::now());
        assert!(effects.is_empty());
        assert_eq!(state.sent_count(), 3);
    }

    #[test]
    fn test_final_request_waits_for_in_flight_call() {
        let mut state = state_with_opening(&["a", "b"]);
        let token = armed(&state.start(Utc::now()), TimerSlot::Idle).unwrap();
        let first = invocation(&state.apply(
            ExchangeEvent::TimerFired {
                slot: TimerSlot::Idle,
                token,
            },
            Utc::now(),
        ))
        .unwrap();

        for text in ["one", "two", "three"] {
            let effects = state.apply(ExchangeEvent::Submit { text: text.to_string() }, Utc::now());
            assert!(invocation(&effects).is_none());
        }

        let effects = state.apply(
            ExchangeEvent::JudgmentResolved {
                invocation: first,
                result: Ok(reply(4.0)),
            },
            Utc::now(),
        );
        let closing = effects.iter().any(|e| matches!(e, Effect::InvokeJudgment { context, .. } if context.closing));
        assert!(closing);
        assert_eq!(state.invocations(), 2);
    }

    #[test]
    fn test_completion_arms_one_auto_advance_and_finalizes_once() {
        let mut state = state_with_opening(&["a", "b"]);
        let token = armed(&state.start(Utc::now()), TimerSlot::Idle).unwrap();
        let call = invocation(&state.apply(
            ExchangeEvent::TimerFired {
                slot: TimerSlot::Idle,
                token,
            },
            Utc::now(),
        ))
        .unwrap();

        let mut done = reply(7.0);
        done.complete = true;
        let effects = state.apply(
            ExchangeEvent::JudgmentResolved {
                invocation: call,
                result: Ok(done),
            },
            Utc::now(),
        );
        assert_eq!(state.phase(), ExchangePhase::Complete);
        let advance = armed(&effects, TimerSlot::AutoAdvance).unwrap();

        let effects = state.apply(
            ExchangeEvent::TimerFired {
                slot: TimerSlot::AutoAdvance,
                token: advance,
            },
            Utc::now(),
        );
        let [Effect::Finalize(outcome)] = effects.as_slice() else {
            panic!("expected a single finalize, got {effects:?}");
        };
        assert_eq!(outcome.score.value(), 7);
        assert_eq!(outcome.source, JudgmentSource::Capability);
        assert_eq!(outcome.messages.len(), 3);

        let again = state.apply(
            ExchangeEvent::TimerFired {
                slot: TimerSlot::AutoAdvance,
                token: advance,
            },
            Utc::now(),
        );
        assert!(again.is_empty());
        assert!(state.is_terminal());
    }

    #[test]
    fn test_failure_completes_with_fallback() {
        let mut state = state_with_opening(&["a", "b"]);
        let token = armed(&state.start(Utc::now()), TimerSlot::Idle).unwrap();
        let call = invocation(&state.apply(
            ExchangeEvent::TimerFired {
                slot: TimerSlot::Idle,
                token,
            },
            Utc::now(),
        ))
        .unwrap();

        state.apply(
            ExchangeEvent::JudgmentResolved {
                invocation: call,
                result: Err(JudgmentError::Timeout(30_000)),
            },
            Utc::now(),
        );
        assert_eq!(state.phase(), ExchangePhase::Complete);
        let outcome = state.outcome.clone().unwrap();
        assert_eq!(outcome.score.value(), 5);
        assert_eq!(outcome.source, JudgmentSource::Fallback);
    }

    #[test]
    fn test_invalid_score_is_not_clamped() {
        let mut state = state_with_opening(&["a", "b"]);
        let token = armed(&state.start(Utc::now()), TimerSlot::Idle).unwrap();
        let call = invocation(&state.apply(
            ExchangeEvent::TimerFired {
                slot: TimerSlot::Idle,
                token,
            },
            Utc::now(),
        ))
        .unwrap();
        state.apply(
            ExchangeEvent::JudgmentResolved {
                invocation: call,
                result: Ok(reply(12.0)),
            },
            Utc::now(),
        );
        let outcome = state.outcome.clone().unwrap();
        assert_eq!(outcome.score.value(), 5);
        assert_eq!(outcome.source, JudgmentSource::Fallback);
    }

    #[test]
    fn test_dispose_cancels_everything_and_ignores_late_results() {
        let mut state = state_with_opening(&["a", "b"]);
        let token = armed(&state.start(Utc::now()), TimerSlot::Idle).unwrap();
        let call = invocation(&state.apply(
            ExchangeEvent::TimerFired {
                slot: TimerSlot::Idle,
                token,
            },
            Utc::now(),
        ))
        .unwrap();

        state.apply(ExchangeEvent::Dispose, Utc::now());
        assert!(state.is_terminal());

        let late = state.apply(
            ExchangeEvent::JudgmentResolved {
                invocation: call,
                result: Ok(reply(8.0)),
            },
            Utc::now(),
        );
        assert!(late.is_empty());
        assert!(state.outcome.is_none());
    }

    #[test]
    fn test_invocation_cap_completes() {
        let config = ExchangeConfig {
            max_invocations: 1,
            ..ExchangeConfig::default()
        };
        let settings = ExchangeSettings::from_config(&config, Duration::from_secs(30)).unwrap();
        let scope = ExchangeScope {
            opening: vec!["a".to_string(), "b".to_string()],
            ..ExchangeScope::default()
        };
        let mut state = ExchangeState::new(settings, scope);
        let token = armed(&state.start(Utc::now()), TimerSlot::Idle).unwrap();
        let call = invocation(&state.apply(
            ExchangeEvent::TimerFired {
                slot: TimerSlot::Idle,
                token,
            },
            Utc::now(),
        ))
        .unwrap();
        state.apply(
            ExchangeEvent::JudgmentResolved {
                invocation: call,
                result: Ok(reply(3.0)),
            },
            Utc::now(),
        );
        assert_eq!(state.phase(), ExchangePhase::Complete);
        assert_eq!(state.outcome.clone().unwrap().score.value(), 3);
    }
}

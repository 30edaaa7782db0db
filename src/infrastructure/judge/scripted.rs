//! Scripted judgment capability for tests and offline runs.
//!
//! Each capability has its own FIFO script. An exhausted script answers with
//! a transport error, so a run that asks more than it was told to expect
//! takes the same fallback path as a real outage.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::domain::errors::JudgmentError;
use crate::domain::models::{IntentLabel, TraitName};
use crate::domain::ports::{
    ExchangeContext, ExchangeJudgment, GeneratedTurn, GenerationContext, JudgmentCapability,
    ScenarioContext,
};

type Script<T> = Mutex<VecDeque<Result<T, JudgmentError>>>;

#[derive(Default)]
struct Scripts {
    labels: Script<IntentLabel>,
    scores: Script<f64>,
    generated: Script<GeneratedTurn>,
    reactions: Script<ExchangeJudgment>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_concurrent: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

/// Deterministic judge answering from pre-loaded scripts.
///
/// Clones share the same scripts and counters.
#[derive(Clone, Default)]
pub struct ScriptedJudge {
    inner: Arc<Scripts>,
}

struct InFlight<'a>(&'a Scripts);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn push<T>(script: &Script<T>, item: Result<T, JudgmentError>) {
    script
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push_back(item);
}

fn pop<T>(script: &Script<T>, what: &str) -> Result<T, JudgmentError> {
    script
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
        .unwrap_or_else(|| Err(JudgmentError::Transport(format!("no scripted {what} left"))))
}

impl ScriptedJudge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every answer; combine with paused tokio time in tests.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(Some(delay));
        self
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.inner.delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    pub fn push_label(&self, label: Result<IntentLabel, JudgmentError>) {
        push(&self.inner.labels, label);
    }

    pub fn push_score(&self, score: Result<f64, JudgmentError>) {
        push(&self.inner.scores, score);
    }

    pub fn push_generated(&self, turn: Result<GeneratedTurn, JudgmentError>) {
        push(&self.inner.generated, turn);
    }

    pub fn push_reaction(&self, reaction: Result<ExchangeJudgment, JudgmentError>) {
        push(&self.inner.reactions, reaction);
    }

    /// Total calls received across all capabilities.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in flight at once.
    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> InFlight<'_> {
        let scripts = &*self.inner;
        scripts.calls.fetch_add(1, Ordering::SeqCst);
        let now = scripts.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        scripts.max_concurrent.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(scripts);

        let delay = *scripts.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        guard
    }
}

#[async_trait]
impl JudgmentCapability for ScriptedJudge {
    async fn classify(&self, _text: &str, _context: &ScenarioContext) -> Result<IntentLabel, JudgmentError> {
        let _guard = self.enter().await;
        pop(&self.inner.labels, "label")
    }

    async fn score(
        &self,
        _trait_name: TraitName,
        _text: &str,
        _rubric: &ScenarioContext,
    ) -> Result<f64, JudgmentError> {
        let _guard = self.enter().await;
        pop(&self.inner.scores, "score")
    }

    async fn generate_turn(&self, _context: &GenerationContext) -> Result<GeneratedTurn, JudgmentError> {
        let _guard = self.enter().await;
        pop(&self.inner.generated, "turn")
    }

    async fn respond(&self, _context: &ExchangeContext) -> Result<ExchangeJudgment, JudgmentError> {
        let _guard = self.enter().await;
        pop(&self.inner.reactions, "reaction")
    }
}

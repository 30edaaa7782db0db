//! Tokio driver for an exchange reducer.
//!
//! One task per exchange owns the state and drains a single event queue.
//! Timers are sleeping tasks that enqueue `TimerFired`; judgment calls are
//! tasks that enqueue `JudgmentResolved`. Cancelling a timer aborts its task,
//! and the reducer's token check discards anything that was already queued.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn, Instrument};

use super::reducer::{Effect, ExchangeEvent, ExchangeOutcome, ExchangeState, ExchangeView, TimerSlot};
use crate::domain::errors::JudgmentError;
use crate::domain::ports::{ExchangeContext, JudgmentCapability};

/// Handle held by the owner of a running exchange.
///
/// Dropping the handle disposes the exchange.
pub struct ExchangeHandle {
    events: mpsc::UnboundedSender<ExchangeEvent>,
    view: watch::Receiver<ExchangeView>,
    outcome: Option<oneshot::Receiver<ExchangeOutcome>>,
    task: Option<JoinHandle<()>>,
}

impl ExchangeHandle {
    /// Starts the runner task for `state`.
    pub fn spawn(state: ExchangeState, judge: Arc<dyn JudgmentCapability>, judge_timeout: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(state.view());
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let runner = ExchangeRunner {
            state,
            judge,
            judge_timeout,
            events: events_tx.clone(),
            view: view_tx,
            outcome: Some(outcome_tx),
            idle_timer: None,
            auto_advance_timer: None,
            judgment_task: None,
        };
        let task = tokio::spawn(runner.run(events_rx).in_current_span());

        Self {
            events: events_tx,
            view: view_rx,
            outcome: Some(outcome_rx),
            task: Some(task),
        }
    }

    /// Reports composer activity.
    pub fn activity(&self, has_content: bool) {
        self.send(ExchangeEvent::Activity { has_content });
    }

    /// Sends a participant message.
    pub fn submit(&self, text: impl Into<String>) {
        self.send(ExchangeEvent::Submit { text: text.into() });
    }

    /// Latest published view.
    pub fn view(&self) -> ExchangeView {
        self.view.borrow().clone()
    }

    /// Receiver that changes after every transition.
    pub fn subscribe(&self) -> watch::Receiver<ExchangeView> {
        self.view.clone()
    }

    /// Waits for the completion callback; `None` if the exchange was disposed
    /// first or the outcome was already taken.
    pub async fn outcome(&mut self) -> Option<ExchangeOutcome> {
        let receiver = self.outcome.take()?;
        receiver.await.ok()
    }

    /// Cancels both timers and stops the runner. No outcome is delivered afterwards.
    pub async fn dispose(mut self) {
        self.send(ExchangeEvent::Dispose);
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "exchange runner ended abnormally");
            }
        }
    }

    fn send(&self, event: ExchangeEvent) {
        if self.events.send(event).is_err() {
            debug!("exchange already finished; event dropped");
        }
    }
}

impl Drop for ExchangeHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.events.send(ExchangeEvent::Dispose);
        }
    }
}

struct ExchangeRunner {
    state: ExchangeState,
    judge: Arc<dyn JudgmentCapability>,
    judge_timeout: Duration,
    events: mpsc::UnboundedSender<ExchangeEvent>,
    view: watch::Sender<ExchangeView>,
    outcome: Option<oneshot::Sender<ExchangeOutcome>>,
    idle_timer: Option<JoinHandle<()>>,
    auto_advance_timer: Option<JoinHandle<()>>,
    judgment_task: Option<JoinHandle<()>>,
}

impl ExchangeRunner {
    #[instrument(skip_all, name = "exchange")]
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<ExchangeEvent>) {
        let effects = self.state.start(Utc::now());
        self.perform(effects);
        self.publish();

        while let Some(event) = events.recv().await {
            let effects = self.state.apply(event, Utc::now());
            self.perform(effects);
            self.publish();
            if self.state.is_terminal() {
                break;
            }
        }

        self.shutdown();
    }

    fn perform(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::ArmTimer { slot, token, delay } => self.arm(slot, token, delay),
                Effect::CancelTimer { slot } => {
                    if let Some(timer) = self.slot_mut(slot).take() {
                        timer.abort();
                    }
                }
                Effect::InvokeJudgment { invocation, context } => self.invoke(invocation, context),
                Effect::Finalize(outcome) => {
                    if let Some(callback) = self.outcome.take() {
                        if callback.send(outcome).is_err() {
                            debug!("completion receiver dropped");
                        }
                    }
                }
            }
        }
    }

    fn arm(&mut self, slot: TimerSlot, token: u64, delay: Duration) {
        if let Some(previous) = self.slot_mut(slot).take() {
            previous.abort();
        }
        let events = self.events.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(ExchangeEvent::TimerFired { slot, token });
        });
        debug!(?slot, token, delay_ms = delay.as_millis(), "timer armed");
        *self.slot_mut(slot) = Some(timer);
    }

    fn invoke(&mut self, invocation: u64, context: ExchangeContext) {
        let judge = Arc::clone(&self.judge);
        let events = self.events.clone();
        let ceiling = self.judge_timeout;
        let task = tokio::spawn(
            async move {
                let result = match tokio::time::timeout(ceiling, judge.respond(&context)).await {
                    Ok(result) => result,
                    Err(_) => Err(JudgmentError::Timeout(
                        u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX),
                    )),
                };
                let _ = events.send(ExchangeEvent::JudgmentResolved { invocation, result });
            }
            .in_current_span(),
        );
        self.judgment_task = Some(task);
    }

    fn slot_mut(&mut self, slot: TimerSlot) -> &mut Option<JoinHandle<()>> {
        match slot {
            TimerSlot::Idle => &mut self.idle_timer,
            TimerSlot::AutoAdvance => &mut self.auto_advance_timer,
        }
    }

    fn publish(&self) {
        self.view.send_replace(self.state.view());
    }

    fn shutdown(&mut self) {
        for task in [
            self.idle_timer.take(),
            self.auto_advance_timer.take(),
            self.judgment_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
        debug!(phase = ?self.state.phase(), "exchange runner stopped");
    }
}

//! Interface produced for the presentation layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::ErrorKind;
use crate::domain::models::{Archetype, TurnRecord};

/// The turn the participant should answer next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnPrompt {
    pub step_number: u32,
    pub total_turns: u32,
    pub question: String,
    pub choices: Option<Vec<String>>,
    /// Narrative shown before the question (generated turns)
    pub narrative: Option<String>,
    /// Counterpart messages to reveal first (reactive turns)
    pub opening: Vec<String>,
    pub reactive: bool,
    /// True when the judgment capability produced this prompt
    pub generated: bool,
}

/// Everything the presentation layer needs once a session completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub session_id: Uuid,
    pub archetype: Archetype,
    pub rationale: String,
    pub history: Vec<TurnRecord>,
}

/// Callbacks fired by an assessment run.
///
/// Called from the run's own task; implementations must not block.
pub trait AssessmentObserver: Send + Sync {
    fn on_turn_advance(&self, next: &TurnPrompt);

    fn on_complete(&self, report: &CompletionReport);

    fn on_error(&self, kind: ErrorKind);
}

/// Observer that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl AssessmentObserver for NullObserver {
    fn on_turn_advance(&self, _next: &TurnPrompt) {}

    fn on_complete(&self, _report: &CompletionReport) {}

    fn on_error(&self, _kind: ErrorKind) {}
}

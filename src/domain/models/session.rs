/// Domain models for assessment sessions.
///
/// A session owns the ordered list of committed turns. Aggregates (weight
/// sums, trait means) are always derived from these records and never stored
/// alongside them.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::archetype::Archetype;
use super::intent::IntentLabel;
use super::message::ConversationMessage;
use super::rubric::{PartialTraitScores, TraitName, TraitScore};

/// Where a committed judgment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgmentSource {
    /// Returned by the judgment capability and validated
    Capability,
    /// Documented fallback applied after a failed judgment
    Fallback,
}

/// Judgment committed with a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnJudgment {
    Intent {
        label: IntentLabel,
        source: JudgmentSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rationale: Option<String>,
    },
    Trait {
        name: TraitName,
        score: TraitScore,
        source: JudgmentSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rationale: Option<String>,
    },
}

impl TurnJudgment {
    pub const fn source(&self) -> JudgmentSource {
        match self {
            Self::Intent { source, .. } | Self::Trait { source, .. } => *source,
        }
    }

    pub fn rationale(&self) -> Option<&str> {
        match self {
            Self::Intent { rationale, .. } | Self::Trait { rationale, .. } => rationale.as_deref(),
        }
    }
}

/// Participant response submitted for the next step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub step_number: u32,
    pub question: String,
    pub choices: Option<Vec<String>>,
    pub user_response: String,
    pub response_time_ms: u64,
    pub judgment: Option<TurnJudgment>,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
}

impl TurnResponse {
    pub fn new(step_number: u32, question: impl Into<String>, user_response: impl Into<String>) -> Self {
        Self {
            step_number,
            question: question.into(),
            choices: None,
            user_response: user_response.into(),
            response_time_ms: 0,
            judgment: None,
            messages: Vec::new(),
        }
    }

    pub fn with_choices(mut self, choices: Vec<String>) -> Self {
        self.choices = Some(choices);
        self
    }

    pub const fn with_response_time(mut self, ms: u64) -> Self {
        self.response_time_ms = ms;
        self
    }

    pub fn with_judgment(mut self, judgment: TurnJudgment) -> Self {
        self.judgment = Some(judgment);
        self
    }

    pub fn with_messages(mut self, messages: Vec<ConversationMessage>) -> Self {
        self.messages = messages;
        self
    }
}

/// One committed turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// 1-based, unique, strictly increasing, no gaps
    pub step_number: u32,
    pub question: String,
    pub choices: Option<Vec<String>>,
    pub user_response: String,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub judgment: Option<TurnJudgment>,
    /// Transcript of a reactive turn; empty otherwise
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
}

impl TurnRecord {
    pub fn from_response(response: TurnResponse, timestamp: DateTime<Utc>) -> Self {
        Self {
            step_number: response.step_number,
            question: response.question,
            choices: response.choices,
            user_response: response.user_response,
            response_time_ms: response.response_time_ms,
            timestamp,
            judgment: response.judgment,
            messages: response.messages,
        }
    }
}

/// Progress of a session through its turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "step", rename_all = "snake_case")]
pub enum SessionPhase {
    NotStarted,
    /// Number of committed turns
    InProgress(u32),
    Complete,
}

/// Assessment session with its committed turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier, allocated by the snapshot store
    pub id: Uuid,

    pub participant_id: Option<String>,

    pub game_id: String,

    /// Configured number of turns, fixed at start
    pub total_turns: u32,

    pub steps: Vec<TurnRecord>,

    /// Set exactly once, on completion
    pub result: Option<Archetype>,

    pub completed: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: Uuid, game_id: impl Into<String>, total_turns: u32, participant_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            participant_id,
            game_id: game_id.into(),
            total_turns,
            steps: Vec::new(),
            result: None,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Step number the next committed turn must carry.
    #[allow(clippy::cast_possible_truncation)]
    pub fn next_step(&self) -> u32 {
        self.steps.len() as u32 + 1
    }

    /// True once every configured turn has been recorded.
    #[allow(clippy::cast_possible_truncation)]
    pub fn all_turns_recorded(&self) -> bool {
        self.steps.len() as u32 >= self.total_turns
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn phase(&self) -> SessionPhase {
        if self.completed {
            SessionPhase::Complete
        } else if self.steps.is_empty() {
            SessionPhase::NotStarted
        } else {
            SessionPhase::InProgress(self.steps.len() as u32)
        }
    }

    /// Intent labels of committed turns, in step order.
    pub fn intent_path(&self) -> Vec<IntentLabel> {
        self.steps
            .iter()
            .filter_map(|step| match &step.judgment {
                Some(TurnJudgment::Intent { label, .. }) => Some(*label),
                _ => None,
            })
            .collect()
    }

    /// Trait scores of committed turns; later turns win for a repeated trait.
    pub fn trait_scores(&self) -> PartialTraitScores {
        self.steps
            .iter()
            .filter_map(|step| match &step.judgment {
                Some(TurnJudgment::Trait { name, score, .. }) => Some((*name, *score)),
                _ => None,
            })
            .collect()
    }
}

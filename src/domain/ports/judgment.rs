/// Judgment capability port (trait) for dependency injection.
///
/// The capability is a black box that classifies, scores, generates turns and
/// reacts inside an exchange. Adapters are responsible for cleaning raw model
/// output; implementations of this trait return already-parsed values or a
/// typed `JudgmentError`, never a fabricated success.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::JudgmentError;
use crate::domain::models::{ConversationMessage, IntentLabel, TraitName};

/// Context for judging a single response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioContext {
    pub game_id: String,
    pub step_number: u32,
    pub question: String,
    pub scenario: String,
    pub choices: Option<Vec<String>>,
}

/// Context for generating the next turn's prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationContext {
    pub game_id: String,
    pub step_number: u32,
    pub total_turns: u32,
    pub scenario: String,
    /// Static prompt used when generation fails
    pub seed_question: String,
    /// `(question, response)` pairs of committed turns
    pub previous: Vec<(String, String)>,
}

/// Prompt produced by `generate_turn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedTurn {
    /// Narrative shown before the question
    #[serde(default)]
    pub text: String,
    pub question: String,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
}

impl GeneratedTurn {
    /// Most choices a generated turn may offer.
    pub const MAX_CHOICES: usize = 6;

    /// Shape check: non-empty question, and 2 to 6 non-empty choices when present.
    pub fn validate(&self) -> Result<(), JudgmentError> {
        if self.question.trim().is_empty() {
            return Err(JudgmentError::Unparseable(
                "generated turn has an empty question".to_string(),
            ));
        }
        if let Some(choices) = &self.choices {
            if choices.len() < 2 || choices.len() > Self::MAX_CHOICES {
                return Err(JudgmentError::Unparseable(format!(
                    "generated turn has {} choices",
                    choices.len()
                )));
            }
            if choices.iter().any(|c| c.trim().is_empty()) {
                return Err(JudgmentError::Unparseable(
                    "generated turn has an empty choice".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Context for a judgment inside a reactive exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeContext {
    pub game_id: String,
    pub step_number: u32,
    pub question: String,
    pub scenario: String,
    pub history: Vec<ConversationMessage>,
    pub sent_count: u32,
    /// Participant input is closed; this is the last call of the exchange
    pub closing: bool,
}

/// Counterpart reaction inside an exchange.
///
/// `score` is raw and unvalidated; the scheduler validates it before use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeJudgment {
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub rationale: Option<String>,
    #[serde(default)]
    pub complete: bool,
}

/// External classification/scoring capability.
#[async_trait]
pub trait JudgmentCapability: Send + Sync {
    /// Classify a response into an intent label.
    async fn classify(&self, text: &str, context: &ScenarioContext) -> Result<IntentLabel, JudgmentError>;

    /// Score a response on one trait. The raw value is validated by the caller.
    async fn score(
        &self,
        trait_name: TraitName,
        text: &str,
        rubric: &ScenarioContext,
    ) -> Result<f64, JudgmentError>;

    /// Generate the prompt for the next turn.
    async fn generate_turn(&self, context: &GenerationContext) -> Result<GeneratedTurn, JudgmentError>;

    /// React to the current state of an exchange.
    async fn respond(&self, context: &ExchangeContext) -> Result<ExchangeJudgment, JudgmentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(question: &str, choices: Option<Vec<&str>>) -> GeneratedTurn {
        GeneratedTurn {
            text: String::new(),
            question: question.to_string(),
            choices: choices.map(|c| c.into_iter().map(String::from).collect()),
        }
    }

    #[test]
    fn test_generated_turn_shape() {
        assert!(turn("What next?", None).validate().is_ok());
        assert!(turn("What next?", Some(vec!["a", "b"])).validate().is_ok());
        assert!(turn("  ", None).validate().is_err());
        assert!(turn("What next?", Some(vec!["only"])).validate().is_err());
        assert!(turn("What next?", Some(vec!["a", " "])).validate().is_err());
        assert!(turn("Q", Some(vec!["1", "2", "3", "4", "5", "6", "7"])).validate().is_err());
    }
}

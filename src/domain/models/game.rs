//! Assessment definitions: which turns a session plays and how they are judged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::rubric::TraitName;
use crate::domain::errors::AssessmentError;

/// How the turns of a game are aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    /// Each turn is classified into an intent label; the weight sum picks the archetype
    PathClassification,
    /// Each turn scores one trait; the rounded mean picks the archetype
    TraitRubric,
}

/// How a participant answers a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnMode {
    /// Pick one of the listed choices
    Fixed,
    /// Type a single free-text answer
    FreeText,
    /// Converse with a counterpart that may also speak first
    Reactive {
        /// Counterpart messages revealed before the participant can answer
        #[serde(default)]
        opening: Vec<String>,
    },
}

/// One turn of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSpec {
    pub question: String,

    #[serde(default)]
    pub choices: Option<Vec<String>>,

    #[serde(default = "default_mode")]
    pub mode: TurnMode,

    /// Scenario text handed to the judgment capability
    #[serde(default)]
    pub scenario: String,

    /// Trait this turn scores (rubric games only)
    #[serde(default)]
    pub trait_name: Option<TraitName>,

    /// Ask the judgment capability to generate the prompt, falling back to
    /// `question`/`choices` when it fails
    #[serde(default)]
    pub generated: bool,
}

fn default_mode() -> TurnMode {
    TurnMode::FreeText
}

impl TurnSpec {
    pub const fn is_reactive(&self) -> bool {
        matches!(self.mode, TurnMode::Reactive { .. })
    }

    pub fn opening(&self) -> &[String] {
        match &self.mode {
            TurnMode::Reactive { opening } => opening,
            _ => &[],
        }
    }
}

/// A complete assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDefinition {
    pub id: String,
    pub title: String,
    pub kind: GameKind,
    pub turns: Vec<TurnSpec>,
}

impl GameDefinition {
    /// Parse a definition from YAML and validate it.
    pub fn from_yaml_str(yaml: &str, path_length: usize) -> Result<Self, AssessmentError> {
        let game: Self = serde_yaml::from_str(yaml)
            .map_err(|e| AssessmentError::InvalidGame(format!("YAML parse error: {e}")))?;
        game.validate(path_length)?;
        Ok(game)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn total_turns(&self) -> u32 {
        self.turns.len() as u32
    }

    /// Turn for a 1-based step number.
    pub fn turn(&self, step_number: u32) -> Option<&TurnSpec> {
        let index = usize::try_from(step_number.checked_sub(1)?).ok()?;
        self.turns.get(index)
    }

    /// Check the definition against the configured path length.
    ///
    /// Path games must have exactly `path_length` turns so every session's
    /// weight sum lands in the configured bucket table. Rubric games must
    /// score each of the four traits exactly once.
    pub fn validate(&self, path_length: usize) -> Result<(), AssessmentError> {
        let invalid = |msg: String| Err(AssessmentError::InvalidGame(format!("{}: {msg}", self.id)));

        if self.id.trim().is_empty() {
            return Err(AssessmentError::InvalidGame("game id cannot be empty".to_string()));
        }
        if self.turns.is_empty() {
            return invalid("no turns defined".to_string());
        }

        for (index, turn) in self.turns.iter().enumerate() {
            let step = index + 1;
            if turn.question.trim().is_empty() {
                return invalid(format!("turn {step} has an empty question"));
            }
            match (&turn.mode, &turn.choices) {
                (TurnMode::Fixed, None) => {
                    return invalid(format!("turn {step} is fixed-choice but lists no choices"));
                }
                (TurnMode::Fixed, Some(choices)) if choices.len() < 2 => {
                    return invalid(format!("turn {step} needs at least two choices"));
                }
                (TurnMode::Reactive { .. }, Some(_)) => {
                    return invalid(format!("turn {step} is reactive and cannot list choices"));
                }
                _ => {}
            }
        }

        match self.kind {
            GameKind::PathClassification => {
                if self.turns.len() != path_length {
                    return invalid(format!(
                        "path games need exactly {path_length} turns, found {}",
                        self.turns.len()
                    ));
                }
                if self.turns.iter().any(|t| t.trait_name.is_some()) {
                    return invalid("path games cannot assign traits".to_string());
                }
            }
            GameKind::TraitRubric => {
                let mut seen = BTreeSet::new();
                for (index, turn) in self.turns.iter().enumerate() {
                    let Some(name) = turn.trait_name else {
                        return invalid(format!("rubric turn {} has no trait", index + 1));
                    };
                    if !seen.insert(name) {
                        return invalid(format!("trait {name} is scored more than once"));
                    }
                }
                if seen.len() != TraitName::ALL.len() {
                    return invalid("rubric games must score all four traits".to_string());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH_GAME: &str = r"
id: standoff
title: The Standoff
kind: path_classification
turns:
  - question: Your colleague takes credit for your work. What do you do?
    mode:
      type: fixed
    choices: [Let it go, Ask about it privately, Call it out in the meeting]
  - question: How do you open the follow-up conversation?
    scenario: One-on-one meeting the next morning
  - question: Talk it through with your colleague.
    mode:
      type: reactive
      opening:
        - Hey, you wanted to talk?
";

    #[test]
    fn test_parse_path_game() {
        let game = GameDefinition::from_yaml_str(PATH_GAME, 3).unwrap();
        assert_eq!(game.kind, GameKind::PathClassification);
        assert_eq!(game.total_turns(), 3);
        assert_eq!(game.turns[1].mode, TurnMode::FreeText);
        assert!(game.turns[2].is_reactive());
        assert_eq!(game.turns[2].opening(), ["Hey, you wanted to talk?".to_string()]);
        assert_eq!(game.turn(1).unwrap().choices.as_ref().unwrap().len(), 3);
        assert!(game.turn(0).is_none());
        assert!(game.turn(4).is_none());
    }

    #[test]
    fn test_path_game_must_match_path_length() {
        let err = GameDefinition::from_yaml_str(PATH_GAME, 4).unwrap_err();
        assert!(matches!(err, AssessmentError::InvalidGame(_)));
    }

    #[test]
    fn test_rubric_game_needs_each_trait_once() {
        let yaml = r"
id: planner
title: Weekend Planner
kind: trait_rubric
turns:
  - question: How do you plan a trip?
    trait_name: organization
  - question: How do you proofread?
    trait_name: perfectionism
  - question: How do you handle a risky offer?
    trait_name: prudence
  - question: How do you finish a dull task?
    trait_name: organization
";
        let err = GameDefinition::from_yaml_str(yaml, 3).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_fixed_turn_requires_choices() {
        let yaml = r"
id: broken
title: Broken
kind: path_classification
turns:
  - question: Pick one
    mode:
      type: fixed
";
        assert!(GameDefinition::from_yaml_str(yaml, 1).is_err());
    }
}

//! Shared games, observers and exchange builders.

use std::sync::Mutex;
use std::time::Duration;

use turnwise::domain::errors::ErrorKind;
use turnwise::domain::models::{ExchangeConfig, GameDefinition};
use turnwise::domain::ports::{AssessmentObserver, CompletionReport, ExchangeJudgment, TurnPrompt};
use turnwise::services::exchange::{ExchangeScope, ExchangeSettings, ExchangeState};

pub const PATH_GAME: &str = r"
id: standoff
title: The Standoff
kind: path_classification
turns:
  - question: Your colleague takes credit for your work. What do you do?
    mode: { type: fixed }
    choices: [Let it go, Ask about it privately, Call it out in the meeting]
  - question: How do you open the follow-up conversation?
    scenario: One-on-one the next morning
  - question: Talk it through with your colleague.
    mode:
      type: reactive
      opening:
        - Hey, you wanted to talk?
        - I only have a few minutes.
";

pub const RUBRIC_GAME: &str = r"
id: move
title: Moving Day
kind: trait_rubric
turns:
  - question: How do you plan the move?
    trait_name: organization
  - question: The movers chipped a table. What now?
    trait_name: perfectionism
  - question: Do you insure the fragile boxes?
    trait_name: prudence
  - question: The landlord calls about the deposit.
    trait_name: diligence
    mode:
      type: reactive
      opening:
        - Hi, it's about the deposit.
        - There are a few marks on the wall.
";

pub fn path_game() -> GameDefinition {
    GameDefinition::from_yaml_str(PATH_GAME, 3).expect("path game fixture is valid")
}

pub fn rubric_game() -> GameDefinition {
    GameDefinition::from_yaml_str(RUBRIC_GAME, 3).expect("rubric game fixture is valid")
}

/// Default exchange settings with a 30 second judgment ceiling.
pub fn exchange_settings() -> ExchangeSettings {
    ExchangeSettings::from_config(&ExchangeConfig::default(), Duration::from_secs(30))
        .expect("default exchange settings are valid")
}

pub fn exchange_state(settings: ExchangeSettings, opening: &[&str]) -> ExchangeState {
    let scope = ExchangeScope {
        game_id: "standoff".to_string(),
        step_number: 3,
        question: "Talk it through with your colleague.".to_string(),
        scenario: String::new(),
        opening: opening.iter().map(|s| (*s).to_string()).collect(),
    };
    ExchangeState::new(settings, scope)
}

pub fn reaction(reply: &str, score: Option<f64>, complete: bool) -> ExchangeJudgment {
    ExchangeJudgment {
        reply: Some(reply.to_string()),
        score,
        rationale: score.map(|_| "stayed calm and specific".to_string()),
        complete,
    }
}

/// Observer that records every callback.
#[derive(Default)]
pub struct RecordingObserver {
    pub advances: Mutex<Vec<TurnPrompt>>,
    pub completions: Mutex<Vec<CompletionReport>>,
    pub errors: Mutex<Vec<ErrorKind>>,
}

impl RecordingObserver {
    pub fn advanced_steps(&self) -> Vec<u32> {
        self.advances.lock().unwrap().iter().map(|p| p.step_number).collect()
    }

    pub fn completion_count(&self) -> usize {
        self.completions.lock().unwrap().len()
    }

    pub fn errors(&self) -> Vec<ErrorKind> {
        self.errors.lock().unwrap().clone()
    }
}

impl AssessmentObserver for RecordingObserver {
    fn on_turn_advance(&self, next: &TurnPrompt) {
        self.advances.lock().unwrap().push(next.clone());
    }

    fn on_complete(&self, report: &CompletionReport) {
        self.completions.lock().unwrap().push(report.clone());
    }

    fn on_error(&self, kind: ErrorKind) {
        self.errors.lock().unwrap().push(kind);
    }
}

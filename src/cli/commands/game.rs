//! Game definition CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::output::{output, table, truncate, CommandOutput};
use crate::domain::models::{Config, GameDefinition, GameKind, TurnMode};

#[derive(Args, Debug)]
pub struct GameArgs {
    #[command(subcommand)]
    pub command: GameCommands,
}

#[derive(Subcommand, Debug)]
pub enum GameCommands {
    /// Parse and validate a game definition file
    Validate {
        /// Path to the YAML definition
        path: PathBuf,
    },
}

#[derive(Debug, Serialize)]
pub struct TurnSummary {
    pub step: u32,
    pub mode: &'static str,
    pub question: String,
    pub choices: usize,
    pub trait_name: Option<String>,
    pub generated: bool,
}

#[derive(Debug, Serialize)]
pub struct GameSummary {
    pub valid: bool,
    pub id: String,
    pub title: String,
    pub kind: GameKind,
    pub turns: Vec<TurnSummary>,
}

impl CommandOutput for GameSummary {
    fn to_human(&self) -> String {
        let kind = match self.kind {
            GameKind::PathClassification => "path classification",
            GameKind::TraitRubric => "trait rubric",
        };
        let mut t = table(["Step", "Mode", "Question", "Choices", "Trait", "Generated"]);
        for turn in &self.turns {
            t.add_row(vec![
                turn.step.to_string(),
                turn.mode.to_string(),
                truncate(&turn.question, 48),
                turn.choices.to_string(),
                turn.trait_name.clone().unwrap_or_else(|| "-".to_string()),
                if turn.generated { "yes" } else { "no" }.to_string(),
            ]);
        }
        format!(
            "{} ({}) is valid: {kind}, {} turn(s)\n{t}",
            self.title,
            self.id,
            self.turns.len()
        )
    }
}

/// Load a definition from disk and validate it against the configured path length.
pub fn load_game(path: &Path, config: &Config) -> Result<GameDefinition> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read game definition {}", path.display()))?;
    let game = GameDefinition::from_yaml_str(&contents, config.scoring.path_length)?;
    Ok(game)
}

fn summarize(game: GameDefinition) -> GameSummary {
    let turns = game
        .turns
        .iter()
        .zip(1u32..)
        .map(|(turn, step)| TurnSummary {
            step,
            mode: match turn.mode {
                TurnMode::Fixed => "fixed",
                TurnMode::FreeText => "free text",
                TurnMode::Reactive { .. } => "reactive",
            },
            question: turn.question.clone(),
            choices: turn.choices.as_ref().map_or(0, Vec::len),
            trait_name: turn.trait_name.map(|t| t.to_string()),
            generated: turn.generated,
        })
        .collect();

    GameSummary {
        valid: true,
        id: game.id,
        title: game.title,
        kind: game.kind,
        turns,
    }
}

pub fn execute(args: GameArgs, config: &Config, json_mode: bool) -> Result<()> {
    match args.command {
        GameCommands::Validate { path } => {
            let game = load_game(&path, config)?;
            output(&summarize(game), json_mode);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PATH_GAME: &str = r"
id: pitch
title: The Pitch
kind: path_classification
turns:
  - question: The client pushes back on price. What do you say?
  - question: Pick your next move
    mode: { type: fixed }
    choices: [Hold firm, Offer a discount]
  - question: Talk it through
    mode:
      type: reactive
      opening: [We need an answer today.]
";

    #[test]
    fn test_load_and_summarize() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PATH_GAME.as_bytes()).unwrap();

        let game = load_game(file.path(), &Config::default()).unwrap();
        let summary = summarize(game);

        assert_eq!(summary.id, "pitch");
        assert_eq!(summary.turns.len(), 3);
        assert_eq!(summary.turns[1].mode, "fixed");
        assert_eq!(summary.turns[1].choices, 2);
        assert_eq!(summary.turns[2].mode, "reactive");
        assert!(summary.to_human().contains("The Pitch (pitch) is valid"));
    }

    #[test]
    fn test_wrong_turn_count_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PATH_GAME.as_bytes()).unwrap();

        let mut config = Config::default();
        config.scoring.path_length = 4;
        config.scoring.bucket_upper_bounds = vec![5, 7, 10];
        assert!(load_game(file.path(), &config).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_game(Path::new("/nonexistent/game.yaml"), &Config::default()).unwrap_err();
        assert!(err.to_string().contains("Failed to read game definition"));
    }
}

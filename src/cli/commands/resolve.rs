//! Resolve CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{BucketTable, Config, IntentLabel, TraitScore, TraitScores};
use crate::services::{resolve_path, weight_sum, RubricResolver};

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(subcommand)]
    pub command: ResolveCommands,
}

#[derive(Subcommand, Debug)]
pub enum ResolveCommands {
    /// Resolve a path of intent labels into its archetype
    Path {
        /// Labels in turn order (defer, withdraw, accommodate, probe, negotiate, redirect, escalate, frame)
        #[arg(required = true)]
        labels: Vec<String>,
    },
    /// Resolve four trait scores (1-9) into a rubric archetype
    Rubric {
        #[arg(long)]
        organization: u8,
        #[arg(long)]
        perfectionism: u8,
        #[arg(long)]
        prudence: u8,
        #[arg(long)]
        diligence: u8,
    },
}

#[derive(Debug, Serialize)]
pub struct PathResolution {
    pub labels: Vec<IntentLabel>,
    pub weights: Vec<u32>,
    pub weight_sum: u32,
    pub archetype: String,
    pub description: String,
}

impl CommandOutput for PathResolution {
    fn to_human(&self) -> String {
        let steps: Vec<String> = self
            .labels
            .iter()
            .zip(&self.weights)
            .map(|(label, weight)| format!("{label}={weight}"))
            .collect();
        format!(
            "Path:      {}\nSum:       {}\nArchetype: {}\n           {}",
            steps.join(", "),
            self.weight_sum,
            self.archetype,
            self.description
        )
    }
}

#[derive(Debug, Serialize)]
pub struct RubricResolution {
    pub scores: TraitScores,
    pub aggregate: TraitScore,
    pub archetype: String,
    pub description: String,
}

impl CommandOutput for RubricResolution {
    fn to_human(&self) -> String {
        format!(
            "Scores:    organization={} perfectionism={} prudence={} diligence={}\nAggregate: {}\nArchetype: {}\n           {}",
            self.scores.organization,
            self.scores.perfectionism,
            self.scores.prudence,
            self.scores.diligence,
            self.aggregate,
            self.archetype,
            self.description
        )
    }
}

/// Resolve a label path against the configured bucket table.
pub fn resolve_labels(config: &Config, labels: &[String]) -> Result<PathResolution> {
    let labels = labels
        .iter()
        .map(|l| l.parse::<IntentLabel>())
        .collect::<Result<Vec<_>, _>>()?;

    let table = BucketTable::from_upper_bounds(
        config.scoring.path_length,
        &config.scoring.bucket_upper_bounds,
    )
    .context("Invalid bucket configuration")?;
    let archetype = resolve_path(&table, &labels)?;

    Ok(PathResolution {
        weights: labels.iter().map(|l| l.weight()).collect(),
        weight_sum: weight_sum(&labels),
        labels,
        archetype: archetype.name,
        description: archetype.description,
    })
}

/// Resolve four raw scores.
pub fn resolve_scores(organization: u8, perfectionism: u8, prudence: u8, diligence: u8) -> Result<RubricResolution> {
    let scores = TraitScores {
        organization: TraitScore::new(organization).context("organization")?,
        perfectionism: TraitScore::new(perfectionism).context("perfectionism")?,
        prudence: TraitScore::new(prudence).context("prudence")?,
        diligence: TraitScore::new(diligence).context("diligence")?,
    };
    let archetype = RubricResolver::resolve(&scores);

    Ok(RubricResolution {
        aggregate: RubricResolver::aggregate(&scores),
        scores,
        archetype: archetype.name,
        description: archetype.description,
    })
}

pub fn execute(args: ResolveArgs, config: &Config, json_mode: bool) -> Result<()> {
    match args.command {
        ResolveCommands::Path { labels } => {
            output(&resolve_labels(config, &labels)?, json_mode);
        }
        ResolveCommands::Rubric {
            organization,
            perfectionism,
            prudence,
            diligence,
        } => {
            output(
                &resolve_scores(organization, perfectionism, prudence, diligence)?,
                json_mode,
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(labels: &[&str]) -> Vec<String> {
        labels.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_resolve_labels_uses_config_table() {
        let config = Config::default();
        let result = resolve_labels(&config, &strings(&["negotiate", "negotiate", "frame"])).unwrap();
        assert_eq!(result.weights, vec![2, 2, 3]);
        assert_eq!(result.weight_sum, 7);
        assert_eq!(result.archetype, "The Strategist");
    }

    #[test]
    fn test_resolve_labels_rejects_unknown_and_wrong_length() {
        let config = Config::default();
        assert!(resolve_labels(&config, &strings(&["probe", "shout", "frame"])).is_err());
        assert!(resolve_labels(&config, &strings(&["probe", "frame"])).is_err());
    }

    #[test]
    fn test_resolve_scores() {
        let result = resolve_scores(6, 6, 7, 6).unwrap();
        assert_eq!(result.aggregate.value(), 6);
        assert_eq!(result.archetype, "The Dependable");
        assert!(resolve_scores(0, 5, 5, 5).is_err());
    }
}

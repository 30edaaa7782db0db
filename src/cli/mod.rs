//! Command-line interface
//!
//! Operator and inspection commands. The library API stays the
//! authoritative interface; these commands wrap it for scripting and
//! troubleshooting.

pub mod commands;
pub mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::path::{Path, PathBuf};

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

pub use commands::{ConfigArgs, GameArgs, ResolveArgs, SessionArgs};
pub use output::{output, CommandOutput};

#[derive(Parser, Debug)]
#[command(name = "turnwise")]
#[command(about = "Turnwise - assessment turn engine and archetype resolvers", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .turnwise/config.yaml)
    #[arg(short, long, global = true, env = "TURNWISE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve archetypes from labels or scores
    Resolve(ResolveArgs),

    /// Game definition commands
    Game(GameArgs),

    /// Session snapshot commands
    Session(SessionArgs),

    /// Configuration commands
    Config(ConfigArgs),
}

/// Load configuration from an explicit file, or from the default hierarchy.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Print an error the way the selected output mode expects and exit non-zero.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": chain,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err}", style("Error:").red().bold());
        for cause in err.chain().skip(1) {
            eprintln!("  {} {cause}", style("caused by:").dim());
        }
    }
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "turnwise", "resolve", "path", "probe", "frame", "defer", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Resolve(_)));
    }
}

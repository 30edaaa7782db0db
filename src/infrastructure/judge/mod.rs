//! Judgment capability adapters
//!
//! - `AnthropicJudge`: Anthropic Messages API over HTTP
//! - `ScriptedJudge`: deterministic scripts for tests and offline runs
//! - `cleaning`: raw model output to typed values

pub mod anthropic;
pub mod cleaning;
pub mod scripted;

use std::sync::Arc;

use crate::domain::models::{JudgeConfig, JudgeProvider};
use crate::domain::ports::JudgmentCapability;

pub use anthropic::{AnthropicJudge, AnthropicJudgeConfig};
pub use scripted::ScriptedJudge;

/// Build the configured judgment capability.
///
/// # Errors
/// Returns an error if the HTTP adapter is selected without an API key
pub fn build_judge(config: &JudgeConfig) -> anyhow::Result<Arc<dyn JudgmentCapability>> {
    match config.provider {
        JudgeProvider::Anthropic => {
            let judge = AnthropicJudge::new(AnthropicJudgeConfig::from_config(config)?)?;
            Ok(Arc::new(judge))
        }
        JudgeProvider::Scripted => Ok(Arc::new(ScriptedJudge::new())),
    }
}

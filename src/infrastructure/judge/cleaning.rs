//! Cleaning of raw model output
//!
//! Models wrap JSON in markdown fences, add prose around it, or answer with a
//! bare word. Everything that turns raw text into typed judgment values lives
//! here so the services only ever see parsed values or `JudgmentError`.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::errors::JudgmentError;
use crate::domain::models::IntentLabel;
use crate::domain::ports::{ExchangeJudgment, GeneratedTurn};

const PREVIEW_CHARS: usize = 120;

/// Strip a surrounding markdown code block
///
/// Handles formats like:
/// - ```json\n{...}\n```
/// - ```\n{...}\n```
pub fn strip_code_fences(output: &str) -> &str {
    let trimmed = output.trim();
    if !(trimmed.starts_with("```") && trimmed.ends_with("```") && trimmed.len() >= 6) {
        return trimmed;
    }

    let start = trimmed.find('\n').map_or(3, |pos| pos + 1);
    let end = trimmed.rfind("```").unwrap_or(trimmed.len());
    if end <= start {
        return "";
    }
    trimmed[start..end].trim()
}

/// Extract the outermost JSON object from text that may have prose around it
pub fn extract_json_object(output: &str) -> Option<&str> {
    let cleaned = strip_code_fences(output);
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    (end > start).then(|| &cleaned[start..=end])
}

fn preview(output: &str) -> String {
    output.chars().take(PREVIEW_CHARS).collect()
}

fn parse_object<T: DeserializeOwned>(output: &str, what: &str) -> Result<T, JudgmentError> {
    let json = extract_json_object(output)
        .ok_or_else(|| JudgmentError::Unparseable(format!("no JSON {what} in: {}", preview(output))))?;
    serde_json::from_str(json)
        .map_err(|e| JudgmentError::Unparseable(format!("malformed {what}: {e}")))
}

#[derive(Deserialize)]
struct LabelReply {
    label: String,
}

/// Parse an intent label from `{"label": "..."}` or a bare label word
pub fn parse_label(output: &str) -> Result<IntentLabel, JudgmentError> {
    let raw = match extract_json_object(output) {
        Some(json) => serde_json::from_str::<LabelReply>(json)
            .map_err(|e| JudgmentError::Unparseable(format!("malformed label: {e}")))?
            .label,
        None => strip_code_fences(output)
            .trim_matches(|c: char| !c.is_ascii_alphabetic())
            .to_string(),
    };

    raw.parse::<IntentLabel>()
        .map_err(|e| JudgmentError::Unparseable(e.to_string()))
}

#[derive(Deserialize)]
struct ScoreReply {
    score: f64,
}

/// Parse a raw score from `{"score": n}` or a bare number
///
/// The value is returned unvalidated; range checks belong to the caller.
pub fn parse_score(output: &str) -> Result<f64, JudgmentError> {
    let score = match extract_json_object(output) {
        Some(json) => {
            serde_json::from_str::<ScoreReply>(json)
                .map_err(|e| JudgmentError::Unparseable(format!("malformed score: {e}")))?
                .score
        }
        None => strip_code_fences(output)
            .parse::<f64>()
            .map_err(|_| JudgmentError::Unparseable(format!("not a score: {}", preview(output))))?,
    };

    if score.is_finite() {
        Ok(score)
    } else {
        Err(JudgmentError::Unparseable(format!("non-finite score {score}")))
    }
}

/// Parse a generated turn and check its shape
pub fn parse_generated(output: &str) -> Result<GeneratedTurn, JudgmentError> {
    let turn: GeneratedTurn = parse_object(output, "turn")?;
    turn.validate()?;
    Ok(turn)
}

/// Parse a counterpart reaction
///
/// Blank replies are dropped; the score stays raw.
pub fn parse_reaction(output: &str) -> Result<ExchangeJudgment, JudgmentError> {
    let mut judgment: ExchangeJudgment = parse_object(output, "reaction")?;
    if judgment
        .reply
        .as_deref()
        .is_some_and(|reply| reply.trim().is_empty())
    {
        judgment.reply = None;
    }
    Ok(judgment)
}

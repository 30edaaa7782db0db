//! Anthropic Messages API judgment adapter.
//!
//! Makes direct HTTP calls to `{base_url}/v1/messages`. Every reply is
//! passed through [`super::cleaning`] before it reaches the services.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::cleaning;
use crate::domain::errors::JudgmentError;
use crate::domain::models::{IntentLabel, JudgeConfig, Sender, TraitName};
use crate::domain::ports::{
    ExchangeContext, ExchangeJudgment, GeneratedTurn, GenerationContext, JudgmentCapability,
    ScenarioContext,
};

/// API version header value.
pub const API_VERSION: &str = "2023-06-01";

const CLASSIFY_SYSTEM: &str = "You classify one response from a workplace scenario assessment. \
Answer with JSON only: {\"label\": L} where L is one of: \
defer, withdraw, accommodate, probe, negotiate, redirect, escalate, frame.";

const SCORE_SYSTEM: &str = "You score one response from a workplace scenario assessment on a \
single trait, from 1 (very low) to 9 (very high). Answer with JSON only: {\"score\": N}.";

const GENERATE_SYSTEM: &str = "You write the next turn of a workplace scenario assessment, \
continuing from the previous answers. Answer with JSON only: \
{\"text\": narrative, \"question\": question, \"choices\": null or 2 to 6 short options}.";

const RESPOND_SYSTEM: &str = "You play the counterpart in a short workplace conversation that \
assesses the participant. Answer with JSON only: {\"reply\": your next message or null, \
\"complete\": true when the conversation has run its course, \"score\": 1 to 9 when complete, \
\"rationale\": one sentence when complete}. When closing is true you must complete.";

/// Configuration for the Anthropic judgment adapter.
#[derive(Debug, Clone)]
pub struct AnthropicJudgeConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    /// Client-level request timeout
    pub timeout: Duration,
}

impl AnthropicJudgeConfig {
    /// Resolve from configuration, falling back to `ANTHROPIC_API_KEY`.
    ///
    /// # Errors
    /// Returns an error if no API key is configured
    pub fn from_config(config: &JudgeConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("No API key: set judge.api_key or ANTHROPIC_API_KEY"))?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Judgment capability backed by the Anthropic Messages API.
pub struct AnthropicJudge {
    client: Client,
    config: AnthropicJudgeConfig,
}

impl AnthropicJudge {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: AnthropicJudgeConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn timeout_ms(&self) -> u64 {
        self.config.timeout.as_millis() as u64
    }

    /// Send one single-message request and return the joined text blocks.
    #[instrument(skip(self, system, user), fields(model = %self.config.model), err)]
    async fn complete(&self, system: &str, user: String) -> Result<String, JudgmentError> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages: vec![Message {
                role: "user",
                content: user,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(JudgmentError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let text = result
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(JudgmentError::Unparseable("empty reply".to_string()));
        }
        debug!(reply_len = text.len(), "judge replied");
        Ok(text)
    }

    fn transport_error(&self, err: &reqwest::Error) -> JudgmentError {
        if err.is_timeout() {
            JudgmentError::Timeout(self.timeout_ms())
        } else if err.is_decode() {
            JudgmentError::Unparseable(err.to_string())
        } else {
            JudgmentError::Transport(err.to_string())
        }
    }
}

fn scenario_prompt(text: &str, context: &ScenarioContext) -> String {
    let mut prompt = format!(
        "Scenario: {}\nQuestion {}: {}\n",
        context.scenario, context.step_number, context.question
    );
    if let Some(choices) = &context.choices {
        prompt.push_str(&format!("Options offered: {}\n", choices.join(" | ")));
    }
    prompt.push_str(&format!("Response: {text}"));
    prompt
}

fn generation_prompt(context: &GenerationContext) -> String {
    let mut prompt = format!(
        "Scenario: {}\nThis is turn {} of {}. Base question: {}\n",
        context.scenario, context.step_number, context.total_turns, context.seed_question
    );
    for (question, response) in &context.previous {
        prompt.push_str(&format!("Q: {question}\nA: {response}\n"));
    }
    prompt
}

fn exchange_prompt(context: &ExchangeContext) -> String {
    let mut prompt = format!(
        "Scenario: {}\nSituation: {}\nParticipant messages so far: {}\nclosing: {}\nConversation:\n",
        context.scenario, context.question, context.sent_count, context.closing
    );
    for message in &context.history {
        let who = match message.sender {
            Sender::Participant => "Participant",
            Sender::Counterpart => "You",
        };
        prompt.push_str(&format!("{who}: {}\n", message.text));
    }
    prompt
}

#[async_trait]
impl JudgmentCapability for AnthropicJudge {
    async fn classify(&self, text: &str, context: &ScenarioContext) -> Result<IntentLabel, JudgmentError> {
        let reply = self.complete(CLASSIFY_SYSTEM, scenario_prompt(text, context)).await?;
        cleaning::parse_label(&reply)
    }

    async fn score(
        &self,
        trait_name: TraitName,
        text: &str,
        rubric: &ScenarioContext,
    ) -> Result<f64, JudgmentError> {
        let user = format!("Trait: {trait_name}\n{}", scenario_prompt(text, rubric));
        let reply = self.complete(SCORE_SYSTEM, user).await?;
        cleaning::parse_score(&reply)
    }

    async fn generate_turn(&self, context: &GenerationContext) -> Result<GeneratedTurn, JudgmentError> {
        let reply = self.complete(GENERATE_SYSTEM, generation_prompt(context)).await?;
        cleaning::parse_generated(&reply)
    }

    async fn respond(&self, context: &ExchangeContext) -> Result<ExchangeJudgment, JudgmentError> {
        let reply = self.complete(RESPOND_SYSTEM, exchange_prompt(context)).await?;
        cleaning::parse_reaction(&reply)
    }
}

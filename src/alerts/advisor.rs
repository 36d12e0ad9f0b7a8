//! Predictive advisory model
//!
//! The engine hands the advisor a prompt built from recent readings and gets
//! free text back. [`ChatCompletionsAdvisor`] speaks the OpenAI-compatible
//! `/chat/completions` protocol.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::AdvisoryError;
use crate::config::AdvisorConfig;

#[async_trait]
pub trait PredictiveAdvisor: Send + Sync {
    /// Ask `prompt` with `context` as the standing instruction
    async fn ask(&self, prompt: &str, context: &str) -> Result<String, AdvisoryError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatCompletionsAdvisor {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ChatCompletionsAdvisor {
    pub fn new(config: &AdvisorConfig) -> Result<Self, AdvisoryError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or(AdvisoryError::NotConfigured("missing advisor API key"))?;

        // the engine applies its own, shorter deadline on top of this
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl PredictiveAdvisor for ChatCompletionsAdvisor {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn ask(&self, prompt: &str, context: &str) -> Result<String, AdvisoryError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: context,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: 0.3,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdvisoryError::Status(response.status().as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AdvisoryError::InvalidResponse(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AdvisoryError::InvalidResponse("no choices in response".to_string()))?;

        debug!("advisor answered with {} characters", content.len());
        Ok(content)
    }
}

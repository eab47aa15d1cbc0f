//! Anthropic Messages API client. One non-streaming request per prompt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::LlmClient;
use crate::config::Config;
use crate::error::AnalysisError;
use crate::protocol::Prompt;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct AnthropicClient {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    http_client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        max_tokens: u32,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Self> {
        if api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("Anthropic API key must not be empty"));
        }
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        info!("Anthropic client initialized for model {} at {}", model, base_url);
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens,
            http_client,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(
            config.anthropic_api_key.clone(),
            config.anthropic_base_url.clone(),
            config.anthropic_model.clone(),
            config.max_tokens,
            std::time::Duration::from_secs(config.upstream_timeout_seconds),
        )
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, AnalysisError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: &prompt.system,
            messages: prompt
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: prompt.temperature,
        };
        debug!(
            "Sending {} turns to {} (temperature {})",
            request.messages.len(),
            self.model,
            prompt.temperature
        );

        let response = self
            .http_client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisError::upstream(format!("Anthropic request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|env| env.error.message)
                .unwrap_or(body);
            warn!("Anthropic API returned {}: {}", status, message);
            return Err(AnalysisError::upstream(format!(
                "Anthropic API returned {}: {}",
                status, message
            )));
        }

        let completion: MessagesResponse = response.json().await.map_err(|e| {
            AnalysisError::upstream(format!("Failed to parse Anthropic response: {}", e))
        })?;

        let text: String = completion
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        debug!("Received {} chars from Anthropic", text.len());
        Ok(text)
    }
}

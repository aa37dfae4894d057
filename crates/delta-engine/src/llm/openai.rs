//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use delta_types::ToolCall;

use super::{EnvResolver, LlmAdapter, LlmResponse, LlmUsage};
use crate::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Blocking HTTP adapter; one client per run
pub struct OpenAiAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|err| Error::Llm(format!("failed to build HTTP client: {}", err)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Resolve credentials through the `.env` chain.
    pub fn from_env(resolver: &EnvResolver) -> Result<Self> {
        let api_key = resolver.api_key().ok_or_else(|| {
            Error::Llm(
                "no API key found: set DELTA_API_KEY (or OPENAI_API_KEY) in the environment \
                 or a .env file"
                    .to_string(),
            )
        })?;
        let base_url = resolver
            .base_url()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, api_key)
    }
}

impl LlmAdapter for OpenAiAdapter {
    fn invoke(&self, request: &Value) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .map_err(|err| Error::Llm(format!("request to {} failed: {}", url, err)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| Error::Llm(format!("failed to read response body: {}", err)))?;
        if !status.is_success() {
            return Err(Error::Llm(format!(
                "{} returned {}: {}",
                url,
                status,
                body.chars().take(2000).collect::<String>()
            )));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|err| Error::Llm(format!("malformed completion response: {}", err)))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Llm("completion response has no choices".to_string()))?;

        Ok(LlmResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            model: parsed.model,
            usage: parsed
                .usage
                .map(|u| LlmUsage {
                    prompt_tokens: u.prompt_tokens,
                    completion_tokens: u.completion_tokens,
                })
                .unwrap_or_default(),
        })
    }
}

// --- wire schema ---

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

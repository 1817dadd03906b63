//! Oracle abstraction for patch negotiation.
//!
//! The [`Oracle`] trait decouples negotiation from the model backend
//! (currently an OpenAI-compatible `/chat/completions` endpoint). Tests use a
//! scripted oracle that replays canned replies and records every prompt.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::io::config::OracleConfig;
use crate::io::http;

/// Abstraction over text-completion backends.
pub trait Oracle {
    /// Return the raw completion text for one system/user prompt pair.
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Oracle backed by an OpenAI-compatible chat completion API.
pub struct OpenAiOracle {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiOracle {
    pub fn new(config: &OracleConfig, api_key: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(anyhow!("oracle API key is empty"));
        }
        Ok(Self {
            client: http::client(timeout, HeaderMap::new())?,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
        })
    }
}

impl Oracle for OpenAiOracle {
    #[instrument(skip_all, fields(model = %self.model))]
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        info!(prompt_bytes = system_prompt.len() + user_prompt.len(), "calling oracle");
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: 0.0,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("send oracle request")?;
        let response = http::ensure_success(response, "oracle completion")?;
        let body: ChatCompletionResponse = response.json().context("parse oracle response")?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(anyhow!("oracle returned an empty completion"));
        }
        debug!(reply_bytes = content.len(), "oracle replied");
        Ok(content)
    }
}

//! HTTP completion providers.
//!
//! - **[`DisabledCompleter`]**: every call fails with [`ProviderError::Disabled`];
//!   extraction then yields nothing and report parsing uses its fallback.
//! - **[`OpenAICompleter`]**: any OpenAI-compatible `/chat/completions`
//!   endpoint (OpenAI, DashScope compatible mode, DeepSeek, ...).

use anyhow::{bail, Result};
use async_trait::async_trait;
use project_resolver_core::{CompletionProvider, ProviderError};

use crate::config::CompletionConfig;
use crate::embedding::{http_client, send_with_retry};

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";

pub struct DisabledCompleter;

#[async_trait]
impl CompletionProvider for DisabledCompleter {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Disabled)
    }
}

/// Chat-completion provider for OpenAI-compatible APIs.
///
/// Sends the system prompt (when non-empty) and the user prompt as a
/// two-message conversation and returns the first choice's content.
pub struct OpenAICompleter {
    model: String,
    endpoint: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAICompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for OpenAI provider"))?;
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!("{} environment variable not set", config.api_key_env)
        })?;
        let url = config.url.as_deref().unwrap_or(OPENAI_DEFAULT_URL);

        Ok(Self {
            model,
            endpoint: format!("{}/chat/completions", url.trim_end_matches('/')),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }

    fn request_body(&self, prompt: &str, system: &str) -> serde_json::Value {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));
        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, system: &str) -> Result<String, ProviderError> {
        let body = self.request_body(prompt, system);
        let json = send_with_retry("Chat", self.max_retries, || {
            self.client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String, ProviderError> {
    let content = json
        .pointer("/choices/0/message/content")
        .ok_or_else(|| ProviderError::Malformed("missing choices[0].message.content".into()))?;
    match content.as_str() {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(ProviderError::Empty),
    }
}

/// Create the configured [`CompletionProvider`].
pub fn create_completion_provider(
    config: &CompletionConfig,
) -> Result<Box<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledCompleter)),
        "openai" => Ok(Box::new(OpenAICompleter::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}

//! Text completion provider trait and response cleanup.

use async_trait::async_trait;

use crate::error::ProviderError;

/// Trait for text completion (chat) providers.
///
/// An empty completion is reported as [`ProviderError::Empty`] so callers
/// only ever match on `Ok` with real text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"qwen-turbo"`).
    fn model_name(&self) -> &str;

    /// Complete `prompt` under the given system prompt.
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, ProviderError>;
}

/// Strip a surrounding Markdown code fence (optionally tagged `json`).
///
/// Models often wrap JSON answers in fences even when told not to.
pub fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let inner = trimmed.split("```").nth(1).unwrap_or("");
    inner.strip_prefix("json").unwrap_or(inner).trim()
}

/// Parse a completion as JSON of type `T`, after fence stripping.
pub fn parse_json<T: serde::de::DeserializeOwned>(response: &str) -> Result<T, ProviderError> {
    serde_json::from_str(strip_code_fence(response))
        .map_err(|e| ProviderError::Malformed(e.to_string()))
}

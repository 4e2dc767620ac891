//! Completion provider client
//!
//! Direct HTTP client for an OpenRouter-style chat completion API.
//! The relay service depends on the [`CompletionProvider`] trait so tests can
//! substitute a scripted double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// One dialogue turn forwarded upstream
///
/// Deliberately carries only `role` and `content`: ids, timestamps, and model
/// annotations never leave the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    /// "system", "user", or "assistant"
    pub role: String,
    /// Turn text
    pub content: String,
}

impl ChatTurn {
    /// Build a turn from a role string and content
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Request payload sent to the completion API
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Completion model identifier
    pub model: String,
    /// Ordered dialogue, system prompt first then oldest-to-newest history
    pub messages: Vec<ChatTurn>,
    /// Sampling temperature
    pub temperature: f32,
    /// Reply length cap in tokens
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionChoiceMessage {
    content: String,
}

/// Stateless text-completion API selected by a model identifier
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send one completion request and return the assistant's reply text
    ///
    /// # Errors
    /// * `AppError::Upstream` if the provider returns a non-success status or
    ///   a payload without a usable choice/content.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AppError>;
}

/// HTTP client for an OpenRouter-compatible completion endpoint
pub struct OpenRouterClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenRouterClient {
    /// Create a client for the given API base URL and key
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(
            url = %url,
            model = %request.model,
            turns = request.messages.len(),
            "Calling completion API"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Title", "ChatBot AI")
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());

            tracing::error!(
                status_code = status.as_u16(),
                error_body = %error_body,
                "Completion API returned error status"
            );

            return Err(AppError::Upstream(format!(
                "Completion API returned status {}: {}",
                status.as_u16(),
                error_body
            )));
        }

        let response_body = response
            .text()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to read response body: {}", e)))?;

        let parsed: CompletionResponse = serde_json::from_str(&response_body).map_err(|e| {
            AppError::Upstream(format!(
                "Failed to parse completion response: {} - Response body: {}",
                e, response_body
            ))
        })?;

        let choice = parsed
            .choices
            .first()
            .ok_or_else(|| AppError::Upstream("Completion response contains no choices".into()))?;

        let text = &choice.message.content;
        if text.is_empty() {
            return Err(AppError::Upstream("Completion response text is empty".into()));
        }

        tracing::debug!(
            response_len = text.len(),
            "Successfully received completion"
        );

        Ok(text.clone())
    }
}

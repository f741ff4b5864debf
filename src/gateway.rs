//! Completion-API gateway.
//!
//! Defines the [`CompletionGateway`] trait and [`ChatCompletionsGateway`],
//! a client for OpenAI-compatible `POST /chat/completions` endpoints (Groq
//! by default).
//!
//! Callers normally go through [`complete_or_fallback`], which never fails:
//!
//! | Gateway outcome | Returned text |
//! |-----------------|---------------|
//! | reply with content | the content |
//! | reply without a first choice | [`NO_RESPONSE_TEXT`] |
//! | credential not configured | [`NOT_CONFIGURED_TEXT`] |
//! | network error, non-2xx, undecodable body | [`UNAVAILABLE_TEXT`] |
//!
//! There is no retry; timeouts are whatever the shared `reqwest::Client`
//! was built with.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::config::GatewayConfig;

pub const NOT_CONFIGURED_TEXT: &str = "Mock analysis result - Groq API key not configured";
pub const UNAVAILABLE_TEXT: &str = "Analysis temporarily unavailable - please try again later";
pub const NO_RESPONSE_TEXT: &str = "No response generated";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("completion API key not configured")]
    NotConfigured,
    #[error("completion API request failed: {0}")]
    Unavailable(String),
    #[error("completion API error: {0}")]
    Status(u16),
    #[error("invalid completion API response: {0}")]
    Decode(String),
}

/// A chat-completion backend taking one system instruction and one user
/// prompt and returning free-form text.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GatewayError>;
}

/// Runs `gateway.complete` and converts every failure into its fixed
/// human-readable substitute.
pub async fn complete_or_fallback(
    gateway: &dyn CompletionGateway,
    system: &str,
    prompt: &str,
) -> String {
    match gateway.complete(system, prompt).await {
        Ok(text) => text,
        Err(GatewayError::NotConfigured) => NOT_CONFIGURED_TEXT.to_string(),
        Err(e) => {
            warn!(error = %e, "completion API call failed");
            UNAVAILABLE_TEXT.to_string()
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

/// Client for an OpenAI-compatible chat completions API.
pub struct ChatCompletionsGateway {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_key: Option<String>,
}

impl ChatCompletionsGateway {
    pub fn new(client: reqwest::Client, config: &GatewayConfig, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
        }
    }

    /// Builds a gateway whose credential is read from `config.api_key_env`.
    pub fn from_config(client: reqwest::Client, config: &GatewayConfig) -> Self {
        Self::new(client, config, config.api_key())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl CompletionGateway for ChatCompletionsGateway {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GatewayError> {
        let api_key = self.api_key.as_ref().ok_or(GatewayError::NotConfigured)?;

        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        parse_chat_response(&json)
    }
}

/// Pulls the first choice's message content out of a chat response.
///
/// A missing `choices` array is malformed; an empty array or empty content
/// is a valid reply with nothing in it.
fn parse_chat_response(json: &serde_json::Value) -> Result<String, GatewayError> {
    let choices = json
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| GatewayError::Decode("missing choices array".to_string()))?;

    let content = choices
        .first()
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .filter(|c| !c.is_empty());

    Ok(content.unwrap_or(NO_RESPONSE_TEXT).to_string())
}

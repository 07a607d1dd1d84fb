pub mod anthropic;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use reqwest::{ Client as HttpClient, Response, StatusCode };
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use super::{ LlmConfig, LlmType };
use self::anthropic::AnthropicChatClient;
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use crate::models::chat::FailureKind;

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

/// Failures of the completion service, grouped by what a caller can do about them.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Service unreachable, timed out, answered 5xx or sent an unreadable body.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request itself was rejected, e.g. an empty prompt.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Credentials, quota or model problems.
    #[error("provider refused request: {0}")]
    Capability(String),
}

impl CompletionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CompletionError::Transport(_) => FailureKind::Transport,
            CompletionError::Validation(_) => FailureKind::Validation,
            CompletionError::Capability(_) => FailureKind::Capability,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CompletionError::Transport(_))
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CompletionError::Transport(format!("malformed response: {}", err))
        } else {
            CompletionError::Transport(err.to_string())
        }
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<CompletionResponse, CompletionError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
    fn get_llm_type(&self) -> LlmType;
}

pub fn validate_prompt(prompt: &str) -> Result<(), CompletionError> {
    if prompt.trim().is_empty() {
        return Err(CompletionError::Validation("prompt must not be empty".to_string()));
    }
    Ok(())
}

pub fn classify_status(status: StatusCode, body: &str) -> CompletionError {
    let detail = if body.trim().is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body.trim())
    };
    match status.as_u16() {
        400 | 413 | 422 => CompletionError::Validation(detail),
        401 | 402 | 403 | 404 | 429 => CompletionError::Capability(detail),
        _ => CompletionError::Transport(detail),
    }
}

pub(crate) async fn ensure_success(resp: Response) -> Result<Response, CompletionError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(classify_status(status, &body))
}

pub(crate) fn build_http_client(
    config: &LlmConfig,
    headers: reqwest::header::HeaderMap
) -> Result<HttpClient, CompletionError> {
    HttpClient::builder()
        .default_headers(headers)
        .timeout(config.timeout)
        .build()
        .map_err(|e| CompletionError::Transport(format!("failed to build HTTP client: {}", e)))
}

pub(crate) fn endpoint(base_url: &str, route: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), route)
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, CompletionError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Anthropic => Arc::new(AnthropicChatClient::from_config(config)?),
        LlmType::OpenAI => Arc::new(OpenAIChatClient::from_config(config)?),
        LlmType::Ollama => Arc::new(OllamaClient::from_config(config)?),
    };
    Ok(client)
}

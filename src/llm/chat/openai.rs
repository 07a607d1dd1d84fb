use async_trait::async_trait;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ build_http_client, endpoint, ensure_success, ChatClient, CompletionError, CompletionResponse };
use crate::llm::{ LlmConfig, LlmType };

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: Option<String>,
}

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

impl OpenAIChatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        if config.llm_type != LlmType::OpenAI {
            return Err(CompletionError::Validation("Invalid config type for OpenAIChatClient".into()));
        }
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CompletionError::Capability("OpenAI API key is required".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
                CompletionError::Validation(format!("Invalid API key format: {}", e))
            )?
        );

        // Older configs carried the full completions URL as the base.
        let base_url = config.base_url
            .clone()
            .map(|url| url.trim_end_matches("/v1/chat/completions").to_string())
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        Ok(Self {
            http: build_http_client(config, headers)?,
            model: config.completion_model.clone().unwrap_or_else(|| "gpt-4o".to_string()),
            base_url,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(&self, prompt: &str) -> Result<CompletionResponse, CompletionError> {
        let url = endpoint(&self.base_url, "/v1/chat/completions");
        let req = OpenAIChatRequest {
            model: self.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            max_tokens: self.max_tokens,
        };

        let resp = self.http.post(&url).json(&req).send().await?;
        let body = ensure_success(resp).await?.json::<OpenAIResponse>().await?;

        let content = body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::Capability("No response from OpenAI API".into()))?;

        Ok(CompletionResponse { response: content })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }

    fn get_llm_type(&self) -> LlmType {
        LlmType::OpenAI
    }
}

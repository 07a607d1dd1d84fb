use async_trait::async_trait;
use reqwest::{ Client as HttpClient, header::HeaderMap };
use serde::{ Deserialize, Serialize };

use super::{ build_http_client, endpoint, ensure_success, ChatClient, CompletionError, CompletionResponse };
use crate::llm::{ LlmConfig, LlmType };

pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: u32,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        if config.llm_type != LlmType::Ollama {
            return Err(CompletionError::Validation("Invalid config type for OllamaClient".into()));
        }

        Ok(Self {
            http: build_http_client(config, HeaderMap::new())?,
            base_url: config.base_url.clone().unwrap_or_else(|| "http://localhost:11434".into()),
            completion_model: config.completion_model.clone().unwrap_or_else(|| "llama3".to_string()),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<CompletionResponse, CompletionError> {
        let url = endpoint(&self.base_url, "/api/generate");
        let req = GenerateRequest {
            model: self.completion_model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: GenerateOptions { num_predict: self.max_tokens },
        };
        let resp = self.http.post(&url).json(&req).send().await?;
        let data = ensure_success(resp).await?.json::<GenerateResponse>().await?;
        Ok(CompletionResponse { response: data.response })
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }

    fn get_llm_type(&self) -> LlmType {
        LlmType::Ollama
    }
}

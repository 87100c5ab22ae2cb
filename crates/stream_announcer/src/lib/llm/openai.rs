use reqwest::Client;
use serde::Deserialize;

use crate::llm::{Generator, Prompt};

/// Client for any OpenAI compatible `/chat/completions` endpoint
/// (OpenAI, Ollama, LM Studio, vLLM).
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum OpenAIError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("No content in completion response")]
    EmptyResponse,
}

impl OpenAIClient {
    pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: Self::DEFAULT_MODEL.into(),
            base_url: Self::DEFAULT_BASE_URL.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Reasoning models spend tokens on their trace; leave this unset or
    /// generous for them.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub async fn send_completion_request(
        &self,
        prompt: &Prompt,
    ) -> Result<CompletionResponse, OpenAIError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {
                    "role": "system",
                    "content": prompt.system
                },
                {
                    "role": "user",
                    "content": prompt.user
                }
            ]
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let resp = request
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(OpenAIError::Api { status, message });
        }

        Ok(resp.json::<CompletionResponse>().await?)
    }
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub id: Option<String>,
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: CompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionMessage {
    pub role: String,
    pub content: Option<String>,
    /// Trace emitted by reasoning models served through DeepSeek style APIs.
    #[serde(default, alias = "reasoning")]
    pub reasoning_content: Option<String>,
}

impl CompletionResponse {
    /// The answer text of the first choice. Falls back to the reasoning
    /// trace when a reasoning model produced no separate answer, leaving it
    /// to the trace extractor to recover the post.
    pub fn into_text(self) -> Option<String> {
        let message = self.choices.into_iter().next()?.message;
        message
            .content
            .filter(|c| !c.trim().is_empty())
            .or(message.reasoning_content)
            .filter(|c| !c.trim().is_empty())
    }
}

impl Generator for OpenAIClient {
    type Error = OpenAIError;

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, Self::Error> {
        let response = self
            .send_completion_request(prompt)
            .await
            .inspect_err(|e| tracing::error!(error = %e, model = %self.model, "Failed to generate announcement"))?;

        response.into_text().ok_or(OpenAIError::EmptyResponse)
    }
}

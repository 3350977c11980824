use std::time::Duration;

use rand::Rng;

use crate::error::GenerationError;
use crate::providers::{Provider, ResolvedProvider};

/// Sampling settings sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 150,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// A hosted model that turns a prompt into text.
#[async_trait::async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<String, GenerationError>;
}

/// Exponential backoff for transient generation failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based): base * 2^attempt, capped,
    /// plus up to half a base delay of jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter_ms = (self.base_delay.as_millis() / 2) as u64;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        exp + Duration::from_millis(jitter)
    }
}

const SYSTEM_ASSISTANT: &str = "You are a helpful assistant answering questions about a website from supplied context.";

/// Longest error body echoed back to the user.
const MAX_ERROR_BODY: usize = 500;

/// Multi-provider generation client
pub struct LlmClient {
    provider: Provider,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl LlmClient {
    pub fn new(resolved: &ResolvedProvider) -> Self {
        Self {
            provider: resolved.provider,
            endpoint: resolved.endpoint.clone(),
            model: resolved.model.clone(),
            api_key: resolved.api_key.clone(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate_once(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<String, GenerationError> {
        match self.provider {
            Provider::HuggingFace => self.generate_huggingface(prompt, params).await,
            Provider::OpenAI => self.chat_openai_compat(&self.endpoint, prompt, params).await,
            Provider::Ollama => {
                let base = format!("{}/v1", self.endpoint);
                self.chat_openai_compat(&base, prompt, params).await
            }
        }
    }

    /// Hugging Face text-generation inference API
    async fn generate_huggingface(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<String, GenerationError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingApiKey(self.provider.env_var_name()))?;

        let url = format!("{}/models/{}", self.endpoint, self.model);
        let body = serde_json::json!({
            "inputs": prompt,
            "parameters": {
                "max_new_tokens": params.max_new_tokens,
                "temperature": params.temperature,
                "top_p": params.top_p,
            },
        });

        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", key))
            .json(&body);
        let json = send_json(request).await?;
        parse_hf_generation(&json)
    }

    /// OpenAI-compatible chat completions (OpenAI, Ollama, etc.)
    async fn chat_openai_compat(
        &self,
        base: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<String, GenerationError> {
        if self.provider.requires_auth() && self.api_key.is_none() {
            return Err(GenerationError::MissingApiKey(self.provider.env_var_name()));
        }

        let url = format!("{}/chat/completions", base);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_ASSISTANT },
                { "role": "user", "content": prompt },
            ],
            "max_tokens": params.max_new_tokens,
            "temperature": params.temperature,
            "top_p": params.top_p,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let json = send_json(request).await?;
        parse_chat_completion(&json)
    }
}

#[async_trait::async_trait]
impl GenerationService for LlmClient {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            match self.generate_once(prompt, params).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        provider = %self.provider,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "generation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

async fn send_json(
    request: reqwest::RequestBuilder,
) -> std::result::Result<serde_json::Value, GenerationError> {
    let response = request
        .send()
        .await
        .map_err(|e| GenerationError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(GenerationError::Status {
            status: status.as_u16(),
            body: text.chars().take(MAX_ERROR_BODY).collect(),
        });
    }

    let text = response
        .text()
        .await
        .map_err(|e| GenerationError::Transport(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| GenerationError::Malformed(e.to_string()))
}

/// `[{"generated_text": "..."}]`
pub fn parse_hf_generation(
    json: &serde_json::Value,
) -> std::result::Result<String, GenerationError> {
    json.get(0)
        .and_then(|o| o.get("generated_text"))
        .and_then(|t| t.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| GenerationError::Malformed(preview(json)))
}

/// `{"choices": [{"message": {"content": "..."}}]}`
pub fn parse_chat_completion(
    json: &serde_json::Value,
) -> std::result::Result<String, GenerationError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| GenerationError::Malformed(preview(json)))
}

fn preview(json: &serde_json::Value) -> String {
    let text = json.to_string();
    let cut: String = text.chars().take(200).collect();
    format!("unexpected body {}", cut)
}

use std::time::Duration;

use serde::Deserialize;

use super::Embedder;
use crate::error::{ChatError, Result};
use crate::providers::{Provider, ResolvedProvider};

/// HTTP embedding backends.
pub struct EmbeddingProvider {
    resolved: ResolvedProvider,
    client: reqwest::Client,
    timeout: Duration,
}

impl EmbeddingProvider {
    pub fn new(resolved: ResolvedProvider) -> Self {
        let timeout = Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS);
        Self {
            resolved,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Provider matching the embedding space recorded in an index.
    pub fn for_index(
        metadata: &crate::index::IndexMetadata,
        endpoint: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self::new(ResolvedProvider::resolve(
            metadata.provider,
            endpoint,
            Some(metadata.model.clone()),
            metadata.provider.default_embedding_model(),
        ))
        .with_timeout(timeout)
    }

    pub fn provider(&self) -> Provider {
        self.resolved.provider
    }

    fn require_key(&self) -> Result<&str> {
        self.resolved.api_key.as_deref().ok_or_else(|| {
            ChatError::Embedding(format!(
                "{} not set",
                self.resolved.provider.env_var_name()
            ))
        })
    }

    async fn embed_huggingface(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let key = self.require_key()?;
        let url = format!(
            "{}/pipeline/feature-extraction/{}",
            self.resolved.endpoint, self.resolved.model
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", key))
            .json(&serde_json::json!({
                "inputs": texts,
                "options": { "wait_for_model": true },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::Embedding(format!(
                "Hugging Face API error {}: {}",
                status.as_u16(),
                text
            )));
        }

        let result: serde_json::Value = response.json().await?;
        parse_feature_vectors(&result)
    }

    async fn embed_openai(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
        }

        let key = self.require_key()?;
        let response = self
            .client
            .post(format!("{}/embeddings", self.resolved.endpoint))
            .header("Authorization", format!("Bearer {}", key))
            .json(&serde_json::json!({
                "model": self.resolved.model,
                "input": texts,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::Embedding(format!(
                "OpenAI API error {}: {}",
                status.as_u16(),
                text
            )));
        }

        let result: EmbeddingResponse = response.json().await?;
        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn embed_ollama(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            let response = self
                .client
                .post(format!("{}/api/embeddings", self.resolved.endpoint))
                .json(&serde_json::json!({
                    "model": self.resolved.model,
                    "prompt": text,
                }))
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(ChatError::Embedding(format!(
                    "Ollama API error {}: {}",
                    status.as_u16(),
                    text
                )));
            }

            let result: serde_json::Value = response.json().await?;
            let embedding = result
                .get("embedding")
                .and_then(as_float_vec)
                .ok_or_else(|| ChatError::Embedding("Invalid Ollama embedding response".into()))?;

            embeddings.push(embedding);
        }

        Ok(embeddings)
    }
}

#[async_trait::async_trait]
impl Embedder for EmbeddingProvider {
    fn model_id(&self) -> &str {
        &self.resolved.model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = match self.resolved.provider {
            Provider::HuggingFace => self.embed_huggingface(texts).await?,
            Provider::OpenAI => self.embed_openai(texts).await?,
            Provider::Ollama => self.embed_ollama(texts).await?,
        };

        if embeddings.len() != texts.len() {
            return Err(ChatError::Embedding(format!(
                "expected {} embeddings, provider returned {}",
                texts.len(),
                embeddings.len()
            )));
        }

        tracing::debug!(
            provider = %self.resolved.provider,
            model = %self.resolved.model,
            count = embeddings.len(),
            "embedded batch"
        );

        Ok(embeddings)
    }
}

fn as_float_vec(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

/// Decode a feature-extraction response into one vector per input.
///
/// Sentence encoders return `[[f32; dim]; n]`. Token-level models return
/// `[[[f32; dim]; tokens]; n]`, which is mean-pooled per input.
pub fn parse_feature_vectors(value: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let malformed = || ChatError::Embedding("Invalid feature-extraction response".into());
    let rows = value.as_array().ok_or_else(malformed)?;

    rows.iter()
        .map(|row| {
            if let Some(vector) = as_float_vec(row) {
                return Ok(vector);
            }
            let tokens = row
                .as_array()
                .ok_or_else(malformed)?
                .iter()
                .map(as_float_vec)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(malformed)?;
            mean_pool(&tokens).ok_or_else(malformed)
        })
        .collect()
}

fn mean_pool(tokens: &[Vec<f32>]) -> Option<Vec<f32>> {
    let dim = tokens.first()?.len();
    if tokens.iter().any(|t| t.len() != dim) {
        return None;
    }
    let mut pooled = vec![0.0f32; dim];
    for token in tokens {
        for (acc, x) in pooled.iter_mut().zip(token) {
            *acc += x;
        }
    }
    let n = tokens.len() as f32;
    pooled.iter_mut().for_each(|x| *x /= n);
    Some(pooled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sentence_level_vectors_pass_through() {
        let parsed = parse_feature_vectors(&json!([[0.1, 0.2], [0.3, 0.4]])).unwrap();
        assert_eq!(parsed, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[test]
    fn token_level_vectors_are_mean_pooled() {
        let parsed = parse_feature_vectors(&json!([[[1.0, 3.0], [3.0, 5.0]]])).unwrap();
        assert_eq!(parsed, vec![vec![2.0, 4.0]]);
    }

    #[test]
    fn ragged_tokens_are_rejected() {
        assert!(parse_feature_vectors(&json!([[[1.0, 3.0], [3.0]]])).is_err());
    }

    #[test]
    fn non_array_is_rejected() {
        let err = parse_feature_vectors(&json!({"error": "loading"})).unwrap_err();
        assert!(err.to_string().contains("feature-extraction"));
    }

    #[tokio::test]
    async fn missing_key_is_an_embedding_failure() {
        let provider = EmbeddingProvider::new(ResolvedProvider {
            provider: Provider::HuggingFace,
            endpoint: "http://127.0.0.1:9".into(),
            model: "m".into(),
            api_key: None,
        });
        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(err, ChatError::Embedding(_)));
        assert!(err.to_string().contains("HF_API_KEY"));
    }

    #[test]
    fn index_embedder_uses_configured_timeout() {
        let metadata = crate::index::IndexMetadata {
            provider: Provider::Ollama,
            model: "nomic-embed-text".into(),
            dimension: 768,
            built_at: None,
            source_digest: None,
        };
        let provider = EmbeddingProvider::for_index(&metadata, None, Duration::from_secs(7));
        assert_eq!(provider.timeout(), Duration::from_secs(7));
        assert_eq!(provider.model_id(), "nomic-embed-text");
        assert_eq!(provider.provider(), Provider::Ollama);
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        let provider = EmbeddingProvider::new(ResolvedProvider {
            provider: Provider::Ollama,
            endpoint: "http://127.0.0.1:9".into(),
            model: "m".into(),
            api_key: None,
        });
        assert!(provider.embed_batch(&[]).await.unwrap().is_empty());
    }
}

use std::fmt;

/// Hosted (or local) model backends usable for embedding and generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    HuggingFace,
    OpenAI,
    Ollama,
}

impl Provider {
    pub fn all() -> &'static [Provider] {
        &[Provider::HuggingFace, Provider::OpenAI, Provider::Ollama]
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::HuggingFace => "https://api-inference.huggingface.co",
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_generation_model(&self) -> &'static str {
        match self {
            Provider::HuggingFace => "google/flan-t5-base",
            Provider::OpenAI => "gpt-4o-mini",
            Provider::Ollama => "llama3.2",
        }
    }

    pub fn default_embedding_model(&self) -> &'static str {
        match self {
            Provider::HuggingFace => crate::embeddings::DEFAULT_EMBEDDING_MODEL,
            Provider::OpenAI => "text-embedding-3-small",
            Provider::Ollama => "nomic-embed-text",
        }
    }

    /// Env var holding the API key; empty for providers that need none.
    pub fn env_var_name(&self) -> &'static str {
        match self {
            Provider::HuggingFace => "HF_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Ollama => "",
        }
    }

    pub fn requires_auth(&self) -> bool {
        !self.env_var_name().is_empty()
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::HuggingFace => "Hugging Face Inference API",
            Provider::OpenAI => "OpenAI",
            Provider::Ollama => "Ollama (local)",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Provider> {
        match s.to_lowercase().as_str() {
            "huggingface" | "hf" | "hugging-face" => Some(Provider::HuggingFace),
            "openai" | "gpt" => Some(Provider::OpenAI),
            "ollama" | "local" => Some(Provider::Ollama),
            _ => None,
        }
    }

    /// API key from the environment, if this provider uses one and it is set.
    pub fn api_key_from_env(&self) -> Option<String> {
        if !self.requires_auth() {
            return None;
        }
        std::env::var(self.env_var_name())
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::HuggingFace => write!(f, "huggingface"),
            Provider::OpenAI => write!(f, "openai"),
            Provider::Ollama => write!(f, "ollama"),
        }
    }
}

/// A fully resolved provider configuration, no further lookups needed.
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub provider: Provider,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl ResolvedProvider {
    /// Resolve with explicit overrides falling back to provider defaults.
    pub fn resolve(
        provider: Provider,
        endpoint: Option<String>,
        model: Option<String>,
        default_model: &str,
    ) -> Self {
        Self {
            provider,
            endpoint: endpoint
                .unwrap_or_else(|| provider.default_endpoint().to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or_else(|| default_model.to_string()),
            api_key: provider.api_key_from_env(),
        }
    }
}

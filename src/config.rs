use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ChatError, Result};
use crate::llm::{GenerationParams, RetryPolicy};
use crate::providers::{Provider, ResolvedProvider};
use crate::retrieval::RetrievalPolicy;

/// File name of the index inside the data directory.
pub const INDEX_FILE: &str = "index.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Values supplied on the command line. `None` falls through to env, then defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub index: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub embed_endpoint: Option<String>,
    pub top_n: Option<usize>,
    pub threshold: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Chunk index to serve from
    pub index_path: PathBuf,
    /// Resolved generation backend
    pub generation: ResolvedProvider,
    /// Endpoint override for query embeddings; provider comes from the index
    pub embed_endpoint: Option<String>,
    pub policy: RetrievalPolicy,
    pub params: GenerationParams,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve(overrides: ConfigOverrides, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let index_path = match overrides.index.or_else(|| env("KBCHAT_INDEX")) {
            Some(path) => PathBuf::from(shellexpand::tilde(&path).into_owned()),
            None => default_index_path()?,
        };

        let provider = match overrides.provider.or_else(|| env("KBCHAT_GEN_PROVIDER")) {
            Some(name) => Provider::from_str_loose(&name)
                .ok_or_else(|| ChatError::Config(format!("Unknown provider: {}", name)))?,
            None => Provider::HuggingFace,
        };

        let mut generation = ResolvedProvider::resolve(
            provider,
            overrides.endpoint.or_else(|| env("KBCHAT_GEN_ENDPOINT")),
            overrides.model.or_else(|| env("KBCHAT_GEN_MODEL")),
            provider.default_generation_model(),
        );
        if provider.requires_auth() {
            generation.api_key = env(provider.env_var_name());
        }

        let defaults = RetrievalPolicy::default();
        let policy = RetrievalPolicy {
            top_n_per_section: overrides.top_n.unwrap_or(defaults.top_n_per_section),
            threshold: overrides.threshold.unwrap_or(defaults.threshold),
        };
        if policy.top_n_per_section == 0 {
            return Err(ChatError::Config("--top-n must be at least 1".into()));
        }
        if !policy.threshold.is_finite() {
            return Err(ChatError::Config("--threshold must be a finite number".into()));
        }

        let mut params = GenerationParams::default();
        if let Some(max_tokens) = overrides.max_tokens {
            if max_tokens == 0 {
                return Err(ChatError::Config("--max-tokens must be at least 1".into()));
            }
            params.max_new_tokens = max_tokens;
        }

        let timeout_secs = parse_env_number(&env, "KBCHAT_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ChatError::Config("KBCHAT_TIMEOUT_SECS must be at least 1".into()));
        }
        let mut retry = RetryPolicy::default();
        if let Some(max_retries) = parse_env_number(&env, "KBCHAT_MAX_RETRIES")? {
            retry.max_retries = max_retries;
        }

        Ok(Config {
            index_path,
            generation,
            embed_endpoint: overrides.embed_endpoint.or_else(|| env("KBCHAT_EMBED_ENDPOINT")),
            policy,
            params,
            timeout: Duration::from_secs(timeout_secs),
            retry,
        })
    }
}

pub fn default_index_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ChatError::Config("Could not determine data directory".into()))?;
    Ok(data_dir.join("kbchat").join(INDEX_FILE))
}

fn parse_env_number<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    env(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|_| ChatError::Config(format!("{} must be a number, got '{}'", key, v)))
        })
        .transpose()
}

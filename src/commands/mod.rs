pub mod ask;
pub mod build;
pub mod chat;
pub mod inspect;

use std::path::Path;

use crate::assistant::Assistant;
use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::error::{ChatError, Result};
use crate::index::ChunkIndex;
use crate::llm::LlmClient;

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ChatError::Config(format!("tokio runtime: {}", e)))
}

pub(crate) fn load_index(path: &Path) -> Result<ChunkIndex> {
    let index = ChunkIndex::load(path)?;
    tracing::debug!(
        path = %path.display(),
        sections = index.sections().count(),
        chunks = index.chunk_count(),
        model = %index.metadata().model,
        "loaded index"
    );
    Ok(index)
}

/// Wire the HTTP embedder (matching the index's embedding space) and generator.
pub(crate) fn build_assistant(config: &Config, index: &ChunkIndex) -> Assistant {
    let embedder = EmbeddingProvider::for_index(
        index.metadata(),
        config.embed_endpoint.clone(),
        config.timeout,
    );
    let generator = LlmClient::new(&config.generation)
        .with_timeout(config.timeout)
        .with_retry(config.retry);

    Assistant::new(Box::new(embedder), Box::new(generator))
        .with_policy(config.policy)
        .with_params(config.params)
}

pub mod ranker;
pub mod selector;

pub use ranker::{rank, ScoredCandidate};
pub use selector::{select_best, Selection};

use crate::embeddings::Embedder;
use crate::error::{ChatError, Result};
use crate::index::ChunkIndex;

/// Candidates kept from each section before the global pick.
pub const DEFAULT_TOP_N_PER_SECTION: usize = 3;
/// Minimum cosine similarity for a chunk to be used as context.
pub const DEFAULT_THRESHOLD: f32 = 0.3;

#[derive(Debug, Clone, Copy)]
pub struct RetrievalPolicy {
    pub top_n_per_section: usize,
    pub threshold: f32,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            top_n_per_section: DEFAULT_TOP_N_PER_SECTION,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Embed `query`, rank it against every section and pick the best chunk.
///
/// An index without chunks short-circuits to `NoMatch` without embedding.
pub async fn retrieve<'a>(
    embedder: &dyn Embedder,
    index: &'a ChunkIndex,
    query: &str,
    policy: &RetrievalPolicy,
) -> Result<Selection<'a>> {
    if index.is_empty() {
        tracing::debug!("index holds no chunks");
        return Ok(Selection::NoMatch);
    }

    let query_vector = embedder.embed(query).await?;
    if query_vector.len() != index.dimension() {
        return Err(ChatError::Embedding(format!(
            "query embedding has dimension {}, index '{}' expects {}",
            query_vector.len(),
            index.metadata().model,
            index.dimension()
        )));
    }

    let candidates = rank(&query_vector, index, policy.top_n_per_section);
    let selection = select_best(&candidates, policy.threshold);

    match selection.candidate() {
        Some(best) => tracing::debug!(
            candidates = candidates.len(),
            section = best.section,
            position = best.position,
            score = best.score,
            "selected chunk"
        ),
        None => tracing::debug!(
            candidates = candidates.len(),
            threshold = policy.threshold,
            "no candidate reached threshold"
        ),
    }

    Ok(selection)
}

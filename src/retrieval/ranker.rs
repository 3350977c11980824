use std::cmp::Ordering;

use crate::embeddings::cosine_similarity;
use crate::index::{Chunk, ChunkIndex};

/// A chunk scored against one query. Borrows from the index.
#[derive(Debug, Clone, Copy)]
pub struct ScoredCandidate<'a> {
    pub section: &'a str,
    /// Position of the chunk within its section
    pub position: usize,
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// Score every chunk against `query` and keep the best `top_n_per_section` of
/// each section.
///
/// Each section's winners are ordered by score (earlier chunk first on ties);
/// sections are concatenated in index order, so the result is not globally
/// sorted.
pub fn rank<'a>(
    query: &[f32],
    index: &'a ChunkIndex,
    top_n_per_section: usize,
) -> Vec<ScoredCandidate<'a>> {
    let mut candidates = Vec::new();
    if top_n_per_section == 0 {
        return candidates;
    }

    for section in index.sections() {
        // Underscore names are reserved for metadata
        if section.is_empty() || section.name().starts_with('_') {
            continue;
        }

        let mut scored: Vec<(usize, f32)> = section
            .embeddings()
            .map(|e| cosine_similarity(query, e))
            .enumerate()
            .collect();
        top_k(&mut scored, top_n_per_section);

        tracing::debug!(
            section = section.name(),
            kept = scored.len(),
            best = scored.first().map(|(_, s)| *s),
            "ranked section"
        );

        let chunks = section.chunks();
        candidates.extend(scored.into_iter().map(|(position, score)| ScoredCandidate {
            section: section.name(),
            position,
            chunk: &chunks[position],
            score,
        }));
    }

    candidates
}

/// Partial top-k: only the kept prefix gets fully sorted.
fn top_k(scored: &mut Vec<(usize, f32)>, k: usize) {
    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, by_rank);
        scored.truncate(k);
    }
    scored.sort_by(by_rank);
}

/// Higher score first, then lower position. NaN sorts last.
fn by_rank(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    let key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
    key(b.1).total_cmp(&key(a.1)).then(a.0.cmp(&b.0))
}

pub mod provider;

pub use provider::EmbeddingProvider;

use crate::error::Result;

/// Default sentence encoder used when building a fresh index.
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Anything that maps text into a fixed embedding space.
///
/// Implementations must be deterministic for a fixed model id: the same id has
/// to embed both the stored chunks and the incoming queries.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier recorded in index metadata.
    fn model_id(&self) -> &str;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let batch = self.embed_batch(&[text.to_string()]).await?;
        batch
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::ChatError::Embedding("No embedding returned".into()))
    }
}

/// Cosine similarity between two vectors.
///
/// Zero-norm or length-mismatched inputs score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_one() {
        let v = [0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn opposite_vectors_are_not_clamped() {
        let s = cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]);
        assert!((s + 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_norm_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 1.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn length_mismatch_scores_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn magnitude_does_not_matter() {
        let s = cosine_similarity(&[1.0, 1.0], &[10.0, 10.0]);
        assert!((s - 1.0).abs() < 1e-6);
    }
}

//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus [`cosine_similarity`] and the chunked batching helper
//! [`embed_chunked`].
//!
//! Concrete provider implementations (OpenAI-compatible, Ollama) live in
//! the `project-resolver` app crate.

use async_trait::async_trait;
use tracing::warn;

use crate::error::ProviderError;

/// Trait for embedding providers.
///
/// Both calls may fail; callers treat any [`ProviderError`] as "no signal"
/// rather than as a hard failure.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-v3"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1024`).
    fn dims(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embed several texts in one request, returning vectors in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

/// Embed `texts` in chunks of `batch_size`, preserving input order.
///
/// A chunk whose request fails (or returns the wrong number of vectors)
/// yields an empty vector for each of its texts; the remaining chunks are
/// still attempted. The output always has `texts.len()` entries.
pub async fn embed_chunked(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> Vec<Vec<f32>> {
    let mut out = Vec::with_capacity(texts.len());
    for (n, chunk) in texts.chunks(batch_size.max(1)).enumerate() {
        match provider.embed_batch(chunk).await {
            Ok(vectors) if vectors.len() == chunk.len() => out.extend(vectors),
            Ok(vectors) => {
                warn!(
                    batch = n + 1,
                    expected = chunk.len(),
                    got = vectors.len(),
                    "embedding batch returned the wrong number of vectors"
                );
                out.extend(chunk.iter().map(|_| Vec::new()));
            }
            Err(e) => {
                warn!(batch = n + 1, error = %e, "embedding batch failed");
                out.extend(chunk.iter().map(|_| Vec::new()));
            }
        }
    }
    out
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, zero vectors, vectors of different
/// lengths, or inputs containing non-finite values. Accumulates in `f64`.
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    let cos = dot / denom;
    if !cos.is_finite() {
        return 0.0;
    }
    cos.clamp(-1.0, 1.0) as f32
}

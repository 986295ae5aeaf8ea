//! Text embedding seam behind [`InMemoryVectorIndex`](crate::InMemoryVectorIndex).

use async_trait::async_trait;

use crate::error::Result;

/// Turns passages and queries into dense vectors for similarity ranking.
///
/// Passages and queries must be embedded by the same provider. Failures are
/// reported as [`FinRagError::ExternalService`](crate::FinRagError::ExternalService)
/// by callers; providers may return any error variant.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several passages, one vector per input in input order.
    ///
    /// Falls back to one [`embed`](EmbeddingProvider::embed) call per text.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;
}

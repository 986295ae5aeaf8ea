//! In-memory vector index using cosine similarity.
//!
//! [`InMemoryVectorIndex`] pairs an [`EmbeddingProvider`] with a
//! `Vec` of embedded documents behind a `tokio::sync::RwLock`. It is the
//! default [`VectorIndex`] when embedding credentials are available.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::document::Document;
use crate::embedding::EmbeddingProvider;
use crate::error::{FinRagError, Result};
use crate::index::VectorIndex;

/// An append-only in-memory vector index.
///
/// # Example
///
/// ```rust,ignore
/// use finrag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new(Arc::new(my_embedder));
/// index.add(&documents).await?;
/// let hits = index.similarity_search("dividend stocks", 3).await?;
/// ```
pub struct InMemoryVectorIndex {
    provider: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<(Document, Vec<f32>)>>,
}

impl InMemoryVectorIndex {
    /// Create an empty index that embeds with `provider`.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider, entries: RwLock::new(Vec::new()) }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn add(&self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let embeddings = self.provider.embed_batch(&texts).await.map_err(|e| {
            error!(error = %e, batch_size = texts.len(), "embedding failed during add");
            FinRagError::external("vector_index", format!("embedding failed: {e}"))
        })?;
        if embeddings.len() != documents.len() {
            return Err(FinRagError::external(
                "vector_index",
                format!(
                    "provider returned {} embeddings for {} documents",
                    embeddings.len(),
                    documents.len()
                ),
            ));
        }

        let mut entries = self.entries.write().await;
        entries.extend(documents.iter().cloned().zip(embeddings));
        debug!(added = documents.len(), total = entries.len(), "vector index updated");
        Ok(())
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        let query_embedding = self.provider.embed(query).await.map_err(|e| {
            error!(error = %e, "query embedding failed");
            FinRagError::external("vector_index", format!("query embedding failed: {e}"))
        })?;

        let entries = self.entries.read().await;
        let mut scored: Vec<(f32, &Document)> = entries
            .iter()
            .map(|(document, embedding)| (cosine_similarity(embedding, &query_embedding), document))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(_, document)| document.clone()).collect())
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

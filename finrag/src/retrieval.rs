//! Two-tier retrieval: vector similarity first, keyword overlap as fallback.
//!
//! The backend is resolved on every call from the current state of the
//! stores. A vector index attached after startup is picked up by the next
//! retrieval without rebuilding the engine.

use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::{FinRagError, Result};
use crate::index::{KeywordIndex, VectorIndex};

/// The store chosen to answer one retrieval call.
#[derive(Clone)]
pub enum RetrievalBackend {
    /// A non-empty vector index is available.
    VectorBacked(Arc<dyn VectorIndex>),
    /// No usable vector index, but the keyword store has entries.
    KeywordBacked(Arc<KeywordIndex>),
    /// Nothing to search.
    Empty,
}

impl RetrievalBackend {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::VectorBacked(_) => "vector",
            Self::KeywordBacked(_) => "keyword",
            Self::Empty => "empty",
        }
    }
}

impl fmt::Debug for RetrievalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Which stores accepted an ingested batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    /// Every available store holds the batch.
    Complete,
    /// The vector index rejected the batch; only the keyword store holds it.
    KeywordOnly,
}

/// Retrieves passages from a vector index or the keyword fallback store.
pub struct RetrievalEngine {
    vector_index: RwLock<Option<Arc<dyn VectorIndex>>>,
    keyword_index: Arc<KeywordIndex>,
}

impl Default for RetrievalEngine {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RetrievalEngine {
    /// Create an engine with an optional vector index and an empty keyword store.
    pub fn new(vector_index: Option<Arc<dyn VectorIndex>>) -> Self {
        Self { vector_index: RwLock::new(vector_index), keyword_index: Arc::new(KeywordIndex::new()) }
    }

    /// Attach (or replace) the vector index.
    ///
    /// Passages ingested before the index was attached remain in the keyword
    /// store only.
    pub async fn attach_vector_index(&self, index: Arc<dyn VectorIndex>) {
        *self.vector_index.write().await = Some(index);
        info!("vector index attached");
    }

    /// The keyword fallback store.
    pub fn keyword_index(&self) -> &Arc<KeywordIndex> {
        &self.keyword_index
    }

    /// Pick the backend for a single call.
    pub async fn resolve_backend(&self) -> RetrievalBackend {
        let vector_index = self.vector_index.read().await.clone();
        if let Some(index) = vector_index {
            if !index.is_empty().await {
                return RetrievalBackend::VectorBacked(index);
            }
        }
        if !self.keyword_index.is_empty().await {
            return RetrievalBackend::KeywordBacked(Arc::clone(&self.keyword_index));
        }
        RetrievalBackend::Empty
    }

    /// Add passages to every available store.
    ///
    /// Raw text always lands in the keyword store; when a vector index is
    /// attached the documents are embedded into it as well. A failed vector
    /// add is logged and reported as [`IngestStatus::KeywordOnly`].
    pub async fn ingest(&self, documents: &[Document]) -> IngestStatus {
        if documents.is_empty() {
            return IngestStatus::Complete;
        }
        self.keyword_index.append(documents.iter().map(|d| d.content.clone())).await;
        let status = self.index_vectors(documents).await;
        debug!(count = documents.len(), status = ?status, "ingested passages");
        status
    }

    /// Embed passages into the vector index only.
    ///
    /// Used to index passages whose earlier [`ingest`](Self::ingest) reached
    /// the keyword store alone. Without a vector index this is a no-op.
    pub async fn index_vectors(&self, documents: &[Document]) -> IngestStatus {
        let vector_index = self.vector_index.read().await.clone();
        let Some(index) = vector_index else {
            return IngestStatus::Complete;
        };
        match index.add(documents).await {
            Ok(()) => IngestStatus::Complete,
            Err(e) => {
                warn!(error = %e, count = documents.len(), "vector index add failed, passages kept in keyword store");
                IngestStatus::KeywordOnly
            }
        }
    }

    /// Return up to `k` passages for `query`, most relevant first.
    ///
    /// An empty result means both stores are empty or nothing matched the
    /// keyword fallback. Callers render it as an explicit no-data signal.
    ///
    /// # Errors
    ///
    /// Returns [`FinRagError::ExternalService`] if the vector index fails.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        let backend = self.resolve_backend().await;
        debug!(backend = backend.kind(), k, "retrieving passages");

        let documents = match backend {
            RetrievalBackend::VectorBacked(index) => {
                let mut documents = index.similarity_search(query, k).await.map_err(|e| match e {
                    FinRagError::ExternalService { .. } => e,
                    other => FinRagError::external("vector_index", other.to_string()),
                })?;
                documents.truncate(k);
                documents
            }
            RetrievalBackend::KeywordBacked(index) => index.search(query, k).await,
            RetrievalBackend::Empty => Vec::new(),
        };

        info!(result_count = documents.len(), "retrieval completed");
        Ok(documents)
    }
}

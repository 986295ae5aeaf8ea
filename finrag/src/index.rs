//! Passage stores: the external vector index seam and the keyword fallback.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::Document;
use crate::error::Result;

/// An append-only similarity index over [`Document`]s.
///
/// Implementations embed and store documents on [`add`](VectorIndex::add)
/// and return them ranked most-similar first from
/// [`similarity_search`](VectorIndex::similarity_search). An `add` must be
/// atomic with respect to concurrent searches.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Embed and append documents.
    async fn add(&self, documents: &[Document]) -> Result<()>;

    /// Return up to `k` documents ranked by descending similarity to `query`.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>>;

    /// Number of documents held by the index.
    async fn len(&self) -> usize;

    /// Whether the index holds no documents.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// The fallback store used when no vector index is available.
///
/// Holds raw text blobs in insertion order. Appends take the write lock for
/// the whole batch, so readers see either all or none of it.
#[derive(Debug, Default)]
pub struct KeywordIndex {
    texts: RwLock<Vec<String>>,
}

impl KeywordIndex {
    /// Create an empty keyword index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append texts. Empty strings are skipped.
    pub async fn append<I, S>(&self, texts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let batch: Vec<String> =
            texts.into_iter().map(Into::into).filter(|t| !t.is_empty()).collect();
        if batch.is_empty() {
            return;
        }
        self.texts.write().await.extend(batch);
    }

    /// Number of stored texts.
    pub async fn len(&self) -> usize {
        self.texts.read().await.len()
    }

    /// Whether no text has been stored.
    pub async fn is_empty(&self) -> bool {
        self.texts.read().await.is_empty()
    }

    /// Score every stored text against `query` and return the best `k`.
    ///
    /// The query is split on whitespace into lowercase terms; a text's
    /// relevance is the number of terms occurring in it as substrings.
    /// Texts with zero relevance are dropped and ties keep insertion order.
    pub async fn search(&self, query: &str, k: usize) -> Vec<Document> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() || k == 0 {
            return Vec::new();
        }

        let texts = self.texts.read().await;
        let mut scored: Vec<(usize, usize)> = texts
            .iter()
            .enumerate()
            .filter_map(|(position, text)| {
                let lowered = text.to_lowercase();
                let relevance = terms.iter().filter(|t| lowered.contains(t.as_str())).count();
                (relevance > 0).then_some((position, relevance))
            })
            .collect();

        // `sort_by` is stable, so equal relevance keeps insertion order.
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(position, _)| Document {
                content: texts[position].clone(),
                source_id: format!("keyword:{position}"),
            })
            .collect()
    }
}

//! The passage type shared by chunking, indexing, and retrieval.

use serde::{Deserialize, Serialize};

/// An immutable passage of text together with the source it was cut from.
///
/// Documents are produced by [`DocumentChunker`](crate::DocumentChunker) and
/// owned by whichever index they are added to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Document {
    /// The text content of the passage.
    pub content: String,
    /// Identifier of the source the passage came from.
    pub source_id: String,
}

impl Document {
    /// Create a document from its content and source identifier.
    pub fn new(content: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self { content: content.into(), source_id: source_id.into() }
    }
}

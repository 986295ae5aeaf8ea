//! Fixed-window document chunking.
//!
//! [`DocumentChunker`] splits text into consecutive windows of `chunk_size`
//! characters where adjacent windows share `chunk_overlap` characters.
//! Windows are measured in `char`s, never bytes, so multi-byte text is
//! never cut inside a code point.

use crate::config::ChunkingConfig;
use crate::document::Document;
use crate::error::Result;

/// Splits texts into overlapping fixed-size [`Document`]s.
///
/// # Example
///
/// ```rust,ignore
/// use finrag::{ChunkingConfig, DocumentChunker};
///
/// let chunker = DocumentChunker::new(ChunkingConfig::PROFILE)?;
/// let documents = chunker.split("profile:u1", &[summary]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DocumentChunker {
    config: ChunkingConfig,
}

impl DocumentChunker {
    /// Create a chunker for the given window configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FinRagError::ConfigError`](crate::FinRagError::ConfigError)
    /// if `chunk_overlap >= chunk_size` or `chunk_size == 0`.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create a chunker from a raw size and overlap.
    pub fn with_window(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Self::new(ChunkingConfig::new(chunk_size, chunk_overlap)?)
    }

    /// The window configuration in use.
    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Split every text into windows, preserving input order.
    ///
    /// Each chunk carries `source_id`. Empty texts produce no chunks.
    pub fn split<S: AsRef<str>>(&self, source_id: &str, texts: &[S]) -> Vec<Document> {
        texts
            .iter()
            .flat_map(|text| split_windows(text.as_ref(), self.config))
            .map(|content| Document { content, source_id: source_id.to_string() })
            .collect()
    }
}

/// Cut one text into overlapping windows.
///
/// Every window after the first starts `chunk_overlap` characters before the
/// previous window ended; the final window ends exactly at the end of the
/// text and may be shorter than `chunk_size`.
fn split_windows(text: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + config.chunk_size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end - config.chunk_overlap;
    }
    windows
}

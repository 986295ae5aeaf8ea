//! Persisted knowledge sources.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::{FinRagError, Result};

/// A source of raw knowledge texts, read on construction and on refresh.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Read the source. Each returned string is one unchunked text.
    async fn load(&self) -> Result<Vec<String>>;
}

/// A JSON file holding an array of records.
///
/// Every record becomes one text: its compact JSON serialization. A
/// top-level object is treated as a single record. A missing file or
/// malformed JSON yields no texts rather than an error.
#[derive(Debug, Clone)]
pub struct JsonRecordsSource {
    path: PathBuf,
}

impl JsonRecordsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compact JSON texts for every record in `raw`.
    pub fn parse_records(raw: &str) -> Result<Vec<String>> {
        let records = match serde_json::from_str::<Value>(raw)? {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        records.iter().map(|record| Ok(serde_json::to_string(record)?)).collect()
    }
}

#[async_trait]
impl KnowledgeSource for JsonRecordsSource {
    async fn load(&self) -> Result<Vec<String>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "knowledge file not found, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to read knowledge file");
                return Err(FinRagError::LoaderError(format!("{}: {e}", self.path.display())));
            }
        };

        match Self::parse_records(&raw) {
            Ok(texts) => {
                info!(path = %self.path.display(), record_count = texts.len(), "loaded knowledge records");
                Ok(texts)
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "invalid JSON in knowledge file");
                Ok(Vec::new())
            }
        }
    }
}

//! Configuration for the advisor pipeline.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FinRagError, Result};

/// Window size and overlap for [`DocumentChunker`](crate::DocumentChunker).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of characters shared by consecutive chunks.
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    /// Windows used for short profile snippets.
    pub const PROFILE: Self = Self { chunk_size: 500, chunk_overlap: 50 };

    /// Windows used for longer composite documents such as knowledge records.
    pub const DOCUMENT: Self = Self { chunk_size: 1000, chunk_overlap: 200 };

    /// Create a validated chunking configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FinRagError::ConfigError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let config = Self { chunk_size, chunk_overlap };
        config.validate()?;
        Ok(config)
    }

    /// Check that the window can make progress.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(FinRagError::ConfigError("chunk_size must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(FinRagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// How allocation percentages are checked when documents are built.
///
/// Allocation entries are caller-supplied and nothing downstream is known to
/// require them to sum to 100, so the default performs no check.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AllocationCheck {
    /// Accept any percentages.
    #[default]
    Unchecked,
    /// Log a warning when a non-empty allocation does not sum to 100.
    Warn,
    /// Reject documents whose non-empty allocations do not sum to 100.
    Strict,
}

/// Configuration parameters for the advisor pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinRagConfig {
    /// Chunking applied to registered profile summaries.
    pub profile_chunking: ChunkingConfig,
    /// Chunking applied to knowledge-source records.
    pub document_chunking: ChunkingConfig,
    /// Number of passages retrieved per request.
    pub top_k: usize,
    /// Sampling temperature passed to the completion service.
    pub temperature: f32,
    /// Whether ticker symbols found in queries trigger live market-data fetches.
    pub fetch_live_data: bool,
    /// Allocation sum policy for structured documents.
    pub allocation_check: AllocationCheck,
}

impl Default for FinRagConfig {
    fn default() -> Self {
        Self {
            profile_chunking: ChunkingConfig::PROFILE,
            document_chunking: ChunkingConfig::DOCUMENT,
            top_k: 3,
            temperature: 0.3,
            fetch_live_data: true,
            allocation_check: AllocationCheck::Unchecked,
        }
    }
}

impl FinRagConfig {
    /// Create a new builder for constructing a [`FinRagConfig`].
    pub fn builder() -> FinRagConfigBuilder {
        FinRagConfigBuilder::default()
    }

    /// Defaults overlaid with `FINRAG_TOP_K`, `FINRAG_TEMPERATURE` and
    /// `FINRAG_FETCH_LIVE_DATA` when they are set.
    ///
    /// # Errors
    ///
    /// Returns [`FinRagError::ConfigError`] if a variable is set but cannot be
    /// parsed, or if the resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(raw) = lookup("FINRAG_TOP_K") {
            let top_k = raw.trim().parse::<usize>().map_err(|e| {
                FinRagError::ConfigError(format!("FINRAG_TOP_K '{raw}' is not a count: {e}"))
            })?;
            builder = builder.top_k(top_k);
        }
        if let Some(raw) = lookup("FINRAG_TEMPERATURE") {
            let temperature = raw.trim().parse::<f32>().map_err(|e| {
                FinRagError::ConfigError(format!("FINRAG_TEMPERATURE '{raw}' is not a number: {e}"))
            })?;
            builder = builder.temperature(temperature);
        }
        if let Some(raw) = lookup("FINRAG_FETCH_LIVE_DATA") {
            let enabled = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    warn!(value = other, "unrecognized FINRAG_FETCH_LIVE_DATA, keeping default");
                    true
                }
            };
            builder = builder.fetch_live_data(enabled);
        }

        builder.build()
    }
}

/// Builder for constructing a validated [`FinRagConfig`].
#[derive(Debug, Clone, Default)]
pub struct FinRagConfigBuilder {
    config: FinRagConfig,
}

impl FinRagConfigBuilder {
    /// Set the chunking used for profile summaries.
    pub fn profile_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.config.profile_chunking = chunking;
        self
    }

    /// Set the chunking used for knowledge records.
    pub fn document_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.config.document_chunking = chunking;
        self
    }

    /// Set the number of passages retrieved per request.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the completion temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Enable or disable live market-data fetches.
    pub fn fetch_live_data(mut self, enabled: bool) -> Self {
        self.config.fetch_live_data = enabled;
        self
    }

    /// Set the allocation sum policy.
    pub fn allocation_check(mut self, check: AllocationCheck) -> Self {
        self.config.allocation_check = check;
        self
    }

    /// Build the [`FinRagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`FinRagError::ConfigError`] if:
    /// - either chunking configuration is invalid
    /// - `top_k == 0`
    /// - `temperature` is outside `0.0..=2.0`
    pub fn build(self) -> Result<FinRagConfig> {
        self.config.profile_chunking.validate()?;
        self.config.document_chunking.validate()?;
        if self.config.top_k == 0 {
            return Err(FinRagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if !(0.0..=2.0).contains(&self.config.temperature) {
            return Err(FinRagError::ConfigError(format!(
                "temperature ({}) must be within 0.0..=2.0",
                self.config.temperature
            )));
        }
        Ok(self.config)
    }
}

//! Error types for the `finrag` crate.

use thiserror::Error;

/// Errors that can occur in retrieval, dispatch, and document construction.
///
/// Only [`FinRagError::InvalidTier`] is expected to reach end callers of
/// [`AdvisorPipeline::dispatch`](crate::AdvisorPipeline::dispatch). Every
/// other failure inside a dispatch is rendered into the analysis text.
#[derive(Debug, Error)]
pub enum FinRagError {
    /// The query contains no term from the finance vocabulary.
    #[error("query is outside the financial domain")]
    OutOfDomainQuery,

    /// Neither the vector index nor the keyword fallback holds any data.
    #[error("no financial data available")]
    NoDataAvailable,

    /// A call to an external collaborator failed.
    #[error("{service} error: {message}")]
    ExternalService {
        /// The collaborator that failed (`completion`, `vector_index`, `embedding`, ...).
        service: String,
        /// A description of the failure.
        message: String,
    },

    /// An unknown tier identifier was supplied.
    #[error("invalid tier: {0}")]
    InvalidTier(String),

    /// A configuration validation error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The persisted knowledge source could not be read.
    #[error("loader error: {0}")]
    LoaderError(String),

    /// An operation referenced a user that was never registered.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// Allocation percentages failed a strict sum check.
    #[error("allocation error: {0}")]
    AllocationError(String),

    /// JSON (de)serialization failed.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl FinRagError {
    /// Build an [`FinRagError::ExternalService`] for the named collaborator.
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService { service: service.into(), message: message.into() }
    }
}

/// A convenience result type for `finrag` operations.
pub type Result<T> = std::result::Result<T, FinRagError>;

//! Domain-gated, tier-aware retrieval-augmented generation for investment
//! recommendations.
//!
//! This crate provides:
//! - Sliding-window chunking of persisted knowledge and profile summaries
//! - A keyword gate that refuses non-financial queries
//! - Vector retrieval with a per-call keyword fallback
//! - Context assembly from passages, profiles, live market data and static tables
//! - Tier dispatch with guarded completion prompts
//! - Fixed-schema structured recommendation documents with chart blocks
//!
//! Enable the `openai` feature for OpenAI embedding and completion adapters
//! and the `yahoo` feature for a Yahoo Finance market-data fetcher.

pub mod chunking;
pub mod completion;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod gate;
pub mod index;
pub mod inmemory;
pub mod knowledge;
pub mod loader;
pub mod market;
pub mod pipeline;
pub mod profile;
pub mod retrieval;
pub mod structured;
pub mod tier;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "yahoo")]
pub mod yahoo;

pub use chunking::DocumentChunker;
pub use completion::{CompletionRequest, CompletionService};
pub use config::{AllocationCheck, ChunkingConfig, FinRagConfig, FinRagConfigBuilder};
pub use context::ContextAssembler;
pub use document::Document;
pub use embedding::EmbeddingProvider;
pub use error::{FinRagError, Result};
pub use extract::{AnalysisExtractor, FixtureExtractor, JsonBlockExtractor};
pub use gate::{FINANCE_TERMS, KeywordGate, REFUSAL_MESSAGE};
pub use index::{KeywordIndex, VectorIndex};
pub use inmemory::InMemoryVectorIndex;
pub use knowledge::{KnowledgeSection, StaticKnowledge};
pub use loader::{JsonRecordsSource, KnowledgeSource};
pub use market::{LiveData, MarketDataFetcher, MarketSnapshot, extract_ticker_symbols};
pub use pipeline::{
    AdvisorPipeline, AdvisorPipelineBuilder, Analysis, DispatchOutcome, FAILURE_PREFIX,
    NO_DATA_MESSAGE, NO_MATCH_MESSAGE,
};
pub use profile::{
    InvestmentHistoryEntry, InvestmentHorizon, ProfileStore, ProfileUpdate, RiskTolerance,
    UserProfile,
};
pub use retrieval::{IngestStatus, RetrievalBackend, RetrievalEngine};
pub use structured::{
    CHART_PALETTE, InvestedUserDocument, NewInvestorDocument, ReadyInvestorDocument,
    RecommendationDocument, StructuredDocumentBuilder,
};
pub use tier::{MISSING_DATA_PHRASE, Tier};

#[cfg(feature = "openai")]
pub use openai::{OpenAICompletion, OpenAIEmbeddingProvider};
#[cfg(feature = "yahoo")]
pub use yahoo::YahooFinanceFetcher;

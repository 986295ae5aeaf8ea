//! Tier dispatch orchestrator.
//!
//! The [`AdvisorPipeline`] coordinates the full request workflow by composing
//! a [`KeywordGate`], a [`RetrievalEngine`], a [`ContextAssembler`], an
//! optional [`CompletionService`] and a [`StructuredDocumentBuilder`].
//!
//! # Example
//!
//! ```rust,ignore
//! use finrag::{AdvisorPipeline, FinRagConfig, JsonRecordsSource, Tier};
//!
//! let pipeline = AdvisorPipeline::builder()
//!     .config(FinRagConfig::from_env()?)
//!     .knowledge_source(Arc::new(JsonRecordsSource::new("finance.json")))
//!     .build()?;
//!
//! pipeline.update_data().await?;
//! let (analysis, document) = pipeline
//!     .dispatch(Tier::NewInvestor, "How should I start investing?", "user1", None)
//!     .await
//!     .into_parts();
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::chunking::DocumentChunker;
use crate::completion::{CompletionRequest, CompletionService};
use crate::config::FinRagConfig;
use crate::context::ContextAssembler;
use crate::document::Document;
use crate::embedding::EmbeddingProvider;
use crate::error::{FinRagError, Result};
use crate::extract::AnalysisExtractor;
use crate::gate::{KeywordGate, REFUSAL_MESSAGE};
use crate::index::VectorIndex;
use crate::inmemory::InMemoryVectorIndex;
use crate::knowledge::StaticKnowledge;
use crate::loader::KnowledgeSource;
use crate::market::{LiveData, MarketDataFetcher, extract_ticker_symbols};
use crate::profile::{InvestmentHistoryEntry, ProfileStore, ProfileUpdate, UserProfile};
use crate::retrieval::{IngestStatus, RetrievalBackend, RetrievalEngine};
use crate::structured::{RecommendationDocument, StructuredDocumentBuilder};
use crate::tier::Tier;

/// Analysis text returned when no store holds any passages.
pub const NO_DATA_MESSAGE: &str =
    "No financial data available. Please ensure the knowledge source contains valid financial information.";

/// Analysis text returned when the stores hold data but none matches the query.
pub const NO_MATCH_MESSAGE: &str = "No relevant financial information found for this query.";

/// Prefix of the analysis text returned when retrieval or completion fails.
pub const FAILURE_PREFIX: &str = "Error analyzing financial data";

const KNOWLEDGE_SOURCE_ID: &str = "knowledge";

/// The analysis half of a dispatch.
///
/// Generated text and raw context are distinct variants so callers can
/// always tell a model-written analysis from the unprocessed context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Analysis {
    /// Text written by the completion service.
    Generated(String),
    /// The assembled context, returned verbatim when no completion service is configured.
    RawContext(String),
    /// The query failed the domain gate.
    Refused,
    /// Neither the vector index nor the keyword store holds any data.
    NoData,
    /// The stores hold data but retrieval found nothing for the query.
    NoMatch,
    /// Retrieval or completion failed. Carries the full user-facing message.
    Failed(String),
}

impl Analysis {
    pub fn text(&self) -> &str {
        match self {
            Self::Generated(text) | Self::RawContext(text) | Self::Failed(text) => text,
            Self::Refused => REFUSAL_MESSAGE,
            Self::NoData => NO_DATA_MESSAGE,
            Self::NoMatch => NO_MATCH_MESSAGE,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Generated(_) => "generated",
            Self::RawContext(_) => "raw_context",
            Self::Refused => "refused",
            Self::NoData => "no_data",
            Self::NoMatch => "no_match",
            Self::Failed(_) => "failed",
        }
    }

    /// Whether the request got far enough to carry a structured document.
    pub fn is_answered(&self) -> bool {
        matches!(self, Self::Generated(_) | Self::RawContext(_))
    }
}

/// Result of [`AdvisorPipeline::dispatch`].
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub analysis: Analysis,
    pub document: Option<RecommendationDocument>,
}

impl DispatchOutcome {
    fn unanswered(analysis: Analysis) -> Self {
        Self { analysis, document: None }
    }

    /// Split into `(analysis text, document)`.
    pub fn into_parts(self) -> (String, Option<RecommendationDocument>) {
        let text = match self.analysis {
            Analysis::Generated(text) | Analysis::RawContext(text) | Analysis::Failed(text) => text,
            other => other.text().to_string(),
        };
        (text, self.document)
    }
}

/// The advisor orchestrator. Construct one via [`AdvisorPipeline::builder()`].
pub struct AdvisorPipeline {
    config: FinRagConfig,
    gate: KeywordGate,
    retrieval: RetrievalEngine,
    profile_chunker: DocumentChunker,
    document_chunker: DocumentChunker,
    assembler: ContextAssembler,
    documents: StructuredDocumentBuilder,
    profiles: ProfileStore,
    static_knowledge: StaticKnowledge,
    completion: Option<Arc<dyn CompletionService>>,
    market_fetcher: Option<Arc<dyn MarketDataFetcher>>,
    extractor: Option<Arc<dyn AnalysisExtractor>>,
    knowledge_source: Option<Arc<dyn KnowledgeSource>>,
    seen_records: Mutex<HashMap<[u8; 32], IngestStatus>>,
}

impl AdvisorPipeline {
    pub fn builder() -> AdvisorPipelineBuilder {
        AdvisorPipelineBuilder::default()
    }

    pub fn config(&self) -> &FinRagConfig {
        &self.config
    }

    pub fn retrieval(&self) -> &RetrievalEngine {
        &self.retrieval
    }

    pub fn has_completion_service(&self) -> bool {
        self.completion.is_some()
    }

    /// Whether `query` is in the financial domain.
    pub fn gate(&self, query: &str) -> bool {
        self.gate.is_in_domain(query)
    }

    /// Up to `k` passages for `query`. See [`RetrievalEngine::retrieve`].
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        self.retrieval.retrieve(query, k).await
    }

    /// Build prompt context for `query` from already retrieved passages.
    ///
    /// Adds the profile summary for `user_id` when one is registered and live
    /// market data for ticker symbols in the query when fetching is enabled.
    pub async fn assemble_context(
        &self,
        query: &str,
        retrieved: &[Document],
        user_id: Option<&str>,
    ) -> String {
        let profile = match user_id {
            Some(user_id) => self.profiles.get(user_id).await,
            None => None,
        };
        let live_data = self.fetch_live_data(query).await;
        self.assembler.assemble(retrieved, profile.as_ref(), &self.static_knowledge, &live_data)
    }

    async fn fetch_live_data(&self, query: &str) -> Vec<LiveData> {
        let fetcher = match (&self.market_fetcher, self.config.fetch_live_data) {
            (Some(fetcher), true) => fetcher,
            _ => return Vec::new(),
        };
        let mut live_data = Vec::new();
        for symbol in extract_ticker_symbols(query) {
            let metrics = fetcher.fetch(&symbol).await;
            debug!(symbol = %symbol, metric_count = metrics.len(), "market data fetched");
            live_data.push(LiveData { symbol, metrics });
        }
        live_data
    }

    /// Chunk `texts` with the document window and add them to every store.
    ///
    /// Returns the number of chunks ingested. A vector index failure is
    /// logged; the chunks stay retrievable through the keyword store.
    pub async fn ingest_texts<S: AsRef<str>>(&self, source_id: &str, texts: &[S]) -> Result<usize> {
        let chunks = self.document_chunker.split(source_id, texts);
        let status = self.retrieval.ingest(&chunks).await;
        info!(source_id, chunk_count = chunks.len(), status = ?status, "ingested texts");
        Ok(chunks.len())
    }

    /// Reload the knowledge source and ingest records not seen before.
    ///
    /// Records are identified by the SHA-256 of their text, so repeated
    /// reloads never duplicate passages. A record the vector index rejected
    /// earlier is embedded again on the next reload. Returns the number of
    /// new records.
    ///
    /// # Errors
    ///
    /// Returns [`FinRagError::LoaderError`] if the source cannot be read.
    pub async fn update_data(&self) -> Result<usize> {
        let Some(source) = &self.knowledge_source else {
            debug!("no knowledge source configured");
            return Ok(0);
        };
        let texts = source.load().await?;

        let mut seen = self.seen_records.lock().await;
        let mut batch = HashSet::new();
        let mut fresh = Vec::new();
        let mut unindexed = Vec::new();
        for text in texts {
            let digest: [u8; 32] = Sha256::digest(text.as_bytes()).into();
            if !batch.insert(digest) {
                continue;
            }
            match seen.get(&digest) {
                None => fresh.push((digest, text)),
                Some(IngestStatus::KeywordOnly) => unindexed.push((digest, text)),
                Some(IngestStatus::Complete) => {}
            }
        }
        if fresh.is_empty() && unindexed.is_empty() {
            info!("knowledge source unchanged");
            return Ok(0);
        }

        if !fresh.is_empty() {
            let chunks = self.document_chunker.split(KNOWLEDGE_SOURCE_ID, &record_texts(&fresh));
            let status = self.retrieval.ingest(&chunks).await;
            seen.extend(fresh.iter().map(|(digest, _)| (*digest, status)));
        }
        if !unindexed.is_empty() {
            let chunks = self.document_chunker.split(KNOWLEDGE_SOURCE_ID, &record_texts(&unindexed));
            let status = self.retrieval.index_vectors(&chunks).await;
            seen.extend(unindexed.iter().map(|(digest, _)| (*digest, status)));
            info!(records = unindexed.len(), status = ?status, "re-indexed keyword-only records");
        }

        info!(new_records = fresh.len(), "knowledge source refreshed");
        Ok(fresh.len())
    }

    /// Store `profile` and ingest its summary as retrievable passages.
    ///
    /// Returns `true` when the user was not registered before. Re-registering
    /// replaces the profile and keeps its history.
    pub async fn register_profile(&self, profile: UserProfile) -> Result<bool> {
        let source_id = format!("profile:{}", profile.user_id);
        let chunks = self.profile_chunker.split(&source_id, &[profile.summary()]);
        let created = self.profiles.register(profile).await;
        self.retrieval.ingest(&chunks).await;
        Ok(created)
    }

    pub async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<UserProfile> {
        self.profiles.update(user_id, update).await
    }

    pub async fn profile(&self, user_id: &str) -> Option<UserProfile> {
        self.profiles.get(user_id).await
    }

    pub async fn add_history(&self, user_id: &str, entry: InvestmentHistoryEntry) -> Result<()> {
        self.profiles.add_history(user_id, entry).await
    }

    pub async fn history(&self, user_id: &str) -> Vec<InvestmentHistoryEntry> {
        self.profiles.history(user_id).await
    }

    /// Build a structured document directly from caller data.
    pub fn build_document(
        &self,
        tier: Tier,
        user_id: &str,
        data: &Map<String, Value>,
    ) -> Result<RecommendationDocument> {
        self.documents.build(tier, user_id, data)
    }

    /// [`dispatch`](Self::dispatch) with a tier identifier.
    ///
    /// # Errors
    ///
    /// Returns [`FinRagError::InvalidTier`] for unknown identifiers. Every
    /// other failure is reported through the returned analysis.
    pub async fn dispatch_named(
        &self,
        tier: &str,
        query: &str,
        user_id: &str,
        data: Option<Map<String, Value>>,
    ) -> Result<DispatchOutcome> {
        let tier: Tier = tier.parse()?;
        Ok(self.dispatch(tier, query, user_id, data).await)
    }

    /// Answer `query` for `user_id` under `tier`.
    ///
    /// The document is built from `data` when given, otherwise from the
    /// configured [`AnalysisExtractor`] applied to a generated analysis.
    /// Only generated and raw-context analyses carry a document.
    pub async fn dispatch(
        &self,
        tier: Tier,
        query: &str,
        user_id: &str,
        data: Option<Map<String, Value>>,
    ) -> DispatchOutcome {
        if !self.gate.is_in_domain(query) {
            info!(tier = %tier, "query rejected by domain gate");
            return DispatchOutcome::unanswered(Analysis::Refused);
        }

        let analysis = match self.analyze(tier, query, user_id).await {
            Ok(analysis) if !analysis.is_answered() => {
                info!(tier = %tier, analysis = analysis.kind(), "nothing retrieved for query");
                return DispatchOutcome::unanswered(analysis);
            }
            Ok(analysis) => analysis,
            Err(FinRagError::NoDataAvailable) => {
                warn!(tier = %tier, "no financial data available");
                return DispatchOutcome::unanswered(Analysis::NoData);
            }
            Err(e) => {
                error!(tier = %tier, error = %e, "dispatch failed");
                return DispatchOutcome::unanswered(Analysis::Failed(format!("{FAILURE_PREFIX}: {e}")));
            }
        };

        let data = data.or_else(|| match (&analysis, &self.extractor) {
            (Analysis::Generated(text), Some(extractor)) => extractor.extract(tier, text),
            _ => None,
        });
        let document = data.and_then(|data| match self.documents.build(tier, user_id, &data) {
            Ok(document) => Some(document),
            Err(e) => {
                warn!(tier = %tier, error = %e, "structured document rejected");
                None
            }
        });

        info!(tier = %tier, analysis = analysis.kind(), has_document = document.is_some(), "dispatch completed");
        DispatchOutcome { analysis, document }
    }

    async fn analyze(&self, tier: Tier, query: &str, user_id: &str) -> Result<Analysis> {
        if matches!(self.retrieval.resolve_backend().await, RetrievalBackend::Empty) {
            return Err(FinRagError::NoDataAvailable);
        }
        let retrieved = self.retrieval.retrieve(query, self.config.top_k).await?;
        if retrieved.is_empty() {
            return Ok(Analysis::NoMatch);
        }
        let context = self.assemble_context(query, &retrieved, Some(user_id)).await;

        let Some(completion) = &self.completion else {
            debug!(tier = %tier, "no completion service, returning raw context");
            return Ok(Analysis::RawContext(context));
        };

        let request = CompletionRequest {
            system_instruction: tier.system_instruction(),
            user_content: tier.user_prompt(query, &context),
            temperature: self.config.temperature,
        };
        let text = completion.complete(request).await.map_err(|e| {
            error!(tier = %tier, error = %e, "completion failed");
            match e {
                FinRagError::ExternalService { .. } => e,
                other => FinRagError::external("completion", other.to_string()),
            }
        })?;
        Ok(Analysis::Generated(text))
    }
}

fn record_texts(records: &[([u8; 32], String)]) -> Vec<&str> {
    records.iter().map(|(_, text)| text.as_str()).collect()
}

/// Builder for [`AdvisorPipeline`].
///
/// Every collaborator is optional. Without a vector index (or an embedding
/// provider to build one) retrieval runs on the keyword store; without a
/// completion service dispatch returns raw context.
#[derive(Default)]
pub struct AdvisorPipelineBuilder {
    config: Option<FinRagConfig>,
    gate: Option<KeywordGate>,
    assembler: Option<ContextAssembler>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    completion: Option<Arc<dyn CompletionService>>,
    market_fetcher: Option<Arc<dyn MarketDataFetcher>>,
    extractor: Option<Arc<dyn AnalysisExtractor>>,
    knowledge_source: Option<Arc<dyn KnowledgeSource>>,
    static_knowledge: Option<StaticKnowledge>,
}

impl AdvisorPipelineBuilder {
    pub fn config(mut self, config: FinRagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn gate(mut self, gate: KeywordGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn context_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = Some(assembler);
        self
    }

    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Back retrieval with an [`InMemoryVectorIndex`] over this provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn completion_service(mut self, completion: Arc<dyn CompletionService>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn market_fetcher(mut self, fetcher: Arc<dyn MarketDataFetcher>) -> Self {
        self.market_fetcher = Some(fetcher);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn AnalysisExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn knowledge_source(mut self, source: Arc<dyn KnowledgeSource>) -> Self {
        self.knowledge_source = Some(source);
        self
    }

    /// Replace the default investment-transition tables.
    pub fn static_knowledge(mut self, knowledge: StaticKnowledge) -> Self {
        self.static_knowledge = Some(knowledge);
        self
    }

    /// Validate and build the pipeline. Call
    /// [`update_data`](AdvisorPipeline::update_data) afterwards to load the
    /// knowledge source.
    ///
    /// # Errors
    ///
    /// Returns [`FinRagError::ConfigError`] if both a vector index and an
    /// embedding provider are set, or if the chunking windows are invalid.
    pub fn build(self) -> Result<AdvisorPipeline> {
        let config = self.config.unwrap_or_default();
        let vector_index = match (self.vector_index, self.embedding_provider) {
            (Some(_), Some(_)) => {
                return Err(FinRagError::ConfigError(
                    "set either vector_index or embedding_provider, not both".to_string(),
                ));
            }
            (Some(index), None) => Some(index),
            (None, Some(provider)) => {
                Some(Arc::new(InMemoryVectorIndex::new(provider)) as Arc<dyn VectorIndex>)
            }
            (None, None) => None,
        };

        Ok(AdvisorPipeline {
            profile_chunker: DocumentChunker::new(config.profile_chunking)?,
            document_chunker: DocumentChunker::new(config.document_chunking)?,
            documents: StructuredDocumentBuilder::new().with_allocation_check(config.allocation_check),
            gate: self.gate.unwrap_or_default(),
            retrieval: RetrievalEngine::new(vector_index),
            assembler: self.assembler.unwrap_or_default(),
            profiles: ProfileStore::new(),
            static_knowledge: self
                .static_knowledge
                .unwrap_or_else(StaticKnowledge::investment_transition),
            completion: self.completion,
            market_fetcher: self.market_fetcher,
            extractor: self.extractor,
            knowledge_source: self.knowledge_source,
            seen_records: Mutex::new(HashMap::new()),
            config,
        })
    }
}

//! End-to-end dispatch tests with counting test doubles.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use finrag::{
    AdvisorPipeline, Analysis, CompletionRequest, CompletionService, EmbeddingProvider,
    FinRagConfig, FinRagError, FixtureExtractor, JsonRecordsSource, MarketDataFetcher,
    MarketSnapshot, MISSING_DATA_PHRASE, NO_MATCH_MESSAGE, REFUSAL_MESSAGE, RecommendationDocument, Result,
    StaticKnowledge, Tier, UserProfile,
};
use serde_json::{Map, Value, json};

/// Returns a fixed reply (or failure) and records every request.
struct CountingCompletion {
    calls: AtomicUsize,
    reply: std::result::Result<String, String>,
    last_request: std::sync::Mutex<Option<CompletionRequest>>,
}

impl CountingCompletion {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: Ok(text.to_string()),
            last_request: std::sync::Mutex::new(None),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: Err(message.to_string()),
            last_request: std::sync::Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for CountingCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        self.reply.clone().map_err(|message| FinRagError::external("completion", message))
    }
}

/// Returns one metric per symbol and counts fetches.
#[derive(Default)]
struct CountingFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl MarketDataFetcher for CountingFetcher {
    async fn fetch(&self, symbol: &str) -> MarketSnapshot {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut snapshot = Map::new();
        snapshot.insert("symbol".into(), json!(symbol));
        snapshot.insert("pe_ratio".into(), json!(28.5));
        snapshot
    }
}

/// Embeds by counting a few marker words, enough to rank passages.
struct MarkerEmbedder;

#[async_trait]
impl EmbeddingProvider for MarkerEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_lowercase();
        Ok(["dividend", "growth", "bond"]
            .iter()
            .map(|marker| text.matches(marker).count() as f32 + 0.01)
            .collect())
    }

    fn dimensions(&self) -> usize {
        3
    }
}

/// Fails its first embedding call, then embeds by text length.
#[derive(Default)]
struct FlakyEmbedder {
    tripped: AtomicBool,
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            return Err(FinRagError::external("embedding", "timeout"));
        }
        Ok(vec![text.len() as f32 + 1.0, 1.0])
    }

    fn dimensions(&self) -> usize {
        2
    }
}

fn data(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn keyword_pipeline() -> AdvisorPipeline {
    AdvisorPipeline::builder().static_knowledge(StaticKnowledge::empty()).build().unwrap()
}

#[tokio::test]
async fn raw_context_and_caller_data_without_completion() {
    let pipeline = keyword_pipeline();
    pipeline
        .ingest_texts("seed", &["Index funds offer low-cost diversification for new investors"])
        .await
        .unwrap();

    let outcome = pipeline
        .dispatch(
            Tier::NewInvestor,
            "Which index funds should I invest in?",
            "u1",
            Some(data(json!({"total_funds": 10000}))),
        )
        .await;

    assert_eq!(
        outcome.analysis,
        Analysis::RawContext("Index funds offer low-cost diversification for new investors".into())
    );
    let Some(RecommendationDocument::NewInvestor(doc)) = outcome.document else {
        panic!("expected a new investor document");
    };
    assert_eq!(doc.user_id, "u1");
    assert_eq!(doc.investment_profile.total_funds, serde_json::Number::from(10000));
    assert_eq!(doc.investment_profile.risk_tolerance, "Low");
}

#[tokio::test]
async fn conservative_investor_gets_assembled_context_verbatim() {
    let pipeline = AdvisorPipeline::builder().build().unwrap();
    pipeline
        .ingest_texts(
            "seed",
            &[
                "Conservative investors favor government bonds and broad index funds",
                "High-yield savings accounts hold an emergency fund",
            ],
        )
        .await
        .unwrap();
    let query = "What should I do with $10,000 as a conservative investor?";

    let retrieved = pipeline.retrieve(query, pipeline.config().top_k).await.unwrap();
    assert!(!retrieved.is_empty());
    let expected = pipeline.assemble_context(query, &retrieved, Some("u1")).await;
    assert!(expected.contains("Mindset Shifts:"));

    let outcome = pipeline
        .dispatch(Tier::NewInvestor, query, "u1", Some(data(json!({"total_funds": 10000}))))
        .await;

    assert_eq!(outcome.analysis, Analysis::RawContext(expected));
    let Some(RecommendationDocument::NewInvestor(doc)) = outcome.document else {
        panic!("expected a new investor document");
    };
    assert_eq!(doc.investment_profile.total_funds, serde_json::Number::from(10000));
    assert_eq!(doc.new_investment_plan.total_amount, serde_json::Number::from(10000));
}

#[tokio::test]
async fn unmatched_query_skips_completion() {
    let completion = CountingCompletion::replying("unused");
    let pipeline = AdvisorPipeline::builder().completion_service(completion.clone()).build().unwrap();
    pipeline.ingest_texts("seed", &["zzz"]).await.unwrap();

    let outcome = pipeline.dispatch(Tier::ReadyToInvest, "stock", "u1", Some(Map::new())).await;

    assert_eq!(outcome.analysis, Analysis::NoMatch);
    assert_eq!(outcome.analysis.text(), NO_MATCH_MESSAGE);
    assert!(outcome.document.is_none());
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn out_of_domain_never_reaches_completion() {
    let completion = CountingCompletion::replying("unused");
    let pipeline = AdvisorPipeline::builder().completion_service(completion.clone()).build().unwrap();
    pipeline.ingest_texts("seed", &["stock market basics"]).await.unwrap();

    let (analysis, document) = pipeline
        .dispatch(Tier::ReadyToInvest, "What is my dog's name?", "u1", Some(Map::new()))
        .await
        .into_parts();

    assert_eq!(analysis, REFUSAL_MESSAGE);
    assert!(document.is_none());
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn empty_stores_report_no_data_without_completion_call() {
    let completion = CountingCompletion::replying("unused");
    let pipeline = AdvisorPipeline::builder().completion_service(completion.clone()).build().unwrap();

    let outcome = pipeline.dispatch(Tier::InvestedUser, "rebalance my portfolio", "u1", None).await;

    assert_eq!(outcome.analysis, Analysis::NoData);
    assert!(outcome.document.is_none());
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn completion_failure_becomes_error_text() {
    let completion = CountingCompletion::failing("connection reset");
    let pipeline = AdvisorPipeline::builder().completion_service(completion.clone()).build().unwrap();
    pipeline.ingest_texts("seed", &["bond yields rose"]).await.unwrap();

    let outcome = pipeline
        .dispatch(Tier::ReadyToInvest, "are bond yields attractive", "u1", Some(Map::new()))
        .await;

    let Analysis::Failed(message) = &outcome.analysis else {
        panic!("expected a failure, got {:?}", outcome.analysis);
    };
    assert!(message.starts_with("Error analyzing financial data"));
    assert!(message.contains("connection reset"));
    assert!(outcome.document.is_none());
    assert_eq!(completion.calls(), 1);
}

#[tokio::test]
async fn generated_analysis_uses_tier_prompt_and_extractor() {
    let completion = CountingCompletion::replying("Portfolio looks concentrated.");
    let fetcher = Arc::new(CountingFetcher::default());
    let pipeline = AdvisorPipeline::builder()
        .config(FinRagConfig::builder().temperature(0.2).build().unwrap())
        .completion_service(completion.clone())
        .market_fetcher(fetcher.clone())
        .extractor(Arc::new(FixtureExtractor))
        .build()
        .unwrap();
    pipeline.ingest_texts("seed", &["AAPL dividend history and growth"]).await.unwrap();

    let outcome = pipeline
        .dispatch(Tier::InvestedUser, "Should we add AAPL to our portfolio?", "u9", None)
        .await;

    assert_eq!(outcome.analysis, Analysis::Generated("Portfolio looks concentrated.".into()));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

    let request = completion.last_request.lock().unwrap().clone().unwrap();
    assert!((request.temperature - 0.2).abs() < f32::EPSILON);
    assert!(request.system_instruction.contains("5. Portfolio rebalancing suggestions"));
    assert!(request.system_instruction.contains(MISSING_DATA_PHRASE));
    assert!(request.user_content.contains("AAPL dividend history and growth"));
    assert!(request.user_content.contains("Stock Data for AAPL:"));
    assert!(request.user_content.contains("Mindset Shifts:"));

    let Some(RecommendationDocument::InvestedUser(doc)) = outcome.document else {
        panic!("expected an invested user document");
    };
    assert_eq!(doc.user_id, "u9");
    assert_eq!(doc.visualizations.risk_analysis.data.dimensions.len(), 5);
}

#[tokio::test]
async fn live_data_fetch_can_be_disabled() {
    let fetcher = Arc::new(CountingFetcher::default());
    let pipeline = AdvisorPipeline::builder()
        .config(FinRagConfig::builder().fetch_live_data(false).build().unwrap())
        .market_fetcher(fetcher.clone())
        .build()
        .unwrap();
    pipeline.ingest_texts("seed", &["MSFT earnings beat"]).await.unwrap();

    let (analysis, _) = pipeline
        .dispatch(Tier::ReadyToInvest, "MSFT earnings outlook", "u1", None)
        .await
        .into_parts();

    assert!(!analysis.contains("Stock Data for MSFT"));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_tier_propagates() {
    let pipeline = keyword_pipeline();
    let err = pipeline.dispatch_named("day_trader", "stock tips", "u1", None).await.unwrap_err();
    assert!(matches!(err, FinRagError::InvalidTier(tier) if tier == "day_trader"));
    assert!(pipeline.dispatch_named("no_idea", "stock tips", "u1", None).await.is_ok());
}

#[tokio::test]
async fn vector_path_preferred_when_populated() {
    let pipeline = AdvisorPipeline::builder()
        .embedding_provider(Arc::new(MarkerEmbedder))
        .static_knowledge(StaticKnowledge::empty())
        .build()
        .unwrap();
    pipeline
        .ingest_texts("seed", &["bond ladder strategy", "dividend dividend growth stocks"])
        .await
        .unwrap();

    let docs = pipeline.retrieve("dividend income", 1).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].content, "dividend dividend growth stocks");
}

#[tokio::test]
async fn registered_profile_feeds_context_and_retrieval() {
    let pipeline = keyword_pipeline();
    let profile: UserProfile = serde_json::from_value(json!({
        "user_id": "alice",
        "investment_goals": ["retirement"],
        "risk_tolerance": "conservative",
        "investment_horizon": "long",
        "preferred_sectors": ["utilities"],
        "monthly_investment": 500.0,
        "total_investable_assets": 20000.0
    }))
    .unwrap();

    assert!(pipeline.register_profile(profile.clone()).await.unwrap());
    assert!(!pipeline.register_profile(profile).await.unwrap());

    let context = pipeline.assemble_context("utilities", &[], Some("alice")).await;
    assert!(context.contains("User Profile:"));
    assert!(context.contains("utilities"));

    let passages = pipeline.retrieve("utilities", 3).await.unwrap();
    assert_eq!(passages.len(), 2);
    assert!(passages.iter().all(|d| d.content.contains("Preferred Sectors: utilities")));

    let err = pipeline
        .add_history("bob", serde_json::from_value(json!({"action": "buy", "amount": 100.0, "investment_type": "stock"})).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, FinRagError::UnknownUser(_)));
}

#[tokio::test]
async fn update_data_ingests_only_new_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("finance.json");
    std::fs::write(&path, r#"[{"topic": "stock splits"}, {"topic": "bond ladders"}]"#).unwrap();

    let pipeline = AdvisorPipeline::builder()
        .knowledge_source(Arc::new(JsonRecordsSource::new(&path)))
        .build()
        .unwrap();

    assert_eq!(pipeline.update_data().await.unwrap(), 2);
    assert_eq!(pipeline.update_data().await.unwrap(), 0);

    std::fs::write(
        &path,
        r#"[{"topic": "stock splits"}, {"topic": "bond ladders"}, {"topic": "dividend reinvestment"}]"#,
    )
    .unwrap();
    assert_eq!(pipeline.update_data().await.unwrap(), 1);
    assert_eq!(pipeline.retrieval().keyword_index().len().await, 3);
}

#[tokio::test]
async fn rejected_embedding_is_retried_on_next_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("finance.json");
    std::fs::write(&path, r#"[{"topic": "bond ladders"}]"#).unwrap();

    let pipeline = AdvisorPipeline::builder()
        .embedding_provider(Arc::new(FlakyEmbedder::default()))
        .knowledge_source(Arc::new(JsonRecordsSource::new(&path)))
        .build()
        .unwrap();

    assert_eq!(pipeline.update_data().await.unwrap(), 1);
    assert_eq!(pipeline.retrieval().resolve_backend().await.kind(), "keyword");

    assert_eq!(pipeline.update_data().await.unwrap(), 0);
    assert_eq!(pipeline.retrieval().resolve_backend().await.kind(), "vector");

    pipeline.ingest_texts("later", &["stock splits"]).await.unwrap();
    let docs = pipeline.retrieve("bond ladders", 5).await.unwrap();
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().any(|d| d.content.contains("bond ladders")));
    assert_eq!(pipeline.retrieval().keyword_index().len().await, 2);
}

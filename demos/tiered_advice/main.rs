//! # Tiered Advice Example
//!
//! Demonstrates the advisor pipeline: ingest knowledge records, register a
//! profile, then dispatch the same question under every tier.
//!
//! Uses `InMemoryVectorIndex` with a deterministic `MockEmbeddingProvider`
//! and no completion service, so it runs with **zero API keys**. Analyses
//! are the raw assembled context; documents come from `FixtureExtractor`
//! sample data supplied as caller data.
//!
//! Run: `cargo run -p finrag-demos --example tiered_advice`

use std::sync::Arc;

use finrag::{
    AdvisorPipeline, EmbeddingProvider, FinRagConfig, FixtureExtractor, StaticKnowledge, Tier,
    UserProfile,
};

// ---------------------------------------------------------------------------
// MockEmbeddingProvider: bag-of-words hashing into a fixed number of buckets
// ---------------------------------------------------------------------------

struct MockEmbeddingProvider {
    dimensions: usize,
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> finrag::Result<Vec<f32>> {
        let mut emb = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            emb[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("finrag=info").init();

    // -- 1. Build the pipeline --------------------------------------------
    let pipeline = AdvisorPipeline::builder()
        .config(FinRagConfig::builder().top_k(2).build()?)
        .embedding_provider(Arc::new(MockEmbeddingProvider { dimensions: 64 }))
        .static_knowledge(StaticKnowledge::empty())
        .build()?;

    // -- 2. Ingest knowledge records --------------------------------------
    let records = [
        r#"{"topic":"index funds","summary":"Index funds track a market index with low fees and broad diversification."}"#,
        r#"{"topic":"bonds","summary":"Government bonds pay fixed interest and reduce portfolio volatility."}"#,
        r#"{"topic":"emergency fund","summary":"Keep three to six months of expenses in a high-yield savings account."}"#,
    ];
    let chunks = pipeline.ingest_texts("finance.json", &records).await?;
    println!("Ingested {} records as {chunks} chunks", records.len());

    // -- 3. Register a profile --------------------------------------------
    let profile: UserProfile = serde_json::from_value(serde_json::json!({
        "user_id": "demo",
        "investment_goals": ["retirement", "wealth building"],
        "risk_tolerance": "moderate",
        "investment_horizon": "long",
        "preferred_sectors": ["technology", "healthcare"],
        "monthly_investment": 750.0,
        "total_investable_assets": 50000.0,
        "current_portfolio": {"stocks": {"VTI": {"shares": 40, "avg_price": 210.0}}}
    }))?;
    println!("Portfolio value: {:.2}", profile.portfolio_value());
    pipeline.register_profile(profile).await?;

    // -- 4. Dispatch under every tier -------------------------------------
    let query = "How should I split my investment between index funds and bonds?";
    println!("\nGate: {query:?} in domain = {}", pipeline.gate(query));

    for tier in Tier::ALL {
        let outcome =
            pipeline.dispatch(tier, query, "demo", Some(FixtureExtractor::fixture(tier))).await;
        println!("\n=== {tier} ({}) ===", outcome.analysis.kind());
        println!("{}", outcome.analysis.text());
        if let Some(document) = outcome.document {
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
    }

    // -- 5. An out-of-domain query ----------------------------------------
    let (analysis, document) =
        pipeline.dispatch(Tier::NewInvestor, "What is my dog's name?", "demo", None).await.into_parts();
    println!("\nOut of domain: {analysis} (document: {})", document.is_some());

    Ok(())
}

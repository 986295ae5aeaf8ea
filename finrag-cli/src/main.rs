use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use finrag::{
    AdvisorPipeline, FinRagConfig, FixtureExtractor, JsonBlockExtractor, JsonRecordsSource,
    KeywordGate, RecommendationDocument, Tier, UserProfile,
};
use serde_json::{Map, Value};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "finrag")]
#[command(about = "Tiered investment recommendations over a gated financial knowledge base")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a query is in the financial domain
    Gate {
        query: String,
    },

    /// Answer one query for a user tier
    Ask {
        /// new_investor (alias no_idea), ready_to_invest or invested_user
        #[arg(short, long)]
        tier: String,
        #[arg(short, long)]
        user: String,
        /// JSON object used to build the structured document
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// JSON array of knowledge records
        #[arg(short, long, env = "FINRAG_KNOWLEDGE", default_value = "finance.json")]
        knowledge: PathBuf,
        /// JSON array of user profiles to register first
        #[arg(short, long)]
        profiles: Option<PathBuf>,
        query: String,
    },

    /// Build a structured document from a data file
    Document {
        #[arg(short, long)]
        tier: String,
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        data: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Gate { query } => {
            let gate = KeywordGate::new();
            let matched = gate.matched_terms(&query);
            println!("in_domain: {}", !matched.is_empty());
            if !matched.is_empty() {
                println!("matched: {}", matched.into_iter().collect::<Vec<_>>().join(", "));
            }
        }
        Commands::Ask { tier, user, data, knowledge, profiles, query } => {
            let tier: Tier = tier.parse()?;
            let pipeline = build_pipeline(&knowledge)?;
            pipeline.update_data().await.context("failed to load knowledge records")?;

            if let Some(path) = profiles {
                for profile in read_json::<Vec<UserProfile>>(&path)? {
                    pipeline.register_profile(profile).await?;
                }
            }
            let data = data.as_deref().map(read_data).transpose()?;

            let outcome = pipeline.dispatch(tier, &query, &user, data).await;
            println!("[analysis: {}]", outcome.analysis.kind());
            println!("{}", outcome.analysis.text());
            print_document(outcome.document.as_ref())?;
        }
        Commands::Document { tier, user, data } => {
            let pipeline = AdvisorPipeline::builder().config(FinRagConfig::from_env()?).build()?;
            let document = pipeline.build_document(tier.parse()?, &user, &read_data(&data)?)?;
            print_document(Some(&document))?;
        }
    }
    Ok(())
}

fn build_pipeline(knowledge: &Path) -> Result<AdvisorPipeline> {
    let mut builder = AdvisorPipeline::builder()
        .config(FinRagConfig::from_env()?)
        .knowledge_source(Arc::new(JsonRecordsSource::new(knowledge)))
        .extractor(Arc::new(JsonBlockExtractor::with_fallback(FixtureExtractor)));

    #[cfg(feature = "openai")]
    {
        if std::env::var("OPENAI_API_KEY").is_ok_and(|key| !key.is_empty()) {
            builder = builder
                .embedding_provider(Arc::new(finrag::OpenAIEmbeddingProvider::from_env()?))
                .completion_service(Arc::new(finrag::OpenAICompletion::from_env()?));
            info!("using OpenAI embeddings and completions");
        } else {
            warn!("OPENAI_API_KEY not set, using keyword retrieval and raw context");
        }
    }
    #[cfg(not(feature = "openai"))]
    warn!("built without OpenAI support, using keyword retrieval and raw context");

    #[cfg(feature = "yahoo")]
    {
        builder = builder.market_fetcher(Arc::new(finrag::YahooFinanceFetcher::new()));
    }

    Ok(builder.build()?)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn read_data(path: &Path) -> Result<Map<String, Value>> {
    match read_json::<Value>(path)? {
        Value::Object(map) => Ok(map),
        _ => bail!("{} must contain a JSON object", path.display()),
    }
}

fn print_document(document: Option<&RecommendationDocument>) -> Result<()> {
    if let Some(document) = document {
        println!("{}", serde_json::to_string_pretty(document)?);
    }
    Ok(())
}

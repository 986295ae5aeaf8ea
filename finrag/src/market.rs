//! Live market-data seam and ticker detection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metrics returned for one symbol. Empty when the fetch failed.
pub type MarketSnapshot = Map<String, Value>;

/// Fetches live metrics for a ticker symbol.
///
/// Implementations never fail into the caller: on any error they log and
/// return an empty or partial snapshot.
#[async_trait]
pub trait MarketDataFetcher: Send + Sync {
    async fn fetch(&self, symbol: &str) -> MarketSnapshot;
}

/// A fetched snapshot tagged with its symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiveData {
    pub symbol: String,
    pub metrics: MarketSnapshot,
}

/// Candidate ticker symbols in `query`.
///
/// A whitespace token is a candidate when, after trimming surrounding
/// punctuation, it is at most five characters long, contains at least one
/// letter, and every letter in it is uppercase. Duplicates are dropped and
/// first-seen order is kept.
pub fn extract_ticker_symbols(query: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for token in query.split_whitespace() {
        let token = token.trim_matches(|c: char| c.is_ascii_punctuation() && c != '.');
        let token = token.trim_end_matches('.');
        if token.is_empty() || token.chars().count() > 5 {
            continue;
        }
        let has_letter = token.chars().any(char::is_alphabetic);
        let all_upper = token.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase);
        if has_letter && all_upper && !symbols.iter().any(|s| s == token) {
            symbols.push(token.to_string());
        }
    }
    symbols
}

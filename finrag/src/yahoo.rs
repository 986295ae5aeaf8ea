//! Yahoo Finance quote fetcher.
//!
//! This module is only available when the `yahoo` feature is enabled.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::market::{MarketDataFetcher, MarketSnapshot};

const DEFAULT_QUOTE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/quote";

/// A [`MarketDataFetcher`] reading Yahoo's public quote endpoint.
///
/// Fields missing from the response default to `""` or `0`. Any transport
/// or decoding failure yields an empty snapshot.
pub struct YahooFinanceFetcher {
    client: reqwest::Client,
    quote_url: String,
}

impl Default for YahooFinanceFetcher {
    fn default() -> Self {
        Self { client: reqwest::Client::new(), quote_url: DEFAULT_QUOTE_URL.into() }
    }
}

impl YahooFinanceFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote_url(mut self, url: impl Into<String>) -> Self {
        self.quote_url = url.into();
        self
    }

    async fn quote(&self, symbol: &str) -> Result<Map<String, Value>, String> {
        let response = self
            .client
            .get(&self.quote_url)
            .query(&[("symbols", symbol)])
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("quote endpoint returned {}", response.status()));
        }
        let body: Value = response.json().await.map_err(|e| format!("invalid response: {e}"))?;
        body.pointer("/quoteResponse/result/0")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| "symbol not found".to_string())
    }

    /// Project a raw quote onto the snapshot layout used in prompt context.
    pub fn snapshot(symbol: &str, quote: &Map<String, Value>) -> MarketSnapshot {
        let text = |key: &str| quote.get(key).and_then(Value::as_str).unwrap_or("").to_string();
        let num = |key: &str| quote.get(key).filter(|v| v.is_number()).cloned().unwrap_or(json!(0));
        let value = json!({
            "symbol": symbol,
            "company_name": text("longName"),
            "sector": text("sector"),
            "industry": text("industry"),
            "market_cap": num("marketCap"),
            "pe_ratio": num("forwardPE"),
            "dividend_yield": num("dividendYield"),
            "52_week_high": num("fiftyTwoWeekHigh"),
            "52_week_low": num("fiftyTwoWeekLow"),
            "volume": num("regularMarketVolume"),
            "avg_volume": num("averageDailyVolume3Month"),
            "financial_metrics": {
                "revenue": num("totalRevenue"),
                "profit_margin": num("profitMargins"),
                "operating_margin": num("operatingMargins"),
                "return_on_equity": num("returnOnEquity"),
                "total_debt": num("totalDebt"),
                "total_cash": num("totalCash")
            }
        });
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

#[async_trait]
impl MarketDataFetcher for YahooFinanceFetcher {
    async fn fetch(&self, symbol: &str) -> MarketSnapshot {
        match self.quote(symbol).await {
            Ok(quote) => {
                debug!(symbol, "fetched market quote");
                Self::snapshot(symbol, &quote)
            }
            Err(e) => {
                warn!(symbol, error = %e, "market data fetch failed");
                MarketSnapshot::new()
            }
        }
    }
}

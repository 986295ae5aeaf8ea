//! Turning generated analysis text into a document data dictionary.
//!
//! The dispatcher runs an [`AnalysisExtractor`] when the caller supplies no
//! data of its own. Real text-to-structure extraction is not provided here.
//! [`FixtureExtractor`] returns fixed sample data per tier and
//! [`JsonBlockExtractor`] reads a JSON object the completion emitted inline.

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::tier::Tier;

/// Derives a data dictionary for [`StructuredDocumentBuilder`](crate::StructuredDocumentBuilder)
/// from analysis text.
pub trait AnalysisExtractor: Send + Sync {
    /// `None` means no document should be built for this analysis.
    fn extract(&self, tier: Tier, analysis: &str) -> Option<Map<String, Value>>;
}

/// Ignores the analysis and returns the same sample data for every call.
///
/// This is a stand-in for a real extractor. Documents built from it
/// describe a fictional user, not the person who asked.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureExtractor;

impl FixtureExtractor {
    /// Sample data for `tier`.
    pub fn fixture(tier: Tier) -> Map<String, Value> {
        let value = match tier {
            Tier::NewInvestor => json!({
                "investment_goal": "Start Investing",
                "risk_tolerance": "Low",
                "investment_horizon": "5+ years",
                "total_funds": 10000,
                "recommended_allocation": [
                    {"type": "Fixed Deposits", "percentage": 40, "amount": 4000,
                     "reason": "Safe and stable returns"},
                    {"type": "Index Funds", "percentage": 30, "amount": 3000,
                     "reason": "Market exposure with lower risk"},
                    {"type": "High-Yield Savings", "percentage": 30, "amount": 3000,
                     "reason": "Emergency fund"}
                ],
                "emergency_fund": {"amount": 3000, "bank": "High-yield savings account"},
                "investment_rationale": [
                    "Start with low-risk investments",
                    "Focus on learning and understanding",
                    "Build emergency fund first"
                ],
                "risk_management": [
                    "Diversification across asset types",
                    "Regular monitoring",
                    "Start small and increase gradually"
                ],
                "next_steps": [
                    "Open a savings account",
                    "Research index funds",
                    "Set up automatic savings plan"
                ]
            }),
            Tier::ReadyToInvest => json!({
                "investment_goal": "Long-term Growth",
                "risk_tolerance": "Medium",
                "investment_horizon": "10+ years",
                "total_funds": 50000,
                "recommended_allocation": [
                    {"type": "Index Funds", "percentage": 60, "amount": 30000,
                     "reason": "Core portfolio growth"},
                    {"type": "Bonds", "percentage": 30, "amount": 15000, "reason": "Stability"},
                    {"type": "Cash", "percentage": 10, "amount": 5000, "reason": "Emergency fund"}
                ],
                "investment_vehicles": [
                    {"type": "ETF", "name": "Total Market Index", "allocation": 40, "amount": 20000,
                     "features": ["Low cost", "Broad diversification"], "risks": ["Market risk"]}
                ],
                "implementation_strategy": [
                    "Open brokerage account",
                    "Set up automatic investments",
                    "Start with index funds"
                ],
                "monitoring_plan": ["Monthly portfolio review", "Quarterly rebalancing check"],
                "rebalancing_schedule": {"frequency": "Quarterly", "threshold": "5% deviation"}
            }),
            Tier::InvestedUser => json!({
                "investment_goal": "Wealth Growth",
                "risk_tolerance": "High",
                "investment_horizon": "Long-term",
                "total_portfolio_value": 100000,
                "current_investment": {
                    "total_amount": 75000,
                    "allocation": [
                        {"type": "Stocks", "percentage": 60, "amount": 45000,
                         "holdings": ["AAPL", "MSFT", "GOOGL"]},
                        {"type": "Bonds", "percentage": 40, "amount": 30000,
                         "holdings": ["Treasury Bonds", "Corporate Bonds"]}
                    ]
                },
                "new_investment": {
                    "total_amount": 25000,
                    "allocation": [
                        {"type": "ETFs", "percentage": 50, "amount": 12500, "reason": "Diversification"},
                        {"type": "Real Estate", "percentage": 50, "amount": 12500,
                         "reason": "Income generation"}
                    ],
                    "rationale": ["Market conditions favorable", "Sector rotation needed"]
                },
                "portfolio_analysis": {"diversification_score": 0.85, "risk_adjusted_return": 0.12},
                "risk_metrics": {"beta": 1.2, "sharpe_ratio": 1.5, "max_drawdown": -0.15},
                "tax_considerations": [
                    "Tax-loss harvesting opportunities",
                    "Long-term capital gains"
                ]
            }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl AnalysisExtractor for FixtureExtractor {
    fn extract(&self, tier: Tier, _analysis: &str) -> Option<Map<String, Value>> {
        Some(Self::fixture(tier))
    }
}

/// Reads the first JSON object embedded in the analysis.
///
/// Looks for a fenced code block first, then for the outermost `{...}` span.
/// When nothing parses, defers to the fallback extractor if one is set.
#[derive(Default)]
pub struct JsonBlockExtractor {
    fallback: Option<Box<dyn AnalysisExtractor>>,
}

impl JsonBlockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(fallback: impl AnalysisExtractor + 'static) -> Self {
        Self { fallback: Some(Box::new(fallback)) }
    }

    fn fenced_block(text: &str) -> Option<&str> {
        let start_markers = ["```json\n", "```json\r\n", "```\n", "```\r\n"];
        for start in start_markers {
            if let Some(start_idx) = text.find(start) {
                let content_start = start_idx + start.len();
                if let Some(end_idx) = text[content_start..].find("```") {
                    return Some(text[content_start..content_start + end_idx].trim());
                }
            }
        }
        None
    }

    fn brace_span(text: &str) -> Option<&str> {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        (end > start).then(|| &text[start..=end])
    }

    fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "analysis JSON block did not parse");
                None
            }
        }
    }
}

impl AnalysisExtractor for JsonBlockExtractor {
    fn extract(&self, tier: Tier, analysis: &str) -> Option<Map<String, Value>> {
        Self::fenced_block(analysis)
            .and_then(Self::parse_object)
            .or_else(|| Self::brace_span(analysis).and_then(Self::parse_object))
            .or_else(|| self.fallback.as_ref().and_then(|f| f.extract(tier, analysis)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_match_their_tier() {
        let fresh = FixtureExtractor.extract(Tier::NewInvestor, "anything").unwrap();
        assert_eq!(fresh["total_funds"], json!(10000));
        assert_eq!(fresh["recommended_allocation"].as_array().unwrap().len(), 3);

        let invested = FixtureExtractor::fixture(Tier::InvestedUser);
        assert_eq!(invested["risk_metrics"]["beta"], json!(1.2));
        assert!(invested.get("total_funds").is_none());
    }

    #[test]
    fn reads_fenced_json() {
        let text = "Here is the plan:\n```json\n{\"total_funds\": 2500}\n```\nGood luck.";
        let data = JsonBlockExtractor::new().extract(Tier::NewInvestor, text).unwrap();
        assert_eq!(data["total_funds"], json!(2500));
    }

    #[test]
    fn reads_bare_object() {
        let text = "Summary {\"investment_goal\": \"Retire\"} end";
        let data = JsonBlockExtractor::new().extract(Tier::ReadyToInvest, text).unwrap();
        assert_eq!(data["investment_goal"], json!("Retire"));
    }

    #[test]
    fn falls_back_when_nothing_parses() {
        assert!(JsonBlockExtractor::new().extract(Tier::NewInvestor, "no json {here").is_none());
        let data = JsonBlockExtractor::with_fallback(FixtureExtractor)
            .extract(Tier::ReadyToInvest, "plain prose")
            .unwrap();
        assert_eq!(data["total_funds"], json!(50000));
    }
}

//! Static domain-knowledge tables appended to every prompt context.

use serde::Serialize;
use serde_json::{Value, json};

/// One titled table of reference knowledge.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KnowledgeSection {
    pub title: String,
    pub body: Value,
}

/// An ordered collection of [`KnowledgeSection`]s.
///
/// Sections render in insertion order.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StaticKnowledge {
    sections: Vec<KnowledgeSection>,
}

impl StaticKnowledge {
    /// An empty table set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a section.
    pub fn with_section(mut self, title: impl Into<String>, body: Value) -> Self {
        self.sections.push(KnowledgeSection { title: title.into(), body });
        self
    }

    pub fn sections(&self) -> &[KnowledgeSection] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Render every section as `"{title}:\n{pretty json}"`, blank-line separated.
    pub fn to_text(&self) -> String {
        self.sections
            .iter()
            .map(|section| {
                let body = serde_json::to_string_pretty(&section.body)
                    .unwrap_or_else(|_| section.body.to_string());
                format!("{}:\n{}", section.title, body)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Tables for moving from stock trading to strategic investing: mindset
    /// shifts, strategy frameworks, risk-management rules and valuation metrics.
    pub fn investment_transition() -> Self {
        Self::empty()
            .with_section(
                "Mindset Shifts",
                json!({
                    "short_term_to_long_term": {
                        "before": "Focusing on daily price movements and quick profits",
                        "after": "Building long-term wealth through compound interest",
                        "example": "Amazon stock dropped 90% in 2000 but grew 100x by 2020"
                    },
                    "emotional_to_analytical": {
                        "before": "Making decisions based on market sentiment",
                        "after": "Using data-driven analysis and fundamental research",
                        "example": "Buffett's famous quote: 'Be fearful when others are greedy'"
                    },
                    "speculative_to_strategic": {
                        "before": "Chasing hot tips and trends",
                        "after": "Following a well-defined investment strategy",
                        "example": "Peter Lynch's 'Invest in what you know' principle"
                    }
                }),
            )
            .with_section(
                "Strategy Frameworks",
                json!({
                    "value_investing": {
                        "description": "Buy undervalued companies with strong fundamentals",
                        "metrics": ["P/E ratio", "Price to Book", "ROE", "Debt/Equity"],
                        "example": "Warren Buffett's investment in Coca-Cola in 1988"
                    },
                    "growth_investing": {
                        "description": "Focus on companies with high revenue/profit growth",
                        "metrics": ["Revenue Growth", "Profit Margins", "Market Share"],
                        "example": "Peter Lynch's investment in Starbucks in 1992"
                    },
                    "dividend_investing": {
                        "description": "Target companies with consistent dividend payments",
                        "metrics": ["Dividend Yield", "Payout Ratio", "Dividend Growth"],
                        "example": "Johnson & Johnson's 60+ years of dividend increases"
                    }
                }),
            )
            .with_section(
                "Risk Management Rules",
                json!({
                    "position_sizing": {
                        "rule": "Never invest more than 5% in a single stock",
                        "rationale": "Protects against individual stock risk",
                        "example": "If portfolio is $100,000, max $5,000 per stock"
                    },
                    "stop_loss": {
                        "rule": "Set stop-loss at 15% below purchase price",
                        "rationale": "Limits downside while allowing for normal volatility",
                        "example": "Buy at $100, stop-loss at $85"
                    },
                    "cash_reserve": {
                        "rule": "Maintain 20% cash for market opportunities",
                        "rationale": "Allows buying quality stocks during market crashes",
                        "example": "During March 2020 crash, many quality stocks were available at discounts"
                    }
                }),
            )
            .with_section(
                "Portfolio Metrics",
                json!({
                    "valuation": {
                        "P/E_ratio": {
                            "ideal": "Below industry average",
                            "example": "TCS P/E 30 vs Infosys 25",
                            "interpretation": "Lower P/E might indicate better value"
                        },
                        "ROE": {
                            "ideal": "Above 15%",
                            "example": "Asian Paints ROE 25%",
                            "interpretation": "Higher ROE indicates efficient capital usage"
                        },
                        "Debt_to_Equity": {
                            "ideal": "Below 1",
                            "example": "Reliance 0.8",
                            "interpretation": "Lower ratio indicates less financial risk"
                        }
                    }
                }),
            )
    }
}

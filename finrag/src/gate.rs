//! Finance-vocabulary domain gate.
//!
//! Every request passes through [`KeywordGate`] before retrieval or
//! generation. Queries that contain no vocabulary term are refused with
//! [`REFUSAL_MESSAGE`] and never reach the completion service.

use std::collections::BTreeSet;

/// The fixed answer given to out-of-domain queries.
pub const REFUSAL_MESSAGE: &str =
    "I can only provide information about investment topics available in our financial database.";

/// The default finance vocabulary.
pub const FINANCE_TERMS: &[&str] = &[
    "invest",
    "stock",
    "bond",
    "fund",
    "market",
    "portfolio",
    "risk",
    "return",
    "dividend",
    "asset",
    "equity",
    "trading",
    "financial",
    "money",
    "capital",
    "profit",
    "loss",
    "balance",
    "account",
    "price",
    "value",
    "growth",
    "income",
    "debt",
    "credit",
    "interest",
    "rate",
    "sector",
    "industry",
    "revenue",
    "margin",
    "cash",
    "volume",
    "yield",
    "market cap",
    "PE ratio",
    "P/E ratio",
    "ROE",
    "earnings",
    "volatility",
];

/// Classifies queries as in-domain by case-insensitive substring match.
#[derive(Debug, Clone)]
pub struct KeywordGate {
    /// `(term as given, lowercased term)` pairs.
    terms: Vec<(String, String)>,
}

impl Default for KeywordGate {
    fn default() -> Self {
        Self::with_terms(FINANCE_TERMS.iter().copied())
    }
}

impl KeywordGate {
    /// Create a gate over the default [`FINANCE_TERMS`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gate over a custom vocabulary. Blank terms are ignored.
    pub fn with_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let terms = terms
            .into_iter()
            .map(Into::into)
            .filter(|term| !term.trim().is_empty())
            .map(|term| {
                let lowered = term.to_lowercase();
                (term, lowered)
            })
            .collect();
        Self { terms }
    }

    /// Whether at least one vocabulary term occurs in `query`.
    pub fn is_in_domain(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.terms.iter().any(|(_, lowered)| query.contains(lowered.as_str()))
    }

    /// The vocabulary terms that occur in `query`.
    pub fn matched_terms(&self, query: &str) -> BTreeSet<String> {
        let query = query.to_lowercase();
        self.terms
            .iter()
            .filter(|(_, lowered)| query.contains(lowered.as_str()))
            .map(|(term, _)| term.clone())
            .collect()
    }
}

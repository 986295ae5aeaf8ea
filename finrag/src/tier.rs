//! User sophistication tiers and their prompt contracts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FinRagError;

/// The phrase completions must use when context lacks requested information.
pub const MISSING_DATA_PHRASE: &str = "This financial data is not available in our database.";

/// One of three recommendation strategies, fixed for the life of a request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// No prior investing experience.
    #[serde(alias = "no_idea")]
    NewInvestor,
    /// Has funds and is ready to start.
    ReadyToInvest,
    /// Already holds a portfolio.
    InvestedUser,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::NewInvestor, Tier::ReadyToInvest, Tier::InvestedUser];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewInvestor => "new_investor",
            Self::ReadyToInvest => "ready_to_invest",
            Self::InvestedUser => "invested_user",
        }
    }

    /// `risk_tolerance` used by documents when the data omits it.
    pub fn default_risk_tolerance(&self) -> &'static str {
        match self {
            Self::NewInvestor => "Low",
            Self::ReadyToInvest => "Medium",
            Self::InvestedUser => "High",
        }
    }

    /// Five sections every generated analysis for this tier must cover.
    pub fn required_sections(&self) -> [&'static str; 5] {
        match self {
            Self::NewInvestor => [
                "Basic investment concepts",
                "Recommended starter portfolio",
                "Risk management basics",
                "Emergency fund setup",
                "Next steps for getting started",
            ],
            Self::ReadyToInvest => [
                "Investment goals and risk assessment",
                "Recommended portfolio allocation",
                "Implementation strategy",
                "Monitoring and rebalancing plan",
                "Next steps",
            ],
            Self::InvestedUser => [
                "Current portfolio analysis",
                "Investment recommendations",
                "Risk metrics",
                "Tax considerations",
                "Portfolio rebalancing suggestions",
            ],
        }
    }

    fn audience(&self) -> &'static str {
        match self {
            Self::NewInvestor => "a complete beginner",
            Self::ReadyToInvest => "someone ready to start investing",
            Self::InvestedUser => "an experienced investor",
        }
    }

    /// System instruction sent to the completion service.
    ///
    /// Restricts the answer to the supplied context and requires
    /// [`MISSING_DATA_PHRASE`] whenever requested information is absent.
    pub fn system_instruction(&self) -> String {
        let sections: String = self
            .required_sections()
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}\n", i + 1, s))
            .collect();
        let focus = match self {
            Self::InvestedUser => {
                "Focus on advanced financial analysis, technical metrics, and market data present in the context.\n"
            }
            _ => "",
        };
        format!(
            "You are analyzing financial data for {}.\n\
             ONLY use the provided financial data, market information, and stock metrics.\n\
             DO NOT add any external knowledge or general advice.\n\
             If specific financial information is not in the context, say '{}'\n\
             {}Structure your response to include:\n{}",
            self.audience(),
            MISSING_DATA_PHRASE,
            focus,
            sections
        )
    }

    /// User message wrapping the assembled context.
    pub fn user_prompt(&self, query: &str, context: &str) -> String {
        let ask = match self {
            Self::NewInvestor => {
                "Explain this financial data in simple terms for a beginner, using ONLY the provided financial information."
            }
            Self::ReadyToInvest => {
                "Explain this financial data for a new investor, using ONLY the provided financial information and metrics."
            }
            Self::InvestedUser => {
                "Provide advanced financial analysis for an experienced investor, using ONLY the provided financial data and metrics."
            }
        };
        format!("Financial Analysis:\n{context}\n\nQuestion: {query}\n\n{ask}")
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = FinRagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new_investor" | "no_idea" => Ok(Self::NewInvestor),
            "ready_to_invest" => Ok(Self::ReadyToInvest),
            "invested_user" => Ok(Self::InvestedUser),
            _ => Err(FinRagError::InvalidTier(s.to_string())),
        }
    }
}

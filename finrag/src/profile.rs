//! User investment profiles and their append-only history.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{FinRagError, Result};

/// Declared appetite for risk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    #[serde(alias = "Conservative", alias = "low", alias = "Low")]
    Conservative,
    #[serde(alias = "Moderate", alias = "medium", alias = "Medium")]
    Moderate,
    #[serde(alias = "Aggressive", alias = "high", alias = "High")]
    Aggressive,
}

impl RiskTolerance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Moderate => "moderate",
            Self::Aggressive => "aggressive",
        }
    }
}

/// Time horizon for an investment plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentHorizon {
    #[serde(alias = "short-term", alias = "short_term")]
    Short,
    #[serde(alias = "medium-term", alias = "medium_term")]
    Medium,
    #[serde(alias = "long-term", alias = "long_term")]
    Long,
}

impl InvestmentHorizon {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }
}

fn default_rebalancing_frequency() -> String {
    "quarterly".to_string()
}

/// A registered user's investment profile.
///
/// Amounts are plain currency units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub user_id: String,
    pub investment_goals: BTreeSet<String>,
    pub risk_tolerance: RiskTolerance,
    pub investment_horizon: InvestmentHorizon,
    #[serde(default)]
    pub preferred_sectors: Vec<String>,
    #[serde(default)]
    pub excluded_sectors: Vec<String>,
    pub monthly_investment: f64,
    pub total_investable_assets: f64,
    /// Holdings grouped by asset class, e.g. `{"stocks": {"AAPL": {"shares": 10, "avg_price": 150}}}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_portfolio: Option<Map<String, Value>>,
    #[serde(default, alias = "investment_constraints")]
    pub constraints: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_considerations: Option<Map<String, Value>>,
    #[serde(default = "default_rebalancing_frequency")]
    pub rebalancing_frequency: String,
}

impl UserProfile {
    /// Total of `shares * avg_price` over every holding in `current_portfolio`.
    ///
    /// Holdings missing either field count as zero.
    pub fn portfolio_value(&self) -> f64 {
        let Some(portfolio) = &self.current_portfolio else {
            return 0.0;
        };
        portfolio
            .values()
            .filter_map(Value::as_object)
            .flat_map(|holdings| holdings.values())
            .map(|holding| {
                let shares = holding.get("shares").and_then(Value::as_f64).unwrap_or(0.0);
                let price = holding.get("avg_price").and_then(Value::as_f64).unwrap_or(0.0);
                shares * price
            })
            .sum()
    }

    /// Plain-text rendering used for indexing and prompt context.
    pub fn summary(&self) -> String {
        let goals: Vec<&str> = self.investment_goals.iter().map(String::as_str).collect();
        let portfolio = self
            .current_portfolio
            .as_ref()
            .and_then(|p| serde_json::to_string_pretty(p).ok())
            .unwrap_or_else(|| "{}".to_string());
        format!(
            "User Profile:\n\
             - Investment Goals: {}\n\
             - Risk Tolerance: {}\n\
             - Preferred Sectors: {}\n\
             - Current Portfolio: {}",
            goals.join(", "),
            self.risk_tolerance.as_str(),
            self.preferred_sectors.join(", "),
            portfolio
        )
    }
}

/// A partial update applied by [`ProfileStore::update`].
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProfileUpdate {
    pub investment_goals: Option<BTreeSet<String>>,
    pub risk_tolerance: Option<RiskTolerance>,
    pub investment_horizon: Option<InvestmentHorizon>,
    pub preferred_sectors: Option<Vec<String>>,
    pub excluded_sectors: Option<Vec<String>>,
    pub monthly_investment: Option<f64>,
    pub total_investable_assets: Option<f64>,
    pub current_portfolio: Option<Map<String, Value>>,
    pub constraints: Option<BTreeSet<String>>,
    pub tax_considerations: Option<Map<String, Value>>,
    pub rebalancing_frequency: Option<String>,
}

impl ProfileUpdate {
    fn apply(self, profile: &mut UserProfile) {
        if let Some(v) = self.investment_goals {
            profile.investment_goals = v;
        }
        if let Some(v) = self.risk_tolerance {
            profile.risk_tolerance = v;
        }
        if let Some(v) = self.investment_horizon {
            profile.investment_horizon = v;
        }
        if let Some(v) = self.preferred_sectors {
            profile.preferred_sectors = v;
        }
        if let Some(v) = self.excluded_sectors {
            profile.excluded_sectors = v;
        }
        if let Some(v) = self.monthly_investment {
            profile.monthly_investment = v;
        }
        if let Some(v) = self.total_investable_assets {
            profile.total_investable_assets = v;
        }
        if let Some(v) = self.current_portfolio {
            profile.current_portfolio = Some(v);
        }
        if let Some(v) = self.constraints {
            profile.constraints = v;
        }
        if let Some(v) = self.tax_considerations {
            profile.tax_considerations = Some(v);
        }
        if let Some(v) = self.rebalancing_frequency {
            profile.rebalancing_frequency = v;
        }
    }
}

/// One recorded investment action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvestmentHistoryEntry {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub amount: f64,
    pub investment_type: String,
    #[serde(default)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Default)]
struct ProfileState {
    profiles: HashMap<String, UserProfile>,
    history: HashMap<String, Vec<InvestmentHistoryEntry>>,
}

/// Process-wide store of profiles and history. Nothing is ever evicted.
#[derive(Debug, Default)]
pub struct ProfileStore {
    state: RwLock<ProfileState>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile. Existing history is kept.
    ///
    /// Returns `true` when the user was not registered before.
    pub async fn register(&self, profile: UserProfile) -> bool {
        let mut state = self.state.write().await;
        let user_id = profile.user_id.clone();
        let created = state.profiles.insert(user_id.clone(), profile).is_none();
        state.history.entry(user_id.clone()).or_default();
        info!(user_id = %user_id, created, "profile registered");
        created
    }

    /// Apply a partial update and return the resulting profile.
    ///
    /// # Errors
    ///
    /// Returns [`FinRagError::UnknownUser`] if `user_id` was never registered.
    pub async fn update(&self, user_id: &str, update: ProfileUpdate) -> Result<UserProfile> {
        let mut state = self.state.write().await;
        let profile = state
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| FinRagError::UnknownUser(user_id.to_string()))?;
        update.apply(profile);
        Ok(profile.clone())
    }

    pub async fn get(&self, user_id: &str) -> Option<UserProfile> {
        self.state.read().await.profiles.get(user_id).cloned()
    }

    /// Append a history entry. Entries keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`FinRagError::UnknownUser`] if `user_id` was never registered.
    pub async fn add_history(&self, user_id: &str, entry: InvestmentHistoryEntry) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.profiles.contains_key(user_id) {
            return Err(FinRagError::UnknownUser(user_id.to_string()));
        }
        state.history.entry(user_id.to_string()).or_default().push(entry);
        Ok(())
    }

    pub async fn history(&self, user_id: &str) -> Vec<InvestmentHistoryEntry> {
        self.state.read().await.history.get(user_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_profile() -> UserProfile {
        serde_json::from_value(json!({
            "user_id": "user1",
            "investment_goals": ["growth", "income"],
            "risk_tolerance": "moderate",
            "investment_horizon": "long-term",
            "preferred_sectors": ["technology", "healthcare"],
            "monthly_investment": 1000,
            "total_investable_assets": 50000,
            "current_portfolio": {
                "stocks": {
                    "AAPL": {"shares": 10, "avg_price": 150},
                    "MSFT": {"shares": 15, "avg_price": 280}
                },
                "etfs": {"VOO": {"shares": 20, "avg_price": 350}}
            },
            "investment_constraints": ["no tobacco"]
        }))
        .unwrap()
    }

    fn entry(action: &str, amount: f64) -> InvestmentHistoryEntry {
        InvestmentHistoryEntry {
            timestamp: Utc::now(),
            action: action.to_string(),
            amount,
            investment_type: "stock".to_string(),
            details: Map::new(),
        }
    }

    #[test]
    fn deserializes_aliased_field_names() {
        let profile = sample_profile();
        assert_eq!(profile.investment_horizon, InvestmentHorizon::Long);
        assert!(profile.constraints.contains("no tobacco"));
        assert_eq!(profile.rebalancing_frequency, "quarterly");
    }

    #[test]
    fn portfolio_value_sums_holdings() {
        let profile = sample_profile();
        assert_eq!(profile.portfolio_value(), 10.0 * 150.0 + 15.0 * 280.0 + 20.0 * 350.0);
    }

    #[test]
    fn summary_lists_goals_and_sectors() {
        let summary = sample_profile().summary();
        assert!(summary.contains("Investment Goals: growth, income"));
        assert!(summary.contains("Risk Tolerance: moderate"));
        assert!(summary.contains("Preferred Sectors: technology, healthcare"));
        assert!(summary.contains("AAPL"));
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let store = ProfileStore::new();
        assert!(store.register(sample_profile()).await);

        let updated = store
            .update(
                "user1",
                ProfileUpdate {
                    risk_tolerance: Some(RiskTolerance::Aggressive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.risk_tolerance, RiskTolerance::Aggressive);
        assert_eq!(updated.monthly_investment, 1000.0);
    }

    #[tokio::test]
    async fn history_is_append_only_and_survives_reregistration() {
        let store = ProfileStore::new();
        store.register(sample_profile()).await;
        store.add_history("user1", entry("buy", 5000.0)).await.unwrap();
        store.add_history("user1", entry("sell", 100.0)).await.unwrap();
        assert!(!store.register(sample_profile()).await);

        let history = store.history("user1").await;
        let actions: Vec<&str> = history.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["buy", "sell"]);
    }

    #[tokio::test]
    async fn unknown_users_are_rejected() {
        let store = ProfileStore::new();
        assert!(matches!(
            store.add_history("ghost", entry("buy", 1.0)).await,
            Err(FinRagError::UnknownUser(_))
        ));
        assert!(store.update("ghost", ProfileUpdate::default()).await.is_err());
        assert!(store.history("ghost").await.is_empty());
    }
}

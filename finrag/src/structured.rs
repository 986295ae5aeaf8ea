//! Tier-specific structured recommendation documents.
//!
//! [`StructuredDocumentBuilder`] maps a loosely-typed data dictionary onto
//! one of three fixed JSON shapes. Every key is optional and falls back to a
//! stated default. Numeric values supplied by the caller (percentages,
//! amounts, totals) are passed through unchanged, so an integer in stays an
//! integer out.
//!
//! The derived numbers (risk score, return potential, gauge target, radar
//! scores and benchmarks) are illustrative placeholders for real analytics.
//! They are not financial truth.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::config::AllocationCheck;
use crate::error::{FinRagError, Result};
use crate::tier::Tier;

/// Colors assigned to chart entries by `index % 8`.
pub const CHART_PALETTE: [&str; 8] =
    ["#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEEAD", "#D4A5A5", "#9B59B6", "#3498DB"];

/// Placeholder weights summed into a vehicle's risk score.
const RISK_FACTOR_WEIGHTS: [(&str, f64); 3] =
    [("Market risk", 0.4), ("Volatility", 0.3), ("Liquidity risk", 0.3)];

/// Placeholder expected return applied to a vehicle's allocation.
const EXPECTED_RETURN_RATE: f64 = 0.1;

/// Share of total funds targeted for the emergency fund gauge.
const EMERGENCY_FUND_SHARE: f64 = 0.3;

const EMERGENCY_FUND_REASON: &str = "Emergency fund for unexpected expenses";

/// Tolerance for [`AllocationCheck`] sum comparisons.
const ALLOCATION_SUM_TOLERANCE: f64 = 0.5;

/// Color for the chart entry at `index`.
pub fn chart_color(index: usize) -> &'static str {
    CHART_PALETTE[index % CHART_PALETTE.len()]
}

/// Illustrative risk score: total factor weight times the number of listed risks.
pub fn risk_score(risks: usize) -> f64 {
    RISK_FACTOR_WEIGHTS.iter().map(|(_, weight)| weight).sum::<f64>() * risks as f64
}

/// Illustrative return potential: allocation times a flat expected rate.
pub fn return_potential(allocation: f64) -> f64 {
    allocation * EXPECTED_RETURN_RATE
}

// ── Shared blocks ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Pie,
    Bar,
    Gauge,
    Donut,
    Scatter,
    Timeline,
    StackedBar,
    Line,
    Radar,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartAxes {
    pub x: String,
    pub y: String,
}

/// A chart-ready visualization block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chart<D> {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub title: String,
    pub data: D,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axes: Option<ChartAxes>,
}

impl<D> Chart<D> {
    fn new(kind: ChartKind, title: &str, data: D) -> Self {
        Self { kind, title: title.to_string(), data, axes: None }
    }

    fn with_axes(mut self, x: &str, y: &str) -> Self {
        self.axes = Some(ChartAxes { x: x.to_string(), y: y.to_string() });
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub value: Number,
    pub color: String,
}

/// Fixed 1–5 educational risk/return levels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskReturnLevel {
    pub label: String,
    pub risk: u8,
    #[serde(rename = "return")]
    pub return_level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskReturnPoint {
    pub label: String,
    pub risk: f64,
    #[serde(rename = "return")]
    pub return_potential: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GaugeData {
    pub current: Number,
    pub target: f64,
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineStep {
    pub phase: String,
    pub action: Value,
    pub duration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackedBarData {
    pub current: Vec<ChartPoint>,
    pub proposed: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineData {
    pub metrics: Vec<String>,
    pub current: Vec<Number>,
    pub benchmark: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RadarData {
    pub dimensions: Vec<String>,
    pub values: Vec<Number>,
}

/// A recommended allocation entry. Percentages are not validated unless an
/// [`AllocationCheck`] asks for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Allocation {
    #[serde(rename = "type")]
    pub kind: String,
    pub percentage: Number,
    pub amount: Number,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sectors: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrentAllocation {
    #[serde(rename = "type")]
    pub kind: String,
    pub percentage: Number,
    pub amount: Number,
    pub holdings: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvestmentVehicle {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub allocation: Number,
    pub amount: Number,
    pub features: Vec<Value>,
    pub risks: Vec<Value>,
}

/// Profile block for the new and ready tiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvestmentProfile {
    pub goal: String,
    pub risk_tolerance: String,
    pub investment_horizon: String,
    pub total_funds: Number,
}

/// Profile block for the invested tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvestedProfile {
    pub goal: String,
    pub risk_tolerance: String,
    pub investment_horizon: String,
    pub total_portfolio_value: Number,
}

// ── new_investor ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmergencyFund {
    pub amount: Number,
    pub bank: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewInvestmentPlan {
    pub total_amount: Number,
    pub allocation: Vec<Allocation>,
    pub emergency_fund: EmergencyFund,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewInvestorVisualizations {
    pub allocation_chart: Chart<Vec<ChartPoint>>,
    pub risk_education: Chart<Vec<RiskReturnLevel>>,
    pub emergency_fund: Chart<GaugeData>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewInvestorDocument {
    pub user_id: String,
    pub investment_profile: InvestmentProfile,
    pub new_investment_plan: NewInvestmentPlan,
    pub investment_rationale: Vec<Value>,
    pub risk_management: Vec<Value>,
    pub next_steps: Vec<Value>,
    pub visualizations: NewInvestorVisualizations,
}

// ── ready_to_invest ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadyPortfolio {
    pub total_amount: Number,
    pub allocation: Vec<Allocation>,
    pub investment_vehicles: Vec<InvestmentVehicle>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadyInvestorVisualizations {
    pub portfolio_allocation: Chart<Vec<ChartPoint>>,
    pub risk_return_spectrum: Chart<Vec<RiskReturnPoint>>,
    pub implementation_timeline: Chart<Vec<TimelineStep>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadyInvestorDocument {
    pub user_id: String,
    pub investment_profile: InvestmentProfile,
    pub portfolio: ReadyPortfolio,
    pub implementation_strategy: Vec<Value>,
    pub monitoring_plan: Vec<Value>,
    pub rebalancing_schedule: Value,
    pub visualizations: ReadyInvestorVisualizations,
}

// ── invested_user ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrentInvestment {
    pub total_amount: Number,
    pub allocation: Vec<CurrentAllocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposedInvestment {
    pub total_amount: Number,
    pub allocation: Vec<Allocation>,
    pub rationale: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvestedUserVisualizations {
    pub current_vs_proposed: Chart<StackedBarData>,
    pub performance_metrics: Chart<LineData>,
    pub risk_analysis: Chart<RadarData>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvestedUserDocument {
    pub user_id: String,
    pub investment_profile: InvestedProfile,
    pub current_investment: CurrentInvestment,
    pub new_investment_plan: ProposedInvestment,
    pub portfolio_analysis: Value,
    pub risk_metrics: Value,
    pub tax_considerations: Vec<Value>,
    pub visualizations: InvestedUserVisualizations,
}

/// The structured output of a dispatch, one closed variant per tier.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RecommendationDocument {
    NewInvestor(NewInvestorDocument),
    ReadyInvestor(ReadyInvestorDocument),
    InvestedUser(InvestedUserDocument),
}

impl RecommendationDocument {
    pub fn tier(&self) -> Tier {
        match self {
            Self::NewInvestor(_) => Tier::NewInvestor,
            Self::ReadyInvestor(_) => Tier::ReadyToInvest,
            Self::InvestedUser(_) => Tier::InvestedUser,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::NewInvestor(doc) => &doc.user_id,
            Self::ReadyInvestor(doc) => &doc.user_id,
            Self::InvestedUser(doc) => &doc.user_id,
        }
    }

    /// The document as a JSON value.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

// ── Lenient field access ───────────────────────────────────────────

/// String field with a default. Non-string values are rendered as JSON text,
/// so `"risk_tolerance": 3` becomes `"3"`.
fn text(data: &Map<String, Value>, key: &str, default: &str) -> String {
    match data.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}

fn number(data: &Map<String, Value>, key: &str) -> Number {
    match data.get(key) {
        Some(Value::Number(n)) => n.clone(),
        _ => Number::from(0),
    }
}

fn float(value: f64) -> Number {
    Number::from_f64(value).unwrap_or_else(|| Number::from(0))
}

fn object<'a>(data: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    data.get(key).and_then(Value::as_object)
}

fn object_or_empty(data: &Map<String, Value>, key: &str) -> Map<String, Value> {
    object(data, key).cloned().unwrap_or_default()
}

fn records<'a>(data: &'a Map<String, Value>, key: &str) -> Vec<&'a Map<String, Value>> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}

/// Free-form list items, passed through unchanged.
fn items(data: &Map<String, Value>, key: &str) -> Vec<Value> {
    data.get(key).and_then(Value::as_array).cloned().unwrap_or_default()
}

/// A free-form value passed through unchanged, `{}` when absent.
fn passthrough(data: &Map<String, Value>, key: &str) -> Value {
    match data.get(key) {
        Some(Value::Null) | None => Value::Object(Map::new()),
        Some(value) => value.clone(),
    }
}

fn value_number(value: &Value, key: &str) -> Number {
    value.as_object().map_or_else(|| Number::from(0), |map| number(map, key))
}

fn allocations(entries: &[&Map<String, Value>]) -> Vec<Allocation> {
    entries
        .iter()
        .map(|entry| Allocation {
            kind: text(entry, "type", ""),
            percentage: number(entry, "percentage"),
            amount: number(entry, "amount"),
            reason: text(entry, "reason", ""),
            investments: entry.get("investments").cloned(),
            sectors: entry.get("sectors").cloned(),
        })
        .collect()
}

fn chart_points(entries: &[&Map<String, Value>]) -> Vec<ChartPoint> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| ChartPoint {
            label: text(entry, "type", ""),
            value: number(entry, "percentage"),
            color: chart_color(index).to_string(),
        })
        .collect()
}

fn percentage_sum(entries: &[&Map<String, Value>]) -> f64 {
    entries.iter().filter_map(|e| e.get("percentage").and_then(Value::as_f64)).sum()
}

// ── Builder ────────────────────────────────────────────────────────

/// Builds [`RecommendationDocument`]s from data dictionaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredDocumentBuilder {
    allocation_check: AllocationCheck,
}

impl StructuredDocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how allocation percentage sums are checked.
    pub fn with_allocation_check(mut self, check: AllocationCheck) -> Self {
        self.allocation_check = check;
        self
    }

    /// Build a document for a tier identifier such as `"ready_to_invest"`.
    ///
    /// # Errors
    ///
    /// Returns [`FinRagError::InvalidTier`] for unknown identifiers and
    /// [`FinRagError::AllocationError`] under [`AllocationCheck::Strict`].
    pub fn build_named(
        &self,
        tier: &str,
        user_id: &str,
        data: &Map<String, Value>,
    ) -> Result<RecommendationDocument> {
        self.build(tier.parse()?, user_id, data)
    }

    /// Build the document for `tier`.
    ///
    /// # Errors
    ///
    /// Returns [`FinRagError::AllocationError`] under
    /// [`AllocationCheck::Strict`] when a non-empty allocation does not sum to 100.
    pub fn build(
        &self,
        tier: Tier,
        user_id: &str,
        data: &Map<String, Value>,
    ) -> Result<RecommendationDocument> {
        Ok(match tier {
            Tier::NewInvestor => RecommendationDocument::NewInvestor(self.new_investor(user_id, data)?),
            Tier::ReadyToInvest => {
                RecommendationDocument::ReadyInvestor(self.ready_investor(user_id, data)?)
            }
            Tier::InvestedUser => {
                RecommendationDocument::InvestedUser(self.invested_user(user_id, data)?)
            }
        })
    }

    fn check_allocation(&self, label: &str, entries: &[&Map<String, Value>]) -> Result<()> {
        if entries.is_empty() || self.allocation_check == AllocationCheck::Unchecked {
            return Ok(());
        }
        let sum = percentage_sum(entries);
        if (sum - 100.0).abs() <= ALLOCATION_SUM_TOLERANCE {
            return Ok(());
        }
        match self.allocation_check {
            AllocationCheck::Strict => Err(FinRagError::AllocationError(format!(
                "{label} percentages sum to {sum}, expected 100"
            ))),
            _ => {
                warn!(allocation = label, sum, "allocation percentages do not sum to 100");
                Ok(())
            }
        }
    }

    fn new_investor(&self, user_id: &str, data: &Map<String, Value>) -> Result<NewInvestorDocument> {
        let recommended = records(data, "recommended_allocation");
        self.check_allocation("recommended_allocation", &recommended)?;

        let total_funds = number(data, "total_funds");
        let emergency = object_or_empty(data, "emergency_fund");
        let emergency_amount = number(&emergency, "amount");
        let target = total_funds.as_f64().unwrap_or(0.0) * EMERGENCY_FUND_SHARE;

        let risk_education: Vec<RiskReturnLevel> =
            [("Fixed Deposits", 1, 2), ("Index Funds", 3, 4), ("High-Yield Savings", 1, 2)]
                .into_iter()
                .map(|(label, risk, return_level)| RiskReturnLevel {
                    label: label.to_string(),
                    risk,
                    return_level,
                })
                .collect();

        Ok(NewInvestorDocument {
            user_id: user_id.to_string(),
            investment_profile: InvestmentProfile {
                goal: text(data, "investment_goal", ""),
                risk_tolerance: text(data, "risk_tolerance", Tier::NewInvestor.default_risk_tolerance()),
                investment_horizon: text(data, "investment_horizon", ""),
                total_funds: total_funds.clone(),
            },
            new_investment_plan: NewInvestmentPlan {
                total_amount: total_funds,
                allocation: allocations(&recommended),
                emergency_fund: EmergencyFund {
                    amount: emergency_amount.clone(),
                    bank: text(&emergency, "bank", ""),
                    reason: EMERGENCY_FUND_REASON.to_string(),
                },
            },
            investment_rationale: items(data, "investment_rationale"),
            risk_management: items(data, "risk_management"),
            next_steps: items(data, "next_steps"),
            visualizations: NewInvestorVisualizations {
                allocation_chart: Chart::new(
                    ChartKind::Pie,
                    "Recommended Investment Allocation",
                    chart_points(&recommended),
                ),
                risk_education: Chart::new(ChartKind::Bar, "Risk vs Return Basics", risk_education)
                    .with_axes("Investment Type", "Risk/Return Level (1-5)"),
                emergency_fund: Chart::new(
                    ChartKind::Gauge,
                    "Emergency Fund Progress",
                    GaugeData {
                        current: emergency_amount,
                        target,
                        colors: vec!["red".into(), "yellow".into(), "green".into()],
                    },
                ),
            },
        })
    }

    fn ready_investor(&self, user_id: &str, data: &Map<String, Value>) -> Result<ReadyInvestorDocument> {
        let recommended = records(data, "recommended_allocation");
        self.check_allocation("recommended_allocation", &recommended)?;

        let total_funds = number(data, "total_funds");
        let vehicles = records(data, "investment_vehicles");
        let implementation_strategy = items(data, "implementation_strategy");

        let risk_return: Vec<RiskReturnPoint> = vehicles
            .iter()
            .map(|vehicle| RiskReturnPoint {
                label: text(vehicle, "name", ""),
                risk: risk_score(vehicle.get("risks").and_then(Value::as_array).map_or(0, Vec::len)),
                return_potential: return_potential(
                    vehicle.get("allocation").and_then(Value::as_f64).unwrap_or(0.0),
                ),
            })
            .collect();

        let timeline: Vec<TimelineStep> = implementation_strategy
            .iter()
            .enumerate()
            .map(|(index, step)| TimelineStep {
                phase: format!("Phase {}", index + 1),
                action: step.clone(),
                duration: format!("Week {}", index + 1),
            })
            .collect();

        Ok(ReadyInvestorDocument {
            user_id: user_id.to_string(),
            investment_profile: InvestmentProfile {
                goal: text(data, "investment_goal", ""),
                risk_tolerance: text(data, "risk_tolerance", Tier::ReadyToInvest.default_risk_tolerance()),
                investment_horizon: text(data, "investment_horizon", ""),
                total_funds: total_funds.clone(),
            },
            portfolio: ReadyPortfolio {
                total_amount: total_funds,
                allocation: allocations(&recommended),
                investment_vehicles: vehicles
                    .iter()
                    .map(|vehicle| InvestmentVehicle {
                        kind: text(vehicle, "type", ""),
                        name: text(vehicle, "name", ""),
                        allocation: number(vehicle, "allocation"),
                        amount: number(vehicle, "amount"),
                        features: items(vehicle, "features"),
                        risks: items(vehicle, "risks"),
                    })
                    .collect(),
            },
            implementation_strategy,
            monitoring_plan: items(data, "monitoring_plan"),
            rebalancing_schedule: passthrough(data, "rebalancing_schedule"),
            visualizations: ReadyInvestorVisualizations {
                portfolio_allocation: Chart::new(
                    ChartKind::Donut,
                    "Proposed Portfolio Allocation",
                    chart_points(&recommended),
                ),
                risk_return_spectrum: Chart::new(ChartKind::Scatter, "Risk-Return Analysis", risk_return)
                    .with_axes("Risk Level", "Expected Return"),
                implementation_timeline: Chart::new(
                    ChartKind::Timeline,
                    "Investment Implementation Plan",
                    timeline,
                ),
            },
        })
    }

    fn invested_user(&self, user_id: &str, data: &Map<String, Value>) -> Result<InvestedUserDocument> {
        let current = object_or_empty(data, "current_investment");
        let proposed = object_or_empty(data, "new_investment");
        let current_entries = records(&current, "allocation");
        let proposed_entries = records(&proposed, "allocation");
        self.check_allocation("current_investment.allocation", &current_entries)?;
        self.check_allocation("new_investment.allocation", &proposed_entries)?;

        let portfolio_analysis = passthrough(data, "portfolio_analysis");
        let risk_metrics = passthrough(data, "risk_metrics");
        let beta = value_number(&risk_metrics, "beta");

        Ok(InvestedUserDocument {
            user_id: user_id.to_string(),
            investment_profile: InvestedProfile {
                goal: text(data, "investment_goal", ""),
                risk_tolerance: text(data, "risk_tolerance", Tier::InvestedUser.default_risk_tolerance()),
                investment_horizon: text(data, "investment_horizon", ""),
                total_portfolio_value: number(data, "total_portfolio_value"),
            },
            current_investment: CurrentInvestment {
                total_amount: number(&current, "total_amount"),
                allocation: current_entries
                    .iter()
                    .map(|entry| CurrentAllocation {
                        kind: text(entry, "type", ""),
                        percentage: number(entry, "percentage"),
                        amount: number(entry, "amount"),
                        holdings: items(entry, "holdings"),
                    })
                    .collect(),
            },
            new_investment_plan: ProposedInvestment {
                total_amount: number(&proposed, "total_amount"),
                allocation: allocations(&proposed_entries),
                rationale: items(&proposed, "rationale"),
            },
            tax_considerations: items(data, "tax_considerations"),
            visualizations: InvestedUserVisualizations {
                current_vs_proposed: Chart::new(
                    ChartKind::StackedBar,
                    "Current vs Proposed Allocation",
                    StackedBarData {
                        current: chart_points(&current_entries),
                        proposed: chart_points(&proposed_entries),
                    },
                ),
                performance_metrics: Chart::new(
                    ChartKind::Line,
                    "Portfolio Performance Metrics",
                    LineData {
                        metrics: vec!["Return".into(), "Risk".into(), "Sharpe Ratio".into()],
                        current: vec![
                            value_number(&portfolio_analysis, "risk_adjusted_return"),
                            beta.clone(),
                            value_number(&risk_metrics, "sharpe_ratio"),
                        ],
                        benchmark: vec![0.10, 1.0, 1.0],
                    },
                ),
                risk_analysis: Chart::new(
                    ChartKind::Radar,
                    "Risk Analysis",
                    RadarData {
                        dimensions: [
                            "Market Risk",
                            "Credit Risk",
                            "Liquidity Risk",
                            "Concentration Risk",
                            "Currency Risk",
                        ]
                        .iter()
                        .map(|d| d.to_string())
                        .collect(),
                        // Only market risk comes from the data; the rest are fixed sample scores.
                        values: vec![beta, float(0.7), float(0.8), float(0.6), float(0.4)],
                    },
                ),
            },
            portfolio_analysis,
            risk_metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_new_investor_uses_defaults() {
        let doc = StructuredDocumentBuilder::new()
            .build_named("new_investor", "u1", &Map::new())
            .unwrap()
            .to_value()
            .unwrap();

        assert_eq!(doc["user_id"], json!("u1"));
        assert_eq!(doc["investment_profile"]["risk_tolerance"], json!("Low"));
        assert_eq!(doc["investment_profile"]["total_funds"], json!(0));
        assert_eq!(doc["investment_profile"]["goal"], json!(""));
        assert_eq!(doc["new_investment_plan"]["allocation"], json!([]));
        assert_eq!(
            doc["new_investment_plan"]["emergency_fund"]["reason"],
            json!("Emergency fund for unexpected expenses")
        );
        assert_eq!(doc["visualizations"]["allocation_chart"]["type"], json!("pie"));
        assert_eq!(doc["visualizations"]["allocation_chart"]["data"], json!([]));
        assert!(doc["visualizations"]["allocation_chart"].get("axes").is_none());
        assert_eq!(doc["visualizations"]["risk_education"]["type"], json!("bar"));
        assert_eq!(
            doc["visualizations"]["risk_education"]["data"][1],
            json!({"label": "Index Funds", "risk": 3, "return": 4})
        );
        assert_eq!(doc["visualizations"]["emergency_fund"]["type"], json!("gauge"));
        assert_eq!(doc["visualizations"]["emergency_fund"]["data"]["target"], json!(0.0));
    }

    #[test]
    fn tier_defaults_for_risk_tolerance() {
        let builder = StructuredDocumentBuilder::new();
        let ready = builder.build(Tier::ReadyToInvest, "u", &Map::new()).unwrap().to_value().unwrap();
        let invested = builder.build(Tier::InvestedUser, "u", &Map::new()).unwrap().to_value().unwrap();
        assert_eq!(ready["investment_profile"]["risk_tolerance"], json!("Medium"));
        assert_eq!(invested["investment_profile"]["risk_tolerance"], json!("High"));
        assert_eq!(invested["investment_profile"]["total_portfolio_value"], json!(0));
        assert_eq!(ready["rebalancing_schedule"], json!({}));
    }

    #[test]
    fn unknown_tier_is_rejected() {
        let err = StructuredDocumentBuilder::new().build_named("guru", "u", &Map::new()).unwrap_err();
        assert!(matches!(err, FinRagError::InvalidTier(_)));
    }

    #[test]
    fn chart_colors_cycle_through_palette() {
        let entries: Vec<Value> =
            (0..9).map(|i| json!({"type": format!("asset{i}"), "percentage": 10})).collect();
        let doc = StructuredDocumentBuilder::new()
            .build(Tier::NewInvestor, "u", &data(json!({ "recommended_allocation": entries })))
            .unwrap()
            .to_value()
            .unwrap();
        let points = doc["visualizations"]["allocation_chart"]["data"].as_array().unwrap();
        assert_eq!(points.len(), 9);
        assert_eq!(points[8]["color"], points[0]["color"]);
        assert_ne!(points[1]["color"], points[0]["color"]);
    }

    #[test]
    fn allocation_passes_through_optional_fields() {
        let doc = StructuredDocumentBuilder::new()
            .build(
                Tier::NewInvestor,
                "u",
                &data(json!({
                    "total_funds": 10000,
                    "recommended_allocation": [
                        {"type": "Index Funds", "percentage": 30, "amount": 3000,
                         "reason": "Market exposure", "sectors": ["tech"]}
                    ],
                    "emergency_fund": {"amount": 3000, "bank": "High-yield savings account"}
                })),
            )
            .unwrap()
            .to_value()
            .unwrap();
        let allocation = &doc["new_investment_plan"]["allocation"][0];
        assert_eq!(allocation["sectors"], json!(["tech"]));
        assert!(allocation.get("investments").is_none());
        assert_eq!(doc["new_investment_plan"]["total_amount"], json!(10000));
        assert_eq!(doc["visualizations"]["emergency_fund"]["data"]["current"], json!(3000));
        let target = doc["visualizations"]["emergency_fund"]["data"]["target"].as_f64().unwrap();
        assert!((target - 3000.0).abs() < 1e-6);
    }

    #[test]
    fn ready_investor_derives_placeholder_scores_and_timeline() {
        let doc = StructuredDocumentBuilder::new()
            .build(
                Tier::ReadyToInvest,
                "u",
                &data(json!({
                    "investment_vehicles": [{
                        "type": "ETF", "name": "Total Market Index", "allocation": 40,
                        "amount": 20000, "features": ["Low cost"], "risks": ["Market risk", "Volatility"]
                    }],
                    "implementation_strategy": ["Open brokerage account", "Automate"],
                    "rebalancing_schedule": {"frequency": "Quarterly"}
                })),
            )
            .unwrap()
            .to_value()
            .unwrap();

        let point = &doc["visualizations"]["risk_return_spectrum"]["data"][0];
        assert_eq!(point["label"], json!("Total Market Index"));
        assert!((point["risk"].as_f64().unwrap() - 2.0).abs() < 1e-9);
        assert!((point["return"].as_f64().unwrap() - 4.0).abs() < 1e-9);
        assert_eq!(doc["visualizations"]["risk_return_spectrum"]["axes"]["x"], json!("Risk Level"));

        let steps = doc["visualizations"]["implementation_timeline"]["data"].as_array().unwrap();
        assert_eq!(
            steps[1],
            json!({"phase": "Phase 2", "action": "Automate", "duration": "Week 2"})
        );
        assert_eq!(doc["visualizations"]["portfolio_allocation"]["type"], json!("donut"));
        assert_eq!(doc["rebalancing_schedule"]["frequency"], json!("Quarterly"));
    }

    #[test]
    fn invested_user_fills_metric_charts() {
        let doc = StructuredDocumentBuilder::new()
            .build(
                Tier::InvestedUser,
                "u",
                &data(json!({
                    "current_investment": {
                        "total_amount": 75000,
                        "allocation": [{"type": "Stocks", "percentage": 60, "amount": 45000,
                                        "holdings": ["AAPL", "MSFT"]}]
                    },
                    "new_investment": {
                        "total_amount": 25000,
                        "allocation": [{"type": "ETFs", "percentage": 50, "amount": 12500}],
                        "rationale": ["Sector rotation needed"]
                    },
                    "portfolio_analysis": {"risk_adjusted_return": 0.12},
                    "risk_metrics": {"beta": 1.2, "sharpe_ratio": 1.5}
                })),
            )
            .unwrap()
            .to_value()
            .unwrap();

        assert_eq!(doc["current_investment"]["allocation"][0]["holdings"], json!(["AAPL", "MSFT"]));
        assert_eq!(doc["new_investment_plan"]["rationale"], json!(["Sector rotation needed"]));
        let visual = &doc["visualizations"];
        assert_eq!(visual["current_vs_proposed"]["type"], json!("stacked_bar"));
        assert_eq!(visual["current_vs_proposed"]["data"]["proposed"][0]["label"], json!("ETFs"));
        assert_eq!(visual["performance_metrics"]["type"], json!("line"));
        assert_eq!(visual["performance_metrics"]["data"]["current"], json!([0.12, 1.2, 1.5]));
        assert_eq!(visual["performance_metrics"]["data"]["benchmark"], json!([0.1, 1.0, 1.0]));
        assert_eq!(visual["risk_analysis"]["type"], json!("radar"));
        assert_eq!(visual["risk_analysis"]["data"]["values"], json!([1.2, 0.7, 0.8, 0.6, 0.4]));
    }

    #[test]
    fn free_form_values_pass_through_unchanged() {
        let doc = StructuredDocumentBuilder::new()
            .build(
                Tier::InvestedUser,
                "u",
                &data(json!({
                    "risk_tolerance": 3,
                    "current_investment": {
                        "allocation": [{"type": "Stocks", "percentage": 100,
                                        "holdings": [{"sym": "AAPL", "shares": 10}, "MSFT"]}]
                    },
                    "portfolio_analysis": ["diversified", "tech-heavy"],
                    "risk_metrics": "unavailable",
                    "tax_considerations": [{"item": "harvest losses"}]
                })),
            )
            .unwrap()
            .to_value()
            .unwrap();

        assert_eq!(
            doc["current_investment"]["allocation"][0]["holdings"],
            json!([{"sym": "AAPL", "shares": 10}, "MSFT"])
        );
        assert_eq!(doc["portfolio_analysis"], json!(["diversified", "tech-heavy"]));
        assert_eq!(doc["risk_metrics"], json!("unavailable"));
        assert_eq!(doc["tax_considerations"][0], json!({"item": "harvest losses"}));
        assert_eq!(doc["investment_profile"]["risk_tolerance"], json!("3"));
        assert_eq!(doc["visualizations"]["risk_analysis"]["data"]["values"][0], json!(0));
    }

    #[test]
    fn timeline_actions_keep_structured_steps() {
        let doc = StructuredDocumentBuilder::new()
            .build(
                Tier::ReadyToInvest,
                "u",
                &data(json!({
                    "implementation_strategy": [{"step": "Open account", "owner": "user"}],
                    "investment_vehicles": [{"name": "Bond ETF", "features": [{"expense_ratio": 0.03}]}]
                })),
            )
            .unwrap()
            .to_value()
            .unwrap();

        assert_eq!(
            doc["visualizations"]["implementation_timeline"]["data"][0]["action"],
            json!({"step": "Open account", "owner": "user"})
        );
        assert_eq!(doc["implementation_strategy"][0]["owner"], json!("user"));
        assert_eq!(doc["portfolio"]["investment_vehicles"][0]["features"], json!([{"expense_ratio": 0.03}]));
    }

    #[test]
    fn allocation_check_policies() {
        let lopsided = data(json!({
            "recommended_allocation": [{"type": "Cash", "percentage": 70}]
        }));
        assert!(StructuredDocumentBuilder::new().build(Tier::NewInvestor, "u", &lopsided).is_ok());
        assert!(
            StructuredDocumentBuilder::new()
                .with_allocation_check(AllocationCheck::Warn)
                .build(Tier::NewInvestor, "u", &lopsided)
                .is_ok()
        );
        let err = StructuredDocumentBuilder::new()
            .with_allocation_check(AllocationCheck::Strict)
            .build(Tier::ReadyToInvest, "u", &lopsided)
            .unwrap_err();
        assert!(matches!(err, FinRagError::AllocationError(_)));

        let balanced = data(json!({
            "recommended_allocation": [{"type": "A", "percentage": 60}, {"type": "B", "percentage": 40}]
        }));
        assert!(
            StructuredDocumentBuilder::new()
                .with_allocation_check(AllocationCheck::Strict)
                .build(Tier::NewInvestor, "u", &balanced)
                .is_ok()
        );
    }
}

//! Core data models for the decision router

use crate::error::OrchestrationError;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

/// Caller-selected operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Ingest,
    Advise,
    Execute,
}

impl Route {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "ingest" => Some(Route::Ingest),
            "advise" => Some(Route::Advise),
            "execute" => Some(Route::Execute),
            _ => None,
        }
    }
}

/// Terminal status of one orchestrated call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionStatus {
    Accepted,
    Rejected,
    Submitted,
    PaperTrade,
    DryRun,
    MissingCredentials,
    InvalidTarget,
    MissingCallData,
    Failed,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Accepted => "accepted",
            DecisionStatus::Rejected => "rejected",
            DecisionStatus::Submitted => "submitted",
            DecisionStatus::PaperTrade => "paper-trade",
            DecisionStatus::DryRun => "dry-run",
            DecisionStatus::MissingCredentials => "missing-credentials",
            DecisionStatus::InvalidTarget => "invalid-target",
            DecisionStatus::MissingCallData => "missing-call-data",
            DecisionStatus::Failed => "failed",
        }
    }

    pub fn from_db(raw: &str) -> Self {
        match raw {
            "accepted" => DecisionStatus::Accepted,
            "submitted" => DecisionStatus::Submitted,
            "paper-trade" => DecisionStatus::PaperTrade,
            "dry-run" => DecisionStatus::DryRun,
            "missing-credentials" => DecisionStatus::MissingCredentials,
            "invalid-target" => DecisionStatus::InvalidTarget,
            "missing-call-data" => DecisionStatus::MissingCallData,
            "failed" => DecisionStatus::Failed,
            _ => DecisionStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GasStrategy {
    Economy,
    Fast,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Ready,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
    Other,
}

impl TradeSide {
    /// Anything other than buy/sell collapses to `Other`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "buy" => TradeSide::Buy,
            "sell" => TradeSide::Sell,
            _ => TradeSide::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
            TradeSide::Other => "other",
        }
    }
}

//
// ================= Inputs =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RiskProfile {
    pub risk_tolerance: f64,
    pub horizon_days: u32,
    pub max_drawdown: f64,
}

impl RiskProfile {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.risk_tolerance) {
            return Err(OrchestrationError::InvalidInput(
                "risk_tolerance must be within [0, 1]".to_string(),
            ));
        }
        if !(1..=3650).contains(&self.horizon_days) {
            return Err(OrchestrationError::InvalidInput(
                "horizon_days must be within [1, 3650]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_drawdown) {
            return Err(OrchestrationError::InvalidInput(
                "max_drawdown must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeIntent {
    pub asset: String,
    pub action: String,
    pub size: f64,
    pub strategy_id: String,
    #[serde(default)]
    pub to_address: Option<String>,
    /// Hex byte string, with or without `0x`.
    #[serde(default)]
    pub call_data: Option<String>,
    #[serde(default)]
    pub value_wei: u128,
}

impl TradeIntent {
    /// Structural checks only; limits and allow-sets belong to the policy engine.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("asset", &self.asset),
            ("action", &self.action),
            ("strategy_id", &self.strategy_id),
        ] {
            if value.trim().is_empty() {
                return Err(OrchestrationError::InvalidInput(format!(
                    "{} must not be empty",
                    field
                )));
            }
        }
        if !self.size.is_finite() {
            return Err(OrchestrationError::InvalidInput(
                "size must be a finite number".to_string(),
            ));
        }
        Ok(())
    }
}

//
// ================= Plan =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionPlan {
    pub plan_id: String,
    pub estimated_gas: u64,
    pub slippage_bps: u32,
    pub gas_strategy: GasStrategy,
    pub deadline_sec: u32,
    pub safety_checks: Vec<String>,
    pub status: PlanStatus,
}

//
// ================= Trade History =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTradeIn {
    pub asset: String,
    pub side: String,
    pub size: f64,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserHoldingIn {
    pub asset: String,
    pub quantity: f64,
    #[serde(default)]
    pub avg_cost: Option<f64>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserTrade {
    pub user_id: String,
    pub asset: String,
    pub side: TradeSide,
    pub size: f64,
    pub price: Option<f64>,
    /// Dedup key, unique per user when present.
    pub external_id: Option<String>,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserHolding {
    pub user_id: String,
    pub asset: String,
    pub quantity: f64,
    pub avg_cost: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

//
// ================= Market Events =================
//

/// Event as returned by an ingestion source, before storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawEvent {
    pub tx_hash: String,
    pub payload: String,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub value: Option<f64>,
    pub block_number: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketEvent {
    pub tx_hash: String,
    pub payload: String,
    pub chain: String,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub value: Option<f64>,
    pub block_number: Option<i64>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

//
// ================= Advice =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allocation {
    pub blue_chip: u8,
    #[serde(rename = "yield")]
    pub yield_: u8,
    pub growth: u8,
    pub speculative: u8,
}

impl Allocation {
    pub fn total(&self) -> u32 {
        self.blue_chip as u32 + self.yield_ as u32 + self.growth as u32 + self.speculative as u32
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "blue_chip={} yield={} growth={} speculative={}",
            self.blue_chip, self.yield_, self.growth, self.speculative
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Personalization {
    pub user_id: String,
    pub trade_count_30d: usize,
    pub buy_ratio: Option<f64>,
    pub top_traded_asset: Option<String>,
    pub holdings_count: usize,
    pub top_holding_asset: Option<String>,
    pub top_holding_share: Option<f64>,
    pub notes: Vec<String>,
    pub activity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdvisorOutput {
    pub recommendation: String,
    pub rationale: String,
    pub signals: Vec<String>,
    pub risk_score: f64,
    pub allocation: Allocation,
    pub confidence: f64,
    pub personalization: Option<Personalization>,
}

//
// ================= Decision =================
//

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DecisionRequest {
    pub route: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub profile: Option<RiskProfile>,
    #[serde(default)]
    pub trade: Option<TradeIntent>,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub status: DecisionStatus,
    pub detail: String,
    pub data: serde_json::Value,
}

/// Append-only audit entry; one per orchestrated call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision_id: Uuid,
    pub route: String,
    pub status: DecisionStatus,
    pub reason: String,
    /// Serialized request context.
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Route::Ingest => "ingest",
            Route::Advise => "advise",
            Route::Execute => "execute",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Policy engine for trade and profile validation
//!
//! Rules run in order and the first failure wins.
//! Pure function of configuration and input; no I/O.

use crate::config::PolicySettings;
use crate::models::RiskProfile;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Profiles allowing a deeper drawdown than this are rejected.
pub const MAX_PROFILE_DRAWDOWN: f64 = 0.6;

/// Deterministic reason attached to every verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyReason {
    Ok,
    SizeMustBePositive,
    PositionSizeExceedsLimit,
    AssetNotAllowed,
    ActionNotAllowed,
    RiskProfileTooAggressive,
}

impl PolicyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyReason::Ok => "ok",
            PolicyReason::SizeMustBePositive => "size-must-be-positive",
            PolicyReason::PositionSizeExceedsLimit => "position-size-exceeds-limit",
            PolicyReason::AssetNotAllowed => "asset-not-allowed",
            PolicyReason::ActionNotAllowed => "action-not-allowed",
            PolicyReason::RiskProfileTooAggressive => "risk-profile-too-aggressive",
        }
    }
}

impl fmt::Display for PolicyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyVerdict {
    pub allowed: bool,
    pub reason: PolicyReason,
}

impl PolicyVerdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: PolicyReason::Ok,
        }
    }

    pub fn reject(reason: PolicyReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }

    pub fn reason_code(&self) -> &'static str {
        self.reason.as_str()
    }
}

/// A single trade rule. Returns the rejection reason when it fails.
pub trait TradeRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, asset: &str, action: &str, size: f64) -> Option<PolicyReason>;
}

pub struct PositiveSizeRule;

impl TradeRule for PositiveSizeRule {
    fn name(&self) -> &'static str {
        "positive_size"
    }

    fn check(&self, _asset: &str, _action: &str, size: f64) -> Option<PolicyReason> {
        // NaN fails this comparison and is rejected here too.
        if size > 0.0 {
            None
        } else {
            Some(PolicyReason::SizeMustBePositive)
        }
    }
}

pub struct MaxPositionRule {
    pub max_position_size: f64,
}

impl TradeRule for MaxPositionRule {
    fn name(&self) -> &'static str {
        "max_position_size"
    }

    fn check(&self, _asset: &str, _action: &str, size: f64) -> Option<PolicyReason> {
        (size > self.max_position_size).then_some(PolicyReason::PositionSizeExceedsLimit)
    }
}

pub struct AllowedAssetRule {
    /// Upper-cased.
    pub assets: BTreeSet<String>,
}

impl TradeRule for AllowedAssetRule {
    fn name(&self) -> &'static str {
        "allowed_asset"
    }

    fn check(&self, asset: &str, _action: &str, _size: f64) -> Option<PolicyReason> {
        (!self.assets.contains(&asset.trim().to_uppercase()))
            .then_some(PolicyReason::AssetNotAllowed)
    }
}

pub struct AllowedActionRule {
    /// Lower-cased.
    pub actions: BTreeSet<String>,
}

impl TradeRule for AllowedActionRule {
    fn name(&self) -> &'static str {
        "allowed_action"
    }

    fn check(&self, _asset: &str, action: &str, _size: f64) -> Option<PolicyReason> {
        (!self.actions.contains(&action.trim().to_lowercase()))
            .then_some(PolicyReason::ActionNotAllowed)
    }
}

/// Policy engine holding the ordered trade rules
pub struct PolicyEngine {
    rules: Vec<Box<dyn TradeRule>>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Standard rule order: size, position limit, asset, action.
    pub fn from_settings(settings: &PolicySettings) -> Self {
        let mut engine = Self::new();
        engine.add_rule(Box::new(PositiveSizeRule));
        engine.add_rule(Box::new(MaxPositionRule {
            max_position_size: settings.max_position_size,
        }));
        engine.add_rule(Box::new(AllowedAssetRule {
            assets: settings.allowed_assets.clone(),
        }));
        engine.add_rule(Box::new(AllowedActionRule {
            actions: settings.allowed_actions.clone(),
        }));
        engine
    }

    pub fn add_rule(&mut self, rule: Box<dyn TradeRule>) {
        self.rules.push(rule);
    }

    pub fn validate_trade(&self, asset: &str, action: &str, size: f64) -> PolicyVerdict {
        for rule in &self.rules {
            if let Some(reason) = rule.check(asset, action, size) {
                debug!(rule = rule.name(), reason = %reason, "Trade rejected by policy");
                return PolicyVerdict::reject(reason);
            }
        }
        PolicyVerdict::allow()
    }

    pub fn validate_profile(&self, profile: &RiskProfile) -> PolicyVerdict {
        if profile.max_drawdown > MAX_PROFILE_DRAWDOWN {
            return PolicyVerdict::reject(PolicyReason::RiskProfileTooAggressive);
        }
        PolicyVerdict::allow()
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyMode;

    fn engine() -> PolicyEngine {
        PolicyEngine::from_settings(&PolicySettings {
            mode: PolicyMode::PaperTrade,
            max_position_size: 25.0,
            max_gas: 300_000,
            max_slippage_bps: 100,
            allowed_assets: ["BNB", "BUSD", "USDT"].iter().map(|s| s.to_string()).collect(),
            allowed_actions: ["swap", "transfer"].iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn test_non_positive_size_checked_first() {
        let engine = engine();
        for size in [0.0, -1.0, -1000.0, f64::NAN] {
            // Asset and action are also invalid; size must still win.
            let verdict = engine.validate_trade("DOGE", "burn", size);
            assert!(!verdict.allowed);
            assert_eq!(verdict.reason_code(), "size-must-be-positive");
        }
    }

    #[test]
    fn test_position_limit() {
        let verdict = engine().validate_trade("BNB", "swap", 30.0);
        assert_eq!(verdict, PolicyVerdict::reject(PolicyReason::PositionSizeExceedsLimit));

        let at_limit = engine().validate_trade("BNB", "swap", 25.0);
        assert!(at_limit.allowed);
    }

    #[test]
    fn test_asset_and_action_case_insensitive() {
        let engine = engine();
        assert!(engine.validate_trade(" bnb ", "SWAP", 1.0).allowed);
        assert_eq!(
            engine.validate_trade("ETH", "swap", 1.0).reason_code(),
            "asset-not-allowed"
        );
        assert_eq!(
            engine.validate_trade("usdt", "approve", 1.0).reason_code(),
            "action-not-allowed"
        );
    }

    #[test]
    fn test_profile_drawdown_ceiling() {
        let engine = engine();
        let calm = RiskProfile { risk_tolerance: 0.4, horizon_days: 90, max_drawdown: 0.6 };
        assert!(engine.validate_profile(&calm).allowed);

        let wild = RiskProfile { max_drawdown: 0.61, ..calm };
        let verdict = engine.validate_profile(&wild);
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason_code(), "risk-profile-too-aggressive");
    }

    #[test]
    fn test_empty_engine_allows() {
        assert!(PolicyEngine::new().validate_trade("ANY", "thing", -1.0).allowed);
    }
}

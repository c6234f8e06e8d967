//! Execute path: plan, pre-submission gates, submission.

use super::{bounded, DecisionOrchestrator};
use crate::config::PolicyMode;
use crate::error::OrchestrationError;
use crate::models::{DecisionStatus, ExecutionPlan, TradeIntent};
use crate::submit::is_valid_address;
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const GAS_OR_SLIPPAGE_LIMIT: &str = "gas-or-slippage-limit";
pub const INVALID_CALL_DATA: &str = "invalid-call-data";
pub const INVALID_TO_ADDRESS: &str = "invalid-to-address";
pub const MISSING_TO_ADDRESS: &str = "missing-to-address";
pub const MISSING_CALL_DATA: &str = "missing-call-data";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub status: DecisionStatus,
    /// Set only for rejections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub plan: ExecutionPlan,
    /// Empty unless a transaction was broadcast.
    pub tx_hash: String,
}

impl ExecutionReport {
    fn rejected(reason: &str, plan: ExecutionPlan) -> Self {
        Self {
            status: DecisionStatus::Rejected,
            reason: Some(reason.to_string()),
            plan,
            tx_hash: String::new(),
        }
    }

    fn finished(status: DecisionStatus, plan: ExecutionPlan, tx_hash: String) -> Self {
        Self {
            status,
            reason: None,
            plan,
            tx_hash,
        }
    }
}

/// Hex call data with an optional `0x` prefix; absent or empty decodes to no bytes.
pub fn decode_call_data(call_data: Option<&str>) -> Result<Vec<u8>> {
    let raw = call_data.map(str::trim).unwrap_or("");
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    hex::decode(digits)
        .map_err(|e| OrchestrationError::InvalidInput(format!("call_data is not valid hex: {}", e)))
}

impl DecisionOrchestrator {
    /// Runs after the read-only gate and policy have passed.
    pub(super) async fn execute(&self, trade: &TradeIntent) -> Result<ExecutionReport> {
        trade.validate()?;
        let plan = self
            .planner
            .build_plan(&trade.strategy_id, &trade.asset, &trade.action, trade.size)?;

        if plan.estimated_gas > self.max_gas || plan.slippage_bps > self.max_slippage_bps {
            debug!(
                estimated_gas = plan.estimated_gas,
                slippage_bps = plan.slippage_bps,
                "Plan exceeds execution limits"
            );
            return Ok(ExecutionReport::rejected(GAS_OR_SLIPPAGE_LIMIT, plan));
        }

        let Ok(data) = decode_call_data(trade.call_data.as_deref()) else {
            return Ok(ExecutionReport::rejected(INVALID_CALL_DATA, plan));
        };

        let to_address = trade
            .to_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty());
        match to_address {
            Some(address) if !is_valid_address(address) => {
                return Ok(ExecutionReport::rejected(INVALID_TO_ADDRESS, plan));
            }
            None if self.execute_live => {
                return Ok(ExecutionReport::rejected(MISSING_TO_ADDRESS, plan));
            }
            _ => {}
        }

        if data.is_empty() && trade.value_wei == 0 && self.execute_live {
            return Ok(ExecutionReport::rejected(MISSING_CALL_DATA, plan));
        }

        if self.mode == PolicyMode::PaperTrade {
            return Ok(ExecutionReport::finished(DecisionStatus::PaperTrade, plan, String::new()));
        }

        let receipt = bounded(
            self.timeout,
            "submission",
            self.submitter.submit(to_address.unwrap_or(""), &data, trade.value_wei),
        )
        .await?;

        Ok(ExecutionReport::finished(receipt.status.into(), plan, receipt.tx_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_call_data() {
        assert_eq!(decode_call_data(None).unwrap(), Vec::<u8>::new());
        assert_eq!(decode_call_data(Some("")).unwrap(), Vec::<u8>::new());
        assert_eq!(decode_call_data(Some("0xa9059cbb")).unwrap(), vec![0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(decode_call_data(Some("ABCD")).unwrap(), vec![0xab, 0xcd]);

        // Odd length and non-hex digits are both malformed.
        assert!(decode_call_data(Some("0xabc")).is_err());
        assert!(decode_call_data(Some("0xzz")).is_err());
    }
}

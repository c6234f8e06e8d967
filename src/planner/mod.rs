//! Execution planner
//!
//! Turns a trade intent into a deterministic, pre-submission plan.
//! No I/O, no clock, no randomness: the same inputs always yield the same plan.

use crate::error::OrchestrationError;
use crate::models::{ExecutionPlan, GasStrategy, PlanStatus};
use crate::Result;
use sha2::{Digest, Sha256};

const PLAN_ID_LEN: usize = 12;
const DEADLINE_SEC: u32 = 120;
/// Sizes above this no longer increase the gas estimate.
const GAS_SIZE_CAP: f64 = 50.0;

pub const SAFETY_CHECKS: [&str; 4] = [
    "nonce-free",
    "allowance-verified",
    "slippage-within-bounds",
    "size-within-policy",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionPlanner;

impl ExecutionPlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn build_plan(
        &self,
        strategy_id: &str,
        asset: &str,
        action: &str,
        size: f64,
    ) -> Result<ExecutionPlan> {
        if !(size > 0.0) {
            return Err(OrchestrationError::InvalidInput(
                "size must be positive".to_string(),
            ));
        }

        let base_gas: u64 = match action.to_lowercase().as_str() {
            "swap" => 120_000,
            "approve" => 55_000,
            _ => 80_000,
        };
        let estimated_gas = (base_gas as f64 * (1.0 + size.min(GAS_SIZE_CAP) / 100.0)).floor() as u64;

        let slippage_bps = if size < 5.0 {
            20
        } else if size < 20.0 {
            35
        } else {
            60
        };

        let gas_strategy = if size < 10.0 {
            GasStrategy::Economy
        } else {
            GasStrategy::Fast
        };

        Ok(ExecutionPlan {
            plan_id: plan_id(strategy_id, asset, action, size),
            estimated_gas,
            slippage_bps,
            gas_strategy,
            deadline_sec: DEADLINE_SEC,
            safety_checks: SAFETY_CHECKS.iter().map(|s| s.to_string()).collect(),
            status: PlanStatus::Ready,
        })
    }
}

/// First 12 hex chars of SHA-256 over `"{strategy_id}:{asset}:{action}:{size}"`.
pub fn plan_id(strategy_id: &str, asset: &str, action: &str, size: f64) -> String {
    let seed = format!("{}:{}:{}:{}", strategy_id, asset, action, canonical_size(size));
    let digest = Sha256::digest(seed.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(PLAN_ID_LEN);
    id
}

/// Shortest round-trip decimal, rendered the way the plan ids were first
/// seeded: integral sizes keep one decimal place (`5` → `"5.0"`), and
/// exponents below -4 or from 16 up switch to `1e-05` / `2e+16` notation.
fn canonical_size(size: f64) -> String {
    let scientific = format!("{:e}", size);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };

    if (-4..16).contains(&exponent) {
        let plain = format!("{}", size);
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

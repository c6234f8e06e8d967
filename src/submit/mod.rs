//! Transaction submission
//!
//! The submitter is the only component allowed to broadcast. It refuses
//! (with a status, not an error) unless live execution is switched on and
//! every precondition holds.

use crate::config::{ExecutionSettings, Secret};
use crate::error::OrchestrationError;
use crate::models::DecisionStatus;
use crate::Result;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

pub const GAS_LIMIT: u64 = 200_000;
const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionStatus {
    Submitted,
    DryRun,
    MissingCredentials,
    InvalidTarget,
    MissingCallData,
}

impl From<SubmissionStatus> for DecisionStatus {
    fn from(status: SubmissionStatus) -> Self {
        match status {
            SubmissionStatus::Submitted => DecisionStatus::Submitted,
            SubmissionStatus::DryRun => DecisionStatus::DryRun,
            SubmissionStatus::MissingCredentials => DecisionStatus::MissingCredentials,
            SubmissionStatus::InvalidTarget => DecisionStatus::InvalidTarget,
            SubmissionStatus::MissingCallData => DecisionStatus::MissingCallData,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    /// Empty unless the transaction was broadcast.
    pub tx_hash: String,
    pub status: SubmissionStatus,
}

impl SubmissionReceipt {
    fn refused(status: SubmissionStatus) -> Self {
        Self {
            tx_hash: String::new(),
            status,
        }
    }
}

#[async_trait::async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, to_address: &str, data: &[u8], value_wei: u128) -> Result<SubmissionReceipt>;
}

/// `0x` plus 40 hex digits, and not the zero address.
pub fn is_valid_address(address: &str) -> bool {
    let Some(digits) = address.strip_prefix("0x") else {
        return false;
    };
    digits.len() == 40
        && digits.chars().all(|c| c.is_ascii_hexdigit())
        && !address.eq_ignore_ascii_case(ZERO_ADDRESS)
}

/// Signs with a local key and broadcasts over JSON-RPC.
pub struct ChainSubmitter {
    execute_live: bool,
    rpc_url: Option<String>,
    private_key: Option<Secret>,
    timeout: Duration,
}

impl ChainSubmitter {
    pub fn new(settings: &ExecutionSettings, timeout: Duration) -> Self {
        Self {
            execute_live: settings.execute_live,
            rpc_url: settings.rpc_url.clone(),
            private_key: settings.private_key.clone(),
            timeout,
        }
    }

    async fn broadcast(
        &self,
        rpc_url: &str,
        key: &Secret,
        to: Address,
        data: &[u8],
        value_wei: u128,
    ) -> Result<String> {
        let signer: PrivateKeySigner = key
            .expose()
            .parse()
            .map_err(|_| OrchestrationError::SubmissionFailure("invalid signing key".to_string()))?;
        let url: reqwest::Url = rpc_url
            .parse()
            .map_err(|e| OrchestrationError::SubmissionFailure(format!("invalid RPC URL: {}", e)))?;

        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new().wallet(wallet).connect_http(url);

        let tx = TransactionRequest::default()
            .with_to(to)
            .with_value(U256::from(value_wei))
            .with_input(Bytes::copy_from_slice(data))
            .with_gas_limit(GAS_LIMIT);

        let pending = tokio::time::timeout(self.timeout, provider.send_transaction(tx))
            .await
            .map_err(|_| OrchestrationError::SubmissionFailure("RPC call timed out".to_string()))?
            .map_err(|e| OrchestrationError::SubmissionFailure(format!("send failed: {}", e)))?;

        Ok(format!("{}", pending.tx_hash()))
    }
}

#[async_trait::async_trait]
impl Submitter for ChainSubmitter {
    async fn submit(&self, to_address: &str, data: &[u8], value_wei: u128) -> Result<SubmissionReceipt> {
        if !self.execute_live {
            return Ok(SubmissionReceipt::refused(SubmissionStatus::DryRun));
        }

        let (Some(rpc_url), Some(key)) = (self.rpc_url.as_deref(), self.private_key.as_ref()) else {
            warn!("Live execution enabled without RPC_URL or PRIVATE_KEY");
            return Ok(SubmissionReceipt::refused(SubmissionStatus::MissingCredentials));
        };

        if !is_valid_address(to_address) {
            return Ok(SubmissionReceipt::refused(SubmissionStatus::InvalidTarget));
        }
        let to: Address = to_address
            .parse()
            .map_err(|_| OrchestrationError::InvalidInput("malformed target address".to_string()))?;

        if data.is_empty() && value_wei == 0 {
            return Ok(SubmissionReceipt::refused(SubmissionStatus::MissingCallData));
        }

        let tx_hash = self.broadcast(rpc_url, key, to, data, value_wei).await?;
        info!(tx_hash = %tx_hash, to = %to_address, value_wei = %value_wei, "Transaction submitted");

        Ok(SubmissionReceipt {
            tx_hash,
            status: SubmissionStatus::Submitted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "0x1111111111111111111111111111111111111111";

    fn submitter(execute_live: bool, with_credentials: bool) -> ChainSubmitter {
        let settings = ExecutionSettings {
            execute_live,
            rpc_url: with_credentials.then(|| "http://127.0.0.1:1".to_string()),
            private_key: with_credentials.then(|| {
                Secret::new("0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d")
            }),
        };
        ChainSubmitter::new(&settings, Duration::from_secs(2))
    }

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address(TARGET));
        assert!(is_valid_address("0xAbCdEf0123456789abcdef0123456789ABCDEF01"));
        assert!(!is_valid_address(ZERO_ADDRESS));
        assert!(!is_valid_address("0x1234"));
        assert!(!is_valid_address("1111111111111111111111111111111111111111"));
        assert!(!is_valid_address("0xZZ11111111111111111111111111111111111111"));
    }

    #[tokio::test]
    async fn test_not_live_is_dry_run() {
        let receipt = submitter(false, true).submit(TARGET, &[1, 2], 0).await.unwrap();
        assert_eq!(receipt.status, SubmissionStatus::DryRun);
        assert!(receipt.tx_hash.is_empty());
    }

    #[tokio::test]
    async fn test_gates_run_in_order() {
        let no_creds = submitter(true, false);
        // Credentials are checked before the target.
        assert_eq!(
            no_creds.submit("bogus", &[], 0).await.unwrap().status,
            SubmissionStatus::MissingCredentials
        );

        let live = submitter(true, true);
        assert_eq!(
            live.submit(ZERO_ADDRESS, &[1], 0).await.unwrap().status,
            SubmissionStatus::InvalidTarget
        );
        assert_eq!(
            live.submit(TARGET, &[], 0).await.unwrap().status,
            SubmissionStatus::MissingCallData
        );
    }

    #[tokio::test]
    async fn test_unreachable_rpc_is_submission_failure() {
        let err = submitter(true, true).submit(TARGET, &[], 1).await.unwrap_err();
        assert_eq!(err.code(), "submission-failed");
    }

    #[test]
    fn test_status_maps_onto_decision_status() {
        assert_eq!(DecisionStatus::from(SubmissionStatus::DryRun), DecisionStatus::DryRun);
        assert_eq!(DecisionStatus::from(SubmissionStatus::Submitted).as_str(), "submitted");
    }
}

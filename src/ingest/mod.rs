//! Chain-activity ingestion sources
//!
//! A source fetches a wallet's recent transactions and normalizes them into
//! [`RawEvent`]s. Which source is used is a configuration decision made once
//! at startup.

pub mod bitquery;
pub mod bscscan;

pub use bitquery::BitquerySource;
pub use bscscan::BscScanSource;

use crate::config::{DataProvider, DataSettings};
use crate::error::OrchestrationError;
use crate::models::RawEvent;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Values above this are assumed to be wei and scaled to whole tokens.
const WEI_THRESHOLD: f64 = 1e9;
const WEI_PER_TOKEN: f64 = 1e18;
const TRANSFER_TAG: &str = "transfer";

#[async_trait::async_trait]
pub trait IngestionSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_wallet_activity(&self, address: &str) -> Result<Vec<RawEvent>>;
}

/// Build the configured source. Fails with `ProviderUnavailable` when its API key is absent.
pub fn source_from_settings(
    settings: &DataSettings,
    timeout: Duration,
) -> Result<Arc<dyn IngestionSource>> {
    match settings.provider {
        DataProvider::BscScan => {
            let key = settings.bscscan_api_key.clone().ok_or_else(|| {
                OrchestrationError::ProviderUnavailable(
                    "BSCSCAN_API_KEY must be set to use BscScan".to_string(),
                )
            })?;
            Ok(Arc::new(BscScanSource::new(
                key,
                settings.bscscan_endpoint.clone(),
                timeout,
            )?))
        }
        DataProvider::Bitquery => {
            let key = settings.bitquery_api_key.clone().ok_or_else(|| {
                OrchestrationError::ProviderUnavailable(
                    "BITQUERY_API_KEY must be set to use Bitquery".to_string(),
                )
            })?;
            Ok(Arc::new(BitquerySource::new(
                key,
                settings.bitquery_endpoint.clone(),
                timeout,
            )?))
        }
    }
}

pub(crate) fn normalize_value(amount: f64) -> f64 {
    if amount > WEI_THRESHOLD {
        amount / WEI_PER_TOKEN
    } else {
        amount
    }
}

/// Assemble a transfer event; `None` when the transaction has no hash.
pub(crate) fn transfer_event(
    tx_hash: Option<String>,
    from: Option<String>,
    to: Option<String>,
    value: Option<f64>,
    block_number: Option<i64>,
) -> Option<RawEvent> {
    let tx_hash = tx_hash.filter(|h| !h.trim().is_empty())?;
    let payload = format!(
        "from {} to {} value {} block {}",
        from.as_deref().unwrap_or("none"),
        to.as_deref().unwrap_or("none"),
        value.map(display_amount).unwrap_or_else(|| "none".to_string()),
        block_number.map(|b| b.to_string()).unwrap_or_else(|| "none".to_string()),
    );

    Some(RawEvent {
        tx_hash,
        payload,
        from_address: from,
        to_address: to,
        value,
        block_number,
        tags: vec![TRANSFER_TAG.to_string()],
    })
}

fn display_amount(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;

    fn data_settings(provider: DataProvider) -> DataSettings {
        DataSettings {
            provider,
            bscscan_api_key: None,
            bscscan_endpoint: "http://localhost:1/api".into(),
            bitquery_api_key: Some(Secret::new("bq-key")),
            bitquery_endpoint: "http://localhost:1/graphql".into(),
        }
    }

    #[test]
    fn test_missing_key_is_provider_unavailable() {
        let err = source_from_settings(&data_settings(DataProvider::BscScan), Duration::from_secs(1))
            .err()
            .unwrap();
        assert_eq!(err.code(), "provider-unavailable");

        let source =
            source_from_settings(&data_settings(DataProvider::Bitquery), Duration::from_secs(1))
                .unwrap();
        assert_eq!(source.name(), "bitquery");
    }

    #[test]
    fn test_wei_values_are_scaled() {
        assert_eq!(normalize_value(2e18), 2.0);
        assert_eq!(normalize_value(15.5), 15.5);
    }

    #[test]
    fn test_transfer_event_payload() {
        let event = transfer_event(
            Some("0xfeed".into()),
            Some("0xa".into()),
            None,
            Some(2.0),
            Some(42),
        )
        .unwrap();
        assert_eq!(event.payload, "from 0xa to none value 2.0 block 42");
        assert_eq!(event.tags, vec!["transfer"]);

        assert!(transfer_event(None, None, None, None, None).is_none());
        assert!(transfer_event(Some(" ".into()), None, None, None, None).is_none());
    }
}

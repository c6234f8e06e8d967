//! BscScan `account/txlist` source

use super::{normalize_value, transfer_event, IngestionSource};
use crate::config::Secret;
use crate::error::OrchestrationError;
use crate::http::pooled_client;
use crate::models::RawEvent;
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const START_BLOCK: &str = "0";
const END_BLOCK: &str = "99999999";

pub struct BscScanSource {
    client: Client,
    api_key: Secret,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct TxListResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    /// An array on success, an error string otherwise.
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TxItem {
    hash: Option<String>,
    from: Option<String>,
    to: Option<String>,
    value: Option<String>,
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
}

impl BscScanSource {
    pub fn new(api_key: Secret, endpoint: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: pooled_client(timeout)?,
            api_key,
            endpoint,
        })
    }
}

#[async_trait::async_trait]
impl IngestionSource for BscScanSource {
    fn name(&self) -> &'static str {
        "bscscan"
    }

    async fn fetch_wallet_activity(&self, address: &str) -> Result<Vec<RawEvent>> {
        let params = [
            ("module", "account"),
            ("action", "txlist"),
            ("address", address),
            ("startblock", START_BLOCK),
            ("endblock", END_BLOCK),
            ("sort", "desc"),
            ("apikey", self.api_key.expose()),
        ];

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| OrchestrationError::IngestionError(format!("BscScan request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(OrchestrationError::IngestionError(format!(
                "BscScan returned HTTP {}",
                response.status()
            )));
        }

        let body: TxListResponse = response.json().await.map_err(|e| {
            OrchestrationError::IngestionError(format!("BscScan parse error: {}", e))
        })?;

        parse_txlist(body)
    }
}

fn parse_txlist(body: TxListResponse) -> Result<Vec<RawEvent>> {
    if body.status != "1" {
        // "No transactions found" also arrives as status 0.
        debug!(message = ?body.message, "BscScan returned no activity");
        return Ok(Vec::new());
    }

    let items: Vec<TxItem> = serde_json::from_value(body.result)?;
    let mut events = Vec::with_capacity(items.len());
    for item in items {
        let value = item
            .value
            .as_deref()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(normalize_value);
        let block_number = item.block_number.as_deref().and_then(|b| b.trim().parse::<i64>().ok());

        match transfer_event(item.hash, item.from, item.to, value, block_number) {
            Some(event) => events.push(event),
            None => warn!("Skipping BscScan transaction without hash"),
        }
    }
    Ok(events)
}

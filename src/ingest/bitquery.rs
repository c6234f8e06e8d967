//! Bitquery GraphQL source

use super::{normalize_value, transfer_event, IngestionSource};
use crate::config::Secret;
use crate::error::OrchestrationError;
use crate::http::pooled_client;
use crate::models::RawEvent;
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

const WALLET_ACTIVITY_QUERY: &str = r#"
query ($address: String!) {
  ethereum(network: bsc) {
    transactions(txSender: {is: $address}, options: {limit: 20, desc: "block.height"}) {
      hash
      block {
        height
      }
      to {
        address
      }
      value
    }
  }
}
"#;

pub struct BitquerySource {
    client: Client,
    api_key: Secret,
    endpoint: String,
}

#[derive(Debug, Default, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Data>,
}

#[derive(Debug, Default, Deserialize)]
struct Data {
    #[serde(default)]
    ethereum: Option<Ethereum>,
}

#[derive(Debug, Default, Deserialize)]
struct Ethereum {
    #[serde(default)]
    transactions: Vec<Transaction>,
}

#[derive(Debug, Deserialize)]
struct Transaction {
    hash: Option<String>,
    block: Option<Block>,
    to: Option<Receiver>,
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Block {
    height: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Receiver {
    address: Option<String>,
}

impl BitquerySource {
    pub fn new(api_key: Secret, endpoint: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: pooled_client(timeout)?,
            api_key,
            endpoint,
        })
    }
}

#[async_trait::async_trait]
impl IngestionSource for BitquerySource {
    fn name(&self) -> &'static str {
        "bitquery"
    }

    async fn fetch_wallet_activity(&self, address: &str) -> Result<Vec<RawEvent>> {
        let body = json!({
            "query": WALLET_ACTIVITY_QUERY,
            "variables": { "address": address },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                OrchestrationError::IngestionError(format!("Bitquery request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(OrchestrationError::IngestionError(format!(
                "Bitquery returned HTTP {}",
                response.status()
            )));
        }

        let parsed: GraphQlResponse = response.json().await.map_err(|e| {
            OrchestrationError::IngestionError(format!("Bitquery parse error: {}", e))
        })?;

        Ok(parse_transactions(address, parsed))
    }
}

fn parse_transactions(sender: &str, response: GraphQlResponse) -> Vec<RawEvent> {
    let transactions = response
        .data
        .and_then(|d| d.ethereum)
        .map(|e| e.transactions)
        .unwrap_or_default();

    transactions
        .into_iter()
        .filter_map(|tx| {
            let event = transfer_event(
                tx.hash,
                Some(sender.to_string()),
                tx.to.and_then(|r| r.address),
                tx.value.map(normalize_value),
                tx.block.and_then(|b| b.height),
            );
            if event.is_none() {
                warn!("Skipping Bitquery transaction without hash");
            }
            event
        })
        .collect()
}

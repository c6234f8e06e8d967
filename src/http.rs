//! Shared outbound HTTP client construction.

use crate::error::OrchestrationError;
use crate::Result;
use reqwest::Client;
use std::time::Duration;

/// Long-lived, connection-pooled client with a per-request timeout.
pub fn pooled_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(8)
        .timeout(timeout)
        .build()
        .map_err(|e| OrchestrationError::Config(format!("Failed to build HTTP client: {}", e)))
}

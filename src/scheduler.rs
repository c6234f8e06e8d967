//! Periodic ingestion
//!
//! Routes an `ingest` decision for the configured wallet on a fixed
//! interval. Each tick goes through the orchestrator, so policy and the
//! decision log apply exactly as they do for API callers.

use crate::models::{DecisionRequest, DecisionStatus};
use crate::orchestrator::DecisionOrchestrator;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const STOP_GRACE: Duration = Duration::from_secs(2);

pub struct IngestScheduler {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl IngestScheduler {
    /// Spawn the loop. The first tick fires immediately.
    pub fn start(
        orchestrator: Arc<DecisionOrchestrator>,
        wallet: Option<String>,
        interval: Duration,
    ) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Ingest scheduler started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_once(&orchestrator, wallet.as_deref()).await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Ingest scheduler stopped");
        });

        Self { stop_tx, handle }
    }

    /// Signal the loop and wait briefly for the in-flight tick to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if tokio::time::timeout(STOP_GRACE, self.handle).await.is_err() {
            warn!("Ingest scheduler did not stop within {:?}", STOP_GRACE);
        }
    }
}

async fn run_once(orchestrator: &DecisionOrchestrator, wallet: Option<&str>) {
    let Some(wallet) = wallet.map(str::trim).filter(|w| !w.is_empty()) else {
        warn!("INGEST_WALLET not set; skipping scheduled ingest");
        return;
    };

    let mut payload = serde_json::Map::new();
    payload.insert("address".to_string(), json!(wallet));
    let request = DecisionRequest {
        route: "ingest".to_string(),
        intent: "scheduled ingest".to_string(),
        payload,
        ..Default::default()
    };

    match orchestrator.route(request).await {
        Ok(response) if response.status == DecisionStatus::Accepted => {
            debug!(wallet = %wallet, data = %response.data, "Scheduled ingest complete");
        }
        Ok(response) => {
            warn!(wallet = %wallet, status = %response.status, detail = %response.detail, "Scheduled ingest not accepted");
        }
        Err(e) => {
            warn!(wallet = %wallet, error = %e, "Scheduled ingest failed");
        }
    }
}

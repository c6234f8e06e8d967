use std::sync::Arc;
use tracing::{info, warn};
use trade_decision_router::{
    api::start_server, logging, scheduler::IngestScheduler, DecisionOrchestrator, Settings,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    let settings = Arc::new(Settings::from_env()?);
    logging::init(&settings.log_level, settings.log_format);

    info!("Trade Decision Router - API Server");
    info!(port = settings.port, mode = ?settings.policy.mode, "Configuration loaded");

    let orchestrator = Arc::new(DecisionOrchestrator::from_settings(&settings)?);
    info!("Orchestrator initialized");

    let scheduler = settings.ingest.enabled.then(|| {
        IngestScheduler::start(
            orchestrator.clone(),
            settings.ingest.wallet.clone(),
            settings.ingest.interval,
        )
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown signal received");
    };

    let served = start_server(orchestrator, settings.clone(), shutdown).await;

    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }

    served?;
    Ok(())
}

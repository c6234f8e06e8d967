use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::info;
use trade_decision_router::{logging, DecisionOrchestrator, DecisionRequest, Settings};

/// Route one decision request read from a JSON file (or stdin) and print the response.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let settings = Settings::from_env()?;
    logging::init(&settings.log_level, settings.log_format);

    let raw = match std::env::args().nth(1).filter(|arg| arg != "-") {
        Some(path) => tokio::fs::read_to_string(PathBuf::from(path)).await?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };
    let request: DecisionRequest = serde_json::from_str(&raw)?;

    let orchestrator = DecisionOrchestrator::from_settings(&settings)?;

    info!(route = %request.route, mode = ?settings.policy.mode, "Routing decision request");

    let response = orchestrator.route(request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

use loan_orchestrator::{api::start_server, config::AppConfig, telemetry, Orchestrator};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    telemetry::init(&config.log_level)?;

    info!("🚀 Loan Orchestrator - API Server");
    info!("📍 Port: {}", config.port);

    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);

    info!("✅ Orchestrator initialized");
    info!("📡 Starting API server...");

    start_server(orchestrator, config.port, config.session_ttl).await?;

    Ok(())
}

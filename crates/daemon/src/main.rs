//! TradeGate Daemon Binary
//!
//! Loads settings (a JSON file given as the first argument, or the
//! environment), then serves HTTP until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tradegate_daemon::{build_orchestrator, serve, DaemonError};
use tradegate_logging::init_logging;
use tradegate_settings::Settings;

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    dotenv::dotenv().ok();

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load_from(&PathBuf::from(path))?,
        None => Settings::from_env()?,
    };
    if let Err(e) = init_logging(&settings.logging) {
        eprintln!("Logging already initialised: {}", e);
    }

    tracing::info!("Starting TradeGate daemon...");

    let orchestrator = Arc::new(build_orchestrator(&settings)?);
    let listener = TcpListener::bind((settings.server.host.as_str(), settings.server.port)).await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received shutdown signal");
    };

    if let Err(e) = serve(listener, orchestrator, shutdown).await {
        tracing::error!("Server error: {}", e);
        return Err(e);
    }

    tracing::info!("Daemon stopped");
    Ok(())
}

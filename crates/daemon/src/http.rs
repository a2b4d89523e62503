//! HTTP surface
//!
//! - `POST /trade/execute`: validate, acknowledge, start post-trade actions
//! - `GET /health`: liveness

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{debug, info};
use tradegate_core::TradeCommand;

use crate::service::SettlementOrchestrator;
use crate::Result;

/// Request body limit
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn router(orchestrator: Arc<SettlementOrchestrator>) -> Router {
    Router::new()
        .route("/trade/execute", post(execute_trade))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(orchestrator)
}

/// Serve until `shutdown` resolves.
pub async fn serve<S>(listener: TcpListener, orchestrator: Arc<SettlementOrchestrator>, shutdown: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(
        addr = %addr,
        distribution = orchestrator.distribution_gateway().is_enabled(),
        signal = orchestrator.signal_gateway().is_enabled(),
        "Server started"
    );
    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn execute_trade(State(orchestrator): State<Arc<SettlementOrchestrator>>, body: Bytes) -> Response {
    let value: Value = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(_) => return bad_request("Request body must be valid JSON"),
        }
    };

    match TradeCommand::from_json(&value) {
        Ok(command) => {
            debug!(trade_id = %command.trade_id, agent_id = %command.agent_id, "Trade received");
            Json(orchestrator.execute_trade(command)).into_response()
        }
        Err(e) => bad_request(&e.to_string()),
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

//! Tunnel lifecycle routes.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use oakci_infrastructure::state::DaemonState;
use serde_json::{Value, json};

use crate::error::ApiResult;

/// `POST /api/tunnel/start` - returns once the public URL is known and
/// registers it as a CORS origin.
pub async fn start(State(state): State<Arc<DaemonState>>) -> ApiResult<Json<Value>> {
    let config = state.config.get();
    let url = state
        .tunnel
        .start(&config.tunnel, config.server.port)
        .await?;
    state.add_cors_origin(&url);
    Ok(Json(json!({ "started": true, "url": url })))
}

/// `POST /api/tunnel/stop` - tears down the process and removes the
/// CORS origin.
pub async fn stop(State(state): State<Arc<DaemonState>>) -> ApiResult<Json<Value>> {
    let url = state.tunnel.stop().await?;
    if let Some(url) = &url {
        state.remove_cors_origin(url);
    }
    Ok(Json(json!({ "stopped": true, "url": url })))
}

/// `GET /api/tunnel/status`.
pub async fn status(State(state): State<Arc<DaemonState>>) -> Json<Value> {
    Json(json!(state.tunnel.status()))
}

//! Self-restart and configuration routes.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use oakci_domain::value_objects::CiConfig;
use oakci_infrastructure::lifecycle::spawn_restart;
use oakci_infrastructure::state::DaemonState;
use serde_json::{Value, json};

use crate::error::ApiResult;

/// `POST /api/restart` - answers immediately, spawns a detached
/// successor, and schedules graceful shutdown.
pub async fn restart(State(state): State<Arc<DaemonState>>) -> ApiResult<Json<Value>> {
    spawn_restart(&state)?;
    Ok(Json(json!({ "restarting": true })))
}

/// `GET /api/config`.
pub async fn get_config(State(state): State<Arc<DaemonState>>) -> Json<CiConfig> {
    let mut config = state.config.get();
    // Tokens never leave the daemon.
    config.cloud_relay.relay_token = None;
    for provider in std::iter::once(&mut config.embedding.primary)
        .chain(config.embedding.fallbacks.iter_mut())
    {
        provider.api_key = None;
    }
    config.summarization.api_key = None;
    Json(config)
}

/// `PUT /api/config` - replaces the live snapshot and persists it.
pub async fn put_config(
    State(state): State<Arc<DaemonState>>,
    Json(config): Json<CiConfig>,
) -> ApiResult<Json<Value>> {
    state.config.set(config);
    state.config.save(&state.paths.config_file())?;
    Ok(Json(json!({ "saved": true })))
}

//! Cloud relay lifecycle routes.
//!
//! `start` runs the whole pipeline (scaffold, install, auth check,
//! deploy, connect) and reports the failing phase in a structured error
//! so the UI can point at the exact step.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use oakci_infrastructure::cloud_relay::RelayError;
use oakci_infrastructure::state::DaemonState;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::models::{CloudConnectRequest, CloudSettingsRequest};

fn phased(error: RelayError) -> ApiError {
    ApiError::Phased {
        status: StatusCode::BAD_GATEWAY,
        detail: error.error.to_string(),
        phase: serde_json::to_value(error.phase)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "unknown".to_owned()),
        suggestion: error.suggestion,
    }
}

/// `GET /api/cloud/preflight`.
pub async fn preflight(State(state): State<Arc<DaemonState>>) -> Json<Value> {
    let status = state.cloud_relay.preflight();
    let config = state.config.get().cloud_relay;
    Json(json!({
        "status": status,
        "worker_name": config.worker_name,
        "relay_url_configured": config.relay_url.is_some(),
    }))
}

/// `POST /api/cloud/start` - scaffold, install, auth check, deploy, and
/// connect when a relay URL is already configured.
pub async fn start(State(state): State<Arc<DaemonState>>) -> ApiResult<Json<Value>> {
    let config = state.config.get().cloud_relay;
    state.cloud_relay.scaffold(&config).map_err(phased)?;
    state.cloud_relay.install(&config).await.map_err(phased)?;
    state.cloud_relay.check_auth(&config).await.map_err(phased)?;
    state.cloud_relay.deploy(&config).await.map_err(phased)?;

    if let Some(relay_url) = &config.relay_url {
        state
            .cloud_relay
            .connect(relay_url, config.relay_token.as_deref())
            .await
            .map_err(phased)?;
        state.add_cors_origin(relay_url);
    }
    Ok(Json(json!({ "status": "ok", "deployed": true })))
}

/// `POST /api/cloud/stop`.
pub async fn stop(State(state): State<Arc<DaemonState>>) -> Json<Value> {
    if let Some(url) = state.cloud_relay.status().relay_url {
        state.remove_cors_origin(&url);
    }
    state.cloud_relay.disconnect();
    Json(json!({ "status": "ok", "stopped": true }))
}

/// `PUT /api/cloud/settings` - persists relay URL and token.
pub async fn settings(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<CloudSettingsRequest>,
) -> ApiResult<Json<Value>> {
    let mut config = state.config.get();
    if let Some(url) = request.relay_url {
        config.cloud_relay.relay_url = Some(url);
    }
    if let Some(token) = request.relay_token {
        config.cloud_relay.relay_token = Some(token);
    }
    state.config.set(config);
    state.config.save(&state.paths.config_file())?;
    Ok(Json(json!({ "status": "ok", "saved": true })))
}

/// `GET /api/cloud/status`.
pub async fn status(State(state): State<Arc<DaemonState>>) -> Json<Value> {
    Json(json!(state.cloud_relay.status()))
}

/// `POST /api/cloud/connect`.
pub async fn connect(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<CloudConnectRequest>,
) -> ApiResult<Json<Value>> {
    let config = state.config.get().cloud_relay;
    let relay_url = request
        .relay_url
        .or(config.relay_url)
        .ok_or_else(|| ApiError::bad_request("no relay_url configured"))?;
    let token = request.token.or(config.relay_token);

    state
        .cloud_relay
        .connect(&relay_url, token.as_deref())
        .await
        .map_err(phased)?;
    state.add_cors_origin(&relay_url);
    Ok(Json(json!({ "status": "ok", "connected": true })))
}

/// `POST /api/cloud/disconnect`.
pub async fn disconnect(State(state): State<Arc<DaemonState>>) -> Json<Value> {
    if let Some(url) = state.cloud_relay.status().relay_url {
        state.remove_cors_origin(&url);
    }
    state.cloud_relay.disconnect();
    Json(json!({ "status": "ok", "connected": false }))
}

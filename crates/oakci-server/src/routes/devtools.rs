//! Devtools routes: manual rebuild, processing controls, re-embed,
//! memory stats.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use oakci_domain::error::Error;
use oakci_infrastructure::state::DaemonState;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};

/// `POST /api/devtools/rebuild-index` - full rebuild off the request
/// path with an overall timeout. 409 when one is already running.
pub async fn rebuild_index(State(state): State<Arc<DaemonState>>) -> ApiResult<Json<Value>> {
    if state.index_status.read().expect("index status lock").is_indexing() {
        return Err(ApiError::Conflict("index rebuild already in progress".to_owned()));
    }

    let timeout = Duration::from_secs(state.config.get().server.rebuild_timeout_seconds);
    let indexing = Arc::clone(&state.indexing);
    let report = tokio::time::timeout(
        timeout,
        tokio::spawn(async move { indexing.build_index().await }),
    )
    .await
    .map_err(|_| ApiError::Timeout("index rebuild timed out".to_owned()))?
    .map_err(|e| ApiError::from(Error::internal(format!("rebuild task failed: {e}"))))??;

    Ok(Json(json!({ "rebuilt": true, "report": report })))
}

/// `POST /api/devtools/reset-processing` - clears processed flags so the
/// next cycle reprocesses history.
pub async fn reset_processing(State(state): State<Arc<DaemonState>>) -> ApiResult<Json<Value>> {
    let affected = state
        .executor
        .execute("UPDATE prompt_batches SET processed = 0, processing_error = NULL", &[])
        .await?;
    Ok(Json(json!({ "reset": affected })))
}

/// `POST /api/devtools/trigger-processing` - runs one processor cycle
/// inline and returns its report.
pub async fn trigger_processing(State(state): State<Arc<DaemonState>>) -> Json<Value> {
    let report = state.processor.run_cycle().await;
    Json(json!({ "report": report }))
}

/// `POST /api/devtools/re-embed-memories` - resets embedded flags; the
/// backfill pass rebuilds the vector copies.
pub async fn re_embed_memories(State(state): State<Arc<DaemonState>>) -> ApiResult<Json<Value>> {
    let reset = state.observations.reset_embedded_flags().await?;
    let report = state.processor.run_cycle().await;
    Ok(Json(json!({
        "reset": reset,
        "backfilled": report.observations_backfilled,
    })))
}

/// `GET /api/devtools/memory-stats`.
pub async fn memory_stats(State(state): State<Arc<DaemonState>>) -> ApiResult<Json<Value>> {
    let vector_stats = state.vector_index.stats().await?;
    let sqlite_count = state.observations.count_observations().await?;
    let unembedded = state.observations.count_unembedded().await?;
    let unapplied_events = state.observations.count_unapplied_events().await?;
    Ok(Json(json!({
        "sqlite_observations": sqlite_count,
        "unembedded": unembedded,
        "unapplied_resolution_events": unapplied_events,
        "vector": vector_stats,
    })))
}

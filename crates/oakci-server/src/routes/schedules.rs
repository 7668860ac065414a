//! Agent schedule and saved task CRUD routes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use oakci_domain::entities::{AgentSchedule, SavedTask};
use oakci_domain::utils::time::now_iso;
use oakci_infrastructure::state::DaemonState;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::models::{SavedTaskRequest, ScheduleRequest};

/// `GET /api/schedules`.
pub async fn list_schedules(State(state): State<Arc<DaemonState>>) -> ApiResult<Json<Value>> {
    let schedules = state.schedules.list_schedules().await?;
    Ok(Json(json!({ "schedules": schedules })))
}

/// `POST /api/schedules`.
pub async fn upsert_schedule(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<ScheduleRequest>,
) -> ApiResult<Json<Value>> {
    if request.interval_minutes < 1 {
        return Err(ApiError::bad_request("interval_minutes must be positive"));
    }
    let now = now_iso();
    let id = request
        .id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let existing = state.schedules.get_schedule(&id).await?;
    let schedule = AgentSchedule {
        id: id.clone(),
        name: request.name,
        agent: request.agent,
        prompt: request.prompt,
        interval_minutes: request.interval_minutes,
        enabled: request.enabled,
        last_run_at: existing.as_ref().and_then(|s| s.last_run_at.clone()),
        created_at: existing.map_or_else(|| now.clone(), |s| s.created_at),
        updated_at: now,
    };
    state.schedules.upsert_schedule(schedule).await?;
    Ok(Json(json!({ "id": id, "saved": true })))
}

/// `DELETE /api/schedules/{id}`.
pub async fn delete_schedule(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let removed = state.schedules.delete_schedule(&id).await?;
    if !removed {
        return Err(ApiError::not_found(format!("schedule {id}")));
    }
    Ok(Json(json!({ "deleted": true })))
}

/// `GET /api/tasks/saved`.
pub async fn list_saved_tasks(State(state): State<Arc<DaemonState>>) -> ApiResult<Json<Value>> {
    let tasks = state.schedules.list_saved_tasks().await?;
    Ok(Json(json!({ "tasks": tasks })))
}

/// `POST /api/tasks/saved`.
pub async fn upsert_saved_task(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<SavedTaskRequest>,
) -> ApiResult<Json<Value>> {
    let now = now_iso();
    let id = request
        .id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let existing = state.schedules.get_saved_task(&id).await?;
    let task = SavedTask {
        id: id.clone(),
        name: request.name,
        agent: request.agent,
        prompt: request.prompt,
        created_at: existing.map_or_else(|| now.clone(), |t| t.created_at),
        updated_at: now,
    };
    state.schedules.upsert_saved_task(task).await?;
    Ok(Json(json!({ "id": id, "saved": true })))
}

/// `DELETE /api/tasks/saved/{id}`.
pub async fn delete_saved_task(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let removed = state.schedules.delete_saved_task(&id).await?;
    if !removed {
        return Err(ApiError::not_found(format!("saved task {id}")));
    }
    Ok(Json(json!({ "deleted": true })))
}

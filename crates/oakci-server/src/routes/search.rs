//! Search, fetch, remember, context, and memory browsing routes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use oakci_application::processor::extraction::store_observation_dual;
use oakci_application::search::{SearchRequest, SearchResponse, SearchType};
use oakci_domain::constants::search::SEARCH_RELEVANCE_THRESHOLD;
use oakci_domain::entities::{MemoryType, ObservationStatus, ResolutionAction};
use oakci_domain::ports::repositories::{NewObservation, StatusUpdate};
use oakci_domain::ports::EmbeddingProvider as _;
use oakci_domain::utils::time::now_iso;
use oakci_infrastructure::state::DaemonState;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::models::{
    BulkMemoryRequest, BulkResolveRequest, ContextRequest, FetchRequest, MemoriesQuery,
    MemoryStatusRequest, RememberRequest, RememberResponse,
};

async fn require_embeddings(state: &DaemonState) -> ApiResult<()> {
    if !state.embedding_chain.is_available().await {
        return Err(ApiError::unavailable(
            "No embedding providers available. Ensure your local model server is running.",
        ));
    }
    Ok(())
}

/// `GET /api/search` query parameters (UI convenience form).
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_type")]
    pub search_type: String,
    #[serde(default = "default_threshold")]
    pub relevance_threshold: f32,
}

fn default_limit() -> usize {
    oakci_domain::constants::search::SEARCH_LIMIT_DEFAULT
}

fn default_type() -> String {
    "all".to_owned()
}

fn default_threshold() -> f32 {
    SEARCH_RELEVANCE_THRESHOLD
}

/// `GET /api/search`.
pub async fn search_get(
    State(state): State<Arc<DaemonState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let search_type: SearchType = query
        .search_type
        .parse()
        .map_err(ApiError::BadRequest)?;
    let request = SearchRequest {
        query: query.query,
        limit: query.limit,
        search_type,
        relevance_threshold: query.relevance_threshold,
        apply_doc_type_weights: false,
        include_resolved: false,
    };
    search_post(State(state), Json(request)).await
}

/// `POST /api/search`.
pub async fn search_post(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    require_embeddings(&state).await?;
    let response = state.search.search(&request).await?;
    Ok(Json(response))
}

/// `POST /api/fetch`.
pub async fn fetch(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<FetchRequest>,
) -> ApiResult<Json<Value>> {
    let (results, total_tokens) = state.search.fetch(&request.ids).await?;
    Ok(Json(json!({ "results": results, "total_tokens": total_tokens })))
}

/// `POST /api/remember`.
pub async fn remember(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<RememberRequest>,
) -> ApiResult<Json<RememberResponse>> {
    if request.observation.trim().is_empty() {
        return Err(ApiError::bad_request("observation must not be empty"));
    }
    let memory_type = MemoryType::parse_lossy(&request.memory_type);
    if !memory_type.is_known() {
        return Err(ApiError::bad_request(format!(
            "unknown memory_type '{}'; expected one of {}",
            request.memory_type,
            MemoryType::known().join(", ")
        )));
    }
    require_embeddings(&state).await?;

    let observation = store_observation_dual(
        &state.observations,
        &state.vector_index,
        NewObservation {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: request.session_id.unwrap_or_else(|| "manual".to_owned()),
            prompt_batch_id: None,
            observation: request.observation,
            memory_type,
            context: request.context.filter(|c| !c.is_empty()),
            tags: request.tags,
            importance: 5,
        },
    )
    .await?;

    Ok(Json(RememberResponse {
        id: observation.id,
        stored: true,
        message: "Observation stored successfully".to_owned(),
    }))
}

/// `POST /api/context`.
pub async fn context(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<ContextRequest>,
) -> ApiResult<Json<SearchResponse>> {
    if request.task.trim().is_empty() {
        return Err(ApiError::bad_request("task must not be empty"));
    }
    require_embeddings(&state).await?;
    let response = state
        .search
        .context(&request.task, &request.current_files, request.max_tokens)
        .await?;
    Ok(Json(response))
}

/// `GET /api/memories` - paginated browsing from the relational store.
pub async fn list_memories(
    State(state): State<Arc<DaemonState>>,
    Query(query): Query<MemoriesQuery>,
) -> ApiResult<Json<Value>> {
    if query.limit < 1 || query.limit > 100 {
        return Err(ApiError::bad_request("limit must be between 1 and 100"));
    }
    let filter = oakci_domain::ports::repositories::ObservationFilter {
        memory_type: query.memory_type.as_deref().map(MemoryType::parse_lossy),
        status: None,
        session_id: None,
        limit: query.limit,
        offset: query.offset,
    };
    let (mut observations, total) = state.observations.list_observations(filter).await?;
    if query.exclude_sessions {
        observations.retain(|o| o.memory_type != MemoryType::SessionSummary);
    }
    Ok(Json(json!({
        "memories": observations,
        "total": total,
        "limit": query.limit,
        "offset": query.offset,
    })))
}

/// Applies a status change to one observation in both stores and appends
/// the resolution event for cross-machine replay.
async fn apply_status_change(
    state: &DaemonState,
    id: &str,
    status: ObservationStatus,
    session_id: Option<&str>,
    reason: Option<&str>,
) -> ApiResult<bool> {
    let now = now_iso();
    let update = match status {
        ObservationStatus::Active => StatusUpdate::reactivate(),
        ObservationStatus::Resolved | ObservationStatus::Superseded => StatusUpdate {
            status,
            resolved_by_session_id: session_id.map(str::to_owned),
            resolved_at: Some(now.clone()),
            superseded_by: None,
        },
    };
    let affected = state.observations.update_observation_status(id, update).await?;
    if !affected {
        return Ok(false);
    }

    let _ = state
        .vector_index
        .update_memory_status(id, status.as_str())
        .await;

    let action = match status {
        ObservationStatus::Active => ResolutionAction::Reactivated,
        ObservationStatus::Resolved => ResolutionAction::Resolved,
        ObservationStatus::Superseded => ResolutionAction::Superseded,
    };
    state
        .observations
        .store_resolution_event(
            id,
            action,
            session_id,
            None,
            reason,
            &now,
            &state.machine_id,
            true,
        )
        .await?;
    Ok(true)
}

/// `PUT /api/memories/{id}/status`.
pub async fn update_memory_status(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<String>,
    Json(request): Json<MemoryStatusRequest>,
) -> ApiResult<Json<Value>> {
    let status: ObservationStatus = request
        .status
        .parse()
        .map_err(|e: String| ApiError::bad_request(e))?;
    let updated = apply_status_change(
        &state,
        &id,
        status,
        request.session_id.as_deref(),
        request.reason.as_deref(),
    )
    .await?;
    if !updated {
        return Err(ApiError::not_found(format!("observation {id}")));
    }
    Ok(Json(json!({ "id": id, "status": request.status })))
}

/// `POST /api/memories/bulk-resolve`.
pub async fn bulk_resolve(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<BulkResolveRequest>,
) -> ApiResult<Json<Value>> {
    if request.ids.is_empty() {
        return Err(ApiError::bad_request("ids must not be empty"));
    }
    let mut resolved = 0;
    for id in &request.ids {
        if apply_status_change(
            &state,
            id,
            ObservationStatus::Resolved,
            None,
            request.reason.as_deref(),
        )
        .await?
        {
            resolved += 1;
        }
    }
    Ok(Json(json!({ "resolved": resolved })))
}

/// `POST /api/memories/bulk-delete` - relational delete first, vector
/// delete second (retried there).
pub async fn bulk_delete(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<BulkMemoryRequest>,
) -> ApiResult<Json<Value>> {
    if request.ids.is_empty() {
        return Err(ApiError::bad_request("ids must not be empty"));
    }
    let deleted = state.observations.delete_observations(&request.ids).await?;
    let _ = state.vector_index.delete_memories(&request.ids).await;
    Ok(Json(json!({ "deleted": deleted })))
}

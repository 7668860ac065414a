//! Activity browsing routes: sessions, prompt batches, activities, and
//! session relationships.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use oakci_domain::entities::{RelationshipOrigin, SessionStatus};
use oakci_domain::ports::repositories::SessionFilter;
use oakci_infrastructure::state::DaemonState;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::models::{ListQuery, RelatedRequest};

/// `GET /api/activity/sessions`.
pub async fn list_sessions(
    State(state): State<Arc<DaemonState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let status = match &query.status {
        Some(raw) => Some(SessionStatus::from_str(raw).map_err(ApiError::BadRequest)?),
        None => None,
    };
    let (sessions, total) = state
        .sessions
        .list_sessions(SessionFilter {
            status,
            agent: query.agent.clone(),
            limit: query.limit.clamp(1, 100),
            offset: query.offset,
        })
        .await?;

    // One bulk query each for stats and first prompts, not N+1.
    let ids: Vec<String> = sessions.iter().map(|s| s.id.clone()).collect();
    let stats = state.bulk_session_stats(&ids).await?;
    let first_prompts = state.sessions.get_bulk_first_prompts(&ids).await?;

    let enriched: Vec<Value> = sessions
        .into_iter()
        .map(|session| {
            let session_stats = stats.iter().find(|s| s.session_id == session.id);
            let first_prompt = first_prompts
                .iter()
                .find(|(id, _)| *id == session.id)
                .map(|(_, prompt)| prompt.clone());
            json!({
                "session": session,
                "stats": session_stats,
                "first_prompt": first_prompt,
            })
        })
        .collect();

    Ok(Json(json!({ "sessions": enriched, "total": total })))
}

/// `GET /api/activity/sessions/{id}`.
pub async fn get_session(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let session = state
        .sessions
        .get_session(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("session {id}")))?;
    let batches = state.batches.list_for_session(&id).await?;
    Ok(Json(json!({ "session": session, "batches": batches })))
}

/// `DELETE /api/activity/sessions/{id}` - cascades and keeps the vector
/// store in sync.
pub async fn delete_session(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let observation_ids = state.sessions.delete_session(&id).await?;
    if !observation_ids.is_empty() {
        let _ = state.vector_index.delete_memories(&observation_ids).await;
    }
    let _ = state.vector_index.delete_session_summary(&id).await;
    Ok(Json(json!({ "deleted": true, "observations_removed": observation_ids.len() })))
}

/// `GET /api/activity/batches/{id}`.
pub async fn get_batch(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let batch = state
        .batches
        .get_batch(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("batch {id}")))?;
    let activities = state.activities.list_for_batch(id).await?;
    Ok(Json(json!({ "batch": batch, "activities": activities })))
}

/// `DELETE /api/activity/batches/{id}`.
pub async fn delete_batch(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let observation_ids = state.batches.delete_batch(id).await?;
    if !observation_ids.is_empty() {
        let _ = state.vector_index.delete_memories(&observation_ids).await;
    }
    Ok(Json(json!({ "deleted": true, "observations_removed": observation_ids.len() })))
}

/// `GET /api/activity/activities/{id}`.
pub async fn get_activity(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let activity = state
        .activities
        .get_activity(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("activity {id}")))?;
    Ok(Json(json!({ "activity": activity })))
}

/// `DELETE /api/activity/activities/{id}`.
pub async fn delete_activity(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let deleted = state.activities.delete_activity(id).await?;
    if !deleted {
        return Err(ApiError::not_found(format!("activity {id}")));
    }
    Ok(Json(json!({ "deleted": true })))
}

/// `GET /api/activity/sessions/{id}/related`.
pub async fn list_related(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let relationships = state.sessions.list_relationships(&id).await?;
    Ok(Json(json!({ "related": relationships })))
}

/// `POST /api/activity/sessions/{id}/related`.
pub async fn add_related(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<String>,
    Json(request): Json<RelatedRequest>,
) -> ApiResult<Json<Value>> {
    if request.session_id == id {
        return Err(ApiError::bad_request("cannot relate a session to itself"));
    }
    state
        .sessions
        .add_relationship(
            &id,
            &request.session_id,
            request.similarity_score,
            RelationshipOrigin::Manual,
        )
        .await?;
    Ok(Json(json!({ "linked": true })))
}

/// `DELETE /api/activity/sessions/{id}/related/{other}`.
pub async fn remove_related(
    State(state): State<Arc<DaemonState>>,
    Path((id, other)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let removed = state.sessions.remove_relationship(&id, &other).await?;
    Ok(Json(json!({ "removed": removed })))
}

/// `GET /api/activity/sessions/{id}/suggested-related` - similarity over
/// the session-summaries collection.
pub async fn suggested_related(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let session = state
        .sessions
        .get_session(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("session {id}")))?;

    let Some(summary) = session.summary else {
        return Ok(Json(json!({ "suggestions": [] })));
    };

    let hits = state.vector_index.search_sessions(&summary, 6).await?;
    let suggestions: Vec<Value> = hits
        .into_iter()
        .filter(|hit| hit.id != id)
        .take(5)
        .map(|hit| {
            json!({
                "session_id": hit.id,
                "title": hit.meta_str("title").unwrap_or_default(),
                "similarity_score": hit.relevance(),
            })
        })
        .collect();
    Ok(Json(json!({ "suggestions": suggestions })))
}

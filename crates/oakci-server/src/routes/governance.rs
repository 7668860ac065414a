//! Governance configuration, audit, and test routes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use oakci_application::governance::GovernanceEngine;
use oakci_domain::ports::repositories::AuditFilter;
use oakci_domain::value_objects::GovernanceConfig;
use oakci_infrastructure::state::DaemonState;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::models::{AuditPruneRequest, GovernanceTestRequest};

/// `GET /api/governance/config`.
pub async fn get_config(State(state): State<Arc<DaemonState>>) -> Json<GovernanceConfig> {
    Json(state.config.get().governance)
}

/// `PUT /api/governance/config` - persists and recompiles the engine.
pub async fn put_config(
    State(state): State<Arc<DaemonState>>,
    Json(governance): Json<GovernanceConfig>,
) -> ApiResult<Json<Value>> {
    if !matches!(governance.enforcement_mode.as_str(), "observe" | "enforce") {
        return Err(ApiError::bad_request(
            "enforcement_mode must be 'observe' or 'enforce'",
        ));
    }

    let mut config = state.config.get();
    config.governance = governance.clone();
    state.config.set(config);
    state.config.save(&state.paths.config_file())?;

    let engine = GovernanceEngine::new(&governance);
    let compiled = engine.rule_count();
    state.replace_governance_engine(engine);
    Ok(Json(json!({ "saved": true, "rules_compiled": compiled })))
}

/// Audit listing query.
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

fn default_limit() -> usize {
    50
}

/// `GET /api/governance/audit`.
pub async fn audit(
    State(state): State<Arc<DaemonState>>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Value>> {
    let (events, total) = state
        .audit
        .list_events(AuditFilter {
            session_id: query.session_id,
            agent: query.agent,
            action: query.action,
            limit: query.limit.clamp(1, 200),
            offset: query.offset,
        })
        .await?;
    Ok(Json(json!({ "events": events, "total": total })))
}

/// `GET /api/governance/audit/summary`.
pub async fn audit_summary(State(state): State<Arc<DaemonState>>) -> ApiResult<Json<Value>> {
    let summary = state.audit.summary().await?;
    Ok(Json(json!(summary)))
}

/// `POST /api/governance/audit/prune`.
pub async fn audit_prune(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<AuditPruneRequest>,
) -> ApiResult<Json<Value>> {
    let retention = request
        .retention_days
        .unwrap_or_else(|| state.config.get().governance.retention_days);
    if retention < 1 {
        return Err(ApiError::bad_request("retention_days must be positive"));
    }
    let removed = state.audit_writer.prune(retention).await?;
    Ok(Json(json!({ "removed": removed })))
}

/// `POST /api/governance/test` - dry-run evaluation; writes no audit row.
pub async fn test(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<GovernanceTestRequest>,
) -> Json<Value> {
    let engine = state.governance_engine();
    let decision = engine.evaluate(&request.tool_name, &request.tool_input);
    Json(json!({
        "decision": decision,
        "enforcement_mode": engine.enforcement_mode(),
    }))
}

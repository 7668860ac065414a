//! Hook event receiver and agent notify receiver.
//!
//! External agent hooks post here. `pre_tool_use` runs through the
//! governance engine; a deny in enforce mode is shaped per the agent's
//! manifest. All other events feed activity capture. A bounded dedupe
//! cache absorbs hook retries.

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use oakci_application::capture::HookEvent;
use oakci_domain::value_objects::DenyStyle;
use oakci_infrastructure::state::DaemonState;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::models::{HookEventRequest, NotifyRequest};

fn to_hook_event(request: &HookEventRequest) -> HookEvent {
    HookEvent {
        event: request.event.clone(),
        session_id: request.session_id.clone(),
        agent: request.agent.clone().unwrap_or_else(|| "unknown".to_owned()),
        payload: request.payload.clone(),
    }
}

/// Shapes a deny decision for the agent's hook protocol.
fn deny_envelope(style: DenyStyle, message: &str) -> Option<Value> {
    match style {
        DenyStyle::HookSpecificOutput => Some(json!({
            "hookSpecificOutput": {
                "hookEventName": "PreToolUse",
                "permissionDecision": "deny",
                "permissionDecisionReason": message,
            }
        })),
        DenyStyle::Cursor => Some(json!({
            "continue": false,
            "permission": "deny",
            "userMessage": message,
            "agentMessage": message,
        })),
        DenyStyle::Unsupported => None,
    }
}

/// `POST /api/activity/event`.
pub async fn hook_event(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<HookEventRequest>,
) -> ApiResult<Json<Value>> {
    if request.session_id.trim().is_empty() {
        return Err(ApiError::bad_request("session_id must not be empty"));
    }
    let event = to_hook_event(&request);

    // Retried deliveries count once.
    let dedupe_extra = request
        .tool_use_id
        .clone()
        .or_else(|| {
            request
                .payload
                .get("prompt")
                .and_then(Value::as_str)
                .map(|p| oakci_domain::utils::hash::sha256_hex(p)[..16].to_owned())
        })
        .unwrap_or_default();
    if state.capture.is_duplicate(&event, &dedupe_extra) {
        debug!(event = %event.event, "duplicate hook event ignored");
        return Ok(Json(json!({ "ok": true, "duplicate": true })));
    }

    match event.event.as_str() {
        "session_start" => {
            let (session, created) = state.capture.on_session_start(&event).await?;
            Ok(Json(json!({ "ok": true, "session_id": session.id, "created": created })))
        }
        "user_prompt" => {
            let batch = state.capture.on_user_prompt(&event).await?;
            Ok(Json(json!({ "ok": true, "batch_id": batch.id })))
        }
        "pre_tool_use" => pre_tool_use(&state, &request, &event).await,
        "post_tool_use" => {
            state.capture.on_post_tool_use(&event).await?;
            Ok(Json(json!({ "ok": true })))
        }
        "session_end" => {
            state.capture.on_session_end(&event).await?;
            Ok(Json(json!({ "ok": true })))
        }
        "notification" => {
            state.capture.on_notification(&event).await?;
            Ok(Json(json!({ "ok": true })))
        }
        other => Err(ApiError::bad_request(format!("unknown event '{other}'"))),
    }
}

/// Governance interception on the pre-tool-use path.
async fn pre_tool_use(
    state: &Arc<DaemonState>,
    request: &HookEventRequest,
    event: &HookEvent,
) -> ApiResult<Json<Value>> {
    let tool_name = request
        .payload
        .get("tool_name")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_owned();
    let tool_input = request
        .payload
        .get("tool_input")
        .cloned()
        .unwrap_or(Value::Null);

    let engine = state.governance_engine();
    let started = Instant::now();
    let decision = engine.evaluate(&tool_name, &tool_input);
    let evaluation_ms = started.elapsed().as_secs_f64() * 1000.0;

    state
        .audit_writer
        .record(
            &event.session_id,
            &event.agent,
            &tool_name,
            request.tool_use_id.as_deref(),
            &tool_input,
            &decision,
            engine.enforcement_mode(),
            evaluation_ms,
        )
        .await;

    // Only an enforced deny shapes the hook response; agents without a
    // deny protocol get the decision logged and an allow response.
    if decision.action == "deny" {
        let style = state
            .config
            .get()
            .agent_manifest(&event.agent)
            .map(|m| m.deny_style)
            .unwrap_or_default();
        let message = if decision.message.is_empty() {
            &decision.reason
        } else {
            &decision.message
        };
        if let Some(envelope) = deny_envelope(style, message) {
            return Ok(Json(envelope));
        }
    }

    Ok(Json(json!({ "ok": true, "action": decision.action })))
}

/// `POST /api/notify` - manifest-driven agent notifications.
pub async fn notify(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<NotifyRequest>,
) -> ApiResult<Json<Value>> {
    let agent = request.agent.clone().unwrap_or_else(|| "unknown".to_owned());
    let event = HookEvent {
        event: format!("notify:{}", request.event),
        session_id: request.session_id.clone(),
        agent: agent.clone(),
        payload: json!({ "message": request.message }),
    };
    if state.capture.is_duplicate(&event, request.message.as_deref().unwrap_or_default()) {
        return Ok(Json(json!({ "ok": true, "duplicate": true })));
    }

    // The manifest maps which notify events carry a response summary.
    let config = state.config.get();
    let maps_to_summary = config
        .agent_manifest(&agent)
        .map(|m| m.response_summary_events.iter().any(|e| e == &request.event))
        .unwrap_or(request.event == "response_complete");

    if maps_to_summary {
        state.capture.on_notification(&event).await?;
    }
    Ok(Json(json!({ "ok": true, "handled": maps_to_summary })))
}

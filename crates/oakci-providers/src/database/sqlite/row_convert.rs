//! Row-to-entity conversions shared by the repositories.

use std::str::FromStr;

use oakci_domain::entities::{
    Activity, AgentSchedule, BatchStatus, GovernanceAuditEvent, MemoryType, Observation,
    ObservationStatus, PromptBatch, PromptSource, RelationshipOrigin, ResolutionAction,
    ResolutionEvent, SavedTask, Session, SessionClassification, SessionRelationship, SessionStatus,
};
use oakci_domain::error::{Error, Result};
use oakci_domain::ports::database::SqlRow;

pub(crate) fn row_to_session(row: &dyn SqlRow) -> Result<Session> {
    Ok(Session {
        id: row.require_string("id")?,
        agent: row.require_string("agent")?,
        project_root: row.require_string("project_root")?,
        started_at: row.require_string("started_at")?,
        ended_at: row.try_get_string("ended_at")?,
        status: parse_enum::<SessionStatus>(&row.require_string("status")?)?,
        title: row.try_get_string("title")?,
        summary: row.try_get_string("summary")?,
        parent_session_id: row.try_get_string("parent_session_id")?,
        parent_session_reason: row.try_get_string("parent_session_reason")?,
        transcript_path: row.try_get_string("transcript_path")?,
        source_machine_id: row.require_string("source_machine_id")?,
    })
}

pub(crate) fn row_to_batch(row: &dyn SqlRow) -> Result<PromptBatch> {
    let classification = row
        .try_get_string("classification")?
        .and_then(|s| SessionClassification::from_str(&s).ok());
    Ok(PromptBatch {
        id: row.require_i64("id")?,
        session_id: row.require_string("session_id")?,
        prompt_number: row.require_i64("prompt_number")?,
        user_prompt: row.require_string("user_prompt")?,
        response_summary: row.try_get_string("response_summary")?,
        started_at: row.require_string("started_at")?,
        ended_at: row.try_get_string("ended_at")?,
        status: parse_enum::<BatchStatus>(&row.require_string("status")?)?,
        classification,
        processed: row.try_get_bool("processed")?,
        source_type: parse_enum::<PromptSource>(&row.require_string("source_type")?)?,
        plan_content: row.try_get_string("plan_content")?,
        plan_file_path: row.try_get_string("plan_file_path")?,
        plan_embedded: row.try_get_bool("plan_embedded")?,
    })
}

pub(crate) fn row_to_activity(row: &dyn SqlRow) -> Result<Activity> {
    let input_raw = row.require_string("tool_input")?;
    let tool_input =
        serde_json::from_str(&input_raw).unwrap_or(serde_json::Value::String(input_raw));
    Ok(Activity {
        id: row.require_i64("id")?,
        session_id: row.require_string("session_id")?,
        prompt_batch_id: row.try_get_i64("prompt_batch_id")?,
        tool_name: row.require_string("tool_name")?,
        tool_input,
        tool_output_summary: row.try_get_string("tool_output_summary")?,
        file_path: row.try_get_string("file_path")?,
        success: row.try_get_bool("success")?,
        error_message: row.try_get_string("error_message")?,
        timestamp: row.require_string("timestamp")?,
        processed: row.try_get_bool("processed")?,
    })
}

pub(crate) fn row_to_observation(row: &dyn SqlRow) -> Result<Observation> {
    let tags_raw = row.try_get_string("tags")?.unwrap_or_else(|| "[]".to_owned());
    let tags: Vec<String> = serde_json::from_str(&tags_raw).unwrap_or_default();
    Ok(Observation {
        id: row.require_string("id")?,
        session_id: row.require_string("session_id")?,
        prompt_batch_id: row.try_get_i64("prompt_batch_id")?,
        observation: row.require_string("observation")?,
        memory_type: MemoryType::parse_lossy(&row.require_string("memory_type")?),
        context: row.try_get_string("context")?,
        tags,
        importance: row.try_get_i64("importance")?.unwrap_or(5),
        created_at: row.require_string("created_at")?,
        embedded: row.try_get_bool("embedded")?,
        status: parse_enum::<ObservationStatus>(&row.require_string("status")?)?,
        resolved_by_session_id: row.try_get_string("resolved_by_session_id")?,
        resolved_at: row.try_get_string("resolved_at")?,
        superseded_by: row.try_get_string("superseded_by")?,
    })
}

pub(crate) fn row_to_resolution_event(row: &dyn SqlRow) -> Result<ResolutionEvent> {
    Ok(ResolutionEvent {
        id: row.require_string("id")?,
        observation_id: row.require_string("observation_id")?,
        action: parse_enum::<ResolutionAction>(&row.require_string("action")?)?,
        resolved_by_session_id: row.try_get_string("resolved_by_session_id")?,
        superseded_by: row.try_get_string("superseded_by")?,
        reason: row.try_get_string("reason")?,
        created_at: row.require_string("created_at")?,
        created_at_epoch: row.require_i64("created_at_epoch")?,
        source_machine_id: row.require_string("source_machine_id")?,
        content_hash: row.require_string("content_hash")?,
        applied: row.try_get_bool("applied")?,
    })
}

pub(crate) fn row_to_relationship(row: &dyn SqlRow) -> Result<SessionRelationship> {
    Ok(SessionRelationship {
        session_id_a: row.require_string("session_id_a")?,
        session_id_b: row.require_string("session_id_b")?,
        similarity_score: row.try_get_f64("similarity_score")?,
        created_by: parse_enum::<RelationshipOrigin>(&row.require_string("created_by")?)?,
        created_at: row.require_string("created_at")?,
    })
}

pub(crate) fn row_to_schedule(row: &dyn SqlRow) -> Result<AgentSchedule> {
    Ok(AgentSchedule {
        id: row.require_string("id")?,
        name: row.require_string("name")?,
        agent: row.require_string("agent")?,
        prompt: row.require_string("prompt")?,
        interval_minutes: row.require_i64("interval_minutes")?,
        enabled: row.try_get_bool("enabled")?,
        last_run_at: row.try_get_string("last_run_at")?,
        created_at: row.require_string("created_at")?,
        updated_at: row.require_string("updated_at")?,
    })
}

pub(crate) fn row_to_saved_task(row: &dyn SqlRow) -> Result<SavedTask> {
    Ok(SavedTask {
        id: row.require_string("id")?,
        name: row.require_string("name")?,
        agent: row.require_string("agent")?,
        prompt: row.require_string("prompt")?,
        created_at: row.require_string("created_at")?,
        updated_at: row.require_string("updated_at")?,
    })
}

pub(crate) fn row_to_audit_event(row: &dyn SqlRow) -> Result<GovernanceAuditEvent> {
    Ok(GovernanceAuditEvent {
        id: row.require_i64("id")?,
        session_id: row.require_string("session_id")?,
        agent: row.require_string("agent")?,
        tool_name: row.require_string("tool_name")?,
        tool_use_id: row.try_get_string("tool_use_id")?,
        tool_category: row.require_string("tool_category")?,
        rule_id: row.try_get_string("rule_id")?,
        action: row.require_string("action")?,
        reason: row.try_get_string("reason")?,
        matched_pattern: row.try_get_string("matched_pattern")?,
        tool_input_summary: row.try_get_string("tool_input_summary")?,
        enforcement_mode: row.require_string("enforcement_mode")?,
        evaluation_ms: row.try_get_f64("evaluation_ms")?.unwrap_or(0.0),
        created_at: row.require_string("created_at")?,
        source_machine_id: row.require_string("source_machine_id")?,
    })
}

fn parse_enum<T: FromStr<Err = String>>(value: &str) -> Result<T> {
    T::from_str(value).map_err(Error::database)
}

//! Wire models for requests and responses not owned by the application
//! layer. Field names are part of the compatibility contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `GET /api/health` response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub oak_version: String,
    pub schema_version: i64,
    pub uptime_seconds: u64,
    pub project_root: String,
}

/// `POST /api/fetch` request.
#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    pub ids: Vec<String>,
}

/// `POST /api/remember` request.
#[derive(Debug, Deserialize)]
pub struct RememberRequest {
    pub observation: String,
    pub memory_type: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `POST /api/remember` response.
#[derive(Debug, Serialize)]
pub struct RememberResponse {
    pub id: String,
    pub stored: bool,
    pub message: String,
}

/// `POST /api/context` request.
#[derive(Debug, Deserialize)]
pub struct ContextRequest {
    pub task: String,
    #[serde(default)]
    pub current_files: Vec<String>,
    #[serde(default = "default_context_tokens")]
    pub max_tokens: i64,
}

fn default_context_tokens() -> i64 {
    4000
}

/// `GET /api/memories` query.
#[derive(Debug, Deserialize)]
pub struct MemoriesQuery {
    #[serde(default = "default_memories_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub memory_type: Option<String>,
    #[serde(default)]
    pub exclude_sessions: bool,
}

fn default_memories_limit() -> usize {
    50
}

/// Memory status update request.
#[derive(Debug, Deserialize)]
pub struct MemoryStatusRequest {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Bulk memory resolve request.
#[derive(Debug, Deserialize)]
pub struct BulkResolveRequest {
    pub ids: Vec<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Bulk memory delete/update request.
#[derive(Debug, Deserialize)]
pub struct BulkMemoryRequest {
    pub ids: Vec<String>,
}

/// Session/batch/activity listing query.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_list_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
}

fn default_list_limit() -> usize {
    20
}

/// Related-session create request.
#[derive(Debug, Deserialize)]
pub struct RelatedRequest {
    pub session_id: String,
    #[serde(default)]
    pub similarity_score: Option<f64>,
}

/// Hook event request (`POST /api/activity/event`).
#[derive(Debug, Deserialize)]
pub struct HookEventRequest {
    pub event: String,
    pub session_id: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub tool_use_id: Option<String>,
    #[serde(flatten)]
    pub payload: Value,
}

/// Agent notify request (`POST /api/notify`).
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub event: String,
    pub session_id: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Governance test request.
#[derive(Debug, Deserialize)]
pub struct GovernanceTestRequest {
    pub tool_name: String,
    pub tool_input: Value,
}

/// Audit prune request.
#[derive(Debug, Deserialize)]
pub struct AuditPruneRequest {
    #[serde(default)]
    pub retention_days: Option<i64>,
}

/// Backup create request.
#[derive(Debug, Deserialize, Default)]
pub struct BackupCreateRequest {
    #[serde(default)]
    pub include_activities: bool,
}

/// Backup restore request.
#[derive(Debug, Deserialize)]
pub struct BackupRestoreRequest {
    #[serde(default)]
    pub path: Option<String>,
}

/// Cloud relay connect request.
#[derive(Debug, Deserialize)]
pub struct CloudConnectRequest {
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Cloud relay settings update.
#[derive(Debug, Deserialize)]
pub struct CloudSettingsRequest {
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default)]
    pub relay_token: Option<String>,
}

/// Schedule upsert request.
#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub agent: String,
    pub prompt: String,
    pub interval_minutes: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Saved task upsert request.
#[derive(Debug, Deserialize)]
pub struct SavedTaskRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub agent: String,
    pub prompt: String,
}

fn default_true() -> bool {
    true
}

/// Logs query.
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_log_lines")]
    pub lines: usize,
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_lines() -> usize {
    100
}

fn default_log_file() -> String {
    "daemon".to_owned()
}

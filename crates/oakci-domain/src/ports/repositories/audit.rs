//! Governance audit repository port.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::entities::GovernanceAuditEvent;
use crate::error::Result;

/// Input for one audit row.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub session_id: String,
    pub agent: String,
    pub tool_name: String,
    pub tool_use_id: Option<String>,
    pub tool_category: String,
    pub rule_id: Option<String>,
    pub action: String,
    pub reason: Option<String>,
    pub matched_pattern: Option<String>,
    pub tool_input_summary: Option<String>,
    pub enforcement_mode: String,
    pub evaluation_ms: f64,
}

/// Audit listing filter.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub session_id: Option<String>,
    pub agent: Option<String>,
    pub action: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// Aggregated audit counters.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AuditSummary {
    pub total: i64,
    pub by_action: HashMap<String, i64>,
    pub by_agent: HashMap<String, i64>,
    pub by_category: HashMap<String, i64>,
}

/// Persistence for governance audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Insert one audit row.
    async fn record_event(&self, event: NewAuditEvent) -> Result<i64>;

    /// Paginated listing, newest first, with total count.
    async fn list_events(&self, filter: AuditFilter)
    -> Result<(Vec<GovernanceAuditEvent>, usize)>;

    /// Aggregated counters.
    async fn summary(&self) -> Result<AuditSummary>;

    /// Delete events older than the retention window; returns rows removed.
    async fn prune(&self, retention_days: i64) -> Result<u64>;
}

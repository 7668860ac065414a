//! SQLite governance audit repository.

use std::sync::Arc;

use async_trait::async_trait;
use oakci_domain::entities::GovernanceAuditEvent;
use oakci_domain::error::Result;
use oakci_domain::ports::database::{DatabaseExecutor, SqlParam};
use oakci_domain::ports::repositories::{AuditFilter, AuditRepository, AuditSummary, NewAuditEvent};
use oakci_domain::utils::time::{now_epoch, now_pair};

use super::row_convert;

/// Audit event persistence over the executor port.
pub struct SqliteAuditRepository {
    executor: Arc<dyn DatabaseExecutor>,
    machine_id: String,
}

impl SqliteAuditRepository {
    /// Create a repository that uses the given executor.
    pub fn new(executor: Arc<dyn DatabaseExecutor>, machine_id: String) -> Self {
        Self {
            executor,
            machine_id,
        }
    }

    async fn group_counts(&self, column: &str) -> Result<std::collections::HashMap<String, i64>> {
        let rows = self
            .executor
            .query_all(
                &format!(
                    "SELECT {column} AS k, COUNT(*) AS n FROM governance_audit_events GROUP BY {column}"
                ),
                &[],
            )
            .await?;
        let mut counts = std::collections::HashMap::new();
        for row in rows {
            let key = row.try_get_string("k")?.unwrap_or_default();
            counts.insert(key, row.try_get_i64("n")?.unwrap_or(0));
        }
        Ok(counts)
    }
}

#[async_trait]
impl AuditRepository for SqliteAuditRepository {
    async fn record_event(&self, event: NewAuditEvent) -> Result<i64> {
        let (now_iso, now_epoch) = now_pair();
        self.executor
            .execute_returning_id(
                "INSERT INTO governance_audit_events
                 (session_id, agent, tool_name, tool_use_id, tool_category, rule_id, action,
                  reason, matched_pattern, tool_input_summary, enforcement_mode, evaluation_ms,
                  created_at, created_at_epoch, source_machine_id)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                &[
                    SqlParam::text(&event.session_id),
                    SqlParam::text(&event.agent),
                    SqlParam::text(&event.tool_name),
                    SqlParam::opt_text(event.tool_use_id.as_deref()),
                    SqlParam::text(&event.tool_category),
                    SqlParam::opt_text(event.rule_id.as_deref()),
                    SqlParam::text(&event.action),
                    SqlParam::opt_text(event.reason.as_deref()),
                    SqlParam::opt_text(event.matched_pattern.as_deref()),
                    SqlParam::opt_text(event.tool_input_summary.as_deref()),
                    SqlParam::text(&event.enforcement_mode),
                    SqlParam::F64(event.evaluation_ms),
                    SqlParam::text(&now_iso),
                    SqlParam::I64(now_epoch),
                    SqlParam::text(&self.machine_id),
                ],
            )
            .await
    }

    async fn list_events(
        &self,
        filter: AuditFilter,
    ) -> Result<(Vec<GovernanceAuditEvent>, usize)> {
        let mut sql = String::from("SELECT * FROM governance_audit_events WHERE 1=1");
        let mut count_sql =
            String::from("SELECT COUNT(*) AS n FROM governance_audit_events WHERE 1=1");
        let mut params: Vec<SqlParam> = Vec::new();

        if let Some(session_id) = &filter.session_id {
            sql.push_str(" AND session_id = ?");
            count_sql.push_str(" AND session_id = ?");
            params.push(SqlParam::text(session_id));
        }
        if let Some(agent) = &filter.agent {
            sql.push_str(" AND agent = ?");
            count_sql.push_str(" AND agent = ?");
            params.push(SqlParam::text(agent));
        }
        if let Some(action) = &filter.action {
            sql.push_str(" AND action = ?");
            count_sql.push_str(" AND action = ?");
            params.push(SqlParam::text(action));
        }

        let total = self
            .executor
            .query_one(&count_sql, &params)
            .await?
            .and_then(|r| r.try_get_i64("n").ok().flatten())
            .unwrap_or(0) as usize;

        sql.push_str(" ORDER BY created_at_epoch DESC LIMIT ? OFFSET ?");
        params.push(SqlParam::I64(filter.limit.max(1) as i64));
        params.push(SqlParam::I64(filter.offset as i64));

        let rows = self.executor.query_all(&sql, &params).await?;
        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(row_convert::row_to_audit_event(row.as_ref())?);
        }
        Ok((events, total))
    }

    async fn summary(&self) -> Result<AuditSummary> {
        let total = self
            .executor
            .query_one("SELECT COUNT(*) AS n FROM governance_audit_events", &[])
            .await?
            .and_then(|r| r.try_get_i64("n").ok().flatten())
            .unwrap_or(0);
        Ok(AuditSummary {
            total,
            by_action: self.group_counts("action").await?,
            by_agent: self.group_counts("agent").await?,
            by_category: self.group_counts("tool_category").await?,
        })
    }

    async fn prune(&self, retention_days: i64) -> Result<u64> {
        let cutoff = now_epoch() - retention_days * 86_400;
        self.executor
            .execute(
                "DELETE FROM governance_audit_events WHERE created_at_epoch < ?",
                &[SqlParam::I64(cutoff)],
            )
            .await
    }
}

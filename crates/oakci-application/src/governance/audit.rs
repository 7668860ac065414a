//! Governance audit writer.

use std::sync::Arc;

use oakci_domain::constants::governance::TOOL_INPUT_SUMMARY_MAX;
use oakci_domain::entities::GovernanceDecision;
use oakci_domain::error::Result;
use oakci_domain::ports::AuditRepository;
use oakci_domain::ports::repositories::NewAuditEvent;
use serde_json::Value;
use tracing::warn;

/// Writes one audit row per governance evaluation.
pub struct AuditWriter {
    repository: Arc<dyn AuditRepository>,
}

impl AuditWriter {
    /// Builds the writer.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }

    /// Records a decision. Audit failures are logged, never surfaced to
    /// the hook path.
    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        session_id: &str,
        agent: &str,
        tool_name: &str,
        tool_use_id: Option<&str>,
        tool_input: &Value,
        decision: &GovernanceDecision,
        enforcement_mode: &str,
        evaluation_ms: f64,
    ) {
        let input_summary = summarize_input(tool_input);
        let event = NewAuditEvent {
            session_id: session_id.to_owned(),
            agent: agent.to_owned(),
            tool_name: tool_name.to_owned(),
            tool_use_id: tool_use_id.map(str::to_owned),
            tool_category: decision.tool_category.as_str().to_owned(),
            rule_id: (!decision.rule_id.is_empty()).then(|| decision.rule_id.clone()),
            action: decision.action.clone(),
            reason: (!decision.reason.is_empty()).then(|| decision.reason.clone()),
            matched_pattern: (!decision.matched_pattern.is_empty())
                .then(|| decision.matched_pattern.clone()),
            tool_input_summary: Some(input_summary),
            enforcement_mode: enforcement_mode.to_owned(),
            evaluation_ms,
        };
        if let Err(e) = self.repository.record_event(event).await {
            warn!(error = %e, "failed to write governance audit event");
        }
    }

    /// Deletes audit rows older than the retention window.
    pub async fn prune(&self, retention_days: i64) -> Result<u64> {
        self.repository.prune(retention_days).await
    }
}

fn summarize_input(tool_input: &Value) -> String {
    let serialized = match tool_input {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    };
    if serialized.len() <= TOOL_INPUT_SUMMARY_MAX {
        return serialized;
    }
    let mut end = TOOL_INPUT_SUMMARY_MAX;
    while !serialized.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &serialized[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use oakci_domain::entities::ToolCategory;
    use oakci_domain::ports::repositories::AuditFilter;
    use oakci_providers::database::SqliteActivityStore;
    use serde_json::json;

    #[tokio::test]
    async fn records_one_row_per_evaluation() {
        let store = SqliteActivityStore::open_in_memory("machine-a")
            .await
            .expect("store");
        let repo: Arc<dyn AuditRepository> = Arc::new(store.audit());
        let writer = AuditWriter::new(Arc::clone(&repo));

        let decision = GovernanceDecision {
            action: "observe".to_owned(),
            rule_id: "no-rm".to_owned(),
            rule_description: "deny rm".to_owned(),
            reason: "downgraded".to_owned(),
            matched_pattern: "tool=Bash".to_owned(),
            tool_category: ToolCategory::Shell,
            message: String::new(),
        };
        writer
            .record(
                "s1",
                "claude-code",
                "Bash",
                Some("tu-1"),
                &json!({"command": "rm -rf /tmp/x"}),
                &decision,
                "observe",
                1.5,
            )
            .await;

        let (events, total) = repo
            .list_events(AuditFilter {
                limit: 10,
                ..Default::default()
            })
            .await
            .expect("list");
        assert_eq!(total, 1);
        assert_eq!(events[0].action, "observe");
        assert_eq!(events[0].tool_category, "shell");
        assert_eq!(events[0].enforcement_mode, "observe");
        assert!(events[0]
            .tool_input_summary
            .as_deref()
            .unwrap_or_default()
            .contains("rm -rf"));
    }

    #[test]
    fn long_inputs_are_truncated() {
        let big = json!({"command": "x".repeat(2000)});
        let summary = summarize_input(&big);
        assert!(summary.len() <= TOOL_INPUT_SUMMARY_MAX + 3);
        assert!(summary.ends_with("..."));
    }
}

//! Governance domain definitions.

use serde::{Deserialize, Serialize};

/// Coarse tool categorization for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Filesystem,
    Shell,
    Network,
    Agent,
    Other,
}

impl ToolCategory {
    /// String form stored in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::Shell => "shell",
            Self::Network => "network",
            Self::Agent => "agent",
            Self::Other => "other",
        }
    }
}

/// Result of evaluating one tool call against the governance rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceDecision {
    /// allow, deny, warn, or observe.
    pub action: String,
    /// Matched rule id; empty on default allow.
    pub rule_id: String,
    /// Matched rule description.
    pub rule_description: String,
    /// Human-readable reason.
    pub reason: String,
    /// What matched, for the audit trail.
    pub matched_pattern: String,
    /// Tool categorization.
    pub tool_category: ToolCategory,
    /// Message shown to the agent on deny/warn.
    pub message: String,
}

impl GovernanceDecision {
    /// Default allow decision when no rule matched.
    #[must_use]
    pub fn allow(category: ToolCategory) -> Self {
        Self {
            action: "allow".to_owned(),
            rule_id: String::new(),
            rule_description: String::new(),
            reason: "No rule matched".to_owned(),
            matched_pattern: String::new(),
            tool_category: category,
            message: String::new(),
        }
    }
}

/// One audit row written per governance evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceAuditEvent {
    pub id: i64,
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
    pub created_at: String,
    pub source_machine_id: String,
}

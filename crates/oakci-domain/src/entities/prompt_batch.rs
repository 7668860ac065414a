//! Prompt batch domain definitions.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a prompt batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Batch is collecting tool activity.
    Active,
    /// Batch closed at the next prompt or session end.
    Completed,
}

impl BatchStatus {
    /// String form stored in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Unknown batch status: {s}")),
        }
    }
}

/// Where a batch's prompt text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptSource {
    /// A user-typed prompt.
    User,
    /// A notification event forwarded by the agent.
    AgentNotification,
    /// An explicit plan file sent to the agent.
    Plan,
    /// A plan synthesized from task-create activities.
    DerivedPlan,
    /// Internal system event.
    System,
}

impl PromptSource {
    /// String form stored in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::AgentNotification => "agent_notification",
            Self::Plan => "plan",
            Self::DerivedPlan => "derived_plan",
            Self::System => "system",
        }
    }
}

impl std::str::FromStr for PromptSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "agent_notification" => Ok(Self::AgentNotification),
            "plan" => Ok(Self::Plan),
            "derived_plan" => Ok(Self::DerivedPlan),
            "system" => Ok(Self::System),
            _ => Err(format!("Unknown prompt source: {s}")),
        }
    }
}

/// What kind of work a batch turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionClassification {
    /// Reading and searching the codebase.
    Exploration,
    /// Chasing an error.
    Debugging,
    /// Writing new functionality.
    Implementation,
    /// Restructuring existing code.
    Refactoring,
}

impl SessionClassification {
    /// String form stored in the database and used in prompt templates.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exploration => "exploration",
            Self::Debugging => "debugging",
            Self::Implementation => "implementation",
            Self::Refactoring => "refactoring",
        }
    }

    /// All valid labels, in the order they are offered to the LLM.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::Exploration,
            Self::Debugging,
            Self::Implementation,
            Self::Refactoring,
        ]
    }
}

impl std::str::FromStr for SessionClassification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exploration" => Ok(Self::Exploration),
            "debugging" => Ok(Self::Debugging),
            "implementation" => Ok(Self::Implementation),
            "refactoring" => Ok(Self::Refactoring),
            _ => Err(format!("Unknown classification: {s}")),
        }
    }
}

/// One user prompt plus all tool activity until the next prompt or the
/// session end. At most one batch per session is active at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBatch {
    /// Row id.
    pub id: i64,
    /// Owning session.
    pub session_id: String,
    /// 1-based position within the session.
    pub prompt_number: i64,
    /// The prompt text.
    pub user_prompt: String,
    /// Agent response summary written by the notify receiver.
    pub response_summary: Option<String>,
    /// ISO start timestamp.
    pub started_at: String,
    /// ISO end timestamp once completed.
    pub ended_at: Option<String>,
    /// Lifecycle state.
    pub status: BatchStatus,
    /// Classification assigned by the processor.
    pub classification: Option<SessionClassification>,
    /// Whether the processor has consumed this batch.
    pub processed: bool,
    /// Prompt provenance.
    pub source_type: PromptSource,
    /// Plan text for plan/derived-plan batches.
    pub plan_content: Option<String>,
    /// Plan file path when the plan came from disk.
    pub plan_file_path: Option<String>,
    /// Whether the plan has been indexed into the vector store.
    pub plan_embedded: bool,
}

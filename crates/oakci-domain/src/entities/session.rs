//! Session domain definitions.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session is receiving hook events.
    Active,
    /// Session ended (explicitly or via the stale sweep).
    Completed,
    /// Session was abandoned without a clean end.
    Abandoned,
}

impl SessionStatus {
    /// String form stored in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            _ => Err(format!("Unknown session status: {s}")),
        }
    }
}

/// One contiguous interaction with an agent.
///
/// Created on the first hook event carrying a new session id; the title
/// and summary are filled in later by the activity processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session id (UUID-like, assigned by the agent).
    pub id: String,
    /// Agent name (e.g. "claude-code", "cursor").
    pub agent: String,
    /// Project root the session ran in.
    pub project_root: String,
    /// ISO start timestamp.
    pub started_at: String,
    /// ISO end timestamp once completed.
    pub ended_at: Option<String>,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Generated or user-provided title.
    pub title: Option<String>,
    /// Generated summary.
    pub summary: Option<String>,
    /// Parent session when this session was spawned by another.
    pub parent_session_id: Option<String>,
    /// Why the parent spawned this session.
    pub parent_session_reason: Option<String>,
    /// Path to the agent transcript file, when known.
    pub transcript_path: Option<String>,
    /// Machine that produced this row.
    pub source_machine_id: String,
}

/// Aggregated per-session counters for the browsing UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Session id these counters belong to.
    pub session_id: String,
    /// Prompt batches recorded.
    pub batch_count: i64,
    /// Activities recorded.
    pub activity_count: i64,
    /// Observations extracted.
    pub observation_count: i64,
}

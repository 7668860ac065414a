//! Agent schedule and saved task definitions.
//!
//! Orthogonal to the hot path; specified by their CRUD contracts only.

use serde::{Deserialize, Serialize};

/// A periodic agent job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSchedule {
    pub id: String,
    pub name: String,
    pub agent: String,
    pub prompt: String,
    /// Interval between runs, in minutes.
    pub interval_minutes: i64,
    pub enabled: bool,
    pub last_run_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// An on-demand saved agent task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedTask {
    pub id: String,
    pub name: String,
    pub agent: String,
    pub prompt: String,
    pub created_at: String,
    pub updated_at: String,
}

//! Activity domain definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool invocation recorded by the agent's pre/post hooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Row id.
    pub id: i64,
    /// Owning session.
    pub session_id: String,
    /// Batch the activity was assigned to at flush time.
    pub prompt_batch_id: Option<i64>,
    /// Tool name (e.g. "Bash", "Edit").
    pub tool_name: String,
    /// Raw tool input.
    pub tool_input: Value,
    /// Truncated tool output summary from the post hook.
    pub tool_output_summary: Option<String>,
    /// File the tool touched, when extractable.
    pub file_path: Option<String>,
    /// Whether the tool call succeeded.
    pub success: bool,
    /// Error text for failed calls.
    pub error_message: Option<String>,
    /// ISO timestamp.
    pub timestamp: String,
    /// Whether the processor has consumed this activity.
    pub processed: bool,
}

/// An activity waiting in the in-memory buffer before flush.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub session_id: String,
    pub tool_name: String,
    pub tool_input: Value,
    pub tool_output_summary: Option<String>,
    pub file_path: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub timestamp: String,
}

//! Governance tool-category sets and action labels.

/// Filesystem tool names.
pub const FILESYSTEM_TOOLS: &[&str] = &[
    "Read", "Write", "Edit", "MultiEdit", "NotebookEdit", "Glob", "Grep", "LS",
];
/// Shell tool names.
pub const SHELL_TOOLS: &[&str] = &["Bash", "BashOutput", "KillShell", "Shell"];
/// Network tool names.
pub const NETWORK_TOOLS: &[&str] = &["WebFetch", "WebSearch", "Fetch"];
/// Agent orchestration tool names.
pub const AGENT_TOOLS: &[&str] = &["Task", "Agent", "SendMessage", "TaskCreate", "TaskUpdate"];

/// Action labels.
pub const ACTION_ALLOW: &str = "allow";
pub const ACTION_DENY: &str = "deny";
pub const ACTION_WARN: &str = "warn";
pub const ACTION_OBSERVE: &str = "observe";

/// Enforcement modes.
pub const MODE_OBSERVE: &str = "observe";
pub const MODE_ENFORCE: &str = "enforce";

/// Tool input summary cap in audit rows.
pub const TOOL_INPUT_SUMMARY_MAX: usize = 500;

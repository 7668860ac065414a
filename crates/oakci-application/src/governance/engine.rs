//! Governance engine.
//!
//! Compiles the enabled rules at construction (invalid regexes are
//! skipped with a warning) and evaluates tool calls against them in
//! order, first match wins. In observe mode, deny and warn downgrade to
//! observe so rules can be rolled out without enforcement. Read-only
//! after construction, safe for concurrent evaluation.

use globset::Glob;
use oakci_domain::constants::governance::{
    ACTION_DENY, ACTION_OBSERVE, ACTION_WARN, AGENT_TOOLS, FILESYSTEM_TOOLS, MODE_OBSERVE,
    NETWORK_TOOLS, SHELL_TOOLS,
};
use oakci_domain::entities::{GovernanceDecision, ToolCategory};
use oakci_domain::value_objects::{GovernanceConfig, GovernanceRule};
use regex::Regex;
use serde_json::Value;
use tracing::warn;

struct CompiledRule {
    rule: GovernanceRule,
    pattern: Option<Regex>,
    tool_glob: Option<globset::GlobMatcher>,
    path_glob: Option<globset::GlobMatcher>,
}

/// Evaluates tool calls against governance policy rules.
pub struct GovernanceEngine {
    enforcement_mode: String,
    rules: Vec<CompiledRule>,
}

impl GovernanceEngine {
    /// Compiles the enabled rules. Rules with invalid patterns are
    /// dropped, not fatal.
    #[must_use]
    pub fn new(config: &GovernanceConfig) -> Self {
        let mut rules = Vec::new();
        for rule in &config.rules {
            if !rule.enabled {
                continue;
            }
            let pattern = match &rule.pattern {
                Some(p) if !p.is_empty() => match Regex::new(p) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(rule = %rule.id, pattern = %p, error = %e, "skipping rule: invalid regex");
                        continue;
                    }
                },
                _ => None,
            };
            let tool_glob = if rule.tool.is_empty() || rule.tool == "*" {
                None
            } else {
                match Glob::new(&rule.tool) {
                    Ok(glob) => Some(glob.compile_matcher()),
                    Err(e) => {
                        warn!(rule = %rule.id, error = %e, "skipping rule: invalid tool glob");
                        continue;
                    }
                }
            };
            let path_glob = match &rule.path_pattern {
                Some(p) if !p.is_empty() => match Glob::new(p) {
                    Ok(glob) => Some(glob.compile_matcher()),
                    Err(e) => {
                        warn!(rule = %rule.id, error = %e, "skipping rule: invalid path glob");
                        continue;
                    }
                },
                _ => None,
            };
            rules.push(CompiledRule {
                rule: rule.clone(),
                pattern,
                tool_glob,
                path_glob,
            });
        }
        Self {
            enforcement_mode: config.enforcement_mode.clone(),
            rules,
        }
    }

    /// Current enforcement mode.
    #[must_use]
    pub fn enforcement_mode(&self) -> &str {
        &self.enforcement_mode
    }

    /// Number of compiled rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Categorizes a tool via the fixed name sets.
    #[must_use]
    pub fn categorize_tool(tool_name: &str) -> ToolCategory {
        if FILESYSTEM_TOOLS.contains(&tool_name) {
            ToolCategory::Filesystem
        } else if SHELL_TOOLS.contains(&tool_name) {
            ToolCategory::Shell
        } else if NETWORK_TOOLS.contains(&tool_name) {
            ToolCategory::Network
        } else if AGENT_TOOLS.contains(&tool_name) {
            ToolCategory::Agent
        } else {
            ToolCategory::Other
        }
    }

    /// Evaluates one tool call; first matching rule wins.
    #[must_use]
    pub fn evaluate(&self, tool_name: &str, tool_input: &Value) -> GovernanceDecision {
        let category = Self::categorize_tool(tool_name);
        let input_str = match tool_input {
            Value::String(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        };

        for compiled in &self.rules {
            if !rule_matches(compiled, tool_name, &input_str) {
                continue;
            }
            let rule = &compiled.rule;
            let matched = describe_match(rule, tool_name);

            // Observe mode records the rule but never enforces it.
            if self.enforcement_mode == MODE_OBSERVE
                && matches!(rule.action.as_str(), ACTION_DENY | ACTION_WARN)
            {
                return GovernanceDecision {
                    action: ACTION_OBSERVE.to_owned(),
                    rule_id: rule.id.clone(),
                    rule_description: rule.description.clone(),
                    reason: format!(
                        "Rule '{}' would {} but enforcement_mode=observe; downgraded to observe",
                        rule.id, rule.action
                    ),
                    matched_pattern: matched,
                    tool_category: category,
                    message: rule.message.clone(),
                };
            }

            return GovernanceDecision {
                action: rule.action.clone(),
                rule_id: rule.id.clone(),
                rule_description: rule.description.clone(),
                reason: if rule.description.is_empty() {
                    format!("Matched rule '{}'", rule.id)
                } else {
                    format!("Matched rule '{}': {}", rule.id, rule.description)
                },
                matched_pattern: matched,
                tool_category: category,
                message: rule.message.clone(),
            };
        }

        GovernanceDecision::allow(category)
    }
}

/// AND semantics over the conditions a rule specifies.
fn rule_matches(compiled: &CompiledRule, tool_name: &str, input_str: &str) -> bool {
    if let Some(glob) = &compiled.tool_glob {
        if !glob.is_match(tool_name) {
            return false;
        }
    }
    if let Some(pattern) = &compiled.pattern {
        if !pattern.is_match(input_str) {
            return false;
        }
    }
    if let Some(glob) = &compiled.path_glob {
        let Some(file_path) = extract_file_path(input_str) else {
            return false;
        };
        if !glob.is_match(&file_path) {
            return false;
        }
    }
    true
}

/// Pulls a file path out of serialized tool input, trying the common
/// field names.
fn extract_file_path(input_str: &str) -> Option<String> {
    let data: Value = serde_json::from_str(input_str).ok()?;
    let object = data.as_object()?;
    for key in ["file_path", "path", "filename"] {
        if let Some(value) = object.get(key).and_then(Value::as_str) {
            if !value.is_empty() {
                return Some(value.to_owned());
            }
        }
    }
    None
}

fn describe_match(rule: &GovernanceRule, tool_name: &str) -> String {
    let mut parts = vec![format!("tool={tool_name}")];
    if let Some(pattern) = &rule.pattern {
        parts.push(format!("pattern={pattern:?}"));
    }
    if let Some(path_pattern) = &rule.path_pattern {
        parts.push(format!("path_pattern={path_pattern:?}"));
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(id: &str, tool: &str, pattern: Option<&str>, action: &str) -> GovernanceRule {
        GovernanceRule {
            id: id.to_owned(),
            description: format!("rule {id}"),
            tool: tool.to_owned(),
            pattern: pattern.map(str::to_owned),
            path_pattern: None,
            action: action.to_owned(),
            message: "blocked".to_owned(),
            enabled: true,
        }
    }

    fn config(mode: &str, rules: Vec<GovernanceRule>) -> GovernanceConfig {
        GovernanceConfig {
            enforcement_mode: mode.to_owned(),
            rules,
            retention_days: 30,
        }
    }

    #[test]
    fn observe_mode_downgrades_deny() {
        let engine = GovernanceEngine::new(&config(
            "observe",
            vec![rule("no-rm", "Bash", Some(r"rm\s+-rf"), "deny")],
        ));
        let decision = engine.evaluate("Bash", &json!({"command": "rm -rf /tmp/x"}));
        assert_eq!(decision.action, "observe");
        assert_eq!(decision.rule_id, "no-rm");
        assert!(decision.reason.contains("downgraded"));
    }

    #[test]
    fn enforce_mode_denies() {
        let engine = GovernanceEngine::new(&config(
            "enforce",
            vec![rule("no-rm", "Bash", Some(r"rm\s+-rf"), "deny")],
        ));
        let decision = engine.evaluate("Bash", &json!({"command": "rm -rf /tmp/x"}));
        assert_eq!(decision.action, "deny");
        assert_eq!(decision.message, "blocked");

        // Non-matching input allows.
        let decision = engine.evaluate("Bash", &json!({"command": "ls"}));
        assert_eq!(decision.action, "allow");
    }

    #[test]
    fn first_match_wins() {
        let engine = GovernanceEngine::new(&config(
            "enforce",
            vec![
                rule("warn-all", "Bash", None, "warn"),
                rule("deny-rm", "Bash", Some("rm"), "deny"),
            ],
        ));
        let decision = engine.evaluate("Bash", &json!({"command": "rm x"}));
        assert_eq!(decision.rule_id, "warn-all");
        assert_eq!(decision.action, "warn");
    }

    #[test]
    fn invalid_regex_rules_are_skipped() {
        let engine = GovernanceEngine::new(&config(
            "enforce",
            vec![rule("broken", "Bash", Some("(unclosed"), "deny")],
        ));
        assert_eq!(engine.rule_count(), 0);
        let decision = engine.evaluate("Bash", &json!({"command": "anything"}));
        assert_eq!(decision.action, "allow");
    }

    #[test]
    fn path_pattern_requires_an_extractable_path() {
        let mut with_path = rule("protect-env", "*", None, "deny");
        with_path.path_pattern = Some("**/.env*".to_owned());
        let engine = GovernanceEngine::new(&config("enforce", vec![with_path]));

        let decision = engine.evaluate("Write", &json!({"file_path": "config/.env.local"}));
        assert_eq!(decision.action, "deny");

        // No extractable path means the rule cannot match.
        let decision = engine.evaluate("Bash", &json!({"command": "cat .env"}));
        assert_eq!(decision.action, "allow");
    }

    #[test]
    fn tool_categorization() {
        assert_eq!(
            GovernanceEngine::categorize_tool("Read"),
            ToolCategory::Filesystem
        );
        assert_eq!(
            GovernanceEngine::categorize_tool("Bash"),
            ToolCategory::Shell
        );
        assert_eq!(
            GovernanceEngine::categorize_tool("WebFetch"),
            ToolCategory::Network
        );
        assert_eq!(
            GovernanceEngine::categorize_tool("Task"),
            ToolCategory::Agent
        );
        assert_eq!(
            GovernanceEngine::categorize_tool("Mystery"),
            ToolCategory::Other
        );
    }
}

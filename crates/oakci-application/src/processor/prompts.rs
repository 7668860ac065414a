//! Prompt templates for the background processor.
//!
//! Templates use `{{placeholder}}` substitution. The defaults ship with
//! the daemon; a template with the same name under `.oak/ci/prompts/`
//! overrides the built-in at load time.

use std::collections::HashMap;
use std::path::Path;

/// Built-in classification template.
const CLASSIFY: &str = "\
You are classifying one unit of an AI coding agent's work.

Session duration: {{session_duration}} minutes
Tools used: {{tool_summary}}
Files read: {{files_read_count}}, modified: {{files_modified_count}}, created: {{files_created_count}}
Errors occurred: {{has_errors}}

Activities:
{{activities}}

Classify this work as exactly one of: {{classification_types}}.
Respond with only the classification word.";

/// Built-in extraction template for exploration work.
const EXPLORATION: &str = "\
An AI coding agent explored a codebase. Extract durable observations a
future session would benefit from: discoveries about structure, behavior,
or conventions.

User prompt: {{user_prompt}}

Activities:
{{activities}}

Respond with a JSON array. Each element:
{\"observation\": string, \"type\": \"discovery\"|\"gotcha\"|\"decision\", \"importance\": \"low\"|\"medium\"|\"high\"|\"critical\", \"context\": optional file path}
Only include observations worth remembering. Respond with [] if none.";

/// Built-in extraction template for debugging work.
const DEBUGGING: &str = "\
An AI coding agent debugged a problem. Extract durable observations:
the root cause, the fix, and any gotchas discovered along the way.

User prompt: {{user_prompt}}

Activities:
{{activities}}

Respond with a JSON array. Each element:
{\"observation\": string, \"type\": \"bug_fix\"|\"gotcha\"|\"discovery\", \"importance\": \"low\"|\"medium\"|\"high\"|\"critical\", \"context\": optional file path}
Only include observations worth remembering. Respond with [] if none.";

/// Built-in extraction template for implementation work.
const IMPLEMENTATION: &str = "\
An AI coding agent implemented or refactored code. Extract durable
observations: decisions made, trade-offs weighed, and gotchas hit.

User prompt: {{user_prompt}}

Activities:
{{activities}}

Respond with a JSON array. Each element:
{\"observation\": string, \"type\": \"decision\"|\"trade_off\"|\"gotcha\"|\"discovery\", \"importance\": \"low\"|\"medium\"|\"high\"|\"critical\", \"context\": optional file path}
Only include observations worth remembering. Respond with [] if none.";

/// Built-in generic extraction template.
const EXTRACTION: &str = "\
An AI coding agent completed a unit of work. Extract durable observations
a future session would benefit from.

User prompt: {{user_prompt}}

Activities:
{{activities}}

Respond with a JSON array. Each element:
{\"observation\": string, \"type\": \"discovery\"|\"gotcha\"|\"decision\"|\"bug_fix\"|\"trade_off\", \"importance\": \"low\"|\"medium\"|\"high\"|\"critical\", \"context\": optional file path}
Respond with [] if none.";

/// Built-in session summary template.
const SUMMARY: &str = "\
Summarize this AI coding session in 2-4 sentences for a project activity
log. Cover what was attempted, what changed, and the outcome.

Prompts:
{{prompts}}

Activity overview:
{{activities}}

Respond with only the summary text.";

/// Built-in session title template.
const TITLE: &str = "\
Write a short title (at most 8 words) for this AI coding session.

Prompts:
{{prompts}}

Respond with only the title.";

/// A loaded prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: String,
    pub prompt: String,
}

impl PromptTemplate {
    /// Substitutes `{{key}}` placeholders.
    #[must_use]
    pub fn render(&self, values: &HashMap<&str, String>) -> String {
        let mut out = self.prompt.clone();
        for (key, value) in values {
            out = out.replace(&format!("{{{{{key}}}}}"), value);
        }
        out
    }
}

/// Template registry with optional on-disk overrides.
#[derive(Debug, Clone)]
pub struct PromptTemplateConfig {
    templates: HashMap<String, PromptTemplate>,
}

impl PromptTemplateConfig {
    /// Built-in templates plus any overrides found under `prompts_dir`.
    #[must_use]
    pub fn load(prompts_dir: Option<&Path>) -> Self {
        let mut templates = HashMap::new();
        for (name, prompt) in [
            ("classify", CLASSIFY),
            ("exploration", EXPLORATION),
            ("debugging", DEBUGGING),
            ("implementation", IMPLEMENTATION),
            ("extraction", EXTRACTION),
            ("summary", SUMMARY),
            ("title", TITLE),
        ] {
            templates.insert(
                name.to_owned(),
                PromptTemplate {
                    name: name.to_owned(),
                    prompt: prompt.to_owned(),
                },
            );
        }

        if let Some(dir) = prompts_dir {
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some("md") {
                        continue;
                    }
                    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                        continue;
                    };
                    if let Ok(content) = std::fs::read_to_string(&path) {
                        templates.insert(
                            stem.to_owned(),
                            PromptTemplate {
                                name: stem.to_owned(),
                                prompt: content,
                            },
                        );
                    }
                }
            }
        }

        Self { templates }
    }

    /// Template by name.
    #[must_use]
    pub fn get_template(&self, name: &str) -> Option<&PromptTemplate> {
        self.templates.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_placeholders() {
        let config = PromptTemplateConfig::load(None);
        let template = config.get_template("title").expect("template");
        let rendered = template.render(&HashMap::from([("prompts", "fix the bug".to_owned())]));
        assert!(rendered.contains("fix the bug"));
        assert!(!rendered.contains("{{prompts}}"));
    }

    #[test]
    fn disk_overrides_win() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("classify.md"), "custom {{activities}}").expect("write");
        let config = PromptTemplateConfig::load(Some(dir.path()));
        assert_eq!(
            config.get_template("classify").map(|t| t.prompt.as_str()),
            Some("custom {{activities}}")
        );
        // Non-overridden templates still present.
        assert!(config.get_template("summary").is_some());
    }
}

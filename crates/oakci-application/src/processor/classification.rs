//! Batch classification.
//!
//! Two stages: LLM classification over a compact activity summary, with a
//! heuristic fallback when the LLM is unavailable or answers with noise.

use std::collections::HashMap;

use oakci_domain::constants::processing::CLASSIFY_ACTIVITY_LIMIT;
use oakci_domain::entities::{Activity, SessionClassification};
use oakci_domain::ports::LlmClient;
use oakci_domain::utils::time::iso_to_epoch;
use tracing::debug;

use super::prompts::PromptTemplateConfig;

/// Compact view of a batch's activities fed into prompts.
pub struct ActivitySummary {
    pub duration_minutes: f64,
    pub tool_names: Vec<String>,
    pub files_read: Vec<String>,
    pub files_modified: Vec<String>,
    pub files_created: Vec<String>,
    pub has_errors: bool,
    /// Numbered "N. Tool - path" lines, capped.
    pub activity_lines: String,
}

impl ActivitySummary {
    /// Builds the summary from a batch's activities.
    #[must_use]
    pub fn build(activities: &[Activity], started_at: &str, ended_at: Option<&str>) -> Self {
        let mut files_read = Vec::new();
        let mut files_modified = Vec::new();
        let mut files_created = Vec::new();
        let mut has_errors = false;

        for activity in activities {
            if !activity.success {
                has_errors = true;
            }
            if let Some(path) = &activity.file_path {
                match activity.tool_name.as_str() {
                    "Read" | "Grep" | "Glob" => files_read.push(path.clone()),
                    "Edit" | "MultiEdit" => files_modified.push(path.clone()),
                    "Write" => files_created.push(path.clone()),
                    _ => {}
                }
            }
        }
        files_read.dedup();
        files_modified.dedup();
        files_created.dedup();

        let start_epoch = iso_to_epoch(started_at);
        let end_epoch = ended_at.map_or(start_epoch, iso_to_epoch);
        let duration_minutes = ((end_epoch - start_epoch).max(0) as f64) / 60.0;

        let activity_lines = activities
            .iter()
            .take(CLASSIFY_ACTIVITY_LIMIT)
            .enumerate()
            .map(|(i, a)| match &a.file_path {
                Some(path) => format!("{}. {} - {path}", i + 1, a.tool_name),
                None => format!("{}. {}", i + 1, a.tool_name),
            })
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            duration_minutes,
            tool_names: activities.iter().map(|a| a.tool_name.clone()).collect(),
            files_read,
            files_modified,
            files_created,
            has_errors,
            activity_lines,
        }
    }

    /// "Tool:count" histogram over the five most-used tools.
    #[must_use]
    pub fn tool_histogram(&self) -> String {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for name in &self.tool_names {
            *counts.entry(name.as_str()).or_default() += 1;
        }
        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked
            .into_iter()
            .take(5)
            .map(|(tool, count)| format!("{tool}:{count}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// LLM classification with heuristic fallback.
pub async fn classify(
    summary: &ActivitySummary,
    prompt_config: &PromptTemplateConfig,
    llm: Option<&dyn LlmClient>,
) -> SessionClassification {
    let Some(llm) = llm else {
        return classify_heuristic(summary);
    };
    let Some(template) = prompt_config.get_template("classify") else {
        return classify_heuristic(summary);
    };

    let labels: Vec<&str> = SessionClassification::all()
        .iter()
        .map(SessionClassification::as_str)
        .collect();
    let prompt = template.render(&HashMap::from([
        ("session_duration", format!("{:.1}", summary.duration_minutes)),
        ("tool_summary", summary.tool_histogram()),
        ("files_read_count", summary.files_read.len().to_string()),
        (
            "files_modified_count",
            summary.files_modified.len().to_string(),
        ),
        (
            "files_created_count",
            summary.files_created.len().to_string(),
        ),
        (
            "has_errors",
            if summary.has_errors { "yes" } else { "no" }.to_owned(),
        ),
        ("activities", summary.activity_lines.clone()),
        ("classification_types", labels.join(", ")),
    ]));

    match llm.complete(&prompt).await {
        Ok(response) => {
            let raw = response.trim().to_lowercase();
            // Any valid label appearing as a substring wins.
            for label in SessionClassification::all() {
                if raw.contains(label.as_str()) {
                    return *label;
                }
            }
            debug!(response = %raw, "no valid label in classification response");
            classify_heuristic(summary)
        }
        Err(e) => {
            debug!(error = %e, "classification LLM call failed");
            classify_heuristic(summary)
        }
    }
}

/// Heuristic fallback: errors mean debugging, new files mean
/// implementation, heavy edits mean refactoring, heavy reads mean
/// exploration.
#[must_use]
pub fn classify_heuristic(summary: &ActivitySummary) -> SessionClassification {
    if summary.has_errors {
        return SessionClassification::Debugging;
    }
    if !summary.files_created.is_empty() {
        return SessionClassification::Implementation;
    }

    let total = summary.tool_names.len().max(1);
    let edit_count = summary
        .tool_names
        .iter()
        .filter(|t| matches!(t.as_str(), "Write" | "Edit" | "MultiEdit"))
        .count();
    if edit_count as f64 > total as f64 * 0.3 {
        return SessionClassification::Refactoring;
    }

    let explore_count = summary
        .tool_names
        .iter()
        .filter(|t| matches!(t.as_str(), "Read" | "Grep" | "Glob"))
        .count();
    if explore_count as f64 > total as f64 * 0.5 {
        return SessionClassification::Exploration;
    }

    SessionClassification::Exploration
}

/// Extraction template name for a classification.
#[must_use]
pub fn template_for(classification: SessionClassification) -> &'static str {
    match classification {
        SessionClassification::Exploration => "exploration",
        SessionClassification::Debugging => "debugging",
        // Refactoring shares the implementation template.
        SessionClassification::Implementation | SessionClassification::Refactoring => {
            "implementation"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn activity(tool: &str, file: Option<&str>, success: bool) -> Activity {
        Activity {
            id: 0,
            session_id: "s1".to_owned(),
            prompt_batch_id: None,
            tool_name: tool.to_owned(),
            tool_input: json!({}),
            tool_output_summary: None,
            file_path: file.map(str::to_owned),
            success,
            error_message: None,
            timestamp: "2026-01-01T00:00:00Z".to_owned(),
            processed: false,
        }
    }

    #[test]
    fn heuristic_prefers_debugging_on_errors() {
        let summary = ActivitySummary::build(
            &[activity("Bash", None, false)],
            "2026-01-01T00:00:00Z",
            None,
        );
        assert_eq!(classify_heuristic(&summary), SessionClassification::Debugging);
    }

    #[test]
    fn heuristic_detects_exploration_and_implementation() {
        let reads = vec![
            activity("Read", Some("a.rs"), true),
            activity("Grep", None, true),
            activity("Read", Some("b.rs"), true),
        ];
        let summary = ActivitySummary::build(&reads, "2026-01-01T00:00:00Z", None);
        assert_eq!(
            classify_heuristic(&summary),
            SessionClassification::Exploration
        );

        let creates = vec![activity("Write", Some("new.rs"), true)];
        let summary = ActivitySummary::build(&creates, "2026-01-01T00:00:00Z", None);
        assert_eq!(
            classify_heuristic(&summary),
            SessionClassification::Implementation
        );
    }

    #[test]
    fn histogram_ranks_by_count() {
        let activities = vec![
            activity("Read", None, true),
            activity("Read", None, true),
            activity("Bash", None, true),
        ];
        let summary = ActivitySummary::build(&activities, "2026-01-01T00:00:00Z", None);
        assert_eq!(summary.tool_histogram(), "Read:2, Bash:1");
    }

    #[test]
    fn activity_lines_are_capped_and_numbered() {
        let activities: Vec<Activity> = (0..30)
            .map(|i| activity("Read", Some(&format!("f{i}.rs")), true))
            .collect();
        let summary = ActivitySummary::build(&activities, "2026-01-01T00:00:00Z", None);
        let lines: Vec<&str> = summary.activity_lines.lines().collect();
        assert_eq!(lines.len(), CLASSIFY_ACTIVITY_LIMIT);
        assert!(lines[0].starts_with("1. Read - f0.rs"));
    }
}

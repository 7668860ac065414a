//! Derived-plan synthesis from task-tracking activities.
//!
//! Task lists survive context compaction where plan prose does not, so a
//! batch that created tasks carries recoverable implementation intent
//! even when no plan file was ever sent. Synthesis turns TaskCreate and
//! TaskUpdate activities into a markdown plan stored on the batch.

use std::collections::BTreeMap;

use oakci_domain::constants::processing::{PLAN_DESCRIPTION_MAX_CHARS, PLAN_SUBJECT_MIN_CHARS};
use oakci_domain::entities::{Activity, PromptBatch, PromptSource};
use serde_json::Value;

/// A task reconstructed from tracking activities.
#[derive(Debug, Clone, Default)]
pub struct ExtractedTask {
    pub task_id: String,
    pub subject: String,
    pub description: String,
    pub status: String,
    /// Tasks this one blocks.
    pub blocks: Vec<String>,
    /// Tasks blocking this one.
    pub blocked_by: Vec<String>,
}

/// Extracts tasks (with dependencies) from TaskCreate/TaskUpdate
/// activities, keyed by task id in first-seen order.
#[must_use]
pub fn extract_tasks(activities: &[Activity]) -> Vec<ExtractedTask> {
    let mut tasks: BTreeMap<String, ExtractedTask> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();

    for activity in activities {
        match activity.tool_name.as_str() {
            "TaskCreate" => {
                let task_id = activity
                    .tool_output_summary
                    .as_deref()
                    .and_then(parse_task_id)
                    .unwrap_or_else(|| format!("temp_{}", tasks.len() + 1));
                let task = ExtractedTask {
                    task_id: task_id.clone(),
                    subject: str_field(&activity.tool_input, "subject"),
                    description: str_field(&activity.tool_input, "description"),
                    status: "pending".to_owned(),
                    ..Default::default()
                };
                if !tasks.contains_key(&task_id) {
                    order.push(task_id.clone());
                }
                tasks.insert(task_id, task);
            }
            "TaskUpdate" => {
                let task_id = str_field(&activity.tool_input, "taskId");
                if task_id.is_empty() {
                    continue;
                }
                let entry = tasks.entry(task_id.clone()).or_insert_with(|| {
                    order.push(task_id.clone());
                    ExtractedTask {
                        task_id: task_id.clone(),
                        subject: format!("Task #{task_id}"),
                        status: "pending".to_owned(),
                        ..Default::default()
                    }
                });
                for (key, target) in [("subject", &mut entry.subject), ("description", &mut entry.description)] {
                    let value = str_field(&activity.tool_input, key);
                    if !value.is_empty() {
                        *target = value;
                    }
                }
                let status = str_field(&activity.tool_input, "status");
                if !status.is_empty() {
                    entry.status = status;
                }
                for id in str_list(&activity.tool_input, "addBlocks") {
                    if !entry.blocks.contains(&id) {
                        entry.blocks.push(id);
                    }
                }
                for id in str_list(&activity.tool_input, "addBlockedBy") {
                    if !entry.blocked_by.contains(&id) {
                        entry.blocked_by.push(id);
                    }
                }
            }
            _ => {}
        }
    }

    order.into_iter().filter_map(|id| tasks.remove(&id)).collect()
}

/// Whether a batch qualifies for derived-plan synthesis: not already a
/// plan, and at least one TaskCreate with a meaningful subject.
#[must_use]
pub fn should_synthesize(batch: &PromptBatch, activities: &[Activity]) -> bool {
    if matches!(
        batch.source_type,
        PromptSource::Plan | PromptSource::DerivedPlan
    ) {
        return false;
    }
    activities.iter().any(|a| {
        a.tool_name == "TaskCreate"
            && str_field(&a.tool_input, "subject").len() > PLAN_SUBJECT_MIN_CHARS
    })
}

/// Renders extracted tasks as a markdown plan with a root/dependent
/// layout and a dependency summary.
#[must_use]
pub fn render_plan(tasks: &[ExtractedTask], synthesized_at: &str) -> String {
    if tasks.is_empty() {
        return String::new();
    }

    let mut lines = vec![
        "# Derived Plan (from TaskCreate activities)".to_owned(),
        String::new(),
        format!("*Synthesized at: {synthesized_at}*"),
        String::new(),
        "## Tasks".to_owned(),
        String::new(),
    ];

    let format_task = |task: &ExtractedTask, lines: &mut Vec<String>| {
        lines.push(format!("- **{}**", task.subject));
        if !task.description.is_empty() {
            let mut desc = task.description.clone();
            if desc.len() > PLAN_DESCRIPTION_MAX_CHARS {
                let mut end = PLAN_DESCRIPTION_MAX_CHARS;
                while !desc.is_char_boundary(end) {
                    end -= 1;
                }
                desc.truncate(end);
                desc.push_str("...");
            }
            lines.push(format!("  {desc}"));
        }
        if !task.blocked_by.is_empty() {
            let blockers: Vec<String> =
                task.blocked_by.iter().map(|id| format!("#{id}")).collect();
            lines.push(format!("  *Blocked by: {}*", blockers.join(", ")));
        }
        lines.push(String::new());
    };

    for task in tasks.iter().filter(|t| t.blocked_by.is_empty()) {
        format_task(task, &mut lines);
    }

    let dependent: Vec<&ExtractedTask> =
        tasks.iter().filter(|t| !t.blocked_by.is_empty()).collect();
    if !dependent.is_empty() {
        lines.push("### Dependent Tasks".to_owned());
        lines.push(String::new());
        for task in dependent {
            format_task(task, &mut lines);
        }
    }

    if tasks.iter().any(|t| !t.blocks.is_empty() || !t.blocked_by.is_empty()) {
        lines.push("## Dependency Graph".to_owned());
        lines.push(String::new());
        for task in tasks {
            if !task.blocks.is_empty() {
                let blocked: Vec<String> = task.blocks.iter().map(|id| format!("#{id}")).collect();
                lines.push(format!("- #{} blocks: {}", task.task_id, blocked.join(", ")));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Parses "Task #7 created successfully" into "7".
fn parse_task_id(output: &str) -> Option<String> {
    let start = output.find("Task #")? + 6;
    let rest = &output[start..];
    let id: String = rest.chars().take_while(char::is_ascii_alphanumeric).collect();
    if id.is_empty() { None } else { Some(id) }
}

fn str_field(input: &Value, key: &str) -> String {
    input
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn str_list(input: &Value, key: &str) -> Vec<String> {
    input
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oakci_domain::entities::{BatchStatus, PromptBatch};
    use serde_json::json;

    fn activity(tool: &str, input: Value, output: Option<&str>) -> Activity {
        Activity {
            id: 0,
            session_id: "s1".to_owned(),
            prompt_batch_id: Some(1),
            tool_name: tool.to_owned(),
            tool_input: input,
            tool_output_summary: output.map(str::to_owned),
            file_path: None,
            success: true,
            error_message: None,
            timestamp: "2026-01-01T00:00:00Z".to_owned(),
            processed: false,
        }
    }

    fn batch(source: PromptSource) -> PromptBatch {
        PromptBatch {
            id: 1,
            session_id: "s1".to_owned(),
            prompt_number: 1,
            user_prompt: "do work".to_owned(),
            response_summary: None,
            started_at: "2026-01-01T00:00:00Z".to_owned(),
            ended_at: None,
            status: BatchStatus::Completed,
            classification: None,
            processed: false,
            source_type: source,
            plan_content: None,
            plan_file_path: None,
            plan_embedded: false,
        }
    }

    #[test]
    fn synthesis_produces_tasks_and_dependency_summary() {
        let activities = vec![
            activity(
                "TaskCreate",
                json!({"subject": "Draft migration plan", "description": "outline steps"}),
                Some("Task #1 created successfully"),
            ),
            activity(
                "TaskCreate",
                json!({"subject": "Write schema doc"}),
                Some("Task #2 created successfully"),
            ),
            activity(
                "TaskUpdate",
                json!({"taskId": "2", "addBlockedBy": ["1"]}),
                None,
            ),
        ];
        assert!(should_synthesize(&batch(PromptSource::User), &activities));

        let tasks = extract_tasks(&activities);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].task_id, "1");
        assert_eq!(tasks[1].blocked_by, vec!["1"]);

        // TaskUpdate with addBlockedBy records the reverse edge on render.
        let plan = render_plan(&tasks, "2026-01-01T00:00:00Z");
        assert!(plan.contains("**Draft migration plan**"));
        assert!(plan.contains("**Write schema doc**"));
        assert!(plan.contains("*Blocked by: #1*"));
    }

    #[test]
    fn blocks_edges_render_in_the_dependency_graph() {
        let activities = vec![
            activity(
                "TaskCreate",
                json!({"subject": "Parent task here"}),
                Some("Task #1 created successfully"),
            ),
            activity(
                "TaskUpdate",
                json!({"taskId": "1", "addBlocks": ["2"]}),
                None,
            ),
        ];
        let tasks = extract_tasks(&activities);
        let plan = render_plan(&tasks, "2026-01-01T00:00:00Z");
        assert!(plan.contains("#1 blocks: #2"));
    }

    #[test]
    fn plan_batches_are_not_resynthesized() {
        let activities = vec![activity(
            "TaskCreate",
            json!({"subject": "A meaningful subject"}),
            None,
        )];
        assert!(!should_synthesize(&batch(PromptSource::Plan), &activities));
        assert!(!should_synthesize(
            &batch(PromptSource::DerivedPlan),
            &activities
        ));
    }

    #[test]
    fn short_subjects_do_not_trigger_synthesis() {
        let activities = vec![activity("TaskCreate", json!({"subject": "abc"}), None)];
        assert!(!should_synthesize(&batch(PromptSource::User), &activities));
    }
}

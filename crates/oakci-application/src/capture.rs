//! Activity capture.
//!
//! Receives hook events from agent integrations and turns them into
//! sessions, prompt batches, and buffered activities. Activities are
//! buffered in memory and flushed in one transaction when their batch
//! closes, so a burst of tool calls costs one write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use moka::sync::Cache;
use oakci_domain::constants::processing::HOOK_DEDUPE_CAPACITY;
use oakci_domain::entities::{NewActivity, PromptBatch, PromptSource, Session};
use oakci_domain::error::Result;
use oakci_domain::ports::repositories::{NewBatch, NewSession};
use oakci_domain::ports::{ActivityRepository, BatchRepository, SessionRepository};
use oakci_domain::utils::mask_id;
use oakci_domain::utils::time::now_iso;
use serde_json::Value;
use tracing::debug;

/// One hook event as delivered by an agent integration.
#[derive(Debug, Clone)]
pub struct HookEvent {
    /// Event name: session_start, user_prompt, pre_tool_use,
    /// post_tool_use, session_end, notification.
    pub event: String,
    pub session_id: String,
    pub agent: String,
    /// Free-form payload; shape depends on the event.
    pub payload: Value,
}

/// Capture service wiring hook events into the activity store.
pub struct ActivityCapture {
    sessions: Arc<dyn SessionRepository>,
    batches: Arc<dyn BatchRepository>,
    activities: Arc<dyn ActivityRepository>,
    project_root: String,
    buffer: Mutex<HashMap<String, Vec<NewActivity>>>,
    /// Bounded LRU preventing double counting when an agent retries hook
    /// delivery. In-memory only.
    dedupe: Cache<String, ()>,
}

impl ActivityCapture {
    /// Builds the capture service.
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        batches: Arc<dyn BatchRepository>,
        activities: Arc<dyn ActivityRepository>,
        project_root: String,
    ) -> Self {
        Self {
            sessions,
            batches,
            activities,
            project_root,
            buffer: Mutex::new(HashMap::new()),
            // Retries arrive within seconds; a short TTL keeps legitimate
            // repeats (same prompt sent again later) from being swallowed.
            dedupe: Cache::builder()
                .max_capacity(HOOK_DEDUPE_CAPACITY)
                .time_to_live(std::time::Duration::from_secs(60))
                .build(),
        }
    }

    /// Whether this exact event was already seen recently. Inserts the
    /// key as a side effect.
    pub fn is_duplicate(&self, event: &HookEvent, extra: &str) -> bool {
        let key = format!("{}|{}|{extra}", event.event, event.session_id);
        if self.dedupe.contains_key(&key) {
            return true;
        }
        self.dedupe.insert(key, ());
        false
    }

    /// session_start: idempotent session creation.
    pub async fn on_session_start(&self, event: &HookEvent) -> Result<(Session, bool)> {
        let parent_session_id = event
            .payload
            .get("parent_session_id")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let parent_session_reason = event
            .payload
            .get("parent_session_reason")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let transcript_path = event
            .payload
            .get("transcript_path")
            .and_then(Value::as_str)
            .map(str::to_owned);

        let (session, created) = self
            .sessions
            .get_or_create_session(NewSession {
                id: event.session_id.clone(),
                agent: event.agent.clone(),
                project_root: self.project_root.clone(),
                parent_session_id: parent_session_id.clone(),
                parent_session_reason,
                transcript_path,
            })
            .await?;

        // Parent/child sessions are linked automatically.
        if created {
            if let Some(parent) = parent_session_id {
                let _ = self
                    .sessions
                    .add_relationship(
                        &parent,
                        &session.id,
                        None,
                        oakci_domain::entities::RelationshipOrigin::Auto,
                    )
                    .await;
            }
        }
        Ok((session, created))
    }

    /// user_prompt: close the previous batch (flushing its activities)
    /// and open the next one.
    pub async fn on_user_prompt(&self, event: &HookEvent) -> Result<PromptBatch> {
        self.on_session_start(event).await?;

        let prompt = event
            .payload
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let (source_type, plan_content, plan_file_path) = detect_plan(&prompt, &event.payload);

        self.flush_activity_buffer(&event.session_id).await?;

        let batch = self
            .batches
            .start_batch(NewBatch {
                session_id: event.session_id.clone(),
                user_prompt: prompt,
                source_type,
                plan_content,
                plan_file_path,
            })
            .await?;
        debug!(
            session = %mask_id(&event.session_id),
            batch = batch.id,
            prompt_number = batch.prompt_number,
            "prompt batch opened"
        );
        Ok(batch)
    }

    /// post_tool_use: buffer the activity for the next flush.
    pub async fn on_post_tool_use(&self, event: &HookEvent) -> Result<()> {
        self.on_session_start(event).await?;

        let tool_name = event
            .payload
            .get("tool_name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_owned();
        let tool_input = event
            .payload
            .get("tool_input")
            .cloned()
            .unwrap_or(Value::Null);
        let tool_output_summary = event
            .payload
            .get("tool_output")
            .and_then(Value::as_str)
            .map(|s| truncate(s, 1000));
        let error_message = event
            .payload
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let file_path = extract_file_path(&tool_input);

        let activity = NewActivity {
            session_id: event.session_id.clone(),
            tool_name,
            tool_input,
            tool_output_summary,
            file_path,
            success: error_message.is_none(),
            error_message,
            timestamp: now_iso(),
        };
        self.buffer
            .lock()
            .expect("activity buffer lock")
            .entry(event.session_id.clone())
            .or_default()
            .push(activity);
        Ok(())
    }

    /// session_end: flush, close batches, complete the session.
    pub async fn on_session_end(&self, event: &HookEvent) -> Result<()> {
        self.flush_activity_buffer(&event.session_id).await?;
        self.batches
            .complete_active_batches(&event.session_id)
            .await?;
        self.sessions.end_session(&event.session_id).await?;
        debug!(session = %mask_id(&event.session_id), "session ended");
        Ok(())
    }

    /// notification: store the agent's response summary on the active
    /// batch when present, otherwise record a notification batch.
    pub async fn on_notification(&self, event: &HookEvent) -> Result<()> {
        let message = event
            .payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if message.is_empty() {
            return Ok(());
        }

        if let Some(batch) = self
            .batches
            .get_active_prompt_batch(&event.session_id)
            .await?
        {
            self.batches
                .set_response_summary(batch.id, &truncate(message, 2000))
                .await?;
            return Ok(());
        }

        self.on_session_start(event).await?;
        self.batches
            .start_batch(NewBatch {
                session_id: event.session_id.clone(),
                user_prompt: truncate(message, 2000),
                source_type: PromptSource::AgentNotification,
                plan_content: None,
                plan_file_path: None,
            })
            .await?;
        Ok(())
    }

    /// Drains the buffered activities of a session into the store in one
    /// transaction, tying them to the currently active batch. Returns the
    /// assigned ids.
    pub async fn flush_activity_buffer(&self, session_id: &str) -> Result<Vec<i64>> {
        let drained = self
            .buffer
            .lock()
            .expect("activity buffer lock")
            .remove(session_id)
            .unwrap_or_default();
        if drained.is_empty() {
            return Ok(Vec::new());
        }

        let batch_id = self
            .batches
            .get_active_prompt_batch(session_id)
            .await?
            .map(|b| b.id);
        let count = drained.len();
        let ids = self.activities.insert_buffered(drained, batch_id).await?;
        debug!(
            session = %mask_id(session_id),
            count,
            batch = ?batch_id,
            "activity buffer flushed"
        );
        Ok(ids)
    }

    /// Buffered activity count for a session (status surface).
    #[must_use]
    pub fn pending_count(&self, session_id: &str) -> usize {
        self.buffer
            .lock()
            .expect("activity buffer lock")
            .get(session_id)
            .map_or(0, Vec::len)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_owned();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

fn extract_file_path(tool_input: &Value) -> Option<String> {
    for key in ["file_path", "path", "filename"] {
        if let Some(path) = tool_input.get(key).and_then(Value::as_str) {
            if !path.is_empty() {
                return Some(path.to_owned());
            }
        }
    }
    None
}

/// Detects an explicit plan payload on a prompt event.
fn detect_plan(prompt: &str, payload: &Value) -> (PromptSource, Option<String>, Option<String>) {
    if let Some(plan) = payload.get("plan_content").and_then(Value::as_str) {
        let path = payload
            .get("plan_file_path")
            .and_then(Value::as_str)
            .map(str::to_owned);
        return (PromptSource::Plan, Some(plan.to_owned()), path);
    }
    let source = payload
        .get("source_type")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or(PromptSource::User);
    if source == PromptSource::Plan {
        return (source, Some(prompt.to_owned()), None);
    }
    (source, None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oakci_providers::database::SqliteActivityStore;
    use serde_json::json;

    async fn capture() -> (ActivityCapture, SqliteActivityStore) {
        let store = SqliteActivityStore::open_in_memory("test-machine")
            .await
            .expect("store");
        let capture = ActivityCapture::new(
            Arc::new(store.sessions()),
            Arc::new(store.batches()),
            Arc::new(store.activities()),
            "/tmp/project".to_owned(),
        );
        (capture, store)
    }

    fn event(name: &str, session: &str, payload: Value) -> HookEvent {
        HookEvent {
            event: name.to_owned(),
            session_id: session.to_owned(),
            agent: "claude-code".to_owned(),
            payload,
        }
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let (capture, _store) = capture().await;
        let e = event("session_start", "s1", json!({}));
        let (_, first) = capture.on_session_start(&e).await.expect("start");
        let (_, second) = capture.on_session_start(&e).await.expect("start again");
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn single_active_batch_per_session() {
        let (capture, store) = capture().await;
        capture
            .on_user_prompt(&event("user_prompt", "s1", json!({"prompt": "first"})))
            .await
            .expect("prompt 1");
        capture
            .on_user_prompt(&event("user_prompt", "s1", json!({"prompt": "second"})))
            .await
            .expect("prompt 2");

        let batches = store
            .batches()
            .list_for_session("s1")
            .await
            .expect("list");
        assert_eq!(batches.len(), 2);
        let active: Vec<_> = batches
            .iter()
            .filter(|b| b.status == oakci_domain::entities::BatchStatus::Active)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].prompt_number, 2);
    }

    #[tokio::test]
    async fn buffered_activities_flush_to_the_active_batch() {
        let (capture, store) = capture().await;
        let batch = capture
            .on_user_prompt(&event("user_prompt", "s1", json!({"prompt": "work"})))
            .await
            .expect("prompt");

        for i in 0..3 {
            capture
                .on_post_tool_use(&event(
                    "post_tool_use",
                    "s1",
                    json!({"tool_name": "Read", "tool_input": {"file_path": format!("f{i}.rs")}}),
                ))
                .await
                .expect("tool");
        }
        assert_eq!(capture.pending_count("s1"), 3);

        let ids = capture
            .flush_activity_buffer("s1")
            .await
            .expect("flush");
        assert_eq!(ids.len(), 3);
        assert_eq!(capture.pending_count("s1"), 0);

        let activities = store
            .activities()
            .list_for_batch(batch.id)
            .await
            .expect("list");
        assert_eq!(activities.len(), 3);
        assert_eq!(activities[0].file_path.as_deref(), Some("f0.rs"));
    }

    #[tokio::test]
    async fn duplicate_hook_events_are_detected() {
        let (capture, _store) = capture().await;
        let e = event("post_tool_use", "s1", json!({}));
        assert!(!capture.is_duplicate(&e, "tool-1"));
        assert!(capture.is_duplicate(&e, "tool-1"));
        assert!(!capture.is_duplicate(&e, "tool-2"));
    }

    #[tokio::test]
    async fn notification_sets_response_summary_on_active_batch() {
        let (capture, store) = capture().await;
        let batch = capture
            .on_user_prompt(&event("user_prompt", "s1", json!({"prompt": "work"})))
            .await
            .expect("prompt");
        capture
            .on_notification(&event(
                "notification",
                "s1",
                json!({"message": "All done."}),
            ))
            .await
            .expect("notify");

        let stored = store
            .batches()
            .get_batch(batch.id)
            .await
            .expect("get")
            .expect("some");
        assert_eq!(stored.response_summary.as_deref(), Some("All done."));
    }
}

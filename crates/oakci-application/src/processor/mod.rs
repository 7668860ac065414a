//! Background activity processor.
//!
//! # Overview
//! Consumes completed prompt batches: classifies them, extracts durable
//! observations, auto-resolves superseded ones, synthesizes derived plans
//! from task activities, indexes plans, backfills missed vector writes,
//! and finalizes completed sessions with summaries and titles.
//!
//! # Failure semantics
//! One batch failing never blocks the others, and no error escapes
//! `run_cycle`: failures are logged, the batch is marked processed with
//! the error recorded, and the loop moves on. Vector-side failures leave
//! the `embedded` flag unset for the next backfill pass.

pub mod auto_resolve;
pub mod classification;
pub mod extraction;
pub mod plan_synthesis;
pub mod prompts;
pub mod replay;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use oakci_domain::constants::processing::TITLE_PROMPT_LIMIT;
use oakci_domain::entities::{
    MemoryType, PlanDocument, PromptBatch, PromptSource, Session, SessionSummaryDocument,
};
use oakci_domain::error::Result;
use oakci_domain::ports::repositories::NewObservation;
use oakci_domain::ports::{
    ActivityRepository, BatchRepository, LlmClient, ObservationRepository, SessionRepository,
};
use oakci_domain::utils::mask_id;
use oakci_domain::utils::time::{iso_to_epoch, now_iso};
use oakci_domain::value_objects::{CiConfig, ConfigAccessor};
use oakci_providers::llm::create_llm;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::vector_index::VectorIndex;
use classification::ActivitySummary;
use prompts::PromptTemplateConfig;

/// Counters from one processor cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub batches_processed: usize,
    pub observations_extracted: usize,
    pub observations_superseded: usize,
    pub plans_indexed: usize,
    pub observations_backfilled: usize,
    pub sessions_finalized: usize,
    pub resolution_events_applied: usize,
    pub errors: usize,
}

/// Cached summarizer client, rebuilt only when its config key changes.
struct LlmSlot {
    key: String,
    client: Option<Arc<dyn LlmClient>>,
}

/// The background processor.
pub struct ActivityProcessor {
    sessions: Arc<dyn SessionRepository>,
    batches: Arc<dyn BatchRepository>,
    activities: Arc<dyn ActivityRepository>,
    observations: Arc<dyn ObservationRepository>,
    vector_index: Arc<VectorIndex>,
    config: ConfigAccessor,
    prompt_config: PromptTemplateConfig,
    machine_id: String,
    llm_slot: Mutex<LlmSlot>,
}

impl ActivityProcessor {
    /// Builds the processor with a live configuration accessor.
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        batches: Arc<dyn BatchRepository>,
        activities: Arc<dyn ActivityRepository>,
        observations: Arc<dyn ObservationRepository>,
        vector_index: Arc<VectorIndex>,
        config: ConfigAccessor,
        prompt_config: PromptTemplateConfig,
        machine_id: String,
    ) -> Self {
        Self {
            sessions,
            batches,
            activities,
            observations,
            vector_index,
            config,
            prompt_config,
            machine_id,
            llm_slot: Mutex::new(LlmSlot {
                key: String::new(),
                client: None,
            }),
        }
    }

    /// Current summarizer client, rebuilt when (provider, model,
    /// base_url, timeout, enabled) changed since the last cycle. UI edits
    /// take effect without a restart.
    fn llm_for(&self, config: &CiConfig) -> Option<Arc<dyn LlmClient>> {
        let key = config.summarization.cache_key();
        let mut slot = self.llm_slot.lock().expect("llm slot lock");
        if slot.key != key {
            slot.client = create_llm(&config.summarization);
            slot.key = key;
        }
        slot.client.clone()
    }

    /// One full processor cycle. Never returns an error; every failure is
    /// absorbed into the report.
    pub async fn run_cycle(&self) -> CycleReport {
        // Re-read thresholds each cycle through the live accessor.
        let config = (self.config)();
        let mut report = CycleReport::default();

        match replay::replay_unapplied_events(&self.observations, Some(self.vector_index.as_ref()))
            .await
        {
            Ok(applied) => report.resolution_events_applied = applied,
            Err(e) => {
                warn!(error = %e, "resolution replay failed");
                report.errors += 1;
            }
        }

        let pending = match self
            .batches
            .list_unprocessed_completed(config.processing.batch_cap)
            .await
        {
            Ok(batches) => batches,
            Err(e) => {
                warn!(error = %e, "could not list pending batches");
                report.errors += 1;
                Vec::new()
            }
        };

        for batch in pending {
            match self.process_batch(&batch, &config, &mut report).await {
                Ok(()) => report.batches_processed += 1,
                Err(e) => {
                    warn!(batch = batch.id, error = %e, "batch processing failed");
                    report.errors += 1;
                    let _ = self
                        .batches
                        .mark_processed(batch.id, Some(&e.to_string()))
                        .await;
                }
            }
        }

        if let Err(e) = self.index_pending_plans(&mut report).await {
            warn!(error = %e, "plan indexing failed");
            report.errors += 1;
        }
        if let Err(e) = self.backfill_unembedded(&mut report).await {
            warn!(error = %e, "observation backfill failed");
            report.errors += 1;
        }
        if let Err(e) = self.finalize_sessions(&config, &mut report).await {
            warn!(error = %e, "session finalization failed");
            report.errors += 1;
        }

        debug!(
            batches = report.batches_processed,
            observations = report.observations_extracted,
            errors = report.errors,
            "processor cycle complete"
        );
        report
    }

    async fn process_batch(
        &self,
        batch: &PromptBatch,
        config: &CiConfig,
        report: &mut CycleReport,
    ) -> Result<()> {
        match batch.source_type {
            // Plans need indexing (step 6) but no extraction.
            PromptSource::Plan => {
                self.batches.mark_processed(batch.id, None).await?;
                return Ok(());
            }
            PromptSource::AgentNotification | PromptSource::System => {
                self.batches.mark_processed(batch.id, None).await?;
                return Ok(());
            }
            PromptSource::User | PromptSource::DerivedPlan => {}
        }

        let activities = self.activities.list_for_batch(batch.id).await?;

        // Derived-plan synthesis before anything else so the plan survives
        // even if extraction fails.
        if plan_synthesis::should_synthesize(batch, &activities) {
            let tasks = plan_synthesis::extract_tasks(&activities);
            let content = plan_synthesis::render_plan(&tasks, &now_iso());
            if !content.is_empty() {
                self.batches.store_derived_plan(batch.id, &content).await?;
                info!(batch = batch.id, tasks = tasks.len(), "derived plan stored");
            }
        }

        let summary =
            ActivitySummary::build(&activities, &batch.started_at, batch.ended_at.as_deref());
        let llm = self.llm_for(config);

        let classification =
            classification::classify(&summary, &self.prompt_config, llm.as_deref()).await;
        self.batches
            .set_classification(batch.id, classification)
            .await?;

        if let Some(llm) = llm {
            let template_name = classification::template_for(classification);
            let template = self
                .prompt_config
                .get_template(template_name)
                .or_else(|| self.prompt_config.get_template("extraction"));
            if let Some(template) = template {
                let stored = extraction::extract_and_store(
                    llm.as_ref(),
                    template,
                    &batch.user_prompt,
                    &summary.activity_lines,
                    &batch.session_id,
                    batch.id,
                    classification,
                    &self.observations,
                    &self.vector_index,
                )
                .await?;
                report.observations_extracted += stored.len();

                for observation in &stored {
                    let superseded = auto_resolve::auto_resolve_superseded(
                        observation,
                        &config.auto_resolve,
                        &self.vector_index,
                        &self.observations,
                        &self.machine_id,
                    )
                    .await?;
                    report.observations_superseded += superseded.len();
                }
            }
        }

        self.batches.mark_processed(batch.id, None).await?;
        Ok(())
    }

    /// Step 6: embed pending plans and backfill missed observation
    /// embeddings.
    async fn index_pending_plans(&self, report: &mut CycleReport) -> Result<()> {
        for batch in self.batches.list_unembedded_plans().await? {
            let Some(content) = batch.plan_content.clone() else {
                continue;
            };
            let title = plan_title(&batch, &content);
            let plan = PlanDocument {
                id: format!("plan-{}", batch.id),
                session_id: batch.session_id.clone(),
                title,
                content,
                file_path: batch.plan_file_path.clone(),
                created_at: batch.started_at.clone(),
            };
            match self.vector_index.add_plan(&plan).await {
                Ok(()) => {
                    self.batches.mark_plan_embedded(batch.id).await?;
                    report.plans_indexed += 1;
                }
                Err(e) => {
                    warn!(batch = batch.id, error = %e, "plan embedding failed");
                    report.errors += 1;
                }
            }
        }
        Ok(())
    }

    async fn backfill_unembedded(&self, report: &mut CycleReport) -> Result<()> {
        for observation in self.observations.list_unembedded(100).await? {
            match self.vector_index.add_memory(&observation).await {
                Ok(()) => {
                    self.observations.mark_embedded(&observation.id, true).await?;
                    report.observations_backfilled += 1;
                }
                Err(e) => {
                    debug!(observation = %mask_id(&observation.id), error = %e, "backfill failed");
                    report.errors += 1;
                    // The chain is likely down for all of them.
                    break;
                }
            }
        }
        Ok(())
    }

    /// Step 7: sweep stale sessions, then summarize and title completed
    /// sessions that have enough activity and no summary yet.
    async fn finalize_sessions(&self, config: &CiConfig, report: &mut CycleReport) -> Result<()> {
        let swept = self
            .sessions
            .sweep_stale_sessions(config.processing.stale_session_timeout_seconds)
            .await?;
        for session in &swept {
            self.batches.complete_active_batches(&session.id).await?;
        }

        let (completed, _) = self
            .sessions
            .list_sessions(oakci_domain::ports::repositories::SessionFilter {
                status: Some(oakci_domain::entities::SessionStatus::Completed),
                agent: None,
                limit: 50,
                offset: 0,
            })
            .await?;

        let llm = self.llm_for(config);
        for session in completed {
            if session.summary.is_some() {
                continue;
            }
            let activity_count = self.activities.count_for_session(&session.id).await?;
            if (activity_count as usize) < config.processing.min_session_activities {
                continue;
            }
            let Some(llm) = llm.as_ref() else { break };
            match self.summarize_session(llm.as_ref(), &session).await {
                Ok(()) => report.sessions_finalized += 1,
                Err(e) => {
                    warn!(session = %mask_id(&session.id), error = %e, "summarization failed");
                    report.errors += 1;
                }
            }
        }
        Ok(())
    }

    async fn summarize_session(&self, llm: &dyn LlmClient, session: &Session) -> Result<()> {
        let batches = self.batches.list_for_session(&session.id).await?;
        let prompts: Vec<String> = batches
            .iter()
            .filter(|b| b.source_type == PromptSource::User)
            .take(TITLE_PROMPT_LIMIT)
            .map(|b| format!("- {}", b.user_prompt))
            .collect();
        let activities = self.activities.list_for_session(&session.id, 200).await?;
        let summary_view = ActivitySummary::build(&activities, &session.started_at, None);

        let Some(template) = self.prompt_config.get_template("summary") else {
            return Ok(());
        };
        let prompt = template.render(&HashMap::from([
            ("prompts", prompts.join("\n")),
            ("activities", summary_view.activity_lines.clone()),
        ]));
        let summary = llm.complete(&prompt).await?.trim().to_owned();
        if summary.is_empty() {
            return Ok(());
        }

        self.sessions.set_summary(&session.id, &summary).await?;

        // Persisted both as an observation and a session-summaries entry.
        let observation = extraction::store_observation_dual(
            &self.observations,
            &self.vector_index,
            NewObservation {
                id: uuid::Uuid::new_v4().to_string(),
                session_id: session.id.clone(),
                prompt_batch_id: None,
                observation: summary.clone(),
                memory_type: MemoryType::SessionSummary,
                context: None,
                tags: vec!["session-summary".to_owned()],
                importance: 5,
            },
        )
        .await?;
        debug!(observation = %mask_id(&observation.id), "session summary stored");

        let title = if session.title.is_none() {
            let generated = self.generate_title(llm, &prompts).await;
            if let Some(title) = &generated {
                self.sessions.set_title(&session.id, title).await?;
            }
            generated
        } else {
            session.title.clone()
        };

        self.vector_index
            .add_session_summary(&SessionSummaryDocument {
                session_id: session.id.clone(),
                title,
                summary,
                project_root: session.project_root.clone(),
                agent: session.agent.clone(),
                created_at_epoch: iso_to_epoch(&session.started_at),
            })
            .await?;
        Ok(())
    }

    async fn generate_title(&self, llm: &dyn LlmClient, prompts: &[String]) -> Option<String> {
        let template = self.prompt_config.get_template("title")?;
        let prompt = template.render(&HashMap::from([("prompts", prompts.join("\n"))]));
        match llm.complete(&prompt).await {
            Ok(title) => {
                let cleaned = title.trim().trim_matches('"').to_owned();
                (!cleaned.is_empty()).then_some(cleaned)
            }
            Err(e) => {
                debug!(error = %e, "title generation failed");
                None
            }
        }
    }
}

fn plan_title(batch: &PromptBatch, content: &str) -> String {
    if let Some(path) = &batch.plan_file_path {
        if let Some(stem) = std::path::Path::new(path).file_stem().and_then(|s| s.to_str()) {
            return stem.replace(['-', '_'], " ");
        }
    }
    content
        .lines()
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_owned())
        .unwrap_or_else(|| format!("Plan from batch {}", batch.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use oakci_domain::ports::repositories::NewBatch;
    use oakci_providers::database::SqliteActivityStore;
    use oakci_providers::vector_store::FilesystemVectorStore;
    use std::sync::Arc;

    use crate::vector_index::test_support::HashingEmbedder;

    /// LLM stub returning canned responses per prompt marker.
    struct ScriptedLlm;

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            if prompt.contains("Classify this work") {
                return Ok("implementation".to_owned());
            }
            if prompt.contains("JSON array") {
                return Ok(r#"[{"observation": "The parser caches tokens between calls.", "type": "discovery", "importance": "high", "context": "src/parser.rs"}]"#.to_owned());
            }
            if prompt.contains("short title") {
                return Ok("Parser caching work".to_owned());
            }
            Ok("Implemented token caching in the parser.".to_owned())
        }
    }

    struct Fixture {
        processor: ActivityProcessor,
        store: SqliteActivityStore,
        _dir: tempfile::TempDir,
    }

    async fn fixture(summarization_enabled: bool) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteActivityStore::open_in_memory("machine-a")
            .await
            .expect("store");
        let vector_store = Arc::new(FilesystemVectorStore::open(dir.path()).expect("vs"));
        let chain = Arc::new(HashingEmbedder { dimensions: 16 });
        let index = Arc::new(VectorIndex::new(vector_store, chain));
        index.ensure_collections().await.expect("collections");

        let mut config = CiConfig::default();
        config.summarization.enabled = summarization_enabled;
        config.processing.min_session_activities = 1;
        let accessor: ConfigAccessor = Arc::new(move || config.clone());

        let processor = ActivityProcessor::new(
            Arc::new(store.sessions()),
            Arc::new(store.batches()),
            Arc::new(store.activities()),
            Arc::new(store.observations()),
            index,
            accessor,
            PromptTemplateConfig::load(None),
            "machine-a".to_owned(),
        );
        Fixture {
            processor,
            store,
            _dir: dir,
        }
    }

    impl Fixture {
        /// Swaps in the scripted LLM regardless of config.
        fn script_llm(&self) {
            let mut slot = self.processor.llm_slot.lock().expect("slot");
            slot.key = (self.processor.config)().summarization.cache_key();
            slot.client = Some(Arc::new(ScriptedLlm));
        }

        async fn seed_batch(&self, session: &str, prompt: &str) -> i64 {
            self.store
                .sessions()
                .get_or_create_session(oakci_domain::ports::repositories::NewSession {
                    id: session.to_owned(),
                    agent: "claude-code".to_owned(),
                    project_root: "/tmp/p".to_owned(),
                    ..Default::default()
                })
                .await
                .expect("session");
            let batch = self
                .store
                .batches()
                .start_batch(NewBatch {
                    session_id: session.to_owned(),
                    user_prompt: prompt.to_owned(),
                    source_type: PromptSource::User,
                    plan_content: None,
                    plan_file_path: None,
                })
                .await
                .expect("batch");
            self.store
                .batches()
                .complete_batch(batch.id)
                .await
                .expect("complete");
            batch.id
        }
    }

    #[tokio::test]
    async fn cycle_classifies_and_extracts() {
        let fixture = fixture(true).await;
        fixture.script_llm();
        let batch_id = fixture.seed_batch("s1", "implement caching").await;

        let report = fixture.processor.run_cycle().await;
        assert_eq!(report.batches_processed, 1);
        assert_eq!(report.observations_extracted, 1);

        let batch = fixture
            .store
            .batches()
            .get_batch(batch_id)
            .await
            .expect("get")
            .expect("some");
        assert!(batch.processed);
        assert_eq!(
            batch.classification,
            Some(oakci_domain::entities::SessionClassification::Implementation)
        );

        let observations = fixture.store.observations();
        assert_eq!(observations.count_observations().await.expect("count"), 1);
        assert_eq!(observations.count_unembedded().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn auto_supersede_across_batches() {
        let fixture = fixture(true).await;
        fixture.script_llm();

        // O1 stored directly (as the remember path would).
        let o1 = extraction::store_observation_dual(
            &fixture.processor.observations,
            &fixture.processor.vector_index,
            NewObservation {
                id: "o1".to_owned(),
                session_id: "s1".to_owned(),
                prompt_batch_id: None,
                observation: "The parser caches tokens between calls.".to_owned(),
                memory_type: MemoryType::Discovery,
                context: Some("src/parser.rs".to_owned()),
                tags: Vec::new(),
                importance: 5,
            },
        )
        .await
        .expect("o1");
        assert!(o1.embedded);

        // Processing a batch extracts a near-identical observation.
        fixture.seed_batch("s2", "look at the parser").await;
        let report = fixture.processor.run_cycle().await;
        assert_eq!(report.observations_extracted, 1);
        assert_eq!(report.observations_superseded, 1);

        let o1 = fixture
            .processor
            .observations
            .get_observation("o1")
            .await
            .expect("get")
            .expect("some");
        assert_eq!(
            o1.status,
            oakci_domain::entities::ObservationStatus::Superseded
        );
        assert!(o1.superseded_by.is_some());
        assert!(o1.resolved_at.is_some());

        // A resolution event exists, already applied locally.
        let unapplied = fixture
            .processor
            .observations
            .count_unapplied_events()
            .await
            .expect("count");
        assert_eq!(unapplied, 0);
    }

    #[tokio::test]
    async fn plan_batches_skip_extraction_but_get_indexed() {
        let fixture = fixture(true).await;
        fixture.script_llm();
        fixture
            .store
            .sessions()
            .get_or_create_session(oakci_domain::ports::repositories::NewSession {
                id: "s1".to_owned(),
                agent: "claude-code".to_owned(),
                project_root: "/tmp/p".to_owned(),
                ..Default::default()
            })
            .await
            .expect("session");
        let batch = fixture
            .store
            .batches()
            .start_batch(NewBatch {
                session_id: "s1".to_owned(),
                user_prompt: "plan".to_owned(),
                source_type: PromptSource::Plan,
                plan_content: Some("# Migration Plan\n\n- step one".to_owned()),
                plan_file_path: Some("plans/migration-plan.md".to_owned()),
            })
            .await
            .expect("batch");
        fixture
            .store
            .batches()
            .complete_batch(batch.id)
            .await
            .expect("complete");

        let report = fixture.processor.run_cycle().await;
        assert_eq!(report.plans_indexed, 1);
        assert_eq!(report.observations_extracted, 0);

        let stored = fixture
            .store
            .batches()
            .get_batch(batch.id)
            .await
            .expect("get")
            .expect("some");
        assert!(stored.plan_embedded);
        assert!(stored.processed);
    }

    #[tokio::test]
    async fn derived_plan_synthesis_from_task_activities() {
        let fixture = fixture(true).await;
        fixture.script_llm();
        fixture
            .store
            .sessions()
            .get_or_create_session(oakci_domain::ports::repositories::NewSession {
                id: "s1".to_owned(),
                agent: "claude-code".to_owned(),
                project_root: "/tmp/p".to_owned(),
                ..Default::default()
            })
            .await
            .expect("session");
        let batch = fixture
            .store
            .batches()
            .start_batch(NewBatch {
                session_id: "s1".to_owned(),
                user_prompt: "plan the migration".to_owned(),
                source_type: PromptSource::User,
                plan_content: None,
                plan_file_path: None,
            })
            .await
            .expect("batch");

        let activities = vec![
            oakci_domain::entities::NewActivity {
                session_id: "s1".to_owned(),
                tool_name: "TaskCreate".to_owned(),
                tool_input: serde_json::json!({"subject": "Draft migration plan"}),
                tool_output_summary: Some("Task #1 created successfully".to_owned()),
                file_path: None,
                success: true,
                error_message: None,
                timestamp: now_iso(),
            },
            oakci_domain::entities::NewActivity {
                session_id: "s1".to_owned(),
                tool_name: "TaskCreate".to_owned(),
                tool_input: serde_json::json!({"subject": "Write schema doc"}),
                tool_output_summary: Some("Task #2 created successfully".to_owned()),
                file_path: None,
                success: true,
                error_message: None,
                timestamp: now_iso(),
            },
            oakci_domain::entities::NewActivity {
                session_id: "s1".to_owned(),
                tool_name: "TaskUpdate".to_owned(),
                tool_input: serde_json::json!({"taskId": "2", "addBlockedBy": ["1"]}),
                tool_output_summary: None,
                file_path: None,
                success: true,
                error_message: None,
                timestamp: now_iso(),
            },
        ];
        fixture
            .store
            .activities()
            .insert_buffered(activities, Some(batch.id))
            .await
            .expect("activities");
        fixture
            .store
            .batches()
            .complete_batch(batch.id)
            .await
            .expect("complete");

        fixture.processor.run_cycle().await;

        let stored = fixture
            .store
            .batches()
            .get_batch(batch.id)
            .await
            .expect("get")
            .expect("some");
        assert_eq!(stored.source_type, PromptSource::DerivedPlan);
        let plan = stored.plan_content.expect("plan content");
        assert!(plan.contains("Draft migration plan"));
        assert!(plan.contains("Write schema doc"));
        assert!(plan.contains("Blocked by: #1"));
    }

    #[tokio::test]
    async fn completed_sessions_get_summary_and_title() {
        let fixture = fixture(true).await;
        fixture.script_llm();
        fixture.seed_batch("s1", "implement caching").await;

        // Record an activity so the session clears the minimum.
        fixture
            .store
            .activities()
            .insert_buffered(
                vec![oakci_domain::entities::NewActivity {
                    session_id: "s1".to_owned(),
                    tool_name: "Edit".to_owned(),
                    tool_input: serde_json::json!({"file_path": "src/parser.rs"}),
                    tool_output_summary: None,
                    file_path: Some("src/parser.rs".to_owned()),
                    success: true,
                    error_message: None,
                    timestamp: now_iso(),
                }],
                None,
            )
            .await
            .expect("activity");
        fixture
            .store
            .sessions()
            .end_session("s1")
            .await
            .expect("end");

        let report = fixture.processor.run_cycle().await;
        assert_eq!(report.sessions_finalized, 1);

        let session = fixture
            .store
            .sessions()
            .get_session("s1")
            .await
            .expect("get")
            .expect("some");
        assert_eq!(session.title.as_deref(), Some("Parser caching work"));
        assert!(session.summary.is_some());
    }
}

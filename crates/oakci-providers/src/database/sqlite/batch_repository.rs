//! SQLite prompt batch repository.

use std::sync::Arc;

use async_trait::async_trait;
use oakci_domain::entities::{PromptBatch, SessionClassification};
use oakci_domain::error::Result;
use oakci_domain::ports::database::{DatabaseExecutor, SqlParam};
use oakci_domain::ports::repositories::{BatchRepository, NewBatch};
use oakci_domain::utils::time::now_pair;

use super::row_convert;

/// Prompt batch persistence over the executor port.
pub struct SqliteBatchRepository {
    executor: Arc<dyn DatabaseExecutor>,
}

impl SqliteBatchRepository {
    /// Create a repository that uses the given executor.
    pub fn new(executor: Arc<dyn DatabaseExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl BatchRepository for SqliteBatchRepository {
    async fn start_batch(&self, input: NewBatch) -> Result<PromptBatch> {
        let (now_iso, now_epoch) = now_pair();

        // Close any still-open batch first so at most one batch per
        // session is ever active.
        self.complete_active_batches(&input.session_id).await?;

        let next_number = self
            .executor
            .query_one(
                "SELECT COALESCE(MAX(prompt_number), 0) + 1 AS n
                 FROM prompt_batches WHERE session_id = ?",
                &[SqlParam::text(&input.session_id)],
            )
            .await?
            .and_then(|r| r.try_get_i64("n").ok().flatten())
            .unwrap_or(1);

        let id = self
            .executor
            .execute_returning_id(
                "INSERT INTO prompt_batches
                 (session_id, prompt_number, user_prompt, started_at, started_at_epoch,
                  status, source_type, plan_content, plan_file_path)
                 VALUES (?, ?, ?, ?, ?, 'active', ?, ?, ?)",
                &[
                    SqlParam::text(&input.session_id),
                    SqlParam::I64(next_number),
                    SqlParam::text(&input.user_prompt),
                    SqlParam::text(&now_iso),
                    SqlParam::I64(now_epoch),
                    SqlParam::text(input.source_type.as_str()),
                    SqlParam::opt_text(input.plan_content.as_deref()),
                    SqlParam::opt_text(input.plan_file_path.as_deref()),
                ],
            )
            .await?;

        self.get_batch(id).await?.ok_or_else(|| {
            oakci_domain::Error::database(format!("batch vanished after insert: {id}"))
        })
    }

    async fn get_active_prompt_batch(&self, session_id: &str) -> Result<Option<PromptBatch>> {
        match self
            .executor
            .query_one(
                "SELECT * FROM prompt_batches
                 WHERE session_id = ? AND status = 'active'
                 ORDER BY prompt_number DESC LIMIT 1",
                &[SqlParam::text(session_id)],
            )
            .await?
        {
            Some(row) => Ok(Some(row_convert::row_to_batch(row.as_ref())?)),
            None => Ok(None),
        }
    }

    async fn get_batch(&self, id: i64) -> Result<Option<PromptBatch>> {
        match self
            .executor
            .query_one(
                "SELECT * FROM prompt_batches WHERE id = ?",
                &[SqlParam::I64(id)],
            )
            .await?
        {
            Some(row) => Ok(Some(row_convert::row_to_batch(row.as_ref())?)),
            None => Ok(None),
        }
    }

    async fn list_for_session(&self, session_id: &str) -> Result<Vec<PromptBatch>> {
        let rows = self
            .executor
            .query_all(
                "SELECT * FROM prompt_batches WHERE session_id = ? ORDER BY prompt_number ASC",
                &[SqlParam::text(session_id)],
            )
            .await?;
        let mut batches = Vec::with_capacity(rows.len());
        for row in rows {
            batches.push(row_convert::row_to_batch(row.as_ref())?);
        }
        Ok(batches)
    }

    async fn complete_batch(&self, id: i64) -> Result<bool> {
        let (now_iso, now_epoch) = now_pair();
        let affected = self
            .executor
            .execute(
                "UPDATE prompt_batches
                 SET status = 'completed', ended_at = ?, ended_at_epoch = ?
                 WHERE id = ? AND status = 'active'",
                &[
                    SqlParam::text(&now_iso),
                    SqlParam::I64(now_epoch),
                    SqlParam::I64(id),
                ],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn complete_active_batches(&self, session_id: &str) -> Result<usize> {
        let (now_iso, now_epoch) = now_pair();
        let affected = self
            .executor
            .execute(
                "UPDATE prompt_batches
                 SET status = 'completed', ended_at = ?, ended_at_epoch = ?
                 WHERE session_id = ? AND status = 'active'",
                &[
                    SqlParam::text(&now_iso),
                    SqlParam::I64(now_epoch),
                    SqlParam::text(session_id),
                ],
            )
            .await?;
        Ok(affected as usize)
    }

    async fn set_response_summary(&self, id: i64, summary: &str) -> Result<bool> {
        let affected = self
            .executor
            .execute(
                "UPDATE prompt_batches SET response_summary = ? WHERE id = ?",
                &[SqlParam::text(summary), SqlParam::I64(id)],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn list_unprocessed_completed(&self, limit: usize) -> Result<Vec<PromptBatch>> {
        let rows = self
            .executor
            .query_all(
                "SELECT * FROM prompt_batches
                 WHERE processed = 0 AND status = 'completed'
                 ORDER BY ended_at_epoch ASC LIMIT ?",
                &[SqlParam::I64(limit as i64)],
            )
            .await?;
        let mut batches = Vec::with_capacity(rows.len());
        for row in rows {
            batches.push(row_convert::row_to_batch(row.as_ref())?);
        }
        Ok(batches)
    }

    async fn mark_processed(&self, id: i64, error: Option<&str>) -> Result<()> {
        self.executor
            .execute(
                "UPDATE prompt_batches SET processed = 1, processing_error = ? WHERE id = ?",
                &[SqlParam::opt_text(error), SqlParam::I64(id)],
            )
            .await?;
        Ok(())
    }

    async fn set_classification(
        &self,
        id: i64,
        classification: SessionClassification,
    ) -> Result<()> {
        self.executor
            .execute(
                "UPDATE prompt_batches SET classification = ? WHERE id = ?",
                &[SqlParam::text(classification.as_str()), SqlParam::I64(id)],
            )
            .await?;
        Ok(())
    }

    async fn store_derived_plan(&self, id: i64, plan_content: &str) -> Result<()> {
        self.executor
            .execute(
                "UPDATE prompt_batches
                 SET source_type = 'derived_plan', plan_content = ?, plan_embedded = 0
                 WHERE id = ?",
                &[SqlParam::text(plan_content), SqlParam::I64(id)],
            )
            .await?;
        Ok(())
    }

    async fn list_unembedded_plans(&self) -> Result<Vec<PromptBatch>> {
        let rows = self
            .executor
            .query_all(
                "SELECT * FROM prompt_batches
                 WHERE source_type IN ('plan', 'derived_plan')
                   AND plan_embedded = 0 AND plan_content IS NOT NULL
                 ORDER BY id ASC",
                &[],
            )
            .await?;
        let mut batches = Vec::with_capacity(rows.len());
        for row in rows {
            batches.push(row_convert::row_to_batch(row.as_ref())?);
        }
        Ok(batches)
    }

    async fn mark_plan_embedded(&self, id: i64) -> Result<()> {
        self.executor
            .execute(
                "UPDATE prompt_batches SET plan_embedded = 1 WHERE id = ?",
                &[SqlParam::I64(id)],
            )
            .await?;
        Ok(())
    }

    async fn delete_batch(&self, id: i64) -> Result<Vec<String>> {
        let obs_rows = self
            .executor
            .query_all(
                "SELECT id FROM memory_observations WHERE prompt_batch_id = ?",
                &[SqlParam::I64(id)],
            )
            .await?;
        let mut observation_ids = Vec::with_capacity(obs_rows.len());
        for row in obs_rows {
            observation_ids.push(row.require_string("id")?);
        }

        self.executor
            .execute_batch(vec![
                (
                    "DELETE FROM activities WHERE prompt_batch_id = ?".to_owned(),
                    vec![SqlParam::I64(id)],
                ),
                (
                    "DELETE FROM memory_observations WHERE prompt_batch_id = ?".to_owned(),
                    vec![SqlParam::I64(id)],
                ),
                (
                    "DELETE FROM prompt_batches WHERE id = ?".to_owned(),
                    vec![SqlParam::I64(id)],
                ),
            ])
            .await?;
        Ok(observation_ids)
    }
}

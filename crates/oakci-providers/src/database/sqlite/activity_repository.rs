//! SQLite activity repository.

use std::sync::Arc;

use async_trait::async_trait;
use oakci_domain::entities::{Activity, NewActivity};
use oakci_domain::error::Result;
use oakci_domain::ports::database::{DatabaseExecutor, SqlParam};
use oakci_domain::ports::repositories::ActivityRepository;
use oakci_domain::utils::time::iso_to_epoch;

use super::row_convert;

/// Activity persistence over the executor port.
pub struct SqliteActivityRepository {
    executor: Arc<dyn DatabaseExecutor>,
}

impl SqliteActivityRepository {
    /// Create a repository that uses the given executor.
    pub fn new(executor: Arc<dyn DatabaseExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ActivityRepository for SqliteActivityRepository {
    async fn insert_buffered(
        &self,
        activities: Vec<NewActivity>,
        prompt_batch_id: Option<i64>,
    ) -> Result<Vec<i64>> {
        if activities.is_empty() {
            return Ok(Vec::new());
        }

        // One transaction for the whole flush: either every buffered
        // activity lands or none do.
        let mut statements = Vec::with_capacity(activities.len());
        for activity in &activities {
            let input_json = serde_json::to_string(&activity.tool_input)?;
            statements.push((
                "INSERT INTO activities
                 (session_id, prompt_batch_id, tool_name, tool_input, tool_output_summary,
                  file_path, success, error_message, timestamp, timestamp_epoch)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                    .to_owned(),
                vec![
                    SqlParam::text(&activity.session_id),
                    SqlParam::opt_i64(prompt_batch_id),
                    SqlParam::text(&activity.tool_name),
                    SqlParam::Text(input_json),
                    SqlParam::opt_text(activity.tool_output_summary.as_deref()),
                    SqlParam::opt_text(activity.file_path.as_deref()),
                    SqlParam::Bool(activity.success),
                    SqlParam::opt_text(activity.error_message.as_deref()),
                    SqlParam::text(&activity.timestamp),
                    SqlParam::I64(iso_to_epoch(&activity.timestamp)),
                ],
            ));
        }
        self.executor.execute_batch(statements).await?;

        // Assigned rowids are contiguous within the transaction.
        let last = self
            .executor
            .query_one("SELECT MAX(id) AS id FROM activities", &[])
            .await?
            .and_then(|r| r.try_get_i64("id").ok().flatten())
            .unwrap_or(0);
        let first = last - activities.len() as i64 + 1;
        Ok((first..=last).collect())
    }

    async fn get_activity(&self, id: i64) -> Result<Option<Activity>> {
        match self
            .executor
            .query_one(
                "SELECT * FROM activities WHERE id = ?",
                &[SqlParam::I64(id)],
            )
            .await?
        {
            Some(row) => Ok(Some(row_convert::row_to_activity(row.as_ref())?)),
            None => Ok(None),
        }
    }

    async fn list_for_batch(&self, batch_id: i64) -> Result<Vec<Activity>> {
        let rows = self
            .executor
            .query_all(
                "SELECT * FROM activities WHERE prompt_batch_id = ? ORDER BY id ASC",
                &[SqlParam::I64(batch_id)],
            )
            .await?;
        let mut activities = Vec::with_capacity(rows.len());
        for row in rows {
            activities.push(row_convert::row_to_activity(row.as_ref())?);
        }
        Ok(activities)
    }

    async fn list_for_session(&self, session_id: &str, limit: usize) -> Result<Vec<Activity>> {
        let rows = self
            .executor
            .query_all(
                "SELECT * FROM activities WHERE session_id = ? ORDER BY id ASC LIMIT ?",
                &[SqlParam::text(session_id), SqlParam::I64(limit as i64)],
            )
            .await?;
        let mut activities = Vec::with_capacity(rows.len());
        for row in rows {
            activities.push(row_convert::row_to_activity(row.as_ref())?);
        }
        Ok(activities)
    }

    async fn count_for_session(&self, session_id: &str) -> Result<i64> {
        Ok(self
            .executor
            .query_one(
                "SELECT COUNT(*) AS n FROM activities WHERE session_id = ?",
                &[SqlParam::text(session_id)],
            )
            .await?
            .and_then(|r| r.try_get_i64("n").ok().flatten())
            .unwrap_or(0))
    }

    async fn delete_activity(&self, id: i64) -> Result<bool> {
        let affected = self
            .executor
            .execute("DELETE FROM activities WHERE id = ?", &[SqlParam::I64(id)])
            .await?;
        Ok(affected > 0)
    }
}

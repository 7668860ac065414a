//! SQLite schedule and saved task repository.

use std::sync::Arc;

use async_trait::async_trait;
use oakci_domain::entities::{AgentSchedule, SavedTask};
use oakci_domain::error::Result;
use oakci_domain::ports::database::{DatabaseExecutor, SqlParam};
use oakci_domain::ports::repositories::ScheduleRepository;

use super::row_convert;

/// Schedule and saved-task persistence over the executor port.
pub struct SqliteScheduleRepository {
    executor: Arc<dyn DatabaseExecutor>,
}

impl SqliteScheduleRepository {
    /// Create a repository that uses the given executor.
    pub fn new(executor: Arc<dyn DatabaseExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ScheduleRepository for SqliteScheduleRepository {
    async fn upsert_schedule(&self, schedule: AgentSchedule) -> Result<()> {
        self.executor
            .execute(
                "INSERT INTO agent_schedules
                 (id, name, agent, prompt, interval_minutes, enabled, last_run_at, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     agent = excluded.agent,
                     prompt = excluded.prompt,
                     interval_minutes = excluded.interval_minutes,
                     enabled = excluded.enabled,
                     updated_at = excluded.updated_at",
                &[
                    SqlParam::text(&schedule.id),
                    SqlParam::text(&schedule.name),
                    SqlParam::text(&schedule.agent),
                    SqlParam::text(&schedule.prompt),
                    SqlParam::I64(schedule.interval_minutes),
                    SqlParam::Bool(schedule.enabled),
                    SqlParam::opt_text(schedule.last_run_at.as_deref()),
                    SqlParam::text(&schedule.created_at),
                    SqlParam::text(&schedule.updated_at),
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_schedule(&self, id: &str) -> Result<Option<AgentSchedule>> {
        match self
            .executor
            .query_one(
                "SELECT * FROM agent_schedules WHERE id = ?",
                &[SqlParam::text(id)],
            )
            .await?
        {
            Some(row) => Ok(Some(row_convert::row_to_schedule(row.as_ref())?)),
            None => Ok(None),
        }
    }

    async fn list_schedules(&self) -> Result<Vec<AgentSchedule>> {
        let rows = self
            .executor
            .query_all("SELECT * FROM agent_schedules ORDER BY name ASC", &[])
            .await?;
        let mut schedules = Vec::with_capacity(rows.len());
        for row in rows {
            schedules.push(row_convert::row_to_schedule(row.as_ref())?);
        }
        Ok(schedules)
    }

    async fn delete_schedule(&self, id: &str) -> Result<bool> {
        let affected = self
            .executor
            .execute(
                "DELETE FROM agent_schedules WHERE id = ?",
                &[SqlParam::text(id)],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn set_schedule_last_run(&self, id: &str, at: &str) -> Result<()> {
        self.executor
            .execute(
                "UPDATE agent_schedules SET last_run_at = ? WHERE id = ?",
                &[SqlParam::text(at), SqlParam::text(id)],
            )
            .await?;
        Ok(())
    }

    async fn upsert_saved_task(&self, task: SavedTask) -> Result<()> {
        self.executor
            .execute(
                "INSERT INTO saved_tasks (id, name, agent, prompt, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     agent = excluded.agent,
                     prompt = excluded.prompt,
                     updated_at = excluded.updated_at",
                &[
                    SqlParam::text(&task.id),
                    SqlParam::text(&task.name),
                    SqlParam::text(&task.agent),
                    SqlParam::text(&task.prompt),
                    SqlParam::text(&task.created_at),
                    SqlParam::text(&task.updated_at),
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_saved_task(&self, id: &str) -> Result<Option<SavedTask>> {
        match self
            .executor
            .query_one(
                "SELECT * FROM saved_tasks WHERE id = ?",
                &[SqlParam::text(id)],
            )
            .await?
        {
            Some(row) => Ok(Some(row_convert::row_to_saved_task(row.as_ref())?)),
            None => Ok(None),
        }
    }

    async fn list_saved_tasks(&self) -> Result<Vec<SavedTask>> {
        let rows = self
            .executor
            .query_all("SELECT * FROM saved_tasks ORDER BY name ASC", &[])
            .await?;
        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            tasks.push(row_convert::row_to_saved_task(row.as_ref())?);
        }
        Ok(tasks)
    }

    async fn delete_saved_task(&self, id: &str) -> Result<bool> {
        let affected = self
            .executor
            .execute(
                "DELETE FROM saved_tasks WHERE id = ?",
                &[SqlParam::text(id)],
            )
            .await?;
        Ok(affected > 0)
    }
}

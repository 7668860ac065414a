//! Agent schedule and saved task repository port.

use async_trait::async_trait;

use crate::entities::{AgentSchedule, SavedTask};
use crate::error::Result;

/// Plain CRUD over schedules and saved tasks.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn upsert_schedule(&self, schedule: AgentSchedule) -> Result<()>;
    async fn get_schedule(&self, id: &str) -> Result<Option<AgentSchedule>>;
    async fn list_schedules(&self) -> Result<Vec<AgentSchedule>>;
    async fn delete_schedule(&self, id: &str) -> Result<bool>;
    async fn set_schedule_last_run(&self, id: &str, at: &str) -> Result<()>;

    async fn upsert_saved_task(&self, task: SavedTask) -> Result<()>;
    async fn get_saved_task(&self, id: &str) -> Result<Option<SavedTask>>;
    async fn list_saved_tasks(&self) -> Result<Vec<SavedTask>>;
    async fn delete_saved_task(&self, id: &str) -> Result<bool>;
}

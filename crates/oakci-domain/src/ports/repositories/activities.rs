//! Activity repository port.

use async_trait::async_trait;

use crate::entities::{Activity, NewActivity};
use crate::error::Result;

/// Persistence for tool-call activities.
///
/// Activities are buffered in memory by the capture service and land here
/// in one transaction per flush.
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Insert a buffered batch of activities for a session, assigning them
    /// to the given prompt batch. One transaction; returns assigned ids in
    /// input order.
    async fn insert_buffered(
        &self,
        activities: Vec<NewActivity>,
        prompt_batch_id: Option<i64>,
    ) -> Result<Vec<i64>>;

    /// Fetch one activity.
    async fn get_activity(&self, id: i64) -> Result<Option<Activity>>;

    /// Activities of a batch in insertion order.
    async fn list_for_batch(&self, batch_id: i64) -> Result<Vec<Activity>>;

    /// Activities of a session in insertion order.
    async fn list_for_session(&self, session_id: &str, limit: usize) -> Result<Vec<Activity>>;

    /// Count activities recorded for a session.
    async fn count_for_session(&self, session_id: &str) -> Result<i64>;

    /// Delete one activity.
    async fn delete_activity(&self, id: i64) -> Result<bool>;
}

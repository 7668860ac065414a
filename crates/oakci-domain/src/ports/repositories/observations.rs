//! Observation and resolution-event repository port.

use async_trait::async_trait;

use crate::entities::{
    MemoryType, Observation, ObservationStatus, ResolutionAction, ResolutionEvent,
};
use crate::error::Result;

/// Input for observation creation. The row is written with
/// `embedded=false`; the vector write happens afterwards and flips the
/// flag on success.
#[derive(Debug, Clone)]
pub struct NewObservation {
    pub id: String,
    pub session_id: String,
    pub prompt_batch_id: Option<i64>,
    pub observation: String,
    pub memory_type: MemoryType,
    pub context: Option<String>,
    pub tags: Vec<String>,
    pub importance: i64,
}

/// Listing filter.
#[derive(Debug, Clone, Default)]
pub struct ObservationFilter {
    pub memory_type: Option<MemoryType>,
    pub status: Option<ObservationStatus>,
    pub session_id: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// Atomic status transition input for `update_observation_status`.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: ObservationStatus,
    pub resolved_by_session_id: Option<String>,
    /// ISO timestamp; must be unset exactly when status is Active.
    pub resolved_at: Option<String>,
    pub superseded_by: Option<String>,
}

impl StatusUpdate {
    /// Transition back to active, clearing every resolution field.
    #[must_use]
    pub fn reactivate() -> Self {
        Self {
            status: ObservationStatus::Active,
            resolved_by_session_id: None,
            resolved_at: None,
            superseded_by: None,
        }
    }
}

/// Persistence for observations and their resolution events.
#[async_trait]
pub trait ObservationRepository: Send + Sync {
    /// Insert an observation with `embedded=false`.
    async fn store_observation(&self, input: NewObservation) -> Result<Observation>;

    /// Fetch one observation.
    async fn get_observation(&self, id: &str) -> Result<Option<Observation>>;

    /// Paginated listing, newest first, with total count.
    async fn list_observations(&self, filter: ObservationFilter)
    -> Result<(Vec<Observation>, usize)>;

    /// Total observation count.
    async fn count_observations(&self) -> Result<i64>;

    /// Observations whose vector copy is missing.
    async fn count_unembedded(&self) -> Result<i64>;

    /// Observations pending a vector write, oldest first.
    async fn list_unembedded(&self, limit: usize) -> Result<Vec<Observation>>;

    /// Flip the embedded flag after a successful vector write.
    async fn mark_embedded(&self, id: &str, embedded: bool) -> Result<()>;

    /// Reset every embedded flag (devtools re-embed).
    async fn reset_embedded_flags(&self) -> Result<u64>;

    /// The only mutation path for status fields. Writes status and all
    /// resolution columns atomically; returns whether a row was affected.
    async fn update_observation_status(&self, id: &str, update: StatusUpdate) -> Result<bool>;

    /// Delete observations, returning how many rows went away.
    async fn delete_observations(&self, ids: &[String]) -> Result<usize>;

    /// Append a resolution event; duplicate content hashes are ignored.
    async fn store_resolution_event(
        &self,
        observation_id: &str,
        action: ResolutionAction,
        resolved_by_session_id: Option<&str>,
        superseded_by: Option<&str>,
        reason: Option<&str>,
        created_at: &str,
        source_machine_id: &str,
        applied: bool,
    ) -> Result<String>;

    /// Creates resolution events for resolved/superseded observations
    /// that predate event logging. Only resolutions performed by this
    /// machine (resolved_by session provenance) are backfilled, and only
    /// once. Returns events created.
    async fn backfill_resolution_events(&self, machine_id: &str) -> Result<usize>;

    /// Unapplied events in `created_at_epoch` ascending order.
    async fn list_unapplied_events(&self) -> Result<Vec<ResolutionEvent>>;

    /// Mark an event applied.
    async fn mark_event_applied(&self, id: &str) -> Result<()>;

    /// Count of unapplied events.
    async fn count_unapplied_events(&self) -> Result<i64>;
}

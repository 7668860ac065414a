//! Prompt batch repository port.

use async_trait::async_trait;

use crate::entities::{PromptBatch, PromptSource, SessionClassification};
use crate::error::Result;

/// Input for batch creation.
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub session_id: String,
    pub user_prompt: String,
    pub source_type: PromptSource,
    pub plan_content: Option<String>,
    pub plan_file_path: Option<String>,
}

/// CRUD and processor queries over prompt batches.
#[async_trait]
pub trait BatchRepository: Send + Sync {
    /// Open a new batch, completing any batch still active for the session
    /// first so the single-active-batch invariant holds.
    async fn start_batch(&self, input: NewBatch) -> Result<PromptBatch>;

    /// The single open batch for a session, if any.
    async fn get_active_prompt_batch(&self, session_id: &str) -> Result<Option<PromptBatch>>;

    /// Fetch one batch.
    async fn get_batch(&self, id: i64) -> Result<Option<PromptBatch>>;

    /// Batches of a session ordered by prompt_number.
    async fn list_for_session(&self, session_id: &str) -> Result<Vec<PromptBatch>>;

    /// Close a batch.
    async fn complete_batch(&self, id: i64) -> Result<bool>;

    /// Close every active batch of a session (used at session end).
    async fn complete_active_batches(&self, session_id: &str) -> Result<usize>;

    /// Store the agent's response summary on the batch.
    async fn set_response_summary(&self, id: i64, summary: &str) -> Result<bool>;

    /// Completed batches not yet consumed by the processor, oldest first.
    async fn list_unprocessed_completed(&self, limit: usize) -> Result<Vec<PromptBatch>>;

    /// Mark a batch consumed; `error` records a processing failure.
    async fn mark_processed(&self, id: i64, error: Option<&str>) -> Result<()>;

    /// Store the processor's classification.
    async fn set_classification(&self, id: i64, classification: SessionClassification)
    -> Result<()>;

    /// Turn a batch into a derived plan.
    async fn store_derived_plan(&self, id: i64, plan_content: &str) -> Result<()>;

    /// Plan/derived-plan batches whose plan is not yet in the vector store.
    async fn list_unembedded_plans(&self) -> Result<Vec<PromptBatch>>;

    /// Flip the plan_embedded flag after a successful vector write.
    async fn mark_plan_embedded(&self, id: i64) -> Result<()>;

    /// Delete a batch and its activities; returns observation ids removed.
    async fn delete_batch(&self, id: i64) -> Result<Vec<String>>;
}

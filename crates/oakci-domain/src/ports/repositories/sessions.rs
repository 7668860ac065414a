//! Session repository port.

use async_trait::async_trait;

use crate::entities::{RelationshipOrigin, Session, SessionRelationship, SessionStats, SessionStatus};
use crate::error::Result;

/// Input for session creation.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub id: String,
    pub agent: String,
    pub project_root: String,
    pub parent_session_id: Option<String>,
    pub parent_session_reason: Option<String>,
    pub transcript_path: Option<String>,
}

/// Listing filter for the browsing UI.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub agent: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// CRUD and derived queries over sessions and their relationships.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Returns the session, creating it when missing. The boolean is true
    /// exactly once per id (idempotent on hook replay).
    async fn get_or_create_session(&self, input: NewSession) -> Result<(Session, bool)>;

    /// Fetch one session.
    async fn get_session(&self, id: &str) -> Result<Option<Session>>;

    /// Paginated listing, newest first.
    async fn list_sessions(&self, filter: SessionFilter) -> Result<(Vec<Session>, usize)>;

    /// Explicit end: status completed + ended_at.
    async fn end_session(&self, id: &str) -> Result<bool>;

    /// Set the generated title.
    async fn set_title(&self, id: &str, title: &str) -> Result<()>;

    /// Set the generated summary.
    async fn set_summary(&self, id: &str, summary: &str) -> Result<()>;

    /// Record the transcript path when the agent reports it.
    async fn set_transcript_path(&self, id: &str, path: &str) -> Result<()>;

    /// Sweep active sessions idle past the timeout to completed; returns
    /// the swept sessions.
    async fn sweep_stale_sessions(&self, timeout_seconds: i64) -> Result<Vec<Session>>;

    /// Delete a session and cascade batches, activities, and observations.
    /// Returns the observation ids removed so the caller can clean the
    /// vector store.
    async fn delete_session(&self, id: &str) -> Result<Vec<String>>;

    /// Bulk per-session counters, one query for the whole id set.
    async fn get_bulk_session_stats(&self, ids: &[String]) -> Result<Vec<SessionStats>>;

    /// Bulk first-prompt previews, one query for the whole id set.
    async fn get_bulk_first_prompts(&self, ids: &[String]) -> Result<Vec<(String, String)>>;

    /// Link two sessions (undirected, idempotent).
    async fn add_relationship(
        &self,
        a: &str,
        b: &str,
        similarity: Option<f64>,
        origin: RelationshipOrigin,
    ) -> Result<()>;

    /// Remove a link.
    async fn remove_relationship(&self, a: &str, b: &str) -> Result<bool>;

    /// All links touching a session.
    async fn list_relationships(&self, session_id: &str) -> Result<Vec<SessionRelationship>>;
}

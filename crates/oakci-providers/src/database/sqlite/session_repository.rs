//! SQLite session repository.

use std::sync::Arc;

use async_trait::async_trait;
use oakci_domain::entities::{RelationshipOrigin, Session, SessionRelationship, SessionStats};
use oakci_domain::error::Result;
use oakci_domain::ports::database::{DatabaseExecutor, SqlParam};
use oakci_domain::ports::repositories::{NewSession, SessionFilter, SessionRepository};
use oakci_domain::utils::mask_id;
use oakci_domain::utils::time::{now_epoch, now_pair};
use tracing::debug;

use super::row_convert;

/// Session persistence over the executor port.
pub struct SqliteSessionRepository {
    executor: Arc<dyn DatabaseExecutor>,
    machine_id: String,
}

impl SqliteSessionRepository {
    /// Create a repository that uses the given executor.
    pub fn new(executor: Arc<dyn DatabaseExecutor>, machine_id: String) -> Self {
        Self {
            executor,
            machine_id,
        }
    }

    fn in_placeholders(count: usize) -> String {
        vec!["?"; count].join(",")
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn get_or_create_session(&self, input: NewSession) -> Result<(Session, bool)> {
        if let Some(existing) = self.get_session(&input.id).await? {
            // Keep last_activity fresh so the stale sweep sees replayed hooks.
            self.executor
                .execute(
                    "UPDATE sessions SET last_activity_epoch = ? WHERE id = ?",
                    &[SqlParam::I64(now_epoch()), SqlParam::text(&input.id)],
                )
                .await?;
            return Ok((existing, false));
        }

        let (now_iso, now_epoch) = now_pair();
        let inserted = self
            .executor
            .execute(
                "INSERT OR IGNORE INTO sessions
                 (id, agent, project_root, started_at, started_at_epoch, status,
                  parent_session_id, parent_session_reason, transcript_path,
                  last_activity_epoch, source_machine_id)
                 VALUES (?, ?, ?, ?, ?, 'active', ?, ?, ?, ?, ?)",
                &[
                    SqlParam::text(&input.id),
                    SqlParam::text(&input.agent),
                    SqlParam::text(&input.project_root),
                    SqlParam::text(&now_iso),
                    SqlParam::I64(now_epoch),
                    SqlParam::opt_text(input.parent_session_id.as_deref()),
                    SqlParam::opt_text(input.parent_session_reason.as_deref()),
                    SqlParam::opt_text(input.transcript_path.as_deref()),
                    SqlParam::I64(now_epoch),
                    SqlParam::text(&self.machine_id),
                ],
            )
            .await?;

        // Re-read instead of assuming the insert landed: a concurrent hook
        // may have won the INSERT OR IGNORE race.
        let session = self.get_session(&input.id).await?.ok_or_else(|| {
            oakci_domain::Error::database(format!("session vanished after insert: {}", input.id))
        })?;
        let created = inserted > 0;
        if created {
            debug!(session = %mask_id(&input.id), agent = %input.agent, "session created");
        }
        Ok((session, created))
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        match self
            .executor
            .query_one(
                "SELECT * FROM sessions WHERE id = ?",
                &[SqlParam::text(id)],
            )
            .await?
        {
            Some(row) => Ok(Some(row_convert::row_to_session(row.as_ref())?)),
            None => Ok(None),
        }
    }

    async fn list_sessions(&self, filter: SessionFilter) -> Result<(Vec<Session>, usize)> {
        let mut sql = String::from("SELECT * FROM sessions WHERE 1=1");
        let mut count_sql = String::from("SELECT COUNT(*) AS n FROM sessions WHERE 1=1");
        let mut params: Vec<SqlParam> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            count_sql.push_str(" AND status = ?");
            params.push(SqlParam::text(status.as_str()));
        }
        if let Some(agent) = &filter.agent {
            sql.push_str(" AND agent = ?");
            count_sql.push_str(" AND agent = ?");
            params.push(SqlParam::text(agent));
        }

        let total = self
            .executor
            .query_one(&count_sql, &params)
            .await?
            .and_then(|r| r.try_get_i64("n").ok().flatten())
            .unwrap_or(0) as usize;

        sql.push_str(" ORDER BY started_at_epoch DESC LIMIT ? OFFSET ?");
        params.push(SqlParam::I64(filter.limit.max(1) as i64));
        params.push(SqlParam::I64(filter.offset as i64));

        let rows = self.executor.query_all(&sql, &params).await?;
        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(row_convert::row_to_session(row.as_ref())?);
        }
        Ok((sessions, total))
    }

    async fn end_session(&self, id: &str) -> Result<bool> {
        let (now_iso, now_epoch) = now_pair();
        let affected = self
            .executor
            .execute(
                "UPDATE sessions
                 SET status = 'completed', ended_at = ?, ended_at_epoch = ?
                 WHERE id = ? AND status = 'active'",
                &[
                    SqlParam::text(&now_iso),
                    SqlParam::I64(now_epoch),
                    SqlParam::text(id),
                ],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn set_title(&self, id: &str, title: &str) -> Result<()> {
        self.executor
            .execute(
                "UPDATE sessions SET title = ? WHERE id = ?",
                &[SqlParam::text(title), SqlParam::text(id)],
            )
            .await?;
        Ok(())
    }

    async fn set_summary(&self, id: &str, summary: &str) -> Result<()> {
        self.executor
            .execute(
                "UPDATE sessions SET summary = ? WHERE id = ?",
                &[SqlParam::text(summary), SqlParam::text(id)],
            )
            .await?;
        Ok(())
    }

    async fn set_transcript_path(&self, id: &str, path: &str) -> Result<()> {
        self.executor
            .execute(
                "UPDATE sessions SET transcript_path = ? WHERE id = ?",
                &[SqlParam::text(path), SqlParam::text(id)],
            )
            .await?;
        Ok(())
    }

    async fn sweep_stale_sessions(&self, timeout_seconds: i64) -> Result<Vec<Session>> {
        let cutoff = now_epoch() - timeout_seconds;
        let rows = self
            .executor
            .query_all(
                "SELECT * FROM sessions
                 WHERE status = 'active' AND last_activity_epoch < ?",
                &[SqlParam::I64(cutoff)],
            )
            .await?;

        let mut swept = Vec::with_capacity(rows.len());
        for row in rows {
            let session = row_convert::row_to_session(row.as_ref())?;
            self.end_session(&session.id).await?;
            swept.push(session);
        }
        if !swept.is_empty() {
            debug!(count = swept.len(), "stale sessions swept to completed");
        }
        Ok(swept)
    }

    async fn delete_session(&self, id: &str) -> Result<Vec<String>> {
        let obs_rows = self
            .executor
            .query_all(
                "SELECT id FROM memory_observations WHERE session_id = ?",
                &[SqlParam::text(id)],
            )
            .await?;
        let mut observation_ids = Vec::with_capacity(obs_rows.len());
        for row in obs_rows {
            observation_ids.push(row.require_string("id")?);
        }

        self.executor
            .execute_batch(vec![
                (
                    "DELETE FROM activities WHERE session_id = ?".to_owned(),
                    vec![SqlParam::text(id)],
                ),
                (
                    "DELETE FROM memory_observations WHERE session_id = ?".to_owned(),
                    vec![SqlParam::text(id)],
                ),
                (
                    "DELETE FROM prompt_batches WHERE session_id = ?".to_owned(),
                    vec![SqlParam::text(id)],
                ),
                (
                    "DELETE FROM session_relationships
                     WHERE session_id_a = ? OR session_id_b = ?"
                        .to_owned(),
                    vec![SqlParam::text(id), SqlParam::text(id)],
                ),
                (
                    "DELETE FROM sessions WHERE id = ?".to_owned(),
                    vec![SqlParam::text(id)],
                ),
            ])
            .await?;
        Ok(observation_ids)
    }

    async fn get_bulk_session_stats(&self, ids: &[String]) -> Result<Vec<SessionStats>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = Self::in_placeholders(ids.len());
        let params: Vec<SqlParam> = ids.iter().map(SqlParam::text).collect();
        let sql = format!(
            "SELECT s.id AS session_id,
                    (SELECT COUNT(*) FROM prompt_batches b WHERE b.session_id = s.id) AS batch_count,
                    (SELECT COUNT(*) FROM activities a WHERE a.session_id = s.id) AS activity_count,
                    (SELECT COUNT(*) FROM memory_observations o WHERE o.session_id = s.id) AS observation_count
             FROM sessions s WHERE s.id IN ({placeholders})"
        );
        let rows = self.executor.query_all(&sql, &params).await?;
        let mut stats = Vec::with_capacity(rows.len());
        for row in rows {
            stats.push(SessionStats {
                session_id: row.require_string("session_id")?,
                batch_count: row.try_get_i64("batch_count")?.unwrap_or(0),
                activity_count: row.try_get_i64("activity_count")?.unwrap_or(0),
                observation_count: row.try_get_i64("observation_count")?.unwrap_or(0),
            });
        }
        Ok(stats)
    }

    async fn get_bulk_first_prompts(&self, ids: &[String]) -> Result<Vec<(String, String)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = Self::in_placeholders(ids.len());
        let params: Vec<SqlParam> = ids.iter().map(SqlParam::text).collect();
        let sql = format!(
            "SELECT session_id, user_prompt FROM prompt_batches
             WHERE session_id IN ({placeholders}) AND prompt_number = (
                 SELECT MIN(prompt_number) FROM prompt_batches inner_b
                 WHERE inner_b.session_id = prompt_batches.session_id
             )"
        );
        let rows = self.executor.query_all(&sql, &params).await?;
        let mut prompts = Vec::with_capacity(rows.len());
        for row in rows {
            prompts.push((
                row.require_string("session_id")?,
                row.require_string("user_prompt")?,
            ));
        }
        Ok(prompts)
    }

    async fn add_relationship(
        &self,
        a: &str,
        b: &str,
        similarity: Option<f64>,
        origin: RelationshipOrigin,
    ) -> Result<()> {
        let (first, second) = SessionRelationship::normalize_pair(a, b);
        let (now_iso, _) = now_pair();
        self.executor
            .execute(
                "INSERT OR IGNORE INTO session_relationships
                 (session_id_a, session_id_b, similarity_score, created_by, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                &[
                    SqlParam::text(first),
                    SqlParam::text(second),
                    SqlParam::opt_f64(similarity),
                    SqlParam::text(origin.as_str()),
                    SqlParam::text(&now_iso),
                ],
            )
            .await?;
        Ok(())
    }

    async fn remove_relationship(&self, a: &str, b: &str) -> Result<bool> {
        let (first, second) = SessionRelationship::normalize_pair(a, b);
        let affected = self
            .executor
            .execute(
                "DELETE FROM session_relationships
                 WHERE session_id_a = ? AND session_id_b = ?",
                &[SqlParam::text(first), SqlParam::text(second)],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn list_relationships(&self, session_id: &str) -> Result<Vec<SessionRelationship>> {
        let rows = self
            .executor
            .query_all(
                "SELECT * FROM session_relationships
                 WHERE session_id_a = ? OR session_id_b = ?
                 ORDER BY created_at DESC",
                &[SqlParam::text(session_id), SqlParam::text(session_id)],
            )
            .await?;
        let mut relationships = Vec::with_capacity(rows.len());
        for row in rows {
            relationships.push(row_convert::row_to_relationship(row.as_ref())?);
        }
        Ok(relationships)
    }
}

//! SQLite observation and resolution-event repository.

use std::sync::Arc;

use async_trait::async_trait;
use oakci_domain::entities::{Observation, ResolutionAction, ResolutionEvent};
use oakci_domain::error::Result;
use oakci_domain::ports::database::{DatabaseExecutor, SqlParam};
use oakci_domain::ports::repositories::{
    NewObservation, ObservationFilter, ObservationRepository, StatusUpdate,
};
use oakci_domain::utils::mask_id;
use oakci_domain::utils::time::{iso_to_epoch, now_iso, now_pair};
use tracing::debug;

use super::row_convert;

/// Observation persistence over the executor port.
pub struct SqliteObservationRepository {
    executor: Arc<dyn DatabaseExecutor>,
}

impl SqliteObservationRepository {
    /// Create a repository that uses the given executor.
    pub fn new(executor: Arc<dyn DatabaseExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ObservationRepository for SqliteObservationRepository {
    async fn store_observation(&self, input: NewObservation) -> Result<Observation> {
        let (now_iso, now_epoch) = now_pair();
        let tags_json = serde_json::to_string(&input.tags)?;
        self.executor
            .execute(
                "INSERT INTO memory_observations
                 (id, session_id, prompt_batch_id, observation, memory_type, context,
                  tags, importance, created_at, created_at_epoch, embedded, status)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 'active')",
                &[
                    SqlParam::text(&input.id),
                    SqlParam::text(&input.session_id),
                    SqlParam::opt_i64(input.prompt_batch_id),
                    SqlParam::text(&input.observation),
                    SqlParam::text(input.memory_type.as_str()),
                    SqlParam::opt_text(input.context.as_deref()),
                    SqlParam::Text(tags_json),
                    SqlParam::I64(input.importance.clamp(1, 10)),
                    SqlParam::text(&now_iso),
                    SqlParam::I64(now_epoch),
                ],
            )
            .await?;
        debug!(observation = %mask_id(&input.id), "observation stored");
        self.get_observation(&input.id).await?.ok_or_else(|| {
            oakci_domain::Error::database(format!("observation vanished after insert: {}", input.id))
        })
    }

    async fn get_observation(&self, id: &str) -> Result<Option<Observation>> {
        match self
            .executor
            .query_one(
                "SELECT * FROM memory_observations WHERE id = ?",
                &[SqlParam::text(id)],
            )
            .await?
        {
            Some(row) => Ok(Some(row_convert::row_to_observation(row.as_ref())?)),
            None => Ok(None),
        }
    }

    async fn list_observations(
        &self,
        filter: ObservationFilter,
    ) -> Result<(Vec<Observation>, usize)> {
        let mut sql = String::from("SELECT * FROM memory_observations WHERE 1=1");
        let mut count_sql = String::from("SELECT COUNT(*) AS n FROM memory_observations WHERE 1=1");
        let mut params: Vec<SqlParam> = Vec::new();

        if let Some(memory_type) = &filter.memory_type {
            sql.push_str(" AND memory_type = ?");
            count_sql.push_str(" AND memory_type = ?");
            params.push(SqlParam::text(memory_type.as_str()));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            count_sql.push_str(" AND status = ?");
            params.push(SqlParam::text(status.as_str()));
        }
        if let Some(session_id) = &filter.session_id {
            sql.push_str(" AND session_id = ?");
            count_sql.push_str(" AND session_id = ?");
            params.push(SqlParam::text(session_id));
        }

        let total = self
            .executor
            .query_one(&count_sql, &params)
            .await?
            .and_then(|r| r.try_get_i64("n").ok().flatten())
            .unwrap_or(0) as usize;

        sql.push_str(" ORDER BY created_at_epoch DESC LIMIT ? OFFSET ?");
        params.push(SqlParam::I64(filter.limit.max(1) as i64));
        params.push(SqlParam::I64(filter.offset as i64));

        let rows = self.executor.query_all(&sql, &params).await?;
        let mut observations = Vec::with_capacity(rows.len());
        for row in rows {
            observations.push(row_convert::row_to_observation(row.as_ref())?);
        }
        Ok((observations, total))
    }

    async fn count_observations(&self) -> Result<i64> {
        Ok(self
            .executor
            .query_one("SELECT COUNT(*) AS n FROM memory_observations", &[])
            .await?
            .and_then(|r| r.try_get_i64("n").ok().flatten())
            .unwrap_or(0))
    }

    async fn count_unembedded(&self) -> Result<i64> {
        Ok(self
            .executor
            .query_one(
                "SELECT COUNT(*) AS n FROM memory_observations WHERE embedded = 0",
                &[],
            )
            .await?
            .and_then(|r| r.try_get_i64("n").ok().flatten())
            .unwrap_or(0))
    }

    async fn list_unembedded(&self, limit: usize) -> Result<Vec<Observation>> {
        let rows = self
            .executor
            .query_all(
                "SELECT * FROM memory_observations WHERE embedded = 0
                 ORDER BY created_at_epoch ASC LIMIT ?",
                &[SqlParam::I64(limit as i64)],
            )
            .await?;
        let mut observations = Vec::with_capacity(rows.len());
        for row in rows {
            observations.push(row_convert::row_to_observation(row.as_ref())?);
        }
        Ok(observations)
    }

    async fn mark_embedded(&self, id: &str, embedded: bool) -> Result<()> {
        self.executor
            .execute(
                "UPDATE memory_observations SET embedded = ? WHERE id = ?",
                &[SqlParam::Bool(embedded), SqlParam::text(id)],
            )
            .await?;
        Ok(())
    }

    async fn reset_embedded_flags(&self) -> Result<u64> {
        self.executor
            .execute("UPDATE memory_observations SET embedded = 0", &[])
            .await
    }

    async fn update_observation_status(&self, id: &str, update: StatusUpdate) -> Result<bool> {
        // Single atomic write for status plus every resolution field keeps
        // the status/resolved_at/superseded_by invariants intact.
        let affected = self
            .executor
            .execute(
                "UPDATE memory_observations
                 SET status = ?, resolved_by_session_id = ?, resolved_at = ?, superseded_by = ?
                 WHERE id = ?",
                &[
                    SqlParam::text(update.status.as_str()),
                    SqlParam::opt_text(update.resolved_by_session_id.as_deref()),
                    SqlParam::opt_text(update.resolved_at.as_deref()),
                    SqlParam::opt_text(update.superseded_by.as_deref()),
                    SqlParam::text(id),
                ],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn delete_observations(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let params: Vec<SqlParam> = ids.iter().map(SqlParam::text).collect();
        let affected = self
            .executor
            .execute(
                &format!("DELETE FROM memory_observations WHERE id IN ({placeholders})"),
                &params,
            )
            .await?;
        Ok(affected as usize)
    }

    #[allow(clippy::too_many_arguments)]
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
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at_epoch = iso_to_epoch(created_at);
        let content_hash = ResolutionEvent::compute_content_hash(
            observation_id,
            action,
            created_at_epoch,
            source_machine_id,
        );
        self.executor
            .execute(
                "INSERT OR IGNORE INTO resolution_events
                 (id, observation_id, action, resolved_by_session_id, superseded_by,
                  reason, created_at, created_at_epoch, source_machine_id, content_hash, applied)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                &[
                    SqlParam::text(&id),
                    SqlParam::text(observation_id),
                    SqlParam::text(action.as_str()),
                    SqlParam::opt_text(resolved_by_session_id),
                    SqlParam::opt_text(superseded_by),
                    SqlParam::opt_text(reason),
                    SqlParam::text(created_at),
                    SqlParam::I64(created_at_epoch),
                    SqlParam::text(source_machine_id),
                    SqlParam::text(&content_hash),
                    SqlParam::Bool(applied),
                ],
            )
            .await?;
        debug!(
            event = %mask_id(&id),
            action = action.as_str(),
            observation = %mask_id(observation_id),
            "resolution event stored"
        );
        Ok(id)
    }

    async fn backfill_resolution_events(&self, machine_id: &str) -> Result<usize> {
        let rows = self
            .executor
            .query_all(
                "SELECT o.id, o.status, o.resolved_by_session_id, o.superseded_by, o.resolved_at
                 FROM memory_observations o
                 JOIN sessions s ON o.resolved_by_session_id = s.id
                 WHERE o.status IN ('resolved', 'superseded')
                   AND s.source_machine_id = ?
                   AND o.id NOT IN (SELECT observation_id FROM resolution_events)",
                &[SqlParam::text(machine_id)],
            )
            .await?;

        let mut created = 0;
        for row in rows {
            let observation_id = row.require_string("id")?;
            let action: ResolutionAction = row
                .require_string("status")?
                .parse()
                .map_err(oakci_domain::Error::database)?;
            let resolved_by = row.try_get_string("resolved_by_session_id")?;
            let superseded_by = row.try_get_string("superseded_by")?;
            let created_at = row
                .try_get_string("resolved_at")?
                .unwrap_or_else(now_iso);

            // Local state is already correct; the event exists purely for
            // other machines to replay.
            self.store_resolution_event(
                &observation_id,
                action,
                resolved_by.as_deref(),
                superseded_by.as_deref(),
                None,
                &created_at,
                machine_id,
                true,
            )
            .await?;
            created += 1;
        }
        if created > 0 {
            debug!(created, "resolution events backfilled");
        }
        Ok(created)
    }

    async fn list_unapplied_events(&self) -> Result<Vec<ResolutionEvent>> {
        let rows = self
            .executor
            .query_all(
                "SELECT * FROM resolution_events WHERE applied = 0
                 ORDER BY created_at_epoch ASC",
                &[],
            )
            .await?;
        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(row_convert::row_to_resolution_event(row.as_ref())?);
        }
        Ok(events)
    }

    async fn mark_event_applied(&self, id: &str) -> Result<()> {
        self.executor
            .execute(
                "UPDATE resolution_events SET applied = 1 WHERE id = ?",
                &[SqlParam::text(id)],
            )
            .await?;
        Ok(())
    }

    async fn count_unapplied_events(&self) -> Result<i64> {
        Ok(self
            .executor
            .query_one(
                "SELECT COUNT(*) AS n FROM resolution_events WHERE applied = 0",
                &[],
            )
            .await?
            .and_then(|r| r.try_get_i64("n").ok().flatten())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use oakci_domain::entities::MemoryType;
    use oakci_domain::ports::repositories::{
        NewObservation, ObservationRepository, StatusUpdate,
    };
    use oakci_domain::utils::time::now_iso;

    use crate::database::SqliteActivityStore;

    async fn store() -> SqliteActivityStore {
        SqliteActivityStore::open_in_memory("test-machine")
            .await
            .expect("in-memory store")
    }

    fn obs(id: &str) -> NewObservation {
        NewObservation {
            id: id.to_owned(),
            session_id: "s1".to_owned(),
            prompt_batch_id: None,
            observation: format!("observation {id}"),
            memory_type: MemoryType::Gotcha,
            context: Some("src/main.rs".to_owned()),
            tags: vec!["auto-extracted".to_owned()],
            importance: 7,
        }
    }

    #[tokio::test]
    async fn status_update_keeps_invariants() {
        let store = store().await;
        let repo = store.observations();
        repo.store_observation(obs("o1")).await.expect("store");

        let stored = repo.get_observation("o1").await.expect("get").expect("some");
        assert!(stored.resolved_at.is_none());
        assert!(!stored.embedded);

        let affected = repo
            .update_observation_status(
                "o1",
                StatusUpdate {
                    status: oakci_domain::entities::ObservationStatus::Superseded,
                    resolved_by_session_id: Some("s2".to_owned()),
                    resolved_at: Some(now_iso()),
                    superseded_by: Some("o2".to_owned()),
                },
            )
            .await
            .expect("update");
        assert!(affected);

        let updated = repo.get_observation("o1").await.expect("get").expect("some");
        assert_eq!(
            updated.status,
            oakci_domain::entities::ObservationStatus::Superseded
        );
        assert!(updated.resolved_at.is_some());
        assert_eq!(updated.superseded_by.as_deref(), Some("o2"));

        // Reactivation clears every resolution field.
        repo.update_observation_status("o1", StatusUpdate::reactivate())
            .await
            .expect("reactivate");
        let reactivated = repo.get_observation("o1").await.expect("get").expect("some");
        assert!(reactivated.resolved_at.is_none());
        assert!(reactivated.superseded_by.is_none());
    }

    #[tokio::test]
    async fn duplicate_resolution_events_are_ignored() {
        let store = store().await;
        let repo = store.observations();
        repo.store_observation(obs("o1")).await.expect("store");

        let at = now_iso();
        for _ in 0..2 {
            repo.store_resolution_event(
                "o1",
                oakci_domain::entities::ResolutionAction::Resolved,
                Some("s1"),
                None,
                None,
                &at,
                "machine-a",
                false,
            )
            .await
            .expect("event");
        }
        assert_eq!(repo.count_unapplied_events().await.expect("count"), 1);
    }
}

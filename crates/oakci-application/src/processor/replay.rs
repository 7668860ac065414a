//! Resolution event replay.
//!
//! Applies unapplied resolution events in chronological order so that
//! observations imported from another machine's backup converge to the
//! same status. Replay never creates new resolution events; that would
//! feed the next replay forever.

use std::sync::Arc;

use oakci_domain::entities::{ObservationStatus, ResolutionAction};
use oakci_domain::error::Result;
use oakci_domain::ports::ObservationRepository;
use oakci_domain::ports::repositories::StatusUpdate;
use oakci_domain::utils::mask_id;
use oakci_domain::utils::time::iso_to_epoch;
use tracing::{debug, info, warn};

use crate::vector_index::VectorIndex;

/// Replays unapplied events; returns how many were applied.
pub async fn replay_unapplied_events(
    observations: &Arc<dyn ObservationRepository>,
    vector_index: Option<&VectorIndex>,
) -> Result<usize> {
    let events = observations.list_unapplied_events().await?;
    if events.is_empty() {
        return Ok(0);
    }

    let mut applied = 0;
    for event in events {
        let Some(target) = observations.get_observation(&event.observation_id).await? else {
            // Not imported yet; leave unapplied for the next replay.
            debug!(
                event = %mask_id(&event.id),
                observation = %mask_id(&event.observation_id),
                "deferring resolution event, target missing"
            );
            continue;
        };

        // Last-writer-wins: an equal-or-newer local resolution stands.
        if let Some(resolved_at) = &target.resolved_at {
            if iso_to_epoch(resolved_at) >= event.created_at_epoch {
                observations.mark_event_applied(&event.id).await?;
                applied += 1;
                debug!(event = %mask_id(&event.id), "skipping stale resolution event");
                continue;
            }
        }

        let update = match event.action {
            ResolutionAction::Reactivated => StatusUpdate::reactivate(),
            ResolutionAction::Resolved => StatusUpdate {
                status: ObservationStatus::Resolved,
                resolved_by_session_id: event.resolved_by_session_id.clone(),
                resolved_at: Some(event.created_at.clone()),
                superseded_by: None,
            },
            ResolutionAction::Superseded => StatusUpdate {
                status: ObservationStatus::Superseded,
                resolved_by_session_id: event.resolved_by_session_id.clone(),
                resolved_at: Some(event.created_at.clone()),
                superseded_by: event.superseded_by.clone(),
            },
        };
        let status_str = update.status.as_str();

        if !observations
            .update_observation_status(&event.observation_id, update)
            .await?
        {
            warn!(
                event = %mask_id(&event.id),
                observation = %mask_id(&event.observation_id),
                "resolution event update affected no rows"
            );
            continue;
        }

        if target.embedded {
            if let Some(index) = vector_index {
                if let Err(e) = index
                    .update_memory_status(&event.observation_id, status_str)
                    .await
                {
                    warn!(event = %mask_id(&event.id), error = %e, "vector status update failed");
                }
            }
        }

        observations.mark_event_applied(&event.id).await?;
        applied += 1;
    }

    if applied > 0 {
        info!(applied, "resolution events replayed");
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oakci_domain::entities::MemoryType;
    use oakci_domain::ports::repositories::NewObservation;
    use oakci_domain::utils::time::{epoch_to_iso, now_epoch};
    use oakci_providers::database::SqliteActivityStore;

    async fn repo() -> Arc<dyn ObservationRepository> {
        let store = SqliteActivityStore::open_in_memory("machine-a")
            .await
            .expect("store");
        Arc::new(store.observations())
    }

    fn obs(id: &str) -> NewObservation {
        NewObservation {
            id: id.to_owned(),
            session_id: "s1".to_owned(),
            prompt_batch_id: None,
            observation: "a fact".to_owned(),
            memory_type: MemoryType::Discovery,
            context: None,
            tags: Vec::new(),
            importance: 5,
        }
    }

    #[tokio::test]
    async fn replay_applies_events_in_order() {
        let repo = repo().await;
        repo.store_observation(obs("o1")).await.expect("store");

        let earlier = epoch_to_iso(now_epoch() - 100);
        repo.store_resolution_event(
            "o1",
            ResolutionAction::Resolved,
            Some("s2"),
            None,
            None,
            &earlier,
            "machine-b",
            false,
        )
        .await
        .expect("event");

        let applied = replay_unapplied_events(&repo, None).await.expect("replay");
        assert_eq!(applied, 1);

        let observation = repo.get_observation("o1").await.expect("get").expect("some");
        assert_eq!(observation.status, ObservationStatus::Resolved);
        assert_eq!(repo.count_unapplied_events().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn last_writer_wins_keeps_newer_local_state() {
        let repo = repo().await;
        repo.store_observation(obs("o1")).await.expect("store");

        // Local resolution now.
        let local_now = epoch_to_iso(now_epoch());
        repo.update_observation_status(
            "o1",
            StatusUpdate {
                status: ObservationStatus::Superseded,
                resolved_by_session_id: Some("s9".to_owned()),
                resolved_at: Some(local_now),
                superseded_by: Some("o2".to_owned()),
            },
        )
        .await
        .expect("local update");

        // A stale remote event from an hour ago.
        let stale = epoch_to_iso(now_epoch() - 3600);
        repo.store_resolution_event(
            "o1",
            ResolutionAction::Reactivated,
            None,
            None,
            None,
            &stale,
            "machine-b",
            false,
        )
        .await
        .expect("event");

        let applied = replay_unapplied_events(&repo, None).await.expect("replay");
        assert_eq!(applied, 1);

        // Target unchanged, event consumed.
        let observation = repo.get_observation("o1").await.expect("get").expect("some");
        assert_eq!(observation.status, ObservationStatus::Superseded);
        assert_eq!(observation.superseded_by.as_deref(), Some("o2"));
    }

    #[tokio::test]
    async fn events_for_missing_observations_are_deferred() {
        let repo = repo().await;
        let at = epoch_to_iso(now_epoch());
        repo.store_resolution_event(
            "ghost",
            ResolutionAction::Resolved,
            None,
            None,
            None,
            &at,
            "machine-b",
            false,
        )
        .await
        .expect("event");

        let applied = replay_unapplied_events(&repo, None).await.expect("replay");
        assert_eq!(applied, 0);
        assert_eq!(repo.count_unapplied_events().await.expect("count"), 1);
    }
}

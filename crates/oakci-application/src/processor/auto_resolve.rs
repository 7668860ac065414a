//! Automatic supersession of semantically equivalent observations.
//!
//! After a new observation lands, similar active observations of the same
//! type are marked superseded so the observation graph stays clean without
//! manual intervention. Context overlap is exact string equality on the
//! context field; observations sharing a context supersede at a looser
//! threshold than strangers.

use std::collections::HashMap;
use std::sync::Arc;

use oakci_domain::constants::processing::auto_resolve_skip_types;
use oakci_domain::entities::{Observation, ObservationStatus, ResolutionAction};
use oakci_domain::error::Result;
use oakci_domain::ports::ObservationRepository;
use oakci_domain::ports::repositories::StatusUpdate;
use oakci_domain::utils::mask_id;
use oakci_domain::utils::time::now_iso;
use oakci_domain::value_objects::AutoResolveConfig;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::vector_index::VectorIndex;

/// Searches for active observations equivalent to `new_obs` and marks
/// them superseded. Returns the superseded ids.
pub async fn auto_resolve_superseded(
    new_obs: &Observation,
    config: &AutoResolveConfig,
    vector_index: &VectorIndex,
    observations: &Arc<dyn ObservationRepository>,
    machine_id: &str,
) -> Result<Vec<String>> {
    if !config.enabled {
        return Ok(Vec::new());
    }
    if auto_resolve_skip_types().contains(&new_obs.memory_type) {
        return Ok(Vec::new());
    }

    let memory_type = new_obs.memory_type.as_str().to_owned();
    let results = match vector_index
        .search_memory(
            &new_obs.observation,
            config.search_limit,
            Some(&[memory_type.as_str()]),
            Some(HashMap::from([("status".to_owned(), json!("active"))])),
        )
        .await
    {
        Ok(results) => results,
        Err(e) => {
            debug!(error = %e, "auto-resolve search failed");
            return Ok(Vec::new());
        }
    };

    let mut superseded = Vec::new();
    let resolved_at = now_iso();

    for hit in results {
        if hit.id == new_obs.id {
            continue;
        }

        let hit_context = hit.meta_str("context").unwrap_or_default();
        let shares_context = match &new_obs.context {
            Some(context) if !context.is_empty() && !hit_context.is_empty() => {
                context == hit_context
            }
            _ => false,
        };
        let threshold = if shares_context {
            config.similarity_threshold
        } else {
            config.similarity_threshold_no_context
        };

        if hit.relevance() < threshold {
            continue;
        }

        let update = StatusUpdate {
            status: ObservationStatus::Superseded,
            resolved_by_session_id: Some(new_obs.session_id.clone()),
            resolved_at: Some(resolved_at.clone()),
            superseded_by: Some(new_obs.id.clone()),
        };
        match observations.update_observation_status(&hit.id, update).await {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!(observation = %hit.id, error = %e, "auto-supersede failed");
                continue;
            }
        }

        if let Err(e) = vector_index.update_memory_status(&hit.id, "superseded").await {
            warn!(observation = %hit.id, error = %e, "vector status update failed");
        }

        // Same created_at as the local write so replay converges.
        observations
            .store_resolution_event(
                &hit.id,
                ResolutionAction::Superseded,
                Some(&new_obs.session_id),
                Some(&new_obs.id),
                None,
                &resolved_at,
                machine_id,
                true,
            )
            .await?;

        info!(
            superseded = %mask_id(&hit.id),
            by = %mask_id(&new_obs.id),
            relevance = hit.relevance(),
            "observation auto-superseded"
        );
        superseded.push(hit.id);
    }

    Ok(superseded)
}

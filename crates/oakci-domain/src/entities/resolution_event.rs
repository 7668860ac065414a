//! Resolution event domain definitions.

use serde::{Deserialize, Serialize};

use crate::utils::hash::sha256_hex;

/// Status transition recorded by a resolution event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionAction {
    /// Observation was resolved.
    Resolved,
    /// Observation was superseded by a newer one.
    Superseded,
    /// Observation was reactivated.
    Reactivated,
}

impl ResolutionAction {
    /// String form stored in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Superseded => "superseded",
            Self::Reactivated => "reactivated",
        }
    }
}

impl std::str::FromStr for ResolutionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resolved" => Ok(Self::Resolved),
            "superseded" => Ok(Self::Superseded),
            "reactivated" => Ok(Self::Reactivated),
            _ => Err(format!("Unknown resolution action: {s}")),
        }
    }
}

/// Append-only record of an observation status transition, replayed on
/// other machines after a backup restore so resolutions converge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionEvent {
    /// Event id (UUID).
    pub id: String,
    /// Target observation.
    pub observation_id: String,
    /// The transition.
    pub action: ResolutionAction,
    /// Session that performed the resolution.
    pub resolved_by_session_id: Option<String>,
    /// Superseding observation for `superseded` events.
    pub superseded_by: Option<String>,
    /// Optional reason.
    pub reason: Option<String>,
    /// ISO timestamp of the transition.
    pub created_at: String,
    /// Epoch shadow for replay ordering.
    pub created_at_epoch: i64,
    /// Machine that performed the resolution.
    pub source_machine_id: String,
    /// Dedupe hash over the identifying fields.
    pub content_hash: String,
    /// Whether the transition has been applied locally.
    pub applied: bool,
}

impl ResolutionEvent {
    /// Content hash deduping duplicate imports of the same event.
    #[must_use]
    pub fn compute_content_hash(
        observation_id: &str,
        action: ResolutionAction,
        created_at_epoch: i64,
        source_machine_id: &str,
    ) -> String {
        sha256_hex(&format!(
            "{observation_id}|{}|{created_at_epoch}|{source_machine_id}",
            action.as_str()
        ))
    }
}

//! Observation domain definitions.

use serde::{Deserialize, Serialize};

/// Kind of a long-lived observation.
///
/// Kinds are validated at the API boundary but stored as strings so new
/// kinds can be introduced via configuration without a migration; unknown
/// values round-trip through [`MemoryType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemoryType {
    /// A surprising behavior worth remembering.
    Gotcha,
    /// A bug and how it was fixed.
    BugFix,
    /// A recorded decision.
    Decision,
    /// A general discovery about the codebase.
    Discovery,
    /// A trade-off that was weighed.
    TradeOff,
    /// A generated session summary.
    SessionSummary,
    /// An indexed plan.
    Plan,
    /// A kind added after this build shipped.
    Other(String),
}

impl MemoryType {
    /// String form stored in the database and vector metadata.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Gotcha => "gotcha",
            Self::BugFix => "bug_fix",
            Self::Decision => "decision",
            Self::Discovery => "discovery",
            Self::TradeOff => "trade_off",
            Self::SessionSummary => "session_summary",
            Self::Plan => "plan",
            Self::Other(s) => s,
        }
    }

    /// The kinds the remember API accepts.
    #[must_use]
    pub fn known() -> &'static [&'static str] {
        &[
            "gotcha",
            "bug_fix",
            "decision",
            "discovery",
            "trade_off",
            "session_summary",
            "plan",
        ]
    }

    /// Whether this kind is one of the known built-ins.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Parses any string, mapping unknown values to [`MemoryType::Other`].
    #[must_use]
    pub fn parse_lossy(s: &str) -> Self {
        match s {
            "gotcha" => Self::Gotcha,
            "bug_fix" => Self::BugFix,
            "decision" => Self::Decision,
            "discovery" => Self::Discovery,
            "trade_off" => Self::TradeOff,
            "session_summary" => Self::SessionSummary,
            "plan" => Self::Plan,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MemoryType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MemoryType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse_lossy(&s))
    }
}

/// Resolution state of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationStatus {
    /// Still current.
    Active,
    /// Manually resolved.
    Resolved,
    /// Replaced by a newer equivalent observation.
    Superseded,
}

impl ObservationStatus {
    /// String form stored in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
            Self::Superseded => "superseded",
        }
    }
}

impl std::str::FromStr for ObservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "resolved" => Ok(Self::Resolved),
            "superseded" => Ok(Self::Superseded),
            _ => Err(format!("Unknown observation status: {s}")),
        }
    }
}

/// A long-lived fact extracted from a session or remembered manually.
///
/// Invariants enforced by the store:
/// `status == Active` iff `resolved_at` is unset, and `superseded_by` is
/// set iff `status == Superseded`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Observation id (UUID).
    pub id: String,
    /// Session that produced it.
    pub session_id: String,
    /// Batch that produced it, when known.
    pub prompt_batch_id: Option<i64>,
    /// The observation text.
    pub observation: String,
    /// Kind of observation.
    pub memory_type: MemoryType,
    /// Context (usually a file path) the observation applies to.
    pub context: Option<String>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Importance 1-10.
    pub importance: i64,
    /// ISO creation timestamp.
    pub created_at: String,
    /// Whether the vector-store copy exists; the sync token between stores.
    pub embedded: bool,
    /// Resolution state.
    pub status: ObservationStatus,
    /// Session that resolved/superseded it.
    pub resolved_by_session_id: Option<String>,
    /// ISO resolution timestamp.
    pub resolved_at: Option<String>,
    /// Newer observation id that superseded this one.
    pub superseded_by: Option<String>,
}

impl Observation {
    /// Rough token estimate (~4 chars per token).
    #[must_use]
    pub fn token_estimate(&self) -> usize {
        self.observation.len() / 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_type_round_trips_unknown_kinds() {
        let parsed = MemoryType::parse_lossy("architecture_note");
        assert_eq!(parsed.as_str(), "architecture_note");
        assert!(!parsed.is_known());
        assert!(MemoryType::parse_lossy("gotcha").is_known());
    }

    #[test]
    fn observation_status_parses() {
        assert_eq!(
            "superseded".parse::<ObservationStatus>().ok(),
            Some(ObservationStatus::Superseded)
        );
        assert!("nope".parse::<ObservationStatus>().is_err());
    }
}

//! Session relationship domain definitions.

use serde::{Deserialize, Serialize};

/// How a session relationship came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipOrigin {
    /// Linked by a user.
    Manual,
    /// Accepted from a similarity suggestion.
    Suggestion,
    /// Linked automatically (parent/child sessions).
    Auto,
}

impl RelationshipOrigin {
    /// String form stored in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Suggestion => "suggestion",
            Self::Auto => "auto",
        }
    }
}

impl std::str::FromStr for RelationshipOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "suggestion" => Ok(Self::Suggestion),
            "auto" => Ok(Self::Auto),
            _ => Err(format!("Unknown relationship origin: {s}")),
        }
    }
}

/// Undirected link between two sessions.
///
/// Stored with `session_id_a < session_id_b` so each pair appears once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRelationship {
    pub session_id_a: String,
    pub session_id_b: String,
    pub similarity_score: Option<f64>,
    pub created_by: RelationshipOrigin,
    pub created_at: String,
}

impl SessionRelationship {
    /// Normalizes a pair into storage order.
    #[must_use]
    pub fn normalize_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
        if a <= b { (a, b) } else { (b, a) }
    }
}

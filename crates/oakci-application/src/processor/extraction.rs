//! Observation extraction from completed batches.
//!
//! Parses the LLM's JSON array response tolerantly (code fences and
//! surrounding prose stripped) and writes each observation relational
//! first, vector second. A vector failure leaves `embedded=false` for the
//! backfill pass; the relational write still counts.

use std::collections::HashMap;
use std::sync::Arc;

use oakci_domain::constants::processing::TAG_AUTO_EXTRACTED;
use oakci_domain::entities::{MemoryType, Observation, SessionClassification};
use oakci_domain::error::Result;
use oakci_domain::ports::repositories::NewObservation;
use oakci_domain::ports::{LlmClient, ObservationRepository};
use serde::Deserialize;
use tracing::{debug, warn};

use super::prompts::PromptTemplate;
use crate::vector_index::VectorIndex;

/// One observation as returned by the extraction prompt.
#[derive(Debug, Deserialize)]
pub struct ExtractedObservation {
    pub observation: String,
    #[serde(rename = "type")]
    pub memory_type: String,
    #[serde(default)]
    pub importance: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// Maps an importance label onto the 1-10 scale.
#[must_use]
pub fn importance_score(label: Option<&str>) -> i64 {
    match label.unwrap_or("medium") {
        "low" => 3,
        "high" => 7,
        "critical" => 9,
        _ => 5,
    }
}

/// Pulls a JSON array out of an LLM response, tolerating code fences and
/// leading/trailing prose.
#[must_use]
pub fn parse_observation_array(response: &str) -> Vec<ExtractedObservation> {
    let trimmed = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let candidate = match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => return Vec::new(),
    };

    match serde_json::from_str::<Vec<ExtractedObservation>>(candidate) {
        Ok(items) => items
            .into_iter()
            .filter(|o| !o.observation.trim().is_empty())
            .collect(),
        Err(e) => {
            debug!(error = %e, "could not parse observation array");
            Vec::new()
        }
    }
}

/// Runs the extraction prompt and stores the results.
///
/// Returns the stored observations (relational ids, which equal the
/// vector ids whenever the vector write succeeded).
#[allow(clippy::too_many_arguments)]
pub async fn extract_and_store(
    llm: &dyn LlmClient,
    template: &PromptTemplate,
    user_prompt: &str,
    activity_lines: &str,
    session_id: &str,
    batch_id: i64,
    classification: SessionClassification,
    observations: &Arc<dyn ObservationRepository>,
    vector_index: &VectorIndex,
) -> Result<Vec<Observation>> {
    let prompt = template.render(&HashMap::from([
        ("user_prompt", user_prompt.to_owned()),
        ("activities", activity_lines.to_owned()),
    ]));
    let response = llm.complete(&prompt).await?;
    let extracted = parse_observation_array(&response);
    if extracted.is_empty() {
        return Ok(Vec::new());
    }

    let mut stored = Vec::with_capacity(extracted.len());
    for item in extracted {
        let importance_label = item.importance.as_deref().unwrap_or("medium").to_owned();
        let tags = vec![
            TAG_AUTO_EXTRACTED.to_owned(),
            format!("importance:{importance_label}"),
            format!("session:{}", classification.as_str()),
        ];
        let observation = store_observation_dual(
            observations,
            vector_index,
            NewObservation {
                id: uuid::Uuid::new_v4().to_string(),
                session_id: session_id.to_owned(),
                prompt_batch_id: Some(batch_id),
                observation: item.observation,
                memory_type: MemoryType::parse_lossy(&item.memory_type),
                context: item.context.filter(|c| !c.is_empty()),
                tags,
                importance: importance_score(Some(&importance_label)),
            },
        )
        .await?;
        stored.push(observation);
    }
    Ok(stored)
}

/// The dual-store write: relational first (source of truth), then the
/// vector copy, flipping `embedded` only on success.
pub async fn store_observation_dual(
    observations: &Arc<dyn ObservationRepository>,
    vector_index: &VectorIndex,
    input: NewObservation,
) -> Result<Observation> {
    let mut observation = observations.store_observation(input).await?;
    match vector_index.add_memory(&observation).await {
        Ok(()) => {
            observations.mark_embedded(&observation.id, true).await?;
            observation.embedded = true;
        }
        Err(e) => {
            warn!(
                observation = %observation.id,
                error = %e,
                "vector write failed, observation left for backfill"
            );
        }
    }
    Ok(observation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_arrays() {
        let response = "Here you go:\n```json\n[{\"observation\": \"uses sqlx\", \"type\": \"discovery\", \"importance\": \"high\"}]\n```";
        let parsed = parse_observation_array(response);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].memory_type, "discovery");
        assert_eq!(importance_score(parsed[0].importance.as_deref()), 7);
    }

    #[test]
    fn garbage_yields_empty() {
        assert!(parse_observation_array("no json here").is_empty());
        assert!(parse_observation_array("[{broken").is_empty());
    }

    #[test]
    fn empty_observations_are_dropped() {
        let response = "[{\"observation\": \"  \", \"type\": \"gotcha\"}]";
        assert!(parse_observation_array(response).is_empty());
    }

    #[test]
    fn importance_scale() {
        assert_eq!(importance_score(Some("low")), 3);
        assert_eq!(importance_score(Some("medium")), 5);
        assert_eq!(importance_score(Some("high")), 7);
        assert_eq!(importance_score(Some("critical")), 9);
        assert_eq!(importance_score(None), 5);
    }
}

//! Search, fetch, and context assembly.
//!
//! Thin retrieval facade the HTTP routes call into. Result shapes here
//! mirror the wire contract; the server layer serializes them as-is.

use std::str::FromStr;
use std::sync::Arc;

use oakci_domain::constants::search::{
    FETCH_IDS_MAX, RESULT_PREVIEW_CHARS, SEARCH_LIMIT_MAX, SEARCH_RELEVANCE_THRESHOLD,
};
use oakci_domain::error::{Error, Result};
use oakci_domain::value_objects::VectorHit;
use serde::{Deserialize, Serialize};

use crate::vector_index::VectorIndex;

/// What to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    All,
    Code,
    Memory,
    Plans,
    Sessions,
}

impl FromStr for SearchType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "code" => Ok(Self::Code),
            "memory" => Ok(Self::Memory),
            "plans" => Ok(Self::Plans),
            "sessions" => Ok(Self::Sessions),
            _ => Err(format!("Unknown search type: {s}")),
        }
    }
}

/// Validated search request.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_search_type")]
    pub search_type: SearchType,
    #[serde(default = "default_threshold")]
    pub relevance_threshold: f32,
    #[serde(default)]
    pub apply_doc_type_weights: bool,
    #[serde(default)]
    pub include_resolved: bool,
}

fn default_limit() -> usize {
    oakci_domain::constants::search::SEARCH_LIMIT_DEFAULT
}

fn default_search_type() -> SearchType {
    SearchType::All
}

fn default_threshold() -> f32 {
    SEARCH_RELEVANCE_THRESHOLD
}

impl SearchRequest {
    /// Boundary validation: non-empty query, 1..=100 limit.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::invalid_argument("query must not be empty"));
        }
        if self.limit < 1 || self.limit > SEARCH_LIMIT_MAX {
            return Err(Error::invalid_argument(format!(
                "limit must be between 1 and {SEARCH_LIMIT_MAX}"
            )));
        }
        if !(0.0..=1.0).contains(&self.relevance_threshold) {
            return Err(Error::invalid_argument(
                "relevance_threshold must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// Confidence bucket derived from relevance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    #[must_use]
    pub fn from_relevance(relevance: f32) -> Self {
        if relevance >= 0.75 {
            Self::High
        } else if relevance >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// One code search result.
#[derive(Debug, Clone, Serialize)]
pub struct CodeResult {
    pub id: String,
    pub chunk_type: String,
    pub name: Option<String>,
    pub filepath: String,
    pub start_line: i64,
    pub end_line: i64,
    pub tokens: i64,
    pub relevance: f32,
    pub confidence: Confidence,
    pub preview: Option<String>,
}

/// One memory search result.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryResult {
    pub id: String,
    pub memory_type: String,
    pub summary: String,
    pub context: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub tokens: i64,
    pub relevance: f32,
    pub confidence: Confidence,
}

/// One plan search result.
#[derive(Debug, Clone, Serialize)]
pub struct PlanResult {
    pub id: String,
    pub title: String,
    pub session_id: String,
    pub tokens: i64,
    pub relevance: f32,
    pub confidence: Confidence,
    pub preview: Option<String>,
}

/// One session search result.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub id: String,
    pub title: Option<String>,
    pub agent: String,
    pub summary_preview: String,
    pub relevance: f32,
    pub confidence: Confidence,
}

/// Combined search response (wire shape).
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub code: Vec<CodeResult>,
    pub memory: Vec<MemoryResult>,
    pub plans: Vec<PlanResult>,
    pub sessions: Vec<SessionResult>,
    pub total_tokens_available: i64,
}

/// Fetch response entry.
#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub id: String,
    pub content: String,
    pub tokens: i64,
}

/// Doc-type multipliers applied when the caller opts in; tests and i18n
/// rank below first-class code.
fn doc_type_weight(doc_type: &str) -> f32 {
    match doc_type {
        "code" => 1.0,
        "docs" => 0.9,
        "config" => 0.8,
        "test" => 0.7,
        "i18n" => 0.5,
        _ => 1.0,
    }
}

fn preview(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let mut end = RESULT_PREVIEW_CHARS.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    Some(text[..end].to_owned())
}

fn parse_tags(hit: &VectorHit) -> Vec<String> {
    hit.meta_str("tags")
        .map(|tags| {
            tags.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Search and fetch over the vector index.
pub struct SearchService {
    vector_index: Arc<VectorIndex>,
}

impl SearchService {
    /// Builds the service.
    #[must_use]
    pub fn new(vector_index: Arc<VectorIndex>) -> Self {
        Self { vector_index }
    }

    /// Combined semantic search across the requested collections.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        request.validate()?;
        let mut response = SearchResponse {
            query: request.query.clone(),
            code: Vec::new(),
            memory: Vec::new(),
            plans: Vec::new(),
            sessions: Vec::new(),
            total_tokens_available: 0,
        };

        if matches!(request.search_type, SearchType::All | SearchType::Code) {
            let hits = self
                .vector_index
                .search_code(&request.query, request.limit)
                .await?;
            for hit in hits {
                let mut relevance = hit.relevance();
                if request.apply_doc_type_weights {
                    relevance *= doc_type_weight(hit.meta_str("doc_type").unwrap_or("code"));
                }
                if relevance < request.relevance_threshold {
                    continue;
                }
                let tokens = hit.meta_i64("token_estimate").unwrap_or(0);
                response.total_tokens_available += tokens;
                response.code.push(CodeResult {
                    id: hit.id.clone(),
                    chunk_type: hit.meta_str("chunk_type").unwrap_or("unknown").to_owned(),
                    name: hit.meta_str("name").filter(|n| !n.is_empty()).map(str::to_owned),
                    filepath: hit.meta_str("filepath").unwrap_or_default().to_owned(),
                    start_line: hit.meta_i64("start_line").unwrap_or(0),
                    end_line: hit.meta_i64("end_line").unwrap_or(0),
                    tokens,
                    relevance,
                    confidence: Confidence::from_relevance(relevance),
                    preview: preview(&hit.document),
                });
            }
        }

        if matches!(request.search_type, SearchType::All | SearchType::Memory) {
            let types: Vec<&str> = oakci_domain::entities::MemoryType::known()
                .iter()
                .copied()
                .filter(|t| *t != "plan")
                .collect();
            let hits = self
                .vector_index
                .search_memory(&request.query, request.limit, Some(&types), None)
                .await?;
            for hit in hits {
                let relevance = hit.relevance();
                if relevance < request.relevance_threshold {
                    continue;
                }
                let status = hit.meta_str("status").unwrap_or("active").to_owned();
                if !request.include_resolved && status != "active" {
                    continue;
                }
                let tokens = hit.meta_i64("token_estimate").unwrap_or(0);
                response.total_tokens_available += tokens;
                response.memory.push(MemoryResult {
                    id: hit.id.clone(),
                    memory_type: hit.meta_str("memory_type").unwrap_or("discovery").to_owned(),
                    summary: hit.document.clone(),
                    context: hit
                        .meta_str("context")
                        .filter(|c| !c.is_empty())
                        .map(str::to_owned),
                    tags: parse_tags(&hit),
                    status,
                    tokens,
                    relevance,
                    confidence: Confidence::from_relevance(relevance),
                });
            }
        }

        if matches!(request.search_type, SearchType::All | SearchType::Plans) {
            let hits = self
                .vector_index
                .search_memory(&request.query, request.limit, Some(&["plan"]), None)
                .await?;
            for hit in hits {
                let relevance = hit.relevance();
                if relevance < request.relevance_threshold {
                    continue;
                }
                let tokens = hit.meta_i64("token_estimate").unwrap_or(0);
                response.total_tokens_available += tokens;
                response.plans.push(PlanResult {
                    id: hit.id.clone(),
                    title: hit.meta_str("title").unwrap_or_default().to_owned(),
                    session_id: hit.meta_str("session_id").unwrap_or_default().to_owned(),
                    tokens,
                    relevance,
                    confidence: Confidence::from_relevance(relevance),
                    preview: preview(&hit.document),
                });
            }
        }

        if matches!(request.search_type, SearchType::All | SearchType::Sessions) {
            let hits = self
                .vector_index
                .search_sessions(&request.query, request.limit)
                .await?;
            for hit in hits {
                let relevance = hit.relevance();
                if relevance < request.relevance_threshold {
                    continue;
                }
                response.sessions.push(SessionResult {
                    id: hit.id.clone(),
                    title: hit
                        .meta_str("title")
                        .filter(|t| !t.is_empty())
                        .map(str::to_owned),
                    agent: hit.meta_str("agent").unwrap_or_default().to_owned(),
                    summary_preview: preview(&hit.document).unwrap_or_default(),
                    relevance,
                    confidence: Confidence::from_relevance(relevance),
                });
            }
        }

        Ok(response)
    }

    /// Fetch full content for up to 20 ids across code and memory.
    pub async fn fetch(&self, ids: &[String]) -> Result<(Vec<FetchResult>, i64)> {
        if ids.is_empty() {
            return Err(Error::invalid_argument("ids must not be empty"));
        }
        if ids.len() > FETCH_IDS_MAX {
            return Err(Error::invalid_argument(format!(
                "at most {FETCH_IDS_MAX} ids per fetch"
            )));
        }

        let hits = self.vector_index.get_by_ids(ids).await?;
        let mut total_tokens = 0;
        let results = hits
            .into_iter()
            .map(|hit| {
                let tokens = (hit.document.len() / 4) as i64;
                total_tokens += tokens;
                FetchResult {
                    id: hit.id,
                    content: hit.document,
                    tokens,
                }
            })
            .collect();
        Ok((results, total_tokens))
    }

    /// Curated context for a task: top code hits and memories inside a
    /// token budget.
    pub async fn context(
        &self,
        task: &str,
        current_files: &[String],
        max_tokens: i64,
    ) -> Result<SearchResponse> {
        let mut query = task.to_owned();
        if !current_files.is_empty() {
            let names: Vec<&str> = current_files
                .iter()
                .map(|f| f.rsplit('/').next().unwrap_or(f))
                .collect();
            query = format!("{query} {}", names.join(" "));
        }

        let full = self
            .search(&SearchRequest {
                query,
                limit: 10,
                search_type: SearchType::All,
                relevance_threshold: SEARCH_RELEVANCE_THRESHOLD,
                apply_doc_type_weights: true,
                include_resolved: false,
            })
            .await?;

        // Trim to the budget, code first, then memories.
        let mut budget = max_tokens;
        let mut trimmed = SearchResponse {
            query: task.to_owned(),
            code: Vec::new(),
            memory: Vec::new(),
            plans: Vec::new(),
            sessions: Vec::new(),
            total_tokens_available: 0,
        };
        for item in full.code {
            if budget - item.tokens < 0 {
                break;
            }
            budget -= item.tokens;
            trimmed.total_tokens_available += item.tokens;
            trimmed.code.push(item);
        }
        for item in full.memory {
            if budget - item.tokens < 0 {
                break;
            }
            budget -= item.tokens;
            trimmed.total_tokens_available += item.tokens;
            trimmed.memory.push(item);
        }
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_validation_boundaries() {
        let base = SearchRequest {
            query: "find".to_owned(),
            limit: 100,
            search_type: SearchType::All,
            relevance_threshold: 0.3,
            apply_doc_type_weights: false,
            include_resolved: false,
        };
        assert!(base.validate().is_ok());

        let mut over = base.clone();
        over.limit = 101;
        assert!(over.validate().is_err());

        let mut empty = base.clone();
        empty.query = "  ".to_owned();
        assert!(empty.validate().is_err());

        let mut zero = base;
        zero.limit = 0;
        assert!(zero.validate().is_err());
    }

    #[test]
    fn confidence_buckets() {
        assert!(matches!(Confidence::from_relevance(0.9), Confidence::High));
        assert!(matches!(
            Confidence::from_relevance(0.6),
            Confidence::Medium
        ));
        assert!(matches!(Confidence::from_relevance(0.2), Confidence::Low));
    }

    #[test]
    fn doc_type_weights_demote_tests() {
        assert!(doc_type_weight("test") < doc_type_weight("code"));
        assert!(doc_type_weight("i18n") < doc_type_weight("test"));
    }
}

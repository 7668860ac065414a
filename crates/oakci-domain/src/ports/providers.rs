//! External provider ports.
//!
//! Contracts for the embedding backends, the vector store, and the
//! summarization LLM the daemon calls out to.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::value_objects::{EmbeddingBatch, VectorHit, VectorRecord};

/// Text embedding generation.
///
/// Implementations skip empty strings and truncate oversized texts before
/// embedding; `embed` on an all-empty input returns an empty batch rather
/// than an error.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name, e.g. `ollama:nomic-embed-text`.
    fn name(&self) -> String;

    /// Configured embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Cached availability probe.
    async fn is_available(&self) -> bool;

    /// Uncached availability probe with a human-readable reason on failure.
    async fn check_availability(&self) -> (bool, String);

    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch>;
}

/// Equality filter over vector metadata: every entry must match.
pub type MetadataFilter = HashMap<String, Value>;

/// Vector storage and similarity search over named collections.
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Create the collection if missing; no-op when it exists.
    async fn ensure_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Drop and recreate a collection at new dimensions.
    async fn recreate_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Recorded dimensions of a collection.
    async fn collection_dimensions(&self, name: &str) -> Result<Option<usize>>;

    /// Insert-or-replace records by id.
    ///
    /// Fails with a dimension-mismatch error (see
    /// [`crate::Error::is_dimension_mismatch`]) when a vector's length
    /// differs from the collection's recorded dimensions.
    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()>;

    /// Similarity search, optionally restricted by a metadata filter.
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorHit>>;

    /// Fetch records by id; missing ids are skipped.
    async fn get_by_ids(&self, collection: &str, ids: &[String]) -> Result<Vec<VectorHit>>;

    /// Delete records by id, returning how many existed.
    async fn delete_by_ids(&self, collection: &str, ids: &[String]) -> Result<usize>;

    /// Delete every record whose metadata field equals the value.
    async fn delete_where(&self, collection: &str, field: &str, value: &Value) -> Result<usize>;

    /// Merge a metadata patch into one record.
    async fn update_metadata(
        &self,
        collection: &str,
        id: &str,
        patch: HashMap<String, Value>,
    ) -> Result<bool>;

    /// Record count.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Count of distinct string values for a metadata field.
    async fn count_distinct(&self, collection: &str, field: &str) -> Result<usize>;

    /// Paginated listing with optional include/exclude metadata filters.
    async fn list(
        &self,
        collection: &str,
        limit: usize,
        offset: usize,
        filter: Option<&MetadataFilter>,
        exclude: Option<&MetadataFilter>,
    ) -> Result<(Vec<VectorHit>, usize)>;
}

/// Chat-completion client used for classification, extraction, summaries,
/// and titles. The daemon never runs the model itself.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model identifier used in requests.
    fn model(&self) -> &str;

    /// Complete a single-prompt request and return the text response.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

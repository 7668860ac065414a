//! Vector store record and search hit shapes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record persisted in a vector collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Record id, unique within the collection.
    pub id: String,
    /// Stored document text (raw code or observation text).
    pub document: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Flat metadata map.
    pub metadata: HashMap<String, Value>,
}

/// One similarity search hit.
#[derive(Debug, Clone)]
pub struct VectorHit {
    /// Record id.
    pub id: String,
    /// Stored document text.
    pub document: String,
    /// Metadata map.
    pub metadata: HashMap<String, Value>,
    /// Cosine distance to the query (0 = identical).
    pub distance: f32,
}

impl VectorHit {
    /// Relevance as `1 - cosine_distance`.
    #[must_use]
    pub fn relevance(&self) -> f32 {
        1.0 - self.distance
    }

    /// String metadata accessor.
    #[must_use]
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Integer metadata accessor.
    #[must_use]
    pub fn meta_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(Value::as_i64)
    }
}

/// Result of one embedding call.
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    /// One vector per non-empty input text.
    pub embeddings: Vec<Vec<f32>>,
    /// Model that produced the vectors.
    pub model: String,
    /// Provider name.
    pub provider: String,
    /// Vector dimensions.
    pub dimensions: usize,
}

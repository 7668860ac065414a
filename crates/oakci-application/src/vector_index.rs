//! Vector index facade.
//!
//! # Overview
//! Single entry point for everything the daemon writes into or reads from
//! the vector store: code chunks, memory observations, plans, and session
//! summaries. Owns the embedding step (through the provider chain), the
//! metadata layout of each collection, and the dimension-mismatch recovery
//! protocol.
//!
//! # Recovery protocol
//! An upsert that fails with a dimension mismatch recreates the collection
//! at the actual embedding size and retries once; a second failure
//! propagates. Deletes are retried with backoff so a relational delete
//! that already succeeded does not leave orphaned vector rows behind.

use std::collections::HashMap;
use std::sync::Arc;

use oakci_domain::constants::paths::{CODE_COLLECTION, MEMORY_COLLECTION, SESSIONS_COLLECTION};
use oakci_domain::constants::search::{
    EMBEDDING_BATCH_SIZE, VECTOR_DELETE_BACKOFF_MS, VECTOR_DELETE_RETRIES,
};
use oakci_domain::entities::{CodeChunk, Observation, PlanDocument, SessionSummaryDocument};
use oakci_domain::error::{Error, Result};
use oakci_domain::ports::providers::MetadataFilter;
use oakci_domain::ports::{EmbeddingProvider, VectorStoreProvider};
use oakci_domain::value_objects::VectorHit;
use oakci_domain::value_objects::VectorRecord;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// Progress callback for batched code upserts: (processed, total).
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Per-collection counts for the status route.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct VectorStats {
    pub code_chunks: usize,
    pub memory_observations: usize,
    pub session_summaries: usize,
}

/// Facade over the embedding chain and the vector store.
pub struct VectorIndex {
    store: Arc<dyn VectorStoreProvider>,
    chain: Arc<dyn EmbeddingProvider>,
}

impl VectorIndex {
    /// Builds the facade; call [`Self::ensure_collections`] before use.
    #[must_use]
    pub fn new(store: Arc<dyn VectorStoreProvider>, chain: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, chain }
    }

    /// Creates the three collections at the chain's configured dimensions.
    pub async fn ensure_collections(&self) -> Result<()> {
        let dims = self.chain.dimensions();
        self.store.ensure_collection(CODE_COLLECTION, dims).await?;
        self.store.ensure_collection(MEMORY_COLLECTION, dims).await?;
        self.store
            .ensure_collection(SESSIONS_COLLECTION, dims)
            .await?;
        Ok(())
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let batch = self.chain.embed(&[text.to_owned()]).await?;
        batch
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("embedding batch was empty"))
    }

    /// Upsert with the recreate-once-and-retry recovery for dimension
    /// mismatches.
    async fn upsert_with_recovery(
        &self,
        collection: &str,
        records: Vec<VectorRecord>,
        actual_dims: usize,
    ) -> Result<()> {
        match self.store.upsert(collection, records.clone()).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_dimension_mismatch() => {
                warn!(
                    collection,
                    dimensions = actual_dims,
                    error = %e,
                    "dimension mismatch, recreating collection"
                );
                self.store.recreate_collection(collection, actual_dims).await?;
                self.store.upsert(collection, records).await
            }
            Err(e) => Err(e),
        }
    }

    // ----- code collection -----

    fn chunk_metadata(chunk: &CodeChunk) -> HashMap<String, Value> {
        HashMap::from([
            ("filepath".to_owned(), json!(chunk.filepath)),
            ("language".to_owned(), json!(chunk.language)),
            ("chunk_type".to_owned(), json!(chunk.chunk_type.as_str())),
            (
                "name".to_owned(),
                json!(chunk.name.clone().unwrap_or_default()),
            ),
            ("start_line".to_owned(), json!(chunk.start_line)),
            ("end_line".to_owned(), json!(chunk.end_line)),
            ("has_docstring".to_owned(), json!(chunk.docstring.is_some())),
            ("token_estimate".to_owned(), json!(chunk.token_estimate())),
            ("doc_type".to_owned(), json!(chunk.doc_type().as_str())),
        ])
    }

    /// Embeds and upserts code chunks in one group.
    pub async fn add_code_chunks(&self, chunks: &[CodeChunk]) -> Result<usize> {
        self.add_code_chunks_batched(chunks, EMBEDDING_BATCH_SIZE, None)
            .await
    }

    /// Embeds and upserts code chunks in fixed-size groups, deduping ids
    /// within the call and reporting progress per group.
    pub async fn add_code_chunks_batched(
        &self,
        chunks: &[CodeChunk],
        batch_size: usize,
        progress: Option<&ProgressCallback>,
    ) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut seen = std::collections::HashSet::new();
        let unique: Vec<&CodeChunk> = chunks.iter().filter(|c| seen.insert(&c.id)).collect();
        if unique.len() < chunks.len() {
            info!(
                total = chunks.len(),
                unique = unique.len(),
                "deduplicated chunk ids before upsert"
            );
        }

        let total = unique.len();
        let mut added = 0;
        for group in unique.chunks(batch_size.max(1)) {
            let texts: Vec<String> = group.iter().map(|c| c.embedding_text()).collect();
            let batch = self.chain.embed(&texts).await?;
            if batch.embeddings.len() != group.len() {
                return Err(Error::embedding(format!(
                    "expected {} embeddings, got {}",
                    group.len(),
                    batch.embeddings.len()
                )));
            }
            let actual_dims = batch
                .embeddings
                .first()
                .map_or(batch.dimensions, Vec::len);

            let records: Vec<VectorRecord> = group
                .iter()
                .zip(batch.embeddings)
                .map(|(chunk, embedding)| VectorRecord {
                    id: chunk.id.clone(),
                    document: chunk.content.clone(),
                    embedding,
                    metadata: Self::chunk_metadata(chunk),
                })
                .collect();

            self.upsert_with_recovery(CODE_COLLECTION, records, actual_dims)
                .await?;
            added += group.len();
            if let Some(callback) = progress {
                callback(added, total);
            }
        }

        debug!(added, "code chunks indexed");
        Ok(added)
    }

    /// Removes every chunk of a file; returns how many went away.
    pub async fn delete_code_by_filepath(&self, filepath: &str) -> Result<usize> {
        self.store
            .delete_where(CODE_COLLECTION, "filepath", &json!(filepath))
            .await
    }

    /// Semantic code search with `relevance = 1 - distance`.
    pub async fn search_code(&self, query: &str, limit: usize) -> Result<Vec<VectorHit>> {
        let embedding = self.embed_one(query).await?;
        self.store
            .query(CODE_COLLECTION, &embedding, limit, None)
            .await
    }

    // ----- memory collection -----

    fn observation_metadata(observation: &Observation) -> HashMap<String, Value> {
        HashMap::from([
            (
                "memory_type".to_owned(),
                json!(observation.memory_type.as_str()),
            ),
            (
                "context".to_owned(),
                json!(observation.context.clone().unwrap_or_default()),
            ),
            ("tags".to_owned(), json!(observation.tags.join(","))),
            ("created_at".to_owned(), json!(observation.created_at)),
            ("status".to_owned(), json!(observation.status.as_str())),
            ("session_id".to_owned(), json!(observation.session_id)),
            ("importance".to_owned(), json!(observation.importance)),
            (
                "token_estimate".to_owned(),
                json!(observation.token_estimate()),
            ),
        ])
    }

    /// Embeds and upserts one observation into the memory collection.
    pub async fn add_memory(&self, observation: &Observation) -> Result<()> {
        let embedding = self.embed_one(&observation.observation).await?;
        let actual_dims = embedding.len();
        let record = VectorRecord {
            id: observation.id.clone(),
            document: observation.observation.clone(),
            embedding,
            metadata: Self::observation_metadata(observation),
        };
        self.upsert_with_recovery(MEMORY_COLLECTION, vec![record], actual_dims)
            .await
    }

    /// Embeds and upserts a plan (memory_type=plan).
    pub async fn add_plan(&self, plan: &PlanDocument) -> Result<()> {
        let embedding = self.embed_one(&plan.embedding_text()).await?;
        let actual_dims = embedding.len();
        let metadata = HashMap::from([
            ("memory_type".to_owned(), json!("plan")),
            (
                "context".to_owned(),
                json!(plan.file_path.clone().unwrap_or_default()),
            ),
            ("session_id".to_owned(), json!(plan.session_id)),
            ("title".to_owned(), json!(plan.title)),
            ("created_at".to_owned(), json!(plan.created_at)),
            ("status".to_owned(), json!("active")),
            ("tags".to_owned(), json!("")),
            (
                "token_estimate".to_owned(),
                json!(plan.content.len() / 4),
            ),
        ]);
        let record = VectorRecord {
            id: plan.id.clone(),
            document: plan.content.clone(),
            embedding,
            metadata,
        };
        self.upsert_with_recovery(MEMORY_COLLECTION, vec![record], actual_dims)
            .await
    }

    /// Memory search with optional type and metadata equality filters.
    pub async fn search_memory(
        &self,
        query: &str,
        limit: usize,
        memory_types: Option<&[&str]>,
        filters: Option<MetadataFilter>,
    ) -> Result<Vec<VectorHit>> {
        let embedding = self.embed_one(query).await?;

        // Single-type filters push down; multi-type filters post-filter.
        let mut filter = filters.unwrap_or_default();
        let mut post_types: Option<Vec<String>> = None;
        match memory_types {
            Some([single]) => {
                filter.insert("memory_type".to_owned(), json!(single));
            }
            Some(types) if !types.is_empty() => {
                post_types = Some(types.iter().map(|t| (*t).to_owned()).collect());
            }
            _ => {}
        }
        let filter = if filter.is_empty() { None } else { Some(&filter) };

        let mut hits = self
            .store
            .query(MEMORY_COLLECTION, &embedding, limit * 2, filter)
            .await?;
        if let Some(types) = post_types {
            hits.retain(|h| {
                h.meta_str("memory_type")
                    .is_some_and(|t| types.iter().any(|x| x == t))
            });
        }
        hits.truncate(limit);
        Ok(hits)
    }

    /// Patches the status metadata of a memory record.
    pub async fn update_memory_status(&self, id: &str, status: &str) -> Result<bool> {
        self.store
            .update_metadata(
                MEMORY_COLLECTION,
                id,
                HashMap::from([("status".to_owned(), json!(status))]),
            )
            .await
    }

    /// Deletes memory records, retrying with backoff so orphaned vector
    /// rows never outlive a relational delete that already committed.
    pub async fn delete_memories(&self, ids: &[String]) -> Result<usize> {
        let mut last_error: Option<Error> = None;
        for attempt in 0..VECTOR_DELETE_RETRIES {
            match self.store.delete_by_ids(MEMORY_COLLECTION, ids).await {
                Ok(removed) => return Ok(removed),
                Err(e) => {
                    warn!(attempt, error = %e, "memory delete failed, retrying");
                    last_error = Some(e);
                    tokio::time::sleep(std::time::Duration::from_millis(
                        VECTOR_DELETE_BACKOFF_MS,
                    ))
                    .await;
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::vector_db("memory delete failed")))
    }

    // ----- session summaries collection -----

    /// Embeds and upserts a session summary document keyed by session id.
    pub async fn add_session_summary(&self, doc: &SessionSummaryDocument) -> Result<()> {
        let embedding = self.embed_one(&doc.embedding_text()).await?;
        let actual_dims = embedding.len();
        let metadata = HashMap::from([
            ("session_id".to_owned(), json!(doc.session_id)),
            (
                "title".to_owned(),
                json!(doc.title.clone().unwrap_or_default()),
            ),
            ("project_root".to_owned(), json!(doc.project_root)),
            ("agent".to_owned(), json!(doc.agent)),
            ("created_at_epoch".to_owned(), json!(doc.created_at_epoch)),
        ]);
        let record = VectorRecord {
            id: doc.session_id.clone(),
            document: doc.summary.clone(),
            embedding,
            metadata,
        };
        self.upsert_with_recovery(SESSIONS_COLLECTION, vec![record], actual_dims)
            .await
    }

    /// Similar-session search (for suggested relationships and the
    /// sessions search type).
    pub async fn search_sessions(&self, query: &str, limit: usize) -> Result<Vec<VectorHit>> {
        let embedding = self.embed_one(query).await?;
        self.store
            .query(SESSIONS_COLLECTION, &embedding, limit, None)
            .await
    }

    /// Deletes a session's summary document if present.
    pub async fn delete_session_summary(&self, session_id: &str) -> Result<()> {
        self.store
            .delete_by_ids(SESSIONS_COLLECTION, &[session_id.to_owned()])
            .await?;
        Ok(())
    }

    /// Fetches records by id across the code and memory collections.
    pub async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<VectorHit>> {
        let mut hits = self.store.get_by_ids(CODE_COLLECTION, ids).await?;
        let found: std::collections::HashSet<String> =
            hits.iter().map(|h| h.id.clone()).collect();
        let remaining: Vec<String> = ids
            .iter()
            .filter(|id| !found.contains(*id))
            .cloned()
            .collect();
        if !remaining.is_empty() {
            hits.extend(self.store.get_by_ids(MEMORY_COLLECTION, &remaining).await?);
        }
        Ok(hits)
    }

    /// Unique indexed files in the code collection.
    pub async fn count_unique_files(&self) -> Result<usize> {
        self.store.count_distinct(CODE_COLLECTION, "filepath").await
    }

    /// Per-collection counts.
    pub async fn stats(&self) -> Result<VectorStats> {
        Ok(VectorStats {
            code_chunks: self.store.count(CODE_COLLECTION).await?,
            memory_observations: self.store.count(MEMORY_COLLECTION).await?,
            session_summaries: self.store.count(SESSIONS_COLLECTION).await?,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-process fakes shared by the application-layer tests.

    use async_trait::async_trait;
    use oakci_domain::error::Result;
    use oakci_domain::ports::EmbeddingProvider;
    use oakci_domain::value_objects::EmbeddingBatch;

    /// Deterministic embedding provider: hashes tokens into a small dense
    /// vector so identical texts embed identically and related texts
    /// (shared words) land close together.
    pub struct HashingEmbedder {
        pub dimensions: usize,
    }

    impl HashingEmbedder {
        pub fn embed_text(&self, text: &str) -> Vec<f32> {
            let mut vector = vec![0.0f32; self.dimensions];
            for token in text.to_lowercase().split_whitespace() {
                let mut h: usize = 5381;
                for b in token.bytes() {
                    h = h.wrapping_mul(33).wrapping_add(b as usize);
                }
                vector[h % self.dimensions] += 1.0;
            }
            let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut vector {
                    *v /= norm;
                }
            }
            vector
        }
    }

    #[async_trait]
    impl EmbeddingProvider for HashingEmbedder {
        fn name(&self) -> String {
            "fake:hashing".to_owned()
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn check_availability(&self) -> (bool, String) {
            (true, "ok".to_owned())
        }

        async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
            Ok(EmbeddingBatch {
                embeddings: texts
                    .iter()
                    .filter(|t| !t.trim().is_empty())
                    .map(|t| self.embed_text(t))
                    .collect(),
                model: "hashing".to_owned(),
                provider: "fake:hashing".to_owned(),
                dimensions: self.dimensions,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use oakci_domain::entities::{ChunkType, CodeChunk};
    use oakci_providers::vector_store::FilesystemVectorStore;

    use super::test_support::HashingEmbedder;
    use super::*;

    fn chunk(filepath: &str, start: usize, content: &str) -> CodeChunk {
        CodeChunk {
            id: CodeChunk::generate_id(filepath, start, content),
            content: content.to_owned(),
            filepath: filepath.to_owned(),
            language: "rust".to_owned(),
            chunk_type: ChunkType::Function,
            name: Some("f".to_owned()),
            start_line: start,
            end_line: start + 1,
            docstring: None,
        }
    }

    async fn index(dir: &std::path::Path, dims: usize) -> VectorIndex {
        let store = Arc::new(FilesystemVectorStore::open(dir).expect("store"));
        let chain = Arc::new(HashingEmbedder { dimensions: dims });
        let index = VectorIndex::new(store, chain);
        index.ensure_collections().await.expect("collections");
        index
    }

    #[tokio::test]
    async fn code_roundtrip_and_filepath_sweep() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index = index(dir.path(), 16).await;

        let chunks = vec![
            chunk("src/a.rs", 1, "fn alpha() { parse tokens }"),
            chunk("src/a.rs", 10, "fn beta() { emit bytes }"),
            chunk("src/b.rs", 1, "fn gamma() { draw pixels }"),
        ];
        let added = index.add_code_chunks(&chunks).await.expect("add");
        assert_eq!(added, 3);

        let hits = index.search_code("parse tokens", 2).await.expect("search");
        assert_eq!(hits[0].meta_str("filepath"), Some("src/a.rs"));

        let removed = index
            .delete_code_by_filepath("src/a.rs")
            .await
            .expect("delete");
        assert_eq!(removed, 2);
        assert_eq!(index.count_unique_files().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn reindexing_unchanged_chunks_is_a_noop_on_counts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index = index(dir.path(), 16).await;
        let chunks = vec![chunk("src/a.rs", 1, "fn alpha() {}")];

        index.add_code_chunks(&chunks).await.expect("add");
        let before = index.stats().await.expect("stats").code_chunks;
        index.add_code_chunks(&chunks).await.expect("add again");
        let after = index.stats().await.expect("stats").code_chunks;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn dimension_change_recreates_collection_and_retries() {
        let dir = tempfile::tempdir().expect("tempdir");
        // Collection created at 16 dims by the first index.
        {
            let index = index(dir.path(), 16).await;
            index
                .add_code_chunks(&[chunk("src/a.rs", 1, "fn alpha() {}")])
                .await
                .expect("add");
        }
        // New chain at 32 dims: upsert must recreate and succeed.
        let store = Arc::new(FilesystemVectorStore::open(dir.path()).expect("store"));
        let chain = Arc::new(HashingEmbedder { dimensions: 32 });
        let index = VectorIndex::new(store.clone(), chain);
        index
            .add_code_chunks(&[chunk("src/b.rs", 1, "fn beta() {}")])
            .await
            .expect("add after dim change");

        assert_eq!(
            store
                .collection_dimensions(CODE_COLLECTION)
                .await
                .expect("dims"),
            Some(32)
        );
        let hits = index.search_code("beta", 5).await.expect("search");
        assert_eq!(hits.len(), 1);
    }
}

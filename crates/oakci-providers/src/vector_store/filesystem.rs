//! Filesystem-persisted vector store.
//!
//! One directory per collection under the store root: `meta.json` records
//! the collection's dimensions, `records.jsonl` holds one record per line.
//! Collections are held fully in memory and searched by brute-force cosine
//! similarity; mutations rewrite the file atomically (tmp + rename).
//! Suited to per-project scale, not to millions of vectors.

use std::collections::{BTreeMap, HashMap};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use oakci_domain::error::{Error, Result};
use oakci_domain::ports::providers::{MetadataFilter, VectorStoreProvider};
use oakci_domain::value_objects::{VectorHit, VectorRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

#[derive(Serialize, Deserialize)]
struct CollectionMeta {
    dimensions: usize,
}

struct Collection {
    dimensions: usize,
    records: BTreeMap<String, VectorRecord>,
}

/// In-process vector store persisted under a directory.
pub struct FilesystemVectorStore {
    root: PathBuf,
    collections: Mutex<HashMap<String, Collection>>,
}

impl FilesystemVectorStore {
    /// Opens the store, loading every existing collection into memory.
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let mut collections = HashMap::new();
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match Self::load_collection(&entry.path()) {
                Ok(collection) => {
                    collections.insert(name, collection);
                }
                Err(e) => {
                    warn!(collection = %name, error = %e, "skipping unreadable collection");
                }
            }
        }
        Ok(Self {
            root: root.to_path_buf(),
            collections: Mutex::new(collections),
        })
    }

    fn load_collection(dir: &Path) -> Result<Collection> {
        let meta_raw = std::fs::read_to_string(dir.join("meta.json"))?;
        let meta: CollectionMeta = serde_json::from_str(&meta_raw)?;
        let mut records = BTreeMap::new();
        let records_path = dir.join("records.jsonl");
        if records_path.exists() {
            for line in std::fs::read_to_string(&records_path)?.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let record: VectorRecord = serde_json::from_str(line)?;
                records.insert(record.id.clone(), record);
            }
        }
        Ok(Collection {
            dimensions: meta.dimensions,
            records,
        })
    }

    fn collection_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn persist(&self, name: &str, collection: &Collection) -> Result<()> {
        let dir = self.collection_dir(name);
        std::fs::create_dir_all(&dir)?;
        let meta = serde_json::to_string(&CollectionMeta {
            dimensions: collection.dimensions,
        })?;
        std::fs::write(dir.join("meta.json"), meta)?;

        let tmp = dir.join("records.jsonl.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            for record in collection.records.values() {
                serde_json::to_writer(&mut file, record)?;
                file.write_all(b"\n")?;
            }
            file.flush()?;
        }
        std::fs::rename(&tmp, dir.join("records.jsonl"))?;
        Ok(())
    }

    fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;
        for (x, y) in a.iter().zip(b.iter()) {
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }
        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }
        1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
    }

    fn matches_filter(record: &VectorRecord, filter: &MetadataFilter) -> bool {
        filter
            .iter()
            .all(|(key, value)| record.metadata.get(key) == Some(value))
    }

    fn hit(record: &VectorRecord, distance: f32) -> VectorHit {
        VectorHit {
            id: record.id.clone(),
            document: record.document.clone(),
            metadata: record.metadata.clone(),
            distance,
        }
    }
}

#[async_trait]
impl VectorStoreProvider for FilesystemVectorStore {
    async fn ensure_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.lock().expect("collections lock");
        if collections.contains_key(name) {
            return Ok(());
        }
        let collection = Collection {
            dimensions,
            records: BTreeMap::new(),
        };
        self.persist(name, &collection)?;
        collections.insert(name.to_owned(), collection);
        info!(collection = name, dimensions, "collection created");
        Ok(())
    }

    async fn recreate_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.lock().expect("collections lock");
        let collection = Collection {
            dimensions,
            records: BTreeMap::new(),
        };
        self.persist(name, &collection)?;
        collections.insert(name.to_owned(), collection);
        info!(collection = name, dimensions, "collection recreated");
        Ok(())
    }

    async fn collection_dimensions(&self, name: &str) -> Result<Option<usize>> {
        let collections = self.collections.lock().expect("collections lock");
        Ok(collections.get(name).map(|c| c.dimensions))
    }

    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()> {
        let mut collections = self.collections.lock().expect("collections lock");
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| Error::vector_db(format!("unknown collection: {collection}")))?;

        for record in &records {
            if record.embedding.len() != entry.dimensions {
                return Err(Error::vector_db(format!(
                    "dimension mismatch in collection {collection}: expected {}, got {}",
                    entry.dimensions,
                    record.embedding.len()
                )));
            }
        }
        for record in records {
            entry.records.insert(record.id.clone(), record);
        }
        self.persist(collection, entry)
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorHit>> {
        let collections = self.collections.lock().expect("collections lock");
        let entry = collections
            .get(collection)
            .ok_or_else(|| Error::vector_db(format!("unknown collection: {collection}")))?;

        let mut hits: Vec<VectorHit> = entry
            .records
            .values()
            .filter(|r| filter.is_none_or(|f| Self::matches_filter(r, f)))
            .map(|r| Self::hit(r, Self::cosine_distance(embedding, &r.embedding)))
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get_by_ids(&self, collection: &str, ids: &[String]) -> Result<Vec<VectorHit>> {
        let collections = self.collections.lock().expect("collections lock");
        let entry = collections
            .get(collection)
            .ok_or_else(|| Error::vector_db(format!("unknown collection: {collection}")))?;
        Ok(ids
            .iter()
            .filter_map(|id| entry.records.get(id))
            .map(|r| Self::hit(r, 0.0))
            .collect())
    }

    async fn delete_by_ids(&self, collection: &str, ids: &[String]) -> Result<usize> {
        let mut collections = self.collections.lock().expect("collections lock");
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| Error::vector_db(format!("unknown collection: {collection}")))?;
        let mut removed = 0;
        for id in ids {
            if entry.records.remove(id).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            self.persist(collection, entry)?;
        }
        Ok(removed)
    }

    async fn delete_where(&self, collection: &str, field: &str, value: &Value) -> Result<usize> {
        let mut collections = self.collections.lock().expect("collections lock");
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| Error::vector_db(format!("unknown collection: {collection}")))?;
        let before = entry.records.len();
        entry
            .records
            .retain(|_, r| r.metadata.get(field) != Some(value));
        let removed = before - entry.records.len();
        if removed > 0 {
            self.persist(collection, entry)?;
        }
        Ok(removed)
    }

    async fn update_metadata(
        &self,
        collection: &str,
        id: &str,
        patch: HashMap<String, Value>,
    ) -> Result<bool> {
        let mut collections = self.collections.lock().expect("collections lock");
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| Error::vector_db(format!("unknown collection: {collection}")))?;
        let Some(record) = entry.records.get_mut(id) else {
            return Ok(false);
        };
        record.metadata.extend(patch);
        self.persist(collection, entry)?;
        Ok(true)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.lock().expect("collections lock");
        Ok(collections
            .get(collection)
            .map_or(0, |c| c.records.len()))
    }

    async fn count_distinct(&self, collection: &str, field: &str) -> Result<usize> {
        let collections = self.collections.lock().expect("collections lock");
        let Some(entry) = collections.get(collection) else {
            return Ok(0);
        };
        let distinct: std::collections::HashSet<&str> = entry
            .records
            .values()
            .filter_map(|r| r.metadata.get(field).and_then(Value::as_str))
            .collect();
        Ok(distinct.len())
    }

    async fn list(
        &self,
        collection: &str,
        limit: usize,
        offset: usize,
        filter: Option<&MetadataFilter>,
        exclude: Option<&MetadataFilter>,
    ) -> Result<(Vec<VectorHit>, usize)> {
        let collections = self.collections.lock().expect("collections lock");
        let entry = collections
            .get(collection)
            .ok_or_else(|| Error::vector_db(format!("unknown collection: {collection}")))?;

        let matching: Vec<&VectorRecord> = entry
            .records
            .values()
            .filter(|r| filter.is_none_or(|f| Self::matches_filter(r, f)))
            .filter(|r| {
                exclude.is_none_or(|f| {
                    !f.iter().any(|(key, value)| r.metadata.get(key) == Some(value))
                })
            })
            .collect();
        let total = matching.len();
        let hits = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|r| Self::hit(r, 0.0))
            .collect();
        Ok((hits, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, embedding: Vec<f32>, filepath: &str) -> VectorRecord {
        let mut metadata = HashMap::new();
        metadata.insert("filepath".to_owned(), Value::String(filepath.to_owned()));
        VectorRecord {
            id: id.to_owned(),
            document: format!("doc {id}"),
            embedding,
            metadata,
        }
    }

    #[tokio::test]
    async fn upsert_query_and_delete_where() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FilesystemVectorStore::open(dir.path()).expect("open");
        store.ensure_collection("code", 3).await.expect("ensure");

        store
            .upsert(
                "code",
                vec![
                    record("a", vec![1.0, 0.0, 0.0], "src/a.rs"),
                    record("b", vec![0.0, 1.0, 0.0], "src/b.rs"),
                    record("a2", vec![0.9, 0.1, 0.0], "src/a.rs"),
                ],
            )
            .await
            .expect("upsert");

        let hits = store
            .query("code", &[1.0, 0.0, 0.0], 2, None)
            .await
            .expect("query");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert!(hits[0].relevance() > hits[1].relevance());

        let removed = store
            .delete_where("code", "filepath", &Value::String("src/a.rs".to_owned()))
            .await
            .expect("delete");
        assert_eq!(removed, 2);
        assert_eq!(store.count("code").await.expect("count"), 1);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FilesystemVectorStore::open(dir.path()).expect("open");
        store.ensure_collection("code", 3).await.expect("ensure");

        let err = store
            .upsert("code", vec![record("a", vec![1.0, 0.0], "src/a.rs")])
            .await
            .err()
            .expect("err");
        assert!(err.is_dimension_mismatch());
    }

    #[tokio::test]
    async fn collections_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let store = FilesystemVectorStore::open(dir.path()).expect("open");
            store.ensure_collection("memory", 2).await.expect("ensure");
            store
                .upsert("memory", vec![record("m1", vec![0.5, 0.5], "ctx")])
                .await
                .expect("upsert");
        }
        let reopened = FilesystemVectorStore::open(dir.path()).expect("reopen");
        assert_eq!(reopened.count("memory").await.expect("count"), 1);
        assert_eq!(
            reopened
                .collection_dimensions("memory")
                .await
                .expect("dims"),
            Some(2)
        );
    }

    #[tokio::test]
    async fn recreate_resets_records_and_dimensions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FilesystemVectorStore::open(dir.path()).expect("open");
        store.ensure_collection("code", 3).await.expect("ensure");
        store
            .upsert("code", vec![record("a", vec![1.0, 0.0, 0.0], "src/a.rs")])
            .await
            .expect("upsert");

        store.recreate_collection("code", 4).await.expect("recreate");
        assert_eq!(store.count("code").await.expect("count"), 0);
        assert_eq!(
            store.collection_dimensions("code").await.expect("dims"),
            Some(4)
        );
    }
}

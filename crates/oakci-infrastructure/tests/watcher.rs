//! File watcher integration tests.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use oakci_application::indexing::IndexingService;
use oakci_application::vector_index::VectorIndex;
use oakci_domain::error::Result;
use oakci_domain::ports::EmbeddingProvider;
use oakci_domain::value_objects::{EmbeddingBatch, IndexStatus, WatcherConfig};
use oakci_infrastructure::watcher::FileWatcher;
use oakci_providers::vector_store::FilesystemVectorStore;

struct ConstantEmbedder;

#[async_trait]
impl EmbeddingProvider for ConstantEmbedder {
    fn name(&self) -> String {
        "fake:constant".to_owned()
    }

    fn dimensions(&self) -> usize {
        8
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
                .map(|t| {
                    let mut v = vec![0.1f32; 8];
                    v[0] = (t.len() % 7) as f32 + 0.1;
                    v
                })
                .collect(),
            model: "constant".to_owned(),
            provider: "fake:constant".to_owned(),
            dimensions: 8,
        })
    }
}

async fn indexing_service(
    project: &std::path::Path,
    store_dir: &std::path::Path,
) -> Arc<IndexingService> {
    let store = Arc::new(FilesystemVectorStore::open(store_dir).expect("store"));
    let chain: Arc<dyn EmbeddingProvider> = Arc::new(ConstantEmbedder);
    let index = Arc::new(VectorIndex::new(store, chain));
    index.ensure_collections().await.expect("collections");
    Arc::new(
        IndexingService::new(
            project.to_path_buf(),
            index,
            &[],
            Arc::new(RwLock::new(IndexStatus::default())),
        )
        .expect("indexing"),
    )
}

/// A burst of created files is coalesced into a single indexing pass
/// that covers all of them.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn debounce_coalesces_a_burst_into_one_pass() {
    let project = tempfile::tempdir().expect("project");
    let store_dir = tempfile::tempdir().expect("store");
    let indexing = indexing_service(project.path(), store_dir.path()).await;

    let config = WatcherConfig {
        enabled: true,
        debounce_seconds: 0.3,
        min_reindex_interval_seconds: 0.0,
    };
    let Some(mut watcher) = FileWatcher::start(
        Arc::clone(&indexing),
        project.path().to_path_buf(),
        &config,
        tokio::runtime::Handle::current(),
    ) else {
        // OS event backend unavailable in this environment; the daemon
        // treats this as watcher-disabled, and so does the test.
        return;
    };

    // Three files within 200ms.
    for name in ["a.go", "b.go", "c.go"] {
        std::fs::write(
            project.path().join(name),
            format!("package main\n\nfunc {}() {{}}\n", name.replace(".go", "")),
        )
        .expect("write");
        tokio::time::sleep(Duration::from_millis(60)).await;
    }

    // Wait out the debounce window plus processing time.
    tokio::time::sleep(Duration::from_secs(2)).await;

    let status = indexing.status();
    let file_count = status.read().expect("status").file_count;
    assert_eq!(file_count, 3);
    assert_eq!(watcher.pending_count(), 0);

    // Deleting one file sweeps its chunks on the next fire.
    std::fs::remove_file(project.path().join("b.go")).expect("rm");
    tokio::time::sleep(Duration::from_secs(2)).await;
    let file_count = status.read().expect("status").file_count;
    assert_eq!(file_count, 2);

    watcher.stop();
}

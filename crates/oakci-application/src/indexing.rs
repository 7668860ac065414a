//! Incremental code indexer.
//!
//! Walks the project, chunks each file (structurally where a grammar
//! exists, line-based otherwise), and upserts chunks through the vector
//! index in fixed-size batches. Shares its filter predicate with the file
//! watcher so the two always agree on what is indexable.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use globset::{Glob, GlobSet, GlobSetBuilder};
use oakci_domain::entities::CodeChunk;
use oakci_domain::error::{Error, Result};
use oakci_domain::utils::time::now_iso;
use oakci_domain::value_objects::{IndexReport, IndexState, IndexStatus};
use oakci_providers::chunking::{ChunkStrategy, LineChunkingConfig, chunk_file, languages};
use tracing::{debug, info, warn};

use crate::vector_index::VectorIndex;

/// Directory names never walked, on top of gitignore rules.
const DEFAULT_IGNORES: &[&str] = &[
    "**/node_modules/**",
    "**/target/**",
    "**/.git/**",
    "**/.oak/**",
    "**/dist/**",
    "**/build/**",
    "**/__pycache__/**",
    "**/.venv/**",
    "**/venv/**",
];

/// Walks and indexes the project into the code collection.
pub struct IndexingService {
    project_root: PathBuf,
    vector_index: Arc<VectorIndex>,
    ignore_set: GlobSet,
    line_config: LineChunkingConfig,
    status: Arc<RwLock<IndexStatus>>,
}

impl IndexingService {
    /// Builds the service. `extra_ignores` come from configuration.
    pub fn new(
        project_root: PathBuf,
        vector_index: Arc<VectorIndex>,
        extra_ignores: &[String],
        status: Arc<RwLock<IndexStatus>>,
    ) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in DEFAULT_IGNORES.iter().copied().chain(extra_ignores.iter().map(String::as_str)) {
            let glob = Glob::new(pattern)
                .map_err(|e| Error::config(format!("bad ignore pattern {pattern}: {e}")))?;
            builder.add(glob);
        }
        let ignore_set = builder
            .build()
            .map_err(|e| Error::config(format!("could not build ignore set: {e}")))?;
        Ok(Self {
            project_root,
            vector_index,
            ignore_set,
            line_config: LineChunkingConfig::default(),
            status,
        })
    }

    /// Shared filter predicate: extension allowlist plus ignore globs.
    /// The watcher uses the same predicate for consistency with builds.
    #[must_use]
    pub fn should_index(&self, path: &Path) -> bool {
        if !languages::is_indexable(path) {
            return false;
        }
        let relative = path.strip_prefix(&self.project_root).unwrap_or(path);
        !self.ignore_set.is_match(relative)
    }

    /// The live status handle.
    #[must_use]
    pub fn status(&self) -> Arc<RwLock<IndexStatus>> {
        Arc::clone(&self.status)
    }

    /// Project-relative path string for chunk ids.
    fn relative_str(&self, path: &Path) -> String {
        path.strip_prefix(&self.project_root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn discover_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let walker = ignore::WalkBuilder::new(&self.project_root)
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .build();
        for entry in walker.flatten() {
            let path = entry.path();
            if path.is_file() && self.should_index(path) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        files
    }

    /// Full index build. Fails fast with Conflict when a build is already
    /// running.
    pub async fn build_index(&self) -> Result<IndexReport> {
        {
            let mut status = self.status.write().expect("index status lock");
            if status.is_indexing() {
                return Err(Error::conflict("index rebuild already in progress"));
            }
            *status = IndexStatus {
                status: IndexState::Indexing,
                ..status.clone()
            };
        }

        let result = self.build_index_inner().await;
        let mut status = self.status.write().expect("index status lock");
        match &result {
            Ok(report) => {
                status.status = IndexState::Completed;
                status.last_indexed = Some(now_iso());
                status.duration_seconds = Some(report.duration_seconds);
                status.ast_stats = report.ast_stats;
            }
            Err(_) => status.status = IndexState::Failed,
        }
        result
    }

    async fn build_index_inner(&self) -> Result<IndexReport> {
        let start = Instant::now();
        let files = self.discover_files();
        let total = files.len();
        info!(files = total, "index build starting");

        {
            let mut status = self.status.write().expect("index status lock");
            status.progress = 0;
            status.total = total;
        }

        let mut report = IndexReport::default();
        let mut all_chunks: Vec<CodeChunk> = Vec::new();

        for (i, path) in files.iter().enumerate() {
            match self.chunk_one(path) {
                Ok((chunks, strategy)) => {
                    match strategy {
                        ChunkStrategy::Ast => report.ast_stats.ast_success += 1,
                        ChunkStrategy::AstFallback => report.ast_stats.ast_fallback += 1,
                        ChunkStrategy::LineBased => report.ast_stats.line_based += 1,
                    }
                    all_chunks.extend(chunks);
                    report.files_processed += 1;
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "failed to chunk file");
                }
            }
            if i % 50 == 0 {
                self.status.write().expect("index status lock").progress = i;
            }
        }

        let status_handle = Arc::clone(&self.status);
        let progress: crate::vector_index::ProgressCallback = Box::new(move |done, total| {
            let mut status = status_handle.write().expect("index status lock");
            status.progress = done;
            status.total = total;
        });
        report.chunks_indexed = self
            .vector_index
            .add_code_chunks_batched(
                &all_chunks,
                oakci_domain::constants::search::EMBEDDING_BATCH_SIZE,
                Some(&progress),
            )
            .await?;

        report.duration_seconds = start.elapsed().as_secs_f64();
        let file_count = self.vector_index.count_unique_files().await.unwrap_or(0);
        {
            let mut status = self.status.write().expect("index status lock");
            status.progress = total;
            status.file_count = file_count;
        }
        info!(
            files = report.files_processed,
            chunks = report.chunks_indexed,
            duration = report.duration_seconds,
            "index build complete"
        );
        Ok(report)
    }

    fn chunk_one(&self, path: &Path) -> Result<(Vec<CodeChunk>, ChunkStrategy)> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::internal(format!("failed to read {}: {e}", path.display())))?;
        let relative = self.relative_str(path);
        Ok(chunk_file(&relative, &content, &self.line_config))
    }

    /// Re-chunks and upserts one file; returns the chunk count.
    pub async fn index_single_file(&self, path: &Path) -> Result<usize> {
        if !self.should_index(path) {
            return Ok(0);
        }
        let (chunks, _) = self.chunk_one(path)?;

        // Stale chunks from earlier versions of the file go away first.
        let relative = self.relative_str(path);
        self.vector_index.delete_code_by_filepath(&relative).await?;
        let added = self.vector_index.add_code_chunks(&chunks).await?;
        debug!(file = %relative, chunks = added, "file re-indexed");
        Ok(added)
    }

    /// Removes every chunk of a file; returns how many went away.
    pub async fn remove_file(&self, path: &Path) -> Result<usize> {
        let relative = self.relative_str(path);
        let removed = self.vector_index.delete_code_by_filepath(&relative).await?;
        debug!(file = %relative, removed, "file removed from index");
        Ok(removed)
    }

    /// Refreshes the unique-file counter on the status block.
    pub async fn refresh_file_count(&self) {
        if let Ok(count) = self.vector_index.count_unique_files().await {
            self.status.write().expect("index status lock").file_count = count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oakci_providers::vector_store::FilesystemVectorStore;

    use crate::vector_index::test_support::HashingEmbedder;

    async fn service(project: &Path, store_dir: &Path) -> IndexingService {
        let store = Arc::new(FilesystemVectorStore::open(store_dir).expect("store"));
        let chain = Arc::new(HashingEmbedder { dimensions: 16 });
        let index = Arc::new(VectorIndex::new(store, chain));
        index.ensure_collections().await.expect("collections");
        IndexingService::new(
            project.to_path_buf(),
            index,
            &[],
            Arc::new(RwLock::new(IndexStatus::default())),
        )
        .expect("service")
    }

    #[tokio::test]
    async fn build_indexes_project_files() {
        let project = tempfile::tempdir().expect("project");
        let store_dir = tempfile::tempdir().expect("store");
        std::fs::create_dir_all(project.path().join("src")).expect("mkdir");
        std::fs::write(
            project.path().join("src/lib.rs"),
            "fn alpha() {\n    let x = 1;\n}\n\nfn beta() {\n    let y = 2;\n}\n",
        )
        .expect("write");
        std::fs::write(project.path().join("README.md"), "# readme\n\nsome docs\n")
            .expect("write");
        std::fs::write(project.path().join("binary.bin"), "xx").expect("write");

        let service = service(project.path(), store_dir.path()).await;
        let report = service.build_index().await.expect("build");

        assert_eq!(report.files_processed, 2);
        assert!(report.chunks_indexed >= 3);
        assert_eq!(report.ast_stats.ast_success, 1);
        assert_eq!(report.ast_stats.line_based, 1);

        let status = service.status();
        let status = status.read().expect("status");
        assert_eq!(status.status, IndexState::Completed);
        assert_eq!(status.file_count, 2);
    }

    #[tokio::test]
    async fn ignored_directories_are_skipped() {
        let project = tempfile::tempdir().expect("project");
        let store_dir = tempfile::tempdir().expect("store");
        std::fs::create_dir_all(project.path().join("node_modules/pkg")).expect("mkdir");
        std::fs::write(project.path().join("node_modules/pkg/index.js"), "x()\n").expect("write");
        std::fs::write(project.path().join("main.js"), "function f() { return 1 }\n")
            .expect("write");

        let service = service(project.path(), store_dir.path()).await;
        let report = service.build_index().await.expect("build");
        assert_eq!(report.files_processed, 1);
    }

    #[tokio::test]
    async fn single_file_reindex_replaces_stale_chunks() {
        let project = tempfile::tempdir().expect("project");
        let store_dir = tempfile::tempdir().expect("store");
        let file = project.path().join("app.py");
        std::fs::write(&file, "def one():\n    return 1\n").expect("write");

        let service = service(project.path(), store_dir.path()).await;
        service.build_index().await.expect("build");

        std::fs::write(&file, "def two():\n    return 2\n").expect("rewrite");
        let added = service.index_single_file(&file).await.expect("reindex");
        assert!(added >= 1);

        let hits = service
            .vector_index
            .search_code("def two", 5)
            .await
            .expect("search");
        assert!(hits.iter().any(|h| h.document.contains("def two")));
        assert!(!hits.iter().any(|h| h.document.contains("def one")));
    }

    #[tokio::test]
    async fn remove_file_sweeps_every_chunk() {
        let project = tempfile::tempdir().expect("project");
        let store_dir = tempfile::tempdir().expect("store");
        let file = project.path().join("gone.go");
        std::fs::write(&file, "func a() {}\n\nfunc b() {}\n").expect("write");

        let service = service(project.path(), store_dir.path()).await;
        service.build_index().await.expect("build");
        std::fs::remove_file(&file).expect("rm");

        let removed = service.remove_file(&file).await.expect("remove");
        assert!(removed >= 1);
        assert_eq!(
            service
                .vector_index
                .count_unique_files()
                .await
                .expect("count"),
            0
        );
    }
}

//! Index build status shared between the indexing service, the watcher,
//! and the status route.

use serde::{Deserialize, Serialize};

/// Coarse state of the code index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// No index build has run yet.
    #[default]
    Idle,
    /// A build is in progress.
    Indexing,
    /// The last build completed.
    Completed,
    /// The last build failed.
    Failed,
}

/// Chunking strategy counters for one build.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AstStats {
    /// Files chunked structurally.
    pub ast_success: usize,
    /// Files where parsing failed and line chunking took over.
    pub ast_fallback: usize,
    /// Files chunked line-based from the start.
    pub line_based: usize,
}

/// Live progress of the current or last index build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStatus {
    /// Current state.
    pub status: IndexState,
    /// Files processed so far.
    pub progress: usize,
    /// Total files in the current build.
    pub total: usize,
    /// Unique files known to the index.
    pub file_count: usize,
    /// Chunking strategy counters.
    pub ast_stats: AstStats,
    /// ISO timestamp of the last completed build.
    pub last_indexed: Option<String>,
    /// Duration of the last completed build.
    pub duration_seconds: Option<f64>,
}

impl IndexStatus {
    /// Whether a build is currently running.
    #[must_use]
    pub fn is_indexing(&self) -> bool {
        self.status == IndexState::Indexing
    }
}

/// Summary of one completed index build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexReport {
    /// Files read and chunked.
    pub files_processed: usize,
    /// Chunks upserted into the vector store.
    pub chunks_indexed: usize,
    /// Wall-clock duration.
    pub duration_seconds: f64,
    /// Strategy counters.
    pub ast_stats: AstStats,
}

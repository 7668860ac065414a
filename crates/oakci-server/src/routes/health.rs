//! Health, status, and log routes.

use std::path::Path;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use oakci_domain::constants::{SCHEMA_VERSION, VERSION};
use oakci_infrastructure::state::DaemonState;
use serde_json::{Value, json};

use crate::error::ApiResult;
use crate::models::{HealthResponse, LogsQuery};

/// `GET /api/health` - liveness, exempt from auth.
pub async fn health(State(state): State<Arc<DaemonState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_owned(),
        oak_version: VERSION.to_owned(),
        schema_version: SCHEMA_VERSION,
        uptime_seconds: state.uptime_seconds(),
        project_root: state.paths.project_root().to_string_lossy().into_owned(),
    })
}

fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                dir_size(&path)
            } else {
                entry.metadata().map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}

fn format_mb(bytes: u64) -> String {
    format!("{:.1}", bytes as f64 / (1024.0 * 1024.0))
}

/// `GET /api/status` - the full dashboard status block.
pub async fn status(State(state): State<Arc<DaemonState>>) -> ApiResult<Json<Value>> {
    let config = state.config.get();
    let chain_status = state.embedding_chain.status().await;
    let vector_stats = state.vector_index.stats().await.unwrap_or_default();
    let memories_sqlite = state.observations.count_observations().await?;
    let memories_unembedded = state.observations.count_unembedded().await?;
    let index_status = state.index_status.read().expect("index status lock").clone();

    let mut files_indexed = index_status.file_count;
    if files_indexed == 0 && vector_stats.code_chunks > 0 {
        files_indexed = state.vector_index.count_unique_files().await.unwrap_or(0);
    }

    let watcher_guard = state.watcher.lock().expect("watcher lock");
    let watcher_block = json!({
        "enabled": watcher_guard.is_some(),
        "running": watcher_guard.as_ref().is_some_and(|w| w.is_running()),
        "pending_changes": watcher_guard.as_ref().map_or(0, |w| w.pending_count()),
    });
    drop(watcher_guard);

    let sqlite_size = std::fs::metadata(state.paths.activities_db())
        .map(|m| m.len())
        .unwrap_or(0);
    let chroma_size = dir_size(&state.paths.chroma_dir());

    let backup_path = state.paths.backup_file(&state.machine_id);
    let backup_block = match std::fs::metadata(&backup_path) {
        Ok(meta) => {
            let age_hours = meta
                .modified()
                .ok()
                .and_then(|m| m.elapsed().ok())
                .map(|e| (e.as_secs_f64() / 3600.0 * 10.0).round() / 10.0);
            json!({
                "exists": true,
                "last_backup": state.last_auto_backup.lock().expect("backup lock").clone(),
                "age_hours": age_hours,
                "size_bytes": meta.len(),
            })
        }
        Err(_) => json!({ "exists": false, "last_backup": null, "age_hours": null }),
    };

    Ok(Json(json!({
        "status": "running",
        "indexing": index_status.is_indexing(),
        "uptime_seconds": state.uptime_seconds(),
        "project_root": state.paths.project_root().to_string_lossy(),
        "embedding_provider": chain_status.primary_provider,
        "embedding_stats": {
            "providers": chain_status.providers,
            "total_embeds": chain_status.total_embeds,
        },
        "summarization": {
            "enabled": config.summarization.enabled,
            "provider": config.summarization.enabled.then(|| config.summarization.provider.clone()),
            "model": config.summarization.enabled.then(|| config.summarization.model.clone()),
        },
        "index_stats": {
            "files_indexed": files_indexed,
            "chunks_indexed": vector_stats.code_chunks,
            "memories_stored": memories_sqlite,
            "memories_chromadb": vector_stats.memory_observations,
            "memories_unembedded": memories_unembedded,
            "last_indexed": index_status.last_indexed,
            "duration_seconds": index_status.duration_seconds,
            "status": index_status.status,
            "progress": index_status.progress,
            "total": index_status.total,
            "ast_stats": index_status.ast_stats,
        },
        "file_watcher": watcher_block,
        "storage": {
            "sqlite_size_bytes": sqlite_size,
            "chromadb_size_bytes": chroma_size,
            "sqlite_size_mb": format_mb(sqlite_size),
            "chromadb_size_mb": format_mb(chroma_size),
            "total_size_mb": format_mb(sqlite_size + chroma_size),
        },
        "backup": backup_block,
        "version": {
            "running": &state.version.running,
            "installed": &state.version.installed,
            "update_available": state.version.update_available,
        },
    })))
}

/// `GET /api/logs` - tail of the daemon or hooks log.
pub async fn logs(
    State(state): State<Arc<DaemonState>>,
    Query(query): Query<LogsQuery>,
) -> Json<Value> {
    let lines = query.lines.clamp(1, 500);
    let (log_file, log_type) = match query.file.as_str() {
        "hooks" => (state.paths.hooks_log(), "hooks"),
        _ => (state.paths.daemon_log(), "daemon"),
    };

    let content = match std::fs::read_to_string(&log_file) {
        Ok(text) => {
            let all: Vec<&str> = text.lines().collect();
            let start = all.len().saturating_sub(lines);
            all[start..].join("\n")
        }
        Err(_) => "No log file found".to_owned(),
    };

    Json(json!({
        "log_file": log_file.to_string_lossy(),
        "log_type": log_type,
        "lines": lines,
        "content": content,
        "available_logs": [
            { "id": "daemon", "name": "Daemon" },
            { "id": "hooks", "name": "Hook events" },
        ],
    }))
}

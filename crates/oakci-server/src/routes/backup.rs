//! Backup routes.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use oakci_application::backup::{export_to_sql, import_from_sql};
use oakci_domain::utils::time::now_iso;
use oakci_infrastructure::state::DaemonState;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::models::{BackupCreateRequest, BackupRestoreRequest};

const RESTORE_TIMEOUT: Duration = Duration::from_secs(120);

/// `GET /api/backup/status`.
pub async fn status(State(state): State<Arc<DaemonState>>) -> Json<Value> {
    let path = state.paths.backup_file(&state.machine_id);
    let block = match std::fs::metadata(&path) {
        Ok(meta) => json!({
            "exists": true,
            "path": path.to_string_lossy(),
            "size_bytes": meta.len(),
            "last_backup": state.last_auto_backup.lock().expect("backup lock").clone(),
        }),
        Err(_) => json!({ "exists": false, "path": path.to_string_lossy() }),
    };
    Json(block)
}

/// `POST /api/backup/create`.
pub async fn create(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<BackupCreateRequest>,
) -> ApiResult<Json<Value>> {
    let path = state.paths.backup_file(&state.machine_id);
    let records = export_to_sql(&state.executor, &path, request.include_activities).await?;
    *state.last_auto_backup.lock().expect("backup lock") = Some(now_iso());
    Ok(Json(json!({
        "created": true,
        "path": path.to_string_lossy(),
        "records": records,
    })))
}

/// `POST /api/backup/restore` - imports the dump, then the processor's
/// next cycle re-embeds everything the import reset.
pub async fn restore(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<BackupRestoreRequest>,
) -> ApiResult<Json<Value>> {
    let path = match request.path {
        Some(path) => std::path::PathBuf::from(path),
        None => state.paths.backup_file(&state.machine_id),
    };
    if !path.exists() {
        return Err(ApiError::not_found(format!(
            "backup file {}",
            path.display()
        )));
    }

    let executor = Arc::clone(&state.executor);
    let imported = tokio::time::timeout(RESTORE_TIMEOUT, import_from_sql(&executor, &path))
        .await
        .map_err(|_| ApiError::Timeout("backup restore timed out".to_owned()))??;

    Ok(Json(json!({
        "restored": true,
        "records": imported,
        "note": "imported observations will be re-embedded by the next processing cycle",
    })))
}

//! Relational schema for the activity store.
//!
//! `ensure_schema` is idempotent: tables and indexes use IF NOT EXISTS and
//! the recorded schema version only moves forward. Timestamps are stored
//! twice, as ISO-8601 text and as an epoch-seconds shadow column, so range
//! queries stay on integer indexes.

use oakci_domain::constants::SCHEMA_VERSION;
use oakci_domain::error::Result;
use oakci_domain::ports::database::{DatabaseExecutor, SqlParam};

const DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        agent TEXT NOT NULL,
        project_root TEXT NOT NULL,
        started_at TEXT NOT NULL,
        started_at_epoch INTEGER NOT NULL,
        ended_at TEXT,
        ended_at_epoch INTEGER,
        status TEXT NOT NULL DEFAULT 'active',
        title TEXT,
        summary TEXT,
        parent_session_id TEXT,
        parent_session_reason TEXT,
        transcript_path TEXT,
        last_activity_epoch INTEGER NOT NULL DEFAULT 0,
        source_machine_id TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS prompt_batches (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL REFERENCES sessions(id),
        prompt_number INTEGER NOT NULL,
        user_prompt TEXT NOT NULL,
        response_summary TEXT,
        started_at TEXT NOT NULL,
        started_at_epoch INTEGER NOT NULL,
        ended_at TEXT,
        ended_at_epoch INTEGER,
        status TEXT NOT NULL DEFAULT 'active',
        classification TEXT,
        processed INTEGER NOT NULL DEFAULT 0,
        processing_error TEXT,
        source_type TEXT NOT NULL DEFAULT 'user',
        plan_content TEXT,
        plan_file_path TEXT,
        plan_embedded INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS activities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL REFERENCES sessions(id),
        prompt_batch_id INTEGER REFERENCES prompt_batches(id),
        tool_name TEXT NOT NULL,
        tool_input TEXT NOT NULL,
        tool_output_summary TEXT,
        file_path TEXT,
        success INTEGER NOT NULL DEFAULT 1,
        error_message TEXT,
        timestamp TEXT NOT NULL,
        timestamp_epoch INTEGER NOT NULL,
        processed INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS memory_observations (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        prompt_batch_id INTEGER,
        observation TEXT NOT NULL,
        memory_type TEXT NOT NULL,
        context TEXT,
        tags TEXT NOT NULL DEFAULT '[]',
        importance INTEGER NOT NULL DEFAULT 5,
        created_at TEXT NOT NULL,
        created_at_epoch INTEGER NOT NULL,
        embedded INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'active',
        resolved_by_session_id TEXT,
        resolved_at TEXT,
        superseded_by TEXT
    )",
    "CREATE TABLE IF NOT EXISTS resolution_events (
        id TEXT PRIMARY KEY,
        observation_id TEXT NOT NULL,
        action TEXT NOT NULL,
        resolved_by_session_id TEXT,
        superseded_by TEXT,
        reason TEXT,
        created_at TEXT NOT NULL,
        created_at_epoch INTEGER NOT NULL,
        source_machine_id TEXT NOT NULL,
        content_hash TEXT NOT NULL UNIQUE,
        applied INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS session_relationships (
        session_id_a TEXT NOT NULL,
        session_id_b TEXT NOT NULL,
        similarity_score REAL,
        created_by TEXT NOT NULL DEFAULT 'manual',
        created_at TEXT NOT NULL,
        PRIMARY KEY (session_id_a, session_id_b)
    )",
    "CREATE TABLE IF NOT EXISTS agent_schedules (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        agent TEXT NOT NULL,
        prompt TEXT NOT NULL,
        interval_minutes INTEGER NOT NULL,
        enabled INTEGER NOT NULL DEFAULT 1,
        last_run_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS saved_tasks (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        agent TEXT NOT NULL,
        prompt TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS governance_audit_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        agent TEXT NOT NULL,
        tool_name TEXT NOT NULL,
        tool_use_id TEXT,
        tool_category TEXT NOT NULL,
        rule_id TEXT,
        action TEXT NOT NULL,
        reason TEXT,
        matched_pattern TEXT,
        tool_input_summary TEXT,
        enforcement_mode TEXT NOT NULL,
        evaluation_ms REAL NOT NULL,
        created_at TEXT NOT NULL,
        created_at_epoch INTEGER NOT NULL,
        source_machine_id TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_batches_session ON prompt_batches(session_id, prompt_number)",
    "CREATE INDEX IF NOT EXISTS idx_batches_pending ON prompt_batches(processed, status)",
    "CREATE INDEX IF NOT EXISTS idx_activities_session ON activities(session_id, id)",
    "CREATE INDEX IF NOT EXISTS idx_activities_batch ON activities(prompt_batch_id)",
    "CREATE INDEX IF NOT EXISTS idx_observations_session ON memory_observations(session_id)",
    "CREATE INDEX IF NOT EXISTS idx_observations_status ON memory_observations(status, memory_type)",
    "CREATE INDEX IF NOT EXISTS idx_observations_embedded ON memory_observations(embedded)",
    "CREATE INDEX IF NOT EXISTS idx_observations_epoch ON memory_observations(created_at_epoch)",
    "CREATE INDEX IF NOT EXISTS idx_resolution_unapplied ON resolution_events(applied, created_at_epoch)",
    "CREATE INDEX IF NOT EXISTS idx_audit_epoch ON governance_audit_events(created_at_epoch)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status, last_activity_epoch)",
];

/// Tables included in the backup dump, in foreign-key order.
pub const BACKUP_TABLES: &[&str] = &["sessions", "prompt_batches", "memory_observations"];
/// Optional large table appended when requested.
pub const BACKUP_ACTIVITIES_TABLE: &str = "activities";

/// Creates or upgrades the schema to the current version.
pub async fn ensure_schema(executor: &dyn DatabaseExecutor) -> Result<()> {
    for stmt in DDL {
        executor.execute(stmt, &[]).await?;
    }

    let current: i64 = match executor
        .query_one(
            "SELECT value FROM schema_meta WHERE key = 'schema_version'",
            &[],
        )
        .await?
    {
        Some(row) => row
            .try_get_string("value")?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        None => 0,
    };

    if current < SCHEMA_VERSION {
        executor
            .execute(
                "INSERT INTO schema_meta (key, value) VALUES ('schema_version', ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                &[SqlParam::text(SCHEMA_VERSION.to_string())],
            )
            .await?;
        tracing::info!(from = current, to = SCHEMA_VERSION, "schema migrated");
    }
    Ok(())
}

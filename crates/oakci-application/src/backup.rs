//! Backup export and restore.
//!
//! The backup is a deterministic ASCII SQL dump: header comments, then
//! one `INSERT INTO` per row for sessions, prompt batches, and
//! observations (activities optionally). Import executes each INSERT
//! tolerantly (duplicates conflict silently on unique keys) and forces
//! the embedded flags off so the processor rebuilds the vector copies.

use std::path::Path;
use std::sync::Arc;

use oakci_domain::constants::SCHEMA_VERSION;
use oakci_domain::error::{Error, Result};
use oakci_domain::ports::database::DatabaseExecutor;
use oakci_domain::utils::time::now_iso;
use tracing::{debug, info, warn};

use oakci_providers::database::sqlite::schema::{BACKUP_ACTIVITIES_TABLE, BACKUP_TABLES};

/// Columns dumped per table, in a fixed order so the dump is
/// deterministic and diffable.
fn table_columns(table: &str) -> &'static [&'static str] {
    match table {
        "sessions" => &[
            "id",
            "agent",
            "project_root",
            "started_at",
            "started_at_epoch",
            "ended_at",
            "ended_at_epoch",
            "status",
            "title",
            "summary",
            "parent_session_id",
            "parent_session_reason",
            "transcript_path",
            "last_activity_epoch",
            "source_machine_id",
        ],
        "prompt_batches" => &[
            "id",
            "session_id",
            "prompt_number",
            "user_prompt",
            "response_summary",
            "started_at",
            "started_at_epoch",
            "ended_at",
            "ended_at_epoch",
            "status",
            "classification",
            "processed",
            "processing_error",
            "source_type",
            "plan_content",
            "plan_file_path",
            "plan_embedded",
        ],
        "memory_observations" => &[
            "id",
            "session_id",
            "prompt_batch_id",
            "observation",
            "memory_type",
            "context",
            "tags",
            "importance",
            "created_at",
            "created_at_epoch",
            "status",
            "resolved_by_session_id",
            "resolved_at",
            "superseded_by",
            "embedded",
        ],
        "activities" => &[
            "id",
            "session_id",
            "prompt_batch_id",
            "tool_name",
            "tool_input",
            "tool_output_summary",
            "file_path",
            "success",
            "error_message",
            "timestamp",
            "timestamp_epoch",
            "processed",
        ],
        _ => &[],
    }
}

/// Integer columns per table (everything else dumps as quoted text).
fn int_columns(table: &str) -> &'static [&'static str] {
    match table {
        "sessions" => &["started_at_epoch", "ended_at_epoch", "last_activity_epoch"],
        "prompt_batches" => &[
            "id",
            "prompt_number",
            "started_at_epoch",
            "ended_at_epoch",
            "processed",
            "plan_embedded",
        ],
        "memory_observations" => &[
            "prompt_batch_id",
            "importance",
            "created_at_epoch",
            "embedded",
        ],
        "activities" => &[
            "id",
            "prompt_batch_id",
            "success",
            "timestamp_epoch",
            "processed",
        ],
        _ => &[],
    }
}

/// Exports the history tables into a SQL dump; returns the record count.
pub async fn export_to_sql(
    executor: &Arc<dyn DatabaseExecutor>,
    output_path: &Path,
    include_activities: bool,
) -> Result<usize> {
    info!(path = %output_path.display(), include_activities, "exporting history backup");

    let mut tables: Vec<&str> = BACKUP_TABLES.to_vec();
    if include_activities {
        tables.push(BACKUP_ACTIVITIES_TABLE);
    }

    let mut lines = vec![
        "-- OAK Codebase Intelligence History Backup".to_owned(),
        format!("-- Exported: {}", now_iso()),
        format!("-- Schema version: {SCHEMA_VERSION}"),
        String::new(),
    ];
    let mut total = 0;

    for table in tables {
        let columns = table_columns(table);
        let ints = int_columns(table);
        let rows = executor
            .query_all(&format!("SELECT * FROM {table} ORDER BY id"), &[])
            .await?;
        if rows.is_empty() {
            continue;
        }

        lines.push(format!("-- {table} ({} records)", rows.len()));
        for row in &rows {
            let mut values = Vec::with_capacity(columns.len());
            for column in columns {
                let value = if ints.contains(column) {
                    match row.try_get_i64(column)? {
                        Some(n) => n.to_string(),
                        None => "NULL".to_owned(),
                    }
                } else {
                    match row.try_get_string(column)? {
                        Some(text) => format!("'{}'", text.replace('\'', "''")),
                        None => "NULL".to_owned(),
                    }
                };
                values.push(value);
            }
            lines.push(format!(
                "INSERT INTO {table} ({}) VALUES ({});",
                columns.join(", "),
                values.join(", ")
            ));
        }
        total += rows.len();
        lines.push(String::new());
    }

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, lines.join("\n"))?;
    info!(records = total, "backup export complete");
    Ok(total)
}

/// Splits the dump into complete INSERT statements. Statements span lines
/// when text columns contain newlines, so this tracks quoting instead of
/// splitting on line ends.
fn split_statements(content: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            current.push(c);
            if c == '\'' {
                // Doubled quote is an escape, not a terminator.
                if chars.peek() == Some(&'\'') {
                    current.push('\'');
                    chars.next();
                } else {
                    in_string = false;
                }
            }
            continue;
        }
        match c {
            '\'' => {
                in_string = true;
                current.push(c);
            }
            ';' => {
                let stmt = current.trim().to_owned();
                if stmt.starts_with("INSERT INTO") {
                    statements.push(stmt);
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    statements
}

/// Rewrites an observation INSERT to import with `embedded=0` and a
/// batch INSERT with `plan_embedded=0`, triggering vector rebuild.
fn force_unembedded(statement: &str) -> String {
    // The flag columns are dumped last, so the final value is the one to
    // flip.
    if statement.starts_with("INSERT INTO memory_observations")
        || statement.starts_with("INSERT INTO prompt_batches")
    {
        if let Some(pos) = statement.rfind(", 1)") {
            if pos + 4 == statement.len() {
                let mut rewritten = statement[..pos].to_owned();
                rewritten.push_str(", 0)");
                return rewritten;
            }
        }
    }
    statement.to_owned()
}

/// Imports a dump into the current schema; returns imported record count.
pub async fn import_from_sql(
    executor: &Arc<dyn DatabaseExecutor>,
    backup_path: &Path,
) -> Result<usize> {
    info!(path = %backup_path.display(), "importing history backup");
    let content = std::fs::read_to_string(backup_path).map_err(|e| {
        Error::invalid_argument(format!("cannot read backup {}: {e}", backup_path.display()))
    })?;

    let statements = split_statements(&content);
    debug!(statements = statements.len(), "parsed backup statements");

    let mut imported = 0;
    let mut skipped = 0;
    for statement in statements {
        let statement = force_unembedded(&statement);
        // INSERT OR IGNORE keeps re-imports idempotent on unique keys.
        let tolerant = statement.replacen("INSERT INTO", "INSERT OR IGNORE INTO", 1);
        match executor.execute(&tolerant, &[]).await {
            Ok(_) => imported += 1,
            Err(e) => {
                debug!(error = %e, "skipping invalid backup record");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, "some backup records were skipped");
    }
    info!(imported, "backup import complete");
    Ok(imported)
}

/// Backup file name for a machine.
#[must_use]
pub fn backup_filename(machine_id: &str) -> String {
    format!("{machine_id}.sql")
}

#[cfg(test)]
mod tests {
    use super::*;
    use oakci_domain::entities::MemoryType;
    use oakci_domain::ports::ObservationRepository;
    use oakci_domain::ports::SessionRepository;
    use oakci_domain::ports::repositories::{NewObservation, NewSession};
    use oakci_providers::database::SqliteActivityStore;

    async fn seeded_store() -> SqliteActivityStore {
        let store = SqliteActivityStore::open_in_memory("machine-a")
            .await
            .expect("store");
        store
            .sessions()
            .get_or_create_session(NewSession {
                id: "s1".to_owned(),
                agent: "claude-code".to_owned(),
                project_root: "/tmp/p".to_owned(),
                ..Default::default()
            })
            .await
            .expect("session");
        let observations = store.observations();
        observations
            .store_observation(NewObservation {
                id: "o1".to_owned(),
                session_id: "s1".to_owned(),
                prompt_batch_id: None,
                observation: "It's important; quotes 'matter' here".to_owned(),
                memory_type: MemoryType::Gotcha,
                context: None,
                tags: vec!["auto-extracted".to_owned()],
                importance: 7,
            })
            .await
            .expect("observation");
        observations
            .mark_embedded("o1", true)
            .await
            .expect("embed flag");
        store
    }

    #[tokio::test]
    async fn export_import_round_trip_resets_embedded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("machine-a.sql");

        let source = seeded_store().await;
        let exported = export_to_sql(&source.executor(), &path, false)
            .await
            .expect("export");
        assert_eq!(exported, 2);

        let content = std::fs::read_to_string(&path).expect("read");
        assert!(content.starts_with("-- OAK Codebase Intelligence History Backup"));
        assert!(content.contains("INSERT INTO sessions"));
        assert!(content.contains("INSERT INTO memory_observations"));

        let target = SqliteActivityStore::open_in_memory("machine-b")
            .await
            .expect("target");
        let imported = import_from_sql(&target.executor(), &path)
            .await
            .expect("import");
        assert_eq!(imported, 2);

        let observation = target
            .observations()
            .get_observation("o1")
            .await
            .expect("get")
            .expect("some");
        // Forced unembedded so the processor re-embeds.
        assert!(!observation.embedded);
        assert_eq!(
            observation.observation,
            "It's important; quotes 'matter' here"
        );

        // Re-import is idempotent.
        let again = import_from_sql(&target.executor(), &path)
            .await
            .expect("import again");
        assert_eq!(again, 2);
        assert_eq!(
            target
                .observations()
                .count_observations()
                .await
                .expect("count"),
            1
        );
    }

    #[test]
    fn statement_splitting_survives_embedded_semicolons() {
        let dump = "-- header\nINSERT INTO sessions (id) VALUES ('a;b');\nINSERT INTO sessions (id) VALUES ('c''d');";
        let statements = split_statements(dump);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("a;b"));
        assert!(statements[1].contains("c''d"));
    }
}

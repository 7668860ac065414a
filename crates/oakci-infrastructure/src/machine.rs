//! Stable machine identifier.
//!
//! Provenance columns and backup file names carry this id. It is the
//! hostname when available, persisted alongside the database so renames
//! do not orphan history.

use std::path::Path;

/// Reads or creates the machine id persisted next to the database.
#[must_use]
pub fn machine_id(data_dir: &Path) -> String {
    let id_file = data_dir.join("machine_id");
    if let Ok(existing) = std::fs::read_to_string(&id_file) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_owned();
        }
    }

    let id = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| format!("machine-{}", uuid::Uuid::new_v4()));

    let _ = std::fs::create_dir_all(data_dir);
    if let Err(e) = std::fs::write(&id_file, &id) {
        tracing::warn!(error = %e, "could not persist machine id");
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_id_is_stable_across_calls() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = machine_id(dir.path());
        let second = machine_id(dir.path());
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}

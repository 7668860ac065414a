//! Version stamp handling.
//!
//! The CLI writes the installed version to a stamp file; the daemon
//! compares it against its own version at startup and flags
//! `update_available` when the installed base release is strictly newer.
//! Purely advisory.

use std::path::Path;

use oakci_domain::constants::VERSION;
use oakci_domain::utils::version::update_available;

/// Outcome of the startup version check.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct VersionInfo {
    pub running: String,
    pub installed: Option<String>,
    pub update_available: bool,
}

/// Reads the stamp file (if present) and compares base releases.
#[must_use]
pub fn check_version(stamp_file: &Path) -> VersionInfo {
    let installed = std::fs::read_to_string(stamp_file)
        .ok()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty());

    let flagged = installed
        .as_deref()
        .is_some_and(|installed| update_available(VERSION, installed));

    VersionInfo {
        running: VERSION.to_owned(),
        installed,
        update_available: flagged,
    }
}

/// Writes the running version to the stamp file.
pub fn write_stamp(stamp_file: &Path) {
    if let Some(parent) = stamp_file.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::write(stamp_file, VERSION) {
        tracing::warn!(error = %e, "could not write version stamp");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_stamp_flags_update() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stamp = dir.path().join("cli_version");
        std::fs::write(&stamp, "99.0.0").expect("write");
        let info = check_version(&stamp);
        assert!(info.update_available);
        assert_eq!(info.installed.as_deref(), Some("99.0.0"));
    }

    #[test]
    fn same_or_dev_stamp_does_not_flag() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stamp = dir.path().join("cli_version");

        std::fs::write(&stamp, VERSION).expect("write");
        assert!(!check_version(&stamp).update_available);

        std::fs::write(&stamp, format!("{VERSION}.dev0+gABC.d20260101")).expect("write");
        assert!(!check_version(&stamp).update_available);
    }

    #[test]
    fn missing_stamp_is_quiet() {
        let dir = tempfile::tempdir().expect("tempdir");
        let info = check_version(&dir.path().join("absent"));
        assert!(!info.update_available);
        assert!(info.installed.is_none());
    }
}

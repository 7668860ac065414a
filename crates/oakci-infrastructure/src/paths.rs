//! Persisted-state paths under a project root.

use std::path::{Path, PathBuf};

use oakci_domain::constants::paths::{
    ACTIVITIES_DB_FILENAME, CHROMA_DIR, CI_DATA_DIR, CLOUD_RELAY_DIR, CONFIG_FILENAME,
    DAEMON_LOG_FILENAME, HISTORY_BACKUP_DIR, HOOKS_LOG_FILENAME, OAK_DIR, PID_FILENAME,
    VERSION_STAMP_FILENAME,
};

/// Resolved filesystem layout for one project.
#[derive(Debug, Clone)]
pub struct CiPaths {
    project_root: PathBuf,
}

impl CiPaths {
    /// Lays out paths under the given project root.
    #[must_use]
    pub fn new(project_root: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
        }
    }

    /// The project root itself.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// `<project>/.oak/ci/`
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.project_root.join(OAK_DIR).join(CI_DATA_DIR)
    }

    /// `<project>/.oak/ci/activities.db`
    #[must_use]
    pub fn activities_db(&self) -> PathBuf {
        self.data_dir().join(ACTIVITIES_DB_FILENAME)
    }

    /// `<project>/.oak/ci/chroma/`
    #[must_use]
    pub fn chroma_dir(&self) -> PathBuf {
        self.data_dir().join(CHROMA_DIR)
    }

    /// `<project>/.oak/ci/daemon.pid`
    #[must_use]
    pub fn pid_file(&self) -> PathBuf {
        self.data_dir().join(PID_FILENAME)
    }

    /// `<project>/.oak/ci/cli_version`
    #[must_use]
    pub fn version_stamp(&self) -> PathBuf {
        self.data_dir().join(VERSION_STAMP_FILENAME)
    }

    /// `<project>/.oak/ci/daemon.log`
    #[must_use]
    pub fn daemon_log(&self) -> PathBuf {
        self.data_dir().join(DAEMON_LOG_FILENAME)
    }

    /// `<project>/.oak/ci/hooks.log`
    #[must_use]
    pub fn hooks_log(&self) -> PathBuf {
        self.data_dir().join(HOOKS_LOG_FILENAME)
    }

    /// `<project>/.oak/ci/config.toml`
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.data_dir().join(CONFIG_FILENAME)
    }

    /// `<project>/.oak/ci/prompts/`
    #[must_use]
    pub fn prompts_dir(&self) -> PathBuf {
        self.data_dir().join("prompts")
    }

    /// `<project>/.oak/ci-history/`
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.project_root.join(HISTORY_BACKUP_DIR)
    }

    /// `<project>/.oak/ci-history/<machine>.sql`
    #[must_use]
    pub fn backup_file(&self, machine_id: &str) -> PathBuf {
        self.backup_dir()
            .join(oakci_application::backup::backup_filename(machine_id))
    }

    /// `<project>/.oak/ci/cloud-relay/`
    #[must_use]
    pub fn cloud_relay_dir(&self) -> PathBuf {
        self.data_dir().join(CLOUD_RELAY_DIR)
    }
}

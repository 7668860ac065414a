//! Persisted-state layout under the project root.

/// Top-level OAK directory.
pub const OAK_DIR: &str = ".oak";
/// Codebase-intelligence data directory under [`OAK_DIR`].
pub const CI_DATA_DIR: &str = "ci";
/// Relational store file name.
pub const ACTIVITIES_DB_FILENAME: &str = "activities.db";
/// Vector collections directory name.
pub const CHROMA_DIR: &str = "chroma";
/// Daemon pid file.
pub const PID_FILENAME: &str = "daemon.pid";
/// Version stamp file written by the CLI.
pub const VERSION_STAMP_FILENAME: &str = "cli_version";
/// Daemon log file.
pub const DAEMON_LOG_FILENAME: &str = "daemon.log";
/// Hook events log file.
pub const HOOKS_LOG_FILENAME: &str = "hooks.log";
/// Configuration file name.
pub const CONFIG_FILENAME: &str = "config.toml";
/// Cross-machine backup directory under [`OAK_DIR`]'s parent.
pub const HISTORY_BACKUP_DIR: &str = ".oak/ci-history";
/// Cloud relay scaffold directory under the CI data dir.
pub const CLOUD_RELAY_DIR: &str = "cloud-relay";

/// Vector collection names.
pub const CODE_COLLECTION: &str = "oak_code";
/// Observations and plans collection.
pub const MEMORY_COLLECTION: &str = "oak_memory";
/// Session summaries collection.
pub const SESSIONS_COLLECTION: &str = "oak_sessions";

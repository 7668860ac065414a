//! Configuration loading and the live accessor.
//!
//! Figment merges built-in defaults, `.oak/ci/config.toml`, and `OAK_CI_*`
//! environment overrides into a [`CiConfig`]. The [`ConfigHandle`] holds
//! the current snapshot behind a lock; services read through it (or a
//! [`ConfigAccessor`] closure derived from it) so UI edits take effect
//! without a restart.

use std::path::Path;
use std::sync::{Arc, RwLock};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use oakci_domain::error::{Error, Result};
use oakci_domain::value_objects::{CiConfig, ConfigAccessor};
use tracing::info;

/// Loads the merged configuration for a project.
pub fn load_config(config_file: &Path) -> Result<CiConfig> {
    let mut figment = Figment::from(Serialized::defaults(CiConfig::default()));
    if config_file.exists() {
        figment = figment.merge(Toml::file(config_file));
        info!(path = %config_file.display(), "configuration loaded");
    }
    figment
        .merge(Env::prefixed("OAK_CI_").split("__"))
        .extract()
        .map_err(|e| Error::config(format!("invalid configuration: {e}")))
}

/// Shared, mutable configuration snapshot.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<CiConfig>>,
}

impl ConfigHandle {
    /// Wraps an initial snapshot.
    #[must_use]
    pub fn new(config: CiConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Current snapshot (cloned).
    #[must_use]
    pub fn get(&self) -> CiConfig {
        self.inner.read().expect("config lock").clone()
    }

    /// Replaces the snapshot (config PUT route).
    pub fn set(&self, config: CiConfig) {
        *self.inner.write().expect("config lock") = config;
    }

    /// Reloads from disk, replacing the snapshot.
    pub fn reload(&self, config_file: &Path) -> Result<CiConfig> {
        let config = load_config(config_file)?;
        self.set(config.clone());
        Ok(config)
    }

    /// Persists the current snapshot to disk.
    pub fn save(&self, config_file: &Path) -> Result<()> {
        let config = self.get();
        let serialized = toml::to_string_pretty(&config)
            .map_err(|e| Error::config(format!("could not serialize config: {e}")))?;
        if let Some(parent) = config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(config_file, serialized)?;
        Ok(())
    }

    /// The live accessor services capture instead of a snapshot.
    #[must_use]
    pub fn accessor(&self) -> ConfigAccessor {
        let handle = self.clone();
        Arc::new(move || handle.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config(&dir.path().join("missing.toml")).expect("load");
        assert_eq!(config.embedding.primary.dimensions, 768);
        assert_eq!(config.server.port, 8765);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9999\n\n[auto_resolve]\nsimilarity_threshold = 0.9\n",
        )
        .expect("write");
        let config = load_config(&path).expect("load");
        assert_eq!(config.server.port, 9999);
        assert!((config.auto_resolve.similarity_threshold - 0.9).abs() < f32::EPSILON);
        // Untouched sections keep defaults.
        assert!(config.backup.enabled);
    }

    #[test]
    fn accessor_sees_live_updates() {
        let handle = ConfigHandle::new(CiConfig::default());
        let accessor = handle.accessor();
        assert_eq!(accessor().processing.batch_cap, 10);

        let mut updated = CiConfig::default();
        updated.processing.batch_cap = 3;
        handle.set(updated);
        assert_eq!(accessor().processing.batch_cap, 3);
    }
}

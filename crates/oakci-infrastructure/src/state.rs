//! Process-wide daemon state.
//!
//! One explicit container constructed at startup and passed by handle to
//! every route and background task. No module-global mutable state.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use moka::sync::Cache;
use oakci_application::capture::ActivityCapture;
use oakci_application::governance::{AuditWriter, GovernanceEngine};
use oakci_application::indexing::IndexingService;
use oakci_application::processor::ActivityProcessor;
use oakci_application::search::SearchService;
use oakci_application::vector_index::VectorIndex;
use oakci_providers::embedding::EmbeddingProviderChain;
use oakci_domain::constants::processing::SESSION_STATS_CACHE_TTL_SECS;
use oakci_domain::entities::SessionStats;
use oakci_domain::error::Result;
use oakci_domain::ports::database::DatabaseExecutor;
use oakci_domain::ports::{
    ActivityRepository, AuditRepository, BatchRepository, ObservationRepository, ScheduleRepository,
    SessionRepository,
};
use oakci_domain::value_objects::IndexStatus;
use tokio_util::sync::CancellationToken;

use crate::cloud_relay::CloudRelayClient;
use crate::config::ConfigHandle;
use crate::paths::CiPaths;
use crate::tunnel::TunnelSupervisor;
use crate::version::VersionInfo;
use crate::watcher::FileWatcher;

/// Everything a route or background task can reach.
pub struct DaemonState {
    pub paths: CiPaths,
    pub auth_token: Option<String>,
    pub config: ConfigHandle,
    pub machine_id: String,

    pub executor: Arc<dyn DatabaseExecutor>,
    pub sessions: Arc<dyn SessionRepository>,
    pub batches: Arc<dyn BatchRepository>,
    pub activities: Arc<dyn ActivityRepository>,
    pub observations: Arc<dyn ObservationRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub audit: Arc<dyn AuditRepository>,

    pub vector_index: Arc<VectorIndex>,
    pub embedding_chain: Arc<EmbeddingProviderChain>,
    pub capture: Arc<ActivityCapture>,
    pub search: Arc<SearchService>,
    pub indexing: Arc<IndexingService>,
    pub processor: Arc<ActivityProcessor>,
    pub governance: RwLock<Arc<GovernanceEngine>>,
    pub audit_writer: Arc<AuditWriter>,

    pub tunnel: Arc<TunnelSupervisor>,
    pub cloud_relay: Arc<CloudRelayClient>,
    pub watcher: Mutex<Option<FileWatcher>>,

    pub index_status: Arc<RwLock<IndexStatus>>,
    pub version: VersionInfo,
    pub started_at: Instant,
    pub last_auto_backup: Mutex<Option<String>>,
    pub shutdown: CancellationToken,
    /// Set to true by the restart route before shutdown triggers.
    pub restart_requested: Mutex<bool>,

    /// Runtime-mutable CORS origins (tunnel and relay URLs).
    dynamic_cors: RwLock<HashSet<String>>,
    /// Short-TTL read-through cache over bulk session stats.
    session_stats_cache: Cache<String, SessionStats>,
}

impl DaemonState {
    /// Builder used by the lifecycle module.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        paths: CiPaths,
        auth_token: Option<String>,
        config: ConfigHandle,
        machine_id: String,
        executor: Arc<dyn DatabaseExecutor>,
        sessions: Arc<dyn SessionRepository>,
        batches: Arc<dyn BatchRepository>,
        activities: Arc<dyn ActivityRepository>,
        observations: Arc<dyn ObservationRepository>,
        schedules: Arc<dyn ScheduleRepository>,
        audit: Arc<dyn AuditRepository>,
        vector_index: Arc<VectorIndex>,
        embedding_chain: Arc<EmbeddingProviderChain>,
        capture: Arc<ActivityCapture>,
        search: Arc<SearchService>,
        indexing: Arc<IndexingService>,
        processor: Arc<ActivityProcessor>,
        governance: Arc<GovernanceEngine>,
        audit_writer: Arc<AuditWriter>,
        index_status: Arc<RwLock<IndexStatus>>,
        version: VersionInfo,
    ) -> Self {
        let cloud_relay_dir = paths.cloud_relay_dir();
        Self {
            paths,
            auth_token,
            config,
            machine_id,
            executor,
            sessions,
            batches,
            activities,
            observations,
            schedules,
            audit,
            vector_index,
            embedding_chain,
            capture,
            search,
            indexing,
            processor,
            governance: RwLock::new(governance),
            audit_writer,
            tunnel: Arc::new(TunnelSupervisor::new()),
            cloud_relay: Arc::new(CloudRelayClient::new(cloud_relay_dir)),
            watcher: Mutex::new(None),
            index_status,
            version,
            started_at: Instant::now(),
            last_auto_backup: Mutex::new(None),
            shutdown: CancellationToken::new(),
            restart_requested: Mutex::new(false),
            dynamic_cors: RwLock::new(HashSet::new()),
            session_stats_cache: Cache::builder()
                .time_to_live(std::time::Duration::from_secs(SESSION_STATS_CACHE_TTL_SECS))
                .max_capacity(1024)
                .build(),
        }
    }

    /// Uptime in whole seconds.
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Current governance engine.
    #[must_use]
    pub fn governance_engine(&self) -> Arc<GovernanceEngine> {
        Arc::clone(&self.governance.read().expect("governance lock"))
    }

    /// Swaps in a recompiled engine after a config PUT.
    pub fn replace_governance_engine(&self, engine: GovernanceEngine) {
        *self.governance.write().expect("governance lock") = Arc::new(engine);
    }

    /// Adds a runtime CORS origin (tunnel/relay URL).
    pub fn add_cors_origin(&self, origin: &str) {
        self.dynamic_cors
            .write()
            .expect("cors lock")
            .insert(origin.trim_end_matches('/').to_owned());
    }

    /// Removes a runtime CORS origin.
    pub fn remove_cors_origin(&self, origin: &str) {
        self.dynamic_cors
            .write()
            .expect("cors lock")
            .remove(origin.trim_end_matches('/'));
    }

    /// Whether an origin is allowed: static config plus the dynamic set.
    #[must_use]
    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        if origin.is_empty() {
            return false;
        }
        let normalized = origin.trim_end_matches('/');
        if self
            .config
            .get()
            .server
            .cors_origins
            .iter()
            .any(|o| o.trim_end_matches('/') == normalized)
        {
            return true;
        }
        self.dynamic_cors
            .read()
            .expect("cors lock")
            .contains(normalized)
    }

    /// Bulk session stats with the short-TTL read-through cache in front
    /// of the store.
    pub async fn bulk_session_stats(&self, ids: &[String]) -> Result<Vec<SessionStats>> {
        let mut hits = Vec::with_capacity(ids.len());
        let mut misses = Vec::new();
        for id in ids {
            match self.session_stats_cache.get(id) {
                Some(stats) => hits.push(stats),
                None => misses.push(id.clone()),
            }
        }
        if !misses.is_empty() {
            let fetched = self.sessions.get_bulk_session_stats(&misses).await?;
            for stats in fetched {
                self.session_stats_cache
                    .insert(stats.session_id.clone(), stats.clone());
                hits.push(stats);
            }
        }
        Ok(hits)
    }

    /// Stops the watcher if one is running.
    pub fn stop_watcher(&self) {
        if let Some(mut watcher) = self.watcher.lock().expect("watcher lock").take() {
            watcher.stop();
        }
    }
}


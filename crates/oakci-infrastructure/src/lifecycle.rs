//! Daemon startup, background loops, and shutdown.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use oakci_application::capture::ActivityCapture;
use oakci_application::governance::{AuditWriter, GovernanceEngine};
use oakci_application::indexing::IndexingService;
use oakci_application::processor::prompts::PromptTemplateConfig;
use oakci_application::processor::ActivityProcessor;
use oakci_application::search::SearchService;
use oakci_application::vector_index::VectorIndex;
use oakci_application::backup;
use oakci_domain::error::{Error, Result};
use oakci_domain::utils::time::now_iso;
use oakci_domain::value_objects::IndexStatus;
use oakci_providers::database::SqliteActivityStore;
use oakci_providers::embedding::create_chain;
use oakci_providers::vector_store::FilesystemVectorStore;
use tracing::{info, warn};

use crate::config::{ConfigHandle, load_config};
use crate::machine::machine_id;
use crate::paths::CiPaths;
use crate::state::DaemonState;
use crate::version::{check_version, write_stamp};
use crate::watcher::FileWatcher;

/// Builds the full daemon state for a project root.
///
/// Provider probes are non-fatal: a daemon with its primary embedding
/// server down still serves activity capture and browsing.
pub async fn build_state(
    project_root: &std::path::Path,
    auth_token: Option<String>,
) -> Result<Arc<DaemonState>> {
    let paths = CiPaths::new(project_root);
    std::fs::create_dir_all(paths.data_dir())?;

    let config = ConfigHandle::new(load_config(&paths.config_file())?);
    let snapshot = config.get();
    let machine = machine_id(&paths.data_dir());

    // Relational store first: it is the source of truth.
    let store = SqliteActivityStore::open(&paths.activities_db(), &machine).await?;
    let executor = store.executor();
    let sessions: Arc<dyn oakci_domain::ports::SessionRepository> = Arc::new(store.sessions());
    let batches: Arc<dyn oakci_domain::ports::BatchRepository> = Arc::new(store.batches());
    let activities: Arc<dyn oakci_domain::ports::ActivityRepository> =
        Arc::new(store.activities());
    let observations: Arc<dyn oakci_domain::ports::ObservationRepository> =
        Arc::new(store.observations());
    let schedules: Arc<dyn oakci_domain::ports::ScheduleRepository> = Arc::new(store.schedules());
    let audit: Arc<dyn oakci_domain::ports::AuditRepository> = Arc::new(store.audit());

    // Resolutions that predate event logging get their events now so
    // other machines converge after the next backup exchange.
    if let Err(e) = observations.backfill_resolution_events(&machine).await {
        warn!(error = %e, "resolution event backfill failed");
    }

    // Embedding chain; collections are created at the primary's
    // configured dimensions whether or not it is reachable right now.
    let chain = Arc::new(create_chain(&snapshot.embedding)?);
    let failures = chain.probe_all().await;
    for (provider, reason) in &failures {
        warn!(provider = %provider, reason = %reason, "embedding provider unavailable");
    }

    let vector_store = Arc::new(FilesystemVectorStore::open(&paths.chroma_dir())?);
    let chain_port: Arc<dyn oakci_domain::ports::EmbeddingProvider> = chain.clone();
    let vector_index = Arc::new(VectorIndex::new(vector_store, chain_port));
    vector_index.ensure_collections().await?;

    let index_status = Arc::new(RwLock::new(IndexStatus::default()));
    let indexing = Arc::new(IndexingService::new(
        project_root.to_path_buf(),
        Arc::clone(&vector_index),
        &[],
        Arc::clone(&index_status),
    )?);

    let capture = Arc::new(ActivityCapture::new(
        Arc::clone(&sessions),
        Arc::clone(&batches),
        Arc::clone(&activities),
        project_root.to_string_lossy().into_owned(),
    ));
    let search = Arc::new(SearchService::new(Arc::clone(&vector_index)));

    let prompt_config = PromptTemplateConfig::load(Some(&paths.prompts_dir()));
    let processor = Arc::new(ActivityProcessor::new(
        Arc::clone(&sessions),
        Arc::clone(&batches),
        Arc::clone(&activities),
        Arc::clone(&observations),
        Arc::clone(&vector_index),
        config.accessor(),
        prompt_config,
        machine.clone(),
    ));

    let governance = Arc::new(GovernanceEngine::new(&snapshot.governance));
    let audit_writer = Arc::new(AuditWriter::new(Arc::clone(&audit)));

    let version = check_version(&paths.version_stamp());
    if version.update_available {
        info!(
            running = %version.running,
            installed = ?version.installed,
            "a newer CLI version is installed; restart the daemon to pick it up"
        );
    }

    let state = Arc::new(DaemonState::new(
        paths,
        auth_token,
        config,
        machine,
        executor,
        sessions,
        batches,
        activities,
        observations,
        schedules,
        audit,
        vector_index,
        chain,
        capture,
        search,
        indexing,
        processor,
        governance,
        audit_writer,
        index_status,
        version,
    ));

    Ok(state)
}

/// Starts the watcher (when enabled) and the background loops, then
/// writes the pid and version stamp.
pub fn start_background(state: &Arc<DaemonState>) {
    let config = state.config.get();

    if config.watcher.enabled {
        let watcher = FileWatcher::start(
            Arc::clone(&state.indexing),
            state.paths.project_root().to_path_buf(),
            &config.watcher,
            tokio::runtime::Handle::current(),
        );
        *state.watcher.lock().expect("watcher lock") = watcher;
    }

    spawn_processor_loop(state);
    spawn_backup_loop(state);

    write_stamp(&state.paths.version_stamp());
    if let Err(e) = std::fs::write(state.paths.pid_file(), std::process::id().to_string()) {
        warn!(error = %e, "could not write pid file");
    }
}

fn spawn_processor_loop(state: &Arc<DaemonState>) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        loop {
            let interval = state.config.get().processing.interval_seconds.max(5);
            tokio::select! {
                () = state.shutdown.cancelled() => break,
                () = tokio::time::sleep(Duration::from_secs(interval)) => {
                    // run_cycle absorbs its own errors.
                    let _ = state.processor.run_cycle().await;
                }
            }
        }
        info!("processor loop stopped");
    });
}

fn spawn_backup_loop(state: &Arc<DaemonState>) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        loop {
            let config = state.config.get().backup;
            // Disabled backups still tick so a config edit is picked up.
            let sleep = if config.enabled {
                Duration::from_secs(config.interval_hours.max(1) * 3600)
            } else {
                Duration::from_secs(60)
            };
            tokio::select! {
                () = state.shutdown.cancelled() => break,
                () = tokio::time::sleep(sleep) => {
                    if !config.enabled {
                        continue;
                    }
                    let path = state.paths.backup_file(&state.machine_id);
                    match backup::export_to_sql(&state.executor, &path, config.include_activities)
                        .await
                    {
                        Ok(records) => {
                            *state.last_auto_backup.lock().expect("backup lock") =
                                Some(now_iso());
                            info!(records, "automatic backup written");
                        }
                        Err(e) => warn!(error = %e, "automatic backup failed"),
                    }
                }
            }
        }
        info!("backup loop stopped");
    });
}

/// Graceful shutdown: cancel loops, stop watcher and subprocesses, final
/// backup when enabled, remove the pid file.
pub async fn shutdown(state: &Arc<DaemonState>) {
    info!("daemon shutting down");
    state.shutdown.cancel();
    state.stop_watcher();
    let _ = state.tunnel.stop().await;
    state.cloud_relay.disconnect();

    let config = state.config.get().backup;
    if config.enabled {
        let path = state.paths.backup_file(&state.machine_id);
        if let Err(e) =
            backup::export_to_sql(&state.executor, &path, config.include_activities).await
        {
            warn!(error = %e, "final backup failed");
        }
    }

    let _ = std::fs::remove_file(state.paths.pid_file());
    info!("daemon stopped");
}

/// Spawns a detached successor process in the project directory and
/// schedules a graceful shutdown shortly after. Used by the restart
/// route, which must answer before the process goes away.
pub fn spawn_restart(state: &Arc<DaemonState>) -> Result<()> {
    let cli = std::env::var("OAK_CI_CLI_COMMAND").unwrap_or_else(|_| {
        std::env::current_exe()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "oak-ci".to_owned())
    });

    let mut command = std::process::Command::new(cli);
    command
        .arg("serve")
        .arg("--project-root")
        .arg(state.paths.project_root())
        .current_dir(state.paths.project_root())
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    // Own process group so the successor survives this process's exit.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    command
        .spawn()
        .map_err(|e| Error::process(format!("failed to spawn successor: {e}")))?;

    *state.restart_requested.lock().expect("restart lock") = true;
    let state = Arc::clone(state);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(750)).await;
        state.shutdown.cancel();
    });
    Ok(())
}

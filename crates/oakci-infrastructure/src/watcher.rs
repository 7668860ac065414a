//! Debounced file watcher driving incremental re-indexing.
//!
//! Filesystem events are filtered with the indexer's own predicate, then
//! coalesced: creates and modifies land in a pending set, deletes in a
//! deleted set (removing any pending entry). A single debounce window is
//! re-armed per event; when it fires, a minimum-reindex-interval guard
//! may push the work further out. The worker runs on its own thread so a
//! transient store error can never take the HTTP server down with it,
//! and any error during a fire is logged and survives.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use oakci_application::indexing::IndexingService;
use oakci_domain::value_objects::WatcherConfig;
use tracing::{debug, info, warn};

enum WorkerMessage {
    FsEvent(Event),
    Stop,
}

#[derive(Default)]
struct ChangeSets {
    pending: HashSet<PathBuf>,
    deleted: HashSet<PathBuf>,
}

/// Running watcher handle.
pub struct FileWatcher {
    sender: mpsc::Sender<WorkerMessage>,
    worker: Option<std::thread::JoinHandle<()>>,
    changes: Arc<Mutex<ChangeSets>>,
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Starts watching the project root. Returns `None` when the OS event
    /// backend is unavailable; the daemon continues without incremental
    /// updates.
    #[must_use]
    pub fn start(
        indexing: Arc<IndexingService>,
        project_root: PathBuf,
        config: &WatcherConfig,
        runtime: tokio::runtime::Handle,
    ) -> Option<Self> {
        let (sender, receiver) = mpsc::channel::<WorkerMessage>();

        let event_sender = sender.clone();
        let mut watcher = match notify::recommended_watcher(move |result| {
            if let Ok(event) = result {
                let _ = event_sender.send(WorkerMessage::FsEvent(event));
            }
        }) {
            Ok(watcher) => watcher,
            Err(e) => {
                warn!(error = %e, "file watching unavailable, incremental updates disabled");
                return None;
            }
        };
        if let Err(e) = watcher.watch(&project_root, RecursiveMode::Recursive) {
            warn!(error = %e, "could not watch project root, incremental updates disabled");
            return None;
        }

        let changes = Arc::new(Mutex::new(ChangeSets::default()));
        let worker_changes = Arc::clone(&changes);
        let debounce = Duration::from_secs_f64(config.debounce_seconds.max(0.05));
        let min_interval = Duration::from_secs_f64(config.min_reindex_interval_seconds.max(0.0));

        let worker = std::thread::Builder::new()
            .name("oakci-watcher".to_owned())
            .spawn(move || {
                worker_loop(
                    &receiver,
                    &worker_changes,
                    &indexing,
                    &runtime,
                    debounce,
                    min_interval,
                );
            })
            .ok()?;

        info!(root = %project_root.display(), "file watcher started");
        Some(Self {
            sender,
            worker: Some(worker),
            changes,
            _watcher: watcher,
        })
    }

    /// Queued change count (pending plus deleted).
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let changes = self.changes.lock().expect("change sets lock");
        changes.pending.len() + changes.deleted.len()
    }

    /// Whether the worker thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stops the watcher, draining the debounce window.
    pub fn stop(&mut self) {
        let _ = self.sender.send(WorkerMessage::Stop);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        info!("file watcher stopped");
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

fn worker_loop(
    receiver: &mpsc::Receiver<WorkerMessage>,
    changes: &Arc<Mutex<ChangeSets>>,
    indexing: &Arc<IndexingService>,
    runtime: &tokio::runtime::Handle,
    debounce: Duration,
    min_interval: Duration,
) {
    let mut deadline: Option<Instant> = None;
    let mut last_run: Option<Instant> = None;

    loop {
        let timeout = deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_secs(3600));

        match receiver.recv_timeout(timeout) {
            Ok(WorkerMessage::FsEvent(event)) => {
                if record_event(changes, indexing, &event) {
                    // Every relevant event re-arms the single debounce
                    // window.
                    deadline = Some(Instant::now() + debounce);
                }
            }
            Ok(WorkerMessage::Stop) => {
                // Drain whatever is queued before exiting.
                fire(changes, indexing, runtime);
                return;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if deadline.is_some() {
                    // Respect the minimum interval between runs.
                    if let Some(last) = last_run {
                        let since = Instant::now().duration_since(last);
                        if since < min_interval {
                            deadline = Some(Instant::now() + (min_interval - since));
                            continue;
                        }
                    }
                    deadline = None;
                    last_run = Some(Instant::now());
                    fire(changes, indexing, runtime);
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Files the event touches land in the change sets; returns whether
/// anything relevant was recorded.
fn record_event(
    changes: &Arc<Mutex<ChangeSets>>,
    indexing: &Arc<IndexingService>,
    event: &Event,
) -> bool {
    let mut recorded = false;
    let mut sets = changes.lock().expect("change sets lock");
    for path in &event.paths {
        if !indexing.should_index(path) {
            continue;
        }
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => {
                sets.pending.insert(path.clone());
                recorded = true;
            }
            EventKind::Remove(_) => {
                sets.pending.remove(path);
                sets.deleted.insert(path.clone());
                recorded = true;
            }
            _ => {}
        }
    }
    recorded
}

/// Processes the queued changes. Errors are logged; the worker survives.
fn fire(
    changes: &Arc<Mutex<ChangeSets>>,
    indexing: &Arc<IndexingService>,
    runtime: &tokio::runtime::Handle,
) {
    let (pending, deleted) = {
        let mut sets = changes.lock().expect("change sets lock");
        (
            std::mem::take(&mut sets.pending),
            std::mem::take(&mut sets.deleted),
        )
    };
    if pending.is_empty() && deleted.is_empty() {
        return;
    }

    info!(
        modified = pending.len(),
        deleted = deleted.len(),
        "processing file changes"
    );
    let mut total_chunks = 0;

    for path in &deleted {
        match runtime.block_on(indexing.remove_file(path)) {
            Ok(removed) => debug!(file = %path.display(), removed, "deleted file swept"),
            Err(e) => warn!(file = %path.display(), error = %e, "failed to sweep deleted file"),
        }
    }

    for path in &pending {
        // Deleted after being queued.
        if !path.exists() {
            continue;
        }
        match runtime.block_on(indexing.index_single_file(path)) {
            Ok(chunks) => total_chunks += chunks,
            Err(e) => warn!(file = %path.display(), error = %e, "failed to re-index file"),
        }
    }

    runtime.block_on(indexing.refresh_file_count());
    info!(chunks = total_chunks, "incremental indexing complete");
}

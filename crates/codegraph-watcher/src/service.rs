//! Watcher service (C7, spec §4.7): debounces raw filesystem events, waits
//! for a file to stop changing, then drives the single-file ingest path and
//! publishes what happened.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use codegraph_core::GraphStore;
use codegraph_indexer::{Coordinator, IndexerConfig};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::watcher::{is_code_file, FileWatcher, WatchEvent};

/// What the watcher publishes, spec §4.7's four event kinds.
#[derive(Debug, Clone)]
pub enum WatcherEvent {
    FileChanged(PathBuf),
    GraphUpdated { path: PathBuf, entities: usize, edges: usize },
    FileRemoved(PathBuf),
    ParseError { path: PathBuf, message: String },
}

/// Debounces per-path, ingests single files through `Coordinator::ingest_file`,
/// and sweeps deletes through `GraphStore::delete_file_entities`. Only one
/// watch loop may run at a time per instance (spec §4.7: "start/stop is a
/// singleton lifecycle").
pub struct WatcherService {
    root: PathBuf,
    store: GraphStore,
    coordinator: Arc<Coordinator>,
    config: IndexerConfig,
    events: broadcast::Sender<WatcherEvent>,
    generation: Arc<std::sync::Mutex<HashMap<PathBuf, Arc<AtomicU64>>>>,
    run_handle: Mutex<Option<JoinHandle<()>>>,
}

impl WatcherService {
    pub fn new(root: impl Into<PathBuf>, store: GraphStore, config: IndexerConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        WatcherService {
            root: root.into(),
            store: store.clone(),
            coordinator: Arc::new(Coordinator::new(store)),
            config,
            events,
            generation: Arc::new(std::sync::Mutex::new(HashMap::new())),
            run_handle: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatcherEvent> {
        self.events.subscribe()
    }

    /// Start the watch loop. A second call while one is already running is a
    /// no-op — this is the singleton lifecycle spec §4.7 requires.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let mut handle = self.run_handle.lock().await;
        if handle.is_some() {
            warn!("watcher already running for {}", self.root.display());
            return Ok(());
        }

        let mut file_watcher = FileWatcher::new(&self.root)?;
        file_watcher.watch_directory(&self.root)?;

        let this = self.clone();
        *handle = Some(tokio::spawn(async move {
            this.run(file_watcher).await;
        }));
        info!("watcher started for {}", self.root.display());
        Ok(())
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.run_handle.lock().await.take() {
            handle.abort();
            info!("watcher stopped for {}", self.root.display());
        }
    }

    async fn run(self: Arc<Self>, mut file_watcher: FileWatcher) {
        loop {
            let Some(event) = file_watcher.event_receiver().recv().await else {
                break;
            };
            let (path, removed) = match event {
                WatchEvent::Created(path) | WatchEvent::Modified(path) => (path, false),
                WatchEvent::Removed(path) => (path, true),
            };
            if !is_code_file(&path, &self.config.extensions) {
                continue;
            }

            if removed {
                self.handle_removal(path).await;
                continue;
            }

            self.schedule_debounced_ingest(path);
        }
    }

    /// Cancels any pending timer for `path` (by bumping a generation counter
    /// a stale task will notice) and schedules a new one: wait `debounce_ms`
    /// to coalesce a burst of events, then poll the file's size every
    /// `stability_ms` until two reads agree it has stopped changing, then
    /// ingest it.
    fn schedule_debounced_ingest(self: &Arc<Self>, path: PathBuf) {
        let counter = {
            let mut map = self.generation.lock().unwrap();
            map.entry(path.clone()).or_insert_with(|| Arc::new(AtomicU64::new(0))).clone()
        };
        let my_generation = counter.fetch_add(1, Ordering::SeqCst) + 1;

        let _ = self.events.send(WatcherEvent::FileChanged(path.clone()));

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(this.config.debounce_ms)).await;
            if counter.load(Ordering::SeqCst) != my_generation {
                return; // superseded by a newer event for this path
            }

            loop {
                let before = std::fs::metadata(&path).ok().map(|m| (m.len(), m.modified().ok()));
                tokio::time::sleep(Duration::from_millis(this.config.stability_ms)).await;
                if counter.load(Ordering::SeqCst) != my_generation {
                    return;
                }
                let after = std::fs::metadata(&path).ok().map(|m| (m.len(), m.modified().ok()));
                if before == after {
                    break;
                }
            }

            this.ingest_now(path).await;
        });
    }

    async fn ingest_now(&self, path: PathBuf) {
        match self.coordinator.ingest_file(&self.root, &path, &self.config).await {
            Ok(stats) => {
                let _ = self.events.send(WatcherEvent::GraphUpdated {
                    path,
                    entities: stats.entities,
                    edges: stats.edges,
                });
            }
            Err(e) => {
                let _ = self.events.send(WatcherEvent::ParseError { path, message: e.to_string() });
            }
        }
    }

    async fn handle_removal(&self, path: PathBuf) {
        if let Err(e) = self.store.delete_file_entities(&path).await {
            warn!("failed to sweep removed file {}: {e}", path.display());
            return;
        }
        let _ = self.events.send(WatcherEvent::FileRemoved(path));
    }
}

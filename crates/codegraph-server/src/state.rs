//! Shared server state: the graph store, the ingestion orchestrator, and the
//! analytics scheduler, all handed to every handler via axum's `State`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use codegraph_core::{CoreError, CoreResult, GraphStore};
use codegraph_indexer::Coordinator;
use codegraph_query::AnalyticsScheduler;

pub struct ServerState {
    pub store: GraphStore,
    pub coordinator: Arc<Coordinator>,
    pub scheduler: Arc<AnalyticsScheduler>,
}

impl ServerState {
    pub fn new(store: GraphStore) -> Self {
        let coordinator = Arc::new(Coordinator::new(store.clone()));
        let scheduler = Arc::new(AnalyticsScheduler::new(store.clone(), &Default::default()));
        ServerState { store, coordinator, scheduler }
    }

    /// Finds the indexed project whose root is the longest prefix of `path`
    /// — how single-file endpoints (`/ingest/file`, watcher-driven updates)
    /// recover which project a bare path belongs to.
    pub async fn project_root_for(&self, path: &Path) -> CoreResult<PathBuf> {
        let projects = self.store.get_projects().await?;
        projects
            .into_iter()
            .filter(|p| path.starts_with(&p.root_path))
            .max_by_key(|p| p.root_path.as_os_str().len())
            .map(|p| p.root_path)
            .ok_or_else(|| CoreError::NotFound(format!("no indexed project contains {}", path.display())))
    }
}

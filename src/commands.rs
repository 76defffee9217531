//! CLI command implementations

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use codegraph_core::GraphStore;
use codegraph_indexer::IndexerConfig;
use codegraph_server::ServerState;
use codegraph_watcher::{WatcherEvent, WatcherService};

pub async fn index(root: PathBuf) -> anyhow::Result<()> {
    let root = root.canonicalize().unwrap_or(root);
    let config = IndexerConfig::load(&root)?;
    let state = ServerState::new(GraphStore::new());

    let report = state.coordinator.ingest_project(&root, &config).await?;
    tracing::info!(
        "indexed {} files, {} entities, {} edges in {}ms",
        report.stats.files,
        report.stats.entities,
        report.stats.edges,
        report.stats.duration_ms
    );
    for err in &report.errors {
        tracing::warn!("{}: {}", err.path.display(), err.message);
    }
    state.scheduler.on_ingestion(&root).await;
    Ok(())
}

pub async fn serve(
    root: PathBuf,
    host: String,
    port: u16,
    open: bool,
    no_watch: bool,
) -> anyhow::Result<()> {
    let root = root.canonicalize().unwrap_or(root);
    let config = IndexerConfig::load(&root)?;
    let store = GraphStore::new();
    let state = Arc::new(ServerState::new(store.clone()));

    tracing::info!("indexing {} before serving", root.display());
    let report = state.coordinator.ingest_project(&root, &config).await?;
    tracing::info!(
        "indexed {} files, {} entities, {} edges",
        report.stats.files,
        report.stats.entities,
        report.stats.edges
    );
    state.scheduler.on_ingestion(&root).await;

    // Kept alive for the server's lifetime so its background watch task
    // (and the debounce state it owns) isn't dropped out from under us.
    let _watcher = if no_watch {
        None
    } else {
        let watcher = Arc::new(WatcherService::new(root.clone(), store, config));
        watcher.start().await?;
        let mut events = watcher.subscribe();
        let scheduler = state.scheduler.clone();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if let WatcherEvent::GraphUpdated { path, .. } = event {
                    scheduler.on_file_change(path);
                }
            }
        });
        Some(watcher)
    };

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let router = codegraph_server::create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{addr}");

    if open {
        let _ = open::that(format!("http://{addr}/health"));
    }

    axum::serve(listener, router).await?;
    Ok(())
}

pub async fn watch(root: PathBuf) -> anyhow::Result<()> {
    let root = root.canonicalize().unwrap_or(root);
    let config = IndexerConfig::load(&root)?;
    let store = GraphStore::new();
    let state = ServerState::new(store.clone());

    tracing::info!("indexing {} before watching", root.display());
    let report = state.coordinator.ingest_project(&root, &config).await?;
    tracing::info!(
        "indexed {} files, {} entities, {} edges",
        report.stats.files,
        report.stats.entities,
        report.stats.edges
    );
    state.scheduler.on_ingestion(&root).await;

    let watcher = Arc::new(WatcherService::new(root.clone(), store, config));
    let mut events = watcher.subscribe();
    watcher.start().await?;

    tracing::info!("watching {} for changes (ctrl-c to stop)", root.display());
    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(WatcherEvent::GraphUpdated { path, entities, edges }) => {
                        tracing::info!("{}: {} entities, {} edges", path.display(), entities, edges);
                        state.scheduler.on_file_change(path);
                    }
                    Ok(WatcherEvent::FileRemoved(path)) => {
                        tracing::info!("{}: removed", path.display());
                    }
                    Ok(WatcherEvent::ParseError { path, message }) => {
                        tracing::warn!("{}: {}", path.display(), message);
                    }
                    Ok(WatcherEvent::FileChanged(_)) => {}
                    Err(_) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                watcher.stop().await;
                break;
            }
        }
    }
    Ok(())
}

pub fn clear(root: PathBuf) -> anyhow::Result<()> {
    let root = root.canonicalize().unwrap_or(root);
    tracing::info!("clearing cache for: {}", root.display());
    codegraph_core::clear_cache(&root)?;
    tracing::info!("cache cleared");
    Ok(())
}

//! Integration tests exercising the ingestion, query, and serving pipeline
//! end to end against a scratch project on disk.

use std::fs;
use std::sync::Arc;

use codegraph_core::{GraphStore, NodeKind};
use codegraph_indexer::{Coordinator, IndexerConfig};
use codegraph_query::{full_graph, search, stats};
use codegraph_server::ServerState;
use codegraph_watcher::{WatcherEvent, WatcherService};
use tempfile::TempDir;

fn write_sample_project(dir: &TempDir) {
    fs::write(
        dir.path().join("math.ts"),
        r#"
export function add(a: number, b: number): number {
    return a + b;
}

export function square(x: number): number {
    return add(x, x);
}
"#,
    )
    .unwrap();
}

#[tokio::test]
async fn ingest_project_populates_graph_and_queries_see_it() {
    let dir = TempDir::new().unwrap();
    write_sample_project(&dir);

    let store = GraphStore::new();
    let coordinator = Coordinator::new(store.clone());
    let config = IndexerConfig::load(dir.path()).unwrap();

    let report = coordinator.ingest_project(dir.path(), &config).await.unwrap();
    assert_eq!(report.stats.files, 1);
    assert!(report.stats.entities >= 2, "expected add() and square() to be extracted");
    assert!(report.errors.is_empty());

    let graph = store.read().await;
    let functions: Vec<_> = graph.nodes_of_kind(NodeKind::Function).collect();
    assert!(functions.iter().any(|n| n.name == "add"));
    assert!(functions.iter().any(|n| n.name == "square"));

    let slice = full_graph(&graph, 100, None);
    assert!(slice.nodes.len() >= functions.len());

    let hits = search(&graph, "square", None, 10);
    assert!(hits.iter().any(|h| h.name == "square" && h.score >= 0.99));
}

#[tokio::test]
async fn ingest_file_then_delete_removes_its_entities() {
    let dir = TempDir::new().unwrap();
    write_sample_project(&dir);

    let store = GraphStore::new();
    let coordinator = Coordinator::new(store.clone());
    let config = IndexerConfig::load(dir.path()).unwrap();
    coordinator.ingest_project(dir.path(), &config).await.unwrap();

    let file_path = dir.path().join("math.ts");
    store.delete_file_entities(&file_path).await.unwrap();

    let graph = store.read().await;
    assert!(graph.nodes_of_kind(NodeKind::Function).next().is_none());
}

#[tokio::test]
async fn watcher_emits_graph_updated_on_file_write() {
    let dir = TempDir::new().unwrap();
    write_sample_project(&dir);

    let store = GraphStore::new();
    let config = IndexerConfig::load(dir.path()).unwrap();
    Coordinator::new(store.clone()).ingest_project(dir.path(), &config).await.unwrap();

    let watcher = Arc::new(WatcherService::new(dir.path(), store.clone(), config));
    let mut events = watcher.subscribe();
    watcher.start().await.unwrap();

    // Give the watcher's debounce loop (debounce_ms + stability_ms) room to settle.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    fs::write(
        dir.path().join("math.ts"),
        r#"
export function add(a: number, b: number): number {
    return a + b;
}
"#,
    )
    .unwrap();

    let result = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(WatcherEvent::GraphUpdated { .. }) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    })
    .await;

    watcher.stop().await;
    assert_eq!(result, Ok(true), "expected a GraphUpdated event after editing the watched file");
}

#[tokio::test]
async fn stats_reports_node_and_edge_counts() {
    let dir = TempDir::new().unwrap();
    write_sample_project(&dir);

    let store = GraphStore::new();
    let config = IndexerConfig::load(dir.path()).unwrap();
    Coordinator::new(store.clone()).ingest_project(dir.path(), &config).await.unwrap();

    let graph = store.read().await;
    let s = stats(&graph, 5);
    assert_eq!(s.node_count, graph.node_count());
    assert_eq!(s.edge_count, graph.edge_count());
    assert!(s.counts_by_kind.get(NodeKind::Function.label()).copied().unwrap_or(0) >= 2);
}

#[tokio::test]
async fn server_state_tracks_project_root_after_ingest() {
    let dir = TempDir::new().unwrap();
    write_sample_project(&dir);

    let state = ServerState::new(GraphStore::new());
    let config = IndexerConfig::load(dir.path()).unwrap();
    let report = state.coordinator.ingest_project(dir.path(), &config).await.unwrap();
    assert!(report.stats.entities > 0);

    let root = state.project_root_for(&dir.path().join("math.ts")).await.unwrap();
    assert_eq!(root, dir.path());

    let router = codegraph_server::create_router(Arc::new(state));
    drop(router);
}

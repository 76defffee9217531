//! Analytics scheduler (spec §4.8): derived-property jobs, cached per
//! `(analysisKind, scopeKey)` with a TTL, triggered on ingestion, on a
//! debounced file change, on a periodic schedule, or manually. Mirrors the
//! watcher's generation-counter debounce (`codegraph-watcher/src/service.rs`)
//! for the on-file-change trigger, since it's the same "latest event wins"
//! shape.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use codegraph_core::{EdgeKind, Graph, GraphStore, NodeKind};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisKind {
    Security,
    Complexity,
    Refactoring,
    Dataflow,
    Impact,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Security => "security",
            AnalysisKind::Complexity => "complexity",
            AnalysisKind::Refactoring => "refactoring",
            AnalysisKind::Dataflow => "dataflow",
            AnalysisKind::Impact => "impact",
        }
    }

    pub const ALL: [AnalysisKind; 5] = [
        AnalysisKind::Security,
        AnalysisKind::Complexity,
        AnalysisKind::Refactoring,
        AnalysisKind::Dataflow,
        AnalysisKind::Impact,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisJob {
    pub id: u64,
    pub kind: AnalysisKind,
    pub scope: String,
    pub state: JobState,
}

struct CacheEntry {
    value: Value,
    computed_at: Instant,
    cached_at: chrono::DateTime<chrono::Utc>,
}

const RECENT_JOB_HISTORY: usize = 50;
const FILE_CHANGE_DEBOUNCE: Duration = Duration::from_secs(5);

/// One scheduler per `GraphStore` — holds the TTL cache and recent-job
/// history. Cheap to clone; the debounce state is shared via `Arc`.
#[derive(Clone)]
pub struct AnalyticsScheduler {
    store: GraphStore,
    cache: Arc<DashMap<(AnalysisKind, String), CacheEntry>>,
    ttls: Arc<HashMap<AnalysisKind, Duration>>,
    next_job_id: Arc<AtomicU64>,
    history: Arc<RwLock<VecDeque<AnalysisJob>>>,
    debounce_generation: Arc<DashMap<PathBuf, Arc<AtomicU64>>>,
}

impl AnalyticsScheduler {
    pub fn new(store: GraphStore, ttl_seconds: &HashMap<String, u64>) -> Self {
        let mut ttls = HashMap::new();
        for kind in AnalysisKind::ALL {
            let seconds = ttl_seconds.get(kind.as_str()).copied().unwrap_or(300);
            ttls.insert(kind, Duration::from_secs(seconds));
        }
        AnalyticsScheduler {
            store,
            cache: Arc::new(DashMap::new()),
            ttls: Arc::new(ttls),
            next_job_id: Arc::new(AtomicU64::new(1)),
            history: Arc::new(RwLock::new(VecDeque::new())),
            debounce_generation: Arc::new(DashMap::new()),
        }
    }

    pub async fn recent_jobs(&self) -> Vec<AnalysisJob> {
        self.history.read().await.iter().cloned().collect()
    }

    pub fn invalidate(&self, kind: AnalysisKind, scope: &str) {
        self.cache.remove(&(kind, scope.to_string()));
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Runs `kind` over `scope`, using the cache unless it's stale or
    /// `refresh` is set. `scope` is a root path (analytics are always
    /// computed over a project or a single file within one). The returned
    /// payload always carries a `cachedAt` timestamp so callers can tell a
    /// cache hit from a fresh computation.
    pub async fn run(&self, kind: AnalysisKind, scope: &Path, refresh: bool) -> Value {
        let key = (kind, scope.display().to_string());
        if !refresh {
            if let Some(entry) = self.cache.get(&key) {
                let ttl = self.ttls.get(&kind).copied().unwrap_or(Duration::from_secs(300));
                if entry.computed_at.elapsed() < ttl {
                    return with_cached_at(entry.value.clone(), entry.cached_at);
                }
            }
        }

        let job_id = self.next_job_id.fetch_add(1, Ordering::SeqCst);
        self.push_history(AnalysisJob { id: job_id, kind, scope: key.1.clone(), state: JobState::Running }).await;

        let graph = self.store.read().await;
        let value = compute(&graph, kind, scope);
        drop(graph);

        let cached_at = chrono::Utc::now();
        self.cache.insert(key.clone(), CacheEntry { value: value.clone(), computed_at: Instant::now(), cached_at });
        self.push_history(AnalysisJob { id: job_id, kind, scope: key.1, state: JobState::Completed }).await;
        with_cached_at(value, cached_at)
    }

    async fn push_history(&self, job: AnalysisJob) {
        let mut history = self.history.write().await;
        history.push_front(job);
        history.truncate(RECENT_JOB_HISTORY);
    }

    /// Triggered when an ingest (project or file) completes.
    pub async fn on_ingestion(&self, scope: &Path) {
        info!("analytics: ingestion trigger for {}", scope.display());
        for kind in AnalysisKind::ALL {
            self.invalidate(kind, &scope.display().to_string());
            self.run(kind, scope, false).await;
        }
    }

    /// Triggered on a file change; debounced so a burst of saves only
    /// recomputes once `FILE_CHANGE_DEBOUNCE` after the last one. Only the
    /// last event for a path fires, same shape as the watcher's own debounce.
    pub fn on_file_change(self: &Arc<Self>, path: PathBuf) {
        let counter = self
            .debounce_generation
            .entry(path.clone())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone();
        let my_generation = counter.fetch_add(1, Ordering::SeqCst) + 1;

        let scheduler = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(FILE_CHANGE_DEBOUNCE).await;
            if counter.load(Ordering::SeqCst) != my_generation {
                return;
            }
            for kind in AnalysisKind::ALL {
                scheduler.invalidate(kind, &path.display().to_string());
                scheduler.run(kind, &path, false).await;
            }
        });
    }
}

/// Lightweight graph-metric analyses — not a real static analyzer. Each
/// produces a small JSON summary scoped to `scope` (a root path or a single
/// file beneath one).
/// Stamps a computed analysis payload with the moment it was cached, so a
/// repeat `GET` within the TTL and a `?refresh=true` call are distinguishable
/// by the client (spec S6).
fn with_cached_at(mut value: Value, cached_at: chrono::DateTime<chrono::Utc>) -> Value {
    if let Value::Object(map) = &mut value {
        map.insert("cachedAt".to_string(), Value::String(cached_at.to_rfc3339()));
        return value;
    }
    serde_json::json!({ "result": value, "cachedAt": cached_at.to_rfc3339() })
}

fn compute(graph: &Graph, kind: AnalysisKind, scope: &Path) -> Value {
    match kind {
        AnalysisKind::Security => compute_security(graph, scope),
        AnalysisKind::Complexity => compute_complexity(graph, scope),
        AnalysisKind::Refactoring => compute_refactoring(graph, scope),
        AnalysisKind::Dataflow => compute_dataflow(graph, scope),
        AnalysisKind::Impact => compute_impact(graph, scope),
    }
}

fn in_scope(path: &Path, scope: &Path) -> bool {
    path.starts_with(scope)
}

/// Proxy for attack surface: functions that call out to unresolved externals
/// (network/filesystem/eval-shaped globals would show up here in practice).
fn compute_security(graph: &Graph, scope: &Path) -> Value {
    let mut findings = Vec::new();
    for node in graph.all_nodes().filter(|n| in_scope(&n.file_path, scope)) {
        let external_calls = graph
            .edges_from(&node.id)
            .filter(|e| e.kind == EdgeKind::Calls && e.target.is_external())
            .count();
        if external_calls > 0 {
            findings.push(serde_json::json!({
                "entity": node.id.as_str(),
                "externalCalls": external_calls,
            }));
        }
    }
    serde_json::json!({ "findings": findings })
}

/// Hotspot proxy: out-degree of CALLS edges per function/method, since we
/// don't compute real cyclomatic complexity without a full CFG.
fn compute_complexity(graph: &Graph, scope: &Path) -> Value {
    let mut hotspots: Vec<(String, usize)> = graph
        .all_nodes()
        .filter(|n| in_scope(&n.file_path, scope) && matches!(n.kind, NodeKind::Function | NodeKind::Method))
        .map(|n| {
            let calls = graph.edges_from(&n.id).filter(|e| e.kind == EdgeKind::Calls).count();
            (n.id.as_str().to_string(), calls)
        })
        .collect();
    hotspots.sort_by(|a, b| b.1.cmp(&a.1));
    hotspots.truncate(20);
    serde_json::json!({ "hotspots": hotspots })
}

/// Candidates: entities with many callers but only one caller-file — a
/// structural smell, not a proven refactor.
fn compute_refactoring(graph: &Graph, scope: &Path) -> Value {
    let mut candidates = Vec::new();
    for node in graph.all_nodes().filter(|n| in_scope(&n.file_path, scope)) {
        let callers: Vec<_> = graph.edges_to(&node.id).filter(|e| e.kind == EdgeKind::Calls).collect();
        if callers.len() >= 5 {
            candidates.push(serde_json::json!({ "entity": node.id.as_str(), "callerCount": callers.len() }));
        }
    }
    serde_json::json!({ "candidates": candidates })
}

/// Naive forward closure over type/param/return edges from every entity in
/// scope, standing in for real taint propagation.
fn compute_dataflow(graph: &Graph, scope: &Path) -> Value {
    let mut edges_seen = 0usize;
    for node in graph.all_nodes().filter(|n| in_scope(&n.file_path, scope)) {
        edges_seen += graph
            .edges_from(&node.id)
            .filter(|e| matches!(e.kind, EdgeKind::UsesType | EdgeKind::HasParam | EdgeKind::Returns))
            .count();
    }
    serde_json::json!({ "typeFlowEdges": edges_seen })
}

/// `impact/<symbol>`: BFS over incoming edges from `scope` treated as a
/// single symbol's file, reporting the reachable set as its blast radius.
fn compute_impact(graph: &Graph, scope: &Path) -> Value {
    let seeds: Vec<_> = graph.all_nodes().filter(|n| n.file_path == scope).map(|n| n.id.clone()).collect();
    let mut visited: std::collections::HashSet<_> = seeds.iter().cloned().collect();
    let mut frontier = seeds;
    for _ in 0..3 {
        let mut next = Vec::new();
        for id in &frontier {
            for edge in graph.edges_to(id) {
                if visited.insert(edge.source.clone()) {
                    next.push(edge.source.clone());
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    serde_json::json!({ "radius": visited.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::{EdgeKind, GraphEdge, GraphNode, NodeId};
    use std::path::PathBuf;

    async fn build_store() -> GraphStore {
        let store = GraphStore::new();
        let file = PathBuf::from("/repo/a.ts");
        let foo = NodeId::entity(NodeKind::Function, &file, "foo", 1);
        let bar = NodeId::entity(NodeKind::Function, &file, "bar", 5);
        let batch = codegraph_core::FileEntities {
            file_path: file.clone(),
            file_node: GraphNode::new(NodeId::file(&file), NodeKind::File, "a.ts", file.clone()),
            entities: vec![
                GraphNode::new(foo.clone(), NodeKind::Function, "foo", file.clone()),
                GraphNode::new(bar.clone(), NodeKind::Function, "bar", file.clone()),
            ],
            edges: vec![GraphEdge::new(foo, bar, EdgeKind::Calls)],
        };
        store.batch_upsert(batch).await.unwrap();
        store
    }

    #[tokio::test]
    async fn run_caches_until_ttl_expires() {
        let store = build_store().await;
        let mut ttls = HashMap::new();
        ttls.insert("complexity".to_string(), 3600u64);
        let scheduler = AnalyticsScheduler::new(store, &ttls);
        let scope = PathBuf::from("/repo");
        let first = scheduler.run(AnalysisKind::Complexity, &scope, false).await;
        let second = scheduler.run(AnalysisKind::Complexity, &scope, false).await;
        assert_eq!(first, second);
        assert_eq!(scheduler.recent_jobs().await.len(), 2);
    }

    #[tokio::test]
    async fn refresh_bypasses_cache_and_bumps_cached_at() {
        let store = build_store().await;
        let scheduler = AnalyticsScheduler::new(store, &HashMap::new());
        let scope = PathBuf::from("/repo");
        let first = scheduler.run(AnalysisKind::Impact, &scope, false).await;
        let second = scheduler.run(AnalysisKind::Impact, &scope, true).await;
        assert_eq!(scheduler.recent_jobs().await.len(), 4);
        assert!(first["cachedAt"].is_string());
        assert_ne!(first["cachedAt"], second["cachedAt"]);
    }

    #[tokio::test]
    async fn complexity_ranks_functions_by_outgoing_calls() {
        let store = build_store().await;
        let scheduler = AnalyticsScheduler::new(store, &HashMap::new());
        let value = scheduler.run(AnalysisKind::Complexity, &PathBuf::from("/repo"), false).await;
        let hotspots = value["hotspots"].as_array().unwrap();
        assert!(hotspots.iter().any(|h| h[0].as_str().unwrap().contains("foo")));
    }
}

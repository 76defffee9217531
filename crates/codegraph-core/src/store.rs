//! Graph Operations Layer (C5, spec §4.5) — the only place the graph engine
//! is mutated. The ingestion orchestrator and the watcher call through here;
//! the query service only ever takes `GraphStore::read()`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard};

use crate::error::{CoreError, CoreResult};
use crate::graph::Graph;
use crate::model::{EdgeKind, GraphEdge, GraphNode, NodeId, NodeKind, Project};

/// One file's worth of resolved entities, ready for `batch_upsert`. Produced
/// by the orchestrator once pass-two symbol resolution has run (spec
/// §4.3/§4.4) — every edge endpoint is already a final structural ID,
/// externals included.
#[derive(Debug, Clone)]
pub struct FileEntities {
    pub file_path: PathBuf,
    pub file_node: GraphNode,
    pub entities: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Counts returned from a `batch_upsert` call (spec §4.6's per-file stats).
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchStats {
    /// Includes the File node itself.
    pub entities_upserted: usize,
    pub entities_removed: usize,
    /// Includes the synthesized CONTAINS edges File -> entity.
    pub edges_upserted: usize,
}

struct Inner {
    graph: RwLock<Graph>,
    file_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
    project_locks: DashMap<String, Arc<Mutex<()>>>,
    project_roots: DashMap<PathBuf, String>,
}

/// Thread-safe handle to the code graph. Cheap to clone; share one instance
/// across the orchestrator, watcher, and HTTP server.
#[derive(Clone)]
pub struct GraphStore {
    inner: Arc<Inner>,
}

impl GraphStore {
    pub fn new() -> Self {
        GraphStore {
            inner: Arc::new(Inner {
                graph: RwLock::new(Graph::new()),
                file_locks: DashMap::new(),
                project_locks: DashMap::new(),
                project_roots: DashMap::new(),
            }),
        }
    }

    /// Read-only access to the underlying graph. The query service is the
    /// only consumer outside this module; it never mutates through here.
    pub async fn read(&self) -> RwLockReadGuard<'_, Graph> {
        self.inner.graph.read().await
    }

    fn file_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        self.inner
            .file_locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn project_lock(&self, id: &str) -> Arc<Mutex<()>> {
        self.inner
            .project_locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ---- Project operations --------------------------------------------

    pub async fn upsert_project(&self, project: Project) -> CoreResult<Project> {
        let lock = self.project_lock(&project.id);
        let _guard = lock.lock().await;
        self.inner
            .project_roots
            .insert(project.root_path.clone(), project.id.clone());
        let node = project_to_node(&project);
        let mut graph = self.inner.graph.write().await;
        graph.upsert_node(node);
        Ok(project)
    }

    pub async fn get_project_by_root(&self, root: &Path) -> CoreResult<Option<Project>> {
        let Some(id) = self.inner.project_roots.get(root).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        self.get_project(&id).await
    }

    pub async fn get_project(&self, id: &str) -> CoreResult<Option<Project>> {
        let graph = self.inner.graph.read().await;
        let Some(node) = graph.node(&NodeId::project(id)) else {
            return Ok(None);
        };
        let file_count = graph
            .edges_from(&node.id)
            .filter(|e| e.kind == EdgeKind::ContainsFile)
            .count() as u32;
        Ok(Some(node_to_project(node, file_count)))
    }

    pub async fn get_projects(&self) -> CoreResult<Vec<Project>> {
        let graph = self.inner.graph.read().await;
        let mut out = Vec::new();
        for node in graph.nodes_of_kind(NodeKind::Project) {
            let file_count = graph
                .edges_from(&node.id)
                .filter(|e| e.kind == EdgeKind::ContainsFile)
                .count() as u32;
            out.push(node_to_project(node, file_count));
        }
        Ok(out)
    }

    /// Idempotent CONTAINS_FILE edge, project -> file. Keeps invariant 6
    /// (fileCount == outgoing CONTAINS_FILE edge count) true by construction,
    /// since `get_project`/`get_projects` always recompute it live.
    pub async fn link_project_file(&self, project_id: &str, file_path: &Path) -> CoreResult<()> {
        let mut graph = self.inner.graph.write().await;
        if !graph.contains_node(&NodeId::project(project_id)) {
            return Err(CoreError::NotFound(format!("project {project_id}")));
        }
        graph.upsert_edge(GraphEdge::new(
            NodeId::project(project_id),
            NodeId::file(file_path),
            EdgeKind::ContainsFile,
        ));
        Ok(())
    }

    /// Cascading delete: every File this project contains (and their
    /// entities), then the project node itself. Holds the project's lock for
    /// the duration so a concurrent ingest targeting the same project cannot
    /// interleave with the delete (spec §5).
    pub async fn delete_project(&self, id: &str) -> CoreResult<()> {
        let lock = self.project_lock(id);
        let _guard = lock.lock().await;

        let project_node = NodeId::project(id);
        let file_paths: Vec<PathBuf> = {
            let graph = self.inner.graph.read().await;
            if !graph.contains_node(&project_node) {
                return Err(CoreError::NotFound(format!("project {id}")));
            }
            graph
                .edges_from(&project_node)
                .filter(|e| e.kind == EdgeKind::ContainsFile)
                .filter_map(|e| {
                    graph
                        .node(&e.target)
                        .filter(|n| n.kind == NodeKind::File)
                        .map(|n| n.file_path.clone())
                })
                .collect()
        };

        for path in &file_paths {
            self.delete_file_entities(path).await?;
        }

        let mut graph = self.inner.graph.write().await;
        graph.remove_node(&project_node);
        self.inner.project_roots.retain(|_, v| v.as_str() != id);
        Ok(())
    }

    // ---- File ingestion (the hot path) ---------------------------------

    /// MERGE a file's File node plus its resolved entities and edges.
    /// Ordering follows spec §4.5 exactly: upsert File, stale-sweep entities
    /// that belonged to this file but are absent from the new set, THEN
    /// upsert the new set, THEN CONTAINS edges, THEN the resolved edges.
    /// Serialized per file path so two ingests of the same file never race;
    /// distinct files proceed fully concurrently.
    pub async fn batch_upsert(&self, mut batch: FileEntities) -> CoreResult<BatchStats> {
        let lock = self.file_lock(&batch.file_path);
        let _guard = lock.lock().await;

        let mut stats = BatchStats::default();
        let mut graph = self.inner.graph.write().await;

        let file_id = graph.upsert_node(batch.file_node.clone());
        stats.entities_upserted += 1;

        let new_ids: HashSet<NodeId> = batch.entities.iter().map(|n| n.id.clone()).collect();
        let stale: Vec<NodeId> = graph
            .nodes_in_file(&batch.file_path)
            .into_iter()
            .filter(|id| *id != file_id && !new_ids.contains(id))
            .collect();
        for id in stale {
            if graph.remove_node(&id).is_some() {
                stats.entities_removed += 1;
            }
        }

        for node in batch.entities.drain(..) {
            graph.upsert_node(node);
            stats.entities_upserted += 1;
        }

        for entity_id in &new_ids {
            graph.upsert_edge(GraphEdge::new(file_id.clone(), entity_id.clone(), EdgeKind::Contains));
            stats.edges_upserted += 1;
        }

        for edge in batch.edges.drain(..) {
            if edge.target.is_external() && !graph.contains_node(&edge.target) {
                let label = edge.target.as_str().split(':').next().unwrap_or("");
                let kind = NodeKind::from_label(label).unwrap_or(NodeKind::Type);
                let name = edge.target.as_str().rsplit(':').next().unwrap_or("");
                graph.upsert_node(
                    GraphNode::new(edge.target.clone(), kind, name, PathBuf::new())
                        .with_meta("external", serde_json::json!(true)),
                );
            }
            graph.upsert_edge(edge);
            stats.edges_upserted += 1;
        }

        Ok(stats)
    }

    /// Cascade delete every node whose `file_path` matches (spec §3 invariant
    /// 3/4) — the File node and everything it CONTAINS. External sentinels
    /// are untouched since they never carry a real `file_path`.
    pub async fn delete_file_entities(&self, path: &Path) -> CoreResult<()> {
        let lock = self.file_lock(path);
        let _guard = lock.lock().await;

        let mut graph = self.inner.graph.write().await;
        for id in graph.nodes_in_file(path) {
            graph.remove_node(&id);
        }
        Ok(())
    }

    /// Destructive: drops every node and edge, and all tracked project roots.
    pub async fn clear_all(&self) -> CoreResult<()> {
        let mut graph = self.inner.graph.write().await;
        graph.clear();
        self.inner.project_roots.clear();
        Ok(())
    }

    pub async fn node_count(&self) -> usize {
        self.inner.graph.read().await.node_count()
    }

    pub async fn edge_count(&self) -> usize {
        self.inner.graph.read().await.edge_count()
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

fn project_to_node(project: &Project) -> GraphNode {
    GraphNode::new(
        project.node_id(),
        NodeKind::Project,
        project.name.clone(),
        project.root_path.clone(),
    )
    .with_meta(
        "rootPath",
        serde_json::json!(project.root_path.display().to_string()),
    )
    .with_meta("createdAt", serde_json::json!(project.created_at.to_rfc3339()))
    .with_meta(
        "lastParsed",
        serde_json::json!(project.last_parsed.map(|t| t.to_rfc3339())),
    )
    .with_meta(
        "workspaceType",
        serde_json::json!(project.workspace_type.map(|w| w.label())),
    )
}

fn node_to_project(node: &GraphNode, file_count: u32) -> Project {
    let id = node
        .id
        .as_str()
        .strip_prefix("Project:")
        .unwrap_or(node.id.as_str())
        .to_string();
    let created_at = node
        .metadata
        .get("createdAt")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now);
    let last_parsed = node
        .metadata
        .get("lastParsed")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&chrono::Utc));
    let workspace_type = node
        .metadata
        .get("workspaceType")
        .and_then(|v| v.as_str())
        .and_then(crate::workspace::WorkspaceType::from_label);
    Project {
        id,
        name: node.name.clone(),
        root_path: node.file_path.clone(),
        created_at,
        last_parsed,
        file_count,
        workspace_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, kind: NodeKind, file: &str, line: u32) -> GraphNode {
        GraphNode::new(NodeId(id.to_string()), kind, id, PathBuf::from(file)).with_lines(line, line)
    }

    #[tokio::test]
    async fn batch_upsert_is_idempotent() {
        let store = GraphStore::new();
        let file_path = PathBuf::from("/repo/a.ts");
        let batch = FileEntities {
            file_path: file_path.clone(),
            file_node: GraphNode::new(NodeId::file(&file_path), NodeKind::File, "a.ts", file_path.clone()),
            entities: vec![node("Function:/repo/a.ts:foo:1", NodeKind::Function, "/repo/a.ts", 1)],
            edges: vec![],
        };
        let first = store.batch_upsert(batch.clone()).await.unwrap();
        let second = store.batch_upsert(batch).await.unwrap();
        assert_eq!(first.entities_upserted, second.entities_upserted);
        assert_eq!(store.node_count().await, 2);
    }

    #[tokio::test]
    async fn batch_upsert_sweeps_stale_entities() {
        let store = GraphStore::new();
        let file_path = PathBuf::from("/repo/a.ts");
        let file_node = GraphNode::new(NodeId::file(&file_path), NodeKind::File, "a.ts", file_path.clone());

        store
            .batch_upsert(FileEntities {
                file_path: file_path.clone(),
                file_node: file_node.clone(),
                entities: vec![node("Function:/repo/a.ts:foo:1", NodeKind::Function, "/repo/a.ts", 1)],
                edges: vec![],
            })
            .await
            .unwrap();
        assert_eq!(store.node_count().await, 2);

        let stats = store
            .batch_upsert(FileEntities {
                file_path: file_path.clone(),
                file_node,
                entities: vec![node("Function:/repo/a.ts:bar:1", NodeKind::Function, "/repo/a.ts", 1)],
                edges: vec![],
            })
            .await
            .unwrap();
        assert_eq!(stats.entities_removed, 1);
        assert_eq!(store.node_count().await, 2);
    }

    #[tokio::test]
    async fn delete_file_entities_cascades() {
        let store = GraphStore::new();
        let file_path = PathBuf::from("/repo/a.ts");
        store
            .batch_upsert(FileEntities {
                file_path: file_path.clone(),
                file_node: GraphNode::new(NodeId::file(&file_path), NodeKind::File, "a.ts", file_path.clone()),
                entities: vec![node("Function:/repo/a.ts:foo:1", NodeKind::Function, "/repo/a.ts", 1)],
                edges: vec![],
            })
            .await
            .unwrap();
        store.delete_file_entities(&file_path).await.unwrap();
        assert_eq!(store.node_count().await, 0);
    }

    #[tokio::test]
    async fn project_file_count_tracks_contains_file_edges() {
        let store = GraphStore::new();
        let project = Project::new(PathBuf::from("/repo"));
        let project = store.upsert_project(project).await.unwrap();
        store
            .link_project_file(&project.id, &PathBuf::from("/repo/a.ts"))
            .await
            .unwrap();
        store
            .link_project_file(&project.id, &PathBuf::from("/repo/b.ts"))
            .await
            .unwrap();
        let fetched = store.get_project(&project.id).await.unwrap().unwrap();
        assert_eq!(fetched.file_count, 2);
    }

    #[tokio::test]
    async fn workspace_type_round_trips_through_project_node() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();

        let store = GraphStore::new();
        let project = Project::new(dir.path().to_path_buf());
        assert_eq!(project.workspace_type, Some(crate::workspace::WorkspaceType::Npm));

        let project = store.upsert_project(project).await.unwrap();
        let fetched = store.get_project(&project.id).await.unwrap().unwrap();
        assert_eq!(fetched.workspace_type, Some(crate::workspace::WorkspaceType::Npm));
    }

    #[tokio::test]
    async fn external_sentinels_materialize_lazily() {
        let store = GraphStore::new();
        let file_path = PathBuf::from("/repo/a.ts");
        let target = NodeId::external(NodeKind::Function, "lodash.map");
        store
            .batch_upsert(FileEntities {
                file_path: file_path.clone(),
                file_node: GraphNode::new(NodeId::file(&file_path), NodeKind::File, "a.ts", file_path.clone()),
                entities: vec![node("Function:/repo/a.ts:foo:1", NodeKind::Function, "/repo/a.ts", 1)],
                edges: vec![GraphEdge::new(
                    NodeId("Function:/repo/a.ts:foo:1".to_string()),
                    target.clone(),
                    EdgeKind::Calls,
                )],
            })
            .await
            .unwrap();
        let graph = store.read().await;
        assert!(graph.contains_node(&target));
    }
}

//! Read-only query operations (C8, spec §4.8). Every function here takes a
//! `&Graph` straight out of `GraphStore::read()` — this layer never holds a
//! write guard and never reaches for the store's mutation API.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use codegraph_core::{CoreError, CoreResult, EdgeKind, Graph, GraphEdge, GraphNode, NodeId, NodeKind};
use serde::Serialize;

/// A bounded slice of the graph: the shape every node/edge-returning endpoint
/// in spec §6 responds with.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphSlice {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborDirection {
    In,
    Out,
    Both,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityConnections {
    pub entity: GraphNode,
    pub incoming: Vec<GraphEdge>,
    pub outgoing: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: NodeId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub file_path: PathBuf,
    pub line: Option<u32>,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub counts_by_kind: HashMap<String, usize>,
    pub top_files: Vec<(PathBuf, usize)>,
    pub top_connected: Vec<(NodeId, usize)>,
}

/// Project scoping is a `filePath STARTS WITH rootPath` predicate applied
/// here, at the storage-read layer — never pushed up into a caller (spec
/// §4.8). `root` of `None` means unscoped.
fn in_scope(file_path: &Path, root: Option<&Path>) -> bool {
    match root {
        None => true,
        Some(root) => file_path.starts_with(root),
    }
}

/// `fullGraph(limit, rootPath?)` — bounded fetch. Nodes are capped at
/// `limit`; edges are included only where both endpoints survived the cap.
pub fn full_graph(graph: &Graph, limit: usize, root_path: Option<&Path>) -> GraphSlice {
    let nodes: Vec<GraphNode> = graph
        .all_nodes()
        .filter(|n| in_scope(&n.file_path, root_path))
        .take(limit)
        .cloned()
        .collect();
    let ids: HashSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
    let edges: Vec<GraphEdge> = graph
        .all_edges()
        .filter(|e| ids.contains(&e.source) && ids.contains(&e.target))
        .cloned()
        .collect();
    GraphSlice { nodes, edges }
}

/// `fileSubgraph(path)` — the File node, everything it CONTAINS, and those
/// entities' immediate edges in either direction.
pub fn file_subgraph(graph: &Graph, path: &Path) -> CoreResult<GraphSlice> {
    let file_id = NodeId::file(path);
    let file_node = graph
        .node(&file_id)
        .ok_or_else(|| CoreError::NotFound(format!("file {}", path.display())))?
        .clone();

    let mut nodes = vec![file_node];
    let mut ids: HashSet<NodeId> = HashSet::new();
    ids.insert(file_id.clone());

    let contains: Vec<GraphEdge> = graph
        .edges_from(&file_id)
        .filter(|e| e.kind == EdgeKind::Contains)
        .cloned()
        .collect();
    for edge in &contains {
        if let Some(node) = graph.node(&edge.target) {
            if ids.insert(node.id.clone()) {
                nodes.push(node.clone());
            }
        }
    }

    let mut edges = contains;
    for id in ids.iter().cloned().collect::<Vec<_>>() {
        if id == file_id {
            continue;
        }
        edges.extend(graph.edges_from(&id).cloned());
        edges.extend(graph.edges_to(&id).cloned());
    }
    dedupe_edges(&mut edges);

    Ok(GraphSlice { nodes, edges })
}

/// `entityWithConnections(id, depth)`. Resolves by structural ID first; if
/// that lookup misses, falls back to treating `id` as a `name:filePath:line`
/// composite key (the shape a caller would have if it reconstructed an ID by
/// hand rather than round-tripping one this service returned).
pub fn entity_with_connections(graph: &Graph, id: &str, depth: u32) -> CoreResult<Option<EntityConnections>> {
    let entity = match graph.node(&NodeId(id.to_string())) {
        Some(n) => n.clone(),
        None => match resolve_by_fallback_key(graph, id) {
            Some(n) => n,
            None => return Ok(None),
        },
    };

    let mut incoming: Vec<GraphEdge> = graph.edges_to(&entity.id).cloned().collect();
    let mut outgoing: Vec<GraphEdge> = graph.edges_from(&entity.id).cloned().collect();

    if depth > 1 {
        let frontier: Vec<NodeId> = incoming
            .iter()
            .map(|e| e.source.clone())
            .chain(outgoing.iter().map(|e| e.target.clone()))
            .collect();
        for id in frontier {
            incoming.extend(graph.edges_to(&id).cloned());
            outgoing.extend(graph.edges_from(&id).cloned());
        }
    }

    dedupe_edges(&mut incoming);
    dedupe_edges(&mut outgoing);
    Ok(Some(EntityConnections { entity, incoming, outgoing }))
}

/// `name:filePath:startLine` — not a real structural ID, just a convenience
/// key for callers that don't have one handy.
fn resolve_by_fallback_key(graph: &Graph, key: &str) -> Option<GraphNode> {
    let mut parts = key.rsplitn(3, ':');
    let line: u32 = parts.next()?.parse().ok()?;
    let file_path = parts.next()?;
    let name = parts.next()?;
    graph
        .all_nodes()
        .find(|n| n.name == name && n.file_path == Path::new(file_path) && n.start_line == Some(line))
        .cloned()
}

/// `neighbors(id, direction, edgeTypes?, depth)`. BFS bounded at
/// `depth * 50` nodes total (including the center).
pub fn neighbors(
    graph: &Graph,
    id: &str,
    direction: NeighborDirection,
    edge_types: Option<&[EdgeKind]>,
    depth: u32,
) -> CoreResult<GraphSlice> {
    let center = NodeId(id.to_string());
    if graph.node(&center).is_none() {
        return Err(CoreError::NotFound(format!("entity {id}")));
    }

    let cap = (depth.max(1) as usize) * 50;
    let matches_type = |kind: EdgeKind| edge_types.map(|ts| ts.contains(&kind)).unwrap_or(true);

    let mut visited: HashSet<NodeId> = HashSet::new();
    visited.insert(center.clone());
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut frontier = vec![center];

    for _ in 0..depth.max(1) {
        if visited.len() >= cap {
            break;
        }
        let mut next = Vec::new();
        for id in &frontier {
            if matches!(direction, NeighborDirection::Out | NeighborDirection::Both) {
                for edge in graph.edges_from(id).filter(|e| matches_type(e.kind)) {
                    edges.push(edge.clone());
                    if visited.insert(edge.target.clone()) {
                        next.push(edge.target.clone());
                    }
                }
            }
            if matches!(direction, NeighborDirection::In | NeighborDirection::Both) {
                for edge in graph.edges_to(id).filter(|e| matches_type(e.kind)) {
                    edges.push(edge.clone());
                    if visited.insert(edge.source.clone()) {
                        next.push(edge.source.clone());
                    }
                }
            }
            if visited.len() >= cap {
                break;
            }
        }
        frontier = next;
        if frontier.is_empty() {
            break;
        }
    }

    for id in &visited {
        if let Some(node) = graph.node(id) {
            nodes.push(node.clone());
        }
    }
    dedupe_edges(&mut edges);
    Ok(GraphSlice { nodes, edges })
}

/// `listNodes({page, limit, types?, q?, rootPath?})` — server-side paginated.
pub fn list_nodes(
    graph: &Graph,
    page: u32,
    limit: u32,
    types: Option<&[NodeKind]>,
    q: Option<&str>,
    root_path: Option<&Path>,
) -> Page<GraphNode> {
    let limit = limit.clamp(1, 100);
    let q_lower = q.map(|s| s.to_lowercase());

    let matches = |n: &&GraphNode| {
        in_scope(&n.file_path, root_path)
            && types.map(|ts| ts.contains(&n.kind)).unwrap_or(true)
            && q_lower
                .as_ref()
                .map(|q| n.name.to_lowercase().contains(q) || n.file_path.to_string_lossy().to_lowercase().contains(q))
                .unwrap_or(true)
    };

    let mut all: Vec<&GraphNode> = graph.all_nodes().filter(matches).collect();
    all.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
    let total = all.len();
    let start = (page.saturating_sub(1) as usize) * (limit as usize);
    let items = all
        .into_iter()
        .skip(start)
        .take(limit as usize)
        .cloned()
        .collect();

    Page { items, page: page.max(1), limit, total }
}

/// `search(q, types?, limit)` — fuzzy by name: exact match scores highest,
/// then prefix, then substring.
pub fn search(graph: &Graph, q: &str, types: Option<&[NodeKind]>, limit: usize) -> Vec<SearchHit> {
    let needle = q.to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit> = graph
        .all_nodes()
        .filter(|n| types.map(|ts| ts.contains(&n.kind)).unwrap_or(true))
        .filter_map(|n| {
            let name_lower = n.name.to_lowercase();
            let score = if name_lower == needle {
                1.0
            } else if name_lower.starts_with(&needle) {
                0.75
            } else if name_lower.contains(&needle) {
                0.5
            } else {
                return None;
            };
            Some(SearchHit {
                id: n.id.clone(),
                name: n.name.clone(),
                kind: n.kind,
                file_path: n.file_path.clone(),
                line: n.start_line,
                score,
            })
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap().then_with(|| a.name.cmp(&b.name)));
    hits.truncate(limit);
    hits
}

/// `stats()` — totals, counts-by-label, top-N largest files, top-N
/// most-connected entities.
pub fn stats(graph: &Graph, top_n: usize) -> GraphStats {
    let mut counts_by_kind: HashMap<String, usize> = HashMap::new();
    let mut file_entity_counts: HashMap<PathBuf, usize> = HashMap::new();
    let mut degree: HashMap<NodeId, usize> = HashMap::new();

    for node in graph.all_nodes() {
        *counts_by_kind.entry(node.kind.label().to_string()).or_insert(0) += 1;
        if node.kind != NodeKind::File {
            *file_entity_counts.entry(node.file_path.clone()).or_insert(0) += 1;
        }
    }
    for edge in graph.all_edges() {
        *degree.entry(edge.source.clone()).or_insert(0) += 1;
        *degree.entry(edge.target.clone()).or_insert(0) += 1;
    }

    let mut top_files: Vec<(PathBuf, usize)> = file_entity_counts.into_iter().collect();
    top_files.sort_by(|a, b| b.1.cmp(&a.1));
    top_files.truncate(top_n);

    let mut top_connected: Vec<(NodeId, usize)> = degree.into_iter().collect();
    top_connected.sort_by(|a, b| b.1.cmp(&a.1));
    top_connected.truncate(top_n);

    GraphStats {
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        counts_by_kind,
        top_files,
        top_connected,
    }
}

/// De-duplicate by `(type, endpoint)` as spec §4.8 requires for connection
/// and neighbor results. Within a single direction the center is always one
/// fixed side of the edge, so keying on the full `(kind, source, target)`
/// triple is equivalent to keying on `(kind, other-endpoint)`.
fn dedupe_edges(edges: &mut Vec<GraphEdge>) {
    let mut seen: HashSet<(EdgeKind, NodeId, NodeId)> = HashSet::new();
    edges.retain(|e| seen.insert((e.kind, e.source.clone(), e.target.clone())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::{GraphEdge, GraphNode};

    fn build_graph() -> Graph {
        let mut graph = Graph::new();
        let file = PathBuf::from("/repo/a.ts");
        graph.upsert_node(GraphNode::new(NodeId::file(&file), NodeKind::File, "a.ts", file.clone()));
        let foo = NodeId::entity(NodeKind::Function, &file, "foo", 1);
        let bar = NodeId::entity(NodeKind::Function, &file, "bar", 5);
        graph.upsert_node(GraphNode::new(foo.clone(), NodeKind::Function, "foo", file.clone()).with_lines(1, 3));
        graph.upsert_node(GraphNode::new(bar.clone(), NodeKind::Function, "bar", file.clone()).with_lines(5, 8));
        graph.upsert_edge(GraphEdge::new(NodeId::file(&file), foo.clone(), EdgeKind::Contains));
        graph.upsert_edge(GraphEdge::new(NodeId::file(&file), bar.clone(), EdgeKind::Contains));
        graph.upsert_edge(GraphEdge::new(foo.clone(), bar.clone(), EdgeKind::Calls));
        graph
    }

    #[test]
    fn full_graph_respects_limit() {
        let graph = build_graph();
        let slice = full_graph(&graph, 1, None);
        assert_eq!(slice.nodes.len(), 1);
    }

    #[test]
    fn file_subgraph_includes_contained_entities_and_calls() {
        let graph = build_graph();
        let slice = file_subgraph(&graph, Path::new("/repo/a.ts")).unwrap();
        assert_eq!(slice.nodes.len(), 3);
        assert!(slice.edges.iter().any(|e| e.kind == EdgeKind::Calls));
    }

    #[test]
    fn entity_with_connections_resolves_by_fallback_key() {
        let graph = build_graph();
        let result = entity_with_connections(&graph, "foo:/repo/a.ts:1", 1).unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().entity.name, "foo");
    }

    #[test]
    fn neighbors_follows_outgoing_edges() {
        let graph = build_graph();
        let file = PathBuf::from("/repo/a.ts");
        let foo = NodeId::entity(NodeKind::Function, &file, "foo", 1);
        let slice = neighbors(&graph, foo.as_str(), NeighborDirection::Out, None, 1).unwrap();
        assert!(slice.nodes.iter().any(|n| n.name == "bar"));
    }

    #[test]
    fn search_ranks_exact_match_above_substring() {
        let graph = build_graph();
        let hits = search(&graph, "foo", None, 10);
        assert_eq!(hits[0].name, "foo");
        assert_eq!(hits[0].score, 1.0);
    }

    #[test]
    fn list_nodes_paginates_and_filters_by_query() {
        let graph = build_graph();
        let page = list_nodes(&graph, 1, 1, None, Some("foo"), None);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, 1);
    }

    #[test]
    fn stats_counts_by_kind() {
        let graph = build_graph();
        let s = stats(&graph, 5);
        assert_eq!(s.counts_by_kind.get("Function"), Some(&2));
    }
}

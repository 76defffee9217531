//! In-process graph engine: a `petgraph::StableDiGraph` indexed by
//! structural `NodeId`/`EdgeId` so every write is a true MERGE (spec §4.5).
//!
//! This module stands in for the "embedded graph database engine" spec §1
//! treats as an external collaborator — the Graph Operations Layer (`store.rs`)
//! is the public contract; this is just its storage.

use crate::model::*;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use std::path::Path;

/// The code graph — a directed multigraph keyed by structural ID.
pub struct Graph {
    inner: StableDiGraph<GraphNode, GraphEdge>,
    node_index: HashMap<NodeId, NodeIndex>,
    edge_index: HashMap<EdgeId, EdgeIndex>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            inner: StableDiGraph::new(),
            node_index: HashMap::new(),
            edge_index: HashMap::new(),
        }
    }

    /// MERGE a node on its structural ID: update in place if present,
    /// otherwise insert. Returns the (unchanged) `NodeId`.
    pub fn upsert_node(&mut self, node: GraphNode) -> NodeId {
        let id = node.id.clone();
        if let Some(&idx) = self.node_index.get(&id) {
            self.inner[idx] = node;
        } else {
            let idx = self.inner.add_node(node);
            self.node_index.insert(id.clone(), idx);
        }
        id
    }

    /// MERGE an edge on (source, target, kind). For `Calls` edges, apply
    /// `ON CREATE count = 1, ON MATCH count += 1` (spec §4.5).
    pub fn upsert_edge(&mut self, mut edge: GraphEdge) -> EdgeId {
        let id = edge.id;
        if let Some(&idx) = self.edge_index.get(&id) {
            let existing = &mut self.inner[idx];
            if edge.kind == EdgeKind::Calls {
                let count = existing.count() + 1;
                existing
                    .properties
                    .insert("count".to_string(), serde_json::json!(count));
            } else {
                existing.properties.extend(edge.properties.drain());
            }
            return id;
        }

        if edge.kind == EdgeKind::Calls && !edge.properties.contains_key("count") {
            edge.properties.insert("count".to_string(), serde_json::json!(1));
        }

        let source_idx = self.ensure_node_index(&edge.source);
        let target_idx = self.ensure_node_index(&edge.target);
        let idx = self.inner.add_edge(source_idx, target_idx, edge);
        self.edge_index.insert(id, idx);
        id
    }

    /// Nodes referenced by an edge endpoint must already exist. Resolvers are
    /// expected to have materialized `external:` sentinels first (spec §4.4);
    /// this is the fallback for an endpoint that still isn't there, keyed off
    /// the label encoded in its own ID so the placeholder's kind is right.
    fn ensure_node_index(&mut self, id: &NodeId) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(id) {
            return idx;
        }
        tracing::warn!("creating implicit placeholder node for dangling edge endpoint {id}");
        let label = id.as_str().split(':').next().unwrap_or("");
        let kind = NodeKind::from_label(label).unwrap_or(NodeKind::Type);
        let name = id.as_str().rsplit(':').next().unwrap_or(id.as_str());
        let placeholder = GraphNode::new(id.clone(), kind, name, Default::default());
        let idx = self.inner.add_node(placeholder);
        self.node_index.insert(id.clone(), idx);
        idx
    }

    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.node_index.get(id).and_then(|&idx| self.inner.node_weight(idx))
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut GraphNode> {
        let idx = *self.node_index.get(id)?;
        self.inner.node_weight_mut(idx)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&GraphEdge> {
        self.edge_index.get(&id).and_then(|&idx| self.inner.edge_weight(idx))
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.inner.node_weights()
    }

    pub fn all_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.inner.edge_weights()
    }

    pub fn edges_from(&self, source: &NodeId) -> impl Iterator<Item = &GraphEdge> {
        let idx = self.node_index.get(source).copied();
        idx.into_iter().flat_map(move |idx| {
            self.inner
                .edges_directed(idx, Direction::Outgoing)
                .filter_map(move |edge_ref| self.inner.edge_weight(edge_ref.id()))
        })
    }

    pub fn edges_to(&self, target: &NodeId) -> impl Iterator<Item = &GraphEdge> {
        let idx = self.node_index.get(target).copied();
        idx.into_iter().flat_map(move |idx| {
            self.inner
                .edges_directed(idx, Direction::Incoming)
                .filter_map(move |edge_ref| self.inner.edge_weight(edge_ref.id()))
        })
    }

    pub fn has_edge_between(&self, source: &NodeId, target: &NodeId, kind: EdgeKind) -> bool {
        self.edges_from(source).any(|e| &e.target == target && e.kind == kind)
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &GraphNode> {
        self.inner.node_weights().filter(move |n| n.kind == kind)
    }

    /// All node IDs whose `file_path` equals `path` — used for the stale
    /// sweep and cascade delete (spec §3 invariant 3 & 4).
    pub fn nodes_in_file(&self, path: &Path) -> Vec<NodeId> {
        self.inner
            .node_weights()
            .filter(|n| n.file_path == path)
            .map(|n| n.id.clone())
            .collect()
    }

    /// Remove a node and every edge incident to it (File cascade, spec §3
    /// invariant 3). Does not touch `external:` sentinels.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<GraphNode> {
        let idx = self.node_index.remove(id)?;
        let incident: Vec<EdgeIndex> = self
            .inner
            .edges_directed(idx, Direction::Incoming)
            .chain(self.inner.edges_directed(idx, Direction::Outgoing))
            .map(|e| e.id())
            .collect();
        for edge_idx in incident {
            if let Some(edge) = self.inner.edge_weight(edge_idx) {
                self.edge_index.remove(&edge.id);
            }
        }
        self.inner.remove_node(idx)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<GraphEdge> {
        let idx = self.edge_index.remove(&id)?;
        self.inner.remove_edge(idx)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
        self.node_index.clear();
        self.edge_index.clear();
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

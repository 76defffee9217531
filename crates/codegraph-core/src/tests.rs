//! Unit tests for codegraph-core's data model and graph engine.

use crate::*;
use std::path::PathBuf;

#[test]
fn node_id_is_deterministic() {
    let path = PathBuf::from("src/lib.rs");
    let a = NodeId::entity(NodeKind::Function, &path, "parse", 10);
    let b = NodeId::entity(NodeKind::Function, &path, "parse", 10);
    assert_eq!(a, b);

    let different_line = NodeId::entity(NodeKind::Function, &path, "parse", 20);
    assert_ne!(a, different_line);
}

#[test]
fn external_sentinel_is_recognized() {
    let id = NodeId::external(NodeKind::Function, "lodash.map");
    assert!(id.is_external());
    assert_eq!(id.as_str(), "Function:external:lodash.map");

    let local = NodeId::file(&PathBuf::from("a.ts"));
    assert!(!local.is_external());
}

#[test]
fn edge_id_merges_repeated_calls() {
    let a = NodeId::entity(NodeKind::Function, &PathBuf::from("a.ts"), "f", 1);
    let b = NodeId::entity(NodeKind::Function, &PathBuf::from("a.ts"), "g", 5);
    let e1 = EdgeId::new(&a, &b, EdgeKind::Calls);
    let e2 = EdgeId::new(&a, &b, EdgeKind::Calls);
    assert_eq!(e1, e2);

    let different_kind = EdgeId::new(&a, &b, EdgeKind::UsesType);
    assert_ne!(e1, different_kind);
}

#[test]
fn graph_upsert_node_is_idempotent() {
    let mut graph = Graph::new();
    let id = NodeId::entity(NodeKind::Function, &PathBuf::from("a.ts"), "f", 1);
    let node = GraphNode::new(id.clone(), NodeKind::Function, "f", PathBuf::from("a.ts"));

    graph.upsert_node(node.clone());
    graph.upsert_node(node.clone().with_exported(true));

    assert_eq!(graph.node_count(), 1);
    assert!(graph.node(&id).unwrap().is_exported);
}

#[test]
fn graph_upsert_edge_increments_calls_count() {
    let mut graph = Graph::new();
    let a = NodeId::entity(NodeKind::Function, &PathBuf::from("a.ts"), "f", 1);
    let b = NodeId::entity(NodeKind::Function, &PathBuf::from("a.ts"), "g", 5);
    graph.upsert_node(GraphNode::new(a.clone(), NodeKind::Function, "f", PathBuf::from("a.ts")));
    graph.upsert_node(GraphNode::new(b.clone(), NodeKind::Function, "g", PathBuf::from("a.ts")));

    graph.upsert_edge(GraphEdge::new(a.clone(), b.clone(), EdgeKind::Calls));
    graph.upsert_edge(GraphEdge::new(a.clone(), b.clone(), EdgeKind::Calls));

    assert_eq!(graph.edge_count(), 1);
    let edge = graph
        .edges_from(&a)
        .find(|e| e.target == b)
        .expect("edge exists");
    assert_eq!(edge.count(), 2);
}

#[test]
fn graph_remove_node_cascades_edges() {
    let mut graph = Graph::new();
    let file = NodeId::file(&PathBuf::from("a.ts"));
    let func = NodeId::entity(NodeKind::Function, &PathBuf::from("a.ts"), "f", 1);
    graph.upsert_node(GraphNode::new(file.clone(), NodeKind::File, "a.ts", PathBuf::from("a.ts")));
    graph.upsert_node(GraphNode::new(func.clone(), NodeKind::Function, "f", PathBuf::from("a.ts")));
    graph.upsert_edge(GraphEdge::new(file.clone(), func.clone(), EdgeKind::Contains));

    graph.remove_node(&func);

    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn nodes_in_file_scopes_by_path() {
    let mut graph = Graph::new();
    let a_path = PathBuf::from("a.ts");
    let b_path = PathBuf::from("b.ts");
    graph.upsert_node(GraphNode::new(
        NodeId::entity(NodeKind::Function, &a_path, "f", 1),
        NodeKind::Function,
        "f",
        a_path.clone(),
    ));
    graph.upsert_node(GraphNode::new(
        NodeId::entity(NodeKind::Function, &b_path, "g", 1),
        NodeKind::Function,
        "g",
        b_path.clone(),
    ));

    assert_eq!(graph.nodes_in_file(&a_path).len(), 1);
    assert_eq!(graph.nodes_in_file(&b_path).len(), 1);
}

#[test]
fn node_kind_label_roundtrips() {
    for kind in [
        NodeKind::Project,
        NodeKind::File,
        NodeKind::Function,
        NodeKind::Method,
        NodeKind::Class,
        NodeKind::Interface,
        NodeKind::Type,
        NodeKind::Variable,
        NodeKind::Component,
        NodeKind::Import,
    ] {
        assert_eq!(NodeKind::from_label(kind.label()), Some(kind));
    }
}

#[test]
fn graph_node_serialization_roundtrips() {
    let node = GraphNode::new(
        NodeId::entity(NodeKind::Function, &PathBuf::from("a.ts"), "f", 1),
        NodeKind::Function,
        "f",
        PathBuf::from("a.ts"),
    )
    .with_lines(1, 5)
    .with_meta("isAsync", serde_json::json!(true));

    let json = serde_json::to_string(&node).unwrap();
    let deserialized: GraphNode = serde_json::from_str(&json).unwrap();

    assert_eq!(node.id, deserialized.id);
    assert_eq!(deserialized.metadata.get("isAsync"), Some(&serde_json::json!(true)));
}

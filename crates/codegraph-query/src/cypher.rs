//! `executeCypher(query, params)` (spec §4.8): "read-only passthrough, engine
//! enforces read-only." There is no embedded graph database here — this is a
//! small interpreter for the subset of Cypher this service can answer
//! directly against the in-process graph: single-hop `MATCH` patterns with an
//! optional `WHERE name = $param` and `RETURN`/`LIMIT`.
//!
//! Anything outside that subset is a validation error rather than a guess at
//! semantics — matches spec §7's "empty query" / unsupported-construct
//! handling for this layer.

use std::collections::HashMap;

use codegraph_core::{CoreError, CoreResult, EdgeKind, Graph, GraphNode, NodeKind};
use serde_json::Value;

use crate::query::GraphSlice;

#[derive(Debug, Clone)]
pub struct CypherMetadata {
    pub matched_nodes: usize,
    pub matched_edges: usize,
}

/// `MATCH (n[:Label]) [-[:EDGE_KIND]->(m)] RETURN ... [LIMIT k]`. Anything
/// else is rejected — this service never attempts to be a full Cypher engine.
pub fn execute(graph: &Graph, query: &str, params: &HashMap<String, Value>) -> CoreResult<(GraphSlice, CypherMetadata)> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CoreError::Validation("empty query".to_string()));
    }

    let parsed = parse(query)?;
    let mut nodes: Vec<GraphNode> = match parsed.node_kind {
        Some(kind) => graph.nodes_of_kind(kind).cloned().collect(),
        None => graph.all_nodes().cloned().collect(),
    };

    if let Some(name_param) = &parsed.name_param {
        let Some(Value::String(name)) = params.get(name_param) else {
            return Err(CoreError::Validation(format!("missing string param ${name_param}")));
        };
        nodes.retain(|n| &n.name == name);
    }

    let mut edges = Vec::new();
    if let Some(edge_kind) = parsed.edge_kind {
        let sources: Vec<_> = nodes.iter().map(|n| n.id.clone()).collect();
        for id in &sources {
            edges.extend(graph.edges_from(id).filter(|e| e.kind == edge_kind).cloned());
        }
        let targets: std::collections::HashSet<_> = edges.iter().map(|e| e.target.clone()).collect();
        nodes.extend(targets.iter().filter_map(|id| graph.node(id)).cloned());

        let mut seen = std::collections::HashSet::new();
        nodes.retain(|n| seen.insert(n.id.clone()));
    }

    if let Some(limit) = parsed.limit {
        nodes.truncate(limit);
    }

    let metadata = CypherMetadata { matched_nodes: nodes.len(), matched_edges: edges.len() };
    Ok((GraphSlice { nodes, edges }, metadata))
}

struct ParsedQuery {
    node_kind: Option<NodeKind>,
    edge_kind: Option<EdgeKind>,
    name_param: Option<String>,
    limit: Option<usize>,
}

/// Hand-rolled, not a real grammar: splits on the handful of keywords this
/// subset understands and bails with `Validation` the moment something
/// doesn't match the expected shape.
fn parse(query: &str) -> CoreResult<ParsedQuery> {
    let upper = query.to_uppercase();
    if !upper.starts_with("MATCH") {
        return Err(CoreError::Validation("query must start with MATCH".to_string()));
    }

    let match_end = upper.find("RETURN").ok_or_else(|| CoreError::Validation("query must contain RETURN".to_string()))?;
    let pattern = query[5..match_end].trim();
    let after_return = &query[match_end + 6..];

    let (pattern, where_clause) = match upper.find("WHERE") {
        Some(idx) if idx < match_end => (query[5..idx].trim(), Some(query[idx + 5..match_end].trim())),
        _ => (pattern, None),
    };

    let node_kind = extract_label(pattern, 0).map(|label| {
        NodeKind::from_label(&label).ok_or_else(|| CoreError::Validation(format!("unknown node label {label}")))
    }).transpose()?;

    let edge_kind = if pattern.contains("-[") {
        let start = pattern.find("-[:").ok_or_else(|| CoreError::Validation("malformed relationship pattern".to_string()))? + 3;
        let end = pattern[start..].find(']').ok_or_else(|| CoreError::Validation("malformed relationship pattern".to_string()))? + start;
        let label = &pattern[start..end];
        Some(edge_label_to_kind(label).ok_or_else(|| CoreError::Validation(format!("unknown edge label {label}")))?)
    } else {
        None
    };

    let name_param = where_clause
        .map(|clause| {
            let mut parts = clause.splitn(2, '=');
            let lhs = parts.next().unwrap_or("").trim();
            let rhs = parts.next().ok_or_else(|| CoreError::Validation("malformed WHERE clause".to_string()))?.trim();
            if !lhs.ends_with(".name") {
                return Err(CoreError::Validation("WHERE clause must compare n.name".to_string()));
            }
            let param = rhs.strip_prefix('$').ok_or_else(|| CoreError::Validation("WHERE value must be a $param".to_string()))?;
            Ok(param.to_string())
        })
        .transpose()?;

    let limit = after_return
        .to_uppercase()
        .find("LIMIT")
        .map(|idx| {
            after_return[idx + 5..]
                .trim()
                .parse::<usize>()
                .map_err(|_| CoreError::Validation("malformed LIMIT clause".to_string()))
        })
        .transpose()?;

    Ok(ParsedQuery { node_kind, edge_kind, name_param, limit })
}

/// Pulls a `:Label` out of the nth `(...)` group in a pattern string.
fn extract_label(pattern: &str, group_index: usize) -> Option<String> {
    let groups: Vec<&str> = pattern.split('(').skip(1).collect();
    let group = groups.get(group_index)?;
    let inner = group.split(')').next()?;
    let (_, label) = inner.split_once(':')?;
    Some(label.trim().to_string())
}

fn edge_label_to_kind(label: &str) -> Option<EdgeKind> {
    [
        EdgeKind::Contains,
        EdgeKind::ContainsFile,
        EdgeKind::Imports,
        EdgeKind::ImportsSymbol,
        EdgeKind::Calls,
        EdgeKind::Extends,
        EdgeKind::Implements,
        EdgeKind::UsesType,
        EdgeKind::Returns,
        EdgeKind::HasParam,
        EdgeKind::HasMethod,
        EdgeKind::HasProperty,
        EdgeKind::Renders,
        EdgeKind::UsesHook,
        EdgeKind::ModifiedIn,
    ]
    .into_iter()
    .find(|k| k.label() == label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::{GraphEdge, GraphNode, NodeId};
    use std::path::PathBuf;

    fn build_graph() -> Graph {
        let mut graph = Graph::new();
        let file = PathBuf::from("/repo/a.ts");
        let foo = NodeId::entity(NodeKind::Function, &file, "foo", 1);
        let bar = NodeId::entity(NodeKind::Function, &file, "bar", 5);
        graph.upsert_node(GraphNode::new(foo.clone(), NodeKind::Function, "foo", file.clone()));
        graph.upsert_node(GraphNode::new(bar.clone(), NodeKind::Function, "bar", file.clone()));
        graph.upsert_edge(GraphEdge::new(foo, bar, EdgeKind::Calls));
        graph
    }

    #[test]
    fn matches_nodes_by_label_and_name_param() {
        let graph = build_graph();
        let mut params = HashMap::new();
        params.insert("name".to_string(), Value::String("foo".to_string()));
        let (slice, meta) = execute(&graph, "MATCH (n:Function) WHERE n.name = $name RETURN n", &params).unwrap();
        assert_eq!(slice.nodes.len(), 1);
        assert_eq!(meta.matched_nodes, 1);
    }

    #[test]
    fn follows_relationship_pattern() {
        let graph = build_graph();
        let (slice, _) = execute(&graph, "MATCH (n:Function)-[:CALLS]->(m) RETURN n, m", &HashMap::new()).unwrap();
        assert!(slice.edges.iter().any(|e| e.kind == EdgeKind::Calls));
    }

    #[test]
    fn empty_query_is_validation_error() {
        let graph = build_graph();
        assert!(execute(&graph, "", &HashMap::new()).is_err());
    }

    #[test]
    fn missing_return_is_validation_error() {
        let graph = build_graph();
        assert!(execute(&graph, "MATCH (n:Function)", &HashMap::new()).is_err());
    }
}

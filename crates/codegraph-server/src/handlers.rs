//! HTTP handlers implementing the external interface of spec §6. Every
//! handler is a thin translation layer: parse/validate the request, call
//! through to `codegraph-core`/`codegraph-indexer`/`codegraph-query`, shape
//! the response.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path as AxumPath, Query, State};
use axum::response::{IntoResponse, Json};
use codegraph_core::{CoreError, EdgeKind, NodeKind, Project};
use codegraph_indexer::IndexerConfig;
use codegraph_query::{self as query, AnalysisKind, NeighborDirection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::state::ServerState;

fn require_absolute(path: &str) -> Result<PathBuf, ApiError> {
    let path = PathBuf::from(path);
    if !path.is_absolute() {
        return Err(CoreError::Validation(format!("{} must be an absolute path", path.display())).into());
    }
    Ok(path)
}

fn parse_node_kinds(csv: &Option<String>) -> Vec<NodeKind> {
    csv.as_deref()
        .map(|s| s.split(',').filter_map(|t| NodeKind::from_label(t.trim())).collect())
        .unwrap_or_default()
}

fn edge_kind_from_label(label: &str) -> Option<EdgeKind> {
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

fn parse_edge_kinds(csv: &Option<String>) -> Option<Vec<EdgeKind>> {
    csv.as_ref().map(|s| s.split(',').filter_map(|t| edge_kind_from_label(t.trim())).collect())
}

// ---- Ingestion ----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct IngestProjectRequest {
    pub path: String,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub deep_analysis: Option<bool>,
    #[serde(default)]
    pub include_externals: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ParseResultResponse {
    pub status: &'static str,
    pub files: usize,
    pub entities: usize,
    pub edges: usize,
    pub duration_ms: u64,
    pub error_count: usize,
    pub errors: Vec<FileErrorResponse>,
}

#[derive(Debug, Serialize)]
pub struct FileErrorResponse {
    pub path: String,
    pub message: String,
}

pub async fn ingest_project(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<IngestProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let root = require_absolute(&body.path)?;
    if !root.is_dir() {
        return Err(CoreError::Validation(format!("{} is not a directory", root.display())).into());
    }

    let mut config = IndexerConfig::load(&root)?;
    config.ignore.extend(body.ignore);
    if let Some(v) = body.deep_analysis {
        config.deep_analysis = v;
    }
    if let Some(v) = body.include_externals {
        config.include_externals = v;
    }

    let report = state.coordinator.ingest_project(&root, &config).await?;
    state.scheduler.on_ingestion(&root).await;

    Ok(Json(ParseResultResponse {
        status: if report.errors.is_empty() { "ok" } else { "partial" },
        files: report.stats.files,
        entities: report.stats.entities,
        edges: report.stats.edges,
        duration_ms: report.stats.duration_ms,
        error_count: report.errors.len(),
        errors: report.errors.into_iter().map(|e| FileErrorResponse { path: e.path.display().to_string(), message: e.message }).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct FilePathRequest {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct IngestFileResponse {
    pub success: bool,
    pub entities: usize,
    pub edges: usize,
}

pub async fn ingest_file(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<FilePathRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let path = require_absolute(&body.path)?;
    let root = state.project_root_for(&path).await?;
    let config = IndexerConfig::load(&root)?;
    let stats = state.coordinator.ingest_file(&root, &path, &config).await?;
    state.scheduler.on_file_change(path.clone());
    Ok(Json(IngestFileResponse { success: true, entities: stats.entities, edges: stats.edges }))
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

pub async fn delete_file(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<FilePathRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let path = require_absolute(&body.path)?;
    state
        .store
        .delete_file_entities(&path)
        .await
        .map_err(|e| CoreError::DeleteFailure(format!("{}: {e}", path.display())))?;
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn clear_all(State(state): State<Arc<ServerState>>) -> Result<impl IntoResponse, ApiError> {
    state.store.clear_all().await.map_err(|e| CoreError::DeleteFailure(e.to_string()))?;
    state.scheduler.clear_cache();
    Ok(Json(SuccessResponse { success: true }))
}

// ---- Graph reads ----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct FullGraphQuery {
    pub limit: Option<usize>,
    pub project_id: Option<String>,
}

pub async fn graph_full(
    State(state): State<Arc<ServerState>>,
    Query(q): Query<FullGraphQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let root = match &q.project_id {
        Some(id) => Some(project_root(&state, id).await?),
        None => None,
    };
    let graph = state.store.read().await;
    let slice = query::full_graph(&graph, q.limit.unwrap_or(1000), root.as_deref());
    Ok(Json(slice))
}

async fn project_root(state: &ServerState, project_id: &str) -> Result<PathBuf, ApiError> {
    let project = state
        .store
        .get_project(project_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("project {project_id}")))?;
    Ok(project.root_path)
}

#[derive(Debug, Serialize)]
pub struct FileSubgraphResponse {
    #[serde(flatten)]
    pub slice: query::GraphSlice,
    pub file_path: String,
}

pub async fn graph_file(
    State(state): State<Arc<ServerState>>,
    AxumPath(path): AxumPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let path = require_absolute(&format!("/{path}"))?;
    let graph = state.store.read().await;
    let slice = query::file_subgraph(&graph, &path)?;
    Ok(Json(FileSubgraphResponse { slice, file_path: path.display().to_string() }))
}

#[derive(Debug, Deserialize)]
pub struct DepthQuery {
    pub depth: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionsResponse {
    pub incoming: Vec<codegraph_core::GraphEdge>,
    pub outgoing: Vec<codegraph_core::GraphEdge>,
}

#[derive(Debug, Serialize)]
pub struct EntityConnectionsResponse {
    pub entity: codegraph_core::GraphNode,
    pub connections: ConnectionsResponse,
}

pub async fn entity_with_connections(
    State(state): State<Arc<ServerState>>,
    AxumPath(id): AxumPath<String>,
    Query(q): Query<DepthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let graph = state.store.read().await;
    match query::entity_with_connections(&graph, &id, q.depth.unwrap_or(1))? {
        Some(result) => {
            let body = EntityConnectionsResponse {
                entity: result.entity,
                connections: ConnectionsResponse { incoming: result.incoming, outgoing: result.outgoing },
            };
            Ok(Json(body).into_response())
        }
        None => Err(CoreError::NotFound(format!("entity {id}")).into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct NeighborsQuery {
    pub direction: Option<String>,
    pub edge_types: Option<String>,
    pub depth: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct NeighborsResponse {
    #[serde(flatten)]
    pub slice: query::GraphSlice,
    pub center_id: String,
    pub direction: String,
}

pub async fn neighbors(
    State(state): State<Arc<ServerState>>,
    AxumPath(id): AxumPath<String>,
    Query(q): Query<NeighborsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let direction_str = q.direction.unwrap_or_else(|| "out".to_string());
    let direction = match direction_str.as_str() {
        "in" => NeighborDirection::In,
        "out" => NeighborDirection::Out,
        "both" => NeighborDirection::Both,
        other => return Err(CoreError::Validation(format!("invalid direction {other}")).into()),
    };
    let edge_types = parse_edge_kinds(&q.edge_types);
    let graph = state.store.read().await;
    let slice = query::neighbors(&graph, &id, direction, edge_types.as_deref(), q.depth.unwrap_or(1))?;
    Ok(Json(NeighborsResponse { slice, center_id: id, direction: direction_str }))
}

#[derive(Debug, Deserialize)]
pub struct ListNodesQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub types: Option<String>,
    pub q: Option<String>,
    pub project_id: Option<String>,
}

pub async fn list_nodes(
    State(state): State<Arc<ServerState>>,
    Query(q): Query<ListNodesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let root = match &q.project_id {
        Some(id) => Some(project_root(&state, id).await?),
        None => None,
    };
    let types = parse_node_kinds(&q.types);
    let graph = state.store.read().await;
    let page = query::list_nodes(
        &graph,
        q.page.unwrap_or(1),
        q.limit.unwrap_or(50),
        (!types.is_empty()).then_some(types.as_slice()),
        q.q.as_deref(),
        root.as_deref(),
    );
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub types: Option<String>,
    pub limit: Option<usize>,
    #[allow(dead_code)]
    pub page: Option<u32>,
    #[allow(dead_code)]
    pub project_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<query::SearchHit>,
    pub count: usize,
}

pub async fn search(
    State(state): State<Arc<ServerState>>,
    Query(q): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if q.q.trim().is_empty() {
        return Err(CoreError::Validation("search query must not be empty".to_string()).into());
    }
    let types = parse_node_kinds(&q.types);
    let graph = state.store.read().await;
    let results = query::search(&graph, &q.q, (!types.is_empty()).then_some(types.as_slice()), q.limit.unwrap_or(50));
    Ok(Json(SearchResponse { query: q.q, count: results.len(), results }))
}

pub async fn stats(State(state): State<Arc<ServerState>>) -> Result<impl IntoResponse, ApiError> {
    let graph = state.store.read().await;
    Ok(Json(query::stats(&graph, 10)))
}

#[derive(Debug, Deserialize)]
pub struct CypherRequest {
    pub query: String,
    #[serde(default)]
    pub params: std::collections::HashMap<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct CypherResponse {
    pub results: query::GraphSlice,
    pub metadata: CypherMetadataResponse,
}

#[derive(Debug, Serialize)]
pub struct CypherMetadataResponse {
    pub matched_nodes: usize,
    pub matched_edges: usize,
}

pub async fn query_cypher(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<CypherRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let graph = state.store.read().await;
    let (results, metadata) = query::execute_cypher(&graph, &body.query, &body.params)?;
    Ok(Json(CypherResponse {
        results,
        metadata: CypherMetadataResponse { matched_nodes: metadata.matched_nodes, matched_edges: metadata.matched_edges },
    }))
}

// ---- Projects ---------------------------------------------------------

pub async fn list_projects(State(state): State<Arc<ServerState>>) -> Result<impl IntoResponse, ApiError> {
    let projects: Vec<Project> = state.store.get_projects().await?;
    Ok(Json(projects))
}

pub async fn delete_project(
    State(state): State<Arc<ServerState>>,
    AxumPath(id): AxumPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.delete_project(&id).await.map_err(|e| match e {
        CoreError::NotFound(msg) => CoreError::NotFound(msg),
        other => CoreError::DeleteFailure(other.to_string()),
    })?;
    Ok(Json(SuccessResponse { success: true }))
}

// ---- Source slice -------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SourceQuery {
    pub path: String,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SourceResponse {
    pub path: String,
    pub content: String,
}

pub async fn source_slice(Query(q): Query<SourceQuery>) -> Result<impl IntoResponse, ApiError> {
    let path = require_absolute(&q.path)?;
    let content = std::fs::read_to_string(&path)
        .map_err(|e| CoreError::NotFound(format!("cannot read {}: {e}", path.display())))?;

    let slice = match (q.start_line, q.end_line) {
        (Some(start), Some(end)) => content
            .lines()
            .skip(start.saturating_sub(1))
            .take(end.saturating_sub(start).saturating_add(1))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => content,
    };

    Ok(Json(SourceResponse { path: path.display().to_string(), content: slice }))
}

// ---- Analytics ----------------------------------------------------------

fn analysis_kind_from_str(s: &str) -> Result<AnalysisKind, ApiError> {
    Ok(match s {
        "security" => AnalysisKind::Security,
        "complexity" => AnalysisKind::Complexity,
        "refactoring" => AnalysisKind::Refactoring,
        "dataflow" => AnalysisKind::Dataflow,
        other => return Err(CoreError::BadRequest(format!("unknown analysis kind {other}")).into()),
    })
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub root_path: String,
    #[serde(default)]
    pub refresh: bool,
}

pub async fn analytics_summary(
    State(state): State<Arc<ServerState>>,
    Query(q): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let root = require_absolute(&q.root_path)?;
    let mut summary = serde_json::Map::new();
    for kind in AnalysisKind::ALL {
        summary.insert(kind.as_str().to_string(), state.scheduler.run(kind, &root, q.refresh).await);
    }
    Ok(Json(Value::Object(summary)))
}

pub async fn analytics_by_kind(
    State(state): State<Arc<ServerState>>,
    AxumPath(kind): AxumPath<String>,
    Query(q): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let root = require_absolute(&q.root_path)?;
    let kind = analysis_kind_from_str(&kind)?;
    Ok(Json(state.scheduler.run(kind, &root, q.refresh).await))
}

pub async fn analytics_impact(
    State(state): State<Arc<ServerState>>,
    AxumPath(symbol_path): AxumPath<String>,
    Query(q): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let _ = require_absolute(&q.root_path)?;
    let symbol_path = require_absolute(&format!("/{symbol_path}"))?;
    Ok(Json(state.scheduler.run(AnalysisKind::Impact, &symbol_path, q.refresh).await))
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsRunRequest {
    pub root_path: String,
    pub kinds: Option<Vec<String>>,
    #[serde(default)]
    pub refresh: bool,
}

pub async fn analytics_run(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<AnalyticsRunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let root = require_absolute(&body.root_path)?;
    let kinds: Vec<AnalysisKind> = match body.kinds {
        Some(names) => names.iter().map(|n| analysis_kind_from_str(n)).collect::<Result<_, _>>()?,
        None => AnalysisKind::ALL.to_vec(),
    };
    let mut out = serde_json::Map::new();
    for kind in kinds {
        out.insert(kind.as_str().to_string(), state.scheduler.run(kind, &root, body.refresh).await);
    }
    Ok(Json(Value::Object(out)))
}

pub async fn analytics_security_scan(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<AnalyticsRunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let root = require_absolute(&body.root_path)?;
    Ok(Json(state.scheduler.run(AnalysisKind::Security, &root, body.refresh).await))
}

pub async fn analytics_schedule_get(State(state): State<Arc<ServerState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.scheduler.recent_jobs().await))
}

pub async fn analytics_schedule_put(
    State(_state): State<Arc<ServerState>>,
    Json(_body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    // The schedule itself lives in `.codegraph.toml` (`analyticsSchedule`,
    // spec §6); this endpoint acknowledges without persisting a runtime
    // override, since there's no separate runtime schedule store today.
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn analytics_cache_get(State(state): State<Arc<ServerState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.scheduler.recent_jobs().await))
}

pub async fn analytics_cache_delete(State(state): State<Arc<ServerState>>) -> Result<impl IntoResponse, ApiError> {
    state.scheduler.clear_cache();
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_paths() {
        assert!(require_absolute("relative/path").is_err());
    }

    #[test]
    fn accepts_absolute_paths() {
        assert!(require_absolute("/repo/a.ts").is_ok());
    }

    #[test]
    fn parses_comma_separated_node_kinds() {
        let kinds = parse_node_kinds(&Some("Function,Class".to_string()));
        assert_eq!(kinds, vec![NodeKind::Function, NodeKind::Class]);
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let _ = health_check().await;
    }
}

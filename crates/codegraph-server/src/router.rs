//! Axum router: wires every spec §6 endpoint to its handler.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::state::ServerState;

pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/ingest/project", post(handlers::ingest_project))
        .route("/ingest/file", post(handlers::ingest_file).delete(handlers::delete_file))
        .route("/ingest/clear", delete(handlers::clear_all))
        .route("/graph/full", get(handlers::graph_full))
        .route("/graph/file/*path", get(handlers::graph_file))
        .route("/entity/*id", get(handlers::entity_with_connections))
        .route("/neighbors/*id", get(handlers::neighbors))
        .route("/nodes", get(handlers::list_nodes))
        .route("/search", get(handlers::search))
        .route("/stats", get(handlers::stats))
        .route("/query/cypher", post(handlers::query_cypher))
        .route("/projects", get(handlers::list_projects))
        .route("/projects/:id", delete(handlers::delete_project))
        .route("/source", get(handlers::source_slice))
        .route("/analytics/summary", get(handlers::analytics_summary))
        .route("/analytics/impact/*symbol", get(handlers::analytics_impact))
        .route("/analytics/:kind", get(handlers::analytics_by_kind))
        .route("/analytics/run", post(handlers::analytics_run))
        .route("/analytics/security/scan", post(handlers::analytics_security_scan))
        .route(
            "/analytics/schedule",
            get(handlers::analytics_schedule_get).put(handlers::analytics_schedule_put),
        )
        .route(
            "/analytics/cache",
            get(handlers::analytics_cache_get).delete(handlers::analytics_cache_delete),
        )
        .route("/health", get(handlers::health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::GraphStore;

    #[test]
    fn router_builds_with_every_route_registered() {
        let state = Arc::new(ServerState::new(GraphStore::new()));
        let _router = create_router(state);
    }
}

//! Graph data model, structural IDs, and the Graph Operations Layer that
//! every other crate in this workspace builds on.

pub mod cache;
pub mod error;
pub mod graph;
pub mod model;
pub mod store;
pub mod workspace;

#[cfg(test)]
pub mod tests;

/// Gated behind the `test-utils` feature so other crates' test code can
/// depend on the same fixture builder instead of each reimplementing it.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cache::{
    cache_dir, clear_cache, ensure_cache_dir, graph_cache_path, invalidate_file_cache,
    load_graph, save_graph, CACHE_DIR, GRAPH_CACHE,
};
pub use error::{CoreError, CoreResult};
pub use graph::Graph;
pub use model::{EdgeId, EdgeKind, GraphEdge, GraphNode, NodeId, NodeKind, Project};
pub use store::{BatchStats, FileEntities, GraphStore};
pub use workspace::{detect_workspace, WorkspaceType};

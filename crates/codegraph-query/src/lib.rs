//! Read-side query operations and the analytics scheduler (C8, spec §4.8).
//! Every query here reads through `GraphStore::read()` and never mutates;
//! the analytics scheduler is the one place in this crate with its own
//! internal state (the TTL cache and recent-job history).

pub mod analytics;
pub mod cypher;
pub mod query;

pub use analytics::{AnalysisJob, AnalysisKind, AnalyticsScheduler, JobState};
pub use cypher::{execute as execute_cypher, CypherMetadata};
pub use query::{
    entity_with_connections, file_subgraph, full_graph, list_nodes, neighbors, search, stats,
    EntityConnections, GraphSlice, GraphStats, NeighborDirection, Page, SearchHit,
};

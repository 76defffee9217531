//! HTTP request/response surface over the graph (C8's transport, spec §6).
//! The transport itself — auth, CORS policy details, wire format — is
//! someone else's concern; this crate defines the semantics.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::ServerState;

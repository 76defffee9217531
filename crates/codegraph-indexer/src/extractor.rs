//! The language plugin contract (C3, spec §4.3).
//!
//! A plugin turns one file's source text into entity nodes plus two flavors
//! of edge: ones it can resolve immediately (both endpoints are in the same
//! file) and ones that name a symbol it can't yet locate — those are handed
//! to the registry/resolver (C4) as `UnresolvedEdge`s.

use std::path::Path;

use codegraph_core::{CoreResult, GraphEdge, GraphNode, NodeKind};

/// A named reference a plugin found but could not resolve to a structural ID
/// on its own — an unqualified call target, a base class name, an imported
/// symbol used downstream. The resolver turns this into a real edge or an
/// `external:` sentinel (spec §4.4).
#[derive(Debug, Clone)]
pub struct UnresolvedEdge {
    pub source: codegraph_core::NodeId,
    pub kind: codegraph_core::EdgeKind,
    pub target_name: String,
    /// Narrows which node kinds are eligible matches, when the plugin knows
    /// (e.g. `extends` only ever targets a Class).
    pub target_kind_hint: Option<NodeKind>,
    /// Set when the plugin traced the reference back to a specific import
    /// statement's module specifier — lets the resolver prefer that file.
    pub imported_from: Option<String>,
    /// Edge-kind-specific properties to carry onto the resolved `GraphEdge`
    /// (e.g. HAS_PARAM's `paramName`/`position`).
    pub properties: Vec<(String, serde_json::Value)>,
}

/// An Import entity plus the bookkeeping the resolver needs: which module it
/// points at, and which names it brings into scope (empty = namespace or
/// default import, matched leniently).
#[derive(Debug, Clone)]
pub struct ImportSpecifier {
    pub node: GraphNode,
    pub module: String,
    pub imported_names: Vec<String>,
}

/// Everything one plugin invocation produces for one file. Never includes
/// the File node itself — the orchestrator owns that (spec §4.5/§4.6).
#[derive(Debug, Clone, Default)]
pub struct ExtractedFile {
    pub entities: Vec<GraphNode>,
    /// Edges both of whose endpoints are already known structural IDs.
    pub edges: Vec<GraphEdge>,
    pub imports: Vec<ImportSpecifier>,
    pub unresolved: Vec<UnresolvedEdge>,
}

impl ExtractedFile {
    pub fn merge(&mut self, other: ExtractedFile) {
        self.entities.extend(other.entities);
        self.edges.extend(other.edges);
        self.imports.extend(other.imports);
        self.unresolved.extend(other.unresolved);
    }
}

/// Implemented once per language. Registered extractors are looked up by
/// file extension (spec §4.3); an unregistered extension falls back to the
/// no-op generic plugin rather than failing the file outright.
pub trait LanguageExtractor: Send + Sync {
    /// Short identifier stored on the File node's `language` metadata field.
    fn language_id(&self) -> &'static str;

    fn extract(&self, path: &Path, content: &str) -> CoreResult<ExtractedFile>;
}

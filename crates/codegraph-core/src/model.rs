//! Core data structures for the code graph — see spec §3.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Structural identifier for a node. Reproducible from intrinsic fields so
/// re-parsing the same entity always yields the same ID (spec §3 invariant 7).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// `File:<absolutePath>`
    pub fn file(path: &Path) -> Self {
        NodeId(format!("File:{}", path.display()))
    }

    /// `Project:<uuid>`
    pub fn project(id: &str) -> Self {
        NodeId(format!("Project:{id}"))
    }

    /// `<Label>:<filePath>:<name>:<startLine-or-line>`
    pub fn entity(kind: NodeKind, file_path: &Path, name: &str, line: u32) -> Self {
        NodeId(format!(
            "{}:{}:{}:{}",
            kind.label(),
            file_path.display(),
            name,
            line
        ))
    }

    /// `<Label>:external:<name>` — sentinel for a reference that escapes the
    /// indexed source set (spec §3, §4.4).
    pub fn external(kind: NodeKind, name: &str) -> Self {
        NodeId(format!("{}:external:{}", kind.label(), name))
    }

    pub fn is_external(&self) -> bool {
        self.0.splitn(3, ':').nth(1) == Some("external")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic edge identifier: hash of (source, target, kind). Two calls
/// from the same caller to the same callee always MERGE onto one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl EdgeId {
    pub fn new(source: &NodeId, target: &NodeId, kind: EdgeKind) -> Self {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        target.hash(&mut hasher);
        kind.hash(&mut hasher);
        EdgeId(hasher.finish())
    }
}

/// Discriminates the label used in a node's structural ID and in queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Project,
    File,
    Function,
    Method,
    Class,
    Interface,
    Type,
    Variable,
    Component,
    Import,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Project => "Project",
            NodeKind::File => "File",
            NodeKind::Function => "Function",
            NodeKind::Method => "Method",
            NodeKind::Class => "Class",
            NodeKind::Interface => "Interface",
            NodeKind::Type => "Type",
            NodeKind::Variable => "Variable",
            NodeKind::Component => "Component",
            NodeKind::Import => "Import",
        }
    }

    /// Parse a structural ID's label prefix back into a `NodeKind`, so a
    /// sentinel's ID alone is enough to know what to lazily materialize.
    pub fn from_label(label: &str) -> Option<Self> {
        Some(match label {
            "Project" => NodeKind::Project,
            "File" => NodeKind::File,
            "Function" => NodeKind::Function,
            "Method" => NodeKind::Method,
            "Class" => NodeKind::Class,
            "Interface" => NodeKind::Interface,
            "Type" => NodeKind::Type,
            "Variable" => NodeKind::Variable,
            "Component" => NodeKind::Component,
            "Import" => NodeKind::Import,
            _ => return None,
        })
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single node in the code graph. Fields common to every kind are typed;
/// kind-specific fields (params, docstring, complexity, props, ...) live in
/// `metadata` — see spec §3's per-entity shapes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    pub file_path: PathBuf,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub is_exported: bool,
    /// Kind-specific extra fields (e.g. `isAsync`, `params`, `docstring`,
    /// `complexity`, `props`, `rootPath`, `hash`, ...).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl GraphNode {
    pub fn new(id: NodeId, kind: NodeKind, name: impl Into<String>, file_path: PathBuf) -> Self {
        GraphNode {
            id,
            kind,
            name: name.into(),
            file_path,
            start_line: None,
            end_line: None,
            is_exported: false,
            metadata: HashMap::new(),
        }
    }

    pub fn with_lines(mut self, start: u32, end: u32) -> Self {
        self.start_line = Some(start);
        self.end_line = Some(end);
        self
    }

    pub fn with_exported(mut self, exported: bool) -> Self {
        self.is_exported = exported;
        self
    }

    pub fn with_meta(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn line(&self) -> u32 {
        self.start_line.unwrap_or(0)
    }
}

/// What kind of relationship this edge represents — spec §3's edge table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Contains,
    ContainsFile,
    Imports,
    ImportsSymbol,
    Calls,
    Extends,
    Implements,
    UsesType,
    Returns,
    HasParam,
    HasMethod,
    HasProperty,
    Renders,
    UsesHook,
    ModifiedIn,
}

impl EdgeKind {
    pub fn label(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "CONTAINS",
            EdgeKind::ContainsFile => "CONTAINS_FILE",
            EdgeKind::Imports => "IMPORTS",
            EdgeKind::ImportsSymbol => "IMPORTS_SYMBOL",
            EdgeKind::Calls => "CALLS",
            EdgeKind::Extends => "EXTENDS",
            EdgeKind::Implements => "IMPLEMENTS",
            EdgeKind::UsesType => "USES_TYPE",
            EdgeKind::Returns => "RETURNS",
            EdgeKind::HasParam => "HAS_PARAM",
            EdgeKind::HasMethod => "HAS_METHOD",
            EdgeKind::HasProperty => "HAS_PROPERTY",
            EdgeKind::Renders => "RENDERS",
            EdgeKind::UsesHook => "USES_HOOK",
            EdgeKind::ModifiedIn => "MODIFIED_IN",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A directed edge in the code graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    /// Edge-kind-specific properties (specifiers, count, alias, line, ...).
    pub properties: HashMap<String, serde_json::Value>,
}

impl GraphEdge {
    pub fn new(source: NodeId, target: NodeId, kind: EdgeKind) -> Self {
        let id = EdgeId::new(&source, &target, kind);
        GraphEdge {
            id,
            source,
            target,
            kind,
            properties: HashMap::new(),
        }
    }

    pub fn with_prop(mut self, key: &str, value: serde_json::Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    pub fn count(&self) -> u64 {
        self.properties
            .get("count")
            .and_then(|v| v.as_u64())
            .unwrap_or(1)
    }
}

/// Project entity — spec §3.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub root_path: PathBuf,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_parsed: Option<chrono::DateTime<chrono::Utc>>,
    pub file_count: u32,
    /// Build-tool convention detected at `root_path` (Cargo/npm/go modules/
    /// Maven/Gradle). Informational only — never changes graph semantics.
    pub workspace_type: Option<crate::workspace::WorkspaceType>,
}

impl Project {
    pub fn new(root_path: PathBuf) -> Self {
        let name = root_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| root_path.display().to_string());
        let workspace_type = crate::workspace::detect_workspace(&root_path);
        Project {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            root_path,
            created_at: chrono::Utc::now(),
            last_parsed: None,
            file_count: 0,
            workspace_type,
        }
    }

    pub fn node_id(&self) -> NodeId {
        NodeId::project(&self.id)
    }
}

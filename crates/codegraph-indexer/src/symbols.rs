//! Two-pass symbol resolution (C4, spec §4.4).
//!
//! Pass 1 (`SymbolRegistry::register`) walks every extracted file and
//! indexes its entities by name, by file, and — for exported entities — by
//! (file, name) so imports can be matched to a specific declaration. Pass 2
//! (`resolve`) replays each file's `UnresolvedEdge`s against the finished
//! registry.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use codegraph_core::{EdgeKind, GraphEdge, GraphNode, NodeId};

use crate::extractor::{ImportSpecifier, UnresolvedEdge};

#[derive(Debug, Default)]
pub struct SymbolRegistry {
    by_name: HashMap<String, Vec<NodeId>>,
    by_file: HashMap<PathBuf, Vec<(String, NodeId)>>,
    exports_by_file: HashMap<PathBuf, HashSet<String>>,
    seen: HashSet<(PathBuf, String, u32)>,
    /// module specifier (as written) -> resolved project file, per importing file.
    imports_by_file: HashMap<PathBuf, Vec<(String, Option<PathBuf>, Vec<String>)>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index one entity. Idempotent on `(filePath, name, startLine)` so
    /// re-running pass 1 over an unchanged file never double-registers it.
    pub fn register(&mut self, entity: &GraphNode) {
        let key = (entity.file_path.clone(), entity.name.clone(), entity.start_line.unwrap_or(0));
        if !self.seen.insert(key) {
            return;
        }
        self.by_name.entry(entity.name.clone()).or_default().push(entity.id.clone());
        self.by_file
            .entry(entity.file_path.clone())
            .or_default()
            .push((entity.name.clone(), entity.id.clone()));
        if entity.is_exported {
            self.exports_by_file.entry(entity.file_path.clone()).or_default().insert(entity.name.clone());
        }
    }

    /// Index a file's import statements, resolving relative module
    /// specifiers to a project-relative file path where one of the known
    /// extensions exists on disk. Bare specifiers (package names) are left
    /// unresolved — they always mean "external".
    pub fn register_imports(&mut self, file_path: &Path, imports: &[ImportSpecifier], known_extensions: &[String]) {
        let mut resolved = Vec::new();
        for import in imports {
            let target = resolve_module_path(file_path, &import.module, known_extensions);
            resolved.push((import.module.clone(), target, import.imported_names.clone()));
        }
        self.imports_by_file.insert(file_path.to_path_buf(), resolved);
    }

    fn local_match(&self, file: &Path, name: &str) -> Option<NodeId> {
        self.by_file.get(file)?.iter().find(|(n, _)| n == name).map(|(_, id)| id.clone())
    }

    fn exported_match(&self, file: &Path, name: &str) -> Option<NodeId> {
        if !self.exports_by_file.get(file).map(|s| s.contains(name)).unwrap_or(false) {
            return None;
        }
        self.local_match(file, name)
    }

    fn unique_global_match(&self, name: &str) -> Option<NodeId> {
        match self.by_name.get(name) {
            Some(ids) if ids.len() == 1 => Some(ids[0].clone()),
            _ => None,
        }
    }

    /// Resolve one file's unresolved edges against the finished registry.
    /// Tie-break, most to least specific: an import naming the target that
    /// resolves to a project file exporting it; a same-file local
    /// declaration; a project-wide unique name match; otherwise an external
    /// sentinel (if `include_externals`) or a silent drop.
    pub fn resolve(&self, source_file: &Path, unresolved: &[UnresolvedEdge], include_externals: bool, builtin_denylist: &[&str]) -> Vec<GraphEdge> {
        let imports = self.imports_by_file.get(source_file);
        let mut edges = Vec::new();

        for u in unresolved {
            let with_props = |mut edge: GraphEdge| {
                for (key, value) in &u.properties {
                    edge = edge.with_prop(key, value.clone());
                }
                edge
            };

            if let Some(target) = self.resolve_via_import(imports, &u.target_name) {
                edges.push(with_props(GraphEdge::new(u.source.clone(), target, u.kind.clone())));
                continue;
            }
            if let Some(target) = self.local_match(source_file, &u.target_name) {
                edges.push(with_props(GraphEdge::new(u.source.clone(), target, u.kind.clone())));
                continue;
            }
            if let Some(target) = self.unique_global_match(&u.target_name) {
                edges.push(with_props(GraphEdge::new(u.source.clone(), target, u.kind.clone())));
                continue;
            }

            let is_builtin = builtin_denylist.contains(&u.target_name.as_str());
            let came_from_import = imports
                .map(|list| list.iter().any(|(_, _, names)| names.iter().any(|n| n == &u.target_name)))
                .unwrap_or(false);
            if (is_builtin || came_from_import) && include_externals {
                let kind = u.target_kind_hint.unwrap_or(codegraph_core::NodeKind::Function);
                edges.push(with_props(GraphEdge::new(u.source.clone(), NodeId::external(kind, &u.target_name), u.kind.clone())));
            }
            // Otherwise: ambiguous or genuinely unknown name, dropped silently.
        }

        edges
    }

    fn resolve_via_import(
        &self,
        imports: Option<&Vec<(String, Option<PathBuf>, Vec<String>)>>,
        name: &str,
    ) -> Option<NodeId> {
        let imports = imports?;
        for (_, resolved_path, names) in imports {
            if !names.iter().any(|n| n == name) {
                continue;
            }
            if let Some(path) = resolved_path {
                if let Some(id) = self.exported_match(path, name).or_else(|| self.local_match(path, name)) {
                    return Some(id);
                }
            }
        }
        None
    }
}

/// Resolve a relative import specifier (`./foo`, `../bar/baz`) to a file that
/// exists on disk among `known_extensions`, trying both `<path>.<ext>` and
/// `<path>/index.<ext>`. Bare specifiers (no leading `.`) are left
/// unresolved — spec §4.4 treats those as package names, always external.
fn resolve_module_path(importing_file: &Path, specifier: &str, known_extensions: &[String]) -> Option<PathBuf> {
    if !(specifier.starts_with('.') || specifier.starts_with('/')) {
        return None;
    }
    let base = importing_file.parent().unwrap_or_else(|| Path::new("")).join(specifier);
    for ext in known_extensions {
        let candidate = base.with_extension(ext);
        if candidate.exists() {
            return Some(candidate);
        }
        let index_candidate = base.join(format!("index.{ext}"));
        if index_candidate.exists() {
            return Some(index_candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::NodeKind;

    fn node(file: &str, name: &str, line: u32, exported: bool) -> GraphNode {
        GraphNode::new(
            NodeId::entity(NodeKind::Function, Path::new(file), name, line),
            NodeKind::Function,
            name.to_string(),
            PathBuf::from(file),
        )
        .with_lines(line, line)
        .with_exported(exported)
    }

    #[test]
    fn register_is_idempotent_on_file_name_line() {
        let mut registry = SymbolRegistry::new();
        let entity = node("a.ts", "helper", 3, false);
        registry.register(&entity);
        registry.register(&entity);
        assert_eq!(registry.by_name.get("helper").unwrap().len(), 1);
    }

    #[test]
    fn same_file_local_match_wins_over_global() {
        let mut registry = SymbolRegistry::new();
        registry.register(&node("a.ts", "run", 1, false));
        registry.register(&node("b.ts", "run", 1, false));

        let unresolved = vec![UnresolvedEdge {
            source: NodeId::entity(NodeKind::Function, Path::new("a.ts"), "caller", 10),
            kind: EdgeKind::Calls,
            target_name: "run".to_string(),
            target_kind_hint: None,
            imported_from: None,
            properties: Vec::new(),
        }];
        let edges = registry.resolve(Path::new("a.ts"), &unresolved, true, &[]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target, NodeId::entity(NodeKind::Function, Path::new("a.ts"), "run", 1));
    }

    #[test]
    fn unique_global_match_used_when_no_local_declaration() {
        let mut registry = SymbolRegistry::new();
        registry.register(&node("b.ts", "uniqueHelper", 1, false));

        let unresolved = vec![UnresolvedEdge {
            source: NodeId::entity(NodeKind::Function, Path::new("a.ts"), "caller", 10),
            kind: EdgeKind::Calls,
            target_name: "uniqueHelper".to_string(),
            target_kind_hint: None,
            imported_from: None,
            properties: Vec::new(),
        }];
        let edges = registry.resolve(Path::new("a.ts"), &unresolved, true, &[]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target, NodeId::entity(NodeKind::Function, Path::new("b.ts"), "uniqueHelper", 1));
    }

    #[test]
    fn ambiguous_global_match_drops_without_sentinel() {
        let mut registry = SymbolRegistry::new();
        registry.register(&node("a.ts", "run", 1, false));
        registry.register(&node("b.ts", "run", 5, false));

        let unresolved = vec![UnresolvedEdge {
            source: NodeId::entity(NodeKind::Function, Path::new("c.ts"), "caller", 10),
            kind: EdgeKind::Calls,
            target_name: "run".to_string(),
            target_kind_hint: None,
            imported_from: None,
            properties: Vec::new(),
        }];
        let edges = registry.resolve(Path::new("c.ts"), &unresolved, true, &[]);
        assert!(edges.is_empty());
    }

    #[test]
    fn builtin_denylist_name_becomes_external_sentinel() {
        let registry = SymbolRegistry::new();
        let unresolved = vec![UnresolvedEdge {
            source: NodeId::entity(NodeKind::Function, Path::new("a.ts"), "caller", 1),
            kind: EdgeKind::Calls,
            target_name: "console".to_string(),
            target_kind_hint: None,
            imported_from: None,
            properties: Vec::new(),
        }];
        let edges = registry.resolve(Path::new("a.ts"), &unresolved, true, &["console"]);
        assert_eq!(edges.len(), 1);
        assert!(edges[0].target.is_external());
    }
}

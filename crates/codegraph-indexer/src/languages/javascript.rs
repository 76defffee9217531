//! JavaScript reference plugin, built on tree-sitter (spec §4.3's one
//! required reference implementation — everything else is an unbound
//! extension point, spec §9). Covers top-level variables and JSX
//! components (`.jsx`) alongside the usual functions/classes/imports.

use std::path::Path;

use codegraph_core::{CoreError, CoreResult, EdgeKind, GraphEdge, GraphNode, NodeId, NodeKind};
use tree_sitter::{Node, Point};

use crate::extractor::{ExtractedFile, ImportSpecifier, LanguageExtractor, UnresolvedEdge};
use crate::parser_pool::{FileType, ParseRequest, ParserPool};

pub struct JavaScriptExtractor {
    parser_pool: ParserPool,
}

impl JavaScriptExtractor {
    pub fn new(parser_pool: ParserPool) -> Self {
        Self { parser_pool }
    }

    fn line(point: Point) -> u32 {
        point.row as u32 + 1
    }

    fn identifier_name(node: Node, source: &str) -> Option<String> {
        let mut cursor = node.walk();
        node.children(&mut cursor)
            .find(|c| c.kind() == "identifier" || c.kind() == "property_identifier")
            .and_then(|c| c.utf8_text(source.as_bytes()).ok())
            .map(|s| s.to_string())
    }

    fn extract_function(path: &Path, node: Node, source: &str) -> Option<GraphNode> {
        let is_function = matches!(
            node.kind(),
            "function_declaration" | "function_expression" | "arrow_function" | "generator_function_declaration"
        );
        if !is_function {
            return None;
        }
        let name = Self::identifier_name(node, source).unwrap_or_else(|| "<anonymous>".to_string());
        let start = Self::line(node.start_position());
        let end = Self::line(node.end_position());
        let is_async = node
            .utf8_text(source.as_bytes())
            .map(|t| t.trim_start().starts_with("async"))
            .unwrap_or(false);
        Some(
            GraphNode::new(
                NodeId::entity(NodeKind::Function, path, &name, start),
                NodeKind::Function,
                name,
                path.to_path_buf(),
            )
            .with_lines(start, end)
            .with_exported(is_exported(node, source))
            .with_meta("isAsync", serde_json::json!(is_async)),
        )
    }

    fn extract_method(path: &Path, node: Node, source: &str) -> Option<GraphNode> {
        if node.kind() != "method_definition" {
            return None;
        }
        let name = Self::identifier_name(node, source)?;
        let start = Self::line(node.start_position());
        let end = Self::line(node.end_position());
        Some(
            GraphNode::new(
                NodeId::entity(NodeKind::Method, path, &name, start),
                NodeKind::Method,
                name,
                path.to_path_buf(),
            )
            .with_lines(start, end),
        )
    }

    fn extract_class(path: &Path, node: Node, source: &str) -> Option<(GraphNode, Option<String>)> {
        if node.kind() != "class_declaration" {
            return None;
        }
        let name = Self::identifier_name(node, source)?;
        let start = Self::line(node.start_position());
        let end = Self::line(node.end_position());
        let superclass = node
            .child_by_field_name("heritage")
            .and_then(|h| h.utf8_text(source.as_bytes()).ok())
            .map(|t| t.trim_start_matches("extends").trim().to_string());
        let class_node = GraphNode::new(
            NodeId::entity(NodeKind::Class, path, &name, start),
            NodeKind::Class,
            name,
            path.to_path_buf(),
        )
        .with_lines(start, end)
        .with_exported(is_exported(node, source));
        Some((class_node, superclass))
    }

    fn extract_import(path: &Path, node: Node, source: &str) -> Option<ImportSpecifier> {
        if node.kind() != "import_statement" {
            return None;
        }
        let module = node
            .children(&mut node.walk())
            .find(|c| c.kind() == "string")
            .and_then(|c| c.utf8_text(source.as_bytes()).ok())
            .map(|s| s.trim_matches(['"', '\'']).to_string())?;
        let start = Self::line(node.start_position());

        let mut imported_names = Vec::new();
        collect_import_names(node, source, &mut imported_names);

        let import_node = GraphNode::new(
            NodeId::entity(NodeKind::Import, path, &module, start),
            NodeKind::Import,
            module.clone(),
            path.to_path_buf(),
        )
        .with_lines(start, start)
        .with_meta("specifiers", serde_json::json!(imported_names));

        Some(ImportSpecifier {
            node: import_node,
            module,
            imported_names,
        })
    }
}

fn collect_import_names(node: Node, source: &str, out: &mut Vec<String>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "identifier" => {
                if let Ok(name) = child.utf8_text(source.as_bytes()) {
                    out.push(name.to_string());
                }
            }
            "import_specifier" | "named_imports" | "import_clause" => {
                collect_import_names(child, source, out);
            }
            _ => {}
        }
    }
}

/// JS has no first-class export keyword on every declaration form, so this
/// walks up to the nearest statement sibling looking for `export`.
fn is_exported(node: Node, source: &str) -> bool {
    if let Some(parent) = node.parent() {
        if parent.kind() == "export_statement" {
            return true;
        }
        return parent
            .utf8_text(source.as_bytes())
            .map(|t| t.trim_start().starts_with("export"))
            .unwrap_or(false);
    }
    false
}

impl LanguageExtractor for JavaScriptExtractor {
    fn language_id(&self) -> &'static str {
        "javascript"
    }

    fn extract(&self, path: &Path, content: &str) -> CoreResult<ExtractedFile> {
        let request = ParseRequest {
            file_type: FileType::JavaScript,
            content: content.to_string(),
            path: path.to_path_buf(),
        };
        let parsed = self.parser_pool.parse_blocking(request).map_err(|e| CoreError::ParseFailure {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut out = ExtractedFile::default();
        walk(path, parsed.tree.root_node(), content, None, &mut out);
        Ok(out)
    }
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

/// True if the name follows the convention for a custom React hook.
fn looks_like_hook(name: &str) -> bool {
    name.strip_prefix("use").map(|rest| rest.starts_with(|c: char| c.is_uppercase())).unwrap_or(false)
}

/// Whether `node`'s subtree contains any JSX, without descending into a
/// nested function's own body.
fn contains_jsx(node: Node) -> bool {
    if matches!(node.kind(), "jsx_element" | "jsx_self_closing_element" | "jsx_fragment") {
        return true;
    }
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|c| !matches!(c.kind(), "function_declaration" | "function_expression" | "arrow_function" | "method_definition"))
        .any(contains_jsx)
}

fn jsx_tag_name(element: Node, source: &str) -> Option<String> {
    let mut cursor = element.walk();
    element
        .children(&mut cursor)
        .find(|c| matches!(c.kind(), "identifier" | "nested_identifier"))
        .and_then(|c| c.utf8_text(source.as_bytes()).ok())
        .map(|s| s.to_string())
}

/// RENDERS edges: every capitalized JSX tag used in a component's body.
fn walk_jsx_renders(node: Node, source: &str, caller: &NodeId, out: &mut ExtractedFile) {
    if matches!(node.kind(), "jsx_opening_element" | "jsx_self_closing_element") {
        if let Some(tag) = jsx_tag_name(node, source) {
            if starts_uppercase(&tag) {
                out.unresolved.push(UnresolvedEdge {
                    source: caller.clone(),
                    kind: EdgeKind::Renders,
                    target_name: tag,
                    target_kind_hint: Some(NodeKind::Component),
                    imported_from: None,
                    properties: vec![("line".to_string(), serde_json::json!(JavaScriptExtractor::line(node.start_position())))],
                });
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_jsx_renders(child, source, caller, out);
    }
}

/// USES_HOOK edges: calls to `useXxx`-shaped functions within a component.
fn walk_hooks(node: Node, source: &str, caller: &NodeId, out: &mut ExtractedFile) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "call_expression" {
            if let Some(callee) = child.child_by_field_name("function") {
                if callee.kind() == "identifier" {
                    if let Ok(name) = callee.utf8_text(source.as_bytes()) {
                        if looks_like_hook(name) {
                            out.unresolved.push(UnresolvedEdge {
                                source: caller.clone(),
                                kind: EdgeKind::UsesHook,
                                target_name: name.to_string(),
                                target_kind_hint: Some(NodeKind::Function),
                                imported_from: None,
                                properties: vec![("hookName".to_string(), serde_json::json!(name))],
                            });
                        }
                    }
                }
            }
        }
        if !matches!(child.kind(), "function_declaration" | "function_expression" | "arrow_function" | "method_definition") {
            walk_hooks(child, source, caller, out);
        }
    }
}

/// Walks the tree once, threading the enclosing class/function's NodeId down
/// so method/call edges can be attached without a second pass.
fn walk(path: &Path, node: Node, source: &str, enclosing: Option<&NodeId>, out: &mut ExtractedFile) {
    if matches!(node.kind(), "lexical_declaration" | "variable_declaration") {
        let mut cursor = node.walk();
        for declarator in node.children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = JavaScriptExtractor::identifier_name(declarator, source) else { continue };
            let value = declarator.child_by_field_name("value");
            let is_fn_value = value.map(|v| matches!(v.kind(), "arrow_function" | "function_expression")).unwrap_or(false);

            if is_fn_value {
                let value = value.unwrap();
                let start = JavaScriptExtractor::line(declarator.start_position());
                let end = JavaScriptExtractor::line(value.end_position());
                let is_component = starts_uppercase(&name) && contains_jsx(value);
                let kind = if is_component { NodeKind::Component } else { NodeKind::Function };
                let entity_id = NodeId::entity(kind, path, &name, start);
                out.entities.push(
                    GraphNode::new(entity_id.clone(), kind, name, path.to_path_buf())
                        .with_lines(start, end)
                        .with_exported(is_exported(declarator, source)),
                );
                walk_calls(path, value, source, &entity_id, out);
                if is_component {
                    walk_jsx_renders(value, source, &entity_id, out);
                    walk_hooks(value, source, &entity_id, out);
                }
                let mut body_cursor = value.walk();
                for child in value.children(&mut body_cursor) {
                    walk(path, child, source, Some(&entity_id), out);
                }
            } else {
                let start = JavaScriptExtractor::line(declarator.start_position());
                out.entities.push(
                    GraphNode::new(
                        NodeId::entity(NodeKind::Variable, path, &name, start),
                        NodeKind::Variable,
                        name,
                        path.to_path_buf(),
                    )
                    .with_lines(start, start)
                    .with_exported(is_exported(declarator, source)),
                );
                if let Some(value) = value {
                    walk(path, value, source, enclosing, out);
                }
            }
        }
        return;
    }

    if let Some((class_node, superclass)) = JavaScriptExtractor::extract_class(path, node, source) {
        let class_id = class_node.id.clone();
        out.entities.push(class_node);
        if let Some(base) = superclass {
            out.unresolved.push(UnresolvedEdge {
                source: class_id.clone(),
                kind: EdgeKind::Extends,
                target_name: base,
                target_kind_hint: Some(NodeKind::Class),
                imported_from: None,
                properties: Vec::new(),
            });
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            walk(path, child, source, Some(&class_id), out);
        }
        return;
    }

    if let Some(method_node) = JavaScriptExtractor::extract_method(path, node, source) {
        let method_id = method_node.id.clone();
        out.entities.push(method_node);
        if let Some(class_id) = enclosing {
            out.edges.push(GraphEdge::new(class_id.clone(), method_id.clone(), EdgeKind::HasMethod));
        }
        walk_calls(path, node, source, &method_id, out);
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            walk(path, child, source, enclosing, out);
        }
        return;
    }

    if let Some(function_node) = JavaScriptExtractor::extract_function(path, node, source) {
        let function_id = function_node.id.clone();
        out.entities.push(function_node);
        walk_calls(path, node, source, &function_id, out);
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            walk(path, child, source, Some(&function_id), out);
        }
        return;
    }

    if let Some(import) = JavaScriptExtractor::extract_import(path, node, source) {
        out.imports.push(import);
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(path, child, source, enclosing, out);
    }
}

/// Within one function/method body, record each `foo(...)` call as an
/// unresolved CALLS edge keyed by the callee's bare name.
fn walk_calls(path: &Path, node: Node, source: &str, caller: &NodeId, out: &mut ExtractedFile) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "call_expression" {
            if let Some(callee) = child.child_by_field_name("function") {
                let name = match callee.kind() {
                    "identifier" => callee.utf8_text(source.as_bytes()).ok(),
                    "member_expression" => callee
                        .child_by_field_name("property")
                        .and_then(|p| p.utf8_text(source.as_bytes()).ok()),
                    _ => None,
                };
                if let Some(name) = name {
                    out.unresolved.push(UnresolvedEdge {
                        source: caller.clone(),
                        kind: EdgeKind::Calls,
                        target_name: name.to_string(),
                        target_kind_hint: None,
                        imported_from: None,
                        properties: Vec::new(),
                    });
                }
            }
        }
        // Don't descend into nested function bodies — they get their own
        // caller id when `walk` reaches them.
        if !matches!(
            child.kind(),
            "function_declaration" | "function_expression" | "arrow_function" | "method_definition"
        ) {
            walk_calls(path, child, source, caller, out);
        }
    }
    let _ = path;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_counts_classes_functions_and_imports() {
        let parser_pool = crate::parser_pool::create_parser_pool();
        let extractor = JavaScriptExtractor::new(parser_pool);
        let code = r#"
import React from 'react';
import { useState } from 'react';

class User {
    constructor(name) {
        this.name = name;
    }

    getName() {
        return this.name;
    }
}

function createUser(name) {
    return new User(name);
}

const arrowFunc = (x, y) => x + y;

export default createUser;
"#;
        let path = Path::new("test.js");
        let result = extractor.extract(path, code).unwrap();

        let classes = result.entities.iter().filter(|n| n.kind == NodeKind::Class).count();
        let functions = result.entities.iter().filter(|n| n.kind == NodeKind::Function).count();
        let methods = result.entities.iter().filter(|n| n.kind == NodeKind::Method).count();

        assert_eq!(classes, 1);
        assert_eq!(methods, 2); // constructor + getName
        assert_eq!(functions, 2); // createUser + arrowFunc
        assert_eq!(result.imports.len(), 2);
    }

    #[test]
    fn extract_records_unresolved_calls() {
        let parser_pool = crate::parser_pool::create_parser_pool();
        let extractor = JavaScriptExtractor::new(parser_pool);
        let code = r#"
function outer() {
    helper();
}
"#;
        let result = extractor.extract(Path::new("a.js"), code).unwrap();
        assert!(result.unresolved.iter().any(|u| u.target_name == "helper" && u.kind == EdgeKind::Calls));
    }

    #[test]
    fn extract_records_top_level_variable() {
        let parser_pool = crate::parser_pool::create_parser_pool();
        let extractor = JavaScriptExtractor::new(parser_pool);
        let code = "export const MAX_RETRIES = 3;\n";
        let result = extractor.extract(Path::new("constants.js"), code).unwrap();
        let var = result.entities.iter().find(|n| n.kind == NodeKind::Variable).unwrap();
        assert_eq!(var.name, "MAX_RETRIES");
        assert!(var.is_exported);
    }

    #[test]
    fn extract_detects_component_renders_and_hooks() {
        let parser_pool = crate::parser_pool::create_parser_pool();
        let extractor = JavaScriptExtractor::new(parser_pool);
        let code = r#"
import React, { useState } from 'react';

function Counter() {
    const [count, setCount] = useState(0);
    return <Panel><Label /></Panel>;
}
"#;
        let result = extractor.extract(Path::new("Counter.jsx"), code).unwrap();
        let component = result.entities.iter().find(|n| n.kind == NodeKind::Component).expect("Counter recognized as a component");
        assert_eq!(component.name, "Counter");

        assert!(result.unresolved.iter().any(|u| u.kind == EdgeKind::UsesHook && u.target_name == "useState"));
        let renders: Vec<_> = result.unresolved.iter().filter(|u| u.kind == EdgeKind::Renders).map(|u| u.target_name.as_str()).collect();
        assert!(renders.contains(&"Panel"));
        assert!(renders.contains(&"Label"));
    }

    #[test]
    fn extract_arrow_component_detected_via_jsx_body() {
        let parser_pool = crate::parser_pool::create_parser_pool();
        let extractor = JavaScriptExtractor::new(parser_pool);
        let code = "const Badge = () => <span>hi</span>;\n";
        let result = extractor.extract(Path::new("Badge.jsx"), code).unwrap();
        let component = result.entities.iter().find(|n| n.kind == NodeKind::Component).expect("Badge recognized as a component");
        assert_eq!(component.name, "Badge");
    }
}

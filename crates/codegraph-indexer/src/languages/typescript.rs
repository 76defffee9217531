//! TypeScript reference plugin — the other half of spec §4.3's one required
//! reference implementation. Builds on the same tree-sitter walk shape as
//! the JavaScript plugin, plus interfaces, type aliases, `implements`,
//! typed params/returns/fields, and JSX-component relations for `.tsx`.

use std::path::Path;

use codegraph_core::{CoreError, CoreResult, EdgeKind, GraphEdge, GraphNode, NodeId, NodeKind};
use tree_sitter::{Node, Point};

use crate::extractor::{ExtractedFile, ImportSpecifier, LanguageExtractor, UnresolvedEdge};
use crate::parser_pool::{FileType, ParseRequest, ParserPool};

/// Type names that never name a graph entity — skip USES_TYPE/RETURNS/
/// HAS_PARAM edges for these rather than emit edges nothing can resolve.
const PRIMITIVE_TYPES: &[&str] = &[
    "string", "number", "boolean", "void", "any", "unknown", "never", "object", "null", "undefined", "this",
    "symbol", "bigint",
];

pub struct TypeScriptExtractor {
    parser_pool: ParserPool,
}

impl TypeScriptExtractor {
    pub fn new(parser_pool: ParserPool) -> Self {
        Self { parser_pool }
    }

    fn line(point: Point) -> u32 {
        point.row as u32 + 1
    }

    fn identifier_name(node: Node, source: &str) -> Option<String> {
        node.child_by_field_name("name")
            .or_else(|| {
                let mut cursor = node.walk();
                node.children(&mut cursor).find(|c| c.kind() == "type_identifier" || c.kind() == "identifier")
            })
            .and_then(|c| c.utf8_text(source.as_bytes()).ok())
            .map(|s| s.to_string())
    }
}

fn is_exported(node: Node, source: &str) -> bool {
    node.parent()
        .and_then(|p| p.utf8_text(source.as_bytes()).ok())
        .map(|t| t.trim_start().starts_with("export"))
        .unwrap_or(false)
}

/// Reduce a type annotation node's text (`: Foo[] | null`) to the single
/// base identifier worth an edge, or `None` for primitives/unions/anything
/// too ambiguous to name a single target.
fn base_type_name(annotation: Node, source: &str) -> Option<String> {
    let text = annotation.utf8_text(source.as_bytes()).ok()?;
    let text = text.trim_start_matches(':').trim();
    if text.contains('|') || text.contains('&') || text.is_empty() {
        return None;
    }
    let base = text.trim_end_matches("[]").trim();
    let base = base.split('<').next().unwrap_or(base).trim();
    if base.is_empty() || PRIMITIVE_TYPES.contains(&base) || !base.chars().next().map(|c| c.is_alphabetic()).unwrap_or(false) {
        return None;
    }
    Some(base.to_string())
}

/// True if the name follows the function/component's convention for a
/// custom hook (`useSomething`), not a host/library call.
fn looks_like_hook(name: &str) -> bool {
    name.strip_prefix("use").map(|rest| rest.starts_with(|c: char| c.is_uppercase())).unwrap_or(false)
}

impl LanguageExtractor for TypeScriptExtractor {
    fn language_id(&self) -> &'static str {
        "typescript"
    }

    fn extract(&self, path: &Path, content: &str) -> CoreResult<ExtractedFile> {
        let file_type = match path.extension().and_then(|e| e.to_str()) {
            Some("tsx") => FileType::Tsx,
            _ => FileType::TypeScript,
        };
        let request = ParseRequest { file_type, content: content.to_string(), path: path.to_path_buf() };
        let parsed = self.parser_pool.parse_blocking(request).map_err(|e| CoreError::ParseFailure {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut out = ExtractedFile::default();
        walk(path, parsed.tree.root_node(), content, None, &mut out);
        Ok(out)
    }
}

fn walk(path: &Path, node: Node, source: &str, enclosing: Option<&NodeId>, out: &mut ExtractedFile) {
    match node.kind() {
        "interface_declaration" => {
            if let Some(name) = TypeScriptExtractor::identifier_name(node, source) {
                let start = TypeScriptExtractor::line(node.start_position());
                let end = TypeScriptExtractor::line(node.end_position());
                let iface = GraphNode::new(
                    NodeId::entity(NodeKind::Interface, path, &name, start),
                    NodeKind::Interface,
                    name,
                    path.to_path_buf(),
                )
                .with_lines(start, end)
                .with_exported(is_exported(node, source));
                out.entities.push(iface);
            }
            return recurse(path, node, source, enclosing, out);
        }
        "type_alias_declaration" => {
            if let Some(name) = TypeScriptExtractor::identifier_name(node, source) {
                let start = TypeScriptExtractor::line(node.start_position());
                let end = TypeScriptExtractor::line(node.end_position());
                out.entities.push(
                    GraphNode::new(
                        NodeId::entity(NodeKind::Type, path, &name, start),
                        NodeKind::Type,
                        name,
                        path.to_path_buf(),
                    )
                    .with_lines(start, end)
                    .with_exported(is_exported(node, source)),
                );
            }
            return recurse(path, node, source, enclosing, out);
        }
        "class_declaration" => {
            if let Some(name) = TypeScriptExtractor::identifier_name(node, source) {
                let start = TypeScriptExtractor::line(node.start_position());
                let end = TypeScriptExtractor::line(node.end_position());
                let class_id = NodeId::entity(NodeKind::Class, path, &name, start);
                let class_node = GraphNode::new(class_id.clone(), NodeKind::Class, name, path.to_path_buf())
                    .with_lines(start, end)
                    .with_exported(is_exported(node, source));
                out.entities.push(class_node);

                if let Some(heritage) = node.child_by_field_name("heritage") {
                    if let Ok(text) = heritage.utf8_text(source.as_bytes()) {
                        if let Some(base) = text.strip_prefix("extends").map(|s| s.trim()) {
                            let base = base.split(char::is_whitespace).next().unwrap_or(base);
                            out.unresolved.push(UnresolvedEdge {
                                source: class_id.clone(),
                                kind: EdgeKind::Extends,
                                target_name: base.to_string(),
                                target_kind_hint: Some(NodeKind::Class),
                                imported_from: None,
                                properties: Vec::new(),
                            });
                        }
                        if let Some(rest) = text.split("implements").nth(1) {
                            for iface in rest.split(',') {
                                let iface = iface.trim().trim_end_matches('{').trim();
                                if !iface.is_empty() {
                                    out.unresolved.push(UnresolvedEdge {
                                        source: class_id.clone(),
                                        kind: EdgeKind::Implements,
                                        target_name: iface.to_string(),
                                        target_kind_hint: Some(NodeKind::Interface),
                                        imported_from: None,
                                        properties: Vec::new(),
                                    });
                                }
                            }
                        }
                    }
                }

                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    walk(path, child, source, Some(&class_id), out);
                }
            }
            return;
        }
        "public_field_definition" | "field_definition" => {
            if let (Some(class_id), Some(name)) = (enclosing, TypeScriptExtractor::identifier_name(node, source)) {
                let start = TypeScriptExtractor::line(node.start_position());
                let visibility = node
                    .children(&mut node.walk())
                    .find(|c| c.kind() == "accessibility_modifier")
                    .and_then(|c| c.utf8_text(source.as_bytes()).ok())
                    .unwrap_or("public")
                    .to_string();
                let field_id = NodeId::entity(NodeKind::Variable, path, &name, start);
                out.entities.push(
                    GraphNode::new(field_id.clone(), NodeKind::Variable, name, path.to_path_buf())
                        .with_lines(start, start)
                        .with_meta("kind", serde_json::json!("field")),
                );
                out.edges.push(
                    GraphEdge::new(class_id.clone(), field_id.clone(), EdgeKind::HasProperty)
                        .with_prop("visibility", serde_json::json!(visibility)),
                );
                if let Some(type_node) = node.child_by_field_name("type") {
                    if let Some(type_name) = base_type_name(type_node, source) {
                        out.unresolved.push(UnresolvedEdge {
                            source: field_id,
                            kind: EdgeKind::UsesType,
                            target_name: type_name,
                            target_kind_hint: None,
                            imported_from: None,
                            properties: Vec::new(),
                        });
                    }
                }
            }
            return;
        }
        "method_definition" | "method_signature" => {
            if let Some(name) = TypeScriptExtractor::identifier_name(node, source) {
                let start = TypeScriptExtractor::line(node.start_position());
                let end = TypeScriptExtractor::line(node.end_position());
                let method_id = NodeId::entity(NodeKind::Method, path, &name, start);
                out.entities.push(
                    GraphNode::new(method_id.clone(), NodeKind::Method, name, path.to_path_buf())
                        .with_lines(start, end),
                );
                if let Some(class_id) = enclosing {
                    out.edges.push(GraphEdge::new(class_id.clone(), method_id.clone(), EdgeKind::HasMethod));
                }
                emit_signature_edges(node, source, &method_id, out);
                walk_calls(node, source, &method_id, out);
            }
            return recurse(path, node, source, enclosing, out);
        }
        "function_declaration" => {
            if let Some(name) = TypeScriptExtractor::identifier_name(node, source) {
                let entity_id = emit_function_like(path, node, &name, node, source, out);
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    walk(path, child, source, Some(&entity_id), out);
                }
            }
            return;
        }
        "lexical_declaration" | "variable_declaration" => {
            let kind_word = node.child(0).and_then(|c| c.utf8_text(source.as_bytes()).ok()).unwrap_or("let");
            let mut cursor = node.walk();
            for declarator in node.children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let Some(name) = declarator.child_by_field_name("name").and_then(|n| n.utf8_text(source.as_bytes()).ok()) else {
                    continue;
                };
                let name = name.to_string();
                let value = declarator.child_by_field_name("value");
                let is_fn_value = value.map(|v| matches!(v.kind(), "arrow_function" | "function_expression")).unwrap_or(false);

                if is_fn_value {
                    let value = value.unwrap();
                    let entity_id = emit_function_like(path, declarator, &name, value, source, out);
                    let mut body_cursor = value.walk();
                    for child in value.children(&mut body_cursor) {
                        walk(path, child, source, Some(&entity_id), out);
                    }
                } else {
                    let start = TypeScriptExtractor::line(declarator.start_position());
                    let var_id = NodeId::entity(NodeKind::Variable, path, &name, start);
                    out.entities.push(
                        GraphNode::new(var_id.clone(), NodeKind::Variable, name, path.to_path_buf())
                            .with_lines(start, start)
                            .with_exported(is_exported(node, source))
                            .with_meta("kind", serde_json::json!(kind_word)),
                    );
                    if let Some(type_node) = declarator.child_by_field_name("type") {
                        if let Some(type_name) = base_type_name(type_node, source) {
                            out.unresolved.push(UnresolvedEdge {
                                source: var_id,
                                kind: EdgeKind::UsesType,
                                target_name: type_name,
                                target_kind_hint: None,
                                imported_from: None,
                                properties: Vec::new(),
                            });
                        }
                    }
                    if let Some(value) = value {
                        walk(path, value, source, enclosing, out);
                    }
                }
            }
            return;
        }
        "import_statement" => {
            if let Some(module) = node
                .children(&mut node.walk())
                .find(|c| c.kind() == "string")
                .and_then(|c| c.utf8_text(source.as_bytes()).ok())
            {
                let module = module.trim_matches(['"', '\'']).to_string();
                let start = TypeScriptExtractor::line(node.start_position());
                let mut imported_names = Vec::new();
                collect_import_names(node, source, &mut imported_names);
                out.imports.push(ImportSpecifier {
                    node: GraphNode::new(
                        NodeId::entity(NodeKind::Import, path, &module, start),
                        NodeKind::Import,
                        module.clone(),
                        path.to_path_buf(),
                    )
                    .with_lines(start, start)
                    .with_meta("specifiers", serde_json::json!(imported_names)),
                    module,
                    imported_names,
                });
            }
            return;
        }
        _ => {}
    }
    recurse(path, node, source, enclosing, out);
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

/// Emit the Function/Component node plus its RETURNS/HAS_PARAM edges and —
/// for components — RENDERS/USES_HOOK. `decl` supplies the declaration site
/// (function_declaration, or the variable_declarator for an arrow/function
/// expression assigned to a const); `body` is where params/return-type/JSX
/// actually live.
fn emit_function_like(path: &Path, decl: Node, name: &str, body: Node, source: &str, out: &mut ExtractedFile) -> NodeId {
    let start = TypeScriptExtractor::line(decl.start_position());
    let end = TypeScriptExtractor::line(decl.end_position());
    let is_component = starts_uppercase(name) && contains_jsx(body);
    let kind = if is_component { NodeKind::Component } else { NodeKind::Function };
    let entity_id = NodeId::entity(kind, path, name, start);
    out.entities.push(
        GraphNode::new(entity_id.clone(), kind, name.to_string(), path.to_path_buf())
            .with_lines(start, end)
            .with_exported(is_exported(decl, source)),
    );
    emit_signature_edges(body, source, &entity_id, out);
    walk_calls(body, source, &entity_id, out);
    if is_component {
        walk_jsx_renders(body, source, &entity_id, out);
        walk_hooks(body, source, &entity_id, out);
    }
    entity_id
}

/// HAS_PARAM for each typed parameter, RETURNS for a typed return annotation.
fn emit_signature_edges(node: Node, source: &str, owner: &NodeId, out: &mut ExtractedFile) {
    if let Some(return_type) = node.child_by_field_name("return_type") {
        if let Some(type_name) = base_type_name(return_type, source) {
            out.unresolved.push(UnresolvedEdge {
                source: owner.clone(),
                kind: EdgeKind::Returns,
                target_name: type_name,
                target_kind_hint: None,
                imported_from: None,
                properties: Vec::new(),
            });
        }
    }
    let Some(params) = node.child_by_field_name("parameters") else { return };
    let mut cursor = params.walk();
    for (position, param) in params
        .children(&mut cursor)
        .filter(|p| matches!(p.kind(), "required_parameter" | "optional_parameter"))
        .enumerate()
    {
        let Some(type_node) = param.child_by_field_name("type") else { continue };
        let Some(type_name) = base_type_name(type_node, source) else { continue };
        let param_name = param
            .child_by_field_name("pattern")
            .and_then(|p| p.utf8_text(source.as_bytes()).ok())
            .unwrap_or("")
            .to_string();
        out.unresolved.push(UnresolvedEdge {
            source: owner.clone(),
            kind: EdgeKind::HasParam,
            target_name: type_name,
            target_kind_hint: None,
            imported_from: None,
            properties: vec![
                ("paramName".to_string(), serde_json::json!(param_name)),
                ("position".to_string(), serde_json::json!(position)),
            ],
        });
    }
}

/// Whether `node`'s subtree contains any JSX, without descending into a
/// nested function/component's own body.
fn contains_jsx(node: Node) -> bool {
    if matches!(node.kind(), "jsx_element" | "jsx_self_closing_element" | "jsx_fragment") {
        return true;
    }
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|c| !matches!(c.kind(), "function_declaration" | "method_definition" | "arrow_function"))
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
                    properties: vec![("line".to_string(), serde_json::json!(TypeScriptExtractor::line(node.start_position())))],
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
        if !matches!(child.kind(), "function_declaration" | "method_definition" | "arrow_function") {
            walk_hooks(child, source, caller, out);
        }
    }
}

fn recurse(path: &Path, node: Node, source: &str, enclosing: Option<&NodeId>, out: &mut ExtractedFile) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(path, child, source, enclosing, out);
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

fn walk_calls(node: Node, source: &str, caller: &NodeId, out: &mut ExtractedFile) {
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
        if !matches!(child.kind(), "function_declaration" | "method_definition" | "arrow_function") {
            walk_calls(child, source, caller, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_handles_interfaces_and_implements() {
        let parser_pool = crate::parser_pool::create_parser_pool();
        let extractor = TypeScriptExtractor::new(parser_pool);
        let code = r#"
export interface Shape {
    area(): number;
}

export class Circle implements Shape {
    radius: number;

    area() {
        return 3.14 * this.radius * this.radius;
    }
}
"#;
        let result = extractor.extract(Path::new("shape.ts"), code).unwrap();
        let interfaces = result.entities.iter().filter(|n| n.kind == NodeKind::Interface).count();
        let classes = result.entities.iter().filter(|n| n.kind == NodeKind::Class).count();
        assert_eq!(interfaces, 1);
        assert_eq!(classes, 1);
        assert!(result
            .unresolved
            .iter()
            .any(|u| u.kind == EdgeKind::Implements && u.target_name == "Shape"));
    }

    #[test]
    fn extract_records_class_field_as_has_property() {
        let parser_pool = crate::parser_pool::create_parser_pool();
        let extractor = TypeScriptExtractor::new(parser_pool);
        let code = r#"
class Account {
    private balance: number;
}
"#;
        let result = extractor.extract(Path::new("account.ts"), code).unwrap();
        let field = result.entities.iter().find(|n| n.kind == NodeKind::Variable).expect("field entity");
        assert_eq!(field.name, "balance");
        let has_property = result.edges.iter().find(|e| e.kind == EdgeKind::HasProperty).expect("edge");
        assert_eq!(has_property.properties.get("visibility").unwrap(), "private");
        assert!(!result.unresolved.iter().any(|u| u.kind == EdgeKind::UsesType && u.target_name == "number"));
    }

    #[test]
    fn extract_records_typed_params_and_return() {
        let parser_pool = crate::parser_pool::create_parser_pool();
        let extractor = TypeScriptExtractor::new(parser_pool);
        let code = "function wrap(value: Widget): Result { return value; }\n";
        let result = extractor.extract(Path::new("wrap.ts"), code).unwrap();
        assert!(result.unresolved.iter().any(|u| u.kind == EdgeKind::HasParam && u.target_name == "Widget"));
        assert!(result.unresolved.iter().any(|u| u.kind == EdgeKind::Returns && u.target_name == "Result"));
    }

    #[test]
    fn extract_records_top_level_variable() {
        let parser_pool = crate::parser_pool::create_parser_pool();
        let extractor = TypeScriptExtractor::new(parser_pool);
        let code = "export const count: Counter = 0;\n";
        let result = extractor.extract(Path::new("count.ts"), code).unwrap();
        let variable = result.entities.iter().find(|n| n.kind == NodeKind::Variable).expect("variable entity");
        assert_eq!(variable.name, "count");
        assert!(variable.is_exported);
        assert!(result.unresolved.iter().any(|u| u.kind == EdgeKind::UsesType && u.target_name == "Counter"));
    }

    #[test]
    fn extract_detects_component_renders_and_hooks() {
        let parser_pool = crate::parser_pool::create_parser_pool();
        let extractor = TypeScriptExtractor::new(parser_pool);
        let code = r#"
function Page() {
    const value = useCounter();
    return <Header title={value} />;
}
"#;
        let result = extractor.extract(Path::new("page.tsx"), code).unwrap();
        let component = result.entities.iter().find(|n| n.kind == NodeKind::Component).expect("component entity");
        assert_eq!(component.name, "Page");
        assert!(result.unresolved.iter().any(|u| u.kind == EdgeKind::Renders && u.target_name == "Header"));
        assert!(result.unresolved.iter().any(|u| u.kind == EdgeKind::UsesHook && u.target_name == "useCounter"));
    }
}

//! Symbol extraction for JavaScript, TypeScript and TSX trees.
//!
//! One explicit-stack traversal collects symbols, their cyclomatic
//! complexity and pending calls. Imports are gathered beforehand by a
//! shallow pass over top-level statements.

use crate::error::IndexError;
use crate::indexer::extract::{
    BindingKind, CallerRef, ExtractedFile, ExtractedSymbol, ImportBinding, LanguageExtractor,
    PendingCall, PendingImport,
};
use crate::indexer::registry::{StrId, StringRegistry};
use crate::model::SymbolKind;
use crate::util;
use std::collections::HashMap;
use tree_sitter::{Node, Tree};

const DECISION_POINTS: &[&str] = &[
    "if_statement",
    "for_statement",
    "for_in_statement",
    "while_statement",
    "do_statement",
    "catch_clause",
    "ternary_expression",
    "switch_case",
];

const SHORT_CIRCUIT_OPERATORS: &[&str] = &["&&", "||", "??"];

const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

type ImportMap = HashMap<StrId, ImportBinding>;

enum Frame<'t> {
    Enter(Node<'t>),
    Leave(usize),
}

struct OpenScope {
    symbol: usize,
    complexity: i64,
}

enum Callee {
    Plain(String),
    Member { object: String, property: String },
}

pub struct JavascriptExtractor;

impl JavascriptExtractor {
    pub fn new() -> Self {
        JavascriptExtractor
    }
}

impl Default for JavascriptExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageExtractor for JavascriptExtractor {
    fn extract(
        &self,
        tree: &Tree,
        source: &str,
        file_path: &str,
        registry: &mut StringRegistry,
    ) -> ExtractedFile {
        let root = tree.root_node();
        let path_id = registry.intern(file_path);
        let mut output = ExtractedFile::new(file_path, path_id);

        let imports = collect_imports(root, source, file_path, registry, &mut output);
        walk(root, source, &imports, registry, &mut output);

        let importer = if output.symbols.is_empty() {
            None
        } else {
            Some(CallerRef::Provisional(0))
        };
        for import in &mut output.pending_imports {
            import.importer = importer;
        }
        output
    }
}

fn walk(
    root: Node<'_>,
    source: &str,
    imports: &ImportMap,
    registry: &mut StringRegistry,
    output: &mut ExtractedFile,
) {
    let mut stack = vec![Frame::Enter(root)];
    let mut scopes: Vec<OpenScope> = Vec::new();

    while let Some(frame) = stack.pop() {
        let node = match frame {
            Frame::Leave(symbol) => {
                if let Some(scope) = scopes.pop() {
                    debug_assert_eq!(scope.symbol, symbol);
                    output.symbols[scope.symbol].complexity = scope.complexity;
                }
                continue;
            }
            Frame::Enter(node) => node,
        };

        if node.is_error() || node.is_missing() {
            output.skipped_nodes += 1;
            let err = IndexError::Extraction {
                path: output.path.clone(),
                kind: node.kind().to_string(),
                line: node.start_position().row as i64 + 1,
            };
            tracing::debug!("{err}, skipping sub-tree");
            continue;
        }

        let kind = node.kind();
        if let Some((name, symbol_kind)) = scope_declaration(node, source) {
            let index = push_symbol(output, registry, node, name, symbol_kind);
            scopes.push(OpenScope {
                symbol: index,
                complexity: 1,
            });
            stack.push(Frame::Leave(index));
        } else if scopes.is_empty() && kind == "variable_declarator" {
            if let Some(name) = module_variable_name(node, source) {
                push_symbol(output, registry, node, name, SymbolKind::Variable);
            }
        }

        if DECISION_POINTS.contains(&kind) || is_short_circuit(node) {
            if let Some(scope) = scopes.last_mut() {
                scope.complexity += 1;
            }
        }

        if kind == "call_expression" || kind == "new_expression" {
            match scopes.last() {
                Some(scope) => {
                    let caller = CallerRef::Provisional(scope.symbol);
                    record_call(node, source, caller, imports, registry, output);
                }
                None => tracing::trace!(
                    "{}:{} call outside any declaration, no caller",
                    output.path,
                    node.start_position().row + 1
                ),
            }
        }

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        for child in children.into_iter().rev() {
            stack.push(Frame::Enter(child));
        }
    }
}

fn push_symbol(
    output: &mut ExtractedFile,
    registry: &mut StringRegistry,
    node: Node<'_>,
    name: String,
    kind: SymbolKind,
) -> usize {
    let (start_line, start_col, end_line, end_col) = span(node);
    let name_id = registry.intern(&name);
    output.symbols.push(ExtractedSymbol {
        name,
        name_id,
        kind,
        start_line,
        start_col,
        end_line,
        end_col,
        complexity: 1,
    });
    output.symbols.len() - 1
}

/// Name and kind of a node that opens a complexity scope.
fn scope_declaration(node: Node<'_>, source: &str) -> Option<(String, SymbolKind)> {
    let kind = match node.kind() {
        "function_declaration" | "generator_function_declaration" => SymbolKind::Function,
        "method_definition" => SymbolKind::Method,
        "class_declaration" | "abstract_class_declaration" => SymbolKind::Class,
        "interface_declaration" => SymbolKind::Interface,
        "enum_declaration" => SymbolKind::Enum,
        "type_alias_declaration" => SymbolKind::Type,
        "variable_declarator" if has_function_value(node) => SymbolKind::Function,
        "public_field_definition" | "field_definition" if has_function_value(node) => {
            SymbolKind::Method
        }
        _ => return None,
    };
    let name_node = node
        .child_by_field_name("name")
        .or_else(|| node.child_by_field_name("property"))?;
    let name = node_text(name_node, source);
    if name.is_empty() {
        return None;
    }
    Some((name, kind))
}

fn has_function_value(node: Node<'_>) -> bool {
    node.child_by_field_name("value")
        .map(|value| FUNCTION_VALUES.contains(&value.kind()))
        .unwrap_or(false)
}

fn module_variable_name(node: Node<'_>, source: &str) -> Option<String> {
    let name_node = node.child_by_field_name("name")?;
    if name_node.kind() != "identifier" {
        return None;
    }
    if node
        .child_by_field_name("value")
        .is_some_and(|value| require_specifier(value, source).is_some())
    {
        return None;
    }
    let name = node_text(name_node, source);
    if name.is_empty() { None } else { Some(name) }
}

fn is_short_circuit(node: Node<'_>) -> bool {
    if node.kind() != "binary_expression" {
        return false;
    }
    node.child_by_field_name("operator")
        .map(|op| SHORT_CIRCUIT_OPERATORS.contains(&op.kind()))
        .unwrap_or(false)
}

fn record_call(
    node: Node<'_>,
    source: &str,
    caller: CallerRef,
    imports: &ImportMap,
    registry: &mut StringRegistry,
    output: &mut ExtractedFile,
) {
    let Some(callee) = callee(node, source) else {
        return;
    };
    let (callee_name, binding) = match callee {
        Callee::Plain(name) => {
            let binding = registry
                .get(&name)
                .and_then(|id| imports.get(&id))
                .filter(|binding| binding.kind != BindingKind::Namespace)
                .copied();
            (name, binding)
        }
        Callee::Member { object, property } => {
            let binding = registry
                .get(&object)
                .and_then(|id| imports.get(&id))
                .filter(|binding| binding.kind == BindingKind::Namespace)
                .map(|binding| ImportBinding {
                    imported_name_id: Some(registry.intern(&property)),
                    ..*binding
                });
            (property, binding)
        }
    };
    let callee_name_id = registry.intern(&callee_name);
    output.pending_calls.push(PendingCall {
        caller,
        caller_path_id: output.path_id,
        callee_name_id,
        import_source_id: binding.map(|b| b.source_module_id),
        imported_name_id: binding.and_then(|b| b.imported_name_id),
    });
}

fn callee(node: Node<'_>, source: &str) -> Option<Callee> {
    let target = node
        .child_by_field_name("function")
        .or_else(|| node.child_by_field_name("constructor"))?;
    match target.kind() {
        "identifier" => {
            let name = node_text(target, source);
            if name.is_empty() { None } else { Some(Callee::Plain(name)) }
        }
        "member_expression" => {
            let property = node_text(target.child_by_field_name("property")?, source);
            if property.is_empty() {
                return None;
            }
            let object = target
                .child_by_field_name("object")
                .filter(|object| object.kind() == "identifier")
                .map(|object| node_text(object, source))
                .unwrap_or_default();
            Some(Callee::Member { object, property })
        }
        _ => None,
    }
}

/// Shallow pass over top-level statements building the local import map.
fn collect_imports(
    root: Node<'_>,
    source: &str,
    file_path: &str,
    registry: &mut StringRegistry,
    output: &mut ExtractedFile,
) -> ImportMap {
    let mut imports = ImportMap::new();
    let mut cursor = root.walk();
    for statement in root.named_children(&mut cursor) {
        let bindings = match statement.kind() {
            "import_statement" => es_import_bindings(statement, source),
            "lexical_declaration" | "variable_declaration" => require_bindings(statement, source),
            _ => continue,
        };
        for (specifier, local, imported, kind) in bindings {
            let module_key = util::resolve_module_specifier(file_path, &specifier);
            let source_module_id = registry.intern(&module_key);
            let local_name_id = registry.intern(&local);
            let imported_name_id = imported.map(|name| registry.intern(&name));
            imports.insert(
                local_name_id,
                ImportBinding {
                    kind,
                    source_module_id,
                    imported_name_id,
                },
            );
            if let Some(imported_name_id) = imported_name_id {
                output.pending_imports.push(PendingImport {
                    importer: None,
                    importer_path_id: output.path_id,
                    source_module_id,
                    imported_name_id,
                    local_name_id,
                });
            }
        }
    }
    imports
}

type RawBinding = (String, String, Option<String>, BindingKind);

fn es_import_bindings(node: Node<'_>, source: &str) -> Vec<RawBinding> {
    let mut out = Vec::new();
    let Some(specifier) = node
        .child_by_field_name("source")
        .and_then(|s| unquote_string_literal(&node_text(s, source)))
    else {
        return out;
    };
    let mut cursor = node.walk();
    for clause in node.named_children(&mut cursor) {
        if clause.kind() != "import_clause" {
            continue;
        }
        let mut inner = clause.walk();
        for part in clause.named_children(&mut inner) {
            match part.kind() {
                "identifier" => {
                    let local = node_text(part, source);
                    out.push((specifier.clone(), local.clone(), Some(local), BindingKind::Default));
                }
                "namespace_import" => {
                    let mut ns_cursor = part.walk();
                    let local = part
                        .named_children(&mut ns_cursor)
                        .find(|child| child.kind() == "identifier")
                        .map(|child| node_text(child, source));
                    if let Some(local) = local {
                        out.push((specifier.clone(), local, None, BindingKind::Namespace));
                    }
                }
                "named_imports" => {
                    let mut spec_cursor = part.walk();
                    for spec in part.named_children(&mut spec_cursor) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let Some(name_node) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        let raw = node_text(name_node, source);
                        let imported = unquote_string_literal(&raw).unwrap_or(raw);
                        let local = spec
                            .child_by_field_name("alias")
                            .map(|alias| node_text(alias, source))
                            .unwrap_or_else(|| imported.clone());
                        out.push((specifier.clone(), local, Some(imported), BindingKind::Named));
                    }
                }
                _ => {}
            }
        }
    }
    out.retain(|(_, local, _, _)| !local.is_empty());
    out
}

/// `const x = require('m')` and `const { a, b: c } = require('m')`.
fn require_bindings(node: Node<'_>, source: &str) -> Vec<RawBinding> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(specifier) = declarator
            .child_by_field_name("value")
            .and_then(|value| require_specifier(value, source))
        else {
            continue;
        };
        let Some(name_node) = declarator.child_by_field_name("name") else {
            continue;
        };
        match name_node.kind() {
            "identifier" => {
                let local = node_text(name_node, source);
                out.push((specifier, local, None, BindingKind::Namespace));
            }
            "object_pattern" => {
                let mut inner = name_node.walk();
                for prop in name_node.named_children(&mut inner) {
                    match prop.kind() {
                        "shorthand_property_identifier_pattern" => {
                            let name = node_text(prop, source);
                            out.push((specifier.clone(), name.clone(), Some(name), BindingKind::Named));
                        }
                        "pair_pattern" => {
                            let key = prop.child_by_field_name("key").map(|k| node_text(k, source));
                            let value = prop
                                .child_by_field_name("value")
                                .filter(|v| v.kind() == "identifier")
                                .map(|v| node_text(v, source));
                            if let (Some(key), Some(value)) = (key, value) {
                                out.push((specifier.clone(), value, Some(key), BindingKind::Named));
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    out.retain(|(_, local, _, _)| !local.is_empty());
    out
}

fn require_specifier(value: Node<'_>, source: &str) -> Option<String> {
    if value.kind() != "call_expression" {
        return None;
    }
    let function = value.child_by_field_name("function")?;
    if function.kind() != "identifier" || node_text(function, source) != "require" {
        return None;
    }
    let args = value.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let first = args.named_children(&mut cursor).next()?;
    if first.kind() != "string" {
        return None;
    }
    unquote_string_literal(&node_text(first, source))
}

fn unquote_string_literal(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() < 2 {
        return None;
    }
    let first = trimmed.chars().next()?;
    if first == '"' || first == '\'' || first == '`' {
        let last = trimmed.chars().last()?;
        if last == first {
            return Some(trimmed[1..trimmed.len() - 1].to_string());
        }
    }
    None
}

fn span(node: Node<'_>) -> (i64, i64, i64, i64) {
    let start = node.start_position();
    let end = node.end_position();
    (
        start.row as i64 + 1,
        start.column as i64 + 1,
        end.row as i64 + 1,
        end.column as i64 + 1,
    )
}

fn node_text(node: Node<'_>, source: &str) -> String {
    let start = node.start_byte();
    let end = node.end_byte();
    source.get(start..end).unwrap_or("").trim().to_string()
}

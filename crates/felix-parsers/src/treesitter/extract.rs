//! Conversion of tree-sitter query matches into raw extraction records.
//!
//! All language queries share one capture-name scheme (`def.func.name`,
//! `ref.import.source`, …) so this module stays language-agnostic; the
//! per-language backends only supply the query and post-extraction
//! enhancement.

use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor};

use felix_core::types::{ComponentKind, RelationshipKind, SourceLocation};

use super::{node_location, node_text};

/// A definition occurrence (function, class, field, …).
#[derive(Debug, Clone)]
pub struct RawDefinition {
    pub name: String,
    pub kind: ComponentKind,
    pub params: String,
    pub location: SourceLocation,
}

/// An import occurrence. One record per imported specifier.
#[derive(Debug, Clone)]
pub struct RawImport {
    pub specifier: String,
    pub names: Vec<String>,
    pub location: SourceLocation,
}

/// A call or constructor-invocation occurrence.
#[derive(Debug, Clone)]
pub struct RawCall {
    pub callee: String,
    pub is_method: bool,
    pub is_new: bool,
    pub location: SourceLocation,
}

/// An inheritance occurrence (`extends` / `implements` / trait impl).
#[derive(Debug, Clone)]
pub struct RawInherit {
    pub subtype: String,
    pub supertype: String,
    pub kind: RelationshipKind,
    pub location: SourceLocation,
}

/// The line span of an `export` statement; definitions starting inside one
/// are marked exported.
#[derive(Debug, Clone, Copy)]
pub struct RawExportSpan {
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub definitions: Vec<RawDefinition>,
    pub imports: Vec<RawImport>,
    pub calls: Vec<RawCall>,
    pub inherits: Vec<RawInherit>,
    pub exports: Vec<RawExportSpan>,
}

fn kind_for_def_capture(tag: &str) -> ComponentKind {
    match tag {
        "func" => ComponentKind::Function,
        "method" => ComponentKind::Method,
        "class" => ComponentKind::Class,
        "interface" => ComponentKind::Interface,
        "struct" => ComponentKind::Struct,
        "enum" => ComponentKind::Enum,
        "trait" => ComponentKind::Trait,
        "mod" => ComponentKind::Module,
        "typedef" => ComponentKind::Typedef,
        "var" => ComponentKind::Variable,
        "const" => ComponentKind::Constant,
        "field" => ComponentKind::Field,
        "macro" => ComponentKind::Macro,
        _ => ComponentKind::Unknown,
    }
}

/// Run the extraction query over a parse tree. Matches are folded into raw
/// records; duplicate definitions at the same `(name, line)` keep the most
/// specific kind (Go's general `type_spec` pattern also matches structs).
pub fn run_query(query: &Query, root: Node<'_>, source: &[u8]) -> Extraction {
    let mut extraction = Extraction::default();
    let capture_names = query.capture_names();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, root, source);

    while let Some(m) = matches.next() {
        let mut def_name: Option<(String, ComponentKind)> = None;
        let mut def_params = String::new();
        let mut outer: Option<SourceLocation> = None;
        let mut import_source: Option<String> = None;
        let mut import_names: Vec<String> = Vec::new();
        let mut call: Option<(String, bool, bool)> = None;
        let mut inherit_sub: Option<String> = None;
        let mut inherit_super: Option<String> = None;
        let mut inherit_kind: Option<RelationshipKind> = None;
        let mut is_export = false;
        let mut use_path: Option<String> = None;

        for cap in m.captures {
            let cap_name = capture_names[cap.index as usize];
            let mut parts = cap_name.splitn(3, '.');
            let family = parts.next().unwrap_or("");
            let tag = parts.next().unwrap_or("");
            let field = parts.next().unwrap_or("");

            match (family, field) {
                ("def", "name") => {
                    def_name = Some((
                        node_text(cap.node, source).to_string(),
                        kind_for_def_capture(tag),
                    ));
                }
                ("def", "params") => {
                    def_params = node_text(cap.node, source).to_string();
                }
                ("def", "") => {
                    outer = Some(node_location(cap.node));
                }
                ("ref", "") => match tag {
                    "export" => {
                        is_export = true;
                        outer = Some(node_location(cap.node));
                    }
                    _ => {
                        outer = Some(node_location(cap.node));
                    }
                },
                ("ref", "source") => {
                    let raw = node_text(cap.node, source);
                    import_source =
                        Some(raw.trim_matches('"').trim_matches('\'').trim_matches('`').to_string());
                }
                ("ref", "path") => {
                    use_path = Some(node_text(cap.node, source).to_string());
                }
                ("ref", "name") if tag == "import" => {
                    import_names.push(node_text(cap.node, source).to_string());
                }
                ("ref", "name") if tag == "call" => {
                    call = Some((node_text(cap.node, source).to_string(), false, false));
                }
                ("ref", "method") if tag == "call" => {
                    call = Some((node_text(cap.node, source).to_string(), true, false));
                }
                ("ref", "name") if tag == "new" => {
                    call = Some((node_text(cap.node, source).to_string(), false, true));
                }
                ("ref", "sub") => {
                    inherit_sub = Some(node_text(cap.node, source).to_string());
                    inherit_kind = Some(match tag {
                        "implements" => RelationshipKind::Implements,
                        _ => RelationshipKind::Extends,
                    });
                }
                ("ref", "super") => {
                    inherit_super = Some(node_text(cap.node, source).to_string());
                    if inherit_kind.is_none() {
                        inherit_kind = Some(match tag {
                            "implements" => RelationshipKind::Implements,
                            _ => RelationshipKind::Extends,
                        });
                    }
                }
                _ => {}
            }
        }

        let location = outer.unwrap_or_else(|| SourceLocation::lines(1, 1));

        if let Some((name, kind)) = def_name {
            push_definition(
                &mut extraction.definitions,
                RawDefinition {
                    name,
                    kind,
                    params: def_params,
                    location,
                },
            );
        } else if let Some(path) = use_path {
            // Rust use declarations: split braces/aliases into leaf names.
            let (specifier, names) = split_use_path(&path);
            extraction.imports.push(RawImport {
                specifier,
                names,
                location,
            });
        } else if let Some(specifier) = import_source {
            extraction.imports.push(RawImport {
                specifier,
                names: import_names,
                location,
            });
        } else if let Some((callee, is_method, is_new)) = call {
            extraction.calls.push(RawCall {
                callee,
                is_method,
                is_new,
                location,
            });
        } else if let (Some(subtype), Some(supertype), Some(kind)) =
            (inherit_sub, inherit_super, inherit_kind)
        {
            extraction.inherits.push(RawInherit {
                subtype,
                supertype,
                kind,
                location,
            });
        } else if is_export {
            extraction.exports.push(RawExportSpan {
                start_line: location.start_line,
                end_line: location.end_line,
            });
        }
    }

    extraction
}

fn push_definition(definitions: &mut Vec<RawDefinition>, def: RawDefinition) {
    if let Some(existing) = definitions
        .iter_mut()
        .find(|d| d.name == def.name && d.location.start_line == def.location.start_line)
    {
        // The general pattern (typedef) lost to a more specific one.
        if existing.kind == ComponentKind::Typedef && def.kind != ComponentKind::Typedef {
            *existing = def;
        }
        return;
    }
    definitions.push(def);
}

/// Split a Rust `use` argument into a base specifier plus imported names.
/// `crate::store::{GraphStore, SearchPage}` -> ("crate::store", [both]);
/// `serde::Serialize as Ser` -> ("serde::Serialize", ["Ser"]).
fn split_use_path(path: &str) -> (String, Vec<String>) {
    let path = path.trim();
    if let (Some(open), Some(close)) = (path.find('{'), path.rfind('}')) {
        let base = path[..open].trim_end_matches("::").trim().to_string();
        let mut names = Vec::new();
        for item in path[open + 1..close].split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            if item == "self" {
                if let Some(last) = base.rsplit("::").next() {
                    names.push(last.to_string());
                }
            } else if let Some(pos) = item.rfind(" as ") {
                names.push(item[pos + 4..].trim().to_string());
            } else {
                names.push(item.rsplit("::").next().unwrap_or(item).to_string());
            }
        }
        return (base, names);
    }
    if let Some(pos) = path.rfind(" as ") {
        let base = path[..pos].trim().to_string();
        let alias = path[pos + 4..].trim().to_string();
        return (base, vec![alias]);
    }
    if let Some(stripped) = path.strip_suffix("::*") {
        return (stripped.to_string(), vec!["*".to_string()]);
    }
    let leaf = path.rsplit("::").next().unwrap_or(path).to_string();
    (path.to_string(), vec![leaf])
}

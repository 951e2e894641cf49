//! Assembly of raw extraction records into the component/relationship graph
//! for one file.
//!
//! Output ordering is deterministic: the file component first, definitions
//! by `(start_line, name)`, relationships in construction order with ordinal
//! disambiguation. Re-running on the same input reproduces identical ids.

use std::collections::HashSet;

use felix_core::hash::{component_id, component_id_at, relationship_id};
use felix_core::types::{
    resolve_placeholder, CapabilityBlock, Component, ComponentKind, ComponentMetadata, Language,
    Provenance, Relationship, RelationshipKind, RelationshipMetadata, SourceLocation,
};

use crate::backend::ParseOptions;

use super::extract::Extraction;

pub struct AssembleContext<'a> {
    pub file_path: &'a str,
    pub language: Language,
    pub capability: CapabilityBlock,
    /// Confidence stamped on every emitted relationship; the capability
    /// floor (semantic => >= 0.8) is the backend's responsibility.
    pub confidence: f64,
    pub parser_name: &'a str,
    pub options: &'a ParseOptions,
}

impl AssembleContext<'_> {
    fn provenance(&self) -> Provenance {
        Provenance {
            source: self.file_path.to_string(),
            parser: self.parser_name.to_string(),
            backend: self.capability.backend.clone(),
        }
    }
}

/// Builds the file component every result carries, even when extraction
/// found nothing else.
pub fn file_component(content: &str, ctx: &AssembleContext<'_>) -> Component {
    let line_count = content.lines().count().max(1) as u32;
    let name = ctx
        .file_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(ctx.file_path)
        .to_string();
    Component {
        id: component_id(ctx.file_path, ctx.file_path, ComponentKind::File),
        name,
        kind: ComponentKind::File,
        language: ctx.language,
        file_path: ctx.file_path.to_string(),
        location: SourceLocation::lines(1, line_count),
        parent_id: None,
        code: None,
        metadata: ComponentMetadata::default(),
        capability: ctx.capability.clone(),
    }
}

/// Relationship construction helper that assigns stable ids with ordinal
/// collision breaking.
pub struct EdgeBuilder {
    edges: Vec<Relationship>,
    seen: HashSet<String>,
}

impl EdgeBuilder {
    pub fn new() -> Self {
        EdgeBuilder {
            edges: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn push(
        &mut self,
        source_id: &str,
        target_id: &str,
        kind: RelationshipKind,
        location: Option<SourceLocation>,
        metadata: RelationshipMetadata,
    ) {
        let mut ordinal = 0u32;
        let mut id = relationship_id(source_id, target_id, kind, location.as_ref(), ordinal);
        while !self.seen.insert(id.clone()) {
            ordinal += 1;
            id = relationship_id(source_id, target_id, kind, None, ordinal);
        }
        self.edges.push(Relationship {
            id,
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            kind,
            location,
            metadata,
        });
    }

    pub fn finish(self) -> Vec<Relationship> {
        self.edges
    }
}

impl Default for EdgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble extraction records into `(components, relationships)`.
pub fn assemble(
    content: &str,
    extraction: &Extraction,
    ctx: &AssembleContext<'_>,
) -> (Vec<Component>, Vec<Relationship>) {
    let file = file_component(content, ctx);
    let file_id = file.id.clone();
    let lines: Vec<&str> = content.lines().collect();

    // Sort definitions for deterministic ids and containment nesting:
    // outer-most first at equal start lines.
    let mut defs = extraction.definitions.clone();
    defs.sort_by(|a, b| {
        a.location
            .start_line
            .cmp(&b.location.start_line)
            .then(b.location.end_line.cmp(&a.location.end_line))
            .then(a.name.cmp(&b.name))
    });

    let mut components = vec![file];
    let mut used_ids: HashSet<String> = components.iter().map(|c| c.id.clone()).collect();
    let mut edges = EdgeBuilder::new();

    // (index into components, end_line) stack of open enclosing definitions.
    let mut open: Vec<(usize, u32)> = Vec::new();

    for def in &defs {
        while let Some(&(_, end)) = open.last() {
            if def.location.start_line > end {
                open.pop();
            } else {
                break;
            }
        }
        let parent_index = open.last().map(|&(i, _)| i).unwrap_or(0);
        let parent_id = components[parent_index].id.clone();

        let mut id = component_id(ctx.file_path, &def.name, def.kind);
        if !used_ids.insert(id.clone()) {
            id = component_id_at(ctx.file_path, &def.name, def.kind, def.location.start_line);
            used_ids.insert(id.clone());
        }

        let mut metadata = ComponentMetadata::default();
        if !def.params.is_empty() {
            metadata.parameters = split_params(&def.params);
        }
        // Export statements span their whole declaration; only the top-level
        // definition inside the span is the exported symbol.
        metadata.is_exported = parent_index == 0
            && extraction.exports.iter().any(|e| {
                def.location.start_line >= e.start_line && def.location.start_line <= e.end_line
            });
        metadata.documentation = leading_doc_comment(&lines, def.location.start_line, ctx.language);

        let code = if ctx.options.include_code {
            slice_lines(&lines, def.location.start_line, def.location.end_line)
        } else {
            None
        };

        components.push(Component {
            id: id.clone(),
            name: def.name.clone(),
            kind: def.kind,
            language: ctx.language,
            file_path: ctx.file_path.to_string(),
            location: def.location,
            parent_id: Some(parent_id.clone()),
            code,
            metadata,
            capability: ctx.capability.clone(),
        });

        edges.push(
            &parent_id,
            &id,
            RelationshipKind::Contains,
            Some(def.location),
            RelationshipMetadata {
                confidence: 1.0,
                provenance: Some(ctx.provenance()),
                ..Default::default()
            },
        );

        let index = components.len() - 1;
        open.push((index, def.location.end_line));
    }

    // Export edges from the file to each exported definition.
    for component in components.iter().skip(1) {
        if component.metadata.is_exported {
            edges.push(
                &file_id,
                &component.id,
                RelationshipKind::Exports,
                Some(component.location),
                RelationshipMetadata {
                    confidence: ctx.confidence,
                    provenance: Some(ctx.provenance()),
                    ..Default::default()
                },
            );
        }
    }

    // Import edges: the file imports an unresolved specifier.
    for import in &extraction.imports {
        let mut metadata = RelationshipMetadata {
            confidence: ctx.confidence,
            needs_resolution: true,
            provenance: Some(ctx.provenance()),
            ..Default::default()
        };
        metadata.extras.insert(
            "specifier".to_string(),
            serde_json::Value::String(import.specifier.clone()),
        );
        if !import.names.is_empty() {
            metadata.extras.insert(
                "imported_names".to_string(),
                serde_json::Value::Array(
                    import
                        .names
                        .iter()
                        .map(|n| serde_json::Value::String(n.clone()))
                        .collect(),
                ),
            );
        }
        edges.push(
            &file_id,
            &resolve_placeholder(&import.specifier),
            RelationshipKind::Imports,
            Some(import.location),
            metadata,
        );
    }

    // Call edges from the enclosing definition (or the file at top level).
    for call in &extraction.calls {
        let source_id = enclosing_component_id(&components, call.location.start_line, &file_id);
        let kind = if call.is_new {
            RelationshipKind::Instantiates
        } else {
            RelationshipKind::Calls
        };
        let mut metadata = RelationshipMetadata {
            confidence: ctx.confidence,
            needs_resolution: true,
            provenance: Some(ctx.provenance()),
            ..Default::default()
        };
        if call.is_method {
            metadata.extras.insert(
                "receiver_call".to_string(),
                serde_json::Value::Bool(true),
            );
        }
        edges.push(
            &source_id,
            &resolve_placeholder(&call.callee),
            kind,
            Some(call.location),
            metadata,
        );
    }

    // Inheritance edges from the named subtype definition.
    for inherit in &extraction.inherits {
        let source_id = components
            .iter()
            .find(|c| c.name == inherit.subtype && c.kind.is_type_like())
            .map(|c| c.id.clone())
            .unwrap_or_else(|| file_id.clone());
        edges.push(
            &source_id,
            &resolve_placeholder(&inherit.supertype),
            inherit.kind,
            Some(inherit.location),
            RelationshipMetadata {
                confidence: ctx.confidence,
                needs_resolution: true,
                provenance: Some(ctx.provenance()),
                ..Default::default()
            },
        );
    }

    (components, edges.finish())
}

/// Innermost definition whose range covers `line`, else the file.
fn enclosing_component_id(components: &[Component], line: u32, file_id: &str) -> String {
    let mut best: Option<&Component> = None;
    for component in components.iter().skip(1) {
        if component.location.start_line <= line && line <= component.location.end_line {
            let replace = match best {
                Some(current) => {
                    component.location.end_line - component.location.start_line
                        < current.location.end_line - current.location.start_line
                }
                None => true,
            };
            if replace {
                best = Some(component);
            }
        }
    }
    best.map(|c| c.id.clone()).unwrap_or_else(|| file_id.to_string())
}

fn slice_lines(lines: &[&str], start: u32, end: u32) -> Option<String> {
    let start = start.saturating_sub(1) as usize;
    let end = (end as usize).min(lines.len());
    if start >= end {
        return None;
    }
    Some(lines[start..end].join("\n"))
}

fn split_params(params: &str) -> Vec<String> {
    let trimmed = params.trim().trim_start_matches('(').trim_end_matches(')');
    if trimmed.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for ch in trimmed.chars() {
        match ch {
            '(' | '[' | '{' | '<' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' | '}' | '>' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                let param = current.trim().to_string();
                if !param.is_empty() {
                    out.push(param);
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    let last = current.trim().to_string();
    if !last.is_empty() {
        out.push(last);
    }
    out
}

/// The contiguous run of comment lines immediately above a definition.
fn leading_doc_comment(lines: &[&str], start_line: u32, language: Language) -> Option<String> {
    let prefixes: &[&str] = match language {
        Language::Python | Language::Ruby | Language::Shell => &["#"],
        Language::Rust => &["///", "//!", "//"],
        _ => &["///", "//", "*", "/*", "/**"],
    };
    let mut collected: Vec<String> = Vec::new();
    let mut index = start_line.saturating_sub(2) as i64;
    while index >= 0 {
        let line = lines[index as usize].trim();
        // Skip decorator/attribute lines between the doc and the definition.
        if line.starts_with('@') || line.starts_with("#[") {
            index -= 1;
            continue;
        }
        let Some(prefix) = prefixes.iter().find(|p| line.starts_with(**p)) else {
            break;
        };
        let text = line
            .trim_start_matches(prefix)
            .trim_start_matches(['*', '/'])
            .trim();
        collected.push(text.to_string());
        index -= 1;
    }
    if collected.is_empty() {
        return None;
    }
    collected.reverse();
    let doc = collected.join("\n").trim().to_string();
    if doc.is_empty() {
        None
    } else {
        Some(doc)
    }
}

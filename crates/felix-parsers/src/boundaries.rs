//! Recursive expansion of embedded-language regions.
//!
//! When a backend reports language boundaries (`<script>` blocks, fenced
//! code), each region is re-parsed with the per-language backend, locations
//! are offset back into the host file, and a `language_boundary` edge links
//! the host component to each embedded top-level component. Embedded
//! components keep the embedding backend's capability block — tiers are
//! never promoted — while the host result's overall level drops to the
//! minimum of the contributing backends.

use std::collections::HashSet;

use felix_core::hash::component_id_at;
use felix_core::types::{Component, RelationshipKind, RelationshipMetadata};

use crate::backend::{LanguageBoundary, ParseOptions, ParseResult};
use crate::registry::ParserRegistry;
use crate::treesitter::assemble::EdgeBuilder;

/// Parse every boundary of `result` and splice the embedded graphs into it.
pub fn expand_boundaries(
    registry: &ParserRegistry,
    result: &mut ParseResult,
    content: &str,
    options: &ParseOptions,
) {
    if result.boundaries.is_empty() {
        return;
    }
    let boundaries = std::mem::take(&mut result.boundaries);
    for boundary in &boundaries {
        expand_one(registry, result, content, boundary, options);
    }
}

fn expand_one(
    registry: &ParserRegistry,
    result: &mut ParseResult,
    content: &str,
    boundary: &LanguageBoundary,
    options: &ParseOptions,
) {
    let Some(backend) = registry.best(boundary.language) else {
        return;
    };
    // The segmenter path already tags its output basic; a registered
    // detectors-only backend adds nothing over the host's own outline.
    if backend.backend_name() == "detectors-only" {
        return;
    }

    let lines: Vec<&str> = content.lines().collect();
    let start = boundary.start_line.saturating_sub(1) as usize;
    let end = (boundary.end_line as usize).min(lines.len());
    if start >= end {
        return;
    }
    let slice = lines[start..end].join("\n");
    // Inner options never recurse further: one level of embedding.
    let inner_options = ParseOptions {
        expand_boundaries: false,
        ..options.clone()
    };
    let embedded = backend.parse_content(&slice, &result.file_path, &inner_options);

    let offset = boundary.start_line - 1;
    let host_id = host_component_id(result, boundary);
    let Some(embedded_file_id) = embedded.file_component().map(|c| c.id.clone()) else {
        return;
    };

    let mut used: HashSet<String> = result.components.iter().map(|c| c.id.clone()).collect();
    let mut renames: Vec<(String, String)> = Vec::new();
    let mut spliced: Vec<Component> = Vec::new();

    for component in embedded.components {
        if component.id == embedded_file_id {
            continue; // the host file component already exists
        }
        let mut component = component;
        component.location = component.location.offset_lines(offset);
        if component.parent_id.as_deref() == Some(embedded_file_id.as_str()) {
            component.parent_id = Some(host_id.clone());
        }
        // Scope chain back to the host.
        component.metadata.extras.insert(
            "scope".to_string(),
            serde_json::json!([host_id.clone(), boundary.scope.clone()]),
        );
        if !used.insert(component.id.clone()) {
            let new_id = component_id_at(
                &component.file_path,
                &component.name,
                component.kind,
                component.location.start_line,
            );
            renames.push((component.id.clone(), new_id.clone()));
            used.insert(new_id.clone());
            component.id = new_id;
        }
        spliced.push(component);
    }

    let mut edges = EdgeBuilder::new();
    for relationship in embedded.relationships {
        let mut relationship = relationship;
        if let Some(location) = relationship.location {
            relationship.location = Some(location.offset_lines(offset));
        }
        if relationship.source_id == embedded_file_id {
            relationship.source_id = host_id.clone();
        }
        if relationship.target_id == embedded_file_id {
            relationship.target_id = host_id.clone();
        }
        for (old, new) in &renames {
            if relationship.source_id == *old {
                relationship.source_id = new.clone();
            }
            if relationship.target_id == *old {
                relationship.target_id = new.clone();
            }
        }
        // Re-derive the id: endpoints may have moved.
        edges.push(
            &relationship.source_id.clone(),
            &relationship.target_id.clone(),
            relationship.kind,
            relationship.location,
            relationship.metadata,
        );
    }

    // The host points at each embedded top-level component.
    for component in spliced
        .iter()
        .filter(|c| c.parent_id.as_deref() == Some(host_id.as_str()))
    {
        edges.push(
            &host_id,
            &component.id,
            RelationshipKind::LanguageBoundary,
            Some(component.location),
            RelationshipMetadata {
                confidence: 1.0,
                ..Default::default()
            },
        );
    }

    result.components.extend(spliced);
    result.relationships.extend(edges.finish());
    result.diagnostics.extend(embedded.diagnostics);

    // Never promote: the merged result claims the weakest contributing tier.
    if embedded.capability.parsing_level < result.capability.parsing_level {
        result.capability.parsing_level = embedded.capability.parsing_level;
    }
}

/// The host-side component covering the boundary (the embedded-script or
/// code-block outline node), else the file component.
fn host_component_id(result: &ParseResult, boundary: &LanguageBoundary) -> String {
    result
        .components
        .iter()
        .skip(1)
        .filter(|c| {
            c.location.start_line <= boundary.start_line
                && boundary.end_line <= c.location.end_line
                && !c.is_file()
        })
        .min_by_key(|c| c.location.end_line - c.location.start_line)
        .map(|c| c.id.clone())
        .or_else(|| result.file_component().map(|c| c.id.clone()))
        .unwrap_or_default()
}

//! Basic-tier backends: detectors-only extraction for Markdown, HTML, and
//! plain text. These emit outline components (headings, sections, embedded
//! blocks) and never claim more than `ParsingLevel::Basic`.

use std::sync::OnceLock;

use regex::Regex;

use felix_core::hash::{component_id, component_id_at};
use felix_core::types::{
    CapabilityBlock, CapabilitySet, Component, ComponentKind, ComponentMetadata, Language,
    ParsingLevel, RelationshipKind, RelationshipMetadata, SourceLocation,
};

use crate::backend::{LanguageBoundary, ParseOptions, ParseResult, ParserBackend};
use crate::segmenter::Segmenter;
use crate::treesitter::assemble::EdgeBuilder;

pub const DETECTOR_CONFIDENCE: f64 = 0.4;
pub const DETECTORS_BACKEND: &str = "detectors-only";

fn detector_capability() -> CapabilityBlock {
    CapabilityBlock::new(ParsingLevel::Basic, DETECTORS_BACKEND, CapabilitySet::basic())
}

fn outline_component(
    file_path: &str,
    name: &str,
    kind: ComponentKind,
    language: Language,
    location: SourceLocation,
    parent_id: &str,
    used: &mut std::collections::HashSet<String>,
) -> Component {
    let mut id = component_id(file_path, name, kind);
    if !used.insert(id.clone()) {
        id = component_id_at(file_path, name, kind, location.start_line);
        used.insert(id.clone());
    }
    Component {
        id,
        name: name.to_string(),
        kind,
        language,
        file_path: file_path.to_string(),
        location,
        parent_id: Some(parent_id.to_string()),
        code: None,
        metadata: ComponentMetadata::default(),
        capability: detector_capability(),
    }
}

fn detector_file_component(content: &str, path: &str, language: Language) -> Component {
    let line_count = content.lines().count().max(1) as u32;
    Component {
        id: component_id(path, path, ComponentKind::File),
        name: path.rsplit(['/', '\\']).next().unwrap_or(path).to_string(),
        kind: ComponentKind::File,
        language,
        file_path: path.to_string(),
        location: SourceLocation::lines(1, line_count),
        parent_id: None,
        code: None,
        metadata: ComponentMetadata::default(),
        capability: detector_capability(),
    }
}

fn contains_edge(builder: &mut EdgeBuilder, parent: &str, child: &Component) {
    builder.push(
        parent,
        &child.id,
        RelationshipKind::Contains,
        Some(child.location),
        RelationshipMetadata {
            confidence: DETECTOR_CONFIDENCE,
            ..Default::default()
        },
    );
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

/// Heading/outline extraction for Markdown, with fenced code blocks reported
/// as language boundaries.
pub struct MarkdownBackend;

impl MarkdownBackend {
    pub fn new() -> Self {
        MarkdownBackend
    }
}

impl Default for MarkdownBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserBackend for MarkdownBackend {
    fn language(&self) -> Language {
        Language::Markdown
    }

    fn backend_name(&self) -> &'static str {
        DETECTORS_BACKEND
    }

    fn parsing_level(&self) -> ParsingLevel {
        ParsingLevel::Basic
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::basic()
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["md", "mdx", "markdown"]
    }

    fn parse_content(&self, content: &str, path: &str, _options: &ParseOptions) -> ParseResult {
        let file = detector_file_component(content, path, Language::Markdown);
        let file_id = file.id.clone();
        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len().max(1) as u32;

        let mut components = vec![file];
        let mut used: std::collections::HashSet<String> =
            components.iter().map(|c| c.id.clone()).collect();
        let mut edges = EdgeBuilder::new();

        // Headings, nested by level: each heading spans until the next one
        // of the same or higher level.
        struct Open {
            index: usize,
            level: usize,
        }
        let mut stack: Vec<Open> = Vec::new();
        let mut in_fence = false;
        for (i, line) in lines.iter().enumerate() {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            let hashes = line.chars().take_while(|c| *c == '#').count();
            if hashes == 0 || hashes > 6 || !line[hashes..].starts_with(' ') {
                continue;
            }
            let title = line[hashes..].trim();
            let here = i as u32 + 1;
            while let Some(open) = stack.last() {
                if open.level >= hashes {
                    let open = stack.pop().unwrap();
                    components[open.index].location.end_line = here - 1;
                } else {
                    break;
                }
            }
            let parent_id = stack
                .last()
                .map(|o| components[o.index].id.clone())
                .unwrap_or_else(|| file_id.clone());
            let heading = outline_component(
                path,
                title,
                ComponentKind::Heading,
                Language::Markdown,
                SourceLocation::lines(here, total),
                &parent_id,
                &mut used,
            );
            contains_edge(&mut edges, &parent_id, &heading);
            components.push(heading);
            stack.push(Open {
                index: components.len() - 1,
                level: hashes,
            });
        }

        // Fenced code blocks become components under their heading.
        for boundary in self.detect_language_boundaries(content, path) {
            let parent_id = components
                .iter()
                .skip(1)
                .filter(|c| {
                    c.kind == ComponentKind::Heading
                        && c.location.start_line <= boundary.start_line
                        && boundary.end_line <= c.location.end_line
                })
                .last()
                .map(|c| c.id.clone())
                .unwrap_or_else(|| file_id.clone());
            let name = format!("{}-block-L{}", boundary.language, boundary.start_line);
            let block = outline_component(
                path,
                &name,
                ComponentKind::CodeBlock,
                boundary.language,
                SourceLocation::lines(boundary.start_line, boundary.end_line),
                &parent_id,
                &mut used,
            );
            contains_edge(&mut edges, &parent_id, &block);
            components.push(block);
        }

        ParseResult {
            file_path: path.to_string(),
            language: Language::Markdown,
            boundaries: self.detect_language_boundaries(content, path),
            components,
            relationships: edges.finish(),
            diagnostics: Vec::new(),
            capability: detector_capability(),
        }
    }

    fn detect_language_boundaries(&self, content: &str, _path: &str) -> Vec<LanguageBoundary> {
        let mut boundaries = Vec::new();
        let mut open: Option<(u32, Language)> = None;
        for (i, line) in content.lines().enumerate() {
            let trimmed = line.trim_start();
            if !trimmed.starts_with("```") {
                continue;
            }
            match open.take() {
                Some((start, language)) => {
                    let end = i as u32; // line before the closing fence
                    if end >= start {
                        boundaries.push(LanguageBoundary {
                            language,
                            start_line: start,
                            end_line: end,
                            scope: "fence".to_string(),
                        });
                    }
                }
                None => {
                    let tag = trimmed.trim_start_matches('`').trim();
                    let language = Language::parse_str(tag).unwrap_or(Language::Unknown);
                    open = Some((i as u32 + 2, language));
                }
            }
        }
        boundaries
    }
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

/// Tag-outline extraction for HTML, with `<script>`/`<style>` regions
/// reported as language boundaries.
pub struct HtmlBackend;

impl HtmlBackend {
    pub fn new() -> Self {
        HtmlBackend
    }
}

impl Default for HtmlBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<h([1-6])[^>]*>([^<]+)</h[1-6]>").unwrap())
}

impl ParserBackend for HtmlBackend {
    fn language(&self) -> Language {
        Language::Html
    }

    fn backend_name(&self) -> &'static str {
        DETECTORS_BACKEND
    }

    fn parsing_level(&self) -> ParsingLevel {
        ParsingLevel::Basic
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::basic()
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["html", "htm", "xhtml"]
    }

    fn parse_content(&self, content: &str, path: &str, _options: &ParseOptions) -> ParseResult {
        let file = detector_file_component(content, path, Language::Html);
        let file_id = file.id.clone();
        let mut components = vec![file];
        let mut used: std::collections::HashSet<String> =
            components.iter().map(|c| c.id.clone()).collect();
        let mut edges = EdgeBuilder::new();

        for (i, line) in content.lines().enumerate() {
            for caps in heading_regex().captures_iter(line) {
                let title = caps[2].trim();
                if title.is_empty() {
                    continue;
                }
                let location = SourceLocation::lines(i as u32 + 1, i as u32 + 1);
                let heading = outline_component(
                    path,
                    title,
                    ComponentKind::Heading,
                    Language::Html,
                    location,
                    &file_id,
                    &mut used,
                );
                contains_edge(&mut edges, &file_id, &heading);
                components.push(heading);
            }
        }

        let boundaries = self.detect_language_boundaries(content, path);
        for boundary in &boundaries {
            let kind = if boundary.scope == "style" {
                ComponentKind::EmbeddedStyle
            } else {
                ComponentKind::EmbeddedScript
            };
            let name = format!("{}-L{}", boundary.scope, boundary.start_line);
            let block = outline_component(
                path,
                &name,
                kind,
                boundary.language,
                SourceLocation::lines(boundary.start_line, boundary.end_line),
                &file_id,
                &mut used,
            );
            contains_edge(&mut edges, &file_id, &block);
            components.push(block);
        }

        ParseResult {
            file_path: path.to_string(),
            language: Language::Html,
            components,
            relationships: edges.finish(),
            diagnostics: Vec::new(),
            boundaries,
            capability: detector_capability(),
        }
    }

    fn detect_language_boundaries(&self, content: &str, _path: &str) -> Vec<LanguageBoundary> {
        let mut boundaries = Vec::new();
        let mut open: Option<(u32, &'static str, Language)> = None;
        for (i, line) in content.lines().enumerate() {
            let lower = line.to_ascii_lowercase();
            match &open {
                None => {
                    if lower.contains("<script") && !lower.contains("</script>") {
                        let language = if lower.contains("application/json") {
                            Language::Json
                        } else if lower.contains("\"ts\"") || lower.contains("typescript") {
                            Language::TypeScript
                        } else {
                            Language::JavaScript
                        };
                        open = Some((i as u32 + 2, "script", language));
                    } else if lower.contains("<style") && !lower.contains("</style>") {
                        open = Some((i as u32 + 2, "style", Language::Css));
                    }
                }
                Some((start, scope, language)) => {
                    let closer = format!("</{scope}>");
                    if lower.contains(&closer) {
                        let end = i as u32;
                        if end >= *start {
                            boundaries.push(LanguageBoundary {
                                language: *language,
                                start_line: *start,
                                end_line: end,
                                scope: scope.to_string(),
                            });
                        }
                        open = None;
                    }
                }
            }
        }
        boundaries
    }
}

// ---------------------------------------------------------------------------
// Plain text / universal fallback
// ---------------------------------------------------------------------------

/// The detectors-only pseudo-parser returned when nothing else matches.
/// Produces a file component plus a coarse outline of segmenter blocks.
pub struct TextBackend {
    segmenter: Segmenter,
}

impl TextBackend {
    pub fn new() -> Self {
        TextBackend {
            segmenter: Segmenter::new(),
        }
    }
}

impl Default for TextBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserBackend for TextBackend {
    fn language(&self) -> Language {
        Language::Text
    }

    fn backend_name(&self) -> &'static str {
        DETECTORS_BACKEND
    }

    fn parsing_level(&self) -> ParsingLevel {
        ParsingLevel::Basic
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet {
            symbols: false,
            ranges: true,
            ..Default::default()
        }
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["txt", "text", "log"]
    }

    fn parse_content(&self, content: &str, path: &str, _options: &ParseOptions) -> ParseResult {
        let file = detector_file_component(content, path, Language::Text);
        let file_id = file.id.clone();
        let mut components = vec![file];
        let mut used: std::collections::HashSet<String> =
            components.iter().map(|c| c.id.clone()).collect();
        let mut edges = EdgeBuilder::new();

        for block in self.segmenter.segment(content) {
            let name = format!("section-L{}", block.start_line);
            let section = outline_component(
                path,
                &name,
                ComponentKind::DocSection,
                Language::Text,
                SourceLocation::lines(block.start_line, block.end_line),
                &file_id,
                &mut used,
            );
            contains_edge(&mut edges, &file_id, &section);
            components.push(section);
        }

        ParseResult {
            file_path: path.to_string(),
            language: Language::Text,
            components,
            relationships: edges.finish(),
            diagnostics: Vec::new(),
            boundaries: Vec::new(),
            capability: detector_capability(),
        }
    }
}

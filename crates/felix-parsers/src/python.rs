//! Semantic backend for Python.
//!
//! Visibility follows the underscore convention, `__init__` maps to a
//! constructor, and docstrings on the first body line are lifted into
//! component documentation.

use std::sync::Mutex;

use felix_core::types::{
    CapabilityBlock, CapabilitySet, ComponentKind, Language, ParsingLevel,
};

use crate::backend::{ParseOptions, ParseResult, ParserBackend};
use crate::treesitter::extract::Extraction;
use crate::treesitter::runner::{parse_with_query, QueryCell};
use crate::treesitter::TreeSitterDriver;

pub const PY_CONFIDENCE: f64 = 0.85;

pub struct PyBackend {
    driver: Mutex<TreeSitterDriver>,
    query: QueryCell,
}

impl PyBackend {
    pub fn new() -> Self {
        PyBackend {
            driver: Mutex::new(TreeSitterDriver::new()),
            query: QueryCell::new(),
        }
    }
}

impl Default for PyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserBackend for PyBackend {
    fn language(&self) -> Language {
        Language::Python
    }

    fn backend_name(&self) -> &'static str {
        "ast"
    }

    fn parsing_level(&self) -> ParsingLevel {
        ParsingLevel::Semantic
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::semantic()
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn parse_content(&self, content: &str, path: &str, options: &ParseOptions) -> ParseResult {
        parse_with_query(
            &self.driver,
            &self.query,
            Language::Python,
            content,
            path,
            options,
            CapabilityBlock::new(ParsingLevel::Semantic, "ast", self.capabilities()),
            PY_CONFIDENCE,
            "python",
            &enhance_extraction,
            &enhance_result,
        )
    }
}

fn enhance_extraction(extraction: &mut Extraction, _content: &str) {
    for def in &mut extraction.definitions {
        if def.kind == ComponentKind::Function && def.name == "__init__" {
            def.kind = ComponentKind::Constructor;
        }
    }
}

fn enhance_result(result: &mut ParseResult, content: &str) {
    let lines: Vec<&str> = content.lines().collect();
    for component in result.components.iter_mut().filter(|c| !c.is_file()) {
        component.metadata.is_exported = !component.name.starts_with('_')
            || component.kind == ComponentKind::Constructor;

        let line = lines
            .get(component.location.start_line.saturating_sub(1) as usize)
            .copied()
            .unwrap_or("");
        if line.trim_start().starts_with("async def") {
            component.metadata.modifiers.push("async".to_string());
        }
        if let Some(ret) = line.split("->").nth(1) {
            let ret = ret.trim().trim_end_matches(':').trim();
            if !ret.is_empty() {
                component.metadata.return_type = Some(ret.to_string());
            }
        }

        // Docstring: triple-quoted string on the first body line wins over
        // a leading comment.
        if component.kind.is_callable() || component.kind == ComponentKind::Class {
            if let Some(doc) = docstring_after(&lines, component.location.start_line) {
                component.metadata.documentation = Some(doc);
            }
        }

        // Framework hints from decorators directly above the definition.
        if let Some(decorator) = decorator_above(&lines, component.location.start_line) {
            if decorator.contains("route") || decorator.contains("get(") || decorator.contains("post(")
            {
                component.metadata.framework_hints.push("http-route".to_string());
            }
            if decorator.contains("pytest") || decorator.contains("fixture") {
                component.metadata.framework_hints.push("pytest".to_string());
            }
        }
    }
}

/// First-body-line docstring: `"""…"""` (possibly spanning lines; only the
/// first line is kept for single-line summaries).
fn docstring_after(lines: &[&str], def_line: u32) -> Option<String> {
    let body_line = lines.get(def_line as usize)?.trim();
    let quoted = body_line
        .strip_prefix("\"\"\"")
        .or_else(|| body_line.strip_prefix("'''"))?;
    let doc = quoted
        .trim_end_matches("\"\"\"")
        .trim_end_matches("'''")
        .trim();
    if doc.is_empty() {
        None
    } else {
        Some(doc.to_string())
    }
}

fn decorator_above(lines: &[&str], def_line: u32) -> Option<String> {
    let mut index = def_line.checked_sub(2)? as i64;
    while index >= 0 {
        let line = lines[index as usize].trim();
        if line.starts_with('@') {
            return Some(line.to_string());
        }
        if !line.is_empty() {
            return None;
        }
        index -= 1;
    }
    None
}

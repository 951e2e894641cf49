//! Shared parse path for all query-driven backends: parse, extract,
//! assemble, then hand the result to the language module for enhancement.

use std::sync::{Mutex, OnceLock};

use tree_sitter::Query;

use felix_core::types::{CapabilityBlock, Language};

use crate::backend::{Diagnostic, ParseOptions, ParseResult};
use crate::queries;

use super::assemble::{assemble, file_component, AssembleContext};
use super::extract::{run_query, Extraction};
use super::{grammar_for, syntax_diagnostics, TreeSitterDriver};

const MAX_SYNTAX_DIAGNOSTICS: usize = 32;

/// Lazily-compiled extraction query shared by one backend instance.
pub struct QueryCell {
    cell: OnceLock<Result<Query, String>>,
}

impl QueryCell {
    pub const fn new() -> Self {
        QueryCell {
            cell: OnceLock::new(),
        }
    }

    fn get(&self, language: Language) -> Result<&Query, String> {
        self.cell
            .get_or_init(|| {
                let grammar = grammar_for(language)
                    .ok_or_else(|| format!("no grammar for language: {language}"))?;
                queries::query_for_language(&grammar, language)
            })
            .as_ref()
            .map_err(|e| e.clone())
    }
}

impl Default for QueryCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `content` with the language grammar and extraction query, assemble
/// the graph, and report syntax problems as diagnostics. Never fails: on a
/// hard parse failure the result still carries the file component.
///
/// `enhance_extraction` runs before assembly and may adjust raw records
/// (kind fixups must happen here, before ids are derived from kinds).
/// `enhance_result` runs after assembly for identity-neutral enrichment
/// (export visibility, modifiers, framework hints).
#[allow(clippy::too_many_arguments)]
pub fn parse_with_query(
    driver: &Mutex<TreeSitterDriver>,
    query: &QueryCell,
    language: Language,
    content: &str,
    path: &str,
    options: &ParseOptions,
    capability: CapabilityBlock,
    confidence: f64,
    parser_name: &str,
    enhance_extraction: &dyn Fn(&mut Extraction, &str),
    enhance_result: &dyn Fn(&mut ParseResult, &str),
) -> ParseResult {
    let ctx = AssembleContext {
        file_path: path,
        language,
        capability: capability.clone(),
        confidence,
        parser_name,
        options,
    };

    let tree = {
        let mut driver = driver.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        driver.parse(language, content.as_bytes())
    };

    let Some(tree) = tree else {
        let mut result = ParseResult::empty(path, language, capability);
        result.components.push(file_component(content, &ctx));
        result
            .diagnostics
            .push(Diagnostic::error("tree-sitter failed to parse file", None));
        return result;
    };

    let mut diagnostics = syntax_diagnostics(&tree, MAX_SYNTAX_DIAGNOSTICS);

    let (components, relationships) = match query.get(language) {
        Ok(query) => {
            let mut extraction = run_query(query, tree.root_node(), content.as_bytes());
            enhance_extraction(&mut extraction, content);
            assemble(content, &extraction, &ctx)
        }
        Err(message) => {
            diagnostics.push(Diagnostic::error(message, None));
            (vec![file_component(content, &ctx)], Vec::new())
        }
    };

    let mut result = ParseResult {
        file_path: path.to_string(),
        language,
        components,
        relationships,
        diagnostics,
        boundaries: Vec::new(),
        capability,
    };
    enhance_result(&mut result, content);
    result
}

//! Shared tree-sitter driver: grammar lookup, parsing, and syntax
//! diagnostics. Per-language backends layer query extraction and
//! language-specific enhancement on top.

pub(crate) mod assemble;
pub(crate) mod extract;
pub(crate) mod runner;


use tree_sitter::{Parser, Tree};

use felix_core::types::{Language, SourceLocation};

use crate::backend::Diagnostic;

/// Resolve the compiled grammar for a language. `JavaScript` parses with the
/// TypeScript grammar (a superset for extraction purposes).
pub fn grammar_for(language: Language) -> Option<tree_sitter::Language> {
    match language {
        Language::TypeScript | Language::JavaScript => {
            Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
        }
        Language::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
        Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
        Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
        Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
        _ => None,
    }
}

/// A pooled tree-sitter parser. Not thread-safe; backends wrap it in a
/// `Mutex` and hold one instance per language.
pub struct TreeSitterDriver {
    parser: Parser,
}

impl TreeSitterDriver {
    pub fn new() -> Self {
        TreeSitterDriver {
            parser: Parser::new(),
        }
    }

    /// Parse source with the grammar for `language`. `None` when the grammar
    /// is missing or tree-sitter gives up entirely.
    pub fn parse(&mut self, language: Language, source: &[u8]) -> Option<Tree> {
        let grammar = grammar_for(language)?;
        self.parser.set_language(&grammar).ok()?;
        self.parser.parse(source, None)
    }
}

impl Default for TreeSitterDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect ERROR and MISSING nodes from a parse tree as diagnostics.
/// Parse problems never abort the pipeline; partial output still flows.
pub fn syntax_diagnostics(tree: &Tree, limit: usize) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    if !tree.root_node().has_error() {
        return diagnostics;
    }
    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if diagnostics.len() >= limit {
            break;
        }
        if node.is_error() || node.is_missing() {
            let start = node.start_position();
            let end = node.end_position();
            let location = SourceLocation::new(
                start.row as u32 + 1,
                start.column as u32 + 1,
                end.row as u32 + 1,
                end.column as u32 + 1,
            );
            let message = if node.is_missing() {
                format!("missing {}", node.kind())
            } else {
                "syntax error".to_string()
            };
            diagnostics.push(Diagnostic::error(message, Some(location)));
            continue;
        }
        if node.has_error() {
            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i) {
                    stack.push(child);
                }
            }
        }
    }
    diagnostics
}

pub(crate) fn node_text<'a>(node: tree_sitter::Node<'a>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

pub(crate) fn node_location(node: tree_sitter::Node<'_>) -> SourceLocation {
    let start = node.start_position();
    let end = node.end_position();
    SourceLocation::new(
        start.row as u32 + 1,
        start.column as u32 + 1,
        end.row as u32 + 1,
        (end.column as u32).max(1),
    )
}

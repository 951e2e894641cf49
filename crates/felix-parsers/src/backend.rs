use std::path::Path;

use felix_core::types::{
    CapabilityBlock, CapabilitySet, Component, Language, ParsingLevel, Relationship,
    SourceLocation,
};

// ---------------------------------------------------------------------------
// FROZEN CONTRACT -- ParserBackend trait
// Every backend, from the full AST extractors down to the detectors-only
// fallback, implements this one contract. Do NOT modify the trait signature
// without coordinating across the registry, pipeline, and resolver.
// ---------------------------------------------------------------------------

/// The core abstraction every parser backend must implement.
///
/// Contract guarantees:
/// - `parse_content` is pure in `(content, path, options)`: the same input
///   yields the same component ids, relationship ids, and ordering.
/// - Locations are 1-based inclusive.
/// - Errors never abort the pipeline; they are returned as diagnostics and
///   partial components may still be emitted.
/// - Every component carries capability metadata; every relationship carries
///   confidence and provenance.
///
/// Implementors must be `Send + Sync` so they can be shared across rayon
/// parallel iterators. Backends that hold a tree-sitter parser wrap it in a
/// `Mutex`: parser instances are not assumed thread-safe.
pub trait ParserBackend: Send + Sync {
    /// The language this backend handles.
    fn language(&self) -> Language;

    /// Short backend identifier, e.g. `"ast"`, `"tree-sitter"`,
    /// `"detectors-only"`. Stamped on the capability block.
    fn backend_name(&self) -> &'static str;

    /// Declared capability tier. Output is never promoted above it.
    fn parsing_level(&self) -> ParsingLevel;

    /// What this backend can extract.
    fn capabilities(&self) -> CapabilitySet;

    /// File extensions (without dot) this backend accepts.
    fn supported_extensions(&self) -> &'static [&'static str];

    /// Whether the backend accepts this path, by extension.
    fn can_parse_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.supported_extensions().iter().any(|s| *s == ext)
            })
            .unwrap_or(false)
    }

    /// Parse in-memory content. Never fails: syntax problems surface in
    /// `ParseResult::diagnostics`.
    fn parse_content(&self, content: &str, path: &str, options: &ParseOptions) -> ParseResult;

    /// Read a file from disk, then delegate to [`ParserBackend::parse_content`].
    fn parse_file(&self, path: &Path, options: &ParseOptions) -> Result<ParseResult, ParseError> {
        let content = std::fs::read(path)
            .map_err(|e| ParseError::Io(path.display().to_string(), e.to_string()))?;
        let content = String::from_utf8_lossy(&content);
        Ok(self.parse_content(&content, &path.to_string_lossy(), options))
    }

    /// Validation-only pass returning syntax diagnostics.
    fn validate_syntax(&self, content: &str) -> Vec<Diagnostic> {
        self.parse_content(content, "<validate>", &ParseOptions::default())
            .diagnostics
    }

    /// Regions of the file written in another language (e.g. `<script>`
    /// blocks, fenced code). Empty for single-language backends.
    fn detect_language_boundaries(&self, _content: &str, _path: &str) -> Vec<LanguageBoundary> {
        Vec::new()
    }
}

/// Options threaded through a parse run.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Keep raw source slices on extracted components.
    pub include_code: bool,
    /// Recursively parse embedded-language boundaries.
    pub expand_boundaries: bool,
}

impl ParseOptions {
    pub fn full() -> Self {
        ParseOptions {
            include_code: true,
            expand_boundaries: true,
        }
    }
}

/// Complete parse output for a single source file.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub file_path: String,
    pub language: Language,
    pub components: Vec<Component>,
    pub relationships: Vec<Relationship>,
    pub diagnostics: Vec<Diagnostic>,
    /// Embedded-language regions found but not yet expanded.
    pub boundaries: Vec<LanguageBoundary>,
    /// Wire-stable capability block for the whole result.
    pub capability: CapabilityBlock,
}

impl ParseResult {
    /// An empty result carrying only the capability block. Used when a
    /// backend cannot produce anything at all for the input.
    pub fn empty(file_path: &str, language: Language, capability: CapabilityBlock) -> Self {
        ParseResult {
            file_path: file_path.to_string(),
            language,
            components: Vec::new(),
            relationships: Vec::new(),
            diagnostics: Vec::new(),
            boundaries: Vec::new(),
            capability,
        }
    }

    /// The file component of this result, when one was emitted.
    pub fn file_component(&self) -> Option<&Component> {
        self.components.iter().find(|c| c.is_file())
    }
}

/// Severity of a parse diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A non-fatal problem found while parsing.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            location,
        }
    }

    pub fn warning(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            location,
        }
    }
}

/// A region of a file written in another language.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageBoundary {
    pub language: Language,
    /// First line of the embedded content (1-based, exclusive of the host
    /// delimiter line).
    pub start_line: u32,
    /// Last line of the embedded content (inclusive).
    pub end_line: u32,
    /// Host scope label, e.g. `"script"`, `"style"`, `"fence"`.
    pub scope: String,
}

/// Errors for the file-reading entry point. Content parsing itself never
/// fails; see the trait contract.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to read {0}: {1}")]
    Io(String, String),

    #[error("No parser registered for language: {0}")]
    UnsupportedLanguage(String),
}

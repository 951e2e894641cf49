use tree_sitter::Query;

use felix_core::types::Language;

pub const TYPESCRIPT_QUERIES: &str = include_str!("typescript.scm");
pub const PYTHON_QUERIES: &str = include_str!("python.scm");
pub const RUST_QUERIES: &str = include_str!("rust.scm");
pub const GO_QUERIES: &str = include_str!("go.scm");
pub const JAVA_QUERIES: &str = include_str!("java.scm");

/// Compiles the extraction query for the given language.
pub fn query_for_language(
    grammar: &tree_sitter::Language,
    language: Language,
) -> Result<Query, String> {
    let source = match language {
        Language::TypeScript | Language::Tsx | Language::JavaScript => TYPESCRIPT_QUERIES,
        Language::Python => PYTHON_QUERIES,
        Language::Rust => RUST_QUERIES,
        Language::Go => GO_QUERIES,
        Language::Java => JAVA_QUERIES,
        other => return Err(format!("no extraction query for language: {other}")),
    };
    Query::new(grammar, source)
        .map_err(|e| format!("query compilation error for {language}: {e}"))
}

//! Semantic backend for TypeScript, TSX, and JavaScript.
//!
//! Structural extraction rides the shared tree-sitter driver; the
//! enhancement passes add what the grammar alone cannot say: constructor
//! kinds, arrow functions bound to `const`, export visibility, and React
//! framework hints.

use std::sync::Mutex;

use felix_core::types::{
    CapabilityBlock, CapabilitySet, ComponentKind, Language, ParsingLevel,
};

use crate::backend::{ParseOptions, ParseResult, ParserBackend};
use crate::treesitter::extract::Extraction;
use crate::treesitter::runner::{parse_with_query, QueryCell};
use crate::treesitter::TreeSitterDriver;

pub const TS_CONFIDENCE: f64 = 0.85;

pub struct TsBackend {
    language: Language,
    driver: Mutex<TreeSitterDriver>,
    query: QueryCell,
}

impl TsBackend {
    pub fn typescript() -> Self {
        Self::for_language(Language::TypeScript)
    }

    pub fn tsx() -> Self {
        Self::for_language(Language::Tsx)
    }

    pub fn javascript() -> Self {
        Self::for_language(Language::JavaScript)
    }

    fn for_language(language: Language) -> Self {
        TsBackend {
            language,
            driver: Mutex::new(TreeSitterDriver::new()),
            query: QueryCell::new(),
        }
    }
}

impl ParserBackend for TsBackend {
    fn language(&self) -> Language {
        self.language
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
        match self.language {
            Language::Tsx => &["tsx"],
            Language::JavaScript => &["js", "jsx", "mjs", "cjs"],
            _ => &["ts", "mts", "cts"],
        }
    }

    fn parse_content(&self, content: &str, path: &str, options: &ParseOptions) -> ParseResult {
        parse_with_query(
            &self.driver,
            &self.query,
            self.language,
            content,
            path,
            options,
            CapabilityBlock::new(ParsingLevel::Semantic, "ast", self.capabilities()),
            TS_CONFIDENCE,
            "typescript",
            &enhance_extraction,
            &enhance_result,
        )
    }
}

fn enhance_extraction(extraction: &mut Extraction, content: &str) {
    let lines: Vec<&str> = content.lines().collect();
    for def in &mut extraction.definitions {
        match def.kind {
            ComponentKind::Method if def.name == "constructor" => {
                def.kind = ComponentKind::Constructor;
            }
            // `get x()` / `set x(v)` parse as plain methods; the keyword
            // sits on the signature line.
            ComponentKind::Method => {
                let line = lines
                    .get(def.location.start_line.saturating_sub(1) as usize)
                    .copied()
                    .unwrap_or("")
                    .trim_start();
                if line.starts_with("get ") {
                    def.kind = ComponentKind::Getter;
                } else if line.starts_with("set ") {
                    def.kind = ComponentKind::Setter;
                }
            }
            // A `const f = (...) => ...` binding is a function, not a plain
            // variable.
            ComponentKind::Variable => {
                let line = lines
                    .get(def.location.start_line.saturating_sub(1) as usize)
                    .copied()
                    .unwrap_or("");
                if line.contains("=>") || line.contains("function") {
                    def.kind = ComponentKind::Function;
                }
            }
            _ => {}
        }
    }
}

fn enhance_result(result: &mut ParseResult, content: &str) {
    let lines: Vec<&str> = content.lines().collect();
    for component in result.components.iter_mut().filter(|c| !c.is_file()) {
        let line = lines
            .get(component.location.start_line.saturating_sub(1) as usize)
            .copied()
            .unwrap_or("")
            .trim_start();

        if line.starts_with("export ") || line.starts_with("export default ") {
            component.metadata.is_exported = true;
        }
        if line.contains("async ") {
            component.metadata.modifiers.push("async".to_string());
        }
        if line.contains("abstract ") {
            component.metadata.modifiers.push("abstract".to_string());
        }
        if line.contains("static ") {
            component.metadata.modifiers.push("static".to_string());
        }

        // Return type from the signature line: `): T {` or `=> T`.
        if component.kind.is_callable() && component.metadata.return_type.is_none() {
            if let Some(ret) = extract_return_type(line) {
                component.metadata.return_type = Some(ret);
            }
        }

        // React hints: hook-shaped functions and JSX-returning components.
        if component.kind == ComponentKind::Function {
            if component.name.starts_with("use")
                && component.name.chars().nth(3).is_some_and(|c| c.is_uppercase())
            {
                component
                    .metadata
                    .framework_hints
                    .push("react-hook".to_string());
            } else if component.name.chars().next().is_some_and(|c| c.is_uppercase())
                && component
                    .code
                    .as_deref()
                    .is_some_and(|code| code.contains("return <") || code.contains("=> <"))
            {
                component
                    .metadata
                    .framework_hints
                    .push("react-component".to_string());
            }
        }
    }
}

/// Pull a return type annotation off a signature line.
fn extract_return_type(line: &str) -> Option<String> {
    let close = line.rfind("):")?;
    let rest = &line[close + 2..];
    let end = rest
        .find(['{', '=', ';'])
        .unwrap_or(rest.len());
    let ret = rest[..end].trim();
    if ret.is_empty() {
        None
    } else {
        Some(ret.to_string())
    }
}

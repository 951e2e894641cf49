//! Semantic backend for Rust.

use std::sync::Mutex;

use felix_core::types::{
    CapabilityBlock, CapabilitySet, ComponentKind, Language, ParsingLevel,
};

use crate::backend::{ParseOptions, ParseResult, ParserBackend};
use crate::treesitter::extract::Extraction;
use crate::treesitter::runner::{parse_with_query, QueryCell};
use crate::treesitter::TreeSitterDriver;

pub const RUST_CONFIDENCE: f64 = 0.85;

pub struct RustBackend {
    driver: Mutex<TreeSitterDriver>,
    query: QueryCell,
}

impl RustBackend {
    pub fn new() -> Self {
        RustBackend {
            driver: Mutex::new(TreeSitterDriver::new()),
            query: QueryCell::new(),
        }
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserBackend for RustBackend {
    fn language(&self) -> Language {
        Language::Rust
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
        &["rs"]
    }

    fn parse_content(&self, content: &str, path: &str, options: &ParseOptions) -> ParseResult {
        parse_with_query(
            &self.driver,
            &self.query,
            Language::Rust,
            content,
            path,
            options,
            CapabilityBlock::new(ParsingLevel::Semantic, "ast", self.capabilities()),
            RUST_CONFIDENCE,
            "rust",
            &enhance_extraction,
            &enhance_result,
        )
    }
}

fn enhance_extraction(extraction: &mut Extraction, content: &str) {
    // `#[test]` functions become test components; the attribute sits on one
    // of the lines directly above the definition.
    let lines: Vec<&str> = content.lines().collect();
    for def in &mut extraction.definitions {
        if def.kind != ComponentKind::Function {
            continue;
        }
        let mut index = def.location.start_line.saturating_sub(2) as i64;
        while index >= 0 {
            let line = lines[index as usize].trim();
            if line == "#[test]" || line.starts_with("#[tokio::test") {
                def.kind = ComponentKind::Test;
                break;
            }
            if !line.starts_with("#[") && !line.starts_with("//") {
                break;
            }
            index -= 1;
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

        component.metadata.is_exported = line.starts_with("pub ")
            || line.starts_with("pub(")
            || component.metadata.is_exported;
        if line.contains("async fn") {
            component.metadata.modifiers.push("async".to_string());
        }
        if line.contains("unsafe fn") {
            component.metadata.modifiers.push("unsafe".to_string());
        }
        if component.kind.is_callable() {
            if let Some(ret) = line.split("->").nth(1) {
                let ret = ret.trim().trim_end_matches('{').trim();
                if !ret.is_empty() {
                    component.metadata.return_type = Some(ret.to_string());
                }
            }
        }
    }
}

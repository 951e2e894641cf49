//! Structural backend for Java, riding the generic tree-sitter driver
//! without a semantic enhancement layer.

use std::sync::Mutex;

use felix_core::types::{
    CapabilityBlock, CapabilitySet, Language, ParsingLevel,
};

use crate::backend::{ParseOptions, ParseResult, ParserBackend};
use crate::treesitter::extract::Extraction;
use crate::treesitter::runner::{parse_with_query, QueryCell};
use crate::treesitter::TreeSitterDriver;

pub const JAVA_CONFIDENCE: f64 = 0.65;

pub struct JavaBackend {
    driver: Mutex<TreeSitterDriver>,
    query: QueryCell,
}

impl JavaBackend {
    pub fn new() -> Self {
        JavaBackend {
            driver: Mutex::new(TreeSitterDriver::new()),
            query: QueryCell::new(),
        }
    }
}

impl Default for JavaBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserBackend for JavaBackend {
    fn language(&self) -> Language {
        Language::Java
    }

    fn backend_name(&self) -> &'static str {
        "tree-sitter"
    }

    fn parsing_level(&self) -> ParsingLevel {
        ParsingLevel::Structural
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::structural()
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn parse_content(&self, content: &str, path: &str, options: &ParseOptions) -> ParseResult {
        parse_with_query(
            &self.driver,
            &self.query,
            Language::Java,
            content,
            path,
            options,
            CapabilityBlock::new(ParsingLevel::Structural, "tree-sitter", self.capabilities()),
            JAVA_CONFIDENCE,
            "java",
            &|_: &mut Extraction, _: &str| {},
            &enhance_result,
        )
    }
}

fn enhance_result(result: &mut ParseResult, content: &str) {
    let lines: Vec<&str> = content.lines().collect();
    for component in result.components.iter_mut().filter(|c| !c.is_file()) {
        let line = lines
            .get(component.location.start_line.saturating_sub(1) as usize)
            .copied()
            .unwrap_or("");
        if line.contains("public ") {
            component.metadata.is_exported = true;
        }
        for modifier in ["static", "final", "abstract", "synchronized"] {
            if line.contains(&format!("{modifier} ")) {
                component.metadata.modifiers.push(modifier.to_string());
            }
        }
    }
}

//! Semantic backend for Go. Visibility follows the capitalization rule.

use std::sync::Mutex;

use felix_core::types::{
    CapabilityBlock, CapabilitySet, Language, ParsingLevel,
};

use crate::backend::{ParseOptions, ParseResult, ParserBackend};
use crate::treesitter::extract::Extraction;
use crate::treesitter::runner::{parse_with_query, QueryCell};
use crate::treesitter::TreeSitterDriver;

pub const GO_CONFIDENCE: f64 = 0.8;

pub struct GoBackend {
    driver: Mutex<TreeSitterDriver>,
    query: QueryCell,
}

impl GoBackend {
    pub fn new() -> Self {
        GoBackend {
            driver: Mutex::new(TreeSitterDriver::new()),
            query: QueryCell::new(),
        }
    }
}

impl Default for GoBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserBackend for GoBackend {
    fn language(&self) -> Language {
        Language::Go
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
        &["go"]
    }

    fn parse_content(&self, content: &str, path: &str, options: &ParseOptions) -> ParseResult {
        parse_with_query(
            &self.driver,
            &self.query,
            Language::Go,
            content,
            path,
            options,
            CapabilityBlock::new(ParsingLevel::Semantic, "ast", self.capabilities()),
            GO_CONFIDENCE,
            "go",
            &|_: &mut Extraction, _: &str| {},
            &enhance_result,
        )
    }
}

fn enhance_result(result: &mut ParseResult, content: &str) {
    let lines: Vec<&str> = content.lines().collect();
    for component in result.components.iter_mut().filter(|c| !c.is_file()) {
        component.metadata.is_exported = component
            .name
            .chars()
            .next()
            .is_some_and(|c| c.is_uppercase());

        if component.kind.is_callable() {
            let line = lines
                .get(component.location.start_line.saturating_sub(1) as usize)
                .copied()
                .unwrap_or("");
            // Trailing return: `func f(a int) (T, error) {` or `… T {`.
            if let Some(close) = line.rfind(')') {
                let ret = line[close + 1..].trim().trim_end_matches('{').trim();
                if !ret.is_empty() && !ret.starts_with('(') {
                    component.metadata.return_type = Some(ret.to_string());
                }
            }
        }
    }
}

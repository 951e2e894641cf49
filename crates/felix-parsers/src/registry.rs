//! Parser registry and language detection.
//!
//! Detection order: explicit override, extension map, shebang/magic, then
//! content heuristics scored by density of language-specific tokens
//! (tie-break: registration priority, then alphabetical language name).
//! When nothing matches, the detectors-only pseudo-parser is returned — it
//! still produces a file component and a coarse outline.
//!
//! The registry is built once by the composition root and is read-only
//! afterward; there are no mutating accessors past construction.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use felix_core::types::Language;

use crate::backend::ParserBackend;
use crate::detectors::{HtmlBackend, MarkdownBackend, TextBackend};
use crate::go::GoBackend;
use crate::java::JavaBackend;
use crate::python::PyBackend;
use crate::rust_lang::RustBackend;
use crate::typescript::TsBackend;

/// Minimum language-token density (hits per line) for a content-based
/// verdict. Below this, the whole file goes to the segmenter, whose narrower
/// per-block samples re-run the same scoring.
const CONTENT_DENSITY_FLOOR: f64 = 0.2;

/// How a language was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    Override,
    Extension,
    Shebang,
    Content,
}

/// The outcome of detection: a language, how it was chosen, and the backend
/// that will parse it.
#[derive(Clone)]
pub struct Detection {
    pub language: Language,
    pub method: DetectionMethod,
    pub backend: Arc<dyn ParserBackend>,
}

struct Registered {
    backend: Arc<dyn ParserBackend>,
    priority: i32,
}

pub struct ParserRegistry {
    backends: HashMap<Language, Vec<Registered>>,
    extensions: HashMap<String, Language>,
    fallback: Arc<dyn ParserBackend>,
}

impl ParserRegistry {
    /// An empty registry with only the detectors-only fallback.
    pub fn new() -> Self {
        ParserRegistry {
            backends: HashMap::new(),
            extensions: HashMap::new(),
            fallback: Arc::new(TextBackend::new()),
        }
    }

    /// The standard composition root: every bundled backend at default
    /// priority.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TsBackend::typescript()), 10);
        registry.register(Arc::new(TsBackend::tsx()), 10);
        registry.register(Arc::new(TsBackend::javascript()), 10);
        registry.register(Arc::new(PyBackend::new()), 10);
        registry.register(Arc::new(RustBackend::new()), 10);
        registry.register(Arc::new(GoBackend::new()), 10);
        registry.register(Arc::new(JavaBackend::new()), 10);
        registry.register(Arc::new(MarkdownBackend::new()), 5);
        registry.register(Arc::new(HtmlBackend::new()), 5);
        registry.register(Arc::new(TextBackend::new()), 0);
        registry
    }

    /// Register a backend. Consumed during composition; the registry is
    /// read-only afterward.
    pub fn register(&mut self, backend: Arc<dyn ParserBackend>, priority: i32) {
        for ext in backend.supported_extensions() {
            self.extensions
                .entry((*ext).to_string())
                .or_insert_with(|| backend.language());
        }
        self.backends
            .entry(backend.language())
            .or_default()
            .push(Registered { backend, priority });
    }

    /// All backends for a language, highest capability tier first, then
    /// priority.
    pub fn parsers(&self, language: Language) -> Vec<Arc<dyn ParserBackend>> {
        let mut registered: Vec<&Registered> = self
            .backends
            .get(&language)
            .map(|v| v.iter().collect())
            .unwrap_or_default();
        registered.sort_by(|a, b| {
            b.backend
                .parsing_level()
                .cmp(&a.backend.parsing_level())
                .then(b.priority.cmp(&a.priority))
        });
        registered.iter().map(|r| r.backend.clone()).collect()
    }

    /// The highest-tier backend registered for a language.
    pub fn best(&self, language: Language) -> Option<Arc<dyn ParserBackend>> {
        self.parsers(language).into_iter().next()
    }

    /// The detectors-only pseudo-parser.
    pub fn fallback(&self) -> Arc<dyn ParserBackend> {
        self.fallback.clone()
    }

    /// Detect the language and backend for `(path, content_sample)`.
    pub fn detect(
        &self,
        path: &str,
        content_sample: Option<&str>,
        override_language: Option<Language>,
    ) -> Detection {
        if let Some(language) = override_language {
            return self.detection_for(language, DetectionMethod::Override);
        }

        if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
            if let Some(language) = self.extensions.get(&ext.to_ascii_lowercase()) {
                return self.detection_for(*language, DetectionMethod::Extension);
            }
        }

        if let Some(sample) = content_sample {
            if let Some(language) = detect_shebang(sample) {
                return self.detection_for(language, DetectionMethod::Shebang);
            }
            if let Some(language) = self.detect_by_content(sample) {
                return self.detection_for(language, DetectionMethod::Content);
            }
        }

        Detection {
            language: Language::Text,
            method: DetectionMethod::Content,
            backend: self.fallback.clone(),
        }
    }

    fn detection_for(&self, language: Language, method: DetectionMethod) -> Detection {
        let backend = self.best(language).unwrap_or_else(|| self.fallback.clone());
        Detection {
            language,
            method,
            backend,
        }
    }

    /// Score token densities per language; ties break by registration
    /// priority then alphabetical name.
    fn detect_by_content(&self, sample: &str) -> Option<Language> {
        let line_count = sample.lines().count().max(1) as f64;
        let mut best: Option<(f64, i32, Language)> = None;
        for (language, patterns) in content_signals() {
            let hits: usize = patterns.iter().map(|re| re.find_iter(sample).count()).sum();
            if hits == 0 {
                continue;
            }
            let density = hits as f64 / line_count;
            if density < CONTENT_DENSITY_FLOOR {
                continue;
            }
            let priority = self
                .backends
                .get(language)
                .and_then(|v| v.iter().map(|r| r.priority).max())
                .unwrap_or(i32::MIN);
            let candidate = (density, priority, *language);
            best = match best {
                None => Some(candidate),
                Some(current) => {
                    let (d, p, l) = current;
                    if density > d
                        || (density == d && priority > p)
                        || (density == d && priority == p && language.as_str() < l.as_str())
                    {
                        Some(candidate)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        best.map(|(_, _, language)| language)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn detect_shebang(sample: &str) -> Option<Language> {
    let first = sample.lines().next()?.trim();
    if !first.starts_with("#!") {
        return None;
    }
    if first.contains("python") {
        Some(Language::Python)
    } else if first.contains("node") || first.contains("deno") || first.contains("bun") {
        Some(Language::JavaScript)
    } else if first.contains("bash") || first.contains("/sh") || first.contains("zsh") {
        Some(Language::Shell)
    } else if first.contains("ruby") {
        Some(Language::Ruby)
    } else {
        None
    }
}

fn content_signals() -> &'static Vec<(Language, Vec<Regex>)> {
    static SIGNALS: OnceLock<Vec<(Language, Vec<Regex>)>> = OnceLock::new();
    SIGNALS.get_or_init(|| {
        let compile = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("static content signal regex"))
                .collect::<Vec<_>>()
        };
        vec![
            (
                Language::Python,
                compile(&[r"\bdef \w+\(", r"\bimport \w+", r":\s*$", r"\bself\b"]),
            ),
            (
                Language::TypeScript,
                compile(&[
                    r"\bexport (const|function|class|interface)\b",
                    r"\binterface \w+",
                    r": (string|number|boolean)\b",
                ]),
            ),
            (
                Language::JavaScript,
                compile(&[r"\bconst \w+ =", r"\bfunction \w+\(", r"=>", r"\brequire\("]),
            ),
            (
                Language::Rust,
                compile(&[r"\bfn \w+\(", r"\blet mut\b", r"\bimpl \w+", r"::\w+"]),
            ),
            (
                Language::Go,
                compile(&[r"\bfunc \w+\(", r"\bpackage \w+", r":=", r"\bgo \w+\("]),
            ),
            (
                Language::Java,
                compile(&[
                    r"\bpublic (class|interface|enum)\b",
                    r"\bprivate \w+ \w+;",
                    r"\bSystem\.out\.",
                ]),
            ),
            (
                Language::Html,
                compile(&[r"<!DOCTYPE", r"<html", r"</\w+>"]),
            ),
            (
                Language::Markdown,
                compile(&[r"(?m)^#{1,6} ", r"(?m)^- ", r"\[[^\]]+\]\([^)]+\)"]),
            ),
        ]
    })
}

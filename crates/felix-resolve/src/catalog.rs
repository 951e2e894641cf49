//! Per-language stdlib/vendor catalogs.
//!
//! Seeded in code, merged with optional out-of-band JSON catalog files from
//! `FelixConfig.catalog_paths` (`{"scheme": "npm", "exact": [...],
//! "prefixes": [...]}`). File entries win over seeds. Built once by the
//! composition root and read-only afterward.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use felix_core::types::Language;

#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    /// External package scheme for this language (`npm`, `pypi`, …).
    pub scheme: String,
    /// Module names that are always external (first path segment match).
    pub exact: HashSet<String>,
    /// Specifier prefixes that are always external.
    pub prefixes: Vec<String>,
}

impl LanguageCatalog {
    fn new(scheme: &str, exact: &[&str], prefixes: &[&str]) -> Self {
        LanguageCatalog {
            scheme: scheme.to_string(),
            exact: exact.iter().map(|s| s.to_string()).collect(),
            prefixes: prefixes.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Whether a sanitized specifier names a stdlib/vendor module.
    pub fn matches(&self, specifier: &str) -> bool {
        if self.prefixes.iter().any(|p| specifier.starts_with(p)) {
            return true;
        }
        let first = specifier
            .split(['/', '.'])
            .next()
            .unwrap_or(specifier)
            .split("::")
            .next()
            .unwrap_or(specifier);
        self.exact.contains(first) || self.exact.contains(specifier)
    }
}

/// On-disk shape of an out-of-band catalog file.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    scheme: Option<String>,
    #[serde(default)]
    exact: Vec<String>,
    #[serde(default)]
    prefixes: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {0}: {1}")]
    Io(String, String),

    #[error("Failed to parse catalog {0}: {1}")]
    Parse(String, String),

    #[error("Catalog for unknown language: {0}")]
    UnknownLanguage(String),
}

pub struct Catalogs {
    map: HashMap<Language, LanguageCatalog>,
}

impl Catalogs {
    /// The built-in seeds.
    pub fn builtin() -> Self {
        let mut map = HashMap::new();
        let node = LanguageCatalog::new(
            "npm",
            &[
                "assert", "buffer", "child_process", "crypto", "events", "fs", "http", "https",
                "net", "os", "path", "process", "querystring", "stream", "timers", "tls", "url",
                "util", "zlib",
            ],
            &["node:"],
        );
        map.insert(Language::TypeScript, node.clone());
        map.insert(Language::Tsx, node.clone());
        map.insert(Language::JavaScript, node);
        map.insert(
            Language::Python,
            LanguageCatalog::new(
                "pypi",
                &[
                    "abc", "asyncio", "collections", "contextlib", "copy", "dataclasses",
                    "datetime", "enum", "functools", "io", "itertools", "json", "logging", "math",
                    "os", "pathlib", "random", "re", "shutil", "subprocess", "sys", "tempfile",
                    "time", "typing", "unittest", "uuid",
                ],
                &[],
            ),
        );
        map.insert(
            Language::Rust,
            LanguageCatalog::new("crates", &["std", "core", "alloc"], &["std::", "core::", "alloc::"]),
        );
        map.insert(
            Language::Go,
            LanguageCatalog::new(
                "go",
                &[
                    "bufio", "bytes", "context", "encoding", "errors", "flag", "fmt", "io", "log",
                    "math", "net", "os", "path", "reflect", "regexp", "runtime", "sort", "strconv",
                    "strings", "sync", "testing", "time",
                ],
                &["golang.org/x/"],
            ),
        );
        map.insert(
            Language::Java,
            LanguageCatalog::new("maven", &[], &["java.", "javax.", "jakarta.", "sun."]),
        );
        Catalogs { map }
    }

    /// Merge out-of-band catalog files (language name -> file path). Entries
    /// extend the seeds; an explicit scheme replaces the seeded one.
    pub fn load_overrides(
        &mut self,
        catalog_paths: &HashMap<String, String>,
    ) -> Result<(), CatalogError> {
        for (language_name, path) in catalog_paths {
            let language = Language::parse_str(language_name)
                .ok_or_else(|| CatalogError::UnknownLanguage(language_name.clone()))?;
            let content = std::fs::read_to_string(path)
                .map_err(|e| CatalogError::Io(path.clone(), e.to_string()))?;
            let file: CatalogFile = serde_json::from_str(&content)
                .map_err(|e| CatalogError::Parse(path.clone(), e.to_string()))?;

            let entry = self
                .map
                .entry(language)
                .or_insert_with(|| LanguageCatalog::new("ext", &[], &[]));
            if let Some(scheme) = file.scheme {
                entry.scheme = scheme;
            }
            entry.exact.extend(file.exact);
            entry.prefixes.extend(file.prefixes);
        }
        Ok(())
    }

    pub fn get(&self, language: Language) -> Option<&LanguageCatalog> {
        self.map.get(&language)
    }

    /// The external scheme for a language, defaulting to `ext` for
    /// languages with no catalog.
    pub fn scheme_for(&self, language: Language) -> &str {
        self.map.get(&language).map(|c| c.scheme.as_str()).unwrap_or("ext")
    }

    /// Whether the specifier is classified stdlib/vendor for the language.
    pub fn is_external(&self, language: Language, specifier: &str) -> bool {
        self.map
            .get(&language)
            .is_some_and(|catalog| catalog.matches(specifier))
    }
}

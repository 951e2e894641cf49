//! Ingestion pipeline: detect, parse in parallel, splice embedded
//! languages, and apply serialized per-file upserts.
//!
//! Parsing is pure and fans out over rayon in bounded chunks (the chunk is
//! the work queue: producers block until the batch drains). Store writes are
//! serialized per file; cancellation is checked between files, never
//! mid-write.

use std::path::Path;

use rayon::prelude::*;

use felix_core::cancel::CancellationToken;
use felix_core::config::FelixConfig;
use felix_core::hash::content_hash;
use felix_core::store::GraphStore;
use felix_core::types::{Language, StoreError};

use crate::backend::{LanguageBoundary, ParseOptions, ParseResult, Severity};
use crate::boundaries::expand_boundaries;
use crate::registry::ParserRegistry;
use crate::segmenter::Segmenter;
use crate::walker::{FileWalker, WalkEntry};

/// Upper bound on files read and parsed per batch; `max_open_files` can
/// lower it further.
const PARSE_CHUNK: usize = 64;
/// Content-detection sample size, in bytes.
const SAMPLE_BYTES: usize = 4096;

#[derive(Debug, Default, Clone)]
pub struct IngestReport {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub components: usize,
    pub relationships: usize,
    pub diagnostics: usize,
    pub parse_errors: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Operation cancelled")]
    Cancelled,
}

pub struct IngestPipeline<'a> {
    registry: &'a ParserRegistry,
    config: &'a FelixConfig,
    options: ParseOptions,
    segmenter: Segmenter,
}

impl<'a> IngestPipeline<'a> {
    pub fn new(registry: &'a ParserRegistry, config: &'a FelixConfig) -> Self {
        IngestPipeline {
            registry,
            config,
            options: ParseOptions::full(),
            segmenter: Segmenter::new(),
        }
    }

    /// Parse in-memory bytes into a graph for one file. Pure in
    /// `(path, bytes)`: no store access, no filesystem access.
    pub fn parse_bytes(
        &self,
        path: &str,
        bytes: &[u8],
        override_language: Option<Language>,
    ) -> (String, ParseResult) {
        let hash = content_hash(bytes);
        let content = String::from_utf8_lossy(bytes);
        let sample_end = if content.len() <= SAMPLE_BYTES {
            content.len()
        } else {
            let mut end = SAMPLE_BYTES;
            while !content.is_char_boundary(end) {
                end -= 1;
            }
            end
        };
        let detection =
            self.registry
                .detect(path, Some(&content[..sample_end]), override_language);

        let mut result = detection.backend.parse_content(&content, path, &self.options);

        // No registered parser matched: segment the file and delegate each
        // block to whatever detection finds for its narrowed sample.
        if detection.backend.backend_name() == "detectors-only"
            && detection.language == Language::Text
        {
            result.boundaries = self.segment_boundaries(&content);
        }

        if self.options.expand_boundaries {
            expand_boundaries(self.registry, &mut result, &content, &self.options);
        }
        (hash, result)
    }

    /// Index one in-memory file: parse, then atomically replace its graph.
    /// Returns `None` when the incremental check skipped an unchanged file.
    pub fn index_bytes(
        &self,
        path: &str,
        bytes: &[u8],
        store: &mut dyn GraphStore,
        override_language: Option<Language>,
    ) -> Result<Option<ParseResult>, IngestError> {
        let hash = content_hash(bytes);
        if self.config.enable_incremental
            && store.file_content_hash(path).as_deref() == Some(hash.as_str())
        {
            return Ok(None);
        }
        let (hash, result) = self.parse_bytes(path, bytes, override_language);
        store.upsert_file(path, &hash, &result.components, &result.relationships)?;
        Ok(Some(result))
    }

    /// Walk a directory tree and index every recognized file. Parse jobs run
    /// in parallel; writes land serially, one file at a time.
    pub fn index_tree(
        &self,
        root: &Path,
        store: &mut dyn GraphStore,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, IngestError> {
        let entries = FileWalker::new(root).walk(self.registry);
        self.index_entries(&entries, store, cancel)
    }

    /// Index a pre-walked entry list.
    pub fn index_entries(
        &self,
        entries: &[WalkEntry],
        store: &mut dyn GraphStore,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, IngestError> {
        let mut report = IngestReport::default();
        let chunk_size = PARSE_CHUNK.min(self.config.max_open_files.max(1));

        for chunk in entries.chunks(chunk_size) {
            if cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }

            let parsed: Vec<Option<(String, String, ParseResult)>> = chunk
                .par_iter()
                .map(|entry| {
                    let path = entry.path.to_string_lossy().to_string();
                    let bytes = match std::fs::read(&entry.path) {
                        Ok(b) => b,
                        Err(e) => {
                            eprintln!("[felix] skipping unreadable {path}: {e}");
                            return None;
                        }
                    };
                    let hash = content_hash(&bytes);
                    Some((path, hash, bytes))
                })
                .map(|read| {
                    read.map(|(path, hash, bytes)| {
                        let (_, result) = self.parse_bytes(&path, &bytes, None);
                        (path, hash, result)
                    })
                })
                .collect();

            for item in parsed {
                if cancel.is_cancelled() {
                    return Err(IngestError::Cancelled);
                }
                let Some((path, hash, result)) = item else {
                    report.files_failed += 1;
                    continue;
                };
                if self.config.enable_incremental
                    && store.file_content_hash(&path).as_deref() == Some(hash.as_str())
                {
                    report.files_skipped += 1;
                    continue;
                }
                store.upsert_file(&path, &hash, &result.components, &result.relationships)?;
                report.files_indexed += 1;
                report.components += result.components.len();
                report.relationships += result.relationships.len();
                report.diagnostics += result.diagnostics.len();
                report.parse_errors += result
                    .diagnostics
                    .iter()
                    .filter(|d| d.severity == Severity::Error)
                    .count();
            }
        }

        Ok(report)
    }

    /// Re-detect each segmenter block; blocks that resolve to a registered
    /// language become synthetic boundaries for the shared expansion path.
    fn segment_boundaries(&self, content: &str) -> Vec<LanguageBoundary> {
        let mut boundaries = Vec::new();
        for block in self.segmenter.segment(content) {
            let detection = self.registry.detect("", Some(&block.sample), None);
            if detection.language == Language::Text
                || detection.backend.backend_name() == "detectors-only"
            {
                continue;
            }
            boundaries.push(LanguageBoundary {
                language: detection.language,
                start_line: block.start_line,
                end_line: block.end_line,
                scope: "segment".to_string(),
            });
        }
        boundaries
    }
}

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use felix_core::types::Language;

use crate::registry::ParserRegistry;

pub struct WalkEntry {
    pub path: PathBuf,
    pub language: Language,
}

/// File discovery for tree ingestion, respecting gitignore and
/// `.felixignore`. The core API itself takes in-memory content; this is the
/// convenience front end for a live checkout.
pub struct FileWalker {
    root: PathBuf,
}

impl FileWalker {
    /// Creates a new file walker rooted at the given directory.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Walks the root directory and returns files whose extension maps to a
    /// registered backend.
    pub fn walk(&self, registry: &ParserRegistry) -> Vec<WalkEntry> {
        let mut entries = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .add_custom_ignore_filename(".felixignore")
            .build();

        for result in walker {
            let entry = match result {
                Ok(e) => e,
                Err(_) => continue,
            };

            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.into_path();
            let detection = registry.detect(&path.to_string_lossy(), None, None);
            // Skip extension-less and unmapped files; content detection for
            // those runs only when bytes are handed in directly.
            if path.extension().is_none() || registry.best(detection.language).is_none() {
                continue;
            }
            entries.push(WalkEntry {
                path,
                language: detection.language,
            });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }
}

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;

use crate::store::SearchCriteria;
use crate::types::{Component, StoreError};

/// Encode an f32 vector as a little-endian blob for storage.
pub(crate) fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decode a little-endian blob back into an f32 vector.
pub(crate) fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compiled Rust-side filters for the parts of a search SQLite cannot index:
/// name regex and path include/exclude globs.
#[derive(Debug)]
pub(crate) struct CompiledFilters {
    name_regex: Option<Regex>,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl CompiledFilters {
    pub(crate) fn compile(criteria: &SearchCriteria) -> Result<Self, StoreError> {
        let name_regex = match &criteria.name_regex {
            Some(pattern) => Some(
                Regex::new(pattern)
                    .map_err(|e| StoreError::InvalidPattern(format!("{pattern}: {e}")))?,
            ),
            None => None,
        };
        Ok(CompiledFilters {
            name_regex,
            include: build_glob_set(&criteria.path_include)?,
            exclude: build_glob_set(&criteria.path_exclude)?,
        })
    }

    pub(crate) fn matches(&self, component: &Component) -> bool {
        if let Some(regex) = &self.name_regex {
            if !regex.is_match(&component.name) {
                return false;
            }
        }
        if let Some(include) = &self.include {
            if !include.is_match(&component.file_path) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(&component.file_path) {
                return false;
            }
        }
        true
    }
}

fn build_glob_set(patterns: &[String]) -> Result<Option<GlobSet>, StoreError> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| StoreError::InvalidPattern(format!("{pattern}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| StoreError::InvalidPattern(e.to_string()))
}

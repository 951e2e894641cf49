//! Configuration file loading for felix.
//!
//! Reads `.felix/felix.json` and provides typed access to all settings.
//! Falls back to sensible defaults when the config file is missing or
//! incomplete.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::EntityKind;

/// Top-level felix configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FelixConfig {
    #[serde(default = "default_version")]
    pub version: String,
    /// Cutoff for semantic search similarity.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Regex patterns whose matching paths are demoted during reranking.
    #[serde(default = "default_path_demote_patterns")]
    pub path_demote_patterns: Vec<String>,
    /// Additive penalty applied to demoted paths.
    #[serde(default = "default_path_demote_amount")]
    pub path_demote_amount: f64,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Per-entity-kind reranking weights.
    #[serde(default = "default_kind_weights")]
    pub kind_weights: HashMap<EntityKind, f64>,
    #[serde(default = "default_max_open_files")]
    pub max_open_files: usize,
    /// Concurrency cap for embedding inference.
    #[serde(default = "default_embedding_concurrency")]
    pub embedding_concurrency: usize,
    /// Reuse the last parse when the file content hash is unchanged.
    #[serde(default = "default_true")]
    pub enable_incremental: bool,
    /// Out-of-band stdlib catalog files, keyed by language name.
    #[serde(default)]
    pub catalog_paths: HashMap<String, String>,
    /// Module aliases consulted during bare-specifier resolution
    /// (alias prefix -> project path prefix).
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

/// Context-optimizer knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Minimum share of the original item set retained by filtering.
    #[serde(default = "default_min_retention")]
    pub min_retention: f64,
    /// Relevance score below which items are dropped.
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,
    /// Cap applied when truncating generic descriptions.
    #[serde(default = "default_max_description_length")]
    pub max_description_length: usize,
    /// Content-type weights applied during relevance scoring.
    #[serde(default = "default_content_weights")]
    pub content_weights: HashMap<String, f64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            min_retention: default_min_retention(),
            relevance_threshold: default_relevance_threshold(),
            max_description_length: default_max_description_length(),
            content_weights: default_content_weights(),
        }
    }
}

impl Default for FelixConfig {
    fn default() -> Self {
        FelixConfig {
            version: default_version(),
            similarity_threshold: default_similarity_threshold(),
            path_demote_patterns: default_path_demote_patterns(),
            path_demote_amount: default_path_demote_amount(),
            optimizer: OptimizerConfig::default(),
            kind_weights: default_kind_weights(),
            max_open_files: default_max_open_files(),
            embedding_concurrency: default_embedding_concurrency(),
            enable_incremental: true,
            catalog_paths: HashMap::new(),
            aliases: HashMap::new(),
            ignore_patterns: Vec::new(),
        }
    }
}

impl FelixConfig {
    /// Load configuration from `<root>/.felix/felix.json`, falling back to
    /// defaults when the file is missing. Malformed JSON is an error; a
    /// missing file is not.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(".felix").join("felix.json");
        if !path.exists() {
            return Ok(FelixConfig::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;
        serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.display().to_string(), e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {0}: {1}")]
    Io(String, String),

    #[error("Failed to parse config {0}: {1}")]
    Parse(String, String),
}

fn default_version() -> String {
    "1".to_string()
}

fn default_similarity_threshold() -> f64 {
    0.2
}

fn default_path_demote_patterns() -> Vec<String> {
    [
        r"(^|/)coverage(/|$)",
        r"(^|/)node_modules(/|$)",
        r"(^|/)vendor(/|$)",
        r"(^|/)dist(/|$)",
        r"(^|/)build(/|$)",
        r"(^|/)reports?(/|$)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_path_demote_amount() -> f64 {
    0.2
}

fn default_min_retention() -> f64 {
    0.1
}

fn default_relevance_threshold() -> f64 {
    3.0
}

fn default_max_description_length() -> usize {
    500
}

fn default_content_weights() -> HashMap<String, f64> {
    [
        ("code", 1.5),
        ("documentation", 1.2),
        ("relationships", 1.0),
        ("metadata", 0.8),
        ("comments", 0.6),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), *v))
    .collect()
}

fn default_kind_weights() -> HashMap<EntityKind, f64> {
    [
        (EntityKind::Component, 1.0),
        (EntityKind::Task, 0.4),
        (EntityKind::Note, 0.35),
        (EntityKind::Rule, 0.35),
    ]
    .into_iter()
    .collect()
}

fn default_max_open_files() -> usize {
    512
}

fn default_embedding_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

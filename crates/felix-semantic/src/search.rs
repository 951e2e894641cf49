//! Semantic + filter search.
//!
//! Pipeline: resolve the query to a vector, k-NN over stored embeddings
//! restricted by entity kind, structural filters, optional KB scoping,
//! rerank (`similarity x kind_weight - path_demote`), then projection to the
//! requested output view. Results are deterministic for a fixed snapshot;
//! ties break by entity id ascending.

use std::collections::HashSet;

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;

use felix_core::config::FelixConfig;
use felix_core::store::GraphStore;
use felix_core::types::{Component, ComponentKind, EntityKind, Language, StoreError};

use crate::embedding::{cosine, EmbeddingError, EmbeddingProvider};

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Invalid filter pattern: {0}")]
    Pattern(String),
}

/// How much of each hit the caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputView {
    Ids,
    Names,
    Files,
    FilesWithLines,
    #[default]
    Full,
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub component_kinds: Vec<ComponentKind>,
    pub languages: Vec<Language>,
    pub path_include: Vec<String>,
    pub path_exclude: Vec<String>,
    /// Note ids whose transitive descendants bound the note results.
    pub kb_scope: Vec<String>,
}

/// Reranking knobs; defaults come from [`FelixConfig`].
#[derive(Debug, Clone, Default)]
pub struct RerankSpec {
    pub kind_weights: std::collections::HashMap<EntityKind, f64>,
    pub path_demote_patterns: Vec<String>,
    pub path_demote_amount: f64,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub entity_kinds: Vec<EntityKind>,
    pub similarity_threshold: Option<f64>,
    pub limit: usize,
    pub filters: SearchFilters,
    pub rerank: Option<RerankSpec>,
    pub output_view: OutputView,
}

impl SearchRequest {
    pub fn components(query: &str, limit: usize) -> Self {
        SearchRequest {
            query: query.to_string(),
            entity_kinds: vec![EntityKind::Component],
            similarity_threshold: None,
            limit,
            filters: SearchFilters::default(),
            rerank: None,
            output_view: OutputView::Full,
        }
    }
}

/// One scored result, projected per the requested view.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub entity_id: String,
    pub entity_kind: EntityKind,
    pub similarity: f64,
    pub score: f64,
    /// Populated for `Names` and up.
    pub name: Option<String>,
    /// Populated for `Files` and up.
    pub file_path: Option<String>,
    /// Populated for `FilesWithLines` and up.
    pub lines: Option<(u32, u32)>,
    /// Populated only for `Full`.
    pub component: Option<Component>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    /// Candidates that passed the similarity threshold, pre-filter.
    pub total_candidates: usize,
}

/// KB hierarchy port. The metadata store owning notes lives outside the
/// core; the core only needs transitive containment over note ids.
pub trait NoteIndex {
    /// All notes transitively contained under the given roots, roots
    /// included.
    fn descendants(&self, roots: &[String]) -> Vec<String>;
}

pub struct SemanticSearch<'a> {
    store: &'a dyn GraphStore,
    provider: &'a dyn EmbeddingProvider,
    config: &'a FelixConfig,
    note_index: Option<&'a dyn NoteIndex>,
}

impl<'a> SemanticSearch<'a> {
    pub fn new(
        store: &'a dyn GraphStore,
        provider: &'a dyn EmbeddingProvider,
        config: &'a FelixConfig,
    ) -> Self {
        SemanticSearch {
            store,
            provider,
            config,
            note_index: None,
        }
    }

    pub fn with_note_index(mut self, note_index: &'a dyn NoteIndex) -> Self {
        self.note_index = Some(note_index);
        self
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let query_vector = self.provider.embed(&request.query)?;
        let threshold = request
            .similarity_threshold
            .unwrap_or(self.config.similarity_threshold);
        let entity_kinds = if request.entity_kinds.is_empty() {
            vec![EntityKind::Component]
        } else {
            request.entity_kinds.clone()
        };

        // (b) k-NN over stored embeddings, restricted by entity kind.
        let mut candidates: Vec<(String, EntityKind, f64)> = Vec::new();
        for entity_kind in &entity_kinds {
            for row in self.store.embeddings_by_kind(*entity_kind)? {
                if row.vector.len() != query_vector.len() {
                    // Rows from an older model version never match the query
                    // vector; they are awaiting re-embed.
                    continue;
                }
                let similarity = cosine(&query_vector, &row.vector)?;
                if similarity >= threshold {
                    candidates.push((row.entity_id, *entity_kind, similarity));
                }
            }
        }
        let total_candidates = candidates.len();

        // (c) structural filters; (d) KB scope.
        let include = build_globs(&request.filters.path_include)?;
        let exclude = build_globs(&request.filters.path_exclude)?;
        let kb_allowed: Option<HashSet<String>> = match (
            request.filters.kb_scope.is_empty(),
            self.note_index,
        ) {
            (false, Some(index)) => Some(
                index
                    .descendants(&request.filters.kb_scope)
                    .into_iter()
                    .collect(),
            ),
            (false, None) => Some(request.filters.kb_scope.iter().cloned().collect()),
            _ => None,
        };

        let rerank = request.rerank.clone().unwrap_or_else(|| RerankSpec {
            kind_weights: self.config.kind_weights.clone(),
            path_demote_patterns: self.config.path_demote_patterns.clone(),
            path_demote_amount: self.config.path_demote_amount,
        });
        let demote = compile_demotes(&rerank.path_demote_patterns)?;

        let mut hits: Vec<SearchHit> = Vec::new();
        for (entity_id, entity_kind, similarity) in candidates {
            let component = if entity_kind == EntityKind::Component {
                let Some(component) = self.store.get_component(&entity_id) else {
                    continue; // stale embedding row
                };
                if !component_passes(&component, &request.filters, &include, &exclude) {
                    continue;
                }
                Some(component)
            } else {
                // KB scoping restricts notes; every other non-component
                // entity passes through unchanged.
                if entity_kind == EntityKind::Note {
                    if let Some(allowed) = &kb_allowed {
                        if !allowed.contains(&entity_id) {
                            continue;
                        }
                    }
                }
                None
            };

            // (e) rerank.
            let kind_weight = rerank.kind_weights.get(&entity_kind).copied().unwrap_or(1.0);
            let mut score = similarity * kind_weight;
            if let Some(component) = &component {
                if demote.iter().any(|re| re.is_match(&component.file_path)) {
                    score -= rerank.path_demote_amount;
                }
            }

            hits.push(project(
                entity_id,
                entity_kind,
                similarity,
                score,
                component,
                request.output_view,
            ));
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        if request.limit > 0 {
            hits.truncate(request.limit);
        }

        Ok(SearchResponse {
            hits,
            total_candidates,
        })
    }
}

fn component_passes(
    component: &Component,
    filters: &SearchFilters,
    include: &Option<GlobSet>,
    exclude: &Option<GlobSet>,
) -> bool {
    if !filters.component_kinds.is_empty() && !filters.component_kinds.contains(&component.kind) {
        return false;
    }
    if !filters.languages.is_empty() && !filters.languages.contains(&component.language) {
        return false;
    }
    if let Some(include) = include {
        if !include.is_match(&component.file_path) {
            return false;
        }
    }
    if let Some(exclude) = exclude {
        if exclude.is_match(&component.file_path) {
            return false;
        }
    }
    true
}

fn project(
    entity_id: String,
    entity_kind: EntityKind,
    similarity: f64,
    score: f64,
    component: Option<Component>,
    view: OutputView,
) -> SearchHit {
    let mut hit = SearchHit {
        entity_id,
        entity_kind,
        similarity,
        score,
        name: None,
        file_path: None,
        lines: None,
        component: None,
    };
    let Some(component) = component else {
        return hit;
    };
    if view != OutputView::Ids {
        hit.name = Some(component.name.clone());
    }
    if matches!(view, OutputView::Files | OutputView::FilesWithLines | OutputView::Full) {
        hit.file_path = Some(component.file_path.clone());
    }
    if matches!(view, OutputView::FilesWithLines | OutputView::Full) {
        hit.lines = Some((component.location.start_line, component.location.end_line));
    }
    if view == OutputView::Full {
        hit.component = Some(component);
    }
    hit
}

fn build_globs(patterns: &[String]) -> Result<Option<GlobSet>, SearchError> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern).map_err(|e| SearchError::Pattern(format!("{pattern}: {e}")))?,
        );
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| SearchError::Pattern(e.to_string()))
}

fn compile_demotes(patterns: &[String]) -> Result<Vec<Regex>, SearchError> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| SearchError::Pattern(format!("{p}: {e}"))))
        .collect()
}

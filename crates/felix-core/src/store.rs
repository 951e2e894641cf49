use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::types::{
    Component, ComponentKind, EdgeDirection, EntityKind, Language, Relationship,
    RelationshipKind, StoreError,
};

/// Filter criteria for structural component search.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub kinds: Vec<ComponentKind>,
    pub languages: Vec<Language>,
    /// Glob patterns; a path must match at least one when non-empty.
    pub path_include: Vec<String>,
    /// Glob patterns; a matching path is excluded.
    pub path_exclude: Vec<String>,
    /// Regex applied to component names.
    pub name_regex: Option<String>,
    pub offset: usize,
    pub limit: usize,
}

impl SearchCriteria {
    pub fn with_limit(limit: usize) -> Self {
        SearchCriteria {
            limit,
            ..Default::default()
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub items: Vec<Component>,
    pub total: usize,
    pub has_more: bool,
    pub offset: usize,
    pub limit: usize,
}

/// Parameters for a bounded graph walk.
#[derive(Debug, Clone)]
pub struct WalkSpec {
    pub depth: usize,
    pub direction: EdgeDirection,
    /// Edge-kind whitelist; `None` follows every kind.
    pub kinds: Option<Vec<RelationshipKind>>,
}

impl WalkSpec {
    pub fn outgoing(depth: usize) -> Self {
        WalkSpec {
            depth,
            direction: EdgeDirection::Outgoing,
            kinds: None,
        }
    }
}

/// Result of a graph walk: the visited neighborhood plus detected cycles.
///
/// Cycles are reported, never followed twice. Each is a back-edge path
/// `[ancestor, ..., node, ancestor]` emitted exactly once.
#[derive(Debug, Clone, Default)]
pub struct WalkGraph {
    pub nodes: BTreeMap<String, Component>,
    pub edges: Vec<Relationship>,
    pub cycles: Vec<Vec<String>>,
}

/// A single resolver patch. Applied in bulk inside one transaction.
#[derive(Debug, Clone, Default)]
pub struct ResolutionPatch {
    pub relationship_id: String,
    pub resolved_target_id: Option<String>,
    pub resolved_source_id: Option<String>,
    pub metadata_patch: Option<MetadataPatch>,
}

/// Partial relationship-metadata update merged by the store.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub confidence: Option<f64>,
    pub is_external: Option<bool>,
    pub is_junk: Option<bool>,
    pub last_attempt_reason: Option<Option<String>>,
    pub extras: BTreeMap<String, serde_json::Value>,
}

/// A stored embedding row.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRow {
    pub entity_id: String,
    pub entity_kind: EntityKind,
    pub vector: Vec<f32>,
    pub model_version: String,
    pub content_hash: String,
}

/// Aggregate store statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub components: usize,
    pub relationships: usize,
    pub embeddings: usize,
    pub unresolved_relationships: usize,
    pub files: usize,
    pub by_language: BTreeMap<String, usize>,
    pub by_kind: BTreeMap<String, usize>,
}

/// Durable, indexed storage for components, relationships, and embeddings.
///
/// Contract (all implementations):
/// - `upsert_file` atomically replaces everything belonging to one file;
///   concurrent readers see either the pre-write or post-write snapshot.
/// - Any per-record failure inside a bulk write aborts the whole write.
/// - Query results are deterministic for a fixed snapshot; ties break by
///   id ascending.
pub trait GraphStore {
    /// Atomic replace of all components and relationships owned by
    /// `file_path`. `content_hash` is recorded for incremental skip.
    fn upsert_file(
        &mut self,
        file_path: &str,
        content_hash: &str,
        components: &[Component],
        relationships: &[Relationship],
    ) -> Result<(), StoreError>;

    /// Remove a file and everything belonging to it.
    fn remove_file(&mut self, file_path: &str) -> Result<(), StoreError>;

    /// Content hash recorded by the last `upsert_file` for this path.
    fn file_content_hash(&self, file_path: &str) -> Option<String>;

    fn get_component(&self, id: &str) -> Option<Component>;

    fn components_in_file(&self, file_path: &str) -> Vec<Component>;

    /// Filtered, paginated component search.
    fn search(&self, criteria: &SearchCriteria) -> Result<SearchPage, StoreError>;

    /// Edges touching `id` in the given direction, optionally restricted by
    /// kind, ordered by descending strength then id.
    fn neighbors(
        &self,
        id: &str,
        direction: EdgeDirection,
        kinds: Option<&[RelationshipKind]>,
        limit: Option<usize>,
    ) -> Vec<Relationship>;

    /// All relationships still flagged `needs_resolution`, ordered by id.
    fn unresolved(&self) -> Result<Vec<Relationship>, StoreError>;

    /// Apply resolver patches in a single transaction. Partial visibility is
    /// not permitted: either every patch lands or none do.
    fn apply_resolution_patch(&mut self, patches: &[ResolutionPatch]) -> Result<(), StoreError>;

    /// Upsert an embedding on `(entity_id, entity_kind)`.
    fn store_embedding(&mut self, row: &EmbeddingRow) -> Result<(), StoreError>;

    /// Content hash of the stored embedding, if one exists.
    fn embedding_content_hash(&self, entity_id: &str, entity_kind: EntityKind) -> Option<String>;

    /// All embeddings of one entity kind, ordered by entity id.
    fn embeddings_by_kind(&self, entity_kind: EntityKind) -> Result<Vec<EmbeddingRow>, StoreError>;

    fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Bounded breadth-first walk from `start_id` with explicit cycle
    /// detection. Default implementation is shared by all stores; it is
    /// built on [`GraphStore::neighbors`] and [`GraphStore::get_component`].
    fn walk(
        &self,
        start_id: &str,
        spec: &WalkSpec,
        cancel: &CancellationToken,
    ) -> Result<WalkGraph, StoreError> {
        walk_impl(self, start_id, spec, cancel)
    }
}

/// Follow an edge in the walk direction, returning the node on the far end
/// relative to `from`.
fn far_end(edge: &Relationship, from: &str) -> Option<String> {
    if edge.source_id == from {
        Some(edge.target_id.clone())
    } else if edge.target_id == from {
        Some(edge.source_id.clone())
    } else {
        None
    }
}

fn walk_impl<S: GraphStore + ?Sized>(
    store: &S,
    start_id: &str,
    spec: &WalkSpec,
    cancel: &CancellationToken,
) -> Result<WalkGraph, StoreError> {
    let mut graph = WalkGraph::default();
    let start = store
        .get_component(start_id)
        .ok_or_else(|| StoreError::ComponentNotFound(start_id.to_string()))?;
    graph.nodes.insert(start_id.to_string(), start);

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start_id.to_string());
    let mut parents: HashMap<String, String> = HashMap::new();
    let mut seen_edges: HashSet<String> = HashSet::new();
    let mut frontier: VecDeque<(String, usize)> = VecDeque::new();
    frontier.push_back((start_id.to_string(), 0));

    while let Some((node_id, depth)) = frontier.pop_front() {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if depth >= spec.depth {
            continue;
        }
        let mut edges = store.neighbors(&node_id, spec.direction, spec.kinds.as_deref(), None);
        // Stable expansion order regardless of backing-store iteration.
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        for edge in edges {
            if !seen_edges.insert(edge.id.clone()) {
                continue;
            }
            let Some(next_id) = far_end(&edge, &node_id) else {
                continue;
            };
            // Placeholder and external targets terminate the walk.
            let next_component = store.get_component(&next_id);
            graph.edges.push(edge);
            let Some(next_component) = next_component else {
                continue;
            };
            if visited.insert(next_id.clone()) {
                parents.insert(next_id.clone(), node_id.clone());
                graph.nodes.insert(next_id.clone(), next_component);
                frontier.push_back((next_id, depth + 1));
            } else if is_ancestor(&parents, &node_id, &next_id) {
                // Back edge to an ancestor: report the cycle once, as the
                // path ancestor -> ... -> node -> ancestor.
                let mut path = ancestry_path(&parents, &node_id, &next_id);
                path.push(next_id.clone());
                if !graph.cycles.contains(&path) {
                    graph.cycles.push(path);
                }
            }
        }
    }

    Ok(graph)
}

fn is_ancestor(parents: &HashMap<String, String>, node: &str, candidate: &str) -> bool {
    if node == candidate {
        return true;
    }
    let mut current = node;
    while let Some(parent) = parents.get(current) {
        if parent == candidate {
            return true;
        }
        current = parent;
    }
    false
}

/// Path from `ancestor` down to `node`, inclusive.
fn ancestry_path(parents: &HashMap<String, String>, node: &str, ancestor: &str) -> Vec<String> {
    let mut reversed = vec![node.to_string()];
    let mut current = node;
    while current != ancestor {
        match parents.get(current) {
            Some(parent) => {
                reversed.push(parent.clone());
                current = parent;
            }
            None => break,
        }
    }
    reversed.reverse();
    reversed
}

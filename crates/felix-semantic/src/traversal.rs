//! Graph traversal: callers, callees, inheritance chains, data flow, and
//! dependency fans. All operations share the store's bounded BFS walk with
//! per-direction edge-kind whitelists, visited-set deduplication, and
//! explicit cycle emission.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use felix_core::cancel::CancellationToken;
use felix_core::store::{GraphStore, WalkGraph, WalkSpec};
use felix_core::types::{Component, EdgeDirection, RelationshipKind, StoreError};

const CALL_KINDS: &[RelationshipKind] = &[RelationshipKind::Calls, RelationshipKind::Instantiates];
const INHERIT_KINDS: &[RelationshipKind] =
    &[RelationshipKind::Extends, RelationshipKind::Implements];
const DATA_FLOW_KINDS: &[RelationshipKind] = &[
    RelationshipKind::ReadsFrom,
    RelationshipKind::WritesTo,
    RelationshipKind::SendsTo,
    RelationshipKind::ReceivesFrom,
    RelationshipKind::Yields,
    RelationshipKind::YieldsTo,
    RelationshipKind::Returns,
    RelationshipKind::Mutates,
];
const DEPENDENCY_KINDS: &[RelationshipKind] = &[
    RelationshipKind::Imports,
    RelationshipKind::DependsOn,
    RelationshipKind::Uses,
    RelationshipKind::Includes,
];

pub struct Traversal<'a> {
    store: &'a dyn GraphStore,
}

impl<'a> Traversal<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Traversal { store }
    }

    /// Raw bounded walk; see [`GraphStore::walk`].
    pub fn walk(
        &self,
        start_id: &str,
        spec: &WalkSpec,
        cancel: &CancellationToken,
    ) -> Result<WalkGraph, StoreError> {
        self.store.walk(start_id, spec, cancel)
    }

    fn walk_kinds(
        &self,
        start_id: &str,
        depth: usize,
        direction: EdgeDirection,
        kinds: &[RelationshipKind],
        cancel: &CancellationToken,
    ) -> Result<WalkGraph, StoreError> {
        self.store.walk(
            start_id,
            &WalkSpec {
                depth,
                direction,
                kinds: Some(kinds.to_vec()),
            },
            cancel,
        )
    }

    /// Everything that transitively calls `id`.
    pub fn get_callers(
        &self,
        id: &str,
        depth: usize,
        cancel: &CancellationToken,
    ) -> Result<WalkGraph, StoreError> {
        self.walk_kinds(id, depth, EdgeDirection::Incoming, CALL_KINDS, cancel)
    }

    /// Everything `id` transitively calls.
    pub fn get_callees(
        &self,
        id: &str,
        depth: usize,
        cancel: &CancellationToken,
    ) -> Result<WalkGraph, StoreError> {
        self.walk_kinds(id, depth, EdgeDirection::Outgoing, CALL_KINDS, cancel)
    }

    /// The inheritance chain from `id` upward: `[id, parent, …]`. A cycle in
    /// the hierarchy terminates the chain rather than looping.
    pub fn get_inheritance_chain(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Component>, StoreError> {
        let mut chain = Vec::new();
        let mut visited: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut current = id.to_string();
        loop {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            if !visited.insert(current.clone()) {
                break;
            }
            let Some(component) = self.store.get_component(&current) else {
                break;
            };
            chain.push(component);
            let mut parents =
                self.store
                    .neighbors(&current, EdgeDirection::Outgoing, Some(INHERIT_KINDS), None);
            parents.sort_by(|a, b| a.id.cmp(&b.id));
            // Single-parent convention: the first resolvable supertype wins.
            match parents
                .into_iter()
                .find(|p| self.store.get_component(&p.target_id).is_some())
            {
                Some(parent) => current = parent.target_id,
                None => break,
            }
        }
        Ok(chain)
    }

    /// Data-flow neighborhood of `id` (reads, writes, sends, yields).
    pub fn get_data_flow(
        &self,
        id: &str,
        depth: usize,
        direction: EdgeDirection,
        cancel: &CancellationToken,
    ) -> Result<WalkGraph, StoreError> {
        self.walk_kinds(id, depth, direction, DATA_FLOW_KINDS, cancel)
    }

    /// What `id` depends on, ordered dependency-first when acyclic.
    pub fn get_dependencies(
        &self,
        id: &str,
        depth: usize,
        cancel: &CancellationToken,
    ) -> Result<(WalkGraph, Vec<String>), StoreError> {
        let graph = self.walk_kinds(id, depth, EdgeDirection::Outgoing, DEPENDENCY_KINDS, cancel)?;
        let order = topological_order(&graph);
        Ok((graph, order))
    }

    /// What depends on `id`.
    pub fn get_dependents(
        &self,
        id: &str,
        depth: usize,
        cancel: &CancellationToken,
    ) -> Result<(WalkGraph, Vec<String>), StoreError> {
        let graph = self.walk_kinds(id, depth, EdgeDirection::Incoming, DEPENDENCY_KINDS, cancel)?;
        let order = topological_order(&graph);
        Ok((graph, order))
    }
}

/// Deterministic ordering for a walk result: topological when the visited
/// subgraph is acyclic, id-sorted otherwise (cycles are already reported on
/// the walk itself).
pub fn topological_order(graph: &WalkGraph) -> Vec<String> {
    let mut petgraph: DiGraph<&str, ()> = DiGraph::new();
    let mut indexes: HashMap<&str, NodeIndex> = HashMap::new();
    for id in graph.nodes.keys() {
        indexes.insert(id.as_str(), petgraph.add_node(id.as_str()));
    }
    for edge in &graph.edges {
        if let (Some(&source), Some(&target)) = (
            indexes.get(edge.source_id.as_str()),
            indexes.get(edge.target_id.as_str()),
        ) {
            petgraph.add_edge(source, target, ());
        }
    }
    match toposort(&petgraph, None) {
        Ok(order) => order
            .into_iter()
            .map(|index| petgraph[index].to_string())
            .collect(),
        Err(_) => graph.nodes.keys().cloned().collect(),
    }
}

//! Discovery: suggested terms, related concepts, and cross-references for a
//! candidate set, plus synonym/concept-map query expansion.

use std::collections::{BTreeMap, HashMap, HashSet};

use felix_core::store::GraphStore;
use felix_core::types::{EdgeDirection, Relationship};

use crate::search::SearchHit;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "get", "has", "have", "in",
    "into", "is", "it", "new", "not", "of", "on", "or", "set", "that", "the", "this", "to", "use",
    "with",
];

const MAX_SUGGESTED_TERMS: usize = 12;
const MAX_RELATED_CONCEPTS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SuggestedTerm {
    pub term: String,
    pub occurrences: usize,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DiscoveryResult {
    /// Frequent terms from the candidate set, strongest first.
    pub suggested_terms: Vec<SuggestedTerm>,
    /// Word bag from names, docs, and path segments, minus stop words.
    pub related_concepts: Vec<String>,
    /// Relationship edges connecting candidates to each other.
    pub cross_references: Vec<Relationship>,
}

/// Extract discovery context from a search result.
pub fn discover(store: &dyn GraphStore, query: &str, hits: &[SearchHit]) -> DiscoveryResult {
    let query_terms: HashSet<String> = words(query).collect();

    // Word-bag over names, documentation, and path segments.
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for hit in hits {
        let Some(component) = &hit.component else {
            continue;
        };
        let mut text = component.name.clone();
        if let Some(doc) = &component.metadata.documentation {
            text.push(' ');
            text.push_str(doc);
        }
        for segment in component.file_path.split(['/', '.']) {
            text.push(' ');
            text.push_str(segment);
        }
        for word in words(&text) {
            if word.len() < 3 || STOP_WORDS.contains(&word.as_str()) || query_terms.contains(&word)
            {
                continue;
            }
            *counts.entry(word).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let suggested_terms = ranked
        .iter()
        .take(MAX_SUGGESTED_TERMS)
        .map(|(term, occurrences)| SuggestedTerm {
            term: term.clone(),
            occurrences: *occurrences,
        })
        .collect();
    let related_concepts = ranked
        .into_iter()
        .take(MAX_RELATED_CONCEPTS)
        .map(|(term, _)| term)
        .collect();

    // Edges whose both endpoints sit in the candidate set.
    let ids: HashSet<&str> = hits.iter().map(|h| h.entity_id.as_str()).collect();
    let mut cross_references: Vec<Relationship> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for hit in hits {
        for edge in store.neighbors(&hit.entity_id, EdgeDirection::Outgoing, None, None) {
            if ids.contains(edge.target_id.as_str()) && seen.insert(edge.id.clone()) {
                cross_references.push(edge);
            }
        }
    }
    cross_references.sort_by(|a, b| a.id.cmp(&b.id));

    DiscoveryResult {
        suggested_terms,
        related_concepts,
        cross_references,
    }
}

/// Expand a query through synonym and concept maps before re-searching.
/// Returns the original query first, expansions after, deduplicated.
pub fn expand_query(query: &str, synonyms: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut expanded = vec![query.to_string()];
    let mut seen: HashSet<String> = expanded.iter().cloned().collect();
    for word in words(query) {
        if let Some(alternatives) = synonyms.get(&word) {
            for alternative in alternatives {
                let variant = query.to_lowercase().replace(&word, alternative);
                if seen.insert(variant.clone()) {
                    expanded.push(variant);
                }
            }
        }
    }
    expanded
}

/// The default synonym map used when the caller supplies none.
pub fn default_synonyms() -> HashMap<String, Vec<String>> {
    let entries: &[(&str, &[&str])] = &[
        ("auth", &["authentication", "login"]),
        ("db", &["database", "storage"]),
        ("config", &["configuration", "settings"]),
        ("error", &["exception", "failure"]),
        ("fetch", &["request", "load"]),
        ("parse", &["tokenize", "read"]),
        ("test", &["spec", "check"]),
        ("util", &["helper", "common"]),
    ];
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
        .collect()
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .flat_map(|w| split_camel(w).into_iter())
        .map(|w| w.to_lowercase())
}

fn split_camel(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        if ch.is_uppercase() && current.chars().last().is_some_and(|c| c.is_lowercase()) {
            parts.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

//! Context optimizer: score, filter, and compress a candidate set into a
//! token-bounded context pack.
//!
//! Three ordered stages: relevance scoring, filtering (with a minimum
//! retention floor and `(name, kind, path)` deduplication), then window
//! sizing with type-aware reduction strategies. Ordering by weighted score
//! is preserved throughout, so a larger budget always keeps a superset of
//! what a smaller budget kept.

use std::collections::HashSet;

use felix_core::config::FelixConfig;
use felix_core::types::RelationshipKind;

/// Token estimation density: code runs denser than prose.
const CODE_CHARS_PER_TOKEN: f64 = 4.0;
const PROSE_CHARS_PER_TOKEN: f64 = 4.5;

/// Share of items (or flat count) whose removal triggers a warning.
const WARN_REMOVAL_SHARE: f64 = 0.10;
const WARN_REMOVAL_COUNT: usize = 10;

const LIST_TRUNCATE_KEEP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Code,
    Documentation,
    Relationships,
    Metadata,
    Comments,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Code => "code",
            ContentType::Documentation => "documentation",
            ContentType::Relationships => "relationships",
            ContentType::Metadata => "metadata",
            ContentType::Comments => "comments",
        }
    }
}

/// One candidate item for the pack.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextItem {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub path: String,
    pub content: String,
    pub content_type: ContentType,
    pub description: Option<String>,
    /// Raw relevance, set by stage 1.
    pub raw_score: f64,
    /// Raw x content-type weight, set by stage 1.
    pub weighted_score: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextRelationship {
    pub source_id: String,
    pub target_id: String,
    pub kind: RelationshipKind,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ContextCandidates {
    pub items: Vec<ContextItem>,
    pub relationships: Vec<ContextRelationship>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OptimizeOutcome {
    /// Surviving items ordered by weighted score, plus their relationships.
    pub optimized: ContextCandidates,
    pub original_tokens: usize,
    pub final_tokens: usize,
    pub items_removed: usize,
    pub relationships_removed: usize,
    pub strategies_applied: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct ContextOptimizer {
    min_retention: f64,
    relevance_threshold: f64,
    max_description_length: usize,
    content_weights: std::collections::HashMap<String, f64>,
}

impl ContextOptimizer {
    pub fn new(config: &FelixConfig) -> Self {
        ContextOptimizer {
            min_retention: config.optimizer.min_retention,
            relevance_threshold: config.optimizer.relevance_threshold,
            max_description_length: config.optimizer.max_description_length,
            content_weights: config.optimizer.content_weights.clone(),
        }
    }

    /// Build a token-bounded pack. Budget violations degrade to a
    /// best-effort pack with a warning, never an error.
    pub fn optimize(
        &self,
        query: &str,
        candidates: ContextCandidates,
        token_budget: usize,
    ) -> OptimizeOutcome {
        let original_items = candidates.items.len();
        let original_relationships = candidates.relationships.len();
        let mut strategies = vec!["relevance-scoring".to_string()];

        // Stage 1: relevance scoring. Both raw and weighted stay on the item.
        let mut items = candidates.items;
        for item in &mut items {
            item.raw_score = relevance(query, item);
            let weight = self
                .content_weights
                .get(item.content_type.as_str())
                .copied()
                .unwrap_or(1.0);
            item.weighted_score = item.raw_score * weight;
        }
        items.sort_by(|a, b| {
            b.weighted_score
                .partial_cmp(&a.weighted_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let original_tokens: usize = items.iter().map(|i| estimate_tokens(i)).sum();

        // Stage 2: filtering with the retention floor, then dedup.
        let floor = ((original_items as f64) * self.min_retention).ceil() as usize;
        let mut kept: Vec<ContextItem> = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            if item.weighted_score >= self.relevance_threshold || index < floor {
                kept.push(item);
            }
        }
        if kept.len() < original_items {
            strategies.push("filtering".to_string());
        }

        let mut seen: HashSet<(String, String, String)> = HashSet::new();
        let before_dedup = kept.len();
        kept.retain(|item| seen.insert((item.name.clone(), item.kind.clone(), item.path.clone())));
        if kept.len() < before_dedup {
            strategies.push("deduplication".to_string());
        }

        // Stage 3: window sizing with type-aware reductions, weakest items
        // first, strongest ordering preserved.
        let mut total: usize = kept.iter().map(|i| estimate_tokens(i)).sum();
        if total > token_budget {
            strategies.push("window-sizing".to_string());

            // (a) code bodies drop to skeletons.
            let mut applied_skeleton = false;
            for index in (0..kept.len()).rev() {
                if total <= token_budget {
                    break;
                }
                if kept[index].content_type != ContentType::Code {
                    continue;
                }
                let skeleton = skeletonize(&kept[index].content);
                if skeleton.len() < kept[index].content.len() {
                    total -= estimate_tokens(&kept[index]);
                    kept[index].content = skeleton;
                    total += estimate_tokens(&kept[index]);
                    applied_skeleton = true;
                }
            }
            if applied_skeleton {
                strategies.push("code-skeleton".to_string());
            }

            // (b) documents keep headings, summarize paragraphs, cut lists.
            let mut applied_summary = false;
            for index in (0..kept.len()).rev() {
                if total <= token_budget {
                    break;
                }
                if !matches!(
                    kept[index].content_type,
                    ContentType::Documentation | ContentType::Comments
                ) {
                    continue;
                }
                let summary = summarize_document(&kept[index].content);
                if summary.len() < kept[index].content.len() {
                    total -= estimate_tokens(&kept[index]);
                    kept[index].content = summary;
                    total += estimate_tokens(&kept[index]);
                    applied_summary = true;
                }
            }
            if applied_summary {
                strategies.push("document-summarize".to_string());
            }

            // (c) generic description truncation.
            let mut applied_truncate = false;
            for index in (0..kept.len()).rev() {
                if total <= token_budget {
                    break;
                }
                let item = &mut kept[index];
                if item.content.len() > self.max_description_length {
                    total -= estimate_tokens(item);
                    item.content = truncate_at_boundary(&item.content, self.max_description_length);
                    total += estimate_tokens(item);
                    applied_truncate = true;
                }
                if let Some(description) = &item.description {
                    if description.len() > self.max_description_length {
                        item.description =
                            Some(truncate_at_boundary(description, self.max_description_length));
                        applied_truncate = true;
                    }
                }
            }
            if applied_truncate {
                strategies.push("description-truncation".to_string());
            }

            // (d) weakest items drop entirely until the pack fits.
            while total > token_budget && kept.len() > 1 {
                let dropped = kept.pop().expect("len checked above");
                total -= estimate_tokens(&dropped);
            }
        }

        // Relationships survive only when both endpoints did.
        let surviving: HashSet<&str> = kept.iter().map(|i| i.id.as_str()).collect();
        let relationships: Vec<ContextRelationship> = candidates
            .relationships
            .into_iter()
            .filter(|r| {
                surviving.contains(r.source_id.as_str()) && surviving.contains(r.target_id.as_str())
            })
            .collect();

        let items_removed = original_items - kept.len();
        let relationships_removed = original_relationships - relationships.len();
        let final_tokens: usize = kept.iter().map(|i| estimate_tokens(i)).sum();

        let mut warnings = Vec::new();
        if items_removed > WARN_REMOVAL_COUNT
            || (original_items > 0
                && items_removed as f64 / original_items as f64 > WARN_REMOVAL_SHARE)
        {
            warnings.push(format!(
                "truncated context: removed {items_removed} of {original_items} items to fit {token_budget} tokens"
            ));
        }
        if final_tokens > token_budget {
            warnings.push(format!(
                "budget exceeded: best-effort pack is {final_tokens} tokens against a budget of {token_budget}"
            ));
        }

        OptimizeOutcome {
            optimized: ContextCandidates {
                items: kept,
                relationships,
            },
            original_tokens,
            final_tokens,
            items_removed,
            relationships_removed,
            strategies_applied: strategies,
            warnings,
        }
    }
}

/// Render a pack as ordered text: strongest items first, skeletons and all.
pub fn render_pack(outcome: &OptimizeOutcome) -> String {
    let mut out = String::new();
    for item in &outcome.optimized.items {
        out.push_str(&format!("## {} ({}) — {}\n", item.name, item.kind, item.path));
        if let Some(description) = &item.description {
            out.push_str(description);
            out.push('\n');
        }
        out.push_str(&item.content);
        out.push_str("\n\n");
    }
    out
}

/// Token estimate for one item: ~4 chars/token for code, ~4.5 for prose.
pub fn estimate_tokens(item: &ContextItem) -> usize {
    let density = match item.content_type {
        ContentType::Code => CODE_CHARS_PER_TOKEN,
        _ => PROSE_CHARS_PER_TOKEN,
    };
    let chars = item.content.len() + item.description.as_ref().map_or(0, |d| d.len());
    (chars as f64 / density).ceil() as usize
}

/// Query relevance: term hits in the name count heavily, content hits
/// lightly, callable/type kinds get a nudge.
fn relevance(query: &str, item: &ContextItem) -> f64 {
    let name = item.name.to_lowercase();
    let content = item.content.to_lowercase();
    let mut score = 0.0;
    for term in query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let term = term.to_lowercase();
        if name.contains(&term) {
            score += 3.0;
        }
        if content.contains(&term) {
            score += 1.0;
        }
    }
    if matches!(item.kind.as_str(), "function" | "method" | "class" | "interface") {
        score += 1.0;
    }
    score
}

/// Keep signatures, drop bodies: lines that open a definition survive, the
/// first dropped run is marked with an ellipsis comment.
fn skeletonize(code: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut elided = false;
    for line in code.lines() {
        let trimmed = line.trim_start();
        let is_signature = trimmed.starts_with("fn ")
            || trimmed.starts_with("pub fn ")
            || trimmed.starts_with("def ")
            || trimmed.starts_with("async def ")
            || trimmed.starts_with("class ")
            || trimmed.starts_with("interface ")
            || trimmed.starts_with("struct ")
            || trimmed.starts_with("enum ")
            || trimmed.starts_with("trait ")
            || trimmed.starts_with("impl ")
            || trimmed.starts_with("function ")
            || trimmed.starts_with("export ")
            || trimmed.starts_with("func ")
            || trimmed.starts_with("type ")
            || trimmed.starts_with("#[")
            || trimmed.starts_with("@")
            || trimmed.starts_with("///")
            || trimmed.starts_with("//!");
        if is_signature {
            out.push(line.to_string());
            elided = false;
        } else if !elided && !trimmed.is_empty() {
            out.push("    // …".to_string());
            elided = true;
        }
    }
    out.join("\n")
}

/// Preserve headings, keep each paragraph's first sentence, truncate lists.
fn summarize_document(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut list_run = 0usize;
    let mut in_paragraph = false;
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            out.push(line.to_string());
            list_run = 0;
            in_paragraph = false;
        } else if trimmed.starts_with('-') || trimmed.starts_with('*') {
            list_run += 1;
            if list_run <= LIST_TRUNCATE_KEEP {
                out.push(line.to_string());
            } else if list_run == LIST_TRUNCATE_KEEP + 1 {
                out.push("- …".to_string());
            }
            in_paragraph = false;
        } else if trimmed.is_empty() {
            list_run = 0;
            in_paragraph = false;
            out.push(String::new());
        } else if !in_paragraph {
            // First sentence of the paragraph.
            let sentence = match trimmed.find(". ") {
                Some(pos) => &trimmed[..pos + 1],
                None => trimmed,
            };
            out.push(sentence.to_string());
            in_paragraph = true;
        }
    }
    out.join("\n")
}

fn truncate_at_boundary(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut end = max_len;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

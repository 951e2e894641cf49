//! Cross-file reference resolution.
//!
//! Converts `RESOLVE:<specifier>` placeholders and sentinel external sources
//! into concrete component ids or `external:module:<scheme>:<name>` ids.
//! Resolution is best-effort, never blocks ingestion, and is idempotent on a
//! fixed snapshot: every patch lands in one transaction, junk edges are
//! tagged rather than dropped, and unresolvable edges stay queryable with
//! their original specifier.
//!
//! State machine per edge: `pending -> classified{internal|external|junk}
//! -> patched -> done`. Only the patch step writes to the store.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use regex::escape;

use felix_core::cancel::CancellationToken;
use felix_core::hash::content_hash;
use felix_core::store::{GraphStore, MetadataPatch, ResolutionPatch, SearchCriteria};
use felix_core::types::{
    external_module_id, CapabilityBlock, CapabilitySet, Component, ComponentKind,
    ComponentMetadata, EdgeDirection, Language, ParsingLevel, Relationship, RelationshipKind,
    RelationshipMetadata, SourceLocation, StoreError,
};

use crate::catalog::Catalogs;
use crate::sanitize::{is_junk_specifier, sanitize_specifier};

/// Confidence assigned to a successful internal resolution.
const RESOLVED_CONFIDENCE: f64 = 0.9;
/// Confidence cap for specifiers externalized without a catalog hit.
const GUESSED_EXTERNAL_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolutionReport {
    pub attempted: usize,
    pub resolved: usize,
    pub external: usize,
    pub junk: usize,
    pub unresolved: usize,
    pub skipped: usize,
}

/// Classification outcome for one edge.
enum Outcome {
    Internal(String),
    External {
        scheme: String,
        name: String,
        cataloged: bool,
    },
    Junk(String),
    Unresolved(String),
}

pub struct Resolver<'a> {
    catalogs: &'a Catalogs,
    /// Module alias map (alias prefix -> project path prefix).
    aliases: &'a HashMap<String, String>,
}

impl<'a> Resolver<'a> {
    pub fn new(catalogs: &'a Catalogs, aliases: &'a HashMap<String, String>) -> Self {
        Resolver { catalogs, aliases }
    }

    /// Resolve every `needs_resolution` edge in the store and apply the
    /// result as a single patch transaction.
    pub fn resolve_all(
        &self,
        store: &mut dyn GraphStore,
        cancel: &CancellationToken,
    ) -> Result<ResolutionReport, StoreError> {
        let mut report = ResolutionReport::default();
        let mut patches: Vec<ResolutionPatch> = Vec::new();
        let mut externals: BTreeMap<String, BTreeSet<(String, Language)>> = BTreeMap::new();

        // Ordered by id: deterministic for a fixed snapshot.
        let pending = store.unresolved()?;
        for edge in &pending {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            if edge.metadata.is_junk {
                report.skipped += 1;
                continue;
            }
            report.attempted += 1;

            // Input class 2: a synthesized inverse edge whose host is
            // outside the project carries the placeholder on the source.
            if edge.source_id.starts_with(felix_core::types::RESOLVE_PREFIX)
                && !edge.is_unresolved_placeholder()
            {
                self.patch_unresolved_source(store, edge, &mut patches, &mut report);
                continue;
            }

            let language = self.source_language(store, edge);
            match self.classify(store, edge, language) {
                Outcome::Internal(target_id) => {
                    report.resolved += 1;
                    patches.push(ResolutionPatch {
                        relationship_id: edge.id.clone(),
                        resolved_target_id: Some(target_id),
                        resolved_source_id: None,
                        metadata_patch: Some(MetadataPatch {
                            confidence: Some(edge.metadata.confidence.max(RESOLVED_CONFIDENCE)),
                            ..Default::default()
                        }),
                    });
                }
                Outcome::External {
                    scheme,
                    name,
                    cataloged,
                } => {
                    report.external += 1;
                    externals
                        .entry(scheme.clone())
                        .or_default()
                        .insert((name.clone(), language));
                    let confidence = if cataloged {
                        None
                    } else {
                        Some(edge.metadata.confidence.min(GUESSED_EXTERNAL_CONFIDENCE))
                    };
                    patches.push(ResolutionPatch {
                        relationship_id: edge.id.clone(),
                        resolved_target_id: Some(external_module_id(&scheme, &name)),
                        resolved_source_id: None,
                        metadata_patch: Some(MetadataPatch {
                            is_external: Some(true),
                            confidence,
                            ..Default::default()
                        }),
                    });
                }
                Outcome::Junk(reason) => {
                    report.junk += 1;
                    patches.push(ResolutionPatch {
                        relationship_id: edge.id.clone(),
                        resolved_target_id: None,
                        resolved_source_id: None,
                        metadata_patch: Some(MetadataPatch {
                            is_junk: Some(true),
                            last_attempt_reason: Some(Some(reason)),
                            ..Default::default()
                        }),
                    });
                }
                Outcome::Unresolved(reason) => {
                    report.unresolved += 1;
                    if edge.metadata.last_attempt_reason.as_deref() != Some(reason.as_str()) {
                        patches.push(ResolutionPatch {
                            relationship_id: edge.id.clone(),
                            resolved_target_id: None,
                            resolved_source_id: None,
                            metadata_patch: Some(MetadataPatch {
                                last_attempt_reason: Some(Some(reason)),
                                ..Default::default()
                            }),
                        });
                    }
                }
            }
        }

        self.upsert_external_placeholders(store, &externals)?;
        store.apply_resolution_patch(&patches)?;
        Ok(report)
    }

    fn patch_unresolved_source(
        &self,
        store: &dyn GraphStore,
        edge: &Relationship,
        patches: &mut Vec<ResolutionPatch>,
        report: &mut ResolutionReport,
    ) {
        let spec = edge
            .source_id
            .strip_prefix(felix_core::types::RESOLVE_PREFIX)
            .unwrap_or_default();
        let Some(spec) = sanitize_specifier(spec) else {
            report.junk += 1;
            patches.push(ResolutionPatch {
                relationship_id: edge.id.clone(),
                metadata_patch: Some(MetadataPatch {
                    is_junk: Some(true),
                    last_attempt_reason: Some(Some("empty source specifier".to_string())),
                    ..Default::default()
                }),
                ..Default::default()
            });
            return;
        };
        match self.symbolic_lookup(store, None, &spec, edge.kind, None) {
            Some(id) => {
                report.resolved += 1;
                patches.push(ResolutionPatch {
                    relationship_id: edge.id.clone(),
                    resolved_source_id: Some(id),
                    resolved_target_id: None,
                    metadata_patch: None,
                });
            }
            None => {
                report.unresolved += 1;
                patches.push(ResolutionPatch {
                    relationship_id: edge.id.clone(),
                    metadata_patch: Some(MetadataPatch {
                        last_attempt_reason: Some(Some("source symbol not indexed".to_string())),
                        ..Default::default()
                    }),
                    ..Default::default()
                });
            }
        }
    }

    fn source_language(&self, store: &dyn GraphStore, edge: &Relationship) -> Language {
        store
            .get_component(&edge.source_id)
            .map(|c| c.language)
            .unwrap_or(Language::Unknown)
    }

    /// Steps 1-4 of the per-edge algorithm.
    fn classify(
        &self,
        store: &dyn GraphStore,
        edge: &Relationship,
        language: Language,
    ) -> Outcome {
        let Some(raw) = edge.resolve_specifier() else {
            return Outcome::Unresolved("target is not a RESOLVE placeholder".to_string());
        };

        // 1. Sanitize.
        let Some(spec) = sanitize_specifier(raw) else {
            return Outcome::Junk("empty specifier after sanitization".to_string());
        };
        if is_junk_specifier(&spec) {
            return Outcome::Junk(format!("unparseable specifier: {spec}"));
        }

        // 2. Stdlib/vendor classification.
        if self.catalogs.is_external(language, &spec) {
            return Outcome::External {
                scheme: self.catalogs.scheme_for(language).to_string(),
                name: spec,
                cataloged: true,
            };
        }

        // 3. Pre-resolved absolute path fast path.
        if let Some(resolved_path) = edge
            .metadata
            .extras
            .get("resolved_path")
            .and_then(|v| v.as_str())
        {
            if let Some(file) = file_component_at(store, resolved_path) {
                return Outcome::Internal(file.id);
            }
        }

        // 4. Language-aware resolution, by edge class.
        if is_module_edge(edge.kind) {
            self.resolve_module(store, edge, language, &spec)
        } else {
            let source = store.get_component(&edge.source_id);
            match self.symbolic_lookup(store, source.as_ref(), &spec, edge.kind, Some(language)) {
                Some(id) => Outcome::Internal(id),
                None => Outcome::Unresolved(format!("symbol not found: {spec}")),
            }
        }
    }

    /// Relative path, project index, alias, then external fallback.
    fn resolve_module(
        &self,
        store: &dyn GraphStore,
        edge: &Relationship,
        language: Language,
        spec: &str,
    ) -> Outcome {
        let source_file = store
            .get_component(&edge.source_id)
            .map(|c| c.file_path)
            .unwrap_or_default();

        if is_relative_specifier(spec, language) {
            let dir = parent_dir(&source_file);
            for candidate in relative_candidates(&dir, spec, language) {
                if let Some(file) = file_component_at(store, &candidate) {
                    return Outcome::Internal(file.id);
                }
            }
            return Outcome::Unresolved(format!("relative target not indexed: {spec}"));
        }

        // Bare name: project module/file indexes first.
        if let Some(id) = self.project_module_lookup(store, spec, language) {
            return Outcome::Internal(id);
        }

        // Declared aliases.
        let mut aliases: Vec<(&String, &String)> = self.aliases.iter().collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        for (alias, target) in aliases {
            let rest = if spec == alias {
                Some("")
            } else {
                spec.strip_prefix(&format!("{alias}/"))
            };
            if let Some(rest) = rest {
                let base = if rest.is_empty() {
                    target.clone()
                } else {
                    format!("{target}/{rest}")
                };
                for candidate in path_candidates(&base, language) {
                    if let Some(file) = file_component_at(store, &candidate) {
                        return Outcome::Internal(file.id);
                    }
                }
            }
        }

        // Mark as external under the language's default scheme.
        Outcome::External {
            scheme: self.catalogs.scheme_for(language).to_string(),
            name: spec.to_string(),
            cataloged: false,
        }
    }

    /// Search project indexes for a bare module name: module components,
    /// then file components whose stem matches.
    fn project_module_lookup(
        &self,
        store: &dyn GraphStore,
        spec: &str,
        language: Language,
    ) -> Option<String> {
        let stem = spec.rsplit(['/', '.']).next().unwrap_or(spec);
        let stem = stem.split("::").last().unwrap_or(stem);
        let pattern = format!("^{}(\\.[A-Za-z0-9_]+)?$", escape(stem));
        let page = store
            .search(&SearchCriteria {
                kinds: vec![ComponentKind::Module, ComponentKind::File],
                name_regex: Some(pattern),
                ..Default::default()
            })
            .ok()?;
        rank_candidates(page.items, language, None).map(|c| c.id)
    }

    /// Qualified-name then scoped then global symbol lookup, per the
    /// ordering and tie-break rules. Deterministic for a fixed snapshot.
    fn symbolic_lookup(
        &self,
        store: &dyn GraphStore,
        source: Option<&Component>,
        spec: &str,
        edge_kind: RelationshipKind,
        language: Option<Language>,
    ) -> Option<String> {
        let short = spec
            .rsplit(['.', '/'])
            .next()
            .unwrap_or(spec)
            .split("::")
            .last()
            .unwrap_or(spec);

        let accepts = |c: &Component| kind_class_accepts(edge_kind, c) && !c.is_file();

        // Same module scope first.
        if let Some(source) = source {
            let mut local: Vec<Component> = store
                .components_in_file(&source.file_path)
                .into_iter()
                .filter(|c| c.id != source.id && c.name == short && accepts(c))
                .collect();
            local.sort_by(|a, b| a.id.cmp(&b.id));
            if let Some(found) = local.into_iter().next() {
                return Some(found.id);
            }

            // Then the modules the source's file imports.
            if let Some(file) = file_component_at(store, &source.file_path) {
                let imports = store.neighbors(
                    &file.id,
                    EdgeDirection::Outgoing,
                    Some(&[RelationshipKind::Imports]),
                    None,
                );
                for import in imports {
                    let Some(target) = store.get_component(&import.target_id) else {
                        continue;
                    };
                    let mut found: Vec<Component> = store
                        .components_in_file(&target.file_path)
                        .into_iter()
                        .filter(|c| c.name == short && accepts(c))
                        .collect();
                    found.sort_by(|a, b| {
                        b.metadata
                            .is_exported
                            .cmp(&a.metadata.is_exported)
                            .then(a.id.cmp(&b.id))
                    });
                    if let Some(hit) = found.into_iter().next() {
                        return Some(hit.id);
                    }
                }
            }
        }

        // Global search, exact-qualified before short-name.
        let pattern = format!("^{}$", escape(short));
        let page = store
            .search(&SearchCriteria {
                name_regex: Some(pattern),
                ..Default::default()
            })
            .ok()?;
        let candidates: Vec<Component> = page.items.into_iter().filter(|c| accepts(c)).collect();
        rank_candidates(candidates, language.unwrap_or(Language::Unknown), Some(spec))
            .map(|c| c.id)
    }

    /// Materialize external placeholders so external ids are queryable
    /// components, grouped into one synthetic file per scheme.
    fn upsert_external_placeholders(
        &self,
        store: &mut dyn GraphStore,
        externals: &BTreeMap<String, BTreeSet<(String, Language)>>,
    ) -> Result<(), StoreError> {
        for (scheme, modules) in externals {
            let file_path = format!("external://{scheme}");
            let capability = CapabilityBlock::new(
                ParsingLevel::Basic,
                "resolver",
                CapabilitySet::default(),
            );

            // Merge with modules recorded by earlier resolver runs.
            let mut names: BTreeSet<(String, Language)> = modules.clone();
            for existing in store.components_in_file(&file_path) {
                if !existing.is_file() {
                    names.insert((existing.name.clone(), existing.language));
                }
            }

            let file_id = felix_core::hash::component_id(&file_path, &file_path, ComponentKind::File);
            let mut components = vec![Component {
                id: file_id.clone(),
                name: file_path.clone(),
                kind: ComponentKind::File,
                language: Language::Unknown,
                file_path: file_path.clone(),
                location: SourceLocation::lines(1, 1),
                parent_id: None,
                code: None,
                metadata: ComponentMetadata::default(),
                capability: capability.clone(),
            }];
            let mut relationships = Vec::new();
            for (ordinal, (name, language)) in names.iter().enumerate() {
                let id = external_module_id(scheme, name);
                let mut metadata = ComponentMetadata::default();
                metadata
                    .extras
                    .insert("is_external".to_string(), serde_json::Value::Bool(true));
                components.push(Component {
                    id: id.clone(),
                    name: name.clone(),
                    kind: ComponentKind::Module,
                    language: *language,
                    file_path: file_path.clone(),
                    location: SourceLocation::lines(1, 1),
                    parent_id: Some(file_id.clone()),
                    code: None,
                    metadata,
                    capability: capability.clone(),
                });
                relationships.push(Relationship {
                    id: felix_core::hash::relationship_id(
                        &file_id,
                        &id,
                        RelationshipKind::Contains,
                        None,
                        ordinal as u32,
                    ),
                    source_id: file_id.clone(),
                    target_id: id,
                    kind: RelationshipKind::Contains,
                    location: None,
                    metadata: RelationshipMetadata::default(),
                });
            }

            let digest: String = names
                .iter()
                .map(|(n, l)| format!("{n}:{l};"))
                .collect();
            store.upsert_file(
                &file_path,
                &content_hash(digest.as_bytes()),
                &components,
                &relationships,
            )?;
        }
        Ok(())
    }
}

/// Edge kinds resolved against module indexes rather than symbols.
fn is_module_edge(kind: RelationshipKind) -> bool {
    matches!(
        kind,
        RelationshipKind::Imports
            | RelationshipKind::ReExports
            | RelationshipKind::Includes
            | RelationshipKind::DependsOn
    )
}

/// Which component kinds an edge kind may legitimately target.
fn kind_class_accepts(edge_kind: RelationshipKind, component: &Component) -> bool {
    match edge_kind {
        RelationshipKind::Calls => component.kind.is_callable() || component.kind.is_type_like(),
        RelationshipKind::Instantiates
        | RelationshipKind::Extends
        | RelationshipKind::Implements => component.kind.is_type_like(),
        _ => true,
    }
}

fn file_component_at(store: &dyn GraphStore, path: &str) -> Option<Component> {
    store
        .components_in_file(path)
        .into_iter()
        .find(|c| c.is_file())
}

/// Equal-rank tie-breaks: prefer qualified-name match, then same language,
/// then lowest file path lexicographically. (A single store is a single
/// repository, so the same-repository tie-break collapses.)
fn rank_candidates(
    mut candidates: Vec<Component>,
    language: Language,
    qualified: Option<&str>,
) -> Option<Component> {
    candidates.sort_by(|a, b| {
        let a_qual = qualified.is_some_and(|q| a.name == q);
        let b_qual = qualified.is_some_and(|q| b.name == q);
        b_qual
            .cmp(&a_qual)
            .then_with(|| (b.language == language).cmp(&(a.language == language)))
            .then_with(|| a.file_path.cmp(&b.file_path))
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates.into_iter().next()
}

fn is_relative_specifier(spec: &str, language: Language) -> bool {
    if spec.starts_with("./") || spec.starts_with("../") {
        return true;
    }
    language == Language::Python && spec.starts_with('.')
}

fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(pos) => path[..pos].to_string(),
        None => String::new(),
    }
}

/// Join and normalize `dir` + relative specifier, collapsing `.` and `..`.
fn join_normalize(dir: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Candidate file paths for a relative specifier: as written, with
/// configured extensions, then index/package entry points.
fn relative_candidates(dir: &str, spec: &str, language: Language) -> Vec<String> {
    // Python relative imports count leading dots as levels.
    if language == Language::Python && spec.starts_with('.') && !spec.starts_with("./") {
        let dots = spec.chars().take_while(|c| *c == '.').count();
        let rest = spec[dots..].replace('.', "/");
        let mut up = String::new();
        for _ in 1..dots {
            up.push_str("../");
        }
        let joined = join_normalize(dir, &format!("{up}{rest}"));
        return path_candidates(&joined, language);
    }
    let joined = join_normalize(dir, spec);
    path_candidates(&joined, language)
}

fn path_candidates(base: &str, language: Language) -> Vec<String> {
    let (extensions, indexes): (&[&str], &[&str]) = match language {
        Language::TypeScript | Language::Tsx | Language::JavaScript => (
            &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs"],
            &["index.ts", "index.tsx", "index.js"],
        ),
        Language::Python => (&[".py", ".pyi"], &["__init__.py"]),
        _ => (&[], &[]),
    };
    let mut candidates = vec![base.to_string()];
    let has_extension = base.rsplit('/').next().is_some_and(|leaf| leaf.contains('.'));
    if !has_extension {
        for ext in extensions {
            candidates.push(format!("{base}{ext}"));
        }
        for index in indexes {
            candidates.push(format!("{base}/{index}"));
        }
    }
    candidates
}

// Bare-import externalization (stdlib catalogs and unknown packages) and
// external placeholder components.

use felix_core::cancel::CancellationToken;
use felix_core::config::FelixConfig;
use felix_core::sqlite::SqliteGraphStore;
use felix_core::store::GraphStore;
use felix_core::types::{ComponentKind, EdgeDirection, RelationshipKind};
use felix_parsers::pipeline::IngestPipeline;
use felix_parsers::registry::ParserRegistry;
use felix_resolve::catalog::Catalogs;
use felix_resolve::resolver::Resolver;

fn index_and_resolve(files: &[(&str, &str)]) -> SqliteGraphStore {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);
    let mut store = SqliteGraphStore::in_memory().unwrap();
    for (path, source) in files {
        pipeline
            .index_bytes(path, source.as_bytes(), &mut store, None)
            .unwrap();
    }
    let catalogs = Catalogs::builtin();
    let resolver = Resolver::new(&catalogs, &config.aliases);
    resolver
        .resolve_all(&mut store, &CancellationToken::new())
        .unwrap();
    store
}

fn import_edges(store: &SqliteGraphStore, path: &str) -> Vec<felix_core::types::Relationship> {
    let file = store
        .components_in_file(path)
        .into_iter()
        .find(|c| c.is_file())
        .unwrap();
    store.neighbors(
        &file.id,
        EdgeDirection::Outgoing,
        Some(&[RelationshipKind::Imports]),
        None,
    )
}

#[test]
fn test_bare_npm_import_is_externalized() {
    let store = index_and_resolve(&[("src/x.ts", "import _ from 'lodash';\n")]);

    let imports = import_edges(&store, "src/x.ts");
    assert_eq!(imports.len(), 1);
    let edge = &imports[0];
    assert!(
        edge.target_id.starts_with("external:module:npm:lodash"),
        "got {}",
        edge.target_id
    );
    assert!(edge.metadata.is_external);
    assert!(!edge.metadata.needs_resolution);

    // The external placeholder is a queryable component.
    let placeholder = store
        .get_component("external:module:npm:lodash")
        .expect("external placeholder component upserted");
    assert_eq!(placeholder.kind, ComponentKind::Module);
    assert_eq!(placeholder.name, "lodash");
}

#[test]
fn test_node_builtin_uses_catalog() {
    let store = index_and_resolve(&[("src/io.ts", "import fs from 'node:fs';\n")]);
    let imports = import_edges(&store, "src/io.ts");
    assert_eq!(imports[0].target_id, "external:module:npm:node:fs");
    // Cataloged classification keeps the parser's confidence.
    assert!(imports[0].metadata.confidence >= 0.8);
}

#[test]
fn test_python_stdlib_vs_unknown_package() {
    let store = index_and_resolve(&[(
        "app/main.py",
        "import os\nimport requests\n",
    )]);
    let imports = import_edges(&store, "app/main.py");
    assert_eq!(imports.len(), 2);

    let os_edge = imports
        .iter()
        .find(|e| e.target_id.ends_with(":os"))
        .expect("os externalized");
    assert_eq!(os_edge.target_id, "external:module:pypi:os");

    let requests_edge = imports
        .iter()
        .find(|e| e.target_id.ends_with(":requests"))
        .expect("requests externalized");
    assert!(requests_edge.metadata.is_external);
    // Uncataloged guess: confidence capped.
    assert!(requests_edge.metadata.confidence <= 0.6);
}

#[test]
fn test_catalog_override_file_wins() {
    let dir = tempfile::tempdir().unwrap();
    let catalog_path = dir.path().join("ts-internal.json");
    std::fs::write(
        &catalog_path,
        r#"{"scheme": "internal", "exact": ["corp-kit"]}"#,
    )
    .unwrap();

    let registry = ParserRegistry::with_defaults();
    let mut config = FelixConfig::default();
    config.catalog_paths.insert(
        "typescript".to_string(),
        catalog_path.display().to_string(),
    );
    let pipeline = IngestPipeline::new(&registry, &config);
    let mut store = SqliteGraphStore::in_memory().unwrap();
    pipeline
        .index_bytes("src/y.ts", b"import kit from 'corp-kit';\n", &mut store, None)
        .unwrap();

    let mut catalogs = Catalogs::builtin();
    catalogs.load_overrides(&config.catalog_paths).unwrap();
    let resolver = Resolver::new(&catalogs, &config.aliases);
    resolver
        .resolve_all(&mut store, &CancellationToken::new())
        .unwrap();

    let imports = import_edges(&store, "src/y.ts");
    assert_eq!(imports[0].target_id, "external:module:internal:corp-kit");
}

#[test]
fn test_junk_specifier_is_tagged_not_dropped() {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);
    let mut store = SqliteGraphStore::in_memory().unwrap();
    // A template-literal import the extractor can only capture verbatim.
    pipeline
        .index_bytes(
            "src/dyn.ts",
            b"import weird from './gen {mode}';\n",
            &mut store,
            None,
        )
        .unwrap();

    let catalogs = Catalogs::builtin();
    let resolver = Resolver::new(&catalogs, &config.aliases);
    let report = resolver
        .resolve_all(&mut store, &CancellationToken::new())
        .unwrap();
    assert_eq!(report.junk, 1);

    let imports = import_edges(&store, "src/dyn.ts");
    assert_eq!(imports.len(), 1);
    assert!(imports[0].metadata.is_junk);
    assert!(imports[0].target_id.starts_with("RESOLVE:"), "kept queryable");
    assert!(imports[0].metadata.last_attempt_reason.is_some());
}

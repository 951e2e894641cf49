// Relative-path resolution against the in-memory index: extension probing,
// directory entry points, package-relative Python imports, and alias maps.

use felix_core::cancel::CancellationToken;
use felix_core::config::FelixConfig;
use felix_core::sqlite::SqliteGraphStore;
use felix_core::store::GraphStore;
use felix_core::types::{EdgeDirection, RelationshipKind};
use felix_parsers::pipeline::IngestPipeline;
use felix_parsers::registry::ParserRegistry;
use felix_resolve::catalog::Catalogs;
use felix_resolve::resolver::Resolver;

fn build_store(config: &FelixConfig, files: &[(&str, &str)]) -> SqliteGraphStore {
    let registry = ParserRegistry::with_defaults();
    let pipeline = IngestPipeline::new(&registry, config);
    let mut store = SqliteGraphStore::in_memory().unwrap();
    for (path, source) in files {
        pipeline
            .index_bytes(path, source.as_bytes(), &mut store, None)
            .unwrap();
    }
    store
}

fn resolve(config: &FelixConfig, store: &mut SqliteGraphStore) {
    let catalogs = Catalogs::builtin();
    let resolver = Resolver::new(&catalogs, &config.aliases);
    resolver
        .resolve_all(store, &CancellationToken::new())
        .unwrap();
}

fn file_id(store: &SqliteGraphStore, path: &str) -> String {
    store
        .components_in_file(path)
        .into_iter()
        .find(|c| c.is_file())
        .map(|c| c.id)
        .unwrap_or_else(|| panic!("no file component for {path}"))
}

fn resolved_import_target(store: &SqliteGraphStore, from: &str) -> String {
    let imports = store.neighbors(
        &file_id(store, from),
        EdgeDirection::Outgoing,
        Some(&[RelationshipKind::Imports]),
        None,
    );
    assert_eq!(imports.len(), 1, "expected a single import from {from}");
    imports[0].target_id.clone()
}

#[test]
fn test_ts_directory_index_entry_point() {
    let config = FelixConfig::default();
    let mut store = build_store(
        &config,
        &[
            ("src/widgets/index.ts", "export function widget() {}\n"),
            ("src/app.ts", "import {widget} from './widgets';\n"),
        ],
    );
    resolve(&config, &mut store);
    assert_eq!(
        resolved_import_target(&store, "src/app.ts"),
        file_id(&store, "src/widgets/index.ts")
    );
}

#[test]
fn test_ts_parent_relative_with_extension_probe() {
    let config = FelixConfig::default();
    let mut store = build_store(
        &config,
        &[
            ("src/shared/util.ts", "export function util() {}\n"),
            ("src/app/main.ts", "import {util} from '../shared/util';\n"),
        ],
    );
    resolve(&config, &mut store);
    assert_eq!(
        resolved_import_target(&store, "src/app/main.ts"),
        file_id(&store, "src/shared/util.ts")
    );
}

#[test]
fn test_python_package_relative_import() {
    let config = FelixConfig::default();
    let mut store = build_store(
        &config,
        &[
            ("pkg/helpers.py", "def assist():\n    pass\n"),
            ("pkg/sub/consumer.py", "from ..helpers import assist\n"),
        ],
    );
    resolve(&config, &mut store);
    assert_eq!(
        resolved_import_target(&store, "pkg/sub/consumer.py"),
        file_id(&store, "pkg/helpers.py")
    );
}

#[test]
fn test_alias_resolution() {
    let mut config = FelixConfig::default();
    config
        .aliases
        .insert("@app".to_string(), "src/app".to_string());
    let mut store = build_store(
        &config,
        &[
            ("src/app/store.ts", "export const store = 1;\n"),
            ("src/pages/home.ts", "import {store} from '@app/store';\n"),
        ],
    );
    resolve(&config, &mut store);
    assert_eq!(
        resolved_import_target(&store, "src/pages/home.ts"),
        file_id(&store, "src/app/store.ts")
    );
}

#[test]
fn test_unresolvable_relative_keeps_specifier_with_reason() {
    let config = FelixConfig::default();
    let mut store = build_store(
        &config,
        &[("src/app.ts", "import {gone} from './missing';\n")],
    );
    resolve(&config, &mut store);

    let imports = store.neighbors(
        &file_id(&store, "src/app.ts"),
        EdgeDirection::Outgoing,
        Some(&[RelationshipKind::Imports]),
        None,
    );
    assert_eq!(imports[0].target_id, "RESOLVE:./missing");
    assert!(imports[0].metadata.needs_resolution);
    assert!(imports[0]
        .metadata
        .last_attempt_reason
        .as_deref()
        .unwrap_or_default()
        .contains("not indexed"));
}

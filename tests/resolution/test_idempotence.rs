// Resolver idempotence: a second pass over a fixed snapshot changes
// nothing, and re-resolution after re-indexing converges to the same state.

use felix_core::cancel::CancellationToken;
use felix_core::config::FelixConfig;
use felix_core::sqlite::SqliteGraphStore;
use felix_core::store::{GraphStore, SearchCriteria};
use felix_parsers::pipeline::IngestPipeline;
use felix_parsers::registry::ParserRegistry;
use felix_resolve::catalog::Catalogs;
use felix_resolve::resolver::{ResolutionReport, Resolver};

const FILES: &[(&str, &str)] = &[
    ("src/a.ts", "export class A {}\n"),
    (
        "src/b.ts",
        "import {A} from './a';\nimport _ from 'lodash';\nimport weird from './x {y}';\nclass B extends A {}\n",
    ),
];

fn snapshot(store: &SqliteGraphStore) -> Vec<String> {
    let mut rows: Vec<String> = Vec::new();
    let page = store.search(&SearchCriteria::default()).unwrap();
    for component in page.items {
        rows.push(format!("C {} {} {}", component.id, component.name, component.file_path));
    }
    for edge in store.unresolved().unwrap() {
        rows.push(format!(
            "U {} {} {} junk={}",
            edge.id, edge.source_id, edge.target_id, edge.metadata.is_junk
        ));
    }
    let stats = store.stats().unwrap();
    rows.push(format!(
        "S {} {} {} {}",
        stats.components, stats.relationships, stats.embeddings, stats.unresolved_relationships
    ));
    rows
}

#[test]
fn test_second_pass_is_a_fixed_point() {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);
    let mut store = SqliteGraphStore::in_memory().unwrap();
    for (path, source) in FILES {
        pipeline
            .index_bytes(path, source.as_bytes(), &mut store, None)
            .unwrap();
    }

    let catalogs = Catalogs::builtin();
    let resolver = Resolver::new(&catalogs, &config.aliases);
    let cancel = CancellationToken::new();

    let first = resolver.resolve_all(&mut store, &cancel).unwrap();
    assert!(first.resolved > 0);
    assert!(first.external > 0);
    assert_eq!(first.junk, 1);
    let after_first = snapshot(&store);

    let second = resolver.resolve_all(&mut store, &cancel).unwrap();
    let after_second = snapshot(&store);

    assert_eq!(after_first, after_second, "second pass must change nothing");
    assert_eq!(second.resolved, 0, "nothing left to resolve");
    assert_eq!(second.external, 0);
    // Junk edges are skipped, not reprocessed.
    assert_eq!(
        second,
        ResolutionReport {
            attempted: 0,
            skipped: second.skipped,
            ..Default::default()
        }
    );
}

#[test]
fn test_reindex_then_resolve_converges() {
    let registry = ParserRegistry::with_defaults();
    let mut config = FelixConfig::default();
    config.enable_incremental = false;
    let pipeline = IngestPipeline::new(&registry, &config);
    let mut store = SqliteGraphStore::in_memory().unwrap();

    let catalogs = Catalogs::builtin();
    let resolver = Resolver::new(&catalogs, &config.aliases);
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        for (path, source) in FILES {
            pipeline
                .index_bytes(path, source.as_bytes(), &mut store, None)
                .unwrap();
        }
        resolver.resolve_all(&mut store, &cancel).unwrap();
    }
    let first_state = snapshot(&store);

    for (path, source) in FILES {
        pipeline
            .index_bytes(path, source.as_bytes(), &mut store, None)
            .unwrap();
    }
    resolver.resolve_all(&mut store, &cancel).unwrap();

    assert_eq!(snapshot(&store), first_state);
}

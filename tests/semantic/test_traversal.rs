// Cycle detection and traversal over a realistically-ingested graph:
// three files importing in a ring, resolved, then walked.

use felix_core::cancel::CancellationToken;
use felix_core::config::FelixConfig;
use felix_core::sqlite::SqliteGraphStore;
use felix_core::store::{GraphStore, WalkSpec};
use felix_core::types::{EdgeDirection, RelationshipKind};
use felix_parsers::pipeline::IngestPipeline;
use felix_parsers::registry::ParserRegistry;
use felix_resolve::catalog::Catalogs;
use felix_resolve::resolver::Resolver;
use felix_semantic::traversal::{topological_order, Traversal};

fn ring_store() -> SqliteGraphStore {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);
    let mut store = SqliteGraphStore::in_memory().unwrap();
    for (path, source) in [
        ("src/a.ts", "import {b} from './b';\nexport function a() {}\n"),
        ("src/b.ts", "import {c} from './c';\nexport function b() {}\n"),
        ("src/c.ts", "import {a} from './a';\nexport function c() {}\n"),
    ] {
        pipeline
            .index_bytes(path, source.as_bytes(), &mut store, None)
            .unwrap();
    }
    let catalogs = Catalogs::builtin();
    let config = FelixConfig::default();
    let resolver = Resolver::new(&catalogs, &config.aliases);
    resolver
        .resolve_all(&mut store, &CancellationToken::new())
        .unwrap();
    store
}

fn file_id(store: &SqliteGraphStore, path: &str) -> String {
    store
        .components_in_file(path)
        .into_iter()
        .find(|c| c.is_file())
        .map(|c| c.id)
        .unwrap()
}

#[test]
fn test_import_ring_reports_one_cycle() {
    let store = ring_store();
    let a = file_id(&store, "src/a.ts");

    let graph = store
        .walk(
            &a,
            &WalkSpec {
                depth: 5,
                direction: EdgeDirection::Outgoing,
                kinds: Some(vec![RelationshipKind::Imports]),
            },
            &CancellationToken::new(),
        )
        .unwrap();

    // Each node visited exactly once.
    assert_eq!(graph.nodes.len(), 3);
    // Exactly one cycle, as a back-edge path closing on the start.
    assert_eq!(graph.cycles.len(), 1);
    let cycle = &graph.cycles[0];
    assert_eq!(cycle.len(), 4);
    assert_eq!(cycle.first(), cycle.last());
    assert_eq!(cycle[0], a);
    assert!(cycle.contains(&file_id(&store, "src/b.ts")));
    assert!(cycle.contains(&file_id(&store, "src/c.ts")));
}

#[test]
fn test_walk_depth_cap() {
    let store = ring_store();
    let a = file_id(&store, "src/a.ts");

    let graph = store
        .walk(
            &a,
            &WalkSpec {
                depth: 1,
                direction: EdgeDirection::Outgoing,
                kinds: Some(vec![RelationshipKind::Imports]),
            },
            &CancellationToken::new(),
        )
        .unwrap();
    assert_eq!(graph.nodes.len(), 2, "depth 1 reaches only b");
    assert!(graph.cycles.is_empty());
}

#[test]
fn test_dependencies_and_dependents_agree() {
    let store = ring_store();
    let traversal = Traversal::new(&store);
    let cancel = CancellationToken::new();
    let a = file_id(&store, "src/a.ts");
    let b = file_id(&store, "src/b.ts");

    let (deps_of_a, order) = traversal.get_dependencies(&a, 1, &cancel).unwrap();
    assert!(deps_of_a.nodes.contains_key(&b));
    assert_eq!(order.len(), deps_of_a.nodes.len());

    let (dependents_of_b, _) = traversal.get_dependents(&b, 1, &cancel).unwrap();
    assert!(dependents_of_b.nodes.contains_key(&a));
}

#[test]
fn test_topological_order_on_acyclic_chain() {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);
    let mut store = SqliteGraphStore::in_memory().unwrap();
    for (path, source) in [
        ("src/leaf.ts", "export function leaf() {}\n"),
        ("src/mid.ts", "import {leaf} from './leaf';\nexport function mid() {}\n"),
        ("src/top.ts", "import {mid} from './mid';\nexport function top() {}\n"),
    ] {
        pipeline
            .index_bytes(path, source.as_bytes(), &mut store, None)
            .unwrap();
    }
    let catalogs = Catalogs::builtin();
    let resolver = Resolver::new(&catalogs, &config.aliases);
    resolver
        .resolve_all(&mut store, &CancellationToken::new())
        .unwrap();

    let traversal = Traversal::new(&store);
    let top = file_id(&store, "src/top.ts");
    let (graph, order) = traversal
        .get_dependencies(&top, 5, &CancellationToken::new())
        .unwrap();
    assert_eq!(graph.nodes.len(), 3);
    assert_eq!(order, topological_order(&graph));

    let top_pos = order.iter().position(|id| *id == top).unwrap();
    let leaf_pos = order
        .iter()
        .position(|id| *id == file_id(&store, "src/leaf.ts"))
        .unwrap();
    assert!(top_pos < leaf_pos, "importer sorts before its dependency");
}

#[test]
fn test_callers_and_callees() {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);
    let mut store = SqliteGraphStore::in_memory().unwrap();
    pipeline
        .index_bytes(
            "src/chain.ts",
            b"function low() {}\nfunction mid() { low(); }\nfunction high() { mid(); }\n",
            &mut store,
            None,
        )
        .unwrap();
    let catalogs = Catalogs::builtin();
    let resolver = Resolver::new(&catalogs, &config.aliases);
    resolver
        .resolve_all(&mut store, &CancellationToken::new())
        .unwrap();

    let find = |name: &str| {
        store
            .components_in_file("src/chain.ts")
            .into_iter()
            .find(|c| c.name == name)
            .unwrap()
    };
    let traversal = Traversal::new(&store);
    let cancel = CancellationToken::new();

    let callees = traversal.get_callees(&find("high").id, 5, &cancel).unwrap();
    assert!(callees.nodes.contains_key(&find("mid").id));
    assert!(callees.nodes.contains_key(&find("low").id));

    let callers = traversal.get_callers(&find("low").id, 5, &cancel).unwrap();
    assert!(callers.nodes.contains_key(&find("mid").id));
    assert!(callers.nodes.contains_key(&find("high").id));
}

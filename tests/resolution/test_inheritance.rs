// Cross-file inheritance resolution: `class B extends A` over an import
// resolves to the concrete component, and the inheritance chain reads back
// through the graph.

use felix_core::cancel::CancellationToken;
use felix_core::config::FelixConfig;
use felix_core::sqlite::SqliteGraphStore;
use felix_core::store::GraphStore;
use felix_core::types::{ComponentKind, EdgeDirection, RelationshipKind};
use felix_parsers::pipeline::IngestPipeline;
use felix_parsers::registry::ParserRegistry;
use felix_resolve::catalog::Catalogs;
use felix_resolve::resolver::Resolver;
use felix_semantic::traversal::Traversal;

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

#[test]
fn test_ts_extends_across_files() {
    let store = index_and_resolve(&[
        ("src/a.ts", "export class A {}\n"),
        ("src/b.ts", "import {A} from './a';\nclass B extends A {}\n"),
    ]);

    let a = store
        .components_in_file("src/a.ts")
        .into_iter()
        .find(|c| c.name == "A" && c.kind == ComponentKind::Class)
        .expect("class A indexed");
    let b = store
        .components_in_file("src/b.ts")
        .into_iter()
        .find(|c| c.name == "B")
        .expect("class B indexed");

    // The import edge resolves to a.ts's file component.
    let file_b = store
        .components_in_file("src/b.ts")
        .into_iter()
        .find(|c| c.is_file())
        .unwrap();
    let imports = store.neighbors(
        &file_b.id,
        EdgeDirection::Outgoing,
        Some(&[RelationshipKind::Imports]),
        None,
    );
    assert_eq!(imports.len(), 1);
    let file_a = store
        .components_in_file("src/a.ts")
        .into_iter()
        .find(|c| c.is_file())
        .unwrap();
    assert_eq!(imports[0].target_id, file_a.id);
    assert!(!imports[0].metadata.needs_resolution);

    // neighbors(B, out, extends) yields exactly one edge to A.
    let extends = store.neighbors(
        &b.id,
        EdgeDirection::Outgoing,
        Some(&[RelationshipKind::Extends]),
        None,
    );
    assert_eq!(extends.len(), 1);
    assert_eq!(extends[0].target_id, a.id);
    assert!(!extends[0].metadata.needs_resolution);

    // getInheritanceChain(B) = [B, A].
    let traversal = Traversal::new(&store);
    let chain = traversal
        .get_inheritance_chain(&b.id, &CancellationToken::new())
        .unwrap();
    let names: Vec<&str> = chain.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["B", "A"]);
}

#[test]
fn test_python_inheritance_same_file_scope_wins() {
    let store = index_and_resolve(&[
        (
            "pkg/models.py",
            "class Base:\n    pass\n\nclass Child(Base):\n    pass\n",
        ),
        // A decoy Base in another file must lose to the same-module one.
        ("pkg/other.py", "class Base:\n    pass\n"),
    ]);

    let child = store
        .components_in_file("pkg/models.py")
        .into_iter()
        .find(|c| c.name == "Child")
        .unwrap();
    let local_base = store
        .components_in_file("pkg/models.py")
        .into_iter()
        .find(|c| c.name == "Base")
        .unwrap();

    let extends = store.neighbors(
        &child.id,
        EdgeDirection::Outgoing,
        Some(&[RelationshipKind::Extends]),
        None,
    );
    assert_eq!(extends.len(), 1);
    assert_eq!(extends[0].target_id, local_base.id, "same-module scope wins");
}

#[test]
fn test_call_edges_resolve_to_functions() {
    let store = index_and_resolve(&[(
        "src/calls.ts",
        "function helper(x: number): number { return x; }\nfunction main() { return helper(1); }\n",
    )]);

    let helper = store
        .components_in_file("src/calls.ts")
        .into_iter()
        .find(|c| c.name == "helper")
        .unwrap();
    let main = store
        .components_in_file("src/calls.ts")
        .into_iter()
        .find(|c| c.name == "main")
        .unwrap();

    let calls = store.neighbors(
        &main.id,
        EdgeDirection::Outgoing,
        Some(&[RelationshipKind::Calls]),
        None,
    );
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target_id, helper.id);
    assert!(calls[0].metadata.confidence >= 0.9);
}

// Inverse-edge bijection: outgoing edges of A and incoming edges of B agree
// on the same underlying record; inverse kinds are a read-side view, never
// stored twice.

use felix_core::cancel::CancellationToken;
use felix_core::config::FelixConfig;
use felix_core::sqlite::SqliteGraphStore;
use felix_core::store::GraphStore;
use felix_core::types::{EdgeDirection, RelationshipKind};
use felix_parsers::pipeline::IngestPipeline;
use felix_parsers::registry::ParserRegistry;
use felix_resolve::catalog::Catalogs;
use felix_resolve::resolver::Resolver;

fn store_with_call() -> SqliteGraphStore {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);
    let mut store = SqliteGraphStore::in_memory().unwrap();
    pipeline
        .index_bytes(
            "src/pair.ts",
            b"function callee() {}\nfunction caller() { callee(); }\n",
            &mut store,
            None,
        )
        .unwrap();
    let catalogs = Catalogs::builtin();
    let resolver = Resolver::new(&catalogs, &config.aliases);
    resolver
        .resolve_all(&mut store, &CancellationToken::new())
        .unwrap();
    store
}

#[test]
fn test_calls_and_called_by_share_one_record() {
    let store = store_with_call();
    let find = |name: &str| {
        store
            .components_in_file("src/pair.ts")
            .into_iter()
            .find(|c| c.name == name)
            .unwrap()
    };
    let caller = find("caller");
    let callee = find("callee");

    let outgoing = store.neighbors(
        &caller.id,
        EdgeDirection::Outgoing,
        Some(&[RelationshipKind::Calls]),
        None,
    );
    let incoming = store.neighbors(
        &callee.id,
        EdgeDirection::Incoming,
        Some(&[RelationshipKind::Calls]),
        None,
    );
    // Asking from the inverse side with the inverse kind is the same query.
    let incoming_inverse = store.neighbors(
        &callee.id,
        EdgeDirection::Incoming,
        Some(&[RelationshipKind::CalledBy]),
        None,
    );

    assert_eq!(outgoing.len(), 1);
    assert_eq!(incoming.len(), 1);
    assert_eq!(outgoing[0].id, incoming[0].id, "one underlying record");
    assert_eq!(incoming_inverse.len(), 1);
    assert_eq!(incoming_inverse[0].id, outgoing[0].id);
    // The stored kind is always the canonical member of the pair.
    assert_eq!(incoming_inverse[0].kind, RelationshipKind::Calls);
}

#[test]
fn test_inverse_kinds_are_never_persisted() {
    let store = store_with_call();
    for edge in store.unresolved().unwrap() {
        assert!(!edge.kind.is_inverse_form());
    }
    let file = store
        .components_in_file("src/pair.ts")
        .into_iter()
        .find(|c| c.is_file())
        .unwrap();
    for edge in store.neighbors(&file.id, EdgeDirection::Both, None, None) {
        assert!(
            !edge.kind.is_inverse_form(),
            "stored inverse form: {}",
            edge.kind
        );
    }
}

#[test]
fn test_inverse_pairing_is_total_for_stored_kinds() {
    // Every canonical kind the parsers emit pairs with a synthesized
    // inverse, so read-side synthesis can always answer.
    for kind in [
        RelationshipKind::Calls,
        RelationshipKind::Imports,
        RelationshipKind::Exports,
        RelationshipKind::Extends,
        RelationshipKind::Implements,
        RelationshipKind::Contains,
        RelationshipKind::Instantiates,
    ] {
        let inverse = kind.inverse().expect("parser-emitted kind must pair");
        assert_eq!(inverse.inverse(), Some(kind));
    }
}

// End-to-end semantic search: ingest real sources, embed, query, and check
// determinism and filter behavior at the library surface.

use felix_core::cancel::CancellationToken;
use felix_core::config::FelixConfig;
use felix_core::sqlite::SqliteGraphStore;
use felix_core::types::{ComponentKind, Language};
use felix_parsers::pipeline::IngestPipeline;
use felix_parsers::registry::ParserRegistry;
use felix_semantic::discovery::{discover, expand_query, default_synonyms};
use felix_semantic::embedding::{embed_components, HashEmbedder};
use felix_semantic::search::{SearchFilters, SearchRequest, SemanticSearch};

const FILES: &[(&str, &str)] = &[
    (
        "src/auth/session.ts",
        "// Session lifecycle for authenticated users.\nexport class SessionManager {\n    login(user: string, password: string): boolean { return validate(user, password); }\n    logout(user: string): void {}\n}\nfunction validate(user: string, password: string): boolean { return true; }\n",
    ),
    (
        "src/render/canvas.ts",
        "// Pixel drawing primitives.\nexport function drawCircle(x: number, y: number, r: number): void {}\nexport function drawSquare(x: number, y: number, w: number): void {}\n",
    ),
    (
        "coverage/report.py",
        "def login_coverage_summary():\n    \"\"\"Coverage table for login flows.\"\"\"\n    pass\n",
    ),
];

fn seeded() -> (SqliteGraphStore, HashEmbedder, FelixConfig) {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);
    let mut store = SqliteGraphStore::in_memory().unwrap();
    for (path, source) in FILES {
        pipeline
            .index_bytes(path, source.as_bytes(), &mut store, None)
            .unwrap();
    }
    let embedder = HashEmbedder::default();
    embed_components(&mut store, &embedder, 4, &CancellationToken::new()).unwrap();
    (store, embedder, config)
}

#[test]
fn test_search_is_deterministic_for_fixed_snapshot() {
    let (store, embedder, config) = seeded();
    let search = SemanticSearch::new(&store, &embedder, &config);
    let request = SearchRequest {
        similarity_threshold: Some(0.01),
        ..SearchRequest::components("login user password session", 10)
    };

    let first = search.search(&request).unwrap();
    let second = search.search(&request).unwrap();
    let ids = |r: &felix_semantic::search::SearchResponse| {
        r.hits.iter().map(|h| h.entity_id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
    assert!(!first.hits.is_empty());
}

#[test]
fn test_language_and_kind_filters() {
    let (store, embedder, config) = seeded();
    let search = SemanticSearch::new(&store, &embedder, &config);

    let response = search
        .search(&SearchRequest {
            similarity_threshold: Some(0.0),
            filters: SearchFilters {
                languages: vec![Language::Python],
                ..Default::default()
            },
            ..SearchRequest::components("login", 20)
        })
        .unwrap();
    assert!(!response.hits.is_empty());
    for hit in &response.hits {
        assert_eq!(hit.component.as_ref().unwrap().language, Language::Python);
    }

    let functions_only = search
        .search(&SearchRequest {
            similarity_threshold: Some(0.0),
            filters: SearchFilters {
                component_kinds: vec![ComponentKind::Method],
                ..Default::default()
            },
            ..SearchRequest::components("login", 20)
        })
        .unwrap();
    for hit in &functions_only.hits {
        assert_eq!(hit.component.as_ref().unwrap().kind, ComponentKind::Method);
    }
}

#[test]
fn test_path_exclude_filters_coverage() {
    let (store, embedder, config) = seeded();
    let search = SemanticSearch::new(&store, &embedder, &config);
    let response = search
        .search(&SearchRequest {
            similarity_threshold: Some(0.0),
            filters: SearchFilters {
                path_exclude: vec!["coverage/**".to_string()],
                ..Default::default()
            },
            ..SearchRequest::components("login coverage", 20)
        })
        .unwrap();
    for hit in &response.hits {
        assert!(!hit
            .component
            .as_ref()
            .unwrap()
            .file_path
            .starts_with("coverage/"));
    }
}

#[test]
fn test_discovery_terms_and_cross_references() {
    let (store, embedder, config) = seeded();
    let search = SemanticSearch::new(&store, &embedder, &config);
    let response = search
        .search(&SearchRequest {
            similarity_threshold: Some(0.0),
            ..SearchRequest::components("login session", 20)
        })
        .unwrap();

    let discovery = discover(&store, "login session", &response.hits);
    assert!(!discovery.related_concepts.is_empty());
    assert!(discovery
        .suggested_terms
        .iter()
        .all(|t| t.term != "login" && t.term != "session"));
}

#[test]
fn test_query_expansion_round_trip() {
    let expanded = expand_query("auth session", &default_synonyms());
    assert!(expanded.len() > 1);

    let (store, embedder, config) = seeded();
    let search = SemanticSearch::new(&store, &embedder, &config);
    for query in expanded {
        // Every expanded variant must be a valid query.
        search
            .search(&SearchRequest {
                similarity_threshold: Some(0.5),
                ..SearchRequest::components(&query, 5)
            })
            .unwrap();
    }
}

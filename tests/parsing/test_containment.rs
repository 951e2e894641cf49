// Containment invariant: every non-file component has a parent chain that
// terminates at a file component with the same file path; location ranges
// are non-empty and monotonic; capability metadata is present everywhere.

use std::collections::HashMap;

use felix_core::config::FelixConfig;
use felix_core::types::{Component, ParsingLevel};
use felix_parsers::pipeline::IngestPipeline;
use felix_parsers::registry::ParserRegistry;

fn assert_containment(path: &str, source: &str) {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);
    let (_, result) = pipeline.parse_bytes(path, source.as_bytes(), None);

    let by_id: HashMap<&str, &Component> =
        result.components.iter().map(|c| (c.id.as_str(), c)).collect();
    let file = result.file_component().expect("file component");

    for component in &result.components {
        assert!(
            component.location.is_valid(),
            "invalid location on {} in {path}",
            component.name
        );
        assert_eq!(component.file_path, path);

        if component.is_file() {
            assert!(component.parent_id.is_none());
            continue;
        }
        // Walk the parent chain to the file.
        let mut hops = 0;
        let mut current = component;
        while let Some(parent_id) = &current.parent_id {
            current = by_id
                .get(parent_id.as_str())
                .unwrap_or_else(|| panic!("dangling parent {parent_id} in {path}"));
            hops += 1;
            assert!(hops < 64, "parent cycle at {} in {path}", component.name);
        }
        assert_eq!(
            current.id, file.id,
            "chain of {} does not terminate at the file",
            component.name
        );
    }
}

#[test]
fn test_containment_typescript() {
    assert_containment(
        "src/a.ts",
        "export class Outer {\n    inner(): void {\n        const x = 1;\n    }\n}\nfunction top() {}\n",
    );
}

#[test]
fn test_containment_python() {
    assert_containment(
        "pkg/mod.py",
        "class A:\n    def method(self):\n        pass\n\ndef top():\n    pass\n",
    );
}

#[test]
fn test_containment_rust() {
    assert_containment(
        "src/lib.rs",
        "pub mod inner {\n    pub fn f() {}\n}\npub struct S;\nimpl S {\n    pub fn m(&self) {}\n}\n",
    );
}

#[test]
fn test_containment_markdown_outline() {
    assert_containment(
        "docs/guide.md",
        "# Top\n\ntext\n\n## Nested\n\nmore text\n\n## Sibling\n\nend\n",
    );
}

#[test]
/// Every component carries a capability block with the backend's tier.
fn test_capability_metadata_everywhere() {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);

    let (_, result) = pipeline.parse_bytes(
        "src/x.ts",
        b"export function f(a: string): string { return a; }",
        None,
    );
    assert_eq!(result.capability.parsing_level, ParsingLevel::Semantic);
    for component in &result.components {
        assert_eq!(component.capability.backend, "ast");
        assert!(component.capability.capabilities.symbols);
        assert!(component.capability.capabilities.ranges);
    }
    // Capability floor: semantic output carries confidence >= 0.8.
    for relationship in &result.relationships {
        assert!(relationship.metadata.confidence >= 0.8);
    }
}

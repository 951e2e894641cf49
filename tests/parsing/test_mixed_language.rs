// Mixed-language files: boundary detection and recursive expansion with
// location offsetting, scope chains, and language_boundary edges. Tiers are
// never promoted past the emitting backend's declaration.

use felix_core::config::FelixConfig;
use felix_core::types::{ComponentKind, Language, ParsingLevel, RelationshipKind};
use felix_parsers::backend::ParserBackend;
use felix_parsers::detectors::HtmlBackend;
use felix_parsers::pipeline::IngestPipeline;
use felix_parsers::registry::ParserRegistry;

const HTML_SOURCE: &str = r#"<!DOCTYPE html>
<html>
<body>
<h1>Dashboard</h1>
<script>
function refresh() {
    render();
}
</script>
</body>
</html>
"#;

#[test]
fn test_html_script_boundary_detection() {
    let backend = HtmlBackend::new();
    let boundaries = backend.detect_language_boundaries(HTML_SOURCE, "index.html");
    assert_eq!(boundaries.len(), 1);
    let script = &boundaries[0];
    assert_eq!(script.language, Language::JavaScript);
    assert_eq!(script.scope, "script");
    assert_eq!(script.start_line, 6);
    assert_eq!(script.end_line, 8);
}

#[test]
fn test_html_script_expansion() {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);
    let (_, result) = pipeline.parse_bytes("index.html", HTML_SOURCE.as_bytes(), None);

    // The embedded function lands in the host result, offset to host lines,
    // carrying the host file path and the embedding backend's tier.
    let refresh = result
        .components
        .iter()
        .find(|c| c.name == "refresh")
        .expect("embedded function spliced into host");
    assert_eq!(refresh.file_path, "index.html");
    assert_eq!(refresh.location.start_line, 6);
    assert_eq!(refresh.capability.parsing_level, ParsingLevel::Semantic);
    assert!(refresh.metadata.extras.contains_key("scope"));

    // Host component -> embedded component boundary edge.
    let boundary_edge = result
        .relationships
        .iter()
        .find(|r| r.kind == RelationshipKind::LanguageBoundary)
        .expect("language_boundary edge");
    assert_eq!(boundary_edge.target_id, refresh.id);

    // The embedded parent is the host's embedded-script outline node.
    let host = result
        .components
        .iter()
        .find(|c| c.id == boundary_edge.source_id)
        .unwrap();
    assert_eq!(host.kind, ComponentKind::EmbeddedScript);

    // The merged result never claims more than the host backend's tier.
    assert_eq!(result.capability.parsing_level, ParsingLevel::Basic);
}

#[test]
fn test_markdown_fence_expansion() {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);

    let source = "# Doc\n\n```python\ndef embedded():\n    pass\n```\n";
    let (_, result) = pipeline.parse_bytes("README.md", source.as_bytes(), None);

    let embedded = result
        .components
        .iter()
        .find(|c| c.name == "embedded")
        .expect("fenced python function extracted");
    assert_eq!(embedded.language, Language::Python);
    assert_eq!(embedded.location.start_line, 4);
    assert_eq!(result.capability.parsing_level, ParsingLevel::Basic);
}

#[test]
fn test_unfenced_markdown_stays_outline_only() {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);

    let source = "# Only\n\nheadings here\n";
    let (_, result) = pipeline.parse_bytes("README.md", source.as_bytes(), None);
    assert!(result
        .components
        .iter()
        .all(|c| c.is_file() || c.kind == ComponentKind::Heading));
}

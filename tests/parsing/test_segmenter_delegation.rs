// Segmenter activation: a file with no language-specific parser is split
// into blocks, each block re-detected with a narrowed sample and delegated
// to the per-language backend. The segmenter's own output stays
// detectors-only / basic.

use felix_core::config::FelixConfig;
use felix_core::types::{ComponentKind, Language, ParsingLevel};
use felix_parsers::pipeline::IngestPipeline;
use felix_parsers::registry::ParserRegistry;

#[test]
fn test_unknown_extension_with_embedded_python_is_delegated() {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);

    // A template-ish extension nothing claims. The file is mostly prose, so
    // whole-file content detection stays below the density floor; only the
    // narrowed per-block sample identifies the Python section.
    let prose: String = (0..40)
        .map(|i| format!("plain narrative sentence number {i} about the template\n"))
        .collect();
    let source = format!("{prose}\ndef alpha(self):\n    return self.x\n");
    let (_, result) = pipeline.parse_bytes("jobs/task.tmpl", source.as_bytes(), None);

    // Host stays a basic detectors-only result.
    assert_eq!(result.capability.parsing_level, ParsingLevel::Basic);
    assert_eq!(result.capability.backend, "detectors-only");
    assert_eq!(result.language, Language::Text);

    // Delegated blocks produced real Python components.
    let alpha = result.components.iter().find(|c| c.name == "alpha");
    assert!(
        alpha.is_some(),
        "segmented block should be delegated to the python backend"
    );
    assert_eq!(alpha.unwrap().language, Language::Python);
}

#[test]
fn test_plain_prose_gets_outline_sections_only() {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);

    let source = "just ordinary prose with no code at all\nand a second line\n\nanother paragraph entirely\n";
    let (_, result) = pipeline.parse_bytes("notes.tmpl", source.as_bytes(), None);

    assert!(result.components.iter().any(|c| c.kind == ComponentKind::DocSection));
    assert!(result
        .components
        .iter()
        .all(|c| c.capability.parsing_level == ParsingLevel::Basic));
}

#[test]
fn test_segmenter_never_preferred_over_registered_parser() {
    let registry = ParserRegistry::with_defaults();
    let config = FelixConfig::default();
    let pipeline = IngestPipeline::new(&registry, &config);

    // Same Python content, but with the extension mapped to a semantic
    // backend: the registered parser must win.
    let source = "def alpha(self):\n    return self.x\n";
    let (_, result) = pipeline.parse_bytes("task.py", source.as_bytes(), None);
    assert_eq!(result.capability.parsing_level, ParsingLevel::Semantic);
    assert_eq!(result.capability.backend, "ast");
}

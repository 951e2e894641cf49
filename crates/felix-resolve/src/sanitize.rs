//! Specifier sanitization: strip the trailing noise real-world import
//! strings accumulate before resolution sees them.

/// Clean a raw specifier. Returns `None` when nothing usable remains.
pub fn sanitize_specifier(raw: &str) -> Option<String> {
    let mut spec = raw.trim();

    // Inline comments trailing the specifier.
    for marker in [" #", " //", "\t#", "\t//"] {
        if let Some(pos) = spec.find(marker) {
            spec = &spec[..pos];
        }
    }

    let mut spec = spec
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim_matches('`')
        .to_string();

    if let Some(stripped) = spec.strip_prefix("file:") {
        spec = stripped.to_string();
    }

    // Windows separators and escaped slashes normalize to `/`.
    spec = spec.replace("\\\\", "/").replace('\\', "/");

    // Query strings and fragments on bundler-style specifiers.
    if let Some(pos) = spec.find(['?', '#']) {
        spec.truncate(pos);
    }

    let spec = spec.trim().trim_end_matches([',', ';']).trim().to_string();
    if spec.is_empty() {
        return None;
    }
    Some(spec)
}

/// Specifiers that survive sanitization but cannot name anything.
pub fn is_junk_specifier(spec: &str) -> bool {
    spec.chars()
        .any(|c| c.is_whitespace() || matches!(c, '{' | '}' | '(' | ')' | '<' | '>' | '|' | '*' if spec.len() > 1 && !spec.ends_with("::*")))
        || spec.chars().all(|c| !c.is_alphanumeric())
}

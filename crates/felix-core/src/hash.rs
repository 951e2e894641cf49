use xxhash_rust::xxh64::xxh64;

use crate::types::{ComponentKind, RelationshipKind, SourceLocation};

const BASE62_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Encode a u64 value as a base62 string (11 chars, zero-padded).
fn base62_encode(mut value: u64) -> String {
    if value == 0 {
        return "0".repeat(11);
    }
    let mut result = Vec::with_capacity(11);
    while value > 0 {
        let idx = (value % 62) as usize;
        result.push(BASE62_CHARS[idx]);
        value /= 62;
    }
    // Pad to 11 chars
    while result.len() < 11 {
        result.push(b'0');
    }
    result.reverse();
    String::from_utf8(result).expect("base62 chars are valid UTF-8")
}

fn hash_parts(parts: &[&str]) -> String {
    let total: usize = parts.iter().map(|p| p.len()).sum();
    let mut input = String::with_capacity(total + parts.len());
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            input.push('\0'); // separator
        }
        input.push_str(part);
    }
    base62_encode(xxh64(input.as_bytes(), 0))
}

/// Compute the stable id of a component.
///
/// id = base62(xxhash64(file_path + canonical_name + kind))
///
/// Ids survive re-indexing as long as `(path, name, kind)` is unchanged; a
/// rename produces a new id (delete + insert, never a silent mutation).
pub fn component_id(file_path: &str, canonical_name: &str, kind: ComponentKind) -> String {
    hash_parts(&[file_path, canonical_name, kind.as_str()])
}

/// Collision-breaking variant: same inputs plus the start line, for files
/// that define the same `(name, kind)` more than once.
pub fn component_id_at(
    file_path: &str,
    canonical_name: &str,
    kind: ComponentKind,
    start_line: u32,
) -> String {
    hash_parts(&[
        file_path,
        canonical_name,
        kind.as_str(),
        &start_line.to_string(),
    ])
}

/// Compute the stable id of a relationship from its endpoints, kind, and
/// location (or an ordinal when the edge has no source range).
pub fn relationship_id(
    source_id: &str,
    target_id: &str,
    kind: RelationshipKind,
    location: Option<&SourceLocation>,
    ordinal: u32,
) -> String {
    let disambiguator = match location {
        Some(loc) => format!("{}:{}", loc.start_line, loc.start_column),
        None => format!("#{ordinal}"),
    };
    hash_parts(&[source_id, target_id, kind.as_str(), &disambiguator])
}

/// Hex digest of raw content, used for incremental skip and embedding
/// refresh keys.
pub fn content_hash(content: &[u8]) -> String {
    format!("{:016x}", xxh64(content, 0))
}

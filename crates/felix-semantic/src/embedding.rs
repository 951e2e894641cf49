//! Vector embeddings and similarity math.
//!
//! Vectors are opaque fixed-length `f32` rows per model version; similarity
//! accumulates in `f64`. Cosine clamps to `[-1, 1]` to absorb float drift,
//! zero-norm vectors compare as 0 rather than NaN, and shape mismatches are
//! input errors, never panics.

use xxhash_rust::xxh64::xxh64;

use felix_core::cancel::CancellationToken;
use felix_core::hash::content_hash;
use felix_core::store::{EmbeddingRow, GraphStore, SearchCriteria};
use felix_core::types::{Component, EntityKind, StoreError};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EmbeddingError {
    /// Length mismatch or empty input.
    #[error("vector shape: {left} vs {right}")]
    VectorShape { left: usize, right: usize },

    #[error("embedding provider failure: {0}")]
    Provider(String),
}

fn check_shapes(a: &[f32], b: &[f32]) -> Result<(), EmbeddingError> {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return Err(EmbeddingError::VectorShape {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}

/// Cosine similarity, clamped to `[-1, 1]`. Zero-norm input yields 0.
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f64, EmbeddingError> {
    check_shapes(a, b)?;
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += *x as f64 * *y as f64;
        norm_a += *x as f64 * *x as f64;
        norm_b += *y as f64 * *y as f64;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

/// Euclidean distance.
pub fn euclidean(a: &[f32], b: &[f32]) -> Result<f64, EmbeddingError> {
    check_shapes(a, b)?;
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum();
    Ok(sum.sqrt())
}

/// L2 normalization. The zero vector is returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f64 = v.iter().map(|x| *x as f64 * *x as f64).sum::<f64>().sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| (*x as f64 / norm) as f32).collect()
}

/// The embedding backend port. The core tolerates any implementation that
/// produces a fixed-length vector per text; inference results are cached by
/// content hash, so repeat calls for unchanged content never happen.
pub trait EmbeddingProvider: Send + Sync {
    fn dims(&self) -> usize;
    fn model_version(&self) -> &str;
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Deterministic offline provider: token feature hashing into a fixed-width
/// signed vector, L2-normalized. No inference backend required; useful as
/// the bundled default and for tests.
pub struct HashEmbedder {
    dims: usize,
    version: String,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        HashEmbedder {
            version: format!("felix-hash-{dims}-v1"),
            dims,
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn dims(&self) -> usize {
        self.dims
    }

    fn model_version(&self) -> &str {
        &self.version
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.dims == 0 {
            return Err(EmbeddingError::Provider("zero-dimension embedder".into()));
        }
        let mut vector = vec![0.0f32; self.dims];
        let tokens: Vec<String> = tokenize(text);
        for window in tokens.windows(1) {
            bump(&mut vector, &window[0]);
        }
        // Bigrams give the bag a little word-order signal.
        for window in tokens.windows(2) {
            bump(&mut vector, &format!("{} {}", window[0], window[1]));
        }
        Ok(normalize(&vector))
    }
}

fn bump(vector: &mut [f32], token: &str) {
    let hash = xxh64(token.as_bytes(), 0);
    let index = (hash % vector.len() as u64) as usize;
    let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
    vector[index] += sign;
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            // Split camelCase at the case boundary.
            if ch.is_uppercase() && current.chars().last().is_some_and(|c| c.is_lowercase()) {
                tokens.push(std::mem::take(&mut current).to_lowercase());
            }
            current.push(ch);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current).to_lowercase());
        }
    }
    if !current.is_empty() {
        tokens.push(current.to_lowercase());
    }
    tokens
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EmbedReport {
    pub embedded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// The text a component embeds under: name, kind, documentation, code.
pub fn component_embedding_text(component: &Component) -> String {
    let mut text = format!("{} {}", component.kind, component.name);
    if let Some(doc) = &component.metadata.documentation {
        text.push(' ');
        text.push_str(doc);
    }
    if let Some(code) = &component.code {
        text.push(' ');
        text.push_str(code);
    }
    text
}

/// Compute and store embeddings for every component in the store, skipping
/// rows whose content hash is unchanged.
///
/// Inference fans out over rayon in chunks of `concurrency` (the inference
/// backend's cap); writes land serially. Cancellation is checked between
/// chunks; a write in flight always completes.
pub fn embed_components(
    store: &mut dyn GraphStore,
    provider: &dyn EmbeddingProvider,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<EmbedReport, StoreError> {
    use rayon::prelude::*;

    let mut report = EmbedReport::default();
    let page = store.search(&SearchCriteria::default())?;

    let mut stale: Vec<(String, String, String)> = Vec::new();
    for component in page.items {
        let text = component_embedding_text(&component);
        let hash = content_hash(text.as_bytes());
        if store
            .embedding_content_hash(&component.id, EntityKind::Component)
            .as_deref()
            == Some(hash.as_str())
        {
            report.skipped += 1;
        } else {
            stale.push((component.id, text, hash));
        }
    }

    for chunk in stale.chunks(concurrency.max(1)) {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let vectors: Vec<(String, String, Result<Vec<f32>, EmbeddingError>)> = chunk
            .par_iter()
            .map(|(id, text, hash)| (id.clone(), hash.clone(), provider.embed(text)))
            .collect();
        for (entity_id, hash, vector) in vectors {
            match vector {
                Ok(vector) => {
                    store.store_embedding(&EmbeddingRow {
                        entity_id,
                        entity_kind: EntityKind::Component,
                        vector,
                        model_version: provider.model_version().to_string(),
                        content_hash: hash,
                    })?;
                    report.embedded += 1;
                }
                Err(e) => {
                    eprintln!("[felix] embedding failed for {entity_id}: {e}");
                    report.failed += 1;
                }
            }
        }
    }
    Ok(report)
}

/// Embed one externally-owned entity (task, note, rule). The metadata store
/// owns the entity; the index store only keeps its vector.
pub fn embed_entity(
    store: &mut dyn GraphStore,
    provider: &dyn EmbeddingProvider,
    entity_id: &str,
    entity_kind: EntityKind,
    text: &str,
) -> Result<bool, StoreError> {
    let hash = content_hash(text.as_bytes());
    if store.embedding_content_hash(entity_id, entity_kind).as_deref() == Some(hash.as_str()) {
        return Ok(false);
    }
    let vector = provider
        .embed(text)
        .map_err(|e| StoreError::Integrity(e.to_string()))?;
    store.store_embedding(&EmbeddingRow {
        entity_id: entity_id.to_string(),
        entity_kind,
        vector,
        model_version: provider.model_version().to_string(),
        content_hash: hash,
    })?;
    Ok(true)
}

//! Embedding generation and vector similarity
//!
//! The default [`HashEmbedder`] hashes identifier-level features into a
//! fixed number of buckets. It carries no learned semantics, but texts that
//! share identifiers land closer together, which is all the ranker relies
//! on. A model-backed implementation only has to implement [`Embedder`].

use once_cell::sync::Lazy;
use regex::Regex;

/// Default vector length for [`HashEmbedder`]
pub const DEFAULT_DIMENSIONS: usize = 256;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*|[0-9]+").expect("word pattern"));

/// Maps text to a fixed-length vector; identical input gives identical output
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Deterministic feature-hashing embedder
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for word in WORD.find_iter(text) {
            let word = word.as_str();
            let lower = word.to_lowercase();
            let parts = split_identifier(word);
            if parts.len() > 1 {
                for part in &parts {
                    add_feature(&mut vector, part);
                }
            }
            add_feature(&mut vector, &lower);
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

fn add_feature(vector: &mut [f32], feature: &str) {
    let hash = blake3::hash(feature.as_bytes());
    let bytes = hash.as_bytes();
    let mut bucket = [0u8; 8];
    bucket.copy_from_slice(&bytes[..8]);
    let idx = (u64::from_le_bytes(bucket) % vector.len() as u64) as usize;
    let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
    vector[idx] += sign;
}

/// Split `camelCase`, `PascalCase` and `snake_case` into lowercase parts
pub fn split_identifier(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in word.chars() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Cosine similarity; 0.0 for empty, zero or mismatched vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

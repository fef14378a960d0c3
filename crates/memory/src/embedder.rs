//! Deterministic feature-hashing embedder.
//!
//! The default embedding backend. Each normalized token is hashed to a
//! bucket and a sign, the bucket counts are accumulated, and the result
//! is L2-normalized. Not a learned model: two texts score high only
//! when they share vocabulary. The [`EmbeddingBackend`] seam accepts a
//! real model client without any change to the store or the worker.

use causerie_core::embed::EmbeddingBackend;
use causerie_core::text::content_words;
use sha2::{Digest, Sha256};

/// Minimum token length fed into the hash.
const MIN_TOKEN_LEN: usize = 3;

/// A feature-hashing text embedder.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EmbeddingBackend for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in content_words(text, MIN_TOKEN_LEN) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f64 = vector.iter().map(|v| (*v as f64) * (*v as f64)).sum::<f64>().sqrt();
        if norm > 1e-10 {
            for v in &mut vector {
                *v = (*v as f64 / norm) as f32;
            }
        }

        vector
    }
}

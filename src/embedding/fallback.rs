// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Hash-based fallback embedder.
//!
//! Deterministic pseudo-embeddings for when no embedding service is
//! reachable. Similarity reflects lexical overlap (word and trigram
//! hashing), not semantics; the test suite relies on its determinism.

use async_trait::async_trait;

use crate::error::EmbedError;

use super::base::{l2_normalize, normalize_input, Embedder, EmbeddingVector};

/// Deterministic lexical-overlap embedder.
pub struct FallbackEmbedder {
    dimensions: usize,
}

impl FallbackEmbedder {
    /// Default dimensions, matching the default Ollama model so a collection
    /// created against either remains usable.
    pub const DEFAULT_DIMENSIONS: usize = 768;

    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn hash_token(token: &str) -> u64 {
        // FNV-1a, stable across runs and platforms
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        let cleaned: String = text
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c.is_whitespace() {
                    c.to_ascii_lowercase()
                } else {
                    ' '
                }
            })
            .collect();

        // word hashing carries the primary signal
        for word in cleaned.split_whitespace() {
            let hash = Self::hash_token(word);
            let idx = (hash as usize) % self.dimensions;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            let magnitude = 1.0 + ((hash >> 16) & 0xFF) as f32 / 255.0;
            embedding[idx] += sign * magnitude;
        }

        // character trigrams add fuzzy matching
        let chars: Vec<char> = cleaned.chars().collect();
        for window in chars.windows(3) {
            let trigram: String = window.iter().collect();
            let hash = Self::hash_token(&trigram);
            let idx = (hash as usize) % self.dimensions;
            let sign = if (hash >> 32) & 1 == 0 { 0.5 } else { -0.5 };
            embedding[idx] += sign;
        }

        l2_normalize(&mut embedding);
        embedding
    }
}

#[async_trait]
impl Embedder for FallbackEmbedder {
    fn name(&self) -> &str {
        "Fallback"
    }

    fn model(&self) -> &str {
        "hash-fallback"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbedError> {
        Ok(texts
            .iter()
            .map(|text| EmbeddingVector::new(self.generate(&normalize_input(text))))
            .collect())
    }

    async fn is_available(&self) -> bool {
        true
    }
}

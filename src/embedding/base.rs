// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Base trait for embedding providers.

use async_trait::async_trait;
use unicode_normalization::UnicodeNormalization;

use crate::error::EmbedError;

/// A dense embedding with its dimension count.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector {
    pub values: Vec<f32>,
    pub dimensions: usize,
}

impl EmbeddingVector {
    pub fn new(values: Vec<f32>) -> Self {
        let dimensions = values.len();
        Self { values, dimensions }
    }
}

/// Trait for embedding providers.
///
/// One model serves both doc and code chunks so a collection holds a single
/// vector dimension. Batches preserve input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Provider name ("Ollama", "OpenAI", "Fallback").
    fn name(&self) -> &str;

    /// Model name.
    fn model(&self) -> &str;

    /// Embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Embed multiple texts; output order matches input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbedError>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<EmbeddingVector, EmbedError> {
        let results = self.embed(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Failed("no embedding returned".to_string()))
    }

    /// Check whether the provider is reachable.
    async fn is_available(&self) -> bool;
}

/// Normalize embedding input: UTF-8 NFC, trailing whitespace trimmed.
pub fn normalize_input(text: &str) -> String {
    text.nfc().collect::<String>().trim_end().to_string()
}

/// Scale a vector to unit L2 norm in place. Zero vectors stay zero.
pub fn l2_normalize(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in values.iter_mut() {
            *v /= norm;
        }
    }
}

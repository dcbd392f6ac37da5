// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Embedding providers.
//!
//! One model serves doc and code chunks so the collection keeps a single
//! vector dimension. Providers are process-wide, created once at startup
//! and shared behind `Arc<dyn Embedder>`.

mod base;
mod cache;
mod fallback;
mod ollama;
mod openai;

use std::sync::Arc;

pub use base::{l2_normalize, normalize_input, Embedder, EmbeddingVector};
pub use cache::EmbeddingCache;
pub use fallback::FallbackEmbedder;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;

use crate::config::ServerConfig;
use crate::error::EmbedError;

/// Create the process-wide embedding provider from configuration.
///
/// OpenAI-style model names route to the OpenAI API when a key is present;
/// anything else goes to Ollama. When neither service is reachable the
/// deterministic hash fallback takes over with a warning, so indexing and
/// search remain exercisable offline.
pub async fn create_embedder(config: &ServerConfig) -> Result<Arc<dyn Embedder>, EmbedError> {
    let model = &config.embedding_models.doc;

    if model.starts_with("text-embedding") {
        if let Ok(provider) = OpenAiEmbedder::new(model, None) {
            if provider.is_available().await {
                return Ok(Arc::new(provider));
            }
        }
    } else {
        let provider = OllamaEmbedder::new(model, None);
        if provider.is_available().await {
            return Ok(Arc::new(provider));
        }
    }

    tracing::warn!(
        model,
        "no embedding service reachable, using deterministic hash fallback"
    );
    Ok(Arc::new(FallbackEmbedder::new(
        FallbackEmbedder::DEFAULT_DIMENSIONS,
    )))
}

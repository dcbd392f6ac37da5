// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ollama embedding provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::EmbedError;

use super::base::{l2_normalize, normalize_input, Embedder, EmbeddingVector};
use super::cache::EmbeddingCache;

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

/// Ollama embedding provider.
pub struct OllamaEmbedder {
    client: Client,
    model: String,
    base_url: String,
    dimensions: AtomicUsize,
    cache: Arc<EmbeddingCache>,
    /// Limits concurrent requests against a non-reentrant local model.
    request_semaphore: Arc<Semaphore>,
}

impl OllamaEmbedder {
    /// Default embedding dimensions (corrected on first response).
    const DEFAULT_DIMENSIONS: usize = 768;

    /// Max concurrent requests to Ollama.
    const MAX_CONCURRENT_REQUESTS: usize = 5;

    pub fn new(model: &str, base_url: Option<&str>) -> Self {
        let base_url = base_url
            .unwrap_or("http://localhost:11434")
            .trim_end_matches('/');

        // Known dimensions for common models
        let dimensions = match model {
            "nomic-embed-text" => 768,
            "mxbai-embed-large" => 1024,
            "all-minilm" => 384,
            "snowflake-arctic-embed" => 1024,
            _ => Self::DEFAULT_DIMENSIONS,
        };

        Self {
            client: Client::new(),
            model: model.to_string(),
            base_url: base_url.to_string(),
            dimensions: AtomicUsize::new(dimensions),
            cache: Arc::new(EmbeddingCache::new()),
            request_semaphore: Arc::new(Semaphore::new(Self::MAX_CONCURRENT_REQUESTS)),
        }
    }

    async fn request_embedding(&self, text: &str) -> Result<EmbeddingVector, EmbedError> {
        let _permit = self
            .request_semaphore
            .acquire()
            .await
            .map_err(|e| EmbedError::Failed(format!("failed to acquire request permit: {}", e)))?;

        let request = EmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbedError::Failed(format!("Ollama API request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EmbedError::Failed(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(EmbedError::Failed(format!(
                "Ollama API error ({}): {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| EmbedError::Failed(format!("failed to parse embedding response: {}", e)))?;

        let actual = parsed.embedding.len();
        let stored = self.dimensions.load(Ordering::SeqCst);
        if actual != stored && actual > 0 {
            self.dimensions.store(actual, Ordering::SeqCst);
        }

        let mut values = parsed.embedding;
        l2_normalize(&mut values);
        Ok(EmbeddingVector::new(values))
    }

    /// One retry on failure, then surface.
    async fn embed_with_retry(&self, text: &str) -> Result<EmbeddingVector, EmbedError> {
        match self.request_embedding(text).await {
            Ok(vector) => Ok(vector),
            Err(first) => {
                tracing::warn!(error = %first, "embedding request failed, retrying once");
                self.request_embedding(text).await
            }
        }
    }

    async fn check_model_available(&self) -> bool {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                if let Ok(body) = resp.text().await {
                    if let Ok(tags) = serde_json::from_str::<TagsResponse>(&body) {
                        return tags.models.iter().any(|m| {
                            // model names may carry a :latest suffix
                            m.name == self.model || m.name.starts_with(&format!("{}:", self.model))
                        });
                    }
                }
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn name(&self) -> &str {
        "Ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions.load(Ordering::SeqCst)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<Option<EmbeddingVector>> = vec![None; texts.len()];
        let mut uncached: Vec<(usize, String)> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let normalized = normalize_input(text);
            let cache_key = EmbeddingCache::make_key(self.name(), &self.model, &normalized);
            if let Some(cached) = self.cache.get(&cache_key) {
                results[i] = Some(cached);
            } else {
                uncached.push((i, normalized));
            }
        }

        for (idx, text) in uncached {
            let vector = self.embed_with_retry(&text).await?;
            let cache_key = EmbeddingCache::make_key(self.name(), &self.model, &text);
            self.cache.put(cache_key, vector.clone());
            results[idx] = Some(vector);
        }

        Ok(results
            .into_iter()
            .map(|opt| opt.unwrap_or_else(|| EmbeddingVector::new(vec![0.0; self.dimensions()])))
            .collect())
    }

    async fn is_available(&self) -> bool {
        self.check_model_available().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_model_dimensions() {
        assert_eq!(OllamaEmbedder::new("nomic-embed-text", None).dimensions(), 768);
        assert_eq!(OllamaEmbedder::new("mxbai-embed-large", None).dimensions(), 1024);
        assert_eq!(OllamaEmbedder::new("all-minilm", None).dimensions(), 384);
    }

    #[test]
    fn test_unknown_model_default_dimensions() {
        let unknown = OllamaEmbedder::new("mystery-model", None);
        assert_eq!(unknown.dimensions(), OllamaEmbedder::DEFAULT_DIMENSIONS);
    }

    #[test]
    fn test_custom_base_url_trailing_slash() {
        let provider = OllamaEmbedder::new("test", Some("http://custom:8080/"));
        assert_eq!(provider.base_url, "http://custom:8080");
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OpenAI embedding provider.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::EmbedError;

use super::base::{l2_normalize, normalize_input, Embedder, EmbeddingVector};
use super::cache::EmbeddingCache;

const API_URL: &str = "https://api.openai.com/v1/embeddings";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI embedding provider.
pub struct OpenAiEmbedder {
    client: Client,
    model: String,
    api_key: String,
    dimensions: usize,
    cache: Arc<EmbeddingCache>,
}

impl OpenAiEmbedder {
    /// Create a provider; the key falls back to `OPENAI_API_KEY`.
    pub fn new(model: &str, api_key: Option<String>) -> Result<Self, EmbedError> {
        let api_key = match api_key {
            Some(key) => key,
            None => std::env::var("OPENAI_API_KEY")
                .map_err(|_| EmbedError::Unavailable("OPENAI_API_KEY not set".to_string()))?,
        };

        let dimensions = match model {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536,
        };

        Ok(Self {
            client: Client::new(),
            model: model.to_string(),
            api_key,
            dimensions,
            cache: Arc::new(EmbeddingCache::new()),
        })
    }

    async fn request_batch(&self, inputs: Vec<String>) -> Result<Vec<EmbeddingVector>, EmbedError> {
        let count = inputs.len();
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let response = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbedError::Failed(format!("OpenAI API request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EmbedError::Failed(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(EmbedError::Failed(format!(
                "OpenAI API error ({}): {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| EmbedError::Failed(format!("failed to parse embedding response: {}", e)))?;

        // the API may reorder; index restores input order
        let mut ordered: Vec<Option<EmbeddingVector>> = vec![None; count];
        for data in parsed.data {
            if data.index < ordered.len() {
                let mut values = data.embedding;
                l2_normalize(&mut values);
                ordered[data.index] = Some(EmbeddingVector::new(values));
            }
        }

        ordered
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| EmbedError::Failed("response missing embeddings".to_string()))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
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

        if !uncached.is_empty() {
            let inputs: Vec<String> = uncached.iter().map(|(_, t)| t.clone()).collect();
            let embeddings = match self.request_batch(inputs.clone()).await {
                Ok(vectors) => vectors,
                Err(first) => {
                    tracing::warn!(error = %first, "embedding batch failed, retrying once");
                    self.request_batch(inputs).await?
                }
            };

            for ((idx, text), vector) in uncached.into_iter().zip(embeddings) {
                let cache_key = EmbeddingCache::make_key(self.name(), &self.model, &text);
                self.cache.put(cache_key, vector.clone());
                results[idx] = Some(vector);
            }
        }

        Ok(results
            .into_iter()
            .map(|opt| opt.unwrap_or_else(|| EmbeddingVector::new(vec![0.0; self.dimensions])))
            .collect())
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}

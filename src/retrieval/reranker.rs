// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Cross-encoder reranking.
//!
//! The candidate pool is rescored per `(query, chunk)` pair by an external
//! cross-encoder service. Reranking is bypassable via configuration; the
//! bypass keeps the hybrid ordering.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::error::QueryError;

use super::retriever::Candidate;

/// Rescores a candidate pool against the original query.
#[async_trait]
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;

    /// Return the top `top_k` candidates in descending rerank score.
    /// An empty pool returns empty.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        top_k: usize,
    ) -> Result<Vec<Candidate>, QueryError>;
}

/// Bypass: keeps hybrid ordering, applies the cut.
pub struct NoopReranker;

#[async_trait]
impl Reranker for NoopReranker {
    fn name(&self) -> &str {
        "noop"
    }

    async fn rerank(
        &self,
        _query: &str,
        mut candidates: Vec<Candidate>,
        top_k: usize,
    ) -> Result<Vec<Candidate>, QueryError> {
        candidates.truncate(top_k);
        Ok(candidates)
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    texts: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RerankEntry {
    index: usize,
    score: f32,
}

/// Cross-encoder scoring over HTTP (a TEI-style `/rerank` endpoint).
pub struct HttpReranker {
    client: Client,
    url: String,
    model: String,
}

impl HttpReranker {
    pub fn new(url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            url: format!("{}/rerank", url.trim_end_matches('/')),
            model: model.to_string(),
        }
    }

    async fn score(&self, query: &str, texts: Vec<&str>) -> Result<Vec<RerankEntry>, QueryError> {
        let request = RerankRequest {
            model: &self.model,
            query,
            texts,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| QueryError::RerankFailed(format!("rerank request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QueryError::RerankFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(QueryError::RerankFailed(format!(
                "rerank endpoint returned {}: {}",
                status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| QueryError::RerankFailed(format!("bad rerank response: {}", e)))
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    fn name(&self) -> &str {
        "cross-encoder"
    }

    async fn rerank(
        &self,
        query: &str,
        mut candidates: Vec<Candidate>,
        top_k: usize,
    ) -> Result<Vec<Candidate>, QueryError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = candidates.iter().map(|c| c.point.content.as_str()).collect();
        let entries = self.score(query, texts).await?;

        for entry in entries {
            if let Some(candidate) = candidates.get_mut(entry.index) {
                candidate.rerank_score = Some(entry.score);
            }
        }

        candidates.sort_by(|a, b| {
            let a_score = a.rerank_score.unwrap_or(f32::MIN);
            let b_score = b.rerank_score.unwrap_or(f32::MIN);
            b_score
                .partial_cmp(&a_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.point.id.cmp(&b.point.id))
        });
        candidates.truncate(top_k);
        Ok(candidates)
    }
}

/// Build the configured reranker. Missing reranking model or
/// `rerank_top_k = 0` selects the bypass.
pub fn create_reranker(config: &ServerConfig) -> Arc<dyn Reranker> {
    if config.hybrid_retrieval.rerank_top_k == 0 {
        return Arc::new(NoopReranker);
    }
    match &config.embedding_models.reranking {
        Some(model) => {
            // the cross-encoder is served next to the local embedding runtime
            let url = std::env::var("RERANK_URL")
                .unwrap_or_else(|_| "http://localhost:8087".to_string());
            Arc::new(HttpReranker::new(&url, model))
        }
        None => Arc::new(NoopReranker),
    }
}

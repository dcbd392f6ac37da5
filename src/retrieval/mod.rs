// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The query pipeline: classify, retrieve, rerank, synthesize.
//!
//! ```text
//! query ──► classifier ──► retriever (vector + BM25, section expansion)
//!                               │
//!                               ▼
//!                           reranker ──► synthesizer ──► answer + citations
//! ```

pub mod bm25;
pub mod classifier;
pub mod reranker;
pub mod retriever;
pub mod synthesizer;

pub use bm25::Bm25Index;
pub use classifier::{classify, forced, Classification, QueryIntent, RetrievalHints};
pub use reranker::{create_reranker, HttpReranker, NoopReranker, Reranker};
pub use retriever::{Candidate, Retriever, MAX_CANDIDATE_POOL};
pub use synthesizer::{synthesize, synthesize_comparison, Answer, Citation};

use std::sync::Arc;

use crate::chunk::ContentType;
use crate::config::HybridRetrievalConfig;
use crate::error::QueryError;
use crate::store::Filter;

/// Caller-supplied restrictions for raw `search`.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub content_type: Option<ContentType>,
    pub language: Option<String>,
    pub top_k: Option<usize>,
}

impl SearchOptions {
    fn filter(&self) -> Filter {
        Filter {
            content_type: self.content_type,
            language: self.language.clone(),
            ..Default::default()
        }
    }
}

/// End-to-end query execution.
pub struct QueryPipeline {
    retriever: Retriever,
    reranker: Arc<dyn Reranker>,
    config: HybridRetrievalConfig,
}

impl QueryPipeline {
    pub fn new(
        retriever: Retriever,
        reranker: Arc<dyn Reranker>,
        config: HybridRetrievalConfig,
    ) -> Self {
        Self {
            retriever,
            reranker,
            config,
        }
    }

    /// Drop cached lexical state after the collection changed.
    pub async fn invalidate_lexical(&self) {
        self.retriever.invalidate_lexical().await;
    }

    /// `search` tool: classified retrieval returning raw scored chunks.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Candidate>, QueryError> {
        let classification = classifier::classify(query, self.config.search_top_k);
        let mut hints = classification.hints;
        if let Some(top_k) = options.top_k {
            hints.top_k = top_k.max(1);
        }

        let pool = self
            .retriever
            .retrieve(query, &hints, &options.filter())
            .await?;

        let cut = options.top_k.unwrap_or_else(|| self.result_cut());
        self.rerank_or_degrade(query, pool, cut).await
    }

    /// Result-set size; a zero `rerank_top_k` means bypass, not "nothing".
    fn result_cut(&self) -> usize {
        if self.config.rerank_top_k == 0 {
            self.config.max_results.max(1)
        } else {
            self.config.rerank_top_k
        }
    }

    /// `ask` tool: full pipeline through synthesis.
    pub async fn ask(&self, question: &str) -> Result<Answer, QueryError> {
        let classification = classifier::classify(question, self.config.search_top_k);
        self.answer(question, classification).await
    }

    /// `explain` tool: like `ask` with the intent forced to explanation.
    pub async fn explain(&self, topic: &str) -> Result<Answer, QueryError> {
        let classification = classifier::forced(QueryIntent::Explanation, self.config.search_top_k);
        self.answer(topic, classification).await
    }

    async fn answer(
        &self,
        query: &str,
        classification: Classification,
    ) -> Result<Answer, QueryError> {
        tracing::debug!(
            intent = classification.intent.as_str(),
            confidence = classification.confidence,
            "classified query"
        );

        // comparison runs one subquery per operand
        if classification.intent == QueryIntent::Comparison {
            if let Some((operand_a, operand_b)) = classification.hints.operands.clone() {
                let left = self
                    .retrieve_reranked(&operand_a, &classification.hints)
                    .await?;
                let right = self
                    .retrieve_reranked(&operand_b, &classification.hints)
                    .await?;
                return Ok(synthesizer::synthesize_comparison(
                    &operand_a, &left, &operand_b, &right,
                ));
            }
        }

        let ranked = self.retrieve_reranked(query, &classification.hints).await?;
        Ok(synthesizer::synthesize(classification.intent, &ranked))
    }

    async fn retrieve_reranked(
        &self,
        query: &str,
        hints: &RetrievalHints,
    ) -> Result<Vec<Candidate>, QueryError> {
        let pool = self
            .retriever
            .retrieve(query, hints, &Filter::any())
            .await?;
        self.rerank_or_degrade(query, pool, self.result_cut()).await
    }

    /// Rerank, or fall back to the hybrid ordering when the cross-encoder
    /// is unreachable. Retrieval results must not vanish because a scoring
    /// sidecar is down.
    async fn rerank_or_degrade(
        &self,
        query: &str,
        pool: Vec<Candidate>,
        top_k: usize,
    ) -> Result<Vec<Candidate>, QueryError> {
        if pool.is_empty() {
            return Ok(Vec::new());
        }
        match self.reranker.rerank(query, pool.clone(), top_k).await {
            Ok(ranked) => Ok(ranked),
            Err(err) => {
                tracing::warn!(error = %err, "rerank failed, keeping hybrid order");
                let mut pool = pool;
                pool.truncate(top_k);
                Ok(pool)
            }
        }
    }
}

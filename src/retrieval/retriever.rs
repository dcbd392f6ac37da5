// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Hybrid retrieval.
//!
//! Merges a dense-vector leg with a BM25 lexical leg (`s = w_vec * v +
//! w_bm25 * b`), deduplicates by id, and expands matched sections before
//! reranking. With two collections configured, cloud is queried first and
//! per-chunk provenance records which store supplied each candidate.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::HybridRetrievalConfig;
use crate::embedding::Embedder;
use crate::error::QueryError;
use crate::store::{scroll_all, Filter, Point, VectorStore};

use super::bm25::{min_max_normalize, Bm25Index};
use super::classifier::RetrievalHints;

/// Reranker input cap.
pub const MAX_CANDIDATE_POOL: usize = 100;

/// One retrieval candidate with its scoring breakdown.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub point: Point,
    /// Hybrid score used for ordering before rerank.
    pub combined: f32,
    /// Cosine similarity normalized to [0, 1]; absent for section
    /// expansions, which carry the pool median instead.
    pub vector_score: Option<f32>,
    /// Min-max normalized BM25 score.
    pub lexical_score: Option<f32>,
    /// Cross-encoder score, set by the reranker.
    pub rerank_score: Option<f32>,
    /// Which collection supplied this chunk ("cloud" or "local").
    pub provenance: String,
}

struct LexicalIndex {
    index: Bm25Index,
    /// id -> index into the store list.
    origin: HashMap<u64, usize>,
}

struct PoolEntry {
    point: Point,
    store_idx: usize,
    vector_score: Option<f32>,
    lexical_score: Option<f32>,
}

/// Hybrid retriever over one or two collections.
pub struct Retriever {
    stores: Vec<Arc<dyn VectorStore>>,
    embedder: Arc<dyn Embedder>,
    config: HybridRetrievalConfig,
    lexical: RwLock<Option<LexicalIndex>>,
}

impl Retriever {
    /// `stores` in query order: cloud first, then local.
    pub fn new(
        stores: Vec<Arc<dyn VectorStore>>,
        embedder: Arc<dyn Embedder>,
        config: HybridRetrievalConfig,
    ) -> Self {
        Self {
            stores,
            embedder,
            config,
            lexical: RwLock::new(None),
        }
    }

    /// Drop the lexical index; it rebuilds on the next query. Called after
    /// indexing mutates the collection.
    pub async fn invalidate_lexical(&self) {
        *self.lexical.write().await = None;
    }

    /// Run both legs, merge, and expand sections. Result is ordered by
    /// combined score (descending, ties by ascending id) and capped at the
    /// reranker input size.
    pub async fn retrieve(
        &self,
        query: &str,
        hints: &RetrievalHints,
        extra: &Filter,
    ) -> Result<Vec<Candidate>, QueryError> {
        let mut filter = extra.clone();
        if hints.restrict_code {
            filter.content_type = Some(crate::chunk::ContentType::Code);
        }

        let query_vector = self.embedder.embed_one(query).await?;

        let mut pool: HashMap<u64, PoolEntry> = HashMap::new();

        // dense leg, cloud before local
        for (store_idx, store) in self.stores.iter().enumerate() {
            let hits = store
                .vector_search(&query_vector.values, &filter, hints.top_k, false)
                .await?;
            for hit in hits {
                let v = ((hit.score + 1.0) / 2.0).clamp(0.0, 1.0);
                match pool.get_mut(&hit.point.id) {
                    Some(entry) => {
                        if v > entry.vector_score.unwrap_or(0.0) {
                            entry.vector_score = Some(v);
                            entry.store_idx = store_idx;
                            entry.point = hit.point;
                        }
                    }
                    None => {
                        pool.insert(
                            hit.point.id,
                            PoolEntry {
                                point: hit.point,
                                store_idx,
                                vector_score: Some(v),
                                lexical_score: None,
                            },
                        );
                    }
                }
            }
        }

        // lexical leg
        let lexical_available = self.lexical_leg(query, hints, &filter, &mut pool).await?;
        let weights = &self.config.hybrid_weights;
        let (w_vec, w_bm25) = if lexical_available {
            (weights.vector, weights.bm25)
        } else {
            // degraded mode mandated when no lexical leg exists
            (1.0, 0.0)
        };

        let combined = |entry: &PoolEntry| {
            w_vec * entry.vector_score.unwrap_or(0.0)
                + w_bm25 * entry.lexical_score.unwrap_or(0.0)
        };

        // section expansion happens before reranking
        if hints.expand_sections {
            let median = {
                let mut scores: Vec<f32> = pool.values().map(&combined).collect();
                scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                if scores.is_empty() {
                    0.5
                } else {
                    scores[scores.len() / 2]
                }
            };
            self.expand_sections(&mut pool, median).await?;
        }

        let mut candidates: Vec<Candidate> = pool
            .into_values()
            .map(|entry| {
                let combined = combined(&entry);
                Candidate {
                    provenance: self.stores[entry.store_idx].name().to_string(),
                    combined,
                    vector_score: entry.vector_score,
                    lexical_score: entry.lexical_score,
                    rerank_score: None,
                    point: entry.point,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.combined
                .partial_cmp(&a.combined)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.point.id.cmp(&b.point.id))
        });
        candidates.truncate(MAX_CANDIDATE_POOL);
        Ok(candidates)
    }

    /// Score the lexical leg into the pool. Returns whether a usable index
    /// existed; `false` puts the retriever into vector-only mode.
    async fn lexical_leg(
        &self,
        query: &str,
        hints: &RetrievalHints,
        filter: &Filter,
        pool: &mut HashMap<u64, PoolEntry>,
    ) -> Result<bool, QueryError> {
        self.ensure_lexical().await;

        let guard = self.lexical.read().await;
        let Some(lexical) = guard.as_ref() else {
            return Ok(false);
        };
        if lexical.index.is_empty() {
            return Ok(false);
        }

        let mut scores = lexical.index.scores(query);
        scores.truncate(hints.top_k);
        min_max_normalize(&mut scores);

        // fetch lexical-only hits so the pool holds full points
        let missing: Vec<u64> = scores
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| !pool.contains_key(id))
            .collect();
        let mut fetched: HashMap<u64, (Point, usize)> = HashMap::new();
        for id in &missing {
            let Some(store_idx) = lexical.origin.get(id).copied() else {
                continue;
            };
            let points = self.stores[store_idx].get_points(&[*id], false).await?;
            if let Some(point) = points.into_iter().next() {
                fetched.insert(*id, (point, store_idx));
            }
        }

        for (id, score) in scores {
            if let Some(entry) = pool.get_mut(&id) {
                entry.lexical_score = Some(score);
                continue;
            }
            let Some((point, store_idx)) = fetched.remove(&id) else {
                continue;
            };
            if !filter.matches(&point.payload, Some(false)) {
                continue;
            }
            pool.insert(
                id,
                PoolEntry {
                    point,
                    store_idx,
                    vector_score: None,
                    lexical_score: Some(score),
                },
            );
        }

        Ok(true)
    }

    /// Build the BM25 index from active chunks if not present. A failure is
    /// logged and leaves the retriever in vector-only mode.
    async fn ensure_lexical(&self) {
        {
            if self.lexical.read().await.is_some() {
                return;
            }
        }

        let mut docs: Vec<(u64, String)> = Vec::new();
        let mut origin: HashMap<u64, usize> = HashMap::new();

        for (store_idx, store) in self.stores.iter().enumerate() {
            match scroll_all(store.as_ref(), &Filter::active()).await {
                Ok(points) => {
                    for point in points {
                        origin.entry(point.id).or_insert(store_idx);
                        docs.push((point.id, point.content));
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        store = store.name(),
                        error = %err,
                        "lexical index build failed, falling back to vector-only retrieval"
                    );
                    return;
                }
            }
        }

        let index = Bm25Index::build(&docs);
        *self.lexical.write().await = Some(LexicalIndex { index, origin });
    }

    /// For every candidate with a populated section, pull in all active
    /// chunks sharing its `(file_path, section)`.
    async fn expand_sections(
        &self,
        pool: &mut HashMap<u64, PoolEntry>,
        neutral_score: f32,
    ) -> Result<(), QueryError> {
        let targets: Vec<(usize, String, String)> = pool
            .values()
            .filter_map(|entry| {
                let section = entry.point.payload.section.clone()?;
                if section.is_empty() {
                    return None;
                }
                Some((
                    entry.store_idx,
                    entry.point.payload.file_path.clone(),
                    section,
                ))
            })
            .collect();

        let mut seen: HashSet<(usize, String, String)> = HashSet::new();
        for (store_idx, path, section) in targets {
            if !seen.insert((store_idx, path.clone(), section.clone())) {
                continue;
            }
            let filter = Filter::section(path, section);
            let neighbors = scroll_all(self.stores[store_idx].as_ref(), &filter).await?;
            for point in neighbors {
                pool.entry(point.id).or_insert(PoolEntry {
                    point,
                    store_idx,
                    // a neutral stand-in; expansions have no vector score
                    vector_score: Some(neutral_score),
                    lexical_score: None,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, ChunkPayload, ContentType};
    use crate::config::HybridRetrievalConfig;
    use crate::embedding::FallbackEmbedder;
    use crate::retrieval::classifier::{classify, QueryIntent};
    use crate::store::MemoryStore;

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new("local", "test"));
        let embedder = FallbackEmbedder::new(64);
        store.ensure_collection(64).await.unwrap();

        let mut points = Vec::new();
        let entries = [
            ("docs/a.md", 3, Some("Features"), "1. Alpha\n2. Beta\n3. Gamma"),
            ("docs/a.md", 8, Some("Features"), "The features ship incrementally."),
            ("docs/b.md", 1, Some("Ports"), "The server listens on port 8080."),
        ];
        for (path, line, section, content) in entries {
            let mut payload =
                ChunkPayload::new(path, line, line + 2, ContentType::Text, "markdown");
            payload.section = section.map(|s| s.to_string());
            let chunk = Chunk::new(content.to_string(), payload);
            let vector = embedder.embed_one(content).await.unwrap();
            points.push(Point::from_chunk(chunk, vector.values));
        }
        store.upsert(points).await.unwrap();
        store
    }

    fn retriever(store: Arc<MemoryStore>) -> Retriever {
        Retriever::new(
            vec![store],
            Arc::new(FallbackEmbedder::new(64)),
            HybridRetrievalConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_retrieve_finds_lexical_overlap() {
        let store = seeded_store().await;
        let retriever = retriever(store);

        let classification = classify("which port does the server use", 20);
        let candidates = retriever
            .retrieve("which port does the server use", &classification.hints, &Filter::any())
            .await
            .unwrap();

        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].point.payload.file_path, "docs/b.md");
        assert_eq!(candidates[0].provenance, "local");
    }

    #[tokio::test]
    async fn test_section_expansion_pulls_neighbors() {
        let store = seeded_store().await;
        let retriever = retriever(store);

        let classification = classify("list all the features", 20);
        assert_eq!(classification.intent, QueryIntent::Enumeration);
        let candidates = retriever
            .retrieve("list all the features", &classification.hints, &Filter::any())
            .await
            .unwrap();

        // both Features chunks must be present after expansion
        let feature_lines: Vec<u32> = candidates
            .iter()
            .filter(|c| c.point.payload.section.as_deref() == Some("Features"))
            .map(|c| c.point.payload.line_start)
            .collect();
        assert!(feature_lines.contains(&3));
        assert!(feature_lines.contains(&8));
    }

    #[tokio::test]
    async fn test_soft_deleted_chunks_never_surface() {
        let store = seeded_store().await;
        store
            .soft_delete(&Filter::file("docs/b.md"))
            .await
            .unwrap();
        let retriever = retriever(store);

        let classification = classify("which port does the server use", 20);
        let candidates = retriever
            .retrieve("which port does the server use", &classification.hints, &Filter::any())
            .await
            .unwrap();

        assert!(candidates
            .iter()
            .all(|c| c.point.payload.file_path != "docs/b.md"));
    }

    #[tokio::test]
    async fn test_candidates_sorted_and_deduped() {
        let store = seeded_store().await;
        let retriever = retriever(store);

        let classification = classify("features", 20);
        let candidates = retriever
            .retrieve("features", &classification.hints, &Filter::any())
            .await
            .unwrap();

        let mut ids: Vec<u64> = candidates.iter().map(|c| c.point.id).collect();
        let unique_before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), unique_before, "no duplicate ids in the pool");

        for pair in candidates.windows(2) {
            assert!(pair[0].combined >= pair[1].combined);
        }
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-memory BM25 index.
//!
//! Supplies the lexical leg of hybrid retrieval. Built from the active
//! chunks of a collection; scores are min-max normalized per query by the
//! retriever before weighting.

use std::collections::HashMap;

/// BM25 k1 parameter.
const K1: f32 = 1.2;

/// BM25 b parameter.
const B: f32 = 0.75;

/// An inverted index over chunk contents.
pub struct Bm25Index {
    /// term -> [(doc index, term frequency)]
    postings: HashMap<String, Vec<(usize, f32)>>,
    doc_lens: Vec<f32>,
    ids: Vec<u64>,
    avgdl: f32,
}

/// Lowercased alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

impl Bm25Index {
    /// Build an index over `(id, content)` pairs.
    pub fn build(docs: &[(u64, String)]) -> Self {
        let mut postings: HashMap<String, Vec<(usize, f32)>> = HashMap::new();
        let mut doc_lens = Vec::with_capacity(docs.len());
        let mut ids = Vec::with_capacity(docs.len());

        for (doc_idx, (id, content)) in docs.iter().enumerate() {
            let tokens = tokenize(content);
            doc_lens.push(tokens.len() as f32);
            ids.push(*id);

            let mut frequencies: HashMap<String, f32> = HashMap::new();
            for token in tokens {
                *frequencies.entry(token).or_insert(0.0) += 1.0;
            }
            for (term, tf) in frequencies {
                postings.entry(term).or_default().push((doc_idx, tf));
            }
        }

        let avgdl = if doc_lens.is_empty() {
            0.0
        } else {
            doc_lens.iter().sum::<f32>() / doc_lens.len() as f32
        };

        Self {
            postings,
            doc_lens,
            ids,
            avgdl,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Raw BM25 scores for the query, descending, ties broken by id.
    /// Only documents with a positive score appear.
    pub fn scores(&self, query: &str) -> Vec<(u64, f32)> {
        if self.is_empty() || self.avgdl == 0.0 {
            return Vec::new();
        }

        let n = self.ids.len() as f32;
        let mut accumulator: HashMap<usize, f32> = HashMap::new();

        for term in tokenize(query) {
            let Some(posting) = self.postings.get(&term) else {
                continue;
            };
            let df = posting.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for (doc_idx, tf) in posting {
                let dl = self.doc_lens[*doc_idx];
                let score = idf * (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B + B * dl / self.avgdl));
                *accumulator.entry(*doc_idx).or_insert(0.0) += score;
            }
        }

        let mut scored: Vec<(u64, f32)> = accumulator
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .map(|(doc_idx, score)| (self.ids[doc_idx], score))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored
    }
}

/// Min-max normalize scores to [0, 1]. A single distinct value maps to 1.
pub fn min_max_normalize(scores: &mut [(u64, f32)]) {
    if scores.is_empty() {
        return;
    }
    let max = scores.iter().map(|(_, s)| *s).fold(f32::MIN, f32::max);
    let min = scores.iter().map(|(_, s)| *s).fold(f32::MAX, f32::min);
    let range = max - min;
    for (_, score) in scores.iter_mut() {
        *score = if range > 0.0 {
            (*score - min) / range
        } else {
            1.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<(u64, String)> {
        vec![
            (1, "the indexing pipeline walks files and upserts chunks".to_string()),
            (2, "soft delete hides chunks from queries".to_string()),
            (3, "the retriever merges vector and lexical candidates".to_string()),
        ]
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Hello, World! x2"),
            vec!["hello", "world", "x2"]
        );
        assert!(tokenize("...").is_empty());
    }

    #[test]
    fn test_matching_doc_ranks_first() {
        let index = Bm25Index::build(&docs());
        let scores = index.scores("soft delete");
        assert!(!scores.is_empty());
        assert_eq!(scores[0].0, 2);
    }

    #[test]
    fn test_no_match_yields_empty() {
        let index = Bm25Index::build(&docs());
        assert!(index.scores("zebra xylophone").is_empty());
    }

    #[test]
    fn test_empty_index() {
        let index = Bm25Index::build(&[]);
        assert!(index.is_empty());
        assert!(index.scores("anything").is_empty());
    }

    #[test]
    fn test_shared_terms_score_all_docs() {
        let index = Bm25Index::build(&docs());
        let scores = index.scores("chunks");
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn test_min_max_normalize() {
        let mut scores = vec![(1u64, 2.0f32), (2, 6.0), (3, 4.0)];
        min_max_normalize(&mut scores);
        assert!((scores[0].1 - 0.0).abs() < 1e-6);
        assert!((scores[1].1 - 1.0).abs() < 1e-6);
        assert!((scores[2].1 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_min_max_normalize_single_value() {
        let mut scores = vec![(1u64, 3.0f32), (2, 3.0)];
        min_max_normalize(&mut scores);
        assert!((scores[0].1 - 1.0).abs() < 1e-6);
        assert!((scores[1].1 - 1.0).abs() < 1e-6);
    }
}

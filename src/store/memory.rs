// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-memory vector store.
//!
//! Implements the full [`VectorStore`] contract against a `BTreeMap`, which
//! gives ascending-id scroll order and deterministic search tie-breaking
//! for free. Used by the test suite and offline runs.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;

use super::types::{CollectionStats, Filter, Point, ScoredPoint, ScrollPage};
use super::VectorStore;

struct Inner {
    dimensions: Option<usize>,
    points: BTreeMap<u64, Point>,
}

/// In-process [`VectorStore`] implementation.
pub struct MemoryStore {
    name: String,
    collection: String,
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            inner: RwLock::new(Inner {
                dimensions: None,
                points: BTreeMap::new(),
            }),
        }
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn ensure_collection(&self, dimensions: usize) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.dimensions {
            Some(existing) if existing != dimensions => Err(StoreError::DimensionMismatch {
                expected: existing,
                actual: dimensions,
            }),
            Some(_) => Ok(()),
            None => {
                inner.dimensions = Some(dimensions);
                Ok(())
            }
        }
    }

    async fn upsert(&self, points: Vec<Point>) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(dimensions) = inner.dimensions {
            for point in &points {
                if point.vector.len() != dimensions {
                    return Err(StoreError::DimensionMismatch {
                        expected: dimensions,
                        actual: point.vector.len(),
                    });
                }
            }
        }
        for point in points {
            inner.points.insert(point.id, point);
        }
        Ok(())
    }

    async fn delete_by_ids(&self, ids: &[u64]) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let mut removed = 0;
        for id in ids {
            if inner.points.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn soft_delete(&self, filter: &Filter) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let mut changed = 0;
        for point in inner.points.values_mut() {
            if filter.matches(&point.payload, None) && !point.payload.is_deleted {
                point.payload.is_deleted = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn soft_delete_ids(&self, ids: &[u64]) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let mut changed = 0;
        for id in ids {
            if let Some(point) = inner.points.get_mut(id) {
                if !point.payload.is_deleted {
                    point.payload.is_deleted = true;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn recover(&self, filter: &Filter) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let mut changed = 0;
        for point in inner.points.values_mut() {
            if filter.matches(&point.payload, None) && point.payload.is_deleted {
                point.payload.is_deleted = false;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn get_points(&self, ids: &[u64], with_vectors: bool) -> Result<Vec<Point>, StoreError> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.points.get(id))
            .map(|point| {
                let mut point = point.clone();
                if !with_vectors {
                    point.vector = Vec::new();
                }
                point
            })
            .collect())
    }

    async fn scroll(
        &self,
        filter: &Filter,
        cursor: Option<u64>,
        limit: usize,
    ) -> Result<ScrollPage, StoreError> {
        let inner = self.inner.read().await;
        let start = cursor.map(Bound::Included).unwrap_or(Bound::Unbounded);

        let mut points = Vec::new();
        let mut next_cursor = None;
        for (id, point) in inner.points.range((start, Bound::Unbounded)) {
            if !filter.matches(&point.payload, None) {
                continue;
            }
            if points.len() == limit {
                next_cursor = Some(*id);
                break;
            }
            let mut point = point.clone();
            point.vector = Vec::new();
            points.push(point);
        }

        Ok(ScrollPage {
            points,
            next_cursor,
        })
    }

    async fn vector_search(
        &self,
        query: &[f32],
        filter: &Filter,
        k: usize,
        with_vectors: bool,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let inner = self.inner.read().await;
        let mut scored: Vec<ScoredPoint> = inner
            .points
            .values()
            .filter(|point| filter.matches(&point.payload, Some(false)))
            .map(|point| {
                let score = Self::cosine(query, &point.vector);
                let mut point = point.clone();
                if !with_vectors {
                    point.vector = Vec::new();
                }
                ScoredPoint { point, score }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.point.id.cmp(&b.point.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn stats(&self) -> Result<CollectionStats, StoreError> {
        let inner = self.inner.read().await;
        let deleted = inner
            .points
            .values()
            .filter(|p| p.payload.is_deleted)
            .count() as u64;
        let active = inner.points.len() as u64 - deleted;
        Ok(CollectionStats { active, deleted })
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Vector store adapters.
//!
//! [`VectorStore`] is the capability set every backend implements:
//! idempotent collection setup, batched upserts keyed by deterministic ids,
//! soft delete / recover, paginated scroll, and top-k cosine search with
//! deterministic tie-breaking (ascending id).
//!
//! Two backends exist: [`QdrantStore`] over the Qdrant REST API, and
//! [`MemoryStore`], a faithful in-process implementation used by tests and
//! offline runs.

pub mod memory;
pub mod qdrant;
pub mod types;

pub use memory::MemoryStore;
pub use qdrant::QdrantStore;
pub use types::{CollectionStats, Filter, Point, ScoredPoint, ScrollPage, BATCH_LIMIT};

use async_trait::async_trait;

use crate::error::StoreError;

/// Capability set over one collection of a vector database.
///
/// All mutations are idempotent: upserts overwrite by id, soft delete and
/// recover set a payload flag in place. Retries are therefore safe.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Which logical index this store serves ("cloud" or "local").
    fn name(&self) -> &str;

    /// Collection name in the backend.
    fn collection(&self) -> &str;

    /// Idempotently create the collection and its payload indexes.
    ///
    /// Fails with [`StoreError::DimensionMismatch`] when the collection
    /// already exists with a different vector dimension.
    async fn ensure_collection(&self, dimensions: usize) -> Result<(), StoreError>;

    /// Insert or overwrite points. Splits into network batches internally;
    /// same id means overwrite.
    async fn upsert(&self, points: Vec<Point>) -> Result<(), StoreError>;

    /// Physically remove points by id. Returns how many were removed.
    async fn delete_by_ids(&self, ids: &[u64]) -> Result<u64, StoreError>;

    /// Set `is_deleted = true` on everything matching the filter, in place.
    /// Returns how many points changed state.
    async fn soft_delete(&self, filter: &Filter) -> Result<u64, StoreError>;

    /// Set `is_deleted = true` on specific ids, in place. Unknown ids are
    /// ignored. Issued in batches.
    async fn soft_delete_ids(&self, ids: &[u64]) -> Result<u64, StoreError>;

    /// Clear `is_deleted` on everything matching the filter. Returns how
    /// many points changed state.
    async fn recover(&self, filter: &Filter) -> Result<u64, StoreError>;

    /// Bulk retrieval by id. Missing ids are simply absent from the result.
    async fn get_points(&self, ids: &[u64], with_vectors: bool) -> Result<Vec<Point>, StoreError>;

    /// Paginated enumeration in ascending id order. An unconstrained
    /// `is_deleted` matches both states here (the indexer needs both).
    async fn scroll(
        &self,
        filter: &Filter,
        cursor: Option<u64>,
        limit: usize,
    ) -> Result<ScrollPage, StoreError>;

    /// Top-k by cosine similarity. An unconstrained `is_deleted` is treated
    /// as `false`; ties break by ascending id.
    async fn vector_search(
        &self,
        query: &[f32],
        filter: &Filter,
        k: usize,
        with_vectors: bool,
    ) -> Result<Vec<ScoredPoint>, StoreError>;

    /// Point counts split by deletion state.
    async fn stats(&self) -> Result<CollectionStats, StoreError>;
}

/// Scroll every matching point into memory, page by page.
pub async fn scroll_all(
    store: &dyn VectorStore,
    filter: &Filter,
) -> Result<Vec<Point>, StoreError> {
    let mut points = Vec::new();
    let mut cursor = None;
    loop {
        let page = store.scroll(filter, cursor, BATCH_LIMIT).await?;
        points.extend(page.points);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(points)
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Qdrant vector store adapter over the REST API.
//!
//! Network calls honor the configured timeout and are retried with bounded
//! exponential backoff; id-deterministic upserts make those retries safe.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};

use crate::config::QdrantEndpoint;
use crate::error::StoreError;

use super::types::{CollectionStats, Filter, Point, ScoredPoint, ScrollPage, BATCH_LIMIT};
use super::VectorStore;

/// Payload keys indexed for exact-match filtering.
const INDEXED_KEYS: &[(&str, &str)] = &[
    ("file_path", "keyword"),
    ("section", "keyword"),
    ("language", "keyword"),
    ("content_type", "keyword"),
    ("is_deleted", "bool"),
];

/// Base backoff between retry attempts.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Qdrant-backed [`VectorStore`].
pub struct QdrantStore {
    client: Client,
    name: String,
    base_url: String,
    collection: String,
    api_key: Option<String>,
    timeout: Duration,
    retry_attempts: u32,
}

impl QdrantStore {
    /// Build a store from one configured endpoint.
    pub fn new(name: impl Into<String>, endpoint: &QdrantEndpoint) -> Result<Self, StoreError> {
        let timeout = Duration::from_secs(endpoint.timeout);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            name: name.into(),
            base_url: endpoint.url.trim_end_matches('/').to_string(),
            collection: endpoint.collection.clone(),
            api_key: endpoint.api_key.clone(),
            timeout,
            retry_attempts: endpoint.retry_attempts.max(1),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issue one request with retry on transient failures.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, StoreError> {
        let mut attempt = 0;
        loop {
            match self.request_once(method.clone(), path, body).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < self.retry_attempts => {
                    let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt);
                    tracing::warn!(
                        store = %self.name,
                        path,
                        attempt = attempt + 1,
                        error = %err,
                        "retrying vector store request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn request_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, StoreError> {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout(self.timeout.as_millis() as u64)
            } else {
                StoreError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(StoreError::api(
                format!("{} {}: {}", status.as_u16(), path, truncate(&text, 300)),
                status.as_u16(),
            ));
        }

        serde_json::from_str(&text)
            .map_err(|e| StoreError::ParseError(format!("invalid JSON from {}: {}", path, e)))
    }

    fn point_to_json(point: &Point) -> Result<Value, StoreError> {
        let mut payload = serde_json::to_value(&point.payload)
            .map_err(|e| StoreError::ParseError(e.to_string()))?;
        payload["content"] = Value::String(point.content.clone());
        Ok(json!({
            "id": point.id,
            "vector": point.vector,
            "payload": payload,
        }))
    }

    fn point_from_json(record: &Value) -> Result<Point, StoreError> {
        let id = record["id"]
            .as_u64()
            .ok_or_else(|| StoreError::ParseError("point record missing id".to_string()))?;
        let payload_value = &record["payload"];
        let content = payload_value["content"].as_str().unwrap_or("").to_string();
        let payload = serde_json::from_value(payload_value.clone())
            .map_err(|e| StoreError::ParseError(format!("bad payload for {}: {}", id, e)))?;
        let vector = record["vector"]
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Point {
            id,
            vector,
            content,
            payload,
        })
    }

    fn filter_to_json(filter: &Filter, default_deleted: Option<bool>) -> Option<Value> {
        let mut must = Vec::new();
        if let Some(path) = &filter.file_path {
            must.push(json!({"key": "file_path", "match": {"value": path}}));
        }
        if let Some(section) = &filter.section {
            must.push(json!({"key": "section", "match": {"value": section}}));
        }
        if let Some(language) = &filter.language {
            must.push(json!({"key": "language", "match": {"value": language}}));
        }
        if let Some(content_type) = filter.content_type {
            must.push(json!({"key": "content_type", "match": {"value": content_type.as_str()}}));
        }
        if let Some(deleted) = filter.is_deleted.or(default_deleted) {
            must.push(json!({"key": "is_deleted", "match": {"value": deleted}}));
        }
        if must.is_empty() {
            None
        } else {
            Some(json!({ "must": must }))
        }
    }

    async fn count(&self, filter: &Filter, default_deleted: Option<bool>) -> Result<u64, StoreError> {
        let mut body = json!({ "exact": true });
        if let Some(filter_json) = Self::filter_to_json(filter, default_deleted) {
            body["filter"] = filter_json;
        }
        let response = self
            .request(
                Method::POST,
                &format!("/collections/{}/points/count", self.collection),
                Some(&body),
            )
            .await?;
        Ok(response["result"]["count"].as_u64().unwrap_or(0))
    }

    /// Set payload fields on every point matching the filter, in batches
    /// handled server-side.
    async fn set_payload(&self, payload: Value, filter_json: Value) -> Result<(), StoreError> {
        let body = json!({ "payload": payload, "filter": filter_json });
        self.request(
            Method::POST,
            &format!("/collections/{}/points/payload?wait=true", self.collection),
            Some(&body),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn ensure_collection(&self, dimensions: usize) -> Result<(), StoreError> {
        let path = format!("/collections/{}", self.collection);

        match self.request(Method::GET, &path, None).await {
            Ok(info) => {
                let existing = info["result"]["config"]["params"]["vectors"]["size"]
                    .as_u64()
                    .unwrap_or(0) as usize;
                if existing != 0 && existing != dimensions {
                    return Err(StoreError::DimensionMismatch {
                        expected: existing,
                        actual: dimensions,
                    });
                }
            }
            Err(StoreError::ApiError {
                status_code: Some(code),
                ..
            }) if code == StatusCode::NOT_FOUND.as_u16() => {
                let body = json!({
                    "vectors": { "size": dimensions, "distance": "Cosine" }
                });
                self.request(Method::PUT, &path, Some(&body)).await?;
            }
            Err(err) => return Err(err),
        }

        for (field, schema) in INDEXED_KEYS {
            let body = json!({ "field_name": field, "field_schema": schema });
            let result = self
                .request(
                    Method::PUT,
                    &format!("/collections/{}/index", self.collection),
                    Some(&body),
                )
                .await;
            // an index that already exists is fine
            if let Err(err) = result {
                match &err {
                    StoreError::ApiError {
                        status_code: Some(code),
                        ..
                    } if *code < 500 => {
                        tracing::debug!(field, error = %err, "payload index already present");
                    }
                    _ => return Err(err),
                }
            }
        }

        Ok(())
    }

    async fn upsert(&self, points: Vec<Point>) -> Result<(), StoreError> {
        for batch in points.chunks(BATCH_LIMIT) {
            let records = batch
                .iter()
                .map(Self::point_to_json)
                .collect::<Result<Vec<_>, _>>()?;
            let body = json!({ "points": records });
            self.request(
                Method::PUT,
                &format!("/collections/{}/points?wait=true", self.collection),
                Some(&body),
            )
            .await?;
        }
        Ok(())
    }

    async fn delete_by_ids(&self, ids: &[u64]) -> Result<u64, StoreError> {
        for batch in ids.chunks(BATCH_LIMIT) {
            let body = json!({ "points": batch });
            self.request(
                Method::POST,
                &format!("/collections/{}/points/delete?wait=true", self.collection),
                Some(&body),
            )
            .await?;
        }
        Ok(ids.len() as u64)
    }

    async fn soft_delete(&self, filter: &Filter) -> Result<u64, StoreError> {
        // count the points that will flip, then set the flag in place
        let mut pending = filter.clone();
        pending.is_deleted = Some(false);
        let changing = self.count(&pending, None).await?;
        if changing == 0 {
            return Ok(0);
        }

        let filter_json = Self::filter_to_json(&pending, None)
            .unwrap_or_else(|| json!({ "must": [] }));
        self.set_payload(json!({ "is_deleted": true }), filter_json)
            .await?;
        Ok(changing)
    }

    async fn soft_delete_ids(&self, ids: &[u64]) -> Result<u64, StoreError> {
        for batch in ids.chunks(BATCH_LIMIT) {
            let body = json!({
                "payload": { "is_deleted": true },
                "points": batch,
            });
            self.request(
                Method::POST,
                &format!("/collections/{}/points/payload?wait=true", self.collection),
                Some(&body),
            )
            .await?;
        }
        Ok(ids.len() as u64)
    }

    async fn recover(&self, filter: &Filter) -> Result<u64, StoreError> {
        let mut pending = filter.clone();
        pending.is_deleted = Some(true);
        let changing = self.count(&pending, None).await?;
        if changing == 0 {
            return Ok(0);
        }

        let filter_json = Self::filter_to_json(&pending, None)
            .unwrap_or_else(|| json!({ "must": [] }));
        self.set_payload(json!({ "is_deleted": false }), filter_json)
            .await?;
        Ok(changing)
    }

    async fn get_points(&self, ids: &[u64], with_vectors: bool) -> Result<Vec<Point>, StoreError> {
        let mut points = Vec::new();
        for batch in ids.chunks(BATCH_LIMIT) {
            let body = json!({
                "ids": batch,
                "with_payload": true,
                "with_vector": with_vectors,
            });
            let response = self
                .request(
                    Method::POST,
                    &format!("/collections/{}/points", self.collection),
                    Some(&body),
                )
                .await?;
            if let Some(records) = response["result"].as_array() {
                for record in records {
                    points.push(Self::point_from_json(record)?);
                }
            }
        }
        points.sort_by_key(|p| p.id);
        Ok(points)
    }

    async fn scroll(
        &self,
        filter: &Filter,
        cursor: Option<u64>,
        limit: usize,
    ) -> Result<ScrollPage, StoreError> {
        let mut body = json!({
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });
        if let Some(filter_json) = Self::filter_to_json(filter, None) {
            body["filter"] = filter_json;
        }
        if let Some(offset) = cursor {
            body["offset"] = json!(offset);
        }

        let response = self
            .request(
                Method::POST,
                &format!("/collections/{}/points/scroll", self.collection),
                Some(&body),
            )
            .await?;

        let mut points = Vec::new();
        if let Some(records) = response["result"]["points"].as_array() {
            for record in records {
                points.push(Self::point_from_json(record)?);
            }
        }
        let next_cursor = response["result"]["next_page_offset"].as_u64();

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
        let mut body = json!({
            "vector": query,
            "limit": k,
            "with_payload": true,
            "with_vector": with_vectors,
        });
        if let Some(filter_json) = Self::filter_to_json(filter, Some(false)) {
            body["filter"] = filter_json;
        }

        let response = self
            .request(
                Method::POST,
                &format!("/collections/{}/points/search", self.collection),
                Some(&body),
            )
            .await?;

        let mut hits = Vec::new();
        if let Some(records) = response["result"].as_array() {
            for record in records {
                let score = record["score"].as_f64().unwrap_or(0.0) as f32;
                let point = Self::point_from_json(record)?;
                hits.push(ScoredPoint { point, score });
            }
        }

        // deterministic tie-break regardless of backend ordering
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.point.id.cmp(&b.point.id))
        });
        Ok(hits)
    }

    async fn stats(&self) -> Result<CollectionStats, StoreError> {
        let active = self.count(&Filter::active(), None).await?;
        let deleted = self.count(&Filter::deleted(), None).await?;
        Ok(CollectionStats { active, deleted })
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        text
    } else {
        let mut end = max;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, ChunkPayload, ContentType};

    fn endpoint() -> QdrantEndpoint {
        QdrantEndpoint {
            url: "http://localhost:6333/".to_string(),
            api_key: Some("secret".to_string()),
            collection: "quarry_test".to_string(),
            timeout: 5,
            retry_attempts: 2,
        }
    }

    #[test]
    fn test_store_construction_strips_trailing_slash() {
        let store = QdrantStore::new("cloud", &endpoint()).unwrap();
        assert_eq!(store.base_url, "http://localhost:6333");
        assert_eq!(store.collection(), "quarry_test");
        assert_eq!(store.name(), "cloud");
    }

    #[test]
    fn test_point_json_roundtrip() {
        let chunk = Chunk::new(
            "1. Alpha".to_string(),
            ChunkPayload::new("docs/a.md", 3, 3, ContentType::List, "markdown"),
        );
        let point = Point::from_chunk(chunk, vec![0.5, -0.5]);

        let record = QdrantStore::point_to_json(&point).unwrap();
        assert_eq!(record["id"].as_u64(), Some(point.id));
        assert_eq!(record["payload"]["content"].as_str(), Some("1. Alpha"));
        assert_eq!(record["payload"]["file_path"].as_str(), Some("docs/a.md"));

        let parsed = QdrantStore::point_from_json(&record).unwrap();
        assert_eq!(parsed.id, point.id);
        assert_eq!(parsed.content, point.content);
        assert_eq!(parsed.payload, point.payload);
        assert_eq!(parsed.vector, point.vector);
    }

    #[test]
    fn test_filter_json_translation() {
        let filter = Filter::section("docs/a.md", "Features");
        let json = QdrantStore::filter_to_json(&filter, None).unwrap();
        let must = json["must"].as_array().unwrap();
        assert_eq!(must.len(), 3);
        assert!(must.iter().any(|c| c["key"] == "file_path"));
        assert!(must.iter().any(|c| c["key"] == "section"));
        assert!(must
            .iter()
            .any(|c| c["key"] == "is_deleted" && c["match"]["value"] == false));
    }

    #[test]
    fn test_filter_json_search_default_excludes_deleted() {
        let json = QdrantStore::filter_to_json(&Filter::any(), Some(false)).unwrap();
        let must = json["must"].as_array().unwrap();
        assert_eq!(must.len(), 1);
        assert_eq!(must[0]["key"], "is_deleted");
        assert_eq!(must[0]["match"]["value"], false);
    }

    #[test]
    fn test_filter_json_opt_in_overrides_default() {
        let json = QdrantStore::filter_to_json(&Filter::deleted(), Some(false)).unwrap();
        let must = json["must"].as_array().unwrap();
        assert_eq!(must[0]["match"]["value"], true);
    }

    #[test]
    fn test_unconstrained_filter_is_absent() {
        assert!(QdrantStore::filter_to_json(&Filter::any(), None).is_none());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        let truncated = truncate("こんにちは", 4);
        assert!(truncated.len() <= 4);
        assert!("こんにちは".starts_with(truncated));
    }
}

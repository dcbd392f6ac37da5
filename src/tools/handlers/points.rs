// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Vector CRUD tools: `add_points`, `update_points`, `delete_points`,
//! `get_points`, `query_points`.
//!
//! Batch tools follow the partial-failure policy: invalid items produce
//! per-item errors, valid items go through, and `success` is true only
//! when everything succeeded.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::chunk::{Chunk, ChunkPayload, CodeType, ContentType};
use crate::embedding::Embedder;
use crate::error::{ErrorCode, StoreError, ToolError};
use crate::manifest::{ToolExample, ToolSpec};
use crate::service::QuarryService;
use crate::store::{scroll_all, Filter, Point, VectorStore, BATCH_LIMIT};
use crate::tools::registry::{ToolHandler, ToolOutcome};
use crate::tools::{parse_arguments, ErrorDetail};

/// One point in an `add_points` / `update_points` request.
#[derive(Debug, Clone, Deserialize)]
struct PointInput {
    content: String,
    file_path: String,
    line_start: u32,
    line_end: u32,
    #[serde(default = "default_content_type")]
    content_type: String,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    class_name: Option<String>,
    #[serde(default)]
    code_type: Option<String>,
}

fn default_content_type() -> String {
    "text".to_string()
}

fn default_language() -> String {
    "text".to_string()
}

impl PointInput {
    fn into_chunk(self) -> Result<Chunk, String> {
        if self.content.trim().is_empty() {
            return Err("content must not be empty".to_string());
        }
        if self.line_start == 0 {
            return Err("line_start is 1-based".to_string());
        }
        if self.line_end < self.line_start {
            return Err("line_end must be >= line_start".to_string());
        }
        let content_type = ContentType::parse(&self.content_type)
            .ok_or_else(|| format!("unknown content_type '{}'", self.content_type))?;
        let code_type = match self.code_type.as_deref() {
            None => None,
            Some("function") => Some(CodeType::Function),
            Some("method") => Some(CodeType::Method),
            Some("class") => Some(CodeType::Class),
            Some("module") => Some(CodeType::Module),
            Some(other) => return Err(format!("unknown code_type '{}'", other)),
        };

        let mut payload = ChunkPayload::new(
            crate::chunk::normalize_path(&self.file_path),
            self.line_start,
            self.line_end,
            content_type,
            self.language,
        );
        payload.section = self.section;
        payload.name = self.name;
        payload.class_name = self.class_name;
        payload.code_type = code_type;
        Ok(Chunk::new(self.content, payload))
    }
}

/// Validate, embed and upsert a batch. `require_existing` makes the tool an
/// update: unknown ids fail per item with `POINT_NOT_FOUND`.
async fn upsert_batch(
    service: &QuarryService,
    target: Option<&str>,
    inputs: Vec<PointInput>,
    require_existing: bool,
) -> Result<ToolOutcome, ToolError> {
    if inputs.len() > BATCH_LIMIT {
        return Err(ToolError::Store(StoreError::BatchLimitExceeded {
            len: inputs.len(),
            cap: BATCH_LIMIT,
        }));
    }
    if inputs.is_empty() {
        return Err(ToolError::MissingParameter("points".to_string()));
    }

    let store = service.store_for(target)?;
    let mut errors = Vec::new();
    let mut chunks = Vec::new();

    for (index, input) in inputs.into_iter().enumerate() {
        match input.into_chunk() {
            Ok(chunk) => chunks.push((index, chunk)),
            Err(message) => errors.push(
                ErrorDetail::new(ErrorCode::ValidationError, message)
                    .with_details(json!({ "index": index })),
            ),
        }
    }

    if require_existing && !chunks.is_empty() {
        let ids: Vec<u64> = chunks.iter().map(|(_, c)| c.id).collect();
        let existing: HashSet<u64> = store
            .get_points(&ids, false)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        let (found, missing): (Vec<_>, Vec<_>) = chunks
            .into_iter()
            .partition(|(_, chunk)| existing.contains(&chunk.id));
        for (index, chunk) in missing {
            errors.push(
                ErrorDetail::new(
                    ErrorCode::PointNotFound,
                    format!("no point with id {}", chunk.id),
                )
                .with_details(json!({ "index": index, "id": chunk.id })),
            );
        }
        chunks = found;
    }

    let mut upserted_ids = Vec::new();
    if !chunks.is_empty() {
        let texts: Vec<String> = chunks.iter().map(|(_, c)| c.content.clone()).collect();
        let vectors = service.embedder().embed(&texts).await?;
        let points: Vec<Point> = chunks
            .into_iter()
            .zip(vectors)
            .map(|((_, chunk), vector)| {
                upserted_ids.push(chunk.id);
                Point::from_chunk(chunk, vector.values)
            })
            .collect();
        store.upsert(points).await?;
        service.collection_changed().await;
    }

    let count = upserted_ids.len();
    Ok(ToolOutcome::new(json!({ "ids": upserted_ids }), count).with_errors(errors))
}

/// Insert new points with deterministic ids.
#[derive(Debug, Clone, Default)]
pub struct AddPointsTool;

#[derive(Debug, Deserialize)]
struct AddPointsArgs {
    points: Vec<PointInput>,
    #[serde(default)]
    target: Option<String>,
}

#[async_trait]
impl ToolHandler for AddPointsTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "add_points".to_string(),
            brief: "Embed and insert chunks directly; ids derive from file path and \
                    start line, so repeats overwrite instead of duplicating."
                .to_string(),
            category: "vector-crud".to_string(),
            use_cases: vec![
                "Inject hand-curated chunks".to_string(),
                "Backfill content not on disk".to_string(),
            ],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "points": {
                        "type": "array",
                        "maxItems": BATCH_LIMIT,
                        "items": {
                            "type": "object",
                            "properties": {
                                "content": {"type": "string"},
                                "file_path": {"type": "string"},
                                "line_start": {"type": "integer", "minimum": 1},
                                "line_end": {"type": "integer", "minimum": 1},
                                "content_type": {"type": "string", "enum": ["text", "list", "table", "code"]},
                                "language": {"type": "string"},
                                "section": {"type": "string"},
                                "name": {"type": "string"},
                                "class_name": {"type": "string"},
                                "code_type": {"type": "string", "enum": ["function", "method", "class", "module"]}
                            },
                            "required": ["content", "file_path", "line_start", "line_end"]
                        }
                    },
                    "target": {"type": "string", "enum": ["cloud", "local"]}
                },
                "required": ["points"]
            }),
            examples: vec![ToolExample {
                description: "Add one doc chunk".to_string(),
                arguments: json!({
                    "points": [{
                        "content": "1. Alpha\n2. Beta",
                        "file_path": "docs/a.md",
                        "line_start": 3,
                        "line_end": 4,
                        "content_type": "list"
                    }]
                }),
            }],
        }
    }

    fn is_mutating(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        service: &QuarryService,
        input: Value,
    ) -> Result<ToolOutcome, ToolError> {
        let args: AddPointsArgs = parse_arguments(&input)?;
        upsert_batch(service, args.target.as_deref(), args.points, false).await
    }
}

/// Overwrite existing points; unknown ids fail per item.
#[derive(Debug, Clone, Default)]
pub struct UpdatePointsTool;

#[async_trait]
impl ToolHandler for UpdatePointsTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "update_points".to_string(),
            brief: "Re-embed and overwrite existing chunks in place; ids that do not \
                    exist are reported per item instead of being inserted."
                .to_string(),
            category: "vector-crud".to_string(),
            use_cases: vec![
                "Correct a chunk's text".to_string(),
                "Refresh embeddings after edits".to_string(),
            ],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "points": {"type": "array"},
                    "target": {"type": "string", "enum": ["cloud", "local"]}
                },
                "required": ["points"]
            }),
            examples: vec![ToolExample {
                description: "Rewrite one chunk".to_string(),
                arguments: json!({
                    "points": [{
                        "content": "1. Alpha\n2. Bravo",
                        "file_path": "docs/a.md",
                        "line_start": 3,
                        "line_end": 4,
                        "content_type": "list"
                    }]
                }),
            }],
        }
    }

    fn is_mutating(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        service: &QuarryService,
        input: Value,
    ) -> Result<ToolOutcome, ToolError> {
        let args: AddPointsArgs = parse_arguments(&input)?;
        upsert_batch(service, args.target.as_deref(), args.points, true).await
    }
}

/// Soft-delete (default) or physically delete points.
#[derive(Debug, Clone, Default)]
pub struct DeletePointsTool;

#[derive(Debug, Deserialize)]
struct DeletePointsArgs {
    #[serde(default)]
    ids: Vec<u64>,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default = "default_true")]
    soft_delete: bool,
    #[serde(default)]
    dry_run: bool,
    #[serde(default)]
    target: Option<String>,
}

fn default_true() -> bool {
    true
}

#[async_trait]
impl ToolHandler for DeletePointsTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "delete_points".to_string(),
            brief: "Soft-delete points by id or file path (recoverable), or remove \
                    them physically; dry_run previews the affected ids."
                .to_string(),
            category: "vector-crud".to_string(),
            use_cases: vec![
                "Hide stale chunks from search".to_string(),
                "Preview a deletion before applying".to_string(),
            ],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "ids": {"type": "array", "items": {"type": "integer"}},
                    "file_path": {"type": "string"},
                    "soft_delete": {"type": "boolean", "default": true},
                    "dry_run": {"type": "boolean", "default": false},
                    "target": {"type": "string", "enum": ["cloud", "local"]}
                }
            }),
            examples: vec![
                ToolExample {
                    description: "Preview by file".to_string(),
                    arguments: json!({"file_path": "docs/old.md", "dry_run": true}),
                },
                ToolExample {
                    description: "Soft-delete by ids".to_string(),
                    arguments: json!({"ids": [1234, 5678]}),
                },
            ],
        }
    }

    fn is_mutating(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        service: &QuarryService,
        input: Value,
    ) -> Result<ToolOutcome, ToolError> {
        let args: DeletePointsArgs = parse_arguments(&input)?;
        let store = service.store_for(args.target.as_deref())?;

        let mut ids = args.ids;
        if let Some(path) = &args.file_path {
            let points =
                scroll_all(store.as_ref(), &Filter::file(crate::chunk::normalize_path(path)))
                    .await?;
            ids.extend(points.iter().map(|p| p.id));
        }
        if ids.is_empty() {
            return Err(ToolError::MissingParameter("ids or file_path".to_string()));
        }
        ids.sort_unstable();
        ids.dedup();

        if args.dry_run {
            let count = ids.len();
            return Ok(ToolOutcome::new(
                json!({
                    "would_delete": ids,
                    "soft_delete": args.soft_delete,
                    "dry_run": true,
                }),
                count,
            ));
        }

        let affected = if args.soft_delete {
            store.soft_delete_ids(&ids).await?
        } else {
            store.delete_by_ids(&ids).await?
        };
        service.collection_changed().await;

        Ok(ToolOutcome::new(
            json!({
                "ids": ids,
                "affected": affected,
                "soft_delete": args.soft_delete,
            }),
            affected as usize,
        ))
    }
}

/// Bulk retrieval by id.
#[derive(Debug, Clone, Default)]
pub struct GetPointsTool;

#[derive(Debug, Deserialize)]
struct GetPointsArgs {
    ids: Vec<u64>,
    #[serde(default)]
    with_vectors: bool,
    #[serde(default)]
    target: Option<String>,
}

#[async_trait]
impl ToolHandler for GetPointsTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "get_points".to_string(),
            brief: "Fetch points by id, optionally with vectors; missing ids are \
                    reported individually and never abort the batch."
                .to_string(),
            category: "vector-crud".to_string(),
            use_cases: vec![
                "Inspect a chunk returned by search".to_string(),
                "Verify an upsert landed".to_string(),
            ],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "ids": {"type": "array", "items": {"type": "integer"}},
                    "with_vectors": {"type": "boolean", "default": false},
                    "target": {"type": "string", "enum": ["cloud", "local"]}
                },
                "required": ["ids"]
            }),
            examples: vec![ToolExample {
                description: "Fetch two points".to_string(),
                arguments: json!({"ids": [1234, 5678]}),
            }],
        }
    }

    async fn execute(
        &self,
        service: &QuarryService,
        input: Value,
    ) -> Result<ToolOutcome, ToolError> {
        let args: GetPointsArgs = parse_arguments(&input)?;
        if args.ids.is_empty() {
            return Err(ToolError::MissingParameter("ids".to_string()));
        }
        let store = service.store_for(args.target.as_deref())?;

        let points = store.get_points(&args.ids, args.with_vectors).await?;
        let found: HashSet<u64> = points.iter().map(|p| p.id).collect();

        let errors: Vec<ErrorDetail> = args
            .ids
            .iter()
            .filter(|id| !found.contains(id))
            .map(|id| {
                ErrorDetail::new(ErrorCode::PointNotFound, format!("no point with id {}", id))
                    .with_details(json!({ "id": id }))
            })
            .collect();

        let count = points.len();
        let data = serde_json::to_value(&points)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(ToolOutcome::new(data, count).with_errors(errors))
    }
}

/// Raw vector search without classification or reranking.
#[derive(Debug, Clone, Default)]
pub struct QueryPointsTool;

#[derive(Debug, Deserialize)]
struct QueryPointsArgs {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    vector: Option<Vec<f32>>,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    /// `true` searches the soft-deleted set instead of the active one.
    #[serde(default)]
    deleted: Option<bool>,
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default)]
    with_vectors: bool,
    #[serde(default)]
    target: Option<String>,
}

fn default_top_k() -> usize {
    10
}

#[async_trait]
impl ToolHandler for QueryPointsTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "query_points".to_string(),
            brief: "Raw top-k cosine search with exact-match filters, bypassing the \
                    classifier and reranker; accepts text or a raw vector."
                .to_string(),
            category: "vector-crud".to_string(),
            use_cases: vec![
                "Debug retrieval scoring".to_string(),
                "Search within one file or section".to_string(),
                "Inspect the soft-deleted set".to_string(),
            ],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "vector": {"type": "array", "items": {"type": "number"}},
                    "file_path": {"type": "string"},
                    "section": {"type": "string"},
                    "language": {"type": "string"},
                    "content_type": {"type": "string", "enum": ["text", "list", "table", "code"]},
                    "deleted": {"type": "boolean"},
                    "top_k": {"type": "integer", "default": 10},
                    "with_vectors": {"type": "boolean", "default": false},
                    "target": {"type": "string", "enum": ["cloud", "local"]}
                }
            }),
            examples: vec![
                ToolExample {
                    description: "Filtered text query".to_string(),
                    arguments: json!({"query": "retry policy", "file_path": "docs/ops.md"}),
                },
                ToolExample {
                    description: "Inspect deleted chunks".to_string(),
                    arguments: json!({"query": "old feature", "deleted": true}),
                },
            ],
        }
    }

    async fn execute(
        &self,
        service: &QuarryService,
        input: Value,
    ) -> Result<ToolOutcome, ToolError> {
        let args: QueryPointsArgs = parse_arguments(&input)?;
        let store = service.store_for(args.target.as_deref())?;

        let vector = match (&args.vector, &args.query) {
            (Some(vector), _) => {
                let expected = service.embedder().dimensions();
                if vector.len() != expected {
                    return Err(ToolError::Store(StoreError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    }));
                }
                vector.clone()
            }
            (None, Some(query)) => service.embedder().embed_one(query).await?.values,
            (None, None) => {
                return Err(ToolError::MissingParameter("query or vector".to_string()))
            }
        };

        let content_type = match args.content_type.as_deref() {
            None => None,
            Some(raw) => Some(ContentType::parse(raw).ok_or_else(|| {
                ToolError::InvalidInput(format!("unknown content_type '{}'", raw))
            })?),
        };
        let filter = Filter {
            file_path: args.file_path.map(|p| crate::chunk::normalize_path(&p)),
            section: args.section,
            language: args.language,
            content_type,
            is_deleted: args.deleted,
        };

        let hits = store
            .vector_search(&vector, &filter, args.top_k.max(1), args.with_vectors)
            .await?;

        let count = hits.len();
        let data = Value::Array(
            hits.iter()
                .map(|hit| {
                    json!({
                        "id": hit.point.id,
                        "score": hit.score,
                        "content": hit.point.content,
                        "payload": hit.point.payload,
                        "vector": if args.with_vectors { Some(&hit.point.vector) } else { None },
                    })
                })
                .collect(),
        );
        Ok(ToolOutcome::new(data, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::point_id;

    #[test]
    fn test_point_input_validation() {
        let good = PointInput {
            content: "text".to_string(),
            file_path: "docs/a.md".to_string(),
            line_start: 3,
            line_end: 5,
            content_type: "list".to_string(),
            language: "markdown".to_string(),
            section: Some("Features".to_string()),
            name: None,
            class_name: None,
            code_type: None,
        };
        let chunk = good.into_chunk().unwrap();
        assert_eq!(chunk.id, point_id("docs/a.md", 3));
        assert_eq!(chunk.payload.content_type, ContentType::List);

        let bad_lines = PointInput {
            content: "text".to_string(),
            file_path: "docs/a.md".to_string(),
            line_start: 5,
            line_end: 3,
            content_type: "text".to_string(),
            language: "markdown".to_string(),
            section: None,
            name: None,
            class_name: None,
            code_type: None,
        };
        assert!(bad_lines.into_chunk().is_err());

        let bad_type = PointInput {
            content: "text".to_string(),
            file_path: "docs/a.md".to_string(),
            line_start: 1,
            line_end: 1,
            content_type: "blob".to_string(),
            language: "markdown".to_string(),
            section: None,
            name: None,
            class_name: None,
            code_type: None,
        };
        assert!(bad_type.into_chunk().is_err());
    }
}

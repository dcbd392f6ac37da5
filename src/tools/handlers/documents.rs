// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Document-level tools: `add_document`, `update_document`,
//! `delete_document`, `get_document`.
//!
//! Documents go through the same incremental chunk reconciliation as a
//! full index run, so adding and updating are the same idempotent
//! operation under two names.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::chunk::normalize_path;
use crate::error::ToolError;
use crate::manifest::{ToolExample, ToolSpec};
use crate::service::QuarryService;
use crate::store::{scroll_all, Filter, VectorStore};
use crate::tools::parse_arguments;
use crate::tools::registry::{ToolHandler, ToolOutcome};

#[derive(Debug, Deserialize)]
struct DocumentArgs {
    file_path: String,
    #[serde(default)]
    target: Option<String>,
}

async fn index_document(
    service: &QuarryService,
    input: Value,
) -> Result<ToolOutcome, ToolError> {
    let args: DocumentArgs = parse_arguments(&input)?;
    let report = service
        .index_document(&args.file_path, args.target.as_deref())
        .await?;

    let count = (report.chunks_upserted + report.chunks_recovered) as usize;
    let data = serde_json::to_value(&report)
        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
    Ok(ToolOutcome::new(data, count))
}

/// Chunk, embed and index one file.
#[derive(Debug, Clone, Default)]
pub struct AddDocumentTool;

#[async_trait]
impl ToolHandler for AddDocumentTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "add_document".to_string(),
            brief: "Chunk and index one file under the project root; Markdown is \
                    split by structure, source files by function and class."
                .to_string(),
            category: "indexing".to_string(),
            use_cases: vec![
                "Index a newly added doc".to_string(),
                "Pull one file in without a full run".to_string(),
            ],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string", "description": "Project-relative path"},
                    "target": {"type": "string", "enum": ["cloud", "local"]}
                },
                "required": ["file_path"]
            }),
            examples: vec![ToolExample {
                description: "Index a doc".to_string(),
                arguments: json!({"file_path": "docs/guide.md"}),
            }],
        }
    }

    fn is_mutating(&self) -> bool {
        true
    }

    fn deadline(&self) -> Option<Duration> {
        // indexing is unbounded
        None
    }

    async fn execute(
        &self,
        service: &QuarryService,
        input: Value,
    ) -> Result<ToolOutcome, ToolError> {
        index_document(service, input).await
    }
}

/// Re-index one file incrementally.
#[derive(Debug, Clone, Default)]
pub struct UpdateDocumentTool;

#[async_trait]
impl ToolHandler for UpdateDocumentTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "update_document".to_string(),
            brief: "Re-index one file: unchanged chunks are skipped, edited chunks \
                    overwritten in place, vanished chunks soft-deleted."
                .to_string(),
            category: "indexing".to_string(),
            use_cases: vec![
                "Refresh a file after edits".to_string(),
                "Recover a file's soft-deleted chunks".to_string(),
            ],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "target": {"type": "string", "enum": ["cloud", "local"]}
                },
                "required": ["file_path"]
            }),
            examples: vec![ToolExample {
                description: "Refresh a doc".to_string(),
                arguments: json!({"file_path": "docs/guide.md"}),
            }],
        }
    }

    fn is_mutating(&self) -> bool {
        true
    }

    fn deadline(&self) -> Option<Duration> {
        None
    }

    async fn execute(
        &self,
        service: &QuarryService,
        input: Value,
    ) -> Result<ToolOutcome, ToolError> {
        index_document(service, input).await
    }
}

/// Soft-delete (default) or physically delete a file's chunks.
#[derive(Debug, Clone, Default)]
pub struct DeleteDocumentTool;

#[derive(Debug, Deserialize)]
struct DeleteDocumentArgs {
    file_path: String,
    #[serde(default = "default_true")]
    soft_delete: bool,
    #[serde(default)]
    target: Option<String>,
}

fn default_true() -> bool {
    true
}

#[async_trait]
impl ToolHandler for DeleteDocumentTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "delete_document".to_string(),
            brief: "Remove a file's chunks from search: soft delete keeps them \
                    recoverable, hard delete removes them for good."
                .to_string(),
            category: "indexing".to_string(),
            use_cases: vec![
                "Retire an obsolete doc".to_string(),
                "Purge a file completely".to_string(),
            ],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "soft_delete": {"type": "boolean", "default": true},
                    "target": {"type": "string", "enum": ["cloud", "local"]}
                },
                "required": ["file_path"]
            }),
            examples: vec![ToolExample {
                description: "Soft-delete a doc".to_string(),
                arguments: json!({"file_path": "docs/old.md"}),
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
        let args: DeleteDocumentArgs = parse_arguments(&input)?;
        let store = service.store_for(args.target.as_deref())?;
        let path = normalize_path(&args.file_path);

        let affected = if args.soft_delete {
            store.soft_delete(&Filter::file(path.as_str())).await?
        } else {
            let points = scroll_all(store.as_ref(), &Filter::file(path.as_str())).await?;
            let ids: Vec<u64> = points.iter().map(|p| p.id).collect();
            if ids.is_empty() {
                0
            } else {
                store.delete_by_ids(&ids).await?
            }
        };
        service.collection_changed().await;

        Ok(ToolOutcome::new(
            json!({
                "file_path": path,
                "affected": affected,
                "soft_delete": args.soft_delete,
            }),
            affected as usize,
        ))
    }
}

/// All chunks of one file, in source order.
#[derive(Debug, Clone, Default)]
pub struct GetDocumentTool;

#[derive(Debug, Deserialize)]
struct GetDocumentArgs {
    file_path: String,
    #[serde(default)]
    include_deleted: bool,
    #[serde(default)]
    target: Option<String>,
}

#[async_trait]
impl ToolHandler for GetDocumentTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "get_document".to_string(),
            brief: "List every chunk stored for one file in source order, optionally \
                    including soft-deleted ones."
                .to_string(),
            category: "indexing".to_string(),
            use_cases: vec![
                "Audit how a file was chunked".to_string(),
                "Check what a recovery would restore".to_string(),
            ],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "include_deleted": {"type": "boolean", "default": false},
                    "target": {"type": "string", "enum": ["cloud", "local"]}
                },
                "required": ["file_path"]
            }),
            examples: vec![ToolExample {
                description: "Inspect a file's chunks".to_string(),
                arguments: json!({"file_path": "docs/a.md", "include_deleted": true}),
            }],
        }
    }

    async fn execute(
        &self,
        service: &QuarryService,
        input: Value,
    ) -> Result<ToolOutcome, ToolError> {
        let args: GetDocumentArgs = parse_arguments(&input)?;
        let store = service.store_for(args.target.as_deref())?;
        let path = normalize_path(&args.file_path);

        let mut filter = Filter::file(path.as_str());
        if !args.include_deleted {
            filter.is_deleted = Some(false);
        }

        let mut points = scroll_all(store.as_ref(), &filter).await?;
        points.sort_by_key(|p| p.payload.line_start);

        let count = points.len();
        let data = serde_json::to_value(&points)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(ToolOutcome::new(data, count))
    }
}

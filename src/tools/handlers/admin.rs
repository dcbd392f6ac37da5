// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Introspection tools: `get_collection_stats`, `get_manifest`,
//! `get_tool_schema`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::manifest::{Manifest, ToolExample, ToolSpec};
use crate::service::QuarryService;
use crate::store::VectorStore;
use crate::tools::parse_arguments;
use crate::tools::registry::{ToolHandler, ToolOutcome};

/// Point counts per configured collection.
#[derive(Debug, Clone, Default)]
pub struct GetCollectionStatsTool;

#[async_trait]
impl ToolHandler for GetCollectionStatsTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "get_collection_stats".to_string(),
            brief: "Point counts per configured collection, split into active and \
                    soft-deleted."
                .to_string(),
            category: "admin".to_string(),
            use_cases: vec![
                "Check index size after a run".to_string(),
                "Verify a cleanup took effect".to_string(),
            ],
            input_schema: json!({"type": "object", "properties": {}}),
            examples: vec![ToolExample {
                description: "All collections".to_string(),
                arguments: json!({}),
            }],
        }
    }

    async fn execute(
        &self,
        service: &QuarryService,
        _input: Value,
    ) -> Result<ToolOutcome, ToolError> {
        let mut entries = Vec::new();
        for store in service.stores() {
            let stats = store.stats().await?;
            entries.push(json!({
                "target": store.name(),
                "collection": store.collection(),
                "active": stats.active,
                "deleted": stats.deleted,
                "total": stats.total(),
            }));
        }

        let count = entries.len();
        Ok(ToolOutcome::new(Value::Array(entries), count))
    }
}

/// Tier 1 of the manifest: briefs only.
pub struct GetManifestTool {
    manifest: Arc<Manifest>,
}

impl GetManifestTool {
    pub fn new(manifest: Arc<Manifest>) -> Self {
        Self { manifest }
    }

    pub fn self_spec() -> ToolSpec {
        ToolSpec {
            name: "get_manifest".to_string(),
            brief: "List every available tool as a short brief with category and use \
                    cases; fetch full schemas separately via get_tool_schema."
                .to_string(),
            category: "admin".to_string(),
            use_cases: vec![
                "Discover available tools cheaply".to_string(),
                "Pick a tool before loading its schema".to_string(),
            ],
            input_schema: json!({"type": "object", "properties": {}}),
            examples: vec![ToolExample {
                description: "Full brief list".to_string(),
                arguments: json!({}),
            }],
        }
    }
}

#[async_trait]
impl ToolHandler for GetManifestTool {
    fn spec(&self) -> ToolSpec {
        Self::self_spec()
    }

    async fn execute(
        &self,
        _service: &QuarryService,
        _input: Value,
    ) -> Result<ToolOutcome, ToolError> {
        let briefs = self.manifest.briefs();
        let count = briefs.len();
        let data = serde_json::to_value(&briefs)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(ToolOutcome::new(data, count))
    }
}

/// Tier 2 of the manifest: one tool's schema and examples.
pub struct GetToolSchemaTool {
    manifest: Arc<Manifest>,
}

impl GetToolSchemaTool {
    pub fn new(manifest: Arc<Manifest>) -> Self {
        Self { manifest }
    }

    pub fn self_spec() -> ToolSpec {
        ToolSpec {
            name: "get_tool_schema".to_string(),
            brief: "Full input schema and example invocations for one tool named in \
                    the manifest."
                .to_string(),
            category: "admin".to_string(),
            use_cases: vec![
                "Load a tool's schema before calling it".to_string(),
                "See example invocations".to_string(),
            ],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"}
                },
                "required": ["name"]
            }),
            examples: vec![ToolExample {
                description: "Schema for search".to_string(),
                arguments: json!({"name": "search"}),
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct SchemaArgs {
    name: String,
}

#[async_trait]
impl ToolHandler for GetToolSchemaTool {
    fn spec(&self) -> ToolSpec {
        Self::self_spec()
    }

    async fn execute(
        &self,
        _service: &QuarryService,
        input: Value,
    ) -> Result<ToolOutcome, ToolError> {
        let args: SchemaArgs = parse_arguments(&input)?;
        let spec = self
            .manifest
            .schema(&args.name)
            .ok_or_else(|| ToolError::NotFound(args.name.clone()))?;

        let data =
            serde_json::to_value(spec).map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(ToolOutcome::new(data, 1))
    }
}

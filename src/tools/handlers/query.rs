// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Query tools: `search`, `ask`, `explain`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::chunk::ContentType;
use crate::error::ToolError;
use crate::manifest::{ToolExample, ToolSpec};
use crate::retrieval::{Answer, Candidate, SearchOptions};
use crate::service::QuarryService;
use crate::tools::registry::{ToolHandler, ToolOutcome};
use crate::tools::parse_arguments;

/// Serialize one candidate for the wire.
pub(crate) fn candidate_json(candidate: &Candidate) -> Value {
    json!({
        "id": candidate.point.id,
        "score": candidate.rerank_score.unwrap_or(candidate.combined),
        "vector_score": candidate.vector_score,
        "lexical_score": candidate.lexical_score,
        "rerank_score": candidate.rerank_score,
        "collection": candidate.provenance,
        "content": candidate.point.content,
        "payload": candidate.point.payload,
    })
}

fn answer_json(answer: &Answer) -> Value {
    json!({
        "answer": answer.text,
        "intent": answer.intent,
        "citations": answer.citations,
    })
}

/// Hybrid search returning raw scored chunks.
#[derive(Debug, Clone, Default)]
pub struct SearchTool;

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    top_k: Option<usize>,
}

#[async_trait]
impl ToolHandler for SearchTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "search".to_string(),
            brief: "Hybrid semantic and keyword search over the indexed docs and code, \
                    returning raw scored chunks with their source locations."
                .to_string(),
            category: "query".to_string(),
            use_cases: vec![
                "Locate documentation about a topic".to_string(),
                "Find code by natural-language description".to_string(),
            ],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Natural-language query"},
                    "content_type": {"type": "string", "enum": ["text", "list", "table", "code"]},
                    "language": {"type": "string"},
                    "top_k": {"type": "integer", "minimum": 1}
                },
                "required": ["query"]
            }),
            examples: vec![
                ToolExample {
                    description: "Plain search".to_string(),
                    arguments: json!({"query": "how are chunks deduplicated"}),
                },
                ToolExample {
                    description: "Code-only search".to_string(),
                    arguments: json!({"query": "greet function", "content_type": "code", "top_k": 3}),
                },
            ],
        }
    }

    async fn execute(
        &self,
        service: &QuarryService,
        input: Value,
    ) -> Result<ToolOutcome, ToolError> {
        let args: SearchArgs = parse_arguments(&input)?;
        if args.query.trim().is_empty() {
            return Err(ToolError::MissingParameter("query".to_string()));
        }

        let content_type = match args.content_type.as_deref() {
            None => None,
            Some(raw) => Some(ContentType::parse(raw).ok_or_else(|| {
                ToolError::InvalidInput(format!("unknown content_type '{}'", raw))
            })?),
        };

        let options = SearchOptions {
            content_type,
            language: args.language,
            top_k: args.top_k,
        };
        let results = service.pipeline().search(&args.query, &options).await?;

        let count = results.len();
        let data = Value::Array(results.iter().map(candidate_json).collect());
        Ok(ToolOutcome::new(data, count))
    }
}

/// Full question answering with citations.
#[derive(Debug, Clone, Default)]
pub struct AskTool;

#[derive(Debug, Deserialize)]
struct AskArgs {
    question: String,
}

#[async_trait]
impl ToolHandler for AskTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "ask".to_string(),
            brief: "Answer a question from the indexed material with citations; the \
                    answer shape adapts to the detected intent."
                .to_string(),
            category: "query".to_string(),
            use_cases: vec![
                "Get a grounded answer about the project".to_string(),
                "Enumerate items documented across files".to_string(),
                "Compare two documented concepts".to_string(),
            ],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "question": {"type": "string"}
                },
                "required": ["question"]
            }),
            examples: vec![
                ToolExample {
                    description: "Enumeration".to_string(),
                    arguments: json!({"question": "list all deployment steps"}),
                },
                ToolExample {
                    description: "Factual lookup".to_string(),
                    arguments: json!({"question": "what is the default batch size"}),
                },
            ],
        }
    }

    async fn execute(
        &self,
        service: &QuarryService,
        input: Value,
    ) -> Result<ToolOutcome, ToolError> {
        let args: AskArgs = parse_arguments(&input)?;
        if args.question.trim().is_empty() {
            return Err(ToolError::MissingParameter("question".to_string()));
        }

        let answer = service.pipeline().ask(&args.question).await?;
        let count = answer.citations.len();
        Ok(ToolOutcome::new(answer_json(&answer), count))
    }
}

/// Like `ask` with the intent forced to explanation.
#[derive(Debug, Clone, Default)]
pub struct ExplainTool;

#[derive(Debug, Deserialize)]
struct ExplainArgs {
    topic: String,
}

#[async_trait]
impl ToolHandler for ExplainTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "explain".to_string(),
            brief: "Explain a topic from the indexed material: grouped by file, in \
                    source order, with citations."
                .to_string(),
            category: "query".to_string(),
            use_cases: vec![
                "Understand how a subsystem works".to_string(),
                "Read the context around a concept".to_string(),
            ],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "topic": {"type": "string"}
                },
                "required": ["topic"]
            }),
            examples: vec![
                ToolExample {
                    description: "Explain a subsystem".to_string(),
                    arguments: json!({"topic": "incremental indexing"}),
                },
                ToolExample {
                    description: "Explain a policy".to_string(),
                    arguments: json!({"topic": "soft delete and recovery"}),
                },
            ],
        }
    }

    async fn execute(
        &self,
        service: &QuarryService,
        input: Value,
    ) -> Result<ToolOutcome, ToolError> {
        let args: ExplainArgs = parse_arguments(&input)?;
        if args.topic.trim().is_empty() {
            return Err(ToolError::MissingParameter("topic".to_string()));
        }

        let answer = service.pipeline().explain(&args.topic).await?;
        let count = answer.citations.len();
        Ok(ToolOutcome::new(answer_json(&answer), count))
    }
}

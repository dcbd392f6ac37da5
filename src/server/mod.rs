// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP server: line-delimited JSON-RPC 2.0 over stdio.
//!
//! One request is parsed at a time off stdin; tool invocations run under
//! the registry's per-tool deadline. Logging goes to stderr so stdout
//! stays a clean frame stream.

pub mod protocol;

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::service::QuarryService;
use crate::tools::ToolRegistry;

use protocol::{
    Request, Response, ToolCallParams, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION,
};

/// Environment variable naming this server instance.
pub const ENV_SERVER_NAME: &str = "MCP_SERVER_NAME";

/// The stdio MCP server.
pub struct McpServer {
    service: Arc<QuarryService>,
    registry: ToolRegistry,
    server_name: String,
}

impl McpServer {
    pub fn new(service: Arc<QuarryService>) -> Self {
        let server_name =
            std::env::var(ENV_SERVER_NAME).unwrap_or_else(|_| "quarry".to_string());
        Self {
            service,
            registry: ToolRegistry::with_defaults(),
            server_name,
        }
    }

    /// Serve until stdin closes.
    pub async fn run(&self) -> crate::error::Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        tracing::info!(server = %self.server_name, "MCP server listening on stdio");

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(reply) = self.handle_message(&line).await {
                stdout.write_all(reply.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        tracing::info!("stdin closed, shutting down");
        Ok(())
    }

    /// Handle one frame. Notifications and malformed notifications yield no
    /// reply; everything else gets exactly one response line.
    pub async fn handle_message(&self, line: &str) -> Option<String> {
        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                let response =
                    Response::failure(Value::Null, PARSE_ERROR, format!("parse error: {}", err));
                return serde_json::to_string(&response).ok();
            }
        };

        let id = request.id.clone();
        let response = self.handle_request(request).await;
        match (id, response) {
            (Some(_), Some(response)) => serde_json::to_string(&response).ok(),
            _ => None,
        }
    }

    async fn handle_request(&self, request: Request) -> Option<Response> {
        if request.is_notification() {
            tracing::debug!(method = %request.method, "notification");
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        let response = match request.method.as_str() {
            "initialize" => Response::success(id, self.initialize_result()),
            "tools/list" => Response::success(id, self.tools_list_result()),
            "tools/call" => self.tools_call(id, request.params).await,
            "ping" => Response::success(id, json!({})),
            other => Response::failure(
                id,
                METHOD_NOT_FOUND,
                format!("method not found: {}", other),
            ),
        };
        Some(response)
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": self.server_name,
                "version": crate::VERSION,
            }
        })
    }

    fn tools_list_result(&self) -> Value {
        let manifest = self.registry.manifest();
        let tools: Vec<Value> = manifest
            .briefs()
            .into_iter()
            .map(|brief| {
                let schema = manifest
                    .schema(&brief.name)
                    .map(|spec| spec.input_schema.clone())
                    .unwrap_or_else(|| json!({"type": "object"}));
                json!({
                    "name": brief.name,
                    "description": brief.brief,
                    "inputSchema": schema,
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn tools_call(&self, id: Value, params: Option<Value>) -> Response {
        let params: ToolCallParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(params)) => params,
            Ok(None) => {
                return Response::failure(id, INVALID_PARAMS, "missing params for tools/call")
            }
            Err(err) => {
                return Response::failure(id, INVALID_PARAMS, format!("bad params: {}", err))
            }
        };

        let arguments = if params.arguments.is_null() {
            json!({})
        } else {
            params.arguments
        };

        match self
            .registry
            .dispatch(&self.service, &params.name, arguments)
            .await
        {
            Ok(envelope) => {
                let is_error = !envelope.success;
                let text = serde_json::to_string(&envelope)
                    .unwrap_or_else(|_| "{\"success\":false}".to_string());
                Response::success(
                    id,
                    json!({
                        "content": [{"type": "text", "text": text}],
                        "isError": is_error,
                    }),
                )
            }
            Err(err) => Response::failure(id, INTERNAL_ERROR, err.to_string()),
        }
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool registry and handler trait.
//!
//! The registry maps tool names to handlers, runs each call under its
//! deadline, and wraps every result in the uniform envelope.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;
use crate::manifest::{Manifest, ToolSpec};
use crate::service::QuarryService;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::{Envelope, EnvelopeMetadata, ErrorDetail};

/// Default deadline for query tools.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// What a handler returns before envelope wrapping.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub data: Value,
    pub count: usize,
    /// Per-item errors from a partially failed batch. Non-empty errors make
    /// the envelope `success = false` while `data` keeps the successes.
    pub errors: Vec<ErrorDetail>,
}

impl ToolOutcome {
    pub fn new(data: Value, count: usize) -> Self {
        Self {
            data,
            count,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<ErrorDetail>) -> Self {
        self.errors = errors;
        self
    }
}

/// Trait every tool implements.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Complete tool description; the manifest tiers project from this.
    fn spec(&self) -> ToolSpec;

    /// Whether this tool mutates the collection.
    fn is_mutating(&self) -> bool {
        false
    }

    /// Indexing tools run without a deadline; everything else gets the
    /// 30-second default.
    fn deadline(&self) -> Option<Duration> {
        Some(DEFAULT_DEADLINE)
    }

    async fn execute(
        &self,
        service: &QuarryService,
        input: Value,
    ) -> Result<ToolOutcome, ToolError>;
}

/// Registry of available tools.
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registry with the complete tool surface.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for handler in super::handlers::default_handlers() {
            registry.register(handler);
        }
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = handler.spec().name;
        if !self.handlers.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.handlers.insert(name, handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Manifest over all registered tools, in registration order.
    pub fn manifest(&self) -> Manifest {
        let specs = self
            .order
            .iter()
            .filter_map(|name| self.handlers.get(name))
            .map(|handler| handler.spec())
            .collect();
        Manifest::new(specs)
    }

    /// Execute a tool and wrap the result in the envelope. Transport-level
    /// failures (unknown tool) surface as `Err`; tool-level failures are
    /// envelopes with `success = false`.
    pub async fn dispatch(
        &self,
        service: &QuarryService,
        tool_name: &str,
        input: Value,
    ) -> Result<Envelope, ToolError> {
        let handler = self
            .get(tool_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;

        let start = Instant::now();
        let result = match handler.deadline() {
            Some(deadline) => match tokio::time::timeout(deadline, handler.execute(service, input))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ToolError::Timeout(handler.deadline().map(|d| d.as_millis() as u64).unwrap_or(0))),
            },
            None => handler.execute(service, input).await,
        };
        let duration = start.elapsed();

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_tool(tool_name, duration, result.is_ok());

        let envelope = match result {
            Ok(outcome) => Envelope {
                success: outcome.errors.is_empty(),
                data: outcome.data,
                metadata: EnvelopeMetadata {
                    count: outcome.count,
                    timing_ms: duration.as_millis() as u64,
                    operation: tool_name.to_string(),
                },
                errors: outcome.errors,
            },
            Err(err) => {
                tracing::debug!(tool = tool_name, error = %err, "tool execution failed");
                Envelope {
                    success: false,
                    data: Value::Null,
                    metadata: EnvelopeMetadata {
                        count: 0,
                        timing_ms: duration.as_millis() as u64,
                        operation: tool_name.to_string(),
                    },
                    errors: vec![ErrorDetail::from(&err)],
                }
            }
        };

        Ok(envelope)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::FallbackEmbedder;
    use crate::retrieval::NoopReranker;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn test_service() -> QuarryService {
        QuarryService::assemble(
            Arc::new(crate::config::example_config()),
            vec![Arc::new(MemoryStore::new("local", "t"))],
            Arc::new(FallbackEmbedder::new(32)),
            Arc::new(NoopReranker),
        )
    }

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "echo".to_string(),
                brief: "Echo the input".to_string(),
                category: "test".to_string(),
                use_cases: vec!["testing".to_string(), "demo".to_string()],
                input_schema: json!({"type": "object"}),
                examples: Vec::new(),
            }
        }

        async fn execute(
            &self,
            _service: &QuarryService,
            input: Value,
        ) -> Result<ToolOutcome, ToolError> {
            Ok(ToolOutcome::new(input, 1))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl ToolHandler for FailingTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "failing".to_string(),
                brief: "Always fails".to_string(),
                category: "test".to_string(),
                use_cases: vec!["testing".to_string(), "demo".to_string()],
                input_schema: json!({"type": "object"}),
                examples: Vec::new(),
            }
        }

        async fn execute(
            &self,
            _service: &QuarryService,
            _input: Value,
        ) -> Result<ToolOutcome, ToolError> {
            Err(ToolError::InvalidInput("nope".to_string()))
        }
    }

    #[tokio::test]
    async fn test_dispatch_success_envelope() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let service = test_service();

        let envelope = registry
            .dispatch(&service, "echo", json!({"x": 1}))
            .await
            .unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.data, json!({"x": 1}));
        assert_eq!(envelope.metadata.count, 1);
        assert_eq!(envelope.metadata.operation, "echo");
        assert!(envelope.errors.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_error_envelope() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool));
        let service = test_service();

        let envelope = registry
            .dispatch(&service, "failing", json!({}))
            .await
            .unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.errors.len(), 1);
        assert_eq!(envelope.errors[0].code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let registry = ToolRegistry::new();
        let service = test_service();
        let result = registry.dispatch(&service, "missing", json!({})).await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_manifest_in_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(FailingTool));
        let manifest = registry.manifest();
        assert_eq!(manifest.names(), vec!["echo", "failing"]);
    }
}

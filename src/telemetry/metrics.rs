// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Metrics collection for performance monitoring.
//!
//! Provides lightweight metrics collection without external dependencies.
//! Suitable for a stdio server where full observability stacks are overkill.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Central metrics collection.
#[derive(Debug)]
pub struct Metrics {
    /// Tool execution metrics by tool name.
    tools: RwLock<HashMap<String, ToolMetrics>>,

    /// General operation metrics.
    operations: RwLock<HashMap<String, OperationMetrics>>,

    /// Start time for calculating uptime.
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            operations: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a tool execution.
    pub fn record_tool(&self, name: &str, duration: Duration, success: bool) {
        if let Ok(mut tools) = self.tools.write() {
            let metrics = tools
                .entry(name.to_string())
                .or_insert_with(ToolMetrics::new);
            metrics.record(duration, success);
        }
    }

    /// Record a generic operation.
    pub fn record_operation(&self, name: &str, duration: Duration) {
        if let Ok(mut ops) = self.operations.write() {
            let metrics = ops
                .entry(name.to_string())
                .or_insert_with(OperationMetrics::new);
            metrics.record(duration);
        }
    }

    /// Get metrics for a specific tool.
    pub fn tool_metrics(&self, name: &str) -> Option<ToolMetrics> {
        self.tools.read().ok()?.get(name).cloned()
    }

    /// Get metrics for a specific operation.
    pub fn operation_metrics(&self, name: &str) -> Option<OperationMetrics> {
        self.operations.read().ok()?.get(name).cloned()
    }

    /// Get uptime since metrics were initialized.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        if let Ok(mut tools) = self.tools.write() {
            tools.clear();
        }
        if let Ok(mut ops) = self.operations.write() {
            ops.clear();
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics for a specific tool.
#[derive(Debug, Clone)]
pub struct ToolMetrics {
    pub invocations: u64,
    pub successes: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
}

impl ToolMetrics {
    fn new() -> Self {
        Self {
            invocations: 0,
            successes: 0,
            total_duration: Duration::ZERO,
            max_duration: Duration::ZERO,
        }
    }

    fn record(&mut self, duration: Duration, success: bool) {
        self.invocations += 1;
        if success {
            self.successes += 1;
        }
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);
    }

    pub fn mean_duration(&self) -> Duration {
        if self.invocations == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.invocations as u32
        }
    }
}

/// Metrics for a generic operation.
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    pub count: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
}

impl OperationMetrics {
    fn new() -> Self {
        Self {
            count: 0,
            total_duration: Duration::ZERO,
            max_duration: Duration::ZERO,
        }
    }

    fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tool() {
        let metrics = Metrics::new();
        metrics.record_tool("search", Duration::from_millis(10), true);
        metrics.record_tool("search", Duration::from_millis(30), false);

        let tool = metrics.tool_metrics("search").unwrap();
        assert_eq!(tool.invocations, 2);
        assert_eq!(tool.successes, 1);
        assert_eq!(tool.max_duration, Duration::from_millis(30));
        assert_eq!(tool.mean_duration(), Duration::from_millis(20));
    }

    #[test]
    fn test_record_operation() {
        let metrics = Metrics::new();
        metrics.record_operation("store.upsert", Duration::from_millis(5));
        metrics.record_operation("store.upsert", Duration::from_millis(7));

        let op = metrics.operation_metrics("store.upsert").unwrap();
        assert_eq!(op.count, 2);
        assert_eq!(op.total_duration, Duration::from_millis(12));
    }

    #[test]
    fn test_reset() {
        let metrics = Metrics::new();
        metrics.record_tool("ask", Duration::from_millis(1), true);
        metrics.reset();
        assert!(metrics.tool_metrics("ask").is_none());
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracing and metrics infrastructure.
//!
//! Logging goes to stderr so the stdio control channel stays clean for
//! JSON-RPC frames. Metrics collection is gated behind the `telemetry`
//! cargo feature.

pub mod init;
pub mod metrics;

pub use init::{init_telemetry, TelemetryConfig};
pub use metrics::{Metrics, GLOBAL_METRICS};

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry initialization and configuration.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Configuration for telemetry initialization.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Default log level if RUST_LOG is not set.
    pub default_level: Level,

    /// Whether to use ANSI colors in output.
    pub ansi_colors: bool,

    /// Whether to include target module path.
    pub include_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_level: Level::WARN,
            ansi_colors: true,
            include_target: false,
        }
    }
}

impl TelemetryConfig {
    /// Config for the MCP server: no colors, stderr only.
    pub fn server() -> Self {
        Self {
            default_level: Level::INFO,
            ansi_colors: false,
            include_target: true,
        }
    }
}

/// Initialize the tracing subscriber.
///
/// Output always goes to stderr; stdout carries the control channel.
/// Safe to call once per process; a second call is a no-op.
pub fn init_telemetry(config: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_level.to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.default_level, Level::WARN);
        assert!(config.ansi_colors);
    }

    #[test]
    fn test_server_config_disables_colors() {
        let config = TelemetryConfig::server();
        assert!(!config.ansi_colors);
        assert_eq!(config.default_level, Level::INFO);
    }

    #[test]
    fn test_init_is_idempotent() {
        init_telemetry(&TelemetryConfig::default());
        init_telemetry(&TelemetryConfig::server());
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the quarry RAG server.
//!
//! This module provides strongly-typed errors for different parts of the
//! application, using `thiserror` for ergonomic error definitions and
//! `anyhow` for propagation at the binary edge. Every error maps onto one
//! of the stable envelope codes in [`ErrorCode`].

use thiserror::Error;

/// Stable error codes surfaced in tool envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationError,
    PointNotFound,
    DimensionMismatch,
    BatchLimitExceeded,
    VectorStoreUnavailable,
    EmbedFailed,
    ParseFailed,
    ConfigError,
    Timeout,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::PointNotFound => "POINT_NOT_FOUND",
            Self::DimensionMismatch => "DIMENSION_MISMATCH",
            Self::BatchLimitExceeded => "BATCH_LIMIT_EXCEEDED",
            Self::VectorStoreUnavailable => "VECTOR_STORE_UNAVAILABLE",
            Self::EmbedFailed => "EMBED_FAILED",
            Self::ParseFailed => "PARSE_FAILED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors from the vector store adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),

    #[error("API error: {message}")]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Dimension mismatch: collection has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Batch of {len} exceeds limit of {cap}")]
    BatchLimitExceeded { len: usize, cap: usize },

    #[error("Point not found: {0}")]
    PointNotFound(u64),

    #[error("Response parsing error: {0}")]
    ParseError(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl StoreError {
    /// Create an API error with status code.
    pub fn api(message: impl Into<String>, status_code: u16) -> Self {
        Self::ApiError {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Timeout(_) => true,
            Self::ApiError { status_code, .. } => {
                matches!(status_code, Some(code) if *code >= 500)
            }
            _ => false,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable(_) | Self::ApiError { .. } | Self::Timeout(_) => {
                ErrorCode::VectorStoreUnavailable
            }
            Self::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            Self::BatchLimitExceeded { .. } => ErrorCode::BatchLimitExceeded,
            Self::PointNotFound(_) => ErrorCode::PointNotFound,
            Self::ParseError(_) => ErrorCode::VectorStoreUnavailable,
        }
    }
}

/// Errors from embedding providers.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("Embedding failed: {0}")]
    Failed(String),

    #[error("No embedding provider available: {0}")]
    Unavailable(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbedError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Failed(_) | Self::Unavailable(_) => ErrorCode::EmbedFailed,
            Self::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
        }
    }
}

/// Errors from document and code chunking.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("Parse failed: {0}")]
    ParseFailed(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ChunkError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

/// Errors that can occur during configuration loading.
///
/// Raised at startup; the process exits with code 2.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidFormat(err.to_string())
    }
}

/// Errors that can occur during indexing runs.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Embedding error: {0}")]
    Embed(#[from] EmbedError),

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for IndexError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

/// Errors that can occur during query execution.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Embedding error: {0}")]
    Embed(#[from] EmbedError),

    #[error("Rerank failed: {0}")]
    RerankFailed(String),
}

impl QueryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Store(e) => e.code(),
            Self::Embed(e) => e.code(),
            Self::RerankFailed(_) => ErrorCode::InternalError,
        }
    }
}

/// Errors that can occur during tool execution.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Embedding error: {0}")]
    Embed(#[from] EmbedError),

    #[error("Chunking error: {0}")]
    Chunk(#[from] ChunkError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl ToolError {
    /// Map onto the stable envelope code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) | Self::InvalidInput(_) | Self::MissingParameter(_) => {
                ErrorCode::ValidationError
            }
            Self::Store(e) => e.code(),
            Self::Embed(e) => e.code(),
            Self::Chunk(_) => ErrorCode::ParseFailed,
            Self::Query(e) => e.code(),
            Self::Index(IndexError::Store(e)) => e.code(),
            Self::Index(IndexError::Embed(e)) => e.code(),
            Self::Index(_) => ErrorCode::InternalError,
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::ExecutionFailed(_) => ErrorCode::InternalError,
        }
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        Self::ExecutionFailed(err.to_string())
    }
}

/// Result type alias using anyhow for flexible error handling at the edge.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_retryable() {
        assert!(StoreError::Unavailable("connection refused".to_string()).is_retryable());
        assert!(StoreError::Timeout(30000).is_retryable());
        assert!(StoreError::api("internal", 503).is_retryable());
        assert!(!StoreError::api("bad request", 400).is_retryable());
        assert!(!StoreError::PointNotFound(42).is_retryable());
        assert!(!StoreError::DimensionMismatch {
            expected: 768,
            actual: 384
        }
        .is_retryable());
    }

    #[test]
    fn test_error_codes_stable() {
        assert_eq!(ErrorCode::ValidationError.as_str(), "VALIDATION_ERROR");
        assert_eq!(ErrorCode::PointNotFound.as_str(), "POINT_NOT_FOUND");
        assert_eq!(ErrorCode::DimensionMismatch.as_str(), "DIMENSION_MISMATCH");
        assert_eq!(
            ErrorCode::BatchLimitExceeded.as_str(),
            "BATCH_LIMIT_EXCEEDED"
        );
        assert_eq!(
            ErrorCode::VectorStoreUnavailable.as_str(),
            "VECTOR_STORE_UNAVAILABLE"
        );
        assert_eq!(ErrorCode::EmbedFailed.as_str(), "EMBED_FAILED");
        assert_eq!(ErrorCode::ParseFailed.as_str(), "PARSE_FAILED");
        assert_eq!(ErrorCode::ConfigError.as_str(), "CONFIG_ERROR");
    }

    #[test]
    fn test_tool_error_code_mapping() {
        let err = ToolError::InvalidInput("bad".to_string());
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let err: ToolError = StoreError::PointNotFound(7).into();
        assert_eq!(err.code(), ErrorCode::PointNotFound);

        let err: ToolError = EmbedError::Failed("api down".to_string()).into();
        assert_eq!(err.code(), ErrorCode::EmbedFailed);

        let err: ToolError = ChunkError::ParseFailed("grammar".to_string()).into();
        assert_eq!(err.code(), ErrorCode::ParseFailed);
    }

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("not json");
        let config_err: ConfigError = result.unwrap_err().into();
        assert!(matches!(config_err, ConfigError::InvalidFormat(_)));
    }
}

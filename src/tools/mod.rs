// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool surface.
//!
//! Every tool returns the same envelope: `{success, data, metadata:{count,
//! timing_ms, operation}, errors:[{code, message, details, suggestions}]}`.
//! A batch that partially failed reports `success = false` with per-id
//! errors while the successful ids stay in `data`; an empty result set is
//! a success with `count = 0`, never an error.

pub mod handlers;
pub mod registry;

pub use registry::{ToolHandler, ToolOutcome, ToolRegistry};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorCode, ToolError};

/// Uniform tool result envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    pub data: Value,
    pub metadata: EnvelopeMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    pub count: usize,
    pub timing_ms: u64,
    pub operation: String,
}

/// One envelope error record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ErrorDetail {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_str().to_string(),
            message: message.into(),
            details: None,
            suggestions: suggestions_for(code),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&ToolError> for ErrorDetail {
    fn from(err: &ToolError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

fn suggestions_for(code: ErrorCode) -> Vec<String> {
    match code {
        ErrorCode::ValidationError => {
            vec!["Check the tool schema via get_tool_schema".to_string()]
        }
        ErrorCode::PointNotFound => {
            vec!["Verify the id with query_points or get_document".to_string()]
        }
        ErrorCode::DimensionMismatch => vec![
            "Re-index after changing the embedding model".to_string(),
        ],
        ErrorCode::BatchLimitExceeded => {
            vec!["Split the request into smaller batches".to_string()]
        }
        ErrorCode::VectorStoreUnavailable => vec![
            "Check the Qdrant endpoint and api key in the config".to_string(),
        ],
        ErrorCode::EmbedFailed => {
            vec!["Check that the embedding service is running".to_string()]
        }
        _ => Vec::new(),
    }
}

/// Parse JSON arguments into a typed struct.
pub fn parse_arguments<T>(arguments: &Value) -> Result<T, ToolError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(arguments.clone())
        .map_err(|err| ToolError::InvalidInput(format!("failed to parse arguments: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_arguments() {
        #[derive(Deserialize)]
        struct Args {
            query: String,
        }

        let value = json!({"query": "hello"});
        let args: Args = parse_arguments(&value).unwrap();
        assert_eq!(args.query, "hello");
    }

    #[test]
    fn test_parse_arguments_invalid() {
        #[derive(Deserialize)]
        #[allow(dead_code)]
        struct Args {
            required: String,
        }

        let result: Result<Args, _> = parse_arguments(&json!({"other": 1}));
        assert!(matches!(result, Err(ToolError::InvalidInput(_))));
    }

    #[test]
    fn test_error_detail_codes_and_suggestions() {
        let err = ToolError::InvalidInput("bad".to_string());
        let detail = ErrorDetail::from(&err);
        assert_eq!(detail.code, "VALIDATION_ERROR");
        assert!(!detail.suggestions.is_empty());
    }

    #[test]
    fn test_envelope_serialization_skips_empty_errors() {
        let envelope = Envelope {
            success: true,
            data: json!([]),
            metadata: EnvelopeMetadata {
                count: 0,
                timing_ms: 3,
                operation: "search".to_string(),
            },
            errors: Vec::new(),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(!json.contains("errors"));
        assert!(json.contains("\"count\":0"));
        assert!(json.contains("\"success\":true"));
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! The configuration is a single JSON object with a fixed, enumerated set
//! of keys; unknown keys are rejected at load time and missing optional
//! keys take the defaults listed here.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ServerConfig {
    /// Project root; relative values are resolved against the config file's
    /// directory by the loader.
    #[serde(default = "default_project_root")]
    pub project_root: String,

    /// Cloud Qdrant endpoint (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_qdrant: Option<QdrantEndpoint>,

    /// Local Qdrant endpoint (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_qdrant: Option<QdrantEndpoint>,

    /// Doc globs indexed into the cloud collection.
    #[serde(default)]
    pub cloud_docs: Vec<String>,

    /// Doc globs indexed into the local collection.
    #[serde(default)]
    pub local_docs: Vec<String>,

    /// Source globs (indexed into whichever collection is targeted).
    #[serde(default)]
    pub code_paths: Vec<String>,

    #[serde(default)]
    pub embedding_models: EmbeddingModels,

    #[serde(default)]
    pub hybrid_retrieval: HybridRetrievalConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Globs skipped everywhere during path resolution.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_project_root() -> String {
    ".".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            cloud_qdrant: None,
            local_qdrant: None,
            cloud_docs: Vec::new(),
            local_docs: Vec::new(),
            code_paths: Vec::new(),
            embedding_models: EmbeddingModels::default(),
            hybrid_retrieval: HybridRetrievalConfig::default(),
            chunking: ChunkingConfig::default(),
            exclude_patterns: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding_models.doc != self.embedding_models.code {
            return Err(ConfigError::InvalidValue {
                field: "embedding_models".to_string(),
                message: format!(
                    "doc and code must resolve to the same model to keep one vector \
                     dimension per collection (got '{}' and '{}')",
                    self.embedding_models.doc, self.embedding_models.code
                ),
            });
        }

        let weights = &self.hybrid_retrieval.hybrid_weights;
        if weights.vector < 0.0 || weights.bm25 < 0.0 || weights.vector + weights.bm25 <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "hybrid_retrieval.hybrid_weights".to_string(),
                message: "weights must be non-negative and sum to a positive value".to_string(),
            });
        }

        if self.chunking.doc_chunk_overlap >= self.chunking.doc_chunk_size {
            return Err(ConfigError::InvalidValue {
                field: "chunking.doc_chunk_overlap".to_string(),
                message: format!(
                    "overlap {} must be smaller than chunk size {}",
                    self.chunking.doc_chunk_overlap, self.chunking.doc_chunk_size
                ),
            });
        }

        if self.cloud_qdrant.is_none() && self.local_qdrant.is_none() {
            return Err(ConfigError::MissingField(
                "cloud_qdrant or local_qdrant".to_string(),
            ));
        }

        Ok(())
    }

    /// Doc globs for the named collection target.
    pub fn doc_globs(&self, target: CollectionTarget) -> &[String] {
        match target {
            CollectionTarget::Cloud => &self.cloud_docs,
            CollectionTarget::Local => &self.local_docs,
        }
    }
}

/// Which of the two logical indexes an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionTarget {
    Cloud,
    Local,
}

impl CollectionTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::Local => "local",
        }
    }
}

/// Connection settings for one Qdrant endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct QdrantEndpoint {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub collection: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

fn default_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

/// Embedding model names. `doc` and `code` must resolve to the same model
/// in this version so a collection holds a single vector dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct EmbeddingModels {
    #[serde(default = "default_embedding_model")]
    pub doc: String,

    #[serde(default = "default_embedding_model")]
    pub code: String,

    /// Cross-encoder model for reranking; absent disables the reranker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reranking: Option<String>,
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

impl Default for EmbeddingModels {
    fn default() -> Self {
        Self {
            doc: default_embedding_model(),
            code: default_embedding_model(),
            reranking: None,
        }
    }
}

/// Hybrid retrieval tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct HybridRetrievalConfig {
    /// Candidates pulled from each retrieval leg.
    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    /// Results surviving the reranker. Zero bypasses reranking.
    #[serde(default = "default_rerank_top_k")]
    pub rerank_top_k: usize,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default)]
    pub hybrid_weights: HybridWeights,
}

fn default_search_top_k() -> usize {
    20
}

fn default_rerank_top_k() -> usize {
    10
}

fn default_max_results() -> usize {
    10
}

impl Default for HybridRetrievalConfig {
    fn default() -> Self {
        Self {
            search_top_k: default_search_top_k(),
            rerank_top_k: default_rerank_top_k(),
            max_results: default_max_results(),
            hybrid_weights: HybridWeights::default(),
        }
    }
}

/// Weights for the combined score `s = w_vec * v + w_bm25 * b`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct HybridWeights {
    #[serde(default = "default_bm25_weight")]
    pub bm25: f32,

    #[serde(default = "default_vector_weight")]
    pub vector: f32,
}

fn default_bm25_weight() -> f32 {
    0.3
}

fn default_vector_weight() -> f32 {
    0.7
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            bm25: default_bm25_weight(),
            vector: default_vector_weight(),
        }
    }
}

/// Chunking tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ChunkingConfig {
    /// Target prose chunk size in characters.
    #[serde(default = "default_doc_chunk_size")]
    pub doc_chunk_size: usize,

    #[serde(default = "default_doc_chunk_overlap")]
    pub doc_chunk_overlap: usize,

    #[serde(default)]
    pub code_chunk_strategy: CodeChunkStrategy,

    #[serde(default)]
    pub code_chunk_overlap: usize,
}

fn default_doc_chunk_size() -> usize {
    1000
}

fn default_doc_chunk_overlap() -> usize {
    100
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            doc_chunk_size: default_doc_chunk_size(),
            doc_chunk_overlap: default_doc_chunk_overlap(),
            code_chunk_strategy: CodeChunkStrategy::default(),
            code_chunk_overlap: 0,
        }
    }
}

/// How source files are split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CodeChunkStrategy {
    /// Tree-sitter AST walk with automatic regex fallback.
    #[default]
    Ast,
    /// Regex extraction only.
    Regex,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{
            "project_root": ".",
            "local_qdrant": {
                "url": "http://localhost:6333",
                "collection": "quarry_local"
            },
            "local_docs": ["docs/**/*.md"],
            "code_paths": ["src/**/*.py"]
        }"#
    }

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: ServerConfig = serde_json::from_str(minimal_json()).unwrap();
        assert!(config.cloud_qdrant.is_none());
        assert_eq!(config.hybrid_retrieval.search_top_k, 20);
        assert_eq!(config.hybrid_retrieval.rerank_top_k, 10);
        assert!((config.hybrid_retrieval.hybrid_weights.vector - 0.7).abs() < 1e-6);
        assert!((config.hybrid_retrieval.hybrid_weights.bm25 - 0.3).abs() < 1e-6);
        assert_eq!(config.chunking.doc_chunk_size, 1000);
        assert_eq!(config.chunking.doc_chunk_overlap, 100);
        assert_eq!(config.chunking.code_chunk_strategy, CodeChunkStrategy::Ast);
        let endpoint = config.local_qdrant.as_ref().unwrap();
        assert_eq!(endpoint.timeout, 30);
        assert_eq!(endpoint.retry_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result: Result<ServerConfig, _> =
            serde_json::from_str(r#"{"project_root": ".", "surprise": true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_mismatched_embedding_models_rejected() {
        let mut config: ServerConfig = serde_json::from_str(minimal_json()).unwrap();
        config.embedding_models.code = "different-model".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "embedding_models"));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config: ServerConfig = serde_json::from_str(minimal_json()).unwrap();
        config.chunking.doc_chunk_overlap = config.chunking.doc_chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_requires_at_least_one_endpoint() {
        let config = ServerConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField(_))
        ));
    }
}

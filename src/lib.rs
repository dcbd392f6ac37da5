// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Quarry - retrieval-augmented documentation and code search.
//!
//! Quarry ingests a project's docs and source, stores semantically-indexed
//! chunks in a vector database, and serves grounded, citation-bearing
//! answers over a stdio MCP channel.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`chunk`] - The chunk data model and deterministic point identity
//! - [`error`] - Error types, stable envelope codes and result aliases
//! - [`config`] - JSON configuration loading with env overrides
//! - [`chunking`] - Structure-aware Markdown and AST-aware code chunkers
//! - [`embedding`] - Embedding providers (Ollama, OpenAI, hash fallback)
//! - [`store`] - Vector store adapters (Qdrant REST, in-memory)
//! - [`retrieval`] - Classifier, hybrid retriever, reranker, synthesizer
//! - [`indexer`] - Incremental indexing coordinator with orphan sweep
//! - [`manifest`] - Three-tier tool manifest
//! - [`tools`] - Tool handlers, registry and result envelope
//! - [`server`] - Line-delimited JSON-RPC 2.0 over stdio (MCP)
//! - [`service`] - Process-wide wiring of the above
//! - [`telemetry`] - Tracing and metrics infrastructure
//!
//! # Example
//!
//! ```rust,ignore
//! use quarry::config::load_config;
//! use quarry::service::QuarryService;
//!
//! let config = load_config(&std::env::current_dir()?)?;
//! let service = QuarryService::new(config).await?;
//! service.startup().await?;
//!
//! let answer = service.pipeline().ask("list all the features").await?;
//! println!("{}", answer.text);
//! ```

pub mod chunk;
pub mod chunking;
pub mod config;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod manifest;
pub mod retrieval;
pub mod server;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod tools;

// Re-export commonly used types at crate root
pub use chunk::{content_hash, normalize_path, point_id, Chunk, ChunkPayload, ContentType};
pub use error::{
    ChunkError, ConfigError, EmbedError, ErrorCode, IndexError, QueryError, Result, StoreError,
    ToolError,
};
pub use service::QuarryService;

/// Quarry version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let id = point_id("docs/a.md", 1);
        assert!(id < (1u64 << 63) - 1);
        assert_eq!(ErrorCode::ConfigError.as_str(), "CONFIG_ERROR");
    }
}

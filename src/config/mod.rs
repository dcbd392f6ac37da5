// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading and types.
//!
//! Configuration is loaded once per process; re-reads require restart.

pub mod loader;
pub mod types;

pub use loader::{
    example_config, find_config_file, load_config, load_config_file, write_example_config,
    CONFIG_FILES, ENV_CONFIG_FILE, ENV_PROJECT_ROOT,
};
pub use types::{
    ChunkingConfig, CodeChunkStrategy, CollectionTarget, EmbeddingModels, HybridRetrievalConfig,
    HybridWeights, QdrantEndpoint, ServerConfig,
};

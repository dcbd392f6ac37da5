// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading.
//!
//! Finds and parses the JSON config file, resolves relative paths against
//! the config file's directory, and applies environment-variable overrides.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::{QdrantEndpoint, ServerConfig};

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &[".quarry.json", ".quarry/config.json", "quarry.config.json"];

/// Environment variable naming the config file explicitly.
pub const ENV_CONFIG_FILE: &str = "MCP_CONFIG_FILE";

/// Environment variable overriding the project root.
pub const ENV_PROJECT_ROOT: &str = "MCP_PROJECT_ROOT";

/// Load configuration, applying env overrides and validating the result.
///
/// Resolution order: `MCP_CONFIG_FILE` if set, otherwise the first of
/// [`CONFIG_FILES`] found under `workspace_root`.
pub fn load_config(workspace_root: &Path) -> Result<ServerConfig, ConfigError> {
    let path = find_config_file(workspace_root).ok_or_else(|| {
        ConfigError::NotFound(format!(
            "no config file found under {} (looked for {})",
            workspace_root.display(),
            CONFIG_FILES.join(", ")
        ))
    })?;

    load_config_file(&path)
}

/// Load and validate a specific config file.
pub fn load_config_file(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: ServerConfig = serde_json::from_str(&content)?;

    let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
    resolve_project_root(&mut config, config_dir);
    apply_env_overrides(&mut config);
    config.validate()?;

    Ok(config)
}

/// Locate the config file for a workspace.
///
/// `MCP_CONFIG_FILE` wins; then the workspace files in order; then the
/// user-global `~/.quarry/config.json`.
pub fn find_config_file(workspace_root: &Path) -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var(ENV_CONFIG_FILE) {
        let path = PathBuf::from(explicit);
        if path.exists() {
            return Some(path);
        }
        return None;
    }

    if let Some(found) = CONFIG_FILES
        .iter()
        .map(|name| workspace_root.join(name))
        .find(|path| path.exists())
    {
        return Some(found);
    }

    dirs::home_dir()
        .map(|home| home.join(".quarry").join("config.json"))
        .filter(|path| path.exists())
}

/// Resolve a relative `project_root` against the config file's directory.
fn resolve_project_root(config: &mut ServerConfig, config_dir: &Path) {
    let root = Path::new(&config.project_root);
    if root.is_relative() {
        config.project_root = config_dir.join(root).to_string_lossy().to_string();
    }
}

/// Apply environment-variable overrides after parsing.
///
/// `QDRANT_CLOUD_URL`, `QDRANT_API_KEY` and `QDRANT_COLLECTION` override the
/// cloud endpoint; `MCP_PROJECT_ROOT` overrides the project root.
fn apply_env_overrides(config: &mut ServerConfig) {
    if let Ok(root) = std::env::var(ENV_PROJECT_ROOT) {
        config.project_root = root;
    }

    let cloud_url = std::env::var("QDRANT_CLOUD_URL").ok();
    let api_key = std::env::var("QDRANT_API_KEY").ok();
    let collection = std::env::var("QDRANT_COLLECTION").ok();

    if cloud_url.is_none() && api_key.is_none() && collection.is_none() {
        return;
    }

    match config.cloud_qdrant.as_mut() {
        Some(endpoint) => {
            if let Some(url) = cloud_url {
                endpoint.url = url;
            }
            if api_key.is_some() {
                endpoint.api_key = api_key;
            }
            if let Some(name) = collection {
                endpoint.collection = name;
            }
        }
        None => {
            // A URL from the environment is enough to bring the endpoint up
            if let Some(url) = cloud_url {
                config.cloud_qdrant = Some(QdrantEndpoint {
                    url,
                    api_key,
                    collection: collection.unwrap_or_else(|| "quarry".to_string()),
                    timeout: 30,
                    retry_attempts: 3,
                });
            }
        }
    }
}

/// Write an example configuration for `quarry setup`.
pub fn write_example_config(workspace_root: &Path) -> Result<PathBuf, ConfigError> {
    let config = example_config();
    let path = workspace_root.join(CONFIG_FILES[0]);
    let content = serde_json::to_string_pretty(&config)?;
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Example configuration showing every key.
pub fn example_config() -> ServerConfig {
    let json = serde_json::json!({
        "project_root": ".",
        "local_qdrant": {
            "url": "http://localhost:6333",
            "collection": "quarry_local",
            "timeout": 30,
            "retry_attempts": 3
        },
        "local_docs": ["docs/**/*.md", "README.md"],
        "code_paths": ["src/**/*.py", "src/**/*.ts"],
        "embedding_models": {
            "doc": "nomic-embed-text",
            "code": "nomic-embed-text"
        },
        "hybrid_retrieval": {
            "search_top_k": 20,
            "rerank_top_k": 10,
            "max_results": 10,
            "hybrid_weights": { "bm25": 0.3, "vector": 0.7 }
        },
        "chunking": {
            "doc_chunk_size": 1000,
            "doc_chunk_overlap": 100,
            "code_chunk_strategy": "ast",
            "code_chunk_overlap": 0
        },
        "exclude_patterns": ["**/node_modules/**", "**/target/**", "**/.git/**"]
    });
    serde_json::from_value(json).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_not_found() {
        let temp = TempDir::new().unwrap();
        let result = load_config(temp.path());
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_config_resolves_relative_root() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".quarry.json");
        std::fs::write(
            &path,
            r#"{
                "project_root": "repo",
                "local_qdrant": {"url": "http://localhost:6333", "collection": "c"},
                "local_docs": ["docs/**/*.md"]
            }"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(
            Path::new(&config.project_root),
            temp.path().join("repo").as_path()
        );
    }

    #[test]
    fn test_load_config_rejects_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".quarry.json");
        std::fs::write(&path, r#"{"project_root": ".", "extra_key": 1}"#).unwrap();
        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_config_file_search_order() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".quarry")).unwrap();
        std::fs::write(temp.path().join(".quarry/config.json"), "{}").unwrap();
        std::fs::write(temp.path().join(".quarry.json"), "{}").unwrap();

        let found = find_config_file(temp.path()).unwrap();
        assert!(found.ends_with(".quarry.json"));
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = example_config();
        assert!(config.validate().is_ok());
        assert!(config.local_qdrant.is_some());
    }

    #[test]
    fn test_write_example_config() {
        let temp = TempDir::new().unwrap();
        let path = write_example_config(temp.path()).unwrap();
        assert!(path.exists());
        let reloaded = load_config_file(&path).unwrap();
        assert!(reloaded.local_qdrant.is_some());
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Service wiring.
//!
//! [`QuarryService`] assembles the process-wide singletons (stores,
//! embedder, query pipeline) from configuration and hands them to the tool
//! surface, the MCP server loop and the CLI. Configuration is read once;
//! re-reads require restart.

use std::sync::Arc;

use crate::config::{CollectionTarget, ServerConfig};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{IndexError, StoreError, ToolError};
use crate::indexer::{IndexOptions, IndexReport, Indexer};
use crate::retrieval::{create_reranker, QueryPipeline, Reranker, Retriever};
use crate::store::{QdrantStore, VectorStore};

/// Process-wide service context.
pub struct QuarryService {
    config: Arc<ServerConfig>,
    stores: Vec<Arc<dyn VectorStore>>,
    embedder: Arc<dyn Embedder>,
    pipeline: QueryPipeline,
}

impl QuarryService {
    /// Build the service from configuration: Qdrant stores (cloud first),
    /// the embedding provider, and the query pipeline.
    pub async fn new(config: ServerConfig) -> crate::error::Result<Self> {
        let config = Arc::new(config);

        let mut stores: Vec<Arc<dyn VectorStore>> = Vec::new();
        if let Some(endpoint) = &config.cloud_qdrant {
            stores.push(Arc::new(QdrantStore::new("cloud", endpoint)?));
        }
        if let Some(endpoint) = &config.local_qdrant {
            stores.push(Arc::new(QdrantStore::new("local", endpoint)?));
        }

        let embedder = create_embedder(&config).await?;
        let reranker = create_reranker(&config);

        Ok(Self::assemble(config, stores, embedder, reranker))
    }

    /// Assemble from pre-built parts. Lets tests run the full surface
    /// against in-memory stores and the deterministic embedder.
    pub fn assemble(
        config: Arc<ServerConfig>,
        stores: Vec<Arc<dyn VectorStore>>,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
    ) -> Self {
        let retriever = Retriever::new(
            stores.clone(),
            embedder.clone(),
            config.hybrid_retrieval.clone(),
        );
        let pipeline = QueryPipeline::new(retriever, reranker, config.hybrid_retrieval.clone());

        Self {
            config,
            stores,
            embedder,
            pipeline,
        }
    }

    /// Ensure every configured collection exists with the embedder's
    /// dimension. A dimension conflict here is fatal for startup.
    pub async fn startup(&self) -> Result<(), StoreError> {
        for store in &self.stores {
            store.ensure_collection(self.embedder.dimensions()).await?;
        }
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn stores(&self) -> &[Arc<dyn VectorStore>] {
        &self.stores
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    pub fn pipeline(&self) -> &QueryPipeline {
        &self.pipeline
    }

    /// Pick a store by target name; `None` selects the first configured
    /// (cloud when both exist).
    pub fn store_for(&self, target: Option<&str>) -> Result<Arc<dyn VectorStore>, ToolError> {
        match target {
            None => self
                .stores
                .first()
                .cloned()
                .ok_or_else(|| ToolError::ExecutionFailed("no vector store configured".into())),
            Some(name) => self
                .stores
                .iter()
                .find(|store| store.name() == name)
                .cloned()
                .ok_or_else(|| {
                    ToolError::InvalidInput(format!(
                        "unknown collection target '{}'; configured: {}",
                        name,
                        self.stores
                            .iter()
                            .map(|s| s.name())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                }),
        }
    }

    fn target_of(&self, store: &Arc<dyn VectorStore>) -> CollectionTarget {
        if store.name() == "cloud" {
            CollectionTarget::Cloud
        } else {
            CollectionTarget::Local
        }
    }

    /// Run an indexing pass against one collection target.
    pub async fn index(
        &self,
        target: Option<&str>,
        options: IndexOptions,
    ) -> Result<IndexReport, ToolError> {
        let store = self.store_for(target)?;
        let collection_target = self.target_of(&store);

        let mut indexer = Indexer::new(
            store,
            self.embedder.clone(),
            self.config.clone(),
            collection_target,
        )?;
        let report = indexer.run(options).await?;
        self.pipeline.invalidate_lexical().await;
        Ok(report)
    }

    /// Index one file through the incremental path.
    pub async fn index_document(
        &self,
        relative: &str,
        target: Option<&str>,
    ) -> Result<IndexReport, ToolError> {
        let store = self.store_for(target)?;
        let collection_target = self.target_of(&store);

        let mut indexer = Indexer::new(
            store,
            self.embedder.clone(),
            self.config.clone(),
            collection_target,
        )?;
        let report = indexer
            .index_document(relative)
            .await
            .map_err(|e| match e {
                IndexError::IoError(msg) => ToolError::InvalidInput(msg),
                other => ToolError::Index(other),
            })?;
        self.pipeline.invalidate_lexical().await;
        Ok(report)
    }

    /// Signal that the collection changed outside an index run.
    pub async fn collection_changed(&self) {
        self.pipeline.invalidate_lexical().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::FallbackEmbedder;
    use crate::retrieval::NoopReranker;
    use crate::store::MemoryStore;

    fn service_with_two_stores() -> QuarryService {
        let config = Arc::new(crate::config::example_config());
        let stores: Vec<Arc<dyn VectorStore>> = vec![
            Arc::new(MemoryStore::new("cloud", "c")),
            Arc::new(MemoryStore::new("local", "l")),
        ];
        QuarryService::assemble(
            config,
            stores,
            Arc::new(FallbackEmbedder::new(32)),
            Arc::new(NoopReranker),
        )
    }

    #[tokio::test]
    async fn test_store_selection() {
        let service = service_with_two_stores();
        assert_eq!(service.store_for(None).unwrap().name(), "cloud");
        assert_eq!(service.store_for(Some("local")).unwrap().name(), "local");
        assert!(service.store_for(Some("staging")).is_err());
    }

    #[tokio::test]
    async fn test_startup_creates_collections() {
        let service = service_with_two_stores();
        service.startup().await.unwrap();
        for store in service.stores() {
            assert_eq!(store.stats().await.unwrap().total(), 0);
        }
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Indexer coordinator.
//!
//! Walks the configured globs, chunks each file, and reconciles the result
//! against the collection: unchanged chunks are skipped, changed chunks are
//! overwritten in place (same deterministic id), vanished chunks are
//! soft-deleted, and reappearing chunks are recovered. An optional cleanup
//! pass soft-deletes every chunk whose file left the live set; it dry-runs
//! by default and only mutates under an explicit prune.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use walkdir::WalkDir;

use crate::chunk::{normalize_path, Chunk};
use crate::chunking::{is_markdown_path, language_for_extension, CodeChunker, DocChunker};
use crate::config::{CollectionTarget, ServerConfig};
use crate::embedding::Embedder;
use crate::error::IndexError;
use crate::store::{scroll_all, Filter, Point, VectorStore};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

/// Texts embedded per provider call.
const EMBED_BATCH: usize = 32;

/// What an indexing run should do.
#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    /// Index the doc globs.
    pub docs: bool,
    /// Index the code globs.
    pub code: bool,
    /// Run the orphan sweep after processing.
    pub cleanup: bool,
    /// Apply the sweep; without this, cleanup only reports counts.
    pub prune: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            docs: true,
            code: true,
            cleanup: false,
            prune: false,
        }
    }
}

/// Outcome of one indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub files_seen: u32,
    pub files_skipped: u32,
    pub files_errored: u32,
    pub chunks_upserted: u32,
    pub chunks_unchanged: u32,
    pub chunks_recovered: u32,
    pub chunks_soft_deleted: u32,
    pub orphaned_files: u32,
    pub orphaned_chunks: u32,
    /// Whether the orphan sweep actually mutated the collection.
    pub pruned: bool,
    pub duration_ms: u64,
    /// RFC 3339 completion time.
    pub finished_at: String,
}

impl IndexReport {
    /// True when nothing failed; partial failures drive exit code 4.
    pub fn is_clean(&self) -> bool {
        self.files_errored == 0
    }
}

/// Coordinates chunkers, the embedder and one collection.
pub struct Indexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    config: Arc<ServerConfig>,
    target: CollectionTarget,
    doc_chunker: DocChunker,
    code_chunker: CodeChunker,
    exclude: GlobSet,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: Arc<ServerConfig>,
        target: CollectionTarget,
    ) -> Result<Self, IndexError> {
        let doc_chunker = DocChunker::new(config.chunking.clone());
        let code_chunker = CodeChunker::new(config.chunking.code_chunk_strategy)
            .map_err(|e| IndexError::IoError(e.to_string()))?;
        let exclude = build_globset(&config.exclude_patterns)?;

        Ok(Self {
            store,
            embedder,
            config,
            target,
            doc_chunker,
            code_chunker,
            exclude,
        })
    }

    /// Run an incremental index pass.
    pub async fn run(&mut self, options: IndexOptions) -> Result<IndexReport, IndexError> {
        let start = Instant::now();
        let mut report = IndexReport::default();

        self.store
            .ensure_collection(self.embedder.dimensions())
            .await?;

        let (files, skipped) = self.collect_files(&options)?;
        report.files_skipped = skipped;
        let mut live: BTreeSet<String> = BTreeSet::new();

        for (absolute, relative) in files {
            report.files_seen += 1;
            live.insert(relative.clone());

            match self.index_file(&absolute, &relative, &mut report).await {
                Ok(()) => {}
                Err(err) => {
                    tracing::warn!(file = %relative, error = %err, "failed to index file");
                    report.files_errored += 1;
                }
            }
        }

        if options.cleanup {
            self.sweep_orphans(&live, options.prune, &mut report)
                .await?;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        report.finished_at = chrono::Utc::now().to_rfc3339();

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("indexer.run", start.elapsed());

        tracing::info!(
            target = self.target.as_str(),
            files = report.files_seen,
            upserted = report.chunks_upserted,
            unchanged = report.chunks_unchanged,
            soft_deleted = report.chunks_soft_deleted,
            "index run finished"
        );
        Ok(report)
    }

    /// Index a single file by project-relative path (the `add_document` /
    /// `update_document` tools). Same incremental semantics as a full run.
    pub async fn index_document(&mut self, relative: &str) -> Result<IndexReport, IndexError> {
        let start = Instant::now();
        let mut report = IndexReport::default();

        self.store
            .ensure_collection(self.embedder.dimensions())
            .await?;

        let relative = normalize_path(relative);
        let absolute = Path::new(&self.config.project_root).join(&relative);
        if !absolute.is_file() {
            return Err(IndexError::IoError(format!(
                "no such file under project root: {}",
                relative
            )));
        }

        report.files_seen = 1;
        self.index_file(&absolute, &relative, &mut report).await?;
        report.duration_ms = start.elapsed().as_millis() as u64;
        report.finished_at = chrono::Utc::now().to_rfc3339();
        Ok(report)
    }

    /// Enumerate files matching the configured globs, in walk order, docs
    /// before code. Paths that do not resolve under the project root are
    /// skipped with a warning and never take part in the orphan sweep.
    fn collect_files(
        &self,
        options: &IndexOptions,
    ) -> Result<(Vec<(std::path::PathBuf, String)>, u32), IndexError> {
        let project_root = Path::new(&self.config.project_root);
        let mut groups: Vec<&[String]> = Vec::new();
        if options.docs {
            groups.push(self.config.doc_globs(self.target));
        }
        if options.code {
            groups.push(&self.config.code_paths);
        }

        let mut files = Vec::new();
        let mut skipped = 0u32;
        let mut seen: BTreeSet<String> = BTreeSet::new();

        for patterns in groups {
            if patterns.is_empty() {
                continue;
            }
            let includes = build_globset(patterns)?;

            for entry in WalkDir::new(project_root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                let relative = match path.strip_prefix(project_root) {
                    Ok(rel) => normalize_path(&rel.to_string_lossy()),
                    Err(_) => {
                        tracing::warn!(path = %path.display(), "path outside project root, skipping");
                        skipped += 1;
                        continue;
                    }
                };
                if self.exclude.is_match(&relative) {
                    continue;
                }
                if includes.is_match(&relative) && seen.insert(relative.clone()) {
                    files.push((path.to_path_buf(), relative));
                }
            }
        }

        Ok((files, skipped))
    }

    /// Reconcile one file against its stored chunks.
    async fn index_file(
        &mut self,
        absolute: &Path,
        relative: &str,
        report: &mut IndexReport,
    ) -> Result<(), IndexError> {
        let content = std::fs::read_to_string(absolute)?;

        let chunks = self.chunk_file(relative, &content)?;

        // existing state, deleted included so recovery is visible
        let existing = scroll_all(self.store.as_ref(), &Filter::file(relative)).await?;
        let mut by_line: HashMap<u32, (String, bool, u64)> = existing
            .into_iter()
            .map(|p| {
                (
                    p.payload.line_start,
                    (p.payload.content_hash.clone(), p.payload.is_deleted, p.id),
                )
            })
            .collect();

        let mut to_embed: Vec<Chunk> = Vec::new();
        for chunk in chunks {
            match by_line.remove(&chunk.payload.line_start) {
                Some((hash, false, _)) if hash == chunk.payload.content_hash => {
                    report.chunks_unchanged += 1;
                }
                Some((hash, true, _)) if hash == chunk.payload.content_hash => {
                    // reappeared after soft delete; the upsert clears the flag
                    report.chunks_recovered += 1;
                    to_embed.push(chunk);
                }
                Some(_) => {
                    // same key, new content: overwrite in place via the
                    // deterministic id
                    report.chunks_upserted += 1;
                    to_embed.push(chunk);
                }
                None => {
                    report.chunks_upserted += 1;
                    to_embed.push(chunk);
                }
            }
        }

        // anything left in the stored map vanished from the file
        let stale: Vec<u64> = by_line
            .values()
            .filter(|(_, deleted, _)| !deleted)
            .map(|(_, _, id)| *id)
            .collect();
        if !stale.is_empty() {
            let changed = self.store.soft_delete_ids(&stale).await?;
            report.chunks_soft_deleted += changed as u32;
        }

        // embed and upsert in source order
        let mut points = Vec::with_capacity(to_embed.len());
        for batch in to_embed.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            for (chunk, vector) in batch.iter().zip(vectors) {
                points.push(Point::from_chunk(chunk.clone(), vector.values));
            }
        }
        if !points.is_empty() {
            self.store.upsert(points).await?;
        }

        Ok(())
    }

    fn chunk_file(&mut self, relative: &str, content: &str) -> Result<Vec<Chunk>, IndexError> {
        if is_markdown_path(relative) {
            return Ok(self.doc_chunker.chunk(relative, content));
        }

        let ext = Path::new(relative)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let language = language_for_extension(ext).unwrap_or(ext);
        let language = if language.is_empty() { "text" } else { language };

        self.code_chunker
            .chunk(relative, content, language)
            .map_err(|e| IndexError::IoError(e.to_string()))
    }

    /// Soft-delete every chunk whose file is no longer in the live set.
    async fn sweep_orphans(
        &self,
        live: &BTreeSet<String>,
        prune: bool,
        report: &mut IndexReport,
    ) -> Result<(), IndexError> {
        let active = scroll_all(self.store.as_ref(), &Filter::active()).await?;

        let mut orphans: HashMap<String, Vec<u64>> = HashMap::new();
        for point in active {
            if !live.contains(&point.payload.file_path) {
                orphans
                    .entry(point.payload.file_path.clone())
                    .or_default()
                    .push(point.id);
            }
        }

        report.orphaned_files = orphans.len() as u32;
        report.orphaned_chunks = orphans.values().map(|ids| ids.len() as u32).sum();

        if !prune {
            tracing::info!(
                files = report.orphaned_files,
                chunks = report.orphaned_chunks,
                "orphan sweep dry run; pass --prune to apply"
            );
            return Ok(());
        }

        for (path, ids) in orphans {
            tracing::info!(file = %path, chunks = ids.len(), "soft-deleting orphaned file");
            let changed = self.store.soft_delete_ids(&ids).await?;
            report.chunks_soft_deleted += changed as u32;
        }
        report.pruned = true;
        Ok(())
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, IndexError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| IndexError::InvalidGlob {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| IndexError::InvalidGlob {
        pattern: patterns.join(","),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QdrantEndpoint;
    use crate::embedding::FallbackEmbedder;
    use crate::store::MemoryStore;
    use tempfile::TempDir;

    fn test_config(root: &Path) -> Arc<ServerConfig> {
        let mut config = ServerConfig::default();
        config.project_root = root.to_string_lossy().to_string();
        config.local_qdrant = Some(QdrantEndpoint {
            url: "http://localhost:6333".to_string(),
            api_key: None,
            collection: "test".to_string(),
            timeout: 5,
            retry_attempts: 1,
        });
        config.local_docs = vec!["docs/**/*.md".to_string()];
        config.code_paths = vec!["src/**/*.py".to_string()];
        config.exclude_patterns = vec!["**/ignored/**".to_string()];
        Arc::new(config)
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    async fn indexer_with_store(root: &Path) -> (Indexer, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new("local", "test"));
        let embedder = Arc::new(FallbackEmbedder::new(64));
        let indexer = Indexer::new(
            store.clone(),
            embedder,
            test_config(root),
            CollectionTarget::Local,
        )
        .unwrap();
        (indexer, store)
    }

    #[tokio::test]
    async fn test_initial_index_run() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "docs/a.md",
            "# Title\n## Features\n1. Alpha\n2. Beta\n3. Gamma\n",
        );
        write(temp.path(), "src/x.py", "def greet():\n    return \"hi\"\n");

        let (mut indexer, store) = indexer_with_store(temp.path()).await;
        let report = indexer.run(IndexOptions::default()).await.unwrap();

        assert_eq!(report.files_seen, 2);
        assert_eq!(report.files_errored, 0);
        assert!(report.chunks_upserted >= 3);
        assert_eq!(report.chunks_soft_deleted, 0);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.deleted, 0);
        assert!(stats.active >= 3);
    }

    #[tokio::test]
    async fn test_reindex_unchanged_is_a_noop() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "docs/a.md",
            "# Title\n## Features\n1. Alpha\n2. Beta\n3. Gamma\n",
        );

        let (mut indexer, _store) = indexer_with_store(temp.path()).await;
        let first = indexer.run(IndexOptions::default()).await.unwrap();
        assert!(first.chunks_upserted > 0);

        let second = indexer.run(IndexOptions::default()).await.unwrap();
        assert_eq!(second.chunks_upserted, 0);
        assert_eq!(second.chunks_soft_deleted, 0);
        assert_eq!(second.chunks_recovered, 0);
        assert_eq!(second.chunks_unchanged, first.chunks_upserted);
    }

    #[tokio::test]
    async fn test_incremental_edit_overwrites_one_chunk() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "docs/a.md",
            "# Title\n## Features\n1. Alpha\n2. Beta\n3. Gamma\n",
        );

        let (mut indexer, store) = indexer_with_store(temp.path()).await;
        indexer.run(IndexOptions::default()).await.unwrap();
        let before = store.stats().await.unwrap();

        write(
            temp.path(),
            "docs/a.md",
            "# Title\n## Features\n1. Alpha\n2. Bravo\n3. Gamma\n",
        );
        let report = indexer.run(IndexOptions::default()).await.unwrap();

        assert_eq!(report.chunks_upserted, 1);
        assert_eq!(report.chunks_soft_deleted, 0);
        let after = store.stats().await.unwrap();
        assert_eq!(before.total(), after.total(), "overwrite, not insert");
    }

    #[tokio::test]
    async fn test_cleanup_dry_run_then_prune() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "docs/a.md", "# A\nAlpha doc.\n");
        write(temp.path(), "docs/b.md", "# B\nBeta doc.\n");

        let (mut indexer, store) = indexer_with_store(temp.path()).await;
        indexer.run(IndexOptions::default()).await.unwrap();

        // b.md leaves the live set
        std::fs::remove_file(temp.path().join("docs/b.md")).unwrap();

        let dry = indexer
            .run(IndexOptions {
                cleanup: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(dry.orphaned_files, 1);
        assert!(dry.orphaned_chunks >= 1);
        assert!(!dry.pruned);
        assert_eq!(store.stats().await.unwrap().deleted, 0, "dry run mutates nothing");

        let pruned = indexer
            .run(IndexOptions {
                cleanup: true,
                prune: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(pruned.pruned);
        let stats = store.stats().await.unwrap();
        assert!(stats.deleted >= 1, "orphans are soft-deleted, not removed");
    }

    #[tokio::test]
    async fn test_soft_deleted_file_recovers_on_reappearance() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "docs/a.md", "# A\nAlpha doc.\n");

        let (mut indexer, store) = indexer_with_store(temp.path()).await;
        indexer.run(IndexOptions::default()).await.unwrap();

        store.soft_delete(&Filter::file("docs/a.md")).await.unwrap();
        assert!(store.stats().await.unwrap().deleted > 0);

        let report = indexer.run(IndexOptions::default()).await.unwrap();
        assert!(report.chunks_recovered > 0);
        assert_eq!(store.stats().await.unwrap().deleted, 0);
    }

    #[tokio::test]
    async fn test_removed_chunk_is_soft_deleted() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "docs/a.md",
            "# A\nIntro prose.\n## Steps\n1. One\n2. Two\n",
        );

        let (mut indexer, store) = indexer_with_store(temp.path()).await;
        indexer.run(IndexOptions::default()).await.unwrap();

        // drop the list; its chunk id must be soft-deleted
        write(temp.path(), "docs/a.md", "# A\nIntro prose.\n");
        let report = indexer.run(IndexOptions::default()).await.unwrap();

        assert!(report.chunks_soft_deleted >= 1);
        assert!(store.stats().await.unwrap().deleted >= 1);
    }

    #[tokio::test]
    async fn test_exclude_patterns_are_honored() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "docs/a.md", "# A\nKeep.\n");
        write(temp.path(), "docs/ignored/b.md", "# B\nSkip.\n");

        let (mut indexer, _store) = indexer_with_store(temp.path()).await;
        let report = indexer.run(IndexOptions::default()).await.unwrap();
        assert_eq!(report.files_seen, 1);
    }

    #[tokio::test]
    async fn test_docs_only_option() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "docs/a.md", "# A\nDoc.\n");
        write(temp.path(), "src/x.py", "def f():\n    pass\n");

        let (mut indexer, _store) = indexer_with_store(temp.path()).await;
        let report = indexer
            .run(IndexOptions {
                code: false,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(report.files_seen, 1);
    }

    #[test]
    fn test_invalid_glob_is_rejected() {
        assert!(matches!(
            build_globset(&["a{".to_string()]),
            Err(IndexError::InvalidGlob { .. })
        ));
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Types shared by vector store implementations.

use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, ChunkPayload, ContentType};

/// Maximum points per network call.
pub const BATCH_LIMIT: usize = 1000;

/// A stored point: id, vector, the embedded text and its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: u64,
    /// Empty when fetched without vectors.
    #[serde(default)]
    pub vector: Vec<f32>,
    pub content: String,
    pub payload: ChunkPayload,
}

impl Point {
    pub fn from_chunk(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.id,
            vector,
            content: chunk.content,
            payload: chunk.payload,
        }
    }

    pub fn into_chunk(self) -> Chunk {
        Chunk {
            id: self.id,
            content: self.content,
            payload: self.payload,
        }
    }
}

/// A point with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub point: Point,
    /// Raw cosine similarity in [-1, 1].
    pub score: f32,
}

/// Exact-match conjunction over the indexed filter keys.
///
/// `is_deleted = None` means "no constraint" for scroll and payload
/// operations, while search paths treat it as `Some(false)` so deleted
/// chunks stay hidden unless a caller opts in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub file_path: Option<String>,
    pub section: Option<String>,
    pub language: Option<String>,
    pub content_type: Option<ContentType>,
    pub is_deleted: Option<bool>,
}

impl Filter {
    /// No constraints.
    pub fn any() -> Self {
        Self::default()
    }

    /// Active (non-deleted) chunks only.
    pub fn active() -> Self {
        Self {
            is_deleted: Some(false),
            ..Default::default()
        }
    }

    /// Soft-deleted chunks only.
    pub fn deleted() -> Self {
        Self {
            is_deleted: Some(true),
            ..Default::default()
        }
    }

    /// All chunks of one file, regardless of deletion state.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            file_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Active chunks sharing a `(file_path, section)` pair.
    pub fn section(path: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            file_path: Some(path.into()),
            section: Some(section.into()),
            is_deleted: Some(false),
            ..Default::default()
        }
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Whether a payload satisfies this filter, with the given default for
    /// an unconstrained `is_deleted`.
    pub fn matches(&self, payload: &ChunkPayload, default_deleted: Option<bool>) -> bool {
        if let Some(path) = &self.file_path {
            if &payload.file_path != path {
                return false;
            }
        }
        if let Some(section) = &self.section {
            if payload.section.as_ref() != Some(section) {
                return false;
            }
        }
        if let Some(language) = &self.language {
            if &payload.language != language {
                return false;
            }
        }
        if let Some(content_type) = self.content_type {
            if payload.content_type != content_type {
                return false;
            }
        }
        let deleted_constraint = self.is_deleted.or(default_deleted);
        if let Some(deleted) = deleted_constraint {
            if payload.is_deleted != deleted {
                return false;
            }
        }
        true
    }
}

/// One page from a scroll.
#[derive(Debug, Clone)]
pub struct ScrollPage {
    pub points: Vec<Point>,
    /// Pass back to continue; `None` when exhausted.
    pub next_cursor: Option<u64>,
}

/// Point counts split by deletion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub active: u64,
    pub deleted: u64,
}

impl CollectionStats {
    pub fn total(&self) -> u64 {
        self.active + self.deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkPayload;

    fn payload(path: &str, section: Option<&str>, deleted: bool) -> ChunkPayload {
        let mut p = ChunkPayload::new(path, 1, 2, ContentType::Text, "markdown");
        p.section = section.map(|s| s.to_string());
        p.is_deleted = deleted;
        p
    }

    #[test]
    fn test_filter_matches_file_and_section() {
        let filter = Filter::section("docs/a.md", "Features");
        assert!(filter.matches(&payload("docs/a.md", Some("Features"), false), None));
        assert!(!filter.matches(&payload("docs/a.md", Some("Other"), false), None));
        assert!(!filter.matches(&payload("docs/b.md", Some("Features"), false), None));
        assert!(!filter.matches(&payload("docs/a.md", Some("Features"), true), None));
    }

    #[test]
    fn test_filter_default_deleted_constraint() {
        let filter = Filter::any();
        let deleted = payload("docs/a.md", None, true);
        // unconstrained matches everything
        assert!(filter.matches(&deleted, None));
        // search paths inject the default
        assert!(!filter.matches(&deleted, Some(false)));
        // an explicit opt-in beats the default
        let explicit = Filter::deleted();
        assert!(explicit.matches(&deleted, Some(false)));
    }

    #[test]
    fn test_filter_content_type() {
        let filter = Filter::active().with_content_type(ContentType::Code);
        let mut code = payload("src/x.py", None, false);
        code.content_type = ContentType::Code;
        assert!(filter.matches(&code, None));
        assert!(!filter.matches(&payload("src/x.py", None, false), None));
    }

    #[test]
    fn test_point_chunk_roundtrip() {
        let chunk = Chunk::new(
            "content".to_string(),
            ChunkPayload::new("docs/a.md", 1, 1, ContentType::Text, "markdown"),
        );
        let point = Point::from_chunk(chunk.clone(), vec![0.1, 0.2]);
        assert_eq!(point.id, chunk.id);
        assert_eq!(point.into_chunk(), chunk);
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The chunk data model.
//!
//! A [`Chunk`] is the atomic indexed unit: the exact text that was embedded
//! plus a payload describing where it came from. Chunk identity is derived
//! deterministically from `(file_path, line_start)` so that repeated
//! indexing runs upsert the same ids.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Structural kind of a chunk's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    List,
    Table,
    Code,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::List => "list",
            Self::Table => "table",
            Self::Code => "code",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "list" => Some(Self::List),
            "table" => Some(Self::Table),
            "code" => Some(Self::Code),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Document category, derived from the top-level path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Flow,
    Sdlc,
    Policy,
    Infrastructure,
    Other,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flow => "flow",
            Self::Sdlc => "sdlc",
            Self::Policy => "policy",
            Self::Infrastructure => "infrastructure",
            Self::Other => "other",
        }
    }
}

/// Kind of code unit a code chunk covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeType {
    Function,
    Method,
    Class,
    Module,
}

impl CodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Module => "module",
        }
    }
}

/// Payload stored alongside each vector.
///
/// `file_path`, `section`, `language`, `content_type` and `is_deleted` are
/// indexed filter keys in the collection; everything else is descriptive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Forward-slash path, relative to the project root.
    pub file_path: String,
    /// 1-based, inclusive.
    pub line_start: u32,
    /// 1-based, inclusive.
    pub line_end: u32,
    pub content_type: ContentType,
    pub language: String,
    /// Nearest enclosing heading text (docs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<DocType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_type: Option<CodeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Import lines reproduced at the top of a code chunk, in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_complete: Option<bool>,
    #[serde(default)]
    pub is_deleted: bool,
    /// SHA-256 of `content`, hex-encoded. Used to detect unchanged chunks.
    pub content_hash: String,
}

impl ChunkPayload {
    /// Minimal payload for the given location; callers fill in the rest.
    pub fn new(
        file_path: impl Into<String>,
        line_start: u32,
        line_end: u32,
        content_type: ContentType,
        language: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            line_start,
            line_end,
            content_type,
            language: language.into(),
            section: None,
            doc_type: None,
            code_type: None,
            name: None,
            class_name: None,
            imports: Vec::new(),
            list_length: None,
            is_complete: None,
            is_deleted: false,
            content_hash: String::new(),
        }
    }
}

/// The atomic indexed text unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// 63-bit deterministic id; see [`point_id`].
    pub id: u64,
    /// The exact text that was embedded.
    pub content: String,
    pub payload: ChunkPayload,
}

impl Chunk {
    /// Create a chunk, deriving its id and content hash.
    pub fn new(content: String, mut payload: ChunkPayload) -> Self {
        payload.content_hash = content_hash(&content);
        let id = point_id(&payload.file_path, payload.line_start);
        Self {
            id,
            content,
            payload,
        }
    }

    pub fn line_count(&self) -> u32 {
        self.payload
            .line_end
            .saturating_sub(self.payload.line_start)
            + 1
    }

    /// `file:start-end` locator used in citations and code output.
    pub fn locator(&self) -> String {
        format!(
            "{}:{}-{}",
            self.payload.file_path, self.payload.line_start, self.payload.line_end
        )
    }
}

/// Derive the deterministic 63-bit point id for `(file_path, line_start)`.
///
/// `H(file_path:line_start) mod (2^63 - 1)` where H takes the first eight
/// bytes of the SHA-256 digest. Same inputs always yield the same id; this
/// is the sole duplicate-prevention mechanism.
pub fn point_id(file_path: &str, line_start: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}", file_path, line_start).as_bytes());
    let digest = hasher.finalize();
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(raw) % ((1u64 << 63) - 1)
}

/// SHA-256 of content, hex-encoded.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalize a path for storage and comparison: forward slashes, lowercase
/// drive letter, no leading `./`.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    if let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_string();
    }
    // Windows drive letters compare case-insensitively
    let bytes = normalized.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_uppercase() {
        let mut chars: Vec<char> = normalized.chars().collect();
        chars[0] = chars[0].to_ascii_lowercase();
        normalized = chars.into_iter().collect();
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_deterministic() {
        let a = point_id("docs/a.md", 3);
        let b = point_id("docs/a.md", 3);
        let c = point_id("docs/a.md", 4);
        let d = point_id("docs/b.md", 3);

        assert_eq!(a, b, "Same inputs should produce the same id");
        assert_ne!(a, c, "Different line should produce a different id");
        assert_ne!(a, d, "Different path should produce a different id");
    }

    #[test]
    fn test_point_id_is_63_bit() {
        for (path, line) in [
            ("docs/a.md", 1),
            ("src/deep/nested/path.py", 9999),
            ("x", 0),
        ] {
            assert!(point_id(path, line) < (1u64 << 63) - 1);
        }
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        let h1 = content_hash("1. Alpha\n2. Beta");
        let h2 = content_hash("1. Alpha\n2. Bravo");
        assert_ne!(h1, h2);
        assert_eq!(h1, content_hash("1. Alpha\n2. Beta"));
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_chunk_new_fills_identity() {
        let payload = ChunkPayload::new("docs/a.md", 3, 5, ContentType::List, "markdown");
        let chunk = Chunk::new("1. Alpha\n2. Beta\n3. Gamma".to_string(), payload);

        assert_eq!(chunk.id, point_id("docs/a.md", 3));
        assert_eq!(chunk.payload.content_hash, content_hash(&chunk.content));
        assert_eq!(chunk.line_count(), 3);
        assert_eq!(chunk.locator(), "docs/a.md:3-5");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("docs\\guide\\a.md"), "docs/guide/a.md");
        assert_eq!(normalize_path("./docs/a.md"), "docs/a.md");
        assert_eq!(normalize_path("C:/repo/a.md"), "c:/repo/a.md");
        assert_eq!(normalize_path("docs/a.md"), "docs/a.md");
    }

    #[test]
    fn test_payload_roundtrip() {
        let mut payload = ChunkPayload::new("docs/a.md", 3, 5, ContentType::List, "markdown");
        payload.section = Some("Features".to_string());
        payload.list_length = Some(3);
        payload.is_complete = Some(true);
        payload.doc_type = Some(DocType::Other);

        let json = serde_json::to_string(&payload).unwrap();
        let parsed: ChunkPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(payload, parsed);
        // absent optionals stay off the wire
        assert!(!json.contains("class_name"));
        assert!(!json.contains("imports"));
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Structure-aware Markdown chunking.
//!
//! Walks a document once, maintaining the heading context. Numbered lists,
//! pipe tables and fenced code blocks are captured whole, regardless of
//! size; remaining prose is packed into overlapping chunks that never cross
//! a heading boundary.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::chunk::{Chunk, ChunkPayload, ContentType, DocType};
use crate::config::ChunkingConfig;

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*$").unwrap());
static NUMBERED_ITEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\.\s").unwrap());
static TABLE_ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\|.*\|\s*$").unwrap());
static TABLE_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\|[\s:\-|]+\|\s*$").unwrap());
static FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(```+|~~~+)\s*(\S*)\s*$").unwrap());

/// Default mapping from a path's top-level directory segment to [`DocType`].
pub fn default_doc_type_map() -> Vec<(String, DocType)> {
    vec![
        ("flows".to_string(), DocType::Flow),
        ("flow".to_string(), DocType::Flow),
        ("sdlc".to_string(), DocType::Sdlc),
        ("process".to_string(), DocType::Sdlc),
        ("policies".to_string(), DocType::Policy),
        ("policy".to_string(), DocType::Policy),
        ("infrastructure".to_string(), DocType::Infrastructure),
        ("infra".to_string(), DocType::Infrastructure),
    ]
}

/// Markdown chunker.
pub struct DocChunker {
    config: ChunkingConfig,
    doc_type_map: Vec<(String, DocType)>,
}

/// Accumulates prose lines between structural elements.
struct ProseBuffer {
    lines: Vec<(u32, String)>,
    /// How many leading lines are overlap carried from the previous chunk.
    /// A buffer holding only overlap is never emitted again.
    seeded: usize,
}

impl ProseBuffer {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            seeded: 0,
        }
    }

    fn push(&mut self, line_no: u32, text: &str) {
        // leading blanks carry no content
        if self.lines.is_empty() && text.trim().is_empty() {
            return;
        }
        self.lines.push((line_no, text.to_string()));
    }

    fn char_len(&self) -> usize {
        self.lines.iter().map(|(_, l)| l.len() + 1).sum()
    }

    fn is_empty(&self) -> bool {
        self.lines.len() <= self.seeded || self.lines.iter().all(|(_, l)| l.trim().is_empty())
    }

    fn take(&mut self) -> Vec<(u32, String)> {
        self.seeded = 0;
        std::mem::take(&mut self.lines)
    }

    fn seed(&mut self, overlap: Vec<(u32, String)>) {
        self.seeded = overlap.len();
        self.lines = overlap;
    }
}

impl DocChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self {
            config,
            doc_type_map: default_doc_type_map(),
        }
    }

    pub fn with_doc_type_map(config: ChunkingConfig, map: Vec<(String, DocType)>) -> Self {
        Self {
            config,
            doc_type_map: map,
        }
    }

    /// Split a Markdown document into chunks.
    ///
    /// `file_path` must already be normalized and project-root-relative.
    /// An empty document yields no chunks.
    pub fn chunk(&self, file_path: &str, content: &str) -> Vec<Chunk> {
        let doc_type = self.derive_doc_type(file_path);
        let lines: Vec<&str> = content.lines().collect();

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut section: Option<String> = None;
        let mut prose = ProseBuffer::new();
        let mut i = 0usize;

        while i < lines.len() {
            let line = lines[i];
            let line_no = (i + 1) as u32;

            if let Some(caps) = HEADING_RE.captures(line) {
                self.flush_prose(&mut prose, &mut chunks, file_path, &section, doc_type);
                let level = caps.get(1).map(|m| m.as_str().len()).unwrap_or(1);
                let title = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
                section = Some(title);
                if level == 1 {
                    // A document title is content in its own right; deeper
                    // headings live only in the section metadata.
                    prose.push(line_no, line);
                }
                i += 1;
                continue;
            }

            if let Some(caps) = FENCE_RE.captures(line) {
                self.flush_prose(&mut prose, &mut chunks, file_path, &section, doc_type);
                let marker = caps.get(1).map(|m| m.as_str()).unwrap_or("```");
                let tag = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                let (chunk, next) =
                    self.consume_fence(&lines, i, marker, tag, file_path, &section, doc_type);
                chunks.push(chunk);
                i = next;
                continue;
            }

            if NUMBERED_ITEM_RE.is_match(line) {
                self.flush_prose(&mut prose, &mut chunks, file_path, &section, doc_type);
                let (chunk, next) =
                    self.consume_numbered_list(&lines, i, file_path, &section, doc_type);
                chunks.push(chunk);
                i = next;
                continue;
            }

            if TABLE_ROW_RE.is_match(line)
                && i + 1 < lines.len()
                && TABLE_SEPARATOR_RE.is_match(lines[i + 1])
                && lines[i + 1].contains('-')
            {
                self.flush_prose(&mut prose, &mut chunks, file_path, &section, doc_type);
                let (chunk, next) = self.consume_table(&lines, i, file_path, &section, doc_type);
                chunks.push(chunk);
                i = next;
                continue;
            }

            prose.push(line_no, line);
            if prose.char_len() >= self.config.doc_chunk_size {
                self.emit_prose_with_overlap(&mut prose, &mut chunks, file_path, &section, doc_type);
            }
            i += 1;
        }

        self.flush_prose(&mut prose, &mut chunks, file_path, &section, doc_type);
        chunks
    }

    fn derive_doc_type(&self, file_path: &str) -> DocType {
        let top = file_path.split('/').next().unwrap_or("");
        self.doc_type_map
            .iter()
            .find(|(segment, _)| segment.eq_ignore_ascii_case(top))
            .map(|(_, doc_type)| *doc_type)
            .unwrap_or(DocType::Other)
    }

    fn make_chunk(
        &self,
        lines: &[(u32, String)],
        content_type: ContentType,
        language: &str,
        file_path: &str,
        section: &Option<String>,
        doc_type: DocType,
    ) -> Chunk {
        let line_start = lines.first().map(|(n, _)| *n).unwrap_or(1);
        let line_end = lines.last().map(|(n, _)| *n).unwrap_or(line_start);
        let content = lines
            .iter()
            .map(|(_, l)| l.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let mut payload =
            ChunkPayload::new(file_path, line_start, line_end, content_type, language);
        payload.section = section.clone();
        payload.doc_type = Some(doc_type);
        Chunk::new(content, payload)
    }

    fn flush_prose(
        &self,
        prose: &mut ProseBuffer,
        chunks: &mut Vec<Chunk>,
        file_path: &str,
        section: &Option<String>,
        doc_type: DocType,
    ) {
        if prose.is_empty() {
            prose.take();
            return;
        }
        let mut lines = prose.take();
        while lines.last().map(|(_, l)| l.trim().is_empty()).unwrap_or(false) {
            lines.pop();
        }
        chunks.push(self.make_chunk(
            &lines,
            ContentType::Text,
            "markdown",
            file_path,
            section,
            doc_type,
        ));
    }

    /// Emit the current prose buffer and seed the next one with the
    /// configured overlap, never re-starting on the same line.
    fn emit_prose_with_overlap(
        &self,
        prose: &mut ProseBuffer,
        chunks: &mut Vec<Chunk>,
        file_path: &str,
        section: &Option<String>,
        doc_type: DocType,
    ) {
        let lines = prose.take();
        if lines.is_empty() {
            return;
        }
        chunks.push(self.make_chunk(
            &lines,
            ContentType::Text,
            "markdown",
            file_path,
            section,
            doc_type,
        ));

        let mut overlap: Vec<(u32, String)> = Vec::new();
        let mut budget = self.config.doc_chunk_overlap;
        for entry in lines.iter().rev() {
            let cost = entry.1.len() + 1;
            if cost > budget || overlap.len() + 1 >= lines.len() {
                break;
            }
            budget -= cost;
            overlap.push(entry.clone());
        }
        overlap.reverse();
        prose.seed(overlap);
    }

    fn consume_numbered_list(
        &self,
        lines: &[&str],
        start: usize,
        file_path: &str,
        section: &Option<String>,
        doc_type: DocType,
    ) -> (Chunk, usize) {
        let mut collected: Vec<(u32, String)> = Vec::new();
        let mut item_count = 0usize;
        let mut i = start;

        while i < lines.len() {
            let line = lines[i];
            if NUMBERED_ITEM_RE.is_match(line) {
                item_count += 1;
            } else if line.trim().is_empty() || !line.starts_with(char::is_whitespace) {
                // a blank line or an unindented non-item ends the run
                break;
            }
            collected.push(((i + 1) as u32, line.to_string()));
            i += 1;
        }

        let mut chunk = self.make_chunk(
            &collected,
            ContentType::List,
            "markdown",
            file_path,
            section,
            doc_type,
        );
        chunk.payload.list_length = Some(item_count);
        chunk.payload.is_complete = Some(true);
        let chunk = Chunk::new(chunk.content, chunk.payload);
        (chunk, i)
    }

    fn consume_table(
        &self,
        lines: &[&str],
        start: usize,
        file_path: &str,
        section: &Option<String>,
        doc_type: DocType,
    ) -> (Chunk, usize) {
        let mut collected: Vec<(u32, String)> = Vec::new();
        let mut i = start;

        while i < lines.len() && TABLE_ROW_RE.is_match(lines[i]) {
            collected.push(((i + 1) as u32, lines[i].to_string()));
            i += 1;
        }

        // rows excluding the header and separator lines
        let data_rows = collected.len().saturating_sub(2);
        let mut chunk = self.make_chunk(
            &collected,
            ContentType::Table,
            "markdown",
            file_path,
            section,
            doc_type,
        );
        chunk.payload.list_length = Some(data_rows);
        chunk.payload.is_complete = Some(true);
        let chunk = Chunk::new(chunk.content, chunk.payload);
        (chunk, i)
    }

    fn consume_fence(
        &self,
        lines: &[&str],
        start: usize,
        marker: &str,
        tag: &str,
        file_path: &str,
        section: &Option<String>,
        doc_type: DocType,
    ) -> (Chunk, usize) {
        let fence_char = marker.chars().next().unwrap_or('`');
        let mut collected: Vec<(u32, String)> = vec![((start + 1) as u32, lines[start].to_string())];
        let mut i = start + 1;

        while i < lines.len() {
            collected.push(((i + 1) as u32, lines[i].to_string()));
            let trimmed = lines[i].trim_start();
            if trimmed.starts_with(fence_char)
                && trimmed.chars().take_while(|c| *c == fence_char).count() >= marker.len()
            {
                i += 1;
                break;
            }
            i += 1;
        }

        let language = if tag.is_empty() {
            "text".to_string()
        } else {
            tag.to_lowercase()
        };
        let chunk = self.make_chunk(
            &collected,
            ContentType::Code,
            &language,
            file_path,
            section,
            doc_type,
        );
        (chunk, i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> DocChunker {
        DocChunker::new(ChunkingConfig::default())
    }

    #[test]
    fn test_empty_file_yields_no_chunks() {
        assert!(chunker().chunk("docs/empty.md", "").is_empty());
        assert!(chunker().chunk("docs/blank.md", "\n\n\n").is_empty());
    }

    #[test]
    fn test_title_and_numbered_list() {
        let content = "# Title\n## Features\n1. Alpha\n2. Beta\n3. Gamma\n";
        let chunks = chunker().chunk("docs/a.md", content);

        assert_eq!(chunks.len(), 2);

        let title = &chunks[0];
        assert_eq!(title.payload.content_type, ContentType::Text);
        assert_eq!(title.payload.section.as_deref(), Some("Title"));
        assert_eq!(title.payload.line_start, 1);

        let list = &chunks[1];
        assert_eq!(list.payload.content_type, ContentType::List);
        assert_eq!(list.payload.section.as_deref(), Some("Features"));
        assert_eq!(list.payload.list_length, Some(3));
        assert_eq!(list.payload.is_complete, Some(true));
        assert_eq!(list.payload.line_start, 3);
        assert_eq!(list.payload.line_end, 5);
        assert!(list.content.contains("2. Beta"));
    }

    #[test]
    fn test_huge_list_is_never_split() {
        let mut content = String::from("# Huge\n");
        for n in 1..=10_000 {
            content.push_str(&format!("{}. item number {}\n", n, n));
        }
        let chunks = chunker().chunk("docs/huge.md", &content);

        let lists: Vec<_> = chunks
            .iter()
            .filter(|c| c.payload.content_type == ContentType::List)
            .collect();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].payload.list_length, Some(10_000));
        assert!(lists[0].content.len() > ChunkingConfig::default().doc_chunk_size);
    }

    #[test]
    fn test_table_captured_whole() {
        let content = "\
## Ports
| Service | Port |
|---------|------|
| api     | 8080 |
| metrics | 9090 |
";
        let chunks = chunker().chunk("docs/ports.md", content);
        assert_eq!(chunks.len(), 1);
        let table = &chunks[0];
        assert_eq!(table.payload.content_type, ContentType::Table);
        assert_eq!(table.payload.list_length, Some(2));
        assert_eq!(table.payload.section.as_deref(), Some("Ports"));
        assert!(table.content.contains("metrics"));
    }

    #[test]
    fn test_fenced_code_block() {
        let content = "## Usage\nRun it like this:\n```python\nprint('hi')\n```\n";
        let chunks = chunker().chunk("docs/usage.md", content);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].payload.content_type, ContentType::Text);
        let code = &chunks[1];
        assert_eq!(code.payload.content_type, ContentType::Code);
        assert_eq!(code.payload.language, "python");
        assert!(code.content.contains("print('hi')"));
        assert!(code.content.starts_with("```python"));
    }

    #[test]
    fn test_level_one_only_headings_set_section() {
        let content = "# Overview\nSome intro text.\nMore text here.\n";
        let chunks = chunker().chunk("docs/overview.md", content);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].payload.section.as_deref(), Some("Overview"));
        assert!(chunks[0].content.contains("Some intro text."));
    }

    #[test]
    fn test_prose_packing_respects_size_and_overlap() {
        let config = ChunkingConfig {
            doc_chunk_size: 200,
            doc_chunk_overlap: 50,
            ..Default::default()
        };
        let chunker = DocChunker::new(config);
        let mut content = String::from("## Long\n");
        for n in 0..40 {
            content.push_str(&format!("Prose line number {} with some padding text.\n", n));
        }
        let chunks = chunker.chunk("docs/long.md", &content);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert_eq!(chunk.payload.section.as_deref(), Some("Long"));
        }
        // overlapping windows, strictly advancing start lines
        for pair in chunks.windows(2) {
            assert!(pair[1].payload.line_start > pair[0].payload.line_start);
            assert!(pair[1].payload.line_start <= pair[0].payload.line_end + 1);
        }
    }

    #[test]
    fn test_prose_never_crosses_heading_boundary() {
        let content = "## One\nAlpha text.\n## Two\nBeta text.\n";
        let chunks = chunker().chunk("docs/two.md", content);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].payload.section.as_deref(), Some("One"));
        assert!(!chunks[0].content.contains("Beta"));
        assert_eq!(chunks[1].payload.section.as_deref(), Some("Two"));
    }

    #[test]
    fn test_doc_type_from_top_level_segment() {
        let chunker = chunker();
        let chunks = chunker.chunk("policies/security.md", "# Policy\nBe careful.\n");
        assert_eq!(chunks[0].payload.doc_type, Some(DocType::Policy));

        let chunks = chunker.chunk("infrastructure/vpc.md", "# VPC\nNetworking.\n");
        assert_eq!(chunks[0].payload.doc_type, Some(DocType::Infrastructure));

        let chunks = chunker.chunk("docs/misc.md", "# Misc\nAnything.\n");
        assert_eq!(chunks[0].payload.doc_type, Some(DocType::Other));
    }

    #[test]
    fn test_no_duplicate_line_starts() {
        let config = ChunkingConfig {
            doc_chunk_size: 120,
            doc_chunk_overlap: 60,
            ..Default::default()
        };
        let chunker = DocChunker::new(config);
        let mut content = String::from("# Doc\n");
        for n in 0..30 {
            content.push_str(&format!("line {} aaaaaaaaaaaaaaaaaaaaaa\n", n));
        }
        content.push_str("1. one\n2. two\n");
        let chunks = chunker.chunk("docs/dup.md", &content);

        let mut starts: Vec<u32> = chunks.iter().map(|c| c.payload.line_start).collect();
        starts.sort_unstable();
        starts.dedup();
        assert_eq!(starts.len(), chunks.len());
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Chunking: splitting documents and source files into indexable units.
//!
//! Markdown is split structurally (sections, lists, tables, fences); source
//! code is split per function/method/class via tree-sitter with a regex
//! fallback. Dispatch between the two is by file extension.

pub mod code;
pub mod markdown;

pub use code::{language_for_extension, CodeChunker};
pub use markdown::{default_doc_type_map, DocChunker};

/// Whether a path is chunked as Markdown documentation.
pub fn is_markdown_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.ends_with(".md") || lower.ends_with(".markdown") || lower.ends_with(".mdx")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_markdown_path() {
        assert!(is_markdown_path("docs/a.md"));
        assert!(is_markdown_path("README.MD"));
        assert!(is_markdown_path("guide.markdown"));
        assert!(!is_markdown_path("src/a.py"));
        assert!(!is_markdown_path("notes.txt"));
    }
}

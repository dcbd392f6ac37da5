// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Answer synthesis.
//!
//! Assembles a textual answer plus citations from ranked chunks. The
//! strategy is selected by intent; every emitted chunk contributes one
//! citation record, appended in first-reference order.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::classifier::QueryIntent;
use super::retriever::Candidate;

static NUMBERED_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\.\s+(.*)$").unwrap());

/// Where an answer fragment came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl Citation {
    fn from_candidate(candidate: &Candidate) -> Self {
        let payload = &candidate.point.payload;
        Self {
            file_path: payload.file_path.clone(),
            line_start: payload.line_start,
            line_end: payload.line_end,
            section: payload.section.clone(),
        }
    }
}

/// A synthesized answer with its evidence.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub intent: QueryIntent,
    pub citations: Vec<Citation>,
}

/// Tracks citations in first-reference order, one per chunk.
struct CitationTrail {
    citations: Vec<Citation>,
    seen: HashSet<u64>,
}

impl CitationTrail {
    fn new() -> Self {
        Self {
            citations: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn cite(&mut self, candidate: &Candidate) {
        if self.seen.insert(candidate.point.id) {
            self.citations.push(Citation::from_candidate(candidate));
        }
    }
}

/// Assemble an answer for the given intent.
pub fn synthesize(intent: QueryIntent, candidates: &[Candidate]) -> Answer {
    match intent {
        QueryIntent::Enumeration => enumeration(candidates),
        QueryIntent::Explanation | QueryIntent::Comparison => explanation(candidates),
        QueryIntent::CodeSearch => code_search(candidates),
        QueryIntent::Factual => factual(candidates),
    }
}

/// Two explanation syntheses side by side, one per comparison operand.
pub fn synthesize_comparison(
    operand_a: &str,
    chunks_a: &[Candidate],
    operand_b: &str,
    chunks_b: &[Candidate],
) -> Answer {
    let left = explanation(chunks_a);
    let right = explanation(chunks_b);

    let mut text = format!("## {}\n\n{}", operand_a, left.text);
    text.push_str(&format!("\n\n## {}\n\n{}", operand_b, right.text));

    let mut citations = left.citations;
    for citation in right.citations {
        if !citations.contains(&citation) {
            citations.push(citation);
        }
    }

    Answer {
        text,
        intent: QueryIntent::Comparison,
        citations,
    }
}

/// Collect `(n, text)` items across chunks, sort by `n`, deduplicate
/// keeping the first occurrence, and report completeness.
fn enumeration(candidates: &[Candidate]) -> Answer {
    let mut items: BTreeMap<u32, (String, usize)> = BTreeMap::new();

    for (idx, candidate) in candidates.iter().enumerate() {
        for line in candidate.point.content.lines() {
            if let Some(caps) = NUMBERED_LINE_RE.captures(line) {
                let Ok(n) = caps[1].parse::<u32>() else {
                    continue;
                };
                items
                    .entry(n)
                    .or_insert_with(|| (caps[2].trim_end().to_string(), idx));
            }
        }
    }

    if items.is_empty() {
        return Answer {
            text: "No enumerable items found in the indexed material.".to_string(),
            intent: QueryIntent::Enumeration,
            citations: Vec::new(),
        };
    }

    let mut trail = CitationTrail::new();
    let mut lines = Vec::new();
    for (n, (text, idx)) in &items {
        lines.push(format!("{}. {}", n, text));
        trail.cite(&candidates[*idx]);
    }

    let max = *items.keys().next_back().unwrap_or(&0);
    let missing: Vec<u32> = (1..=max).filter(|n| !items.contains_key(n)).collect();
    if missing.is_empty() {
        lines.push(format!("\nComplete (1..{}).", max));
    } else {
        let listed = missing
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("\nIncomplete: missing {}.", listed));
    }

    Answer {
        text: lines.join("\n"),
        intent: QueryIntent::Enumeration,
        citations: trail.citations,
    }
}

/// Group by file, order by line, drop the shorter of two overlapping
/// chunks, and emit per-file sections preserving original line breaks.
fn explanation(candidates: &[Candidate]) -> Answer {
    if candidates.is_empty() {
        return Answer {
            text: "No relevant material found.".to_string(),
            intent: QueryIntent::Explanation,
            citations: Vec::new(),
        };
    }

    // files in rank order of their best chunk
    let mut file_order: Vec<String> = Vec::new();
    for candidate in candidates {
        let path = &candidate.point.payload.file_path;
        if !file_order.contains(path) {
            file_order.push(path.clone());
        }
    }

    let mut trail = CitationTrail::new();
    let mut sections = Vec::new();

    for path in &file_order {
        let mut in_file: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| &c.point.payload.file_path == path)
            .collect();
        in_file.sort_by_key(|c| c.point.payload.line_start);

        // overlapping line ranges: keep the longer chunk
        let mut kept: Vec<&Candidate> = Vec::new();
        for candidate in in_file {
            match kept.last() {
                Some(last)
                    if candidate.point.payload.line_start <= last.point.payload.line_end =>
                {
                    let last_len = last.point.payload.line_end - last.point.payload.line_start;
                    let cand_len =
                        candidate.point.payload.line_end - candidate.point.payload.line_start;
                    if cand_len > last_len {
                        kept.pop();
                        kept.push(candidate);
                    }
                }
                _ => kept.push(candidate),
            }
        }

        let mut body = Vec::new();
        for candidate in kept {
            body.push(candidate.point.content.clone());
            trail.cite(candidate);
        }
        sections.push(format!("## {}\n\n{}", path, body.join("\n\n")));
    }

    Answer {
        text: sections.join("\n\n"),
        intent: QueryIntent::Explanation,
        citations: trail.citations,
    }
}

/// Fenced code block per chunk, tagged with the chunk's language and
/// prefixed with its locator.
fn code_search(candidates: &[Candidate]) -> Answer {
    if candidates.is_empty() {
        return Answer {
            text: "No matching code found.".to_string(),
            intent: QueryIntent::CodeSearch,
            citations: Vec::new(),
        };
    }

    let mut file_order: Vec<String> = Vec::new();
    for candidate in candidates {
        let path = &candidate.point.payload.file_path;
        if !file_order.contains(path) {
            file_order.push(path.clone());
        }
    }

    let mut trail = CitationTrail::new();
    let mut blocks = Vec::new();

    for path in &file_order {
        for candidate in candidates
            .iter()
            .filter(|c| &c.point.payload.file_path == path)
        {
            let payload = &candidate.point.payload;
            let mut header = format!(
                "{}:{}-{}",
                payload.file_path, payload.line_start, payload.line_end
            );
            if let Some(name) = &payload.name {
                let locator = match &payload.class_name {
                    Some(class_name) => format!("{}.{}", class_name, name),
                    None => name.clone(),
                };
                header.push_str(&format!(" ({})", locator));
            }
            blocks.push(format!(
                "{}\n```{}\n{}\n```",
                header, payload.language, candidate.point.content
            ));
            trail.cite(candidate);
        }
    }

    Answer {
        text: blocks.join("\n\n"),
        intent: QueryIntent::CodeSearch,
        citations: trail.citations,
    }
}

/// The single highest-ranked chunk, verbatim.
fn factual(candidates: &[Candidate]) -> Answer {
    match candidates.first() {
        Some(top) => {
            let mut trail = CitationTrail::new();
            trail.cite(top);
            Answer {
                text: top.point.content.clone(),
                intent: QueryIntent::Factual,
                citations: trail.citations,
            }
        }
        None => Answer {
            text: "No relevant material found.".to_string(),
            intent: QueryIntent::Factual,
            citations: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, ChunkPayload, CodeType, ContentType};
    use crate::store::Point;

    fn candidate(
        path: &str,
        line_start: u32,
        line_end: u32,
        section: Option<&str>,
        content: &str,
    ) -> Candidate {
        let mut payload =
            ChunkPayload::new(path, line_start, line_end, ContentType::Text, "markdown");
        payload.section = section.map(|s| s.to_string());
        let chunk = Chunk::new(content.to_string(), payload);
        Candidate {
            point: Point::from_chunk(chunk, Vec::new()),
            combined: 0.8,
            vector_score: Some(0.8),
            lexical_score: None,
            rerank_score: None,
            provenance: "local".to_string(),
        }
    }

    #[test]
    fn test_enumeration_complete_range() {
        let pool = vec![candidate(
            "docs/a.md",
            3,
            5,
            Some("Features"),
            "1. Alpha\n2. Beta\n3. Gamma",
        )];
        let answer = synthesize(QueryIntent::Enumeration, &pool);

        let lines: Vec<&str> = answer.text.lines().collect();
        assert_eq!(lines[0], "1. Alpha");
        assert_eq!(lines[1], "2. Beta");
        assert_eq!(lines[2], "3. Gamma");
        assert!(answer.text.contains("(1..3)"));
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].file_path, "docs/a.md");
        assert_eq!(answer.citations[0].line_start, 3);
        assert_eq!(answer.citations[0].line_end, 5);
    }

    #[test]
    fn test_enumeration_dedup_keeps_first() {
        let pool = vec![
            candidate("docs/a.md", 3, 4, None, "1. Alpha\n2. Beta"),
            candidate("docs/b.md", 1, 2, None, "2. Bravo\n3. Gamma"),
        ];
        let answer = synthesize(QueryIntent::Enumeration, &pool);

        assert!(answer.text.contains("2. Beta"));
        assert!(!answer.text.contains("2. Bravo"));
        assert!(answer.text.contains("3. Gamma"));
        assert!(answer.text.contains("(1..3)"));
        assert_eq!(answer.citations.len(), 2);
    }

    #[test]
    fn test_enumeration_reports_missing() {
        let pool = vec![candidate("docs/a.md", 1, 3, None, "1. One\n2. Two\n5. Five")];
        let answer = synthesize(QueryIntent::Enumeration, &pool);
        assert!(answer.text.contains("missing 3, 4"));
    }

    #[test]
    fn test_explanation_groups_and_orders() {
        let pool = vec![
            candidate("docs/b.md", 10, 12, None, "Later in b."),
            candidate("docs/a.md", 5, 7, None, "Middle of a."),
            candidate("docs/a.md", 1, 3, None, "Start of a."),
        ];
        let answer = synthesize(QueryIntent::Explanation, &pool);

        // b ranked first, so its section leads; within a, line order holds
        let b_pos = answer.text.find("docs/b.md").unwrap();
        let a_pos = answer.text.find("docs/a.md").unwrap();
        assert!(b_pos < a_pos);
        let start = answer.text.find("Start of a.").unwrap();
        let middle = answer.text.find("Middle of a.").unwrap();
        assert!(start < middle);
        assert_eq!(answer.citations.len(), 3);
    }

    #[test]
    fn test_explanation_drops_shorter_overlap() {
        let pool = vec![
            candidate("docs/a.md", 1, 10, None, "The long chunk."),
            candidate("docs/a.md", 5, 7, None, "The short chunk."),
        ];
        let answer = synthesize(QueryIntent::Explanation, &pool);
        assert!(answer.text.contains("The long chunk."));
        assert!(!answer.text.contains("The short chunk."));
        assert_eq!(answer.citations.len(), 1);
    }

    #[test]
    fn test_code_search_emits_fenced_blocks() {
        let mut payload = ChunkPayload::new("src/x.py", 10, 12, ContentType::Code, "python");
        payload.code_type = Some(CodeType::Method);
        payload.name = Some("greet".to_string());
        payload.class_name = Some("Greeter".to_string());
        let chunk = Chunk::new("def greet(self):\n    return \"hi\"".to_string(), payload);
        let pool = vec![Candidate {
            point: Point::from_chunk(chunk, Vec::new()),
            combined: 0.9,
            vector_score: Some(0.9),
            lexical_score: None,
            rerank_score: None,
            provenance: "local".to_string(),
        }];

        let answer = synthesize(QueryIntent::CodeSearch, &pool);
        assert!(answer.text.contains("src/x.py:10-12 (Greeter.greet)"));
        assert!(answer.text.contains("```python"));
        assert!(answer.text.contains("def greet(self):"));
    }

    #[test]
    fn test_factual_emits_top_chunk_verbatim() {
        let pool = vec![
            candidate("docs/ports.md", 4, 4, None, "The server listens on port 8080."),
            candidate("docs/other.md", 1, 1, None, "Unrelated."),
        ];
        let answer = synthesize(QueryIntent::Factual, &pool);
        assert_eq!(answer.text, "The server listens on port 8080.");
        assert_eq!(answer.citations.len(), 1);
    }

    #[test]
    fn test_comparison_side_by_side() {
        let left = vec![candidate("docs/soft.md", 1, 2, None, "Soft delete hides chunks.")];
        let right = vec![candidate("docs/prune.md", 1, 2, None, "Prune removes them for good.")];
        let answer = synthesize_comparison("soft delete", &left, "prune", &right);

        let soft_pos = answer.text.find("## soft delete").unwrap();
        let prune_pos = answer.text.find("## prune").unwrap();
        assert!(soft_pos < prune_pos);
        assert_eq!(answer.citations.len(), 2);
    }

    #[test]
    fn test_empty_pools_are_not_errors() {
        for intent in [
            QueryIntent::Enumeration,
            QueryIntent::Explanation,
            QueryIntent::CodeSearch,
            QueryIntent::Factual,
        ] {
            let answer = synthesize(intent, &[]);
            assert!(!answer.text.is_empty());
            assert!(answer.citations.is_empty());
        }
    }
}

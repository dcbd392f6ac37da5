// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! AST-aware code chunking.
//!
//! The primary path parses source with tree-sitter and emits one chunk per
//! top-level function, method or class. When no grammar is available for
//! the language (or parsing fails), a regex extractor takes over so that
//! indexing never fails silently on a missing grammar. The two paths never
//! both run for the same file.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::{Node, Parser};

use crate::chunk::{Chunk, ChunkPayload, CodeType, ContentType};
use crate::config::{ChunkingConfig, CodeChunkStrategy};
use crate::error::ChunkError;

/// One extracted code unit before chunk composition.
#[derive(Debug, Clone)]
struct CodeUnit {
    start_line: u32,
    end_line: u32,
    text: String,
    code_type: CodeType,
    name: Option<String>,
    class_name: Option<String>,
    /// Enclosing class declaration line, reproduced above method bodies.
    class_line: Option<String>,
}

/// Map a file extension to the language tag used in payloads.
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "py" | "pyi" => Some("python"),
        "ts" | "tsx" | "mts" | "cts" => Some("typescript"),
        "js" | "jsx" | "mjs" | "cjs" => Some("javascript"),
        "rs" => Some("rust"),
        "go" => Some("go"),
        _ => None,
    }
}

/// Code chunker with a tree-sitter primary path and regex fallback.
pub struct CodeChunker {
    strategy: CodeChunkStrategy,
    parsers: HashMap<&'static str, Parser>,
}

impl CodeChunker {
    /// Create a chunker with parsers for every bundled grammar.
    pub fn new(strategy: CodeChunkStrategy) -> Result<Self, ChunkError> {
        let mut parsers = HashMap::new();

        let languages: [(&'static str, tree_sitter::Language); 5] = [
            ("python", tree_sitter_python::LANGUAGE.into()),
            (
                "typescript",
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            ),
            ("javascript", tree_sitter_javascript::LANGUAGE.into()),
            ("rust", tree_sitter_rust::LANGUAGE.into()),
            ("go", tree_sitter_go::LANGUAGE.into()),
        ];

        for (tag, lang) in languages {
            let mut parser = Parser::new();
            parser.set_language(&lang).map_err(|e| {
                ChunkError::ParseFailed(format!("failed to load {} grammar: {}", tag, e))
            })?;
            parsers.insert(tag, parser);
        }

        Ok(Self { strategy, parsers })
    }

    /// Chunk a source file.
    ///
    /// `file_path` must be normalized and project-root-relative; `language`
    /// is the payload language tag. Chunk order equals source order.
    pub fn chunk(
        &mut self,
        file_path: &str,
        content: &str,
        language: &str,
    ) -> Result<Vec<Chunk>, ChunkError> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let (units, imports) = match self.strategy {
            CodeChunkStrategy::Ast => match self.extract_ast(content, language) {
                Some(result) => result,
                None => {
                    tracing::debug!(language, file_path, "no grammar, using regex extraction");
                    extract_regex(content, language)
                }
            },
            CodeChunkStrategy::Regex => extract_regex(content, language),
        };

        let mut units = units;
        units.sort_by_key(|u| u.start_line);

        if units.is_empty() {
            // Nothing extractable; index the file as a single module chunk
            // so its content stays searchable.
            let line_count = content.lines().count().max(1) as u32;
            let mut payload =
                ChunkPayload::new(file_path, 1, line_count, ContentType::Code, language);
            payload.code_type = Some(CodeType::Module);
            payload.imports = imports;
            return Ok(vec![Chunk::new(content.to_string(), payload)]);
        }

        let chunks = units
            .into_iter()
            .map(|unit| compose_chunk(file_path, language, &imports, unit))
            .collect();
        Ok(chunks)
    }

    /// Tree-sitter extraction. Returns `None` when no grammar matches the
    /// language tag or the parse fails, which sends the caller to the regex
    /// path.
    fn extract_ast(
        &mut self,
        content: &str,
        language: &str,
    ) -> Option<(Vec<CodeUnit>, Vec<String>)> {
        let parser = self.parsers.get_mut(language)?;
        let tree = parser.parse(content, None)?;
        let root = tree.root_node();
        if root.has_error() && root.named_child_count() == 0 {
            return None;
        }

        let source = content.as_bytes();
        let mut units = Vec::new();
        let mut imports = Vec::new();

        for i in 0..root.named_child_count() {
            let Some(node) = root.named_child(i) else {
                continue;
            };
            collect_top_level(&node, source, language, &mut units, &mut imports);
        }

        Some((units, imports))
    }
}

fn node_text(node: &Node, source: &[u8]) -> String {
    node.utf8_text(source).unwrap_or_default().to_string()
}

fn node_lines(node: &Node) -> (u32, u32) {
    (
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
}

fn field_text(node: &Node, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .map(|child| node_text(&child, source))
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().to_string()
}

/// Dispatch one top-level named node into units/imports.
fn collect_top_level(
    node: &Node,
    source: &[u8],
    language: &str,
    units: &mut Vec<CodeUnit>,
    imports: &mut Vec<String>,
) {
    let kind = node.kind();

    match (language, kind) {
        // ---- imports ----
        ("python", "import_statement")
        | ("python", "import_from_statement")
        | ("python", "future_import_statement")
        | ("typescript", "import_statement")
        | ("javascript", "import_statement")
        | ("rust", "use_declaration")
        | ("go", "import_declaration") => {
            imports.push(node_text(node, source));
        }

        // ---- python ----
        ("python", "function_definition") => {
            units.push(make_function_unit(node, source, "name"));
        }
        ("python", "decorated_definition") => {
            if let Some(inner) = node.child_by_field_name("definition") {
                match inner.kind() {
                    "function_definition" => {
                        let mut unit = make_function_unit(&inner, source, "name");
                        // span includes the decorators
                        let (start, end) = node_lines(node);
                        unit.start_line = start;
                        unit.end_line = end;
                        unit.text = node_text(node, source);
                        units.push(unit);
                    }
                    "class_definition" => {
                        collect_python_class(&inner, source, units);
                    }
                    _ => {}
                }
            }
        }
        ("python", "class_definition") => {
            collect_python_class(node, source, units);
        }

        // ---- typescript / javascript ----
        ("typescript", "function_declaration")
        | ("javascript", "function_declaration")
        | ("typescript", "generator_function_declaration")
        | ("javascript", "generator_function_declaration") => {
            units.push(make_function_unit(node, source, "name"));
        }
        ("typescript", "class_declaration") | ("javascript", "class_declaration") => {
            collect_ts_class(node, source, units);
        }
        ("typescript", "export_statement") | ("javascript", "export_statement") => {
            if let Some(decl) = node.child_by_field_name("declaration") {
                collect_top_level(&decl, source, language, units, imports);
            }
        }

        // ---- rust ----
        ("rust", "function_item") => {
            units.push(make_function_unit(node, source, "name"));
        }
        ("rust", "impl_item") => {
            collect_rust_impl(node, source, units);
        }
        ("rust", "struct_item") | ("rust", "enum_item") | ("rust", "trait_item") => {
            let (start_line, end_line) = node_lines(node);
            units.push(CodeUnit {
                start_line,
                end_line,
                text: node_text(node, source),
                code_type: CodeType::Class,
                name: field_text(node, "name", source),
                class_name: None,
                class_line: None,
            });
        }
        ("rust", "mod_item") => {
            let (start_line, end_line) = node_lines(node);
            units.push(CodeUnit {
                start_line,
                end_line,
                text: node_text(node, source),
                code_type: CodeType::Module,
                name: field_text(node, "name", source),
                class_name: None,
                class_line: None,
            });
        }

        // ---- go ----
        ("go", "function_declaration") => {
            units.push(make_function_unit(node, source, "name"));
        }
        ("go", "method_declaration") => {
            let receiver = node
                .child_by_field_name("receiver")
                .map(|r| go_receiver_type(&node_text(&r, source)));
            let (start_line, end_line) = node_lines(node);
            units.push(CodeUnit {
                start_line,
                end_line,
                text: node_text(node, source),
                code_type: CodeType::Method,
                name: field_text(node, "name", source),
                class_name: receiver,
                class_line: None,
            });
        }
        ("go", "type_declaration") => {
            let (start_line, end_line) = node_lines(node);
            let name = node
                .named_child(0)
                .and_then(|spec| field_text(&spec, "name", source));
            units.push(CodeUnit {
                start_line,
                end_line,
                text: node_text(node, source),
                code_type: CodeType::Class,
                name,
                class_name: None,
                class_line: None,
            });
        }

        _ => {}
    }
}

fn make_function_unit(node: &Node, source: &[u8], name_field: &str) -> CodeUnit {
    let (start_line, end_line) = node_lines(node);
    CodeUnit {
        start_line,
        end_line,
        text: node_text(node, source),
        code_type: CodeType::Function,
        name: field_text(node, name_field, source),
        class_name: None,
        class_line: None,
    }
}

/// A class with no methods becomes one chunk; otherwise one chunk per
/// method plus a class-level summary (class line and field declarations).
fn collect_python_class(node: &Node, source: &[u8], units: &mut Vec<CodeUnit>) {
    let class_name = field_text(node, "name", source);
    let class_text = node_text(node, source);
    let class_line = first_line(&class_text);
    let (class_start, class_end) = node_lines(node);

    let Some(body) = node.child_by_field_name("body") else {
        units.push(CodeUnit {
            start_line: class_start,
            end_line: class_end,
            text: class_text,
            code_type: CodeType::Class,
            name: class_name,
            class_name: None,
            class_line: None,
        });
        return;
    };

    let mut methods = Vec::new();
    let mut fields = Vec::new();

    for i in 0..body.named_child_count() {
        let Some(child) = body.named_child(i) else {
            continue;
        };
        match child.kind() {
            "function_definition" => methods.push(child),
            "decorated_definition" => {
                if let Some(inner) = child.child_by_field_name("definition") {
                    if inner.kind() == "function_definition" {
                        methods.push(child);
                    }
                }
            }
            "expression_statement" => fields.push(node_text(&child, source)),
            _ => {}
        }
    }

    if methods.is_empty() {
        units.push(CodeUnit {
            start_line: class_start,
            end_line: class_end,
            text: class_text,
            code_type: CodeType::Class,
            name: class_name,
            class_name: None,
            class_line: None,
        });
        return;
    }

    if !fields.is_empty() {
        let mut summary = class_line.clone();
        for field in &fields {
            summary.push('\n');
            summary.push_str(field);
        }
        units.push(CodeUnit {
            start_line: class_start,
            end_line: class_start,
            text: summary,
            code_type: CodeType::Class,
            name: class_name.clone(),
            class_name: None,
            class_line: None,
        });
    }

    for method in methods {
        let (start_line, end_line) = node_lines(&method);
        let name = if method.kind() == "decorated_definition" {
            method
                .child_by_field_name("definition")
                .and_then(|d| field_text(&d, "name", source))
        } else {
            field_text(&method, "name", source)
        };
        units.push(CodeUnit {
            start_line,
            end_line,
            text: node_text(&method, source),
            code_type: CodeType::Method,
            name,
            class_name: class_name.clone(),
            class_line: Some(class_line.clone()),
        });
    }
}

fn collect_ts_class(node: &Node, source: &[u8], units: &mut Vec<CodeUnit>) {
    let class_name = field_text(node, "name", source);
    let class_text = node_text(node, source);
    let class_line = first_line(&class_text);
    let (class_start, class_end) = node_lines(node);

    let mut methods = Vec::new();
    let mut fields = Vec::new();

    if let Some(body) = node.child_by_field_name("body") {
        for i in 0..body.named_child_count() {
            let Some(child) = body.named_child(i) else {
                continue;
            };
            match child.kind() {
                "method_definition" => methods.push(child),
                "public_field_definition" | "field_definition" => {
                    fields.push(node_text(&child, source));
                }
                _ => {}
            }
        }
    }

    if methods.is_empty() {
        units.push(CodeUnit {
            start_line: class_start,
            end_line: class_end,
            text: class_text,
            code_type: CodeType::Class,
            name: class_name,
            class_name: None,
            class_line: None,
        });
        return;
    }

    if !fields.is_empty() {
        let mut summary = class_line.clone();
        for field in &fields {
            summary.push('\n');
            summary.push_str(field);
        }
        units.push(CodeUnit {
            start_line: class_start,
            end_line: class_start,
            text: summary,
            code_type: CodeType::Class,
            name: class_name.clone(),
            class_name: None,
            class_line: None,
        });
    }

    for method in methods {
        let (start_line, end_line) = node_lines(&method);
        units.push(CodeUnit {
            start_line,
            end_line,
            text: node_text(&method, source),
            code_type: CodeType::Method,
            name: field_text(&method, "name", source),
            class_name: class_name.clone(),
            class_line: Some(class_line.clone()),
        });
    }
}

fn collect_rust_impl(node: &Node, source: &[u8], units: &mut Vec<CodeUnit>) {
    let type_name = field_text(node, "type", source);
    let impl_text = node_text(node, source);
    let impl_line = first_line(&impl_text);

    let Some(body) = node.child_by_field_name("body") else {
        return;
    };

    for i in 0..body.named_child_count() {
        let Some(child) = body.named_child(i) else {
            continue;
        };
        if child.kind() == "function_item" {
            let (start_line, end_line) = node_lines(&child);
            units.push(CodeUnit {
                start_line,
                end_line,
                text: node_text(&child, source),
                code_type: CodeType::Method,
                name: field_text(&child, "name", source),
                class_name: type_name.clone(),
                class_line: Some(impl_line.clone()),
            });
        }
    }
}

/// Pull the receiver type name out of `(s *Server)`.
fn go_receiver_type(receiver: &str) -> String {
    receiver
        .trim_matches(|c| c == '(' || c == ')')
        .split_whitespace()
        .last()
        .unwrap_or("")
        .trim_start_matches(['*', '&'])
        .to_string()
}

/// Assemble the stored chunk: file imports verbatim, then the enclosing
/// class line for methods, then the unit itself.
fn compose_chunk(file_path: &str, language: &str, imports: &[String], unit: CodeUnit) -> Chunk {
    let mut content = String::new();
    if !imports.is_empty() {
        content.push_str(&imports.join("\n"));
        content.push_str("\n\n");
    }
    if let Some(class_line) = &unit.class_line {
        content.push_str(class_line);
        content.push('\n');
    }
    content.push_str(&unit.text);

    let mut payload = ChunkPayload::new(
        file_path,
        unit.start_line,
        unit.end_line,
        ContentType::Code,
        language,
    );
    payload.code_type = Some(unit.code_type);
    payload.name = unit.name;
    payload.class_name = unit.class_name;
    payload.imports = imports.to_vec();
    Chunk::new(content, payload)
}

// ---------------------------------------------------------------------------
// Regex fallback
// ---------------------------------------------------------------------------

static IMPORT_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:import\s|from\s+\S+\s+import\s|use\s+\S|#include\s|const\s+.*=\s*require\()"#)
        .unwrap()
});

struct FallbackPattern {
    regex: Regex,
    code_type: CodeType,
}

static FALLBACK_PATTERNS: Lazy<HashMap<&'static str, Vec<FallbackPattern>>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(
        "python",
        vec![
            FallbackPattern {
                regex: Regex::new(r"^(?:async\s+)?def\s+(\w+)").unwrap(),
                code_type: CodeType::Function,
            },
            FallbackPattern {
                regex: Regex::new(r"^class\s+(\w+)").unwrap(),
                code_type: CodeType::Class,
            },
        ],
    );
    let ts = || {
        vec![
            FallbackPattern {
                regex: Regex::new(r"^(?:export\s+)?(?:async\s+)?function\s+(\w+)").unwrap(),
                code_type: CodeType::Function,
            },
            FallbackPattern {
                regex: Regex::new(r"^(?:export\s+)?(?:abstract\s+)?class\s+(\w+)").unwrap(),
                code_type: CodeType::Class,
            },
        ]
    };
    map.insert("typescript", ts());
    map.insert("javascript", ts());
    map.insert(
        "rust",
        vec![
            FallbackPattern {
                regex: Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+(\w+)").unwrap(),
                code_type: CodeType::Function,
            },
            FallbackPattern {
                regex: Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait)\s+(\w+)")
                    .unwrap(),
                code_type: CodeType::Class,
            },
        ],
    );
    map.insert(
        "go",
        vec![
            FallbackPattern {
                regex: Regex::new(r"^func\s+(?:\([^)]*\)\s*)?(\w+)").unwrap(),
                code_type: CodeType::Function,
            },
            FallbackPattern {
                regex: Regex::new(r"^type\s+(\w+)\s+(?:struct|interface)").unwrap(),
                code_type: CodeType::Class,
            },
        ],
    );
    map
});

static GENERIC_PATTERNS: Lazy<Vec<FallbackPattern>> = Lazy::new(|| {
    vec![
        FallbackPattern {
            regex: Regex::new(r"^\s*(?:async\s+)?(?:def|function|func)\s+(\w+)").unwrap(),
            code_type: CodeType::Function,
        },
        FallbackPattern {
            regex: Regex::new(r"^\s*(?:export\s+)?class\s+(\w+)").unwrap(),
            code_type: CodeType::Class,
        },
    ]
});

/// Regex extraction for languages without a grammar.
fn extract_regex(content: &str, language: &str) -> (Vec<CodeUnit>, Vec<String>) {
    let lines: Vec<&str> = content.lines().collect();
    let patterns = FALLBACK_PATTERNS
        .get(language)
        .map(|v| v.as_slice())
        .unwrap_or_else(|| GENERIC_PATTERNS.as_slice());

    let mut imports = Vec::new();
    let mut units: Vec<CodeUnit> = Vec::new();
    let indent_based = language == "python";

    for (idx, line) in lines.iter().enumerate() {
        if IMPORT_LINE_RE.is_match(line) {
            imports.push(line.to_string());
            continue;
        }

        for pattern in patterns {
            let Some(caps) = pattern.regex.captures(line) else {
                continue;
            };
            // skip headers already inside a captured block
            if units
                .iter()
                .any(|u| (idx as u32 + 1) > u.start_line && (idx as u32 + 1) <= u.end_line)
            {
                break;
            }
            let end = if indent_based {
                indent_block_end(&lines, idx)
            } else {
                brace_block_end(&lines, idx)
            };
            let text = lines[idx..end].join("\n");
            units.push(CodeUnit {
                start_line: idx as u32 + 1,
                end_line: end as u32,
                text,
                code_type: pattern.code_type,
                name: caps.get(1).map(|m| m.as_str().to_string()),
                class_name: None,
                class_line: None,
            });
            break;
        }
    }

    (units, imports)
}

/// End (exclusive line index) of an indentation-delimited block.
fn indent_block_end(lines: &[&str], start: usize) -> usize {
    let header = lines[start];
    let base_indent = header.len() - header.trim_start().len();

    for (offset, line) in lines.iter().enumerate().skip(start + 1) {
        if line.trim().is_empty() {
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        if indent <= base_indent {
            return offset;
        }
    }
    lines.len()
}

/// End (exclusive line index) of a brace-delimited block, tracking strings.
fn brace_block_end(lines: &[&str], start: usize) -> usize {
    let mut depth = 0i32;
    let mut seen_open = false;
    let mut in_string = false;
    let mut string_char = ' ';

    for (offset, line) in lines.iter().enumerate().skip(start) {
        let mut prev = ' ';
        for ch in line.chars() {
            if (ch == '"' || ch == '\'' || ch == '`') && prev != '\\' {
                if in_string && ch == string_char {
                    in_string = false;
                } else if !in_string {
                    in_string = true;
                    string_char = ch;
                }
            }
            if !in_string {
                match ch {
                    '{' => {
                        depth += 1;
                        seen_open = true;
                    }
                    '}' => {
                        depth -= 1;
                        if seen_open && depth == 0 {
                            return offset + 1;
                        }
                    }
                    _ => {}
                }
            }
            prev = ch;
        }
        in_string = false;
        // a signature with no body within a few lines: give up on the block
        if !seen_open && offset > start + 4 {
            return offset;
        }
    }
    lines.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> CodeChunker {
        CodeChunker::new(CodeChunkStrategy::Ast).unwrap()
    }

    #[test]
    fn test_empty_file_yields_no_chunks() {
        let mut chunker = chunker();
        assert!(chunker.chunk("src/empty.py", "", "python").unwrap().is_empty());
    }

    #[test]
    fn test_python_function_and_method() {
        let mut chunker = chunker();
        let content = "\
import os

def helper(x):
    return x + 1

class Greeter:
    def greet(self):
        return \"hi\"
";
        let chunks = chunker.chunk("src/x.py", content, "python").unwrap();

        let helper = chunks
            .iter()
            .find(|c| c.payload.name.as_deref() == Some("helper"))
            .expect("helper chunk");
        assert_eq!(helper.payload.code_type, Some(CodeType::Function));
        assert!(helper.content.starts_with("import os"));
        assert_eq!(helper.payload.line_start, 3);

        let greet = chunks
            .iter()
            .find(|c| c.payload.name.as_deref() == Some("greet"))
            .expect("greet chunk");
        assert_eq!(greet.payload.code_type, Some(CodeType::Method));
        assert_eq!(greet.payload.class_name.as_deref(), Some("Greeter"));
        assert!(greet.content.contains("class Greeter:"));
        assert!(greet.content.contains("def greet(self):"));
        assert_eq!(greet.payload.imports, vec!["import os".to_string()]);
    }

    #[test]
    fn test_python_class_without_methods_is_one_chunk() {
        let mut chunker = chunker();
        let content = "class Empty:\n    pass\n";
        let chunks = chunker.chunk("src/e.py", content, "python").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].payload.code_type, Some(CodeType::Class));
        assert_eq!(chunks[0].payload.name.as_deref(), Some("Empty"));
    }

    #[test]
    fn test_typescript_exported_function() {
        let mut chunker = chunker();
        let content = "\
import { x } from './x';

export function greet(name: string): string {
    return `Hello, ${name}!`;
}
";
        let chunks = chunker.chunk("src/a.ts", content, "typescript").unwrap();
        let greet = chunks
            .iter()
            .find(|c| c.payload.name.as_deref() == Some("greet"))
            .expect("greet chunk");
        assert_eq!(greet.payload.code_type, Some(CodeType::Function));
        assert!(greet.content.contains("import { x } from './x';"));
    }

    #[test]
    fn test_rust_impl_methods_get_class_name() {
        let mut chunker = chunker();
        let content = "\
use std::fmt;

pub struct Greeter {
    name: String,
}

impl Greeter {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}
";
        let chunks = chunker.chunk("src/lib.rs", content, "rust").unwrap();

        let strukt = chunks
            .iter()
            .find(|c| c.payload.code_type == Some(CodeType::Class))
            .expect("struct chunk");
        assert_eq!(strukt.payload.name.as_deref(), Some("Greeter"));

        let new_fn = chunks
            .iter()
            .find(|c| c.payload.name.as_deref() == Some("new"))
            .expect("method chunk");
        assert_eq!(new_fn.payload.code_type, Some(CodeType::Method));
        assert_eq!(new_fn.payload.class_name.as_deref(), Some("Greeter"));
        assert!(new_fn.content.contains("impl Greeter {"));
    }

    #[test]
    fn test_regex_fallback_for_unknown_language() {
        let mut chunker = chunker();
        let content = "\
function alpha() {
    return 1;
}

class Beta {
    constructor() {}
}
";
        let chunks = chunker.chunk("src/a.kts", content, "kotlin").unwrap();
        assert!(chunks.len() >= 2);
        assert!(chunks
            .iter()
            .any(|c| c.payload.name.as_deref() == Some("alpha")));
        assert!(chunks
            .iter()
            .any(|c| c.payload.name.as_deref() == Some("Beta")));
    }

    #[test]
    fn test_regex_strategy_skips_ast() {
        let mut chunker = CodeChunker::new(CodeChunkStrategy::Regex).unwrap();
        let content = "def solo():\n    return 42\n";
        let chunks = chunker.chunk("src/s.py", content, "python").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].payload.name.as_deref(), Some("solo"));
        assert_eq!(chunks[0].payload.code_type, Some(CodeType::Function));
    }

    #[test]
    fn test_chunks_in_source_order() {
        let mut chunker = chunker();
        let content = "\
def first():
    pass

def second():
    pass

def third():
    pass
";
        let chunks = chunker.chunk("src/o.py", content, "python").unwrap();
        let names: Vec<_> = chunks
            .iter()
            .filter_map(|c| c.payload.name.as_deref())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        let mut starts: Vec<u32> = chunks.iter().map(|c| c.payload.line_start).collect();
        let sorted = {
            let mut s = starts.clone();
            s.sort_unstable();
            s
        };
        assert_eq!(starts, sorted);
        starts.dedup();
        assert_eq!(starts.len(), chunks.len());
    }

    #[test]
    fn test_go_receiver_type() {
        assert_eq!(go_receiver_type("(s *Server)"), "Server");
        assert_eq!(go_receiver_type("(c Client)"), "Client");
    }

    #[test]
    fn test_file_with_no_units_becomes_module_chunk() {
        let mut chunker = chunker();
        let content = "x = 1\ny = 2\n";
        let chunks = chunker.chunk("src/consts.py", content, "python").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].payload.code_type, Some(CodeType::Module));
        assert_eq!(chunks[0].payload.line_start, 1);
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Chunking benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use quarry::config::{ChunkingConfig, CodeChunkStrategy};
use quarry::chunking::{CodeChunker, DocChunker};

fn markdown_fixture() -> String {
    let mut doc = String::from("# Benchmark Document\n");
    for section in 0..20 {
        doc.push_str(&format!("## Section {}\n", section));
        for line in 0..15 {
            doc.push_str(&format!(
                "Prose line {} in section {} with enough text to be realistic.\n",
                line, section
            ));
        }
        doc.push_str("1. first item\n2. second item\n3. third item\n");
        doc.push_str("| a | b |\n|---|---|\n| 1 | 2 |\n");
    }
    doc
}

fn python_fixture() -> String {
    let mut source = String::from("import os\nimport sys\n\n");
    for index in 0..40 {
        source.push_str(&format!(
            "def function_{}(value):\n    \"\"\"Docstring.\"\"\"\n    return value + {}\n\n",
            index, index
        ));
    }
    source.push_str("class Worker:\n");
    for index in 0..10 {
        source.push_str(&format!(
            "    def method_{}(self):\n        return {}\n\n",
            index, index
        ));
    }
    source
}

fn bench_markdown(c: &mut Criterion) {
    let chunker = DocChunker::new(ChunkingConfig::default());
    let doc = markdown_fixture();
    c.bench_function("markdown_chunking", |b| {
        b.iter(|| black_box(chunker.chunk("docs/bench.md", black_box(&doc))))
    });
}

fn bench_code_ast(c: &mut Criterion) {
    let mut chunker = CodeChunker::new(CodeChunkStrategy::Ast).unwrap();
    let source = python_fixture();
    c.bench_function("python_chunking_ast", |b| {
        b.iter(|| black_box(chunker.chunk("src/bench.py", black_box(&source), "python")))
    });
}

fn bench_code_regex(c: &mut Criterion) {
    let mut chunker = CodeChunker::new(CodeChunkStrategy::Regex).unwrap();
    let source = python_fixture();
    c.bench_function("python_chunking_regex", |b| {
        b.iter(|| black_box(chunker.chunk("src/bench.py", black_box(&source), "python")))
    });
}

criterion_group!(benches, bench_markdown, bench_code_ast, bench_code_regex);
criterion_main!(benches);

//! Staged context compression
//!
//! Each stage works on the previous stage's output and the pipeline stops
//! as soon as the text fits the token target:
//!
//! 1. syntactic: strip comments, collapse whitespace, add a
//!    `kind: name (path)` header per node
//! 2. semantic: keep only structurally significant lines
//! 3. conceptual: keep only declaration signatures, capped at
//!    `target / 20` lines
//!
//! The result is never larger than the plain concatenation of the inputs.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::core::tokens::estimate_tokens;
use crate::index::node::{ContextNode, NodeKind};

const TOKENS_PER_SIGNATURE: usize = 20;
const MIN_COMMENT_LINE: usize = 20;

static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment pattern"));
static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|\s)//.*$").expect("line comment pattern"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("whitespace pattern"));
static SIGNIFICANT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(function|class|interface|export|import|def|fn|struct|enum|trait|impl|func|type)\b")
        .expect("significant pattern")
});
static SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?:export\s+)?(?:default\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:public\s+|private\s+|protected\s+)?",
        r"(?:static\s+)?(?:abstract\s+)?(?:async\s+)?(?:unsafe\s+)?",
        r"(?:function|class|interface|def|fn|struct|enum|trait|impl|func|type)\b",
        r"|^(?:export\s+)?(?:const|let)\s+[A-Za-z_$][\w$]*\s*=\s*(?:async\s*)?(?:\(|function\b)",
    ))
    .expect("signature pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionStage {
    /// Input already fit
    None,
    Syntactic,
    Semantic,
    Conceptual,
}

impl fmt::Display for CompressionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionStage::None => "none",
            CompressionStage::Syntactic => "syntactic",
            CompressionStage::Semantic => "semantic",
            CompressionStage::Conceptual => "conceptual",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionResult {
    pub original: String,
    pub compressed: String,
    pub original_tokens: usize,
    pub compressed_tokens: usize,
    pub ratio: f64,
    pub preserved_concepts: Vec<String>,
    pub stage: CompressionStage,
}

/// One node's text after the syntactic pass
struct Section {
    header: String,
    lines: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Compressor;

impl Compressor {
    pub fn new() -> Self {
        Self
    }

    pub fn compress_context(&self, nodes: &[ContextNode], target_tokens: usize) -> CompressionResult {
        let original = nodes
            .iter()
            .map(|n| n.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let original_tokens = estimate_tokens(&original);
        if original_tokens <= target_tokens {
            return finish(nodes, original.clone(), original, CompressionStage::None);
        }

        let sections: Vec<Section> = nodes.iter().map(syntactic).collect();
        let stage1 = render(&sections);
        if estimate_tokens(&stage1) <= target_tokens {
            return finish(nodes, original, stage1, CompressionStage::Syntactic);
        }

        let sections: Vec<Section> = sections.into_iter().map(semantic).collect();
        let stage2 = render(&sections);
        if estimate_tokens(&stage2) <= target_tokens {
            return finish(nodes, original, stage2, CompressionStage::Semantic);
        }

        let max_lines = if target_tokens == 0 {
            0
        } else {
            (target_tokens / TOKENS_PER_SIGNATURE).max(1)
        };
        let stage3 = sections
            .iter()
            .flat_map(|s| s.lines.iter())
            .filter(|line| SIGNATURE.is_match(line))
            .take(max_lines)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        finish(nodes, original, stage3, CompressionStage::Conceptual)
    }
}

fn finish(nodes: &[ContextNode], original: String, compressed: String, stage: CompressionStage) -> CompressionResult {
    let (compressed, stage) = if compressed.len() > original.len() {
        (original.clone(), CompressionStage::None)
    } else {
        (compressed, stage)
    };

    let original_tokens = estimate_tokens(&original);
    let compressed_tokens = estimate_tokens(&compressed);
    let ratio = if original_tokens == 0 {
        1.0
    } else {
        compressed_tokens as f64 / original_tokens as f64
    };
    let mut preserved_concepts: Vec<String> = nodes
        .iter()
        .filter(|n| n.kind != NodeKind::Comment && compressed.contains(n.name.as_str()))
        .map(|n| n.name.clone())
        .collect();
    preserved_concepts.dedup();

    debug!(%stage, original_tokens, compressed_tokens, "compressed context");

    CompressionResult {
        original,
        compressed,
        original_tokens,
        compressed_tokens,
        ratio,
        preserved_concepts,
        stage,
    }
}

fn syntactic(node: &ContextNode) -> Section {
    let text = if node.kind == NodeKind::Comment {
        node.content.clone()
    } else {
        strip_comments(&node.content)
    };
    let lines = text
        .lines()
        .map(|line| SPACES.replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect();
    Section {
        header: node.header(),
        lines,
    }
}

fn semantic(section: Section) -> Section {
    let lines = section
        .lines
        .into_iter()
        .filter(|line| SIGNIFICANT.is_match(line) || (is_comment_line(line) && line.len() > MIN_COMMENT_LINE))
        .collect();
    Section {
        header: section.header,
        lines,
    }
}

fn render(sections: &[Section]) -> String {
    sections
        .iter()
        .map(|s| {
            let mut text = s.header.clone();
            for line in &s.lines {
                text.push('\n');
                text.push_str(line);
            }
            text
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn strip_comments(content: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(content, "");
    without_blocks
        .lines()
        .filter(|line| !is_hash_comment(line))
        .map(|line| LINE_COMMENT.replace(line, "").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `#` comments, but not attributes, shebangs or preprocessor lines
fn is_hash_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#')
        && !trimmed.starts_with("#[")
        && !trimmed.starts_with("#!")
        && !["#include", "#define", "#if", "#endif", "#else", "#pragma", "#undef"]
            .iter()
            .any(|p| trimmed.starts_with(p))
}

fn is_comment_line(line: &str) -> bool {
    ["//", "#", "/*", "*", "--", "\"\"\""]
        .iter()
        .any(|p| line.starts_with(p))
}

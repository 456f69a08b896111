//! Entity extraction from source text
//!
//! Turns one file into an ordered list of [`ContextNode`]s: the file node
//! first, then functions, classes and meaningful comment blocks. Extraction
//! is heuristic: declarations are found by per-language line patterns and
//! their bodies by balanced-brace scanning or, for Python, by indentation.
//! Extractors are looked up by file extension through [`ExtractorRegistry`]
//! so a real parser can take over a language without changing the node
//! contract (see [`crate::core::ast`]).

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ContextError, Result};
use crate::index::node::{ContextNode, NodeKind};

/// Comment blocks shorter than this (marker-free text) are not indexed
const MIN_COMMENT_CHARS: usize = 40;

/// Default number of characters kept in a file node preview
pub const DEFAULT_PREVIEW_CHARS: usize = 1000;

/// Supported programming languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    CFamily,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" | "pyw" => Language::Python,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "go" => Language::Go,
            "java" => Language::Java,
            "c" | "h" | "cc" | "cpp" | "cxx" | "hpp" | "hh" | "cs" => Language::CFamily,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::Rust => "Rust",
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Go => "Go",
            Language::Java => "Java",
            Language::CFamily => "C-family",
            Language::Unknown => "Unknown",
        }
    }

    /// Syntax table driving heuristic extraction and comment stripping
    pub(crate) fn syntax(&self) -> &'static Syntax {
        match self {
            Language::Rust => &RUST,
            Language::Python => &PYTHON,
            Language::JavaScript | Language::TypeScript => &JAVASCRIPT,
            Language::Go => &GO,
            Language::Java => &JAVA,
            Language::CFamily => &C_FAMILY,
            Language::Unknown => &UNKNOWN,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Turns one file's text into semantic units
pub trait EntityExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// File node first, then sub-entities in source order
    fn extract(&self, path: &str, content: &str) -> Result<Vec<ContextNode>>;
}

/// Extractor lookup keyed by language (derived from the file extension)
#[derive(Clone)]
pub struct ExtractorRegistry {
    by_language: HashMap<Language, Arc<dyn EntityExtractor>>,
    fallback: Arc<dyn EntityExtractor>,
}

impl ExtractorRegistry {
    /// Pattern-based extractors for every known language
    pub fn heuristic(preview_chars: usize) -> Self {
        let mut by_language: HashMap<Language, Arc<dyn EntityExtractor>> = HashMap::new();
        for language in [
            Language::Rust,
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Go,
            Language::Java,
            Language::CFamily,
        ] {
            by_language.insert(language, Arc::new(HeuristicExtractor::new(language, preview_chars)));
        }

        Self {
            by_language,
            fallback: Arc::new(HeuristicExtractor::new(Language::Unknown, preview_chars)),
        }
    }

    pub fn register(&mut self, language: Language, extractor: Arc<dyn EntityExtractor>) {
        self.by_language.insert(language, extractor);
    }

    pub fn extractor_for(&self, path: &str) -> &dyn EntityExtractor {
        let language = Language::from_path(Path::new(path));
        self.by_language
            .get(&language)
            .unwrap_or(&self.fallback)
            .as_ref()
    }

    /// Extract one file, rejecting binary content up front
    pub fn extract(&self, path: &str, content: &str) -> Result<Vec<ContextNode>> {
        if content.contains('\0') {
            return Err(ContextError::extraction(path, "binary content"));
        }
        self.extractor_for(path).extract(path, content)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::heuristic(DEFAULT_PREVIEW_CHARS)
    }
}

/// How a declaration's body is delimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyStyle {
    Braces,
    Indentation,
}

pub(crate) enum ImportRule {
    /// Every capture-1 match on a single line
    Line(Regex),
    /// Capture-1 of `block`, then every capture-1 of `item` inside it
    Block { block: Regex, item: Regex },
}

pub(crate) struct Syntax {
    pub body: BodyStyle,
    pub declarations: Vec<(NodeKind, Regex)>,
    pub imports: Vec<ImportRule>,
    pub line_comments: &'static [&'static str],
    pub block_comment: Option<(&'static str, &'static str)>,
    /// `'` opens a string (as opposed to Rust lifetimes/char literals)
    pub single_quote_strings: bool,
    pub backtick_strings: bool,
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern:?}: {e}"))
}

static RUST: Lazy<Syntax> = Lazy::new(|| Syntax {
    body: BodyStyle::Braces,
    declarations: vec![
        (
            NodeKind::Function,
            re(r#"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:default\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+"[^"]*"\s+)?fn\s+(?P<name>[A-Za-z_]\w*)"#),
        ),
        (
            NodeKind::Class,
            re(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait|union)\s+(?P<name>[A-Za-z_]\w*)"),
        ),
        (
            NodeKind::Class,
            re(r"^\s*(?:unsafe\s+)?impl(?:<[^>]*>)?\s+(?:[\w:]+(?:<[^>]*>)?\s+for\s+)?(?P<impl>[A-Za-z_][\w:]*)"),
        ),
    ],
    imports: vec![
        ImportRule::Line(re(r"^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+([^;]+);")),
        ImportRule::Line(re(r"^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+([A-Za-z_]\w*)\s*;")),
    ],
    line_comments: &["//"],
    block_comment: Some(("/*", "*/")),
    single_quote_strings: false,
    backtick_strings: false,
});

static PYTHON: Lazy<Syntax> = Lazy::new(|| Syntax {
    body: BodyStyle::Indentation,
    declarations: vec![
        (NodeKind::Function, re(r"^\s*(?:async\s+)?def\s+(?P<name>[A-Za-z_]\w*)\s*\(")),
        (NodeKind::Class, re(r"^\s*class\s+(?P<name>[A-Za-z_]\w*)")),
    ],
    imports: vec![
        ImportRule::Line(re(r"^\s*import\s+([\w.]+(?:\s*,\s*[\w.]+)*)")),
        ImportRule::Line(re(r"^\s*from\s+([\w.]+)\s+import\b")),
    ],
    line_comments: &["#"],
    block_comment: None,
    single_quote_strings: true,
    backtick_strings: false,
});

static JAVASCRIPT: Lazy<Syntax> = Lazy::new(|| Syntax {
    body: BodyStyle::Braces,
    declarations: vec![
        (
            NodeKind::Function,
            re(r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(?P<name>[A-Za-z_$][\w$]*)"),
        ),
        (
            NodeKind::Function,
            re(r"^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::\s*[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>|\(\s*\{?\s*$|(?:React\.)?(?:memo|forwardRef|useCallback)\s*\()"),
        ),
        (
            NodeKind::Function,
            re(r"^\s+(?:(?:public|private|protected|static|readonly|async|override|get|set)\s+)*(?P<name>[A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*\([^)]*\)\s*(?::\s*[^{=]+)?\{\s*$"),
        ),
        (
            NodeKind::Class,
            re(r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+(?P<name>[A-Za-z_$][\w$]*)"),
        ),
        (
            NodeKind::Class,
            re(r"^\s*(?:export\s+)?(?:declare\s+)?(?:interface|enum|type)\s+(?P<name>[A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*(?:=|\{|extends\b)"),
        ),
    ],
    imports: vec![
        ImportRule::Line(re(r#"^\s*import\s+(?:type\s+)?(?:[^'"]*?\s+from\s+)?['"]([^'"]+)['"]"#)),
        ImportRule::Line(re(r#"^\s*export\s+(?:\*|\{[^}]*\})\s+from\s+['"]([^'"]+)['"]"#)),
        ImportRule::Line(re(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#)),
        ImportRule::Line(re(r#"import\(\s*['"]([^'"]+)['"]\s*\)"#)),
    ],
    line_comments: &["//"],
    block_comment: Some(("/*", "*/")),
    single_quote_strings: true,
    backtick_strings: true,
});

static GO: Lazy<Syntax> = Lazy::new(|| Syntax {
    body: BodyStyle::Braces,
    declarations: vec![
        (NodeKind::Function, re(r"^func\s+(?:\([^)]*\)\s*)?(?P<name>[A-Za-z_]\w*)")),
        (NodeKind::Class, re(r"^type\s+(?P<name>[A-Za-z_]\w*)\s+(?:struct|interface)\b")),
    ],
    imports: vec![
        ImportRule::Line(re(r#"^\s*import\s+(?:[\w.]+\s+)?"([^"]+)""#)),
        ImportRule::Block {
            block: re(r"(?s)\bimport\s*\((.*?)\)"),
            item: re(r#""([^"]+)""#),
        },
    ],
    line_comments: &["//"],
    block_comment: Some(("/*", "*/")),
    single_quote_strings: false,
    backtick_strings: true,
});

static JAVA: Lazy<Syntax> = Lazy::new(|| Syntax {
    body: BodyStyle::Braces,
    declarations: vec![
        (
            NodeKind::Class,
            re(r"^\s*(?:(?:public|private|protected|abstract|final|static|sealed)\s+)*(?:class|interface|enum|record)\s+(?P<name>[A-Za-z_]\w*)"),
        ),
        (
            NodeKind::Function,
            re(r"^\s*(?:(?:public|private|protected|static|final|abstract|synchronized|native|default)\s+)+[\w<>\[\],.?\s]*?(?P<name>[A-Za-z_]\w*)\s*\("),
        ),
    ],
    imports: vec![ImportRule::Line(re(r"^\s*import\s+(?:static\s+)?([\w.*]+)\s*;"))],
    line_comments: &["//"],
    block_comment: Some(("/*", "*/")),
    single_quote_strings: false,
    backtick_strings: false,
});

static C_FAMILY: Lazy<Syntax> = Lazy::new(|| Syntax {
    body: BodyStyle::Braces,
    declarations: vec![
        (
            NodeKind::Class,
            re(r"^\s*(?:(?:public|private|protected|internal|abstract|sealed|static|partial|typedef)\s+)*(?:class|struct|interface|enum|record)\s+(?P<name>[A-Za-z_]\w*)"),
        ),
        (
            NodeKind::Function,
            re(r"^(?:[A-Za-z_][\w:<>,]*[\s*&]+)+(?P<name>[A-Za-z_~][\w:~]*)\s*\([^;]*$"),
        ),
        (
            NodeKind::Function,
            re(r"^\s+(?:(?:public|private|protected|internal|static|virtual|override|async|abstract|sealed)\s+)+[\w<>\[\],.?\s]*?(?P<name>[A-Za-z_]\w*)\s*\("),
        ),
    ],
    imports: vec![
        ImportRule::Line(re(r#"^\s*#\s*include\s*[<"]([^>"]+)[>"]"#)),
        ImportRule::Line(re(r"^\s*using\s+(?:static\s+)?([\w.]+)\s*;")),
    ],
    line_comments: &["//"],
    block_comment: Some(("/*", "*/")),
    single_quote_strings: false,
    backtick_strings: false,
});

static UNKNOWN: Lazy<Syntax> = Lazy::new(|| Syntax {
    body: BodyStyle::Braces,
    declarations: Vec::new(),
    imports: Vec::new(),
    line_comments: &["//", "#"],
    block_comment: Some(("/*", "*/")),
    single_quote_strings: true,
    backtick_strings: false,
});

/// Words that look like `name(` but never name a declaration
const NOT_A_NAME: &[&str] = &[
    "if", "else", "for", "while", "switch", "catch", "return", "function", "do", "try",
    "new", "typeof", "sizeof", "await", "yield", "match", "loop", "with", "elif", "case",
    "throw", "delete", "void", "super", "this",
];

/// Pattern-based extractor for one language
pub struct HeuristicExtractor {
    language: Language,
    preview_chars: usize,
}

impl HeuristicExtractor {
    pub fn new(language: Language, preview_chars: usize) -> Self {
        Self {
            language,
            preview_chars,
        }
    }
}

impl EntityExtractor for HeuristicExtractor {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn extract(&self, path: &str, content: &str) -> Result<Vec<ContextNode>> {
        let syntax = self.language.syntax();
        let lines = LineIndex::new(content);

        let mut entities = Vec::new();
        for (line_no, (offset, line)) in lines.iter().enumerate() {
            let Some((kind, name)) = match_declaration(syntax, line) else {
                continue;
            };
            let end = match syntax.body {
                BodyStyle::Braces => brace_body_end(syntax, content, offset),
                BodyStyle::Indentation => indent_body_end(&lines, line_no),
            };
            let body = content[offset..end].trim_end();
            let last_line = lines.line_of(offset + body.len().saturating_sub(1));
            entities.push(
                ContextNode::new(kind, path, name, body).with_lines(line_no + 1, last_line + 1),
            );
        }

        entities.extend(comment_blocks(syntax, path, &lines));

        Ok(assemble(
            file_node(path, content, self.preview_chars, parse_imports(self.language, content)),
            entities,
        ))
    }
}

/// File node with a content preview and its raw import list
pub(crate) fn file_node(path: &str, content: &str, preview_chars: usize, imports: Vec<String>) -> ContextNode {
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let preview = match content.char_indices().nth(preview_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    };
    let mut node = ContextNode::new(NodeKind::File, path, name, preview)
        .with_lines(1, content.lines().count().max(1));
    node.imports = imports;
    node
}

/// Order entities by position, make ids unique and put the file node first
pub(crate) fn assemble(file: ContextNode, mut entities: Vec<ContextNode>) -> Vec<ContextNode> {
    entities.sort_by_key(|n| (n.start_line, n.kind));

    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(file.id.clone());

    let mut nodes = Vec::with_capacity(entities.len() + 1);
    nodes.push(file);
    for mut node in entities {
        if !seen.insert(node.id.clone()) {
            node.id = format!("{}:{}", node.id, node.start_line.unwrap_or(0));
            if !seen.insert(node.id.clone()) {
                continue;
            }
        }
        nodes.push(node);
    }
    nodes
}

fn match_declaration(syntax: &Syntax, line: &str) -> Option<(NodeKind, String)> {
    for (kind, pattern) in &syntax.declarations {
        let Some(caps) = pattern.captures(line) else {
            continue;
        };
        if let Some(name) = caps.name("name") {
            if NOT_A_NAME.contains(&name.as_str()) {
                continue;
            }
            return Some((*kind, name.as_str().to_string()));
        }
        if let Some(target) = caps.name("impl") {
            return Some((*kind, format!("impl {}", target.as_str())));
        }
    }
    None
}

/// Raw import specifiers, deduplicated in order of appearance
pub fn parse_imports(language: Language, content: &str) -> Vec<String> {
    let syntax = language.syntax();
    let mut seen = HashSet::new();
    let mut imports = Vec::new();
    let mut push = |specifier: &str| {
        let specifier = specifier.trim();
        if !specifier.is_empty() && seen.insert(specifier.to_string()) {
            imports.push(specifier.to_string());
        }
    };

    for rule in &syntax.imports {
        match rule {
            ImportRule::Line(pattern) => {
                for line in content.lines() {
                    for caps in pattern.captures_iter(line) {
                        if let Some(m) = caps.get(1) {
                            if language == Language::Python {
                                m.as_str().split(',').for_each(&mut push);
                            } else {
                                push(m.as_str());
                            }
                        }
                    }
                }
            }
            ImportRule::Block { block, item } => {
                for caps in block.captures_iter(content) {
                    if let Some(inner) = caps.get(1) {
                        for item_caps in item.captures_iter(inner.as_str()) {
                            if let Some(m) = item_caps.get(1) {
                                push(m.as_str());
                            }
                        }
                    }
                }
            }
        }
    }

    imports
}

/// Byte offsets of line starts, for offset/line conversion
pub(crate) struct LineIndex<'a> {
    content: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(content: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(content.match_indices('\n').map(|(i, _)| i + 1));
        if starts.last() == Some(&content.len()) && content.len() > 0 {
            starts.pop();
        }
        Self { content, starts }
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// Line text without its terminator
    pub fn line(&self, idx: usize) -> &'a str {
        let start = self.starts[idx];
        let end = self.starts.get(idx + 1).copied().unwrap_or(self.content.len());
        self.content[start..end].trim_end_matches(['\n', '\r'])
    }

    pub fn start(&self, idx: usize) -> usize {
        self.starts[idx]
    }

    /// End offset of a line including its newline
    pub fn end(&self, idx: usize) -> usize {
        self.starts.get(idx + 1).copied().unwrap_or(self.content.len())
    }

    /// Zero-based line containing `offset`
    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset).saturating_sub(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a str)> + '_ {
        (0..self.len()).map(move |i| (self.start(i), self.line(i)))
    }
}

/// Scans bytes while skipping string literals and comments
struct Scanner<'a> {
    bytes: &'a [u8],
    syntax: &'a Syntax,
}

impl<'a> Scanner<'a> {
    /// If a string or comment starts at `i`, the offset just past it
    fn skip(&self, i: usize) -> Option<usize> {
        let bytes = self.bytes;
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        if b == b'/' && next == Some(b'/') && self.syntax.line_comments.contains(&"//") {
            return Some(find_byte(bytes, i, b'\n').unwrap_or(bytes.len()));
        }
        if b == b'#' && self.syntax.line_comments.contains(&"#") {
            return Some(find_byte(bytes, i, b'\n').unwrap_or(bytes.len()));
        }
        if let Some((open, close)) = self.syntax.block_comment {
            if bytes[i..].starts_with(open.as_bytes()) {
                let from = i + open.len();
                return Some(
                    find_slice(&bytes[from..], close.as_bytes())
                        .map(|p| from + p + close.len())
                        .unwrap_or(bytes.len()),
                );
            }
        }

        let quote = match b {
            b'"' => true,
            b'\'' if self.syntax.single_quote_strings => true,
            b'`' if self.syntax.backtick_strings => true,
            b'\'' => {
                // char literal ('x' or '\n'); anything else is a lifetime
                if next == Some(b'\\') {
                    return find_byte(bytes, i + 3, b'\'').map(|p| p + 1);
                }
                if bytes.get(i + 2) == Some(&b'\'') {
                    return Some(i + 3);
                }
                false
            }
            _ => false,
        };
        if !quote {
            return None;
        }

        let mut j = i + 1;
        while j < bytes.len() {
            match bytes[j] {
                b'\\' => j += 2,
                c if c == b => return Some(j + 1),
                b'\n' if b != b'`' && b != b'"' => return Some(j),
                _ => j += 1,
            }
        }
        Some(bytes.len())
    }
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes.get(from..)?.iter().position(|&c| c == needle).map(|p| from + p)
}

fn find_slice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Line starts that continue a declaration header
const CONTINUATIONS: &[&[u8]] = &[b"{", b"where", b"->", b".", b":", b"extends", b"implements", b"throws"];

/// Whether a declaration header continues past a newline
fn continues_after(bytes: &[u8], newline: usize) -> bool {
    let before = bytes[..newline].iter().rev().find(|c| !c.is_ascii_whitespace());
    if matches!(before, Some(b',' | b'(' | b'=' | b'>' | b':' | b'<' | b'|' | b'&' | b'+' | b'-')) {
        return true;
    }
    let rest = &bytes[newline + 1..];
    let start = rest.iter().position(|c| !c.is_ascii_whitespace()).unwrap_or(rest.len());
    let rest = &rest[start..];
    CONTINUATIONS.iter().any(|p| rest.starts_with(p))
}

/// End offset (exclusive) of a brace-delimited declaration starting at `start`.
///
/// Looks for the opening `{` outside parentheses; a `;` or a statement-ending
/// newline first means the declaration has no body. Then tracks nesting
/// depth until it returns to zero.
pub(crate) fn brace_body_end(syntax: &Syntax, content: &str, start: usize) -> usize {
    let bytes = content.as_bytes();
    let scanner = Scanner { bytes, syntax };

    let mut i = start;
    let mut parens = 0usize;
    let open = loop {
        if i >= bytes.len() {
            return bytes.len();
        }
        if let Some(next) = scanner.skip(i) {
            i = next;
            continue;
        }
        match bytes[i] {
            b'(' | b'[' => parens += 1,
            b')' | b']' => parens = parens.saturating_sub(1),
            b'{' if parens == 0 => break i,
            b';' if parens == 0 => return i + 1,
            b'\n' if parens == 0 && !continues_after(bytes, i) => return i,
            _ => {}
        }
        i += 1;
    };

    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        if let Some(next) = scanner.skip(i) {
            i = next;
            continue;
        }
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// End offset (exclusive) of an indentation-delimited declaration at `decl_line`.
///
/// The header may span several lines while brackets are open; the body is
/// every following line that is blank or indented deeper than the header.
pub(crate) fn indent_body_end(lines: &LineIndex<'_>, decl_line: usize) -> usize {
    let base = indent_width(lines.line(decl_line));

    let mut depth: i32 = 0;
    let mut header_end = decl_line;
    for idx in decl_line..lines.len().min(decl_line + 20) {
        for c in lines.line(idx).chars() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                '#' => break,
                _ => {}
            }
        }
        header_end = idx;
        if depth <= 0 {
            break;
        }
    }

    let mut last = header_end;
    for idx in header_end + 1..lines.len() {
        let line = lines.line(idx);
        if line.trim().is_empty() {
            continue;
        }
        if indent_width(line) <= base {
            break;
        }
        last = idx;
    }
    lines.end(last)
}

/// Comment blocks long enough to carry meaning
fn comment_blocks(syntax: &Syntax, path: &str, lines: &LineIndex<'_>) -> Vec<ContextNode> {
    let mut blocks = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let trimmed = lines.line(idx).trim_start();

        if let Some((open, close)) = syntax.block_comment {
            if trimmed.starts_with(open) {
                let mut end = idx;
                while end < lines.len() {
                    let line = lines.line(end);
                    let after_open = if end == idx {
                        line.find(open).map(|p| &line[p + open.len()..]).unwrap_or(line)
                    } else {
                        line
                    };
                    if after_open.contains(close) {
                        break;
                    }
                    end += 1;
                }
                let end = end.min(lines.len() - 1);
                push_comment(&mut blocks, path, lines, idx, end);
                idx = end + 1;
                continue;
            }
        }

        let prefix = syntax
            .line_comments
            .iter()
            .find(|p| trimmed.starts_with(**p) && !trimmed.starts_with("#!"));
        if let Some(prefix) = prefix {
            let mut end = idx;
            while end + 1 < lines.len() && lines.line(end + 1).trim_start().starts_with(*prefix) {
                end += 1;
            }
            push_comment(&mut blocks, path, lines, idx, end);
            idx = end + 1;
            continue;
        }

        idx += 1;
    }

    blocks
}

fn push_comment(blocks: &mut Vec<ContextNode>, path: &str, lines: &LineIndex<'_>, first: usize, last: usize) {
    let text = lines.content[lines.start(first)..lines.end(last)].trim_end();
    if let Some(node) = comment_node(path, text, first + 1, last + 1) {
        blocks.push(node);
    }
}

/// Comment node for a block spanning `first..=last` (1-based), if long enough
pub(crate) fn comment_node(path: &str, text: &str, first: usize, last: usize) -> Option<ContextNode> {
    let meaningful = text
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .count();
    if meaningful < MIN_COMMENT_CHARS {
        return None;
    }
    Some(ContextNode::new(NodeKind::Comment, path, format!("L{}", first), text).with_lines(first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(path: &str, code: &str) -> Vec<ContextNode> {
        ExtractorRegistry::default().extract(path, code).unwrap()
    }

    fn find<'a>(nodes: &'a [ContextNode], kind: NodeKind, name: &str) -> &'a ContextNode {
        nodes
            .iter()
            .find(|n| n.kind == kind && n.name == name)
            .unwrap_or_else(|| panic!("missing {kind} {name}"))
    }

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("ts"), Language::TypeScript);
        assert_eq!(Language::from_extension("tsx"), Language::TypeScript);
        assert_eq!(Language::from_extension("go"), Language::Go);
        assert_eq!(Language::from_extension("cs"), Language::CFamily);
        assert_eq!(Language::from_extension("unknown"), Language::Unknown);
    }

    #[test]
    fn test_parse_rust_code() {
        let code = r#"use std::fmt;
use crate::config::Config;

fn main() {
    println!("Hello {}", "}");
}

struct User<'a> {
    name: &'a str,
}

impl<'a> User<'a> {
    fn new(name: &'a str) -> Self {
        Self { name }
    }
}
"#;
        let nodes = extract("src/main.rs", code);

        assert_eq!(nodes[0].id, "file:src/main.rs");
        assert_eq!(nodes[0].imports, vec!["std::fmt", "crate::config::Config"]);

        let main = find(&nodes, NodeKind::Function, "main");
        assert_eq!(main.start_line, Some(4));
        assert_eq!(main.end_line, Some(6));
        assert!(main.content.ends_with('}'));

        let user = find(&nodes, NodeKind::Class, "User");
        assert!(user.content.contains("name: &'a str"));
        assert_eq!(user.end_line, Some(10));

        let imp = find(&nodes, NodeKind::Class, "impl User");
        assert_eq!(imp.start_line, Some(12));
        assert_eq!(imp.end_line, Some(16));

        let new = find(&nodes, NodeKind::Function, "new");
        assert_eq!(new.content.lines().count(), 3);
    }

    #[test]
    fn test_typescript_component_and_destructured_params() {
        let code = r#"import React, { useState } from 'react';
import { formatDate } from '../utils/format';

interface HeaderProps {
  title: string;
}

export const Header = ({ title }: HeaderProps) => {
  const [open, setOpen] = useState(false);
  return <header onClick={() => setOpen(!open)}>{title}</header>;
};

export function helper({ a, b }: { a: number; b: number }) {
  if (a > b) {
    return a;
  }
  return b;
}
"#;
        let nodes = extract("src/components/Header.tsx", code);

        assert_eq!(nodes[0].imports, vec!["react", "../utils/format"]);
        let header = find(&nodes, NodeKind::Function, "Header");
        assert_eq!(header.start_line, Some(8));
        assert_eq!(header.end_line, Some(11));

        let helper = find(&nodes, NodeKind::Function, "helper");
        assert_eq!(helper.end_line, Some(18));
        assert!(!nodes.iter().any(|n| n.name == "if"));

        let props = find(&nodes, NodeKind::Class, "HeaderProps");
        assert_eq!(props.end_line, Some(6));
    }

    #[test]
    fn test_class_methods_are_nested_entities() {
        let code = "export class Store {\n  private items: string[] = [];\n\n  add(item: string): void {\n    this.items.push(item);\n  }\n}\n";
        let nodes = extract("store.ts", code);

        let class = find(&nodes, NodeKind::Class, "Store");
        assert_eq!((class.start_line, class.end_line), (Some(1), Some(7)));
        let add = find(&nodes, NodeKind::Function, "add");
        assert_eq!((add.start_line, add.end_line), (Some(4), Some(6)));
    }

    #[test]
    fn test_python_indentation_bodies() {
        let code = r#"import os, sys
from pathlib import Path

class Loader:
    def __init__(self, root):
        self.root = root

    def load(
        self,
        name,
    ) -> str:
        with open(os.path.join(self.root, name)) as f:
            return f.read()

def main():
    print(Loader(".").load("x"))
"#;
        let nodes = extract("loader.py", code);

        assert_eq!(nodes[0].imports, vec!["os", "sys", "pathlib"]);
        let class = find(&nodes, NodeKind::Class, "Loader");
        assert_eq!((class.start_line, class.end_line), (Some(4), Some(13)));
        let load = find(&nodes, NodeKind::Function, "load");
        assert_eq!((load.start_line, load.end_line), (Some(8), Some(13)));
        let main = find(&nodes, NodeKind::Function, "main");
        assert_eq!((main.start_line, main.end_line), (Some(15), Some(16)));
    }

    #[test]
    fn test_go_import_block_and_methods() {
        let code = "package main\n\nimport (\n\t\"fmt\"\n\tlog \"github.com/sirupsen/logrus\"\n)\n\ntype Server struct {\n\tport int\n}\n\nfunc (s *Server) Start() error {\n\tfmt.Println(s.port)\n\treturn nil\n}\n";
        let nodes = extract("main.go", code);

        assert_eq!(nodes[0].imports, vec!["fmt", "github.com/sirupsen/logrus"]);
        find(&nodes, NodeKind::Class, "Server");
        let start = find(&nodes, NodeKind::Function, "Start");
        assert_eq!(start.end_line, Some(15));
    }

    #[test]
    fn test_long_comments_become_nodes() {
        let code = "// short\nfn a() {}\n\n/**\n * Computes the checksum of every block in the archive\n * and validates it against the manifest.\n */\nfn b() {}\n";
        let nodes = extract("lib.rs", code);

        let comments: Vec<_> = nodes.iter().filter(|n| n.kind == NodeKind::Comment).collect();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, "comment:lib.rs:L4");
        assert_eq!((comments[0].start_line, comments[0].end_line), (Some(4), Some(7)));
    }

    #[test]
    fn test_unknown_file_type_is_comment_only() {
        let code = "# Deployment notes for the staging cluster and rollback steps\n# kept here until the wiki migration lands\nfunction notParsed() {}\n";
        let nodes = extract("deploy.txt", code);

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].kind, NodeKind::File);
        assert_eq!(nodes[1].kind, NodeKind::Comment);
    }

    #[test]
    fn test_file_node_preview_is_truncated() {
        let code = "x".repeat(DEFAULT_PREVIEW_CHARS + 500);
        let nodes = extract("big.txt", &code);
        assert_eq!(nodes[0].content.len(), DEFAULT_PREVIEW_CHARS);
        assert_eq!(nodes[0].name, "big.txt");
    }

    #[test]
    fn test_duplicate_names_get_unique_ids() {
        let code = "function run() {\n  return 1;\n}\n\nfunction run() {\n  return 2;\n}\n";
        let nodes = extract("dup.js", code);
        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["file:dup.js", "function:dup.js:run", "function:dup.js:run:5"]);
    }

    #[test]
    fn test_binary_content_is_rejected() {
        let err = ExtractorRegistry::default().extract("blob.rs", "fn a() {}\0\0").unwrap_err();
        assert!(matches!(err, ContextError::Extraction { .. }));
    }

    #[test]
    fn test_declaration_without_body() {
        let code = "export type Id = string;\nexport const handler = (x: number) => x * 2\nconst other = 1;\n";
        let nodes = extract("types.ts", code);
        let id = find(&nodes, NodeKind::Class, "Id");
        assert_eq!(id.content, "export type Id = string;");
        let handler = find(&nodes, NodeKind::Function, "handler");
        assert_eq!(handler.content, "export const handler = (x: number) => x * 2");
    }
}

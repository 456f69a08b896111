//! Semantic units tracked by the index

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of semantic unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Function,
    Class,
    Variable,
    Import,
    Comment,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Function => "function",
            NodeKind::Class => "class",
            NodeKind::Variable => "variable",
            NodeKind::Import => "import",
            NodeKind::Comment => "comment",
        }
    }

    /// Kinds whose bodies are scanned for call references
    pub fn is_callable_body(&self) -> bool {
        matches!(self, NodeKind::Function | NodeKind::Class)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One semantic unit of code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextNode {
    pub id: String,
    pub kind: NodeKind,
    pub path: String,
    pub name: String,
    /// Full body for entities; a preview for file nodes
    pub content: String,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub embedding: Option<Vec<f32>>,
    /// Raw import specifiers (file nodes only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    pub dependencies: BTreeSet<String>,
    pub dependents: BTreeSet<String>,
    pub relevance_score: f64,
    pub last_accessed: Option<DateTime<Utc>>,
    pub access_count: u64,
}

impl ContextNode {
    pub fn new(kind: NodeKind, path: &str, name: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Self::make_id(kind, path, &name),
            kind,
            path: path.to_string(),
            name,
            content: content.into(),
            start_line: None,
            end_line: None,
            embedding: None,
            imports: Vec::new(),
            dependencies: BTreeSet::new(),
            dependents: BTreeSet::new(),
            relevance_score: 0.0,
            last_accessed: None,
            access_count: 0,
        }
    }

    pub fn with_lines(mut self, start: usize, end: usize) -> Self {
        self.start_line = Some(start);
        self.end_line = Some(end);
        self
    }

    /// `file:<path>` for files, `<kind>:<path>:<name>` otherwise
    pub fn make_id(kind: NodeKind, path: &str, name: &str) -> String {
        match kind {
            NodeKind::File => Self::file_id(path),
            _ => format!("{}:{}:{}", kind, path, name),
        }
    }

    pub fn file_id(path: &str) -> String {
        format!("file:{}", path)
    }

    /// Text searched by keyword/entity matching
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.name, self.content).to_lowercase()
    }

    /// One-line `kind: name (path)` label
    pub fn header(&self) -> String {
        format!("{}: {} ({})", self.kind, self.name, self.path)
    }
}

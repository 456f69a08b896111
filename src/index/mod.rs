//! Codebase indexing
//!
//! Runs entity extraction over a whole file corpus, links import and call
//! edges, attaches embeddings and publishes the result as an immutable
//! [`CodeIndex`] snapshot. A rebuild always starts from scratch and the new
//! snapshot replaces the old one in a single pointer swap, so readers never
//! observe a half-built index.

pub mod graph;
pub mod node;
pub mod retrieval;
pub mod semantic;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::IndexerConfig;
use crate::core::ast::AstExtractor;
use crate::core::corpus::FileCorpus;
use crate::core::parser::ExtractorRegistry;
use crate::index::graph::CallGraph;
use crate::index::node::{ContextNode, NodeKind};
use crate::index::semantic::{Embedder, HashEmbedder};

/// Usage telemetry for one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRecord {
    pub last_accessed: DateTime<Utc>,
    pub count: u64,
}

/// Immutable node index plus call graph for one corpus snapshot
#[derive(Debug, Default)]
pub struct CodeIndex {
    nodes: BTreeMap<String, ContextNode>,
    graph: CallGraph,
    access: Mutex<HashMap<String, AccessRecord>>,
}

impl CodeIndex {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ContextNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &ContextNode> {
        self.nodes.values()
    }

    pub fn graph(&self) -> &CallGraph {
        &self.graph
    }

    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.nodes.values().filter(|n| n.kind == kind).count()
    }

    /// Bump access telemetry and return the updated record
    pub fn touch(&self, id: &str) -> AccessRecord {
        let mut access = self.access.lock();
        let record = access.entry(id.to_string()).or_insert(AccessRecord {
            last_accessed: Utc::now(),
            count: 0,
        });
        record.last_accessed = Utc::now();
        record.count += 1;
        *record
    }

    pub fn access(&self, id: &str) -> Option<AccessRecord> {
        self.access.lock().get(id).copied()
    }

    /// Remove every node of `path` and prune all edges pointing at them.
    ///
    /// Returns the number of nodes removed.
    pub fn remove_file(&mut self, path: &str) -> usize {
        let removed: HashSet<String> = self
            .nodes
            .values()
            .filter(|n| n.path == path)
            .map(|n| n.id.clone())
            .collect();
        if removed.is_empty() {
            return 0;
        }

        self.nodes.retain(|id, _| !removed.contains(id));
        for node in self.nodes.values_mut() {
            node.dependencies.retain(|id| !removed.contains(id));
            node.dependents.retain(|id| !removed.contains(id));
        }
        self.graph.remove_nodes(&removed);
        self.access.get_mut().retain(|id, _| !removed.contains(id));

        removed.len()
    }

    fn insert(&mut self, node: ContextNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Add `from -> to` to dependencies and the inverse to dependents
    /// Add a dependency edge; false when it already existed or an end is missing
    fn link(&mut self, from: &str, to: &str) -> bool {
        if from == to || !self.nodes.contains_key(to) {
            return false;
        }
        let added = match self.nodes.get_mut(from) {
            Some(node) => node.dependencies.insert(to.to_string()),
            None => return false,
        };
        if let Some(node) = self.nodes.get_mut(to) {
            node.dependents.insert(from.to_string());
        }
        added
    }
}

/// Summary of one index build
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub total_lines: usize,
    pub nodes: usize,
    pub functions: usize,
    pub classes: usize,
    pub comments: usize,
    pub import_edges: usize,
    pub call_edges: usize,
    pub time_taken_ms: u64,
    pub errors: Vec<(String, String)>,
}

/// Builds [`CodeIndex`] snapshots and holds the current one
pub struct Indexer {
    registry: ExtractorRegistry,
    embedder: Arc<dyn Embedder>,
    current: RwLock<Arc<CodeIndex>>,
}

impl Indexer {
    pub fn new(registry: ExtractorRegistry, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            registry,
            embedder,
            current: RwLock::new(Arc::new(CodeIndex::default())),
        }
    }

    pub fn from_config(config: &IndexerConfig) -> Self {
        let mut registry = ExtractorRegistry::heuristic(config.file_preview_chars);
        if config.ast_parsing {
            AstExtractor::install(&mut registry, config.file_preview_chars);
        }
        if config.enable_memory {
            warn!(
                retention_days = config.memory_retention_days,
                "cross-session memory is not supported; the index lives only for this process"
            );
        }
        Self::new(registry, Arc::new(HashEmbedder::new(config.embedding_dimensions)))
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }

    /// Current snapshot; stays valid even if a rebuild swaps in a new one
    pub fn snapshot(&self) -> Arc<CodeIndex> {
        Arc::clone(&self.current.read())
    }

    /// Rebuild from `files` and publish the result as the current snapshot
    pub fn index_codebase(&self, files: &FileCorpus) -> IndexStats {
        let (index, stats) = self.build(files);
        *self.current.write() = Arc::new(index);
        stats
    }

    /// Build a fresh index for `files` without touching the current snapshot
    pub fn build(&self, files: &FileCorpus) -> (CodeIndex, IndexStats) {
        let start = Instant::now();
        let inputs: Vec<(&str, &str)> = files.indexable().collect();

        let extracted: Vec<_> = inputs
            .par_iter()
            .map(|(path, content)| (*path, *content, self.registry.extract(path, content)))
            .collect();

        let mut index = CodeIndex::default();
        let mut stats = IndexStats::default();

        for (path, content, result) in extracted {
            match result {
                Ok(nodes) => {
                    stats.files_indexed += 1;
                    stats.total_lines += content.lines().count();
                    for node in nodes {
                        index.graph.record(&node);
                        index.insert(node);
                    }
                }
                Err(e) => {
                    warn!(path, error = %e, "skipping file that failed extraction");
                    stats.files_skipped += 1;
                    stats.errors.push((path.to_string(), e.to_string()));
                }
            }
        }

        stats.import_edges = link_imports(&mut index);

        let embedder = &self.embedder;
        index.nodes.par_iter_mut().for_each(|(_, node)| {
            node.embedding = Some(embedder.embed(&format!("{} {}", node.name, node.content)));
        });

        stats.nodes = index.len();
        stats.functions = index.count_kind(NodeKind::Function);
        stats.classes = index.count_kind(NodeKind::Class);
        stats.comments = index.count_kind(NodeKind::Comment);
        stats.call_edges = index.graph.edge_count();
        stats.time_taken_ms = start.elapsed().as_millis() as u64;

        info!(
            nodes = stats.nodes,
            files = stats.files_indexed,
            skipped = stats.files_skipped,
            duration_ms = stats.time_taken_ms,
            "indexed codebase"
        );

        (index, stats)
    }
}

/// Resolve file-node import specifiers to other file nodes.
///
/// Returns the number of edges added.
fn link_imports(index: &mut CodeIndex) -> usize {
    let stems: HashMap<String, String> = index
        .nodes
        .values()
        .filter(|n| n.kind == NodeKind::File)
        .map(|n| (strip_extension(&n.path).to_string(), n.path.clone()))
        .collect();

    let mut edges = Vec::new();
    for node in index.nodes.values().filter(|n| n.kind == NodeKind::File) {
        for specifier in &node.imports {
            match resolve_import(specifier, &node.path, &stems) {
                Some(target) => edges.push((node.id.clone(), ContextNode::file_id(target))),
                None => debug!(from = %node.path, import = %specifier, "unresolved import"),
            }
        }
    }

    edges
        .iter()
        .filter(|(from, to)| index.link(from, to))
        .count()
}

fn strip_extension(path: &str) -> &str {
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..file_start + dot],
        _ => path,
    }
}

/// Collapse `.` and `..` segments of a `/`-separated path
fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Map an import specifier to a corpus file path, if one matches
fn resolve_import<'a>(specifier: &str, from: &str, stems: &'a HashMap<String, String>) -> Option<&'a String> {
    let lookup = |stem: &str| -> Option<&'a String> {
        ["", "/index", "/mod", "/__init__"]
            .iter()
            .find_map(|suffix| stems.get(&format!("{stem}{suffix}")))
            .filter(|target| target.as_str() != from)
    };

    if specifier.starts_with("./") || specifier.starts_with("../") {
        let dir = from.rfind('/').map_or("", |i| &from[..i]);
        let joined = normalize(&format!("{dir}/{specifier}"));
        let joined = if dir.is_empty() { joined.trim_start_matches('/').to_string() } else { joined };
        return lookup(strip_extension(&joined)).or_else(|| lookup(&joined));
    }

    let segments: Vec<&str> = specifier
        .split(|c| c == ':' || c == '.' || c == '/')
        .filter(|s| !s.is_empty() && !matches!(*s, "crate" | "self" | "super" | "*" | "@"))
        .collect();

    // longest module path first: a::b::C tries "a/b/C", then "a/b", then "a"
    for len in (1..=segments.len()).rev() {
        let candidate = segments[..len].join("/");
        if let Some(target) = lookup(&candidate) {
            return Some(target);
        }
        let mut matches: Vec<&'a String> = stems
            .iter()
            .filter(|(stem, _)| {
                stem.ends_with(&format!("/{candidate}"))
                    || ["/index", "/mod", "/__init__"]
                        .iter()
                        .any(|s| stem.ends_with(&format!("/{candidate}{s}")))
            })
            .map(|(_, path)| path)
            .filter(|path| path.as_str() != from)
            .collect();
        matches.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        if let Some(first) = matches.first() {
            return Some(*first);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::DEFAULT_PREVIEW_CHARS;

    fn indexer() -> Indexer {
        Indexer::new(
            ExtractorRegistry::heuristic(DEFAULT_PREVIEW_CHARS),
            Arc::new(HashEmbedder::default()),
        )
    }

    fn corpus() -> FileCorpus {
        let mut files = FileCorpus::new();
        files.insert_file(
            "/app/src/components/Header.tsx",
            "import { formatTitle } from '../utils/format';\n\nexport const Header = ({ title }) => {\n  return <h1>{formatTitle(title)}</h1>;\n};\n",
        );
        files.insert_file(
            "/app/src/utils/format.ts",
            "export function formatTitle(title: string) {\n  return title.trim();\n}\n",
        );
        files.insert_file("/app/README.md", "");
        files
    }

    #[test]
    fn test_index_codebase_builds_nodes_embeddings_and_edges() {
        let indexer = indexer();
        let stats = indexer.index_codebase(&corpus());
        let index = indexer.snapshot();

        assert_eq!(stats.files_indexed, 2);
        assert_eq!(stats.import_edges, 1);
        assert!(index.nodes().all(|n| n.embedding.as_ref().map(Vec::len) == Some(256)));

        let header_file = index.get("file:/app/src/components/Header.tsx").unwrap();
        let format_file = index.get("file:/app/src/utils/format.ts").unwrap();
        assert!(header_file.dependencies.contains(&format_file.id));
        assert!(format_file.dependents.contains(&header_file.id));

        assert_eq!(index.graph().in_degree("formatTitle"), 1);
        assert!(index.contains("function:/app/src/components/Header.tsx:Header"));
    }

    #[test]
    fn test_reindex_is_idempotent_and_replaces_stale_nodes() {
        let indexer = indexer();
        let (first, _) = indexer.build(&corpus());
        let (second, _) = indexer.build(&corpus());
        let summary = |index: &CodeIndex| -> Vec<(String, String)> {
            index.nodes().map(|n| (n.id.clone(), n.content.clone())).collect()
        };
        assert_eq!(summary(&first), summary(&second));

        indexer.index_codebase(&corpus());
        let mut smaller = corpus();
        smaller.remove("/app/src/utils/format.ts");
        indexer.index_codebase(&smaller);

        let index = indexer.snapshot();
        assert!(index.nodes().all(|n| n.path != "/app/src/utils/format.ts"));
        assert!(index.nodes().all(|n| n.dependencies.is_empty()));
    }

    #[test]
    fn test_snapshot_survives_rebuild() {
        let indexer = indexer();
        indexer.index_codebase(&corpus());
        let old = indexer.snapshot();
        indexer.index_codebase(&FileCorpus::new());

        assert!(!old.is_empty());
        assert!(indexer.snapshot().is_empty());
    }

    #[test]
    fn test_failed_file_is_skipped_not_fatal() {
        let mut files = corpus();
        files.insert_file("/app/blob.js", "function a() {}\0");
        let stats = indexer().index_codebase(&files);

        assert_eq!(stats.files_indexed, 2);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.errors[0].0, "/app/blob.js");
    }

    #[test]
    fn test_link_counts_new_edges_only() {
        let (mut index, stats) = indexer().build(&corpus());
        assert_eq!(stats.import_edges, 1);

        let header = "file:/app/src/components/Header.tsx";
        let format = "file:/app/src/utils/format.ts";
        assert!(!index.link(header, format));
        assert!(index.link(format, header));
        assert!(!index.link(format, format));
        assert!(!index.link(format, "file:/missing.ts"));
        assert!(index.get(header).unwrap().dependents.contains(format));
    }

    #[test]
    fn test_remove_file_prunes_edges() {
        let (mut index, _) = indexer().build(&corpus());
        let removed = index.remove_file("/app/src/utils/format.ts");

        assert_eq!(removed, 2);
        assert!(index.nodes().all(|n| n.path != "/app/src/utils/format.ts"));
        let header_file = index.get("file:/app/src/components/Header.tsx").unwrap();
        assert!(header_file.dependencies.is_empty());
        assert_eq!(index.graph().calls("function:/app/src/utils/format.ts:formatTitle"), None);
        assert_eq!(index.remove_file("/nope"), 0);
    }

    #[test]
    fn test_touch_updates_access_telemetry() {
        let (index, _) = indexer().build(&corpus());
        let id = "file:/app/src/utils/format.ts";
        assert_eq!(index.access(id), None);
        index.touch(id);
        assert_eq!(index.touch(id).count, 2);
    }

    #[test]
    fn test_resolve_module_style_imports() {
        let stems: HashMap<String, String> = [
            ("src/config", "src/config.rs"),
            ("src/core/parser", "src/core/parser.rs"),
            ("pkg/util/__init__", "pkg/util/__init__.py"),
        ]
        .into_iter()
        .map(|(s, p)| (s.to_string(), p.to_string()))
        .collect();

        assert_eq!(
            resolve_import("crate::config::Config", "src/main.rs", &stems).map(String::as_str),
            Some("src/config.rs")
        );
        assert_eq!(
            resolve_import("parser", "src/core/mod.rs", &stems).map(String::as_str),
            Some("src/core/parser.rs")
        );
        assert_eq!(
            resolve_import("pkg.util", "main.py", &stems).map(String::as_str),
            Some("pkg/util/__init__.py")
        );
        assert_eq!(resolve_import("std::fmt", "src/main.rs", &stems), None);
    }

    #[test]
    fn test_normalize_and_strip_extension() {
        assert_eq!(normalize("/app/src/components/../utils/./format"), "/app/src/utils/format");
        assert_eq!(strip_extension("/app/src/format.test.ts"), "/app/src/format.test");
        assert_eq!(strip_extension("Makefile"), "Makefile");
        assert_eq!(strip_extension(".env"), ".env");
    }
}

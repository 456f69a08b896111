//! Relevance ranking and dependency closure over a [`CodeIndex`]

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::ai::intent::QueryIntent;
use crate::config::IndexerConfig;
use crate::index::node::ContextNode;
use crate::index::semantic::cosine_similarity;
use crate::index::CodeIndex;

const SEMANTIC_WEIGHT: f64 = 0.4;
const KEYWORD_WEIGHT: f64 = 0.3;
const ENTITY_WEIGHT: f64 = 0.2;
const STRUCTURAL_WEIGHT: f64 = 0.1;

/// Scores at or below this are never returned directly
pub const NOISE_FLOOR: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    pub max_nodes: usize,
    /// Nodes scoring above this pull in their neighbours
    pub semantic_threshold: f64,
    pub keyword_threshold: f64,
    pub structural_threshold: f64,
    pub closure_depth: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_nodes: 50,
            semantic_threshold: 0.7,
            keyword_threshold: 0.3,
            structural_threshold: 0.5,
            closure_depth: 1,
        }
    }
}

impl From<&IndexerConfig> for RetrievalConfig {
    fn from(config: &IndexerConfig) -> Self {
        Self {
            max_nodes: config.max_retrieved_nodes,
            semantic_threshold: config.semantic_threshold,
            keyword_threshold: config.keyword_threshold,
            structural_threshold: config.structural_threshold,
            closure_depth: config.closure_depth,
        }
    }
}

/// Per-signal breakdown of one node's relevance
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Score {
    pub semantic: f64,
    pub keyword: f64,
    pub entity: f64,
    pub structural: f64,
}

impl Score {
    pub fn total(&self) -> f64 {
        SEMANTIC_WEIGHT * self.semantic
            + KEYWORD_WEIGHT * self.keyword
            + ENTITY_WEIGHT * self.entity
            + STRUCTURAL_WEIGHT * self.structural
    }
}

#[derive(Debug, Clone, Default)]
pub struct Retriever {
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn score(&self, index: &CodeIndex, node: &ContextNode, intent: &QueryIntent) -> Score {
        let text = node.searchable_text();
        let semantic = match (&node.embedding, &intent.vector) {
            (Some(a), Some(b)) => cosine_similarity(a, b),
            _ => 0.0,
        };
        Score {
            semantic,
            keyword: overlap(&text, &intent.keywords),
            entity: overlap(&text, &intent.entities),
            structural: index.graph().centrality(node, index.len()),
        }
    }

    /// Rank nodes for `intent`, then expand high scorers through the
    /// dependency and caller edges.
    ///
    /// Returned nodes are clones carrying `relevance_score` and the access
    /// telemetry recorded by this call. Directly scored nodes come first,
    /// highest score first.
    pub fn retrieve(&self, index: &CodeIndex, intent: &QueryIntent) -> Vec<ContextNode> {
        let mut scores: HashMap<&str, f64> = HashMap::with_capacity(index.len());
        let mut ranked: Vec<(&ContextNode, f64)> = Vec::new();
        let (mut keyword_hits, mut structural_hits) = (0usize, 0usize);

        for node in index.nodes() {
            let score = self.score(index, node, intent);
            if score.keyword >= self.config.keyword_threshold {
                keyword_hits += 1;
            }
            if score.structural >= self.config.structural_threshold {
                structural_hits += 1;
            }
            let total = score.total();
            scores.insert(node.id.as_str(), total);
            if total > NOISE_FLOOR {
                ranked.push((node, total));
            }
        }

        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
        ranked.truncate(self.config.max_nodes);

        let mut selected: HashSet<&str> = ranked.iter().map(|(n, _)| n.id.as_str()).collect();
        let mut result: Vec<(&ContextNode, f64)> = ranked.clone();

        for (node, score) in &ranked {
            if *score <= self.config.semantic_threshold {
                continue;
            }
            for id in self.closure(index, node) {
                if selected.insert(id) {
                    if let Some(neighbour) = index.get(id) {
                        result.push((neighbour, scores.get(id).copied().unwrap_or(0.0)));
                    }
                }
            }
        }

        debug!(
            scored = ranked.len(),
            closure_added = result.len() - ranked.len(),
            keyword_hits,
            structural_hits,
            "retrieved context nodes"
        );

        result
            .into_iter()
            .map(|(node, score)| {
                let access = index.touch(&node.id);
                let mut node = node.clone();
                node.relevance_score = score;
                node.last_accessed = Some(access.last_accessed);
                node.access_count = access.count;
                node
            })
            .collect()
    }

    /// Ids within `closure_depth` hops of `start`, excluding `start`
    fn closure<'a>(&self, index: &'a CodeIndex, start: &'a ContextNode) -> Vec<&'a str> {
        let mut seen: HashSet<&str> = HashSet::from([start.id.as_str()]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut found = Vec::new();

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= self.config.closure_depth {
                continue;
            }
            let callers = index.graph().callers_of(&node.name).into_iter().flatten();
            for id in node.dependencies.iter().chain(callers) {
                let Some(next) = index.get(id) else {
                    continue;
                };
                if seen.insert(next.id.as_str()) {
                    found.push(next.id.as_str());
                    queue.push_back((next, depth + 1));
                }
            }
        }
        found
    }
}

/// Fraction of `terms` found case-insensitively in `text` (already lowercase)
fn overlap(text: &str, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let hits = terms
        .iter()
        .filter(|term| text.contains(term.to_lowercase().as_str()))
        .count();
    hits as f64 / terms.len() as f64
}

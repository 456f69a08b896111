//! Approximate call graph
//!
//! Edges come from `identifier(` patterns in function and class bodies.
//! Identifiers are matched by name only, with no scope resolution, so two
//! functions sharing a name share their callers. That is an accepted
//! approximation.

use std::collections::{BTreeSet, HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::index::node::ContextNode;

static CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Za-z_$][\w$]*)\s*\(").expect("call pattern"));

/// Identifiers followed by `(` that are language keywords, not calls
const NOT_CALLS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "function", "fn", "def", "do", "try",
    "typeof", "sizeof", "await", "yield", "match", "loop", "with", "elif", "case", "else",
    "new", "throw", "delete", "void", "super", "assert", "print", "not", "and", "or", "in",
    "async", "constructor", "lambda", "foreach", "using", "lock", "where", "impl", "class",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallGraph {
    /// node id -> identifiers it calls
    calls: HashMap<String, BTreeSet<String>>,
    /// identifier -> ids of nodes calling it
    callers: HashMap<String, BTreeSet<String>>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan a node body and record its outgoing call edges
    pub fn record(&mut self, node: &ContextNode) {
        if !node.kind.is_callable_body() {
            return;
        }
        let called = call_references(&node.content, &node.name);
        if called.is_empty() {
            return;
        }
        for name in &called {
            self.callers
                .entry(name.clone())
                .or_default()
                .insert(node.id.clone());
        }
        self.calls.entry(node.id.clone()).or_default().extend(called);
    }

    pub fn calls(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.calls.get(id)
    }

    /// Ids of nodes whose bodies call `name`
    pub fn callers_of(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.callers.get(name)
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.calls.get(id).map_or(0, BTreeSet::len)
    }

    pub fn in_degree(&self, name: &str) -> usize {
        self.callers.get(name).map_or(0, BTreeSet::len)
    }

    /// `(out + in) / total_nodes`
    pub fn centrality(&self, node: &ContextNode, total_nodes: usize) -> f64 {
        if total_nodes == 0 {
            return 0.0;
        }
        (self.out_degree(&node.id) + self.in_degree(&node.name)) as f64 / total_nodes as f64
    }

    pub fn edge_count(&self) -> usize {
        self.calls.values().map(BTreeSet::len).sum()
    }

    /// Drop every edge originating from one of `ids`
    pub fn remove_nodes(&mut self, ids: &HashSet<String>) {
        self.calls.retain(|id, _| !ids.contains(id));
        for callers in self.callers.values_mut() {
            callers.retain(|id| !ids.contains(id));
        }
        self.callers.retain(|_, callers| !callers.is_empty());
    }
}

/// Distinct identifiers called from `body`, excluding keywords and `own_name`
pub fn call_references(body: &str, own_name: &str) -> BTreeSet<String> {
    CALL.captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|name| *name != own_name && !NOT_CALLS.contains(name))
        .map(str::to_string)
        .collect()
}

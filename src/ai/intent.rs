//! Query intent analysis
//!
//! Classifies the latest user message by trigger words and pulls out the
//! keywords and entity names the retriever matches against.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ai::message::{Message, Role};
use crate::error::{ContextError, Result};
use crate::index::semantic::Embedder;

const MATCHED_CONFIDENCE: f64 = 0.8;
const FALLBACK_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    Create,
    Modify,
    Debug,
    Understand,
    Refactor,
    Test,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Create => "create",
            IntentKind::Modify => "modify",
            IntentKind::Debug => "debug",
            IntentKind::Understand => "understand",
            IntentKind::Refactor => "refactor",
            IntentKind::Test => "test",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trigger words per intent, in priority order
const TRIGGERS: &[(IntentKind, &[&str])] = &[
    (
        IntentKind::Create,
        &["create", "generate", "build", "add", "implement", "new", "make", "write", "scaffold"],
    ),
    (
        IntentKind::Debug,
        &["debug", "fix", "error", "bug", "crash", "broken", "fail", "exception", "panic"],
    ),
    (
        IntentKind::Refactor,
        &["refactor", "optimize", "improve", "clean", "simplify", "restructure", "rename"],
    ),
    (IntentKind::Test, &["test", "spec", "coverage", "mock", "assert"]),
    (
        IntentKind::Modify,
        &["modify", "change", "update", "edit", "replace", "remove", "delete", "move", "extend"],
    ),
    (
        IntentKind::Understand,
        &["explain", "understand", "describe", "document", "how", "why", "what", "where"],
    ),
];

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "then", "than", "to", "of", "in", "on", "at",
    "by", "for", "with", "from", "into", "onto", "is", "are", "was", "were", "be", "been", "it",
    "its", "this", "that", "these", "those", "can", "could", "would", "should", "will", "do",
    "does", "did", "you", "your", "me", "my", "we", "our", "us", "i", "please", "there", "here",
    "all", "any", "some", "not", "have", "has", "had", "so", "also", "just", "when", "which",
    "who", "whom", "let", "lets", "like", "need", "want",
];

const INFLECTIONS: &[&str] = &["s", "es", "ed", "d", "ing", "er", "ion", "ions"];

/// Classified purpose of one request; built fresh per call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryIntent {
    pub kind: IntentKind,
    pub entities: Vec<String>,
    pub keywords: Vec<String>,
    #[serde(skip)]
    pub vector: Option<Vec<f32>>,
    pub confidence: f64,
}

pub struct IntentAnalyzer {
    embedder: Arc<dyn Embedder>,
}

impl IntentAnalyzer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Analyze the trailing message, which must be user-authored
    pub fn analyze_intent(&self, messages: &[Message]) -> Result<QueryIntent> {
        let last = messages
            .last()
            .ok_or_else(|| ContextError::Intent("no messages to analyze".to_string()))?;
        if last.role != Role::User {
            return Err(ContextError::Intent(format!(
                "latest message is from {:?}, not the user",
                last.role
            )));
        }
        Ok(self.analyze_query(&last.content))
    }

    pub fn analyze_query(&self, query: &str) -> QueryIntent {
        let words = words(query);
        let lower: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();

        let matched = TRIGGERS.iter().find(|(_, triggers)| {
            lower
                .iter()
                .any(|word| triggers.iter().any(|trigger| fires(word, trigger)))
        });
        let (kind, confidence) = match matched {
            Some((kind, _)) => (*kind, MATCHED_CONFIDENCE),
            None => (IntentKind::Understand, FALLBACK_CONFIDENCE),
        };

        QueryIntent {
            kind,
            entities: entities(&words),
            keywords: keywords(&lower),
            vector: Some(self.embedder.embed(query)),
            confidence,
        }
    }
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .collect()
}

/// `word` is `trigger` or an inflection of it
fn fires(word: &str, trigger: &str) -> bool {
    let Some(rest) = word.strip_prefix(trigger) else {
        // "creating" drops the trailing e
        return trigger
            .strip_suffix('e')
            .and_then(|stem| word.strip_prefix(stem))
            .is_some_and(|rest| matches!(rest, "ing" | "ion" | "ions"));
    };
    if rest.is_empty() || INFLECTIONS.contains(&rest) {
        return true;
    }
    // "debugging", "added"
    let mut chars = rest.chars();
    let doubled = trigger.chars().last();
    chars.next() == doubled && matches!(chars.as_str(), "ing" | "ed" | "er")
}

fn is_trigger(word: &str) -> bool {
    TRIGGERS
        .iter()
        .any(|(_, triggers)| triggers.iter().any(|t| fires(word, t)))
}

fn entities(words: &[&str]) -> Vec<String> {
    let mut seen = HashSet::new();
    words
        .iter()
        .filter(|w| looks_like_entity(w))
        .filter(|w| {
            let lower = w.to_lowercase();
            !STOP_WORDS.contains(&lower.as_str()) && !is_trigger(&lower)
        })
        .filter(|w| seen.insert(w.to_string()))
        .map(|w| w.to_string())
        .collect()
}

/// Capitalized, camelCase or snake_case
fn looks_like_entity(word: &str) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_alphabetic() {
        return false;
    }
    if first.is_uppercase() {
        return true;
    }
    let camel = word
        .chars()
        .zip(word.chars().skip(1))
        .any(|(a, b)| a.is_lowercase() && b.is_uppercase());
    let snake = word.trim_matches('_').contains('_');
    camel || snake
}

fn keywords(lower: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    lower
        .iter()
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.as_str()))
        .cloned()
        .collect()
}

//! Reindex bookkeeping
//!
//! Remembers a content fingerprint for every file of the last indexed
//! corpus and when that index was built, so the manager only rebuilds when
//! something changed or the index has gone stale.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::core::corpus::FileCorpus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReindexReason {
    NeverBuilt,
    FilesChanged {
        added: usize,
        removed: usize,
        modified: usize,
    },
    Stale(Duration),
}

impl fmt::Display for ReindexReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReindexReason::NeverBuilt => write!(f, "no index built yet"),
            ReindexReason::FilesChanged {
                added,
                removed,
                modified,
            } => write!(f, "files changed (+{added} -{removed} ~{modified})"),
            ReindexReason::Stale(age) => write!(f, "index is {}s old", age.as_secs()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexCache {
    fingerprints: HashMap<String, blake3::Hash>,
    built_at: Option<Instant>,
    max_age: Duration,
}

impl IndexCache {
    pub fn new(max_age: Duration) -> Self {
        Self {
            fingerprints: HashMap::new(),
            built_at: None,
            max_age,
        }
    }

    /// Why `files` needs a rebuild, or `None` when the index is current
    pub fn reindex_reason(&self, files: &FileCorpus) -> Option<ReindexReason> {
        let Some(built_at) = self.built_at else {
            return Some(ReindexReason::NeverBuilt);
        };

        let current = fingerprint(files);
        let added = current
            .keys()
            .filter(|path| !self.fingerprints.contains_key(*path))
            .count();
        let removed = self
            .fingerprints
            .keys()
            .filter(|path| !current.contains_key(*path))
            .count();
        let modified = current
            .iter()
            .filter(|(path, hash)| self.fingerprints.get(*path).is_some_and(|old| old != *hash))
            .count();
        if added + removed + modified > 0 {
            return Some(ReindexReason::FilesChanged {
                added,
                removed,
                modified,
            });
        }

        let age = built_at.elapsed();
        (age > self.max_age).then_some(ReindexReason::Stale(age))
    }

    pub fn mark_built(&mut self, files: &FileCorpus) {
        self.fingerprints = fingerprint(files);
        self.built_at = Some(Instant::now());
    }
}

fn fingerprint(files: &FileCorpus) -> HashMap<String, blake3::Hash> {
    files
        .indexable()
        .map(|(path, content)| (path.to_string(), blake3::hash(content.as_bytes())))
        .collect()
}

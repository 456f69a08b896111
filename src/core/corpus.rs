//! File corpus handed to the engine by the editor/file store
//!
//! Paths map to file or folder entries; only files with non-empty content
//! are ever indexed.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use ignore::gitignore::Gitignore;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::core::parser::Language;
use crate::core::tokens::estimate_tokens;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl FileEntry {
    pub fn file(content: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::File,
            content: Some(content.into()),
        }
    }

    pub fn folder() -> Self {
        Self {
            kind: EntryKind::Folder,
            content: None,
        }
    }

    fn indexable_content(&self) -> Option<&str> {
        match (self.kind, self.content.as_deref()) {
            (EntryKind::File, Some(content)) if !content.is_empty() => Some(content),
            _ => None,
        }
    }
}

/// Snapshot of the project file tree, keyed by path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileCorpus {
    entries: BTreeMap<String, FileEntry>,
}

impl FileCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, entry: FileEntry) {
        self.entries.insert(path.into(), entry);
    }

    pub fn insert_file(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.insert(path, FileEntry::file(content));
    }

    pub fn remove(&mut self, path: &str) -> Option<FileEntry> {
        self.entries.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.entries.get(path)
    }

    /// Files with non-empty content, in path order
    pub fn indexable(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(path, entry)| entry.indexable_content().map(|c| (path.as_str(), c)))
    }

    pub fn file_count(&self) -> usize {
        self.indexable().count()
    }

    pub fn total_tokens(&self) -> usize {
        self.indexable().map(|(_, content)| estimate_tokens(content)).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, FileEntry)> for FileCorpus {
    fn from_iter<I: IntoIterator<Item = (String, FileEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Load every supported source file under `root` into a corpus.
///
/// Hidden directories, dependency/build folders and `.gitignore` matches
/// are skipped. Files that are not valid UTF-8 are ignored.
pub fn load_directory(root: &Path, max_file_bytes: u64) -> Result<FileCorpus> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Invalid path: {}", root.display()))?;

    let gitignore_path = root.join(".gitignore");
    let gitignore = if gitignore_path.exists() {
        Gitignore::new(&gitignore_path).0
    } else {
        Gitignore::empty()
    };

    let mut corpus = FileCorpus::new();

    for entry in WalkDir::new(&root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            if name.starts_with('.') {
                return false;
            }
            if matches!(
                name.as_ref(),
                "node_modules" | "target" | "build" | "dist" | "__pycache__" | "vendor"
            ) {
                return false;
            }
            !gitignore.matched(e.path(), e.file_type().is_dir()).is_ignore()
        })
    {
        let entry = entry?;
        let path = entry.path();
        let rel_path = path.strip_prefix(&root).unwrap_or(path).display().to_string();

        if entry.file_type().is_dir() {
            if entry.depth() > 0 {
                corpus.insert(rel_path, FileEntry::folder());
            }
            continue;
        }

        if Language::from_path(path) == Language::Unknown {
            continue;
        }
        if entry.metadata().map(|m| m.len() > max_file_bytes).unwrap_or(true) {
            tracing::debug!(path = %rel_path, "skipping oversized file");
            continue;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => corpus.insert_file(rel_path, content),
            Err(e) => tracing::debug!(path = %rel_path, error = %e, "skipping unreadable file"),
        }
    }

    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexable_skips_folders_and_empty_files() {
        let mut corpus = FileCorpus::new();
        corpus.insert("src", FileEntry::folder());
        corpus.insert_file("src/a.ts", "export const a = 1;");
        corpus.insert_file("src/empty.ts", "");
        corpus.insert(
            "src/none.ts",
            FileEntry {
                kind: EntryKind::File,
                content: None,
            },
        );

        let paths: Vec<&str> = corpus.indexable().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["src/a.ts"]);
        assert_eq!(corpus.file_count(), 1);
        assert_eq!(corpus.len(), 4);
    }

    #[test]
    fn test_corpus_deserializes_from_editor_json() {
        let json = r#"{
            "/app/src": {"kind": "folder"},
            "/app/src/main.py": {"kind": "file", "content": "print('hi')"}
        }"#;
        let corpus: FileCorpus = serde_json::from_str(json).unwrap();
        assert_eq!(corpus.file_count(), 1);
        assert_eq!(corpus.get("/app/src").unwrap().kind, EntryKind::Folder);
    }

    #[test]
    fn test_load_directory_respects_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "generated.rs\n").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn run() {}\n").unwrap();
        std::fs::write(dir.path().join("generated.rs"), "fn gen() {}\n").unwrap();
        std::fs::write(dir.path().join("node_modules/x.js"), "function x() {}\n").unwrap();
        std::fs::write(dir.path().join("notes.bin"), "binary").unwrap();

        let corpus = load_directory(dir.path(), 1024 * 1024).unwrap();
        let paths: Vec<&str> = corpus.indexable().map(|(p, _)| p).collect();

        assert_eq!(paths, vec!["src/lib.rs"]);
        assert_eq!(corpus.get("src").unwrap().kind, EntryKind::Folder);
    }

    #[test]
    fn test_load_directory_skips_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("small.py"), "def f():\n    pass\n").unwrap();
        std::fs::write(dir.path().join("large.py"), "x = 1\n".repeat(100)).unwrap();

        let corpus = load_directory(dir.path(), 64).unwrap();
        let paths: Vec<&str> = corpus.indexable().map(|(p, _)| p).collect();

        assert_eq!(paths, vec!["small.py"]);
        assert!(corpus.get("large.py").is_none());
    }
}

//! Configuration management for the context engine

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub indexer: IndexerConfig,
    pub manager: ManagerConfig,
    pub corpus: CorpusConfig,
    #[serde(skip)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Token budget for the optimized context
    pub max_context_tokens: usize,
    /// Score above which a node pulls in its dependency closure
    pub semantic_threshold: f64,
    pub keyword_threshold: f64,
    pub structural_threshold: f64,
    pub max_retrieved_nodes: usize,
    /// Fraction of the corpus kept by `optimize` when no budget is given
    pub compression_target: f64,
    pub enable_memory: bool,
    pub memory_retention_days: u32,
    pub closure_depth: usize,
    /// Use tree-sitter extractors where a grammar is bundled
    pub ast_parsing: bool,
    pub embedding_dimensions: usize,
    pub file_preview_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub enable_smart_retrieval: bool,
    pub force_smart_retrieval: bool,
    pub enable_compression: bool,
    /// Share of the model window usable for prompt content
    pub max_context_ratio: f64,
    /// Usage/usable ratio above which the whole corpus is compressed
    pub compression_threshold: f64,
    pub semantic_threshold: f64,
    pub max_retrieved_nodes: usize,
    /// Corpora at or below this many files skip optimization when under budget
    pub small_corpus_files: usize,
    pub reindex_interval_secs: u64,
    /// Context-window sizes by model id, merged over the built-in table
    pub model_windows: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub max_file_size_kb: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 8000,
            semantic_threshold: 0.7,
            keyword_threshold: 0.3,
            structural_threshold: 0.5,
            max_retrieved_nodes: 50,
            compression_target: 0.3,
            enable_memory: false,
            memory_retention_days: 30,
            closure_depth: 1,
            ast_parsing: false,
            embedding_dimensions: 256,
            file_preview_chars: 1000,
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            enable_smart_retrieval: true,
            force_smart_retrieval: false,
            enable_compression: true,
            max_context_ratio: 0.7,
            compression_threshold: 1.5,
            semantic_threshold: 0.7,
            max_retrieved_nodes: 50,
            small_corpus_files: 20,
            reindex_interval_secs: 600,
            model_windows: BTreeMap::new(),
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self { max_file_size_kb: 1024 }
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let config_dir = directories::ProjectDirs::from("com", "nexus", "context")
        .context("Failed to determine config directory")?
        .config_dir()
        .to_path_buf();

    Ok(config_dir.join("config.toml"))
}

/// Load configuration from file or use defaults
pub fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let path = match custom_path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };

    if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

/// Write the default configuration unless a file already exists.
///
/// Returns the path and whether a new file was written.
pub fn init_config(custom_path: Option<&Path>) -> Result<(PathBuf, bool)> {
    let path = match custom_path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };

    if path.exists() {
        return Ok((path, false));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let content = toml::to_string_pretty(&Config::default())
        .context("Failed to serialize default config")?;

    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config to {:?}", path))?;

    Ok((path, true))
}

/// Render configuration as TOML
pub fn show_config(config: &Config) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            "[manager]\nforce_smart_retrieval = true\n\n[manager.model_windows]\nlocal-llm = 4096\n",
        )
        .unwrap();

        assert!(config.manager.force_smart_retrieval);
        assert_eq!(config.manager.model_windows.get("local-llm"), Some(&4096));
        assert_eq!(config.manager.max_context_ratio, 0.7);
        assert_eq!(config.indexer, IndexerConfig::default());
    }

    #[test]
    fn test_init_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let (written, created) = init_config(Some(&path)).unwrap();
        assert!(created);
        assert_eq!(written, path);
        assert!(!init_config(Some(&path)).unwrap().1);

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.indexer.max_context_tokens, 8000);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[indexer]\nclosure_depth = \"deep\"\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}

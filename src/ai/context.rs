//! Context management for AI operations
//!
//! The [`ContextManager`] decides how much of a codebase fits next to a
//! conversation and produces the context string: nothing at all when the
//! request is already small, retrieved nodes, a compressed corpus, or
//! retrieved nodes compressed down to budget. It never fails; any error
//! turns into an empty context the caller can ignore.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ai::compressor::{CompressionStage, Compressor};
use crate::ai::intent::{IntentAnalyzer, IntentKind};
use crate::ai::message::{history_tokens, Message};
use crate::ai::router::ModelRouter;
use crate::config::{Config, ManagerConfig};
use crate::core::cache::IndexCache;
use crate::core::corpus::FileCorpus;
use crate::core::parser;
use crate::core::tokens::estimate_tokens;
use crate::error::{ContextError, Result};
use crate::index::node::ContextNode;
use crate::index::retrieval::{RetrievalConfig, Retriever};
use crate::index::{CodeIndex, Indexer};

/// Overage ratio above which large corpora use the hybrid path
const HYBRID_RATIO: f64 = 1.2;
/// Corpora above this many files prefer retrieval while under the compression threshold
const SEMANTIC_MIN_FILES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    None,
    SemanticRetrieval,
    Compression,
    Hybrid,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::None => "none",
            Strategy::SemanticRetrieval => "semantic-retrieval",
            Strategy::Compression => "compression",
            Strategy::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationMetadata {
    pub strategy: Strategy,
    pub nodes_retrieved: usize,
    pub processing_time_ms: u64,
    pub context_window: usize,
    pub usable_tokens: usize,
    pub reindexed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_stage: Option<CompressionStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one optimization call.
///
/// An empty `optimized_context` means "send the messages unmodified".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedContext {
    pub optimized_context: String,
    pub original_tokens: usize,
    pub optimized_tokens: usize,
    pub compression_ratio: f64,
    pub strategy: Strategy,
    pub metadata: OptimizationMetadata,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerStats {
    pub optimizations: u64,
    pub by_strategy: BTreeMap<Strategy, u64>,
    pub failures: u64,
    pub reindexes: u64,
    pub last_processing_ms: u64,
}

/// Per-call budget figures
#[derive(Debug, Clone, Copy)]
struct Budget {
    window: usize,
    usable: usize,
    usage: usize,
    target: usize,
}

/// Output of the strategy-specific part of a call
struct Assembled {
    context: String,
    nodes_retrieved: usize,
    intent: Option<IntentKind>,
    stage: Option<CompressionStage>,
}

pub struct ContextManager {
    config: Config,
    router: ModelRouter,
    indexer: Arc<Indexer>,
    analyzer: IntentAnalyzer,
    retriever: Retriever,
    compressor: Compressor,
    /// Held for the whole staleness check and rebuild
    cache: tokio::sync::Mutex<IndexCache>,
    stats: Mutex<ManagerStats>,
}

impl ContextManager {
    pub fn new(config: Config) -> Self {
        let indexer = Indexer::from_config(&config.indexer);
        Self::with_indexer(config, indexer)
    }

    /// Build around a preconfigured indexer, e.g. one with a custom embedder
    pub fn with_indexer(config: Config, indexer: Indexer) -> Self {
        let retrieval = RetrievalConfig {
            max_nodes: config.manager.max_retrieved_nodes,
            semantic_threshold: config.manager.semantic_threshold,
            ..RetrievalConfig::from(&config.indexer)
        };
        Self {
            router: ModelRouter::new(&config.manager.model_windows),
            analyzer: IntentAnalyzer::new(indexer.embedder()),
            retriever: Retriever::new(retrieval),
            compressor: Compressor::new(),
            cache: tokio::sync::Mutex::new(IndexCache::new(Duration::from_secs(
                config.manager.reindex_interval_secs,
            ))),
            stats: Mutex::new(ManagerStats::default()),
            indexer: Arc::new(indexer),
            config,
        }
    }

    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    pub fn stats(&self) -> ManagerStats {
        self.stats.lock().clone()
    }

    pub async fn optimize_context(
        &self,
        messages: &[Message],
        files: &FileCorpus,
        model: &str,
        system_prompt: Option<&str>,
    ) -> OptimizedContext {
        let start = Instant::now();
        let manager = &self.config.manager;

        let window = self.router.context_window(model);
        let usable = (window as f64 * manager.max_context_ratio).floor() as usize;
        let budget = Budget {
            window,
            usable,
            usage: history_tokens(messages, system_prompt),
            target: self.config.indexer.max_context_tokens.min(usable),
        };
        let file_count = files.file_count();
        let corpus_tokens = files.total_tokens();

        let fits = budget.usage <= budget.usable
            && (file_count <= manager.small_corpus_files || budget.usage + corpus_tokens <= budget.usable);
        if fits && !manager.force_smart_retrieval {
            debug!(usage = budget.usage, usable, file_count, "request fits, skipping optimization");
            return self.finish(passthrough(budget, None), start);
        }

        match self.optimize(messages, files, budget, file_count).await {
            Ok((strategy, assembled, reindexed)) => {
                let optimized_tokens = estimate_tokens(&assembled.context);
                let original_tokens = budget.usage + corpus_tokens;
                let result = OptimizedContext {
                    optimized_context: assembled.context,
                    original_tokens,
                    optimized_tokens,
                    compression_ratio: ratio(optimized_tokens, original_tokens),
                    strategy,
                    metadata: OptimizationMetadata {
                        strategy,
                        nodes_retrieved: assembled.nodes_retrieved,
                        processing_time_ms: 0,
                        context_window: budget.window,
                        usable_tokens: budget.usable,
                        reindexed,
                        intent: assembled.intent,
                        compression_stage: assembled.stage,
                        error: None,
                    },
                };
                self.finish(result, start)
            }
            Err(e) => {
                warn!(error = %e, "context optimization failed, passing messages through");
                self.stats.lock().failures += 1;
                self.finish(passthrough(budget, Some(e.to_string())), start)
            }
        }
    }

    async fn optimize(
        &self,
        messages: &[Message],
        files: &FileCorpus,
        budget: Budget,
        file_count: usize,
    ) -> Result<(Strategy, Assembled, bool)> {
        if budget.usable == 0 {
            return Err(ContextError::Optimization(format!(
                "a {}-token window leaves no usable tokens",
                budget.window
            )));
        }
        let (reindexed, index) = self.ensure_index(files).await?;

        let overage = budget.usage as f64 / budget.usable.max(1) as f64;
        let strategy = select_strategy(&self.config.manager, file_count, overage);
        info!(%strategy, file_count, overage, target = budget.target, "selected optimization strategy");

        let assembled = match strategy {
            Strategy::None => Assembled {
                context: String::new(),
                nodes_retrieved: 0,
                intent: None,
                stage: None,
            },
            Strategy::Compression => {
                let nodes: Vec<ContextNode> = files
                    .indexable()
                    .map(|(path, content)| parser::file_node(path, content, usize::MAX, Vec::new()))
                    .collect();
                let result = self.compressor.compress_context(&nodes, budget.target);
                Assembled {
                    context: result.compressed,
                    nodes_retrieved: 0,
                    intent: None,
                    stage: Some(result.stage),
                }
            }
            Strategy::SemanticRetrieval | Strategy::Hybrid => {
                let intent = self.analyzer.analyze_intent(messages)?;
                let mut nodes = self.retriever.retrieve(&index, &intent);
                let nodes_retrieved = nodes.len();

                if strategy == Strategy::Hybrid {
                    nodes = pack_nodes(nodes, budget.target.saturating_mul(3) / 2);
                }
                let (context, stage) = if self.config.manager.enable_compression {
                    let result = self.compressor.compress_context(&nodes, budget.target);
                    (result.compressed, Some(result.stage))
                } else {
                    (join_nodes(&pack_nodes(nodes, budget.target)), None)
                };
                Assembled {
                    context,
                    nodes_retrieved,
                    intent: Some(intent.kind),
                    stage,
                }
            }
        };

        Ok((strategy, assembled, reindexed))
    }

    /// Rebuild the index when the corpus changed or the index went stale.
    ///
    /// The returned snapshot is read under the cache lock, so it always
    /// matches `files` even when another call rebuilds right after.
    async fn ensure_index(&self, files: &FileCorpus) -> Result<(bool, Arc<CodeIndex>)> {
        let mut cache = self.cache.lock().await;
        let Some(reason) = cache.reindex_reason(files) else {
            return Ok((false, self.indexer.snapshot()));
        };
        debug!(%reason, "rebuilding index");

        let indexer = Arc::clone(&self.indexer);
        let snapshot = files.clone();
        let built = tokio::task::spawn_blocking(move || indexer.index_codebase(&snapshot))
            .await
            .map_err(|e| ContextError::IndexBuild(e.to_string()))?;
        debug!(nodes = built.nodes, skipped = built.files_skipped, "index rebuilt");

        cache.mark_built(files);
        self.stats.lock().reindexes += 1;
        Ok((true, self.indexer.snapshot()))
    }

    fn finish(&self, mut result: OptimizedContext, start: Instant) -> OptimizedContext {
        let elapsed = start.elapsed().as_millis() as u64;
        result.metadata.processing_time_ms = elapsed;

        let mut stats = self.stats.lock();
        stats.optimizations += 1;
        *stats.by_strategy.entry(result.strategy).or_default() += 1;
        stats.last_processing_ms = elapsed;
        result
    }
}

/// Pick the optimization path for a corpus of `file_count` files whose
/// message usage is `overage` times the usable budget.
pub fn select_strategy(config: &ManagerConfig, file_count: usize, overage: f64) -> Strategy {
    let preferred = if file_count > SEMANTIC_MIN_FILES && overage < config.compression_threshold {
        Strategy::SemanticRetrieval
    } else if overage > config.compression_threshold {
        Strategy::Compression
    } else if file_count > config.small_corpus_files && overage > HYBRID_RATIO {
        Strategy::Hybrid
    } else if config.enable_smart_retrieval {
        Strategy::SemanticRetrieval
    } else {
        Strategy::Compression
    };

    match (preferred, config.enable_smart_retrieval, config.enable_compression) {
        (_, false, false) => Strategy::None,
        (Strategy::SemanticRetrieval | Strategy::Hybrid, false, true) => Strategy::Compression,
        (Strategy::Compression | Strategy::Hybrid, true, false) => Strategy::SemanticRetrieval,
        (strategy, _, _) => strategy,
    }
}

/// Keep nodes in order while they fit `budget` tokens, skipping any that do not
fn pack_nodes(nodes: Vec<ContextNode>, budget: usize) -> Vec<ContextNode> {
    let mut used = 0;
    nodes
        .into_iter()
        .filter(|node| {
            let separator = if used == 0 { 0 } else { 1 };
            let cost = estimate_tokens(&node.content) + separator;
            if used + cost <= budget {
                used += cost;
                true
            } else {
                false
            }
        })
        .collect()
}

fn join_nodes(nodes: &[ContextNode]) -> String {
    nodes
        .iter()
        .map(|n| n.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn ratio(optimized: usize, original: usize) -> f64 {
    if original == 0 {
        1.0
    } else {
        optimized as f64 / original as f64
    }
}

fn passthrough(budget: Budget, error: Option<String>) -> OptimizedContext {
    OptimizedContext {
        optimized_context: String::new(),
        original_tokens: budget.usage,
        optimized_tokens: budget.usage,
        compression_ratio: 1.0,
        strategy: Strategy::None,
        metadata: OptimizationMetadata {
            strategy: Strategy::None,
            nodes_retrieved: 0,
            processing_time_ms: 0,
            context_window: budget.window,
            usable_tokens: budget.usable,
            reindexed: false,
            intent: None,
            compression_stage: None,
            error,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::node::NodeKind;

    const HEADER: &str = r#"import React from 'react';
import { Logo } from './Logo';
import { NavLinks } from './NavLinks';

interface HeaderProps {
  title: string;
  links: { href: string; label: string }[];
}

/**
 * Top navigation bar shown on every page of the application.
 */
export const Header = ({ title, links }: HeaderProps) => {
  return (
    <header className="app-header">
      <Logo />
      <h1 className="app-header__title">{title}</h1>
      <NavLinks links={links} />
    </header>
  );
};

export default Header;
"#;

    const FOOTER: &str = r#"import React from 'react';

export const Footer = ({ year }: { year: number }) => {
  return (
    <footer className="app-footer">
      <small>Copyright {year}</small>
    </footer>
  );
};
"#;

    const HOOK: &str = r#"import { useEffect, useState } from 'react';

export function useDebounce<T>(value: T, delayMs: number): T {
  const [debounced, setDebounced] = useState(value);

  useEffect(() => {
    const timer = setTimeout(() => setDebounced(value), delayMs);
    return () => clearTimeout(timer);
  }, [value, delayMs]);

  return debounced;
}
"#;

    const UTIL: &str = r#"export function formatCurrency(amount: number, currency = 'USD'): string {
  return new Intl.NumberFormat('en-US', { style: 'currency', currency }).format(amount);
}

export function clamp(value: number, min: number, max: number): number {
  return Math.min(Math.max(value, min), max);
}
"#;

    fn four_files() -> FileCorpus {
        let mut files = FileCorpus::new();
        files.insert_file("/app/src/components/Header.tsx", HEADER);
        files.insert_file("/app/src/components/Footer.tsx", FOOTER);
        files.insert_file("/app/src/hooks/useDebounce.ts", HOOK);
        files.insert_file("/app/src/utils/money.ts", UTIL);
        files
    }

    fn forced() -> Config {
        let mut config = Config::default();
        config.manager.force_smart_retrieval = true;
        config
    }

    fn ask(text: &str) -> Vec<Message> {
        vec![Message::user(text)]
    }

    #[tokio::test]
    async fn test_small_project_retrieves_header() {
        let manager = ContextManager::new(forced());
        let result = manager
            .optimize_context(
                &ask("add a search input to the Header component"),
                &four_files(),
                "gpt-4o",
                None,
            )
            .await;

        assert_eq!(result.strategy, Strategy::SemanticRetrieval);
        assert_eq!(result.metadata.intent, Some(IntentKind::Create));
        assert!(result.metadata.nodes_retrieved > 0);
        assert!(result.metadata.reindexed);
        assert!(result.optimized_context.contains("Header"));
        assert!(result.optimized_tokens <= result.metadata.usable_tokens);
        assert!(result.metadata.error.is_none());
    }

    #[tokio::test]
    async fn test_header_file_outranks_utility() {
        let manager = ContextManager::new(forced());
        manager
            .optimize_context(&ask("add a search input to the Header component"), &four_files(), "gpt-4o", None)
            .await;

        let intent = manager
            .analyzer
            .analyze_query("add a search input to the Header component");
        assert!(intent.entities.contains(&"Header".to_string()));

        let index = manager.indexer().snapshot();
        let ranked = manager.retriever.retrieve(&index, &intent);
        let position = |id: &str| ranked.iter().position(|n| n.id == id);

        let header = position("file:/app/src/components/Header.tsx").unwrap();
        match position("file:/app/src/utils/money.ts") {
            Some(util) => assert!(header < util),
            None => {}
        }
    }

    #[tokio::test]
    async fn test_many_small_components_under_budget_pass_through() {
        let mut files = FileCorpus::new();
        for i in 0..25 {
            files.insert_file(
                format!("/app/src/components/Button{i}.tsx"),
                format!("export const Button{i} = () => <button>Click {i}</button>;\n"),
            );
        }
        let mut config = Config::default();
        config.indexer.max_context_tokens = 4000;
        let manager = ContextManager::new(config);

        let result = manager
            .optimize_context(&ask("tidy the buttons"), &files, "gpt-4o", Some("You are helpful."))
            .await;

        assert_eq!(result.strategy, Strategy::None);
        assert!(result.optimized_context.is_empty());
        assert_eq!(result.original_tokens, result.optimized_tokens);
        assert!(result.metadata.error.is_none());
        assert_eq!(manager.stats().reindexes, 0);
    }

    #[tokio::test]
    async fn test_missing_user_message_falls_back() {
        let manager = ContextManager::new(forced());
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        let result = manager.optimize_context(&history, &four_files(), "gpt-4o", None).await;

        assert_eq!(result.strategy, Strategy::None);
        assert!(result.optimized_context.is_empty());
        assert!(result.metadata.error.as_deref().unwrap().contains("intent"));
        assert_eq!(manager.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_overflowing_history_compresses_corpus() {
        let mut config = Config::default();
        config.indexer.max_context_tokens = 50;
        let manager = ContextManager::new(config);
        let history = ask(&"explain this code ".repeat(2000));

        let result = manager.optimize_context(&history, &four_files(), "gpt-4", None).await;

        assert_eq!(result.strategy, Strategy::Compression);
        assert!(result.optimized_tokens <= 50);
        assert!(result.optimized_tokens < result.original_tokens);
        assert_eq!(result.metadata.nodes_retrieved, 0);
    }

    #[tokio::test]
    async fn test_reindex_only_when_corpus_changes() {
        let manager = ContextManager::new(forced());
        let files = four_files();
        let query = ask("explain the Footer");

        assert!(manager.optimize_context(&query, &files, "gpt-4o", None).await.metadata.reindexed);
        assert!(!manager.optimize_context(&query, &files, "gpt-4o", None).await.metadata.reindexed);

        let mut changed = files.clone();
        changed.remove("/app/src/utils/money.ts");
        assert!(manager.optimize_context(&query, &changed, "gpt-4o", None).await.metadata.reindexed);
        assert!(manager
            .indexer()
            .snapshot()
            .nodes()
            .all(|n| n.path != "/app/src/utils/money.ts"));

        let stats = manager.stats();
        assert_eq!(stats.optimizations, 3);
        assert_eq!(stats.reindexes, 2);
        assert_eq!(stats.by_strategy.get(&Strategy::SemanticRetrieval), Some(&3));
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_rebuild() {
        let manager = Arc::new(ContextManager::new(forced()));
        let files = Arc::new(four_files());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let files = Arc::clone(&files);
                tokio::spawn(async move {
                    manager
                        .optimize_context(&ask("explain the Header"), &files, "gpt-4o", None)
                        .await
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().metadata.error.is_none());
        }
        assert_eq!(manager.stats().reindexes, 1);
    }

    #[tokio::test]
    async fn test_zero_ratio_reports_error() {
        let mut config = forced();
        config.manager.max_context_ratio = 0.0;
        let manager = ContextManager::new(config);
        let result = manager.optimize_context(&ask("explain the Header"), &four_files(), "gpt-4o", None).await;

        assert_eq!(result.strategy, Strategy::None);
        assert!(result.metadata.error.unwrap().contains("no usable tokens"));
    }

    const TINY_MODEL: &str = "tiny-model";
    /// floor(1000 * 0.7)
    const TINY_USABLE: usize = 700;

    fn tiny_window(mut config: Config) -> Config {
        config.manager.model_windows.insert(TINY_MODEL.to_string(), 1000);
        config
    }

    fn widget_files(count: usize, marker: &str) -> FileCorpus {
        let mut files = FileCorpus::new();
        for i in 0..count {
            files.insert_file(
                format!("/{marker}/src/widgets/Widget{i}.ts"),
                format!("export function renderWidget{i}(widget: Widget) {{\n  return draw(widget, '{marker}', {i});\n}}\n"),
            );
        }
        files
    }

    /// A long earlier reply followed by the actual question, about 1.3x the tiny budget
    fn crowded_history() -> Vec<Message> {
        vec![
            Message::assistant("lorem ipsum ".repeat(303)),
            Message::user("explain how the widget render works"),
        ]
    }

    fn tiny_overage(history: &[Message]) -> f64 {
        history_tokens(history, None) as f64 / TINY_USABLE as f64
    }

    #[tokio::test]
    async fn test_moderate_overage_on_large_corpus_retrieves() {
        let manager = ContextManager::new(tiny_window(Config::default()));
        let history = crowded_history();
        let overage = tiny_overage(&history);
        assert!(overage > 1.2 && overage < 1.5);

        let result = manager
            .optimize_context(&history, &widget_files(25, "app"), TINY_MODEL, None)
            .await;

        assert_eq!(result.strategy, Strategy::SemanticRetrieval);
        assert_eq!(result.metadata.usable_tokens, TINY_USABLE);
        assert!(result.metadata.nodes_retrieved > 0);
        assert!(result.optimized_tokens <= TINY_USABLE);
    }

    #[tokio::test]
    async fn test_hybrid_compresses_retrieved_nodes_to_budget() {
        let history = crowded_history();
        let mut config = tiny_window(Config::default());
        // Overage sits exactly on the threshold, past the retrieval and compression branches
        config.manager.compression_threshold = tiny_overage(&history);
        let manager = ContextManager::new(config);

        let result = manager
            .optimize_context(&history, &widget_files(25, "app"), TINY_MODEL, None)
            .await;

        assert_eq!(result.strategy, Strategy::Hybrid);
        assert!(result.metadata.error.is_none());
        assert!(result.metadata.nodes_retrieved > 0);
        assert!(result.metadata.compression_stage.is_some());
        assert!(!result.optimized_context.is_empty());
        assert!(result.optimized_tokens <= result.metadata.usable_tokens);
        assert!(result.optimized_tokens < result.original_tokens);
    }

    #[tokio::test]
    async fn test_retrieval_without_compression_packs_to_budget() {
        let mut config = tiny_window(Config::default());
        config.manager.enable_compression = false;
        let manager = ContextManager::new(config);

        let result = manager
            .optimize_context(&crowded_history(), &widget_files(25, "app"), TINY_MODEL, None)
            .await;

        assert_eq!(result.strategy, Strategy::SemanticRetrieval);
        assert!(result.metadata.compression_stage.is_none());
        assert!(result.metadata.nodes_retrieved > 0);
        assert!(!result.optimized_context.is_empty());
        assert!(result.optimized_tokens <= TINY_USABLE);
        assert!(result.optimized_context.contains("renderWidget"));
    }

    #[tokio::test]
    async fn test_interleaved_corpora_rank_their_own_index() {
        let manager = Arc::new(ContextManager::new(forced()));
        let corpora = [Arc::new(widget_files(3, "left")), Arc::new(widget_files(3, "right"))];

        let handles: Vec<_> = (0..16)
            .map(|round| {
                let manager = Arc::clone(&manager);
                let files = Arc::clone(&corpora[round % 2]);
                tokio::spawn(async move {
                    let result = manager
                        .optimize_context(&ask("explain how the widget render works"), &files, "gpt-4o", None)
                        .await;
                    (round % 2, result)
                })
            })
            .collect();

        for handle in handles {
            let (side, result) = handle.await.unwrap();
            let (own, other) = if side == 0 { ("left", "right") } else { ("right", "left") };
            assert!(result.metadata.error.is_none());
            assert!(result.optimized_context.contains(own));
            assert!(!result.optimized_context.contains(other));
        }
    }

    #[test]
    fn test_strategy_selection() {
        let config = ManagerConfig::default();
        assert_eq!(select_strategy(&config, 4, 0.1), Strategy::SemanticRetrieval);
        assert_eq!(select_strategy(&config, 4, 2.0), Strategy::Compression);
        assert_eq!(select_strategy(&config, 25, 1.3), Strategy::SemanticRetrieval);
        assert_eq!(select_strategy(&config, 15, 1.3), Strategy::SemanticRetrieval);
        assert_eq!(select_strategy(&config, 30, 1.5), Strategy::Hybrid);
        assert_eq!(select_strategy(&config, 15, 1.5), Strategy::SemanticRetrieval);
        assert_eq!(select_strategy(&config, 30, 1.6), Strategy::Compression);

        let tight = ManagerConfig {
            compression_threshold: 1.3,
            ..ManagerConfig::default()
        };
        assert_eq!(select_strategy(&tight, 30, 1.25), Strategy::SemanticRetrieval);
        assert_eq!(select_strategy(&tight, 30, 1.3), Strategy::Hybrid);
        assert_eq!(select_strategy(&tight, 30, 1.4), Strategy::Compression);
    }

    #[test]
    fn test_disabled_capabilities_degrade() {
        let mut config = ManagerConfig {
            enable_compression: false,
            ..ManagerConfig::default()
        };
        assert_eq!(select_strategy(&config, 4, 2.0), Strategy::SemanticRetrieval);
        assert_eq!(select_strategy(&config, 30, 1.5), Strategy::SemanticRetrieval);

        config.enable_compression = true;
        config.enable_smart_retrieval = false;
        assert_eq!(select_strategy(&config, 4, 0.1), Strategy::Compression);
        assert_eq!(select_strategy(&config, 30, 1.3), Strategy::Compression);
        assert_eq!(select_strategy(&config, 30, 1.5), Strategy::Compression);

        config.enable_compression = false;
        assert_eq!(select_strategy(&config, 4, 0.1), Strategy::None);
    }

    #[test]
    fn test_pack_nodes_respects_budget() {
        let node = |name: &str, len: usize| ContextNode::new(NodeKind::Function, "a.rs", name, "x".repeat(len));
        let packed = pack_nodes(vec![node("a", 40), node("b", 400), node("c", 40)], 25);
        let names: Vec<&str> = packed.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert!(estimate_tokens(&join_nodes(&packed)) <= 25);
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let budget = Budget {
            window: 8192,
            usable: 5734,
            usage: 10,
            target: 5734,
        };
        let json = serde_json::to_value(passthrough(budget, None)).unwrap();
        assert_eq!(json["strategy"], "none");
        assert_eq!(json["optimizedContext"], "");
        assert_eq!(json["metadata"]["nodesRetrieved"], 0);
        assert!(json["metadata"].get("error").is_none());
    }
}

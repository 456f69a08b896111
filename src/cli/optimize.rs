//! Optimize command - build the context a model would receive for a request

use anyhow::{Context, Result};
use std::path::PathBuf;

use nexus_context::ai::context::{ContextManager, OptimizedContext, Strategy};
use nexus_context::ai::message::Message;
use nexus_context::config::Config;
use nexus_context::core::corpus::load_directory;

use crate::cli::theme::{self, colors, symbols};

pub struct OptimizeArgs {
    pub query: String,
    pub path: Option<PathBuf>,
    pub model: String,
    pub system: Option<String>,
    pub max_tokens: Option<usize>,
    pub force: bool,
    pub json: bool,
}

pub async fn run(mut config: Config, args: OptimizeArgs) -> Result<()> {
    let root = args.path.unwrap_or_else(|| PathBuf::from("."));
    let files = load_directory(&root, config.corpus.max_file_size_kb * 1024)
        .with_context(|| format!("Failed to load {}", root.display()))?;

    config.manager.force_smart_retrieval |= args.force;
    config.indexer.max_context_tokens = match args.max_tokens {
        Some(tokens) => tokens,
        None => {
            let share = (files.total_tokens() as f64 * config.indexer.compression_target).ceil() as usize;
            config.indexer.max_context_tokens.min(share.max(1))
        }
    };

    let pb = theme::spinner("Optimizing");
    pb.set_message(format!("{} files", files.file_count()));
    let manager = ContextManager::new(config);
    let messages = vec![Message::user(args.query)];
    let result = manager
        .optimize_context(&messages, &files, &args.model, args.system.as_deref())
        .await;
    pb.finish_and_clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_summary(&result, &args.model);
    if result.optimized_context.is_empty() {
        theme::print_warning(match &result.metadata.error {
            Some(_) => "Optimization failed; send the messages unmodified",
            None => "Request already fits; no extra context needed",
        });
        println!();
    } else {
        println!("{}", result.optimized_context);
    }
    Ok(())
}

fn print_summary(result: &OptimizedContext, model: &str) {
    let meta = &result.metadata;
    let (icon, color) = match (&meta.error, result.strategy) {
        (Some(_), _) => (symbols::WARNING, colors::ERROR),
        (None, Strategy::None) => (symbols::SUCCESS, colors::MUTED),
        (None, _) => (symbols::OPTIMIZE, colors::SUCCESS),
    };

    println!();
    theme::box_top(color, icon, "NEXUS Context Optimizer");
    theme::box_blank(color);
    theme::box_row(
        color,
        "Model",
        &format!("{model} ({} of {} tokens usable)", meta.usable_tokens, meta.context_window),
        colors::FG,
    );
    theme::box_row(color, "Strategy", result.strategy.as_str(), colors::AI_ACCENT);
    if let Some(intent) = meta.intent {
        theme::box_row(color, "Intent", intent.as_str(), colors::FG);
    }
    theme::box_row(
        color,
        "Tokens",
        &format!("{} -> {}", result.original_tokens, result.optimized_tokens),
        colors::FG,
    );
    theme::box_row(color, "Ratio", &format!("{:.3}", result.compression_ratio), colors::FG);
    theme::box_row(color, "Nodes Retrieved", &meta.nodes_retrieved.to_string(), colors::FG);
    if let Some(stage) = meta.compression_stage {
        theme::box_row(color, "Compression", &stage.to_string(), colors::FG);
    }
    theme::box_row(color, "Time Elapsed", &format!("{}ms", meta.processing_time_ms), colors::FG);
    if let Some(error) = &meta.error {
        theme::box_row(color, "Error", error, colors::ERROR);
    }
    theme::box_blank(color);
    theme::box_bottom(color);
    println!();
}

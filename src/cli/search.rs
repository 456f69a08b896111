//! Search command - rank indexed nodes against a natural-language query

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use nexus_context::ai::intent::{IntentAnalyzer, QueryIntent};
use nexus_context::config::Config;
use nexus_context::core::corpus::load_directory;
use nexus_context::index::node::{ContextNode, NodeKind};
use nexus_context::index::retrieval::{RetrievalConfig, Retriever};
use nexus_context::index::Indexer;

use crate::cli::theme::{self, colors, symbols};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit<'a> {
    id: &'a str,
    kind: NodeKind,
    name: &'a str,
    path: &'a str,
    start_line: Option<usize>,
    end_line: Option<usize>,
    score: f64,
}

pub async fn run(config: Config, query: &str, limit: usize, path: Option<&Path>, json: bool) -> Result<()> {
    let root = path.unwrap_or(Path::new("."));
    let pb = theme::spinner("Scanning");
    let files = load_directory(root, config.corpus.max_file_size_kb * 1024)
        .with_context(|| format!("Failed to load {}", root.display()))?;
    if files.file_count() == 0 {
        pb.finish_and_clear();
        theme::print_warning("No supported files found in directory");
        return Ok(());
    }

    pb.set_prefix("Indexing");
    pb.set_message(format!("{} files", files.file_count()));
    let indexer = Indexer::from_config(&config.indexer);
    let analyzer = IntentAnalyzer::new(indexer.embedder());
    let retriever = Retriever::new(RetrievalConfig::from(&config.indexer));
    let intent = analyzer.analyze_query(query);
    let shown = intent.clone();

    let results = tokio::task::spawn_blocking(move || {
        indexer.index_codebase(&files);
        retriever.retrieve(&indexer.snapshot(), &intent)
    })
    .await
    .context("Search task failed")?;
    pb.finish_and_clear();

    let mut results = results;
    results.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    results.truncate(limit);

    if json {
        let hits: Vec<SearchHit> = results
            .iter()
            .map(|n| SearchHit {
                id: &n.id,
                kind: n.kind,
                name: &n.name,
                path: &n.path,
                start_line: n.start_line,
                end_line: n.end_line,
                score: n.relevance_score,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    print_header(query, &shown);
    if results.is_empty() {
        print_no_results(query);
    } else {
        print_results(&results);
    }
    Ok(())
}

fn print_header(query: &str, intent: &QueryIntent) {
    let color = colors::PRIMARY;
    println!();
    theme::box_top(color, symbols::SEARCH, "NEXUS Context Search");
    theme::box_blank(color);
    theme::box_row(color, "Query", query, colors::FG);
    theme::box_row(color, "Intent", intent.kind.as_str(), colors::AI_ACCENT);
    if !intent.entities.is_empty() {
        theme::box_row(color, "Entities", &intent.entities.join(", "), colors::FG);
    }
    theme::box_blank(color);
    theme::box_bottom(color);
    println!();
}

fn print_results(results: &[ContextNode]) {
    for (rank, node) in results.iter().enumerate() {
        let icon = match node.kind {
            NodeKind::File => symbols::FILE,
            NodeKind::Class => symbols::CLASS,
            NodeKind::Comment => symbols::COMMENT,
            _ => symbols::FUNCTION,
        };
        let location = match (node.start_line, node.end_line) {
            (Some(start), Some(end)) if node.kind != NodeKind::File => format!("{}:{}-{}", node.path, start, end),
            _ => node.path.clone(),
        };
        println!(
            "  {}{:>2}.{} {} {}{}{} {}{}{}  {}{:.3}{}",
            colors::MUTED,
            rank + 1,
            colors::RESET,
            icon,
            colors::BOLD,
            node.name,
            colors::RESET,
            colors::MUTED,
            location,
            colors::RESET,
            colors::AI_ACCENT,
            node.relevance_score,
            colors::RESET
        );
        if let Some(line) = node.content.lines().find(|l| !l.trim().is_empty()) {
            let preview: String = line.trim().chars().take(80).collect();
            println!("      {}{}{}", colors::FG, preview, colors::RESET);
        }
    }
    println!();
}

fn print_no_results(query: &str) {
    theme::print_warning(&format!("No nodes matched \"{query}\""));
    println!(
        "\n  {}Try naming a type or function, or run `nexus-ctx index` to check what was extracted.{}\n",
        colors::MUTED,
        colors::RESET
    );
}

//! Index command - build the node index for a directory and report on it

use anyhow::{Context, Result};
use std::path::Path;

use nexus_context::config::Config;
use nexus_context::core::corpus::load_directory;
use nexus_context::index::{IndexStats, Indexer};

use crate::cli::theme::{self, colors, symbols};

pub async fn run(config: Config, path: Option<&Path>, json: bool) -> Result<()> {
    let path = path.unwrap_or(Path::new("."));
    let abs_path = path
        .canonicalize()
        .with_context(|| format!("Invalid path: {}", path.display()))?;

    if !json {
        print_header(&abs_path, config.indexer.ast_parsing);
    }

    let pb = theme::spinner("Scanning");
    let files = load_directory(&abs_path, config.corpus.max_file_size_kb * 1024)?;
    if files.file_count() == 0 {
        pb.finish_and_clear();
        theme::print_warning("No supported files found in directory");
        return Ok(());
    }

    pb.set_prefix("Indexing");
    pb.set_message(format!("{} files", files.file_count()));
    let indexer = Indexer::from_config(&config.indexer);
    let stats = tokio::task::spawn_blocking(move || indexer.index_codebase(&files))
        .await
        .context("Indexing task failed")?;
    pb.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_summary(&stats, config.verbose);
    }
    Ok(())
}

/// Print the indexing header
fn print_header(path: &Path, ast: bool) {
    let color = colors::PRIMARY;
    let mode = if ast {
        "Tree-sitter + heuristic extraction"
    } else {
        "Heuristic extraction"
    };
    println!();
    theme::box_top(color, symbols::LOADING, "NEXUS Context Index");
    theme::box_blank(color);
    theme::box_row(color, "Target", &theme::truncate_path(path, 40), colors::FG);
    theme::box_row(color, "Mode", mode, colors::MUTED);
    theme::box_blank(color);
    theme::box_bottom(color);
    println!();
}

/// Print the indexing summary
fn print_summary(stats: &IndexStats, verbose: bool) {
    let (icon, color, title) = if stats.files_skipped > 0 {
        (symbols::WARNING, colors::WARNING, "Indexing Completed with Warnings")
    } else {
        (symbols::SUCCESS, colors::SUCCESS, "Indexing Successful")
    };

    theme::box_top(color, icon, title);
    theme::box_blank(color);
    theme::box_row(color, "Files Indexed", &stats.files_indexed.to_string(), colors::FG);
    theme::box_row(color, "Total Lines", &stats.total_lines.to_string(), colors::FG);
    theme::box_row(color, "Nodes", &stats.nodes.to_string(), colors::AI_ACCENT);
    theme::box_row(
        color,
        "Breakdown",
        &format!(
            "{} {}  {} {}  {} {}",
            symbols::FUNCTION,
            stats.functions,
            symbols::CLASS,
            stats.classes,
            symbols::COMMENT,
            stats.comments
        ),
        colors::MUTED,
    );
    theme::box_row(
        color,
        "Edges",
        &format!("{} import, {} call", stats.import_edges, stats.call_edges),
        colors::FG,
    );
    theme::box_row(
        color,
        "Time Elapsed",
        &format!("{:.2}s", stats.time_taken_ms as f64 / 1000.0),
        colors::FG,
    );

    if stats.files_skipped > 0 {
        theme::box_blank(color);
        theme::box_row(color, "Skipped Files", &stats.files_skipped.to_string(), colors::ERROR);
    }

    theme::box_blank(color);
    theme::box_bottom(color);

    if verbose {
        for (path, error) in &stats.errors {
            println!("{}  {} {}: {}{}", colors::ERROR, symbols::WARNING, path, error, colors::RESET);
        }
    }
    println!();
}

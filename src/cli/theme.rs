//! Terminal styling shared by the commands

use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

// ANSI color codes from design system
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const PRIMARY: &str = "\x1b[38;2;100;181;246m";      // #64B5F6
    pub const SUCCESS: &str = "\x1b[38;2;165;214;167m";      // #A5D6A7
    pub const WARNING: &str = "\x1b[38;2;255;245;157m";      // #FFF59D
    pub const ERROR: &str = "\x1b[38;2;239;154;154m";        // #EF9A9A
    pub const AI_ACCENT: &str = "\x1b[38;2;255;202;40m";     // #FFCA28
    pub const MUTED: &str = "\x1b[38;2;84;110;122m";         // #546E7A
    pub const FG: &str = "\x1b[38;2;212;212;215m";           // #D4D4D7
}

pub mod symbols {
    pub const LOADING: &str = "󰊍";
    pub const SEARCH: &str = "󰍉";
    pub const OPTIMIZE: &str = "󰓅";
    pub const SUCCESS: &str = "󰄂";
    pub const WARNING: &str = "⚠";
    pub const FILE: &str = "󰈙";
    pub const FUNCTION: &str = "󰊕";
    pub const CLASS: &str = "󰆧";
    pub const COMMENT: &str = "󰆈";
}

const BOX_WIDTH: usize = 62;

/// Spinner on stderr, hidden when stderr is not a terminal
pub fn spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {prefix:.bold} {msg:.dim}")
    {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]));
    }
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn box_top(color: &str, icon: &str, title: &str) {
    let used = title.chars().count() + 6;
    println!(
        "{}{}╭─ {} {} {}╮{}",
        color,
        colors::BOLD,
        icon,
        title,
        "─".repeat(BOX_WIDTH.saturating_sub(used)),
        colors::RESET
    );
}

pub fn box_blank(color: &str) {
    println!("{}│{}{}{}│{}", color, colors::RESET, " ".repeat(BOX_WIDTH), color, colors::RESET);
}

/// A `label: value` row
pub fn box_row(color: &str, label: &str, value: &str, value_color: &str) {
    let text = format!("  {:<18}{}", format!("{label}:"), value);
    let pad = BOX_WIDTH.saturating_sub(text.chars().count());
    println!(
        "{}│{}  {}{:<18}{}{}{}{}{}{}│{}",
        color,
        colors::RESET,
        colors::MUTED,
        format!("{label}:"),
        colors::RESET,
        value_color,
        value,
        colors::RESET,
        " ".repeat(pad),
        color,
        colors::RESET
    );
}

pub fn box_bottom(color: &str) {
    println!("{}╰{}╯{}", color, "─".repeat(BOX_WIDTH), colors::RESET);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("\n{}  {} {}{}", colors::WARNING, symbols::WARNING, message, colors::RESET);
}

/// Truncate a path for display
pub fn truncate_path(path: &Path, max_len: usize) -> String {
    let s = path.display().to_string();
    let len = s.chars().count();
    if len <= max_len {
        s
    } else {
        let tail: String = s.chars().skip(len - max_len + 3).collect();
        format!("...{tail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_path() {
        assert_eq!(truncate_path(Path::new("/a/b"), 10), "/a/b");
        assert_eq!(truncate_path(Path::new("/home/user/projects/app"), 10), "...cts/app");
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Terminal color utilities
//!
//! Provides consistent color schemes across the CLI.

use colored::{ColoredString, Colorize};

use crate::pipeline::{RunStatus, StageStatus};

/// Colored label for a run status
pub fn run_status(status: RunStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        RunStatus::Completed => label.green().bold(),
        RunStatus::Failed => label.red().bold(),
        RunStatus::Cancelled | RunStatus::Invalidated => label.yellow().bold(),
        RunStatus::Pending | RunStatus::Running => label.blue(),
    }
}

/// Status marker for a stage line
pub fn stage_icon(status: StageStatus) -> ColoredString {
    match status {
        StageStatus::Pending => "○".dimmed(),
        StageStatus::Running => "→".blue(),
        StageStatus::Completed => "✓".green(),
        StageStatus::Failed => "✗".red(),
        StageStatus::Aborted => "⊘".yellow(),
    }
}

/// Print a styled section
pub fn print_section(title: &str) {
    println!();
    println!("{}:", title.bold());
}

/// Print a success check
pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

/// Print an error cross
pub fn print_error(msg: &str) {
    eprintln!("  {} {}", "✗".red(), msg);
}

/// Print a warning
pub fn print_warning(msg: &str) {
    eprintln!("  {} {}", "⚠".yellow(), msg);
}

/// Print an info item
pub fn print_info(msg: &str) {
    println!("  {} {}", "→".blue(), msg);
}

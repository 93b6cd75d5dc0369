// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Init command - write a pipeline configuration from a preset

use colored::Colorize;
use miette::Result;
use std::path::Path;

use super::DEFAULT_CONFIG;
use crate::pipeline::Preset;

/// Run the init command
pub async fn run(name: Option<String>, preset: Preset, force: bool, verbose: bool) -> Result<()> {
    let pipeline_name = name.unwrap_or_else(|| {
        std::env::current_dir()
            .ok()
            .and_then(|p| p.file_name().map(|s| s.to_string_lossy().to_string()))
            .unwrap_or_else(|| "my-pipeline".to_string())
    });

    println!("{}", "Initializing artiflow pipeline...".bold());
    println!();

    let path = Path::new(DEFAULT_CONFIG);
    if path.exists() && !force {
        return Err(miette::miette!(
            "{} already exists. Use --force to overwrite.",
            DEFAULT_CONFIG
        ));
    }

    let content = preset.yaml(&pipeline_name);
    std::fs::write(path, &content)
        .map_err(|e| miette::miette!("Failed to write {}: {}", DEFAULT_CONFIG, e))?;

    println!(
        "  {} Created {} from preset '{}'",
        "✓".green(),
        DEFAULT_CONFIG,
        preset
    );
    println!("    {}", preset.description().dimmed());

    println!();
    println!("{}", "Pipeline initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to adjust slots, jobs and stages", DEFAULT_CONFIG.cyan());
    println!("  2. Run {} to check it", "artiflow validate".cyan());
    match preset {
        Preset::Combined => println!(
            "  3. Run {} to analyze an archive",
            "artiflow run --archive <file.zip>".cyan()
        ),
        Preset::Split => println!(
            "  3. Run {} to analyze both",
            "artiflow run --archive <file.zip> --capture <file.pcap>".cyan()
        ),
    }
    println!();

    if verbose {
        println!("{}", "Generated pipeline:".dimmed());
        println!("{}", "─".repeat(50).dimmed());
        println!("{}", content.dimmed());
    }

    Ok(())
}

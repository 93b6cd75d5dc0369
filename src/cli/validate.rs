// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Validate command - check pipeline configuration

use colored::Colorize;
use miette::Result;

use super::{report, ConfigSource};
use crate::executors::create_default_executors;
use crate::pipeline::PipelineValidator;

/// Run the validate command
pub async fn run(source: ConfigSource, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    let config = match source.load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("  {} Failed to load {}", "✗".red(), source.describe());
            eprintln!();
            return Err(report(e));
        }
    };

    println!("  {} {} is valid YAML", "✓".green(), source.describe());

    let validation = PipelineValidator::validate(&config);
    let missing_executors =
        PipelineValidator::validate_executors(&config, &create_default_executors());

    let mut has_issues = false;

    if !validation.errors.is_empty() {
        has_issues = true;
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    // External executors are registered by the host, so these only warn
    if !missing_executors.is_empty() {
        has_issues = true;
        println!();
        println!("{}:", "Unregistered executors".yellow().bold());
        for missing in &missing_executors {
            println!("  {} {}", "⚠".yellow(), missing);
        }
    }

    if !validation.warnings.is_empty() {
        has_issues = true;
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Pipeline summary".bold());
        println!("  Name: {}", config.name);
        println!(
            "  Slots: {}",
            config
                .slots
                .iter()
                .map(|s| format!("{} [{}]", s.name, s.accepted_kinds()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("  Jobs: {}", config.jobs.len());
        for job in &config.jobs {
            let auto = if job.auto_start { "" } else { " [manual]" };
            println!("    {} {}{}", job.name.bold(), job.requires, auto.dimmed());
            for stage in &job.stages {
                println!("      - {} ({})", stage.name, stage.tool_name().dimmed());
            }
        }
    }

    println!();

    if !validation.is_valid() {
        return Err(miette::miette!("Pipeline validation failed"));
    }

    if has_issues {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
    }
    Ok(())
}

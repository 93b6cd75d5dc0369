// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Run command - provide artifacts and follow the runs they start

use colored::Colorize;
use miette::Result;
use tokio::sync::broadcast::error::RecvError;

use super::{report, OutputFormat, RunArgs};
use crate::executors::create_default_executors;
use crate::inputs::Artifact;
use crate::launcher::Launcher;
use crate::pipeline::{PipelineValidator, RunHandle, RunSnapshot, RunStatus};
use crate::utils::{colors, RunProgress};

/// Run the pipeline
pub async fn run(args: RunArgs, verbose: bool) -> Result<()> {
    let config = args.source.load().map_err(report)?;

    let validation = PipelineValidator::validate(&config);
    if !validation.is_valid() {
        eprintln!("{}", "Pipeline validation failed:".red().bold());
        for error in &validation.errors {
            colors::print_error(error);
        }
        return Err(miette::miette!("Pipeline configuration is invalid"));
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Pipeline warnings:".yellow().bold());
        for warning in &validation.warnings {
            colors::print_warning(warning);
        }
        eprintln!();
    }

    if let Some(ref job) = args.job {
        if config.get_job(job).is_none() {
            return Err(miette::miette!(
                "Job '{}' is not defined in {}\n\nAvailable jobs: {}",
                job,
                args.source.describe(),
                config.job_names().join(", ")
            ));
        }
    }

    let executors = create_default_executors();
    for name in executors.names() {
        let Some(executor) = executors.get(name) else {
            continue;
        };
        if !executor.check_available().await.unwrap_or(false) {
            colors::print_warning(&format!("Executor '{}' is not available on this host", name));
        }
    }

    let launcher = Launcher::new(config, executors).map_err(report)?;
    let mut events = launcher.subscribe();
    let text = args.format == OutputFormat::Text;

    // Provide inputs
    let mut launched: Vec<RunHandle> = Vec::new();
    for assignment in args.assignments() {
        let artifact = Artifact::from_path(&assignment.path).map_err(report)?;
        let line = format!(
            "{} ← {} ({}, {})",
            assignment.slot,
            artifact.name,
            artifact.kind,
            artifact.formatted_size()
        );

        launched.extend(
            launcher
                .provide_artifact(&assignment.slot, artifact)
                .await
                .map_err(report)?,
        );

        if text {
            colors::print_success(&line);
        }
    }

    // Pick the runs to follow
    let mut runs: Vec<RunHandle> = match args.job {
        Some(ref job) => launched
            .into_iter()
            .filter(|run| run.snapshot().job == *job)
            .collect(),
        None => launched,
    };

    if runs.is_empty() {
        runs = start_manually(&launcher, args.job.as_deref()).await?;
    }

    if text {
        println!();
        for run in &runs {
            let snapshot = run.snapshot();
            colors::print_info(&format!(
                "{} {} ({})",
                snapshot.job.bold(),
                snapshot.key,
                snapshot.job_id.to_string().dimmed()
            ));
        }
        println!();
    }

    // Follow progress until every run is terminal
    let mut progress = RunProgress::new(!text);
    for run in &runs {
        progress.observe(&run.snapshot());
    }

    while !runs.iter().all(RunHandle::is_terminal) {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if runs.iter().any(|r| r.job_id() == event.snapshot.job_id) {
                        progress.observe(&event.snapshot);
                    }
                }
                Err(RecvError::Lagged(_)) => {
                    for run in &runs {
                        progress.observe(&run.snapshot());
                    }
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                for run in &runs {
                    run.cancel();
                }
            }
        }
    }

    let snapshots: Vec<RunSnapshot> = runs.iter().map(RunHandle::snapshot).collect();
    for snapshot in &snapshots {
        progress.observe(snapshot);
    }

    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&snapshots)
                .map_err(|e| miette::miette!("Failed to serialize results: {}", e))?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            for snapshot in &snapshots {
                print_snapshot(snapshot, verbose);
            }
        }
    }

    // First unsuccessful run decides the exit status
    for snapshot in snapshots {
        if snapshot.status != RunStatus::Completed {
            snapshot.into_result().map_err(report)?;
        }
    }

    Ok(())
}

/// Trigger jobs explicitly when providing inputs started nothing
///
/// Covers jobs with auto-start disabled and jobs whose inputs were all
/// provided by an earlier run.
async fn start_manually(launcher: &Launcher, job: Option<&str>) -> Result<Vec<RunHandle>> {
    if let Some(job) = job {
        return launcher.trigger_job(job).await.map(|run| vec![run]).map_err(report);
    }

    let mut runs = Vec::new();
    let mut first_error = None;

    for name in launcher.config().job_names() {
        match launcher.trigger_job(name).await {
            Ok(run) => runs.push(run),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match (runs.is_empty(), first_error) {
        (true, Some(error)) => Err(report(error)),
        _ => Ok(runs),
    }
}

fn print_snapshot(snapshot: &RunSnapshot, verbose: bool) {
    colors::print_section(&format!(
        "Job '{}' {}",
        snapshot.job,
        colors::run_status(snapshot.status)
    ));

    for stage in &snapshot.stages {
        let duration = stage
            .duration_ms
            .map(|ms| format!(" ({}ms)", ms))
            .unwrap_or_default();
        let summary = stage
            .summary
            .as_deref()
            .map(|s| format!(" - {}", s))
            .unwrap_or_default();

        println!(
            "  {} {}{}{}",
            colors::stage_icon(stage.status),
            stage.name,
            duration.dimmed(),
            summary.dimmed()
        );
    }

    if let Some(ref error) = snapshot.error {
        println!();
        println!(
            "  {} stage {} '{}': {}",
            "Error in".red().bold(),
            error.stage_index + 1,
            error.stage,
            error.message
        );
    }

    if let Some(ref slot) = snapshot.invalidated_by {
        println!();
        println!("  {} slot '{}' changed", "Invalidated:".yellow().bold(), slot);
    }

    if verbose && !snapshot.results.is_empty() {
        println!();
        println!("  {}:", "Results".bold());
        for (stage, payload) in &snapshot.results {
            let pretty = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
            println!("  {}", stage.cyan());
            for line in pretty.lines() {
                println!("    {}", line);
            }
        }
    }
}

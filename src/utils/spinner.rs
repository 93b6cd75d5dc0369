// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Progress indicators for runs
//!
//! One bar per run, advanced from run snapshots as they arrive.

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::pipeline::{RunSnapshot, StageStatus};
use crate::utils::colors;

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.blue} {prefix:.bold} [{bar:24.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
        .progress_chars("█▓░")
}

/// Renders the progress of any number of concurrent runs
pub struct RunProgress {
    multi: MultiProgress,
    bars: HashMap<Uuid, ProgressBar>,
}

impl RunProgress {
    /// Draw to stderr, or nowhere when hidden
    pub fn new(hidden: bool) -> Self {
        let target = if hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        };

        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: HashMap::new(),
        }
    }

    /// Update the bar for a run from its latest snapshot
    pub fn observe(&mut self, snapshot: &RunSnapshot) {
        let bar = self.bars.entry(snapshot.job_id).or_insert_with(|| {
            let bar = self
                .multi
                .add(ProgressBar::new(snapshot.stages.len() as u64));
            bar.set_style(bar_style());
            bar.set_prefix(snapshot.job.clone());
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });

        if bar.is_finished() {
            return;
        }

        bar.set_position(snapshot.completed_stages() as u64);

        if snapshot.is_terminal() {
            bar.finish_with_message(colors::run_status(snapshot.status).to_string());
            return;
        }

        let message = snapshot
            .current_stage_index
            .and_then(|i| snapshot.stages.get(i))
            .filter(|stage| stage.status == StageStatus::Running)
            .map(|stage| format!("{}...", stage.name))
            .unwrap_or_else(|| "waiting".dimmed().to_string());
        bar.set_message(message);
    }

    /// Whether every observed run has finished
    pub fn is_complete(&self) -> bool {
        self.bars.values().all(ProgressBar::is_finished)
    }

    /// Position of a run's bar, if it has one
    pub fn position(&self, job_id: &Uuid) -> Option<u64> {
        self.bars.get(job_id).map(ProgressBar::position)
    }
}

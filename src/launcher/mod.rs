// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Launcher
//!
//! Owns the input registry and the runs started from it. Every input
//! change goes through the launcher, which invalidates runs that depended
//! on the old input and then re-evaluates the gates:
//!
//! ```text
//! provide_artifact ─┬─> InputRegistry::set_slot
//!                   ├─> invalidate non-terminal runs whose key has the slot
//!                   └─> on_input_changed ─> launch newly satisfied jobs
//! ```
//!
//! Locks are always taken inputs first, then runs. Checking for an active
//! run and inserting a new one happen under the same runs write lock, so a
//! key never has two runs in flight.

mod registry;

use indexmap::IndexMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{ArtiflowError, ArtiflowResult};
use crate::executors::{ExecutorRegistry, JobContext};
use crate::inputs::{Artifact, GatingKey, InputRegistry};
use crate::pipeline::{
    Coordinator, EventHub, JobDefinition, PipelineConfig, PipelineRun, PipelineValidator, RunEvent,
    RunHandle, RunSnapshot, RunStatus,
};
use registry::RunRegistry;

/// Starts runs when their inputs are satisfied
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct Launcher {
    inner: Arc<LauncherInner>,
}

#[derive(Debug)]
struct LauncherInner {
    config: PipelineConfig,
    executors: ExecutorRegistry,
    inputs: RwLock<InputRegistry>,
    runs: RwLock<RunRegistry>,
    events: EventHub,
}

impl Launcher {
    /// Create a launcher for a configuration
    ///
    /// Fails if the configuration is invalid or a stage has no usable
    /// executor.
    pub fn new(config: PipelineConfig, executors: ExecutorRegistry) -> ArtiflowResult<Self> {
        let validation = PipelineValidator::validate(&config);
        if !validation.is_valid() {
            return Err(ArtiflowError::invalid_config(&validation.errors));
        }

        let missing = PipelineValidator::validate_executors(&config, &executors);
        if !missing.is_empty() {
            return Err(ArtiflowError::invalid_config(&missing));
        }

        for job in &config.jobs {
            Coordinator::bind(job, &executors)?;
        }

        let inputs = InputRegistry::new(config.slots.iter().cloned());

        Ok(Self {
            inner: Arc::new(LauncherInner {
                config,
                executors,
                inputs: RwLock::new(inputs),
                runs: RwLock::new(RunRegistry::new()),
                events: EventHub::default(),
            }),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn executors(&self) -> &ExecutorRegistry {
        &self.inner.executors
    }

    /// Stream of every run transition
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.inner.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Input supply
    // ─────────────────────────────────────────────────────────────────────────

    /// Store an artifact in a slot and launch whatever it unblocks
    ///
    /// A rejected artifact changes nothing. On success, non-terminal runs
    /// whose key contains the slot are invalidated, even when the slot
    /// previously held a different artifact.
    pub async fn provide_artifact(&self, slot: &str, artifact: Artifact) -> ArtiflowResult<Vec<RunHandle>> {
        let mut inputs = self.inner.inputs.write().await;
        let name = artifact.name.clone();
        let replaced = inputs.set_slot(slot, artifact)?;

        info!(
            slot,
            artifact = %name,
            replaced = replaced.as_ref().map(|a| a.name.as_str()),
            "artifact provided"
        );

        let mut runs = self.inner.runs.write().await;
        invalidate_dependents(&mut runs, slot);
        Ok(self.evaluate(&inputs, &mut runs))
    }

    /// Empty a slot
    ///
    /// Idempotent for declared slots.
    pub async fn remove_artifact(&self, slot: &str) -> ArtiflowResult<Option<Artifact>> {
        let mut inputs = self.inner.inputs.write().await;
        if !inputs.contains_slot(slot) {
            return Err(ArtiflowError::UnknownSlot {
                slot: slot.to_string(),
            });
        }

        let removed = inputs.clear_slot(slot);
        if removed.is_some() {
            info!(slot, "artifact removed");
            let mut runs = self.inner.runs.write().await;
            invalidate_dependents(&mut runs, slot);
            self.evaluate(&inputs, &mut runs);
        }

        Ok(removed)
    }

    /// Re-evaluate every gate and start runs for newly satisfied ones
    pub async fn on_input_changed(&self) -> Vec<RunHandle> {
        let inputs = self.inner.inputs.read().await;
        let mut runs = self.inner.runs.write().await;
        self.evaluate(&inputs, &mut runs)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Runs
    // ─────────────────────────────────────────────────────────────────────────

    /// Start the job gated on a key
    pub async fn trigger(&self, key: &GatingKey) -> ArtiflowResult<RunHandle> {
        let job = self
            .inner
            .config
            .job_for_key(key)
            .ok_or_else(|| ArtiflowError::UnknownGatingKey { key: key.clone() })?;

        self.start(job).await
    }

    /// Start a job by name
    pub async fn trigger_job(&self, name: &str) -> ArtiflowResult<RunHandle> {
        let job = self
            .inner
            .config
            .get_job(name)
            .ok_or_else(|| ArtiflowError::UnknownJob {
                job: name.to_string(),
            })?;

        self.start(job).await
    }

    /// Snapshot of the latest run for a key
    pub async fn status(&self, key: &GatingKey) -> Option<RunSnapshot> {
        self.inner.runs.read().await.latest(key).map(PipelineRun::snapshot)
    }

    /// Handle to the latest run for a key
    pub async fn run(&self, key: &GatingKey) -> Option<RunHandle> {
        self.inner.runs.read().await.latest(key).cloned()
    }

    /// Cancel the non-terminal run under a key
    pub async fn cancel(&self, key: &GatingKey) -> bool {
        let runs = self.inner.runs.read().await;
        match runs.active(key) {
            Some(run) => {
                let cancelled = run.cancel();
                if cancelled {
                    info!(job_id = %run.job_id(), %key, "run cancelled");
                }
                cancelled
            }
            None => false,
        }
    }

    /// Forget a key's terminal run
    ///
    /// Returns false if there is none or it is still in flight.
    pub async fn clear(&self, key: &GatingKey) -> bool {
        self.inner.runs.write().await.clear(key)
    }

    /// Runs still in flight
    pub async fn active_runs(&self) -> Vec<RunHandle> {
        self.inner.runs.read().await.running().cloned().collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Input queries
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn is_satisfied(&self, key: &GatingKey) -> bool {
        self.inner.inputs.read().await.is_satisfied(key)
    }

    pub async fn missing(&self, key: &GatingKey) -> Vec<String> {
        self.inner.inputs.read().await.missing(key)
    }

    /// Artifact currently in a slot
    pub async fn artifact(&self, slot: &str) -> Option<Artifact> {
        self.inner.inputs.read().await.get(slot).cloned()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn start(&self, job: &JobDefinition) -> ArtiflowResult<RunHandle> {
        let key = &job.requires;
        let inputs = self.inner.inputs.read().await;
        let artifacts = inputs
            .capture(key)
            .ok_or_else(|| ArtiflowError::PreconditionNotMet {
                key: key.clone(),
                missing: inputs.missing(key),
            })?;

        let mut runs = self.inner.runs.write().await;
        if let Some(active) = runs.active(key) {
            return Err(ArtiflowError::AlreadyRunning {
                key: key.clone(),
                job_id: active.job_id(),
            });
        }

        let run = self.launch(job, artifacts, &mut runs)?;
        runs.mark_fired(key);
        Ok(run)
    }

    /// Launch auto-start jobs whose gate fired since the last evaluation
    fn evaluate(&self, inputs: &InputRegistry, runs: &mut RunRegistry) -> Vec<RunHandle> {
        let mut launched = Vec::new();

        for job in self.inner.config.jobs.iter().filter(|j| j.auto_start) {
            let key = &job.requires;
            if runs.has_fired(key) || runs.active(key).is_some() {
                continue;
            }
            let Some(artifacts) = inputs.capture(key) else {
                continue;
            };

            match self.launch(job, artifacts, runs) {
                Ok(run) => {
                    runs.mark_fired(key);
                    launched.push(run);
                }
                Err(error) => warn!(job = %job.name, %error, "auto-start failed"),
            }
        }

        launched
    }

    /// Create a run, register it and spawn its coordinator
    ///
    /// Caller holds the runs write lock.
    fn launch(
        &self,
        job: &JobDefinition,
        artifacts: IndexMap<String, Artifact>,
        runs: &mut RunRegistry,
    ) -> ArtiflowResult<RunHandle> {
        let stages = Coordinator::bind(job, &self.inner.executors)?;

        let job_id = Uuid::new_v4();
        let run = PipelineRun::new(job_id, job, self.inner.events.clone());
        let context = JobContext {
            job_id,
            job: job.name.clone(),
            artifacts: artifacts.clone(),
        };
        runs.insert(run.clone());

        info!(%job_id, job = %job.name, key = %job.requires, "run launched");

        let coordinator = Coordinator::new(run.clone(), context, stages);
        let launcher = self.clone();
        let clear_on_failure = job.clear_inputs_on_failure;

        tokio::spawn(async move {
            let snapshot = coordinator.drive().await;
            if clear_on_failure && snapshot.status == RunStatus::Failed {
                launcher.clear_consumed(&artifacts).await;
            }
        });

        Ok(run)
    }

    /// Empty the slots a failed run consumed
    ///
    /// A slot that was given a new artifact meanwhile is left alone.
    async fn clear_consumed(&self, consumed: &IndexMap<String, Artifact>) {
        let mut inputs = self.inner.inputs.write().await;
        let mut runs = self.inner.runs.write().await;

        for (slot, artifact) in consumed {
            if inputs.get(slot) != Some(artifact) {
                debug!(slot, "slot changed since run start, keeping it");
                continue;
            }
            inputs.clear_slot(slot);
            info!(slot, artifact = %artifact.name, "slot cleared after failed run");
            invalidate_dependents(&mut runs, slot);
        }
    }
}

/// Invalidate runs reading a slot and re-arm the gates that include it
fn invalidate_dependents(runs: &mut RunRegistry, slot: &str) {
    for run in runs.dependents(slot) {
        if run.invalidate(slot) {
            info!(job_id = %run.job_id(), key = %run.key(), slot, "run invalidated");
        }
    }
    runs.rearm(slot);
}

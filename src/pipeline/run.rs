// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Pipeline runs
//!
//! A [`PipelineRun`] owns the progress state of one execution. The state
//! lives in a `watch` channel so observers can poll a snapshot or await
//! the next change; every accepted transition is also broadcast as a
//! [`RunEvent`].
//!
//! Transitions are guarded: a stage can only start once its predecessor
//! completed, and once the run is terminal nothing changes any more. The
//! first terminal transition wins, so a stage result arriving after a
//! cancellation or invalidation is discarded.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

use super::{EventHub, JobDefinition, RunEvent};
use crate::errors::{ArtiflowError, ArtiflowResult};
use crate::executors::{CancelSignal, ExecutorError, StageOutput};
use crate::inputs::GatingKey;

/// Status of one stage within a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Was running when the run was cancelled or invalidated
    Aborted,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Status of a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Invalidated,
}

impl RunStatus {
    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Invalidated => write!(f, "invalidated"),
        }
    }
}

/// Per-stage view in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSnapshot {
    pub name: String,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Where and why a run failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    /// Zero-based position of the failed stage
    pub stage_index: usize,
    /// Name of the failed stage
    pub stage: String,
    pub message: String,
}

/// Read-only view of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub job_id: Uuid,
    pub job: String,
    pub key: GatingKey,
    pub status: RunStatus,
    /// Stage that is running, or where the run stopped; `None` before the
    /// first stage and after completion
    pub current_stage_index: Option<usize>,
    pub stages: Vec<StageSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
    /// Slot whose change invalidated the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidated_by: Option<String>,
    /// Payloads of completed stages, in stage order
    pub results: IndexMap<String, serde_json::Value>,
}

impl RunSnapshot {
    fn new(job_id: Uuid, job: &JobDefinition) -> Self {
        Self {
            job_id,
            job: job.name.clone(),
            key: job.requires.clone(),
            status: RunStatus::Pending,
            current_stage_index: None,
            stages: job
                .stages
                .iter()
                .map(|stage| StageSnapshot {
                    name: stage.name.clone(),
                    status: StageStatus::Pending,
                    summary: None,
                    duration_ms: None,
                })
                .collect(),
            error: None,
            invalidated_by: None,
            results: IndexMap::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Number of completed stages
    pub fn completed_stages(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Completed)
            .count()
    }

    /// Get a stage by name
    pub fn stage(&self, name: &str) -> Option<&StageSnapshot> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Payload of a completed stage
    pub fn result(&self, stage: &str) -> Option<&serde_json::Value> {
        self.results.get(stage)
    }

    /// Turn a terminal snapshot into its results or the matching error
    pub fn into_result(self) -> ArtiflowResult<IndexMap<String, serde_json::Value>> {
        match self.status {
            RunStatus::Completed => Ok(self.results),
            RunStatus::Failed => {
                let error = self.error.unwrap_or(StageError {
                    stage_index: self.current_stage_index.unwrap_or_default(),
                    stage: String::new(),
                    message: "unknown failure".into(),
                });
                Err(ArtiflowError::StageFailed {
                    stage: error.stage,
                    stage_index: error.stage_index,
                    message: error.message,
                })
            }
            RunStatus::Cancelled => Err(ArtiflowError::Cancelled {
                job_id: self.job_id,
            }),
            RunStatus::Invalidated => Err(ArtiflowError::Invalidated {
                job_id: self.job_id,
                slot: self.invalidated_by.unwrap_or_default(),
            }),
            RunStatus::Pending | RunStatus::Running => Err(ArtiflowError::RunNotFinished {
                job_id: self.job_id,
            }),
        }
    }
}

/// One execution of a job
///
/// Cheap to clone; every clone refers to the same run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    inner: Arc<RunInner>,
}

/// Handle given to callers that start runs
pub type RunHandle = PipelineRun;

#[derive(Debug)]
struct RunInner {
    job_id: Uuid,
    key: GatingKey,
    state: watch::Sender<RunSnapshot>,
    cancel: watch::Sender<bool>,
    events: EventHub,
}

impl PipelineRun {
    /// Create a pending run for a job
    pub fn new(job_id: Uuid, job: &JobDefinition, events: EventHub) -> Self {
        let (state, _) = watch::channel(RunSnapshot::new(job_id, job));
        let (cancel, _) = watch::channel(false);

        Self {
            inner: Arc::new(RunInner {
                job_id,
                key: job.requires.clone(),
                state,
                cancel,
                events,
            }),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.inner.job_id
    }

    pub fn key(&self) -> &GatingKey {
        &self.inner.key
    }

    /// Current snapshot
    pub fn snapshot(&self) -> RunSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn status(&self) -> RunStatus {
        self.inner.state.borrow().status
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Receiver that observes every change to this run
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.inner.state.subscribe()
    }

    /// Wait until the run reaches a terminal state
    pub async fn wait(&self) -> RunSnapshot {
        let mut rx = self.subscribe();
        let finished = rx
            .wait_for(|snapshot| snapshot.status.is_terminal())
            .await
            .map(|snapshot| snapshot.clone());

        finished.unwrap_or_else(|_| self.snapshot())
    }

    /// Request cancellation
    ///
    /// Returns false if the run was already terminal.
    pub fn cancel(&self) -> bool {
        self.interrupt(RunStatus::Cancelled, None)
    }

    /// Mark the run stale because one of its input slots changed
    pub(crate) fn invalidate(&self, slot: &str) -> bool {
        self.interrupt(RunStatus::Invalidated, Some(slot))
    }

    /// Signal handed to executors
    pub fn cancel_signal(&self) -> CancelSignal {
        CancelSignal::new(self.inner.cancel.subscribe())
    }

    /// Move stage `index` to running
    ///
    /// Only accepted for stage 0 of a pending run, or for the stage right
    /// after a completed one.
    pub(crate) fn stage_started(&self, index: usize) -> bool {
        self.transition(|s| {
            if index >= s.stages.len() || s.stages[index].status != StageStatus::Pending {
                return false;
            }

            let ready = match s.status {
                RunStatus::Pending => index == 0,
                RunStatus::Running => {
                    index > 0 && s.stages[index - 1].status == StageStatus::Completed
                }
                _ => false,
            };
            if !ready {
                return false;
            }

            s.status = RunStatus::Running;
            s.current_stage_index = Some(index);
            s.stages[index].status = StageStatus::Running;
            true
        })
    }

    /// Record a stage's output; completes the run after the last stage
    pub(crate) fn stage_completed(&self, index: usize, output: &StageOutput, elapsed: Duration) -> bool {
        self.transition(|s| {
            if !is_running_stage(s, index) {
                return false;
            }

            let stage = &mut s.stages[index];
            stage.status = StageStatus::Completed;
            stage.summary = output.summary.clone();
            stage.duration_ms = Some(elapsed.as_millis() as u64);
            let name = stage.name.clone();

            s.results.insert(name, output.payload.clone());

            if index + 1 == s.stages.len() {
                s.status = RunStatus::Completed;
                s.current_stage_index = None;
            }
            true
        })
    }

    /// Record a stage failure; the run becomes terminal
    pub(crate) fn stage_failed(&self, index: usize, error: &ExecutorError, elapsed: Duration) -> bool {
        self.transition(|s| {
            if !is_running_stage(s, index) {
                return false;
            }

            let stage = &mut s.stages[index];
            stage.status = StageStatus::Failed;
            stage.duration_ms = Some(elapsed.as_millis() as u64);

            s.error = Some(StageError {
                stage_index: index,
                stage: stage.name.clone(),
                message: error.message.clone(),
            });
            s.status = RunStatus::Failed;
            true
        })
    }

    fn interrupt(&self, status: RunStatus, slot: Option<&str>) -> bool {
        let changed = self.transition(|s| {
            s.status = status;
            s.invalidated_by = slot.map(String::from);
            if let Some(index) = s.current_stage_index {
                if s.stages[index].status == StageStatus::Running {
                    s.stages[index].status = StageStatus::Aborted;
                }
            }
            true
        });

        if changed {
            self.inner.cancel.send_replace(true);
        }
        changed
    }

    fn transition(&self, apply: impl FnOnce(&mut RunSnapshot) -> bool) -> bool {
        let changed = self
            .inner
            .state
            .send_if_modified(|s| !s.status.is_terminal() && apply(s));

        if changed {
            self.inner.events.emit(RunEvent {
                snapshot: self.snapshot(),
            });
        }
        changed
    }
}

fn is_running_stage(s: &RunSnapshot, index: usize) -> bool {
    s.current_stage_index == Some(index)
        && s.stages.get(index).map(|st| st.status) == Some(StageStatus::Running)
}

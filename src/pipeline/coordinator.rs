// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Pipeline coordinator
//!
//! Drives one run through its stages, strictly in order, forwarding each
//! stage's output to the next.

use indexmap::IndexMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{JobDefinition, PipelineRun, RunSnapshot, Stage};
use crate::errors::ArtiflowError;
use crate::executors::{ExecutorRegistry, JobContext, StageContext, StageExecutor, StageOutput};

/// A stage paired with the executor that runs it
#[derive(Clone)]
pub struct StageBinding {
    pub stage: Stage,
    pub executor: Arc<dyn StageExecutor>,
}

impl std::fmt::Debug for StageBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageBinding")
            .field("stage", &self.stage.name)
            .field("tool", &self.stage.tool_name())
            .finish()
    }
}

/// Pipeline coordinator
#[derive(Debug)]
pub struct Coordinator {
    run: PipelineRun,
    context: Arc<JobContext>,
    stages: Vec<StageBinding>,
}

impl Coordinator {
    /// Resolve an executor for every stage of a job
    ///
    /// Fails before anything runs if one is missing.
    pub fn bind(job: &JobDefinition, executors: &ExecutorRegistry) -> Result<Vec<StageBinding>, ArtiflowError> {
        job.stages
            .iter()
            .map(|stage| {
                let executor = executors.resolve(stage)?;
                executor.validate_stage(stage)?;
                Ok(StageBinding {
                    stage: stage.clone(),
                    executor,
                })
            })
            .collect()
    }

    /// Create a coordinator for a pending run
    pub fn new(run: PipelineRun, context: JobContext, stages: Vec<StageBinding>) -> Self {
        Self {
            run,
            context: Arc::new(context),
            stages,
        }
    }

    /// The run being driven
    pub fn run(&self) -> &PipelineRun {
        &self.run
    }

    /// Execute the stages until the run is terminal
    ///
    /// Returns the final snapshot. A stage is invoked at most once; the
    /// next one starts only after its predecessor's completion has been
    /// recorded.
    pub async fn drive(self) -> RunSnapshot {
        let start = Instant::now();
        let job_id = self.run.job_id();
        let cancel = self.run.cancel_signal();

        info!(%job_id, job = %self.context.job, stages = self.stages.len(), "run started");

        let mut results: IndexMap<String, serde_json::Value> = IndexMap::new();
        let mut previous: Option<StageOutput> = None;

        for (index, binding) in self.stages.iter().enumerate() {
            let stage = &binding.stage;

            if !self.run.stage_started(index) {
                debug!(%job_id, stage = %stage.name, "run became terminal before stage start");
                break;
            }

            debug!(%job_id, stage = %stage.name, tool = stage.tool_name(), "stage started");

            let ctx = StageContext {
                job: Arc::clone(&self.context),
                stage_index: index,
                results: results.clone(),
                cancel: cancel.clone(),
            };

            let stage_start = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = binding.executor.execute(stage, &ctx, previous.as_ref()) => Some(result),
            };
            let elapsed = stage_start.elapsed();

            match outcome {
                None => {
                    debug!(%job_id, stage = %stage.name, "stage abandoned");
                    break;
                }
                Some(Ok(output)) => {
                    if !self.run.stage_completed(index, &output, elapsed) {
                        debug!(%job_id, stage = %stage.name, "discarding result of terminal run");
                        break;
                    }
                    debug!(
                        %job_id,
                        stage = %stage.name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "stage completed"
                    );
                    results.insert(stage.name.clone(), output.payload.clone());
                    previous = Some(output);
                }
                Some(Err(error)) => {
                    warn!(%job_id, stage = %stage.name, %error, "stage failed");
                    self.run.stage_failed(index, &error, elapsed);
                    break;
                }
            }
        }

        let snapshot = self.run.snapshot();
        info!(
            %job_id,
            status = %snapshot.status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "run finished"
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::{create_default_executors, ExecutorError};
    use crate::inputs::{Artifact, ArtifactKind, GatingKey};
    use crate::pipeline::{EventHub, RunStatus, StageStatus, Tool};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Records what each stage saw and answers from a script
    struct Scripted {
        seen: Mutex<Vec<(usize, Option<serde_json::Value>, Vec<String>)>>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl StageExecutor for Scripted {
        async fn execute(
            &self,
            stage: &Stage,
            ctx: &StageContext,
            previous: Option<&StageOutput>,
        ) -> Result<StageOutput, ExecutorError> {
            self.seen.lock().unwrap().push((
                ctx.stage_index,
                previous.map(|p| p.payload.clone()),
                ctx.results.keys().cloned().collect(),
            ));

            if self.fail_at == Some(ctx.stage_index) {
                return Err(ExecutorError::new("bad format"));
            }
            Ok(StageOutput::new(json!(format!("O{}", ctx.stage_index + 1)))
                .with_summary(format!("{} done", stage.name)))
        }
    }

    fn job() -> JobDefinition {
        JobDefinition {
            name: "analyze".into(),
            description: None,
            requires: GatingKey::new(["archive"]),
            auto_start: true,
            clear_inputs_on_failure: false,
            stages: ["extract", "static", "behavioral"]
                .iter()
                .map(|name| Stage {
                    name: name.to_string(),
                    description: None,
                    tool: Tool::External {
                        name: "scripted".into(),
                    },
                    input: vec![],
                    output: None,
                })
                .collect(),
        }
    }

    fn coordinator(executor: Arc<Scripted>) -> Coordinator {
        let job = job();
        let registry = ExecutorRegistry::new().with("scripted", executor);
        let stages = Coordinator::bind(&job, &registry).unwrap();
        let run = PipelineRun::new(Uuid::new_v4(), &job, EventHub::default());

        let mut artifacts = IndexMap::new();
        artifacts.insert(
            "archive".to_string(),
            Artifact::new("code.zip", 1, ArtifactKind::Archive),
        );
        let context = JobContext {
            job_id: run.job_id(),
            job: job.name.clone(),
            artifacts,
        };

        Coordinator::new(run, context, stages)
    }

    #[tokio::test]
    async fn test_forwards_outputs_in_order() {
        let executor = Arc::new(Scripted {
            seen: Mutex::new(vec![]),
            fail_at: None,
        });

        let snapshot = coordinator(executor.clone()).drive().await;

        assert_eq!(snapshot.status, RunStatus::Completed);
        assert_eq!(snapshot.result("behavioral"), Some(&json!("O3")));
        assert_eq!(snapshot.stages[1].summary.as_deref(), Some("static done"));

        let seen = executor.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], (0, None, vec![]));
        assert_eq!(seen[1], (1, Some(json!("O1")), vec!["extract".to_string()]));
        assert_eq!(
            seen[2],
            (
                2,
                Some(json!("O2")),
                vec!["extract".to_string(), "static".to_string()]
            )
        );
    }

    #[tokio::test]
    async fn test_fail_fast() {
        let executor = Arc::new(Scripted {
            seen: Mutex::new(vec![]),
            fail_at: Some(1),
        });

        let snapshot = coordinator(executor.clone()).drive().await;

        assert_eq!(snapshot.status, RunStatus::Failed);
        assert_eq!(snapshot.stages[2].status, StageStatus::Pending);
        assert_eq!(snapshot.result("extract"), Some(&json!("O1")));
        assert_eq!(executor.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_run_is_not_driven() {
        let executor = Arc::new(Scripted {
            seen: Mutex::new(vec![]),
            fail_at: None,
        });

        let coordinator = coordinator(executor.clone());
        coordinator.run().cancel();
        let snapshot = coordinator.drive().await;

        assert_eq!(snapshot.status, RunStatus::Cancelled);
        assert!(executor.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_bind_reports_missing_executor() {
        let err = Coordinator::bind(&job(), &create_default_executors()).unwrap_err();
        assert!(matches!(err, ArtiflowError::ExecutorNotFound { ref tool } if tool == "scripted"));
    }
}

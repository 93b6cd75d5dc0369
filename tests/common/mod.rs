//! Shared test infrastructure for integration tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use artiflow::executors::{ExecutorError, StageContext};
use artiflow::{
    Artifact, ArtifactKind, ExecutorRegistry, Launcher, PipelineConfig, Stage, StageExecutor,
    StageOutput,
};
use tokio::sync::{Notify, Semaphore};

/// What a stage saw when it was invoked
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub stage: String,
    pub previous: Option<Value>,
    pub earlier: Vec<String>,
    pub archive: Option<String>,
}

/// Executor that records every call and answers `"O<n>"` for stage n
///
/// A stage named in `hold` blocks until [`Probe::release`] is called;
/// `entered` is notified when it starts waiting. Permits handed to a run
/// that is dropped meanwhile go back to the pool.
pub struct Probe {
    pub calls: Mutex<Vec<Call>>,
    pub fail: HashMap<String, String>,
    pub hold: Option<String>,
    pub entered: Notify,
    gate: Semaphore,
}

impl Probe {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: HashMap::new(),
            hold: None,
            entered: Notify::new(),
            gate: Semaphore::new(0),
        }
    }

    /// Let one held stage through
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn failing(mut self, stage: &str, message: &str) -> Self {
        self.fail.insert(stage.to_string(), message.to_string());
        self
    }

    pub fn holding(mut self, stage: &str) -> Self {
        self.hold = Some(stage.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stages_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.stage).collect()
    }
}

#[async_trait]
impl StageExecutor for Probe {
    async fn execute(
        &self,
        stage: &Stage,
        ctx: &StageContext,
        previous: Option<&StageOutput>,
    ) -> Result<StageOutput, ExecutorError> {
        self.calls.lock().unwrap().push(Call {
            stage: stage.name.clone(),
            previous: previous.map(|p| p.payload.clone()),
            earlier: ctx.results.keys().cloned().collect(),
            archive: ctx.job.artifact("archive").map(|a| a.name.clone()),
        });

        if self.hold.as_deref() == Some(stage.name.as_str()) {
            self.entered.notify_one();
            self.gate
                .acquire()
                .await
                .map_err(|e| ExecutorError::new(e.to_string()))?
                .forget();
        }

        if let Some(message) = self.fail.get(&stage.name) {
            return Err(ExecutorError::new(message.clone()));
        }

        Ok(StageOutput::new(json!(format!("O{}", ctx.stage_index + 1))))
    }
}

/// One job gated on {archive, capture} with three probe stages
pub fn behavioral_config(auto_start: bool, clear_inputs_on_failure: bool) -> PipelineConfig {
    PipelineConfig::from_yaml(&format!(
        r#"
name: scenarios
slots:
  - name: archive
    accepts: [archive]
  - name: capture
    accepts: [capture]
jobs:
  - name: behavioral
    requires: [archive, capture]
    auto_start: {auto_start}
    clear_inputs_on_failure: {clear_inputs_on_failure}
    stages:
      - name: extract
        tool: {{ type: external, name: probe }}
        input: [{{ slot: archive }}]
      - name: static_analysis
        tool: {{ type: external, name: probe }}
        input: [{{ from_stage: extract }}]
      - name: behavioral_analysis
        tool: {{ type: external, name: probe }}
        input:
          - from_stage: extract
          - from_stage: static_analysis
          - slot: capture
"#,
        auto_start = auto_start,
        clear_inputs_on_failure = clear_inputs_on_failure,
    ))
    .unwrap()
}

/// Static job on {archive}, behavioral job on {archive, capture}
pub fn split_config() -> PipelineConfig {
    PipelineConfig::from_yaml(
        r#"
name: split
slots:
  - name: archive
    accepts: [archive]
  - name: capture
    accepts: [capture]
jobs:
  - name: static
    requires: [archive]
    stages:
      - name: extract
        tool: { type: external, name: probe }
        input: [{ slot: archive }]
      - name: static_analysis
        tool: { type: external, name: probe }
        input: [{ from_stage: extract }]
  - name: behavioral
    requires: [archive, capture]
    stages:
      - name: replay
        tool: { type: external, name: probe }
        input: [{ slot: capture }]
"#,
    )
    .unwrap()
}

pub fn launcher(config: PipelineConfig, probe: Arc<Probe>) -> Launcher {
    Launcher::new(config, ExecutorRegistry::new().with("probe", probe)).unwrap()
}

pub fn zip(name: &str) -> Artifact {
    Artifact::new(name, 1024, ArtifactKind::Archive)
}

pub fn pcap(name: &str) -> Artifact {
    Artifact::new(name, 2048, ArtifactKind::Capture)
}

/// Wait for a condition that a spawned task makes true
pub async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

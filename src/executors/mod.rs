// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Stage executors
//!
//! This module provides the executor trait the coordinator drives, the
//! context every stage receives, and the built-in executors (extract,
//! simulated, shell).

mod shell;
mod simulated;

pub use shell::ShellExecutor;
pub use simulated::{ExtractExecutor, SimulatedExecutor};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::errors::ArtiflowError;
use crate::inputs::Artifact;
use crate::pipeline::Stage;

/// Output of a successful stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    /// Result payload, opaque to the coordinator
    pub payload: serde_json::Value,

    /// Short human-readable summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl StageOutput {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            summary: None,
        }
    }

    /// Attach a summary
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// Stage-level failure reported by an executor
///
/// The coordinator treats it as final for the run; executors that want
/// retries perform them before returning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ExecutorError {
    pub message: String,
}

impl ExecutorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Cooperative cancellation signal for one run
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub(crate) fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// A signal that never fires
    pub fn detached() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            // Sender gone without cancelling: the signal can no longer fire.
            std::future::pending::<()>().await;
        }
    }
}

/// Immutable job context captured when a run starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobContext {
    /// Run identifier
    pub job_id: Uuid,

    /// Job class name
    pub job: String,

    /// Artifacts of the gating key, as they were at start
    pub artifacts: IndexMap<String, Artifact>,
}

impl JobContext {
    /// Artifact captured for a slot
    pub fn artifact(&self, slot: &str) -> Option<&Artifact> {
        self.artifacts.get(slot)
    }
}

/// Everything a stage may read
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Job context captured at start
    pub job: Arc<JobContext>,

    /// Position of the stage in the job
    pub stage_index: usize,

    /// Payloads of every earlier stage, in stage order
    pub results: IndexMap<String, serde_json::Value>,

    /// Cancellation signal for the run
    pub cancel: CancelSignal,
}

impl StageContext {
    /// Payload of an earlier stage
    pub fn result(&self, stage: &str) -> Option<&serde_json::Value> {
        self.results.get(stage)
    }
}

/// Trait for stage executors
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Execute a stage
    ///
    /// # Arguments
    /// * `stage` - The stage configuration
    /// * `ctx` - Job context, earlier results and the cancellation signal
    /// * `previous` - Output of the immediately preceding stage (if any)
    async fn execute(
        &self,
        stage: &Stage,
        ctx: &StageContext,
        previous: Option<&StageOutput>,
    ) -> Result<StageOutput, ExecutorError>;

    /// Check if the executor can run on this host
    async fn check_available(&self) -> Result<bool, ArtiflowError> {
        Ok(true)
    }

    /// Validate stage configuration
    fn validate_stage(&self, _stage: &Stage) -> Result<(), ArtiflowError> {
        Ok(())
    }
}

/// Executors by name
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn StageExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under a name, replacing any previous one
    pub fn register(&mut self, name: &str, executor: Arc<dyn StageExecutor>) {
        self.executors.insert(name.to_string(), executor);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, name: &str, executor: Arc<dyn StageExecutor>) -> Self {
        self.register(name, executor);
        self
    }

    /// Look up an executor for a stage
    pub fn resolve(&self, stage: &Stage) -> Result<Arc<dyn StageExecutor>, ArtiflowError> {
        self.executors
            .get(stage.tool_name())
            .cloned()
            .ok_or_else(|| ArtiflowError::ExecutorNotFound {
                tool: stage.tool_name().to_string(),
            })
    }

    /// Look up an executor by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn StageExecutor>> {
        self.executors.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.executors.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.executors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("executors", &self.names())
            .finish()
    }
}

/// Create a registry with all built-in executors
pub fn create_default_executors() -> ExecutorRegistry {
    ExecutorRegistry::new()
        .with("extract", Arc::new(ExtractExecutor::new()))
        .with("simulated", Arc::new(SimulatedExecutor::new()))
        .with("shell", Arc::new(ShellExecutor::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Tool;

    #[test]
    fn test_default_registry() {
        let registry = create_default_executors();
        assert_eq!(registry.names(), vec!["extract", "shell", "simulated"]);

        let stage = Stage {
            name: "sandbox".into(),
            description: None,
            tool: Tool::External {
                name: "sandbox".into(),
            },
            input: vec![],
            output: None,
        };
        assert!(matches!(
            registry.resolve(&stage),
            Err(ArtiflowError::ExecutorNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_signal() {
        let (tx, rx) = watch::channel(false);
        let signal = CancelSignal::new(rx);
        assert!(!signal.is_cancelled());

        tx.send_replace(true);
        signal.cancelled().await;
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_detached_signal_never_fires() {
        let signal = CancelSignal::detached();
        let fired = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            signal.cancelled(),
        )
        .await;
        assert!(fired.is_err());
        assert!(!signal.is_cancelled());
    }
}

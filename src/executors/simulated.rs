// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Simulated executors
//!
//! Stand-ins for real analysis engines: they wait for a configured delay
//! and then return a fixed or derived payload.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use super::{CancelSignal, ExecutorError, StageContext, StageExecutor, StageOutput};
use crate::errors::ArtiflowError;
use crate::pipeline::{Stage, Tool};

/// Sleep for the simulated latency unless the run is cancelled first
async fn simulate_latency(delay_ms: u64, cancel: &CancelSignal) -> Result<(), ExecutorError> {
    if delay_ms == 0 {
        return Ok(());
    }

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => Ok(()),
        _ = cancel.cancelled() => Err(ExecutorError::new("cancelled")),
    }
}

/// Simulated archive extraction
///
/// Reports the archive as extracted to `<root>/<archive stem>`.
pub struct ExtractExecutor;

impl ExtractExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExtractExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StageExecutor for ExtractExecutor {
    async fn execute(
        &self,
        stage: &Stage,
        ctx: &StageContext,
        _previous: Option<&StageOutput>,
    ) -> Result<StageOutput, ExecutorError> {
        let Tool::Extract { root, delay_ms } = &stage.tool else {
            return Err(ExecutorError::new(format!(
                "Stage '{}' is not an extract stage",
                stage.name
            )));
        };

        let slot = stage.input_slots().next().unwrap_or("archive");
        let archive = ctx.job.artifact(slot).ok_or_else(|| {
            ExecutorError::new(format!("No artifact captured for slot '{}'", slot))
        })?;

        simulate_latency(*delay_ms, &ctx.cancel).await?;

        let path = root.join(archive.stem());
        Ok(StageOutput::new(json!({
            "path": path,
            "archive": archive.name,
            "byte_size": archive.byte_size,
        }))
        .with_summary(format!("Extracted to: {}", path.display())))
    }

    fn validate_stage(&self, stage: &Stage) -> Result<(), ArtiflowError> {
        match &stage.tool {
            Tool::Extract { .. } => Ok(()),
            _ => Err(ArtiflowError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Not an extract stage".to_string(),
            }),
        }
    }
}

/// Fixed payload after a delay, or a configured failure
pub struct SimulatedExecutor;

impl SimulatedExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StageExecutor for SimulatedExecutor {
    async fn execute(
        &self,
        stage: &Stage,
        ctx: &StageContext,
        _previous: Option<&StageOutput>,
    ) -> Result<StageOutput, ExecutorError> {
        let Tool::Simulated {
            delay_ms,
            payload,
            summary,
            fail,
        } = &stage.tool
        else {
            return Err(ExecutorError::new(format!(
                "Stage '{}' is not a simulated stage",
                stage.name
            )));
        };

        simulate_latency(*delay_ms, &ctx.cancel).await?;

        if let Some(message) = fail {
            return Err(ExecutorError::new(message.clone()));
        }

        Ok(StageOutput {
            payload: payload.clone(),
            summary: summary.clone(),
        })
    }

    fn validate_stage(&self, stage: &Stage) -> Result<(), ArtiflowError> {
        match &stage.tool {
            Tool::Simulated { .. } => Ok(()),
            _ => Err(ArtiflowError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Not a simulated stage".to_string(),
            }),
        }
    }
}

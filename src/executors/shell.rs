// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Shell executor
//!
//! Runs a stage as a shell command. The job's artifacts and the earlier
//! results are passed through the environment:
//!
//! - `ARTIFLOW_JOB_ID`, `ARTIFLOW_JOB`, `ARTIFLOW_STAGE`
//! - `ARTIFLOW_SLOT_<SLOT>_NAME` and, for files on disk, `ARTIFLOW_SLOT_<SLOT>_PATH`
//! - `ARTIFLOW_PREVIOUS`: the preceding stage's payload as JSON
//! - `ARTIFLOW_RESULTS`: every earlier payload as a JSON object
//!
//! Standard output becomes the payload: parsed as JSON when it is valid
//! JSON, otherwise kept as a trimmed string.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use super::{ExecutorError, StageContext, StageExecutor, StageOutput};
use crate::errors::ArtiflowError;
use crate::pipeline::{Stage, Tool};

/// Shell executor
pub struct ShellExecutor;

impl ShellExecutor {
    /// Create a new shell executor
    pub fn new() -> Self {
        Self
    }

    fn env_name(slot: &str, field: &str) -> String {
        let slot: String = slot
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("ARTIFLOW_SLOT_{}_{}", slot, field)
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StageExecutor for ShellExecutor {
    async fn execute(
        &self,
        stage: &Stage,
        ctx: &StageContext,
        previous: Option<&StageOutput>,
    ) -> Result<StageOutput, ExecutorError> {
        let Tool::Shell { command, shell } = &stage.tool else {
            return Err(ExecutorError::new(format!(
                "Stage '{}' is not a shell stage",
                stage.name
            )));
        };

        let mut cmd = Command::new(shell);
        cmd.arg("-c").arg(command);
        cmd.stdin(Stdio::null());
        // Dropping the future on cancellation must not leave the child behind.
        cmd.kill_on_drop(true);

        cmd.env("ARTIFLOW_JOB_ID", ctx.job.job_id.to_string());
        cmd.env("ARTIFLOW_JOB", &ctx.job.job);
        cmd.env("ARTIFLOW_STAGE", &stage.name);

        for (slot, artifact) in &ctx.job.artifacts {
            cmd.env(Self::env_name(slot, "NAME"), &artifact.name);
            if let Some(ref path) = artifact.path {
                cmd.env(Self::env_name(slot, "PATH"), path);
            }
        }

        let previous_json = previous
            .map(|p| p.payload.to_string())
            .unwrap_or_else(|| "null".to_string());
        cmd.env("ARTIFLOW_PREVIOUS", previous_json);

        let results_json = serde_json::to_string(&ctx.results)
            .map_err(|e| ExecutorError::new(format!("Failed to encode results: {}", e)))?;
        cmd.env("ARTIFLOW_RESULTS", results_json);

        let output = cmd.output().await.map_err(|e| {
            ExecutorError::new(format!("Shell '{}' could not be started: {}", shell, e))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            let message = if stderr.is_empty() {
                format!("command exited with status {}", exit_code)
            } else {
                stderr
            };
            return Err(ExecutorError::new(message));
        }

        let payload = serde_json::from_str(&stdout)
            .unwrap_or_else(|_| serde_json::Value::String(stdout.clone()));

        Ok(StageOutput::new(payload))
    }

    async fn check_available(&self) -> Result<bool, ArtiflowError> {
        Ok(which::which("sh").is_ok())
    }

    fn validate_stage(&self, stage: &Stage) -> Result<(), ArtiflowError> {
        let Tool::Shell { command, .. } = &stage.tool else {
            return Err(ArtiflowError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Not a Shell stage".to_string(),
            });
        };

        if command.trim().is_empty() {
            return Err(ArtiflowError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Shell command is empty".to_string(),
            });
        }

        Ok(())
    }
}

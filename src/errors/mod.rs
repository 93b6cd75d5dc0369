// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Error types
//!
//! Every failure is contained to the slot or run it concerns. Input and
//! launch errors are returned to the caller with no state change; stage
//! failures surface through the run snapshot and can be turned back into
//! an error with [`RunSnapshot::into_result`](crate::pipeline::RunSnapshot::into_result).

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::inputs::GatingKey;

/// Result type for artiflow operations
pub type ArtiflowResult<T> = Result<T, ArtiflowError>;

/// Main error type for artiflow
#[derive(Error, Debug, Diagnostic)]
pub enum ArtiflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Input Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Artifact '{artifact}' rejected by slot '{slot}': {reason}")]
    #[diagnostic(
        code(artiflow::invalid_artifact),
        help("Slot '{slot}' accepts: {expected}")
    )]
    InvalidArtifact {
        slot: String,
        artifact: String,
        expected: String,
        reason: String,
    },

    #[error("Unknown input slot: {slot}")]
    #[diagnostic(
        code(artiflow::unknown_slot),
        help("Declare the slot under 'slots' in .artiflow.yaml")
    )]
    UnknownSlot { slot: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Launch Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Inputs {key} are not satisfied (missing: {})", .missing.join(", "))]
    #[diagnostic(code(artiflow::precondition_not_met))]
    PreconditionNotMet { key: GatingKey, missing: Vec<String> },

    #[error("A run for {key} is already in progress ({job_id})")]
    #[diagnostic(
        code(artiflow::already_running),
        help("Wait for the current run to finish or cancel it first")
    )]
    AlreadyRunning { key: GatingKey, job_id: Uuid },

    #[error("No job is gated on {key}")]
    #[diagnostic(code(artiflow::unknown_gating_key))]
    UnknownGatingKey { key: GatingKey },

    #[error("Job '{job}' is not defined")]
    #[diagnostic(code(artiflow::unknown_job))]
    UnknownJob { job: String },

    #[error("Executor not found for tool: {tool}")]
    #[diagnostic(
        code(artiflow::executor_not_found),
        help("Built-in executors: extract, simulated, shell. Register external ones on the ExecutorRegistry")
    )]
    ExecutorNotFound { tool: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Run Outcome Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Stage '{stage}' failed: {message}")]
    #[diagnostic(code(artiflow::stage_failed))]
    StageFailed {
        stage: String,
        stage_index: usize,
        message: String,
    },

    #[error("Run {job_id} was cancelled")]
    #[diagnostic(code(artiflow::cancelled))]
    Cancelled { job_id: Uuid },

    #[error("Run {job_id} was invalidated: input slot '{slot}' changed while it was in flight")]
    #[diagnostic(
        code(artiflow::invalidated),
        help("Provide the inputs again to start a fresh run")
    )]
    Invalidated { job_id: Uuid, slot: String },

    #[error("Run {job_id} has not finished")]
    #[diagnostic(code(artiflow::run_not_finished))]
    RunNotFinished { job_id: Uuid },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(artiflow::config_not_found),
        help("Create one with 'artiflow init' or pass --preset")
    )]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(artiflow::invalid_config))]
    InvalidConfig {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Stage '{stage}' is invalid: {reason}")]
    #[diagnostic(code(artiflow::invalid_stage))]
    InvalidStage { stage: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(artiflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(artiflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(artiflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON error: {message}")]
    #[diagnostic(code(artiflow::json_error))]
    Json { message: String },
}

impl From<std::io::Error> for ArtiflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for ArtiflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for ArtiflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl ArtiflowError {
    /// Whether the error came from offering an artifact to a slot
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidArtifact { .. } | Self::UnknownSlot { .. })
    }

    /// Whether the error was raised when trying to start a run
    pub fn is_launch(&self) -> bool {
        matches!(
            self,
            Self::PreconditionNotMet { .. }
                | Self::AlreadyRunning { .. }
                | Self::UnknownGatingKey { .. }
                | Self::UnknownJob { .. }
                | Self::ExecutorNotFound { .. }
        )
    }

    /// Whether the run ended because a user or an input change stopped it
    ///
    /// Observers use this to avoid reporting a stop as a failure.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::Invalidated { .. })
    }

    /// Build an invalid configuration error from validator output
    pub fn invalid_config(errors: &[String]) -> Self {
        let reason = match errors {
            [] => "unknown error".to_string(),
            [single] => single.clone(),
            [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
        };

        Self::InvalidConfig {
            reason,
            help: Some("Run 'artiflow validate' for the full report".into()),
        }
    }
}

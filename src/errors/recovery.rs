// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from errors.

use super::ArtiflowError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Pick a suggestion for an error, if one applies
    pub fn for_error(error: &ArtiflowError) -> Option<Self> {
        match error {
            ArtiflowError::PreconditionNotMet { missing, .. } => Some(Self::provide_inputs(missing)),
            ArtiflowError::InvalidArtifact { slot, expected, .. } => {
                Some(Self::fix_artifact_kind(slot, expected))
            }
            ArtiflowError::AlreadyRunning { .. } => Some(Self::wait_for_run()),
            ArtiflowError::ConfigNotFound { .. } => Some(Self::create_config()),
            ArtiflowError::Invalidated { slot, .. } => Some(Self::provide_inputs(&[slot.clone()])),
            _ => None,
        }
    }

    /// Suggest supplying the slots a job is waiting on
    pub fn provide_inputs(missing: &[String]) -> Self {
        Self {
            action: format!("Provide input for: {}", missing.join(", ")),
            steps: missing
                .iter()
                .map(|slot| format!("Slot '{}' is empty", slot))
                .collect(),
            commands: missing
                .iter()
                .map(|slot| format!("artiflow run --input {}=<path>", slot))
                .collect(),
        }
    }

    /// Suggest offering an artifact of the right kind
    pub fn fix_artifact_kind(slot: &str, expected: &str) -> Self {
        Self {
            action: format!("Offer a {} file to slot '{}'", expected, slot),
            steps: vec![
                "The artifact's declared kind must be accepted by the slot".into(),
                "The file extension must agree with the declared kind".into(),
            ],
            commands: vec![],
        }
    }

    /// Suggest waiting for or cancelling an in-flight run
    pub fn wait_for_run() -> Self {
        Self {
            action: "Wait for the in-flight run".into(),
            steps: vec![
                "Only one run may be in flight per input combination".into(),
                "Cancel the current run or wait until it reaches a terminal state".into(),
            ],
            commands: vec![],
        }
    }

    /// Suggest creating a configuration file
    pub fn create_config() -> Self {
        Self {
            action: "Create a pipeline configuration".into(),
            steps: vec![
                "No .artiflow.yaml found in current directory".into(),
                "Initialize one from a preset or use a preset directly".into(),
            ],
            commands: vec![
                "# Write the combined preset:".into(),
                "artiflow init".into(),
                "".into(),
                "# Or run without a file:".into(),
                "artiflow run --preset split --archive code.zip --capture traffic.pcap".into(),
            ],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}

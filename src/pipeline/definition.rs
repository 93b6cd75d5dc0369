// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Pipeline definition structures
//!
//! Defines the schema for .artiflow.yaml files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::inputs::{GatingKey, SlotSpec};

/// Pipeline configuration from .artiflow.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Configuration version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Configuration name
    pub name: String,

    /// Configuration description
    #[serde(default)]
    pub description: Option<String>,

    /// Declared input slots
    pub slots: Vec<SlotSpec>,

    /// Job classes, each gated on a set of slots
    pub jobs: Vec<JobDefinition>,
}

fn default_version() -> String {
    "1".to_string()
}

impl PipelineConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::ArtiflowError> {
        if !path.exists() {
            return Err(crate::ArtiflowError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::ArtiflowError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            }
        })?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, crate::ArtiflowError> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> Result<String, crate::ArtiflowError> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Get a job by name
    pub fn get_job(&self, name: &str) -> Option<&JobDefinition> {
        self.jobs.iter().find(|j| j.name == name)
    }

    /// Get the job gated on a key
    pub fn job_for_key(&self, key: &GatingKey) -> Option<&JobDefinition> {
        self.jobs.iter().find(|j| &j.requires == key)
    }

    /// Get all job names
    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.name.as_str()).collect()
    }
}

/// A job class: a gating key and the stages it runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Job name (must be unique within the configuration)
    pub name: String,

    /// Job description
    #[serde(default)]
    pub description: Option<String>,

    /// Slots that must hold an artifact before the job may launch
    pub requires: GatingKey,

    /// Launch automatically when the gate becomes satisfied
    #[serde(default = "default_true")]
    pub auto_start: bool,

    /// Empty the consumed slots when a run of this job fails
    #[serde(default)]
    pub clear_inputs_on_failure: bool,

    /// Stages in execution order
    pub stages: Vec<Stage>,
}

fn default_true() -> bool {
    true
}

impl JobDefinition {
    /// Get a stage by name
    pub fn get_stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Get all stage names
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}

/// A single pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name (must be unique within the job)
    pub name: String,

    /// Stage description
    #[serde(default)]
    pub description: Option<String>,

    /// Executor to run
    pub tool: Tool,

    /// What the stage reads: job slots and earlier stage outputs
    #[serde(default)]
    pub input: Vec<StageInput>,

    /// Label for what the stage produces
    #[serde(default)]
    pub output: Option<String>,
}

impl Stage {
    /// Get the executor name for this stage
    pub fn tool_name(&self) -> &str {
        match &self.tool {
            Tool::Extract { .. } => "extract",
            Tool::Simulated { .. } => "simulated",
            Tool::Shell { .. } => "shell",
            Tool::External { name } => name.as_str(),
        }
    }

    /// Slots this stage reads directly
    pub fn input_slots(&self) -> impl Iterator<Item = &str> {
        self.input.iter().filter_map(StageInput::references_slot)
    }

    /// Earlier stages whose output this stage reads
    pub fn input_stages(&self) -> impl Iterator<Item = &str> {
        self.input.iter().filter_map(StageInput::references_stage)
    }
}

/// Executor specification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Tool {
    /// Simulated archive extraction
    Extract {
        /// Directory the archive is "extracted" under
        #[serde(default = "default_extract_root")]
        root: PathBuf,

        /// Simulated latency
        #[serde(default)]
        delay_ms: u64,
    },

    /// Fixed payload after a delay
    Simulated {
        /// Simulated latency
        #[serde(default)]
        delay_ms: u64,

        /// Payload to return
        #[serde(default)]
        payload: serde_json::Value,

        /// Human-readable summary of the result
        #[serde(default)]
        summary: Option<String>,

        /// Fail with this message instead of returning the payload
        #[serde(default)]
        fail: Option<String>,
    },

    /// Shell command
    Shell {
        /// Shell command to run
        command: String,

        /// Shell to use (bash, sh, etc.)
        #[serde(default = "default_shell")]
        shell: String,
    },

    /// Executor registered by the host under a name
    External {
        /// Registered executor name
        name: String,
    },
}

fn default_extract_root() -> PathBuf {
    PathBuf::from("/extracted")
}

fn default_shell() -> String {
    "sh".to_string()
}

/// Input reference for a stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StageInput {
    /// Artifact from a job slot
    Slot {
        /// Slot name
        slot: String,
    },

    /// From an earlier stage's output
    FromStage {
        /// Name of the stage to get output from
        from_stage: String,
    },
}

impl StageInput {
    /// Check if this input references a slot
    pub fn references_slot(&self) -> Option<&str> {
        match self {
            Self::Slot { slot } => Some(slot),
            _ => None,
        }
    }

    /// Check if this input references another stage
    pub fn references_stage(&self) -> Option<&str> {
        match self {
            Self::FromStage { from_stage } => Some(from_stage),
            _ => None,
        }
    }
}

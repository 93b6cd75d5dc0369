// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Pipeline validation
//!
//! Validates a configuration before any launcher is built from it.

use std::collections::HashSet;

use crate::executors::ExecutorRegistry;
use crate::pipeline::{JobDefinition, PipelineConfig, Stage, Tool};

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline configuration
    pub fn validate(config: &PipelineConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.jobs.is_empty() {
            result.add_error("Configuration has no jobs defined");
        }

        // Check slots
        let mut slot_names = HashSet::new();
        for slot in &config.slots {
            if !slot_names.insert(slot.name.as_str()) {
                result.add_error(&format!("Duplicate slot name: '{}'", slot.name));
            }
            if slot.accepts.is_empty() {
                result.add_error(&format!("Slot '{}' accepts no artifact kinds", slot.name));
            }
        }

        // Check jobs
        let mut job_names = HashSet::new();
        let mut keys = HashSet::new();
        for job in &config.jobs {
            if !job_names.insert(job.name.as_str()) {
                result.add_error(&format!("Duplicate job name: '{}'", job.name));
            }
            // One registry entry per key, so two jobs cannot share one
            if !job.requires.is_empty() && !keys.insert(&job.requires) {
                result.add_error(&format!(
                    "Job '{}': gating key {} is already used by another job",
                    job.name, job.requires
                ));
            }

            Self::validate_job(job, &slot_names, &mut result);
        }

        let used: HashSet<&str> = config
            .jobs
            .iter()
            .flat_map(|j| j.requires.slots().iter().map(String::as_str))
            .collect();
        for slot in &config.slots {
            if !used.contains(slot.name.as_str()) {
                result.add_warning(&format!(
                    "Slot '{}' is not required by any job",
                    slot.name
                ));
            }
        }

        result
    }

    /// Validate a single job
    fn validate_job(job: &JobDefinition, slots: &HashSet<&str>, result: &mut ValidationResult) {
        if job.requires.is_empty() {
            result.add_error(&format!("Job '{}': requires no slots", job.name));
        }

        for slot in job.requires.slots() {
            if !slots.contains(slot.as_str()) {
                result.add_error(&format!(
                    "Job '{}': requires unknown slot '{}'",
                    job.name, slot
                ));
            }
        }

        if job.stages.is_empty() {
            result.add_error(&format!("Job '{}': has no stages defined", job.name));
        }

        let mut earlier: HashSet<&str> = HashSet::new();
        for (index, stage) in job.stages.iter().enumerate() {
            if earlier.contains(stage.name.as_str()) {
                result.add_error(&format!(
                    "Job '{}': duplicate stage name '{}'",
                    job.name, stage.name
                ));
            }

            Self::validate_stage(job, index, stage, &earlier, result);
            earlier.insert(stage.name.as_str());
        }
    }

    /// Validate a single stage
    ///
    /// A stage may only read slots of the job's gating key and outputs of
    /// stages before it.
    fn validate_stage(
        job: &JobDefinition,
        index: usize,
        stage: &Stage,
        earlier: &HashSet<&str>,
        result: &mut ValidationResult,
    ) {
        match &stage.tool {
            Tool::Shell { command, .. } if command.trim().is_empty() => {
                result.add_error(&format!("Stage '{}': Shell command is empty", stage.name));
            }
            Tool::External { name } if name.trim().is_empty() => {
                result.add_error(&format!(
                    "Stage '{}': External executor name is empty",
                    stage.name
                ));
            }
            Tool::Extract { .. } if stage.input_slots().next().is_none() => {
                result.add_warning(&format!(
                    "Stage '{}': Extract stage names no slot, 'archive' is assumed",
                    stage.name
                ));
            }
            _ => {}
        }

        for slot in stage.input_slots() {
            if !job.requires.contains(slot) {
                result.add_error(&format!(
                    "Stage '{}': Reads slot '{}' which is not in the job's gating key {}",
                    stage.name, slot, job.requires
                ));
            }
        }

        for from in stage.input_stages() {
            if from == stage.name {
                result.add_error(&format!("Stage '{}': Reads its own output", stage.name));
            } else if !earlier.contains(from) {
                let reason = if job.get_stage(from).is_some() {
                    "which runs later"
                } else {
                    "which does not exist"
                };
                result.add_error(&format!(
                    "Stage '{}': Input references stage '{}' {}",
                    stage.name, from, reason
                ));
            }
        }

        if index > 0 && stage.input_stages().next().is_none() {
            result.add_warning(&format!(
                "Stage '{}': Reads no earlier stage output but still waits for it",
                stage.name
            ));
        }
    }

    /// Check that every stage has an executor (runtime validation)
    pub fn validate_executors(config: &PipelineConfig, executors: &ExecutorRegistry) -> Vec<String> {
        let mut missing = Vec::new();

        for job in &config.jobs {
            for stage in &job.stages {
                if !executors.contains(stage.tool_name()) {
                    missing.push(format!(
                        "Job '{}', stage '{}': No executor registered for '{}'",
                        job.name,
                        stage.name,
                        stage.tool_name()
                    ));
                }
            }
        }

        missing
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::create_default_executors;

    fn config(yaml: &str) -> PipelineConfig {
        PipelineConfig::from_yaml(yaml).unwrap()
    }

    const SLOTS: &str = r#"
name: "test"
slots:
  - name: archive
    accepts: [archive]
  - name: capture
    accepts: [capture]
"#;

    #[test]
    fn test_validate_empty_config() {
        let result = PipelineValidator::validate(&config(&format!("{}jobs: []\n", SLOTS)));
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("no jobs"));
    }

    #[test]
    fn test_validate_duplicate_gating_keys() {
        let result = PipelineValidator::validate(&config(&format!(
            r#"{}jobs:
  - name: one
    requires: [archive]
    stages:
      - name: extract
        tool: {{ type: extract }}
        input: [{{ slot: archive }}]
  - name: two
    requires: [archive]
    stages:
      - name: extract
        tool: {{ type: extract }}
        input: [{{ slot: archive }}]
"#,
            SLOTS
        )));

        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.contains("already used")));
    }

    #[test]
    fn test_validate_hidden_slot_read() {
        let result = PipelineValidator::validate(&config(&format!(
            r#"{}jobs:
  - name: static
    requires: [archive]
    stages:
      - name: replay
        tool: {{ type: shell, command: "true" }}
        input: [{{ slot: capture }}]
"#,
            SLOTS
        )));

        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.contains("not in the job's gating key")));
    }

    #[test]
    fn test_validate_forward_reference() {
        let result = PipelineValidator::validate(&config(&format!(
            r#"{}jobs:
  - name: static
    requires: [archive]
    stages:
      - name: scan
        tool: {{ type: simulated }}
        input: [{{ from_stage: extract }}]
      - name: extract
        tool: {{ type: extract }}
        input: [{{ slot: archive }}]
"#,
            SLOTS
        )));

        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.contains("which runs later")));
    }

    #[test]
    fn test_validate_warnings_only() {
        let result = PipelineValidator::validate(&config(&format!(
            r#"{}jobs:
  - name: static
    requires: [archive]
    stages:
      - name: extract
        tool: {{ type: extract }}
        input: [{{ slot: archive }}]
      - name: scan
        tool: {{ type: simulated }}
"#,
            SLOTS
        )));

        assert!(result.is_valid());
        assert!(result.has_warnings());
        assert!(result.warnings.iter().any(|w| w.contains("'capture' is not required")));
        assert!(result.warnings.iter().any(|w| w.contains("Reads no earlier stage output")));
    }

    #[test]
    fn test_validate_executors() {
        let cfg = config(&format!(
            r#"{}jobs:
  - name: static
    requires: [archive]
    stages:
      - name: sandbox
        tool: {{ type: external, name: cuckoo }}
        input: [{{ slot: archive }}]
"#,
            SLOTS
        ));

        let missing = PipelineValidator::validate_executors(&cfg, &create_default_executors());
        assert_eq!(missing.len(), 1);
        assert!(missing[0].contains("cuckoo"));
    }
}

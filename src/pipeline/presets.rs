// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Built-in pipeline presets
//!
//! `combined` gates one three-stage job on the archive alone. `split`
//! runs static analysis as soon as an archive arrives and holds the
//! behavioral job back until a capture is provided too.

use super::PipelineConfig;
use crate::errors::ArtiflowResult;

/// A built-in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Combined,
    Split,
}

impl Preset {
    pub const ALL: [Preset; 2] = [Preset::Combined, Preset::Split];

    /// Short description for help output
    pub fn description(&self) -> &'static str {
        match self {
            Self::Combined => "Extract, static and behavioral analysis gated on an archive",
            Self::Split => "Static job on the archive, behavioral job on archive + capture",
        }
    }

    /// Render the preset as `.artiflow.yaml` content
    pub fn yaml(&self, name: &str) -> String {
        match self {
            Self::Combined => combined_template(name),
            Self::Split => split_template(name),
        }
    }

    /// Parse the preset into a configuration
    pub fn config(&self) -> ArtiflowResult<PipelineConfig> {
        PipelineConfig::from_yaml(&self.yaml(&self.to_string()))
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Combined => write!(f, "combined"),
            Self::Split => write!(f, "split"),
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "combined" => Ok(Self::Combined),
            "split" => Ok(Self::Split),
            other => Err(format!(
                "Unknown preset '{}' (available: combined, split)",
                other
            )),
        }
    }
}

const STATIC_ANALYSIS: &str = r#"      - name: static_analysis
        description: "Static code analysis"
        tool:
          type: simulated
          delay_ms: 2000
          summary: "2 issues, complexity 42"
          payload:
            issues:
              - type: warning
                message: "Unused variable detected"
                location: "main.js:23"
              - type: error
                message: "Potential memory leak"
                location: "helper.js:45"
            metrics:
              complexity: 42
              lines: 1024
              functions: 58
        input:
          - from_stage: extract
        output: report"#;

const BEHAVIORAL_ANALYSIS: &str = r#"        description: "Behavioral analysis"
        tool:
          type: simulated
          delay_ms: 2500
          summary: "2 behaviors, 2 recommendations"
          payload:
            behaviors:
              - id: B001
                description: "Network communication pattern detected"
                severity: medium
              - id: B002
                description: "File system access pattern"
                severity: low
            recommendations:
              - "Implement proper error handling for network requests"
              - "Review file system permissions""#;

const EXTRACT: &str = r#"      - name: extract
        description: "Unpack the uploaded archive"
        tool:
          type: extract
          root: /extracted
          delay_ms: 1500
        input:
          - slot: archive
        output: path"#;

fn combined_template(name: &str) -> String {
    format!(
        r#"# artiflow pipeline configuration
version: "1"
name: "{name}"
description: "Archive analysis in one gated job"

slots:
  - name: archive
    description: "Source code archive"
    accepts: [archive]

jobs:
  - name: analyze
    requires: [archive]
    stages:
{extract}
{static_analysis}
      - name: behavioral_analysis
{behavioral}
        input:
          - from_stage: extract
          - from_stage: static_analysis
        output: behaviors
"#,
        name = name,
        extract = EXTRACT,
        static_analysis = STATIC_ANALYSIS,
        behavioral = BEHAVIORAL_ANALYSIS,
    )
}

fn split_template(name: &str) -> String {
    format!(
        r#"# artiflow pipeline configuration
version: "1"
name: "{name}"
description: "Static and behavioral analysis as independently gated jobs"

slots:
  - name: archive
    description: "Source code archive"
    accepts: [archive]
  - name: capture
    description: "Network capture recorded while the code ran"
    accepts: [capture]

jobs:
  - name: static
    requires: [archive]
    stages:
{extract}
{static_analysis}

  - name: behavioral
    requires: [archive, capture]
    stages:
{extract}
{static_analysis}
      - name: behavioral_analysis
{behavioral}
        input:
          - from_stage: static_analysis
          - slot: capture
        output: behaviors
"#,
        name = name,
        extract = EXTRACT,
        static_analysis = STATIC_ANALYSIS,
        behavioral = BEHAVIORAL_ANALYSIS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::GatingKey;
    use crate::pipeline::{PipelineValidator, Tool};

    #[test]
    fn test_presets_are_valid() {
        for preset in Preset::ALL {
            let config = preset.config().unwrap();
            let result = PipelineValidator::validate(&config);
            assert!(result.is_valid(), "{}: {:?}", preset, result.errors);
            assert!(!result.has_warnings(), "{}: {:?}", preset, result.warnings);
        }
    }

    #[test]
    fn test_combined_shape() {
        let config = Preset::Combined.config().unwrap();
        assert_eq!(config.name, "combined");
        assert_eq!(config.job_names(), vec!["analyze"]);

        let job = config.job_for_key(&GatingKey::new(["archive"])).unwrap();
        assert_eq!(
            job.stage_names(),
            vec!["extract", "static_analysis", "behavioral_analysis"]
        );

        match &job.stages[1].tool {
            Tool::Simulated { delay_ms, payload, .. } => {
                assert_eq!(*delay_ms, 2000);
                assert_eq!(payload["metrics"]["complexity"], 42);
            }
            other => panic!("unexpected tool {:?}", other),
        }
    }

    #[test]
    fn test_split_gates_behavioral_on_capture() {
        let config = Preset::Split.config().unwrap();
        let behavioral = config
            .job_for_key(&GatingKey::new(["capture", "archive"]))
            .unwrap();
        assert_eq!(behavioral.name, "behavioral");
        assert_eq!(behavioral.stages[2].input_slots().collect::<Vec<_>>(), vec!["capture"]);

        assert!(config.job_for_key(&GatingKey::new(["archive"])).is_some());
    }

    #[test]
    fn test_preset_from_str() {
        assert_eq!("split".parse::<Preset>().unwrap(), Preset::Split);
        assert!("bogus".parse::<Preset>().is_err());
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Pipeline definitions, runs and the coordinator that drives them
//!
//! This module defines the configuration schema (slots, jobs, stages), the
//! observable state of a run, and the sequential stage driver.

mod coordinator;
mod definition;
mod events;
mod presets;
mod run;
mod validation;

pub use coordinator::{Coordinator, StageBinding};
pub use definition::*;
pub use events::{EventHub, RunEvent, DEFAULT_EVENT_CAPACITY};
pub use presets::Preset;
pub use run::{PipelineRun, RunHandle, RunSnapshot, RunStatus, StageError, StageSnapshot, StageStatus};
pub use validation::{PipelineValidator, ValidationResult};

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! # artiflow - Input-Gated Analysis Pipeline
//!
//! `artiflow` runs submitted artifacts (an archive and, optionally, a
//! network capture) through dependent analysis stages. A job only starts
//! once every input slot it needs holds an artifact, at most one run is in
//! flight per set of inputs, and changing an input under a running job
//! invalidates it.
//!
//! ## Features
//!
//! - **Input gating** - Jobs launch when their slots are filled, not before
//! - **Sequential stages** - Each stage receives its predecessor's output
//! - **Observable runs** - Poll snapshots or subscribe to every transition
//! - **Pluggable executors** - Built-in simulated and shell executors, or your own
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a configuration from a preset
//! artiflow init --preset split
//!
//! # Provide inputs; each job starts once its inputs are present
//! artiflow run --archive code.zip --capture traffic.pcap
//! ```
//!
//! ## Library use
//!
//! ```no_run
//! use artiflow::{create_default_executors, Artifact, ArtifactKind, Launcher, Preset};
//!
//! # async fn demo() -> artiflow::ArtiflowResult<()> {
//! let launcher = Launcher::new(Preset::Combined.config()?, create_default_executors())?;
//! let runs = launcher
//!     .provide_artifact("archive", Artifact::new("code.zip", 1024, ArtifactKind::Archive))
//!     .await?;
//! let results = runs[0].wait().await.into_result()?;
//! assert!(results.contains_key("behavioral_analysis"));
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod errors;
pub mod executors;
pub mod inputs;
pub mod launcher;
pub mod pipeline;
pub mod utils;

// Re-export commonly used types
pub use errors::{ArtiflowError, ArtiflowResult};
pub use executors::{create_default_executors, ExecutorRegistry, StageExecutor, StageOutput};
pub use inputs::{Artifact, ArtifactKind, GatingKey, InputRegistry};
pub use launcher::Launcher;
pub use pipeline::{PipelineConfig, Preset, RunHandle, RunSnapshot, RunStatus, Stage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

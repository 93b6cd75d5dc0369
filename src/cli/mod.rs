// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for artiflow.

pub mod init;
pub mod run;
pub mod validate;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use crate::errors::{ArtiflowError, ArtiflowResult, RecoverySuggestion};
use crate::pipeline::{PipelineConfig, Preset};

/// Default configuration file name
pub const DEFAULT_CONFIG: &str = ".artiflow.yaml";

/// Input-gated analysis pipeline
///
/// Provide artifacts to named slots; jobs start once every slot they need
/// is filled.
#[derive(Parser, Debug)]
#[clap(
    name = "artiflow",
    version,
    about = "Input-gated, staged analysis pipeline for archives and network captures",
    long_about = None,
    after_help = "Examples:\n\
        artiflow init                                  Write .artiflow.yaml from the combined preset\n\
        artiflow run --archive code.zip                Analyze an archive\n\
        artiflow run --preset split --archive code.zip --capture traffic.pcap\n\
        artiflow validate                              Check .artiflow.yaml\n\n\
        See 'artiflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a pipeline configuration from a preset
    Init {
        /// Pipeline name (defaults to current directory name)
        name: Option<String>,

        /// Preset to start from (combined, split)
        #[clap(short, long, default_value = "combined")]
        preset: Preset,

        /// Overwrite an existing configuration
        #[clap(short, long)]
        force: bool,
    },

    /// Provide artifacts and run the jobs they unlock
    Run(RunArgs),

    /// Validate pipeline configuration
    Validate {
        #[clap(flatten)]
        source: ConfigSource,
    },
}

/// Where the pipeline configuration comes from
#[derive(Args, Debug, Clone)]
pub struct ConfigSource {
    /// Pipeline configuration file
    #[clap(short, long, env = "ARTIFLOW_CONFIG", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Use a built-in preset instead of the file (combined, split)
    #[clap(long)]
    pub preset: Option<Preset>,
}

impl ConfigSource {
    /// Load the preset or the configuration file
    pub fn load(&self) -> ArtiflowResult<PipelineConfig> {
        match self.preset {
            Some(preset) => preset.config(),
            None => PipelineConfig::from_file(&self.config),
        }
    }

    /// What to call the source in messages
    pub fn describe(&self) -> String {
        match self.preset {
            Some(preset) => format!("preset '{}'", preset),
            None => self.config.display().to_string(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[clap(flatten)]
    pub source: ConfigSource,

    /// Archive for the 'archive' slot
    #[clap(long, value_name = "PATH")]
    pub archive: Option<PathBuf>,

    /// Network capture for the 'capture' slot
    #[clap(long, value_name = "PATH")]
    pub capture: Option<PathBuf>,

    /// Artifact for any slot, as SLOT=PATH (repeatable)
    #[clap(short, long = "input", value_name = "SLOT=PATH")]
    pub inputs: Vec<SlotAssignment>,

    /// Only run this job
    #[clap(short, long)]
    pub job: Option<String>,

    /// Output format
    #[clap(short, long, default_value = "text")]
    pub format: OutputFormat,
}

impl RunArgs {
    /// Every slot assignment, shortcuts first
    pub fn assignments(&self) -> Vec<SlotAssignment> {
        let shortcuts = [("archive", &self.archive), ("capture", &self.capture)];

        shortcuts
            .into_iter()
            .filter_map(|(slot, path)| {
                path.as_ref().map(|path| SlotAssignment {
                    slot: slot.to_string(),
                    path: path.clone(),
                })
            })
            .chain(self.inputs.iter().cloned())
            .collect()
    }
}

/// A `SLOT=PATH` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAssignment {
    pub slot: String,
    pub path: PathBuf,
}

impl std::str::FromStr for SlotAssignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((slot, path)) if !slot.trim().is_empty() && !path.is_empty() => Ok(Self {
                slot: slot.trim().to_string(),
                path: PathBuf::from(path),
            }),
            _ => Err(format!("Expected SLOT=PATH, got '{}'", s)),
        }
    }
}

/// Output format for run results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Print a recovery hint for an error, then hand it to miette
pub fn report(error: ArtiflowError) -> miette::Report {
    if let Some(suggestion) = RecoverySuggestion::for_error(&error) {
        eprintln!();
        eprint!("{}", suggestion.to_string().cyan());
    }
    miette::Report::new(error)
}

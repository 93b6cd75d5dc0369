// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Run registry
//!
//! Maps each gating key to its latest run and remembers which gates have
//! already fired since they last became satisfied.

use std::collections::{HashMap, HashSet};

use crate::inputs::GatingKey;
use crate::pipeline::PipelineRun;

#[derive(Debug, Default)]
pub(crate) struct RunRegistry {
    /// Latest run per key; terminal runs stay readable until cleared
    entries: HashMap<GatingKey, PipelineRun>,

    /// Keys whose current satisfaction has already produced a run
    fired: HashSet<GatingKey>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest run for a key, terminal or not
    pub fn latest(&self, key: &GatingKey) -> Option<&PipelineRun> {
        self.entries.get(key)
    }

    /// The non-terminal run occupying a key
    pub fn active(&self, key: &GatingKey) -> Option<&PipelineRun> {
        self.entries.get(key).filter(|run| !run.is_terminal())
    }

    /// Record a run; it replaces any terminal predecessor
    pub fn insert(&mut self, run: PipelineRun) {
        self.entries.insert(run.key().clone(), run);
    }

    /// Drop a key's entry if its run is terminal
    pub fn clear(&mut self, key: &GatingKey) -> bool {
        match self.entries.get(key) {
            Some(run) if run.is_terminal() => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Non-terminal runs whose key contains a slot
    pub fn dependents<'a>(&'a self, slot: &'a str) -> impl Iterator<Item = &'a PipelineRun> + 'a {
        self.entries
            .values()
            .filter(move |run| run.key().contains(slot) && !run.is_terminal())
    }

    /// All non-terminal runs
    pub fn running(&self) -> impl Iterator<Item = &PipelineRun> {
        self.entries.values().filter(|run| !run.is_terminal())
    }

    pub fn has_fired(&self, key: &GatingKey) -> bool {
        self.fired.contains(key)
    }

    pub fn mark_fired(&mut self, key: &GatingKey) {
        self.fired.insert(key.clone());
    }

    /// Re-arm every gate that includes a slot
    pub fn rearm(&mut self, slot: &str) {
        self.fired.retain(|key| !key.contains(slot));
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Input registry
//!
//! Holds the artifact currently selected for each named slot. The registry
//! only validates and stores; deciding whether work should start is the
//! launcher's job.

mod artifact;
mod gating;

pub use artifact::{Artifact, ArtifactKind};
pub use gating::GatingKey;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{ArtiflowError, ArtiflowResult};

/// Declaration of a named input slot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotSpec {
    /// Slot name (unique within a configuration)
    pub name: String,

    /// Slot description
    #[serde(default)]
    pub description: Option<String>,

    /// Artifact kinds the slot accepts
    pub accepts: Vec<ArtifactKind>,
}

impl SlotSpec {
    pub fn new(name: impl Into<String>, accepts: impl IntoIterator<Item = ArtifactKind>) -> Self {
        Self {
            name: name.into(),
            description: None,
            accepts: accepts.into_iter().collect(),
        }
    }

    /// Check an artifact against the slot's kind predicate
    ///
    /// Returns the rejection reason on failure.
    pub fn check(&self, artifact: &Artifact) -> Result<(), String> {
        if !self.accepts.contains(&artifact.kind) {
            return Err(format!("declared kind '{}' is not accepted", artifact.kind));
        }

        if let Some(named) = ArtifactKind::from_file_name(&artifact.name) {
            if named != artifact.kind {
                return Err(format!(
                    "file name suggests '{}' but kind is declared as '{}'",
                    named, artifact.kind
                ));
            }
        }

        Ok(())
    }

    /// Accepted kinds, for messages
    pub fn accepted_kinds(&self) -> String {
        self.accepts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A slot and its current artifact
#[derive(Debug, Clone)]
pub struct InputSlot {
    pub spec: SlotSpec,
    pub artifact: Option<Artifact>,
}

/// Currently selected artifacts per slot
#[derive(Debug, Clone, Default)]
pub struct InputRegistry {
    slots: IndexMap<String, InputSlot>,
}

impl InputRegistry {
    /// Create a registry with every slot empty
    pub fn new(specs: impl IntoIterator<Item = SlotSpec>) -> Self {
        let slots = specs
            .into_iter()
            .map(|spec| {
                (
                    spec.name.clone(),
                    InputSlot {
                        spec,
                        artifact: None,
                    },
                )
            })
            .collect();

        Self { slots }
    }

    /// Store an artifact in a slot, returning the artifact it replaced
    ///
    /// A rejected artifact leaves the slot unchanged.
    pub fn set_slot(&mut self, name: &str, artifact: Artifact) -> ArtiflowResult<Option<Artifact>> {
        let slot = self
            .slots
            .get_mut(name)
            .ok_or_else(|| ArtiflowError::UnknownSlot {
                slot: name.to_string(),
            })?;

        slot.spec
            .check(&artifact)
            .map_err(|reason| ArtiflowError::InvalidArtifact {
                slot: name.to_string(),
                artifact: artifact.name.clone(),
                expected: slot.spec.accepted_kinds(),
                reason,
            })?;

        Ok(slot.artifact.replace(artifact))
    }

    /// Empty a slot, returning what it held
    pub fn clear_slot(&mut self, name: &str) -> Option<Artifact> {
        self.slots.get_mut(name).and_then(|slot| slot.artifact.take())
    }

    /// Artifact currently in a slot
    pub fn get(&self, name: &str) -> Option<&Artifact> {
        self.slots.get(name).and_then(|slot| slot.artifact.as_ref())
    }

    /// Whether a slot is declared
    pub fn contains_slot(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// True iff every slot in the key holds an artifact
    pub fn is_satisfied(&self, key: &GatingKey) -> bool {
        key.slots().iter().all(|slot| self.get(slot).is_some())
    }

    /// Slots in the key that are still empty
    pub fn missing(&self, key: &GatingKey) -> Vec<String> {
        key.slots()
            .iter()
            .filter(|slot| self.get(slot).is_none())
            .cloned()
            .collect()
    }

    /// Snapshot the artifacts for a key, if it is satisfied
    pub fn capture(&self, key: &GatingKey) -> Option<IndexMap<String, Artifact>> {
        key.slots()
            .iter()
            .map(|slot| self.get(slot).map(|a| (slot.clone(), a.clone())))
            .collect()
    }

    /// Iterate over all slots in declaration order
    pub fn slots(&self) -> impl Iterator<Item = &InputSlot> {
        self.slots.values()
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Gating keys

use serde::{Deserialize, Serialize};

/// The set of slot names a job class needs before it may launch
///
/// Slot names are kept sorted and de-duplicated, so two keys naming the
/// same slots in a different order are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct GatingKey(Vec<String>);

impl GatingKey {
    /// Build a key from slot names
    pub fn new<I, S>(slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut slots: Vec<String> = slots.into_iter().map(Into::into).collect();
        slots.sort();
        slots.dedup();
        Self(slots)
    }

    /// Slot names in the key
    pub fn slots(&self) -> &[String] {
        &self.0
    }

    /// Whether the key names a slot
    pub fn contains(&self, slot: &str) -> bool {
        self.0.iter().any(|s| s == slot)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for GatingKey {
    fn from(slots: Vec<String>) -> Self {
        Self::new(slots)
    }
}

impl From<GatingKey> for Vec<String> {
    fn from(key: GatingKey) -> Self {
        key.0
    }
}

impl std::fmt::Display for GatingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.0.join(", "))
    }
}

impl std::str::FromStr for GatingKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = Self::new(
            s.split(',')
                .map(str::trim)
                .filter(|slot| !slot.is_empty()),
        );

        if key.is_empty() {
            Err(format!("Gating key '{}' names no slots", s))
        } else {
            Ok(key)
        }
    }
}

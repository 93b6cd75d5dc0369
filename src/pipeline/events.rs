// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Run change notifications

use tokio::sync::broadcast;

use super::RunSnapshot;

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Emitted on every run transition
#[derive(Debug, Clone)]
pub struct RunEvent {
    /// Snapshot taken right after the transition
    pub snapshot: RunSnapshot,
}

/// Fan-out of run events to any number of observers
///
/// Slow observers lag and miss events rather than block runs.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<RunEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Shared, ordered record of every call made into the fakes

use std::sync::{Arc, Mutex, MutexGuard};

use storage_contracts::{GeometryConstraint, RecordKind};
use storage_types::{FilesystemType, SectorRange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open {
        device: String,
    },
    Release {
        device: String,
    },
    AddPartition {
        device: String,
        kind: RecordKind,
        constraint: GeometryConstraint,
    },
    DeletePartition {
        device: String,
        number: u32,
    },
    SetGeometry {
        device: String,
        number: u32,
        constraint: GeometryConstraint,
    },
    SetType {
        device: String,
        number: u32,
        filesystem: FilesystemType,
    },
    SetName {
        device: String,
        number: u32,
        name: String,
    },
    NewTable {
        device: String,
        label: String,
    },
    Commit {
        device: String,
        succeeded: bool,
    },
    SyncKernel {
        device: String,
    },
    FsCheck {
        path: String,
    },
    FsCreate {
        path: String,
        filesystem: FilesystemType,
    },
    FsResize {
        path: String,
        target: SectorRange,
        fill: bool,
        /// Range the table backend had committed for the entry at call time
        committed: Option<SectorRange>,
    },
    BlockWrite {
        path: String,
        offset: u64,
        length: u64,
    },
    CloseMapping {
        mapping: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct CallLedger {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Call>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, call: Call) {
        tracing::trace!("fake call: {call:?}");
        self.guard().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.guard().clone()
    }

    pub fn clear(&self) {
        self.guard().clear();
    }

    /// Calls that changed on-disk state or were meant to
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| {
                !matches!(
                    call,
                    Call::Open { .. } | Call::Release { .. } | Call::SyncKernel { .. }
                )
            })
            .collect()
    }

    /// Position of the first call matching `predicate`
    pub fn position(&self, predicate: impl Fn(&Call) -> bool) -> Option<usize> {
        self.guard().iter().position(predicate)
    }

    pub fn geometry_requests(&self) -> Vec<GeometryConstraint> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SetGeometry { constraint, .. } => Some(constraint),
                _ => None,
            })
            .collect()
    }

    pub fn commits(&self) -> Vec<bool> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Commit { succeeded, .. } => Some(succeeded),
                _ => None,
            })
            .collect()
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Scriptable filesystem tool

use std::collections::BTreeSet;

use storage_contracts::{FilesystemTool, StorageError, StorageErrorKind};
use storage_types::{FilesystemType, Partition, SectorUsage};

use crate::ledger::{Call, CallLedger};
use crate::table::FakeTableBackend;

#[derive(Debug, Clone)]
pub struct FakeFsTool {
    filesystem: FilesystemType,
    ledger: CallLedger,
    table: Option<FakeTableBackend>,
    label: Option<String>,
    uuid: Option<String>,
    usage: Option<SectorUsage>,
    busy: bool,
    min_size: u64,
    failing: BTreeSet<&'static str>,
}

impl FakeFsTool {
    pub fn new(filesystem: FilesystemType, ledger: CallLedger) -> Self {
        Self {
            filesystem,
            ledger,
            table: None,
            label: None,
            uuid: None,
            usage: None,
            busy: false,
            min_size: 0,
            failing: BTreeSet::new(),
        }
    }

    /// Report the backend's committed range with every resize call
    pub fn observing(mut self, table: FakeTableBackend) -> Self {
        self.table = Some(table);
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_uuid(mut self, uuid: &str) -> Self {
        self.uuid = Some(uuid.to_string());
        self
    }

    pub fn with_usage(mut self, used: u64, unused: u64) -> Self {
        self.usage = Some(SectorUsage { used, unused });
        self
    }

    pub fn busy(mut self) -> Self {
        self.busy = true;
        self
    }

    pub fn with_min_size(mut self, bytes: u64) -> Self {
        self.min_size = bytes;
        self
    }

    /// Make `operation` ("check", "create" or "resize") fail
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    fn outcome(&self, operation: &'static str, partition: &Partition) -> Result<(), StorageError> {
        if self.failing.contains(operation) {
            return Err(StorageError::new(
                StorageErrorKind::FilesystemOperationFailed,
                format!("{operation} failed on {}", partition.path),
            ));
        }
        Ok(())
    }
}

impl FilesystemTool for FakeFsTool {
    fn filesystem(&self) -> FilesystemType {
        self.filesystem
    }

    fn min_size(&self) -> u64 {
        self.min_size
    }

    fn is_busy(&self, _partition: &Partition) -> Result<bool, StorageError> {
        Ok(self.busy)
    }

    fn read_label(&self, _partition: &Partition) -> Result<Option<String>, StorageError> {
        Ok(self.label.clone())
    }

    fn read_uuid(&self, _partition: &Partition) -> Result<Option<String>, StorageError> {
        Ok(self.uuid.clone())
    }

    fn read_usage(&self, _partition: &Partition) -> Result<Option<SectorUsage>, StorageError> {
        Ok(self.usage)
    }

    fn check_repair(&self, partition: &Partition) -> Result<(), StorageError> {
        self.ledger.record(Call::FsCheck {
            path: partition.path.clone(),
        });
        self.outcome("check", partition)
    }

    fn create(&self, partition: &Partition, _label: Option<&str>) -> Result<(), StorageError> {
        self.ledger.record(Call::FsCreate {
            path: partition.path.clone(),
            filesystem: self.filesystem,
        });
        self.outcome("create", partition)
    }

    fn resize(&self, partition: &Partition, fill: bool) -> Result<(), StorageError> {
        let committed = self
            .table
            .as_ref()
            .and_then(|table| table.committed_range(&partition.path));
        self.ledger.record(Call::FsResize {
            path: partition.path.clone(),
            target: partition.range(),
            fill,
            committed,
        });
        self.outcome("resize", partition)
    }
}

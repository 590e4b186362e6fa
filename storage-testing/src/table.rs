// SPDX-License-Identifier: GPL-3.0-only

//! Partition-table backend kept entirely in memory

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use storage_contracts::{
    DeviceInfo, GeometryConstraint, PartitionRecord, RecordKind, StorageError, StorageErrorKind,
    TableBackend, TableSession,
};
use storage_types::{FilesystemType, Geometry, SectorRange};

use crate::ledger::{Call, CallLedger};

#[derive(Debug, Clone)]
struct FakeTable {
    info: DeviceInfo,
    label: Option<String>,
    records: Vec<PartitionRecord>,
}

#[derive(Debug, Default)]
struct BackendState {
    tables: BTreeMap<String, FakeTable>,
    failing_commits: usize,
    fail_all_commits: bool,
}

/// Staged and committed tables shared by every session
#[derive(Debug, Clone, Default)]
pub struct FakeTableBackend {
    state: Arc<Mutex<BackendState>>,
    ledger: CallLedger,
}

/// Device node name for partition `number` of `device`
pub fn partition_path(device: &str, number: u32) -> String {
    if device.ends_with(|c: char| c.is_ascii_digit()) {
        format!("{device}p{number}")
    } else {
        format!("{device}{number}")
    }
}

pub fn record(
    device: &str,
    number: u32,
    kind: RecordKind,
    start: u64,
    end: u64,
) -> PartitionRecord {
    PartitionRecord {
        number,
        kind,
        range: SectorRange::new(start, end),
        path: partition_path(device, number),
        fs_hint: None,
        name: None,
        flags: Vec::new(),
        busy: false,
    }
}

fn max_primaries(label: Option<&str>) -> u32 {
    match label {
        Some("gpt") => 128,
        Some("dos") | Some("msdos") => 4,
        _ => 1,
    }
}

impl FakeTableBackend {
    pub fn new(ledger: CallLedger) -> Self {
        Self {
            state: Arc::default(),
            ledger,
        }
    }

    fn guard(&self) -> MutexGuard<'_, BackendState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a device with `length` sectors and an optional table
    pub fn add_device(
        &self,
        path: &str,
        sector_size: u64,
        length: u64,
        label: Option<&str>,
        records: Vec<PartitionRecord>,
    ) {
        let info = DeviceInfo {
            path: path.to_string(),
            model: "Fake Disk".to_string(),
            serial: None,
            sector_size,
            length,
            geometry: Geometry {
                heads: 255,
                sectors: 63,
                cylinders: length / (255 * 63),
                cylinder_size: 255 * 63,
            },
        };
        self.guard().tables.insert(
            path.to_string(),
            FakeTable {
                info,
                label: label.map(str::to_string),
                records,
            },
        );
    }

    /// Fail the next `count` commits
    pub fn fail_next_commits(&self, count: usize) {
        self.guard().failing_commits = count;
    }

    pub fn fail_all_commits(&self) {
        self.guard().fail_all_commits = true;
    }

    pub fn committed_records(&self, device: &str) -> Vec<PartitionRecord> {
        self.guard()
            .tables
            .get(device)
            .map(|table| table.records.clone())
            .unwrap_or_default()
    }

    pub fn committed_label(&self, device: &str) -> Option<String> {
        self.guard()
            .tables
            .get(device)
            .and_then(|table| table.label.clone())
    }

    /// Committed range of the entry whose node is `path`
    pub fn committed_range(&self, path: &str) -> Option<SectorRange> {
        self.guard().tables.values().find_map(|table| {
            table
                .records
                .iter()
                .find(|record| record.path == path)
                .map(|record| record.range)
        })
    }

    pub fn ledger(&self) -> &CallLedger {
        &self.ledger
    }
}

impl TableBackend for FakeTableBackend {
    fn list_devices(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.guard().tables.keys().cloned().collect())
    }

    fn device_info(&self, path: &str) -> Result<DeviceInfo, StorageError> {
        self.guard()
            .tables
            .get(path)
            .map(|table| table.info.clone())
            .ok_or_else(|| {
                StorageError::new(StorageErrorKind::DeviceUnreadable, format!("no device {path}"))
            })
    }

    fn open(&self, path: &str) -> Result<Box<dyn TableSession>, StorageError> {
        let staged = self.guard().tables.get(path).cloned().ok_or_else(|| {
            StorageError::new(StorageErrorKind::DeviceUnreadable, format!("no device {path}"))
        })?;
        self.ledger.record(Call::Open {
            device: path.to_string(),
        });
        Ok(Box::new(FakeSession {
            backend: self.clone(),
            device: path.to_string(),
            staged,
        }))
    }
}

struct FakeSession {
    backend: FakeTableBackend,
    device: String,
    staged: FakeTable,
}

impl FakeSession {
    fn record_mut(&mut self, number: u32) -> Result<&mut PartitionRecord, StorageError> {
        let device = self.device.clone();
        self.staged
            .records
            .iter_mut()
            .find(|record| record.number == number)
            .ok_or_else(|| {
                StorageError::new(
                    StorageErrorKind::NotFound,
                    format!("partition {number} not found on {device}"),
                )
            })
    }

    fn overlaps_other(&self, number: u32, kind: RecordKind, range: SectorRange) -> bool {
        self.staged.records.iter().any(|record| {
            if record.number == number || !record.range.overlaps(&range) {
                return false;
            }
            // Logicals live inside the extended entry.
            let nested = matches!(
                (record.kind, kind),
                (RecordKind::Extended, RecordKind::Logical)
                    | (RecordKind::Logical, RecordKind::Extended)
            );
            !nested
        })
    }

    fn place(
        &self,
        number: u32,
        kind: RecordKind,
        constraint: GeometryConstraint,
    ) -> Result<SectorRange, StorageError> {
        let range = constraint.bounds();
        let last = self.staged.info.length.saturating_sub(1);
        if !range.is_valid() || range.end > last {
            return Err(StorageError::new(
                StorageErrorKind::ConstraintViolation,
                format!("{range} does not fit on {}", self.device),
            ));
        }
        if let GeometryConstraint::Any { min_sectors, .. } = constraint
            && range.length() < min_sectors
        {
            return Err(StorageError::new(
                StorageErrorKind::ConstraintViolation,
                format!("{range} is smaller than {min_sectors} sectors"),
            ));
        }
        if self.overlaps_other(number, kind, range) {
            return Err(StorageError::new(
                StorageErrorKind::ConstraintViolation,
                format!("{range} overlaps another partition on {}", self.device),
            ));
        }
        Ok(range)
    }
}

impl TableSession for FakeSession {
    fn device_path(&self) -> &str {
        &self.device
    }

    fn table_label(&self) -> Option<String> {
        self.staged.label.clone()
    }

    fn max_primaries(&self) -> u32 {
        max_primaries(self.staged.label.as_deref())
    }

    fn max_name_length(&self) -> Option<usize> {
        (self.staged.label.as_deref() == Some("gpt")).then_some(36)
    }

    fn records(&self) -> Vec<PartitionRecord> {
        self.staged.records.clone()
    }

    fn add_partition(
        &mut self,
        kind: RecordKind,
        constraint: GeometryConstraint,
    ) -> Result<PartitionRecord, StorageError> {
        self.backend.ledger.record(Call::AddPartition {
            device: self.device.clone(),
            kind,
            constraint,
        });
        let first = if kind == RecordKind::Logical { 5 } else { 1 };
        let number = (first..)
            .find(|candidate| !self.staged.records.iter().any(|r| r.number == *candidate))
            .unwrap_or(first);
        let range = self.place(number, kind, constraint)?;
        let new_record = record(&self.device, number, kind, range.start, range.end);
        self.staged.records.push(new_record.clone());
        self.staged.records.sort_by_key(|r| r.range.start);
        Ok(new_record)
    }

    fn delete_partition(&mut self, number: u32) -> Result<(), StorageError> {
        self.backend.ledger.record(Call::DeletePartition {
            device: self.device.clone(),
            number,
        });
        self.record_mut(number)?;
        self.staged.records.retain(|record| record.number != number);
        Ok(())
    }

    fn set_geometry(
        &mut self,
        number: u32,
        constraint: GeometryConstraint,
    ) -> Result<SectorRange, StorageError> {
        self.backend.ledger.record(Call::SetGeometry {
            device: self.device.clone(),
            number,
            constraint,
        });
        let kind = self.record_mut(number)?.kind;
        let range = self.place(number, kind, constraint)?;
        self.record_mut(number)?.range = range;
        Ok(range)
    }

    fn set_type(&mut self, number: u32, filesystem: FilesystemType) -> Result<(), StorageError> {
        self.backend.ledger.record(Call::SetType {
            device: self.device.clone(),
            number,
            filesystem,
        });
        self.record_mut(number)?.fs_hint = Some(filesystem.as_str().to_string());
        Ok(())
    }

    fn set_name(&mut self, number: u32, name: &str) -> Result<(), StorageError> {
        self.backend.ledger.record(Call::SetName {
            device: self.device.clone(),
            number,
            name: name.to_string(),
        });
        self.record_mut(number)?.name = Some(name.to_string());
        Ok(())
    }

    fn new_table(&mut self, label: &str) -> Result<(), StorageError> {
        self.backend.ledger.record(Call::NewTable {
            device: self.device.clone(),
            label: label.to_string(),
        });
        self.staged.label = Some(label.to_string());
        self.staged.records.clear();
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        let mut state = self.backend.guard();
        let fail = state.fail_all_commits || state.failing_commits > 0;
        state.failing_commits = state.failing_commits.saturating_sub(1);
        self.backend.ledger.record(Call::Commit {
            device: self.device.clone(),
            succeeded: !fail,
        });
        if fail {
            return Err(StorageError::new(
                StorageErrorKind::TableCommitFailed,
                format!("injected commit failure on {}", self.device),
            ));
        }
        state.tables.insert(self.device.clone(), self.staged.clone());
        Ok(())
    }

    fn sync_kernel(&mut self) -> Result<(), StorageError> {
        self.backend.ledger.record(Call::SyncKernel {
            device: self.device.clone(),
        });
        Ok(())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.backend.ledger.record(Call::Release {
            device: self.device.clone(),
        });
    }
}

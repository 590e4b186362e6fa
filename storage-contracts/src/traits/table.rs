// SPDX-License-Identifier: GPL-3.0-only

use storage_types::{FilesystemType, Geometry, Partition, SectorRange, SectorUsage};

use crate::StorageError;

/// Static facts about a block device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub path: String,
    pub model: String,
    pub serial: Option<String>,
    pub sector_size: u64,
    /// Length in sectors
    pub length: u64,
    pub geometry: Geometry,
}

/// Entry type as encoded in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Normal,
    Logical,
    Extended,
    /// Type bits the model does not understand (metadata, free space, ...)
    Other(u32),
}

/// One raw partition table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRecord {
    pub number: u32,
    pub kind: RecordKind,
    pub range: SectorRange,
    /// Block device node for this entry
    pub path: String,
    /// Filesystem name as known to the table tooling
    pub fs_hint: Option<String>,
    pub name: Option<String>,
    pub flags: Vec<String>,
    /// The kernel holds this entry open
    pub busy: bool,
}

/// Placement request for a table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryConstraint {
    /// Exactly these sectors
    Exact(SectorRange),
    /// Anywhere inside `within`, at least `min_sectors` long
    Any { within: SectorRange, min_sectors: u64 },
}

impl GeometryConstraint {
    /// Outer bounds the placement must respect
    pub fn bounds(&self) -> SectorRange {
        match self {
            Self::Exact(range) => *range,
            Self::Any { within, .. } => *within,
        }
    }
}

/// Partition-table backend.
///
/// Enumeration and device facts are stateless; table edits go through a
/// `TableSession` obtained from [`TableBackend::open`].
pub trait TableBackend: Send + Sync {
    /// Paths of every block device the backend can see
    fn list_devices(&self) -> Result<Vec<String>, StorageError>;

    fn device_info(&self, path: &str) -> Result<DeviceInfo, StorageError>;

    /// Open the device's table for reading and editing.
    ///
    /// The session is released when dropped; uncommitted edits are discarded.
    fn open(&self, path: &str) -> Result<Box<dyn TableSession>, StorageError>;

    /// Offline usage read for filesystems the backend understands
    fn filesystem_usage(
        &self,
        _partition: &Partition,
    ) -> Result<Option<SectorUsage>, StorageError> {
        Ok(None)
    }

    /// Resize a filesystem the backend understands to the partition's bounds
    fn resize_filesystem(&self, partition: &Partition) -> Result<(), StorageError> {
        Err(StorageError::new(
            crate::StorageErrorKind::Unsupported,
            format!(
                "backend cannot resize {} on {}",
                partition.filesystem, partition.path
            ),
        ))
    }
}

/// An open partition table with staged edits
pub trait TableSession: Send {
    fn device_path(&self) -> &str;

    /// Table format name, `None` when the device has no table
    fn table_label(&self) -> Option<String>;

    fn max_primaries(&self) -> u32;

    /// Maximum partition name length, `None` when names are unsupported
    fn max_name_length(&self) -> Option<usize>;

    fn records(&self) -> Vec<PartitionRecord>;

    fn add_partition(
        &mut self,
        kind: RecordKind,
        constraint: GeometryConstraint,
    ) -> Result<PartitionRecord, StorageError>;

    fn delete_partition(&mut self, number: u32) -> Result<(), StorageError>;

    /// Move or resize an entry; returns the placement actually staged
    fn set_geometry(
        &mut self,
        number: u32,
        constraint: GeometryConstraint,
    ) -> Result<SectorRange, StorageError>;

    fn set_type(&mut self, number: u32, filesystem: FilesystemType) -> Result<(), StorageError>;

    fn set_name(&mut self, number: u32, name: &str) -> Result<(), StorageError>;

    /// Replace the table with an empty one of the given format
    fn new_table(&mut self, label: &str) -> Result<(), StorageError>;

    /// Write staged edits to disk and make the kernel re-read the table
    fn commit(&mut self) -> Result<(), StorageError>;

    /// Ask the kernel to re-read the table without writing
    fn sync_kernel(&mut self) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_bounds() {
        let range = SectorRange::new(2048, 4095);
        assert_eq!(GeometryConstraint::Exact(range).bounds(), range);
        assert_eq!(
            GeometryConstraint::Any {
                within: range,
                min_sectors: 16,
            }
            .bounds(),
            range
        );
    }
}

// SPDX-License-Identifier: GPL-3.0-only

use storage_types::{FilesystemType, Partition, SectorUsage};

use crate::{StorageError, StorageErrorKind};

/// Who carries out an operation for a filesystem type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FsSupport {
    #[default]
    Unsupported,
    /// Handled inside the engine (mount table, statvfs)
    Internal,
    /// Handled by the partition-table backend
    Backend,
    /// Handled by an external tool
    External,
}

impl FsSupport {
    pub fn is_supported(&self) -> bool {
        *self != Self::Unsupported
    }
}

/// Per-operation support for one filesystem type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FsCapabilities {
    pub busy: FsSupport,
    pub read_label: FsSupport,
    pub read_uuid: FsSupport,
    pub read_usage: FsSupport,
    pub online_read_usage: FsSupport,
    pub check: FsSupport,
    pub create: FsSupport,
    pub grow: FsSupport,
    pub shrink: FsSupport,
    pub online_grow: FsSupport,
    pub online_shrink: FsSupport,
}

/// Tooling for one filesystem type.
///
/// Partitions passed in carry the bounds the operation should target.
pub trait FilesystemTool: Send + Sync {
    fn filesystem(&self) -> FilesystemType;

    /// Smallest byte size the filesystem can live in
    fn min_size(&self) -> u64 {
        0
    }

    fn is_busy(&self, _partition: &Partition) -> Result<bool, StorageError> {
        Ok(false)
    }

    fn read_label(&self, _partition: &Partition) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn read_uuid(&self, _partition: &Partition) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn read_usage(&self, _partition: &Partition) -> Result<Option<SectorUsage>, StorageError> {
        Ok(None)
    }

    fn check_repair(&self, partition: &Partition) -> Result<(), StorageError> {
        Err(unsupported(self.filesystem(), "check", partition))
    }

    fn create(&self, partition: &Partition, _label: Option<&str>) -> Result<(), StorageError> {
        Err(unsupported(self.filesystem(), "create", partition))
    }

    /// Resize to the partition's bounds, or to the whole partition if `fill`
    fn resize(&self, partition: &Partition, _fill: bool) -> Result<(), StorageError> {
        Err(unsupported(self.filesystem(), "resize", partition))
    }
}

fn unsupported(fs: FilesystemType, operation: &str, partition: &Partition) -> StorageError {
    StorageError::new(
        StorageErrorKind::Unsupported,
        format!("{operation} is not available for {fs} on {}", partition.path),
    )
}

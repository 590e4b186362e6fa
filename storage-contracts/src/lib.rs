// SPDX-License-Identifier: GPL-3.0-only

//! Contracts between the storage engine and its collaborators
//!
//! The engine never talks to the system directly. Partition tables, raw block
//! I/O, filesystem tools, mount data and encrypted mappings are reached
//! through the traits in [`traits`]; every fallible call reports a
//! [`StorageError`] whose [`StorageErrorKind`] tells the caller how to react.

pub mod protocol;
pub mod traits;

pub use protocol::{OperationEvent, OperationId, OperationKind, StorageError, StorageErrorKind};
pub use traits::{
    BlockIo, CryptTool, DeviceInfo, FilesystemTool, FsCapabilities, FsInfo, FsInfoSnapshot,
    FsInfoSource, FsSupport, GeometryConstraint, LvmReport, MountEntry, MountSnapshot, MountTable,
    MountUsage, PartitionRecord, RecordKind, SectorReader, SectorWriter, TableBackend,
    TableSession, WindowReader,
};

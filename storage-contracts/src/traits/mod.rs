// SPDX-License-Identifier: GPL-3.0-only

pub mod block_io;
pub mod crypt;
pub mod filesystem;
pub mod lvm;
pub mod mounts;
pub mod table;

pub use block_io::{BlockIo, SectorReader, SectorWriter, WindowReader};
pub use crypt::CryptTool;
pub use filesystem::{FilesystemTool, FsCapabilities, FsSupport};
pub use lvm::LvmReport;
pub use mounts::{
    FsInfo, FsInfoSnapshot, FsInfoSource, MountEntry, MountSnapshot, MountTable, MountUsage,
};
pub use table::{
    DeviceInfo, GeometryConstraint, PartitionRecord, RecordKind, TableBackend, TableSession,
};

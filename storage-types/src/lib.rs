//! Canonical domain models for the storage engine
//!
//! This crate defines the data shared by every layer of the stack:
//!
//! - **storage-sys**: builds `Device`/`Partition` trees from probes and plans
//!   resize and allocation operations over them
//! - **storage-service**: publishes `DeviceGraph` snapshots to its listeners
//!
//! ## Architecture
//!
//! A probe produces one immutable `DeviceGraph`. Each `Device` owns a flat
//! arena of `Partition`s; nesting under an extended partition is expressed
//! with `PartitionId` links, and free space is represented by synthesized
//! `Unallocated` entries so top-level entries cover the whole device.

pub mod allocation;
pub mod common;
pub mod device;
pub mod filesystem;
pub mod graph;
pub mod lvm;
pub mod partition;
pub mod resize;

pub use allocation::{AllocationMode, PvCandidate, PvCandidateKind};
pub use common::{
    ALIGNMENT_BYTES, GIBIBYTE, KIBIBYTE, MEBIBYTE, SectorRange, bytes_to_pretty, mebibyte_sectors,
};
pub use device::{Device, Geometry, TableKind};
pub use filesystem::FilesystemType;
pub use graph::DeviceGraph;
pub use lvm::{PhysicalVolumeInfo, VolumeGroupInfo};
pub use partition::{
    Alignment, Partition, PartitionId, PartitionKind, SectorUsage, UNALLOCATED_PATH,
};
pub use resize::ResizeAction;

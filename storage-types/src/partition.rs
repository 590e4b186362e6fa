//! Partition model
//!
//! A `Partition` is either a real table entry, a whole-disk (unpartitioned)
//! entry, or a synthesized `Unallocated` gap. Partitions live in a flat arena
//! owned by their `Device`; nesting under an extended partition is expressed
//! through `parent` and `children` ids.

use serde::{Deserialize, Serialize};

use crate::{FilesystemType, SectorRange};

/// Path used for entries that have no block device node
pub const UNALLOCATED_PATH: &str = "unallocated";

/// Index of a partition inside its device's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKind {
    Primary,
    Extended,
    Logical,
    /// The whole device used without a partition table
    Unpartitioned,
    /// Synthesized free space
    Unallocated,
}

/// How strictly new bounds must be honoured when a table entry is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Exactly the requested sectors
    Strict,
    /// Requested sectors, already rounded to 1 MiB by the caller
    #[default]
    Mebibyte,
    /// Any placement the backend finds acceptable
    None,
}

impl Alignment {
    /// Strict and mebibyte placements are written verbatim
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Strict | Self::Mebibyte)
    }
}

/// Used and unused sectors of the content of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorUsage {
    pub used: u64,
    pub unused: u64,
}

impl SectorUsage {
    /// Build from a total and a free figure expressed in bytes
    pub fn from_bytes(total: u64, free: u64, sector_size: u64) -> Self {
        let sector_size = sector_size.max(1);
        let free = free.min(total);
        Self {
            used: (total - free) / sector_size,
            unused: free / sector_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    // === Identity ===
    /// Path of the owning device (e.g., "/dev/sda")
    pub device_path: String,

    /// Own block device path, or a placeholder for virtual entries
    pub path: String,

    /// Table entry number; 0 for unallocated and unpartitioned entries
    pub number: u32,

    pub kind: PartitionKind,

    // === Geometry ===
    pub start: u64,
    pub end: u64,
    pub sector_size: u64,

    /// Lies inside the extended partition
    pub inside_extended: bool,

    pub alignment: Alignment,

    // === Content ===
    pub filesystem: FilesystemType,

    /// Table-level partition name (GPT)
    pub name: Option<String>,

    pub uuid: Option<String>,

    /// Filesystem label
    pub label: Option<String>,

    /// Opaque table flags as reported by the backend
    pub flags: Vec<String>,

    // === State ===
    pub busy: bool,

    pub mount_points: Vec<String>,

    /// `None` when usage could not be determined
    pub usage: Option<SectorUsage>,

    // === Nesting ===
    pub parent: Option<PartitionId>,
    pub children: Vec<PartitionId>,
}

impl Partition {
    pub fn new(
        device_path: impl Into<String>,
        path: impl Into<String>,
        number: u32,
        kind: PartitionKind,
        range: SectorRange,
        sector_size: u64,
    ) -> Self {
        Self {
            device_path: device_path.into(),
            path: path.into(),
            number,
            kind,
            start: range.start,
            end: range.end,
            sector_size,
            inside_extended: kind == PartitionKind::Logical,
            alignment: Alignment::Strict,
            filesystem: FilesystemType::Unknown,
            name: None,
            uuid: None,
            label: None,
            flags: Vec::new(),
            busy: false,
            mount_points: Vec::new(),
            usage: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// A synthesized free-space entry
    pub fn unallocated(
        device_path: impl Into<String>,
        range: SectorRange,
        sector_size: u64,
        inside_extended: bool,
    ) -> Self {
        let mut partition = Self::new(
            device_path,
            UNALLOCATED_PATH,
            0,
            PartitionKind::Unallocated,
            range,
            sector_size,
        );
        partition.filesystem = FilesystemType::Unallocated;
        partition.inside_extended = inside_extended;
        partition
    }

    /// The whole device as a single entry
    pub fn unpartitioned(
        device_path: impl Into<String>,
        range: SectorRange,
        sector_size: u64,
        filesystem: FilesystemType,
    ) -> Self {
        let device_path = device_path.into();
        let mut partition = Self::new(
            device_path.clone(),
            device_path,
            0,
            PartitionKind::Unpartitioned,
            range,
            sector_size,
        );
        partition.filesystem = filesystem;
        partition
    }

    pub fn range(&self) -> SectorRange {
        SectorRange::new(self.start, self.end)
    }

    pub fn length(&self) -> u64 {
        self.range().length()
    }

    pub fn byte_length(&self) -> u64 {
        self.range().byte_length(self.sector_size)
    }

    /// Entries without a table record behind them
    pub fn is_virtual(&self) -> bool {
        self.kind == PartitionKind::Unallocated
    }

    /// Entries backed by content that can be probed
    pub fn is_concrete(&self) -> bool {
        matches!(
            self.kind,
            PartitionKind::Primary | PartitionKind::Logical | PartitionKind::Unpartitioned
        )
    }

    pub fn usage_known(&self) -> bool {
        self.usage.is_some()
    }

    pub fn is_mounted(&self) -> bool {
        self.busy && !self.mount_points.is_empty()
    }

    /// Same table entry on the same device
    pub fn same_entry(&self, other: &Partition) -> bool {
        self.device_path == other.device_path
            && self.number == other.number
            && self.kind == other.kind
    }
}

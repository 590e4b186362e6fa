//! Physical-volume candidates for volume group allocation

use serde::{Deserialize, Serialize};

use crate::SectorRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PvCandidateKind {
    WholeDisk,
    ExistingPartition,
    UnallocatedGap,
    LoopDevice,
    MetaDevice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// A new volume group
    Create,
    /// Grow an existing volume group
    Extend,
}

/// A region that may become (or already is) a physical volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvCandidate {
    pub kind: PvCandidateKind,

    /// Disk the region lives on
    pub disk_path: String,

    /// Block device path; `None` until a gap has been partitioned
    pub device_path: Option<String>,

    pub start: u64,
    pub end: u64,
    pub sector_size: u64,

    /// Volume group this region already belongs to
    pub member_of: Option<String>,
}

impl PvCandidate {
    pub fn new(
        kind: PvCandidateKind,
        disk_path: impl Into<String>,
        device_path: Option<String>,
        range: SectorRange,
        sector_size: u64,
    ) -> Self {
        Self {
            kind,
            disk_path: disk_path.into(),
            device_path,
            start: range.start,
            end: range.end,
            sector_size,
            member_of: None,
        }
    }

    pub fn range(&self) -> SectorRange {
        SectorRange::new(self.start, self.end)
    }

    /// Raw capacity of the region in bytes
    pub fn capacity(&self) -> u64 {
        self.range().byte_length(self.sector_size)
    }

    /// Path used to identify the candidate in logs and validation
    pub fn display_path(&self) -> String {
        match &self.device_path {
            Some(path) => path.clone(),
            None => format!("{}:{}-{}", self.disk_path, self.start, self.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_counts_inclusive_sectors() {
        let gap = PvCandidate::new(
            PvCandidateKind::UnallocatedGap,
            "/dev/sda",
            None,
            SectorRange::new(2048, 4095),
            512,
        );
        assert_eq!(gap.capacity(), 1024 * 1024);
        assert_eq!(gap.display_path(), "/dev/sda:2048-4095");
        assert_eq!(gap.member_of, None);
    }
}

//! Block device model
//!
//! A `Device` owns every partition found on it in a flat arena. Top-level
//! entries (primaries, the extended container, gaps, or a single
//! unpartitioned entry) are listed in `top_level` in ascending sector order;
//! the extended container lists its logicals and inner gaps in `children`.

use serde::{Deserialize, Serialize};

use crate::{Partition, PartitionId, PartitionKind, SectorRange};

/// Partition table found on a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum TableKind {
    /// No table, the whole device holds one filesystem
    None,
    /// A named table format such as "gpt" or "dos"
    Named(String),
    /// Only a loop-style signature, no real table
    Loop,
    /// Nothing recognized
    Unrecognized,
}

impl TableKind {
    pub fn label(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Named(name) => name,
            Self::Loop => "loop",
            Self::Unrecognized => "unrecognized",
        }
    }

    pub fn is_gpt(&self) -> bool {
        matches!(self, Self::Named(name) if name == "gpt")
    }

    pub fn has_table(&self) -> bool {
        matches!(self, Self::Named(_))
    }
}

/// Legacy CHS geometry as reported by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub heads: u32,
    pub sectors: u32,
    pub cylinders: u64,

    /// Sectors per cylinder, never below one mebibyte
    pub cylinder_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    // === Identity ===
    /// Device path (e.g., "/dev/sda")
    pub path: String,

    pub model: String,

    pub serial: Option<String>,

    // === Geometry ===
    pub sector_size: u64,

    /// Length in sectors
    pub length: u64,

    pub geometry: Geometry,

    // === Partitioning ===
    pub table: TableKind,

    pub max_primaries: u32,

    /// Maximum partition name length, `None` if the table has no names
    pub max_name_length: Option<usize>,

    /// Highest number among busy partitions, 0 if none
    pub highest_busy: u32,

    /// A busy partition prevented the kernel from re-reading the table
    pub read_only: bool,

    /// GPT backup header is not at the end of the device
    pub table_needs_repair: bool,

    // === Partitions ===
    /// Arena holding every partition of this device
    pub arena: Vec<Partition>,

    /// Top-level entries in ascending sector order
    pub top_level: Vec<PartitionId>,
}

impl Device {
    pub fn new(path: impl Into<String>, sector_size: u64, length: u64) -> Self {
        Self {
            path: path.into(),
            model: String::new(),
            serial: None,
            sector_size,
            length,
            geometry: Geometry::default(),
            table: TableKind::Unrecognized,
            max_primaries: 1,
            max_name_length: None,
            highest_busy: 0,
            read_only: false,
            table_needs_repair: false,
            arena: Vec::new(),
            top_level: Vec::new(),
        }
    }

    pub fn byte_length(&self) -> u64 {
        self.length * self.sector_size
    }

    /// Range spanning the whole device
    pub fn range(&self) -> SectorRange {
        SectorRange::new(0, self.length.saturating_sub(1))
    }

    pub fn supports_naming(&self) -> bool {
        self.max_name_length.is_some()
    }

    /// Append a top-level entry together with its nested children.
    ///
    /// Children are stored first so the parent can reference them.
    pub fn push_top_level(
        &mut self,
        mut partition: Partition,
        children: Vec<Partition>,
    ) -> PartitionId {
        let parent_id = PartitionId(self.arena.len() + children.len());
        let mut child_ids = Vec::with_capacity(children.len());
        for mut child in children {
            child.parent = Some(parent_id);
            child_ids.push(PartitionId(self.arena.len()));
            self.arena.push(child);
        }
        partition.children = child_ids;
        partition.parent = None;
        self.arena.push(partition);
        self.top_level.push(parent_id);
        parent_id
    }

    pub fn partition(&self, id: PartitionId) -> Option<&Partition> {
        self.arena.get(id.0)
    }

    pub fn partition_mut(&mut self, id: PartitionId) -> Option<&mut Partition> {
        self.arena.get_mut(id.0)
    }

    pub fn top_level_partitions(&self) -> impl Iterator<Item = &Partition> {
        self.top_level.iter().filter_map(|id| self.partition(*id))
    }

    pub fn children<'a>(&'a self, partition: &'a Partition) -> impl Iterator<Item = &'a Partition> {
        partition.children.iter().filter_map(|id| self.partition(*id))
    }

    /// Every entry in display order: each top-level entry followed by its
    /// children
    pub fn partitions_in_order(&self) -> Vec<&Partition> {
        let mut ordered = Vec::with_capacity(self.arena.len());
        for partition in self.top_level_partitions() {
            ordered.push(partition);
            ordered.extend(self.children(partition));
        }
        ordered
    }

    pub fn extended(&self) -> Option<&Partition> {
        self.top_level_partitions()
            .find(|partition| partition.kind == PartitionKind::Extended)
    }

    pub fn find_by_number(&self, number: u32) -> Option<&Partition> {
        if number == 0 {
            return None;
        }
        self.arena
            .iter()
            .find(|partition| partition.number == number && !partition.is_virtual())
    }

    pub fn find_by_path(&self, path: &str) -> Option<&Partition> {
        self.arena
            .iter()
            .find(|partition| !partition.is_virtual() && partition.path == path)
    }

    /// Innermost entry covering `sector`
    pub fn find_containing(&self, sector: u64) -> Option<&Partition> {
        let top = self
            .top_level_partitions()
            .find(|partition| partition.range().contains_sector(sector))?;
        self.children(top)
            .find(|child| child.range().contains_sector(sector))
            .or(Some(top))
    }

    pub fn busy_partitions(&self) -> impl Iterator<Item = &Partition> {
        self.arena.iter().filter(|partition| partition.busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FilesystemType;

    fn sample_device() -> Device {
        let mut device = Device::new("/dev/sda", 512, 20480);
        device.table = TableKind::Named("dos".to_string());
        device.push_top_level(
            Partition::new(
                "/dev/sda",
                "/dev/sda1",
                1,
                PartitionKind::Primary,
                SectorRange::new(2048, 8191),
                512,
            ),
            Vec::new(),
        );
        let mut extended = Partition::new(
            "/dev/sda",
            "/dev/sda2",
            2,
            PartitionKind::Extended,
            SectorRange::new(8192, 20479),
            512,
        );
        extended.filesystem = FilesystemType::Extended;
        let logical = Partition::new(
            "/dev/sda",
            "/dev/sda5",
            5,
            PartitionKind::Logical,
            SectorRange::new(10240, 14335),
            512,
        );
        let gap = Partition::unallocated("/dev/sda", SectorRange::new(14336, 20479), 512, true);
        device.push_top_level(extended, vec![logical, gap]);
        device
    }

    #[test]
    fn children_point_back_to_parent() {
        let device = sample_device();
        let extended = device.extended().expect("extended present");
        let children: Vec<_> = device.children(extended).collect();
        assert_eq!(children.len(), 2);
        let extended_id = device.top_level[1];
        assert!(children.iter().all(|child| child.parent == Some(extended_id)));
    }

    #[test]
    fn display_order_nests_children() {
        let device = sample_device();
        let numbers: Vec<_> = device
            .partitions_in_order()
            .iter()
            .map(|partition| partition.number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 5, 0]);
    }

    #[test]
    fn lookup_finds_innermost_entry() {
        let device = sample_device();
        assert_eq!(device.find_containing(11000).map(|p| p.number), Some(5));
        assert_eq!(device.find_containing(9000).map(|p| p.number), Some(2));
        assert_eq!(device.find_by_path("/dev/sda5").map(|p| p.number), Some(5));
        assert!(device.find_by_number(0).is_none());
    }

    #[test]
    fn table_kind_labels() {
        assert_eq!(TableKind::Named("gpt".into()).label(), "gpt");
        assert!(TableKind::Named("gpt".into()).is_gpt());
        assert_eq!(TableKind::Unrecognized.label(), "unrecognized");
        assert!(!TableKind::Loop.has_table());
    }
}

//! Immutable snapshot of every probed device

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Device, Partition};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGraph {
    /// Increases with every probe
    pub generation: u64,

    pub probed_at: DateTime<Utc>,

    /// Devices sorted by path
    pub devices: Vec<Device>,
}

impl DeviceGraph {
    pub fn new(generation: u64, mut devices: Vec<Device>) -> Self {
        devices.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            generation,
            probed_at: Utc::now(),
            devices,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    pub fn device(&self, path: &str) -> Option<&Device> {
        self.devices.iter().find(|device| device.path == path)
    }

    /// Locate a non-virtual partition by its block device path
    pub fn find_partition(&self, path: &str) -> Option<(&Device, &Partition)> {
        self.devices.iter().find_map(|device| {
            device
                .find_by_path(path)
                .map(|partition| (device, partition))
        })
    }

    pub fn partition_count(&self) -> usize {
        self.devices.iter().map(|device| device.arena.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FilesystemType, SectorRange};

    #[test]
    fn devices_are_sorted_and_searchable() {
        let mut sdb = Device::new("/dev/sdb", 512, 4096);
        sdb.push_top_level(
            Partition::unpartitioned(
                "/dev/sdb",
                SectorRange::new(0, 4095),
                512,
                FilesystemType::Ext4,
            ),
            Vec::new(),
        );
        let sda = Device::new("/dev/sda", 512, 4096);
        let graph = DeviceGraph::new(3, vec![sdb, sda]);

        assert_eq!(graph.devices[0].path, "/dev/sda");
        assert_eq!(graph.partition_count(), 1);
        let (device, partition) = graph.find_partition("/dev/sdb").expect("whole disk entry");
        assert_eq!(device.path, "/dev/sdb");
        assert_eq!(partition.filesystem, FilesystemType::Ext4);
    }
}

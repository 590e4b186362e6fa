// SPDX-License-Identifier: GPL-3.0-only

//! Fills label, UUID, busy state, mount points and usage into a device model

use storage_contracts::{
    FsInfoSnapshot, FsSupport, MountSnapshot, MountTable, StorageError, TableBackend,
};
use storage_types::{Device, FilesystemType, Partition, PartitionKind, SectorUsage};

use crate::capabilities::CapabilityTable;

/// Read-only enrichment pass over freshly built devices
pub struct UsageEnricher<'a> {
    capabilities: &'a CapabilityTable,
    mounts: &'a MountSnapshot,
    fs_info: &'a FsInfoSnapshot,
    mount_table: &'a dyn MountTable,
    backend: &'a dyn TableBackend,
}

impl<'a> UsageEnricher<'a> {
    pub fn new(
        capabilities: &'a CapabilityTable,
        mounts: &'a MountSnapshot,
        fs_info: &'a FsInfoSnapshot,
        mount_table: &'a dyn MountTable,
        backend: &'a dyn TableBackend,
    ) -> Self {
        Self {
            capabilities,
            mounts,
            fs_info,
            mount_table,
            backend,
        }
    }

    /// Enrich every concrete partition, then refresh busy roll-ups
    pub fn enrich_device(&self, device: &mut Device) {
        for partition in device.arena.iter_mut() {
            if partition.is_concrete() {
                self.enrich(partition);
            }
        }

        let extended_busy = device
            .arena
            .iter()
            .any(|partition| partition.kind == PartitionKind::Logical && partition.busy);
        for partition in device.arena.iter_mut() {
            if partition.kind == PartitionKind::Extended {
                partition.busy = partition.busy || extended_busy;
            }
        }

        device.highest_busy = device
            .arena
            .iter()
            .filter(|partition| partition.busy)
            .map(|partition| match partition.kind {
                PartitionKind::Primary | PartitionKind::Logical => partition.number,
                PartitionKind::Unpartitioned => 1,
                _ => 0,
            })
            .max()
            .unwrap_or(0);
    }

    pub fn enrich(&self, partition: &mut Partition) {
        partition.busy = partition.busy || self.is_busy(partition);
        self.read_label_and_uuid(partition);

        partition.mount_points = if partition.filesystem.is_stacked_member() {
            Vec::new()
        } else if partition.busy {
            self.mounts.mount_points(&partition.path)
        } else {
            self.mounts.fstab_mount_points(
                &partition.path,
                partition.uuid.as_deref(),
                partition.label.as_deref(),
            )
        };

        partition.usage = match self.read_usage(partition) {
            Ok(usage) => usage,
            Err(error) => {
                tracing::debug!("usage of {} unavailable: {error}", partition.path);
                None
            }
        };
    }

    fn is_busy(&self, partition: &Partition) -> bool {
        let capabilities = self.capabilities.capabilities(partition.filesystem);
        if capabilities.busy == FsSupport::External {
            if let Some(tool) = self.capabilities.tool(partition.filesystem) {
                return match tool.is_busy(partition) {
                    Ok(busy) => busy,
                    Err(error) => {
                        tracing::warn!("busy check of {} failed: {error}", partition.path);
                        false
                    }
                };
            }
        }

        self.mounts.is_mounted(&partition.path)
            || (partition.filesystem == FilesystemType::LinuxSwap
                && self.mounts.is_active_swap(&partition.path))
    }

    fn read_label_and_uuid(&self, partition: &mut Partition) {
        let capabilities = self.capabilities.capabilities(partition.filesystem);
        let tool = self.capabilities.tool(partition.filesystem);
        let cached = self.fs_info.get(&partition.path);

        if capabilities.read_label == FsSupport::External {
            if let Some(tool) = tool {
                match tool.read_label(partition) {
                    Ok(label) => partition.label = label,
                    Err(error) => tracing::debug!("label of {}: {error}", partition.path),
                }
            }
        }
        if partition.label.is_none() {
            partition.label = cached.and_then(|info| info.label.clone());
        }

        partition.uuid = cached.and_then(|info| info.uuid.clone());
        if partition.uuid.is_none() && capabilities.read_uuid == FsSupport::External {
            if let Some(tool) = tool {
                match tool.read_uuid(partition) {
                    Ok(uuid) => partition.uuid = uuid,
                    Err(error) => tracing::debug!("uuid of {}: {error}", partition.path),
                }
            }
        }
    }

    fn read_usage(&self, partition: &Partition) -> Result<Option<SectorUsage>, StorageError> {
        let capabilities = self.capabilities.capabilities(partition.filesystem);
        let support = if partition.busy {
            capabilities.online_read_usage
        } else {
            capabilities.read_usage
        };

        match support {
            FsSupport::External => match self.capabilities.tool(partition.filesystem) {
                Some(tool) => tool.read_usage(partition),
                None => Ok(None),
            },
            FsSupport::Backend => self.backend.filesystem_usage(partition),
            FsSupport::Internal | FsSupport::Unsupported if partition.busy => {
                self.mounted_usage(partition)
            }
            _ => Ok(None),
        }
    }

    fn mounted_usage(&self, partition: &Partition) -> Result<Option<SectorUsage>, StorageError> {
        let Some(mount_point) = partition.mount_points.first() else {
            return Ok(None);
        };
        Ok(self
            .mount_table
            .usage(mount_point)?
            .map(|usage| SectorUsage::from_bytes(usage.total, usage.free, partition.sector_size)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use storage_contracts::MountTable;
    use storage_testing::{CallLedger, FakeFsInfo, FakeFsTool, FakeMounts, FakeTableBackend};
    use storage_types::{SectorRange, MEBIBYTE};

    use crate::capabilities::external_capabilities;

    fn partition(path: &str, number: u32, filesystem: FilesystemType) -> Partition {
        let mut partition = Partition::new(
            "/dev/sda",
            path,
            number,
            PartitionKind::Primary,
            SectorRange::new(2048, 206_847),
            512,
        );
        partition.filesystem = filesystem;
        partition
    }

    struct Fixture {
        capabilities: CapabilityTable,
        mount_table: FakeMounts,
        fs_info: FakeFsInfo,
        backend: FakeTableBackend,
    }

    impl Fixture {
        fn run(&self, target: &mut Partition) {
            let mounts = self.mount_table.snapshot().expect("mount snapshot");
            let fs_info =
                storage_contracts::FsInfoSource::snapshot(&self.fs_info).expect("fs info");
            UsageEnricher::new(
                &self.capabilities,
                &mounts,
                &fs_info,
                &self.mount_table,
                &self.backend,
            )
            .enrich(target);
        }
    }

    #[test]
    fn mounted_partition_reports_mount_points_and_statvfs_usage() {
        let ledger = CallLedger::new();
        let fixture = Fixture {
            capabilities: CapabilityTable::new().with_tool(Arc::new(
                FakeFsTool::new(FilesystemType::Ext4, ledger).with_label("root"),
            )),
            mount_table: FakeMounts::new().mounted("/dev/sda1", "/", 100 * MEBIBYTE, 40 * MEBIBYTE),
            fs_info: FakeFsInfo::new().entry("/dev/sda1", "ext4", Some("cached"), Some("1234")),
            backend: FakeTableBackend::default(),
        };

        let mut target = partition("/dev/sda1", 1, FilesystemType::Ext4);
        fixture.run(&mut target);

        assert!(target.busy);
        assert_eq!(target.mount_points, vec!["/".to_string()]);
        assert_eq!(target.label.as_deref(), Some("root"));
        assert_eq!(target.uuid.as_deref(), Some("1234"));
        let usage = target.usage.expect("usage known");
        assert_eq!(usage.used, 60 * MEBIBYTE / 512);
        assert_eq!(usage.unused, 40 * MEBIBYTE / 512);
    }

    #[test]
    fn idle_partition_uses_fstab_and_offline_tool() {
        let ledger = CallLedger::new();
        let fixture = Fixture {
            capabilities: CapabilityTable::new().with_tool(Arc::new(
                FakeFsTool::new(FilesystemType::Xfs, ledger).with_usage(1000, 3000),
            )),
            mount_table: FakeMounts::new().fstab("UUID=beef", "/srv"),
            fs_info: FakeFsInfo::new().entry("/dev/sda2", "xfs", Some("data"), Some("beef")),
            backend: FakeTableBackend::default(),
        };

        let mut target = partition("/dev/sda2", 2, FilesystemType::Xfs);
        fixture.run(&mut target);

        assert!(!target.busy);
        assert_eq!(target.mount_points, vec!["/srv".to_string()]);
        assert_eq!(target.label.as_deref(), Some("data"));
        assert_eq!(target.usage, Some(SectorUsage { used: 1000, unused: 3000 }));
    }

    #[test]
    fn stacked_members_have_no_mount_points() {
        let fixture = Fixture {
            capabilities: CapabilityTable::new(),
            mount_table: FakeMounts::new().swap("/dev/sda3").fstab("/dev/sda3", "none"),
            fs_info: FakeFsInfo::new(),
            backend: FakeTableBackend::default(),
        };

        let mut target = partition("/dev/sda3", 3, FilesystemType::LinuxSwap);
        fixture.run(&mut target);

        assert!(target.busy);
        assert!(target.mount_points.is_empty());
        assert!(!target.usage_known());
    }

    #[test]
    fn unsupported_filesystem_leaves_usage_unknown() {
        let fixture = Fixture {
            capabilities: CapabilityTable::new(),
            mount_table: FakeMounts::new(),
            fs_info: FakeFsInfo::new(),
            backend: FakeTableBackend::default(),
        };

        let mut target = partition("/dev/sda4", 4, FilesystemType::Hfs);
        fixture.run(&mut target);
        assert!(!target.busy);
        assert!(target.usage.is_none());
    }

    #[test]
    fn external_busy_probe_is_consulted() {
        let ledger = CallLedger::new();
        let mut capabilities = external_capabilities();
        capabilities.busy = FsSupport::External;
        let fixture = Fixture {
            capabilities: CapabilityTable::new().with(
                FilesystemType::Lvm2Pv,
                capabilities,
                Some(Arc::new(FakeFsTool::new(FilesystemType::Lvm2Pv, ledger).busy())),
            ),
            mount_table: FakeMounts::new(),
            fs_info: FakeFsInfo::new(),
            backend: FakeTableBackend::default(),
        };

        let mut target = partition("/dev/sda5", 5, FilesystemType::Lvm2Pv);
        fixture.run(&mut target);
        assert!(target.busy);
        assert!(target.mount_points.is_empty());
    }
}

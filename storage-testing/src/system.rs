// SPDX-License-Identifier: GPL-3.0-only

//! Mount table, probe cache, crypt and volume manager fakes

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use storage_contracts::{
    CryptTool, FsInfo, FsInfoSnapshot, FsInfoSource, LvmReport, MountEntry, MountSnapshot,
    MountTable, MountUsage, StorageError,
};
use storage_types::{PhysicalVolumeInfo, VolumeGroupInfo};

use crate::ledger::{Call, CallLedger};

#[derive(Debug, Clone, Default)]
pub struct FakeMounts {
    snapshot: MountSnapshot,
    usage: BTreeMap<String, MountUsage>,
}

impl FakeMounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mounted(mut self, device: &str, mount_point: &str, total: u64, free: u64) -> Self {
        self.snapshot.mounted.push(MountEntry {
            source: device.to_string(),
            mount_point: mount_point.to_string(),
            fs_type: String::new(),
            read_only: false,
        });
        self.usage
            .insert(mount_point.to_string(), MountUsage { total, free });
        self
    }

    pub fn fstab(mut self, source: &str, mount_point: &str) -> Self {
        self.snapshot.fstab.push(MountEntry {
            source: source.to_string(),
            mount_point: mount_point.to_string(),
            fs_type: String::new(),
            read_only: false,
        });
        self
    }

    pub fn swap(mut self, device: &str) -> Self {
        self.snapshot.swaps.push(device.to_string());
        self
    }
}

impl MountTable for FakeMounts {
    fn snapshot(&self) -> Result<MountSnapshot, StorageError> {
        Ok(self.snapshot.clone())
    }

    fn usage(&self, mount_point: &str) -> Result<Option<MountUsage>, StorageError> {
        Ok(self.usage.get(mount_point).copied())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeFsInfo {
    snapshot: FsInfoSnapshot,
}

impl FakeFsInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(
        mut self,
        path: &str,
        fs_type: &str,
        label: Option<&str>,
        uuid: Option<&str>,
    ) -> Self {
        self.snapshot.entries.insert(
            path.to_string(),
            FsInfo {
                fs_type: Some(fs_type.to_string()),
                label: label.map(str::to_string),
                uuid: uuid.map(str::to_string),
            },
        );
        self
    }
}

impl FsInfoSource for FakeFsInfo {
    fn snapshot(&self) -> Result<FsInfoSnapshot, StorageError> {
        Ok(self.snapshot.clone())
    }
}

/// Open mappings keyed by backing device
#[derive(Debug, Clone, Default)]
pub struct FakeCrypt {
    mappings: Arc<Mutex<BTreeMap<String, String>>>,
    ledger: CallLedger,
}

impl FakeCrypt {
    pub fn new(ledger: CallLedger) -> Self {
        Self {
            mappings: Arc::default(),
            ledger,
        }
    }

    pub fn open(&self, device: &str, mapping: &str) {
        self.mappings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(device.to_string(), mapping.to_string());
    }
}

impl CryptTool for FakeCrypt {
    fn open_mapping(&self, device: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .mappings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(device)
            .cloned())
    }

    fn close_mapping(&self, mapping: &str) -> Result<(), StorageError> {
        self.ledger.record(Call::CloseMapping {
            mapping: mapping.to_string(),
        });
        self.mappings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|_, open| open != mapping);
        Ok(())
    }
}

/// Fixed volume manager report
#[derive(Debug, Clone, Default)]
pub struct FakeLvm {
    volume_groups: Vec<VolumeGroupInfo>,
    physical_volumes: Vec<PhysicalVolumeInfo>,
}

impl FakeLvm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a volume group together with one physical volume per member
    pub fn volume_group(mut self, vg: VolumeGroupInfo) -> Self {
        for device in &vg.pv_devices {
            self.physical_volumes.push(PhysicalVolumeInfo {
                device: device.clone(),
                vg_name: Some(vg.name.clone()),
                size: 0,
                free: 0,
            });
        }
        self.volume_groups.push(vg);
        self
    }

    pub fn unassigned_pv(mut self, device: &str, size: u64) -> Self {
        self.physical_volumes.push(PhysicalVolumeInfo {
            device: device.to_string(),
            vg_name: None,
            size,
            free: size,
        });
        self
    }
}

impl LvmReport for FakeLvm {
    fn volume_groups(&self) -> Result<Vec<VolumeGroupInfo>, StorageError> {
        Ok(self.volume_groups.clone())
    }

    fn physical_volumes(&self) -> Result<Vec<PhysicalVolumeInfo>, StorageError> {
        Ok(self.physical_volumes.clone())
    }
}

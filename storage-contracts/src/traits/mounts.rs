// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeMap;

use crate::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Mount source: a device path, or `UUID=`/`LABEL=` for fstab entries
    pub source: String,
    pub mount_point: String,
    pub fs_type: String,
    pub read_only: bool,
}

/// Mounted filesystems, fstab entries and active swap at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountSnapshot {
    pub mounted: Vec<MountEntry>,
    pub fstab: Vec<MountEntry>,
    pub swaps: Vec<String>,
}

impl MountSnapshot {
    pub fn is_mounted(&self, device: &str) -> bool {
        self.mounted.iter().any(|entry| entry.source == device)
    }

    pub fn is_active_swap(&self, device: &str) -> bool {
        self.swaps.iter().any(|swap| swap == device)
    }

    pub fn mount_points(&self, device: &str) -> Vec<String> {
        self.mounted
            .iter()
            .filter(|entry| entry.source == device)
            .map(|entry| entry.mount_point.clone())
            .collect()
    }

    /// fstab mount points naming the device by path, UUID or label
    pub fn fstab_mount_points(
        &self,
        device: &str,
        uuid: Option<&str>,
        label: Option<&str>,
    ) -> Vec<String> {
        self.fstab
            .iter()
            .filter(|entry| {
                entry.source == device
                    || uuid.is_some_and(|uuid| entry.source == format!("UUID={uuid}"))
                    || label.is_some_and(|label| entry.source == format!("LABEL={label}"))
            })
            .map(|entry| entry.mount_point.clone())
            .collect()
    }
}

/// Total and free bytes of a mounted filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountUsage {
    pub total: u64,
    pub free: u64,
}

pub trait MountTable: Send + Sync {
    fn snapshot(&self) -> Result<MountSnapshot, StorageError>;

    fn usage(&self, mount_point: &str) -> Result<Option<MountUsage>, StorageError>;
}

/// What a probe cache knows about one block device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FsInfo {
    pub fs_type: Option<String>,
    pub label: Option<String>,
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FsInfoSnapshot {
    pub entries: BTreeMap<String, FsInfo>,
}

impl FsInfoSnapshot {
    pub fn get(&self, path: &str) -> Option<&FsInfo> {
        self.entries.get(path)
    }

    pub fn fs_type(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|info| info.fs_type.as_deref())
    }
}

/// Cached filesystem probe data (blkid style)
pub trait FsInfoSource: Send + Sync {
    fn snapshot(&self) -> Result<FsInfoSnapshot, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(source: &str, mount_point: &str) -> MountEntry {
        MountEntry {
            source: source.to_string(),
            mount_point: mount_point.to_string(),
            fs_type: "ext4".to_string(),
            read_only: false,
        }
    }

    #[test]
    fn fstab_matches_uuid_and_label() {
        let snapshot = MountSnapshot {
            mounted: Vec::new(),
            fstab: vec![
                entry("UUID=abcd", "/home"),
                entry("LABEL=data", "/data"),
                entry("/dev/sdb1", "/srv"),
            ],
            swaps: Vec::new(),
        };

        assert_eq!(
            snapshot.fstab_mount_points("/dev/sda1", Some("abcd"), Some("data")),
            vec!["/home".to_string(), "/data".to_string()]
        );
        assert_eq!(
            snapshot.fstab_mount_points("/dev/sdb1", None, None),
            vec!["/srv".to_string()]
        );
    }

    #[test]
    fn mounted_lookup_by_device() {
        let snapshot = MountSnapshot {
            mounted: vec![entry("/dev/sda2", "/"), entry("/dev/sda2", "/var/snap")],
            ..Default::default()
        };
        assert!(snapshot.is_mounted("/dev/sda2"));
        assert_eq!(snapshot.mount_points("/dev/sda2").len(), 2);
        assert!(!snapshot.is_mounted("/dev/sda1"));
    }
}

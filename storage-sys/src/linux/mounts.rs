// SPDX-License-Identifier: GPL-3.0-only

//! Mount table, fstab and swap state read from procfs

use std::fs;
use std::path::PathBuf;

use storage_contracts::{
    MountEntry, MountSnapshot, MountTable, MountUsage, StorageError, StorageErrorKind,
};

use crate::{Result, SysError};

const EXCLUDED_FS_TYPES: &[&str] = &[
    "autofs",
    "binfmt_misc",
    "bpf",
    "cgroup",
    "cgroup2",
    "configfs",
    "debugfs",
    "devpts",
    "devtmpfs",
    "efivarfs",
    "fusectl",
    "hugetlbfs",
    "mqueue",
    "nsfs",
    "overlay",
    "proc",
    "pstore",
    "ramfs",
    "rpc_pipefs",
    "securityfs",
    "selinuxfs",
    "sysfs",
    "tmpfs",
    "tracefs",
];

/// Parse `/proc/self/mountinfo`, keeping block-backed mounts
pub fn parse_mountinfo(input: &str) -> Result<Vec<MountEntry>> {
    let mut entries = Vec::new();

    for line in input.lines().filter(|line| !line.trim().is_empty()) {
        let invalid = || SysError::Parse {
            tool: "mountinfo".to_string(),
            reason: format!("invalid line: {line}"),
        };
        let (left, right) = line.split_once(" - ").ok_or_else(invalid)?;

        let mut left_fields = left.split_whitespace();
        let mount_point = left_fields.nth(4).ok_or_else(invalid)?;
        let options = left_fields.next().unwrap_or_default();

        let mut right_fields = right.split_whitespace();
        let fs_type = right_fields.next().ok_or_else(invalid)?;
        let source = right_fields.next().unwrap_or_default();

        if EXCLUDED_FS_TYPES.contains(&fs_type) || !source.starts_with('/') {
            continue;
        }

        entries.push(MountEntry {
            source: resolve_source(&unescape_mount_field(source)),
            mount_point: unescape_mount_field(mount_point),
            fs_type: fs_type.to_string(),
            read_only: options.split(',').any(|option| option == "ro"),
        });
    }

    Ok(entries)
}

/// Parse fstab lines; sources stay as written (`UUID=`, `LABEL=` or a path)
pub fn parse_fstab(input: &str) -> Vec<MountEntry> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let source = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next().unwrap_or("auto");
            let options = fields.next().unwrap_or("defaults");
            Some(MountEntry {
                source: unescape_mount_field(source),
                mount_point: unescape_mount_field(mount_point),
                fs_type: fs_type.to_string(),
                read_only: options.split(',').any(|option| option == "ro"),
            })
        })
        .collect()
}

/// Active swap devices from `/proc/swaps`
pub fn parse_swaps(input: &str) -> Vec<String> {
    input
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .map(|source| resolve_source(&unescape_mount_field(source)))
        .collect()
}

/// Follow `/dev/disk/by-*` links to the device node
fn resolve_source(source: &str) -> String {
    if source.starts_with("/dev/disk/") || source.starts_with("/dev/mapper/") {
        if let Ok(resolved) = fs::canonicalize(source) {
            return resolved.to_string_lossy().to_string();
        }
    }
    source.to_string()
}

fn unescape_mount_field(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1].is_ascii_digit()
            && bytes[index + 2].is_ascii_digit()
            && bytes[index + 3].is_ascii_digit()
        {
            let octal = &value[index + 1..index + 4];
            if let Ok(num) = u8::from_str_radix(octal, 8) {
                output.push(num as char);
                index += 4;
                continue;
            }
        }

        output.push(bytes[index] as char);
        index += 1;
    }

    output
}

/// Mount state from the running system
#[derive(Debug, Clone)]
pub struct SystemMountTable {
    mountinfo: PathBuf,
    fstab: PathBuf,
    swaps: PathBuf,
}

impl Default for SystemMountTable {
    fn default() -> Self {
        Self {
            mountinfo: PathBuf::from("/proc/self/mountinfo"),
            fstab: PathBuf::from("/etc/fstab"),
            swaps: PathBuf::from("/proc/swaps"),
        }
    }
}

impl SystemMountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read from other files, used with fixtures
    pub fn with_paths(mountinfo: PathBuf, fstab: PathBuf, swaps: PathBuf) -> Self {
        Self {
            mountinfo,
            fstab,
            swaps,
        }
    }

    fn read_snapshot(&self) -> Result<MountSnapshot> {
        let mounted = parse_mountinfo(&fs::read_to_string(&self.mountinfo)?)?;
        // A missing fstab or swaps file only means there is nothing configured.
        let fstab = fs::read_to_string(&self.fstab)
            .map(|text| parse_fstab(&text))
            .unwrap_or_default();
        let swaps = fs::read_to_string(&self.swaps)
            .map(|text| parse_swaps(&text))
            .unwrap_or_default();
        Ok(MountSnapshot {
            mounted,
            fstab,
            swaps,
        })
    }
}

impl MountTable for SystemMountTable {
    fn snapshot(&self) -> std::result::Result<MountSnapshot, StorageError> {
        self.read_snapshot()
            .map_err(|error| error.into_storage(StorageErrorKind::Internal))
    }

    fn usage(&self, mount_point: &str) -> std::result::Result<Option<MountUsage>, StorageError> {
        use nix::sys::statvfs::statvfs;

        let stats = match statvfs(mount_point) {
            Ok(stats) => stats,
            Err(error) => {
                tracing::debug!("statvfs failed for {mount_point}: {error}");
                return Ok(None);
            }
        };
        let block_size = stats.fragment_size() as u64;
        let block_size = if block_size > 0 {
            block_size
        } else {
            stats.block_size() as u64
        };
        Ok(Some(MountUsage {
            total: (stats.blocks() as u64).saturating_mul(block_size),
            free: (stats.blocks_free() as u64).saturating_mul(block_size),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn parses_mountinfo_and_filters_virtual_types() {
        let sample = "36 25 8:2 / / rw,relatime - ext4 /dev/nvme0n1p2 rw\n37 25 0:5 / /proc rw,nosuid,nodev,noexec,relatime - proc proc rw\n38 25 8:3 / /mnt/my\\040disk ro,relatime - vfat /dev/sdb1 ro\n";

        let mounts = parse_mountinfo(sample).expect("parse should succeed");
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].source, "/dev/nvme0n1p2");
        assert_eq!(mounts[0].mount_point, "/");
        assert!(!mounts[0].read_only);
        assert_eq!(mounts[1].mount_point, "/mnt/my disk");
        assert!(mounts[1].read_only);
    }

    #[test]
    fn rejects_malformed_mountinfo() {
        assert!(parse_mountinfo("not a mountinfo line\n").is_err());
    }

    #[test]
    fn parses_fstab_and_swaps() {
        let fstab = parse_fstab(
            "# comment\nUUID=1234 /home ext4 defaults 0 2\n\n/dev/sda3 none swap sw 0 0\n",
        );
        assert_eq!(fstab.len(), 2);
        assert_eq!(fstab[0].source, "UUID=1234");
        assert_eq!(fstab[0].mount_point, "/home");

        let swaps = parse_swaps(
            "Filename\tType\tSize\tUsed\tPriority\n/dev/sda3 partition 8388604 0 -2\n",
        );
        assert_eq!(swaps, vec!["/dev/sda3".to_string()]);
    }

    #[test]
    fn snapshot_reads_fixture_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mountinfo = dir.path().join("mountinfo");
        let mut file = fs::File::create(&mountinfo).expect("create mountinfo");
        writeln!(file, "36 25 8:2 / /data rw,relatime - xfs /dev/sdc1 rw").expect("write");

        let table = SystemMountTable::with_paths(
            mountinfo,
            dir.path().join("missing-fstab"),
            dir.path().join("missing-swaps"),
        );
        let snapshot = table.snapshot().expect("snapshot");
        assert!(snapshot.is_mounted("/dev/sdc1"));
        assert!(snapshot.fstab.is_empty());
        assert!(snapshot.swaps.is_empty());
    }
}

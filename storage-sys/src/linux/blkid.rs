// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem type, label and UUID cache from blkid

use std::collections::BTreeMap;

use storage_contracts::{FsInfo, FsInfoSnapshot, FsInfoSource, StorageError, StorageErrorKind};

use super::cmd::{parse_key_value, run_command};

/// Parse `blkid -o export`: one block of `KEY=value` lines per device
pub fn parse_export(output: &str) -> BTreeMap<String, FsInfo> {
    let mut entries = BTreeMap::new();
    let mut device: Option<String> = None;
    let mut info = FsInfo::default();

    let mut flush = |device: &mut Option<String>, info: &mut FsInfo| {
        if let Some(path) = device.take() {
            entries.insert(path, std::mem::take(info));
        }
        *info = FsInfo::default();
    };

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            flush(&mut device, &mut info);
            continue;
        }
        let Some((key, value)) = parse_key_value(line) else {
            continue;
        };
        match key {
            "DEVNAME" => {
                flush(&mut device, &mut info);
                device = Some(value.to_string());
            }
            "TYPE" => info.fs_type = Some(value.to_string()),
            "LABEL" => info.label = Some(value.to_string()),
            "UUID" => info.uuid = Some(value.to_string()),
            _ => {}
        }
    }
    flush(&mut device, &mut info);

    entries
}

/// Reads the whole blkid cache in one call
#[derive(Debug, Clone, Copy, Default)]
pub struct BlkidCache;

impl FsInfoSource for BlkidCache {
    fn snapshot(&self) -> Result<FsInfoSnapshot, StorageError> {
        // blkid exits with status 2 when it finds nothing at all.
        let output = match run_command("blkid", &["-o", "export"]) {
            Ok(output) => output,
            Err(crate::SysError::CommandFailed { stderr, .. }) if stderr.is_empty() => {
                String::new()
            }
            Err(error) => return Err(error.into_storage(StorageErrorKind::Internal)),
        };
        Ok(FsInfoSnapshot {
            entries: parse_export(&output),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_export_blocks() {
        let output = "DEVNAME=/dev/sda1\nUUID=8AA2-EE49\nTYPE=vfat\nPARTLABEL=esp\n\nDEVNAME=/dev/sda2\nLABEL=root\nUUID=4d8c2a88\nTYPE=ext4\n\nDEVNAME=/dev/sda3\nTYPE=LVM2_member\n";
        let entries = parse_export(output);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries["/dev/sda1"].fs_type.as_deref(), Some("vfat"));
        assert_eq!(entries["/dev/sda1"].label, None);
        assert_eq!(entries["/dev/sda2"].label.as_deref(), Some("root"));
        assert_eq!(entries["/dev/sda3"].fs_type.as_deref(), Some("LVM2_member"));
    }
}

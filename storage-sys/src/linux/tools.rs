// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem tools driven through their command line utilities

use std::sync::{Arc, LazyLock};

use storage_contracts::{
    FilesystemTool, FsCapabilities, FsSupport, StorageError, StorageErrorKind,
};
use storage_types::{FilesystemType, Partition, SectorUsage};

use super::cmd::{parse_key_value, run_command, tool_available};
use crate::capabilities::CapabilityTable;

const MIB: u64 = 1024 * 1024;

/// How a filesystem reports its usage offline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UsageProbe {
    Dumpe2fs,
    XfsDb,
}

/// How a filesystem is resized offline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resizer {
    /// `resize2fs <device> [<KiB>K]`
    Resize2fs,
    /// `ntfsresize --force --force [-s <bytes>] <device>`
    Ntfsresize,
}

/// Command line recipe for one filesystem
#[derive(Debug, Clone)]
pub struct FsCommandSpec {
    pub filesystem: FilesystemType,
    feature_enabled: bool,
    mkfs: &'static str,
    mkfs_args: &'static [&'static str],
    label_flag: &'static str,
    check: Option<(&'static str, &'static [&'static str])>,
    resizer: Option<Resizer>,
    usage: Option<UsageProbe>,
    min_size: u64,
}

impl FsCommandSpec {
    fn can_create(&self) -> bool {
        tool_available(self.mkfs)
    }

    fn can_check(&self) -> bool {
        self.check.is_some_and(|(command, _)| tool_available(command))
    }

    fn can_resize(&self) -> bool {
        match self.resizer {
            Some(Resizer::Resize2fs) => tool_available("resize2fs"),
            Some(Resizer::Ntfsresize) => tool_available("ntfsresize"),
            None => false,
        }
    }

    fn can_read_usage(&self) -> bool {
        match self.usage {
            Some(UsageProbe::Dumpe2fs) => tool_available("dumpe2fs"),
            Some(UsageProbe::XfsDb) => tool_available("xfs_db"),
            None => false,
        }
    }
}

static FS_COMMANDS: LazyLock<Vec<FsCommandSpec>> = LazyLock::new(|| {
    let ext = |filesystem, mkfs| FsCommandSpec {
        filesystem,
        feature_enabled: cfg!(feature = "fs-ext4"),
        mkfs,
        mkfs_args: &["-F", "-q"],
        label_flag: "-L",
        check: Some(("e2fsck", &["-f", "-y", "-v"])),
        resizer: Some(Resizer::Resize2fs),
        usage: Some(UsageProbe::Dumpe2fs),
        min_size: 0,
    };

    vec![
        ext(FilesystemType::Ext2, "mkfs.ext2"),
        ext(FilesystemType::Ext3, "mkfs.ext3"),
        ext(FilesystemType::Ext4, "mkfs.ext4"),
        FsCommandSpec {
            filesystem: FilesystemType::Xfs,
            feature_enabled: cfg!(feature = "fs-xfs"),
            mkfs: "mkfs.xfs",
            mkfs_args: &["-f"],
            label_flag: "-L",
            check: Some(("xfs_repair", &[])),
            resizer: None,
            usage: Some(UsageProbe::XfsDb),
            min_size: 300 * MIB,
        },
        FsCommandSpec {
            filesystem: FilesystemType::Btrfs,
            feature_enabled: cfg!(feature = "fs-btrfs"),
            mkfs: "mkfs.btrfs",
            mkfs_args: &["-f"],
            label_flag: "-L",
            check: Some(("btrfs", &["check"])),
            resizer: None,
            usage: None,
            min_size: 256 * MIB,
        },
        FsCommandSpec {
            filesystem: FilesystemType::Fat32,
            feature_enabled: cfg!(feature = "fs-vfat"),
            mkfs: "mkfs.fat",
            mkfs_args: &["-F", "32"],
            label_flag: "-n",
            check: Some(("fsck.fat", &["-a", "-w", "-v"])),
            resizer: None,
            usage: None,
            min_size: 33 * MIB,
        },
        FsCommandSpec {
            filesystem: FilesystemType::Fat16,
            feature_enabled: cfg!(feature = "fs-vfat"),
            mkfs: "mkfs.fat",
            mkfs_args: &["-F", "16"],
            label_flag: "-n",
            check: Some(("fsck.fat", &["-a", "-w", "-v"])),
            resizer: None,
            usage: None,
            min_size: 16 * MIB,
        },
        FsCommandSpec {
            filesystem: FilesystemType::Ntfs,
            feature_enabled: cfg!(feature = "fs-ntfs"),
            mkfs: "mkfs.ntfs",
            mkfs_args: &["-Q", "-F"],
            label_flag: "-L",
            check: Some(("ntfsresize", &["--info", "--force", "--no-progress-bar"])),
            resizer: Some(Resizer::Ntfsresize),
            usage: None,
            min_size: MIB,
        },
        FsCommandSpec {
            filesystem: FilesystemType::Exfat,
            feature_enabled: cfg!(feature = "fs-exfat"),
            mkfs: "mkfs.exfat",
            mkfs_args: &[],
            label_flag: "-L",
            check: Some(("fsck.exfat", &["-y"])),
            resizer: None,
            usage: None,
            min_size: MIB,
        },
        FsCommandSpec {
            filesystem: FilesystemType::LinuxSwap,
            feature_enabled: cfg!(feature = "fs-swap"),
            mkfs: "mkswap",
            mkfs_args: &[],
            label_flag: "-L",
            check: None,
            resizer: None,
            usage: None,
            min_size: 40 * 1024,
        },
    ]
});

/// A filesystem handled by spawning its utilities
#[derive(Debug, Clone)]
pub struct CommandFsTool {
    spec: &'static FsCommandSpec,
}

impl CommandFsTool {
    pub fn for_filesystem(filesystem: FilesystemType) -> Option<Self> {
        FS_COMMANDS
            .iter()
            .find(|spec| spec.filesystem == filesystem && spec.feature_enabled)
            .map(|spec| Self { spec })
    }

    fn failed(&self, partition: &Partition, error: crate::SysError) -> StorageError {
        tracing::error!("{} on {}: {error}", self.spec.filesystem, partition.path);
        error.into_storage(StorageErrorKind::FilesystemOperationFailed)
    }
}

impl FilesystemTool for CommandFsTool {
    fn filesystem(&self) -> FilesystemType {
        self.spec.filesystem
    }

    fn min_size(&self) -> u64 {
        self.spec.min_size
    }

    fn read_usage(&self, partition: &Partition) -> Result<Option<SectorUsage>, StorageError> {
        let sector_size = partition.sector_size;
        match self.spec.usage {
            Some(UsageProbe::Dumpe2fs) => {
                let output = run_command("dumpe2fs", &["-h", &partition.path])
                    .map_err(|error| self.failed(partition, error))?;
                Ok(parse_dumpe2fs(&output, sector_size))
            }
            Some(UsageProbe::XfsDb) => {
                let output = run_command(
                    "xfs_db",
                    &[
                        "-r",
                        "-c",
                        "sb 0",
                        "-c",
                        "print blocksize dblocks fdblocks",
                        &partition.path,
                    ],
                )
                .map_err(|error| self.failed(partition, error))?;
                Ok(parse_xfs_db(&output, sector_size))
            }
            None => Ok(None),
        }
    }

    fn check_repair(&self, partition: &Partition) -> Result<(), StorageError> {
        let Some((command, args)) = self.spec.check else {
            return Err(StorageError::new(
                StorageErrorKind::Unsupported,
                format!("no check for {}", self.spec.filesystem),
            ));
        };
        let mut args: Vec<&str> = args.to_vec();
        args.push(partition.path.as_str());
        run_command(command, &args)
            .map(|_| ())
            .map_err(|error| self.failed(partition, error))
    }

    fn create(&self, partition: &Partition, label: Option<&str>) -> Result<(), StorageError> {
        let mut args: Vec<&str> = self.spec.mkfs_args.to_vec();
        if let Some(label) = label.filter(|label| !label.is_empty()) {
            args.extend([self.spec.label_flag, label]);
        }
        args.push(partition.path.as_str());
        tracing::info!("creating {} on {}", self.spec.filesystem, partition.path);
        run_command(self.spec.mkfs, &args)
            .map(|_| ())
            .map_err(|error| self.failed(partition, error))
    }

    fn resize(&self, partition: &Partition, fill: bool) -> Result<(), StorageError> {
        let size = partition.byte_length();
        let result = match self.spec.resizer {
            Some(Resizer::Resize2fs) => {
                let target = format!("{}K", size / 1024);
                let mut args = vec![partition.path.as_str()];
                if !fill {
                    args.push(&target);
                }
                run_command("resize2fs", &args)
            }
            Some(Resizer::Ntfsresize) => {
                let target = size.to_string();
                let mut args: Vec<&str> = vec!["--force", "--force", "--no-progress-bar"];
                if !fill {
                    args.extend(["-s", target.as_str()]);
                }
                args.push(partition.path.as_str());
                run_command("ntfsresize", &args)
            }
            None => {
                return Err(StorageError::new(
                    StorageErrorKind::Unsupported,
                    format!("{} cannot be resized offline", self.spec.filesystem),
                ));
            }
        };
        result
            .map(|_| ())
            .map_err(|error| self.failed(partition, error))
    }
}

fn parse_dumpe2fs(output: &str, sector_size: u64) -> Option<SectorUsage> {
    let mut block_count = None;
    let mut free_blocks = None;
    let mut block_size = None;
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().parse::<u64>().ok();
        match key.trim() {
            "Block count" => block_count = value,
            "Free blocks" => free_blocks = value,
            "Block size" => block_size = value,
            _ => {}
        }
    }
    let block_size = block_size?;
    Some(SectorUsage::from_bytes(
        block_count? * block_size,
        free_blocks? * block_size,
        sector_size,
    ))
}

fn parse_xfs_db(output: &str, sector_size: u64) -> Option<SectorUsage> {
    let mut block_size = None;
    let mut total = None;
    let mut free = None;
    for line in output.lines() {
        let Some((key, value)) = parse_key_value(line) else {
            continue;
        };
        let value = value.parse::<u64>().ok();
        match key {
            "blocksize" => block_size = value,
            "dblocks" => total = value,
            "fdblocks" => free = value,
            _ => {}
        }
    }
    let block_size = block_size?;
    Some(SectorUsage::from_bytes(total? * block_size, free? * block_size, sector_size))
}

/// Capabilities for every filesystem whose tools are installed.
///
/// Busy detection, mounted usage, labels and UUIDs come from the mount table
/// and the blkid cache; everything else needs the matching utility.
pub fn system_capabilities() -> CapabilityTable {
    let mut table = CapabilityTable::new();
    for spec in FS_COMMANDS.iter().filter(|spec| spec.feature_enabled) {
        let external = |available: bool| {
            if available {
                FsSupport::External
            } else {
                FsSupport::Unsupported
            }
        };
        let resize = external(spec.can_resize());
        let capabilities = FsCapabilities {
            busy: FsSupport::Internal,
            read_label: FsSupport::Internal,
            read_uuid: FsSupport::Internal,
            read_usage: external(spec.can_read_usage()),
            online_read_usage: FsSupport::Internal,
            check: external(spec.can_check()),
            create: external(spec.can_create()),
            grow: resize,
            shrink: resize,
            online_grow: FsSupport::Unsupported,
            online_shrink: FsSupport::Unsupported,
        };
        let tool = CommandFsTool::for_filesystem(spec.filesystem)
            .map(|tool| Arc::new(tool) as Arc<dyn FilesystemTool>);
        table.register(spec.filesystem, capabilities, tool);
    }

    // Contents are opaque but their presence is still detected.
    for filesystem in [FilesystemType::Lvm2Pv, FilesystemType::Luks, FilesystemType::LinuxRaid] {
        table.register(
            filesystem,
            FsCapabilities {
                busy: FsSupport::Internal,
                read_label: FsSupport::Internal,
                read_uuid: FsSupport::Internal,
                ..Default::default()
            },
            None,
        );
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dumpe2fs_header() {
        let output = "\
Filesystem volume name:   data
Block count:              262144
Reserved block count:     13107
Free blocks:              249189
Block size:               4096
";
        let usage = parse_dumpe2fs(output, 512).expect("usage");
        assert_eq!(usage.used, (262_144 - 249_189) * 8);
        assert_eq!(usage.unused, 249_189 * 8);
    }

    #[test]
    fn parses_xfs_db_fields() {
        let output = "blocksize = 4096\ndblocks = 1000\nfdblocks = 250\n";
        let usage = parse_xfs_db(output, 4096).expect("usage");
        assert_eq!(usage.used, 750);
        assert_eq!(usage.unused, 250);
    }

    #[test]
    fn incomplete_headers_give_no_usage() {
        assert!(parse_dumpe2fs("Block count: 10\n", 512).is_none());
    }

    #[test]
    fn ext_filesystems_share_a_recipe() {
        let tool = CommandFsTool::for_filesystem(FilesystemType::Ext3).expect("ext3 tool");
        assert_eq!(tool.spec.mkfs, "mkfs.ext3");
        assert_eq!(tool.spec.resizer, Some(Resizer::Resize2fs));
        assert!(CommandFsTool::for_filesystem(FilesystemType::Reiser4).is_none());
    }
}

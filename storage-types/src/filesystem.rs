//! Filesystem and container type identifiers
//!
//! Besides real on-disk formats the enum carries a few sentinels used by the
//! partition model: `Unknown` (nothing recognized), `Unformatted` (no content
//! expected yet), `Unallocated` (free space), `Cleared` (signatures erased)
//! and `Unsupported`. `Extended` marks an MBR extended container.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilesystemType {
    // === Sentinels ===
    Unknown,
    Unformatted,
    Unallocated,
    Cleared,
    Unsupported,
    Extended,

    // === Filesystems ===
    Apfs,
    Btrfs,
    Exfat,
    Ext2,
    Ext3,
    Ext4,
    F2fs,
    Fat16,
    Fat32,
    Hfs,
    HfsPlus,
    Iso9660,
    Jfs,
    LinuxSwap,
    Nilfs2,
    Ntfs,
    Reiser4,
    Reiserfs,
    Udf,
    Xfs,

    // === Containers and other signatures ===
    Bcache,
    Bitlocker,
    Grub2CoreImg,
    LinuxRaid,
    Luks,
    Lvm2Pv,
    ZfsMember,
}

impl FilesystemType {
    /// Map a type name as reported by blkid, libblkid caches or table tools.
    ///
    /// Names that are not recognized map to `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "ext2" => Self::Ext2,
            "ext3" => Self::Ext3,
            "ext4" | "ext4dev" => Self::Ext4,
            "xfs" => Self::Xfs,
            "btrfs" => Self::Btrfs,
            "vfat" | "fat32" | "fat" => Self::Fat32,
            "fat16" | "fat12" | "msdos" => Self::Fat16,
            "ntfs" | "ntfs3" => Self::Ntfs,
            "exfat" => Self::Exfat,
            "swap" | "linux-swap" | "linux-swap(v0)" | "linux-swap(v1)" => Self::LinuxSwap,
            "f2fs" => Self::F2fs,
            "jfs" => Self::Jfs,
            "reiserfs" => Self::Reiserfs,
            "reiser4" => Self::Reiser4,
            "nilfs2" => Self::Nilfs2,
            "hfs" => Self::Hfs,
            "hfsplus" | "hfs+" => Self::HfsPlus,
            "udf" => Self::Udf,
            "iso9660" => Self::Iso9660,
            "apfs" => Self::Apfs,
            "zfs_member" | "zfs" => Self::ZfsMember,
            "lvm2_member" | "lvm2 pv" | "lvm2pv" => Self::Lvm2Pv,
            "crypto_luks" | "luks" => Self::Luks,
            "bitlocker" => Self::Bitlocker,
            "linux_raid_member" | "linux-raid" => Self::LinuxRaid,
            "bcache" => Self::Bcache,
            "grub2 core.img" => Self::Grub2CoreImg,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Unformatted => "unformatted",
            Self::Unallocated => "unallocated",
            Self::Cleared => "cleared",
            Self::Unsupported => "unsupported",
            Self::Extended => "extended",
            Self::Apfs => "apfs",
            Self::Btrfs => "btrfs",
            Self::Exfat => "exfat",
            Self::Ext2 => "ext2",
            Self::Ext3 => "ext3",
            Self::Ext4 => "ext4",
            Self::F2fs => "f2fs",
            Self::Fat16 => "fat16",
            Self::Fat32 => "fat32",
            Self::Hfs => "hfs",
            Self::HfsPlus => "hfsplus",
            Self::Iso9660 => "iso9660",
            Self::Jfs => "jfs",
            Self::LinuxSwap => "linux-swap",
            Self::Nilfs2 => "nilfs2",
            Self::Ntfs => "ntfs",
            Self::Reiser4 => "reiser4",
            Self::Reiserfs => "reiserfs",
            Self::Udf => "udf",
            Self::Xfs => "xfs",
            Self::Bcache => "bcache",
            Self::Bitlocker => "bitlocker",
            Self::Grub2CoreImg => "grub2 core.img",
            Self::LinuxRaid => "linux-raid",
            Self::Luks => "luks",
            Self::Lvm2Pv => "lvm2 pv",
            Self::ZfsMember => "zfs",
        }
    }

    /// True for the model sentinels that do not name an on-disk format
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self,
            Self::Unknown
                | Self::Unformatted
                | Self::Unallocated
                | Self::Cleared
                | Self::Unsupported
                | Self::Extended
        )
    }

    /// True when the type names real content found on disk
    pub fn is_recognized(&self) -> bool {
        !self.is_sentinel()
    }

    /// Content that is used by a stacking layer rather than mounted directly.
    ///
    /// Partitions holding these never report mount points.
    pub fn is_stacked_member(&self) -> bool {
        matches!(
            self,
            Self::LinuxSwap | Self::Lvm2Pv | Self::Luks | Self::LinuxRaid | Self::Bcache
        )
    }

    /// Whether a partition holding this type carries data a move would have
    /// to relocate
    pub fn holds_data(&self) -> bool {
        !matches!(
            self,
            Self::Unformatted | Self::Unallocated | Self::Cleared | Self::Extended
        )
    }
}

impl std::fmt::Display for FilesystemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

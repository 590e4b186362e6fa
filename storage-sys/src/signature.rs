// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem and container detection from raw sector contents

use storage_contracts::SectorReader;
use storage_types::FilesystemType;

/// One magic-byte test; both parts must match when `secondary` is set
#[derive(Debug, Clone, Copy)]
pub struct SignatureRule {
    pub offset: u64,
    pub magic: &'static [u8],
    pub secondary: Option<(u64, &'static [u8])>,
    pub filesystem: FilesystemType,
}

const fn rule(offset: u64, magic: &'static [u8], filesystem: FilesystemType) -> SignatureRule {
    SignatureRule {
        offset,
        magic,
        secondary: None,
        filesystem,
    }
}

const fn rule2(
    offset: u64,
    magic: &'static [u8],
    secondary_offset: u64,
    secondary_magic: &'static [u8],
    filesystem: FilesystemType,
) -> SignatureRule {
    SignatureRule {
        offset,
        magic,
        secondary: Some((secondary_offset, secondary_magic)),
        filesystem,
    }
}

/// Checked in order, first match wins.
///
/// Only formats the table tooling does not reliably report are listed.
pub const SIGNATURE_RULES: &[SignatureRule] = &[
    rule(0, b"LUKS\xBA\xBE", FilesystemType::Luks),
    rule(3, b"-FVE-FS-", FilesystemType::Bitlocker),
    // GRUB2 core.img x86 prologues
    rule(0, b"\x52\x56\xBE\x1B", FilesystemType::Grub2CoreImg),
    rule(0, b"\x52\x56\xBE\x6F", FilesystemType::Grub2CoreImg),
    rule(0, b"\x52\xE8\x28\x01", FilesystemType::Grub2CoreImg),
    rule(0, b"\x52\xBF\xF4\x81", FilesystemType::Grub2CoreImg),
    rule(0, b"\x52\x56\xBE\x63", FilesystemType::Grub2CoreImg),
    rule(0, b"\x52\x56\xBE\x56", FilesystemType::Grub2CoreImg),
    rule2(24, b"\x01\x00", 32, b"NXSB", FilesystemType::Apfs),
    rule2(512, b"LABELONE", 536, b"LVM2", FilesystemType::Lvm2Pv),
    rule(1030, b"\x34\x34", FilesystemType::Nilfs2),
    rule(65536, b"ReIsEr4", FilesystemType::Reiser4),
    rule(65600, b"_BHRfS_M", FilesystemType::Btrfs),
];

/// Resolve the content type of a byte range.
///
/// A hint naming a known type wins; otherwise the raw signature table is
/// scanned. Never fails: unreadable offsets skip their rule.
pub fn detect_filesystem(
    reader: &mut dyn SectorReader,
    sector_size: u64,
    table_hint: Option<&str>,
) -> FilesystemType {
    if let Some(hint) = table_hint {
        let filesystem = FilesystemType::from_name(hint);
        if filesystem.is_recognized() {
            return filesystem;
        }
        tracing::trace!("ignoring unrecognized type hint '{hint}'");
    }

    scan_signatures(reader, sector_size)
}

/// Match `SIGNATURE_RULES` against the reader's contents
pub fn scan_signatures(reader: &mut dyn SectorReader, sector_size: u64) -> FilesystemType {
    if sector_size == 0 {
        return FilesystemType::Unknown;
    }

    let mut window = SectorWindow::new(sector_size);
    for rule in SIGNATURE_RULES {
        if !window.matches(reader, rule.offset, rule.magic) {
            continue;
        }
        let secondary_ok = match rule.secondary {
            Some((offset, magic)) => window.matches(reader, offset, magic),
            None => true,
        };
        if secondary_ok {
            tracing::debug!(
                "signature at offset {} identifies {}",
                rule.offset,
                rule.filesystem
            );
            return rule.filesystem;
        }
    }

    FilesystemType::Unknown
}

/// Sector-aligned read buffer reused while consecutive rules hit the same
/// sectors
struct SectorWindow {
    sector_size: u64,
    loaded: Option<(u64, usize)>,
    buf: Vec<u8>,
}

impl SectorWindow {
    fn new(sector_size: u64) -> Self {
        Self {
            sector_size,
            loaded: None,
            buf: Vec::new(),
        }
    }

    fn matches(&mut self, reader: &mut dyn SectorReader, offset: u64, magic: &[u8]) -> bool {
        let start = offset / self.sector_size * self.sector_size;
        let within = (offset - start) as usize;
        let sector_size = self.sector_size as usize;
        let span = (within + magic.len()).div_ceil(sector_size) * sector_size;

        if self.loaded != Some((start, span)) {
            if start + span as u64 > reader.size_bytes() {
                return false;
            }
            self.buf.resize(span, 0);
            if let Err(error) = reader.read_at(start, &mut self.buf) {
                tracing::debug!("skipping signature at offset {offset}: {error}");
                self.loaded = None;
                return false;
            }
            self.loaded = Some((start, span));
        }

        self.buf[within..within + magic.len()] == *magic
    }
}

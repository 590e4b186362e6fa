// SPDX-License-Identifier: GPL-3.0-only

//! Reads one block device and builds its partition model

use storage_contracts::{
    BlockIo, FsInfoSnapshot, SectorReader, StorageError, StorageErrorKind, TableBackend,
    TableSession, WindowReader,
};
use storage_types::{Device, FilesystemType, TableKind};

use crate::model::{build_partitioned, build_unpartitioned, TableLayout};
use crate::signature::detect_filesystem;

/// Table format name some backends report for a device with only a loop label
pub const LOOP_TABLE_LABEL: &str = "loop";

/// A probed device together with the table session it was read through
pub struct ProbedDevice {
    pub device: Device,
    pub session: Box<dyn TableSession>,
}

pub struct DeviceProbe<'a> {
    backend: &'a dyn TableBackend,
    block_io: &'a dyn BlockIo,
    fs_info: &'a FsInfoSnapshot,
}

impl<'a> DeviceProbe<'a> {
    pub fn new(
        backend: &'a dyn TableBackend,
        block_io: &'a dyn BlockIo,
        fs_info: &'a FsInfoSnapshot,
    ) -> Self {
        Self {
            backend,
            block_io,
            fs_info,
        }
    }

    /// Whether the first sector of `path` can be read
    pub fn is_usable(&self, path: &str, sector_size: u64) -> bool {
        let Ok(mut reader) = self.block_io.open_read(path) else {
            return false;
        };
        let mut first = vec![0u8; sector_size.max(512) as usize];
        reader.read_at(0, &mut first).is_ok()
    }

    pub fn probe_device(&self, path: &str) -> Result<ProbedDevice, StorageError> {
        let info = self.backend.device_info(path).map_err(|error| {
            StorageError::new(StorageErrorKind::DeviceUnreadable, error.message)
        })?;
        if info.sector_size == 0 || info.length == 0 {
            return Err(StorageError::new(
                StorageErrorKind::DeviceUnreadable,
                format!("{path} reports no media"),
            ));
        }
        if !self.is_usable(path, info.sector_size) {
            return Err(StorageError::new(
                StorageErrorKind::DeviceUnreadable,
                format!("cannot read the first sector of {path}"),
            ));
        }

        let mut reader = self.block_io.open_read(path)?;
        let session = self.backend.open(path)?;
        let sector_size = info.sector_size;

        let device = match session.table_label() {
            Some(label) if label != LOOP_TABLE_LABEL => {
                let layout = TableLayout {
                    label,
                    max_primaries: session.max_primaries(),
                    max_name_length: session.max_name_length(),
                };
                let records = session.records();
                let mut device = build_partitioned(&info, &layout, &records, |record| {
                    let hint = self
                        .fs_info
                        .fs_type(&record.path)
                        .or(record.fs_hint.as_deref());
                    let mut window = WindowReader::new(
                        reader.as_mut(),
                        record.range.start * sector_size,
                        record.range.byte_length(sector_size),
                    );
                    detect_filesystem(&mut window, sector_size, hint)
                });
                if device.table.is_gpt() {
                    device.table_needs_repair =
                        gpt_backup_misplaced(reader.as_mut(), sector_size, info.length);
                }
                device
            }
            Some(_) => build_unpartitioned(&info, TableKind::Loop, FilesystemType::Unknown),
            None => {
                let whole =
                    detect_filesystem(reader.as_mut(), sector_size, self.fs_info.fs_type(path));
                if whole.is_recognized() {
                    build_unpartitioned(&info, TableKind::None, whole)
                } else {
                    build_unpartitioned(&info, TableKind::Unrecognized, FilesystemType::Unallocated)
                }
            }
        };

        tracing::debug!(
            "{path}: table {}, {} entries",
            device.table.label(),
            device.arena.len()
        );
        Ok(ProbedDevice { device, session })
    }
}

/// Protective MBR present and the GPT backup header is not on the last sector
pub fn gpt_backup_misplaced(reader: &mut dyn SectorReader, sector_size: u64, length: u64) -> bool {
    let mut mbr = vec![0u8; sector_size as usize];
    if reader.read_at(0, &mut mbr).is_err() || mbr.get(0x1C2) != Some(&0xEE) {
        return false;
    }

    let mut header = vec![0u8; sector_size as usize];
    if reader.read_at(sector_size, &mut header).is_err() || &header[0..8] != b"EFI PART" {
        return false;
    }

    let mut alternate = [0u8; 8];
    alternate.copy_from_slice(&header[32..40]);
    u64::from_le_bytes(alternate) != length.saturating_sub(1)
}

// SPDX-License-Identifier: GPL-3.0-only

//! Sparse in-memory block devices

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use storage_contracts::{BlockIo, SectorReader, SectorWriter, StorageError, StorageErrorKind};

use crate::ledger::{Call, CallLedger};

const CHUNK: u64 = 4096;

#[derive(Debug, Default)]
struct Image {
    size: u64,
    chunks: BTreeMap<u64, Vec<u8>>,
}

impl Image {
    fn read(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        check_bounds(self.size, offset, buf.len())?;
        for (index, byte) in buf.iter_mut().enumerate() {
            let position = offset + index as u64;
            let chunk = position / CHUNK * CHUNK;
            *byte = self
                .chunks
                .get(&chunk)
                .map(|data| data[(position - chunk) as usize])
                .unwrap_or(0);
        }
        Ok(())
    }

    fn write(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        check_bounds(self.size, offset, buf.len())?;
        for (index, byte) in buf.iter().enumerate() {
            let position = offset + index as u64;
            let chunk = position / CHUNK * CHUNK;
            let data = self
                .chunks
                .entry(chunk)
                .or_insert_with(|| vec![0; CHUNK as usize]);
            data[(position - chunk) as usize] = *byte;
        }
        Ok(())
    }
}

fn check_bounds(size: u64, offset: u64, len: usize) -> io::Result<()> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= size => Ok(()),
        _ => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("access of {len} bytes at {offset} beyond device size {size}"),
        )),
    }
}

/// A sparse disk image; unwritten bytes read as zero
#[derive(Debug, Clone, Default)]
pub struct MemoryDisk {
    image: Arc<Mutex<Image>>,
}

impl MemoryDisk {
    pub fn new(size: u64) -> Self {
        Self {
            image: Arc::new(Mutex::new(Image {
                size,
                chunks: BTreeMap::new(),
            })),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Image> {
        self.image
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn size(&self) -> u64 {
        self.guard().size
    }

    /// Place `bytes` at `offset`, used to plant signatures
    pub fn with_bytes(self, offset: u64, bytes: &[u8]) -> Self {
        // Out-of-range fixtures are a test bug; leave the image untouched.
        let _ = self.guard().write(offset, bytes);
        self
    }

    pub fn read_bytes(&self, offset: u64, length: usize) -> Vec<u8> {
        let mut buf = vec![0; length];
        let _ = self.guard().read(offset, &mut buf);
        buf
    }
}

struct DiskHandle {
    disk: MemoryDisk,
    path: String,
    ledger: CallLedger,
}

impl SectorReader for DiskHandle {
    fn size_bytes(&self) -> u64 {
        self.disk.size()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.disk.guard().read(offset, buf)
    }
}

impl SectorWriter for DiskHandle {
    fn size_bytes(&self) -> u64 {
        self.disk.size()
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.ledger.record(Call::BlockWrite {
            path: self.path.clone(),
            offset,
            length: buf.len() as u64,
        });
        self.disk.guard().write(offset, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// `BlockIo` over a set of named memory disks
#[derive(Debug, Clone, Default)]
pub struct MemoryBlockIo {
    disks: Arc<Mutex<BTreeMap<String, MemoryDisk>>>,
    unreadable: Arc<Mutex<BTreeSet<String>>>,
    ledger: CallLedger,
}

impl MemoryBlockIo {
    pub fn new(ledger: CallLedger) -> Self {
        Self {
            ledger,
            ..Self::default()
        }
    }

    pub fn insert(&self, path: &str, disk: MemoryDisk) {
        self.disks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.to_string(), disk);
    }

    /// Make every open of `path` fail
    pub fn make_unreadable(&self, path: &str) {
        self.unreadable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.to_string());
    }

    pub fn disk(&self, path: &str) -> Option<MemoryDisk> {
        self.disks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(path)
            .cloned()
    }

    fn handle(&self, path: &str) -> Result<DiskHandle, StorageError> {
        let blocked = self
            .unreadable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(path);
        let disk = self.disk(path).filter(|_| !blocked).ok_or_else(|| {
            StorageError::new(
                StorageErrorKind::DeviceUnreadable,
                format!("cannot open {path}"),
            )
        })?;
        Ok(DiskHandle {
            disk,
            path: path.to_string(),
            ledger: self.ledger.clone(),
        })
    }
}

impl BlockIo for MemoryBlockIo {
    fn open_read(&self, path: &str) -> Result<Box<dyn SectorReader>, StorageError> {
        Ok(Box::new(self.handle(path)?))
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn SectorWriter>, StorageError> {
        Ok(Box::new(self.handle(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_disk_reads_zero_and_planted_bytes() {
        let disk = MemoryDisk::new(1 << 40).with_bytes(65600, b"_BHRfS_M");
        assert_eq!(disk.read_bytes(65600, 8), b"_BHRfS_M".to_vec());
        assert_eq!(disk.read_bytes(0, 4), vec![0; 4]);
    }

    #[test]
    fn reads_past_end_fail() {
        let io = MemoryBlockIo::default();
        io.insert("/dev/sda", MemoryDisk::new(512));
        let mut reader = io.open_read("/dev/sda").expect("open");
        let mut buf = [0u8; 16];
        assert!(reader.read_at(510, &mut buf).is_err());
    }

    #[test]
    fn unreadable_devices_fail_to_open() {
        let io = MemoryBlockIo::default();
        io.insert("/dev/sdz", MemoryDisk::new(4096));
        io.make_unreadable("/dev/sdz");
        let error = io.open_read("/dev/sdz").err().expect("open must fail");
        assert_eq!(error.kind, StorageErrorKind::DeviceUnreadable);
    }
}

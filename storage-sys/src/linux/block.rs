// SPDX-License-Identifier: GPL-3.0-only

//! Block I/O on device nodes

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;

use storage_contracts::{BlockIo, SectorReader, SectorWriter, StorageError, StorageErrorKind};

use crate::SysError;

struct DeviceFile {
    file: File,
    size: u64,
}

impl DeviceFile {
    fn open(path: &str, write: bool) -> io::Result<Self> {
        let mut file = OpenOptions::new().read(true).write(write).open(path)?;
        // Block devices report a zero length in metadata; seek to the end instead.
        let size = io::Seek::seek(&mut file, io::SeekFrom::End(0))?;
        Ok(Self { file, size })
    }
}

impl SectorReader for DeviceFile {
    fn size_bytes(&self) -> u64 {
        self.size
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.read_exact_at(buf, offset)
    }
}

impl SectorWriter for DeviceFile {
    fn size_bytes(&self) -> u64 {
        self.size
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.file.write_all_at(buf, offset)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}

/// Reads and writes device nodes directly
#[derive(Debug, Clone, Copy, Default)]
pub struct FileBlockIo;

impl BlockIo for FileBlockIo {
    fn open_read(&self, path: &str) -> Result<Box<dyn SectorReader>, StorageError> {
        DeviceFile::open(path, false)
            .map(|device| Box::new(device) as Box<dyn SectorReader>)
            .map_err(|error| SysError::Io(error).into_storage(StorageErrorKind::DeviceUnreadable))
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn SectorWriter>, StorageError> {
        DeviceFile::open(path, true)
            .map(|device| Box::new(device) as Box<dyn SectorWriter>)
            .map_err(|error| SysError::Io(error).into_storage(StorageErrorKind::Internal))
    }
}

// SPDX-License-Identifier: GPL-3.0-only

use std::io;

use crate::StorageError;

/// Random-access reads over a device or a window of one
pub trait SectorReader {
    /// Readable size in bytes
    fn size_bytes(&self) -> u64;

    /// Fill `buf` from `offset`; short reads are errors
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

pub trait SectorWriter {
    fn size_bytes(&self) -> u64;

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// Opens block devices for raw access
pub trait BlockIo: Send + Sync {
    fn open_read(&self, path: &str) -> Result<Box<dyn SectorReader>, StorageError>;

    fn open_write(&self, path: &str) -> Result<Box<dyn SectorWriter>, StorageError>;
}

/// Restricts a reader to `[offset, offset + length)` of another reader
pub struct WindowReader<'a> {
    inner: &'a mut dyn SectorReader,
    offset: u64,
    length: u64,
}

impl<'a> WindowReader<'a> {
    pub fn new(inner: &'a mut dyn SectorReader, offset: u64, length: u64) -> Self {
        let length = length.min(inner.size_bytes().saturating_sub(offset));
        Self {
            inner,
            offset,
            length,
        }
    }
}

impl SectorReader for WindowReader<'_> {
    fn size_bytes(&self) -> u64 {
        self.length
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let end = offset
            .checked_add(buf.len() as u64)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "offset overflow"))?;
        if end > self.length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read of {} bytes at {offset} past window end {}", buf.len(), self.length),
            ));
        }
        self.inner.read_at(self.offset + offset, buf)
    }
}

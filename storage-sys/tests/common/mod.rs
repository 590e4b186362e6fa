// SPDX-License-Identifier: GPL-3.0-only

#![allow(dead_code)]

use std::sync::Arc;

use storage_contracts::PartitionRecord;
use storage_sys::{CapabilityTable, Collaborators, EngineConfig, StorageEngine};
use storage_testing::{
    CallLedger, FakeCrypt, FakeFsInfo, FakeFsTool, FakeMounts, FakeTableBackend, MemoryBlockIo,
    MemoryDisk,
};
use storage_types::FilesystemType;

pub const SECTOR: u64 = 512;
pub const GIB_SECTORS: u64 = 1024 * 1024 * 1024 / SECTOR;

/// Fake system shared by an engine and the assertions made about it
pub struct Harness {
    pub ledger: CallLedger,
    pub table: FakeTableBackend,
    pub io: MemoryBlockIo,
    pub crypt: FakeCrypt,
}

impl Harness {
    pub fn new() -> Self {
        let ledger = CallLedger::new();
        Self {
            table: FakeTableBackend::new(ledger.clone()),
            io: MemoryBlockIo::new(ledger.clone()),
            crypt: FakeCrypt::new(ledger.clone()),
            ledger,
        }
    }

    pub fn add_disk(
        &self,
        path: &str,
        length: u64,
        label: Option<&str>,
        records: Vec<PartitionRecord>,
    ) {
        self.table.add_device(path, SECTOR, length, label, records);
        self.io.insert(path, MemoryDisk::new(length * SECTOR));
    }

    /// A tool that sees the table as committed whenever it resizes
    pub fn tool(&self, filesystem: FilesystemType) -> FakeFsTool {
        FakeFsTool::new(filesystem, self.ledger.clone()).observing(self.table.clone())
    }

    pub fn engine(
        &self,
        capabilities: CapabilityTable,
        mounts: FakeMounts,
        fs_info: FakeFsInfo,
    ) -> StorageEngine {
        let collaborators = Collaborators {
            table: Arc::new(self.table.clone()),
            block_io: Arc::new(self.io.clone()),
            mounts: Arc::new(mounts),
            fs_info: Arc::new(fs_info),
            crypt: Arc::new(self.crypt.clone()),
        };
        StorageEngine::new(collaborators, Arc::new(capabilities), EngineConfig::default())
    }
}

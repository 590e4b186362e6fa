// SPDX-License-Identifier: GPL-3.0-only

//! In-memory collaborators for engine tests
//!
//! Every fake records what it was asked to do in a shared [`CallLedger`], so
//! tests can assert on the order of table edits, commits and filesystem
//! tool invocations.

pub mod disk;
pub mod filesystem;
pub mod ledger;
pub mod system;
pub mod table;

pub use disk::{MemoryBlockIo, MemoryDisk};
pub use filesystem::FakeFsTool;
pub use ledger::{Call, CallLedger};
pub use system::{FakeCrypt, FakeFsInfo, FakeLvm, FakeMounts};
pub use table::{FakeTableBackend, partition_path, record};

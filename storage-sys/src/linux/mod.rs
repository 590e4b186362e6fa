// SPDX-License-Identifier: GPL-3.0-only

//! Linux implementations of the engine collaborators

pub mod blkid;
pub mod block;
pub mod cmd;
pub mod crypt;
pub mod lvm;
pub mod mounts;
pub mod sfdisk;
pub mod tools;
pub mod udev;

use std::sync::Arc;

pub use blkid::BlkidCache;
pub use block::FileBlockIo;
pub use crypt::SysfsCrypt;
pub use lvm::LvmTools;
pub use mounts::SystemMountTable;
pub use sfdisk::SfdiskBackend;
pub use tools::{CommandFsTool, system_capabilities};

use crate::config::EngineConfig;
use crate::engine::Collaborators;

/// Collaborators backed by the running system
pub fn system_collaborators(config: &EngineConfig) -> Collaborators {
    Collaborators {
        table: Arc::new(SfdiskBackend::new(config.settle_timeout_secs)),
        block_io: Arc::new(FileBlockIo),
        mounts: Arc::new(SystemMountTable::default()),
        fs_info: Arc::new(BlkidCache::default()),
        crypt: Arc::new(SysfsCrypt::default()),
    }
}

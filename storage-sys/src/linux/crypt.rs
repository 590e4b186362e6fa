// SPDX-License-Identifier: GPL-3.0-only

//! Device-mapper crypt mappings found through sysfs

use std::fs;
use std::path::Path;

use storage_contracts::{CryptTool, StorageError, StorageErrorKind};

use super::cmd::run_command;

const CRYPT_UUID_PREFIX: &str = "CRYPT-";

/// Finds open crypt mappings by walking the holders of a device
#[derive(Debug, Clone)]
pub struct SysfsCrypt {
    sysfs_root: String,
}

impl Default for SysfsCrypt {
    fn default() -> Self {
        Self::with_root("/sys/class/block")
    }
}

impl SysfsCrypt {
    pub fn with_root(root: impl Into<String>) -> Self {
        Self {
            sysfs_root: root.into(),
        }
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl CryptTool for SysfsCrypt {
    fn open_mapping(&self, device: &str) -> Result<Option<String>, StorageError> {
        let name = device.rsplit('/').next().unwrap_or(device);
        let holders = Path::new(&self.sysfs_root).join(name).join("holders");
        let Ok(entries) = fs::read_dir(&holders) else {
            return Ok(None);
        };

        for entry in entries.flatten() {
            let dm = entry.path().join("dm");
            let is_crypt = read_trimmed(&dm.join("uuid"))
                .is_some_and(|uuid| uuid.starts_with(CRYPT_UUID_PREFIX));
            if !is_crypt {
                continue;
            }
            if let Some(mapping) = read_trimmed(&dm.join("name")) {
                return Ok(Some(format!("/dev/mapper/{mapping}")));
            }
        }
        Ok(None)
    }

    fn close_mapping(&self, mapping: &str) -> Result<(), StorageError> {
        if !cfg!(feature = "crypt-tools") {
            return Err(StorageError::new(
                StorageErrorKind::Unsupported,
                format!("cannot close {mapping} without cryptsetup support"),
            ));
        }
        tracing::info!("closing encrypted mapping {mapping}");
        run_command("cryptsetup", &["close", mapping])
            .map(|_| ())
            .map_err(|error| error.into_storage(StorageErrorKind::Busy))
    }
}

// SPDX-License-Identifier: GPL-3.0-only

use crate::StorageError;

/// Encrypted container mappings stacked on block devices
pub trait CryptTool: Send + Sync {
    /// Name of the open mapping backed by `device`, if any
    fn open_mapping(&self, device: &str) -> Result<Option<String>, StorageError>;

    fn close_mapping(&self, mapping: &str) -> Result<(), StorageError>;
}

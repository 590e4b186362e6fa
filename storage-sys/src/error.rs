// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::{StorageError, StorageErrorKind};
use thiserror::Error;

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Tool not available: {0}")]
    ToolMissing(String),

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Unexpected output from {tool}: {reason}")]
    Parse { tool: String, reason: String },

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;

impl SysError {
    /// Convert into the contract error, classifying by the failing concern
    pub fn into_storage(self, kind: StorageErrorKind) -> StorageError {
        let kind = match &self {
            SysError::PermissionDenied(_) => StorageErrorKind::PermissionDenied,
            SysError::DeviceNotFound(_) => StorageErrorKind::NotFound,
            SysError::ToolMissing(_) => StorageErrorKind::Unsupported,
            SysError::Io(error) if error.kind() == std::io::ErrorKind::PermissionDenied => {
                StorageErrorKind::PermissionDenied
            }
            _ => kind,
        };
        StorageError::new(kind, self.to_string())
    }
}

impl From<SysError> for StorageError {
    fn from(error: SysError) -> Self {
        error.into_storage(StorageErrorKind::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failures_keep_requested_kind() {
        let error = SysError::CommandFailed {
            command: "resize2fs /dev/sda1".into(),
            stderr: "bad superblock".into(),
        };
        let converted = error.into_storage(StorageErrorKind::FilesystemOperationFailed);
        assert_eq!(converted.kind, StorageErrorKind::FilesystemOperationFailed);
        assert!(converted.message.contains("bad superblock"));
    }

    #[test]
    fn missing_tools_are_unsupported() {
        let converted: StorageError = SysError::ToolMissing("mkfs.xfs".into()).into();
        assert_eq!(converted.kind, StorageErrorKind::Unsupported);
    }
}

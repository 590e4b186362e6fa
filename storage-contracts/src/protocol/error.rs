// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageErrorKind {
    /// The device could not be opened or read; probing skips it
    DeviceUnreadable,
    /// More than one type matched; never raised by detection itself
    DetectionAmbiguous,
    /// Writing the table to disk or informing the kernel failed
    TableCommitFailed,
    /// Requested geometry or selection rejected before any write
    ConstraintViolation,
    /// Candidates cannot cover the requested size
    AllocationShortfall,
    /// An external filesystem tool reported failure
    FilesystemOperationFailed,
    InvalidInput,
    NotFound,
    PermissionDenied,
    Unsupported,
    Busy,
    Timeout,
    Internal,
}

impl StorageErrorKind {
    pub fn code(self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::PermissionDenied => 403,
            Self::NotFound => 404,
            Self::ConstraintViolation => 409,
            Self::AllocationShortfall => 413,
            Self::Busy => 423,
            Self::DetectionAmbiguous => 300,
            Self::Internal => 500,
            Self::Unsupported => 501,
            Self::DeviceUnreadable => 502,
            Self::FilesystemOperationFailed => 503,
            Self::Timeout => 504,
            Self::TableCommitFailed => 507,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is(&self, kind: StorageErrorKind) -> bool {
        self.kind == kind
    }
}

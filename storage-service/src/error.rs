// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::StorageError;
use thiserror::Error;

/// Service-specific errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid configuration in {path}: {reason}")]
    Config { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} worker is not running")]
    WorkerStopped(&'static str),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

// SPDX-License-Identifier: GPL-3.0-only

//! Storage service
//!
//! Runs the storage engine behind per-concern job queues. Callers submit
//! [`Request`]s, follow progress through [`OperationEvent`]s and receive a
//! [`Completion`] carrying the graph probed after each job.
//!
//! [`OperationEvent`]: storage_contracts::OperationEvent

pub mod config;
pub mod error;
pub mod locks;
pub mod worker;

pub use config::{DEFAULT_CONFIG_PATH, ServiceConfig};
pub use error::{Result, ServiceError};
pub use locks::{DeviceGuard, DeviceLocks, LockScope};
pub use worker::{Completion, Outcome, Request, StorageService};

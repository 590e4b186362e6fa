// SPDX-License-Identifier: GPL-3.0-only

//! Device probing, partition modelling and volume planning
//!
//! The engine reads partition tables and raw sectors through the
//! collaborator traits of `storage-contracts`, builds a [`storage_types::DeviceGraph`]
//! with explicit gaps between entries, enriches it with usage and mount
//! state, and plans resize, move and physical volume allocation work on top
//! of it. The [`linux`] module wires those traits to sfdisk, blkid, sysfs
//! and the filesystem utilities.
//!
//! Mutating operations require elevated privileges and should only be
//! called from privileged services (like storage-service).

pub mod allocation;
pub mod capabilities;
pub mod config;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod linux;
pub mod model;
pub mod ops;
pub mod probe;
pub mod resize;
pub mod signature;

pub use allocation::{PvAllocationPlanner, PvPlan, PvStep, candidates_from_graph};
pub use capabilities::{CapabilityTable, external_capabilities};
pub use config::EngineConfig;
pub use engine::{Collaborators, StorageEngine};
pub use enrich::UsageEnricher;
pub use error::{Result, SysError};
pub use probe::DeviceProbe;
pub use ops::{NewPartitionRequest, PartitionOps, WipeLevel};
pub use resize::{ResizeMovePlanner, classify};

// SPDX-License-Identifier: GPL-3.0-only

//! The engine facade: probing plus the planners, over injected collaborators

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use storage_contracts::{
    BlockIo, CryptTool, FsInfoSnapshot, FsInfoSource, MountSnapshot, MountTable, SectorReader,
    StorageError, StorageErrorKind, TableBackend,
};
use storage_types::{
    Device, DeviceGraph, FilesystemType, Partition, PvCandidate, ResizeAction, VolumeGroupInfo,
};

use crate::allocation::PvAllocationPlanner;
use crate::capabilities::CapabilityTable;
use crate::config::EngineConfig;
use crate::enrich::UsageEnricher;
use crate::ops::PartitionOps;
use crate::probe::DeviceProbe;
use crate::resize::{classify, ResizeMovePlanner};
use crate::signature;

/// Everything the engine talks to outside of its own memory
#[derive(Clone)]
pub struct Collaborators {
    pub table: Arc<dyn TableBackend>,
    pub block_io: Arc<dyn BlockIo>,
    pub mounts: Arc<dyn MountTable>,
    pub fs_info: Arc<dyn FsInfoSource>,
    pub crypt: Arc<dyn CryptTool>,
}

pub struct StorageEngine {
    collaborators: Collaborators,
    capabilities: Arc<CapabilityTable>,
    config: EngineConfig,
    generation: AtomicU64,
}

fn is_loop_device(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|name| name.starts_with("loop"))
}

impl StorageEngine {
    pub fn new(
        collaborators: Collaborators,
        capabilities: Arc<CapabilityTable>,
        config: EngineConfig,
    ) -> Self {
        tracing::debug!("filesystem support: {capabilities:?}");
        Self {
            collaborators,
            capabilities,
            config,
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    /// Partition-level operations bound to this engine's collaborators
    pub fn ops(&self) -> PartitionOps<'_> {
        PartitionOps {
            backend: self.collaborators.table.as_ref(),
            block_io: self.collaborators.block_io.as_ref(),
            crypt: self.collaborators.crypt.as_ref(),
            capabilities: &self.capabilities,
            config: &self.config,
        }
    }

    fn snapshots(&self) -> (MountSnapshot, FsInfoSnapshot) {
        let mounts = self.collaborators.mounts.snapshot().unwrap_or_else(|error| {
            tracing::warn!("mount table unavailable: {error}");
            MountSnapshot::default()
        });
        let fs_info = self.collaborators.fs_info.snapshot().unwrap_or_else(|error| {
            tracing::warn!("filesystem cache unavailable: {error}");
            FsInfoSnapshot::default()
        });
        (mounts, fs_info)
    }

    /// Probe every device into a fresh graph.
    ///
    /// Devices that cannot be read are left out.
    pub fn probe(&self) -> Result<DeviceGraph, StorageError> {
        let (mounts, fs_info) = self.snapshots();
        let mut paths = self.collaborators.table.list_devices()?;
        paths.sort();

        let mut devices = Vec::with_capacity(paths.len());
        for path in paths {
            if !self.config.include_loop_devices && is_loop_device(&path) {
                continue;
            }
            match self.probe_with(&path, &mounts, &fs_info) {
                Ok(device) => devices.push(device),
                Err(error) if error.is(StorageErrorKind::DeviceUnreadable) => {
                    tracing::warn!("skipping {path}: {error}");
                }
                Err(error) => return Err(error),
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let graph = DeviceGraph::new(generation, devices);
        tracing::info!(
            "probe {generation}: {} devices, {} entries",
            graph.devices.len(),
            graph.partition_count()
        );
        Ok(graph)
    }

    /// Probe and enrich a single device
    pub fn probe_device(&self, path: &str) -> Result<Device, StorageError> {
        let (mounts, fs_info) = self.snapshots();
        self.probe_with(path, &mounts, &fs_info)
    }

    fn probe_with(
        &self,
        path: &str,
        mounts: &MountSnapshot,
        fs_info: &FsInfoSnapshot,
    ) -> Result<Device, StorageError> {
        let probe = DeviceProbe::new(
            self.collaborators.table.as_ref(),
            self.collaborators.block_io.as_ref(),
            fs_info,
        );
        let mut probed = probe.probe_device(path)?;

        let enricher = UsageEnricher::new(
            &self.capabilities,
            mounts,
            fs_info,
            self.collaborators.mounts.as_ref(),
            self.collaborators.table.as_ref(),
        );
        enricher.enrich_device(&mut probed.device);

        // The kernel refuses to re-read a table with partitions in use.
        if probed.device.highest_busy > 0 {
            probed.device.read_only = probed.session.sync_kernel().is_err();
        }

        Ok(probed.device)
    }

    pub fn detect_filesystem(
        &self,
        reader: &mut dyn SectorReader,
        sector_size: u64,
        table_hint: Option<&str>,
    ) -> FilesystemType {
        signature::detect_filesystem(reader, sector_size, table_hint)
    }

    pub fn plan_resize_move(&self, old: &Partition, new: &Partition) -> ResizeAction {
        classify(old.range(), new.range())
    }

    pub fn execute_resize_move(
        &self,
        old: &Partition,
        new: &Partition,
        rollback_on_fail: bool,
    ) -> Result<(), StorageError> {
        ResizeMovePlanner::new(self.ops()).execute(old, new, rollback_on_fail)
    }

    /// Select and prepare physical volumes within `graph`
    pub fn allocate_pvs(
        &self,
        graph: &DeviceGraph,
        candidates: &[PvCandidate],
        target_bytes: u64,
        existing_vg: Option<&VolumeGroupInfo>,
    ) -> Result<Vec<PvCandidate>, StorageError> {
        PvAllocationPlanner::new(self.ops(), graph).allocate(candidates, target_bytes, existing_vg)
    }
}

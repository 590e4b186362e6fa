// SPDX-License-Identifier: GPL-3.0-only

//! Choosing and preparing physical volumes for a volume group

use std::cmp::Reverse;
use std::collections::BTreeSet;

use storage_contracts::{GeometryConstraint, RecordKind, StorageError, StorageErrorKind};
use storage_types::{
    AllocationMode, DeviceGraph, FilesystemType, PartitionKind, PhysicalVolumeInfo, PvCandidate,
    PvCandidateKind, SectorRange, TableKind, VolumeGroupInfo,
};

use crate::ops::PartitionOps;

/// What has to happen to one candidate for the plan to hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PvStep {
    /// Used as it is
    Keep(PvCandidate),
    /// New partition inside a gap
    CarveGap {
        candidate: PvCandidate,
        range: SectorRange,
        logical: bool,
    },
    /// Fresh table on the disk and one partition on it
    CarveDisk {
        candidate: PvCandidate,
        range: SectorRange,
    },
    /// The whole disk becomes the physical volume
    WholeDisk(PvCandidate),
}

impl PvStep {
    pub fn candidate(&self) -> &PvCandidate {
        match self {
            Self::Keep(candidate) | Self::WholeDisk(candidate) => candidate,
            Self::CarveGap { candidate, .. } | Self::CarveDisk { candidate, .. } => candidate,
        }
    }

    pub fn writes_table(&self) -> bool {
        matches!(self, Self::CarveGap { .. } | Self::CarveDisk { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvPlan {
    pub mode: AllocationMode,
    pub target_bytes: u64,
    pub steps: Vec<PvStep>,
}

/// Build allocation candidates from a probed graph.
///
/// `pvs` supplies volume group membership for existing physical volumes.
pub fn candidates_from_graph(graph: &DeviceGraph, pvs: &[PhysicalVolumeInfo]) -> Vec<PvCandidate> {
    let member_of = |path: &str| {
        pvs.iter()
            .find(|pv| pv.device == path)
            .and_then(|pv| pv.vg_name.clone())
    };
    let mut candidates = Vec::new();

    for device in &graph.devices {
        match &device.table {
            TableKind::Loop => {
                candidates.push(PvCandidate::new(
                    PvCandidateKind::LoopDevice,
                    &device.path,
                    Some(device.path.clone()),
                    device.range(),
                    device.sector_size,
                ));
            }
            TableKind::Unrecognized => {
                let kind = if is_meta_device(&device.path) {
                    PvCandidateKind::MetaDevice
                } else {
                    PvCandidateKind::WholeDisk
                };
                candidates.push(PvCandidate::new(
                    kind,
                    &device.path,
                    Some(device.path.clone()),
                    device.range(),
                    device.sector_size,
                ));
            }
            TableKind::None => {
                let whole_pv = device
                    .top_level_partitions()
                    .any(|partition| partition.filesystem == FilesystemType::Lvm2Pv);
                if whole_pv {
                    let mut candidate = PvCandidate::new(
                        PvCandidateKind::WholeDisk,
                        &device.path,
                        Some(device.path.clone()),
                        device.range(),
                        device.sector_size,
                    );
                    candidate.member_of = member_of(&device.path);
                    candidates.push(candidate);
                }
            }
            TableKind::Named(_) => {
                for partition in device.partitions_in_order() {
                    match partition.kind {
                        PartitionKind::Unallocated => candidates.push(PvCandidate::new(
                            PvCandidateKind::UnallocatedGap,
                            &device.path,
                            None,
                            partition.range(),
                            device.sector_size,
                        )),
                        PartitionKind::Primary | PartitionKind::Logical
                            if !partition.is_mounted() =>
                        {
                            let mut candidate = PvCandidate::new(
                                PvCandidateKind::ExistingPartition,
                                &device.path,
                                Some(partition.path.clone()),
                                partition.range(),
                                device.sector_size,
                            );
                            candidate.member_of = member_of(&partition.path);
                            candidates.push(candidate);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    candidates
}

fn is_meta_device(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.starts_with("md") || name.starts_with("dm-")
}

fn invalid(message: String) -> StorageError {
    StorageError::new(StorageErrorKind::ConstraintViolation, message)
}

/// Picks regions to satisfy a capacity target and prepares them.
///
/// Existing partitions are used verbatim, then the largest gaps, then the
/// largest whole disks. Planning never writes; a plan is only carried out
/// once it covers the target.
pub struct PvAllocationPlanner<'a> {
    ops: PartitionOps<'a>,
    graph: &'a DeviceGraph,
}

impl<'a> PvAllocationPlanner<'a> {
    pub fn new(ops: PartitionOps<'a>, graph: &'a DeviceGraph) -> Self {
        Self { ops, graph }
    }

    /// Plan and carry out an allocation.
    ///
    /// `existing_vg` selects extend mode. Returns the physical volumes that
    /// make up the group, with carved partitions filled in.
    pub fn allocate(
        &self,
        candidates: &[PvCandidate],
        target_bytes: u64,
        existing_vg: Option<&VolumeGroupInfo>,
    ) -> Result<Vec<PvCandidate>, StorageError> {
        let plan = self.plan(candidates, target_bytes, existing_vg)?;
        self.materialize(&plan)
    }

    pub fn plan(
        &self,
        candidates: &[PvCandidate],
        target_bytes: u64,
        existing_vg: Option<&VolumeGroupInfo>,
    ) -> Result<PvPlan, StorageError> {
        let mode = match existing_vg {
            Some(_) => AllocationMode::Extend,
            None => AllocationMode::Create,
        };
        self.validate(candidates, target_bytes, existing_vg)?;

        let floor = match existing_vg {
            Some(vg) => vg.extent_size + self.ops.config.extend_overhead_bytes,
            None => self.ops.config.create_min_partition_bytes,
        } as i128;

        let mut kept = Vec::new();
        let mut gaps = Vec::new();
        let mut disks = Vec::new();
        for candidate in candidates {
            match candidate.kind {
                PvCandidateKind::ExistingPartition => kept.push(candidate),
                PvCandidateKind::UnallocatedGap => gaps.push(candidate),
                PvCandidateKind::WholeDisk => {
                    let is_member = matches!(
                        (existing_vg, &candidate.member_of),
                        (Some(vg), Some(name)) if *name == vg.name
                    );
                    if is_member { kept.push(candidate) } else { disks.push(candidate) }
                }
                PvCandidateKind::LoopDevice | PvCandidateKind::MetaDevice => {
                    tracing::debug!(
                        "ignoring {:?} candidate {}",
                        candidate.kind,
                        candidate.display_path()
                    );
                }
            }
        }

        // Prior members go first when extending; the order is otherwise kept.
        if let Some(vg) = existing_vg {
            kept.sort_by_key(|candidate| candidate.member_of.as_deref() != Some(vg.name.as_str()));
        }
        gaps.sort_by_key(|candidate| Reverse(candidate.capacity()));
        disks.sort_by_key(|candidate| Reverse(candidate.capacity()));

        let mut remaining = target_bytes as i128;
        let mut steps = Vec::new();

        for candidate in kept {
            remaining -= candidate.capacity() as i128;
            steps.push(PvStep::Keep(candidate.clone()));
        }

        for candidate in gaps {
            if remaining <= 0 {
                break;
            }
            let capacity = candidate.capacity() as i128;
            if capacity == 0 {
                continue;
            }
            let wanted = if remaining < capacity {
                remaining.max(floor)
            } else {
                capacity
            };
            let usable = self.usable_range(candidate)?;
            let range = self.sized_range(candidate, usable, wanted as u64, capacity as u64)?;
            let logical = self.gap_is_logical(candidate);
            steps.push(PvStep::CarveGap {
                candidate: candidate.clone(),
                range,
                logical,
            });
            remaining -= capacity;
        }

        for candidate in disks {
            if remaining <= 0 {
                break;
            }
            let capacity = candidate.capacity() as i128;
            if capacity == 0 {
                continue;
            }
            let usable = self.usable_range(candidate)?;
            let usable_bytes = usable.byte_length(candidate.sector_size) as i128;
            if remaining < capacity && remaining < usable_bytes {
                let wanted = remaining.max(floor) as u64;
                let range = self.sized_range(candidate, usable, wanted, capacity as u64)?;
                steps.push(PvStep::CarveDisk {
                    candidate: candidate.clone(),
                    range,
                });
            } else {
                steps.push(PvStep::WholeDisk(candidate.clone()));
            }
            remaining -= capacity;
        }

        if remaining > 0 {
            return Err(StorageError::new(
                StorageErrorKind::AllocationShortfall,
                format!("candidates fall {remaining} bytes short of {target_bytes}"),
            ));
        }

        tracing::info!(
            "planned {} physical volumes for {target_bytes} bytes ({mode:?})",
            steps.len()
        );
        Ok(PvPlan {
            mode,
            target_bytes,
            steps,
        })
    }

    fn validate(
        &self,
        candidates: &[PvCandidate],
        target_bytes: u64,
        existing_vg: Option<&VolumeGroupInfo>,
    ) -> Result<(), StorageError> {
        if let Some(vg) = existing_vg
            && target_bytes < vg.used()
        {
            return Err(invalid(format!(
                "{} already uses {} bytes, more than the requested {target_bytes}",
                vg.name,
                vg.used()
            )));
        }

        let mut seen = BTreeSet::new();
        for candidate in candidates {
            if !seen.insert(candidate.display_path()) {
                return Err(StorageError::new(
                    StorageErrorKind::InvalidInput,
                    format!("{} was given twice", candidate.display_path()),
                ));
            }

            match (existing_vg, &candidate.member_of) {
                (None, Some(vg)) => {
                    return Err(invalid(format!(
                        "{} already belongs to {vg}",
                        candidate.display_path()
                    )));
                }
                (Some(target), Some(vg)) if *vg != target.name => {
                    return Err(invalid(format!(
                        "{} belongs to {vg}, not {}",
                        candidate.display_path(),
                        target.name
                    )));
                }
                _ => {}
            }

            match candidate.kind {
                PvCandidateKind::WholeDisk => {
                    let device = self.graph.device(&candidate.disk_path).ok_or_else(|| {
                        StorageError::new(
                            StorageErrorKind::NotFound,
                            format!("{} is not a known disk", candidate.disk_path),
                        )
                    })?;
                    if device.table != TableKind::Unrecognized && candidate.member_of.is_none() {
                        return Err(invalid(format!(
                            "{} already carries a {} table or filesystem",
                            device.path,
                            device.table.label()
                        )));
                    }
                }
                PvCandidateKind::ExistingPartition => {
                    let path = candidate.device_path.as_deref().unwrap_or_default();
                    let (_, partition) = self.graph.find_partition(path).ok_or_else(|| {
                        StorageError::new(
                            StorageErrorKind::NotFound,
                            format!("{} is not a known partition", candidate.display_path()),
                        )
                    })?;
                    if partition.is_mounted() {
                        return Err(StorageError::new(
                            StorageErrorKind::Busy,
                            format!("{} is mounted", partition.path),
                        ));
                    }
                }
                PvCandidateKind::UnallocatedGap => {
                    let matches = self
                        .graph
                        .device(&candidate.disk_path)
                        .map(|device| {
                            device.partitions_in_order().iter().any(|partition| {
                                partition.is_virtual() && partition.range() == candidate.range()
                            })
                        })
                        .unwrap_or(false);
                    if !matches {
                        return Err(invalid(format!(
                            "{} is not free space",
                            candidate.display_path()
                        )));
                    }
                }
                PvCandidateKind::LoopDevice | PvCandidateKind::MetaDevice => {}
            }
        }

        Ok(())
    }

    /// Candidate bounds minus the areas a new partition table needs
    fn usable_range(&self, candidate: &PvCandidate) -> Result<SectorRange, StorageError> {
        let config = self.ops.config;
        let mut range = candidate.range();
        let whole_disk = candidate.kind == PvCandidateKind::WholeDisk;

        if whole_disk || range.start == 0 {
            range.start = range.start.max(config.first_usable_sector);
        }

        let ends_disk_gpt = self
            .graph
            .device(&candidate.disk_path)
            .map(|device| device.table.is_gpt() && range.end + 1 == device.length)
            .unwrap_or(false);
        if whole_disk || ends_disk_gpt {
            range.end = range.end.saturating_sub(config.gpt_backup_sectors);
        }

        if !range.is_valid() {
            return Err(StorageError::new(
                StorageErrorKind::AllocationShortfall,
                format!("{} has no usable sectors", candidate.display_path()),
            ));
        }
        Ok(range)
    }

    fn sized_range(
        &self,
        candidate: &PvCandidate,
        usable: SectorRange,
        wanted: u64,
        capacity: u64,
    ) -> Result<SectorRange, StorageError> {
        if wanted >= capacity {
            return Ok(usable);
        }
        let sectors = wanted.div_ceil(candidate.sector_size.max(1));
        if sectors > usable.length() {
            return Err(StorageError::new(
                StorageErrorKind::AllocationShortfall,
                format!(
                    "{} holds {} usable sectors, {sectors} needed",
                    candidate.display_path(),
                    usable.length()
                ),
            ));
        }
        Ok(SectorRange::new(usable.start, usable.start + sectors - 1))
    }

    fn gap_is_logical(&self, candidate: &PvCandidate) -> bool {
        self.graph
            .device(&candidate.disk_path)
            .map(|device| {
                device.partitions_in_order().iter().any(|partition| {
                    partition.is_virtual()
                        && partition.inside_extended
                        && partition.range() == candidate.range()
                })
            })
            .unwrap_or(false)
    }

    /// Carry out a plan that covers its target
    pub fn materialize(&self, plan: &PvPlan) -> Result<Vec<PvCandidate>, StorageError> {
        let mut volumes = Vec::with_capacity(plan.steps.len());

        for step in &plan.steps {
            let volume = match step {
                PvStep::Keep(candidate) => {
                    if let Some(path) = &candidate.device_path {
                        self.ops.close_open_mapping(path)?;
                    }
                    candidate.clone()
                }
                PvStep::WholeDisk(candidate) => {
                    self.ops.close_open_mapping(&candidate.disk_path)?;
                    candidate.clone()
                }
                PvStep::CarveGap {
                    candidate,
                    range,
                    logical,
                } => {
                    let kind = if *logical { RecordKind::Logical } else { RecordKind::Normal };
                    self.carve(candidate, *range, kind, None)?
                }
                PvStep::CarveDisk { candidate, range } => {
                    self.ops.close_open_mapping(&candidate.disk_path)?;
                    let label = self.ops.config.pv_table_label.as_str();
                    self.carve(candidate, *range, RecordKind::Normal, Some(label))?
                }
            };
            volumes.push(volume);
        }

        Ok(volumes)
    }

    fn carve(
        &self,
        candidate: &PvCandidate,
        range: SectorRange,
        kind: RecordKind,
        new_table: Option<&str>,
    ) -> Result<PvCandidate, StorageError> {
        let mut session = self.ops.open(&candidate.disk_path)?;
        if let Some(label) = new_table {
            session.new_table(label)?;
        }
        let record = session.add_partition(kind, GeometryConstraint::Exact(range))?;
        session.set_type(record.number, FilesystemType::Lvm2Pv)?;
        session.commit()?;
        tracing::info!(
            "{}: created physical volume partition {} at {}",
            candidate.disk_path,
            record.path,
            record.range
        );

        let mut volume = candidate.clone();
        volume.kind = PvCandidateKind::ExistingPartition;
        volume.device_path = Some(record.path);
        volume.start = record.range.start;
        volume.end = record.range.end;
        Ok(volume)
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Request queues and the workers that drain them
//!
//! Probes, partition edits and volume group preparation each get their own
//! queue. Jobs run on the blocking pool while holding a [`DeviceLocks`] scope,
//! so a probe never observes a table halfway through a commit. Every mutation
//! is followed by a fresh probe that is published on the graph channel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use storage_contracts::{
    LvmReport, OperationEvent, OperationId, OperationKind, StorageError, StorageErrorKind,
};
use storage_sys::{NewPartitionRequest, StorageEngine, WipeLevel};
use storage_types::{Device, DeviceGraph, FilesystemType, Partition, PartitionKind, PvCandidate};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{Result, ServiceError};
use crate::locks::{DeviceLocks, LockScope};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum Request {
    Probe,
    ResizeMove {
        old: Partition,
        new: Partition,
        rollback_on_fail: bool,
    },
    CreatePartition {
        device: String,
        request: NewPartitionRequest,
    },
    DeletePartition {
        partition: Partition,
    },
    FormatPartition {
        partition: Partition,
        filesystem: FilesystemType,
        label: Option<String>,
    },
    SetPartitionName {
        partition: Partition,
        name: String,
    },
    CreateTable {
        device: String,
        label: String,
    },
    SecureWipe {
        partition: Partition,
        level: WipeLevel,
    },
    AllocatePvs {
        candidates: Vec<PvCandidate>,
        target_bytes: u64,
        /// Extend this volume group instead of creating a new one
        volume_group: Option<String>,
    },
}

impl Request {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Probe => OperationKind::Probe,
            Self::AllocatePvs { .. } => OperationKind::Lvm,
            _ => OperationKind::Partitioning,
        }
    }

    fn scope(&self) -> LockScope {
        match self {
            Self::Probe | Self::AllocatePvs { .. } => LockScope::All,
            Self::CreatePartition { device, .. } | Self::CreateTable { device, .. } => {
                LockScope::Device(device.clone())
            }
            Self::ResizeMove { old: partition, .. }
            | Self::DeletePartition { partition }
            | Self::FormatPartition { partition, .. }
            | Self::SetPartitionName { partition, .. }
            | Self::SecureWipe { partition, .. } => {
                LockScope::Device(partition.device_path.clone())
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Probe => "probe devices".to_string(),
            Self::ResizeMove { old, new, .. } => format!(
                "resize/move {} from {}-{} to {}-{}",
                old.path, old.start, old.end, new.start, new.end
            ),
            Self::CreatePartition { device, request } => format!(
                "create {:?} partition on {device} at {}-{}",
                request.kind, request.range.start, request.range.end
            ),
            Self::DeletePartition { partition } => format!("delete {}", partition.path),
            Self::FormatPartition {
                partition,
                filesystem,
                ..
            } => format!("format {} as {}", partition.path, filesystem.as_str()),
            Self::SetPartitionName { partition, name } => {
                format!("name {} \"{name}\"", partition.path)
            }
            Self::CreateTable { device, label } => format!("create {label} table on {device}"),
            Self::SecureWipe { partition, level } => {
                format!("wipe {} ({} passes)", partition.path, level.passes())
            }
            Self::AllocatePvs {
                candidates,
                target_bytes,
                ..
            } => format!(
                "prepare {target_bytes} bytes of physical volumes from {} candidates",
                candidates.len()
            ),
        }
    }

    fn mutates(&self) -> bool {
        !matches!(self, Self::Probe)
    }
}

/// What a successful job produced
#[derive(Debug, Clone)]
pub enum Outcome {
    Probed,
    Applied,
    Partition(Box<Partition>),
    Volumes(Vec<PvCandidate>),
}

/// Result of one job, published to every subscriber
#[derive(Debug, Clone)]
pub struct Completion {
    pub operation_id: OperationId,
    pub operation: OperationKind,
    pub description: String,
    pub outcome: std::result::Result<Outcome, StorageError>,
    /// Graph probed after the job, when one was taken
    pub graph: Option<Arc<DeviceGraph>>,
    pub finished_at: DateTime<Utc>,
}

struct Job {
    operation_id: OperationId,
    request: Request,
}

struct Shared {
    engine: Arc<StorageEngine>,
    lvm: Arc<dyn LvmReport>,
    locks: DeviceLocks,
    graph: watch::Sender<Arc<DeviceGraph>>,
    completions: broadcast::Sender<Completion>,
    events: broadcast::Sender<OperationEvent>,
}

/// Find `partition` again on a freshly probed device
fn locate(device: &Device, partition: &Partition) -> std::result::Result<Partition, StorageError> {
    let found = if partition.kind == PartitionKind::Unpartitioned {
        device
            .top_level_partitions()
            .find(|entry| entry.kind == PartitionKind::Unpartitioned)
    } else {
        device.find_by_number(partition.number)
    };
    match found {
        Some(current) if current.range() == partition.range() => Ok(current.clone()),
        Some(current) => Err(StorageError::new(
            StorageErrorKind::ConstraintViolation,
            format!(
                "{} now spans {}-{}, expected {}-{}",
                current.path, current.start, current.end, partition.start, partition.end
            ),
        )),
        None => Err(StorageError::new(
            StorageErrorKind::NotFound,
            format!("{} no longer exists", partition.path),
        )),
    }
}

impl Shared {
    fn current(
        &self,
        partition: &Partition,
    ) -> std::result::Result<(Device, Partition), StorageError> {
        let device = self.engine.probe_device(&partition.device_path)?;
        let current = locate(&device, partition)?;
        Ok((device, current))
    }

    fn execute(&self, request: &Request) -> std::result::Result<Outcome, StorageError> {
        let ops = self.engine.ops();
        match request {
            Request::Probe => {
                let graph = self.engine.probe()?;
                self.graph.send_replace(Arc::new(graph));
                Ok(Outcome::Probed)
            }
            Request::ResizeMove {
                old,
                new,
                rollback_on_fail,
            } => {
                let (_, current) = self.current(old)?;
                self.engine
                    .execute_resize_move(&current, new, *rollback_on_fail)?;
                Ok(Outcome::Applied)
            }
            Request::CreatePartition { device, request } => {
                let device = self.engine.probe_device(device)?;
                let partition = ops.create_partition(&device, request)?;
                Ok(Outcome::Partition(Box::new(partition)))
            }
            Request::DeletePartition { partition } => {
                let (_, current) = self.current(partition)?;
                ops.delete_partition(&current)?;
                Ok(Outcome::Applied)
            }
            Request::FormatPartition {
                partition,
                filesystem,
                label,
            } => {
                let (_, current) = self.current(partition)?;
                ops.format_partition(&current, *filesystem, label.as_deref())?;
                Ok(Outcome::Applied)
            }
            Request::SetPartitionName { partition, name } => {
                let (device, current) = self.current(partition)?;
                ops.set_partition_name(&device, &current, name)?;
                Ok(Outcome::Applied)
            }
            Request::CreateTable { device, label } => {
                let device = self.engine.probe_device(device)?;
                ops.create_partition_table(&device, label)?;
                Ok(Outcome::Applied)
            }
            Request::SecureWipe { partition, level } => {
                let (_, current) = self.current(partition)?;
                ops.secure_wipe(&current, *level)?;
                Ok(Outcome::Applied)
            }
            Request::AllocatePvs {
                candidates,
                target_bytes,
                volume_group,
            } => {
                let existing = match volume_group {
                    Some(name) => Some(self.lvm.volume_group(name)?.ok_or_else(|| {
                        StorageError::new(
                            StorageErrorKind::NotFound,
                            format!("volume group {name} not found"),
                        )
                    })?),
                    None => None,
                };
                let graph = self.engine.probe()?;
                let volumes =
                    self.engine
                        .allocate_pvs(&graph, candidates, *target_bytes, existing.as_ref())?;
                Ok(Outcome::Volumes(volumes))
            }
        }
    }

    async fn run(self: &Arc<Self>, job: Job) {
        let Job {
            operation_id,
            request,
        } = job;
        let operation = request.kind();
        let description = request.describe();
        tracing::info!("{operation_id:?}: {description}");
        let _ = self.events.send(OperationEvent::Started {
            operation_id,
            operation,
            description: description.clone(),
        });

        let outcome = {
            let _guard = self.locks.acquire(request.scope()).await;
            let shared = Arc::clone(self);
            let job_request = request.clone();
            tokio::task::spawn_blocking(move || shared.execute(&job_request))
                .await
                .unwrap_or_else(|error| {
                    Err(StorageError::new(
                        StorageErrorKind::Internal,
                        format!("job panicked: {error}"),
                    ))
                })
        };

        // Failed mutations may still have written part of their work.
        let graph = if request.mutates() {
            self.refresh().await
        } else {
            Some(self.graph.borrow().clone())
        };

        let event = match &outcome {
            Ok(_) => {
                tracing::info!("{operation_id:?}: done");
                OperationEvent::Completed {
                    operation_id,
                    operation,
                }
            }
            Err(error) => {
                tracing::warn!("{operation_id:?}: {error}");
                OperationEvent::Failed {
                    operation_id,
                    operation,
                    error: error.clone(),
                }
            }
        };
        let _ = self.events.send(event);
        let _ = self.completions.send(Completion {
            operation_id,
            operation,
            description,
            outcome,
            graph: graph.filter(|graph| graph.generation > 0),
            finished_at: Utc::now(),
        });
    }

    /// Probe everything again and publish the result
    async fn refresh(self: &Arc<Self>) -> Option<Arc<DeviceGraph>> {
        let _guard = self.locks.acquire(LockScope::All).await;
        let engine = Arc::clone(&self.engine);
        match tokio::task::spawn_blocking(move || engine.probe()).await {
            Ok(Ok(graph)) => {
                let graph = Arc::new(graph);
                self.graph.send_replace(Arc::clone(&graph));
                Some(graph)
            }
            Ok(Err(error)) => {
                tracing::warn!("probe after mutation failed: {error}");
                None
            }
            Err(error) => {
                tracing::error!("probe task failed: {error}");
                None
            }
        }
    }
}

async fn drain(name: &'static str, shared: Arc<Shared>, mut jobs: mpsc::Receiver<Job>) {
    tracing::debug!("{name} worker started");
    while let Some(job) = jobs.recv().await {
        shared.run(job).await;
    }
    tracing::debug!("{name} worker stopped");
}

/// Handle to the running workers
pub struct StorageService {
    probe: mpsc::Sender<Job>,
    partitioning: mpsc::Sender<Job>,
    lvm: mpsc::Sender<Job>,
    completions: broadcast::Sender<Completion>,
    events: broadcast::Sender<OperationEvent>,
    graph: watch::Receiver<Arc<DeviceGraph>>,
    workers: Vec<JoinHandle<()>>,
}

impl StorageService {
    /// Spawn the workers; must be called inside a tokio runtime
    pub fn start(engine: Arc<StorageEngine>, lvm: Arc<dyn LvmReport>, queue_depth: usize) -> Self {
        let (graph_tx, graph_rx) = watch::channel(Arc::new(DeviceGraph::empty()));
        let (completions, _) = broadcast::channel(EVENT_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(Shared {
            engine,
            lvm,
            locks: DeviceLocks::new(),
            graph: graph_tx,
            completions: completions.clone(),
            events: events.clone(),
        });

        let queue_depth = queue_depth.max(1);
        let mut workers = Vec::with_capacity(3);
        let mut queue = |name: &'static str| {
            let (tx, rx) = mpsc::channel(queue_depth);
            workers.push(tokio::spawn(drain(name, Arc::clone(&shared), rx)));
            tx
        };
        let probe = queue("probe");
        let partitioning = queue("partitioning");
        let lvm = queue("lvm");

        Self {
            probe,
            partitioning,
            lvm,
            completions,
            events,
            graph: graph_rx,
            workers,
        }
    }

    /// Queue `request`; the returned id tags its events and completion
    pub async fn submit(&self, request: Request) -> Result<OperationId> {
        let (queue, name) = match request.kind() {
            OperationKind::Probe => (&self.probe, "probe"),
            OperationKind::Partitioning => (&self.partitioning, "partitioning"),
            OperationKind::Lvm => (&self.lvm, "lvm"),
        };
        let operation_id = OperationId::new();
        queue
            .send(Job {
                operation_id,
                request,
            })
            .await
            .map_err(|_| ServiceError::WorkerStopped(name))?;
        Ok(operation_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Completion> {
        self.completions.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<OperationEvent> {
        self.events.subscribe()
    }

    /// Latest published graph; generation 0 until the first probe finishes
    pub fn graph(&self) -> watch::Receiver<Arc<DeviceGraph>> {
        self.graph.clone()
    }

    /// Stop accepting jobs and wait for queued ones to finish
    pub async fn shutdown(self) {
        let Self {
            probe,
            partitioning,
            lvm,
            workers,
            ..
        } = self;
        drop((probe, partitioning, lvm));
        for worker in workers {
            if let Err(error) = worker.await {
                tracing::error!("worker ended abnormally: {error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use storage_contracts::RecordKind;
    use storage_sys::{CapabilityTable, Collaborators, EngineConfig};
    use storage_testing::{
        CallLedger, FakeCrypt, FakeFsInfo, FakeFsTool, FakeLvm, FakeMounts, FakeTableBackend,
        MemoryBlockIo, MemoryDisk, record,
    };
    use storage_types::{Alignment, SectorRange};

    const SECTOR: u64 = 512;
    const DISK_SECTORS: u64 = 4 * 1024 * 1024;

    struct Fixture {
        table: FakeTableBackend,
        service: StorageService,
    }

    fn fixture() -> Fixture {
        let ledger = CallLedger::new();
        let table = FakeTableBackend::new(ledger.clone());
        let io = MemoryBlockIo::new(ledger.clone());
        table.add_device(
            "/dev/sda",
            SECTOR,
            DISK_SECTORS,
            Some("gpt"),
            vec![record("/dev/sda", 1, RecordKind::Normal, 2048, 206_847)],
        );
        io.insert("/dev/sda", MemoryDisk::new(DISK_SECTORS * SECTOR));

        let tool = FakeFsTool::new(FilesystemType::Ext4, ledger.clone()).observing(table.clone());
        let collaborators = Collaborators {
            table: Arc::new(table.clone()),
            block_io: Arc::new(io),
            mounts: Arc::new(FakeMounts::new()),
            fs_info: Arc::new(FakeFsInfo::new().entry("/dev/sda1", "ext4", None, None)),
            crypt: Arc::new(FakeCrypt::new(ledger)),
        };
        let engine = StorageEngine::new(
            collaborators,
            Arc::new(CapabilityTable::new().with_tool(Arc::new(tool))),
            EngineConfig::default(),
        );
        let service = StorageService::start(Arc::new(engine), Arc::new(FakeLvm::new()), 4);
        Fixture { table, service }
    }

    async fn completion_of(
        completions: &mut broadcast::Receiver<Completion>,
        operation_id: &OperationId,
    ) -> Completion {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let completion = completions.recv().await.expect("completion channel");
                if &completion.operation_id == operation_id {
                    return completion;
                }
            }
        })
        .await
        .expect("job finished")
    }

    async fn probed(fixture: &Fixture) -> Arc<DeviceGraph> {
        let mut completions = fixture.service.subscribe();
        let id = fixture.service.submit(Request::Probe).await.expect("submit");
        let completion = completion_of(&mut completions, &id).await;
        assert!(matches!(completion.outcome, Ok(Outcome::Probed)));
        completion.graph.expect("graph")
    }

    #[tokio::test]
    async fn probe_publishes_graph() {
        let fixture = fixture();
        let graph_rx = fixture.service.graph();
        assert_eq!(graph_rx.borrow().generation, 0);

        let graph = probed(&fixture).await;
        assert_eq!(graph.generation, 1);
        assert_eq!(graph_rx.borrow().generation, 1);
        let (_, partition) = graph.find_partition("/dev/sda1").expect("sda1");
        assert_eq!(partition.filesystem, FilesystemType::Ext4);
    }

    #[tokio::test]
    async fn resize_is_followed_by_a_fresh_graph() {
        let fixture = fixture();
        let graph = probed(&fixture).await;
        let (_, old) = graph.find_partition("/dev/sda1").expect("sda1");
        let mut new = old.clone();
        new.end = 411_647;
        new.alignment = Alignment::Strict;

        let mut completions = fixture.service.subscribe();
        let mut events = fixture.service.events();
        let id = fixture
            .service
            .submit(Request::ResizeMove {
                old: old.clone(),
                new,
                rollback_on_fail: true,
            })
            .await
            .expect("submit");
        let completion = completion_of(&mut completions, &id).await;

        assert!(matches!(completion.outcome, Ok(Outcome::Applied)));
        assert_eq!(completion.operation, OperationKind::Partitioning);
        assert_eq!(
            fixture.table.committed_range("/dev/sda1"),
            Some(SectorRange::new(2048, 411_647))
        );
        let refreshed = completion.graph.expect("refreshed graph");
        assert!(refreshed.generation > graph.generation);
        let (_, partition) = refreshed.find_partition("/dev/sda1").expect("sda1");
        assert_eq!(partition.end, 411_647);

        let started = events.recv().await.expect("started event");
        assert!(matches!(
            started,
            OperationEvent::Started { operation_id, .. } if operation_id == id
        ));
        let finished = events.recv().await.expect("completed event");
        assert!(matches!(
            finished,
            OperationEvent::Completed { operation_id, .. } if operation_id == id
        ));
    }

    #[tokio::test]
    async fn stale_partitions_are_rejected() {
        let fixture = fixture();
        let graph = probed(&fixture).await;
        let (_, partition) = graph.find_partition("/dev/sda1").expect("sda1");
        let mut stale = partition.clone();
        stale.end = 100_000;

        let mut completions = fixture.service.subscribe();
        let id = fixture
            .service
            .submit(Request::DeletePartition { partition: stale })
            .await
            .expect("submit");
        let completion = completion_of(&mut completions, &id).await;

        let error = completion.outcome.expect_err("stale geometry");
        assert_eq!(error.kind, StorageErrorKind::ConstraintViolation);
        assert!(fixture.table.committed_range("/dev/sda1").is_some());
    }

    #[tokio::test]
    async fn unknown_volume_group_fails_before_planning() {
        let fixture = fixture();
        let mut completions = fixture.service.subscribe();
        let id = fixture
            .service
            .submit(Request::AllocatePvs {
                candidates: Vec::new(),
                target_bytes: 1 << 30,
                volume_group: Some("vg_missing".to_string()),
            })
            .await
            .expect("submit");
        let completion = completion_of(&mut completions, &id).await;

        assert_eq!(completion.operation, OperationKind::Lvm);
        let error = completion.outcome.expect_err("missing group");
        assert_eq!(error.kind, StorageErrorKind::NotFound);
    }
}

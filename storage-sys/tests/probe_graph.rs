// SPDX-License-Identifier: GPL-3.0-only

mod common;

use std::sync::Arc;

use common::{GIB_SECTORS, Harness, SECTOR};
use storage_contracts::RecordKind;
use storage_sys::CapabilityTable;
use storage_testing::{FakeFsInfo, FakeMounts, MemoryDisk, record};
use storage_types::{FilesystemType, PartitionKind, SectorRange, TableKind};

const GIB: u64 = GIB_SECTORS * SECTOR;

fn capabilities(harness: &Harness) -> CapabilityTable {
    CapabilityTable::new().with_tool(Arc::new(
        harness
            .tool(FilesystemType::Ext4)
            .with_label("data")
            .with_uuid("8d1c7a5e-1a7e-4c53-9f4e-0f6c2b1d9e11"),
    ))
}

#[test]
fn gpt_disk_with_gaps_and_signatures() {
    let harness = Harness::new();
    harness.add_disk(
        "/dev/sda",
        GIB_SECTORS,
        Some("gpt"),
        vec![
            record("/dev/sda", 1, RecordKind::Normal, 2048, 206_847),
            record("/dev/sda", 2, RecordKind::Normal, 411_648, 616_447),
        ],
    );
    harness.io.insert(
        "/dev/sda",
        MemoryDisk::new(GIB).with_bytes(411_648 * SECTOR, b"LUKS\xBA\xBE"),
    );
    let engine = harness.engine(
        capabilities(&harness),
        FakeMounts::new().mounted("/dev/sda1", "/data", 100 * 1024 * 1024, 25 * 1024 * 1024),
        FakeFsInfo::new().entry("/dev/sda1", "ext4", None, None),
    );

    let graph = engine.probe().expect("probe");
    assert_eq!(graph.generation, 1);
    let device = graph.device("/dev/sda").expect("sda");
    assert_eq!(device.table, TableKind::Named("gpt".into()));

    let layout: Vec<(PartitionKind, SectorRange)> = device
        .top_level_partitions()
        .map(|partition| (partition.kind, partition.range()))
        .collect();
    assert_eq!(
        layout,
        vec![
            (PartitionKind::Primary, SectorRange::new(2048, 206_847)),
            (PartitionKind::Unallocated, SectorRange::new(206_848, 411_647)),
            (PartitionKind::Primary, SectorRange::new(411_648, 616_447)),
            (PartitionKind::Unallocated, SectorRange::new(616_448, GIB_SECTORS - 1)),
        ]
    );

    let root = device.find_by_path("/dev/sda1").expect("sda1");
    assert_eq!(root.filesystem, FilesystemType::Ext4);
    assert!(root.busy);
    assert_eq!(root.mount_points, vec!["/data".to_string()]);
    assert_eq!(root.label.as_deref(), Some("data"));
    let usage = root.usage.expect("mounted usage");
    assert_eq!(usage.used, 75 * 1024 * 1024 / SECTOR);

    let encrypted = device.find_by_path("/dev/sda2").expect("sda2");
    assert_eq!(encrypted.filesystem, FilesystemType::Luks);
    assert!(!encrypted.busy);

    assert_eq!(engine.probe().expect("second probe").generation, 2);
}

#[test]
fn dos_logicals_hide_single_mebibyte_gaps() {
    let harness = Harness::new();
    harness.add_disk(
        "/dev/sdb",
        GIB_SECTORS,
        Some("dos"),
        vec![
            record("/dev/sdb", 1, RecordKind::Normal, 2048, 206_847),
            record("/dev/sdb", 2, RecordKind::Extended, 206_848, 1_026_047),
            record("/dev/sdb", 5, RecordKind::Logical, 208_896, 411_647),
            record("/dev/sdb", 6, RecordKind::Logical, 413_696, 616_447),
        ],
    );
    let engine = harness.engine(capabilities(&harness), FakeMounts::new(), FakeFsInfo::new());

    let graph = engine.probe().expect("probe");
    let device = graph.device("/dev/sdb").expect("sdb");

    let top: Vec<PartitionKind> = device.top_level_partitions().map(|p| p.kind).collect();
    assert_eq!(
        top,
        vec![
            PartitionKind::Primary,
            PartitionKind::Extended,
            PartitionKind::Unallocated,
        ]
    );

    let extended = device.extended().expect("extended");
    let nested: Vec<(PartitionKind, SectorRange)> = device
        .children(extended)
        .map(|partition| (partition.kind, partition.range()))
        .collect();
    assert_eq!(
        nested,
        vec![
            (PartitionKind::Logical, SectorRange::new(208_896, 411_647)),
            (PartitionKind::Logical, SectorRange::new(413_696, 616_447)),
            (PartitionKind::Unallocated, SectorRange::new(616_448, 1_026_047)),
        ]
    );
    assert!(
        device
            .children(extended)
            .all(|partition| partition.inside_extended)
    );
}

#[test]
fn whole_disk_filesystems_and_unreadable_devices() {
    let harness = Harness::new();
    harness.add_disk("/dev/sdc", GIB_SECTORS, None, Vec::new());
    harness.add_disk("/dev/sdd", GIB_SECTORS, None, Vec::new());
    harness.add_disk("/dev/sde", GIB_SECTORS, None, Vec::new());
    harness.io.make_unreadable("/dev/sdc");
    let engine = harness.engine(
        capabilities(&harness),
        FakeMounts::new(),
        FakeFsInfo::new().entry("/dev/sdd", "xfs", Some("archive"), None),
    );

    let graph = engine.probe().expect("probe");
    assert!(graph.device("/dev/sdc").is_none());

    let whole = graph.device("/dev/sdd").expect("sdd");
    assert_eq!(whole.table, TableKind::None);
    let content: Vec<(PartitionKind, FilesystemType)> = whole
        .top_level_partitions()
        .map(|partition| (partition.kind, partition.filesystem))
        .collect();
    assert_eq!(content, vec![(PartitionKind::Unpartitioned, FilesystemType::Xfs)]);

    let blank = graph.device("/dev/sde").expect("sde");
    assert_eq!(blank.table, TableKind::Unrecognized);
    assert_eq!(
        blank.top_level_partitions().next().map(|partition| partition.filesystem),
        Some(FilesystemType::Unallocated)
    );
}

// SPDX-License-Identifier: GPL-3.0-only

mod common;

use std::sync::Arc;

use common::{GIB_SECTORS, Harness};
use storage_contracts::{
    FsCapabilities, FsSupport, GeometryConstraint, RecordKind, StorageErrorKind,
};
use storage_sys::{CapabilityTable, StorageEngine, classify, external_capabilities};
use storage_testing::{Call, FakeFsInfo, FakeFsTool, FakeMounts, record};
use storage_types::{Alignment, FilesystemType, Partition, ResizeAction, SectorRange};

fn ext4_disk(
    harness: &Harness,
    start: u64,
    end: u64,
    tool: FakeFsTool,
) -> (StorageEngine, Partition) {
    ext4_disk_with(harness, start, end, CapabilityTable::new().with_tool(Arc::new(tool)))
}

fn ext4_disk_with(
    harness: &Harness,
    start: u64,
    end: u64,
    capabilities: CapabilityTable,
) -> (StorageEngine, Partition) {
    harness.add_disk(
        "/dev/sda",
        2 * GIB_SECTORS,
        Some("gpt"),
        vec![record("/dev/sda", 1, RecordKind::Normal, start, end)],
    );
    let engine = harness.engine(
        capabilities,
        FakeMounts::new(),
        FakeFsInfo::new().entry("/dev/sda1", "ext4", Some("data"), None),
    );
    let graph = engine.probe().expect("probe");
    let (_, partition) = graph.find_partition("/dev/sda1").expect("partition 1");
    assert_eq!(partition.filesystem, FilesystemType::Ext4);
    let partition = partition.clone();
    harness.ledger.clear();
    (engine, partition)
}

/// A table entry without a filesystem, as left behind by a fresh create
fn unformatted_disk(harness: &Harness, start: u64, end: u64) -> (StorageEngine, Partition) {
    harness.add_disk(
        "/dev/sda",
        2 * GIB_SECTORS,
        Some("gpt"),
        vec![record("/dev/sda", 1, RecordKind::Normal, start, end)],
    );
    let engine = harness.engine(CapabilityTable::new(), FakeMounts::new(), FakeFsInfo::new());
    let graph = engine.probe().expect("probe");
    let (_, partition) = graph.find_partition("/dev/sda1").expect("partition 1");
    let mut partition = partition.clone();
    partition.filesystem = FilesystemType::Unformatted;
    harness.ledger.clear();
    (engine, partition)
}

fn moved(partition: &Partition, start: u64, end: u64) -> Partition {
    let mut target = partition.clone();
    target.start = start;
    target.end = end;
    target.alignment = Alignment::Strict;
    target
}

#[test]
fn shrink_resizes_filesystem_before_the_table() {
    let harness = Harness::new();
    let tool = harness.tool(FilesystemType::Ext4).with_usage(1000, 200_000);
    let (engine, old) = ext4_disk(&harness, 2048, 206_847, tool);
    let new = moved(&old, 2048, 104_447);

    engine.execute_resize_move(&old, &new, true).expect("shrink");

    let check = harness
        .ledger
        .position(|call| matches!(call, Call::FsCheck { .. }))
        .expect("check ran");
    let resize = harness
        .ledger
        .position(|call| matches!(call, Call::FsResize { .. }))
        .expect("resize ran");
    let commit = harness
        .ledger
        .position(|call| matches!(call, Call::Commit { succeeded: true, .. }))
        .expect("table committed");
    assert!(check < resize && resize < commit);

    let resize_call = harness
        .ledger
        .calls()
        .into_iter()
        .find(|call| matches!(call, Call::FsResize { .. }));
    assert_eq!(
        resize_call,
        Some(Call::FsResize {
            path: "/dev/sda1".into(),
            target: SectorRange::new(2048, 104_447),
            fill: false,
            committed: Some(SectorRange::new(2048, 206_847)),
        })
    );
    assert_eq!(
        harness.table.committed_range("/dev/sda1"),
        Some(SectorRange::new(2048, 104_447))
    );
}

#[test]
fn grow_fills_after_the_table_moves() {
    let harness = Harness::new();
    let (engine, old) = ext4_disk(&harness, 2048, 206_847, harness.tool(FilesystemType::Ext4));
    let new = moved(&old, 2048, 411_647);

    engine.execute_resize_move(&old, &new, true).expect("grow");

    let commit = harness
        .ledger
        .position(|call| matches!(call, Call::Commit { succeeded: true, .. }))
        .expect("table committed");
    let resize = harness
        .ledger
        .position(|call| matches!(call, Call::FsResize { fill: true, .. }))
        .expect("filesystem grown");
    assert!(commit < resize);
    assert_eq!(
        harness.table.committed_range("/dev/sda1"),
        Some(SectorRange::new(2048, 411_647))
    );
}

#[test]
fn failed_move_rolls_back_through_the_overlap() {
    let harness = Harness::new();
    let (engine, old) = unformatted_disk(&harness, 100, 200);
    let new = moved(&old, 150, 260);
    harness.table.fail_next_commits(1);

    let error = engine
        .execute_resize_move(&old, &new, true)
        .expect_err("commit fails");

    assert_eq!(error.kind, StorageErrorKind::TableCommitFailed);
    assert!(error.message.contains("previous bounds restored"));
    assert_eq!(
        harness.ledger.geometry_requests(),
        vec![
            GeometryConstraint::Exact(SectorRange::new(150, 260)),
            GeometryConstraint::Exact(SectorRange::new(150, 200)),
            GeometryConstraint::Exact(SectorRange::new(100, 200)),
        ]
    );
    assert_eq!(harness.ledger.commits(), vec![false, true, true]);
    assert_eq!(
        harness.table.committed_range("/dev/sda1"),
        Some(SectorRange::new(100, 200))
    );
}

#[test]
fn failed_move_without_rollback_leaves_the_table_alone() {
    let harness = Harness::new();
    let (engine, old) = unformatted_disk(&harness, 100, 200);
    let new = moved(&old, 150, 260);
    harness.table.fail_next_commits(1);

    let error = engine
        .execute_resize_move(&old, &new, false)
        .expect_err("commit fails");

    assert_eq!(error.kind, StorageErrorKind::TableCommitFailed);
    assert_eq!(harness.ledger.commits(), vec![false]);
}

#[test]
fn shrinking_below_used_space_is_refused() {
    let harness = Harness::new();
    let tool = harness.tool(FilesystemType::Ext4).with_usage(150_000, 54_800);
    let (engine, old) = ext4_disk(&harness, 2048, 206_847, tool);
    let new = moved(&old, 2048, 104_447);

    let error = engine
        .execute_resize_move(&old, &new, true)
        .expect_err("too small");

    assert_eq!(error.kind, StorageErrorKind::ConstraintViolation);
    assert!(harness.ledger.mutations().is_empty());
}

#[test]
fn swap_is_recreated_after_moving() {
    let harness = Harness::new();
    harness.add_disk(
        "/dev/sda",
        2 * GIB_SECTORS,
        Some("gpt"),
        vec![record("/dev/sda", 1, RecordKind::Normal, 2048, 206_847)],
    );
    let engine = harness.engine(
        CapabilityTable::new().with_tool(Arc::new(harness.tool(FilesystemType::LinuxSwap))),
        FakeMounts::new(),
        FakeFsInfo::new().entry("/dev/sda1", "swap", None, None),
    );
    let graph = engine.probe().expect("probe");
    let (_, old) = graph.find_partition("/dev/sda1").expect("swap partition");
    let new = moved(old, 4096, 411_647);
    harness.ledger.clear();

    engine.execute_resize_move(old, &new, true).expect("move swap");

    let commit = harness
        .ledger
        .position(|call| matches!(call, Call::Commit { succeeded: true, .. }))
        .expect("table committed");
    let create = harness
        .ledger
        .position(|call| {
            matches!(
                call,
                Call::FsCreate {
                    filesystem: FilesystemType::LinuxSwap,
                    ..
                }
            )
        })
        .expect("swap recreated");
    assert!(commit < create);
    assert!(
        !harness
            .ledger
            .calls()
            .iter()
            .any(|call| matches!(call, Call::FsResize { .. }))
    );
}

#[test]
fn moving_an_unformatted_entry_only_rewrites_the_table() {
    let harness = Harness::new();
    let (engine, old) = unformatted_disk(&harness, 2048, 206_847);
    let new = moved(&old, 4096, 411_647);

    engine.execute_resize_move(&old, &new, true).expect("move");

    assert_eq!(
        harness.table.committed_range("/dev/sda1"),
        Some(SectorRange::new(4096, 411_647))
    );
    assert!(
        !harness
            .ledger
            .calls()
            .iter()
            .any(|call| matches!(call, Call::FsCheck { .. } | Call::FsResize { .. }))
    );
}

#[test]
fn moving_the_start_of_a_filesystem_while_growing_is_refused() {
    let harness = Harness::new();
    let (engine, old) = ext4_disk(&harness, 2048, 206_847, harness.tool(FilesystemType::Ext4));
    let new = moved(&old, 4096, 411_647);
    assert_eq!(classify(old.range(), new.range()), ResizeAction::MoveRightGrow);

    let error = engine
        .execute_resize_move(&old, &new, true)
        .expect_err("data would be left behind");

    assert_eq!(error.kind, StorageErrorKind::ConstraintViolation);
    assert!(harness.ledger.mutations().is_empty());
    assert_eq!(
        harness.table.committed_range("/dev/sda1"),
        Some(SectorRange::new(2048, 206_847))
    );
}

#[test]
fn moving_the_start_of_a_filesystem_while_shrinking_is_refused() {
    let harness = Harness::new();
    let tool = harness.tool(FilesystemType::Ext4).with_usage(1000, 200_000);
    let (engine, old) = ext4_disk(&harness, 2048, 206_847, tool);
    let new = moved(&old, 8192, 210_943);
    assert_eq!(classify(old.range(), new.range()), ResizeAction::MoveRightShrink);

    let error = engine
        .execute_resize_move(&old, &new, true)
        .expect_err("data would be left behind");

    assert_eq!(error.kind, StorageErrorKind::ConstraintViolation);
    assert!(harness.ledger.mutations().is_empty());
}

#[test]
fn growing_leftwards_is_refused_for_filesystems() {
    let harness = Harness::new();
    let (engine, old) = ext4_disk(&harness, 4096, 206_847, harness.tool(FilesystemType::Ext4));
    let new = moved(&old, 2048, 411_647);

    let error = engine
        .execute_resize_move(&old, &new, true)
        .expect_err("start would move");

    assert_eq!(error.kind, StorageErrorKind::ConstraintViolation);
    assert!(harness.ledger.mutations().is_empty());
}

#[test]
fn shrink_without_a_checker_writes_nothing() {
    let harness = Harness::new();
    let tool = harness.tool(FilesystemType::Ext4).with_usage(1000, 200_000);
    let capabilities = FsCapabilities {
        check: FsSupport::Unsupported,
        ..external_capabilities()
    };
    let (engine, old) = ext4_disk_with(
        &harness,
        2048,
        206_847,
        CapabilityTable::new().with(FilesystemType::Ext4, capabilities, Some(Arc::new(tool))),
    );
    let new = moved(&old, 2048, 104_447);

    let error = engine
        .execute_resize_move(&old, &new, true)
        .expect_err("no checker");

    assert_eq!(error.kind, StorageErrorKind::Unsupported);
    assert!(harness.ledger.mutations().is_empty());
    assert_eq!(
        harness.table.committed_range("/dev/sda1"),
        Some(SectorRange::new(2048, 206_847))
    );
}

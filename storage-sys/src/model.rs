// SPDX-License-Identifier: GPL-3.0-only

//! Turns raw table records into a `Device` with a gap-free partition list

use storage_contracts::{DeviceInfo, PartitionRecord, RecordKind};
use storage_types::{
    mebibyte_sectors, Device, FilesystemType, Partition, PartitionKind, SectorRange, TableKind,
};

/// Table-level facts read from an open session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub label: String,
    pub max_primaries: u32,
    pub max_name_length: Option<usize>,
}

/// Insert `Unallocated` entries for free space in `[start, end]`.
///
/// `entries` must be sorted by start sector. Gaps wider than one mebibyte
/// always become entries. A gap of exactly one mebibyte becomes an entry
/// only between two partitions when the following one is not logical, or
/// at the end of the range; the leading alignment gap stays hidden.
pub fn insert_unallocated(
    device_path: &str,
    entries: &mut Vec<Partition>,
    start: u64,
    end: u64,
    sector_size: u64,
    inside_extended: bool,
) {
    let mib = mebibyte_sectors(sector_size);
    let gap = |from: u64, to: u64| {
        Partition::unallocated(
            device_path,
            SectorRange::new(from, to),
            sector_size,
            inside_extended,
        )
    };

    if entries.is_empty() {
        entries.push(gap(start, end));
        return;
    }

    let mut filled = Vec::with_capacity(entries.len() * 2 + 1);

    let first_start = entries[0].start;
    if first_start > start && first_start - start > mib {
        filled.push(gap(start, first_start - 1));
    }

    let mut previous_end: Option<u64> = None;
    for entry in entries.drain(..) {
        if let Some(previous_end) = previous_end {
            if entry.start > previous_end + 1 {
                let free = entry.start - previous_end - 1;
                if free > mib || (free == mib && entry.kind != PartitionKind::Logical) {
                    filled.push(gap(previous_end + 1, entry.start - 1));
                }
            }
        }
        previous_end = Some(previous_end.map_or(entry.end, |end| end.max(entry.end)));
        filled.push(entry);
    }

    if let Some(last_end) = previous_end {
        if end > last_end && end - last_end >= mib {
            filled.push(gap(last_end + 1, end));
        }
    }

    *entries = filled;
}

fn device_shell(info: &DeviceInfo) -> Device {
    let mut device = Device::new(info.path.clone(), info.sector_size, info.length);
    device.model = info.model.clone();
    device.serial = info.serial.clone();
    device.geometry = info.geometry;
    device.geometry.cylinder_size = device
        .geometry
        .cylinder_size
        .max(mebibyte_sectors(info.sector_size));
    device
}

/// A device without a usable table: one entry spanning all sectors
pub fn build_unpartitioned(
    info: &DeviceInfo,
    table: TableKind,
    filesystem: FilesystemType,
) -> Device {
    let mut device = device_shell(info);
    device.table = table;
    device.max_primaries = 1;
    device.push_top_level(
        Partition::unpartitioned(info.path.clone(), device.range(), info.sector_size, filesystem),
        Vec::new(),
    );
    device
}

fn partition_from_record(
    info: &DeviceInfo,
    record: &PartitionRecord,
    kind: PartitionKind,
) -> Partition {
    let mut partition = Partition::new(
        info.path.clone(),
        record.path.clone(),
        record.number,
        kind,
        record.range,
        info.sector_size,
    );
    partition.name = record.name.clone();
    partition.flags = record.flags.clone();
    partition.busy = record.busy;
    partition
}

/// Build the partition tree of a device with a recognized table.
///
/// `detect` resolves the content type of each primary and logical record.
pub fn build_partitioned(
    info: &DeviceInfo,
    layout: &TableLayout,
    records: &[PartitionRecord],
    mut detect: impl FnMut(&PartitionRecord) -> FilesystemType,
) -> Device {
    let mut device = device_shell(info);
    device.table = TableKind::Named(layout.label.clone());
    device.max_primaries = layout.max_primaries;
    device.max_name_length = layout.max_name_length;

    let mut sorted: Vec<&PartitionRecord> = records.iter().collect();
    sorted.sort_by_key(|record| record.range.start);

    let mut top_level = Vec::new();
    let mut logicals = Vec::new();
    let mut extended: Option<Partition> = None;

    for record in sorted {
        match record.kind {
            RecordKind::Normal => {
                let mut partition = partition_from_record(info, record, PartitionKind::Primary);
                partition.filesystem = detect(record);
                top_level.push(partition);
            }
            RecordKind::Logical => {
                let mut partition = partition_from_record(info, record, PartitionKind::Logical);
                partition.filesystem = detect(record);
                logicals.push(partition);
            }
            RecordKind::Extended => {
                if extended.is_some() {
                    tracing::warn!(
                        "{}: ignoring second extended partition {}",
                        info.path,
                        record.number
                    );
                    continue;
                }
                let mut partition = partition_from_record(info, record, PartitionKind::Extended);
                partition.filesystem = FilesystemType::Extended;
                extended = Some(partition);
            }
            RecordKind::Other(bits) => {
                tracing::debug!(
                    "{}: dropping record {} with type bits {bits:#x}",
                    info.path,
                    record.number
                );
            }
        }
    }

    device.highest_busy = top_level
        .iter()
        .chain(logicals.iter())
        .filter(|partition| partition.busy)
        .map(|partition| partition.number)
        .max()
        .unwrap_or(0);

    if let Some(mut container) = extended {
        let range = container.range();
        logicals.retain(|logical| {
            let inside = range.contains(&logical.range());
            if !inside {
                tracing::warn!(
                    "{}: logical partition {} lies outside the extended partition",
                    info.path,
                    logical.number
                );
            }
            inside
        });
        insert_unallocated(
            &info.path,
            &mut logicals,
            range.start,
            range.end,
            info.sector_size,
            true,
        );
        container.busy = container.busy
            || logicals
                .iter()
                .any(|logical| logical.kind == PartitionKind::Logical && logical.busy);
        top_level.push(container);
        top_level.sort_by_key(|partition| partition.start);
    } else if !logicals.is_empty() {
        tracing::warn!(
            "{}: {} logical partitions without an extended partition",
            info.path,
            logicals.len()
        );
        logicals.clear();
    }

    let last = device.range().end;
    insert_unallocated(&info.path, &mut top_level, 0, last, info.sector_size, false);

    let mut children = Some(logicals);
    for partition in top_level {
        let nested = if partition.kind == PartitionKind::Extended {
            children.take().unwrap_or_default()
        } else {
            Vec::new()
        };
        device.push_top_level(partition, nested);
    }

    device
}

// SPDX-License-Identifier: GPL-3.0-only

//! Partition-level operations: create, delete, format, wipe and table edits

use rand::RngCore;
use storage_contracts::{
    BlockIo, CryptTool, FsSupport, GeometryConstraint, RecordKind, SectorWriter, StorageError,
    StorageErrorKind, TableBackend, TableSession,
};
use storage_types::{
    Alignment, Device, FilesystemType, Partition, PartitionKind, SectorRange, GIBIBYTE, KIBIBYTE,
    MEBIBYTE,
};

use crate::capabilities::CapabilityTable;
use crate::config::EngineConfig;

const PEBIBYTE: i128 = 1024 * 1024 * 1024 * 1024 * 1024;

/// Zeroed to erase signatures: (offset, rounding, length) in bytes.
/// Negative offsets count back from the end of the partition.
const SIGNATURE_RANGES: &[(i128, i128, i128)] = &[
    // primary super blocks of every known format
    (0, 1, 512 * KIBIBYTE as i128),
    // btrfs super block mirrors
    (64 * MEBIBYTE as i128, 1, 4 * KIBIBYTE as i128),
    (256 * GIBIBYTE as i128, 1, 4 * KIBIBYTE as i128),
    (PEBIBYTE, 1, 4 * KIBIBYTE as i128),
    // ZFS labels L2 and L3
    (-512 * KIBIBYTE as i128, 256 * KIBIBYTE as i128, 512 * KIBIBYTE as i128),
    // software RAID 0.90 super block
    (-64 * KIBIBYTE as i128, 64 * KIBIBYTE as i128, 4 * KIBIBYTE as i128),
    // software RAID 1.0 super block and nilfs2 secondary super block
    (-8 * KIBIBYTE as i128, 4 * KIBIBYTE as i128, 8 * KIBIBYTE as i128),
];

/// Buffer size used while streaming wipe patterns
const WIPE_BUFFER_BYTES: usize = 4 * MEBIBYTE as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeLevel {
    /// Only erase signatures
    Fast,
    SinglePass,
    SevenPass,
    ThirtyFivePass,
}

impl WipeLevel {
    pub fn passes(&self) -> u32 {
        match self {
            Self::Fast => 0,
            Self::SinglePass => 1,
            Self::SevenPass => 7,
            Self::ThirtyFivePass => 35,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPartitionRequest {
    pub kind: PartitionKind,
    pub range: SectorRange,
    pub alignment: Alignment,
    pub filesystem: FilesystemType,
    pub label: Option<String>,
    pub name: Option<String>,
}

/// Normalize a table format name to "gpt" or "dos"
pub fn normalize_table_label(label: &str) -> Result<&'static str, StorageError> {
    match label.to_lowercase().as_str() {
        "gpt" => Ok("gpt"),
        "dos" | "mbr" | "msdos" => Ok("dos"),
        _ => Err(StorageError::new(
            StorageErrorKind::InvalidInput,
            format!("Invalid table type: {label}. Must be 'gpt' or 'dos'/'mbr'"),
        )),
    }
}

fn floor_to(value: i128, multiple: i128) -> i128 {
    value.div_euclid(multiple) * multiple
}

fn ceil_to(value: i128, multiple: i128) -> i128 {
    floor_to(value + multiple - 1, multiple)
}

/// Byte spans, relative to the partition start, zeroed to erase signatures
pub fn signature_spans(byte_length: u64, sector_size: u64) -> Vec<(u64, u64)> {
    let length = byte_length as i128;
    let sector = sector_size.max(1) as i128;
    let mut spans = Vec::new();

    for &(offset, rounding, span) in SIGNATURE_RANGES {
        let rounding_size = ceil_to(rounding, sector);
        let (mut start, mut len) = if offset >= 0 {
            let start = floor_to(offset, rounding_size);
            (start, ceil_to(offset + span, sector) - start)
        } else {
            let notional = floor_to(length + offset, rounding);
            let start = floor_to(notional, rounding_size);
            (start, ceil_to(notional + span, sector) - start)
        };

        if start + len <= 0 {
            continue;
        }
        if start < 0 {
            len += start;
            start = 0;
        }
        if start >= length {
            continue;
        }
        if start + len > length {
            len = length - start;
        }
        spans.push((start as u64, len as u64));
    }

    spans
}

fn table_kind(kind: PartitionKind) -> Result<RecordKind, StorageError> {
    match kind {
        PartitionKind::Primary => Ok(RecordKind::Normal),
        PartitionKind::Logical => Ok(RecordKind::Logical),
        PartitionKind::Extended => Ok(RecordKind::Extended),
        other => Err(StorageError::new(
            StorageErrorKind::InvalidInput,
            format!("cannot create a {other:?} table entry"),
        )),
    }
}

/// Collaborators needed to change partitions
#[derive(Clone, Copy)]
pub struct PartitionOps<'a> {
    pub backend: &'a dyn TableBackend,
    pub block_io: &'a dyn BlockIo,
    pub crypt: &'a dyn CryptTool,
    pub capabilities: &'a CapabilityTable,
    pub config: &'a EngineConfig,
}

impl<'a> PartitionOps<'a> {
    pub fn open(&self, device_path: &str) -> Result<Box<dyn TableSession>, StorageError> {
        self.backend.open(device_path)
    }

    /// Placement constraint for `target` under the given alignment
    pub fn constraint(
        &self,
        target: SectorRange,
        alignment: Alignment,
        min_bytes: u64,
        sector_size: u64,
    ) -> GeometryConstraint {
        if alignment.is_exact() {
            GeometryConstraint::Exact(target)
        } else {
            GeometryConstraint::Any {
                within: target,
                min_sectors: min_bytes.div_ceil(sector_size.max(1)).max(1),
            }
        }
    }

    /// Write new bounds for an existing entry and commit them
    pub fn commit_geometry(
        &self,
        partition: &Partition,
        target: SectorRange,
        alignment: Alignment,
    ) -> Result<SectorRange, StorageError> {
        let min_bytes = self
            .capabilities
            .tool(partition.filesystem)
            .map(|tool| tool.min_size())
            .unwrap_or(0);
        let constraint = self.constraint(target, alignment, min_bytes, partition.sector_size);
        let mut session = self.open(&partition.device_path)?;
        let placed = session.set_geometry(partition.number, constraint)?;
        session.commit()?;
        tracing::info!(
            "{}: partition {} now spans {placed}",
            partition.device_path,
            partition.number
        );
        Ok(placed)
    }

    pub fn create_partition(
        &self,
        device: &Device,
        request: &NewPartitionRequest,
    ) -> Result<Partition, StorageError> {
        let kind = table_kind(request.kind)?;
        self.validate_new_partition(device, request)?;

        let min_bytes = self
            .capabilities
            .tool(request.filesystem)
            .map(|tool| tool.min_size())
            .unwrap_or(0);
        if request.range.byte_length(device.sector_size) < min_bytes {
            return Err(StorageError::new(
                StorageErrorKind::ConstraintViolation,
                format!(
                    "{} needs at least {min_bytes} bytes, {} requested",
                    request.filesystem,
                    request.range.byte_length(device.sector_size)
                ),
            ));
        }

        let mut session = self.open(&device.path)?;
        let constraint =
            self.constraint(request.range, request.alignment, min_bytes, device.sector_size);
        let record = session.add_partition(kind, constraint)?;
        if request.kind != PartitionKind::Extended && request.filesystem.is_recognized() {
            session.set_type(record.number, request.filesystem)?;
        }
        if let Some(name) = &request.name {
            match device.max_name_length {
                Some(max) if name.chars().count() <= max => {
                    session.set_name(record.number, name)?
                }
                Some(max) => {
                    return Err(StorageError::new(
                        StorageErrorKind::ConstraintViolation,
                        format!("partition name longer than {max} characters"),
                    ))
                }
                None => tracing::warn!(
                    "{}: table {} has no partition names, ignoring '{name}'",
                    device.path,
                    device.table.label()
                ),
            }
        }
        session.commit()?;
        drop(session);

        let mut partition = Partition::new(
            device.path.clone(),
            record.path.clone(),
            record.number,
            request.kind,
            record.range,
            device.sector_size,
        );
        partition.alignment = request.alignment;
        partition.name = request.name.clone();
        partition.filesystem = if request.kind == PartitionKind::Extended {
            FilesystemType::Extended
        } else {
            request.filesystem
        };
        tracing::info!(
            "{}: created partition {} at {}",
            device.path,
            partition.number,
            partition.range()
        );

        if request.kind != PartitionKind::Extended {
            match request.filesystem {
                FilesystemType::Cleared => self.erase_signatures(&partition)?,
                fs if fs.is_recognized() => {
                    self.erase_signatures(&partition)?;
                    self.create_filesystem(&partition, request.label.as_deref())?;
                }
                _ => {}
            }
        }

        Ok(partition)
    }

    fn validate_new_partition(
        &self,
        device: &Device,
        request: &NewPartitionRequest,
    ) -> Result<(), StorageError> {
        let violation = |message: String| {
            Err(StorageError::new(StorageErrorKind::ConstraintViolation, message))
        };

        if !device.table.has_table() {
            return violation(format!("{} has no partition table", device.path));
        }
        if !request.range.is_valid() || !device.range().contains(&request.range) {
            return violation(format!("{} lies outside {}", request.range, device.path));
        }

        let gap_list: Vec<&Partition> = match request.kind {
            PartitionKind::Logical => {
                let Some(extended) = device.extended() else {
                    return violation(format!("{} has no extended partition", device.path));
                };
                device.children(extended).collect()
            }
            _ => device.top_level_partitions().collect(),
        };
        let fits = gap_list
            .iter()
            .any(|entry| entry.is_virtual() && entry.range().contains(&request.range));
        if !fits {
            return violation(format!("{} is not free space on {}", request.range, device.path));
        }

        if matches!(request.kind, PartitionKind::Primary | PartitionKind::Extended) {
            let used = device
                .top_level_partitions()
                .filter(|entry| {
                    matches!(entry.kind, PartitionKind::Primary | PartitionKind::Extended)
                })
                .count() as u32;
            if used >= device.max_primaries {
                return violation(format!(
                    "{} already holds {used} primary partitions",
                    device.path
                ));
            }
        }
        if request.kind == PartitionKind::Extended
            && (device.extended().is_some() || device.table.is_gpt())
        {
            return violation(format!("{} cannot hold another extended partition", device.path));
        }

        Ok(())
    }

    pub fn delete_partition(&self, partition: &Partition) -> Result<(), StorageError> {
        if partition.is_virtual() || partition.number == 0 {
            return Err(StorageError::new(
                StorageErrorKind::InvalidInput,
                format!("{} is not a table entry", partition.path),
            ));
        }
        if partition.busy {
            return Err(StorageError::new(
                StorageErrorKind::Busy,
                format!("{} is in use", partition.path),
            ));
        }
        self.close_open_mapping(&partition.path)?;

        let mut session = self.open(&partition.device_path)?;
        if partition.kind == PartitionKind::Extended {
            let has_logicals = session
                .records()
                .iter()
                .any(|record| record.kind == RecordKind::Logical);
            if has_logicals {
                return Err(StorageError::new(
                    StorageErrorKind::ConstraintViolation,
                    format!("{} still contains logical partitions", partition.path),
                ));
            }
        }
        session.delete_partition(partition.number)?;
        session.commit()?;
        tracing::info!("{}: deleted partition {}", partition.device_path, partition.number);
        Ok(())
    }

    pub fn set_partition_type(
        &self,
        partition: &Partition,
        filesystem: FilesystemType,
    ) -> Result<(), StorageError> {
        if partition.kind == PartitionKind::Unpartitioned {
            return Ok(());
        }
        let mut session = self.open(&partition.device_path)?;
        session.set_type(partition.number, filesystem)?;
        session.commit()
    }

    pub fn set_partition_name(
        &self,
        device: &Device,
        partition: &Partition,
        name: &str,
    ) -> Result<(), StorageError> {
        match device.max_name_length {
            Some(max) if name.chars().count() <= max => {}
            Some(max) => {
                return Err(StorageError::new(
                    StorageErrorKind::ConstraintViolation,
                    format!("partition name longer than {max} characters"),
                ))
            }
            None => {
                return Err(StorageError::new(
                    StorageErrorKind::Unsupported,
                    format!("{} tables have no partition names", device.table.label()),
                ))
            }
        }
        let mut session = self.open(&device.path)?;
        session.set_name(partition.number, name)?;
        session.commit()
    }

    /// Erase old signatures, set the table type and create `filesystem`
    pub fn format_partition(
        &self,
        partition: &Partition,
        filesystem: FilesystemType,
        label: Option<&str>,
    ) -> Result<(), StorageError> {
        if partition.filesystem == FilesystemType::Luks && partition.busy {
            return Err(StorageError::new(
                StorageErrorKind::FilesystemOperationFailed,
                format!("{} holds an open encrypted container", partition.path),
            ));
        }
        if partition.busy {
            return Err(StorageError::new(
                StorageErrorKind::Busy,
                format!("{} is in use", partition.path),
            ));
        }

        let mut target = partition.clone();
        target.filesystem = filesystem;

        self.erase_signatures(&target)?;
        self.set_partition_type(&target, filesystem)?;
        if !matches!(filesystem, FilesystemType::Cleared | FilesystemType::Unformatted) {
            self.create_filesystem(&target, label)?;
        }
        Ok(())
    }

    pub fn create_filesystem(
        &self,
        partition: &Partition,
        label: Option<&str>,
    ) -> Result<(), StorageError> {
        let capabilities = self.capabilities.capabilities(partition.filesystem);
        match (capabilities.create, self.capabilities.tool(partition.filesystem)) {
            (FsSupport::External, Some(tool)) => {
                tracing::info!("creating {} on {}", partition.filesystem, partition.path);
                tool.create(partition, label)
            }
            _ => Err(StorageError::new(
                StorageErrorKind::Unsupported,
                format!("creating {} is not supported", partition.filesystem),
            )),
        }
    }

    /// Zero the regions where filesystem and container signatures live
    pub fn erase_signatures(&self, partition: &Partition) -> Result<(), StorageError> {
        if partition.filesystem == FilesystemType::Luks && partition.busy {
            return Err(StorageError::new(
                StorageErrorKind::FilesystemOperationFailed,
                format!("{} holds an open encrypted container", partition.path),
            ));
        }

        let sector_size = partition.sector_size.max(1);
        let base = partition.start * sector_size;
        let buffer = vec![0u8; (4 * KIBIBYTE).max(sector_size) as usize];
        let mut writer = self.block_io.open_write(&partition.device_path)?;

        tracing::debug!("clearing old signatures in {}", partition.path);
        for (offset, length) in signature_spans(partition.byte_length(), sector_size) {
            let mut written = 0u64;
            while written < length {
                let amount = (length - written).min(buffer.len() as u64);
                writer
                    .write_at(base + offset + written, &buffer[..amount as usize])
                    .map_err(|error| write_error(partition, error))?;
                written += amount;
            }
        }
        writer.flush().map_err(|error| write_error(partition, error))
    }

    /// Replace the table of `device` with an empty one
    pub fn create_partition_table(&self, device: &Device, label: &str) -> Result<(), StorageError> {
        let label = normalize_table_label(label)?;
        if let Some(busy) = device.busy_partitions().next() {
            return Err(StorageError::new(
                StorageErrorKind::Busy,
                format!("{} is in use", busy.path),
            ));
        }

        let whole = Partition::unpartitioned(
            device.path.clone(),
            device.range(),
            device.sector_size,
            FilesystemType::Unknown,
        );
        self.erase_signatures(&whole)?;

        let mut session = self.open(&device.path)?;
        session.new_table(label)?;
        session.commit()?;
        tracing::info!("{}: created empty {label} partition table", device.path);
        Ok(())
    }

    /// Overwrite the partition with alternating zero and random chunks
    pub fn secure_wipe(&self, partition: &Partition, level: WipeLevel) -> Result<(), StorageError> {
        if partition.busy {
            return Err(StorageError::new(
                StorageErrorKind::Busy,
                format!("{} is in use", partition.path),
            ));
        }
        self.close_open_mapping(&partition.path)?;

        if level == WipeLevel::Fast {
            return self.erase_signatures(partition);
        }

        let base = partition.start * partition.sector_size;
        let total = partition.byte_length();
        let chunk = self.config.wipe_chunk_bytes.max(partition.sector_size).max(1);
        let full_chunks = total / chunk;
        let mut writer = self.block_io.open_write(&partition.device_path)?;
        let mut buffer = vec![0u8; WIPE_BUFFER_BYTES.min(chunk as usize)];

        for pass in 0..level.passes() {
            tracing::info!(
                "wiping {}: pass {} of {}",
                partition.path,
                pass + 1,
                level.passes()
            );
            for index in 0..full_chunks {
                let random = index % 2 == 1;
                fill_span(writer.as_mut(), &mut buffer, base + index * chunk, chunk, random)
                    .map_err(|error| write_error(partition, error))?;
            }
            let tail = total - full_chunks * chunk;
            if tail > 0 {
                fill_span(writer.as_mut(), &mut buffer, base + full_chunks * chunk, tail, false)
                    .map_err(|error| write_error(partition, error))?;
            }
            writer.flush().map_err(|error| write_error(partition, error))?;
        }
        Ok(())
    }

    /// Close the encrypted mapping stacked on `device_path`, if one is open
    pub fn close_open_mapping(&self, device_path: &str) -> Result<(), StorageError> {
        if let Some(mapping) = self.crypt.open_mapping(device_path)? {
            tracing::info!("closing {mapping} on {device_path}");
            self.crypt.close_mapping(&mapping)?;
        }
        Ok(())
    }
}

fn fill_span(
    writer: &mut dyn SectorWriter,
    buffer: &mut [u8],
    offset: u64,
    length: u64,
    random: bool,
) -> std::io::Result<()> {
    let mut written = 0u64;
    let mut rng = rand::thread_rng();
    while written < length {
        let amount = (length - written).min(buffer.len() as u64) as usize;
        let slice = &mut buffer[..amount];
        if random {
            rng.fill_bytes(slice);
        } else {
            slice.fill(0);
        }
        writer.write_at(offset + written, slice)?;
        written += amount as u64;
    }
    Ok(())
}

fn write_error(partition: &Partition, error: std::io::Error) -> StorageError {
    StorageError::new(
        StorageErrorKind::Internal,
        format!("writing to {} failed: {error}", partition.path),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use storage_testing::{
        record, Call, CallLedger, FakeCrypt, FakeFsTool, FakeTableBackend, MemoryBlockIo,
        MemoryDisk,
    };

    use crate::model::{build_partitioned, TableLayout};

    const LENGTH: u64 = GIBIBYTE / 512;

    #[test]
    fn signature_spans_for_one_gibibyte() {
        let length = GIBIBYTE;
        let spans = signature_spans(length, 512);
        assert_eq!(
            spans,
            vec![
                (0, 512 * KIBIBYTE),
                (64 * MEBIBYTE, 4 * KIBIBYTE),
                (length - 512 * KIBIBYTE, 512 * KIBIBYTE),
                (length - 64 * KIBIBYTE, 4 * KIBIBYTE),
                (length - 8 * KIBIBYTE, 8 * KIBIBYTE),
            ]
        );
    }

    #[test]
    fn signature_spans_are_clamped_to_small_partitions() {
        let spans = signature_spans(100 * KIBIBYTE, 512);
        assert!(spans
            .iter()
            .all(|(offset, length)| offset + length <= 100 * KIBIBYTE));
        assert_eq!(spans[0], (0, 100 * KIBIBYTE));
    }

    #[test]
    fn table_labels_are_normalized() {
        assert_eq!(normalize_table_label("MSDOS").expect("dos"), "dos");
        assert_eq!(normalize_table_label("gpt").expect("gpt"), "gpt");
        assert!(normalize_table_label("apm").is_err());
    }

    struct Rig {
        ledger: CallLedger,
        backend: FakeTableBackend,
        io: MemoryBlockIo,
        crypt: FakeCrypt,
        capabilities: CapabilityTable,
        config: EngineConfig,
    }

    impl Rig {
        fn new() -> Self {
            let ledger = CallLedger::new();
            let backend = FakeTableBackend::new(ledger.clone());
            backend.add_device(
                "/dev/sda",
                512,
                LENGTH,
                Some("gpt"),
                vec![record("/dev/sda", 1, RecordKind::Normal, 2048, 4095)],
            );
            let io = MemoryBlockIo::new(ledger.clone());
            io.insert(
                "/dev/sda",
                MemoryDisk::new(GIBIBYTE).with_bytes(2048 * 512, b"LUKS\xBA\xBE"),
            );
            let capabilities = CapabilityTable::new().with_tool(Arc::new(FakeFsTool::new(
                FilesystemType::Ext4,
                ledger.clone(),
            )));
            Self {
                crypt: FakeCrypt::new(ledger.clone()),
                ledger,
                backend,
                io,
                capabilities,
                config: EngineConfig::default(),
            }
        }

        fn ops(&self) -> PartitionOps<'_> {
            PartitionOps {
                backend: &self.backend,
                block_io: &self.io,
                crypt: &self.crypt,
                capabilities: &self.capabilities,
                config: &self.config,
            }
        }

        fn device(&self) -> Device {
            let info = self.backend.device_info("/dev/sda").expect("info");
            let layout = TableLayout {
                label: "gpt".into(),
                max_primaries: 128,
                max_name_length: Some(36),
            };
            build_partitioned(&info, &layout, &self.backend.committed_records("/dev/sda"), |_| {
                FilesystemType::Ext4
            })
        }
    }

    #[test]
    fn format_erases_then_types_then_creates() {
        let rig = Rig::new();
        let device = rig.device();
        let partition = device.find_by_number(1).expect("partition 1").clone();

        rig.ops()
            .format_partition(&partition, FilesystemType::Ext4, Some("data"))
            .expect("format");

        let calls = rig.ledger.mutations();
        let first_write = calls
            .iter()
            .position(|call| matches!(call, Call::BlockWrite { .. }))
            .expect("signature erase");
        let set_type = calls
            .iter()
            .position(|call| matches!(call, Call::SetType { filesystem: FilesystemType::Ext4, .. }))
            .expect("type set");
        let create = calls
            .iter()
            .position(|call| matches!(call, Call::FsCreate { .. }))
            .expect("filesystem created");
        assert!(first_write < set_type && set_type < create);

        let disk = rig.io.disk("/dev/sda").expect("disk");
        assert_eq!(disk.read_bytes(2048 * 512, 6), vec![0; 6]);
    }

    #[test]
    fn create_partition_in_free_space() {
        let rig = Rig::new();
        let device = rig.device();
        let request = NewPartitionRequest {
            kind: PartitionKind::Primary,
            range: SectorRange::new(4096, 208_895),
            alignment: Alignment::Mebibyte,
            filesystem: FilesystemType::Ext4,
            label: None,
            name: Some("home".into()),
        };

        let created = rig.ops().create_partition(&device, &request).expect("create");
        assert_eq!(created.number, 2);
        assert_eq!(created.path, "/dev/sda2");
        assert_eq!(rig.backend.committed_range("/dev/sda2"), Some(request.range));
        assert!(rig
            .ledger
            .calls()
            .iter()
            .any(|call| matches!(call, Call::SetName { name, .. } if name == "home")));
    }

    #[test]
    fn create_partition_rejects_occupied_space() {
        let rig = Rig::new();
        let device = rig.device();
        let request = NewPartitionRequest {
            kind: PartitionKind::Primary,
            range: SectorRange::new(3000, 300_000),
            alignment: Alignment::Mebibyte,
            filesystem: FilesystemType::Unformatted,
            label: None,
            name: None,
        };
        let error = rig.ops().create_partition(&device, &request).err().expect("rejected");
        assert_eq!(error.kind, StorageErrorKind::ConstraintViolation);
        assert!(rig.ledger.mutations().is_empty());
    }

    #[test]
    fn delete_closes_open_mapping_first() {
        let rig = Rig::new();
        rig.crypt.open("/dev/sda1", "luks-sda1");
        let partition = rig.device().find_by_number(1).expect("partition").clone();

        rig.ops().delete_partition(&partition).expect("delete");

        let close = rig
            .ledger
            .position(|call| matches!(call, Call::CloseMapping { .. }))
            .expect("mapping closed");
        let delete = rig
            .ledger
            .position(|call| matches!(call, Call::DeletePartition { number: 1, .. }))
            .expect("entry deleted");
        assert!(close < delete);
        assert!(rig.backend.committed_records("/dev/sda").is_empty());
    }

    #[test]
    fn busy_partitions_are_not_deleted() {
        let rig = Rig::new();
        let mut partition = rig.device().find_by_number(1).expect("partition").clone();
        partition.busy = true;
        let error = rig.ops().delete_partition(&partition).err().expect("busy");
        assert_eq!(error.kind, StorageErrorKind::Busy);
    }

    #[test]
    fn new_table_replaces_entries() {
        let rig = Rig::new();
        let device = rig.device();
        rig.ops().create_partition_table(&device, "msdos").expect("new table");
        assert_eq!(rig.backend.committed_label("/dev/sda").as_deref(), Some("dos"));
        assert!(rig.backend.committed_records("/dev/sda").is_empty());
    }

    #[test]
    fn secure_wipe_alternates_patterns() {
        let mut rig = Rig::new();
        rig.config.wipe_chunk_bytes = 64 * KIBIBYTE;
        let partition = rig.device().find_by_number(1).expect("partition").clone();

        rig.ops().secure_wipe(&partition, WipeLevel::SinglePass).expect("wipe");

        let disk = rig.io.disk("/dev/sda").expect("disk");
        let base = 2048 * 512;
        assert_eq!(disk.read_bytes(base, 16), vec![0; 16]);
        let second_chunk = disk.read_bytes(base + 64 * KIBIBYTE, 4096);
        assert!(second_chunk.iter().any(|byte| *byte != 0));
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Partition tables through sfdisk: JSON dumps to read, scripts to write

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use storage_contracts::{
    DeviceInfo, GeometryConstraint, PartitionRecord, RecordKind, StorageError, StorageErrorKind,
    TableBackend, TableSession,
};
use storage_types::{mebibyte_sectors, FilesystemType, Geometry, SectorRange};

use super::cmd::{run_command, run_with_input};
use super::udev;
use crate::{Result, SysError};

const GPT_LINUX_FS: &str = "0FC63DAF-8483-4772-8E79-3D69D8477DE4";
const GPT_LINUX_SWAP: &str = "0657FD6D-A4AB-43C4-84E5-0933C84B4F4F";
const GPT_LINUX_LVM: &str = "E6D6D379-F507-44C2-A23C-238F2A3DF928";
const GPT_LINUX_RAID: &str = "A19D880F-05FC-4D3B-A006-743F0F84911E";
const GPT_MS_BASIC_DATA: &str = "EBD0A0A2-B9E5-4433-87C0-68B6B72699C7";
const GPT_EFI_SYSTEM: &str = "C12A7328-F81F-11D2-BA4B-00A0C93EC93B";

const DOS_EXTENDED_TYPES: &[&str] = &["5", "f", "85"];

/// Sectors GPT keeps for its primary and backup tables
const GPT_TABLE_SECTORS: u64 = 34;

/// Block devices never offered for partitioning
const IGNORED_PREFIXES: &[&str] = &["ram", "zram", "sr", "fd", "dm-", "md"];

#[derive(Debug, Deserialize)]
struct SfdiskOutput {
    partitiontable: SfTable,
}

#[derive(Debug, Clone, Deserialize)]
struct SfTable {
    label: String,
    id: Option<String>,
    firstlba: Option<u64>,
    lastlba: Option<u64>,
    #[serde(default)]
    partitions: Vec<SfPartition>,
}

#[derive(Debug, Clone, Deserialize)]
struct SfPartition {
    node: String,
    start: u64,
    size: u64,
    #[serde(rename = "type")]
    partition_type: String,
    uuid: Option<String>,
    name: Option<String>,
    #[serde(default)]
    bootable: bool,
    attrs: Option<String>,
}

/// Device node of partition `number` on `device`
pub fn partition_path(device: &str, number: u32) -> String {
    if device.ends_with(|c: char| c.is_ascii_digit()) {
        format!("{device}p{number}")
    } else {
        format!("{device}{number}")
    }
}

fn partition_number(node: &str) -> Option<u32> {
    let digits = node.len() - node.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    node[node.len() - digits..].parse().ok()
}

fn sysfs_dir(path: &str) -> PathBuf {
    let name = path.rsplit('/').next().unwrap_or(path);
    Path::new("/sys/class/block").join(name)
}

fn read_sysfs(dir: &Path, attribute: &str) -> Option<String> {
    fs::read_to_string(dir.join(attribute))
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn has_holders(path: &str) -> bool {
    fs::read_dir(sysfs_dir(path).join("holders"))
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

fn normalize_dos_type(code: &str) -> String {
    code.trim().trim_start_matches("0x").to_lowercase()
}

fn type_code(label: &str, filesystem: FilesystemType) -> &'static str {
    let gpt = label == "gpt";
    match filesystem {
        FilesystemType::LinuxSwap => if gpt { GPT_LINUX_SWAP } else { "82" },
        FilesystemType::Lvm2Pv => if gpt { GPT_LINUX_LVM } else { "8e" },
        FilesystemType::LinuxRaid => if gpt { GPT_LINUX_RAID } else { "fd" },
        FilesystemType::Ntfs | FilesystemType::Exfat => if gpt { GPT_MS_BASIC_DATA } else { "7" },
        FilesystemType::Fat32 => if gpt { GPT_MS_BASIC_DATA } else { "c" },
        FilesystemType::Fat16 => if gpt { GPT_MS_BASIC_DATA } else { "e" },
        _ => if gpt { GPT_LINUX_FS } else { "83" },
    }
}

fn flags_for(code: &str, bootable: bool) -> Vec<String> {
    let mut flags = Vec::new();
    if bootable {
        flags.push("boot".to_string());
    }
    let flag = match code.to_uppercase().as_str() {
        GPT_EFI_SYSTEM | "EF" => Some("esp"),
        GPT_LINUX_LVM | "8E" => Some("lvm"),
        GPT_LINUX_RAID | "FD" => Some("raid"),
        GPT_LINUX_SWAP | "82" => Some("swap"),
        _ => None,
    };
    flags.extend(flag.map(str::to_string));
    flags
}

/// One staged table entry
#[derive(Debug, Clone)]
struct Entry {
    number: u32,
    kind: RecordKind,
    range: SectorRange,
    type_code: String,
    uuid: Option<String>,
    name: Option<String>,
    bootable: bool,
    attrs: Option<String>,
}

#[derive(Debug, Clone)]
struct StagedTable {
    label: Option<String>,
    id: Option<String>,
    first_usable: u64,
    last_usable: u64,
    entries: Vec<Entry>,
}

impl StagedTable {
    fn empty(label: Option<&str>, length: u64) -> Self {
        let (first_usable, last_usable) = usable_bounds(label, length);
        Self {
            label: label.map(str::to_string),
            id: None,
            first_usable,
            last_usable,
            entries: Vec::new(),
        }
    }

    fn from_dump(table: SfTable, length: u64) -> Self {
        let label = if table.label == "mbr" { "dos".to_string() } else { table.label };
        let (first_default, last_default) = usable_bounds(Some(&label), length);
        let dos = label == "dos";
        let entries = table
            .partitions
            .into_iter()
            .filter_map(|partition| {
                let number = partition_number(&partition.node)?;
                let dos_type = normalize_dos_type(&partition.partition_type);
                let kind = if dos && DOS_EXTENDED_TYPES.contains(&dos_type.as_str()) {
                    RecordKind::Extended
                } else if dos && number >= 5 {
                    RecordKind::Logical
                } else {
                    RecordKind::Normal
                };
                let end = (partition.start + partition.size).checked_sub(1)?;
                Some(Entry {
                    number,
                    kind,
                    range: SectorRange::new(partition.start, end),
                    type_code: partition.partition_type,
                    uuid: partition.uuid,
                    name: partition.name,
                    bootable: partition.bootable,
                    attrs: partition.attrs,
                })
            })
            .collect();

        Self {
            first_usable: table.firstlba.unwrap_or(first_default),
            last_usable: table.lastlba.unwrap_or(last_default),
            label: Some(label),
            id: table.id,
            entries,
        }
    }

    /// sfdisk input that recreates this table
    fn script(&self, device: &str, sector_size: u64) -> String {
        let mut script = String::new();
        if let Some(label) = &self.label {
            script.push_str(&format!("label: {label}\n"));
        }
        if let Some(id) = &self.id {
            script.push_str(&format!("label-id: {id}\n"));
        }
        script.push_str("unit: sectors\n");
        script.push_str(&format!("sector-size: {sector_size}\n\n"));

        for entry in &self.entries {
            let mut fields = vec![
                format!("start={}", entry.range.start),
                format!("size={}", entry.range.length()),
                format!("type={}", entry.type_code),
            ];
            if let Some(uuid) = &entry.uuid {
                fields.push(format!("uuid={uuid}"));
            }
            if let Some(name) = &entry.name {
                fields.push(format!("name=\"{}\"", name.replace('"', "")));
            }
            if let Some(attrs) = &entry.attrs {
                fields.push(format!("attrs=\"{attrs}\""));
            }
            if entry.bootable {
                fields.push("bootable".to_string());
            }
            script.push_str(&format!(
                "{} : {}\n",
                partition_path(device, entry.number),
                fields.join(", ")
            ));
        }
        script
    }
}

fn usable_bounds(label: Option<&str>, length: u64) -> (u64, u64) {
    match label {
        Some("gpt") => (GPT_TABLE_SECTORS, length.saturating_sub(GPT_TABLE_SECTORS)),
        _ => (1, length.saturating_sub(1)),
    }
}

fn dump_table(path: &str) -> Result<Option<SfTable>> {
    match run_command("sfdisk", &["-J", path]) {
        Ok(output) => {
            let dump: SfdiskOutput =
                serde_json::from_str(&output).map_err(|error| SysError::Parse {
                    tool: "sfdisk".to_string(),
                    reason: error.to_string(),
                })?;
            Ok(Some(dump.partitiontable))
        }
        Err(SysError::CommandFailed { stderr, .. })
            if stderr.contains("does not contain a recognized partition table") =>
        {
            Ok(None)
        }
        Err(error) => Err(error),
    }
}

/// Table backend driving sfdisk and partx
#[derive(Debug, Clone)]
pub struct SfdiskBackend {
    settle_timeout_secs: u64,
}

impl SfdiskBackend {
    pub fn new(settle_timeout_secs: u64) -> Self {
        Self { settle_timeout_secs }
    }
}

impl TableBackend for SfdiskBackend {
    fn list_devices(&self) -> std::result::Result<Vec<String>, StorageError> {
        let entries = fs::read_dir("/sys/block")
            .map_err(|error| SysError::Io(error).into_storage(StorageErrorKind::Internal))?;
        let mut devices = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if IGNORED_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
                continue;
            }
            let size = read_sysfs(&entry.path(), "size")
                .and_then(|size| size.parse::<u64>().ok())
                .unwrap_or(0);
            if size == 0 {
                continue;
            }
            devices.push(format!("/dev/{name}"));
        }
        devices.sort();
        Ok(devices)
    }

    fn device_info(&self, path: &str) -> std::result::Result<DeviceInfo, StorageError> {
        let dir = sysfs_dir(path);
        let size_512 = read_sysfs(&dir, "size")
            .and_then(|size| size.parse::<u64>().ok())
            .ok_or_else(|| {
                StorageError::new(
                    StorageErrorKind::DeviceUnreadable,
                    format!("{path} has no size in sysfs"),
                )
            })?;
        let sector_size = read_sysfs(&dir, "queue/logical_block_size")
            .and_then(|size| size.parse::<u64>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(512);
        let length = size_512 * 512 / sector_size;
        let model = read_sysfs(&dir, "device/model").unwrap_or_else(|| "Unknown".to_string());
        let serial = read_sysfs(&dir, "device/serial");

        let cylinder_size = (255 * 63).max(mebibyte_sectors(sector_size));
        Ok(DeviceInfo {
            path: path.to_string(),
            model,
            serial,
            sector_size,
            length,
            geometry: Geometry {
                heads: 255,
                sectors: 63,
                cylinders: length / cylinder_size,
                cylinder_size,
            },
        })
    }

    fn open(&self, path: &str) -> std::result::Result<Box<dyn TableSession>, StorageError> {
        let info = self.device_info(path)?;
        let staged = match dump_table(path)
            .map_err(|error| error.into_storage(StorageErrorKind::DeviceUnreadable))?
        {
            Some(table) => StagedTable::from_dump(table, info.length),
            None => StagedTable::empty(None, info.length),
        };
        Ok(Box::new(SfdiskSession {
            device: path.to_string(),
            sector_size: info.sector_size,
            length: info.length,
            settle_timeout_secs: self.settle_timeout_secs,
            staged,
            dirty: false,
        }))
    }
}

struct SfdiskSession {
    device: String,
    sector_size: u64,
    length: u64,
    settle_timeout_secs: u64,
    staged: StagedTable,
    dirty: bool,
}

impl SfdiskSession {
    fn label(&self) -> &str {
        self.staged.label.as_deref().unwrap_or_default()
    }

    fn entry_mut(&mut self, number: u32) -> std::result::Result<&mut Entry, StorageError> {
        let device = self.device.clone();
        self.staged
            .entries
            .iter_mut()
            .find(|entry| entry.number == number)
            .ok_or_else(|| {
                StorageError::new(
                    StorageErrorKind::NotFound,
                    format!("partition {number} not found on {device}"),
                )
            })
    }

    fn place(
        &self,
        number: u32,
        kind: RecordKind,
        constraint: GeometryConstraint,
    ) -> std::result::Result<SectorRange, StorageError> {
        let violation =
            |message: String| StorageError::new(StorageErrorKind::ConstraintViolation, message);

        let range = match constraint {
            GeometryConstraint::Exact(range) => range,
            GeometryConstraint::Any { within, min_sectors } => {
                let mib = mebibyte_sectors(self.sector_size);
                let aligned = within.start.div_ceil(mib) * mib;
                let start = if aligned <= within.end { aligned } else { within.start };
                let range = SectorRange::new(start, within.end);
                if range.length() < min_sectors {
                    return Err(violation(format!(
                        "{range} is smaller than {min_sectors} sectors"
                    )));
                }
                range
            }
        };

        if !range.is_valid()
            || range.start < self.staged.first_usable
            || range.end > self.staged.last_usable
            || range.end >= self.length
        {
            return Err(violation(format!("{range} does not fit on {}", self.device)));
        }

        if kind == RecordKind::Logical {
            let inside = self
                .staged
                .entries
                .iter()
                .find(|entry| entry.kind == RecordKind::Extended)
                .is_some_and(|extended| {
                    range.start > extended.range.start && range.end <= extended.range.end
                });
            if !inside {
                return Err(violation(format!(
                    "{range} is outside the extended partition on {}",
                    self.device
                )));
            }
        }

        let overlaps = self.staged.entries.iter().any(|entry| {
            let nested = matches!(
                (entry.kind, kind),
                (RecordKind::Extended, RecordKind::Logical)
                    | (RecordKind::Logical, RecordKind::Extended)
            );
            entry.number != number && !nested && entry.range.overlaps(&range)
        });
        if overlaps {
            return Err(violation(format!(
                "{range} overlaps another partition on {}",
                self.device
            )));
        }

        Ok(range)
    }

    fn next_number(&self, kind: RecordKind) -> std::result::Result<u32, StorageError> {
        let (first, last) = match (self.label(), kind) {
            ("dos", RecordKind::Logical) => (5, u32::MAX),
            ("dos", _) => (1, 4),
            _ => (1, self.max_primaries()),
        };
        (first..=last)
            .find(|candidate| !self.staged.entries.iter().any(|entry| entry.number == *candidate))
            .ok_or_else(|| {
                StorageError::new(
                    StorageErrorKind::ConstraintViolation,
                    format!("no free partition slot on {}", self.device),
                )
            })
    }
}

impl TableSession for SfdiskSession {
    fn device_path(&self) -> &str {
        &self.device
    }

    fn table_label(&self) -> Option<String> {
        self.staged.label.clone()
    }

    fn max_primaries(&self) -> u32 {
        match self.label() {
            "gpt" => 128,
            "dos" => 4,
            _ => 0,
        }
    }

    fn max_name_length(&self) -> Option<usize> {
        (self.label() == "gpt").then_some(36)
    }

    fn records(&self) -> Vec<PartitionRecord> {
        self.staged
            .entries
            .iter()
            .map(|entry| {
                let path = partition_path(&self.device, entry.number);
                PartitionRecord {
                    number: entry.number,
                    kind: entry.kind,
                    range: entry.range,
                    busy: has_holders(&path),
                    path,
                    fs_hint: None,
                    name: entry.name.clone(),
                    flags: flags_for(&entry.type_code, entry.bootable),
                }
            })
            .collect()
    }

    fn add_partition(
        &mut self,
        kind: RecordKind,
        constraint: GeometryConstraint,
    ) -> std::result::Result<PartitionRecord, StorageError> {
        if self.staged.label.is_none() {
            return Err(StorageError::new(
                StorageErrorKind::ConstraintViolation,
                format!("{} has no partition table", self.device),
            ));
        }
        if kind == RecordKind::Extended && self.label() != "dos" {
            return Err(StorageError::new(
                StorageErrorKind::ConstraintViolation,
                format!("{} tables have no extended partitions", self.label()),
            ));
        }
        let number = self.next_number(kind)?;
        let range = self.place(number, kind, constraint)?;
        let type_code = if kind == RecordKind::Extended {
            "5".to_string()
        } else {
            type_code(self.label(), FilesystemType::Unknown).to_string()
        };
        self.staged.entries.push(Entry {
            number,
            kind,
            range,
            type_code,
            uuid: None,
            name: None,
            bootable: false,
            attrs: None,
        });
        self.staged.entries.sort_by_key(|entry| entry.number);
        self.dirty = true;

        let path = partition_path(&self.device, number);
        Ok(PartitionRecord {
            number,
            kind,
            range,
            path,
            fs_hint: None,
            name: None,
            flags: Vec::new(),
            busy: false,
        })
    }

    fn delete_partition(&mut self, number: u32) -> std::result::Result<(), StorageError> {
        self.entry_mut(number)?;
        self.staged.entries.retain(|entry| entry.number != number);
        self.dirty = true;
        Ok(())
    }

    fn set_geometry(
        &mut self,
        number: u32,
        constraint: GeometryConstraint,
    ) -> std::result::Result<SectorRange, StorageError> {
        let kind = self.entry_mut(number)?.kind;
        let range = self.place(number, kind, constraint)?;
        self.entry_mut(number)?.range = range;
        self.dirty = true;
        Ok(range)
    }

    fn set_type(
        &mut self,
        number: u32,
        filesystem: FilesystemType,
    ) -> std::result::Result<(), StorageError> {
        let code = type_code(self.label(), filesystem).to_string();
        let entry = self.entry_mut(number)?;
        if entry.kind != RecordKind::Extended {
            entry.type_code = code;
            self.dirty = true;
        }
        Ok(())
    }

    fn set_name(&mut self, number: u32, name: &str) -> std::result::Result<(), StorageError> {
        if self.max_name_length().is_none() {
            return Err(StorageError::new(
                StorageErrorKind::Unsupported,
                format!("{} tables have no partition names", self.label()),
            ));
        }
        self.entry_mut(number)?.name = Some(name.to_string());
        self.dirty = true;
        Ok(())
    }

    fn new_table(&mut self, label: &str) -> std::result::Result<(), StorageError> {
        self.staged = StagedTable::empty(Some(label), self.length);
        self.dirty = true;
        Ok(())
    }

    fn commit(&mut self) -> std::result::Result<(), StorageError> {
        if !self.dirty {
            return Ok(());
        }
        if self.staged.label.is_none() {
            return Err(StorageError::new(
                StorageErrorKind::TableCommitFailed,
                format!("{} has no partition table to write", self.device),
            ));
        }

        let script = self.staged.script(&self.device, self.sector_size);
        tracing::debug!("writing table of {}:\n{script}", self.device);
        run_with_input(
            "sfdisk",
            &[
                "--no-reread",
                "--no-tell-kernel",
                "--wipe",
                "never",
                "--wipe-partitions",
                "never",
                &self.device,
            ],
            &script,
        )
        .map_err(|error| error.into_storage(StorageErrorKind::TableCommitFailed))?;
        self.dirty = false;

        if let Err(error) = run_command("partx", &["--update", &self.device]) {
            tracing::warn!("kernel did not pick up every change on {}: {error}", self.device);
        }
        udev::settle(self.settle_timeout_secs);
        Ok(())
    }

    fn sync_kernel(&mut self) -> std::result::Result<(), StorageError> {
        run_command("blockdev", &["--rereadpt", &self.device])
            .map(|_| ())
            .map_err(|error| error.into_storage(StorageErrorKind::Busy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GPT_DUMP: &str = r#"
    {
        "partitiontable": {
           "label": "gpt",
           "id": "3E6494F9-91E1-426B-A25A-0A8101E464A4",
           "device": "/dev/sda",
           "unit": "sectors",
           "firstlba": 34,
           "lastlba": 266338270,
           "sectorsize": 512,
           "partitions": [
              {
                 "node": "/dev/sda1",
                 "start": 2048,
                 "size": 16384,
                 "type": "C12A7328-F81F-11D2-BA4B-00A0C93EC93B",
                 "uuid": "F764E91F-9D15-4F6E-8508-0AFC1D0DF0B5",
                 "name": "esp"
              },{
                 "node": "/dev/sda3",
                 "start": 20480,
                 "size": 266315776,
                 "type": "0FC63DAF-8483-4772-8E79-3D69D8477DE4",
                 "uuid": "4D8C2A88-1411-4021-804D-EB8C40F054AA",
                 "name": "rootfs"
              }
           ]
        }
    }
    "#;

    const DOS_DUMP: &str = r#"
    {
        "partitiontable": {
           "label": "dos",
           "id": "0x5c3b1a2f",
           "device": "/dev/sdb",
           "unit": "sectors",
           "sectorsize": 512,
           "partitions": [
              {"node": "/dev/sdb1", "start": 2048, "size": 204800, "type": "83", "bootable": true},
              {"node": "/dev/sdb2", "start": 206848, "size": 1000000, "type": "f"},
              {"node": "/dev/sdb5", "start": 208896, "size": 409600, "type": "8e"}
           ]
        }
    }
    "#;

    fn staged(dump: &str, length: u64) -> StagedTable {
        let dump: SfdiskOutput = serde_json::from_str(dump).expect("parse dump");
        StagedTable::from_dump(dump.partitiontable, length)
    }

    fn session(staged: StagedTable, length: u64) -> SfdiskSession {
        SfdiskSession {
            device: "/dev/sdb".to_string(),
            sector_size: 512,
            length,
            settle_timeout_secs: 1,
            staged,
            dirty: false,
        }
    }

    #[test]
    fn parses_gpt_dump() {
        let table = staged(GPT_DUMP, 266_338_304);
        assert_eq!(table.label.as_deref(), Some("gpt"));
        assert_eq!(table.entries.len(), 2);
        assert_eq!(table.entries[1].number, 3);
        assert_eq!(table.entries[1].range, SectorRange::new(20480, 266_336_255));
        assert_eq!(table.last_usable, 266_338_270);
        assert_eq!(flags_for(&table.entries[0].type_code, false), vec!["esp"]);
    }

    #[test]
    fn dos_kinds_follow_type_and_number() {
        let table = staged(DOS_DUMP, 4_194_304);
        let kinds: Vec<RecordKind> = table.entries.iter().map(|entry| entry.kind).collect();
        assert_eq!(
            kinds,
            vec![RecordKind::Normal, RecordKind::Extended, RecordKind::Logical]
        );
        assert_eq!(table.first_usable, 1);
    }

    #[test]
    fn script_keeps_identity_and_attributes() {
        let table = staged(DOS_DUMP, 4_194_304);
        let script = table.script("/dev/sdb", 512);
        assert!(script.starts_with("label: dos\nlabel-id: 0x5c3b1a2f\nunit: sectors\n"));
        assert!(script.contains("/dev/sdb1 : start=2048, size=204800, type=83, bootable\n"));
        assert!(script.contains("/dev/sdb5 : start=208896, size=409600, type=8e\n"));
    }

    #[test]
    fn logical_entries_stay_inside_the_extended_one() {
        let mut session = session(staged(DOS_DUMP, 4_194_304), 4_194_304);
        let outside = session.add_partition(
            RecordKind::Logical,
            GeometryConstraint::Exact(SectorRange::new(1_300_000, 1_400_000)),
        );
        assert_eq!(
            outside.err().map(|error| error.kind),
            Some(StorageErrorKind::ConstraintViolation)
        );

        let inside = session
            .add_partition(
                RecordKind::Logical,
                GeometryConstraint::Exact(SectorRange::new(620_544, 700_000)),
            )
            .expect("logical inside extended");
        assert_eq!(inside.number, 6);
        assert_eq!(inside.path, "/dev/sdb6");
    }

    #[test]
    fn any_constraint_aligns_start_to_mebibyte() {
        let mut session = session(staged(DOS_DUMP, 4_194_304), 4_194_304);
        session.delete_partition(1).expect("delete");
        let record = session
            .add_partition(
                RecordKind::Normal,
                GeometryConstraint::Any {
                    within: SectorRange::new(100, 206_847),
                    min_sectors: 2048,
                },
            )
            .expect("placed");
        assert_eq!(record.range, SectorRange::new(2048, 206_847));
        assert_eq!(record.number, 1);
    }

    #[test]
    fn new_table_resets_bounds() {
        let mut session = session(staged(DOS_DUMP, 4_194_304), 4_194_304);
        session.new_table("gpt").expect("new table");
        assert!(session.records().is_empty());
        assert_eq!(session.staged.first_usable, GPT_TABLE_SECTORS);
        assert_eq!(session.max_name_length(), Some(36));
    }

    #[test]
    fn partition_paths() {
        assert_eq!(partition_path("/dev/sda", 1), "/dev/sda1");
        assert_eq!(partition_path("/dev/nvme0n1", 2), "/dev/nvme0n1p2");
        assert_eq!(partition_number("/dev/nvme0n1p12"), Some(12));
    }
}

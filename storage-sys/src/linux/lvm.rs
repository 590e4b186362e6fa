// SPDX-License-Identifier: GPL-3.0-only

//! Volume group and physical volume reports from the LVM command line tools

use storage_contracts::{LvmReport, StorageError, StorageErrorKind};
use storage_types::{PhysicalVolumeInfo, VolumeGroupInfo};

use super::cmd::{run_command, tool_available};

#[derive(Debug, Clone, PartialEq, Eq)]
struct VgRow {
    name: String,
    size: u64,
    free: u64,
    extent_size: u64,
}

fn parse_tabbed_line(line: &str) -> Vec<String> {
    line.split('\t')
        .map(|part| part.trim().to_string())
        .collect()
}

fn parse_vgs(output: &str) -> Vec<VgRow> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let cols = parse_tabbed_line(line);
            if cols.len() < 4 {
                return None;
            }
            Some(VgRow {
                name: cols[0].clone(),
                size: cols[1].parse().ok()?,
                free: cols[2].parse().ok()?,
                extent_size: cols[3].parse().ok()?,
            })
        })
        .collect()
}

fn parse_pvs(output: &str) -> Vec<PhysicalVolumeInfo> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let cols = parse_tabbed_line(line);
            if cols.len() < 4 {
                return None;
            }
            let vg_name = if cols[1].is_empty() {
                None
            } else {
                Some(cols[1].clone())
            };

            Some(PhysicalVolumeInfo {
                device: cols[0].clone(),
                vg_name,
                size: cols[2].parse().ok()?,
                free: cols[3].parse().ok()?,
            })
        })
        .collect()
}

fn report(command: &str, columns: &str) -> Result<String, StorageError> {
    run_command(
        command,
        &[
            "--noheadings",
            "--units",
            "b",
            "--nosuffix",
            "-o",
            columns,
            "--separator",
            "\t",
        ],
    )
    .map_err(|error| error.into_storage(StorageErrorKind::Internal))
}

/// Reports through `vgs` and `pvs`; empty when LVM is not installed
#[derive(Debug, Clone, Copy, Default)]
pub struct LvmTools;

impl LvmTools {
    fn available() -> bool {
        cfg!(feature = "lvm-tools") && tool_available("vgs") && tool_available("pvs")
    }
}

impl LvmReport for LvmTools {
    fn volume_groups(&self) -> Result<Vec<VolumeGroupInfo>, StorageError> {
        if !Self::available() {
            return Ok(Vec::new());
        }

        let vgs = parse_vgs(&report("vgs", "vg_name,vg_size,vg_free,vg_extent_size")?);
        let pvs = self.physical_volumes()?;
        Ok(vgs
            .into_iter()
            .map(|row| {
                let pv_devices = pvs
                    .iter()
                    .filter(|pv| pv.vg_name.as_deref() == Some(row.name.as_str()))
                    .map(|pv| pv.device.clone())
                    .collect();
                VolumeGroupInfo {
                    name: row.name,
                    size: row.size,
                    free: row.free,
                    extent_size: row.extent_size,
                    pv_devices,
                }
            })
            .collect())
    }

    fn physical_volumes(&self) -> Result<Vec<PhysicalVolumeInfo>, StorageError> {
        if !Self::available() {
            return Ok(Vec::new());
        }
        Ok(parse_pvs(&report("pvs", "pv_name,vg_name,pv_size,pv_free")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vgs_rows() {
        let output = "  vg0\t107374182400\t21474836480\t4194304\n\n  broken\tline\n";
        assert_eq!(
            parse_vgs(output),
            vec![VgRow {
                name: "vg0".into(),
                size: 107_374_182_400,
                free: 21_474_836_480,
                extent_size: 4_194_304,
            }]
        );
    }

    #[test]
    fn parses_pvs_rows_with_and_without_group() {
        let output = "  /dev/sda2\tvg0\t10737418240\t0\n  /dev/sdb\t\t5368709120\t5368709120\n";
        let pvs = parse_pvs(output);
        assert_eq!(pvs.len(), 2);
        assert_eq!(pvs[0].vg_name.as_deref(), Some("vg0"));
        assert!(!pvs[1].is_assigned());
        assert_eq!(pvs[1].size, 5_368_709_120);
    }
}

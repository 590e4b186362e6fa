// SPDX-License-Identifier: GPL-3.0-only

//! Engine tunables

use serde::{Deserialize, Serialize};
use storage_types::MEBIBYTE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound for waiting on udev after a table commit
    pub settle_timeout_secs: u64,

    /// First sector handed out when a partition starts at the beginning of a disk
    pub first_usable_sector: u64,

    /// Sectors kept free at the end of a GPT disk for the backup table
    pub gpt_backup_sectors: u64,

    /// Smallest physical volume partition created for a new volume group
    pub create_min_partition_bytes: u64,

    /// Added to the extent size to get the smallest partition when extending
    pub extend_overhead_bytes: u64,

    /// Span written with one pattern during a secure wipe
    pub wipe_chunk_bytes: u64,

    /// Probe loop devices as well
    pub include_loop_devices: bool,

    /// Table format used when a whole disk is partitioned for a volume group
    pub pv_table_label: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_timeout_secs: 1,
            first_usable_sector: 2048,
            gpt_backup_sectors: 33,
            create_min_partition_bytes: 6 * MEBIBYTE,
            extend_overhead_bytes: 2 * MEBIBYTE,
            wipe_chunk_bytes: 512 * MEBIBYTE,
            include_loop_devices: true,
            pv_table_label: "gpt".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"settle_timeout_secs": 5}"#).expect("parse config");
        assert_eq!(config.settle_timeout_secs, 5);
        assert_eq!(config.first_usable_sector, 2048);
        assert_eq!(config.create_min_partition_bytes, 6 * MEBIBYTE);
    }
}

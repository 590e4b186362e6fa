//! Common utility types shared across models

use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};

pub const KIBIBYTE: u64 = 1024;
pub const MEBIBYTE: u64 = 1024 * KIBIBYTE;
pub const GIBIBYTE: u64 = 1024 * MEBIBYTE;

/// Partition alignment boundary (1 MiB) - standard for modern disks
pub const ALIGNMENT_BYTES: u64 = MEBIBYTE;

/// An inclusive range of sectors on a device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectorRange {
    /// First sector (inclusive)
    pub start: u64,

    /// Last sector (inclusive)
    pub end: u64,
}

impl SectorRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of sectors covered, zero for an inverted range
    pub fn length(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn byte_length(&self, sector_size: u64) -> u64 {
        self.length() * sector_size
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    pub fn contains(&self, other: &SectorRange) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    pub fn contains_sector(&self, sector: u64) -> bool {
        sector >= self.start && sector <= self.end
    }

    pub fn overlaps(&self, other: &SectorRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Common part of two ranges, `None` when they are disjoint
    pub fn intersection(&self, other: &SectorRange) -> Option<SectorRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(SectorRange { start, end })
    }
}

impl std::fmt::Display for SectorRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Number of sectors spanning one mebibyte for the given sector size
pub fn mebibyte_sectors(sector_size: u64) -> u64 {
    if sector_size == 0 {
        return 0;
    }
    MEBIBYTE / sector_size
}

/// Convert bytes to human-readable format (e.g., "1.50 GB")
pub fn bytes_to_pretty(bytes: &u64, add_bytes: bool) -> String {
    let mut steps = 0;
    let mut val: f64 = *bytes as f64;

    while val > 1024. && steps <= 8 {
        val /= 1024.;
        steps += 1;
    }

    let unit = match steps {
        0 => "B",
        1 => "KB",
        2 => "MB",
        3 => "GB",
        4 => "TB",
        5 => "PB",
        6 => "EB",
        7 => "ZB",
        8 => "YB",
        _ => "Not Supported",
    };

    if add_bytes {
        let bytes_str = bytes.to_formatted_string(&Locale::en);
        format!("{:.2} {} ({} bytes)", val, unit, bytes_str)
    } else {
        format!("{:.2} {}", val, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_length_is_inclusive() {
        assert_eq!(SectorRange::new(100, 200).length(), 101);
        assert_eq!(SectorRange::new(5, 5).length(), 1);
        assert_eq!(SectorRange::new(6, 5).length(), 0);
    }

    #[test]
    fn intersection_of_shifted_ranges() {
        let old = SectorRange::new(100, 200);
        let new = SectorRange::new(150, 260);
        assert_eq!(old.intersection(&new), Some(SectorRange::new(150, 200)));
        assert_eq!(
            SectorRange::new(0, 9).intersection(&SectorRange::new(10, 20)),
            None
        );
    }

    #[test]
    fn pretty_prints_gibibytes() {
        assert_eq!(bytes_to_pretty(&(3 * GIBIBYTE), false), "3.00 GB");
        assert_eq!(bytes_to_pretty(&512, true), "512.00 B (512 bytes)");
    }

    #[test]
    fn mebibyte_in_sectors() {
        assert_eq!(mebibyte_sectors(512), 2048);
        assert_eq!(mebibyte_sectors(4096), 256);
        assert_eq!(mebibyte_sectors(0), 0);
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Resizing and moving partitions together with their filesystems

use storage_contracts::{FsSupport, StorageError, StorageErrorKind};
use storage_types::{Alignment, FilesystemType, Partition, PartitionKind, ResizeAction, SectorRange};

use crate::ops::PartitionOps;

/// Classify a geometry change from the old and new bounds alone
pub fn classify(old: SectorRange, new: SectorRange) -> ResizeAction {
    let old_length = old.length();
    let new_length = new.length();

    let moves_right = new.start > old.start && new.end > old.end;
    let moves_left = new.start < old.start && new.end < old.end;

    match (new_length.cmp(&old_length), moves_right, moves_left) {
        (std::cmp::Ordering::Greater, true, _) => ResizeAction::MoveRightGrow,
        (std::cmp::Ordering::Less, true, _) => ResizeAction::MoveRightShrink,
        (std::cmp::Ordering::Equal, true, _) => ResizeAction::MoveRight,
        (std::cmp::Ordering::Greater, _, true) => ResizeAction::MoveLeftGrow,
        (std::cmp::Ordering::Less, _, true) => ResizeAction::MoveLeftShrink,
        (std::cmp::Ordering::Equal, _, true) => ResizeAction::MoveLeft,
        (std::cmp::Ordering::Greater, _, _) => ResizeAction::Grow,
        (std::cmp::Ordering::Less, _, _) => ResizeAction::Shrink,
        (std::cmp::Ordering::Equal, _, _) => ResizeAction::None,
    }
}

fn violation(message: String) -> StorageError {
    StorageError::new(StorageErrorKind::ConstraintViolation, message)
}

/// Drives a resize or move of one table entry and the filesystem inside it.
///
/// Shrinking touches the filesystem first and the table second; growing
/// does the reverse. When asked to, a failed table write is rolled back.
pub struct ResizeMovePlanner<'a> {
    ops: PartitionOps<'a>,
}

impl<'a> ResizeMovePlanner<'a> {
    pub fn new(ops: PartitionOps<'a>) -> Self {
        Self { ops }
    }

    pub fn plan(&self, old: &Partition, new: &Partition) -> ResizeAction {
        classify(old.range(), new.range())
    }

    /// Reject requests that cannot succeed before anything is written
    pub fn validate(&self, old: &Partition, new: &Partition) -> Result<ResizeAction, StorageError> {
        if !old.same_entry(new) {
            return Err(violation(format!(
                "{} and {} are different table entries",
                old.path, new.path
            )));
        }
        if !old.is_concrete() || old.kind == PartitionKind::Unpartitioned {
            return Err(StorageError::new(
                StorageErrorKind::InvalidInput,
                format!("{} has no table entry to resize", old.path),
            ));
        }
        if !new.range().is_valid() {
            return Err(violation(format!("{} is not a valid range", new.range())));
        }

        let action = self.plan(old, new);
        if action == ResizeAction::None {
            return Ok(action);
        }

        if let Some(tool) = self.ops.capabilities.tool(new.filesystem) {
            let minimum = tool.min_size();
            if new.byte_length() < minimum {
                return Err(violation(format!(
                    "{} needs at least {minimum} bytes, {} requested",
                    new.filesystem,
                    new.byte_length()
                )));
            }
        }
        if action.shrinks()
            && let Some(usage) = old.usage
            && new.length() < usage.used
        {
            return Err(violation(format!(
                "{} holds {} used sectors, cannot shrink to {}",
                old.path,
                usage.used,
                new.length()
            )));
        }
        if old.busy && action.is_move() {
            return Err(StorageError::new(
                StorageErrorKind::Busy,
                format!("{} is in use and cannot be moved", old.path),
            ));
        }
        // Only the table entry moves; swap is recreated at the new start.
        if new.start != old.start
            && old.filesystem.holds_data()
            && old.filesystem != FilesystemType::LinuxSwap
        {
            return Err(violation(format!(
                "moving the start of {} would leave its {} data behind",
                old.path, old.filesystem
            )));
        }

        Ok(action)
    }

    pub fn execute(
        &self,
        old: &Partition,
        new: &Partition,
        rollback_on_fail: bool,
    ) -> Result<(), StorageError> {
        let action = self.validate(old, new)?;
        tracing::info!(
            "{}: {action} from {} to {}",
            old.path,
            old.range(),
            new.range()
        );

        if action == ResizeAction::None {
            return Ok(());
        }

        if new.filesystem == FilesystemType::LinuxSwap {
            if old.busy {
                return Err(StorageError::new(
                    StorageErrorKind::Busy,
                    format!("{} is an active swap area", old.path),
                ));
            }
            // Swap is recreated rather than resized.
            let placed = self.move_entry(old, new, rollback_on_fail)?;
            let target = with_range(new, placed);
            return self
                .ops
                .format_partition(&target, FilesystemType::LinuxSwap, old.label.as_deref());
        }

        if !new.filesystem.holds_data() {
            self.move_entry(old, new, rollback_on_fail)?;
            return Ok(());
        }

        if action.shrinks() {
            self.check_repair(old)?;
            self.resize_filesystem(old, new)?;
            self.move_entry(old, new, rollback_on_fail)?;
        } else if action.grows() {
            self.check_repair(old)?;
            let placed = self.move_entry(old, new, rollback_on_fail)?;
            self.maximize(&with_range(new, placed))?;
        }

        Ok(())
    }

    /// Check and repair the filesystem; a no-op while it is in use.
    ///
    /// Fails when no checker is available, so nothing is resized unchecked.
    pub fn check_repair(&self, partition: &Partition) -> Result<(), StorageError> {
        if partition.filesystem == FilesystemType::Luks && partition.busy {
            return Err(StorageError::new(
                StorageErrorKind::FilesystemOperationFailed,
                format!("{} holds an open encrypted container", partition.path),
            ));
        }
        if partition.busy {
            return Ok(());
        }

        let capabilities = self.ops.capabilities.capabilities(partition.filesystem);
        match (capabilities.check, self.ops.capabilities.tool(partition.filesystem)) {
            (FsSupport::External, Some(tool)) => {
                tracing::info!("checking {} on {}", partition.filesystem, partition.path);
                tool.check_repair(partition)
            }
            _ => Err(StorageError::new(
                StorageErrorKind::Unsupported,
                format!(
                    "{} on {} cannot be checked before resizing",
                    partition.filesystem, partition.path
                ),
            )),
        }
    }

    /// Resize the filesystem of `old` to the bounds of `new`.
    ///
    /// Growing always fills the partition.
    pub fn resize_filesystem(&self, old: &Partition, new: &Partition) -> Result<(), StorageError> {
        let fill = new.length() >= old.length();
        let capabilities = self.ops.capabilities.capabilities(new.filesystem);
        let support = match (old.busy, fill) {
            (true, true) => capabilities.online_grow,
            (true, false) => capabilities.online_shrink,
            (false, true) => capabilities.grow,
            (false, false) => capabilities.shrink,
        };

        let mut target = new.clone();
        target.busy = old.busy;

        match support {
            FsSupport::External => match self.ops.capabilities.tool(new.filesystem) {
                Some(tool) => tool.resize(&target, fill),
                None => Err(unsupported_resize(new, fill)),
            },
            FsSupport::Backend => self.ops.backend.resize_filesystem(&target),
            FsSupport::Internal | FsSupport::Unsupported => Err(unsupported_resize(new, fill)),
        }
    }

    /// Grow the filesystem to fill its partition, reformatting when it cannot grow
    pub fn maximize(&self, partition: &Partition) -> Result<(), StorageError> {
        if partition.filesystem == FilesystemType::Luks && partition.busy {
            return Err(StorageError::new(
                StorageErrorKind::FilesystemOperationFailed,
                format!("{} holds an open encrypted container", partition.path),
            ));
        }

        let capabilities = self.ops.capabilities.capabilities(partition.filesystem);
        if capabilities.grow == FsSupport::Unsupported {
            tracing::warn!(
                "{} cannot grow, recreating it on {}",
                partition.filesystem,
                partition.path
            );
            return self.ops.format_partition(
                partition,
                partition.filesystem,
                partition.label.as_deref(),
            );
        }

        self.resize_filesystem(partition, partition)
    }

    fn move_entry(
        &self,
        old: &Partition,
        new: &Partition,
        rollback_on_fail: bool,
    ) -> Result<SectorRange, StorageError> {
        let error = match self.ops.commit_geometry(old, new.range(), new.alignment) {
            Ok(placed) => return Ok(placed),
            Err(error) => error,
        };

        if !rollback_on_fail {
            return Err(error);
        }

        tracing::warn!(
            "{}: writing {} failed, restoring {}",
            old.path,
            new.range(),
            old.range()
        );
        let outcome = match self.rollback(old, new) {
            Ok(()) => "previous bounds restored".to_string(),
            Err(rollback_error) => {
                tracing::error!("{}: rollback failed: {rollback_error}", old.path);
                format!("rollback failed: {}", rollback_error.message)
            }
        };

        Err(StorageError::new(
            error.kind,
            format!("{} ({outcome})", error.message),
        ))
    }

    /// Best effort: the overlap of both placements first, then the old bounds exactly
    fn rollback(&self, old: &Partition, new: &Partition) -> Result<(), StorageError> {
        if let Some(intersection) = old.range().intersection(&new.range())
            && let Err(error) = self.ops.commit_geometry(old, intersection, new.alignment)
        {
            tracing::warn!("{}: transitional placement {intersection} failed: {error}", old.path);
        }

        self.ops
            .commit_geometry(old, old.range(), Alignment::Strict)
            .map(|_| ())
    }
}

fn with_range(partition: &Partition, range: SectorRange) -> Partition {
    let mut placed = partition.clone();
    placed.start = range.start;
    placed.end = range.end;
    placed
}

fn unsupported_resize(partition: &Partition, fill: bool) -> StorageError {
    let direction = if fill { "growing" } else { "shrinking" };
    StorageError::new(
        StorageErrorKind::Unsupported,
        format!(
            "{direction} {} is not supported on {}",
            partition.filesystem, partition.path
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u64, end: u64) -> SectorRange {
        SectorRange::new(start, end)
    }

    #[test]
    fn classification() {
        assert_eq!(classify(range(100, 200), range(100, 250)), ResizeAction::Grow);
        assert_eq!(classify(range(100, 200), range(150, 250)), ResizeAction::MoveRight);
        assert_eq!(classify(range(100, 200), range(50, 180)), ResizeAction::MoveLeftShrink);
        assert_eq!(classify(range(100, 200), range(100, 200)), ResizeAction::None);
        assert_eq!(classify(range(100, 200), range(150, 260)), ResizeAction::MoveRightGrow);
        assert_eq!(classify(range(100, 200), range(120, 220)), ResizeAction::MoveRight);
        assert_eq!(classify(range(100, 200), range(50, 150)), ResizeAction::MoveLeft);
        assert_eq!(classify(range(100, 200), range(90, 250)), ResizeAction::Grow);
        assert_eq!(classify(range(100, 200), range(120, 180)), ResizeAction::Shrink);
        assert_eq!(classify(range(100, 200), range(100, 150)), ResizeAction::Shrink);
    }
}

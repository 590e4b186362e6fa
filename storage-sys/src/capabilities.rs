// SPDX-License-Identifier: GPL-3.0-only

//! Per-filesystem support table, built once at startup and shared by reference

use std::collections::BTreeMap;
use std::sync::Arc;

use storage_contracts::{FilesystemTool, FsCapabilities, FsSupport};
use storage_types::FilesystemType;

#[derive(Clone)]
pub struct CapabilityEntry {
    pub capabilities: FsCapabilities,
    pub tool: Option<Arc<dyn FilesystemTool>>,
}

#[derive(Clone, Default)]
pub struct CapabilityTable {
    entries: BTreeMap<FilesystemType, CapabilityEntry>,
}

impl std::fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|(fs, entry)| (fs.as_str(), entry.capabilities)),
            )
            .finish()
    }
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        filesystem: FilesystemType,
        capabilities: FsCapabilities,
        tool: Option<Arc<dyn FilesystemTool>>,
    ) {
        self.entries.insert(filesystem, CapabilityEntry { capabilities, tool });
    }

    /// Builder form of [`CapabilityTable::register`]
    pub fn with(
        mut self,
        filesystem: FilesystemType,
        capabilities: FsCapabilities,
        tool: Option<Arc<dyn FilesystemTool>>,
    ) -> Self {
        self.register(filesystem, capabilities, tool);
        self
    }

    /// Register a tool that handles every operation itself
    pub fn with_tool(self, tool: Arc<dyn FilesystemTool>) -> Self {
        let filesystem = tool.filesystem();
        self.with(filesystem, external_capabilities(), Some(tool))
    }

    /// Unknown types report everything unsupported
    pub fn capabilities(&self, filesystem: FilesystemType) -> FsCapabilities {
        self.entries
            .get(&filesystem)
            .map(|entry| entry.capabilities)
            .unwrap_or_default()
    }

    pub fn tool(&self, filesystem: FilesystemType) -> Option<&Arc<dyn FilesystemTool>> {
        self.entries
            .get(&filesystem)
            .and_then(|entry| entry.tool.as_ref())
    }

    pub fn is_known(&self, filesystem: FilesystemType) -> bool {
        self.entries.contains_key(&filesystem)
    }

    pub fn filesystems(&self) -> impl Iterator<Item = FilesystemType> + '_ {
        self.entries.keys().copied()
    }
}

/// Every operation delegated to the external tool, except busy detection
/// and mounted usage which come from the mount table
pub fn external_capabilities() -> FsCapabilities {
    FsCapabilities {
        busy: FsSupport::Internal,
        read_label: FsSupport::External,
        read_uuid: FsSupport::External,
        read_usage: FsSupport::External,
        online_read_usage: FsSupport::Internal,
        check: FsSupport::External,
        create: FsSupport::External,
        grow: FsSupport::External,
        shrink: FsSupport::External,
        online_grow: FsSupport::Unsupported,
        online_shrink: FsSupport::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage_contracts::FsSupport;

    #[test]
    fn unknown_filesystems_are_unsupported() {
        let table = CapabilityTable::new();
        let capabilities = table.capabilities(FilesystemType::Xfs);
        assert_eq!(capabilities.check, FsSupport::Unsupported);
        assert!(table.tool(FilesystemType::Xfs).is_none());
        assert!(!table.is_known(FilesystemType::Xfs));
    }

    #[test]
    fn registered_entries_are_returned() {
        let table = CapabilityTable::new().with(
            FilesystemType::Ext4,
            external_capabilities(),
            None,
        );
        assert_eq!(table.capabilities(FilesystemType::Ext4).grow, FsSupport::External);
        assert_eq!(table.filesystems().collect::<Vec<_>>(), vec![FilesystemType::Ext4]);
    }
}

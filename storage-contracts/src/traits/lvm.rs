use storage_types::{PhysicalVolumeInfo, VolumeGroupInfo};

use crate::StorageError;

/// Volume group and physical volume state as reported by the volume manager
pub trait LvmReport: Send + Sync {
    fn volume_groups(&self) -> Result<Vec<VolumeGroupInfo>, StorageError>;

    fn physical_volumes(&self) -> Result<Vec<PhysicalVolumeInfo>, StorageError>;

    fn volume_group(&self, name: &str) -> Result<Option<VolumeGroupInfo>, StorageError> {
        Ok(self
            .volume_groups()?
            .into_iter()
            .find(|vg| vg.name == name))
    }
}

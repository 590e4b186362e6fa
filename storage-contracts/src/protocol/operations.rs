// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

use super::{OperationId, StorageError};

#[cfg(test)]
use super::StorageErrorKind;

/// Worker context an operation runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Probe,
    Partitioning,
    Lvm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "payload")]
pub enum OperationEvent {
    Started {
        operation_id: OperationId,
        operation: OperationKind,
        description: String,
    },
    Completed {
        operation_id: OperationId,
        operation: OperationKind,
    },
    Failed {
        operation_id: OperationId,
        operation: OperationKind,
        error: StorageError,
    },
}

impl OperationEvent {
    pub fn operation_id(&self) -> OperationId {
        match self {
            Self::Started { operation_id, .. }
            | Self::Completed { operation_id, .. }
            | Self::Failed { operation_id, .. } => *operation_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_id_roundtrips_as_uuid_string() {
        let id = OperationId::new();
        let json = serde_json::to_string(&id).expect("serialize operation id");
        let parsed: OperationId = serde_json::from_str(&json).expect("deserialize operation id");
        assert_eq!(parsed, id);
    }

    #[test]
    fn failed_event_carries_error() {
        let id = OperationId::new();
        let event = OperationEvent::Failed {
            operation_id: id,
            operation: OperationKind::Partitioning,
            error: StorageError::new(StorageErrorKind::TableCommitFailed, "commit failed"),
        };

        let json = serde_json::to_string(&event).expect("serialize event");
        let parsed: OperationEvent = serde_json::from_str(&json).expect("deserialize event");
        assert_eq!(parsed, event);
        assert_eq!(parsed.operation_id(), id);
    }

    #[test]
    fn storage_error_kind_codes_are_stable() {
        assert_eq!(StorageErrorKind::InvalidInput.code(), 400);
        assert_eq!(StorageErrorKind::NotFound.code(), 404);
        assert_eq!(StorageErrorKind::ConstraintViolation.code(), 409);
        assert_eq!(StorageErrorKind::Unsupported.code(), 501);
        assert_eq!(StorageErrorKind::Internal.code(), 500);
    }
}

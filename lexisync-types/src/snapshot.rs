//! Versioned snapshots — one per dataType, the unit of reconciliation.

use crate::{DataPayload, DataType, DeviceId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A versioned, checksummed copy of one dataType's full state.
///
/// Invariants: `checksum` is a deterministic fingerprint of the canonical
/// serialization of `payload`; `version` is strictly increasing per
/// dataType and only advances on successful commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedSnapshot {
    /// The dataType this snapshot covers.
    pub data_type: DataType,
    /// Strictly increasing commit version.
    pub version: u64,
    /// When the snapshot was produced.
    pub timestamp: Timestamp,
    /// Fingerprint of the payload's canonical serialization.
    pub checksum: String,
    /// The full typed state.
    pub payload: DataPayload,
    /// Version this snapshot was derived from, if any.
    #[serde(default)]
    pub parent_version: Option<u64>,
    /// Device that produced the snapshot.
    pub device_id: DeviceId,
    /// Owning user.
    pub user_id: UserId,
}

impl VersionedSnapshot {
    /// Creates a snapshot with the given fields. The checksum is supplied
    /// by the version service, which owns the fingerprint algorithm.
    #[must_use]
    pub fn new(
        data_type: DataType,
        version: u64,
        checksum: impl Into<String>,
        payload: DataPayload,
        device_id: DeviceId,
        user_id: UserId,
    ) -> Self {
        Self {
            data_type,
            version,
            timestamp: Timestamp::now(),
            checksum: checksum.into(),
            payload,
            parent_version: None,
            device_id,
            user_id,
        }
    }

    /// Sets the parent version.
    #[must_use]
    pub fn with_parent(mut self, parent: u64) -> Self {
        self.parent_version = Some(parent);
        self
    }

    /// Sets an explicit timestamp (tests and replayed snapshots).
    #[must_use]
    pub fn with_timestamp(mut self, ts: Timestamp) -> Self {
        self.timestamp = ts;
        self
    }

    /// Serialized payload size in bytes.
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.payload.approx_size()
    }
}

//! Mutation records — the unit of work in the sync queue.
//!
//! A mutation is created on enqueue, persisted across restarts, and removed
//! only on successful transmit or retry exhaustion.

use crate::{DataPayload, DataType, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a queued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(Uuid);

impl MutationId {
    /// Creates a new mutation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MutationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// What a mutation does to its dataType's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Transmission priority. Higher drains first from the offline queue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// A pending local change awaiting transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Unique id, minted on enqueue.
    pub id: MutationId,
    /// The dataType this change belongs to.
    pub data_type: DataType,
    /// Create, update or delete.
    pub operation: Operation,
    /// The typed payload.
    pub payload: DataPayload,
    /// When the change was made locally.
    pub timestamp: Timestamp,
    /// The owning user.
    pub user_id: UserId,
    /// Transmission priority.
    pub priority: Priority,
}

impl MutationRecord {
    /// Creates a mutation with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(
        data_type: DataType,
        operation: Operation,
        payload: DataPayload,
        user_id: UserId,
        priority: Priority,
    ) -> Self {
        Self {
            id: MutationId::new(),
            data_type,
            operation,
            payload,
            timestamp: Timestamp::now(),
            user_id,
            priority,
        }
    }

    /// Serialized size in bytes, used for queue byte ceilings.
    #[must_use]
    pub fn approx_size(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}

//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No transport or the host is unreachable.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Non-success or malformed backend response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Expired or invalid credential. Never blindly retried.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Checksum mismatch, malformed snapshot, missing field.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// Divergent or unrelated versions awaiting a resolution policy.
    #[error("unresolved conflict: {0}")]
    Conflict(String),

    /// Storage or memory ceiling reached.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Durable store failure.
    #[error("storage error: {0}")]
    Storage(#[from] lexisync_storage::StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A batch transmit exceeded its wall-clock bound.
    #[error("operation timed out")]
    Timeout,
}

impl SyncError {
    /// True for errors that must clear the credential and raise the
    /// reauthentication signal instead of being retried.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// True for errors the caller flagged as critical/fatal; these are
    /// excluded from network-category retry.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        let msg = self.to_string().to_lowercase();
        msg.contains("critical") || msg.contains("fatal")
    }
}

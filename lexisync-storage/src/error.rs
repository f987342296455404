//! Error types for the storage contract.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors a durable store implementation may surface.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store failed (I/O, database, platform API).
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The store refused the write (quota, ceiling).
    #[error("storage exhausted: {0}")]
    Exhausted(String),
}

impl StorageError {
    /// Convenience constructor for backend failures.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

//! Durable key-value storage contract for LexiSync.
//!
//! The host application brings its own durable store (platform keychain,
//! SQLite wrapper, files — the engine does not care). The contract is
//! deliberately minimal: string keys to string values, with per-key
//! atomicity only. Multi-key consistency is the engine's problem.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and by
//! callers that bring no store of their own.

mod error;
mod memory;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;

/// Opaque key→string durable store with per-key atomicity.
///
/// Implementations must be safe to call from multiple threads; each
/// individual call is atomic, nothing more is guaranteed.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value for a key, `None` if absent.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes a value, replacing any previous one atomically.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes a key. Removing an absent key is a no-op.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Lists keys beginning with a prefix. Used for per-dataType scans
    /// (backup, overwrite) during onboarding.
    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

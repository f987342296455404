//! Core type definitions for the LexiSync client sync engine.
//!
//! Everything that crosses a crate boundary lives here: identifier newtypes,
//! the millisecond timestamp, the per-dataType payload union, mutation
//! records and versioned snapshots. The sync engine itself lives in
//! `lexisync-sync`; the durable key-value contract in `lexisync-storage`.

mod data;
mod ids;
mod mutation;
mod snapshot;
mod timestamp;

pub use data::{
    Badge, DataPayload, DataType, ExperienceState, ProgressState, Show, StudyRecord,
    VocabularyItem,
};
pub use ids::{DeviceId, UserId};
pub use mutation::{MutationId, MutationRecord, Operation, Priority};
pub use snapshot::VersionedSnapshot;
pub use timestamp::Timestamp;

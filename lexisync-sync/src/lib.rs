//! Offline-first multi-device sync engine for LexiSync.
//!
//! Runs entirely on the client: the server is an opaque REST endpoint and
//! every decision — queueing, batching, conflict resolution, retry — is
//! made on-device. Local state is always authoritative for the UI; sync
//! reconciles in the background and never blocks a local write.
//!
//! # Components
//!
//! - **Version service**: payload fingerprints, snapshot relationship
//!   analysis, per-dataType watermarks
//! - **Conflict resolver**: turns divergent snapshot pairs into one
//!   reconciled payload, per policy
//! - **Diff engine**: incremental diffs and upload batch planning
//! - **Network monitor**: link quality, recommended actions, the offline
//!   queue
//! - **Scheduler**: the mutation queue and the flush state machine
//! - **Onboarding**: the new-device pull-and-register state machine
//!
//! # Example
//!
//! ```no_run
//! use lexisync_storage::MemoryStore;
//! use lexisync_sync::{StaticCredentials, SyncContextBuilder};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let credentials = Arc::new(StaticCredentials::new("token"));
//! let context = SyncContextBuilder::new(store, credentials).build()?;
//! let _driver = context.start();
//! # Ok(())
//! # }
//! ```

pub mod clock;
mod context;
pub mod diff;
mod error;
pub mod gate;
pub mod merge;
pub mod network;
pub mod onboarding;
pub mod resolver;
pub mod retry;
pub mod scheduler;
pub mod transport;
pub mod version;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{SyncContext, SyncContextBuilder};
pub use diff::{
    BatchPhase, BatchPlan, BatchStrategy, DiffConfig, DiffEngine, DiffItem, MarkerAdvance,
    SnapshotDiff, SyncBatch,
};
pub use error::{SyncError, SyncResult};
pub use gate::{GateDecision, UploadGate};
pub use network::{
    CellularGeneration, LinkInfo, NetworkAction, NetworkMonitor, NetworkState, OfflineQueueItem,
    OfflineQueueLimits, Transport,
};
pub use onboarding::{
    DeviceInfo, OnboardingProgress, OnboardingReport, OnboardingRunner, OnboardingStage,
};
pub use resolver::{
    ConflictKind, ConflictRecord, ConflictResolver, ManualDecision, ResolutionOutcome,
    ResolutionPolicy,
};
pub use retry::{ErrorCategory, RetryClassifier, RetryPolicy};
pub use scheduler::{
    Activity, FlushReport, SchedulerConfig, SchedulerStatus, SyncScheduler,
};
pub use transport::{
    BatchItemStatus, BatchPushRequest, BatchPushResponse, CredentialProvider, DeviceProfile,
    DeviceRegistration, HttpBackend, HttpBackendConfig, RemoteSnapshotSet, StaticCredentials,
    SyncBackend,
};
pub use version::{
    checksum, compare, extract_version, MergeComplexity, Relationship, RelationshipVerdict,
    RecommendedAction, VersionInfo, VersionStore,
};

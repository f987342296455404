//! The engine context — one explicit object owning every collaborator.
//!
//! Nothing in the engine is process-global: the host builds a
//! [`SyncContext`] with its storage, backend and clock, and every
//! component receives its dependencies from the builder. Tests build
//! contexts with manual clocks and recording backends.

use crate::clock::{Clock, SystemClock};
use crate::diff::{DiffConfig, DiffEngine};
use crate::error::{SyncError, SyncResult};
use crate::gate::UploadGate;
use crate::network::{NetworkMonitor, OfflineQueueLimits};
use crate::onboarding::{DeviceInfo, OnboardingProgress, OnboardingReport, OnboardingRunner};
use crate::resolver::{
    ConflictRecord, ConflictResolver, ManualDecision, ResolutionOutcome, ResolutionPolicy,
};
use crate::scheduler::{Activity, FlushReport, SchedulerConfig, SchedulerStatus, SyncScheduler};
use crate::transport::{CredentialProvider, HttpBackend, HttpBackendConfig, SyncBackend};
use crate::version::VersionStore;
use lexisync_storage::KeyValueStore;
use lexisync_types::{DataPayload, DataType, DeviceId, MutationRecord, UserId};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

const DEVICE_ID_KEY: &str = "device/id";

/// Builds a [`SyncContext`]. Storage and credentials are required; every
/// other collaborator has a production default and a test override.
pub struct SyncContextBuilder {
    store: Arc<dyn KeyValueStore>,
    credentials: Arc<dyn CredentialProvider>,
    backend: Option<Arc<dyn SyncBackend>>,
    http_config: HttpBackendConfig,
    clock: Arc<dyn Clock>,
    scheduler_config: SchedulerConfig,
    diff_config: DiffConfig,
    offline_limits: OfflineQueueLimits,
    device_info: DeviceInfo,
}

impl SyncContextBuilder {
    /// Starts a builder over the given storage and credential provider.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            store,
            credentials,
            backend: None,
            http_config: HttpBackendConfig::default(),
            clock: Arc::new(SystemClock),
            scheduler_config: SchedulerConfig::default(),
            diff_config: DiffConfig::default(),
            offline_limits: OfflineQueueLimits::default(),
            device_info: DeviceInfo::default(),
        }
    }

    /// Substitutes the backend (tests, alternative transports).
    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn SyncBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Points the default HTTP backend at a different base URL.
    #[must_use]
    pub fn http_config(mut self, config: HttpBackendConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Substitutes the clock (tests use a manual clock).
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Overrides the scheduler configuration.
    #[must_use]
    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler_config = config;
        self
    }

    /// Overrides the diff configuration.
    #[must_use]
    pub fn diff_config(mut self, config: DiffConfig) -> Self {
        self.diff_config = config;
        self
    }

    /// Overrides the offline-queue ceilings.
    #[must_use]
    pub fn offline_limits(mut self, limits: OfflineQueueLimits) -> Self {
        self.offline_limits = limits;
        self
    }

    /// Sets the metadata registered during onboarding.
    #[must_use]
    pub fn device_info(mut self, info: DeviceInfo) -> Self {
        self.device_info = info;
        self
    }

    /// Wires everything together. The device identity is loaded from
    /// storage, or minted and persisted on first run.
    pub fn build(self) -> SyncResult<SyncContext> {
        let device_id = load_or_mint_device_id(self.store.as_ref())?;

        let backend: Arc<dyn SyncBackend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(HttpBackend::new(
                self.http_config,
                Arc::clone(&self.credentials),
            )?),
        };

        let monitor = Arc::new(NetworkMonitor::new(self.offline_limits));
        let versions = Arc::new(VersionStore::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            device_id,
        ));
        let resolver = Arc::new(ConflictResolver::new(Arc::clone(&self.clock)));
        let diff = Arc::new(DiffEngine::new(self.diff_config));
        let gate = UploadGate::new(Arc::clone(&monitor), Arc::clone(&diff));

        let policy = self.scheduler_config.policy;
        let scheduler = Arc::new(SyncScheduler::new(
            self.scheduler_config,
            Arc::clone(&self.store),
            Arc::clone(&backend),
            Arc::clone(&self.credentials),
            Arc::clone(&monitor),
            Arc::clone(&versions),
            Arc::clone(&resolver),
            gate,
            Arc::clone(&self.clock),
            device_id,
        )?);

        let onboarding = Arc::new(OnboardingRunner::new(
            Arc::clone(&self.store),
            Arc::clone(&backend),
            Arc::clone(&versions),
            Arc::clone(&self.clock),
            device_id,
            self.device_info,
        ));

        info!(device_id = %device_id, "sync context built");
        Ok(SyncContext {
            device_id,
            policy,
            monitor,
            versions,
            resolver,
            diff,
            scheduler,
            onboarding,
        })
    }
}

fn load_or_mint_device_id(store: &dyn KeyValueStore) -> SyncResult<DeviceId> {
    match store.get(DEVICE_ID_KEY)? {
        Some(raw) => raw
            .parse()
            .map_err(|_| SyncError::DataIntegrity("stored device id is malformed".to_string())),
        None => {
            let id = DeviceId::new();
            store.set(DEVICE_ID_KEY, &id.to_string())?;
            Ok(id)
        }
    }
}

/// The assembled engine. Cheap to clone handles out of; owns no
/// background work until [`SyncContext::start`] is called.
pub struct SyncContext {
    device_id: DeviceId,
    policy: ResolutionPolicy,
    monitor: Arc<NetworkMonitor>,
    versions: Arc<VersionStore>,
    resolver: Arc<ConflictResolver>,
    diff: Arc<DiffEngine>,
    scheduler: Arc<SyncScheduler>,
    onboarding: Arc<OnboardingRunner>,
}

impl SyncContext {
    /// This install's identity.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// The network monitor, for host platforms to report link changes.
    #[must_use]
    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.monitor
    }

    /// The version store, for read access to committed state.
    #[must_use]
    pub fn versions(&self) -> &Arc<VersionStore> {
        &self.versions
    }

    /// The diff engine.
    #[must_use]
    pub fn diff(&self) -> &Arc<DiffEngine> {
        &self.diff
    }

    /// Sets the authenticated user; `None` switches to guest mode.
    pub async fn set_user(&self, user: Option<UserId>) {
        self.scheduler.set_user(user).await;
    }

    /// Accepts a local mutation for eventual upload.
    pub async fn enqueue_mutation(&self, mutation: MutationRecord) {
        self.scheduler.enqueue(mutation).await;
    }

    /// Forces a flush now, coalescing into any flush already running.
    pub async fn force_flush(&self) -> FlushReport {
        self.scheduler.flush().await
    }

    /// Current scheduler status.
    pub async fn status(&self) -> SchedulerStatus {
        self.scheduler.status().await
    }

    /// Conflicts awaiting a manual decision.
    #[must_use]
    pub fn current_conflicts(&self) -> Vec<ConflictRecord> {
        self.resolver.current_conflicts()
    }

    /// Resolves an explicit set of conflicts under the given policy, or
    /// the configured one.
    pub fn resolve_conflicts(
        &self,
        conflicts: &[ConflictRecord],
        policy: Option<ResolutionPolicy>,
    ) -> SyncResult<ResolutionOutcome> {
        self.resolver
            .resolve_conflicts(conflicts, policy.unwrap_or(self.policy))
    }

    /// Applies an external decision to retained conflicts of a dataType
    /// and commits the reconciled payload.
    pub async fn apply_manual_decision(
        &self,
        data_type: &DataType,
        decision: ManualDecision,
        user_id: UserId,
    ) -> SyncResult<Option<DataPayload>> {
        let resolved = self.resolver.apply_manual_decision(data_type, decision)?;
        if let Some(payload) = &resolved {
            self.versions.commit(data_type, payload.clone(), user_id)?;
        }
        Ok(resolved)
    }

    /// Runs onboarding for a user. Idempotent; an initialized device
    /// returns immediately without network traffic.
    pub async fn begin_onboarding(&self, user_id: UserId) -> SyncResult<OnboardingReport> {
        self.onboarding.run(user_id).await
    }

    /// Subscribes to onboarding progress.
    #[must_use]
    pub fn onboarding_progress(&self) -> watch::Receiver<OnboardingProgress> {
        self.onboarding.progress()
    }

    /// Reports an app activity change; the flush cadence adapts.
    pub async fn set_activity(&self, activity: Activity) {
        self.scheduler.set_activity(activity).await;
    }

    /// Signals `true` when the backend rejected the credential.
    #[must_use]
    pub fn reauth_signal(&self) -> watch::Receiver<bool> {
        self.scheduler.reauth_signal()
    }

    /// Clears the reauth flag after the host stored a fresh credential.
    pub fn reauthenticated(&self) {
        self.scheduler.reauthenticated();
    }

    /// Spawns the background driver: periodic flushes, immediate flush
    /// requests, reconnect handling.
    pub fn start(&self) -> JoinHandle<()> {
        let scheduler = Arc::clone(&self.scheduler);
        tokio::spawn(scheduler.drive())
    }
}

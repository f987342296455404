//! New-device onboarding.
//!
//! A strictly ordered state machine: detect whether this install is new
//! for the account, pull the full remote state, overwrite local state,
//! then register and mark the device initialized. Progress is published
//! over a watch channel for the UI; any failure moves to `Failed` and the
//! whole run can simply be retried.

use crate::clock::Clock;
use crate::error::{SyncError, SyncResult};
use crate::transport::{DeviceProfile, SyncBackend};
use crate::version::VersionStore;
use lexisync_storage::KeyValueStore;
use lexisync_types::{DataType, DeviceId, UserId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const INITIALIZED_KEY: &str = "device/initialized";
const ONBOARDED_AT_KEY: &str = "device/onboarded_at";

/// Where an onboarding run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStage {
    Detecting,
    Downloading,
    Overwriting,
    Initializing,
    Completed,
    Failed,
}

impl OnboardingStage {
    fn percent(self) -> u8 {
        match self {
            Self::Detecting => 10,
            Self::Downloading => 40,
            Self::Overwriting => 70,
            Self::Initializing => 90,
            Self::Completed => 100,
            Self::Failed => 100,
        }
    }
}

/// A progress update published while onboarding runs.
#[derive(Debug, Clone, PartialEq)]
pub struct OnboardingProgress {
    pub stage: OnboardingStage,
    /// Rough completion percentage for a progress bar.
    pub percent: u8,
    /// Human-readable status line.
    pub message: String,
    /// Short label for the current step.
    pub step_label: String,
}

impl Default for OnboardingProgress {
    fn default() -> Self {
        Self {
            stage: OnboardingStage::Detecting,
            percent: 0,
            message: "waiting".to_string(),
            step_label: "idle".to_string(),
        }
    }
}

/// The outcome of a completed (or short-circuited) run.
#[derive(Debug, Clone, Default)]
pub struct OnboardingReport {
    /// False when the device was already initialized and nothing ran.
    pub was_new_device: bool,
    /// DataTypes whose local state was replaced by the remote pull.
    pub overwritten: Vec<DataType>,
    /// Total items across all pulled payloads.
    pub item_count: usize,
}

/// Metadata the device registers with the backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub platform: String,
    pub os_version: String,
    pub app_version: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            name: "unnamed device".to_string(),
            platform: std::env::consts::OS.to_string(),
            os_version: String::new(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Runs the onboarding state machine for one device.
pub struct OnboardingRunner {
    store: Arc<dyn KeyValueStore>,
    backend: Arc<dyn SyncBackend>,
    versions: Arc<VersionStore>,
    clock: Arc<dyn Clock>,
    device_id: DeviceId,
    device_info: DeviceInfo,
    progress_tx: watch::Sender<OnboardingProgress>,
}

impl OnboardingRunner {
    /// Creates a runner.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        backend: Arc<dyn SyncBackend>,
        versions: Arc<VersionStore>,
        clock: Arc<dyn Clock>,
        device_id: DeviceId,
        device_info: DeviceInfo,
    ) -> Self {
        let (progress_tx, _) = watch::channel(OnboardingProgress::default());
        Self {
            store,
            backend,
            versions,
            clock,
            device_id,
            device_info,
            progress_tx,
        }
    }

    /// Subscribes to progress updates.
    pub fn progress(&self) -> watch::Receiver<OnboardingProgress> {
        self.progress_tx.subscribe()
    }

    fn publish(&self, stage: OnboardingStage, message: &str, step_label: &str) {
        self.progress_tx.send_replace(OnboardingProgress {
            stage,
            percent: stage.percent(),
            message: message.to_string(),
            step_label: step_label.to_string(),
        });
    }

    /// Runs the full state machine. Safe to call again after a failure:
    /// every step is idempotent, and an already-initialized device
    /// short-circuits to `Completed` with zero network calls.
    pub async fn run(&self, user_id: UserId) -> SyncResult<OnboardingReport> {
        match self.run_inner(user_id).await {
            Ok(report) => {
                self.publish(OnboardingStage::Completed, "ready", "done");
                Ok(report)
            }
            Err(e) => {
                warn!("onboarding failed: {e}");
                self.publish(OnboardingStage::Failed, &e.to_string(), "failed");
                Err(e)
            }
        }
    }

    async fn run_inner(&self, user_id: UserId) -> SyncResult<OnboardingReport> {
        // ── Detecting ────────────────────────────────────────────
        self.publish(
            OnboardingStage::Detecting,
            "checking device status",
            "detect",
        );

        if self.store.get(INITIALIZED_KEY)?.is_some() {
            debug!("device already initialized, onboarding short-circuits");
            return Ok(OnboardingReport::default());
        }

        let devices = self.backend.list_devices(&user_id).await?;
        let registration = devices.iter().find(|d| d.device_id == self.device_id);
        let is_new = match registration {
            None => true,
            Some(r) => !r.active || !r.initialized,
        };
        if !is_new {
            // Known remotely but the local marker was lost; restore it.
            self.store.set(INITIALIZED_KEY, "true")?;
            return Ok(OnboardingReport::default());
        }
        info!(device_id = %self.device_id, "new device detected, pulling remote state");

        // ── Downloading ──────────────────────────────────────────
        self.publish(
            OnboardingStage::Downloading,
            "downloading account data",
            "download",
        );
        let remote = self.backend.fetch_snapshot(&user_id).await?;

        // A payload whose shape disagrees with its declared dataType
        // fails the whole step; partial application is worse than a
        // clean retry.
        for snapshot in &remote.snapshots {
            if !snapshot.payload.matches(&snapshot.data_type) {
                return Err(SyncError::DataIntegrity(format!(
                    "remote snapshot for {} carries a mismatched payload",
                    snapshot.data_type
                )));
            }
        }

        // ── Overwriting ──────────────────────────────────────────
        self.publish(
            OnboardingStage::Overwriting,
            "applying account data",
            "overwrite",
        );
        let mut report = OnboardingReport {
            was_new_device: true,
            ..Default::default()
        };
        for snapshot in &remote.snapshots {
            self.backup_existing(&snapshot.data_type);
            self.versions.overwrite(snapshot)?;
            report.item_count += snapshot.payload.item_count();
            report.overwritten.push(snapshot.data_type.clone());
            debug!(
                data_type = %snapshot.data_type,
                version = snapshot.version,
                "applied remote snapshot"
            );
        }

        // ── Initializing ─────────────────────────────────────────
        self.publish(
            OnboardingStage::Initializing,
            "registering device",
            "register",
        );
        let profile = DeviceProfile {
            device_id: self.device_id,
            name: self.device_info.name.clone(),
            platform: self.device_info.platform.clone(),
            os_version: self.device_info.os_version.clone(),
            app_version: self.device_info.app_version.clone(),
            fingerprint: self.fingerprint(&user_id),
        };
        self.backend.register_device(&profile).await?;
        self.backend.init_device(&self.device_id).await?;

        self.store.set(INITIALIZED_KEY, "true")?;
        self.store
            .set(ONBOARDED_AT_KEY, &self.clock.now().as_millis().to_string())?;
        info!(
            types = report.overwritten.len(),
            items = report.item_count,
            "onboarding completed"
        );
        Ok(report)
    }

    /// Best-effort backup of existing local state before the overwrite.
    /// A failed backup is logged, never fatal: the remote state is the
    /// authority during onboarding.
    fn backup_existing(&self, data_type: &DataType) {
        let current = match self.versions.current(data_type) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(e) => {
                warn!(data_type = %data_type, "could not read state for backup: {e}");
                return;
            }
        };
        let key = format!("backup/{data_type}");
        match serde_json::to_string(&current) {
            Ok(json) => {
                if let Err(e) = self.store.set(&key, &json) {
                    warn!(data_type = %data_type, "backup write failed: {e}");
                }
            }
            Err(e) => warn!(data_type = %data_type, "backup serialize failed: {e}"),
        }
    }

    /// Stable install fingerprint: SHA-256 over device and user identity.
    fn fingerprint(&self, user_id: &UserId) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.device_id.to_string().as_bytes());
        hasher.update(user_id.to_string().as_bytes());
        hasher.update(self.device_info.platform.as_bytes());
        hex::encode(hasher.finalize())
    }
}

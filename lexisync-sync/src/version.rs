//! Version service — fingerprints, snapshot comparison, watermarks.
//!
//! The relationship analysis classifies a local/remote snapshot pair into
//! one of five relationships and recommends an action. It never mutates
//! anything; the conflict resolver acts on its verdicts.

use crate::clock::Clock;
use crate::error::{SyncError, SyncResult};
use lexisync_storage::KeyValueStore;
use lexisync_types::{DataPayload, DataType, DeviceId, Timestamp, UserId, VersionedSnapshot};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Two timestamps further apart than this can no longer be divergent
/// edits of the same logical state.
const DIVERGENCE_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Timestamp-proximity confidence decays to zero over this span.
const PROXIMITY_DECAY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// How many past commits the trimmed history ring retains per dataType.
const HISTORY_LIMIT: usize = 8;

/// How two snapshots of the same dataType relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// Identical version and checksum.
    Same,
    /// Local is one committed step ahead.
    LocalNewer,
    /// Remote is one committed step ahead.
    RemoteNewer,
    /// Both sides advanced from a common point within the divergence window.
    Divergent,
    /// No plausible common history.
    Unrelated,
}

impl Relationship {
    /// The inverse relationship, as seen from the other side.
    #[must_use]
    pub fn inverse(self) -> Self {
        match self {
            Self::LocalNewer => Self::RemoteNewer,
            Self::RemoteNewer => Self::LocalNewer,
            other => other,
        }
    }

    fn base_confidence(self) -> f64 {
        match self {
            Self::Same => 1.0,
            Self::LocalNewer | Self::RemoteNewer => 0.8,
            Self::Divergent => 0.6,
            Self::Unrelated => 0.3,
        }
    }
}

/// What the resolver should do with the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    KeepLocal,
    KeepRemote,
    Merge,
    ManualReview,
}

/// Expected effort of merging the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeComplexity {
    Simple,
    Moderate,
    Complex,
}

/// The result of comparing two snapshots. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelationshipVerdict {
    pub relationship: Relationship,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub recommended_action: RecommendedAction,
    pub merge_complexity: MergeComplexity,
}

/// Version fields extracted from a snapshot, absent fields defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: u64,
    pub timestamp: Timestamp,
    pub checksum: String,
}

/// Computes the deterministic fingerprint of a payload: SHA-256 over the
/// canonical JSON serialization, hex-encoded. Only per-payload determinism
/// is a compatibility requirement, not the algorithm itself.
pub fn checksum(payload: &DataPayload) -> SyncResult<String> {
    let bytes = serde_json::to_vec(payload)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Pulls `{version, timestamp, checksum}` out of a snapshot.
#[must_use]
pub fn extract_version(snapshot: &VersionedSnapshot) -> VersionInfo {
    VersionInfo {
        version: snapshot.version,
        timestamp: snapshot.timestamp,
        checksum: snapshot.checksum.clone(),
    }
}

/// Classifies the relationship between a local and a remote snapshot.
///
/// Symmetry invariant: `compare(a, b)` and `compare(b, a)` yield inverse
/// relationships with equal confidence for every case that is not `Same`
/// or `Unrelated`.
#[must_use]
pub fn compare(
    local: Option<&VersionedSnapshot>,
    remote: Option<&VersionedSnapshot>,
) -> RelationshipVerdict {
    let (local, remote) = match (local, remote) {
        (None, None) => {
            return RelationshipVerdict {
                relationship: Relationship::Unrelated,
                confidence: 0.0,
                recommended_action: RecommendedAction::ManualReview,
                merge_complexity: MergeComplexity::Complex,
            };
        }
        (Some(_), None) => {
            return RelationshipVerdict {
                relationship: Relationship::LocalNewer,
                confidence: 0.9,
                recommended_action: RecommendedAction::KeepLocal,
                merge_complexity: MergeComplexity::Simple,
            };
        }
        (None, Some(_)) => {
            return RelationshipVerdict {
                relationship: Relationship::RemoteNewer,
                confidence: 0.9,
                recommended_action: RecommendedAction::KeepRemote,
                merge_complexity: MergeComplexity::Simple,
            };
        }
        (Some(l), Some(r)) => (l, r),
    };

    let version_delta = local.version.abs_diff(remote.version);
    let within_window =
        local.timestamp.abs_diff(&remote.timestamp) <= DIVERGENCE_WINDOW;

    let relationship = if version_delta == 0 && local.checksum == remote.checksum {
        Relationship::Same
    } else if version_delta == 1 && timestamps_consistent(local, remote) {
        // The committed version decides the newer side; the timestamps
        // only had to agree with it.
        if local.version > remote.version {
            Relationship::LocalNewer
        } else {
            Relationship::RemoteNewer
        }
    } else if version_delta >= 1 && within_window {
        // Either side skipped commits, or a one-step delta whose
        // timestamps disagree with the version order. Recent enough to
        // share history.
        Relationship::Divergent
    } else {
        Relationship::Unrelated
    };

    let confidence = confidence_for(relationship, local, remote);

    let recommended_action = match relationship {
        Relationship::Same | Relationship::LocalNewer => RecommendedAction::KeepLocal,
        Relationship::RemoteNewer => RecommendedAction::KeepRemote,
        Relationship::Divergent => {
            if confidence > 0.7 {
                RecommendedAction::Merge
            } else {
                RecommendedAction::ManualReview
            }
        }
        Relationship::Unrelated => RecommendedAction::ManualReview,
    };

    let merge_complexity = match relationship {
        Relationship::Unrelated => MergeComplexity::Complex,
        Relationship::Divergent => size_delta_complexity(local, remote),
        _ => MergeComplexity::Simple,
    };

    RelationshipVerdict {
        relationship,
        confidence,
        recommended_action,
        merge_complexity,
    }
}

/// True when the one-step version delta orders the same way as the
/// timestamps (the higher version also carries the later-or-equal time).
fn timestamps_consistent(local: &VersionedSnapshot, remote: &VersionedSnapshot) -> bool {
    if local.version > remote.version {
        local.timestamp >= remote.timestamp
    } else {
        remote.timestamp >= local.timestamp
    }
}

fn confidence_for(
    relationship: Relationship,
    local: &VersionedSnapshot,
    remote: &VersionedSnapshot,
) -> f64 {
    let base = relationship.base_confidence();
    let gap = local.timestamp.abs_diff(&remote.timestamp);
    let proximity =
        1.0 - (gap.as_millis() as f64 / PROXIMITY_DECAY.as_millis() as f64).min(1.0);
    (base + proximity) / 2.0
}

/// Relative payload-size delta bands: <10% simple, <30% moderate, else
/// complex.
fn size_delta_complexity(
    local: &VersionedSnapshot,
    remote: &VersionedSnapshot,
) -> MergeComplexity {
    let local_size = local.payload_size() as f64;
    let remote_size = remote.payload_size() as f64;
    let larger = local_size.max(remote_size);
    if larger == 0.0 {
        return MergeComplexity::Simple;
    }
    let delta = (local_size - remote_size).abs() / larger;
    if delta < 0.10 {
        MergeComplexity::Simple
    } else if delta < 0.30 {
        MergeComplexity::Moderate
    } else {
        MergeComplexity::Complex
    }
}

/// One entry of the trimmed per-dataType commit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub version: u64,
    pub checksum: String,
    pub timestamp: Timestamp,
}

/// Owns the one current snapshot per dataType and its watermark, persisted
/// through the durable key-value contract.
pub struct VersionStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    device_id: DeviceId,
}

impl VersionStore {
    /// Creates a version store over the given durable store.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, device_id: DeviceId) -> Self {
        Self {
            store,
            clock,
            device_id,
        }
    }

    fn current_key(data_type: &DataType) -> String {
        format!("sync/{}/current", data_type)
    }

    fn watermark_key(data_type: &DataType) -> String {
        format!("sync/{}/watermark", data_type)
    }

    fn history_key(data_type: &DataType) -> String {
        format!("sync/{}/history", data_type)
    }

    /// The current committed snapshot for a dataType, if any.
    pub fn current(&self, data_type: &DataType) -> SyncResult<Option<VersionedSnapshot>> {
        match self.store.get(&Self::current_key(data_type))? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// The last version successfully committed for a dataType (0 if none).
    pub fn watermark(&self, data_type: &DataType) -> SyncResult<u64> {
        match self.store.get(&Self::watermark_key(data_type))? {
            Some(v) => v
                .parse()
                .map_err(|_| SyncError::DataIntegrity(format!("bad watermark for {data_type}"))),
            None => Ok(0),
        }
    }

    /// Commits a new payload: version advances by exactly one from the
    /// watermark, checksum is recomputed, the history ring is trimmed.
    pub fn commit(
        &self,
        data_type: &DataType,
        payload: DataPayload,
        user_id: UserId,
    ) -> SyncResult<VersionedSnapshot> {
        let previous = self.watermark(data_type)?;
        let version = previous + 1;
        let digest = checksum(&payload)?;

        let mut snapshot = VersionedSnapshot::new(
            data_type.clone(),
            version,
            digest,
            payload,
            self.device_id,
            user_id,
        )
        .with_timestamp(self.clock.now());
        if previous > 0 {
            snapshot = snapshot.with_parent(previous);
        }

        self.persist(data_type, &snapshot)?;
        debug!(data_type = %data_type, version, "committed snapshot");
        Ok(snapshot)
    }

    /// Replaces the current snapshot wholesale (onboarding pull). The
    /// watermark takes the remote version as-is.
    pub fn overwrite(&self, snapshot: &VersionedSnapshot) -> SyncResult<()> {
        self.persist(&snapshot.data_type, snapshot)
    }

    /// Removes all state for a dataType.
    pub fn clear(&self, data_type: &DataType) -> SyncResult<()> {
        self.store.remove(&Self::current_key(data_type))?;
        self.store.remove(&Self::watermark_key(data_type))?;
        self.store.remove(&Self::history_key(data_type))?;
        Ok(())
    }

    /// The trimmed commit history for a dataType, oldest first.
    pub fn history(&self, data_type: &DataType) -> SyncResult<Vec<HistoryEntry>> {
        match self.store.get(&Self::history_key(data_type))? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn persist(&self, data_type: &DataType, snapshot: &VersionedSnapshot) -> SyncResult<()> {
        let mut history = self.history(data_type).unwrap_or_default();
        history.push(HistoryEntry {
            version: snapshot.version,
            checksum: snapshot.checksum.clone(),
            timestamp: snapshot.timestamp,
        });
        if history.len() > HISTORY_LIMIT {
            let excess = history.len() - HISTORY_LIMIT;
            history.drain(..excess);
        }

        self.store
            .set(&Self::current_key(data_type), &serde_json::to_string(snapshot)?)?;
        self.store
            .set(&Self::watermark_key(data_type), &snapshot.version.to_string())?;
        self.store
            .set(&Self::history_key(data_type), &serde_json::to_string(&history)?)?;
        Ok(())
    }
}

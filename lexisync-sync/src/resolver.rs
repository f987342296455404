//! Conflict detection and resolution.
//!
//! A resolution pass turns a divergent local/remote snapshot pair into one
//! reconciled payload per dataType. Conflict records are transient — they
//! live for one pass — except `Manual`-policy records, which are retained
//! in a queryable list until an external decision arrives.

use crate::clock::Clock;
use crate::error::SyncResult;
use crate::merge::{self, Keyed};
use crate::version::{self, Relationship, RelationshipVerdict};
use lexisync_types::{DataPayload, DataType, Timestamp, VersionedSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Resolved conflict bookkeeping is reclaimed after this age.
const RESOLVED_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// The kind of disagreement between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// The snapshots' versions disagree.
    Version,
    /// Both sides modified an item with the same identity key.
    Content,
    /// An item exists on one side only.
    Deletion,
    /// Both sides independently created an item with the same identity key.
    Addition,
}

/// How a pass resolves conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPolicy {
    /// The remote side always wins.
    Auto,
    /// Defer: the pass fails and records wait for an external decision.
    Manual,
    /// Per-kind heuristics (the default).
    #[default]
    Smart,
}

/// An external decision for `Manual`-policy conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualDecision {
    KeepLocal,
    KeepRemote,
    Merge,
}

/// One detected conflict. Transient unless the policy is `Manual`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub data_type: DataType,
    pub kind: ConflictKind,
    /// Identity key of the conflicting item, when item-level.
    pub item_key: Option<String>,
    pub local: Option<VersionedSnapshot>,
    pub remote: Option<VersionedSnapshot>,
    pub policy: ResolutionPolicy,
    /// Confidence of the underlying relationship verdict, in [0, 1].
    pub confidence: f64,
    pub detected_at: Timestamp,
}

/// Result of one resolution pass across one or more dataTypes.
#[derive(Debug, Clone, Default)]
pub struct ResolutionOutcome {
    /// False when the policy deferred (manual) or every pair failed.
    pub success: bool,
    /// The reconciled payload per dataType.
    pub resolved: HashMap<DataType, DataPayload>,
    /// Items that existed on both sides and were merged.
    pub merged_count: usize,
    /// DataType pairs fully resolved.
    pub resolved_count: usize,
    /// Conflicts deferred to manual resolution.
    pub manual_count: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResolvedMarker {
    data_type: DataType,
    resolved_at: Timestamp,
}

/// Detects and resolves conflicts between snapshot pairs.
pub struct ConflictResolver {
    clock: Arc<dyn Clock>,
    manual: Mutex<Vec<ConflictRecord>>,
    resolved_log: Mutex<Vec<ResolvedMarker>>,
}

impl ConflictResolver {
    /// Creates a resolver.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            manual: Mutex::new(Vec::new()),
            resolved_log: Mutex::new(Vec::new()),
        }
    }

    // ── Detection ────────────────────────────────────────────────

    /// Produces zero or more conflict records for a snapshot pair.
    pub fn detect(
        &self,
        local: Option<&VersionedSnapshot>,
        remote: Option<&VersionedSnapshot>,
        policy: ResolutionPolicy,
    ) -> Vec<ConflictRecord> {
        let verdict = version::compare(local, remote);
        let mut conflicts = Vec::new();
        let (l, r) = match (local, remote) {
            (Some(l), Some(r)) => (l, r),
            _ => return conflicts,
        };

        let now = self.clock.now();
        let record = |kind, item_key: Option<String>| ConflictRecord {
            data_type: l.data_type.clone(),
            kind,
            item_key,
            local: Some(l.clone()),
            remote: Some(r.clone()),
            policy,
            confidence: verdict.confidence,
            detected_at: now,
        };

        if verdict.relationship != Relationship::Same {
            conflicts.push(record(ConflictKind::Version, None));
        }

        // Never-synced local snapshots make same-key collisions look like
        // independent creations rather than edits of shared state.
        let independent_creation = l.parent_version.is_none();

        for (key, on_local, on_remote, differs) in item_overlap(&l.payload, &r.payload) {
            match (on_local, on_remote) {
                (true, true) if differs => {
                    let kind = if independent_creation {
                        ConflictKind::Addition
                    } else {
                        ConflictKind::Content
                    };
                    conflicts.push(record(kind, Some(key)));
                }
                (true, false) | (false, true) => {
                    conflicts.push(record(ConflictKind::Deletion, Some(key)));
                }
                _ => {}
            }
        }

        conflicts
    }

    // ── Resolution ───────────────────────────────────────────────

    /// Full pass for one dataType pair: compare, detect, resolve.
    pub fn resolve_pair(
        &self,
        data_type: &DataType,
        local: Option<&VersionedSnapshot>,
        remote: Option<&VersionedSnapshot>,
        policy: ResolutionPolicy,
    ) -> SyncResult<ResolutionOutcome> {
        let mut outcome = ResolutionOutcome::default();
        let conflicts = self.detect(local, remote, policy);

        if policy == ResolutionPolicy::Manual && !conflicts.is_empty() {
            outcome.manual_count = conflicts.len();
            let mut manual = self.manual.lock().unwrap_or_else(|p| p.into_inner());
            manual.extend(conflicts);
            debug!(data_type = %data_type, "conflicts deferred to manual resolution");
            return Ok(outcome);
        }

        let resolved = match policy {
            ResolutionPolicy::Auto => remote
                .map(|r| r.payload.clone())
                .or_else(|| local.map(|l| l.payload.clone())),
            ResolutionPolicy::Smart | ResolutionPolicy::Manual => {
                self.smart_resolve(local, remote, &mut outcome)
            }
        };

        if let Some(payload) = resolved {
            outcome.resolved.insert(data_type.clone(), payload);
            outcome.resolved_count = 1;
            outcome.success = true;
            let mut log = self.resolved_log.lock().unwrap_or_else(|p| p.into_inner());
            log.push(ResolvedMarker {
                data_type: data_type.clone(),
                resolved_at: self.clock.now(),
            });
        }

        Ok(outcome)
    }

    /// Resolves an explicit set of conflict records (the upstream
    /// `resolveConflicts` surface). Records are grouped per dataType and
    /// each pair is resolved once.
    pub fn resolve_conflicts(
        &self,
        conflicts: &[ConflictRecord],
        policy: ResolutionPolicy,
    ) -> SyncResult<ResolutionOutcome> {
        let mut combined = ResolutionOutcome::default();
        let mut seen: HashSet<DataType> = HashSet::new();

        for conflict in conflicts {
            if !seen.insert(conflict.data_type.clone()) {
                continue;
            }
            let pair = self.resolve_pair(
                &conflict.data_type,
                conflict.local.as_ref(),
                conflict.remote.as_ref(),
                policy,
            )?;
            combined.merged_count += pair.merged_count;
            combined.resolved_count += pair.resolved_count;
            combined.manual_count += pair.manual_count;
            combined.errors.extend(pair.errors);
            combined.resolved.extend(pair.resolved);
        }

        combined.success = combined.manual_count == 0 && combined.errors.is_empty();
        Ok(combined)
    }

    fn smart_resolve(
        &self,
        local: Option<&VersionedSnapshot>,
        remote: Option<&VersionedSnapshot>,
        outcome: &mut ResolutionOutcome,
    ) -> Option<DataPayload> {
        let verdict = version::compare(local, remote);
        let (l, r) = match (local, remote) {
            (Some(l), Some(r)) => (l, r),
            (Some(l), None) => return Some(l.payload.clone()),
            (None, Some(r)) => return Some(r.payload.clone()),
            (None, None) => return None,
        };

        match verdict.relationship {
            Relationship::Same => Some(l.payload.clone()),
            Relationship::LocalNewer | Relationship::RemoteNewer
                if l.timestamp != r.timestamp =>
            {
                // Version conflict: newer-by-timestamp wins outright.
                if l.timestamp > r.timestamp {
                    Some(l.payload.clone())
                } else {
                    Some(r.payload.clone())
                }
            }
            // Timestamp tie, divergence, or unrelated history: merge.
            _ => Some(self.merge_with_degrade(l, r, &verdict, outcome)),
        }
    }

    /// Merges two payloads; a failed merge degrades to keep-remote for the
    /// pair instead of aborting the pass.
    fn merge_with_degrade(
        &self,
        l: &VersionedSnapshot,
        r: &VersionedSnapshot,
        verdict: &RelationshipVerdict,
        outcome: &mut ResolutionOutcome,
    ) -> DataPayload {
        let local_payload = if l.parent_version.is_none() {
            rekey_additions(&l.payload, &r.payload)
        } else {
            l.payload.clone()
        };

        match merge::merge_payloads(&local_payload, &r.payload) {
            Some(merged) => {
                outcome.merged_count += merged.merged_items;
                debug!(
                    data_type = %l.data_type,
                    merged_items = merged.merged_items,
                    action = ?verdict.recommended_action,
                    "merged snapshot pair"
                );
                merged.payload
            }
            None => {
                warn!(
                    data_type = %l.data_type,
                    "payload shapes disagree, keeping remote"
                );
                outcome
                    .errors
                    .push(format!("{}: shape mismatch, kept remote", l.data_type));
                r.payload.clone()
            }
        }
    }

    // ── Manual conflicts ─────────────────────────────────────────

    /// Conflicts awaiting an external decision.
    pub fn current_conflicts(&self) -> Vec<ConflictRecord> {
        self.manual
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Applies an external decision to all retained conflicts of a
    /// dataType. Returns the reconciled payload, if any conflict matched.
    pub fn apply_manual_decision(
        &self,
        data_type: &DataType,
        decision: ManualDecision,
    ) -> SyncResult<Option<DataPayload>> {
        let matching: Vec<ConflictRecord> = {
            let mut manual = self.manual.lock().unwrap_or_else(|p| p.into_inner());
            let (keep, take): (Vec<_>, Vec<_>) = manual
                .drain(..)
                .partition(|c| &c.data_type != data_type);
            *manual = keep;
            take
        };

        let Some(first) = matching.first() else {
            return Ok(None);
        };

        let resolved = match decision {
            ManualDecision::KeepLocal => first.local.as_ref().map(|s| s.payload.clone()),
            ManualDecision::KeepRemote => first.remote.as_ref().map(|s| s.payload.clone()),
            ManualDecision::Merge => {
                let mut outcome = ResolutionOutcome::default();
                self.smart_resolve(first.local.as_ref(), first.remote.as_ref(), &mut outcome)
            }
        };

        let mut log = self.resolved_log.lock().unwrap_or_else(|p| p.into_inner());
        log.push(ResolvedMarker {
            data_type: data_type.clone(),
            resolved_at: self.clock.now(),
        });
        Ok(resolved)
    }

    /// Reclaims resolved-conflict bookkeeping older than 30 days.
    pub fn prune_resolved(&self) {
        let cutoff = self.clock.now();
        let mut log = self.resolved_log.lock().unwrap_or_else(|p| p.into_inner());
        let before = log.len();
        log.retain(|m| !m.resolved_at.is_older_than(&cutoff, RESOLVED_RETENTION));
        if log.len() < before {
            debug!(pruned = before - log.len(), "pruned resolved-conflict markers");
        }
    }

    /// Number of retained resolved-conflict markers (housekeeping metric).
    pub fn resolved_marker_count(&self) -> usize {
        self.resolved_log
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }
}

/// Enumerates identity keys across both payloads: (key, on_local,
/// on_remote, content_differs).
fn item_overlap(local: &DataPayload, remote: &DataPayload) -> Vec<(String, bool, bool, bool)> {
    fn keyed_overlap<T: Keyed + PartialEq>(
        local: &[T],
        remote: &[T],
    ) -> Vec<(String, bool, bool, bool)> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for item in local {
            let key = item.identity_key().to_string();
            if !seen.insert(key.clone()) {
                continue;
            }
            match remote.iter().find(|r| r.identity_key() == key) {
                Some(r) => out.push((key, true, true, r != item)),
                None => out.push((key, true, false, false)),
            }
        }
        for item in remote {
            let key = item.identity_key().to_string();
            if seen.insert(key) {
                out.push((item.identity_key().to_string(), false, true, false));
            }
        }
        out
    }

    match (local, remote) {
        (DataPayload::Vocabulary(l), DataPayload::Vocabulary(r)) => keyed_overlap(l, r),
        (DataPayload::Badges(l), DataPayload::Badges(r)) => keyed_overlap(l, r),
        (DataPayload::Shows(l), DataPayload::Shows(r)) => keyed_overlap(l, r),
        (DataPayload::Records(l), DataPayload::Records(r)) => keyed_overlap(l, r),
        // Scalar and generic payloads have no item granularity.
        _ => Vec::new(),
    }
}

/// Re-keys local opaque-id items that collide with different remote
/// content, so two independently created items both survive the merge.
/// Vocabulary is exempt: the word itself is the identity, so a collision
/// is the same word, not a coincidence.
fn rekey_additions(local: &DataPayload, remote: &DataPayload) -> DataPayload {
    fn rekey_items<T: Keyed + Clone + PartialEq>(local: &[T], remote: &[T]) -> Vec<T> {
        let taken: HashSet<String> = local
            .iter()
            .chain(remote.iter())
            .map(|i| i.identity_key().to_string())
            .collect();
        local
            .iter()
            .map(|item| {
                let collides = remote
                    .iter()
                    .any(|r| r.identity_key() == item.identity_key() && r != item);
                if collides {
                    let mut clone = item.clone();
                    clone.set_identity_key(merge::rekey(item.identity_key(), false, &taken));
                    clone
                } else {
                    item.clone()
                }
            })
            .collect()
    }

    match (local, remote) {
        (DataPayload::Badges(l), DataPayload::Badges(r)) => {
            DataPayload::Badges(rekey_items(l, r))
        }
        (DataPayload::Shows(l), DataPayload::Shows(r)) => DataPayload::Shows(rekey_items(l, r)),
        (DataPayload::Records(l), DataPayload::Records(r)) => {
            DataPayload::Records(rekey_items(l, r))
        }
        _ => local.clone(),
    }
}

//! Incremental diff engine.
//!
//! Computes added/updated/deleted/unchanged sets between a local and a
//! remote payload of the same dataType, estimates the transfer cost, and
//! plans upload batches according to a batching strategy.

use crate::error::SyncResult;
use crate::merge::Keyed;
use lexisync_types::{DataPayload, DataType, Timestamp};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// One addressable item inside a payload, in wire form.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffItem {
    /// Identity key within the dataType.
    pub key: String,
    /// Serialized item.
    pub value: Value,
    /// Last local modification time.
    pub last_modified: Timestamp,
}

/// The difference between a local and a remote payload.
#[derive(Debug, Clone)]
pub struct SnapshotDiff {
    pub data_type: DataType,
    /// Present locally, absent remotely.
    pub added: Vec<DiffItem>,
    /// Present on both sides, local strictly newer and different.
    pub updated: Vec<DiffItem>,
    /// Present remotely, absent locally (keys only).
    pub deleted: Vec<String>,
    /// Items requiring no transfer.
    pub unchanged: usize,
    /// Serialized bytes that would go over the wire.
    pub estimated_size: usize,
    /// Scheduling hint, not an SLA: size over the nominal throughput
    /// floor, minimum one second.
    pub estimated_transfer_time: Duration,
}

impl SnapshotDiff {
    /// True when nothing needs transferring.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Upload batching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchStrategy {
    /// Added, then updated, then deleted, each chunked; the version marker
    /// advances only after all three phases succeed.
    #[default]
    Smart,
    /// Added+updated in one pass, no fine-grained conflict checks, marker
    /// force-advanced. Trades data-loss risk for speed.
    Aggressive,
    /// High-priority subset only, never deletes remotely, marker advances
    /// only when the recomputed checksum actually changed.
    Conservative,
}

/// Which phase of a plan a batch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Add,
    Update,
    Delete,
    /// Aggressive added+updated combined pass.
    Combined,
}

/// One chunk of items to transmit.
#[derive(Debug, Clone)]
pub struct SyncBatch {
    pub phase: BatchPhase,
    /// Items for add/update/combined phases.
    pub items: Vec<DiffItem>,
    /// Keys for delete phases.
    pub deleted_keys: Vec<String>,
    /// Chunk index within the phase.
    pub chunk: usize,
}

/// When the local version marker may advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerAdvance {
    /// Only after every batch of every phase succeeded.
    AfterAllPhases,
    /// Regardless of outcome (aggressive).
    Always,
    /// Only if the recomputed checksum differs from the last committed one.
    IfChecksumChanged,
}

/// A planned upload for one dataType.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub batches: Vec<SyncBatch>,
    pub marker: MarkerAdvance,
    /// Aggressive plans skip per-item conflict checks on acceptance.
    pub skip_conflict_checks: bool,
}

/// Configuration for diffing and batch planning.
#[derive(Debug, Clone)]
pub struct DiffConfig {
    /// Nominal throughput floor for transfer-time estimates.
    pub throughput_bytes_per_sec: u64,
    /// Chunk size when a dataType has no specific entry.
    pub default_batch_size: usize,
    /// Per-dataType chunk sizes.
    pub batch_sizes: HashMap<DataType, usize>,
    /// Conservative strategy: items modified within this window count as
    /// high priority.
    pub recent_window: Duration,
    /// Conservative strategy: minimum experience delta worth transferring.
    pub materiality_threshold: u64,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            throughput_bytes_per_sec: 1024 * 1024,
            default_batch_size: 50,
            batch_sizes: HashMap::new(),
            recent_window: Duration::from_secs(7 * 24 * 60 * 60),
            materiality_threshold: 100,
        }
    }
}

/// Computes diffs and plans upload batches.
pub struct DiffEngine {
    config: DiffConfig,
}

impl DiffEngine {
    /// Creates an engine with the given configuration.
    pub fn new(config: DiffConfig) -> Self {
        Self { config }
    }

    /// Chunk size for a dataType.
    fn batch_size(&self, data_type: &DataType) -> usize {
        self.config
            .batch_sizes
            .get(data_type)
            .copied()
            .unwrap_or(self.config.default_batch_size)
            .max(1)
    }

    /// Transfer-time estimate for a byte count: size over the nominal
    /// throughput floor, minimum one second.
    #[must_use]
    pub fn estimate_transfer_time(&self, bytes: usize) -> Duration {
        let secs = (bytes as u64 / self.config.throughput_bytes_per_sec.max(1)).max(1);
        Duration::from_secs(secs)
    }

    /// Computes the local→remote difference for one dataType.
    pub fn diff(
        &self,
        data_type: &DataType,
        local: &DataPayload,
        remote: &DataPayload,
    ) -> SyncResult<SnapshotDiff> {
        let local_items = items_of(local)?;
        let remote_items = items_of(remote)?;
        let remote_by_key: HashMap<&str, &DiffItem> =
            remote_items.iter().map(|i| (i.key.as_str(), i)).collect();
        let local_keys: HashMap<&str, ()> =
            local_items.iter().map(|i| (i.key.as_str(), ())).collect();

        let mut added = Vec::new();
        let mut updated = Vec::new();
        let mut unchanged = 0;

        for item in &local_items {
            match remote_by_key.get(item.key.as_str()) {
                None => added.push(item.clone()),
                Some(remote_item) => {
                    let differs = remote_item.value != item.value;
                    let local_newer = item.last_modified > remote_item.last_modified;
                    if differs && local_newer {
                        updated.push(item.clone());
                    } else {
                        unchanged += 1;
                    }
                }
            }
        }

        let deleted: Vec<String> = remote_items
            .iter()
            .filter(|i| !local_keys.contains_key(i.key.as_str()))
            .map(|i| i.key.clone())
            .collect();

        let estimated_size: usize = added
            .iter()
            .chain(updated.iter())
            .map(|i| i.value.to_string().len())
            .sum();

        debug!(
            data_type = %data_type,
            added = added.len(),
            updated = updated.len(),
            deleted = deleted.len(),
            unchanged,
            "computed diff"
        );

        Ok(SnapshotDiff {
            data_type: data_type.clone(),
            added,
            updated,
            deleted,
            unchanged,
            estimated_size,
            estimated_transfer_time: self.estimate_transfer_time(estimated_size),
        })
    }

    /// Plans upload batches for a diff under the given strategy.
    ///
    /// `now` feeds the conservative recency filter; the payload pair feeds
    /// its materiality check.
    pub fn plan_batches(
        &self,
        strategy: BatchStrategy,
        diff: &SnapshotDiff,
        local: &DataPayload,
        remote: &DataPayload,
        now: Timestamp,
    ) -> BatchPlan {
        let size = self.batch_size(&diff.data_type);
        match strategy {
            BatchStrategy::Smart => {
                let mut batches = Vec::new();
                push_item_chunks(&mut batches, BatchPhase::Add, &diff.added, size);
                push_item_chunks(&mut batches, BatchPhase::Update, &diff.updated, size);
                push_key_chunks(&mut batches, &diff.deleted, size);
                BatchPlan {
                    batches,
                    marker: MarkerAdvance::AfterAllPhases,
                    skip_conflict_checks: false,
                }
            }
            BatchStrategy::Aggressive => {
                let combined: Vec<DiffItem> = diff
                    .added
                    .iter()
                    .chain(diff.updated.iter())
                    .cloned()
                    .collect();
                let mut batches = Vec::new();
                push_item_chunks(&mut batches, BatchPhase::Combined, &combined, size);
                push_key_chunks(&mut batches, &diff.deleted, size);
                BatchPlan {
                    batches,
                    marker: MarkerAdvance::Always,
                    skip_conflict_checks: true,
                }
            }
            BatchStrategy::Conservative => {
                let keep: Vec<DiffItem> = diff
                    .added
                    .iter()
                    .chain(diff.updated.iter())
                    .filter(|item| self.is_high_priority(&diff.data_type, item, local, remote, now))
                    .cloned()
                    .collect();
                let mut batches = Vec::new();
                push_item_chunks(&mut batches, BatchPhase::Update, &keep, size);
                // Conservative never deletes remotely.
                BatchPlan {
                    batches,
                    marker: MarkerAdvance::IfChecksumChanged,
                    skip_conflict_checks: false,
                }
            }
        }
    }

    fn is_high_priority(
        &self,
        data_type: &DataType,
        item: &DiffItem,
        local: &DataPayload,
        remote: &DataPayload,
        now: Timestamp,
    ) -> bool {
        match data_type {
            DataType::Experience => {
                if let (DataPayload::Experience(l), DataPayload::Experience(r)) = (local, remote) {
                    l.experience.abs_diff(r.experience) >= self.config.materiality_threshold
                } else {
                    true
                }
            }
            _ => !item
                .last_modified
                .is_older_than(&now, self.config.recent_window),
        }
    }
}

fn push_item_chunks(
    batches: &mut Vec<SyncBatch>,
    phase: BatchPhase,
    items: &[DiffItem],
    size: usize,
) {
    for (chunk, slice) in items.chunks(size).enumerate() {
        batches.push(SyncBatch {
            phase,
            items: slice.to_vec(),
            deleted_keys: Vec::new(),
            chunk,
        });
    }
}

fn push_key_chunks(batches: &mut Vec<SyncBatch>, keys: &[String], size: usize) {
    for (chunk, slice) in keys.chunks(size).enumerate() {
        batches.push(SyncBatch {
            phase: BatchPhase::Delete,
            items: Vec::new(),
            deleted_keys: slice.to_vec(),
            chunk,
        });
    }
}

/// Flattens a payload into addressable wire items. Scalar payloads become
/// a single item keyed `"state"`.
fn items_of(payload: &DataPayload) -> SyncResult<Vec<DiffItem>> {
    fn keyed_items<T: Keyed + Serialize>(items: &[T]) -> SyncResult<Vec<DiffItem>> {
        items
            .iter()
            .map(|item| {
                Ok(DiffItem {
                    key: item.identity_key().to_string(),
                    value: serde_json::to_value(item)?,
                    last_modified: item.last_modified(),
                })
            })
            .collect()
    }

    match payload {
        DataPayload::Vocabulary(items) => keyed_items(items),
        DataPayload::Badges(items) => keyed_items(items),
        DataPayload::Shows(items) => keyed_items(items),
        DataPayload::Records(items) => keyed_items(items),
        DataPayload::Progress(state) => Ok(vec![DiffItem {
            key: "state".to_string(),
            value: serde_json::to_value(state)?,
            last_modified: state.last_modified,
        }]),
        DataPayload::Experience(state) => Ok(vec![DiffItem {
            key: "state".to_string(),
            value: serde_json::to_value(state)?,
            last_modified: state.last_modified,
        }]),
        DataPayload::Generic(Value::Null) => Ok(Vec::new()),
        DataPayload::Generic(value) => Ok(vec![DiffItem {
            key: "state".to_string(),
            value: value.clone(),
            last_modified: Timestamp::default(),
        }]),
    }
}

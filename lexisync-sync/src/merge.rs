//! Per-dataType merge functions.
//!
//! Item collections merge through identity-keyed maps (later
//! `last_modified` wins on collision, one-sided keys union in). Monotonic
//! counters merge by maximum, ratio fields by average. Unknown dataTypes
//! take a generic recursive JSON merge whose leaf conflicts defer to the
//! remote side so repeated passes cannot oscillate.

use lexisync_types::{
    Badge, DataPayload, ExperienceState, ProgressState, Show, StudyRecord, Timestamp,
    VocabularyItem,
};
use serde_json::Value;
use std::collections::HashSet;

/// An item that can be matched across two snapshots of the same dataType.
pub trait Keyed {
    /// The identity key: the word string for vocabulary, an opaque id for
    /// shows, records and badges.
    fn identity_key(&self) -> &str;

    /// Replaces the identity key (re-keying on addition collisions).
    fn set_identity_key(&mut self, key: String);

    /// Last local modification time; later wins on collision.
    fn last_modified(&self) -> Timestamp;
}

impl Keyed for VocabularyItem {
    fn identity_key(&self) -> &str {
        &self.word
    }
    fn set_identity_key(&mut self, key: String) {
        self.word = key;
    }
    fn last_modified(&self) -> Timestamp {
        self.last_modified
    }
}

impl Keyed for Badge {
    fn identity_key(&self) -> &str {
        &self.id
    }
    fn set_identity_key(&mut self, key: String) {
        self.id = key;
    }
    fn last_modified(&self) -> Timestamp {
        self.last_modified
    }
}

impl Keyed for Show {
    fn identity_key(&self) -> &str {
        &self.id
    }
    fn set_identity_key(&mut self, key: String) {
        self.id = key;
    }
    fn last_modified(&self) -> Timestamp {
        self.last_modified
    }
}

impl Keyed for StudyRecord {
    fn identity_key(&self) -> &str {
        &self.id
    }
    fn set_identity_key(&mut self, key: String) {
        self.id = key;
    }
    fn last_modified(&self) -> Timestamp {
        self.last_modified
    }
}

/// Outcome of one payload merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub payload: DataPayload,
    /// Items that existed on both sides and were reconciled.
    pub merged_items: usize,
}

/// Merges two keyed item collections.
///
/// Local order is preserved; remote-only items append in their own order.
/// On a key collision the item with the later `last_modified` wins.
pub fn merge_keyed<T: Keyed + Clone>(local: &[T], remote: &[T]) -> (Vec<T>, usize) {
    let mut merged = Vec::with_capacity(local.len() + remote.len());
    let mut collisions = 0;
    let mut seen: HashSet<&str> = HashSet::new();

    for item in local {
        if !seen.insert(item.identity_key()) {
            continue; // duplicate key within one side; first wins
        }
        match remote.iter().find(|r| r.identity_key() == item.identity_key()) {
            Some(r) => {
                collisions += 1;
                if r.last_modified() > item.last_modified() {
                    merged.push(r.clone());
                } else {
                    merged.push(item.clone());
                }
            }
            None => merged.push(item.clone()),
        }
    }

    for item in remote {
        if !seen.contains(item.identity_key())
            && merged.iter().all(|m| m.identity_key() != item.identity_key())
        {
            merged.push(item.clone());
        }
    }

    (merged, collisions)
}

/// Merges progress: counters by max, accuracy by average.
#[must_use]
pub fn merge_progress(local: &ProgressState, remote: &ProgressState) -> ProgressState {
    ProgressState {
        learning_days: local.learning_days.max(remote.learning_days),
        total_reviews: local.total_reviews.max(remote.total_reviews),
        mastered_words: local.mastered_words.max(remote.mastered_words),
        accuracy: (local.accuracy + remote.accuracy) / 2.0,
        last_modified: local.last_modified.max(remote.last_modified),
    }
}

/// Merges experience: everything is a monotonic counter.
#[must_use]
pub fn merge_experience(local: &ExperienceState, remote: &ExperienceState) -> ExperienceState {
    ExperienceState {
        experience: local.experience.max(remote.experience),
        level: local.level.max(remote.level),
        streak: local.streak.max(remote.streak),
        last_modified: local.last_modified.max(remote.last_modified),
    }
}

/// Generic recursive merge for unknown dataTypes.
///
/// Keys on one side only are kept as-is; objects on both sides recurse;
/// any other leaf conflict takes the remote value, which keeps repeated
/// merge passes from oscillating between the two inputs.
#[must_use]
pub fn merge_generic(local: &Value, remote: &Value) -> Value {
    match (local, remote) {
        (Value::Object(l), Value::Object(r)) => {
            let mut out = l.clone();
            for (key, remote_value) in r {
                match out.get(key) {
                    Some(local_value) => {
                        let merged = merge_generic(local_value, remote_value);
                        out.insert(key.clone(), merged);
                    }
                    None => {
                        out.insert(key.clone(), remote_value.clone());
                    }
                }
            }
            Value::Object(out)
        }
        (_, r) => r.clone(),
    }
}

/// Merges two payloads of the same shape. Returns `None` when the shapes
/// disagree — the caller degrades that item to keep-remote.
#[must_use]
pub fn merge_payloads(local: &DataPayload, remote: &DataPayload) -> Option<MergeOutcome> {
    match (local, remote) {
        (DataPayload::Vocabulary(l), DataPayload::Vocabulary(r)) => {
            let (items, merged_items) = merge_keyed(l, r);
            Some(MergeOutcome {
                payload: DataPayload::Vocabulary(items),
                merged_items,
            })
        }
        (DataPayload::Badges(l), DataPayload::Badges(r)) => {
            let (items, merged_items) = merge_keyed(l, r);
            Some(MergeOutcome {
                payload: DataPayload::Badges(items),
                merged_items,
            })
        }
        (DataPayload::Shows(l), DataPayload::Shows(r)) => {
            let (items, merged_items) = merge_keyed(l, r);
            Some(MergeOutcome {
                payload: DataPayload::Shows(items),
                merged_items,
            })
        }
        (DataPayload::Records(l), DataPayload::Records(r)) => {
            let (items, merged_items) = merge_keyed(l, r);
            Some(MergeOutcome {
                payload: DataPayload::Records(items),
                merged_items,
            })
        }
        (DataPayload::Progress(l), DataPayload::Progress(r)) => Some(MergeOutcome {
            payload: DataPayload::Progress(merge_progress(l, r)),
            merged_items: 1,
        }),
        (DataPayload::Experience(l), DataPayload::Experience(r)) => Some(MergeOutcome {
            payload: DataPayload::Experience(merge_experience(l, r)),
            merged_items: 1,
        }),
        (DataPayload::Generic(l), DataPayload::Generic(r)) => Some(MergeOutcome {
            payload: DataPayload::Generic(merge_generic(l, r)),
            merged_items: 1,
        }),
        _ => None,
    }
}

/// Produces a key that does not collide with anything in `taken`, in the
/// style of `word (2)` for word keys and `id-2` for opaque ids.
#[must_use]
pub fn rekey(original: &str, word_style: bool, taken: &HashSet<String>) -> String {
    for n in 2.. {
        let candidate = if word_style {
            format!("{original} ({n})")
        } else {
            format!("{original}-{n}")
        };
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
    unreachable!("rekey exhausted the integers")
}

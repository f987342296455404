//! Tests for version.rs — relationship analysis and the version store.

mod common;

use common::{snapshot, vocab_payload};
use lexisync_storage::MemoryStore;
use lexisync_sync::{
    checksum, compare, extract_version, ManualClock, MergeComplexity, RecommendedAction,
    Relationship, VersionStore,
};
use lexisync_types::{DataPayload, DataType, DeviceId, UserId};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const T0: u64 = 1_700_000_000_000;
const HOUR: u64 = 60 * 60 * 1000;
const DAY: u64 = 24 * HOUR;

// ── compare ─────────────────────────────────────────────────────

#[test]
fn identical_snapshots_are_same_with_full_confidence() {
    let payload = vocab_payload(&[("apple", T0)]);
    let local = snapshot(DataType::Vocabulary, 3, T0, payload.clone());
    let remote = snapshot(DataType::Vocabulary, 3, T0, payload);

    let verdict = compare(Some(&local), Some(&remote));
    assert_eq!(verdict.relationship, Relationship::Same);
    assert_eq!(verdict.confidence, 1.0);
    assert_eq!(verdict.recommended_action, RecommendedAction::KeepLocal);
    assert_eq!(verdict.merge_complexity, MergeComplexity::Simple);
}

#[test]
fn one_step_ahead_with_later_timestamp_is_local_newer() {
    let local = snapshot(DataType::Vocabulary, 4, T0 + HOUR, vocab_payload(&[("a", T0)]));
    let remote = snapshot(DataType::Vocabulary, 3, T0, vocab_payload(&[]));

    let verdict = compare(Some(&local), Some(&remote));
    assert_eq!(verdict.relationship, Relationship::LocalNewer);
    assert_eq!(verdict.recommended_action, RecommendedAction::KeepLocal);
}

#[test]
fn one_step_behind_is_remote_newer() {
    let local = snapshot(DataType::Vocabulary, 3, T0, vocab_payload(&[]));
    let remote = snapshot(DataType::Vocabulary, 4, T0 + HOUR, vocab_payload(&[("a", T0)]));

    let verdict = compare(Some(&local), Some(&remote));
    assert_eq!(verdict.relationship, Relationship::RemoteNewer);
    assert_eq!(verdict.recommended_action, RecommendedAction::KeepRemote);
}

#[test]
fn tied_timestamps_defer_to_the_higher_version() {
    // Both sides report the same wall-clock time; the committed version
    // still decides which side is ahead.
    let local = snapshot(DataType::Vocabulary, 3, T0, vocab_payload(&[("a", T0)]));
    let remote = snapshot(DataType::Vocabulary, 4, T0, vocab_payload(&[("b", T0)]));

    let verdict = compare(Some(&local), Some(&remote));
    assert_eq!(verdict.relationship, Relationship::RemoteNewer);
    assert_eq!(verdict.recommended_action, RecommendedAction::KeepRemote);
}

#[test]
fn skipped_versions_within_window_are_divergent() {
    let local = snapshot(DataType::Vocabulary, 3, T0, vocab_payload(&[("a", T0)]));
    let remote = snapshot(DataType::Vocabulary, 6, T0 + HOUR, vocab_payload(&[("b", T0)]));

    let verdict = compare(Some(&local), Some(&remote));
    assert_eq!(verdict.relationship, Relationship::Divergent);
    // Close timestamps keep confidence above the merge threshold.
    assert!(verdict.confidence > 0.7);
    assert_eq!(verdict.recommended_action, RecommendedAction::Merge);
}

#[test]
fn inconsistent_one_step_delta_is_divergent() {
    // One-step delta but timestamps disagree with the version order,
    // still inside the 24h window. The window bounds the timestamp gap,
    // so divergence always stays confident enough to merge.
    let local = snapshot(DataType::Vocabulary, 4, T0, vocab_payload(&[("a", T0)]));
    let remote = snapshot(
        DataType::Vocabulary,
        3,
        T0 + 23 * HOUR,
        vocab_payload(&[("b", T0)]),
    );

    let verdict = compare(Some(&local), Some(&remote));
    assert_eq!(verdict.relationship, Relationship::Divergent);
    assert!(verdict.confidence > 0.7);
    assert_eq!(verdict.recommended_action, RecommendedAction::Merge);
}

#[test]
fn beyond_divergence_window_is_unrelated() {
    let local = snapshot(DataType::Vocabulary, 3, T0, vocab_payload(&[("a", T0)]));
    let remote = snapshot(
        DataType::Vocabulary,
        9,
        T0 + 3 * DAY,
        vocab_payload(&[("b", T0)]),
    );

    let verdict = compare(Some(&local), Some(&remote));
    assert_eq!(verdict.relationship, Relationship::Unrelated);
    assert_eq!(verdict.recommended_action, RecommendedAction::ManualReview);
    assert_eq!(verdict.merge_complexity, MergeComplexity::Complex);
}

#[test]
fn one_sided_pairs_keep_the_present_side() {
    let only = snapshot(DataType::Progress, 1, T0, DataPayload::empty_for(&DataType::Progress));

    let local_only = compare(Some(&only), None);
    assert_eq!(local_only.relationship, Relationship::LocalNewer);
    assert_eq!(local_only.confidence, 0.9);
    assert_eq!(local_only.recommended_action, RecommendedAction::KeepLocal);

    let remote_only = compare(None, Some(&only));
    assert_eq!(remote_only.relationship, Relationship::RemoteNewer);
    assert_eq!(remote_only.recommended_action, RecommendedAction::KeepRemote);

    let neither = compare(None, None);
    assert_eq!(neither.relationship, Relationship::Unrelated);
    assert_eq!(neither.confidence, 0.0);
}

#[test]
fn comparison_is_symmetric() {
    let cases = [
        (3, T0, 3, T0),
        (4, T0 + HOUR, 3, T0),
        (3, T0, 4, T0), // tied timestamps, one-step delta
        (3, T0, 6, T0 + HOUR),
        (3, T0, 9, T0 + 3 * DAY),
    ];
    for (lv, lt, rv, rt) in cases {
        let a = snapshot(DataType::Vocabulary, lv, lt, vocab_payload(&[("a", T0)]));
        let b = snapshot(DataType::Vocabulary, rv, rt, vocab_payload(&[("b", T0)]));
        let forward = compare(Some(&a), Some(&b));
        let backward = compare(Some(&b), Some(&a));
        assert_eq!(forward.relationship, backward.relationship.inverse());
        assert_eq!(forward.confidence, backward.confidence);
    }
}

// ── checksum ────────────────────────────────────────────────────

#[test]
fn checksum_is_deterministic_per_payload() {
    let a = vocab_payload(&[("apple", T0)]);
    let b = vocab_payload(&[("apple", T0)]);
    let c = vocab_payload(&[("banana", T0)]);

    assert_eq!(checksum(&a).unwrap(), checksum(&b).unwrap());
    assert_ne!(checksum(&a).unwrap(), checksum(&c).unwrap());
}

#[test]
fn extract_version_copies_the_identity_fields() {
    let snap = snapshot(DataType::Badges, 7, T0, DataPayload::Badges(Vec::new()));
    let info = extract_version(&snap);
    assert_eq!(info.version, 7);
    assert_eq!(info.checksum, snap.checksum);
    assert_eq!(info.timestamp, snap.timestamp);
}

// ── VersionStore ────────────────────────────────────────────────

fn version_store() -> VersionStore {
    VersionStore::new(
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::starting_at(T0)),
        DeviceId::new(),
    )
}

#[test]
fn commit_advances_the_watermark_by_one() {
    let store = version_store();
    let user = UserId::new();
    let dt = DataType::Vocabulary;
    assert_eq!(store.watermark(&dt).unwrap(), 0);

    let first = store.commit(&dt, vocab_payload(&[("a", T0)]), user).unwrap();
    assert_eq!(first.version, 1);
    assert_eq!(first.parent_version, None);

    let second = store.commit(&dt, vocab_payload(&[("a", T0), ("b", T0)]), user).unwrap();
    assert_eq!(second.version, 2);
    assert_eq!(second.parent_version, Some(1));
    assert_eq!(store.watermark(&dt).unwrap(), 2);

    let current = store.current(&dt).unwrap().unwrap();
    assert_eq!(current.version, 2);
}

#[test]
fn history_ring_is_trimmed() {
    let store = version_store();
    let user = UserId::new();
    let dt = DataType::Records;
    for _ in 0..12 {
        store.commit(&dt, DataPayload::Records(Vec::new()), user).unwrap();
    }
    let history = store.history(&dt).unwrap();
    assert_eq!(history.len(), 8);
    // Oldest entries were dropped; the tail is the latest commit.
    assert_eq!(history.first().unwrap().version, 5);
    assert_eq!(history.last().unwrap().version, 12);
}

#[test]
fn overwrite_takes_the_remote_version_as_is() {
    let store = version_store();
    let remote = snapshot(DataType::Vocabulary, 41, T0, vocab_payload(&[("x", T0)]));
    store.overwrite(&remote).unwrap();

    assert_eq!(store.watermark(&DataType::Vocabulary).unwrap(), 41);
    let current = store.current(&DataType::Vocabulary).unwrap().unwrap();
    assert_eq!(current.version, 41);
}

#[test]
fn clear_removes_all_state_for_a_data_type() {
    let store = version_store();
    let user = UserId::new();
    store.commit(&DataType::Shows, DataPayload::Shows(Vec::new()), user).unwrap();
    store.clear(&DataType::Shows).unwrap();

    assert_eq!(store.watermark(&DataType::Shows).unwrap(), 0);
    assert!(store.current(&DataType::Shows).unwrap().is_none());
    assert!(store.history(&DataType::Shows).unwrap().is_empty());
}

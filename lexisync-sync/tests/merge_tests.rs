//! Tests for merge.rs — per-dataType merge semantics.

mod common;

use common::{vocab_item, vocab_payload};
use lexisync_sync::merge::{
    merge_experience, merge_generic, merge_keyed, merge_payloads, merge_progress, rekey, Keyed,
};
use lexisync_types::{DataPayload, ExperienceState, ProgressState, Timestamp};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashSet;

const T0: u64 = 1_700_000_000_000;

// ── merge_keyed ─────────────────────────────────────────────────

#[test]
fn disjoint_vocabularies_union_with_local_order_first() {
    // Device A added "apple", device B added "banana"; both survive.
    let local = vec![vocab_item("apple", T0)];
    let remote = vec![vocab_item("banana", T0 + 1)];

    let (merged, collisions) = merge_keyed(&local, &remote);
    let words: Vec<&str> = merged.iter().map(|i| i.identity_key()).collect();
    assert_eq!(words, vec!["apple", "banana"]);
    assert_eq!(collisions, 0);
}

#[test]
fn collision_takes_the_later_modified_side() {
    let mut newer = vocab_item("apple", T0 + 5_000);
    newer.definition = "a fruit, revised".to_string();
    let local = vec![vocab_item("apple", T0), vocab_item("pear", T0)];
    let remote = vec![newer.clone(), vocab_item("cherry", T0)];

    let (merged, collisions) = merge_keyed(&local, &remote);
    assert_eq!(collisions, 1);
    assert_eq!(merged[0], newer);
    let words: Vec<&str> = merged.iter().map(|i| i.identity_key()).collect();
    assert_eq!(words, vec!["apple", "pear", "cherry"]);
}

#[test]
fn collision_tie_keeps_local() {
    let mut local_item = vocab_item("apple", T0);
    local_item.definition = "local".to_string();
    let mut remote_item = vocab_item("apple", T0);
    remote_item.definition = "remote".to_string();

    let (merged, _) = merge_keyed(&[local_item.clone()], &[remote_item]);
    assert_eq!(merged, vec![local_item]);
}

#[test]
fn merge_is_monotonic_over_keys() {
    // No key from either side disappears.
    let local = vec![vocab_item("a", T0), vocab_item("b", T0)];
    let remote = vec![vocab_item("b", T0 + 1), vocab_item("c", T0)];

    let (merged, _) = merge_keyed(&local, &remote);
    let keys: HashSet<&str> = merged.iter().map(|i| i.identity_key()).collect();
    for key in ["a", "b", "c"] {
        assert!(keys.contains(key), "lost key {key}");
    }
    assert_eq!(merged.len(), 3);
}

// ── scalar merges ───────────────────────────────────────────────

#[test]
fn progress_counters_take_max_and_accuracy_averages() {
    let local = ProgressState {
        learning_days: 10,
        total_reviews: 500,
        mastered_words: 40,
        accuracy: 0.9,
        last_modified: Timestamp::from_millis(T0),
    };
    let remote = ProgressState {
        learning_days: 12,
        total_reviews: 450,
        mastered_words: 45,
        accuracy: 0.7,
        last_modified: Timestamp::from_millis(T0 + 1),
    };

    let merged = merge_progress(&local, &remote);
    assert_eq!(merged.learning_days, 12);
    assert_eq!(merged.total_reviews, 500);
    assert_eq!(merged.mastered_words, 45);
    assert!((merged.accuracy - 0.8).abs() < f64::EPSILON);
    assert_eq!(merged.last_modified, remote.last_modified);
}

#[test]
fn experience_takes_max_everywhere() {
    let local = ExperienceState {
        experience: 1_200,
        level: 5,
        streak: 3,
        last_modified: Timestamp::from_millis(T0),
    };
    let remote = ExperienceState {
        experience: 900,
        level: 6,
        streak: 9,
        last_modified: Timestamp::from_millis(T0),
    };

    let merged = merge_experience(&local, &remote);
    assert_eq!(merged.experience, 1_200);
    assert_eq!(merged.level, 6);
    assert_eq!(merged.streak, 9);
}

// ── generic merge ───────────────────────────────────────────────

#[test]
fn generic_merge_recurses_and_remote_wins_at_leaves() {
    let local = json!({
        "settings": { "theme": "dark", "font": "serif" },
        "local_only": 1,
    });
    let remote = json!({
        "settings": { "theme": "light" },
        "remote_only": 2,
    });

    let merged = merge_generic(&local, &remote);
    assert_eq!(
        merged,
        json!({
            "settings": { "theme": "light", "font": "serif" },
            "local_only": 1,
            "remote_only": 2,
        })
    );
}

#[test]
fn generic_merge_is_idempotent_against_remote() {
    let local = json!({ "a": 1, "b": { "c": 2 } });
    let remote = json!({ "a": 9, "b": { "c": 3, "d": 4 } });

    let once = merge_generic(&local, &remote);
    let twice = merge_generic(&once, &remote);
    assert_eq!(once, twice);
}

// ── merge_payloads ──────────────────────────────────────────────

#[test]
fn payload_merge_dispatches_by_shape() {
    let local = vocab_payload(&[("apple", T0)]);
    let remote = vocab_payload(&[("banana", T0)]);
    let outcome = merge_payloads(&local, &remote).unwrap();
    assert_eq!(outcome.payload.item_count(), 2);
    assert_eq!(outcome.merged_items, 0);
}

#[test]
fn shape_mismatch_yields_none() {
    let vocab = vocab_payload(&[("apple", T0)]);
    let progress = DataPayload::Progress(ProgressState::default());
    assert!(merge_payloads(&vocab, &progress).is_none());
}

// ── rekey ───────────────────────────────────────────────────────

#[test]
fn rekey_styles_and_collision_avoidance() {
    let mut taken: HashSet<String> = HashSet::new();
    taken.insert("apple (2)".to_string());
    assert_eq!(rekey("apple", true, &taken), "apple (3)");
    assert_eq!(rekey("rec-17", false, &HashSet::new()), "rec-17-2");
}

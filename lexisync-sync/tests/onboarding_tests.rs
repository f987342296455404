//! Tests for onboarding.rs — the new-device state machine.

mod common;

use common::{fixture, snapshot, vocab_payload};
use lexisync_storage::KeyValueStore;
use lexisync_sync::{DeviceRegistration, OnboardingStage, SyncError};
use lexisync_types::{DataPayload, DataType};
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;

const T0: u64 = 1_700_000_000_000;

// ── short circuits ──────────────────────────────────────────────

#[tokio::test]
async fn initialized_device_completes_without_network() {
    let fx = fixture().await;
    fx.store.set("device/initialized", "true").unwrap();

    let report = fx.context.begin_onboarding(fx.user_id).await.unwrap();
    assert!(!report.was_new_device);
    assert_eq!(fx.backend.network_calls(), 0);

    let progress = fx.context.onboarding_progress();
    assert_eq!(progress.borrow().stage, OnboardingStage::Completed);
}

#[tokio::test]
async fn remotely_known_device_restores_the_local_marker() {
    let fx = fixture().await;
    fx.backend.set_devices(vec![DeviceRegistration {
        device_id: fx.context.device_id(),
        name: "this device".to_string(),
        active: true,
        initialized: true,
    }]);

    let report = fx.context.begin_onboarding(fx.user_id).await.unwrap();
    assert!(!report.was_new_device);
    assert_eq!(fx.backend.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.backend.fetch_calls.load(Ordering::SeqCst), 0);
    assert_eq!(fx.store.get("device/initialized").unwrap().as_deref(), Some("true"));
}

// ── the full run ────────────────────────────────────────────────

#[tokio::test]
async fn new_device_pulls_overwrites_and_registers() {
    let fx = fixture().await;
    fx.backend.set_snapshots(vec![
        snapshot(DataType::Vocabulary, 7, T0, vocab_payload(&[("a", T0), ("b", T0)])),
        snapshot(
            DataType::Experience,
            3,
            T0,
            DataPayload::empty_for(&DataType::Experience),
        ),
    ]);

    let report = fx.context.begin_onboarding(fx.user_id).await.unwrap();
    assert!(report.was_new_device);
    assert_eq!(report.overwritten, vec![DataType::Vocabulary, DataType::Experience]);
    assert_eq!(report.item_count, 3);

    assert_eq!(fx.backend.register_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.backend.init_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.store.get("device/initialized").unwrap().as_deref(), Some("true"));

    // The pulled snapshots became the local truth, versions included.
    let versions = fx.context.versions();
    assert_eq!(versions.watermark(&DataType::Vocabulary).unwrap(), 7);
    let current = versions.current(&DataType::Vocabulary).unwrap().unwrap();
    assert_eq!(current.payload.item_count(), 2);
}

#[tokio::test]
async fn rerunning_after_completion_is_idempotent() {
    let fx = fixture().await;
    fx.backend.set_snapshots(vec![snapshot(
        DataType::Vocabulary,
        2,
        T0,
        vocab_payload(&[("a", T0)]),
    )]);

    fx.context.begin_onboarding(fx.user_id).await.unwrap();
    let calls_after_first = fx.backend.network_calls();

    let second = fx.context.begin_onboarding(fx.user_id).await.unwrap();
    assert!(!second.was_new_device);
    assert_eq!(fx.backend.network_calls(), calls_after_first);
}

#[tokio::test]
async fn existing_local_state_is_backed_up_before_overwrite() {
    let fx = fixture().await;
    let local = vocab_payload(&[("local", T0)]);
    fx.context
        .versions()
        .commit(&DataType::Vocabulary, local, fx.user_id)
        .unwrap();
    fx.backend.set_snapshots(vec![snapshot(
        DataType::Vocabulary,
        9,
        T0,
        vocab_payload(&[("remote", T0)]),
    )]);

    fx.context.begin_onboarding(fx.user_id).await.unwrap();

    let backup = fx.store.get("backup/vocabulary").unwrap();
    assert!(backup.is_some());
    assert!(backup.unwrap().contains("local"));
}

// ── failures ────────────────────────────────────────────────────

#[tokio::test]
async fn mismatched_payload_fails_the_whole_run() {
    let fx = fixture().await;
    let mut bad = snapshot(DataType::Vocabulary, 1, T0, vocab_payload(&[("a", T0)]));
    bad.payload = DataPayload::empty_for(&DataType::Progress);
    fx.backend.set_snapshots(vec![bad]);

    let err = fx.context.begin_onboarding(fx.user_id).await.unwrap_err();
    assert!(matches!(err, SyncError::DataIntegrity(_)));

    let progress = fx.context.onboarding_progress();
    assert_eq!(progress.borrow().stage, OnboardingStage::Failed);
    // Nothing was applied and the device stays uninitialized.
    assert!(fx.store.get("device/initialized").unwrap().is_none());
    assert!(fx
        .context
        .versions()
        .current(&DataType::Vocabulary)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn progress_moves_through_the_stages() {
    let fx = fixture().await;
    fx.backend.set_snapshots(Vec::new());
    let mut progress = fx.context.onboarding_progress();
    progress.borrow_and_update();

    fx.context.begin_onboarding(fx.user_id).await.unwrap();
    // The watch channel keeps the latest value.
    assert_eq!(progress.borrow().stage, OnboardingStage::Completed);
    assert_eq!(progress.borrow().percent, 100);
}

//! Tests for retry.rs — error classification and backoff schedules.

use lexisync_sync::{ErrorCategory, RetryClassifier, SyncError};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn classifier() -> RetryClassifier {
    RetryClassifier::new()
}

// ── classification ──────────────────────────────────────────────

#[test]
fn errors_map_to_their_categories() {
    let c = classifier();
    let cases = [
        (SyncError::Connectivity("reset".into()), ErrorCategory::Network),
        (SyncError::Protocol("502".into()), ErrorCategory::Network),
        (SyncError::DataIntegrity("bad checksum".into()), ErrorCategory::Data),
        (SyncError::Conflict("divergent".into()), ErrorCategory::Data),
        (SyncError::Timeout, ErrorCategory::System),
        (SyncError::ResourceExhausted("queue full".into()), ErrorCategory::System),
        (SyncError::Auth("expired".into()), ErrorCategory::User),
    ];
    for (error, expected) in cases {
        assert_eq!(c.classify(&error), expected, "for {error}");
    }
}

// ── retryability ────────────────────────────────────────────────

#[test]
fn network_errors_retry_only_while_connected() {
    let c = classifier();
    let error = SyncError::Connectivity("reset".into());
    assert!(c.is_retryable(&error, 1, true));
    assert!(!c.is_retryable(&error, 1, false));
    assert!(!c.is_retryable(&error, 6, true)); // past the 5-attempt ceiling
}

#[test]
fn critical_network_errors_are_not_retried() {
    let c = classifier();
    let error = SyncError::Protocol("critical: protocol version mismatch".into());
    assert!(!c.is_retryable(&error, 1, true));
}

#[test]
fn auth_errors_are_never_retried() {
    let c = classifier();
    let error = SyncError::Auth("expired".into());
    assert!(!c.is_retryable(&error, 1, true));
}

#[test]
fn data_errors_get_three_attempts() {
    let c = classifier();
    let error = SyncError::DataIntegrity("bad".into());
    assert!(c.is_retryable(&error, 3, true));
    assert!(!c.is_retryable(&error, 4, true));
}

// ── delays ──────────────────────────────────────────────────────

#[test]
fn network_backoff_doubles_with_jitter_and_cap() {
    let c = classifier();
    for _ in 0..20 {
        let first = c.delay(ErrorCategory::Network, 1);
        assert!(first >= Duration::from_millis(800), "{first:?}");
        assert!(first <= Duration::from_millis(1_200), "{first:?}");

        let third = c.delay(ErrorCategory::Network, 3);
        assert!(third >= Duration::from_millis(3_200), "{third:?}");
        assert!(third <= Duration::from_millis(4_800), "{third:?}");

        // Far past the cap: 30s ± jitter.
        let tenth = c.delay(ErrorCategory::Network, 10);
        assert!(tenth <= Duration::from_millis(36_000), "{tenth:?}");
        assert!(tenth >= Duration::from_millis(24_000), "{tenth:?}");
    }
}

#[test]
fn data_backoff_is_deterministic() {
    let c = classifier();
    assert_eq!(c.delay(ErrorCategory::Data, 1), Duration::from_secs(2));
    assert_eq!(c.delay(ErrorCategory::Data, 2), Duration::from_secs(3));
    assert_eq!(c.delay(ErrorCategory::Data, 3), Duration::from_millis(4_500));
    // Capped at 15s.
    assert_eq!(c.delay(ErrorCategory::Data, 20), Duration::from_secs(15));
}

#[test]
fn system_backoff_stops_growing_after_one_doubling() {
    let c = classifier();
    assert_eq!(c.delay(ErrorCategory::System, 1), Duration::from_secs(5));
    assert_eq!(c.delay(ErrorCategory::System, 2), Duration::from_secs(10));
    // Growth limit reached: further attempts stay at one doubling.
    assert_eq!(c.delay(ErrorCategory::System, 3), Duration::from_secs(10));
}

#[test]
fn user_delay_is_flat() {
    let c = classifier();
    assert_eq!(c.delay(ErrorCategory::User, 1), Duration::from_secs(1));
    assert_eq!(c.delay(ErrorCategory::User, 5), Duration::from_secs(1));
}

//! Tests for gate.rs — upload clearance decisions.

use lexisync_sync::{
    CellularGeneration, DiffConfig, DiffEngine, GateDecision, LinkInfo, NetworkMonitor,
    OfflineQueueLimits, Transport, UploadGate,
};
use lexisync_types::{DataType, Priority};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn gate_on(transport: Transport, link: LinkInfo) -> (UploadGate, Arc<NetworkMonitor>) {
    let monitor = Arc::new(NetworkMonitor::new(OfflineQueueLimits::default()));
    monitor.update_link(transport, link);
    let diff = Arc::new(DiffEngine::new(DiffConfig::default()));
    (UploadGate::new(Arc::clone(&monitor), diff), monitor)
}

fn wifi(strength: u8) -> LinkInfo {
    LinkInfo {
        signal_strength: Some(strength),
        generation: None,
    }
}

fn weak_cellular() -> LinkInfo {
    LinkInfo {
        signal_strength: None,
        generation: Some(CellularGeneration::Other),
    }
}

#[test]
fn disconnected_defers_everything() {
    let monitor = Arc::new(NetworkMonitor::new(OfflineQueueLimits::default()));
    let diff = Arc::new(DiffEngine::new(DiffConfig::default()));
    let gate = UploadGate::new(monitor, diff);

    let decision = gate.clearance(&DataType::Vocabulary, Priority::Critical, 10);
    assert!(!decision.is_allowed());
}

#[test]
fn strong_wifi_allows() {
    let (gate, _) = gate_on(Transport::Wifi, wifi(90));
    assert_eq!(
        gate.clearance(&DataType::Vocabulary, Priority::Normal, 1_000),
        GateDecision::Allow
    );
}

#[test]
fn compressible_link_allows_constrained() {
    // Weak Wi-Fi scores 40: compress territory.
    let (gate, _) = gate_on(Transport::Wifi, wifi(10));
    assert_eq!(
        gate.clearance(&DataType::Vocabulary, Priority::Normal, 1_000),
        GateDecision::AllowConstrained
    );
}

#[test]
fn poor_link_defers_normal_priority() {
    let (gate, _) = gate_on(Transport::Cellular, weak_cellular());
    let decision = gate.clearance(&DataType::Shows, Priority::Normal, 1_000);
    assert!(!decision.is_allowed());
}

#[test]
fn poor_link_lets_high_priority_through_when_small() {
    let (gate, _) = gate_on(Transport::Cellular, weak_cellular());
    assert_eq!(
        gate.clearance(&DataType::Experience, Priority::High, 1_000),
        GateDecision::AllowConstrained
    );
}

#[test]
fn slow_large_transfer_on_poor_link_is_deferred() {
    let (gate, _) = gate_on(Transport::Cellular, weak_cellular());
    // ~64 MiB at the nominal 1 MiB/s floor: over a minute.
    let decision = gate.clearance(&DataType::Vocabulary, Priority::High, 64 * 1024 * 1024);
    assert!(!decision.is_allowed());
}

#[test]
fn critical_priority_overrides_the_slow_link_limit() {
    let (gate, _) = gate_on(Transport::Cellular, weak_cellular());
    assert_eq!(
        gate.clearance(&DataType::Vocabulary, Priority::Critical, 64 * 1024 * 1024),
        GateDecision::AllowConstrained
    );
}

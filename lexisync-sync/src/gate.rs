//! Upload gate.
//!
//! Decides whether a dataType may transmit right now, consulting the
//! network monitor for conditions and the diff engine for a transfer-cost
//! estimate. High-priority work rides out conditions that park the rest.

use crate::diff::DiffEngine;
use crate::network::{NetworkAction, NetworkMonitor};
use lexisync_types::{DataType, Priority};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A transfer longer than this on a poor link gets deferred.
const SLOW_LINK_TRANSFER_LIMIT: Duration = Duration::from_secs(30);

/// Quality score below which large transfers are deferred.
const POOR_QUALITY: u8 = 40;

/// The gate's verdict for one dataType.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Transmit now.
    Allow,
    /// Transmit now, but the link is constrained; keep batches small.
    AllowConstrained,
    /// Not now; the reason is for logs and status surfaces.
    Defer(String),
}

impl GateDecision {
    /// True for both allow variants.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Defer(_))
    }
}

/// Gates transmissions on network conditions and transfer cost.
pub struct UploadGate {
    monitor: Arc<NetworkMonitor>,
    diff: Arc<DiffEngine>,
}

impl UploadGate {
    /// Creates a gate.
    pub fn new(monitor: Arc<NetworkMonitor>, diff: Arc<DiffEngine>) -> Self {
        Self { monitor, diff }
    }

    /// Decides whether `data_type` may transmit `pending_bytes` at
    /// `priority` under current conditions.
    pub fn clearance(
        &self,
        data_type: &DataType,
        priority: Priority,
        pending_bytes: usize,
    ) -> GateDecision {
        let state = self.monitor.state();
        if !state.connected || !state.reachable {
            return GateDecision::Defer("disconnected".to_string());
        }

        let decision = match state.recommended_action {
            NetworkAction::Abort => GateDecision::Defer("link unusable".to_string()),
            NetworkAction::Delay if priority < Priority::High => {
                GateDecision::Defer("poor link, waiting for better conditions".to_string())
            }
            NetworkAction::Delay | NetworkAction::Compress => {
                let estimate = self.diff.estimate_transfer_time(pending_bytes);
                if estimate > SLOW_LINK_TRANSFER_LIMIT
                    && state.quality_score < POOR_QUALITY
                    && priority < Priority::Critical
                {
                    GateDecision::Defer(format!(
                        "transfer estimate {}s exceeds slow-link limit",
                        estimate.as_secs()
                    ))
                } else {
                    GateDecision::AllowConstrained
                }
            }
            NetworkAction::Proceed => GateDecision::Allow,
        };

        if let GateDecision::Defer(reason) = &decision {
            debug!(data_type = %data_type, %reason, "upload gated");
        }
        decision
    }
}

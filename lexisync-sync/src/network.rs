//! Network monitoring and the offline queue.
//!
//! The monitor derives a quality score and a recommended action from the
//! transport the host platform reports, and publishes transitions over a
//! watch channel so the scheduler can suspend and resume automatic
//! flushing. It also owns the offline queue: work that failed to transmit
//! while disconnected, drained highest-priority-first on reconnection.

use lexisync_types::{DataPayload, DataType, Operation, Priority, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// The transport the device is currently on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Wifi,
    Cellular,
    None,
    #[default]
    Unknown,
}

/// Cellular generation, for quality tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellularGeneration {
    FiveG,
    FourG,
    ThreeG,
    Other,
}

/// Raw link details reported by the host platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkInfo {
    /// Wi-Fi signal strength in percent, when known.
    pub signal_strength: Option<u8>,
    /// Cellular generation, when on cellular.
    pub generation: Option<CellularGeneration>,
}

/// What the upload gate should do given current conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkAction {
    Proceed,
    Compress,
    Delay,
    Abort,
}

/// Process-wide network state. Lifecycle: app runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    pub connected: bool,
    pub reachable: bool,
    pub transport: Transport,
    /// Quality score in [0, 100].
    pub quality_score: u8,
    pub recommended_action: NetworkAction,
}

impl Default for NetworkState {
    fn default() -> Self {
        Self {
            connected: false,
            reachable: false,
            transport: Transport::Unknown,
            quality_score: 0,
            recommended_action: NetworkAction::Abort,
        }
    }
}

/// Wi-Fi strength bands and cellular generation tiers.
fn quality_score(transport: Transport, link: LinkInfo) -> u8 {
    match transport {
        Transport::Wifi => match link.signal_strength {
            Some(s) if s >= 75 => 95,
            Some(s) if s >= 50 => 80,
            Some(s) if s >= 25 => 60,
            Some(_) => 40,
            None => 70,
        },
        Transport::Cellular => match link.generation {
            Some(CellularGeneration::FiveG) => 85,
            Some(CellularGeneration::FourG) => 70,
            Some(CellularGeneration::ThreeG) => 45,
            Some(CellularGeneration::Other) => 25,
            None => 50,
        },
        Transport::None => 0,
        Transport::Unknown => 50,
    }
}

fn action_for(connected: bool, score: u8) -> NetworkAction {
    if !connected || score == 0 {
        NetworkAction::Abort
    } else if score >= 70 {
        NetworkAction::Proceed
    } else if score >= 40 {
        NetworkAction::Compress
    } else {
        NetworkAction::Delay
    }
}

/// An operation parked while the device was disconnected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineQueueItem {
    pub operation: Operation,
    pub data_type: DataType,
    pub payload: DataPayload,
    pub priority: Priority,
    pub retry_count: u32,
    pub max_retries: u32,
    pub enqueued_at: Timestamp,
}

/// Priority-then-FIFO queue of offline work, with byte/object ceilings.
#[derive(Debug, Default)]
struct OfflineQueue {
    items: Vec<OfflineQueueItem>,
    bytes: usize,
}

/// Ceilings for the offline queue.
#[derive(Debug, Clone, Copy)]
pub struct OfflineQueueLimits {
    pub max_items: usize,
    pub max_bytes: usize,
    /// Items drained per reconnection run.
    pub drain_cap: usize,
}

impl Default for OfflineQueueLimits {
    fn default() -> Self {
        Self {
            max_items: 1_000,
            max_bytes: 4 * 1024 * 1024,
            drain_cap: 100,
        }
    }
}

/// Tracks connectivity and owns the offline queue.
pub struct NetworkMonitor {
    state_tx: watch::Sender<NetworkState>,
    offline: Mutex<OfflineQueue>,
    limits: OfflineQueueLimits,
}

impl NetworkMonitor {
    /// Creates a monitor starting disconnected.
    pub fn new(limits: OfflineQueueLimits) -> Self {
        let (state_tx, _) = watch::channel(NetworkState::default());
        Self {
            state_tx,
            offline: Mutex::new(OfflineQueue::default()),
            limits,
        }
    }

    /// Current network state.
    pub fn state(&self) -> NetworkState {
        *self.state_tx.borrow()
    }

    /// True when connected and reachable.
    pub fn is_online(&self) -> bool {
        let s = self.state();
        s.connected && s.reachable
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.state_tx.subscribe()
    }

    /// Reports a link change from the host platform.
    pub fn update_link(&self, transport: Transport, link: LinkInfo) {
        let connected = !matches!(transport, Transport::None);
        let score = quality_score(transport, link);
        let next = NetworkState {
            connected,
            reachable: connected,
            transport,
            quality_score: score,
            recommended_action: action_for(connected, score),
        };
        let previous = self.state();
        if next != previous {
            info!(
                transport = ?transport,
                quality = score,
                action = ?next.recommended_action,
                "network state changed"
            );
            // send_replace never fails even with no receivers.
            self.state_tx.send_replace(next);
        }
    }

    /// Marks the device fully offline.
    pub fn go_offline(&self) {
        self.update_link(Transport::None, LinkInfo::default());
    }

    // ── Offline queue ────────────────────────────────────────────

    /// Parks an operation that could not transmit while disconnected.
    /// Ceilings are enforced with oldest-first eviction.
    pub async fn park(&self, item: OfflineQueueItem) {
        let mut queue = self.offline.lock().await;
        queue.bytes += item.payload.approx_size();
        queue.items.push(item);

        while queue.items.len() > self.limits.max_items
            || (queue.bytes > self.limits.max_bytes && queue.items.len() > 1)
        {
            let evicted = queue.items.remove(0);
            queue.bytes = queue.bytes.saturating_sub(evicted.payload.approx_size());
            warn!(
                data_type = %evicted.data_type,
                "offline queue ceiling reached, evicted oldest item"
            );
        }
    }

    /// Number of parked items.
    pub async fn parked_count(&self) -> usize {
        self.offline.lock().await.items.len()
    }

    /// Drains parked work for a reconnection run: highest priority first,
    /// FIFO within a priority, capped per run.
    pub async fn drain_for_reconnect(&self) -> Vec<OfflineQueueItem> {
        let mut queue = self.offline.lock().await;
        // Stable sort keeps FIFO order within equal priorities.
        queue.items.sort_by(|a, b| b.priority.cmp(&a.priority));
        let take = self.limits.drain_cap.min(queue.items.len());
        let drained: Vec<OfflineQueueItem> = queue.items.drain(..take).collect();
        for item in &drained {
            queue.bytes = queue.bytes.saturating_sub(item.payload.approx_size());
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "drained offline queue");
        }
        drained
    }

    /// Returns a failed item to the queue, or drops it once retries are
    /// exhausted. Dropped items are logged, never retried forever.
    pub async fn requeue_failed(&self, mut item: OfflineQueueItem) {
        item.retry_count += 1;
        if item.retry_count >= item.max_retries {
            warn!(
                data_type = %item.data_type,
                retries = item.retry_count,
                "offline item exhausted retries, dropping"
            );
            return;
        }
        self.park(item).await;
    }
}

//! Sync scheduler — the central orchestrator owning the mutation queue.
//!
//! Mutations enter through `enqueue`, batch up by dataType, pass the
//! upload gate and transmit. Exactly one flush runs at a time, modeled as
//! an explicit state machine; a flush request arriving mid-flush coalesces
//! into one follow-up run. Failed items go back to the queue head — data
//! is never silently dropped.

use crate::clock::Clock;
use crate::error::{SyncError, SyncResult};
use crate::gate::{GateDecision, UploadGate};
use crate::network::{NetworkMonitor, OfflineQueueItem, Transport};
use crate::resolver::{ConflictRecord, ConflictResolver, ResolutionPolicy};
use crate::retry::RetryClassifier;
use crate::transport::{BatchPushRequest, CredentialProvider, SyncBackend};
use crate::version::VersionStore;
use lexisync_storage::KeyValueStore;
use lexisync_types::{
    DataType, DeviceId, MutationId, MutationRecord, Timestamp, UserId,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tracing::{debug, info, warn};

const QUEUE_KEY: &str = "sync/queue";

/// What the app is doing, for interval adaptation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activity {
    #[default]
    Foreground,
    Background,
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum items drained per flush.
    pub batch_size: usize,
    /// Overall retry ceiling before an item is parked as exhausted.
    pub max_retry_attempts: u32,
    /// Wall-clock bound per batch transmit.
    pub flush_timeout: Duration,
    /// Automatic flush interval: active on Wi-Fi.
    pub short_interval: Duration,
    /// Active on cellular.
    pub medium_interval: Duration,
    /// Everything else.
    pub idle_interval: Duration,
    /// Queue object ceiling; oldest evicted beyond it.
    pub max_queue_items: usize,
    /// Queue byte ceiling.
    pub max_queue_bytes: usize,
    /// Retries granted to items parked in the offline queue.
    pub offline_max_retries: u32,
    /// Policy for reconciling version mismatches.
    pub policy: ResolutionPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_retry_attempts: 5,
            flush_timeout: Duration::from_secs(30),
            short_interval: Duration::from_secs(30),
            medium_interval: Duration::from_secs(120),
            idle_interval: Duration::from_secs(600),
            max_queue_items: 2_000,
            max_queue_bytes: 8 * 1024 * 1024,
            offline_max_retries: 5,
            policy: ResolutionPolicy::Smart,
        }
    }
}

/// Result of one flush pass.
#[derive(Debug, Clone, Default)]
pub struct FlushReport {
    pub success: bool,
    pub synced_count: usize,
    pub conflicts: Vec<ConflictRecord>,
    pub errors: Vec<String>,
    /// True when the batch stayed queued for offline delivery.
    pub queued_offline: bool,
    /// True when this request merged into a flush already in progress.
    pub coalesced: bool,
}

impl FlushReport {
    fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    fn coalesced() -> Self {
        Self {
            success: true,
            coalesced: true,
            ..Default::default()
        }
    }

    fn queued_offline() -> Self {
        Self {
            success: true,
            queued_offline: true,
            ..Default::default()
        }
    }
}

/// Snapshot of the scheduler's externally visible state.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub queue_length: usize,
    pub is_syncing: bool,
    pub last_sync_time: Option<Timestamp>,
    pub network_transport: Transport,
    /// Items currently in a backoff window.
    pub retry_count: usize,
    /// Items awaiting transmission, including offline-parked work.
    pub pending_operations: usize,
    /// Items that exhausted retries and wait for conditions to change.
    pub exhausted_count: usize,
    pub reauth_required: bool,
}

/// Exactly-one-flush-at-a-time guard with coalescing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushState {
    Idle,
    Running { rerun: bool },
}

/// Per-mutation retry bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
struct RetryEntry {
    attempts: u32,
    next_attempt_at: Timestamp,
    exhausted: bool,
}

/// The central orchestrator.
pub struct SyncScheduler {
    config: SchedulerConfig,
    store: Arc<dyn KeyValueStore>,
    backend: Arc<dyn SyncBackend>,
    credentials: Arc<dyn CredentialProvider>,
    monitor: Arc<NetworkMonitor>,
    versions: Arc<VersionStore>,
    resolver: Arc<ConflictResolver>,
    gate: UploadGate,
    classifier: RetryClassifier,
    clock: Arc<dyn Clock>,
    device_id: DeviceId,

    user: Mutex<Option<UserId>>,
    queue: Mutex<VecDeque<MutationRecord>>,
    flush_state: Mutex<FlushState>,
    retries: Mutex<HashMap<MutationId, RetryEntry>>,
    last_sync: Mutex<Option<Timestamp>>,
    activity: Mutex<Activity>,
    interval: Mutex<Duration>,
    timer_paused: AtomicBool,
    flush_requested: Notify,
    reauth_tx: watch::Sender<bool>,
}

impl SyncScheduler {
    /// Creates a scheduler, restoring any queue persisted by a previous
    /// run.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn KeyValueStore>,
        backend: Arc<dyn SyncBackend>,
        credentials: Arc<dyn CredentialProvider>,
        monitor: Arc<NetworkMonitor>,
        versions: Arc<VersionStore>,
        resolver: Arc<ConflictResolver>,
        gate: UploadGate,
        clock: Arc<dyn Clock>,
        device_id: DeviceId,
    ) -> SyncResult<Self> {
        let queue = Self::load_queue(store.as_ref())?;
        let (reauth_tx, _) = watch::channel(false);
        let interval = config.idle_interval;
        Ok(Self {
            config,
            store,
            backend,
            credentials,
            monitor,
            versions,
            resolver,
            gate,
            classifier: RetryClassifier::new(),
            clock,
            device_id,
            user: Mutex::new(None),
            queue: Mutex::new(queue),
            flush_state: Mutex::new(FlushState::Idle),
            retries: Mutex::new(HashMap::new()),
            last_sync: Mutex::new(None),
            activity: Mutex::new(Activity::Foreground),
            interval: Mutex::new(interval),
            timer_paused: AtomicBool::new(false),
            flush_requested: Notify::new(),
            reauth_tx,
        })
    }

    fn load_queue(store: &dyn KeyValueStore) -> SyncResult<VecDeque<MutationRecord>> {
        match store.get(QUEUE_KEY)? {
            Some(json) => {
                let items: Vec<MutationRecord> = serde_json::from_str(&json)?;
                info!(count = items.len(), "restored persisted mutation queue");
                Ok(items.into())
            }
            None => Ok(VecDeque::new()),
        }
    }

    async fn persist_queue(&self, queue: &VecDeque<MutationRecord>) {
        let items: Vec<&MutationRecord> = queue.iter().collect();
        match serde_json::to_string(&items) {
            Ok(json) => {
                if let Err(e) = self.store.set(QUEUE_KEY, &json) {
                    warn!("failed to persist mutation queue: {e}");
                }
            }
            Err(e) => warn!("failed to serialize mutation queue: {e}"),
        }
    }

    // ── Session ──────────────────────────────────────────────────

    /// Sets the authenticated user. `None` returns to guest mode, where
    /// enqueue is a silent no-op.
    pub async fn set_user(&self, user: Option<UserId>) {
        *self.user.lock().await = user;
    }

    /// Signals `true` when the backend rejected the credential and the
    /// caller must reauthenticate.
    pub fn reauth_signal(&self) -> watch::Receiver<bool> {
        self.reauth_tx.subscribe()
    }

    /// Stores a fresh credential was obtained; clears the reauth flag.
    pub fn reauthenticated(&self) {
        self.reauth_tx.send_replace(false);
    }

    // ── Enqueue ──────────────────────────────────────────────────

    /// Accepts a mutation. For a guest user this is a silent no-op: the
    /// data stays local-only.
    pub async fn enqueue(&self, mutation: MutationRecord) {
        if self.user.lock().await.is_none() {
            debug!(data_type = %mutation.data_type, "guest session, mutation stays local");
            return;
        }

        let important = mutation.data_type.is_important();
        {
            let mut queue = self.queue.lock().await;
            queue.push_back(mutation);
            self.enforce_ceilings(&mut queue);
            self.persist_queue(&queue).await;
        }

        if important && self.monitor.is_online() {
            self.flush_requested.notify_one();
        }
    }

    /// Oldest-first eviction against the byte/object ceilings.
    fn enforce_ceilings(&self, queue: &mut VecDeque<MutationRecord>) {
        while queue.len() > self.config.max_queue_items {
            if let Some(evicted) = queue.pop_front() {
                warn!(
                    data_type = %evicted.data_type,
                    "queue item ceiling reached, evicted oldest mutation"
                );
            }
        }
        let mut bytes: usize = queue.iter().map(MutationRecord::approx_size).sum();
        while bytes > self.config.max_queue_bytes && queue.len() > 1 {
            if let Some(evicted) = queue.pop_front() {
                bytes = bytes.saturating_sub(evicted.approx_size());
                warn!(
                    data_type = %evicted.data_type,
                    "queue byte ceiling reached, evicted oldest mutation"
                );
            }
        }
    }

    // ── Status ───────────────────────────────────────────────────

    /// Externally visible state.
    pub async fn status(&self) -> SchedulerStatus {
        let queue_length = self.queue.lock().await.len();
        let is_syncing = *self.flush_state.lock().await != FlushState::Idle;
        let retries = self.retries.lock().await;
        let now = self.clock.now();
        let retry_count = retries
            .values()
            .filter(|r| !r.exhausted && r.attempts > 0 && r.next_attempt_at > now)
            .count();
        let exhausted_count = retries.values().filter(|r| r.exhausted).count();
        drop(retries);

        SchedulerStatus {
            queue_length,
            is_syncing,
            last_sync_time: *self.last_sync.lock().await,
            network_transport: self.monitor.state().transport,
            retry_count,
            pending_operations: queue_length + self.monitor.parked_count().await,
            exhausted_count,
            reauth_required: *self.reauth_tx.borrow(),
        }
    }

    // ── Flush ────────────────────────────────────────────────────

    /// Runs a flush, or coalesces into the one already running.
    pub async fn flush(&self) -> FlushReport {
        {
            let mut state = self.flush_state.lock().await;
            match *state {
                FlushState::Running { .. } => {
                    *state = FlushState::Running { rerun: true };
                    return FlushReport::coalesced();
                }
                FlushState::Idle => *state = FlushState::Running { rerun: false },
            }
        }

        let report = loop {
            let report = self.flush_once().await;
            let mut state = self.flush_state.lock().await;
            if *state == (FlushState::Running { rerun: true }) {
                *state = FlushState::Running { rerun: false };
                drop(state);
                continue;
            }
            *state = FlushState::Idle;
            break report;
        };
        report
    }

    async fn flush_once(&self) -> FlushReport {
        if self.queue.lock().await.is_empty() {
            return FlushReport::ok();
        }

        if self.credentials.token().is_none() {
            // Data stays queued; the caller must reauthenticate first.
            return FlushReport {
                success: false,
                errors: vec!["reauthentication required".to_string()],
                ..Default::default()
            };
        }

        // No connectivity is not an error: the batch stays queued for
        // offline delivery and no network call is made.
        if !self.monitor.is_online() {
            return FlushReport::queued_offline();
        }

        let Some(user_id) = *self.user.lock().await else {
            return FlushReport::ok();
        };

        let groups = self.drain_batch().await;
        if groups.is_empty() {
            return FlushReport::ok();
        }

        let mut report = FlushReport::ok();
        let mut any_synced = false;

        for (data_type, items) in groups {
            let outcome = self
                .transmit_group(&data_type, items, user_id, &mut report)
                .await;
            match outcome {
                GroupOutcome::Synced => any_synced = true,
                GroupOutcome::AuthFailed => break,
                GroupOutcome::Requeued => {}
            }
            // Keep enqueue/status responsive between groups.
            tokio::task::yield_now().await;
        }

        {
            let queue = self.queue.lock().await;
            self.persist_queue(&queue).await;
        }
        if any_synced {
            *self.last_sync.lock().await = Some(self.clock.now());
        }
        report
    }

    /// Takes up to `batch_size` oldest eligible items, grouped by dataType
    /// in first-seen order. Items in a backoff window or exhausted stay in
    /// the queue untouched.
    async fn drain_batch(&self) -> Vec<(DataType, Vec<MutationRecord>)> {
        let now = self.clock.now();
        let retries = self.retries.lock().await;
        let mut queue = self.queue.lock().await;

        let mut taken = Vec::new();
        let mut kept = VecDeque::new();
        while let Some(item) = queue.pop_front() {
            let eligible = taken.len() < self.config.batch_size
                && retries
                    .get(&item.id)
                    .map(|r| !r.exhausted && r.next_attempt_at <= now)
                    .unwrap_or(true);
            if eligible {
                taken.push(item);
            } else {
                kept.push_back(item);
            }
        }
        *queue = kept;
        drop(queue);
        drop(retries);

        let mut groups: Vec<(DataType, Vec<MutationRecord>)> = Vec::new();
        for item in taken {
            match groups.iter_mut().find(|(dt, _)| *dt == item.data_type) {
                Some((_, items)) => items.push(item),
                None => groups.push((item.data_type.clone(), vec![item])),
            }
        }
        groups
    }

    async fn transmit_group(
        &self,
        data_type: &DataType,
        items: Vec<MutationRecord>,
        user_id: UserId,
        report: &mut FlushReport,
    ) -> GroupOutcome {
        let highest_priority = items.iter().map(|m| m.priority).max().unwrap_or_default();
        let pending_bytes: usize = items.iter().map(MutationRecord::approx_size).sum();

        match self
            .gate
            .clearance(data_type, highest_priority, pending_bytes)
        {
            GateDecision::Allow | GateDecision::AllowConstrained => {}
            GateDecision::Defer(reason) => {
                debug!(data_type = %data_type, %reason, "group deferred by upload gate");
                self.requeue_front(items).await;
                return GroupOutcome::Requeued;
            }
        }

        let base_version = match self.versions.watermark(data_type) {
            Ok(v) => v,
            Err(e) => {
                report.errors.push(format!("{data_type}: {e}"));
                self.requeue_front(items).await;
                return GroupOutcome::Requeued;
            }
        };

        let request = BatchPushRequest {
            user_id,
            device_id: self.device_id,
            data_type: data_type.to_string(),
            mutations: items.clone(),
            base_version,
        };

        let result = tokio::time::timeout(
            self.config.flush_timeout,
            self.backend.push_batch(&request),
        )
        .await
        .unwrap_or(Err(SyncError::Timeout));

        match result {
            Ok(response) => {
                self.handle_acceptance(data_type, items, user_id, base_version, response, report)
                    .await
            }
            Err(e) if e.is_auth() => {
                warn!("backend rejected credential, raising reauth signal");
                self.credentials.clear();
                self.reauth_tx.send_replace(true);
                self.requeue_front(items).await;
                report.success = false;
                report.errors.push(e.to_string());
                GroupOutcome::AuthFailed
            }
            Err(e) => {
                self.handle_transmit_failure(data_type, items, e, report)
                    .await;
                GroupOutcome::Requeued
            }
        }
    }

    async fn handle_acceptance(
        &self,
        data_type: &DataType,
        items: Vec<MutationRecord>,
        user_id: UserId,
        base_version: u64,
        response: crate::transport::BatchPushResponse,
        report: &mut FlushReport,
    ) -> GroupOutcome {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for item in items {
            let verdict = response
                .items
                .iter()
                .find(|s| s.mutation_id == item.id);
            match verdict {
                Some(status) if status.accepted => accepted.push(item),
                Some(status) => {
                    report.errors.push(format!(
                        "{}: rejected: {}",
                        data_type,
                        status.reason.clone().unwrap_or_default()
                    ));
                    rejected.push(item);
                }
                None => {
                    // Items the server did not acknowledge stay queued.
                    rejected.push(item);
                }
            }
        }

        let mut retries = self.retries.lock().await;
        for item in &accepted {
            retries.remove(&item.id);
        }
        drop(retries);

        if !rejected.is_empty() {
            // Rejections back off like any other failure; a permanently
            // rejected item must not retransmit on every flush.
            let error = SyncError::DataIntegrity("rejected by server".to_string());
            self.schedule_retry(data_type, rejected, &error).await;
        }

        let Some(latest) = accepted.last() else {
            return GroupOutcome::Requeued;
        };
        report.synced_count += accepted.len();

        // Commit the accepted state. A server version beyond our next
        // step means another device advanced first: pull, reconcile,
        // then commit the reconciled payload.
        let latest_payload = latest.payload.clone();

        let commit_result = if response.server_version <= base_version + 1 {
            self.versions
                .commit(data_type, latest_payload, user_id)
                .map(|_| ())
        } else {
            self.reconcile_divergence(data_type, latest_payload, user_id, report)
                .await
        };

        if let Err(e) = commit_result {
            report.errors.push(format!("{data_type}: commit: {e}"));
        }
        GroupOutcome::Synced
    }

    async fn reconcile_divergence(
        &self,
        data_type: &DataType,
        latest_payload: lexisync_types::DataPayload,
        user_id: UserId,
        report: &mut FlushReport,
    ) -> SyncResult<()> {
        info!(data_type = %data_type, "server version ahead, reconciling");
        let remote_set = self.backend.fetch_snapshot(&user_id).await?;
        let remote = remote_set
            .snapshots
            .into_iter()
            .find(|s| &s.data_type == data_type);

        // The pending local state, expressed as an uncommitted snapshot.
        let local = self
            .versions
            .current(data_type)?
            .map(|mut s| {
                s.payload = latest_payload.clone();
                s.timestamp = self.clock.now();
                s
            })
            .unwrap_or_else(|| {
                lexisync_types::VersionedSnapshot::new(
                    data_type.clone(),
                    0,
                    String::new(),
                    latest_payload.clone(),
                    self.device_id,
                    user_id,
                )
                .with_timestamp(self.clock.now())
            });

        report.conflicts.extend(self.resolver.detect(
            Some(&local),
            remote.as_ref(),
            self.config.policy,
        ));

        let outcome = self.resolver.resolve_pair(
            data_type,
            Some(&local),
            remote.as_ref(),
            self.config.policy,
        )?;

        match outcome.resolved.get(data_type) {
            Some(payload) => {
                self.versions.commit(data_type, payload.clone(), user_id)?;
                Ok(())
            }
            None => {
                // Manual policy: the conflict waits for a decision; the
                // local payload stays uncommitted.
                Err(SyncError::Conflict(format!(
                    "{data_type}: awaiting manual resolution"
                )))
            }
        }
    }

    async fn handle_transmit_failure(
        &self,
        data_type: &DataType,
        items: Vec<MutationRecord>,
        error: SyncError,
        report: &mut FlushReport,
    ) {
        report.errors.push(format!("{data_type}: {error}"));

        // A connectivity failure while effectively offline parks the
        // work in the offline queue for the reconnection drain.
        if matches!(error, SyncError::Connectivity(_)) && !self.monitor.is_online() {
            for item in items {
                self.monitor
                    .park(OfflineQueueItem {
                        operation: item.operation,
                        data_type: item.data_type.clone(),
                        payload: item.payload.clone(),
                        priority: item.priority,
                        retry_count: 0,
                        max_retries: self.config.offline_max_retries,
                        enqueued_at: item.timestamp,
                    })
                    .await;
            }
            return;
        }

        self.schedule_retry(data_type, items, &error).await;
    }

    /// Records a failed attempt for each item, schedules its backoff
    /// window (or marks it exhausted), and returns it to the queue head.
    async fn schedule_retry(
        &self,
        data_type: &DataType,
        items: Vec<MutationRecord>,
        error: &SyncError,
    ) {
        let category = self.classifier.classify(error);
        let connected = self.monitor.is_online();
        let now = self.clock.now();
        let mut retries = self.retries.lock().await;
        for item in &items {
            let entry = retries.entry(item.id).or_default();
            entry.attempts += 1;
            let retryable = entry.attempts <= self.config.max_retry_attempts
                && self
                    .classifier
                    .is_retryable(error, entry.attempts, connected);
            if retryable {
                let delay = self.classifier.delay(category, entry.attempts);
                entry.next_attempt_at = now.saturating_add(delay);
                debug!(
                    data_type = %data_type,
                    attempt = entry.attempts,
                    delay_ms = delay.as_millis() as u64,
                    "scheduled retry"
                );
            } else {
                // The item stays queued and is surfaced via status();
                // it is never silently discarded.
                entry.exhausted = true;
                warn!(data_type = %data_type, "mutation exhausted retries, parked in queue");
            }
        }
        drop(retries);

        self.requeue_front(items).await;
    }

    /// Re-inserts items at the queue head, order preserved.
    async fn requeue_front(&self, items: Vec<MutationRecord>) {
        let mut queue = self.queue.lock().await;
        for item in items.into_iter().rev() {
            queue.push_front(item);
        }
    }

    // ── Adaptive interval & driver ───────────────────────────────

    /// Reports an app activity change; the flush interval adapts.
    pub async fn set_activity(&self, activity: Activity) {
        *self.activity.lock().await = activity;
        self.recompute_interval().await;
    }

    /// Recomputes the automatic-flush interval from activity × transport.
    pub async fn recompute_interval(&self) {
        let activity = *self.activity.lock().await;
        let transport = self.monitor.state().transport;
        let next = match (activity, transport) {
            (Activity::Foreground, Transport::Wifi) => self.config.short_interval,
            (Activity::Foreground, Transport::Cellular) => self.config.medium_interval,
            _ => self.config.idle_interval,
        };
        let mut interval = self.interval.lock().await;
        if *interval != next {
            debug!(interval_secs = next.as_secs(), "flush interval adapted");
            *interval = next;
            // Wake the driver so the new interval takes effect now.
            self.flush_requested.notify_one();
        }
    }

    /// Current automatic-flush interval.
    pub async fn current_interval(&self) -> Duration {
        *self.interval.lock().await
    }

    /// Periodic housekeeping: reclaims resolved conflicts and retry
    /// entries whose mutations already left the queue.
    pub async fn housekeeping(&self) {
        self.resolver.prune_resolved();
        let queue = self.queue.lock().await;
        let live: std::collections::HashSet<MutationId> = queue.iter().map(|m| m.id).collect();
        drop(queue);
        let mut retries = self.retries.lock().await;
        retries.retain(|id, _| live.contains(id));
    }

    /// Drains the offline queue back into the mutation queue after a
    /// reconnect, then requests a flush.
    pub async fn absorb_offline_queue(&self) {
        let Some(user_id) = *self.user.lock().await else {
            return;
        };
        let drained = self.monitor.drain_for_reconnect().await;
        if drained.is_empty() {
            return;
        }
        // The drain is already priority-then-FIFO; re-inserting at the
        // head keeps that order ahead of newer work.
        let restored: Vec<MutationRecord> = drained
            .into_iter()
            .map(|item| MutationRecord {
                id: MutationId::new(),
                data_type: item.data_type,
                operation: item.operation,
                payload: item.payload,
                timestamp: item.enqueued_at,
                user_id,
                priority: item.priority,
            })
            .collect();
        self.requeue_front(restored).await;
        self.flush_requested.notify_one();
    }

    /// Runs the periodic driver: adaptive-interval flushes, immediate
    /// flush requests, and reconnect handling. Returns when the scheduler
    /// is dropped by every other holder.
    pub async fn drive(self: Arc<Self>) {
        let mut network = self.monitor.subscribe();
        let mut was_online = self.monitor.is_online();
        loop {
            let interval = *self.interval.lock().await;
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if !self.timer_paused.load(Ordering::SeqCst) && self.monitor.is_online() {
                        let _ = self.flush().await;
                        self.housekeeping().await;
                    }
                }
                _ = self.flush_requested.notified() => {
                    if self.monitor.is_online() {
                        let _ = self.flush().await;
                    }
                }
                changed = network.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = self.monitor.is_online();
                    self.recompute_interval().await;
                    if online && !was_online {
                        info!("reconnected, resuming automatic flush");
                        self.timer_paused.store(false, Ordering::SeqCst);
                        self.absorb_offline_queue().await;
                        let _ = self.flush().await;
                    } else if !online && was_online {
                        info!("disconnected, suspending automatic flush");
                        self.timer_paused.store(true, Ordering::SeqCst);
                    }
                    was_online = online;
                }
            }
        }
    }
}

enum GroupOutcome {
    Synced,
    Requeued,
    AuthFailed,
}

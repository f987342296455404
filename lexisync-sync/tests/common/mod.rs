//! Shared test fixtures: a recording backend and context builders.

#![allow(dead_code)]

use async_trait::async_trait;
use lexisync_storage::MemoryStore;
use lexisync_sync::{
    BatchItemStatus, BatchPushRequest, BatchPushResponse, DeviceRegistration, LinkInfo,
    ManualClock, RemoteSnapshotSet, SchedulerConfig, StaticCredentials, SyncBackend, SyncContext,
    SyncContextBuilder, SyncError, SyncResult, Transport,
};
use lexisync_types::{
    DataPayload, DataType, DeviceId, Timestamp, UserId, VersionedSnapshot, VocabularyItem,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A backend that records every call and replays scripted responses.
/// Unscripted pushes accept everything and advance the server version by
/// one from the request's base.
#[derive(Default)]
pub struct MockBackend {
    pub pushes: Mutex<Vec<BatchPushRequest>>,
    push_script: Mutex<VecDeque<SyncResult<BatchPushResponse>>>,
    pub devices: Mutex<Vec<DeviceRegistration>>,
    pub snapshots: Mutex<Vec<VersionedSnapshot>>,
    pub fetch_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub init_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for the next unconsumed push.
    pub fn script_push(&self, result: SyncResult<BatchPushResponse>) {
        self.push_script.lock().unwrap().push_back(result);
    }

    pub fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }

    pub fn set_snapshots(&self, snapshots: Vec<VersionedSnapshot>) {
        *self.snapshots.lock().unwrap() = snapshots;
    }

    pub fn set_devices(&self, devices: Vec<DeviceRegistration>) {
        *self.devices.lock().unwrap() = devices;
    }

    pub fn network_calls(&self) -> usize {
        self.push_count()
            + self.fetch_calls.load(Ordering::SeqCst)
            + self.list_calls.load(Ordering::SeqCst)
            + self.register_calls.load(Ordering::SeqCst)
            + self.init_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncBackend for MockBackend {
    async fn push_batch(&self, request: &BatchPushRequest) -> SyncResult<BatchPushResponse> {
        self.pushes.lock().unwrap().push(request.clone());
        if let Some(scripted) = self.push_script.lock().unwrap().pop_front() {
            return scripted;
        }
        Ok(BatchPushResponse {
            items: request
                .mutations
                .iter()
                .map(|m| BatchItemStatus {
                    mutation_id: m.id,
                    accepted: true,
                    reason: None,
                })
                .collect(),
            server_version: request.base_version + 1,
        })
    }

    async fn fetch_snapshot(&self, user_id: &UserId) -> SyncResult<RemoteSnapshotSet> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(RemoteSnapshotSet {
            user_id: *user_id,
            snapshots: self.snapshots.lock().unwrap().clone(),
        })
    }

    async fn list_devices(&self, _user_id: &UserId) -> SyncResult<Vec<DeviceRegistration>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn register_device(
        &self,
        _profile: &lexisync_sync::DeviceProfile,
    ) -> SyncResult<()> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn init_device(&self, _device_id: &DeviceId) -> SyncResult<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A fully wired context over a memory store, mock backend and manual
/// clock, signed in as `user_id`. Starts disconnected.
pub struct Fixture {
    pub context: SyncContext,
    pub backend: Arc<MockBackend>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub credentials: Arc<StaticCredentials>,
    pub user_id: UserId,
}

pub async fn fixture() -> Fixture {
    fixture_with_config(SchedulerConfig::default()).await
}

pub async fn fixture_with_config(config: SchedulerConfig) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let backend = Arc::new(MockBackend::new());
    let clock = Arc::new(ManualClock::starting_at(1_700_000_000_000));
    let credentials = Arc::new(StaticCredentials::new("test-token"));
    let context = SyncContextBuilder::new(
        Arc::clone(&store) as _,
        Arc::clone(&credentials) as _,
    )
    .backend(Arc::clone(&backend) as _)
    .clock(Arc::clone(&clock) as _)
    .scheduler_config(config)
    .build()
    .expect("context builds");

    let user_id = UserId::new();
    context.set_user(Some(user_id)).await;
    Fixture {
        context,
        backend,
        store,
        clock,
        credentials,
        user_id,
    }
}

impl Fixture {
    /// Brings the fixture onto strong Wi-Fi.
    pub fn go_online(&self) {
        self.context.network().update_link(
            Transport::Wifi,
            LinkInfo {
                signal_strength: Some(90),
                generation: None,
            },
        );
    }
}

pub fn auth_error() -> SyncError {
    SyncError::Auth("credential rejected".to_string())
}

pub fn vocab_item(word: &str, modified_ms: u64) -> VocabularyItem {
    VocabularyItem {
        word: word.to_string(),
        definition: format!("definition of {word}"),
        language: "en".to_string(),
        review_count: 1,
        mastered: false,
        last_modified: Timestamp::from_millis(modified_ms),
    }
}

pub fn vocab_payload(words: &[(&str, u64)]) -> DataPayload {
    DataPayload::Vocabulary(words.iter().map(|(w, ts)| vocab_item(w, *ts)).collect())
}

pub fn snapshot(
    data_type: DataType,
    version: u64,
    timestamp_ms: u64,
    payload: DataPayload,
) -> VersionedSnapshot {
    let checksum = lexisync_sync::checksum(&payload).expect("payload serializes");
    VersionedSnapshot::new(
        data_type,
        version,
        checksum,
        payload,
        DeviceId::new(),
        UserId::new(),
    )
    .with_timestamp(Timestamp::from_millis(timestamp_ms))
}

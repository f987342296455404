//! Backend transport — the opaque HTTP contract.
//!
//! The concrete backend is an external collaborator; the engine only
//! depends on [`SyncBackend`]. [`HttpBackend`] is the REST implementation;
//! tests substitute their own recording backends.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use lexisync_types::{DeviceId, MutationId, MutationRecord, UserId, VersionedSnapshot};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

/// Supplies the bearer credential acquired by an external provider.
pub trait CredentialProvider: Send + Sync {
    /// The current credential, `None` when unauthenticated.
    fn token(&self) -> Option<String>;

    /// Clears the stored credential after the backend rejected it.
    fn clear(&self);
}

/// A credential held in memory; the simplest provider.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
}

impl StaticCredentials {
    /// Creates a provider holding the given token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Creates an unauthenticated provider.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Stores a fresh credential after reauthentication.
    pub fn replace(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(|p| p.into_inner()) = Some(token.into());
    }
}

impl CredentialProvider for StaticCredentials {
    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn clear(&self) {
        *self.token.write().unwrap_or_else(|p| p.into_inner()) = None;
    }
}

// ── Wire types ───────────────────────────────────────────────────

/// One `POST /sync/batch` request: mutations for a single dataType.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPushRequest {
    pub user_id: UserId,
    pub device_id: DeviceId,
    /// Wire name of the dataType.
    pub data_type: String,
    pub mutations: Vec<MutationRecord>,
    /// The local watermark the batch was built against.
    pub base_version: u64,
}

/// Per-item verdict from the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemStatus {
    pub mutation_id: MutationId,
    pub accepted: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Response to a batch push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPushResponse {
    pub items: Vec<BatchItemStatus>,
    /// The server's version for this dataType after the push.
    pub server_version: u64,
}

/// The full remote state for one user, pulled during onboarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSnapshotSet {
    pub user_id: UserId,
    pub snapshots: Vec<VersionedSnapshot>,
}

/// A device as the remote registry knows it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRegistration {
    pub device_id: DeviceId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub initialized: bool,
}

/// Device metadata registered during onboarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub device_id: DeviceId,
    pub name: String,
    pub platform: String,
    pub os_version: String,
    pub app_version: String,
    /// Stable hash identifying this install.
    pub fingerprint: String,
}

// ── Backend contract ─────────────────────────────────────────────

/// The REST contract the engine drives.
#[async_trait]
pub trait SyncBackend: Send + Sync {
    /// `POST /sync/batch` — push mutations for one dataType.
    async fn push_batch(&self, request: &BatchPushRequest) -> SyncResult<BatchPushResponse>;

    /// `GET /sync/snapshot/{userId}` — full pull for onboarding and
    /// conflict reconciliation.
    async fn fetch_snapshot(&self, user_id: &UserId) -> SyncResult<RemoteSnapshotSet>;

    /// `GET /sync/devices/{userId}` — the device registry.
    async fn list_devices(&self, user_id: &UserId) -> SyncResult<Vec<DeviceRegistration>>;

    /// `POST /device/register`.
    async fn register_device(&self, profile: &DeviceProfile) -> SyncResult<()>;

    /// `POST /device/{id}/init`.
    async fn init_device(&self, device_id: &DeviceId) -> SyncResult<()>;
}

// ── HTTP implementation ──────────────────────────────────────────

/// Configuration for the HTTP backend.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL, e.g. `https://api.lexisync.app`.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.lexisync.app".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// `reqwest`-backed implementation of the REST contract.
pub struct HttpBackend {
    config: HttpBackendConfig,
    client: Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpBackend {
    /// Creates a backend. Fails only if the TLS stack cannot initialize.
    pub fn new(
        config: HttpBackendConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::Protocol(format!("http client init: {e}")))?;
        Ok(Self {
            config,
            client,
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> SyncResult<RequestBuilder> {
        let token = self
            .credentials
            .token()
            .ok_or_else(|| SyncError::Auth("no stored credential".to_string()))?;
        Ok(request.bearer_auth(token))
    }

    async fn check_status(response: reqwest::Response) -> SyncResult<reqwest::Response> {
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SyncError::Auth(format!(
                "backend rejected credential: {}",
                response.status()
            ))),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SyncError::Protocol(format!("{status}: {body}")))
            }
        }
    }

    fn map_transport_error(e: reqwest::Error) -> SyncError {
        if e.is_timeout() {
            SyncError::Timeout
        } else {
            SyncError::Connectivity(e.to_string())
        }
    }
}

#[async_trait]
impl SyncBackend for HttpBackend {
    async fn push_batch(&self, request: &BatchPushRequest) -> SyncResult<BatchPushResponse> {
        debug!(
            data_type = %request.data_type,
            count = request.mutations.len(),
            "pushing batch"
        );
        let req = self.authorize(self.client.post(self.url("/sync/batch")))?;
        let response = req
            .json(request)
            .send()
            .await
            .map_err(Self::map_transport_error)?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| SyncError::Protocol(format!("malformed batch response: {e}")))
    }

    async fn fetch_snapshot(&self, user_id: &UserId) -> SyncResult<RemoteSnapshotSet> {
        let path = format!("/sync/snapshot/{user_id}");
        let req = self.authorize(self.client.get(self.url(&path)))?;
        let response = req.send().await.map_err(Self::map_transport_error)?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| SyncError::Protocol(format!("malformed snapshot response: {e}")))
    }

    async fn list_devices(&self, user_id: &UserId) -> SyncResult<Vec<DeviceRegistration>> {
        let path = format!("/sync/devices/{user_id}");
        let req = self.authorize(self.client.get(self.url(&path)))?;
        let response = req.send().await.map_err(Self::map_transport_error)?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| SyncError::Protocol(format!("malformed device list: {e}")))
    }

    async fn register_device(&self, profile: &DeviceProfile) -> SyncResult<()> {
        let req = self.authorize(self.client.post(self.url("/device/register")))?;
        let response = req
            .json(profile)
            .send()
            .await
            .map_err(Self::map_transport_error)?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn init_device(&self, device_id: &DeviceId) -> SyncResult<()> {
        let path = format!("/device/{device_id}/init");
        let req = self.authorize(self.client.post(self.url(&path)))?;
        let response = req.send().await.map_err(Self::map_transport_error)?;
        Self::check_status(response).await.map(|_| ())
    }
}

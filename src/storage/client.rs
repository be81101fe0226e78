// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! # Content-Addressable Store Client
//!
//! Wraps an IPFS node behind a two-mode state machine:
//!
//! - **Connected**: a node answered the startup check. `put`/`get` go to the
//!   node; pin, peer and pubsub operations are available.
//! - **Fallback**: no node configured or the startup check failed. `put` derives a
//!   `local-` identifier from the envelope hash and writes to the embedded
//!   blob table. Other identifiers are read through the HTTP gateway when
//!   gateway reads are enabled. Network-only operations fail with
//!   [`StorageError::Unsupported`].
//!
//! The mode is decided once in [`ContentStoreClient::connect`] and never
//! changes afterwards. Per-call failures in Connected mode are returned to
//! the caller as-is.
//!
//! `local-` identifiers are always served from the blob table, whatever the
//! mode, so records written by a façade-level local retry stay readable.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::blob_cache::BlobCache;
use super::encryption::digest_hex;
use super::ipfs::{IpfsError, IpfsGateway, KuboApi, PingReply, PubsubMessage, SwarmPeer};
use super::kv::LocalKv;
use super::{StorageError, StorageResult};
use crate::config::StorageConfig;
use crate::polling::{poll_until_ready, BackoffPolicy, PollStatus};

/// Prefix reserved for identifiers minted locally.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Hex characters of the envelope digest kept in a local identifier.
const LOCAL_ID_HEX_LEN: usize = 16;

const CONNECT_INITIAL_DELAY: Duration = Duration::from_millis(500);
const CONNECT_MAX_DELAY: Duration = Duration::from_secs(5);

/// Whether `content_id` was minted by the local fallback path.
pub fn is_local_id(content_id: &str) -> bool {
    content_id.starts_with(LOCAL_ID_PREFIX)
}

/// Deterministic local identifier for an envelope.
pub fn local_content_id(bytes: &[u8]) -> String {
    let digest = digest_hex(bytes);
    format!("{LOCAL_ID_PREFIX}{}", &digest[..LOCAL_ID_HEX_LEN])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    Connected,
    Fallback,
}

/// Result of a successful `put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    pub content_id: String,
    pub size: u64,
}

/// Identity and connectivity summary of the connected node.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub id: String,
    pub agent_version: Option<String>,
    pub addresses: Vec<String>,
    pub peer_count: usize,
}

struct Subscription {
    id: u64,
    token: CancellationToken,
}

type Subscriptions = Arc<Mutex<HashMap<String, Subscription>>>;

struct ConnectedBackend {
    api: KuboApi,
    node_id: String,
    /// Peers this process explicitly connected to.
    peers: Mutex<BTreeSet<String>>,
    /// Live subscription tasks by topic. A task removes its own entry when
    /// its stream ends.
    subscriptions: Subscriptions,
    next_subscription: AtomicU64,
}

enum Backend {
    Connected(ConnectedBackend),
    /// Optional gateway for reading identifiers minted by a node.
    Fallback(Option<IpfsGateway>),
}

pub struct ContentStoreClient {
    backend: Backend,
    kv: Arc<LocalKv>,
    cache: BlobCache,
    request_timeout: Duration,
    gateway_url: String,
    shutdown: CancellationToken,
}

impl ContentStoreClient {
    /// Contact the configured node and settle the mode.
    ///
    /// An unreachable node is not an error: the client comes up in
    /// Fallback mode and logs why.
    pub async fn connect(config: &StorageConfig, kv: Arc<LocalKv>) -> Self {
        let backend = match &config.ipfs_api_url {
            None => {
                info!("No IPFS endpoint configured, running in local-only mode");
                Backend::Fallback(fallback_gateway(config))
            }
            Some(url) => match reach_node(config, url.as_str()).await {
                Ok(backend) => {
                    info!(
                        node_id = %backend.node_id,
                        endpoint = %backend.api.base_url(),
                        "Connected to IPFS node"
                    );
                    Backend::Connected(backend)
                }
                Err(e) => {
                    warn!(
                        endpoint = %url,
                        error = %e,
                        "IPFS node unreachable, continuing in local-only mode"
                    );
                    Backend::Fallback(fallback_gateway(config))
                }
            },
        };

        Self {
            backend,
            kv,
            cache: BlobCache::new(config.cache_capacity, config.cache_ttl),
            request_timeout: config.request_timeout,
            gateway_url: config.gateway_url.clone(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn mode(&self) -> StoreMode {
        match self.backend {
            Backend::Connected(_) => StoreMode::Connected,
            Backend::Fallback(_) => StoreMode::Fallback,
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        match &self.backend {
            Backend::Connected(backend) => Some(&backend.node_id),
            Backend::Fallback(_) => None,
        }
    }

    /// Read-gateway base URL recorded in metadata. `None` in Fallback mode.
    pub fn gateway(&self) -> Option<&str> {
        match self.backend {
            Backend::Connected(_) => Some(&self.gateway_url),
            Backend::Fallback(_) => None,
        }
    }

    // =========================================================================
    // Blobs
    // =========================================================================

    pub async fn put(&self, bytes: Vec<u8>) -> StorageResult<PutReceipt> {
        let backend = match &self.backend {
            Backend::Connected(backend) => backend,
            Backend::Fallback(_) => return self.put_local(&bytes),
        };

        let added = self.call("put", backend.api.add(bytes.clone())).await?;
        let size = added
            .size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(bytes.len() as u64);
        debug!(content_id = %added.hash, size, "Stored blob on IPFS");
        self.cache.put(&added.hash, bytes);

        Ok(PutReceipt {
            content_id: added.hash,
            size,
        })
    }

    /// Write into the embedded blob table under a hash-derived identifier.
    pub fn put_local(&self, bytes: &[u8]) -> StorageResult<PutReceipt> {
        let content_id = local_content_id(bytes);
        self.kv.put_blob(&content_id, bytes)?;
        debug!(content_id = %content_id, size = bytes.len(), "Stored blob locally");
        Ok(PutReceipt {
            content_id,
            size: bytes.len() as u64,
        })
    }

    pub async fn get(&self, content_id: &str) -> StorageResult<Vec<u8>> {
        if is_local_id(content_id) {
            return self
                .kv
                .get_blob(content_id)?
                .ok_or_else(|| StorageError::NotFound(content_id.to_string()));
        }

        if let Some(bytes) = self.cache.get(content_id) {
            return Ok(bytes);
        }

        let bytes = match &self.backend {
            Backend::Connected(backend) => self.call("get", backend.api.cat(content_id)).await?,
            Backend::Fallback(Some(gateway)) => {
                let bytes = self.call("get", gateway.fetch(content_id)).await?;
                debug!(
                    content_id = %content_id,
                    gateway = %gateway.base_url(),
                    "Read blob through gateway"
                );
                bytes
            }
            Backend::Fallback(None) => return Err(StorageError::NotFound(content_id.to_string())),
        };
        self.cache.put(content_id, bytes.clone());
        Ok(bytes)
    }

    /// Drop a locally minted blob. Returns whether it existed.
    pub fn remove_local(&self, content_id: &str) -> StorageResult<bool> {
        if !is_local_id(content_id) {
            return Ok(false);
        }
        Ok(self.kv.remove_blob(content_id)?)
    }

    pub fn local_blob_count(&self) -> StorageResult<usize> {
        Ok(self.kv.blob_count()?)
    }

    pub fn clear_local_blobs(&self) -> StorageResult<()> {
        self.kv.clear_blobs()?;
        self.cache.clear();
        Ok(())
    }

    // =========================================================================
    // Pinning
    // =========================================================================

    pub async fn pin(&self, content_id: &str) -> StorageResult<()> {
        let backend = self.connected("pin")?;
        self.call("pin", backend.api.pin_add(content_id)).await
    }

    pub async fn unpin(&self, content_id: &str) -> StorageResult<()> {
        let backend = self.connected("unpin")?;
        self.call("unpin", backend.api.pin_rm(content_id)).await?;
        // The node may now garbage-collect it
        self.cache.invalidate(content_id);
        Ok(())
    }

    // =========================================================================
    // Peers
    // =========================================================================

    pub async fn list_peers(&self) -> StorageResult<Vec<SwarmPeer>> {
        let backend = self.connected("list_peers")?;
        self.call("list_peers", backend.api.swarm_peers()).await
    }

    pub async fn connect_peer(&self, address: &str) -> StorageResult<()> {
        let backend = self.connected("connect_peer")?;
        self.call("connect_peer", backend.api.swarm_connect(address))
            .await?;
        lock(&backend.peers).insert(address.to_string());
        info!(peer = %address, "Connected to peer");
        Ok(())
    }

    pub async fn disconnect_peer(&self, address: &str) -> StorageResult<()> {
        let backend = self.connected("disconnect_peer")?;
        self.call("disconnect_peer", backend.api.swarm_disconnect(address))
            .await?;
        lock(&backend.peers).remove(address);
        info!(peer = %address, "Disconnected from peer");
        Ok(())
    }

    /// Peers connected through [`connect_peer`](Self::connect_peer).
    pub fn tracked_peers(&self) -> Vec<String> {
        match &self.backend {
            Backend::Connected(backend) => lock(&backend.peers).iter().cloned().collect(),
            Backend::Fallback(_) => Vec::new(),
        }
    }

    /// Ping a peer `count` times (at least once).
    pub async fn ping(&self, peer_id: &str, count: u32) -> StorageResult<Vec<PingReply>> {
        let backend = self.connected("ping")?;
        self.call("ping", backend.api.ping(peer_id, count.max(1)))
            .await
    }

    // =========================================================================
    // Pubsub
    // =========================================================================

    pub async fn publish(&self, topic: &str, data: Vec<u8>) -> StorageResult<()> {
        let backend = self.connected("publish")?;
        self.call("publish", backend.api.pubsub_publish(topic, data))
            .await
    }

    /// Subscribe to `topic`, invoking `handler` for every message on a
    /// background task. Re-subscribing to a topic replaces the previous
    /// subscription.
    pub async fn subscribe<F>(&self, topic: &str, handler: F) -> StorageResult<()>
    where
        F: Fn(PubsubMessage) + Send + Sync + 'static,
    {
        let backend = self.connected("subscribe")?;
        let mut stream = self
            .call("subscribe", backend.api.pubsub_subscribe(topic))
            .await?;

        let token = self.shutdown.child_token();
        let id = backend.next_subscription.fetch_add(1, Ordering::Relaxed);
        let subscription = Subscription {
            id,
            token: token.clone(),
        };
        let previous = lock(&backend.subscriptions).insert(topic.to_string(), subscription);
        if let Some(previous) = previous {
            previous.token.cancel();
        }

        let subscriptions = Arc::clone(&backend.subscriptions);
        let topic = topic.to_string();
        tokio::spawn(async move {
            info!(topic = %topic, "Subscription started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    next = stream.next_message() => match next {
                        Ok(Some(message)) => handler(message),
                        Ok(None) => {
                            debug!(topic = %topic, "Subscription stream closed by node");
                            break;
                        }
                        Err(e) => {
                            warn!(topic = %topic, error = %e, "Subscription stream failed");
                            break;
                        }
                    }
                }
            }
            {
                let mut active = lock(&subscriptions);
                if active.get(&topic).is_some_and(|s| s.id == id) {
                    active.remove(&topic);
                }
            }
            info!(topic = %topic, "Subscription stopped");
        });

        Ok(())
    }

    /// Cancel the subscription for `topic`. Returns whether a live one
    /// existed.
    pub fn unsubscribe(&self, topic: &str) -> StorageResult<bool> {
        let backend = self.connected("unsubscribe")?;
        match lock(&backend.subscriptions).remove(topic) {
            Some(subscription) => {
                subscription.token.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Topics with a running subscription task.
    pub fn subscriptions(&self) -> Vec<String> {
        match &self.backend {
            Backend::Connected(backend) => {
                let mut topics: Vec<String> =
                    lock(&backend.subscriptions).keys().cloned().collect();
                topics.sort();
                topics
            }
            Backend::Fallback(_) => Vec::new(),
        }
    }

    // =========================================================================
    // Node
    // =========================================================================

    pub async fn node_info(&self) -> StorageResult<NodeInfo> {
        let backend = self.connected("node_info")?;
        let identity = self.call("node_info", backend.api.id()).await?;
        let peers = self.call("node_info", backend.api.swarm_peers()).await?;
        Ok(NodeInfo {
            id: identity.id,
            agent_version: identity.agent_version,
            addresses: identity.addresses.unwrap_or_default(),
            peer_count: peers.len(),
        })
    }

    pub async fn version(&self) -> StorageResult<String> {
        let backend = self.connected("version")?;
        Ok(self.call("version", backend.api.version()).await?.version)
    }

    /// Cancel all subscriptions and disconnect tracked peers (best effort).
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        if let Backend::Connected(backend) = &self.backend {
            lock(&backend.subscriptions).clear();

            let peers: Vec<String> = std::mem::take(&mut *lock(&backend.peers))
                .into_iter()
                .collect();
            for peer in peers {
                if let Err(e) = self
                    .call("disconnect_peer", backend.api.swarm_disconnect(&peer))
                    .await
                {
                    debug!(peer = %peer, error = %e, "Peer disconnect during shutdown failed");
                }
            }
        }

        info!("Content store client shut down");
    }

    fn connected(&self, operation: &'static str) -> StorageResult<&ConnectedBackend> {
        match &self.backend {
            Backend::Connected(backend) => Ok(backend),
            Backend::Fallback(_) => Err(StorageError::Unsupported { operation }),
        }
    }

    /// Bound a node call by the request timeout and map its error.
    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, IpfsError>>,
    ) -> StorageResult<T> {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result.map_err(|e| map_ipfs_error(operation, e)),
            Err(_) => Err(StorageError::BackendTimeout {
                operation,
                timeout_ms: self.request_timeout.as_millis() as u64,
            }),
        }
    }
}

fn map_ipfs_error(operation: &'static str, error: IpfsError) -> StorageError {
    if error.is_not_found() {
        StorageError::NotFound(error.to_string())
    } else {
        StorageError::Backend {
            operation,
            message: error.to_string(),
        }
    }
}

async fn reach_node(config: &StorageConfig, url: &str) -> StorageResult<ConnectedBackend> {
    let api = KuboApi::new(url, config.credentials.clone())
        .map_err(|e| StorageError::BackendUnreachable(e.to_string()))?;

    let policy = BackoffPolicy {
        max_attempts: config.connect_attempts,
        initial_delay: CONNECT_INITIAL_DELAY,
        multiplier: 2,
        max_delay: CONNECT_MAX_DELAY,
    };
    let timeout = config.request_timeout;

    let identity = poll_until_ready(&policy, || {
        let api = &api;
        async move {
            match tokio::time::timeout(timeout, api.id()).await {
                Ok(Ok(identity)) => Ok(PollStatus::Ready(identity)),
                Ok(Err(e)) => Err(StorageError::BackendUnreachable(e.to_string())),
                Err(_) => Err(StorageError::BackendTimeout {
                    operation: "connect",
                    timeout_ms: timeout.as_millis() as u64,
                }),
            }
        }
    })
    .await
    .map_err(|e| match e {
        StorageError::ResultUnavailable { attempts } => StorageError::BackendUnreachable(
            format!("no answer from {url} after {attempts} attempts"),
        ),
        other => other,
    })?;

    Ok(ConnectedBackend {
        api,
        node_id: identity.id,
        peers: Mutex::new(BTreeSet::new()),
        subscriptions: Arc::new(Mutex::new(HashMap::new())),
        next_subscription: AtomicU64::new(0),
    })
}

fn fallback_gateway(config: &StorageConfig) -> Option<IpfsGateway> {
    if !config.gateway_reads {
        return None;
    }
    match IpfsGateway::new(&config.gateway_url) {
        Ok(gateway) => {
            info!(gateway = %gateway.base_url(), "Reading remote records through the gateway");
            Some(gateway)
        }
        Err(e) => {
            warn!(gateway = %config.gateway_url, error = %e, "Gateway reads disabled");
            None
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mock_kubo::{self, MockKubo};
    use std::sync::atomic::Ordering;

    fn temp_kv() -> (Arc<LocalKv>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(LocalKv::open(&dir.path().join("kv.redb")).unwrap());
        (kv, dir)
    }

    async fn fallback_client() -> (ContentStoreClient, tempfile::TempDir) {
        let (kv, dir) = temp_kv();
        let config = StorageConfig::local_only(dir.path());
        (ContentStoreClient::connect(&config, kv).await, dir)
    }

    async fn connected_client() -> (ContentStoreClient, Arc<MockKubo>, tempfile::TempDir) {
        let mock = Arc::new(MockKubo::default());
        let base = mock_kubo::spawn(mock.clone()).await;
        let (kv, dir) = temp_kv();
        let config = mock_kubo::connected_config(&base, dir.path());
        let client = ContentStoreClient::connect(&config, kv).await;
        assert_eq!(client.mode(), StoreMode::Connected);
        (client, mock, dir)
    }

    #[test]
    fn local_ids_are_prefixed_and_deterministic() {
        let a = local_content_id(b"{\"a\":1}");
        let b = local_content_id(b"{\"a\":1}");
        assert_eq!(a, b);
        assert!(is_local_id(&a));
        assert_eq!(a.len(), LOCAL_ID_PREFIX.len() + LOCAL_ID_HEX_LEN);
        assert_ne!(a, local_content_id(b"{\"a\":2}"));
    }

    #[tokio::test]
    async fn fallback_put_get_is_content_derived() {
        let (client, _dir) = fallback_client().await;
        assert_eq!(client.mode(), StoreMode::Fallback);
        assert!(client.node_id().is_none());
        assert!(client.gateway().is_none());

        let first = client.put(b"payload".to_vec()).await.unwrap();
        let second = client.put(b"payload".to_vec()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.size, 7);

        assert_eq!(client.get(&first.content_id).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn fallback_get_unknown_is_not_found() {
        let (client, _dir) = fallback_client().await;
        assert!(matches!(
            client.get("local-0000000000000000").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            client.get("QmSomethingRemote").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn fallback_network_operations_are_unsupported() {
        let (client, _dir) = fallback_client().await;
        assert!(matches!(
            client.pin("QmX").await,
            Err(StorageError::Unsupported { operation: "pin" })
        ));
        assert!(matches!(
            client.publish("alerts", b"x".to_vec()).await,
            Err(StorageError::Unsupported { .. })
        ));
        assert!(matches!(
            client.subscribe("alerts", |_| {}).await,
            Err(StorageError::Unsupported { .. })
        ));
        assert!(matches!(
            client.list_peers().await,
            Err(StorageError::Unsupported { .. })
        ));
        assert!(matches!(
            client.ping("12D3KooWPeer", 1).await,
            Err(StorageError::Unsupported { operation: "ping" })
        ));
        assert!(client.tracked_peers().is_empty());
        assert!(client.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn fallback_reads_remote_ids_through_gateway() {
        let mock = Arc::new(MockKubo::default());
        let base = mock_kubo::spawn(mock.clone()).await;
        let cid = mock.seed_blob(b"pinned elsewhere");

        let (kv, dir) = temp_kv();
        let config = mock_kubo::gateway_config(&base, dir.path());
        let client = ContentStoreClient::connect(&config, kv).await;
        assert_eq!(client.mode(), StoreMode::Fallback);
        assert!(client.gateway().is_none());

        assert_eq!(client.get(&cid).await.unwrap(), b"pinned elsewhere");
        assert!(matches!(
            client.get("QmNotOnTheGateway").await,
            Err(StorageError::NotFound(_))
        ));

        // Local ids never leave the blob table
        let receipt = client.put(b"mine".to_vec()).await.unwrap();
        assert_eq!(client.get(&receipt.content_id).await.unwrap(), b"mine");
    }

    #[tokio::test]
    async fn unreachable_backend_degrades_to_fallback() {
        let (kv, dir) = temp_kv();
        let mut config = StorageConfig::local_only(dir.path());
        config.ipfs_api_url = Some(url::Url::parse("http://127.0.0.1:9").unwrap());
        config.connect_attempts = 1;
        config.request_timeout = Duration::from_secs(2);

        let client = ContentStoreClient::connect(&config, kv).await;
        assert_eq!(client.mode(), StoreMode::Fallback);

        let receipt = client.put(b"{\"a\":1}".to_vec()).await.unwrap();
        assert!(receipt.content_id.starts_with(LOCAL_ID_PREFIX));
    }

    #[tokio::test]
    async fn clear_local_blobs_forgets_everything() {
        let (client, _dir) = fallback_client().await;
        let receipt = client.put(b"data".to_vec()).await.unwrap();
        client.clear_local_blobs().unwrap();
        assert!(matches!(
            client.get(&receipt.content_id).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn connected_put_get_round_trip() {
        let (client, mock, _dir) = connected_client().await;
        assert_eq!(client.node_id(), Some(mock_kubo::NODE_ID));
        assert_eq!(client.gateway(), Some("https://ipfs.io"));

        let receipt = client.put(b"remote bytes".to_vec()).await.unwrap();
        assert!(!is_local_id(&receipt.content_id));
        assert_eq!(receipt.size, 12);
        assert!(mock.has_blob(&receipt.content_id));

        client.cache.clear();
        assert_eq!(client.get(&receipt.content_id).await.unwrap(), b"remote bytes");
    }

    #[tokio::test]
    async fn connected_get_unknown_is_not_found() {
        let (client, _mock, _dir) = connected_client().await;
        assert!(matches!(
            client.get("QmMissing").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn connected_get_times_out() {
        let mock = Arc::new(MockKubo::default());
        let base = mock_kubo::spawn(mock.clone()).await;
        let (kv, dir) = temp_kv();
        let mut config = mock_kubo::connected_config(&base, dir.path());
        config.request_timeout = Duration::from_millis(200);
        let client = ContentStoreClient::connect(&config, kv).await;

        let receipt = client.put(b"slow".to_vec()).await.unwrap();
        client.cache.clear();
        mock.cat_delay_ms.store(1_000, Ordering::SeqCst);

        assert!(matches!(
            client.get(&receipt.content_id).await,
            Err(StorageError::BackendTimeout { operation: "get", .. })
        ));
    }

    #[tokio::test]
    async fn connected_put_failure_is_surfaced() {
        let (client, mock, _dir) = connected_client().await;
        mock.fail_add.store(true, Ordering::SeqCst);

        assert!(matches!(
            client.put(b"x".to_vec()).await,
            Err(StorageError::Backend { operation: "put", .. })
        ));
        // Mode never changes mid-session
        assert_eq!(client.mode(), StoreMode::Connected);
    }

    #[tokio::test]
    async fn local_ids_stay_readable_when_connected() {
        let (client, _mock, _dir) = connected_client().await;
        let receipt = client.put_local(b"retry").unwrap();
        assert_eq!(client.get(&receipt.content_id).await.unwrap(), b"retry");
        assert!(client.remove_local(&receipt.content_id).unwrap());
        assert!(!client.remove_local("QmRemote").unwrap());
    }

    #[tokio::test]
    async fn pins_and_peers() {
        let (client, mock, _dir) = connected_client().await;
        let receipt = client.put(b"pin me".to_vec()).await.unwrap();

        client.pin(&receipt.content_id).await.unwrap();
        assert!(mock.is_pinned(&receipt.content_id));
        client.unpin(&receipt.content_id).await.unwrap();
        assert!(!mock.is_pinned(&receipt.content_id));

        let addr = "/ip4/10.0.0.2/tcp/4001/p2p/12D3KooWPeer";
        client.connect_peer(addr).await.unwrap();
        assert_eq!(client.tracked_peers(), vec![addr.to_string()]);
        let peers = client.list_peers().await.unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].peer, "12D3KooWPeer");

        let info = client.node_info().await.unwrap();
        assert_eq!(info.id, mock_kubo::NODE_ID);
        assert_eq!(info.peer_count, 1);

        client.disconnect_peer(addr).await.unwrap();
        assert!(client.tracked_peers().is_empty());
        assert!(client.list_peers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_and_subscribe() {
        let (client, mock, _dir) = connected_client().await;

        client.publish("alerts", b"phishing wave".to_vec()).await.unwrap();
        assert_eq!(
            mock.published(),
            vec![("alerts".to_string(), b"phishing wave".to_vec())]
        );

        mock.queue_message("alerts", b"from peer");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        client
            .subscribe("alerts", move |message| {
                let _ = tx.send(message);
            })
            .await
            .unwrap();

        let message = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.topic, "alerts");
        assert_eq!(message.data, b"from peer");

        // The mock closes the stream after the queued messages; the task
        // then drops its own entry
        for _ in 0..100 {
            if client.subscriptions().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(client.subscriptions().is_empty());
        assert!(!client.unsubscribe("alerts").unwrap());
    }

    #[tokio::test]
    async fn subscribe_is_bounded_by_request_timeout() {
        let mock = Arc::new(MockKubo::default());
        let base = mock_kubo::spawn(mock.clone()).await;
        let (kv, dir) = temp_kv();
        let mut config = mock_kubo::connected_config(&base, dir.path());
        config.request_timeout = Duration::from_millis(200);
        let client = ContentStoreClient::connect(&config, kv).await;
        mock.sub_delay_ms.store(1_000, Ordering::SeqCst);

        assert!(matches!(
            client.subscribe("alerts", |_| {}).await,
            Err(StorageError::BackendTimeout { operation: "subscribe", .. })
        ));
        assert!(client.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn ping_reports_round_trips() {
        let (client, _mock, _dir) = connected_client().await;
        client
            .connect_peer("/ip4/10.0.0.4/tcp/4001/p2p/12D3KooWPingable")
            .await
            .unwrap();

        let replies = client.ping("12D3KooWPingable", 3).await.unwrap();
        let round_trips: Vec<_> = replies.iter().filter(|r| r.time_ns > 0).collect();
        assert_eq!(round_trips.len(), 3);
        assert!(replies.iter().all(|r| r.success));

        let replies = client.ping("12D3KooWStranger", 0).await.unwrap();
        assert!(replies.iter().any(|r| !r.success));
    }

    #[tokio::test]
    async fn version_and_shutdown() {
        let (client, mock, _dir) = connected_client().await;
        assert_eq!(client.version().await.unwrap(), "0.29.0");

        client
            .connect_peer("/ip4/10.0.0.3/tcp/4001/p2p/12D3KooWOther")
            .await
            .unwrap();
        client.shutdown().await;

        assert!(client.tracked_peers().is_empty());
        assert!(mock.peer_addrs().is_empty());
    }
}
